use crate::control::allocator::ThrusterAllocator;
use crate::control::pid::PidController;
use crate::craft::thrusters::THRUSTER_COUNT;
use crate::telemetry::AttitudeTelemetry;

use super::{clamp_norm, StepInputs};

// ---------------------------------------------------------------------------
// Cancel-rotation mode
// ---------------------------------------------------------------------------

/// Drives body angular momentum to zero.
///
/// Works in the momentum domain so tuning is independent of the craft's
/// inertia: the correction target is the negated local momentum, clamped to
/// the momentum budget, with a square-root taper near zero to soften the
/// final null.
#[derive(Debug, Clone, Copy, Default)]
pub struct CancelRotation;

impl CancelRotation {
    pub fn step(
        &mut self,
        inp: &StepInputs<'_>,
        pid: &mut PidController,
        alloc: &mut ThrusterAllocator,
        out: &mut [f64; THRUSTER_COUNT],
        telemetry: &mut AttitudeTelemetry,
    ) {
        let snap = inp.snapshot;
        let limits = &inp.config.limits;

        // Local angular momentum, element-wise against principal inertias.
        let omega_local = snap.omega_local();
        let momentum = inp.caps.inertia.component_mul(&omega_local);

        let mut target = -momentum;
        clamp_norm(&mut target, limits.max_angular_momentum);

        // Square-root taper near zero: full authority would chatter the
        // nozzles across the null.
        let magnitude = momentum.norm();
        let taper_zone = 0.05 * limits.max_angular_momentum;
        if magnitude < taper_zone && taper_zone > 0.0 {
            target *= (magnitude / taper_zone).sqrt();
        }

        let cmd = pid.update(target, inp.dt);

        telemetry.momentum_error = target.norm();
        telemetry.omega_desired = 0.0;
        telemetry.angle = 0.0;

        alloc.set_rotation_smoothing(0.25);
        alloc.apply_torque(cmd, inp.layout, limits, out);
    }

    pub fn reset(&mut self) {}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
