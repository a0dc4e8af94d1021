use crate::control::allocator::ThrusterAllocator;
use crate::control::pid::PidController;
use crate::craft::thrusters::THRUSTER_COUNT;
use crate::telemetry::TranslationTelemetry;

use super::{clamp_norm, force_cap, StepInputs};

// ---------------------------------------------------------------------------
// Cancel-linear-motion mode
// ---------------------------------------------------------------------------

/// Nulls velocity relative to the reference frame.
///
/// The damping factor is a pure proportional pre-gain applied to the local
/// velocity error before the PID; the PID output is scaled by mass into a
/// force and bounded by the per-step momentum budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct CancelLinearMotion;

impl CancelLinearMotion {
    pub fn step(
        &mut self,
        inp: &StepInputs<'_>,
        pid: &mut PidController,
        alloc: &mut ThrusterAllocator,
        out: &mut [f64; THRUSTER_COUNT],
        telemetry: &mut TranslationTelemetry,
    ) {
        let snap = inp.snapshot;
        let v_local = snap.quat.inverse() * (snap.vel - inp.ref_vel);
        let error = -inp.config.damping.factor * v_local;

        let mut force = inp.mass * pid.update(error, inp.dt);
        clamp_norm(&mut force, force_cap(inp.config, inp.dt));

        telemetry.along_velocity = v_local.norm();
        telemetry.distance = 0.0;
        telemetry.braking = false;

        alloc.set_translation_smoothing(0.4);
        alloc.apply_force(force, inp.layout, &inp.config.limits, out);
    }

    pub fn reset(&mut self) {}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
