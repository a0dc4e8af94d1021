use crate::control::allocator::ThrusterAllocator;
use crate::craft::thrusters::THRUSTER_COUNT;
use crate::telemetry::TranslationTelemetry;

use super::{clamp_norm, force_cap, StepInputs};

// ---------------------------------------------------------------------------
// Go-to-position mode
// ---------------------------------------------------------------------------

// Alignment gate hysteresis: derate thrust while pointed away from the
// target line, release only once well realigned.
const ALIGN_GATE_ON: f64 = 15.0 * std::f64::consts::PI / 180.0;
const ALIGN_GATE_OFF: f64 = 8.0 * std::f64::consts::PI / 180.0;
const GATED_SCALE: f64 = 0.3;

// Braking hysteresis margins on stopping distance, m.
const BRAKE_ON_MARGIN: f64 = 0.08;
const BRAKE_OFF_MARGIN: f64 = 0.12;

/// Flies to a position, possibly in a moving reference frame.
///
/// Outside the arrival threshold this is ZEM/ZEV guidance: a commanded
/// acceleration from the expected miss and velocity residual over a
/// time-to-go chosen from the craft's acceleration authority. Inside the
/// threshold it hands over to a proportional+damping law and keeps running
/// there; it never early-exits at rest.
#[derive(Debug, Clone, Copy)]
pub struct GoToPosition {
    /// Arrival threshold, m.
    pub threshold: f64,
    braking: bool,
    align_gated: bool,
    approach: bool,
}

impl Default for GoToPosition {
    fn default() -> Self {
        Self { threshold: 0.2, braking: false, align_gated: false, approach: false }
    }
}

impl GoToPosition {
    pub fn step(
        &mut self,
        inp: &StepInputs<'_>,
        alloc: &mut ThrusterAllocator,
        out: &mut [f64; THRUSTER_COUNT],
        telemetry: &mut TranslationTelemetry,
    ) {
        let snap = inp.snapshot;
        let limits = &inp.config.limits;
        let q_inv = snap.quat.inverse();

        let pos_err_world = inp.target_pos - snap.pos;
        let dist = pos_err_world.norm();
        let v_rel = snap.vel - inp.ref_vel;

        let mut accel_local = if dist > self.threshold {
            let dir_world = pos_err_world / dist;
            let dir_local = q_inv * dir_world;
            let v_along = v_rel.dot(&dir_world);

            // Alignment gate: thrust authority assumes the main translation
            // groups roughly face the target line.
            let align = snap.forward().dot(&dir_world);
            let off_angle = align.clamp(-1.0, 1.0).acos();
            if off_angle >= ALIGN_GATE_ON {
                self.align_gated = true;
            } else if off_angle <= ALIGN_GATE_OFF {
                self.align_gated = false;
            }
            let align_scale = if self.align_gated {
                GATED_SCALE
            } else {
                (align.max(0.0) * align.max(0.0)).max(0.2)
            };

            let a_max = (inp.caps.linear_accel_along(&dir_local) * align_scale).max(1e-6);
            let d_stop = v_along * v_along / (2.0 * a_max);
            if v_along > 0.0 && dist <= d_stop + BRAKE_ON_MARGIN {
                self.braking = true;
            } else if dist > d_stop + BRAKE_OFF_MARGIN {
                self.braking = false;
            }

            telemetry.along_velocity = v_along;
            telemetry.stopping_distance = d_stop;

            // Time-to-go: weighted blend of the accelerate-coast estimate and
            // the velocity-kill time.
            let t_go = (0.8 * 2.0 * (dist / a_max).sqrt() + 0.2 * v_rel.norm() / a_max)
                .clamp(0.35, 60.0);

            // ZEM/ZEV commanded acceleration.
            let accel_world =
                (6.0 / (t_go * t_go)) * (pos_err_world - v_rel * t_go) + (4.0 / t_go) * (-v_rel);
            let mut a = q_inv * accel_world;

            // Per-axis clamp against derated capability and the configured
            // acceleration ceiling.
            for i in 0..3 {
                let mut cap = inp.caps.lin_accel[i] * align_scale;
                if let Some(a_lim) = limits.max_linear_acceleration {
                    cap = cap.min(a_lim);
                }
                a[i] = a[i].clamp(-cap, cap);
            }

            // Optional speed cap: once over the limit, drop any component
            // that would accelerate further along the velocity.
            if let Some(v_max) = limits.max_linear_velocity {
                let speed = v_rel.norm();
                if speed > v_max {
                    let v_dir_local = q_inv * (v_rel / speed);
                    let a_par = a.dot(&v_dir_local);
                    if a_par > 0.0 {
                        a -= a_par * v_dir_local;
                    }
                }
            }
            a
        } else {
            // Terminal hold: proportional + damping in the local frame.
            telemetry.along_velocity = v_rel.norm();
            telemetry.stopping_distance = 0.0;
            self.braking = false;
            let pos_err_local = q_inv * pos_err_world;
            let v_local = q_inv * v_rel;
            inp.config.pid.position.kp * pos_err_local - inp.config.damping.factor * v_local
        };

        self.approach = self.threshold > 0.5 && dist <= 2.0 * self.threshold;

        if let Some(a_lim) = limits.max_linear_acceleration {
            clamp_norm(&mut accel_local, a_lim);
        }

        let mut force = inp.mass * accel_local;
        clamp_norm(&mut force, force_cap(inp.config, inp.dt));

        telemetry.distance = dist;
        telemetry.braking = self.braking;
        telemetry.alignment_gated = self.align_gated;
        telemetry.approach = self.approach;

        alloc.set_translation_smoothing(0.4);
        alloc.apply_force(force, inp.layout, limits, out);
    }

    pub fn reset(&mut self) {
        self.braking = false;
        self.align_gated = false;
        self.approach = false;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
