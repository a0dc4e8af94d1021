use std::f64::consts::PI;

use nalgebra::{UnitQuaternion, Vector3};

use crate::control::allocator::ThrusterAllocator;
use crate::control::pid::PidController;
use crate::craft::thrusters::THRUSTER_COUNT;
use crate::telemetry::AttitudeTelemetry;

use super::{clamp_norm, shortest_arc, StepInputs};

// ---------------------------------------------------------------------------
// Attitude modes: point-to-position and orientation-match
// ---------------------------------------------------------------------------

// Hysteresis deadband on the attitude error: engage below ATTITUDE_DEADBAND,
// release above 1.5x.
const ATTITUDE_DEADBAND: f64 = 0.035; // rad, ~2 deg

/// Time-optimal attitude-rate law shared by both pointing modes.
///
/// Takes the canonical error rotation, derives the bang-bang target rate
/// along the error axis (with a linear region near zero), converts the rate
/// deficit into a momentum error, and hands it to the PID/allocator chain.
#[allow(clippy::too_many_arguments)]
fn steer_to(
    q_err: &UnitQuaternion<f64>,
    deadband: &mut bool,
    inertia_compensation: f64,
    inp: &StepInputs<'_>,
    pid: &mut PidController,
    alloc: &mut ThrusterAllocator,
    out: &mut [f64; THRUSTER_COUNT],
    telemetry: &mut AttitudeTelemetry,
) {
    let limits = &inp.config.limits;
    let (angle, axis) = shortest_arc(q_err);

    if angle < ATTITUDE_DEADBAND {
        *deadband = true;
    } else if angle > 1.5 * ATTITUDE_DEADBAND {
        *deadband = false;
    }

    let (alpha_max, omega_max) = inp.caps.angular_caps(limits);

    // Bang-bang profile with a linear region near zero so the terminal
    // approach is not a hard switch.
    let omega_des = if *deadband {
        0.0
    } else {
        omega_max.min((2.0 * alpha_max * angle).sqrt()).min(2.0 * angle)
    };

    let omega_along = inp.snapshot.omega_local().dot(&axis);
    let i_eff = inp.caps.effective_inertia_along(&axis);
    let mut momentum_err = i_eff * (omega_des - omega_along) * axis;
    clamp_norm(&mut momentum_err, limits.max_angular_momentum);

    telemetry.angle = angle;
    telemetry.alpha_max = alpha_max;
    telemetry.omega_max = omega_max;
    telemetry.effective_inertia = i_eff;
    telemetry.omega_desired = omega_des;
    telemetry.momentum_error = momentum_err.norm();
    telemetry.deadband = *deadband;

    let cmd = pid.update(momentum_err, inp.dt) * inertia_compensation;

    alloc.set_rotation_smoothing(0.4);
    alloc.apply_torque(cmd, inp.layout, limits, out);
}

/// Points body +Z at the target position.
#[derive(Debug, Clone, Copy)]
pub struct PointToPosition {
    deadband: bool,
    /// Empirical output scale compensating for momentum-domain gains acting
    /// through the full plant inertia. Tunable, not a calibrated constant.
    pub inertia_compensation: f64,
}

impl Default for PointToPosition {
    fn default() -> Self {
        Self { deadband: false, inertia_compensation: 5.0 }
    }
}

impl PointToPosition {
    /// Returns the world attitude that would center the target, so the owner
    /// can publish a live target orientation while the mode runs.
    pub fn step(
        &mut self,
        inp: &StepInputs<'_>,
        pid: &mut PidController,
        alloc: &mut ThrusterAllocator,
        out: &mut [f64; THRUSTER_COUNT],
        telemetry: &mut AttitudeTelemetry,
    ) -> Option<UnitQuaternion<f64>> {
        let snap = inp.snapshot;
        let to_target = inp.target_pos - snap.pos;
        let dist = to_target.norm();
        if dist < 1e-6 {
            return None;
        }

        let dir_local = snap.quat.inverse() * (to_target / dist);
        // Rotation taking body +Z onto the target direction; the antiparallel
        // singularity resolves to a half-turn about +Y.
        let q_err = UnitQuaternion::rotation_between(&Vector3::z(), &dir_local)
            .unwrap_or_else(|| UnitQuaternion::from_axis_angle(&Vector3::y_axis(), PI));

        steer_to(
            &q_err,
            &mut self.deadband,
            self.inertia_compensation,
            inp,
            pid,
            alloc,
            out,
            telemetry,
        );

        Some(snap.quat * q_err)
    }

    pub fn reset(&mut self) {
        self.deadband = false;
    }
}

/// Matches the target orientation.
#[derive(Debug, Clone, Copy)]
pub struct OrientationMatch {
    deadband: bool,
    /// Compose a half-turn about local +Y onto the target, for docking
    /// approaches that face the port rather than copy its attitude.
    pub reverse_align: bool,
    pub inertia_compensation: f64,
}

impl Default for OrientationMatch {
    fn default() -> Self {
        Self { deadband: false, reverse_align: false, inertia_compensation: 5.0 }
    }
}

impl OrientationMatch {
    pub fn step(
        &mut self,
        inp: &StepInputs<'_>,
        pid: &mut PidController,
        alloc: &mut ThrusterAllocator,
        out: &mut [f64; THRUSTER_COUNT],
        telemetry: &mut AttitudeTelemetry,
    ) {
        let snap = inp.snapshot;
        let target = if self.reverse_align {
            inp.target_quat * UnitQuaternion::from_axis_angle(&Vector3::y_axis(), PI)
        } else {
            inp.target_quat
        };
        let q_err = snap.quat.inverse() * target;

        steer_to(
            &q_err,
            &mut self.deadband,
            self.inertia_compensation,
            inp,
            pid,
            alloc,
            out,
            telemetry,
        );
    }

    pub fn reset(&mut self) {
        self.deadband = false;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GncConfig;
    use crate::control::pid::PidDomain;
    use crate::craft::capability::CapabilityModel;
    use crate::craft::thrusters::box_layout;
    use crate::state::Snapshot;

    struct Rig {
        config: GncConfig,
        layout: crate::craft::thrusters::RcsLayout,
        caps: crate::craft::capability::Capabilities,
        pid: PidController,
        alloc: ThrusterAllocator,
        telemetry: AttitudeTelemetry,
    }

    fn rig() -> Rig {
        let layout = box_layout(1.0, 1.0, 2.0, 1.0).unwrap();
        let mut model = CapabilityModel::new(10.0, Vector3::new(1.0, 1.0, 2.0)).unwrap();
        let caps = *model.capabilities(&layout);
        Rig {
            config: GncConfig::default(),
            layout,
            caps,
            pid: PidController::new(3.0, 0.0, 1.0, PidDomain::AngularMomentum),
            alloc: ThrusterAllocator::new(),
            telemetry: AttitudeTelemetry::default(),
        }
    }

    #[test]
    fn off_axis_target_produces_yaw_torque() {
        let mut r = rig();
        let mut mode = PointToPosition::default();
        let snap = Snapshot::at_rest();
        let inp = StepInputs {
            dt: 1.0 / 30.0,
            snapshot: &snap,
            config: &r.config,
            layout: &r.layout,
            caps: &r.caps,
            mass: 10.0,
            target_pos: Vector3::new(5.0, 0.0, 5.0), // 45 deg right of forward
            target_quat: UnitQuaternion::identity(),
            ref_vel: Vector3::zeros(),
        };

        let mut out = [0.0; THRUSTER_COUNT];
        let mut published = None;
        for _ in 0..20 {
            out = [0.0; THRUSTER_COUNT];
            published = mode.step(&inp, &mut r.pid, &mut r.alloc, &mut out, &mut r.telemetry);
        }

        let mut torque = Vector3::zeros();
        for (i, &f) in out.iter().enumerate() {
            torque += r.layout.thrusters()[i].torque(f);
        }
        // cross(z, x) = +y: turning forward toward +x is a +y rotation
        assert!(torque.y > 0.0, "turn toward +x is about +y, got {:?}", torque);

        // published target attitude points +Z at the target
        let q = published.expect("target well away from craft");
        let fwd = q * Vector3::z();
        let dir = Vector3::new(5.0, 0.0, 5.0).normalize();
        assert!(fwd.dot(&dir) > 0.999);
        assert!((r.telemetry.angle - PI / 4.0).abs() < 1e-6);
    }

    #[test]
    fn deadband_engages_with_hysteresis() {
        let mut r = rig();
        let mut mode = PointToPosition::default();
        let snap = Snapshot::at_rest();
        // target almost dead ahead: error under the engage threshold
        let inp = StepInputs {
            dt: 1.0 / 30.0,
            snapshot: &snap,
            config: &r.config,
            layout: &r.layout,
            caps: &r.caps,
            mass: 10.0,
            target_pos: Vector3::new(0.01, 0.0, 10.0),
            target_quat: UnitQuaternion::identity(),
            ref_vel: Vector3::zeros(),
        };
        let mut out = [0.0; THRUSTER_COUNT];
        mode.step(&inp, &mut r.pid, &mut r.alloc, &mut out, &mut r.telemetry);
        assert!(r.telemetry.deadband);
        assert_eq!(r.telemetry.omega_desired, 0.0);

        // between engage and release thresholds: deadband holds
        let inp_mid = StepInputs { target_pos: Vector3::new(0.45, 0.0, 10.0), ..inp };
        mode.step(&inp_mid, &mut r.pid, &mut r.alloc, &mut out, &mut r.telemetry);
        assert!(r.telemetry.deadband, "within hysteresis band the deadband must hold");

        // well outside: released
        let inp_far = StepInputs { target_pos: Vector3::new(2.0, 0.0, 10.0), ..inp };
        mode.step(&inp_far, &mut r.pid, &mut r.alloc, &mut out, &mut r.telemetry);
        assert!(!r.telemetry.deadband);
    }

    #[test]
    fn orientation_match_nulls_at_target_attitude() {
        let mut r = rig();
        let mut mode = OrientationMatch::default();
        let attitude = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.6);
        let mut snap = Snapshot::at_rest();
        snap.quat = attitude;
        let inp = StepInputs {
            dt: 1.0 / 30.0,
            snapshot: &snap,
            config: &r.config,
            layout: &r.layout,
            caps: &r.caps,
            mass: 10.0,
            target_pos: Vector3::zeros(),
            target_quat: attitude,
            ref_vel: Vector3::zeros(),
        };
        let mut out = [0.0; THRUSTER_COUNT];
        for _ in 0..10 {
            mode.step(&inp, &mut r.pid, &mut r.alloc, &mut out, &mut r.telemetry);
        }
        assert!(out.iter().all(|&f| f == 0.0));
        assert!(r.telemetry.deadband);
    }

    #[test]
    fn reverse_align_flips_the_goal() {
        let mut r = rig();
        let mut mode = OrientationMatch { reverse_align: true, ..Default::default() };
        let snap = Snapshot::at_rest();
        // target attitude = half-turn about y; reverse-align composes another
        // half-turn, so identity attitude is already on goal
        let inp = StepInputs {
            dt: 1.0 / 30.0,
            snapshot: &snap,
            config: &r.config,
            layout: &r.layout,
            caps: &r.caps,
            mass: 10.0,
            target_pos: Vector3::zeros(),
            target_quat: UnitQuaternion::from_axis_angle(&Vector3::y_axis(), PI),
            ref_vel: Vector3::zeros(),
        };
        let mut out = [0.0; THRUSTER_COUNT];
        mode.step(&inp, &mut r.pid, &mut r.alloc, &mut out, &mut r.telemetry);
        assert!(r.telemetry.angle < 1e-6);
    }
}
