use std::f64::consts::PI;

use nalgebra::{UnitQuaternion, Vector3};

use crate::config::GncConfig;
use crate::craft::capability::Capabilities;
use crate::craft::thrusters::RcsLayout;
use crate::state::Snapshot;

pub mod attitude;
pub mod cancel_linear;
pub mod cancel_rotation;
pub mod goto_position;

pub use attitude::{OrientationMatch, PointToPosition};
pub use cancel_linear::CancelLinearMotion;
pub use cancel_rotation::CancelRotation;
pub use goto_position::GoToPosition;

// ---------------------------------------------------------------------------
// Shared mode plumbing
// ---------------------------------------------------------------------------

/// Everything a mode reads during one recompute. Modes own no references
/// across calls; the core assembles this on its stack each step.
#[derive(Debug, Clone, Copy)]
pub struct StepInputs<'a> {
    pub dt: f64,
    pub snapshot: &'a Snapshot,
    pub config: &'a GncConfig,
    pub layout: &'a RcsLayout,
    pub caps: &'a Capabilities,
    pub mass: f64,
    pub target_pos: Vector3<f64>,
    pub target_quat: UnitQuaternion<f64>,
    /// Velocity of the reference frame (zero for a static target).
    pub ref_vel: Vector3<f64>,
}

/// Minimal-angle axis/angle of an error quaternion, canonicalized onto the
/// short arc so the returned angle never exceeds pi.
pub(crate) fn shortest_arc(q: &UnitQuaternion<f64>) -> (f64, Vector3<f64>) {
    match q.axis_angle() {
        Some((axis, angle)) => {
            let mut angle = angle;
            let mut axis = axis.into_inner();
            if angle > PI {
                angle = 2.0 * PI - angle;
                axis = -axis;
            }
            (angle, axis)
        }
        None => (0.0, Vector3::z()),
    }
}

/// Clamp a vector's norm in place; zero-length input is left untouched.
pub(crate) fn clamp_norm(v: &mut Vector3<f64>, cap: f64) {
    let n = v.norm();
    if n > cap && n > 0.0 {
        *v *= cap / n;
    }
}

/// Per-step force bound: the configured force ceiling and the per-step
/// momentum budget `p_max / dt`, whichever is tighter.
pub(crate) fn force_cap(config: &GncConfig, dt: f64) -> f64 {
    config
        .limits
        .max_force
        .min(config.limits.max_linear_momentum / dt.max(1e-9))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn shortest_arc_never_exceeds_pi() {
        for frac in [0.1, 0.5, 0.9, 1.0, 1.3, 1.9] {
            let q = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), PI * frac);
            let (angle, _) = shortest_arc(&q);
            assert!(angle <= PI + 1e-12, "angle {} for frac {}", angle, frac);
        }
    }

    #[test]
    fn shortest_arc_round_trips() {
        let q = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.7);
        let (angle, axis) = shortest_arc(&q);
        assert_relative_eq!(angle, 0.7, epsilon = 1e-12);
        assert_relative_eq!(axis, Vector3::x(), epsilon = 1e-12);
    }

    #[test]
    fn clamp_norm_preserves_direction() {
        let mut v = Vector3::new(3.0, 4.0, 0.0);
        clamp_norm(&mut v, 1.0);
        assert_relative_eq!(v.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(v.x / v.y, 3.0 / 4.0, epsilon = 1e-12);
    }

    #[test]
    fn force_cap_takes_the_tighter_bound() {
        let config = GncConfig::default(); // max_force 120, p_max 50
        // at dt = 1 the momentum budget wins
        assert_relative_eq!(force_cap(&config, 1.0), 50.0, epsilon = 1e-12);
        // at dt = 1 s / 30 the force ceiling wins
        assert_relative_eq!(force_cap(&config, 1.0 / 30.0), 120.0, epsilon = 1e-12);
    }
}
