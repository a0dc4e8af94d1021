use nalgebra::{Quaternion, UnitQuaternion, Vector3};

use crate::error::GncError;

// ---------------------------------------------------------------------------
// Kinematic snapshot
// ---------------------------------------------------------------------------

/// Kinematic state of the craft at one instant, world frame.
///
/// Snapshots are immutable per tick. The physics engine that produces them is
/// external; the core never integrates.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot {
    pub pos: Vector3<f64>,             // m, world
    pub quat: UnitQuaternion<f64>,     // body→world rotation
    pub vel: Vector3<f64>,             // m/s, world
    pub omega: Vector3<f64>,           // rad/s, world frame angular velocity
}

impl Snapshot {
    /// Validate and ingest raw snapshot components.
    ///
    /// Every field must be finite; the quaternion need not be normalized
    /// (it is renormalized here). A zero quaternion is rejected as
    /// non-finite rather than silently mapped to identity.
    pub fn from_raw(
        pos: [f64; 3],
        quat: [f64; 4],
        vel: [f64; 3],
        omega: [f64; 3],
    ) -> Result<Self, GncError> {
        let mut all = pos.iter().chain(&quat).chain(&vel).chain(&omega);
        if !all.all(|v| v.is_finite()) {
            return Err(GncError::NonFinite("snapshot"));
        }
        let q = Quaternion::new(quat[3], quat[0], quat[1], quat[2]);
        if q.norm() < 1e-9 {
            return Err(GncError::NonFinite("snapshot quaternion"));
        }
        Ok(Self {
            pos: Vector3::from(pos),
            quat: UnitQuaternion::new_normalize(q),
            vel: Vector3::from(vel),
            omega: Vector3::from(omega),
        })
    }

    pub fn at_rest() -> Self {
        Self {
            pos: Vector3::zeros(),
            quat: UnitQuaternion::identity(),
            vel: Vector3::zeros(),
            omega: Vector3::zeros(),
        }
    }

    /// Body-frame angular velocity.
    pub fn omega_local(&self) -> Vector3<f64> {
        self.quat.inverse() * self.omega
    }

    /// Body +Z (forward) axis expressed in the world frame.
    pub fn forward(&self) -> Vector3<f64> {
        self.quat * Vector3::z()
    }

    pub fn is_finite(&self) -> bool {
        self.pos.iter().all(|v| v.is_finite())
            && self.vel.iter().all(|v| v.is_finite())
            && self.omega.iter().all(|v| v.is_finite())
            && self.quat.quaternion().coords.iter().all(|v| v.is_finite())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn renormalizes_quaternion() {
        let s = Snapshot::from_raw(
            [0.0; 3],
            [0.0, 2.0, 0.0, 0.0], // unnormalized 180 deg about y
            [0.0; 3],
            [0.0; 3],
        )
        .unwrap();
        assert_relative_eq!(s.quat.quaternion().norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn rejects_non_finite() {
        let r = Snapshot::from_raw([f64::NAN, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0], [0.0; 3], [0.0; 3]);
        assert_eq!(r.unwrap_err(), GncError::NonFinite("snapshot"));
    }

    #[test]
    fn forward_follows_attitude() {
        let s = Snapshot::at_rest();
        assert_relative_eq!(s.forward(), Vector3::z(), epsilon = 1e-12);
    }
}
