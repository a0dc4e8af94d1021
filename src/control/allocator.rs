use nalgebra::Vector3;

use crate::config::Limits;
use crate::craft::thrusters::{RcsLayout, THRUSTER_COUNT};

// ---------------------------------------------------------------------------
// Thruster allocation
// ---------------------------------------------------------------------------

/// Maps a body-frame torque or force command onto non-negative firing
/// magnitudes for the 24 nozzles.
///
/// Commands are exponentially smoothed before allocation, each axis has a
/// chatter deadband at twice the configured epsilon, and accumulated output
/// never exceeds a nozzle's capacity. Same command sequence in, same output
/// sequence out.
#[derive(Debug, Clone)]
pub struct ThrusterAllocator {
    last_rot_cmd: Vector3<f64>,
    last_lin_cmd: Vector3<f64>,
    rot_alpha: f64,
    lin_alpha: f64,
}

impl Default for ThrusterAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl ThrusterAllocator {
    pub fn new() -> Self {
        Self {
            last_rot_cmd: Vector3::zeros(),
            last_lin_cmd: Vector3::zeros(),
            rot_alpha: 0.4,
            lin_alpha: 0.4,
        }
    }

    /// Smoothing factor for rotational commands. Cancel-rotation runs at
    /// 0.25; the attitude modes at 0.4.
    pub fn set_rotation_smoothing(&mut self, alpha: f64) {
        if (0.0..1.0).contains(&alpha) {
            self.rot_alpha = alpha;
        }
    }

    pub fn set_translation_smoothing(&mut self, alpha: f64) {
        if (0.0..1.0).contains(&alpha) {
            self.lin_alpha = alpha;
        }
    }

    /// Clear smoothing history (on mode disable).
    pub fn reset(&mut self) {
        self.reset_rotation();
        self.reset_translation();
    }

    pub fn reset_rotation(&mut self) {
        self.last_rot_cmd = Vector3::zeros();
    }

    pub fn reset_translation(&mut self) {
        self.last_lin_cmd = Vector3::zeros();
    }

    /// Allocate a rotational momentum-rate command (pitch, yaw, roll about
    /// body x, y, z) onto the rotational groups, accumulating into `out`.
    pub fn apply_torque(
        &mut self,
        cmd: Vector3<f64>,
        layout: &RcsLayout,
        limits: &Limits,
        out: &mut [f64; THRUSTER_COUNT],
    ) {
        self.last_rot_cmd = self.rot_alpha * self.last_rot_cmd + (1.0 - self.rot_alpha) * cmd;
        let c = self.last_rot_cmd;
        let deadband = limits.epsilon * 2.0;
        let g = layout.groups();

        // (command component, rotation axis, group fired on +, group on -)
        let axes: [(f64, Vector3<f64>, &[usize], &[usize]); 3] = [
            (c.x, Vector3::x(), g.pitch[1].as_slice(), g.pitch[0].as_slice()),
            (c.y, Vector3::y(), g.yaw[0].as_slice(), g.yaw[1].as_slice()),
            (c.z, Vector3::z(), g.roll[0].as_slice(), g.roll[1].as_slice()),
        ];

        for (component, axis, pos_group, neg_group) in axes {
            if component.abs() <= deadband {
                continue;
            }
            let group = if component > 0.0 { pos_group } else { neg_group };
            let torque_max = layout.group_torque_about(group, &axis);
            if torque_max <= f64::EPSILON {
                continue;
            }
            let l_cap = limits.max_angular_momentum.max(f64::EPSILON);
            let torque_cmd = torque_max.min(component.abs() / l_cap * torque_max);
            let share = layout
                .base_thrust()
                .min(torque_cmd / torque_max * layout.base_thrust());
            for &i in group {
                out[i] = (out[i] + share).min(layout.capacity(i));
            }
        }
    }

    /// Allocate a translational force command (body x, y, z) onto the
    /// translational groups, accumulating into `out`.
    ///
    /// `forward` (z) and `up` (y) fire their `[0]` half on a positive
    /// command. `left` (x) is sign-inverted by convention: a negative x
    /// command fires `left[0]`.
    pub fn apply_force(
        &mut self,
        cmd: Vector3<f64>,
        layout: &RcsLayout,
        limits: &Limits,
        out: &mut [f64; THRUSTER_COUNT],
    ) {
        self.last_lin_cmd = self.lin_alpha * self.last_lin_cmd + (1.0 - self.lin_alpha) * cmd;
        let c = self.last_lin_cmd;
        let deadband = limits.epsilon * 2.0;
        let g = layout.groups();

        let axes: [(f64, &[usize]); 3] = [
            (c.x, if c.x < 0.0 { g.left[0].as_slice() } else { g.left[1].as_slice() }),
            (c.y, if c.y > 0.0 { g.up[0].as_slice() } else { g.up[1].as_slice() }),
            (c.z, if c.z > 0.0 { g.forward[0].as_slice() } else { g.forward[1].as_slice() }),
        ];

        for (component, group) in axes {
            if component.abs() <= deadband {
                continue;
            }
            let sum_cap = layout.group_capacity(group);
            if sum_cap <= f64::EPSILON {
                continue;
            }
            let total = component.abs().clamp(0.0, sum_cap);
            for &i in group {
                let share = layout.capacity(i).min(total * layout.capacity(i) / sum_cap);
                out[i] = (out[i] + share).min(layout.capacity(i));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::craft::thrusters::box_layout;

    fn harness_layout() -> RcsLayout {
        // box layout with the pitch pair narrowed to single nozzles for
        // direct observation of group selection
        let l = box_layout(1.0, 1.0, 2.0, 1.0).unwrap();
        let mut groups = l.groups().clone();
        groups.pitch = [vec![0], vec![1]];
        RcsLayout::new(l.thrusters().to_vec(), groups, 1.0).unwrap()
    }

    #[test]
    fn positive_pitch_fires_group_one_only() {
        let layout = harness_layout();
        let limits = Limits::default();
        let mut alloc = ThrusterAllocator::new();
        let mut out = [0.0; THRUSTER_COUNT];
        // feed until the smoothed command converges
        for _ in 0..50 {
            out = [0.0; THRUSTER_COUNT];
            alloc.apply_torque(Vector3::new(0.5, 0.0, 0.0), &layout, &limits, &mut out);
        }
        assert!(out[1] > 0.0, "positive pitch must fire group[1]");
        assert_eq!(out[0], 0.0, "positive pitch must not fire group[0]");
    }

    #[test]
    fn negative_pitch_swaps_groups() {
        let layout = harness_layout();
        let limits = Limits::default();
        let mut alloc = ThrusterAllocator::new();
        let mut out = [0.0; THRUSTER_COUNT];
        for _ in 0..50 {
            out = [0.0; THRUSTER_COUNT];
            alloc.apply_torque(Vector3::new(-0.5, 0.0, 0.0), &layout, &limits, &mut out);
        }
        assert!(out[0] > 0.0);
        assert_eq!(out[1], 0.0);
    }

    #[test]
    fn outputs_non_negative_and_within_capacity() {
        let layout = box_layout(1.0, 1.0, 2.0, 1.0).unwrap();
        let limits = Limits::default();
        let mut alloc = ThrusterAllocator::new();
        let mut out = [0.0; THRUSTER_COUNT];
        for _ in 0..20 {
            alloc.apply_torque(Vector3::new(50.0, -30.0, 80.0), &layout, &limits, &mut out);
            alloc.apply_force(Vector3::new(-900.0, 500.0, 700.0), &layout, &limits, &mut out);
        }
        for (i, &f) in out.iter().enumerate() {
            assert!(f >= 0.0);
            assert!(f <= layout.capacity(i) + 1e-12, "nozzle {} over capacity: {}", i, f);
        }
    }

    #[test]
    fn chatter_deadband_zeroes_axis() {
        let layout = box_layout(1.0, 1.0, 2.0, 1.0).unwrap();
        let limits = Limits::default(); // epsilon 0.01 -> deadband 0.02
        let mut alloc = ThrusterAllocator::new();
        let mut out = [0.0; THRUSTER_COUNT];
        for _ in 0..50 {
            out = [0.0; THRUSTER_COUNT];
            alloc.apply_force(Vector3::new(0.0, 0.0, 0.015), &layout, &limits, &mut out);
        }
        assert!(out.iter().all(|&f| f == 0.0), "sub-deadband command must not fire");
    }

    #[test]
    fn translational_share_is_capacity_proportional() {
        let mut layout = box_layout(1.0, 1.0, 2.0, 1.0).unwrap();
        // uneven capacities on the forward group (nozzles 20..24)
        let mut caps = vec![1.0; THRUSTER_COUNT];
        caps[20] = 3.0;
        caps[21] = 1.0;
        caps[22] = 1.0;
        caps[23] = 1.0;
        layout.set_capacities(caps).unwrap();
        let limits = Limits::default();
        let mut alloc = ThrusterAllocator::new();
        alloc.set_translation_smoothing(0.0); // pass-through for exactness
        let mut out = [0.0; THRUSTER_COUNT];
        alloc.apply_force(Vector3::new(0.0, 0.0, 3.0), &layout, &limits, &mut out);
        // sum_cap = 6, total = 3: nozzle 20 gets 1.5, the rest 0.5
        assert!((out[20] - 1.5).abs() < 1e-12);
        assert!((out[21] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn left_axis_convention_is_inverted() {
        let layout = box_layout(1.0, 1.0, 2.0, 1.0).unwrap();
        let limits = Limits::default();
        let mut alloc = ThrusterAllocator::new();
        alloc.set_translation_smoothing(0.0);
        let mut out = [0.0; THRUSTER_COUNT];
        alloc.apply_force(Vector3::new(-1.0, 0.0, 0.0), &layout, &limits, &mut out);
        let g = layout.groups().clone();
        assert!(g.left[0].iter().all(|&i| out[i] > 0.0), "negative x fires left[0]");
        assert!(g.left[1].iter().all(|&i| out[i] == 0.0));
    }

    #[test]
    fn smoothing_is_deterministic() {
        let layout = box_layout(1.0, 1.0, 2.0, 1.0).unwrap();
        let limits = Limits::default();
        let cmds = [
            Vector3::new(0.4, 0.0, 0.0),
            Vector3::new(0.1, 0.2, 0.0),
            Vector3::new(0.0, 0.0, 0.3),
        ];
        let run = || {
            let mut alloc = ThrusterAllocator::new();
            let mut history = Vec::new();
            for c in cmds {
                let mut out = [0.0; THRUSTER_COUNT];
                alloc.apply_torque(c, &layout, &limits, &mut out);
                history.push(out);
            }
            history
        };
        assert_eq!(run(), run());
    }
}
