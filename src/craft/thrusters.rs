use nalgebra::Vector3;

use crate::error::GncError;

// ---------------------------------------------------------------------------
// Reaction-control thruster geometry
// ---------------------------------------------------------------------------

/// Number of RCS nozzles on a craft. Fixed by the airframe.
pub const THRUSTER_COUNT: usize = 24;

/// One nozzle: body-frame mount point and unit exhaust direction.
///
/// Exhaust leaves along `direction`, so the reaction force on the craft at
/// magnitude `f` is `-f * direction` and the torque is `position x force`.
#[derive(Debug, Clone, Copy)]
pub struct Thruster {
    pub position: Vector3<f64>,
    pub direction: Vector3<f64>,
}

impl Thruster {
    pub fn new(position: Vector3<f64>, direction: Vector3<f64>) -> Self {
        Self { position, direction }
    }

    /// Body force at firing magnitude `f >= 0`.
    pub fn force(&self, f: f64) -> Vector3<f64> {
        -self.direction * f
    }

    /// Body torque at firing magnitude `f >= 0`.
    pub fn torque(&self, f: f64) -> Vector3<f64> {
        self.position.cross(&self.force(f))
    }
}

/// Signed-axis thruster groups.
///
/// Each role holds two index lists. Group selection follows the command sign
/// rule table in the allocator: pitch `+` fires `[1]` and `-` fires `[0]`;
/// yaw and roll `+` fire `[0]` and `-` fire `[1]`. For translation, `forward`
/// and `up` fire `[0]` on a positive command; `left` is sign-inverted by
/// convention and fires `[0]` on a negative command.
#[derive(Debug, Clone, Default)]
pub struct ThrusterGroups {
    pub pitch: [Vec<usize>; 2],
    pub yaw: [Vec<usize>; 2],
    pub roll: [Vec<usize>; 2],
    pub forward: [Vec<usize>; 2],
    pub up: [Vec<usize>; 2],
    pub left: [Vec<usize>; 2],
}

impl ThrusterGroups {
    fn roles(&self) -> [(&'static str, &[Vec<usize>; 2]); 6] {
        [
            ("pitch", &self.pitch),
            ("yaw", &self.yaw),
            ("roll", &self.roll),
            ("forward", &self.forward),
            ("up", &self.up),
            ("left", &self.left),
        ]
    }
}

// ---------------------------------------------------------------------------
// Complete layout: geometry + groups + capacities
// ---------------------------------------------------------------------------

/// Validated thruster configuration of a craft.
#[derive(Debug, Clone)]
pub struct RcsLayout {
    thrusters: Vec<Thruster>,
    groups: ThrusterGroups,
    capacities: Vec<f64>,
    base_thrust: f64,
    custom_capacities: bool,
}

impl RcsLayout {
    /// Build and validate a layout. Refuses to construct on a wrong nozzle
    /// count, an empty group, an out-of-range index, or a degenerate exhaust
    /// direction; directions are renormalized.
    pub fn new(
        thrusters: Vec<Thruster>,
        groups: ThrusterGroups,
        base_thrust: f64,
    ) -> Result<Self, GncError> {
        if thrusters.len() != THRUSTER_COUNT {
            return Err(GncError::ThrusterCount {
                expected: THRUSTER_COUNT,
                got: thrusters.len(),
            });
        }
        if !base_thrust.is_finite() || base_thrust < 0.0 {
            return Err(GncError::NonFinite("base thrust"));
        }
        let mut thrusters = thrusters;
        for t in &mut thrusters {
            if !t.position.iter().all(|v| v.is_finite())
                || !t.direction.iter().all(|v| v.is_finite())
            {
                return Err(GncError::NonFinite("thruster geometry"));
            }
            let n = t.direction.norm();
            if n < 1e-9 {
                return Err(GncError::NonFinite("thruster direction"));
            }
            t.direction /= n;
        }
        for (name, pair) in groups.roles() {
            for half in pair {
                if half.is_empty() {
                    return Err(GncError::EmptyGroup(name));
                }
                if let Some(&i) = half.iter().find(|&&i| i >= THRUSTER_COUNT) {
                    return Err(GncError::ThrusterIndex(i));
                }
            }
        }
        Ok(Self {
            thrusters,
            groups,
            capacities: vec![base_thrust; THRUSTER_COUNT],
            base_thrust,
            custom_capacities: false,
        })
    }

    pub fn thrusters(&self) -> &[Thruster] {
        &self.thrusters
    }

    pub fn groups(&self) -> &ThrusterGroups {
        &self.groups
    }

    pub fn capacities(&self) -> &[f64] {
        &self.capacities
    }

    pub fn capacity(&self, i: usize) -> f64 {
        self.capacities[i]
    }

    pub fn base_thrust(&self) -> f64 {
        self.base_thrust
    }

    /// Replace the per-thruster capacity table.
    pub fn set_capacities(&mut self, caps: Vec<f64>) -> Result<(), GncError> {
        if caps.len() != THRUSTER_COUNT {
            return Err(GncError::ThrusterCount {
                expected: THRUSTER_COUNT,
                got: caps.len(),
            });
        }
        if let Some((i, &v)) = caps.iter().enumerate().find(|(_, v)| !v.is_finite() || **v < 0.0) {
            return Err(GncError::NegativeCapacity { index: i, value: v });
        }
        self.capacities = caps;
        self.custom_capacities = true;
        Ok(())
    }

    /// Set the uniform base thrust. Refills the capacity table unless a
    /// custom table has been installed.
    pub fn set_base_thrust(&mut self, v: f64) -> Result<(), GncError> {
        if !v.is_finite() || v < 0.0 {
            return Err(GncError::NonFinite("base thrust"));
        }
        self.base_thrust = v;
        if !self.custom_capacities {
            self.capacities.fill(v);
        }
        Ok(())
    }

    /// Replace geometry wholesale, keeping groups and capacities.
    pub fn set_thrusters(&mut self, thrusters: Vec<Thruster>) -> Result<(), GncError> {
        let rebuilt = Self::new(thrusters, self.groups.clone(), self.base_thrust)?;
        self.thrusters = rebuilt.thrusters;
        Ok(())
    }

    /// Sum of capacities over a group.
    pub fn group_capacity(&self, group: &[usize]) -> f64 {
        group.iter().map(|&i| self.capacities[i]).sum()
    }

    /// Torque authority of a group about an axis: the sum over members of
    /// the magnitude of the axis component of each thruster's full-capacity
    /// torque.
    pub fn group_torque_about(&self, group: &[usize], axis: &Vector3<f64>) -> f64 {
        group
            .iter()
            .map(|&i| self.thrusters[i].torque(self.capacities[i]).dot(axis).abs())
            .sum()
    }
}

// ---------------------------------------------------------------------------
// Preset: box craft
// ---------------------------------------------------------------------------

/// Canonical 24-nozzle layout for a box craft of the given dimensions.
///
/// Four nozzles per face, exhausting along the face normal. Translation
/// groups are torque-free and rotation groups force-free by symmetry, so a
/// uniform firing of any group produces a pure wrench. Rejects a non-finite
/// or negative base thrust like any other layout construction.
pub fn box_layout(
    width: f64,
    height: f64,
    depth: f64,
    base_thrust: f64,
) -> Result<RcsLayout, GncError> {
    let (hw, hh, hd) = (width / 2.0, height / 2.0, depth / 2.0);
    let (qw, qh, qd) = (width / 4.0, height / 4.0, depth / 4.0);

    let mut t = Vec::with_capacity(THRUSTER_COUNT);
    let mut add = |p: [f64; 3], d: [f64; 3]| {
        t.push(Thruster::new(Vector3::from(p), Vector3::from(d)));
    };

    // 0..4  top face (+y), exhaust up, force down
    add([qw, hh, qd], [0.0, 1.0, 0.0]);
    add([-qw, hh, qd], [0.0, 1.0, 0.0]);
    add([qw, hh, -qd], [0.0, 1.0, 0.0]);
    add([-qw, hh, -qd], [0.0, 1.0, 0.0]);
    // 4..8  bottom face (-y), exhaust down, force up
    add([qw, -hh, qd], [0.0, -1.0, 0.0]);
    add([-qw, -hh, qd], [0.0, -1.0, 0.0]);
    add([qw, -hh, -qd], [0.0, -1.0, 0.0]);
    add([-qw, -hh, -qd], [0.0, -1.0, 0.0]);
    // 8..12  right face (+x), exhaust right, force left
    add([hw, qh, qd], [1.0, 0.0, 0.0]);
    add([hw, -qh, qd], [1.0, 0.0, 0.0]);
    add([hw, qh, -qd], [1.0, 0.0, 0.0]);
    add([hw, -qh, -qd], [1.0, 0.0, 0.0]);
    // 12..16  left face (-x), exhaust left, force right
    add([-hw, qh, qd], [-1.0, 0.0, 0.0]);
    add([-hw, -qh, qd], [-1.0, 0.0, 0.0]);
    add([-hw, qh, -qd], [-1.0, 0.0, 0.0]);
    add([-hw, -qh, -qd], [-1.0, 0.0, 0.0]);
    // 16..20  front face (+z), exhaust forward, force backward
    add([qw, qh, hd], [0.0, 0.0, 1.0]);
    add([-qw, qh, hd], [0.0, 0.0, 1.0]);
    add([qw, -qh, hd], [0.0, 0.0, 1.0]);
    add([-qw, -qh, hd], [0.0, 0.0, 1.0]);
    // 20..24  back face (-z), exhaust backward, force forward
    add([qw, qh, -hd], [0.0, 0.0, -1.0]);
    add([-qw, qh, -hd], [0.0, 0.0, -1.0]);
    add([qw, -qh, -hd], [0.0, 0.0, -1.0]);
    add([-qw, -qh, -hd], [0.0, 0.0, -1.0]);

    let groups = ThrusterGroups {
        // [0] fires on negative command, [1] on positive
        pitch: [vec![4, 5, 2, 3], vec![6, 7, 0, 1]],
        // [0] fires on positive command, [1] on negative
        yaw: [vec![10, 11, 12, 13], vec![8, 9, 14, 15]],
        roll: [vec![4, 6, 1, 3], vec![5, 7, 0, 2]],
        // translation: [0] = positive-force group, [1] = negative
        forward: [vec![20, 21, 22, 23], vec![16, 17, 18, 19]],
        up: [vec![4, 5, 6, 7], vec![0, 1, 2, 3]],
        left: [vec![8, 9, 10, 11], vec![12, 13, 14, 15]],
    };

    RcsLayout::new(t, groups, base_thrust)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn fire_group(layout: &RcsLayout, group: &[usize], f: f64) -> (Vector3<f64>, Vector3<f64>) {
        let mut force = Vector3::zeros();
        let mut torque = Vector3::zeros();
        for &i in group {
            force += layout.thrusters()[i].force(f);
            torque += layout.thrusters()[i].torque(f);
        }
        (force, torque)
    }

    #[test]
    fn translation_groups_are_torque_free() {
        let l = box_layout(1.0, 1.0, 2.0, 1.0).unwrap();
        let g = l.groups().clone();
        for pair in [&g.forward, &g.up, &g.left] {
            for half in pair {
                let (_, torque) = fire_group(&l, half, 1.0);
                assert_relative_eq!(torque.norm(), 0.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn rotation_groups_are_force_free() {
        let l = box_layout(1.0, 1.0, 2.0, 1.0).unwrap();
        let g = l.groups().clone();
        for pair in [&g.pitch, &g.yaw, &g.roll] {
            for half in pair {
                let (force, _) = fire_group(&l, half, 1.0);
                assert_relative_eq!(force.norm(), 0.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn group_signs_match_selection_table() {
        let l = box_layout(1.0, 1.0, 2.0, 1.0).unwrap();
        let g = l.groups().clone();
        // pitch[1] produces +x torque, pitch[0] produces -x
        assert!(fire_group(&l, &g.pitch[1], 1.0).1.x > 0.0);
        assert!(fire_group(&l, &g.pitch[0], 1.0).1.x < 0.0);
        // yaw[0] -> +y, roll[0] -> +z
        assert!(fire_group(&l, &g.yaw[0], 1.0).1.y > 0.0);
        assert!(fire_group(&l, &g.roll[0], 1.0).1.z > 0.0);
        // forward[0] pushes +z, up[0] pushes +y, left[0] pushes -x
        assert!(fire_group(&l, &g.forward[0], 1.0).0.z > 0.0);
        assert!(fire_group(&l, &g.up[0], 1.0).0.y > 0.0);
        assert!(fire_group(&l, &g.left[0], 1.0).0.x < 0.0);
    }

    #[test]
    fn rejects_wrong_count() {
        let l = box_layout(1.0, 1.0, 2.0, 1.0).unwrap();
        let short: Vec<Thruster> = l.thrusters()[..23].to_vec();
        let err = RcsLayout::new(short, l.groups().clone(), 1.0).unwrap_err();
        assert_eq!(err, GncError::ThrusterCount { expected: 24, got: 23 });
    }

    #[test]
    fn preset_rejects_negative_base_thrust() {
        assert!(box_layout(1.0, 1.0, 2.0, -1.0).is_err());
        assert!(box_layout(1.0, 1.0, 2.0, f64::NAN).is_err());
    }

    #[test]
    fn base_thrust_refills_uniform_capacities() {
        let mut l = box_layout(1.0, 1.0, 2.0, 1.0).unwrap();
        l.set_base_thrust(2.0).unwrap();
        assert!(l.capacities().iter().all(|&c| c == 2.0));
        // a custom table pins capacities against later base changes
        l.set_capacities(vec![0.5; THRUSTER_COUNT]).unwrap();
        l.set_base_thrust(3.0).unwrap();
        assert!(l.capacities().iter().all(|&c| c == 0.5));
    }
}
