use nalgebra::Vector3;

// ---------------------------------------------------------------------------
// Coarse path planning
// ---------------------------------------------------------------------------

/// Spherical keep-out zone.
#[derive(Debug, Clone, Copy)]
pub struct Obstacle {
    pub center: Vector3<f64>,
    pub radius: f64,
}

/// Straight-line probe with side-step waypoints around spherical obstacles.
///
/// Coarse by design: go-to-position flies each leg, so waypoints only need
/// to clear the keep-out spheres, not be smooth. Work is bounded by the
/// obstacle count.
#[derive(Debug, Clone, Copy)]
pub struct PathPlanner {
    /// Extra clearance beyond each obstacle radius, m.
    pub clearance: f64,
}

impl Default for PathPlanner {
    fn default() -> Self {
        Self { clearance: 1.5 }
    }
}

impl PathPlanner {
    pub fn new(clearance: f64) -> Self {
        Self { clearance }
    }

    /// Plan from `start` to `goal`. The returned sequence ends with `goal`
    /// and contains a side-step waypoint for every obstacle the direct line
    /// would clip.
    pub fn plan(
        &self,
        start: Vector3<f64>,
        goal: Vector3<f64>,
        obstacles: &[Obstacle],
    ) -> Vec<Vector3<f64>> {
        let mut waypoints = Vec::with_capacity(obstacles.len() + 1);
        let mut current = start;

        // Each obstacle can force at most one side-step, so the loop is
        // bounded even when legs re-probe the remaining field.
        for _ in 0..=obstacles.len() {
            match self.first_blocking(current, goal, obstacles) {
                Some(obs) => {
                    let wp = self.side_step(current, goal, &obs);
                    waypoints.push(wp);
                    current = wp;
                }
                None => break,
            }
        }

        waypoints.push(goal);
        waypoints
    }

    /// The obstacle nearest to `from` whose inflated sphere intersects the
    /// segment `from -> to`.
    fn first_blocking(
        &self,
        from: Vector3<f64>,
        to: Vector3<f64>,
        obstacles: &[Obstacle],
    ) -> Option<Obstacle> {
        let seg = to - from;
        let len = seg.norm();
        if len < 1e-9 {
            return None;
        }
        let dir = seg / len;

        let mut best: Option<(f64, Obstacle)> = None;
        for obs in obstacles {
            let keep_out = obs.radius + self.clearance;
            let rel = obs.center - from;
            let along = rel.dot(&dir).clamp(0.0, len);
            let closest = from + dir * along;
            if (obs.center - closest).norm() < keep_out {
                // endpoints already inside the sphere cannot be routed around
                if rel.norm() < keep_out * 0.5 {
                    continue;
                }
                match best {
                    Some((d, _)) if along >= d => {}
                    _ => best = Some((along, *obs)),
                }
            }
        }
        best.map(|(_, o)| o)
    }

    /// Waypoint abeam the obstacle: offset perpendicular to the leg, on the
    /// side the obstacle center is already off the line.
    fn side_step(&self, from: Vector3<f64>, to: Vector3<f64>, obs: &Obstacle) -> Vector3<f64> {
        let dir = (to - from).normalize();
        let rel = obs.center - from;
        let along = rel.dot(&dir);
        let foot = from + dir * along;

        let mut lateral = foot - obs.center;
        if lateral.norm() < 1e-6 {
            // obstacle dead on the line: pick any perpendicular
            lateral = dir.cross(&Vector3::y());
            if lateral.norm() < 1e-6 {
                lateral = dir.cross(&Vector3::x());
            }
        }
        // 1.2x: a waypoint exactly on the keep-out sphere leaves both legs
        // tangent, and the next probe would flag them again
        obs.center + lateral.normalize() * (obs.radius + self.clearance) * 1.2
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn clears(path: &[Vector3<f64>], start: Vector3<f64>, obstacles: &[Obstacle]) -> bool {
        let mut prev = start;
        for &wp in path {
            let seg = wp - prev;
            let len = seg.norm();
            if len > 1e-9 {
                let dir = seg / len;
                for obs in obstacles {
                    // sample the leg against the bare radius
                    for k in 0..=20 {
                        let p = prev + dir * (len * k as f64 / 20.0);
                        if (p - obs.center).norm() < obs.radius {
                            return false;
                        }
                    }
                }
            }
            prev = wp;
        }
        true
    }

    #[test]
    fn clear_line_is_a_single_leg() {
        let p = PathPlanner::default();
        let path = p.plan(Vector3::zeros(), Vector3::new(0.0, 0.0, 50.0), &[]);
        assert_eq!(path, vec![Vector3::new(0.0, 0.0, 50.0)]);
    }

    #[test]
    fn blocking_obstacle_forces_a_side_step() {
        let p = PathPlanner::default();
        let obstacles = [Obstacle { center: Vector3::new(0.0, 0.0, 25.0), radius: 3.0 }];
        let start = Vector3::zeros();
        let goal = Vector3::new(0.0, 0.0, 50.0);
        let path = p.plan(start, goal, &obstacles);
        assert_eq!(path.len(), 2, "one waypoint plus the goal: {:?}", path);
        assert_eq!(*path.last().unwrap(), goal);
        assert!(clears(&path, start, &obstacles), "path clips the obstacle: {:?}", path);
    }

    #[test]
    fn offset_obstacle_beyond_clearance_is_ignored() {
        let p = PathPlanner::new(1.0);
        let obstacles = [Obstacle { center: Vector3::new(10.0, 0.0, 25.0), radius: 2.0 }];
        let path = p.plan(Vector3::zeros(), Vector3::new(0.0, 0.0, 50.0), &obstacles);
        assert_eq!(path.len(), 1);
    }

    #[test]
    fn two_obstacles_two_side_steps() {
        let p = PathPlanner::default();
        let obstacles = [
            Obstacle { center: Vector3::new(0.5, 0.0, 15.0), radius: 2.0 },
            Obstacle { center: Vector3::new(-0.5, 0.0, 35.0), radius: 2.0 },
        ];
        let start = Vector3::zeros();
        let goal = Vector3::new(0.0, 0.0, 50.0);
        let path = p.plan(start, goal, &obstacles);
        assert!(path.len() >= 2, "expected side-steps: {:?}", path);
        assert!(clears(&path, start, &obstacles));
    }
}
