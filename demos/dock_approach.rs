use nalgebra::{UnitQuaternion, Vector3};

use rcs_autopilot::craft::box_layout;
use rcs_autopilot::{GncConfig, GncCore, ModeKind, Obstacle, PathPlanner, Snapshot};

/// Fly around a keep-out zone to a docking point, pointing at each waypoint
/// on the way: path planner feeding point-to-position and go-to-position.
fn main() {
    let dims = Vector3::new(1.0, 1.0, 2.0);
    let mass = 10.0;
    let layout = box_layout(dims.x, dims.y, dims.z, 5.0).unwrap();
    let mut core = GncCore::new(mass, dims, layout, GncConfig::default()).unwrap();

    let start = Vector3::zeros();
    let dock = Vector3::new(0.0, 0.0, 60.0);
    let obstacles = [Obstacle { center: Vector3::new(0.0, 0.5, 30.0), radius: 4.0 }];

    let planner = PathPlanner::default();
    let path = planner.plan(start, dock, &obstacles);
    println!("Planned {} leg(s):", path.len());
    for (i, wp) in path.iter().enumerate() {
        println!("  wp{}: ({:6.2}, {:6.2}, {:6.2})", i, wp.x, wp.y, wp.z);
    }

    let inertia = Vector3::new(
        mass / 12.0 * (dims.y * dims.y + dims.z * dims.z),
        mass / 12.0 * (dims.x * dims.x + dims.z * dims.z),
        mass / 12.0 * (dims.x * dims.x + dims.y * dims.y),
    );
    let mut snap = Snapshot::at_rest();

    core.set_mode(ModeKind::PointToPosition, true);
    core.set_mode(ModeKind::GoToPosition, true);

    let dt = 1.0 / 60.0;
    let mut elapsed = 0.0;
    for (leg, wp) in path.iter().enumerate() {
        core.set_target_position(*wp).unwrap();
        let mut leg_ticks = 0_u64;
        loop {
            let forces = *core.step(dt, &snap);
            // integrate
            let mut force = Vector3::zeros();
            let mut torque = Vector3::zeros();
            for (i, &f) in forces.iter().enumerate() {
                force += core.layout().thrusters()[i].force(f);
                torque += core.layout().thrusters()[i].torque(f);
            }
            snap.vel += snap.quat * force / mass * dt;
            snap.pos += snap.vel * dt;
            let mut omega_local = snap.quat.inverse() * snap.omega;
            omega_local += torque.component_div(&inertia) * dt;
            snap.omega = snap.quat * omega_local;
            snap.quat = snap.quat * UnitQuaternion::from_scaled_axis(omega_local * dt);

            leg_ticks += 1;
            elapsed += dt;
            let dist = (wp - snap.pos).norm();
            let arrived = dist < 0.3 && snap.vel.norm() < 0.15;
            if arrived || leg_ticks > 60_000 {
                println!(
                    "leg {} done at t={:6.1} s, dist {:.2} m, speed {:.3} m/s",
                    leg,
                    elapsed,
                    dist,
                    snap.vel.norm()
                );
                break;
            }
        }
    }

    let t = core.telemetry().translation;
    println!(
        "Docked: dist {:.2} m, braking={}, gated={}",
        t.distance, t.braking, t.alignment_gated
    );
}
