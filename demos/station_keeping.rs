use nalgebra::{UnitQuaternion, Vector3};

use rcs_autopilot::craft::box_layout;
use rcs_autopilot::{GncConfig, GncCore, ModeKind, Snapshot};

/// Minimal rigid-body integrator standing in for the host physics engine.
struct Craft {
    snap: Snapshot,
    mass: f64,
    inertia: Vector3<f64>,
}

impl Craft {
    fn integrate(&mut self, core: &GncCore, forces: &[f64; 24], dt: f64) {
        let mut force = Vector3::zeros();
        let mut torque = Vector3::zeros();
        for (i, &f) in forces.iter().enumerate() {
            force += core.layout().thrusters()[i].force(f);
            torque += core.layout().thrusters()[i].torque(f);
        }
        self.snap.vel += self.snap.quat * force / self.mass * dt;
        self.snap.pos += self.snap.vel * dt;
        let mut omega_local = self.snap.quat.inverse() * self.snap.omega;
        omega_local += torque.component_div(&self.inertia) * dt;
        self.snap.omega = self.snap.quat * omega_local;
        self.snap.quat = self.snap.quat * UnitQuaternion::from_scaled_axis(omega_local * dt);
    }
}

fn main() {
    let dims = Vector3::new(1.0, 1.0, 2.0);
    let mass = 10.0;
    let layout = box_layout(dims.x, dims.y, dims.z, 2.0).unwrap();
    let mut core = GncCore::new(mass, dims, layout, GncConfig::default()).unwrap();

    // tumbling and drifting
    let mut craft = Craft {
        snap: Snapshot::at_rest(),
        mass,
        inertia: Vector3::new(
            mass / 12.0 * (dims.y * dims.y + dims.z * dims.z),
            mass / 12.0 * (dims.x * dims.x + dims.z * dims.z),
            mass / 12.0 * (dims.x * dims.x + dims.y * dims.y),
        ),
    };
    craft.snap.omega = Vector3::new(0.1, 0.4, -0.2);
    craft.snap.vel = Vector3::new(0.5, -0.3, 1.0);

    core.set_mode(ModeKind::CancelRotation, true);
    core.set_mode(ModeKind::CancelLinearMotion, true);

    println!("Station keeping: killing tumble and drift...");
    let dt = 1.0 / 60.0;
    for tick in 0..3000 {
        let forces = *core.step(dt, &craft.snap);
        craft.integrate(&core, &forces, dt);
        if tick % 600 == 0 {
            println!(
                "t={:5.1} s  |omega|={:.4} rad/s  |v|={:.4} m/s",
                tick as f64 * dt,
                craft.snap.omega.norm(),
                craft.snap.vel.norm()
            );
        }
    }
    println!(
        "Final: |omega|={:.5} rad/s, |v|={:.5} m/s",
        craft.snap.omega.norm(),
        craft.snap.vel.norm()
    );
}
