use nalgebra::Vector3;

use crate::config::Limits;
use crate::craft::thrusters::RcsLayout;
use crate::error::GncError;

// Floor used wherever a derived quantity is divided by mass or inertia.
const DIV_EPS: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Derived per-axis capabilities
// ---------------------------------------------------------------------------

/// Per-axis force, torque, acceleration, and inertia authority of the craft,
/// derived from mass properties and the thruster layout.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    /// Max deliverable force per body axis, N (best of the two signed groups).
    pub lin_force: Vector3<f64>,
    /// lin_force / mass, m/s².
    pub lin_accel: Vector3<f64>,
    /// Principal moments of inertia of the box, kg·m².
    pub inertia: Vector3<f64>,
    /// Max deliverable torque per body axis, N·m.
    pub ang_torque: Vector3<f64>,
    /// ang_torque / inertia, rad/s².
    pub ang_accel: Vector3<f64>,
}

impl Capabilities {
    /// Conservative acceleration available along a body-frame direction:
    /// L1 projection onto the per-axis caps.
    pub fn linear_accel_along(&self, dir_local: &Vector3<f64>) -> f64 {
        dir_local.x.abs() * self.lin_accel.x
            + dir_local.y.abs() * self.lin_accel.y
            + dir_local.z.abs() * self.lin_accel.z
    }

    /// Guidance caps `(alpha_max, omega_max)` derated from the weakest
    /// rotational axis and bounded by configured limits.
    pub fn angular_caps(&self, limits: &Limits) -> (f64, f64) {
        let weakest = self.ang_accel.x.min(self.ang_accel.y).min(self.ang_accel.z);
        let alpha_max = limits.max_angular_acceleration.min(0.6 * weakest);
        let omega_max = limits
            .max_angular_velocity
            .min((2.0 * alpha_max * 0.5).sqrt().max(0.2));
        (alpha_max, omega_max)
    }

    /// Second moment of the body resisting rotation about a unit axis:
    /// `sum(I_i * a_i^2)`.
    pub fn effective_inertia_along(&self, axis: &Vector3<f64>) -> f64 {
        self.inertia.x * axis.x * axis.x
            + self.inertia.y * axis.y * axis.y
            + self.inertia.z * axis.z * axis.z
    }
}

// ---------------------------------------------------------------------------
// Capability model with signature cache
// ---------------------------------------------------------------------------

/// Owns mass properties and caches the derived [`Capabilities`].
///
/// The cache key is a string signature over mass, dimensions, base thrust,
/// and a geometry/capacity digest, all rounded to three decimals. Mutators
/// mark the model dirty; a recompute that lands on an identical signature
/// reuses the cached values.
#[derive(Debug, Clone)]
pub struct CapabilityModel {
    mass: f64,
    dims: Vector3<f64>,
    cache: Option<(String, Capabilities)>,
    dirty: bool,
}

impl CapabilityModel {
    pub fn new(mass: f64, dims: Vector3<f64>) -> Result<Self, GncError> {
        if !mass.is_finite() || mass <= 0.0 {
            return Err(GncError::InvalidMass(mass));
        }
        if !dims.iter().all(|v| v.is_finite() && *v > 0.0) {
            return Err(GncError::InvalidDimensions(dims.x, dims.y, dims.z));
        }
        Ok(Self { mass, dims, cache: None, dirty: true })
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn dims(&self) -> Vector3<f64> {
        self.dims
    }

    pub fn set_mass(&mut self, mass: f64) -> Result<(), GncError> {
        if !mass.is_finite() || mass <= 0.0 {
            return Err(GncError::InvalidMass(mass));
        }
        self.mass = mass;
        self.dirty = true;
        Ok(())
    }

    pub fn set_dimensions(&mut self, dims: Vector3<f64>) -> Result<(), GncError> {
        if !dims.iter().all(|v| v.is_finite() && *v > 0.0) {
            return Err(GncError::InvalidDimensions(dims.x, dims.y, dims.z));
        }
        self.dims = dims;
        self.dirty = true;
        Ok(())
    }

    /// Mark the cache stale after an external layout mutation (geometry,
    /// capacities, or base thrust).
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    /// Current capabilities, recomputing only when marked dirty.
    /// The steady-state path performs no allocation.
    pub fn capabilities(&mut self, layout: &RcsLayout) -> &Capabilities {
        if self.dirty {
            let sig = self.signature(layout);
            let stale = match &self.cache {
                Some((key, _)) => *key != sig,
                None => true,
            };
            if stale {
                let caps = self.compute(layout);
                self.cache = Some((sig, caps));
            }
            self.dirty = false;
        }
        &self.cache.as_ref().expect("cache populated above").1
    }

    fn signature(&self, layout: &RcsLayout) -> String {
        let geom: f64 = layout
            .thrusters()
            .iter()
            .map(|t| t.position.sum() + t.direction.sum())
            .sum();
        let caps: f64 = layout.capacities().iter().sum();
        format!(
            "{:.3}|{:.3},{:.3},{:.3}|{:.3}|{:.3}|{:.3}",
            self.mass,
            self.dims.x,
            self.dims.y,
            self.dims.z,
            layout.base_thrust(),
            caps,
            geom,
        )
    }

    fn compute(&self, layout: &RcsLayout) -> Capabilities {
        let g = layout.groups();

        let lin_force = Vector3::new(
            layout.group_capacity(&g.left[0]).max(layout.group_capacity(&g.left[1])),
            layout.group_capacity(&g.up[0]).max(layout.group_capacity(&g.up[1])),
            layout
                .group_capacity(&g.forward[0])
                .max(layout.group_capacity(&g.forward[1])),
        );
        let lin_accel = lin_force / self.mass.max(DIV_EPS);

        // Box principal inertias, I_x = m/12 * (h^2 + d^2) and permutations.
        let (w, h, d) = (self.dims.x, self.dims.y, self.dims.z);
        let k = self.mass / 12.0;
        let inertia = Vector3::new(
            k * (h * h + d * d),
            k * (w * w + d * d),
            k * (w * w + h * h),
        );

        let ang_torque = Vector3::new(
            layout
                .group_torque_about(&g.pitch[0], &Vector3::x())
                .max(layout.group_torque_about(&g.pitch[1], &Vector3::x())),
            layout
                .group_torque_about(&g.yaw[0], &Vector3::y())
                .max(layout.group_torque_about(&g.yaw[1], &Vector3::y())),
            layout
                .group_torque_about(&g.roll[0], &Vector3::z())
                .max(layout.group_torque_about(&g.roll[1], &Vector3::z())),
        );
        let ang_accel = Vector3::new(
            ang_torque.x / inertia.x.max(DIV_EPS),
            ang_torque.y / inertia.y.max(DIV_EPS),
            ang_torque.z / inertia.z.max(DIV_EPS),
        );

        Capabilities { lin_force, lin_accel, inertia, ang_torque, ang_accel }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
