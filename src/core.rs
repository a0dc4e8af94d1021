use std::cell::RefCell;
use std::rc::Weak;

use nalgebra::{UnitQuaternion, Vector3};
use rand::Rng;
use tracing::{debug, warn};

use crate::config::{Gains, GncConfig};
use crate::control::allocator::ThrusterAllocator;
use crate::control::manager::{ModeKind, ModeManager, ModeObserver, ModeSet};
use crate::control::modes::{
    CancelLinearMotion, CancelRotation, GoToPosition, OrientationMatch, PointToPosition,
    StepInputs,
};
use crate::control::pid::{PidController, PidDomain};
use crate::control::tuner::{AutoTuner, TuneDomain, TuneReport};
use crate::craft::capability::CapabilityModel;
use crate::craft::thrusters::{RcsLayout, Thruster, THRUSTER_COUNT};
use crate::error::GncError;
use crate::state::Snapshot;
use crate::telemetry::Telemetry;

// ---------------------------------------------------------------------------
// External collaborators
// ---------------------------------------------------------------------------

/// Docking ports a target body exposes along its local z axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DockPort {
    #[default]
    Center,
    Front,
    Back,
}

/// A body the core can track as a target or as a moving reference frame.
///
/// Held as a weak handle; when the owner drops it, tracking silently skips
/// for the tick.
pub trait ReferenceBody {
    fn position(&self) -> Vector3<f64>;
    fn orientation(&self) -> UnitQuaternion<f64>;
    fn velocity(&self) -> Vector3<f64>;
    /// World position of the given docking port.
    fn port_position(&self, port: DockPort) -> Vector3<f64>;
}

pub type BodyHandle = Weak<RefCell<dyn ReferenceBody>>;

/// Plain kinematic body, sufficient for tests, demos, and the worker adapter.
#[derive(Debug, Clone, Copy)]
pub struct BodyState {
    pub pos: Vector3<f64>,
    pub quat: UnitQuaternion<f64>,
    pub vel: Vector3<f64>,
    /// Distance from the center to the fore/aft docking ports, m.
    pub port_offset: f64,
}

impl Default for BodyState {
    fn default() -> Self {
        Self {
            pos: Vector3::zeros(),
            quat: UnitQuaternion::identity(),
            vel: Vector3::zeros(),
            port_offset: 1.0,
        }
    }
}

impl ReferenceBody for BodyState {
    fn position(&self) -> Vector3<f64> {
        self.pos
    }

    fn orientation(&self) -> UnitQuaternion<f64> {
        self.quat
    }

    fn velocity(&self) -> Vector3<f64> {
        self.vel
    }

    fn port_position(&self, port: DockPort) -> Vector3<f64> {
        match port {
            DockPort::Center => self.pos,
            DockPort::Front => self.pos + self.quat * (Vector3::z() * self.port_offset),
            DockPort::Back => self.pos - self.quat * (Vector3::z() * self.port_offset),
        }
    }
}

// ---------------------------------------------------------------------------
// The GNC core
// ---------------------------------------------------------------------------

pub(crate) struct Pids {
    pub orientation: PidController,
    pub position: PidController,
    pub momentum: PidController,
}

pub(crate) struct Modes {
    pub cancel_rotation: CancelRotation,
    pub cancel_linear: CancelLinearMotion,
    pub point_to_position: PointToPosition,
    pub orientation_match: OrientationMatch,
    pub go_to_position: GoToPosition,
}

/// Real-time controller for one craft: owns the modes, PIDs, allocator,
/// capability model, and the 24-entry output buffer.
///
/// Driven externally: the scheduler calls [`GncCore::step`] with `dt` and a
/// state snapshot; recomputation happens at the configured rate, and between
/// recomputes the previous buffer is returned unchanged. The step path
/// performs no heap allocation.
pub struct GncCore {
    config: GncConfig,
    layout: RcsLayout,
    capability: CapabilityModel,
    pub(crate) pids: Pids,
    allocator: ThrusterAllocator,
    pub(crate) manager: ModeManager,
    modes: Modes,
    output: [f64; THRUSTER_COUNT],
    telemetry: Telemetry,

    target_pos: Vector3<f64>,
    target_quat: UnitQuaternion<f64>,
    target: Option<BodyHandle>,
    target_port: DockPort,
    reference: Option<BodyHandle>,
    ref_vel: Vector3<f64>,

    enabled: bool,
    time_since_update: f64,
    tuning: bool,
    tune_observer: Option<Box<dyn FnMut(&TuneReport)>>,
}

impl GncCore {
    /// Build a core for a craft of the given mass and box dimensions.
    /// Rejects degenerate mass properties, layouts, and schedules.
    pub fn new(
        mass: f64,
        dims: Vector3<f64>,
        layout: RcsLayout,
        config: GncConfig,
    ) -> Result<Self, GncError> {
        config.scheduling.validate()?;
        let capability = CapabilityModel::new(mass, dims)?;
        let pids = Pids {
            orientation: PidController::from_gains(config.pid.orientation, PidDomain::AngularMomentum),
            position: PidController::from_gains(config.pid.position, PidDomain::Position),
            momentum: PidController::from_gains(config.pid.momentum, PidDomain::LinearMomentum),
        };
        // Randomized initial phase so a fleet of cores does not recompute on
        // the same frame.
        let time_since_update = rand::rng().random_range(0.0..config.scheduling.period());
        Ok(Self {
            config,
            layout,
            capability,
            pids,
            allocator: ThrusterAllocator::new(),
            manager: ModeManager::new(),
            modes: Modes {
                cancel_rotation: CancelRotation,
                cancel_linear: CancelLinearMotion,
                point_to_position: PointToPosition::default(),
                orientation_match: OrientationMatch::default(),
                go_to_position: GoToPosition::default(),
            },
            output: [0.0; THRUSTER_COUNT],
            telemetry: Telemetry::default(),
            target_pos: Vector3::zeros(),
            target_quat: UnitQuaternion::identity(),
            target: None,
            target_port: DockPort::Center,
            reference: None,
            ref_vel: Vector3::zeros(),
            enabled: true,
            time_since_update,
            tuning: false,
            tune_observer: None,
        })
    }

    // -- step -----------------------------------------------------------

    /// Advance the controller. Total: always returns the output buffer.
    /// Callers must not retain the returned slice across ticks.
    pub fn step(&mut self, dt: f64, snapshot: &Snapshot) -> &[f64; THRUSTER_COUNT] {
        if !self.enabled || !dt.is_finite() || dt <= 0.0 || !snapshot.is_finite() {
            return &self.output;
        }

        self.time_since_update += dt;
        let period = self.config.scheduling.period();
        if self.time_since_update < period {
            return &self.output;
        }
        let step_dt = self.time_since_update;
        self.time_since_update = 0.0;

        self.refresh_targets();

        let caps = *self.capability.capabilities(&self.layout);
        let mass = self.capability.mass();
        let active = self.manager.active();

        self.output = [0.0; THRUSTER_COUNT];

        let inputs = StepInputs {
            dt: step_dt,
            snapshot,
            config: &self.config,
            layout: &self.layout,
            caps: &caps,
            mass,
            target_pos: self.target_pos,
            target_quat: self.target_quat,
            ref_vel: self.ref_vel,
        };

        // Rotational contribution first, then translational.
        match active.active_rotational() {
            Some(ModeKind::CancelRotation) => self.modes.cancel_rotation.step(
                &inputs,
                &mut self.pids.orientation,
                &mut self.allocator,
                &mut self.output,
                &mut self.telemetry.attitude,
            ),
            Some(ModeKind::PointToPosition) => {
                if let Some(published) = self.modes.point_to_position.step(
                    &inputs,
                    &mut self.pids.orientation,
                    &mut self.allocator,
                    &mut self.output,
                    &mut self.telemetry.attitude,
                ) {
                    // live target attitude, e.g. for a pointing indicator
                    self.target_quat = published;
                }
            }
            Some(ModeKind::OrientationMatch) => self.modes.orientation_match.step(
                &inputs,
                &mut self.pids.orientation,
                &mut self.allocator,
                &mut self.output,
                &mut self.telemetry.attitude,
            ),
            _ => {}
        }

        match active.active_translational() {
            Some(ModeKind::CancelLinearMotion) => self.modes.cancel_linear.step(
                &inputs,
                &mut self.pids.momentum,
                &mut self.allocator,
                &mut self.output,
                &mut self.telemetry.translation,
            ),
            Some(ModeKind::GoToPosition) => self.modes.go_to_position.step(
                &inputs,
                &mut self.allocator,
                &mut self.output,
                &mut self.telemetry.translation,
            ),
            _ => {}
        }

        &self.output
    }

    fn refresh_targets(&mut self) {
        if let Some(handle) = &self.reference {
            // failed deref: reference frame treated as inertial for the tick
            self.ref_vel = match handle.upgrade() {
                Some(body) => body.borrow().velocity(),
                None => Vector3::zeros(),
            };
        } else {
            self.ref_vel = Vector3::zeros();
        }

        if let Some(handle) = &self.target {
            if let Some(body) = handle.upgrade() {
                let body = body.borrow();
                self.target_pos = body.port_position(self.target_port);
                self.target_quat = body.orientation();
            }
            // failed deref: keep the last known target for the tick
        }
    }

    // -- targeting ------------------------------------------------------

    pub fn set_target_position(&mut self, pos: Vector3<f64>) -> Result<(), GncError> {
        if !pos.iter().all(|v| v.is_finite()) {
            return Err(GncError::NonFinite("target position"));
        }
        self.target_pos = pos;
        Ok(())
    }

    pub fn set_target_orientation(&mut self, quat: UnitQuaternion<f64>) {
        self.target_quat = quat;
    }

    /// Track a body; `Front`/`Back` follow its docking ports, `Center` its
    /// origin. The orientation target always follows the body.
    pub fn set_target_object(&mut self, target: BodyHandle, port: DockPort) {
        self.target = Some(target);
        self.target_port = port;
    }

    pub fn clear_target_object(&mut self) {
        self.target = None;
    }

    /// Supply the moving frame velocities are measured against.
    pub fn set_reference_object(&mut self, reference: Option<BodyHandle>) {
        self.reference = reference;
    }

    pub(crate) fn take_reference(&mut self) -> Option<BodyHandle> {
        self.ref_vel = Vector3::zeros();
        self.reference.take()
    }

    pub fn target_position(&self) -> Vector3<f64> {
        self.target_pos
    }

    pub fn target_orientation(&self) -> UnitQuaternion<f64> {
        self.target_quat
    }

    // -- modes ----------------------------------------------------------

    pub fn set_mode(&mut self, mode: ModeKind, on: bool) {
        if on && self.config.auto_tune && !self.tuning {
            let domain = match mode {
                ModeKind::OrientationMatch | ModeKind::PointToPosition => TuneDomain::Attitude,
                ModeKind::CancelRotation => TuneDomain::RotCancel,
                ModeKind::GoToPosition => TuneDomain::Position,
                ModeKind::CancelLinearMotion => TuneDomain::LinMomentum,
            };
            self.auto_tune(domain);
        }
        self.manager.enable(mode, on);
        if !on {
            self.reset_mode_state(mode);
        }
    }

    pub(crate) fn reset_mode_state(&mut self, mode: ModeKind) {
        match mode {
            ModeKind::CancelRotation => self.modes.cancel_rotation.reset(),
            ModeKind::PointToPosition => self.modes.point_to_position.reset(),
            ModeKind::OrientationMatch => self.modes.orientation_match.reset(),
            ModeKind::CancelLinearMotion => self.modes.cancel_linear.reset(),
            ModeKind::GoToPosition => self.modes.go_to_position.reset(),
        }
        if mode.is_rotational() {
            self.pids.orientation.reset();
            self.pids.orientation.stop_calibration();
            self.allocator.reset_rotation();
        } else {
            match mode {
                ModeKind::CancelLinearMotion => {
                    self.pids.momentum.reset();
                    self.pids.momentum.stop_calibration();
                }
                _ => {
                    self.pids.position.reset();
                    self.pids.position.stop_calibration();
                }
            }
            self.allocator.reset_translation();
        }
    }

    pub fn active_modes(&self) -> ModeSet {
        self.manager.active()
    }

    pub fn set_mode_observer(&mut self, observer: Option<Box<dyn ModeObserver>>) {
        self.manager.set_observer(observer);
    }

    pub fn set_enabled(&mut self, on: bool) {
        self.enabled = on;
        if !on {
            self.output = [0.0; THRUSTER_COUNT];
            self.allocator.reset();
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    // -- configuration and geometry -------------------------------------

    pub fn set_update_rate_hz(&mut self, hz: f64) -> Result<(), GncError> {
        let candidate = crate::config::Scheduling { update_hz: hz };
        candidate.validate()?;
        self.config.scheduling = candidate;
        Ok(())
    }

    pub fn set_orientation_gains(&mut self, g: Gains) {
        self.config.pid.orientation = g;
        self.pids.orientation.set_gains(g);
    }

    pub fn set_position_gains(&mut self, g: Gains) {
        self.config.pid.position = g;
        self.pids.position.set_gains(g);
    }

    pub fn set_momentum_gains(&mut self, g: Gains) {
        self.config.pid.momentum = g;
        self.pids.momentum.set_gains(g);
    }

    pub fn set_mass(&mut self, mass: f64) -> Result<(), GncError> {
        self.capability.set_mass(mass)
    }

    pub fn set_dimensions(&mut self, dims: Vector3<f64>) -> Result<(), GncError> {
        self.capability.set_dimensions(dims)
    }

    pub fn set_base_thrust(&mut self, v: f64) -> Result<(), GncError> {
        self.layout.set_base_thrust(v)?;
        self.capability.invalidate();
        Ok(())
    }

    pub fn set_thruster_capacities(&mut self, caps: Vec<f64>) -> Result<(), GncError> {
        self.layout.set_capacities(caps)?;
        self.capability.invalidate();
        Ok(())
    }

    pub fn set_thrusters(&mut self, thrusters: Vec<Thruster>) -> Result<(), GncError> {
        self.layout.set_thrusters(thrusters)?;
        self.capability.invalidate();
        Ok(())
    }

    pub fn config(&self) -> &GncConfig {
        &self.config
    }

    pub fn layout(&self) -> &RcsLayout {
        &self.layout
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn mass(&self) -> f64 {
        self.capability.mass()
    }

    pub fn dimensions(&self) -> Vector3<f64> {
        self.capability.dims()
    }

    // -- tuning ---------------------------------------------------------

    /// Observer for tuning outcomes, including failed fits.
    pub fn set_tune_observer(&mut self, observer: Option<Box<dyn FnMut(&TuneReport)>>) {
        self.tune_observer = observer;
    }

    /// Run the auto-tuner for one domain. Mode activations, the enabled
    /// flag, and targets are restored on every exit path.
    pub fn auto_tune(&mut self, domain: TuneDomain) -> TuneReport {
        if self.tuning {
            warn!(?domain, "auto-tune requested while already tuning, skipped");
            return TuneReport::skipped(domain);
        }
        self.tuning = true;
        let report = AutoTuner::new().run(self, domain);
        self.tuning = false;
        debug!(?domain, tau = report.tau, "auto-tune finished");
        if let Some(obs) = &mut self.tune_observer {
            obs(&report);
        }
        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
