use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use tracing::{info, warn};

use crate::config::{Gains, GncConfig};
use crate::control::manager::{ModeKind, ModeSet};
use crate::control::tuner::TuneDomain;
use crate::core::{BodyState, GncCore, ReferenceBody};
use crate::craft::thrusters::{box_layout, Thruster, THRUSTER_COUNT};
use crate::planner::{Obstacle, PathPlanner};
use crate::state::Snapshot;
use crate::telemetry::Telemetry;

// ---------------------------------------------------------------------------
// Off-thread hosting
// ---------------------------------------------------------------------------

/// Inbound commands for a hosted core.
#[derive(Debug, Clone)]
pub enum WorkerCommand {
    /// Create the core. Until this arrives, update commands are dropped.
    Init {
        mass: f64,
        dims: [f64; 3],
        base_thrust: f64,
        config: GncConfig,
    },
    /// One host frame: snapshot, desired activations, and targets.
    Update {
        dt: f64,
        pos: [f64; 3],
        quat: [f64; 4],
        vel: [f64; 3],
        omega: [f64; 3],
        active: ModeSet,
        target_pos: [f64; 3],
        target_quat: [f64; 4],
        ref_vel: [f64; 3],
    },
    SetGains {
        orientation: Gains,
        position: Gains,
        momentum: Gains,
    },
    SetThrusters(Vec<Thruster>),
    SetThrusterCapacities(Vec<f64>),
    SetThrust(f64),
    Calibrate(Vec<TuneDomain>),
    PlanPath {
        id: u32,
        start: [f64; 3],
        goal: [f64; 3],
        obstacles: Vec<Obstacle>,
    },
    Shutdown,
}

/// Outbound events. Force and waypoint payloads are `f32`: transport width,
/// not computation width.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Ready,
    Forces {
        forces: [f32; THRUSTER_COUNT],
        telemetry: Telemetry,
    },
    PlanPathResult {
        id: u32,
        waypoints: Vec<[f32; 3]>,
    },
}

/// Handle to a core running on its own thread.
///
/// The worker owns its `GncCore` outright and performs no physics: the craft
/// adapter it registers as the core's reference frame is fed solely from
/// inbound updates.
pub struct GncWorker {
    tx: Sender<WorkerCommand>,
    rx: Receiver<WorkerEvent>,
    handle: Option<JoinHandle<()>>,
}

impl GncWorker {
    pub fn spawn() -> std::io::Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (evt_tx, evt_rx) = mpsc::channel();
        let handle = std::thread::Builder::new()
            .name("gnc-worker".into())
            .spawn(move || worker_loop(cmd_rx, evt_tx))?;
        Ok(Self { tx: cmd_tx, rx: evt_rx, handle: Some(handle) })
    }

    pub fn send(&self, cmd: WorkerCommand) {
        // a dead worker just drops commands; events() going silent is the signal
        let _ = self.tx.send(cmd);
    }

    pub fn events(&self) -> &Receiver<WorkerEvent> {
        &self.rx
    }
}

impl Drop for GncWorker {
    fn drop(&mut self) {
        let _ = self.tx.send(WorkerCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn worker_loop(rx: Receiver<WorkerCommand>, tx: Sender<WorkerEvent>) {
    let mut core: Option<GncCore> = None;
    let adapter = Rc::new(RefCell::new(BodyState::default()));
    let adapter_body: Rc<RefCell<dyn ReferenceBody>> = adapter.clone();
    let planner = PathPlanner::default();
    let mut last_forces = [0.0_f32; THRUSTER_COUNT];

    for cmd in rx.iter() {
        match cmd {
            WorkerCommand::Init { mass, dims, base_thrust, config } => {
                let built = box_layout(dims[0], dims[1], dims[2], base_thrust)
                    .and_then(|layout| GncCore::new(mass, Vector3::from(dims), layout, config));
                match built {
                    Ok(mut c) => {
                        c.set_reference_object(Some(Rc::downgrade(&adapter_body)));
                        core = Some(c);
                        info!("gnc worker initialized");
                        let _ = tx.send(WorkerEvent::Ready);
                    }
                    Err(e) => warn!(error = %e, "worker init rejected"),
                }
            }
            WorkerCommand::Update {
                dt,
                pos,
                quat,
                vel,
                omega,
                active,
                target_pos,
                target_quat,
                ref_vel,
            } => {
                let Some(core) = core.as_mut() else { continue };
                adapter.borrow_mut().vel = Vector3::from(ref_vel);

                sync_modes(core, active);
                if core.set_target_position(Vector3::from(target_pos)).is_err() {
                    warn!("non-finite target position dropped");
                }
                let tq = Quaternion::new(target_quat[3], target_quat[0], target_quat[1], target_quat[2]);
                if tq.norm() > 1e-9 && tq.coords.iter().all(|v| v.is_finite()) {
                    core.set_target_orientation(UnitQuaternion::new_normalize(tq));
                }

                match Snapshot::from_raw(pos, quat, vel, omega) {
                    Ok(snapshot) => {
                        let forces = core.step(dt, &snapshot);
                        for (dst, &src) in last_forces.iter_mut().zip(forces.iter()) {
                            *dst = src as f32;
                        }
                    }
                    Err(e) => warn!(error = %e, "snapshot rejected, resending last forces"),
                }
                let _ = tx.send(WorkerEvent::Forces {
                    forces: last_forces,
                    telemetry: *core.telemetry(),
                });
            }
            WorkerCommand::SetGains { orientation, position, momentum } => {
                if let Some(core) = core.as_mut() {
                    core.set_orientation_gains(orientation);
                    core.set_position_gains(position);
                    core.set_momentum_gains(momentum);
                }
            }
            WorkerCommand::SetThrusters(thrusters) => {
                if let Some(core) = core.as_mut() {
                    if let Err(e) = core.set_thrusters(thrusters) {
                        warn!(error = %e, "thruster geometry rejected");
                    }
                }
            }
            WorkerCommand::SetThrusterCapacities(caps) => {
                if let Some(core) = core.as_mut() {
                    if let Err(e) = core.set_thruster_capacities(caps) {
                        warn!(error = %e, "capacity table rejected");
                    }
                }
            }
            WorkerCommand::SetThrust(v) => {
                if let Some(core) = core.as_mut() {
                    if let Err(e) = core.set_base_thrust(v) {
                        warn!(error = %e, "base thrust rejected");
                    }
                }
            }
            WorkerCommand::Calibrate(domains) => {
                if let Some(core) = core.as_mut() {
                    for domain in domains {
                        let report = core.auto_tune(domain);
                        info!(?domain, tau = report.tau, fitted = report.fitted, "calibrated");
                    }
                }
            }
            WorkerCommand::PlanPath { id, start, goal, obstacles } => {
                let path =
                    planner.plan(Vector3::from(start), Vector3::from(goal), &obstacles);
                let waypoints = path
                    .iter()
                    .map(|p| [p.x as f32, p.y as f32, p.z as f32])
                    .collect();
                let _ = tx.send(WorkerEvent::PlanPathResult { id, waypoints });
            }
            WorkerCommand::Shutdown => break,
        }
    }
}

fn sync_modes(core: &mut GncCore, requested: ModeSet) {
    const ALL: [ModeKind; 5] = [
        ModeKind::OrientationMatch,
        ModeKind::CancelRotation,
        ModeKind::PointToPosition,
        ModeKind::CancelLinearMotion,
        ModeKind::GoToPosition,
    ];
    // disables first so group exclusivity never churns a mode we keep
    for kind in ALL {
        if core.active_modes().get(kind) && !requested.get(kind) {
            core.set_mode(kind, false);
        }
    }
    for kind in ALL {
        if !core.active_modes().get(kind) && requested.get(kind) {
            core.set_mode(kind, true);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
