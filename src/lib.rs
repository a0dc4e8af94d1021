pub mod config;
pub mod control;
pub mod core;
pub mod craft;
pub mod error;
pub mod planner;
pub mod state;
pub mod telemetry;
pub mod worker;

// Flat re-exports for the common entry points
pub use crate::config::{Damping, Gains, GncConfig, Limits, PidConfig, Scheduling};
pub use crate::control::{
    AutoTuner, ModeKind, ModeManager, ModeObserver, ModeSet, PidController, PidDomain,
    ThrusterAllocator, TuneDomain, TuneReport,
};
pub use crate::core::{BodyHandle, BodyState, DockPort, GncCore, ReferenceBody};
pub use crate::craft::{box_layout, Capabilities, CapabilityModel, RcsLayout, Thruster, THRUSTER_COUNT};
pub use crate::error::GncError;
pub use crate::planner::{Obstacle, PathPlanner};
pub use crate::state::Snapshot;
pub use crate::telemetry::{AttitudeTelemetry, Telemetry, TranslationTelemetry};
pub use crate::worker::{GncWorker, WorkerCommand, WorkerEvent};
