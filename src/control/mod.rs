pub mod allocator;
pub mod manager;
pub mod modes;
pub mod pid;
pub mod tuner;

pub use allocator::ThrusterAllocator;
pub use manager::{ModeKind, ModeManager, ModeObserver, ModeSet};
pub use modes::{
    CancelLinearMotion, CancelRotation, GoToPosition, OrientationMatch, PointToPosition,
    StepInputs,
};
pub use pid::{PidController, PidDomain};
pub use tuner::{AutoTuner, TuneDomain, TuneReport};
