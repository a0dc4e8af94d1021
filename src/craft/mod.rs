pub mod capability;
pub mod thrusters;

pub use capability::{Capabilities, CapabilityModel};
pub use thrusters::{box_layout, RcsLayout, Thruster, ThrusterGroups, THRUSTER_COUNT};
