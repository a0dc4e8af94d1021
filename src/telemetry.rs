// ---------------------------------------------------------------------------
// Telemetry side-channel
// ---------------------------------------------------------------------------

/// Attitude-channel telemetry, refreshed by the active rotational mode on
/// each recompute.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttitudeTelemetry {
    /// Pointing/attitude error, rad.
    pub angle: f64,
    /// Guidance angular acceleration cap, rad/s².
    pub alpha_max: f64,
    /// Guidance angular rate cap, rad/s.
    pub omega_max: f64,
    /// Effective inertia about the error axis, kg·m².
    pub effective_inertia: f64,
    /// Commanded rate along the error axis, rad/s.
    pub omega_desired: f64,
    /// Norm of the momentum error handed to the PID, N·m·s.
    pub momentum_error: f64,
    /// Hysteresis deadband engaged.
    pub deadband: bool,
}

/// Translation-channel telemetry, refreshed by the active translational mode
/// on each recompute.
#[derive(Debug, Clone, Copy, Default)]
pub struct TranslationTelemetry {
    /// Distance to target, m.
    pub distance: f64,
    /// Closing velocity along the line to target, m/s.
    pub along_velocity: f64,
    /// Stopping distance at current closing speed, m.
    pub stopping_distance: f64,
    /// Braking hysteresis engaged.
    pub braking: bool,
    /// Alignment gate engaged (thrust derated while pointed away).
    pub alignment_gated: bool,
    /// Within the terminal-approach region.
    pub approach: bool,
}

/// Combined telemetry exposed by the core.
#[derive(Debug, Clone, Copy, Default)]
pub struct Telemetry {
    pub attitude: AttitudeTelemetry,
    pub translation: TranslationTelemetry,
}
