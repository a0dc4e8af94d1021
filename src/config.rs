use serde::{Deserialize, Serialize};

use crate::error::GncError;

// ---------------------------------------------------------------------------
// Controller configuration
// ---------------------------------------------------------------------------

/// Full configuration of the GNC core.
///
/// Every field has a serde default so partial documents parse; a config built
/// from `{}` equals `GncConfig::default()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GncConfig {
    pub pid: PidConfig,
    pub limits: Limits,
    pub damping: Damping,
    pub scheduling: Scheduling,
    /// Run the auto-tuner when a mode is first enabled.
    pub auto_tune: bool,
}

impl Default for GncConfig {
    fn default() -> Self {
        Self {
            pid: PidConfig::default(),
            limits: Limits::default(),
            damping: Damping::default(),
            scheduling: Scheduling::default(),
            auto_tune: false,
        }
    }
}

/// Gains for one three-term controller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Gains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl Default for Gains {
    fn default() -> Self {
        Self { kp: 1.0, ki: 0.0, kd: 0.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PidConfig {
    /// Attitude and rotation-cancel controllers (angular-momentum domain).
    pub orientation: Gains,
    /// Go-to-position controller (position domain).
    pub position: Gains,
    /// Cancel-linear-motion controller (linear-momentum domain).
    pub momentum: Gains,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            orientation: Gains { kp: 3.0, ki: 0.0, kd: 1.0 },
            position: Gains { kp: 2.0, ki: 0.0, kd: 0.8 },
            momentum: Gains { kp: 4.0, ki: 0.0, kd: 0.5 },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Upper bound on commanded |F_local| per axis per step, N.
    pub max_force: f64,
    /// Chatter threshold; the allocator zeroes any axis at or below 2x this.
    pub epsilon: f64,
    /// Clamp for rotational momentum error, N·m·s.
    pub max_angular_momentum: f64,
    /// Per-step impulse bound: |F|·dt never exceeds this, kg·m/s.
    pub max_linear_momentum: f64,
    /// Upper bound on guidance angular rate, rad/s.
    pub max_angular_velocity: f64,
    /// Upper bound on guidance angular acceleration, rad/s².
    pub max_angular_acceleration: f64,
    /// Optional cap on relative speed in translational guidance, m/s.
    pub max_linear_velocity: Option<f64>,
    /// Optional cap on commanded linear acceleration, m/s².
    pub max_linear_acceleration: Option<f64>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_force: 120.0,
            epsilon: 0.01,
            max_angular_momentum: 5.0,
            max_linear_momentum: 50.0,
            max_angular_velocity: 0.8,
            max_angular_acceleration: 2.0,
            max_linear_velocity: None,
            max_linear_acceleration: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Damping {
    /// Proportional pre-gain on velocity error in cancel-linear-motion and
    /// on the near-target damping term in go-to-position.
    pub factor: f64,
}

impl Default for Damping {
    fn default() -> Self {
        Self { factor: 1.2 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Scheduling {
    /// Controller recompute rate, Hz. Valid range 5..=120.
    pub update_hz: f64,
}

impl Default for Scheduling {
    fn default() -> Self {
        Self { update_hz: 30.0 }
    }
}

impl Scheduling {
    pub fn validate(&self) -> Result<(), GncError> {
        if !(5.0..=120.0).contains(&self.update_hz) || !self.update_hz.is_finite() {
            return Err(GncError::InvalidUpdateRate(self.update_hz));
        }
        Ok(())
    }

    pub fn period(&self) -> f64 {
        1.0 / self.update_hz
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_parses_to_defaults() {
        let cfg: GncConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.scheduling.update_hz, 30.0);
        assert_eq!(cfg.limits.max_force, 120.0);
        assert!(!cfg.auto_tune);
    }

    #[test]
    fn partial_document_overrides_one_field() {
        let cfg: GncConfig =
            serde_json::from_str(r#"{"limits": {"epsilon": 0.05}, "scheduling": {"update_hz": 60}}"#)
                .unwrap();
        assert_eq!(cfg.limits.epsilon, 0.05);
        assert_eq!(cfg.scheduling.update_hz, 60.0);
        // untouched fields keep defaults
        assert_eq!(cfg.limits.max_angular_momentum, 5.0);
    }

    #[test]
    fn update_rate_range_enforced() {
        let s = Scheduling { update_hz: 240.0 };
        assert!(s.validate().is_err());
        let s = Scheduling { update_hz: 30.0 };
        assert!(s.validate().is_ok());
    }
}
