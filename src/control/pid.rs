use nalgebra::Vector3;

use crate::config::Gains;

// ---------------------------------------------------------------------------
// Vector PID controller
// ---------------------------------------------------------------------------

/// Error domain the controller operates in. Selects the default gains the
/// auto-tuner falls back to when a fit fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidDomain {
    Position,
    LinearMomentum,
    AngularMomentum,
}

impl PidDomain {
    /// Domain-default gains, used at construction and as the tuner fallback.
    pub fn default_gains(self) -> Gains {
        match self {
            PidDomain::Position => Gains { kp: 2.0, ki: 0.0, kd: 0.8 },
            PidDomain::LinearMomentum => Gains { kp: 4.0, ki: 0.0, kd: 0.5 },
            PidDomain::AngularMomentum => Gains { kp: 3.0, ki: 0.0, kd: 1.0 },
        }
    }
}

const CALIBRATION_CAPACITY: usize = 100;

/// Passive calibration observer: a bounded ring of `(t, |e|)` samples.
#[derive(Debug, Clone)]
struct Calibration {
    samples: Vec<(f64, f64)>,
    next: usize,
    elapsed: f64,
}

/// Three-term controller on a 3-vector error.
///
/// `update` returns `kp*e + ki*int(e) - kd*d_f` where `d_f` is a first-order
/// low-passed derivative. The integral is clamped by norm. Non-finite input
/// aborts the update and returns zero so a transient glitch cannot poison
/// the accumulated state.
#[derive(Debug, Clone)]
pub struct PidController {
    kp: f64,
    ki: f64,
    kd: f64,
    domain: PidDomain,
    integral: Vector3<f64>,
    last_error: Vector3<f64>,
    last_derivative: Vector3<f64>,
    max_integral: f64,
    derivative_alpha: f64,
    primed: bool,
    calibration: Option<Calibration>,
}

impl PidController {
    pub fn new(kp: f64, ki: f64, kd: f64, domain: PidDomain) -> Self {
        Self {
            kp,
            ki,
            kd,
            domain,
            integral: Vector3::zeros(),
            last_error: Vector3::zeros(),
            last_derivative: Vector3::zeros(),
            max_integral: 10.0,
            derivative_alpha: 0.7,
            primed: false,
            calibration: None,
        }
    }

    pub fn from_gains(g: Gains, domain: PidDomain) -> Self {
        Self::new(g.kp, g.ki, g.kd, domain)
    }

    pub fn domain(&self) -> PidDomain {
        self.domain
    }

    /// One controller step.
    pub fn update(&mut self, error: Vector3<f64>, dt: f64) -> Vector3<f64> {
        if !error.iter().all(|v| v.is_finite()) || !dt.is_finite() || dt <= 0.0 {
            return Vector3::zeros();
        }

        if let Some(cal) = &mut self.calibration {
            cal.elapsed += dt;
            let sample = (cal.elapsed, error.norm());
            if cal.samples.len() < CALIBRATION_CAPACITY {
                cal.samples.push(sample);
            } else {
                cal.samples[cal.next] = sample;
            }
            cal.next = (cal.next + 1) % CALIBRATION_CAPACITY;
        }

        self.integral += error * dt;
        let norm = self.integral.norm();
        if norm > self.max_integral {
            self.integral *= self.max_integral / norm;
        }

        // First call: no history, derivative defined as zero rather than a
        // spike against the implicit zero last-error.
        let derivative = if self.primed {
            let raw = (error - self.last_error) / dt;
            self.derivative_alpha * self.last_derivative + (1.0 - self.derivative_alpha) * raw
        } else {
            Vector3::zeros()
        };

        self.last_error = error;
        self.last_derivative = derivative;
        self.primed = true;

        self.kp * error + self.ki * self.integral - self.kd * derivative
    }

    /// Clear accumulated state (integral, error history, derivative filter).
    pub fn reset(&mut self) {
        self.integral = Vector3::zeros();
        self.last_error = Vector3::zeros();
        self.last_derivative = Vector3::zeros();
        self.primed = false;
    }

    pub fn set_gains(&mut self, g: Gains) {
        self.kp = g.kp;
        self.ki = g.ki;
        self.kd = g.kd;
    }

    pub fn gains(&self) -> Gains {
        Gains { kp: self.kp, ki: self.ki, kd: self.kd }
    }

    pub fn set_max_integral(&mut self, v: f64) {
        if v.is_finite() && v >= 0.0 {
            self.max_integral = v;
        }
    }

    pub fn set_derivative_alpha(&mut self, a: f64) {
        if (0.0..1.0).contains(&a) {
            self.derivative_alpha = a;
        }
    }

    /// Begin (or restart) calibration sampling. Updates run unchanged; the
    /// controller merely records `(t - t0, |e|)` into a bounded ring.
    pub fn start_calibration(&mut self) {
        self.calibration = Some(Calibration {
            samples: Vec::with_capacity(CALIBRATION_CAPACITY),
            next: 0,
            elapsed: 0.0,
        });
    }

    pub fn stop_calibration(&mut self) {
        self.calibration = None;
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibration.is_some()
    }

    pub fn calibration_samples(&self) -> &[(f64, f64)] {
        self.calibration.as_ref().map_or(&[], |c| &c.samples)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn pure_proportional() {
        let mut pid = PidController::new(1.0, 0.0, 0.0, PidDomain::Position);
        let out = pid.update(Vector3::new(0.5, 0.0, 0.0), 0.01);
        assert_relative_eq!(out.x, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn integral_accumulates_and_clamps() {
        let mut pid = PidController::new(0.0, 1.0, 0.0, PidDomain::Position);
        pid.set_max_integral(0.15);
        pid.update(Vector3::x(), 0.1);
        let out = pid.update(Vector3::x(), 0.1);
        assert_relative_eq!(out.x, 0.15, epsilon = 1e-12, max_relative = 1e-9);
        // clamped: further error does not grow the term
        let out = pid.update(Vector3::x(), 0.1);
        assert_relative_eq!(out.x, 0.15, epsilon = 1e-12, max_relative = 1e-9);
    }

    #[test]
    fn first_call_has_zero_derivative() {
        let mut pid = PidController::new(0.0, 0.0, 1.0, PidDomain::Position);
        let out = pid.update(Vector3::new(5.0, 0.0, 0.0), 0.01);
        assert_relative_eq!(out.norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn derivative_is_low_passed() {
        let mut pid = PidController::new(0.0, 0.0, 1.0, PidDomain::Position);
        pid.set_derivative_alpha(0.5);
        pid.update(Vector3::zeros(), 0.1);
        // error step of 1 over dt=0.1: raw derivative 10, filtered 0.5*0 + 0.5*10
        let out = pid.update(Vector3::x(), 0.1);
        assert_relative_eq!(out.x, -5.0, epsilon = 1e-12);
    }

    #[test]
    fn non_finite_input_returns_zero_and_preserves_state() {
        let mut pid = PidController::new(1.0, 1.0, 0.0, PidDomain::Position);
        pid.update(Vector3::x(), 0.1);
        let before = pid.integral;
        let out = pid.update(Vector3::new(f64::NAN, 0.0, 0.0), 0.1);
        assert_eq!(out, Vector3::zeros());
        assert_eq!(pid.integral, before);
    }

    #[test]
    fn calibration_ring_is_bounded() {
        let mut pid = PidController::new(1.0, 0.0, 0.0, PidDomain::Position);
        pid.start_calibration();
        assert!(pid.is_calibrating());
        for _ in 0..150 {
            pid.update(Vector3::x(), 0.01);
        }
        assert_eq!(pid.calibration_samples().len(), 100);
        // timestamps are relative to calibration start
        let newest = pid
            .calibration_samples()
            .iter()
            .map(|s| s.0)
            .fold(0.0_f64, f64::max);
        assert_relative_eq!(newest, 1.5, epsilon = 1e-9);
        pid.stop_calibration();
        assert!(!pid.is_calibrating());
    }
}
