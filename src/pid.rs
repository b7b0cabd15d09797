//! Discrete two-axis PID controller.
//!
//! One call per processed frame; there is no sample-time scaling, so the
//! effective gains change with the frame rate. The output is unbounded and
//! callers clamp whatever they derive from it.

use serde::Serialize;

/// A value per axis
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Axes {
    pub x: f64,
    pub y: f64,
}

impl Axes {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// PID controller state for one tracking run
#[derive(Debug, Clone)]
pub struct PidController {
    kp: f64,
    ki: f64,
    kd: f64,
    integral: Axes,
    prev_error: Axes,
    integral_limit: Option<f64>,
}

impl PidController {
    /// Create a controller with zeroed integral and derivative history
    #[must_use]
    pub const fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            integral: Axes::new(0.0, 0.0),
            prev_error: Axes::new(0.0, 0.0),
            integral_limit: None,
        }
    }

    /// Clamp each integral term to `[-limit, limit]`
    ///
    /// Off by default. Enabling it changes the controller response relative
    /// to the plain accumulating form.
    #[must_use]
    pub fn with_integral_limit(mut self, limit: Option<f64>) -> Self {
        self.integral_limit = limit.map(f64::abs);
        self
    }

    /// Compute the control output for `setpoint - measured`
    pub fn compute(&mut self, setpoint: Axes, measured: Axes) -> Axes {
        let error = Axes::new(setpoint.x - measured.x, setpoint.y - measured.y);

        self.integral = Axes::new(self.integral.x + error.x, self.integral.y + error.y);
        if let Some(limit) = self.integral_limit {
            self.integral = Axes::new(
                self.integral.x.clamp(-limit, limit),
                self.integral.y.clamp(-limit, limit),
            );
        }

        let derivative = Axes::new(error.x - self.prev_error.x, error.y - self.prev_error.y);
        self.prev_error = error;

        Axes::new(
            self.kp * error.x + self.ki * self.integral.x + self.kd * derivative.x,
            self.kp * error.y + self.ki * self.integral.y + self.kd * derivative.y,
        )
    }

    #[must_use]
    pub const fn integral(&self) -> Axes {
        self.integral
    }

    #[must_use]
    pub const fn prev_error(&self) -> Axes {
        self.prev_error
    }

    #[must_use]
    pub const fn gains(&self) -> (f64, f64, f64) {
        (self.kp, self.ki, self.kd)
    }
}
