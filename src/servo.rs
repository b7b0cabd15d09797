//! Servo command mapping for the pan/tilt rig.
//!
//! Angles are clamped to the servo travel and converted to a 50 Hz duty
//! cycle. Each axis either jumps straight to its target or walks there
//! through a [`ServoRamp`], one duty write per step.

use crate::{
    cancel::CancellationToken,
    config::ServoConfig,
    constants::{DUTY_AT_MIN_ANGLE, DUTY_SPAN, NEUTRAL_DUTY, SERVO_MAX_ANGLE, SERVO_MIN_ANGLE},
    Error, Result,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Duty cycle (percent) for a servo angle: 0° → 2.5 %, 180° → 12.5 %
#[must_use]
pub fn angle_to_duty(angle: f64) -> f64 {
    DUTY_AT_MIN_ANGLE + (angle / SERVO_MAX_ANGLE) * DUTY_SPAN
}

/// Clamp an angle to the servo travel
#[must_use]
pub fn clamp_angle(angle: f64) -> f64 {
    angle.clamp(SERVO_MIN_ANGLE, SERVO_MAX_ANGLE)
}

/// PWM output identifier (BCM pin number on the reference rig)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PwmChannel(pub u8);

impl fmt::Display for PwmChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PWM{}", self.0)
    }
}

/// PWM driver for the servos
pub trait Actuator: Send {
    /// Set the duty cycle of a channel, in percent
    ///
    /// # Errors
    ///
    /// Returns [`Error::Actuator`] if the driver rejects the write.
    fn set_duty(&mut self, channel: PwmChannel, percent: f64) -> Result<()>;

    /// Stop the pulse train on a channel
    ///
    /// # Errors
    ///
    /// Returns [`Error::Actuator`] if the driver rejects the request.
    fn stop(&mut self, channel: PwmChannel) -> Result<()>;

    /// Give the channel back to the system
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceRelease`] if the pin cannot be released.
    fn release(&mut self, channel: PwmChannel) -> Result<()>;
}

/// How an axis travels to a new target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveMode {
    /// Write the target duty once
    #[default]
    Direct,
    /// Interpolate over a fixed number of steps, then stop the pulse
    Smooth,
}

/// One intermediate servo command
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampStep {
    pub angle: f64,
    pub duty: f64,
}

/// Finite linear interpolation from one angle to another
///
/// Yields `steps` commands; the last one is exactly the target.
#[derive(Debug, Clone)]
pub struct ServoRamp {
    from: f64,
    to: f64,
    steps: u32,
    taken: u32,
}

impl ServoRamp {
    #[must_use]
    pub fn new(from: f64, to: f64, steps: u32) -> Self {
        Self {
            from,
            to,
            steps: steps.max(1),
            taken: 0,
        }
    }
}

impl Iterator for ServoRamp {
    type Item = RampStep;

    fn next(&mut self) -> Option<RampStep> {
        if self.taken >= self.steps {
            return None;
        }
        self.taken += 1;
        let angle = if self.taken == self.steps {
            self.to
        } else {
            self.from + (self.to - self.from) * f64::from(self.taken) / f64::from(self.steps)
        };
        Some(RampStep {
            angle,
            duty: angle_to_duty(angle),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.steps - self.taken) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ServoRamp {}

/// Commanded state of one servo
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServoAxis {
    channel: PwmChannel,
    current_angle: f64,
}

impl ServoAxis {
    #[must_use]
    pub fn new(channel: PwmChannel, initial_angle: f64) -> Self {
        Self {
            channel,
            current_angle: clamp_angle(initial_angle),
        }
    }

    #[must_use]
    pub const fn channel(&self) -> PwmChannel {
        self.channel
    }

    #[must_use]
    pub const fn current_angle(&self) -> f64 {
        self.current_angle
    }

    /// Jump to `target`; returns whether a command was written
    ///
    /// # Errors
    ///
    /// Propagates the actuator error; the stored angle is left unchanged.
    pub fn move_direct(&mut self, actuator: &mut dyn Actuator, target: f64) -> Result<bool> {
        let Some(target) = Self::resolve_target(target) else {
            return Ok(false);
        };
        if target == self.current_angle {
            return Ok(false);
        }
        actuator.set_duty(self.channel, angle_to_duty(target))?;
        self.current_angle = target;
        Ok(true)
    }

    /// Walk to `target` over `steps` writes spaced by `delay`
    ///
    /// Cancellation is checked between steps. A cancelled ramp leaves the
    /// axis at the last angle written. The pulse is stopped afterwards in
    /// both cases.
    ///
    /// # Errors
    ///
    /// Returns the first actuator error. The neutral write is still
    /// attempted after a failed step, and the stored angle is the last one
    /// successfully written.
    pub fn move_smooth(
        &mut self,
        actuator: &mut dyn Actuator,
        target: f64,
        steps: u32,
        delay: Duration,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let Some(target) = Self::resolve_target(target) else {
            return Ok(false);
        };
        if target == self.current_angle {
            return Ok(false);
        }

        let mut ramp = ServoRamp::new(self.current_angle, target, steps).peekable();
        let mut written = Ok(());
        while let Some(step) = ramp.next() {
            if let Err(e) = actuator.set_duty(self.channel, step.duty) {
                warn!("Ramp on {} failed at {:.2}°: {e}", self.channel, self.current_angle);
                written = Err(e);
                break;
            }
            self.current_angle = step.angle;
            if ramp.peek().is_some() && !cancel.sleep(delay) {
                debug!("Ramp on {} cancelled at {:.2}°", self.channel, self.current_angle);
                break;
            }
        }
        let neutral = actuator.set_duty(self.channel, NEUTRAL_DUTY);
        written.and(neutral)?;
        Ok(true)
    }

    fn resolve_target(target: f64) -> Option<f64> {
        target.is_finite().then(|| clamp_angle(target))
    }
}

/// Two-axis servo rig driven through one actuator
pub struct PanTiltRig {
    actuator: Box<dyn Actuator>,
    pan: ServoAxis,
    tilt: ServoAxis,
    mode: MoveMode,
    ramp_steps: u32,
    ramp_delay: Duration,
}

impl PanTiltRig {
    #[must_use]
    pub fn new(actuator: Box<dyn Actuator>, config: &ServoConfig) -> Self {
        Self {
            actuator,
            pan: ServoAxis::new(PwmChannel(config.pan_channel), config.initial_pan),
            tilt: ServoAxis::new(PwmChannel(config.tilt_channel), config.initial_tilt),
            mode: config.move_mode,
            ramp_steps: config.ramp_steps,
            ramp_delay: Duration::from_millis(config.ramp_delay_ms),
        }
    }

    /// Drive both servos to their initial angles
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceUnavailable`] if the actuator rejects the write.
    pub fn initialize(&mut self) -> Result<()> {
        info!(
            "Initializing servos: pan {:.1}° on {}, tilt {:.1}° on {}",
            self.pan.current_angle,
            self.pan.channel,
            self.tilt.current_angle,
            self.tilt.channel
        );
        for axis in [self.pan, self.tilt] {
            self.actuator
                .set_duty(axis.channel, angle_to_duty(axis.current_angle))
                .map_err(|e| Error::DeviceUnavailable(format!("Servo {} did not accept initial duty: {e}", axis.channel)))?;
        }
        Ok(())
    }

    /// Command both axes; targets are clamped to `[0, 180]`
    ///
    /// # Errors
    ///
    /// Propagates the first actuator error.
    pub fn move_to(&mut self, target_pan: f64, target_tilt: f64, cancel: &CancellationToken) -> Result<()> {
        match self.mode {
            MoveMode::Direct => {
                self.pan.move_direct(self.actuator.as_mut(), target_pan)?;
                self.tilt.move_direct(self.actuator.as_mut(), target_tilt)?;
            }
            MoveMode::Smooth => {
                self.pan
                    .move_smooth(self.actuator.as_mut(), target_pan, self.ramp_steps, self.ramp_delay, cancel)?;
                self.tilt
                    .move_smooth(self.actuator.as_mut(), target_tilt, self.ramp_steps, self.ramp_delay, cancel)?;
            }
        }
        Ok(())
    }

    /// Write a zero duty to both channels so the servos stop pulsing
    ///
    /// # Errors
    ///
    /// Returns the first failure after attempting both channels.
    pub fn park(&mut self) -> Result<()> {
        let pan = self.actuator.set_duty(self.pan.channel, NEUTRAL_DUTY);
        let tilt = self.actuator.set_duty(self.tilt.channel, NEUTRAL_DUTY);
        pan.and(tilt)
    }

    #[must_use]
    pub const fn pan_angle(&self) -> f64 {
        self.pan.current_angle
    }

    #[must_use]
    pub const fn tilt_angle(&self) -> f64 {
        self.tilt.current_angle
    }

    #[must_use]
    pub const fn channels(&self) -> [PwmChannel; 2] {
        [self.pan.channel, self.tilt.channel]
    }

    /// Hand the actuator back for teardown
    #[must_use]
    pub fn into_actuator(self) -> Box<dyn Actuator> {
        self.actuator
    }
}

/// Stop every channel, then release every channel
///
/// All steps are attempted; failures are collected rather than returned
/// early so one bad pin cannot leave the other one driven.
pub fn release_actuator(actuator: &mut dyn Actuator, channels: &[PwmChannel]) -> Vec<Error> {
    let mut errors = Vec::new();
    for &channel in channels {
        if let Err(e) = actuator.stop(channel) {
            errors.push(Error::ResourceRelease(format!("stop {channel}: {e}")));
        }
    }
    for &channel in channels {
        if let Err(e) = actuator.release(channel) {
            errors.push(Error::ResourceRelease(format!("release {channel}: {e}")));
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::{ActuatorEvent, RecordingActuator};

    #[test]
    fn test_angle_to_duty() {
        assert_eq!(angle_to_duty(0.0), 2.5);
        assert_eq!(angle_to_duty(90.0), 7.5);
        assert_eq!(angle_to_duty(180.0), 12.5);
    }

    #[test]
    fn test_ramp_is_finite_and_ends_on_target() {
        let steps: Vec<RampStep> = ServoRamp::new(90.0, 100.0, 20).collect();
        assert_eq!(steps.len(), 20);
        assert!((steps[0].angle - 90.5).abs() < 1e-9);
        assert_eq!(steps[19].angle, 100.0);
        assert_eq!(steps[19].duty, angle_to_duty(100.0));
        assert!(steps.windows(2).all(|w| w[1].angle > w[0].angle));
    }

    #[test]
    fn test_ramp_zero_steps_is_single_jump() {
        let steps: Vec<RampStep> = ServoRamp::new(10.0, 20.0, 0).collect();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].angle, 20.0);
    }

    #[test]
    fn test_direct_skips_unchanged_target() {
        let actuator = RecordingActuator::new();
        let log = actuator.log();
        let mut actuator: Box<dyn Actuator> = Box::new(actuator);
        let mut axis = ServoAxis::new(PwmChannel(17), 90.0);

        assert!(!axis.move_direct(actuator.as_mut(), 90.0).unwrap());
        assert!(log.events().is_empty());

        assert!(axis.move_direct(actuator.as_mut(), 250.0).unwrap());
        assert_eq!(axis.current_angle(), 180.0);
        assert_eq!(log.events(), vec![ActuatorEvent::Duty(PwmChannel(17), 12.5)]);

        assert!(!axis.move_direct(actuator.as_mut(), f64::NAN).unwrap());
        assert_eq!(axis.current_angle(), 180.0);
    }

    #[test]
    fn test_smooth_ends_with_neutral_duty() {
        let actuator = RecordingActuator::new();
        let log = actuator.log();
        let mut actuator: Box<dyn Actuator> = Box::new(actuator);
        let mut axis = ServoAxis::new(PwmChannel(27), 60.0);
        let cancel = CancellationToken::new();

        assert!(axis
            .move_smooth(actuator.as_mut(), 70.0, 5, Duration::ZERO, &cancel)
            .unwrap());
        let duties = log.duties(PwmChannel(27));
        assert_eq!(duties.len(), 6);
        assert_eq!(duties[4], angle_to_duty(70.0));
        assert_eq!(duties[5], NEUTRAL_DUTY);
        assert_eq!(axis.current_angle(), 70.0);
    }

    #[test]
    fn test_failed_ramp_step_still_writes_neutral() {
        let actuator = RecordingActuator::new().failing_duty_write(3);
        let log = actuator.log();
        let mut actuator: Box<dyn Actuator> = Box::new(actuator);
        let mut axis = ServoAxis::new(PwmChannel(17), 0.0);
        let cancel = CancellationToken::new();

        let result = axis.move_smooth(actuator.as_mut(), 100.0, 10, Duration::ZERO, &cancel);
        assert!(matches!(result, Err(Error::Actuator(_))));
        assert_eq!(
            log.duties(PwmChannel(17)),
            vec![angle_to_duty(10.0), angle_to_duty(20.0), NEUTRAL_DUTY]
        );
        assert!((axis.current_angle() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_cancelled_ramp_stops_early() {
        let actuator = RecordingActuator::new();
        let log = actuator.log();
        let mut actuator: Box<dyn Actuator> = Box::new(actuator);
        let mut axis = ServoAxis::new(PwmChannel(17), 0.0);
        let cancel = CancellationToken::new();
        cancel.cancel();

        axis.move_smooth(actuator.as_mut(), 100.0, 10, Duration::from_secs(1), &cancel)
            .unwrap();
        // One step, then the neutral write
        assert_eq!(log.duties(PwmChannel(17)), vec![angle_to_duty(10.0), NEUTRAL_DUTY]);
        assert!((axis.current_angle() - 10.0).abs() < 1e-9);
    }
}
