//! Configuration management for the focus tracker

use crate::{constants::*, servo::MoveMode, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Frame acquisition
    pub camera: CameraConfig,

    /// Pan/tilt servo rig
    pub servo: ServoConfig,

    /// Aiming controller gains
    pub pid: PidConfig,

    /// Face-centre smoothing
    pub tracking: TrackingConfig,

    /// Attention scoring
    pub focus: FocusConfig,
}

/// Camera acquisition parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Camera index for capture backends that enumerate devices
    pub device_index: i32,

    /// Capture width in pixels
    pub width: u32,

    /// Capture height in pixels
    pub height: u32,

    /// Process every Nth captured frame
    pub frame_skip: u32,

    /// Acquisition attempts before `start()` gives up
    pub acquire_retries: u32,

    /// Delay between acquisition attempts
    pub acquire_backoff_ms: u64,

    /// Delay after a failed capture inside the loop
    pub capture_failure_backoff_ms: u64,
}

/// Servo rig parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoConfig {
    /// PWM channel of the pan servo
    pub pan_channel: u8,

    /// PWM channel of the tilt servo
    pub tilt_channel: u8,

    /// Pan angle written at startup
    pub initial_pan: f64,

    /// Tilt angle written at startup
    pub initial_tilt: f64,

    /// Direct jump or stepped ramp
    pub move_mode: MoveMode,

    /// Steps per smooth ramp
    pub ramp_steps: u32,

    /// Delay between ramp steps
    pub ramp_delay_ms: u64,

    /// Wait after servo initialisation before the camera is opened
    pub settle_ms: u64,
}

/// PID gains
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidConfig {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,

    /// Optional clamp on the accumulated integral (off by default)
    pub integral_limit: Option<f64>,
}

/// Face-centre smoothing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Moving average window for the face centre
    pub smoothing_window: usize,
}

/// Attention scoring thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    /// Face frames collected before baselines are fixed
    pub calibration_frames: usize,

    /// Eyes count as closed below this fraction of the baseline openness
    pub eye_close_ratio: f64,

    /// Closed-eye frames tolerated before "Sleeping"
    pub sleep_frames: u32,

    /// Allowed gaze deviation from the calibrated centre
    pub gaze_tolerance: f64,

    /// Allowed nose drop below the calibrated height
    pub head_down_tolerance: f64,

    /// Gaze smoothing window
    pub gaze_window: usize,

    /// Auxiliary object classes that count as a distraction
    pub disallowed_classes: Vec<u32>,

    /// Minimum confidence for an auxiliary object to count
    pub auxiliary_confidence: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            servo: ServoConfig::default(),
            pid: PidConfig::default(),
            tracking: TrackingConfig::default(),
            focus: FocusConfig::default(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: DEFAULT_FRAME_WIDTH,
            height: DEFAULT_FRAME_HEIGHT,
            frame_skip: DEFAULT_FRAME_SKIP,
            acquire_retries: DEFAULT_CAMERA_RETRIES,
            acquire_backoff_ms: DEFAULT_CAMERA_BACKOFF_MS,
            capture_failure_backoff_ms: DEFAULT_CAPTURE_FAILURE_BACKOFF_MS,
        }
    }
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            pan_channel: PAN_CHANNEL,
            tilt_channel: TILT_CHANNEL,
            initial_pan: INITIAL_PAN_ANGLE,
            initial_tilt: INITIAL_TILT_ANGLE,
            move_mode: MoveMode::Direct,
            ramp_steps: DEFAULT_RAMP_STEPS,
            ramp_delay_ms: DEFAULT_RAMP_DELAY_MS,
            settle_ms: DEFAULT_SETTLE_MS,
        }
    }
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            kp: DEFAULT_KP,
            ki: DEFAULT_KI,
            kd: DEFAULT_KD,
            integral_limit: None,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            smoothing_window: DEFAULT_TRACKING_WINDOW,
        }
    }
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            calibration_frames: DEFAULT_CALIBRATION_FRAMES,
            eye_close_ratio: DEFAULT_EYE_CLOSE_RATIO,
            sleep_frames: DEFAULT_SLEEP_FRAMES,
            gaze_tolerance: DEFAULT_GAZE_TOLERANCE,
            head_down_tolerance: DEFAULT_HEAD_DOWN_TOLERANCE,
            gaze_window: DEFAULT_GAZE_WINDOW,
            disallowed_classes: vec![PHONE_CLASS_ID],
            auxiliary_confidence: DEFAULT_AUXILIARY_CONFIDENCE,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::IoError(e.to_string()))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content).map_err(|e| Error::IoError(e.to_string()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        // Camera
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(Error::ConfigError("Frame size must be non-zero".to_string()));
        }
        if self.camera.frame_skip == 0 {
            return Err(Error::ConfigError("Frame skip must be at least 1".to_string()));
        }
        if self.camera.acquire_retries == 0 {
            return Err(Error::ConfigError(
                "Camera acquire retries must be at least 1".to_string(),
            ));
        }

        // Servos
        if self.servo.pan_channel == self.servo.tilt_channel {
            return Err(Error::ConfigError(
                "Pan and tilt servos must use different channels".to_string(),
            ));
        }
        for (name, angle) in [("pan", self.servo.initial_pan), ("tilt", self.servo.initial_tilt)] {
            if !(SERVO_MIN_ANGLE..=SERVO_MAX_ANGLE).contains(&angle) {
                return Err(Error::ConfigError(format!(
                    "Initial {name} angle must be between {SERVO_MIN_ANGLE} and {SERVO_MAX_ANGLE}"
                )));
            }
        }
        if self.servo.ramp_steps == 0 {
            return Err(Error::ConfigError("Ramp steps must be at least 1".to_string()));
        }

        // Controller
        if ![self.pid.kp, self.pid.ki, self.pid.kd].iter().all(|gain| gain.is_finite()) {
            return Err(Error::ConfigError("PID gains must be finite".to_string()));
        }
        if let Some(limit) = self.pid.integral_limit {
            if !limit.is_finite() || limit <= 0.0 {
                return Err(Error::ConfigError(
                    "PID integral limit must be positive".to_string(),
                ));
            }
        }

        // Smoothing
        if self.tracking.smoothing_window == 0 || self.focus.gaze_window == 0 {
            return Err(Error::ConfigError(
                "Smoothing window sizes must be greater than 0".to_string(),
            ));
        }

        // Scoring
        if self.focus.calibration_frames == 0 {
            return Err(Error::ConfigError(
                "Calibration needs at least one frame".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.focus.eye_close_ratio) {
            return Err(Error::ConfigError(
                "Eye close ratio must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.focus.gaze_tolerance < 0.0 || self.focus.head_down_tolerance < 0.0 {
            return Err(Error::ConfigError("Tolerances must be non-negative".to_string()));
        }
        if !(0.0..=1.0).contains(&self.focus.auxiliary_confidence) {
            return Err(Error::ConfigError(
                "Auxiliary confidence must be between 0.0 and 1.0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Focus Tracker Configuration

# Frame acquisition
camera:
  device_index: 0
  width: 640
  height: 480
  frame_skip: 3               # process every 3rd frame
  acquire_retries: 5
  acquire_backoff_ms: 1000
  capture_failure_backoff_ms: 50

# Pan/tilt rig (50 Hz hobby servos)
servo:
  pan_channel: 17
  tilt_channel: 27
  initial_pan: 90.0
  initial_tilt: 60.0
  move_mode: "direct"         # direct | smooth
  ramp_steps: 20
  ramp_delay_ms: 10
  settle_ms: 2000

# Aiming controller
pid:
  kp: 0.006
  ki: 0.0003
  kd: 0.001
  integral_limit: null        # set a positive value to bound the integral

# Face-centre smoothing
tracking:
  smoothing_window: 5

# Attention scoring
focus:
  calibration_frames: 20
  eye_close_ratio: 0.6
  sleep_frames: 15
  gaze_tolerance: 0.18
  head_down_tolerance: 0.15
  gaze_window: 5
  disallowed_classes: [67]    # COCO "cell phone"
  auxiliary_confidence: 0.5
"#;
