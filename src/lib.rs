//! Closed-loop face tracking and attention scoring for a pan/tilt camera rig.
//!
//! The library keeps a face centred in frame with a PID-driven pair of
//! hobby servos while classifying the subject's attention from facial
//! landmarks:
//! - A positional smoother and PID controller turn the face centre into
//!   pan/tilt corrections
//! - A servo mapper clamps angles and emits duty cycles, directly or
//!   through a stepped ramp
//! - A calibrating state machine scores focus from eye openness, gaze and
//!   head pitch
//! - A lifecycle manager runs the loop on one worker thread and releases
//!   the hardware on every exit path
//!
//! Camera, detector and PWM driver are traits; the [`simulation`] module
//! provides in-process implementations.
//!
//! # Examples
//!
//! ## Scoring attention
//!
//! ```no_run
//! use focus_tracker::config::FocusConfig;
//! use focus_tracker::focus::{FaceMeasurements, FocusAnalyzer, FocusObservation};
//!
//! let mut analyzer = FocusAnalyzer::new(&FocusConfig::default());
//!
//! // eye openness (px), gaze ratio, normalized nose height
//! let frame = FocusObservation::face(FaceMeasurements::new(10.0, 0.5, 0.4));
//! for _ in 0..25 {
//!     let reading = analyzer.process(&frame);
//!     println!("{} ({})", reading.status, reading.published_score());
//! }
//! ```
//!
//! ## Running the tracking loop
//!
//! ```no_run
//! use focus_tracker::config::Config;
//! use focus_tracker::lifecycle::{ResourceProvider, TrackingManager};
//! use focus_tracker::simulation::{ScriptedFrame, SimulatedHardware, SubjectPose};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let script = vec![ScriptedFrame::face(SubjectPose::attentive(640, 480), 640, 480)];
//! let hardware: Arc<dyn ResourceProvider> = Arc::new(SimulatedHardware::new(script));
//!
//! let manager = TrackingManager::new(Config::default(), hardware)?;
//! manager.start()?;
//! std::thread::sleep(std::time::Duration::from_secs(5));
//! println!("{:?}", manager.snapshot());
//! manager.stop();
//! # Ok(())
//! # }
//! ```

/// Frame sources
pub mod camera;

/// Cooperative cancellation for the worker thread
pub mod cancel;

/// Configuration management
pub mod config;

/// Constants used throughout the application
pub mod constants;

/// Detector interface and detection result types
pub mod detection;

/// Error types and result handling
pub mod error;

/// Sliding-window smoothing
pub mod filters;

/// Attention state machine and focus score
pub mod focus;

/// Tracking run management
pub mod lifecycle;

/// Two-axis PID controller
pub mod pid;

/// Servo angle mapping and PWM output
pub mod servo;

/// Simulated camera, detector and actuator
pub mod simulation;

/// Pan/tilt tracking path
pub mod tracker;

pub use error::{Error, Result};
