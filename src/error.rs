//! Error types for the focus tracker library.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// `OpenCV` operation failed
    #[cfg(feature = "opencv-camera")]
    #[error("OpenCV error: {0}")]
    OpenCV(#[from] opencv::Error),

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed frame or landmark data handed to the detector
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Camera or actuator could not be acquired
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Camera was acquired but did not deliver a frame
    #[error("Frame unavailable: {0}")]
    FrameUnavailable(String),

    /// Servo write failed
    #[error("Actuator error: {0}")]
    Actuator(String),

    /// Detector failed for a reason other than bad input
    #[error("Detector error: {0}")]
    Detector(String),

    /// Releasing a camera, actuator or detector failed
    #[error("Resource release failed: {0}")]
    ResourceRelease(String),

    /// The tracking worker panicked instead of returning
    #[error("Tracking worker panicked: {0}")]
    WorkerPanicked(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic I/O error with description
    #[error("I/O error: {0}")]
    IoError(String),
}

impl Error {
    /// Whether the frame that produced this error should simply be skipped
    #[must_use]
    pub const fn is_per_frame(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::FrameUnavailable(_) | Self::Detector(_) | Self::Actuator(_)
        )
    }
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
