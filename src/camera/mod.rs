//! Frame source for the tracking loop.

#[cfg(feature = "opencv-camera")]
mod video_capture;

#[cfg(feature = "opencv-camera")]
pub use video_capture::OpenCvCamera;

use crate::{detection::Frame, Result};

/// Camera driver owned by the tracking worker
pub trait Camera: Send {
    /// Grab the next frame
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FrameUnavailable`] when the device delivers
    /// nothing; the loop backs off and tries again.
    fn capture_frame(&mut self) -> Result<Frame>;

    /// Release the device so a later run can open it
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ResourceRelease`] if the driver refuses.
    fn close(&mut self) -> Result<()>;
}
