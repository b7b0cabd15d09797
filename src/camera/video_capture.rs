use super::Camera;
use crate::{config::CameraConfig, detection::Frame, Error, Result};
use log::info;
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, CAP_PROP_BUFFERSIZE, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH},
};

/// Webcam opened through `OpenCV`
pub struct OpenCvCamera {
    capture: VideoCapture,
    device_index: i32,
}

impl OpenCvCamera {
    /// Open camera `device_index` at the configured resolution
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceUnavailable`] if the device cannot be opened,
    /// typically because a previous run still holds it.
    pub fn open(config: &CameraConfig) -> Result<Self> {
        info!("Opening camera {}", config.device_index);
        let mut capture = VideoCapture::new(config.device_index, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(Error::DeviceUnavailable(format!(
                "Camera {} could not be opened",
                config.device_index
            )));
        }

        // Keep latency low: always read the newest frame
        capture.set(CAP_PROP_BUFFERSIZE, 1.0)?;
        capture.set(CAP_PROP_FRAME_WIDTH, f64::from(config.width))?;
        capture.set(CAP_PROP_FRAME_HEIGHT, f64::from(config.height))?;

        Ok(Self {
            capture,
            device_index: config.device_index,
        })
    }
}

impl Camera for OpenCvCamera {
    fn capture_frame(&mut self) -> Result<Frame> {
        let mut bgr = Mat::default();
        if !self.capture.read(&mut bgr)? || bgr.empty() {
            return Err(Error::FrameUnavailable(format!(
                "Camera {} returned no frame",
                self.device_index
            )));
        }

        let mut rgb = Mat::default();
        imgproc::cvt_color(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

        let width = u32::try_from(rgb.cols())
            .map_err(|_| Error::InvalidInput(format!("Negative frame width: {}", rgb.cols())))?;
        let height = u32::try_from(rgb.rows())
            .map_err(|_| Error::InvalidInput(format!("Negative frame height: {}", rgb.rows())))?;
        Ok(Frame::new(width, height, rgb.data_bytes()?.to_vec()))
    }

    fn close(&mut self) -> Result<()> {
        info!("Releasing camera {}", self.device_index);
        self.capture
            .release()
            .map_err(|e| Error::ResourceRelease(format!("camera {}: {e}", self.device_index)))
    }
}
