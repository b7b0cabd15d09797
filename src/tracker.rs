//! Pan/tilt tracking path: face centre → smoother → PID → servo rig.

use crate::{
    cancel::CancellationToken,
    config::{PidConfig, TrackingConfig},
    detection::DetectionResult,
    filters::{PositionSmoother, TrackedPosition},
    pid::{Axes, PidController},
    servo::PanTiltRig,
    Result,
};
use log::debug;

/// What the tracker did with one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingStep {
    /// Smoothed face position used as the PID measurement
    pub position: TrackedPosition,
    /// Whether this frame contributed a new face sample
    pub face_seen: bool,
    /// Raw PID output
    pub control: Axes,
    /// Angles the rig was asked to reach (before clamping)
    pub target_pan: f64,
    pub target_tilt: f64,
}

/// Keeps the face centred by steering the pan/tilt rig
pub struct FaceTracker {
    smoother: PositionSmoother,
    pid: PidController,
    rig: PanTiltRig,
}

impl FaceTracker {
    /// Fresh smoothing and PID state around an initialised rig
    #[must_use]
    pub fn new(rig: PanTiltRig, tracking: &TrackingConfig, pid: &PidConfig) -> Self {
        Self {
            smoother: PositionSmoother::new(tracking.smoothing_window),
            pid: PidController::new(pid.kp, pid.ki, pid.kd).with_integral_limit(pid.integral_limit),
            rig,
        }
    }

    /// Run one control step for a `frame_width` x `frame_height` frame
    ///
    /// With no face the last smoothed position is held, so the rig keeps
    /// receiving the same correction instead of snapping back.
    ///
    /// # Errors
    ///
    /// Propagates actuator errors from the servo move.
    pub fn track(
        &mut self,
        detection: &DetectionResult,
        frame_width: u32,
        frame_height: u32,
        cancel: &CancellationToken,
    ) -> Result<TrackingStep> {
        let frame_center = TrackedPosition::new(f64::from(frame_width) / 2.0, f64::from(frame_height) / 2.0);

        let (position, face_seen) = match detection.face() {
            Some(face) => {
                let (cx, cy) = face.bbox.center();
                (self.smoother.push(TrackedPosition::new(f64::from(cx), f64::from(cy))), true)
            }
            None => (self.smoother.hold_or(frame_center), false),
        };

        let control = self.pid.compute(
            Axes::new(frame_center.x, frame_center.y),
            Axes::new(position.x, position.y),
        );
        let target_pan = self.rig.pan_angle() - control.x;
        let target_tilt = self.rig.tilt_angle() + control.y;

        debug!(
            "face ({:.1}, {:.1}) pid ({:.3}, {:.3}) -> pan {:.2}° tilt {:.2}°",
            position.x, position.y, control.x, control.y, target_pan, target_tilt
        );

        self.rig.move_to(target_pan, target_tilt, cancel)?;

        Ok(TrackingStep {
            position,
            face_seen,
            control,
            target_pan,
            target_tilt,
        })
    }

    /// Final neutral write on both channels
    ///
    /// # Errors
    ///
    /// See [`PanTiltRig::park`].
    pub fn park(&mut self) -> Result<()> {
        self.rig.park()
    }

    #[must_use]
    pub const fn rig(&self) -> &PanTiltRig {
        &self.rig
    }

    #[must_use]
    pub fn into_rig(self) -> PanTiltRig {
        self.rig
    }
}
