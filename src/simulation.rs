//! In-process stand-ins for the camera, detector and servo driver.
//!
//! Used by the binary when no hardware drivers are wired in, and by the
//! tests to observe exactly what the control loop does to the rig.

use crate::{
    camera::Camera,
    config::{CameraConfig, Config, ServoConfig},
    constants::PHONE_CLASS_ID,
    detection::{AuxiliaryObject, BoundingBox, DetectionResult, Detector, FaceDetection, FaceLandmarks, Frame, Point2},
    lifecycle::ResourceProvider,
    servo::{Actuator, PwmChannel},
    Error, Result,
};
use log::debug;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex, PoisonError,
};
use std::thread;
use std::time::Duration;

/// Half the simulated eye width in pixels
const SIM_HALF_EYE_WIDTH: f64 = 20.0;

/// Simulated face box edge in pixels
const SIM_FACE_SIZE: i32 = 120;

/// One command received by a [`RecordingActuator`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActuatorEvent {
    Duty(PwmChannel, f64),
    Stop(PwmChannel),
    Release(PwmChannel),
}

/// Shared, append-only record of actuator commands
#[derive(Debug, Clone, Default)]
pub struct ActuatorLog {
    events: Arc<Mutex<Vec<ActuatorEvent>>>,
}

impl ActuatorLog {
    fn record(&self, event: ActuatorEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }

    #[must_use]
    pub fn events(&self) -> Vec<ActuatorEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Duty values written to `channel`, in order
    #[must_use]
    pub fn duties(&self, channel: PwmChannel) -> Vec<f64> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ActuatorEvent::Duty(ch, duty) if ch == channel => Some(duty),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// Actuator that only records what it is told
#[derive(Debug, Clone, Default)]
pub struct RecordingActuator {
    log: ActuatorLog,
    fail_release: bool,
    fail_duty_write: Option<usize>,
    duty_writes: usize,
}

impl RecordingActuator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_log(log: ActuatorLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    /// Make every `release` call fail after recording it
    #[must_use]
    pub fn failing_release(mut self) -> Self {
        self.fail_release = true;
        self
    }

    /// Reject the `n`th `set_duty` call (1-based) without recording it
    #[must_use]
    pub fn failing_duty_write(mut self, n: usize) -> Self {
        self.fail_duty_write = Some(n);
        self
    }

    #[must_use]
    pub fn log(&self) -> ActuatorLog {
        self.log.clone()
    }
}

impl Actuator for RecordingActuator {
    fn set_duty(&mut self, channel: PwmChannel, percent: f64) -> Result<()> {
        self.duty_writes += 1;
        if self.fail_duty_write == Some(self.duty_writes) {
            return Err(Error::Actuator(format!("{channel} rejected duty {percent:.2}%")));
        }
        self.log.record(ActuatorEvent::Duty(channel, percent));
        Ok(())
    }

    fn stop(&mut self, channel: PwmChannel) -> Result<()> {
        self.log.record(ActuatorEvent::Stop(channel));
        Ok(())
    }

    fn release(&mut self, channel: PwmChannel) -> Result<()> {
        self.log.record(ActuatorEvent::Release(channel));
        if self.fail_release {
            return Err(Error::ResourceRelease(format!("{channel} is still exported")));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct CameraCounters {
    live: AtomicUsize,
    max_live: AtomicUsize,
}

impl CameraCounters {
    fn opened(&self) {
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(live, Ordering::SeqCst);
    }

    fn closed(&self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Camera producing black frames of a fixed size
#[derive(Debug)]
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    frame_interval: Duration,
    counters: Option<Arc<CameraCounters>>,
    open: bool,
    captures: u64,
    panic_on_capture: Option<u64>,
}

impl SyntheticCamera {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_interval: Duration::ZERO,
            counters: None,
            open: true,
            captures: 0,
            panic_on_capture: None,
        }
    }

    /// Sleep this long per captured frame, like a real sensor's frame rate
    #[must_use]
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Panic inside the `n`th `capture_frame` call (1-based), like a faulting driver
    #[must_use]
    pub fn panicking_on_capture(mut self, n: u64) -> Self {
        self.panic_on_capture = Some(n);
        self
    }
}

impl Camera for SyntheticCamera {
    fn capture_frame(&mut self) -> Result<Frame> {
        if !self.open {
            return Err(Error::FrameUnavailable("Synthetic camera is closed".to_string()));
        }
        self.captures += 1;
        if self.panic_on_capture == Some(self.captures) {
            panic!("camera driver fault on capture {}", self.captures);
        }
        if !self.frame_interval.is_zero() {
            thread::sleep(self.frame_interval);
        }
        Ok(Frame::blank(self.width, self.height))
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            if let Some(counters) = &self.counters {
                counters.closed();
            }
        }
        Ok(())
    }
}

/// Position of a simulated subject
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubjectPose {
    /// Face centre in pixels
    pub center: (i32, i32),
    /// Gaze ratio, 0.5 is straight ahead
    pub gaze: f64,
    /// Normalized nose-tip height
    pub nose_y: f64,
    /// Eyelid distance in pixels
    pub eye_open_px: f64,
}

impl SubjectPose {
    /// Attentive subject centred in a `width` x `height` frame
    #[must_use]
    pub fn attentive(width: u32, height: u32) -> Self {
        Self {
            center: (i32::try_from(width / 2).unwrap_or(0), i32::try_from(height / 2).unwrap_or(0)),
            gaze: 0.5,
            nose_y: 0.5,
            eye_open_px: 10.0,
        }
    }

    /// Landmarks that measure back to this pose in a `width` x `height` frame
    #[must_use]
    pub fn landmarks(&self, width: u32, height: u32) -> FaceLandmarks {
        let (w, h) = (f64::from(width), f64::from(height));
        let eye_x = f64::from(self.center.0) - SIM_HALF_EYE_WIDTH;
        let eye_y = f64::from(self.center.1) - f64::from(SIM_FACE_SIZE) / 6.0;
        let outer_x = eye_x - SIM_HALF_EYE_WIDTH;
        let inner_x = eye_x + SIM_HALF_EYE_WIDTH;
        let iris_x = outer_x + self.gaze * (inner_x - outer_x);
        let px = |x: f64, y: f64| Point2::new(x / w, y / h);

        FaceLandmarks {
            left_iris: px(iris_x, eye_y),
            left_eye_outer: px(outer_x, eye_y),
            left_eye_inner: px(inner_x, eye_y),
            left_eye_top: px(eye_x, eye_y - self.eye_open_px / 2.0),
            left_eye_bottom: px(eye_x, eye_y + self.eye_open_px / 2.0),
            nose_tip: Point2::new(f64::from(self.center.0) / w, self.nose_y),
        }
    }
}

/// What the scripted detector does on one frame
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedOutcome {
    Detection(DetectionResult),
    /// Return [`Error::Detector`]
    Fail(String),
    /// Panic inside `detect`
    Panic,
}

/// One step of a detector script
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedFrame {
    pub outcome: ScriptedOutcome,
    pub objects: Vec<AuxiliaryObject>,
}

impl ScriptedFrame {
    /// A face with landmarks matching `pose`
    #[must_use]
    pub fn face(pose: SubjectPose, width: u32, height: u32) -> Self {
        let half = SIM_FACE_SIZE / 2;
        Self {
            outcome: ScriptedOutcome::Detection(DetectionResult::Face(FaceDetection {
                bbox: BoundingBox::new(pose.center.0 - half, pose.center.1 - half, SIM_FACE_SIZE, SIM_FACE_SIZE),
                landmarks: Some(pose.landmarks(width, height)),
                confidence: 0.95,
            })),
            objects: Vec::new(),
        }
    }

    #[must_use]
    pub const fn absent() -> Self {
        Self {
            outcome: ScriptedOutcome::Detection(DetectionResult::NoFace),
            objects: Vec::new(),
        }
    }

    #[must_use]
    pub fn failure(reason: &str) -> Self {
        Self {
            outcome: ScriptedOutcome::Fail(reason.to_string()),
            objects: Vec::new(),
        }
    }

    #[must_use]
    pub const fn panic() -> Self {
        Self {
            outcome: ScriptedOutcome::Panic,
            objects: Vec::new(),
        }
    }

    /// Add a phone held in view
    #[must_use]
    pub fn with_phone(mut self, confidence: f32) -> Self {
        self.objects.push(AuxiliaryObject {
            class_id: PHONE_CLASS_ID,
            label: "cell phone".to_string(),
            confidence,
            bbox: BoundingBox::new(10, 10, 60, 100),
        });
        self
    }
}

/// Detector replaying a cyclic script
#[derive(Debug, Default)]
pub struct ScriptedDetector {
    script: Vec<ScriptedFrame>,
    cursor: usize,
    current: Option<usize>,
    closed: Option<Arc<AtomicUsize>>,
}

impl ScriptedDetector {
    /// An empty script reports no face on every frame
    #[must_use]
    pub fn new(script: Vec<ScriptedFrame>) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }
}

impl Detector for ScriptedDetector {
    fn name(&self) -> &str {
        "scripted"
    }

    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult> {
        frame.validate()?;
        if self.script.is_empty() {
            return Ok(DetectionResult::NoFace);
        }
        let index = self.cursor % self.script.len();
        self.cursor = self.cursor.wrapping_add(1);
        self.current = Some(index);

        match &self.script[index].outcome {
            ScriptedOutcome::Detection(result) => Ok(result.clone()),
            ScriptedOutcome::Fail(reason) => Err(Error::Detector(reason.clone())),
            ScriptedOutcome::Panic => panic!("scripted detector panic at step {index}"),
        }
    }

    fn detect_auxiliary_objects(&mut self, frame: &Frame) -> Result<Vec<AuxiliaryObject>> {
        frame.validate()?;
        Ok(self
            .current
            .and_then(|index| self.script.get(index))
            .map(|step| step.objects.clone())
            .unwrap_or_default())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(closed) = self.closed.take() {
            closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// [`ResourceProvider`] backed entirely by the simulated devices
#[derive(Debug, Default)]
pub struct SimulatedHardware {
    script: Vec<ScriptedFrame>,
    frame_interval: Duration,
    busy_camera_attempts: usize,
    actuator_unavailable: bool,
    failing_release: bool,
    camera_panic_on: Option<u64>,
    actuator_log: ActuatorLog,
    cameras: Arc<CameraCounters>,
    camera_attempts: AtomicUsize,
    cameras_opened: AtomicUsize,
    actuators_opened: AtomicUsize,
    detectors_opened: AtomicUsize,
    detectors_closed: Arc<AtomicUsize>,
}

impl SimulatedHardware {
    #[must_use]
    pub fn new(script: Vec<ScriptedFrame>) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    /// Refuse the first `attempts` camera opens, as if a previous run still held it
    #[must_use]
    pub fn with_busy_camera(mut self, attempts: usize) -> Self {
        self.busy_camera_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    #[must_use]
    pub fn with_unavailable_actuator(mut self) -> Self {
        self.actuator_unavailable = true;
        self
    }

    #[must_use]
    pub fn with_failing_release(mut self) -> Self {
        self.failing_release = true;
        self
    }

    /// Every camera opened panics inside its `n`th capture
    #[must_use]
    pub fn with_camera_panic_on(mut self, n: u64) -> Self {
        self.camera_panic_on = Some(n);
        self
    }

    /// Log shared by every actuator this provider opens
    #[must_use]
    pub fn actuator_log(&self) -> ActuatorLog {
        self.actuator_log.clone()
    }

    #[must_use]
    pub fn camera_attempts(&self) -> usize {
        self.camera_attempts.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn cameras_opened(&self) -> usize {
        self.cameras_opened.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn live_cameras(&self) -> usize {
        self.cameras.live.load(Ordering::SeqCst)
    }

    /// Highest number of cameras open at the same time
    #[must_use]
    pub fn max_live_cameras(&self) -> usize {
        self.cameras.max_live.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn actuators_opened(&self) -> usize {
        self.actuators_opened.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn detectors_opened(&self) -> usize {
        self.detectors_opened.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn detectors_closed(&self) -> usize {
        self.detectors_closed.load(Ordering::SeqCst)
    }
}

impl ResourceProvider for SimulatedHardware {
    fn open_actuator(&self, config: &ServoConfig) -> Result<Box<dyn Actuator>> {
        if self.actuator_unavailable {
            return Err(Error::DeviceUnavailable(format!(
                "PWM channels {}/{} are not exported",
                config.pan_channel, config.tilt_channel
            )));
        }
        self.actuators_opened.fetch_add(1, Ordering::SeqCst);
        let actuator = RecordingActuator::with_log(self.actuator_log.clone());
        let actuator = if self.failing_release {
            actuator.failing_release()
        } else {
            actuator
        };
        Ok(Box::new(actuator))
    }

    fn open_detector(&self, _config: &Config) -> Result<Box<dyn Detector>> {
        self.detectors_opened.fetch_add(1, Ordering::SeqCst);
        let mut detector = ScriptedDetector::new(self.script.clone());
        detector.closed = Some(Arc::clone(&self.detectors_closed));
        Ok(Box::new(detector))
    }

    fn open_camera(&self, config: &CameraConfig) -> Result<Box<dyn Camera>> {
        let attempt = self.camera_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.busy_camera_attempts {
            debug!("Simulated camera busy on attempt {attempt}");
            return Err(Error::DeviceUnavailable(format!(
                "Camera {} is busy",
                config.device_index
            )));
        }
        self.cameras_opened.fetch_add(1, Ordering::SeqCst);
        self.cameras.opened();

        let mut camera = SyntheticCamera::new(config.width, config.height).with_frame_interval(self.frame_interval);
        if let Some(n) = self.camera_panic_on {
            camera = camera.panicking_on_capture(n);
        }
        camera.counters = Some(Arc::clone(&self.cameras));
        Ok(Box::new(camera))
    }
}
