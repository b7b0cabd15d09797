//! Tracking lifecycle: at most one worker, ordered startup and teardown.
//!
//! [`TrackingManager`] owns the only [`TrackingRunHandle`]. Every public
//! operation takes the same lock, so concurrent `start`/`stop`/`toggle`
//! callers are serialised and a second run can never overlap the first.
//!
//! Startup: actuator → servo init → detector → settle → camera (with
//! retries) → worker. Teardown: cancel → join → actuator stop → actuator
//! release → camera close → detector close. Release failures are logged
//! and reported but never leave the manager stuck in the running state.

use crate::{
    camera::Camera,
    cancel::CancellationToken,
    config::{CameraConfig, Config, ServoConfig},
    detection::{AuxiliaryPolicy, Detector, Frame},
    focus::{FocusAnalyzer, FocusSnapshot},
    servo::{release_actuator, Actuator, PanTiltRig},
    tracker::FaceTracker,
    Error, Result,
};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const WORKER_THREAD_NAME: &str = "focus-tracker";

/// Opens the hardware a tracking run needs
pub trait ResourceProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns [`Error::DeviceUnavailable`] if the PWM channels cannot be claimed.
    fn open_actuator(&self, config: &ServoConfig) -> Result<Box<dyn Actuator>>;

    /// # Errors
    ///
    /// Returns [`Error::DeviceUnavailable`] if the detector cannot be loaded.
    fn open_detector(&self, config: &Config) -> Result<Box<dyn Detector>>;

    /// # Errors
    ///
    /// Returns [`Error::DeviceUnavailable`] if the camera is missing or busy.
    fn open_camera(&self, config: &CameraConfig) -> Result<Box<dyn Camera>>;
}

/// Frame counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub frames_captured: u64,
    pub frames_processed: u64,
    pub frames_failed: u64,
}

/// Result of tearing down one run
#[derive(Debug, Default)]
pub struct StopReport {
    /// `None` when the worker panicked
    pub run: Option<RunReport>,
    pub worker_error: Option<Error>,
    pub release_errors: Vec<Error>,
    pub elapsed: Duration,
}

impl StopReport {
    /// No worker failure and every resource released
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.worker_error.is_none() && self.release_errors.is_empty()
    }
}

#[derive(Debug)]
pub enum StartOutcome {
    Started,
    /// A previous run was stopped first
    Restarted { previous: StopReport },
}

#[derive(Debug)]
pub enum StopOutcome {
    Stopped(StopReport),
    NotRunning,
}

#[derive(Debug)]
pub enum ToggleOutcome {
    Started,
    Stopped(StopReport),
}

/// Reply for the external control surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlResponse {
    pub accepted: bool,
}

/// One active run: stop flag plus the worker that honours it
struct TrackingRunHandle {
    cancel: CancellationToken,
    worker: JoinHandle<Option<WorkerExit>>,
    started_at: Instant,
}

/// Hardware owned by one run
struct RunResources {
    rig: PanTiltRig,
    camera: Box<dyn Camera>,
    detector: Box<dyn Detector>,
}

impl RunResources {
    fn release(self) -> Vec<Error> {
        release_resources(self.rig, Some(self.camera), Some(self.detector))
    }
}

/// Everything the worker hands back for release
struct WorkerExit {
    report: RunReport,
    resources: RunResources,
}

type WorkerBody = Box<dyn FnOnce() -> Option<WorkerExit> + Send>;

struct WorkerContext {
    config: Config,
    snapshot: Arc<RwLock<FocusSnapshot>>,
    cancel: CancellationToken,
}

/// Owns the tracking run and the published focus snapshot
pub struct TrackingManager {
    config: Config,
    provider: Arc<dyn ResourceProvider>,
    run: Mutex<Option<TrackingRunHandle>>,
    snapshot: Arc<RwLock<FocusSnapshot>>,
}

impl TrackingManager {
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the configuration is invalid.
    pub fn new(config: Config, provider: Arc<dyn ResourceProvider>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            provider,
            run: Mutex::new(None),
            snapshot: Arc::new(RwLock::new(FocusSnapshot::default())),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Start a fresh run, stopping and joining any previous one first
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceUnavailable`] if a resource cannot be
    /// acquired. No worker exists afterwards and anything already acquired
    /// has been released.
    pub fn start(&self) -> Result<StartOutcome> {
        let mut run = lock(&self.run);
        let previous = run.take().map(|handle| {
            info!("Tracking already running, restarting");
            self.shutdown(handle)
        });

        *run = Some(self.launch()?);
        Ok(match previous {
            Some(previous) => StartOutcome::Restarted { previous },
            None => StartOutcome::Started,
        })
    }

    /// Stop the current run and release its resources
    pub fn stop(&self) -> StopOutcome {
        let mut run = lock(&self.run);
        match run.take() {
            Some(handle) => StopOutcome::Stopped(self.shutdown(handle)),
            None => StopOutcome::NotRunning,
        }
    }

    /// Stop if running, start otherwise
    ///
    /// # Errors
    ///
    /// See [`TrackingManager::start`].
    pub fn toggle(&self) -> Result<ToggleOutcome> {
        let mut run = lock(&self.run);
        match run.take() {
            Some(handle) => Ok(ToggleOutcome::Stopped(self.shutdown(handle))),
            None => {
                *run = Some(self.launch()?);
                Ok(ToggleOutcome::Started)
            }
        }
    }

    /// Whether a live worker exists
    #[must_use]
    pub fn is_running(&self) -> bool {
        lock(&self.run)
            .as_ref()
            .is_some_and(|handle| !handle.worker.is_finished())
    }

    /// Last published `(status, score)`
    #[must_use]
    pub fn snapshot(&self) -> FocusSnapshot {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// `start()` for the control surface; failures are logged
    pub fn request_start(&self) -> ControlResponse {
        match self.start() {
            Ok(_) => ControlResponse { accepted: true },
            Err(e) => {
                error!("Failed to start tracking: {e}");
                ControlResponse { accepted: false }
            }
        }
    }

    /// `stop()` for the control surface; accepted only if a run was stopped
    pub fn request_stop(&self) -> ControlResponse {
        ControlResponse {
            accepted: matches!(self.stop(), StopOutcome::Stopped(_)),
        }
    }

    fn launch(&self) -> Result<TrackingRunHandle> {
        info!("Starting tracking run");

        let actuator = self.provider.open_actuator(&self.config.servo)?;
        let mut rig = PanTiltRig::new(actuator, &self.config.servo);
        if let Err(e) = rig.initialize() {
            release_partial(rig, None, None);
            return Err(e);
        }

        let detector = match self.provider.open_detector(&self.config) {
            Ok(detector) => detector,
            Err(e) => {
                release_partial(rig, None, None);
                return Err(e);
            }
        };
        info!("Detector '{}' ready", detector.name());

        if self.config.servo.settle_ms > 0 {
            debug!("Waiting {} ms for servos to settle", self.config.servo.settle_ms);
            thread::sleep(Duration::from_millis(self.config.servo.settle_ms));
        }

        let camera = match self.acquire_camera() {
            Ok(camera) => camera,
            Err(e) => {
                release_partial(rig, None, Some(detector));
                return Err(e);
            }
        };

        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = FocusSnapshot::default();

        let cancel = CancellationToken::new();
        let context = WorkerContext {
            config: self.config.clone(),
            snapshot: Arc::clone(&self.snapshot),
            cancel: cancel.clone(),
        };
        let resources = RunResources { rig, camera, detector };
        let worker = spawn_worker(
            |body| thread::Builder::new().name(WORKER_THREAD_NAME.to_string()).spawn(body),
            context,
            resources,
        )?;

        info!("Tracking run started");
        Ok(TrackingRunHandle {
            cancel,
            worker,
            started_at: Instant::now(),
        })
    }

    fn acquire_camera(&self) -> Result<Box<dyn Camera>> {
        let camera = &self.config.camera;
        let backoff = Duration::from_millis(camera.acquire_backoff_ms);
        let mut last_error = None;

        for attempt in 1..=camera.acquire_retries {
            match self.provider.open_camera(camera) {
                Ok(opened) => {
                    info!("Camera {} acquired on attempt {attempt}", camera.device_index);
                    return Ok(opened);
                }
                Err(e) => {
                    warn!(
                        "Camera acquisition attempt {attempt}/{} failed: {e}",
                        camera.acquire_retries
                    );
                    last_error = Some(e);
                    if attempt < camera.acquire_retries {
                        thread::sleep(backoff);
                    }
                }
            }
        }

        Err(Error::DeviceUnavailable(format!(
            "Camera {} unavailable after {} attempts: {}",
            camera.device_index,
            camera.acquire_retries,
            last_error.map_or_else(|| "no attempts made".to_string(), |e| e.to_string())
        )))
    }

    fn shutdown(&self, handle: TrackingRunHandle) -> StopReport {
        info!("Stopping tracking run");
        handle.cancel.cancel();

        let mut report = StopReport {
            elapsed: handle.started_at.elapsed(),
            ..StopReport::default()
        };
        match handle.worker.join() {
            Ok(Some(exit)) => {
                info!(
                    "Run finished: {} frames captured, {} processed, {} failed",
                    exit.report.frames_captured, exit.report.frames_processed, exit.report.frames_failed
                );
                report.run = Some(exit.report);
                report.release_errors = exit.resources.release();
            }
            Ok(None) => warn!("Tracking worker exited without its resources"),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("Tracking worker panicked: {message}");
                report.worker_error = Some(Error::WorkerPanicked(message));
            }
        }

        info!("Tracking run stopped");
        report
    }
}

impl Drop for TrackingManager {
    fn drop(&mut self) {
        if let StopOutcome::Stopped(report) = self.stop() {
            if !report.is_clean() {
                warn!("Tracking run did not shut down cleanly on drop");
            }
        }
    }
}

/// Hand the resources to a new worker thread
///
/// The resources travel through a shared slot, so a failed spawn leaves
/// them here to be parked and released.
fn spawn_worker<S>(
    spawn: S,
    context: WorkerContext,
    resources: RunResources,
) -> Result<JoinHandle<Option<WorkerExit>>>
where
    S: FnOnce(WorkerBody) -> std::io::Result<JoinHandle<Option<WorkerExit>>>,
{
    let slot = Arc::new(Mutex::new(Some(resources)));
    let handoff = Arc::clone(&slot);
    let body: WorkerBody = Box::new(move || {
        let resources = lock(&handoff).take();
        resources.map(|resources| run_worker(context, resources))
    });

    match spawn(body) {
        Ok(worker) => Ok(worker),
        Err(e) => {
            error!("Failed to spawn tracking worker: {e}");
            if let Some(RunResources { rig, camera, detector }) = lock(&slot).take() {
                release_partial(rig, Some(camera), Some(detector));
            }
            Err(Error::Io(e))
        }
    }
}

enum FrameStep {
    Skipped,
    CaptureFailed(Error),
    Processed(Result<()>),
}

fn run_worker(context: WorkerContext, resources: RunResources) -> WorkerExit {
    let WorkerContext {
        config,
        snapshot,
        cancel,
    } = context;
    let RunResources {
        rig,
        mut camera,
        mut detector,
    } = resources;
    let mut analyzer = FocusAnalyzer::new(&config.focus);
    let mut tracker = FaceTracker::new(rig, &config.tracking, &config.pid);
    let policy = AuxiliaryPolicy::new(config.focus.disallowed_classes.clone(), config.focus.auxiliary_confidence);
    let frame_skip = u64::from(config.camera.frame_skip.max(1));
    let capture_backoff = Duration::from_millis(config.camera.capture_failure_backoff_ms);
    let mut report = RunReport::default();

    while !cancel.is_cancelled() {
        // A panic in capture or processing costs one frame
        let step = panic::catch_unwind(AssertUnwindSafe(|| {
            let frame = match camera.capture_frame() {
                Ok(frame) => frame,
                Err(e) => return FrameStep::CaptureFailed(e),
            };
            report.frames_captured += 1;
            if report.frames_captured % frame_skip != 0 {
                return FrameStep::Skipped;
            }
            FrameStep::Processed(process_frame(
                &frame,
                detector.as_mut(),
                &policy,
                &mut analyzer,
                &mut tracker,
                &snapshot,
                &cancel,
            ))
        }));
        match step {
            Ok(FrameStep::Skipped) => {}
            Ok(FrameStep::CaptureFailed(e)) => {
                warn!("Frame capture failed: {e}");
                cancel.sleep(capture_backoff);
            }
            Ok(FrameStep::Processed(Ok(()))) => report.frames_processed += 1,
            Ok(FrameStep::Processed(Err(e))) => {
                report.frames_failed += 1;
                if e.is_per_frame() {
                    warn!("Skipping frame {}: {e}", report.frames_captured);
                } else {
                    error!("Frame {} failed: {e}", report.frames_captured);
                }
            }
            Err(payload) => {
                report.frames_failed += 1;
                error!(
                    "Frame after {} captured panicked: {}",
                    report.frames_captured,
                    panic_message(payload.as_ref())
                );
                cancel.sleep(capture_backoff);
            }
        }
    }

    match panic::catch_unwind(AssertUnwindSafe(|| tracker.park())) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Final neutral servo write failed: {e}"),
        Err(payload) => error!("Final neutral servo write panicked: {}", panic_message(payload.as_ref())),
    }

    WorkerExit {
        report,
        resources: RunResources {
            rig: tracker.into_rig(),
            camera,
            detector,
        },
    }
}

fn process_frame(
    frame: &Frame,
    detector: &mut dyn Detector,
    policy: &AuxiliaryPolicy,
    analyzer: &mut FocusAnalyzer,
    tracker: &mut FaceTracker,
    snapshot: &RwLock<FocusSnapshot>,
    cancel: &CancellationToken,
) -> Result<()> {
    frame.validate()?;
    let detection = detector.detect(frame)?;
    let objects = detector.detect_auxiliary_objects(frame)?;

    let reading = analyzer.process_detection(&detection, policy.any_disallowed(&objects), frame.width(), frame.height());
    *snapshot.write().unwrap_or_else(PoisonError::into_inner) = FocusSnapshot::from(&reading);

    tracker.track(&detection, frame.width(), frame.height(), cancel)?;
    Ok(())
}

/// Release in order: actuator stop, actuator release, camera, detector
fn release_resources(
    rig: PanTiltRig,
    camera: Option<Box<dyn Camera>>,
    detector: Option<Box<dyn Detector>>,
) -> Vec<Error> {
    let channels = rig.channels();
    let mut actuator = rig.into_actuator();
    let mut errors = release_actuator(actuator.as_mut(), &channels);

    if let Some(mut camera) = camera {
        if let Err(e) = camera.close() {
            errors.push(as_release_error(e, "camera"));
        }
    }
    if let Some(mut detector) = detector {
        if let Err(e) = detector.close() {
            errors.push(as_release_error(e, "detector"));
        }
    }

    for e in &errors {
        warn!("{e}");
    }
    errors
}

/// Undo a start that failed before the worker ran
fn release_partial(
    mut rig: PanTiltRig,
    camera: Option<Box<dyn Camera>>,
    detector: Option<Box<dyn Detector>>,
) {
    if let Err(e) = rig.park() {
        warn!("Neutral servo write failed during aborted start: {e}");
    }
    let errors = release_resources(rig, camera, detector);
    if !errors.is_empty() {
        warn!("{} release failures during aborted start", errors.len());
    }
}

fn as_release_error(error: Error, resource: &str) -> Error {
    match error {
        Error::ResourceRelease(_) => error,
        other => Error::ResourceRelease(format!("{resource}: {other}")),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
