//! Attention scoring from facial landmarks.
//!
//! The analyzer starts in a calibration phase that learns the subject's
//! neutral gaze ratio, nose height and eye openness. Once calibrated, every
//! frame is classified into exactly one [`FocusStatus`] using a fixed
//! priority order, and the focus score moves by the matching delta. The
//! score is clamped to `[0, 100]` after every frame.
//!
//! Calibration samples are collected whether or not the eyes are open, so
//! frequent blinking during calibration lowers the eye-openness baseline.

use crate::{
    config::FocusConfig,
    constants::{
        ABSENT_PENALTY, FOCUS_REWARD, GAZE_PENALTY, HEAD_DOWN_PENALTY, MAX_SCORE, MIN_SCORE, NEUTRAL_GAZE,
        PHONE_PENALTY, SLEEP_PENALTY,
    },
    detection::{DetectionResult, FaceLandmarks},
    filters::SlidingWindow,
};
use log::{debug, info};
use serde::Serialize;
use std::fmt;

/// Baseline defaults before calibration completes
const UNCALIBRATED_GAZE: f64 = 0.5;
const UNCALIBRATED_NOSE_Y: f64 = 0.5;
const UNCALIBRATED_EYE_OPEN: f64 = 5.0;

/// Classified attention state of the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusStatus {
    Init,
    Calibrating { collected: usize, total: usize },
    NoPhone,
    Sleeping,
    HeadDown,
    LookRight,
    LookLeft,
    Focused,
    Absent,
}

impl fmt::Display for FocusStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => f.write_str("Init"),
            Self::Calibrating { collected, total } => write!(f, "Calibrating {collected}/{total}"),
            Self::NoPhone => f.write_str("NO PHONE!"),
            Self::Sleeping => f.write_str("Sleeping zZz"),
            Self::HeadDown => f.write_str("Head Down"),
            Self::LookRight => f.write_str("Look RIGHT ->"),
            Self::LookLeft => f.write_str("<- Look LEFT"),
            Self::Focused => f.write_str("Focused!"),
            Self::Absent => f.write_str("Absent"),
        }
    }
}

/// Analyzer phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPhase {
    Calibrating { samples: usize },
    Active,
}

/// Subject-specific neutral values
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Baselines {
    pub gaze: f64,
    pub nose_y: f64,
    pub eye_open: f64,
}

impl Default for Baselines {
    fn default() -> Self {
        Self {
            gaze: UNCALIBRATED_GAZE,
            nose_y: UNCALIBRATED_NOSE_Y,
            eye_open: UNCALIBRATED_EYE_OPEN,
        }
    }
}

/// One calibration frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationSample {
    pub gaze_ratio: f64,
    pub nose_y: f64,
    pub eye_height: f64,
}

/// Per-frame values derived from the landmarks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceMeasurements {
    /// Pixel distance between upper and lower eyelid
    pub eye_openness: f64,
    /// Iris position across the eye, 0 at the outer corner
    pub gaze_ratio: f64,
    /// Normalized nose-tip height, grows downwards
    pub nose_y: f64,
}

impl FaceMeasurements {
    #[must_use]
    pub const fn new(eye_openness: f64, gaze_ratio: f64, nose_y: f64) -> Self {
        Self {
            eye_openness,
            gaze_ratio,
            nose_y,
        }
    }

    /// Measure a face in a `width` x `height` frame
    #[must_use]
    pub fn from_landmarks(landmarks: &FaceLandmarks, width: u32, height: u32) -> Self {
        let (w, h) = (f64::from(width), f64::from(height));

        let top = landmarks.left_eye_top;
        let bottom = landmarks.left_eye_bottom;
        let eye_openness = ((top.x - bottom.x) * w).hypot((top.y - bottom.y) * h);

        let iris_x = landmarks.left_iris.x * w;
        let outer_x = landmarks.left_eye_outer.x * w;
        let inner_x = landmarks.left_eye_inner.x * w;
        let eye_width = (inner_x - outer_x).abs();
        let gaze_ratio = if eye_width > 0.0 {
            (iris_x - outer_x) / eye_width
        } else {
            NEUTRAL_GAZE
        };

        Self::new(eye_openness, gaze_ratio, landmarks.nose_tip.y)
    }
}

/// Everything the analyzer needs from one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusObservation {
    /// `None` when no face (with landmarks) was found
    pub face: Option<FaceMeasurements>,
    /// A disallowed auxiliary object was seen this frame
    pub disallowed_object: bool,
}

impl FocusObservation {
    #[must_use]
    pub const fn face(measurements: FaceMeasurements) -> Self {
        Self {
            face: Some(measurements),
            disallowed_object: false,
        }
    }

    #[must_use]
    pub const fn absent() -> Self {
        Self {
            face: None,
            disallowed_object: false,
        }
    }

    #[must_use]
    pub const fn with_disallowed_object(mut self, present: bool) -> Self {
        self.disallowed_object = present;
        self
    }
}

/// Result of one analyzer update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusReading {
    pub status: FocusStatus,
    pub score: f64,
}

impl FocusReading {
    /// Score as published to consumers (truncated)
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // score is clamped to [0, 100]
    pub fn published_score(&self) -> i32 {
        self.score as i32
    }
}

/// Published `(status, score)` pair read by external collaborators
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FocusSnapshot {
    pub status: String,
    pub score: i32,
}

impl Default for FocusSnapshot {
    #[allow(clippy::cast_possible_truncation)]
    fn default() -> Self {
        Self {
            status: FocusStatus::Init.to_string(),
            score: MAX_SCORE as i32,
        }
    }
}

impl From<&FocusReading> for FocusSnapshot {
    fn from(reading: &FocusReading) -> Self {
        Self {
            status: reading.status.to_string(),
            score: reading.published_score(),
        }
    }
}

/// Calibrating attention classifier with a bounded focus score
#[derive(Debug, Clone)]
pub struct FocusAnalyzer {
    config: FocusConfig,
    score: f64,
    status: FocusStatus,
    closed_eye_counter: u32,
    phase: FocusPhase,
    calibration: Vec<CalibrationSample>,
    baselines: Baselines,
    gaze_history: SlidingWindow<f64>,
}

impl FocusAnalyzer {
    #[must_use]
    pub fn new(config: &FocusConfig) -> Self {
        Self {
            config: config.clone(),
            score: MAX_SCORE,
            status: FocusStatus::Init,
            closed_eye_counter: 0,
            phase: FocusPhase::Calibrating { samples: 0 },
            calibration: Vec::with_capacity(config.calibration_frames),
            baselines: Baselines::default(),
            gaze_history: SlidingWindow::new(config.gaze_window),
        }
    }

    /// Update from a raw detection result
    pub fn process_detection(
        &mut self,
        detection: &DetectionResult,
        disallowed_object: bool,
        width: u32,
        height: u32,
    ) -> FocusReading {
        let face = detection
            .landmarks()
            .map(|landmarks| FaceMeasurements::from_landmarks(landmarks, width, height));
        self.process(&FocusObservation {
            face,
            disallowed_object,
        })
    }

    /// Classify one frame and update the score
    pub fn process(&mut self, observation: &FocusObservation) -> FocusReading {
        match observation.face {
            None => {
                self.status = FocusStatus::Absent;
                self.score -= ABSENT_PENALTY;
                self.closed_eye_counter = 0;
            }
            Some(face) => match self.phase {
                FocusPhase::Calibrating { samples } => self.calibrate(samples, face),
                FocusPhase::Active => self.classify(face, observation.disallowed_object),
            },
        }

        self.score = self.score.clamp(MIN_SCORE, MAX_SCORE);
        FocusReading {
            status: self.status,
            score: self.score,
        }
    }

    fn calibrate(&mut self, samples: usize, face: FaceMeasurements) {
        let total = self.config.calibration_frames;
        self.status = FocusStatus::Calibrating {
            collected: samples,
            total,
        };
        self.calibration.push(CalibrationSample {
            gaze_ratio: face.gaze_ratio,
            nose_y: face.nose_y,
            eye_height: face.eye_openness,
        });

        if self.calibration.len() < total {
            self.phase = FocusPhase::Calibrating {
                samples: self.calibration.len(),
            };
            return;
        }

        #[allow(clippy::cast_precision_loss)] // calibration counts are small
        let n = self.calibration.len() as f64;
        self.baselines = Baselines {
            gaze: self.calibration.iter().map(|s| s.gaze_ratio).sum::<f64>() / n,
            nose_y: self.calibration.iter().map(|s| s.nose_y).sum::<f64>() / n,
            eye_open: self.calibration.iter().map(|s| s.eye_height).sum::<f64>() / n,
        };
        self.phase = FocusPhase::Active;
        info!(
            "Calibration complete: gaze {:.3}, nose y {:.3}, eye open {:.2}px",
            self.baselines.gaze, self.baselines.nose_y, self.baselines.eye_open
        );
    }

    fn classify(&mut self, face: FaceMeasurements, disallowed_object: bool) {
        let closed_threshold = self.baselines.eye_open * self.config.eye_close_ratio;

        // Closed eyes must not pollute the gaze history
        if face.eye_openness > closed_threshold {
            self.gaze_history.push(face.gaze_ratio);
        }
        let gaze = self.gaze_history.mean_or(NEUTRAL_GAZE);

        if disallowed_object {
            self.status = FocusStatus::NoPhone;
            self.score -= PHONE_PENALTY;
        } else if face.eye_openness < closed_threshold {
            self.closed_eye_counter = self.closed_eye_counter.saturating_add(1);
            if self.closed_eye_counter > self.config.sleep_frames {
                self.status = FocusStatus::Sleeping;
                self.score -= SLEEP_PENALTY;
            }
        } else {
            self.closed_eye_counter = 0;

            if face.nose_y > self.baselines.nose_y + self.config.head_down_tolerance {
                self.status = FocusStatus::HeadDown;
                self.score -= HEAD_DOWN_PENALTY;
            } else if gaze < self.baselines.gaze - self.config.gaze_tolerance {
                self.status = FocusStatus::LookRight;
                self.score -= GAZE_PENALTY;
            } else if gaze > self.baselines.gaze + self.config.gaze_tolerance {
                self.status = FocusStatus::LookLeft;
                self.score -= GAZE_PENALTY;
            } else {
                self.status = FocusStatus::Focused;
                self.score += FOCUS_REWARD;
            }
        }

        debug!(
            "eye {:.2}/{:.2} gaze {:.3} nose {:.3} -> {} ({:.1})",
            face.eye_openness, closed_threshold, gaze, face.nose_y, self.status, self.score
        );
    }

    #[must_use]
    pub const fn score(&self) -> f64 {
        self.score
    }

    #[must_use]
    pub const fn status(&self) -> FocusStatus {
        self.status
    }

    #[must_use]
    pub const fn phase(&self) -> FocusPhase {
        self.phase
    }

    #[must_use]
    pub const fn is_calibrated(&self) -> bool {
        matches!(self.phase, FocusPhase::Active)
    }

    /// Learned baselines, once calibration is complete
    #[must_use]
    pub const fn baselines(&self) -> Option<Baselines> {
        match self.phase {
            FocusPhase::Active => Some(self.baselines),
            FocusPhase::Calibrating { .. } => None,
        }
    }

    #[must_use]
    pub const fn closed_eye_counter(&self) -> u32 {
        self.closed_eye_counter
    }

    /// Current smoothed gaze ratio (neutral when no open-eye samples yet)
    #[must_use]
    pub fn smoothed_gaze(&self) -> f64 {
        self.gaze_history.mean_or(NEUTRAL_GAZE)
    }

    #[must_use]
    pub fn snapshot(&self) -> FocusSnapshot {
        FocusSnapshot::from(&FocusReading {
            status: self.status,
            score: self.score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Point2;

    fn analyzer() -> FocusAnalyzer {
        FocusAnalyzer::new(&FocusConfig::default())
    }

    fn face(eye: f64, gaze: f64, nose: f64) -> FocusObservation {
        FocusObservation::face(FaceMeasurements::new(eye, gaze, nose))
    }

    fn calibrated() -> FocusAnalyzer {
        let mut analyzer = analyzer();
        for _ in 0..20 {
            analyzer.process(&face(10.0, 0.5, 0.4));
        }
        analyzer
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(FocusStatus::Init.to_string(), "Init");
        assert_eq!(
            FocusStatus::Calibrating { collected: 3, total: 20 }.to_string(),
            "Calibrating 3/20"
        );
        assert_eq!(FocusStatus::NoPhone.to_string(), "NO PHONE!");
        assert_eq!(FocusStatus::Sleeping.to_string(), "Sleeping zZz");
        assert_eq!(FocusStatus::HeadDown.to_string(), "Head Down");
        assert_eq!(FocusStatus::LookRight.to_string(), "Look RIGHT ->");
        assert_eq!(FocusStatus::LookLeft.to_string(), "<- Look LEFT");
        assert_eq!(FocusStatus::Focused.to_string(), "Focused!");
        assert_eq!(FocusStatus::Absent.to_string(), "Absent");
    }

    #[test]
    fn test_initial_state() {
        let analyzer = analyzer();
        assert_eq!(analyzer.score(), 100.0);
        assert_eq!(analyzer.status(), FocusStatus::Init);
        assert!(!analyzer.is_calibrated());
        assert_eq!(analyzer.snapshot(), FocusSnapshot::default());
    }

    #[test]
    fn test_calibration_progress_labels() {
        let mut analyzer = analyzer();
        let first = analyzer.process(&face(10.0, 0.5, 0.4));
        assert_eq!(first.status.to_string(), "Calibrating 0/20");
        assert_eq!(first.score, 100.0);

        for i in 1..19 {
            let reading = analyzer.process(&face(10.0, 0.5, 0.4));
            assert_eq!(reading.status, FocusStatus::Calibrating { collected: i, total: 20 });
            assert!(!analyzer.is_calibrated());
        }

        let last = analyzer.process(&face(10.0, 0.5, 0.4));
        assert_eq!(last.status.to_string(), "Calibrating 19/20");
        assert!(analyzer.is_calibrated());
    }

    #[test]
    fn test_baselines_are_means() {
        let mut analyzer = FocusAnalyzer::new(&FocusConfig {
            calibration_frames: 2,
            ..FocusConfig::default()
        });
        analyzer.process(&face(8.0, 0.4, 0.3));
        assert_eq!(analyzer.baselines(), None);
        analyzer.process(&face(12.0, 0.6, 0.5));
        let baselines = analyzer.baselines().unwrap();
        assert!((baselines.eye_open - 10.0).abs() < 1e-12);
        assert!((baselines.gaze - 0.5).abs() < 1e-12);
        assert!((baselines.nose_y - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_absent_resets_closed_counter() {
        let mut analyzer = calibrated();
        analyzer.process(&face(2.0, 0.5, 0.4));
        analyzer.process(&face(2.0, 0.5, 0.4));
        assert_eq!(analyzer.closed_eye_counter(), 2);

        let reading = analyzer.process(&FocusObservation::absent());
        assert_eq!(reading.status, FocusStatus::Absent);
        assert_eq!(reading.score, 99.0);
        assert_eq!(analyzer.closed_eye_counter(), 0);
    }

    #[test]
    fn test_phone_has_priority_and_keeps_counter() {
        let mut analyzer = calibrated();
        analyzer.process(&face(2.0, 0.5, 0.4));
        let reading = analyzer.process(&face(2.0, 0.5, 0.9).with_disallowed_object(true));
        assert_eq!(reading.status, FocusStatus::NoPhone);
        assert_eq!(reading.score, 95.0);
        assert_eq!(analyzer.closed_eye_counter(), 1);
    }

    #[test]
    fn test_phone_ignored_during_calibration() {
        let mut analyzer = analyzer();
        let reading = analyzer.process(&face(10.0, 0.5, 0.4).with_disallowed_object(true));
        assert_eq!(reading.status.to_string(), "Calibrating 0/20");
        assert_eq!(reading.score, 100.0);
    }

    #[test]
    fn test_closed_eyes_below_sleep_threshold_keep_status() {
        let mut analyzer = calibrated();
        analyzer.process(&face(10.0, 0.5, 0.4));
        let before = analyzer.score();
        for _ in 0..15 {
            let reading = analyzer.process(&face(5.0, 0.5, 0.4));
            assert_eq!(reading.status, FocusStatus::Focused);
            assert_eq!(reading.score, before);
        }
        let reading = analyzer.process(&face(5.0, 0.5, 0.4));
        assert_eq!(reading.status, FocusStatus::Sleeping);
        assert_eq!(reading.score, before - 2.0);
    }

    #[test]
    fn test_closed_eye_counter_saturates() {
        let mut analyzer = calibrated();
        analyzer.closed_eye_counter = u32::MAX - 1;
        for _ in 0..3 {
            let reading = analyzer.process(&face(2.0, 0.5, 0.4));
            assert_eq!(reading.status, FocusStatus::Sleeping);
        }
        assert_eq!(analyzer.closed_eye_counter(), u32::MAX);
    }

    #[test]
    fn test_threshold_equality_is_neither_open_nor_closed() {
        let mut analyzer = calibrated();
        // 10.0 * 0.6 == 6.0 exactly
        let reading = analyzer.process(&face(6.0, 0.0, 0.4));
        assert_eq!(analyzer.closed_eye_counter(), 0);
        // gaze 0.0 was not recorded, history empty -> neutral
        assert_eq!(reading.status, FocusStatus::Focused);
    }

    #[test]
    fn test_head_down_beats_gaze() {
        let mut analyzer = calibrated();
        let reading = analyzer.process(&face(10.0, 0.0, 0.6));
        assert_eq!(reading.status, FocusStatus::HeadDown);
        assert_eq!(reading.score, 99.0);
    }

    #[test]
    fn test_gaze_directions() {
        let mut analyzer = calibrated();
        let mut reading = analyzer.process(&face(10.0, 0.1, 0.4));
        assert_eq!(reading.status, FocusStatus::LookRight);
        assert_eq!(reading.score, 99.5);

        let mut analyzer = calibrated();
        for _ in 0..5 {
            reading = analyzer.process(&face(10.0, 0.9, 0.4));
        }
        assert_eq!(reading.status, FocusStatus::LookLeft);
    }

    #[test]
    fn test_score_clamped_at_bounds() {
        let mut analyzer = calibrated();
        for _ in 0..10 {
            analyzer.process(&face(10.0, 0.5, 0.4));
        }
        assert_eq!(analyzer.score(), 100.0);

        for _ in 0..30 {
            analyzer.process(&face(10.0, 0.5, 0.4).with_disallowed_object(true));
        }
        assert_eq!(analyzer.score(), 0.0);
    }

    #[test]
    fn test_measurements_from_landmarks() {
        let landmarks = FaceLandmarks {
            left_iris: Point2::new(0.45, 0.40),
            left_eye_outer: Point2::new(0.40, 0.40),
            left_eye_inner: Point2::new(0.50, 0.40),
            left_eye_top: Point2::new(0.45, 0.39),
            left_eye_bottom: Point2::new(0.45, 0.41),
            nose_tip: Point2::new(0.5, 0.55),
        };
        let m = FaceMeasurements::from_landmarks(&landmarks, 800, 600);
        assert!((m.gaze_ratio - 0.5).abs() < 1e-9);
        assert!((m.eye_openness - 12.0).abs() < 1e-9);
        assert_eq!(m.nose_y, 0.55);

        let flat = FaceLandmarks {
            left_eye_inner: landmarks.left_eye_outer,
            ..landmarks
        };
        assert_eq!(FaceMeasurements::from_landmarks(&flat, 800, 600).gaze_ratio, 0.5);
    }

    #[test]
    fn test_published_score_truncates() {
        let reading = FocusReading {
            status: FocusStatus::Focused,
            score: 99.5,
        };
        assert_eq!(FocusSnapshot::from(&reading).score, 99);
    }
}
