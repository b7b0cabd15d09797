//! Attention state machine behaviour over whole frame sequences

use focus_tracker::{
    config::FocusConfig,
    detection::{BoundingBox, DetectionResult, FaceDetection},
    focus::{FaceMeasurements, FocusAnalyzer, FocusObservation, FocusPhase, FocusStatus},
    simulation::SubjectPose,
};
use proptest::prelude::*;

fn face(eye: f64, gaze: f64, nose: f64) -> FocusObservation {
    FocusObservation::face(FaceMeasurements::new(eye, gaze, nose))
}

fn calibrated() -> FocusAnalyzer {
    let mut analyzer = FocusAnalyzer::new(&FocusConfig::default());
    for _ in 0..20 {
        analyzer.process(&face(10.0, 0.5, 0.4));
    }
    analyzer
}

#[test]
fn test_calibration_completes_exactly_at_k() {
    let mut analyzer = FocusAnalyzer::new(&FocusConfig::default());
    for i in 0..19 {
        analyzer.process(&face(10.0, 0.5, 0.4));
        assert_eq!(analyzer.phase(), FocusPhase::Calibrating { samples: i + 1 });
    }
    analyzer.process(&face(10.0, 0.5, 0.4));
    assert_eq!(analyzer.phase(), FocusPhase::Active);

    let baselines = analyzer.baselines().unwrap();
    analyzer.process(&face(2.0, 0.9, 0.9));
    assert_eq!(analyzer.phase(), FocusPhase::Active);
    assert_eq!(analyzer.baselines().unwrap(), baselines);
}

#[test]
fn test_absent_frames_do_not_count_toward_calibration() {
    let mut analyzer = FocusAnalyzer::new(&FocusConfig::default());
    for _ in 0..10 {
        analyzer.process(&face(10.0, 0.5, 0.4));
        let reading = analyzer.process(&FocusObservation::absent());
        assert_eq!(reading.status, FocusStatus::Absent);
    }
    assert_eq!(analyzer.phase(), FocusPhase::Calibrating { samples: 10 });
    assert_eq!(analyzer.score(), 90.0);
}

#[test]
fn test_worked_example_baselines_and_gaze() {
    let mut analyzer = calibrated();
    let baselines = analyzer.baselines().unwrap();
    assert!((baselines.gaze - 0.5).abs() < 1e-12);
    assert!((baselines.nose_y - 0.4).abs() < 1e-12);
    assert!((baselines.eye_open - 10.0).abs() < 1e-12);

    // Drop the score first so the gaze penalty is visible below the cap
    analyzer.process(&face(10.0, 0.5, 0.4).with_disallowed_object(true));
    let before = analyzer.score();
    let reading = analyzer.process(&face(10.0, 0.1, 0.4));
    assert_eq!(reading.status, FocusStatus::LookRight);
    assert_eq!(reading.status.to_string(), "Look RIGHT ->");
    assert_eq!(reading.score, before - 0.5);
}

#[test]
fn test_focused_score_rises_to_cap() {
    let mut analyzer = calibrated();
    for _ in 0..4 {
        analyzer.process(&FocusObservation::absent());
    }
    let mut previous = analyzer.score();
    assert_eq!(previous, 96.0);

    for _ in 0..20 {
        let reading = analyzer.process(&face(10.0, 0.5, 0.4));
        assert_eq!(reading.status.to_string(), "Focused!");
        assert!(reading.score >= previous);
        assert!(reading.score <= 100.0);
        previous = reading.score;
    }
    assert_eq!(previous, 100.0);
}

#[test]
fn test_sustained_closed_eyes_fall_asleep() {
    let mut analyzer = calibrated();
    let mut statuses = Vec::new();
    for _ in 0..20 {
        statuses.push(analyzer.process(&face(5.9, 0.5, 0.4)).status);
    }
    assert!(statuses[..15].iter().all(|s| *s != FocusStatus::Sleeping));
    assert!(statuses[15..].iter().all(|s| *s == FocusStatus::Sleeping));
    assert_eq!(analyzer.score(), 90.0);

    let reading = analyzer.process(&face(10.0, 0.5, 0.4));
    assert_eq!(reading.status, FocusStatus::Focused);
    assert_eq!(analyzer.closed_eye_counter(), 0);
}

#[test]
fn test_closed_eyes_keep_gaze_history_clean() {
    let mut analyzer = calibrated();
    for _ in 0..5 {
        analyzer.process(&face(10.0, 0.5, 0.4));
    }
    // Wild gaze readings with closed eyes are ignored
    for _ in 0..5 {
        analyzer.process(&face(3.0, 0.0, 0.4));
    }
    assert_eq!(analyzer.smoothed_gaze(), 0.5);
}

#[test]
fn test_detection_without_landmarks_counts_as_absent() {
    let mut analyzer = calibrated();
    let detection = DetectionResult::Face(FaceDetection {
        bbox: BoundingBox::new(100, 100, 80, 80),
        landmarks: None,
        confidence: 0.9,
    });
    let reading = analyzer.process_detection(&detection, false, 640, 480);
    assert_eq!(reading.status, FocusStatus::Absent);
}

#[test]
fn test_process_detection_from_landmarks() {
    let mut analyzer = FocusAnalyzer::new(&FocusConfig {
        calibration_frames: 3,
        ..FocusConfig::default()
    });
    let pose = SubjectPose::attentive(640, 480);
    let detection = DetectionResult::Face(FaceDetection {
        bbox: BoundingBox::new(260, 180, 120, 120),
        landmarks: Some(pose.landmarks(640, 480)),
        confidence: 0.9,
    });
    for _ in 0..3 {
        analyzer.process_detection(&detection, false, 640, 480);
    }
    let reading = analyzer.process_detection(&detection, true, 640, 480);
    assert_eq!(reading.status.to_string(), "NO PHONE!");
    assert_eq!(reading.published_score(), 95);

    let looking_down = DetectionResult::Face(FaceDetection {
        landmarks: Some(SubjectPose { nose_y: 0.8, ..pose }.landmarks(640, 480)),
        ..detection.face().cloned().unwrap()
    });
    let reading = analyzer.process_detection(&looking_down, false, 640, 480);
    assert_eq!(reading.status.to_string(), "Head Down");
}

#[derive(Debug, Clone)]
enum Input {
    Absent,
    Face { eye: f64, gaze: f64, nose: f64, phone: bool },
}

fn input_strategy() -> impl Strategy<Value = Input> {
    prop_oneof![
        Just(Input::Absent),
        (0.0..20.0f64, -0.5..1.5f64, 0.0..1.0f64, any::<bool>())
            .prop_map(|(eye, gaze, nose, phone)| Input::Face { eye, gaze, nose, phone }),
    ]
}

proptest! {
    #[test]
    fn prop_score_stays_in_bounds(inputs in prop::collection::vec(input_strategy(), 0..300)) {
        let mut analyzer = FocusAnalyzer::new(&FocusConfig::default());
        for input in inputs {
            let observation = match input {
                Input::Absent => FocusObservation::absent(),
                Input::Face { eye, gaze, nose, phone } => face(eye, gaze, nose).with_disallowed_object(phone),
            };
            let reading = analyzer.process(&observation);
            prop_assert!((0.0..=100.0).contains(&reading.score));
            prop_assert!((0..=100).contains(&reading.published_score()));
        }
    }
}
