//! Benchmarks for the per-frame hot path

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use focus_tracker::{
    cancel::CancellationToken,
    config::{FocusConfig, PidConfig, ServoConfig, TrackingConfig},
    detection::{BoundingBox, DetectionResult, FaceDetection},
    focus::{FaceMeasurements, FocusAnalyzer, FocusObservation},
    pid::{Axes, PidController},
    servo::PanTiltRig,
    simulation::{RecordingActuator, SubjectPose},
    tracker::FaceTracker,
};

fn noisy_observations(n: usize) -> Vec<FocusObservation> {
    (0..n)
        .map(|_| {
            let eye = 10.0 + 4.0 * (rand::random::<f64>() - 0.5);
            let gaze = 0.5 + 0.4 * (rand::random::<f64>() - 0.5);
            let nose = 0.4 + 0.2 * (rand::random::<f64>() - 0.5);
            FocusObservation::face(FaceMeasurements::new(eye, gaze, nose))
                .with_disallowed_object(rand::random::<f64>() < 0.05)
        })
        .collect()
}

fn benchmark_focus(c: &mut Criterion) {
    let mut group = c.benchmark_group("focus");
    let observations = noisy_observations(200);

    let mut calibrated = FocusAnalyzer::new(&FocusConfig::default());
    for observation in &observations[..20] {
        calibrated.process(observation);
    }

    group.bench_function("single_update", |b| {
        let mut analyzer = calibrated.clone();
        b.iter(|| black_box(analyzer.process(black_box(&observations[0]))));
    });

    group.bench_with_input(BenchmarkId::new("sequence", 200), &observations, |b, data| {
        b.iter(|| {
            let mut analyzer = FocusAnalyzer::new(&FocusConfig::default());
            for observation in data {
                black_box(analyzer.process(observation));
            }
        });
    });

    let pose = SubjectPose::attentive(640, 480);
    let landmarks = pose.landmarks(640, 480);
    group.bench_function("measure_landmarks", |b| {
        b.iter(|| black_box(FaceMeasurements::from_landmarks(black_box(&landmarks), 640, 480)));
    });

    group.finish();
}

fn benchmark_tracking(c: &mut Criterion) {
    let mut group = c.benchmark_group("tracking");

    let positions: Vec<(f64, f64)> = (0..100)
        .map(|_| (640.0 * rand::random::<f64>(), 480.0 * rand::random::<f64>()))
        .collect();

    group.bench_with_input(BenchmarkId::new("pid", 100), &positions, |b, data| {
        b.iter(|| {
            let mut pid = PidController::new(0.006, 0.0003, 0.001);
            for &(x, y) in data {
                black_box(pid.compute(Axes::new(320.0, 240.0), Axes::new(x, y)));
            }
        });
    });

    let detections: Vec<DetectionResult> = positions
        .iter()
        .map(|&(x, y)| {
            #[allow(clippy::cast_possible_truncation)]
            let bbox = BoundingBox::new(x as i32 - 40, y as i32 - 40, 80, 80);
            DetectionResult::Face(FaceDetection {
                bbox,
                landmarks: None,
                confidence: 0.9,
            })
        })
        .collect();

    group.bench_with_input(BenchmarkId::new("tracker_step", 100), &detections, |b, data| {
        let cancel = CancellationToken::new();
        b.iter(|| {
            let rig = PanTiltRig::new(Box::new(RecordingActuator::new()), &ServoConfig::default());
            let mut tracker = FaceTracker::new(rig, &TrackingConfig::default(), &PidConfig::default());
            for detection in data {
                black_box(tracker.track(detection, 640, 480, &cancel).ok());
            }
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_focus, benchmark_tracking);
criterion_main!(benches);
