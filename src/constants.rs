//! Constants used throughout the application

/// Default capture width in pixels
pub const DEFAULT_FRAME_WIDTH: u32 = 640;

/// Default capture height in pixels
pub const DEFAULT_FRAME_HEIGHT: u32 = 480;

/// Process every Nth captured frame
pub const DEFAULT_FRAME_SKIP: u32 = 3;

/// Camera acquisition attempts before `start()` fails
pub const DEFAULT_CAMERA_RETRIES: u32 = 5;

/// Delay between camera acquisition attempts
pub const DEFAULT_CAMERA_BACKOFF_MS: u64 = 1000;

/// Delay after a failed capture inside the loop
pub const DEFAULT_CAPTURE_FAILURE_BACKOFF_MS: u64 = 50;

/// GPIO (BCM) pin driving the pan servo
pub const PAN_CHANNEL: u8 = 17;

/// GPIO (BCM) pin driving the tilt servo
pub const TILT_CHANNEL: u8 = 27;

/// Initial pan angle in degrees
pub const INITIAL_PAN_ANGLE: f64 = 90.0;

/// Initial tilt angle in degrees
pub const INITIAL_TILT_ANGLE: f64 = 60.0;

/// Servo travel limits in degrees
pub const SERVO_MIN_ANGLE: f64 = 0.0;
pub const SERVO_MAX_ANGLE: f64 = 180.0;

/// 50 Hz hobby servo: 0° = 2.5 % duty, 180° = 12.5 % duty
pub const DUTY_AT_MIN_ANGLE: f64 = 2.5;
pub const DUTY_SPAN: f64 = 10.0;

/// Duty written to stop the pulse train
pub const NEUTRAL_DUTY: f64 = 0.0;

/// Smooth ramp defaults
pub const DEFAULT_RAMP_STEPS: u32 = 20;
pub const DEFAULT_RAMP_DELAY_MS: u64 = 10;

/// Wait after servo initialisation before tracking
pub const DEFAULT_SETTLE_MS: u64 = 2000;

/// PID gains
pub const DEFAULT_KP: f64 = 0.006;
pub const DEFAULT_KI: f64 = 0.0003;
pub const DEFAULT_KD: f64 = 0.001;

/// Face-centre smoothing window
pub const DEFAULT_TRACKING_WINDOW: usize = 5;

/// Calibration sample count (K)
pub const DEFAULT_CALIBRATION_FRAMES: usize = 20;

/// Eyes count as closed below this fraction of the calibrated openness
pub const DEFAULT_EYE_CLOSE_RATIO: f64 = 0.60;

/// Consecutive closed-eye frames before "Sleeping"
pub const DEFAULT_SLEEP_FRAMES: u32 = 15;

/// Allowed gaze deviation from the calibrated centre
pub const DEFAULT_GAZE_TOLERANCE: f64 = 0.18;

/// Allowed nose drop below the calibrated height
pub const DEFAULT_HEAD_DOWN_TOLERANCE: f64 = 0.15;

/// Gaze smoothing window
pub const DEFAULT_GAZE_WINDOW: usize = 5;

/// COCO class id of "cell phone"
pub const PHONE_CLASS_ID: u32 = 67;

/// Minimum confidence for an auxiliary object to count
pub const DEFAULT_AUXILIARY_CONFIDENCE: f32 = 0.5;

/// Score bounds
pub const MAX_SCORE: f64 = 100.0;
pub const MIN_SCORE: f64 = 0.0;

/// Score deltas per classified frame
pub const PHONE_PENALTY: f64 = 5.0;
pub const SLEEP_PENALTY: f64 = 2.0;
pub const ABSENT_PENALTY: f64 = 1.0;
pub const HEAD_DOWN_PENALTY: f64 = 1.0;
pub const GAZE_PENALTY: f64 = 0.5;
pub const FOCUS_REWARD: f64 = 0.5;

/// Neutral gaze ratio used before any history exists
pub const NEUTRAL_GAZE: f64 = 0.5;

/// Face mesh indices of the landmarks used for scoring
pub const MESH_LEFT_IRIS: usize = 473;
pub const MESH_LEFT_EYE_OUTER: usize = 33;
pub const MESH_LEFT_EYE_INNER: usize = 133;
pub const MESH_LEFT_EYE_TOP: usize = 159;
pub const MESH_LEFT_EYE_BOTTOM: usize = 145;
pub const MESH_NOSE_TIP: usize = 1;
