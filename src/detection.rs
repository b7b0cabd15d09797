//! Detection adapter: the boundary between the control loop and the
//! external face / object detector.
//!
//! The detector itself (model loading, inference) is opaque to the core.
//! It only has to turn a [`Frame`] into a [`DetectionResult`] and a list
//! of [`AuxiliaryObject`]s. "No face" is a normal result; a malformed
//! frame is [`Error::InvalidInput`].

use crate::{
    constants::{
        MESH_LEFT_EYE_BOTTOM, MESH_LEFT_EYE_INNER, MESH_LEFT_EYE_OUTER, MESH_LEFT_EYE_TOP, MESH_LEFT_IRIS,
        MESH_NOSE_TIP,
    },
    Error, Result,
};
use serde::{Deserialize, Serialize};

/// Bytes per pixel of a packed RGB frame
pub const RGB_CHANNELS: usize = 3;

/// Packed RGB image as delivered by the camera
#[derive(Debug, Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap a raw buffer without checking it; see [`Frame::validate`]
    #[must_use]
    pub const fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self { width, height, data }
    }

    /// All-black frame of the given size
    #[must_use]
    pub fn blank(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize * RGB_CHANNELS;
        Self::new(width, height, vec![0; len])
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Check that the buffer matches the declared dimensions
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a zero-sized frame or a buffer
    /// whose length is not `width * height * 3`.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidInput(format!(
                "Frame has zero size: {}x{}",
                self.width, self.height
            )));
        }
        let expected = self.width as usize * self.height as usize * RGB_CHANNELS;
        if self.data.len() != expected {
            return Err(Error::InvalidInput(format!(
                "Frame buffer has {} bytes, expected {expected} for {}x{} RGB",
                self.data.len(),
                self.width,
                self.height
            )));
        }
        Ok(())
    }
}

/// Normalized image coordinate, both axes in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Pixel-space rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Centre pixel, rounded down
    #[must_use]
    pub const fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }
}

/// The six landmarks the attention analyzer reads
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub left_iris: Point2,
    pub left_eye_outer: Point2,
    pub left_eye_inner: Point2,
    pub left_eye_top: Point2,
    pub left_eye_bottom: Point2,
    pub nose_tip: Point2,
}

impl FaceLandmarks {
    /// Pick the scoring landmarks out of a dense (refined) face mesh
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the mesh is too short to contain
    /// the iris landmarks.
    pub fn from_mesh(points: &[Point2]) -> Result<Self> {
        let get = |index: usize| {
            points.get(index).copied().ok_or_else(|| {
                Error::InvalidInput(format!(
                    "Face mesh has {} points, landmark {index} is missing",
                    points.len()
                ))
            })
        };

        Ok(Self {
            left_iris: get(MESH_LEFT_IRIS)?,
            left_eye_outer: get(MESH_LEFT_EYE_OUTER)?,
            left_eye_inner: get(MESH_LEFT_EYE_INNER)?,
            left_eye_top: get(MESH_LEFT_EYE_TOP)?,
            left_eye_bottom: get(MESH_LEFT_EYE_BOTTOM)?,
            nose_tip: get(MESH_NOSE_TIP)?,
        })
    }
}

/// Primary face found in a frame
#[derive(Debug, Clone, PartialEq)]
pub struct FaceDetection {
    /// Bounding box of the detected face
    pub bbox: BoundingBox,
    /// Landmarks, when the detector produces them
    pub landmarks: Option<FaceLandmarks>,
    /// Confidence score of the detection
    pub confidence: f32,
}

/// Outcome of running the face detector on one frame
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionResult {
    NoFace,
    Face(FaceDetection),
}

impl DetectionResult {
    #[must_use]
    pub const fn face(&self) -> Option<&FaceDetection> {
        match self {
            Self::NoFace => None,
            Self::Face(face) => Some(face),
        }
    }

    #[must_use]
    pub fn landmarks(&self) -> Option<&FaceLandmarks> {
        self.face().and_then(|face| face.landmarks.as_ref())
    }
}

/// Non-face object reported by the auxiliary detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxiliaryObject {
    pub class_id: u32,
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Which auxiliary objects count against the subject
#[derive(Debug, Clone, PartialEq)]
pub struct AuxiliaryPolicy {
    disallowed_classes: Vec<u32>,
    min_confidence: f32,
}

impl AuxiliaryPolicy {
    #[must_use]
    pub fn new(disallowed_classes: Vec<u32>, min_confidence: f32) -> Self {
        Self {
            disallowed_classes,
            min_confidence,
        }
    }

    #[must_use]
    pub fn is_disallowed(&self, object: &AuxiliaryObject) -> bool {
        self.disallowed_classes.contains(&object.class_id) && object.confidence >= self.min_confidence
    }

    #[must_use]
    pub fn any_disallowed(&self, objects: &[AuxiliaryObject]) -> bool {
        objects.iter().any(|object| self.is_disallowed(object))
    }
}

/// External face and object detector
pub trait Detector: Send {
    /// Backend identifier
    fn name(&self) -> &str;

    /// Find the primary face in a frame
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a malformed frame. Finding no
    /// face is `Ok(DetectionResult::NoFace)`.
    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult>;

    /// Find handheld objects and similar distractions
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a malformed frame.
    fn detect_auxiliary_objects(&mut self, frame: &Frame) -> Result<Vec<AuxiliaryObject>>;

    /// Free model resources
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceRelease`] if the backend fails to shut down.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
