use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One 2D point in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

/// Face bounding box in frame coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FaceBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl FaceBox {
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn center_x(&self) -> f32 {
        (self.x1 + self.x2) / 2.0
    }

    pub fn contains(&self, point: &Point2) -> bool {
        point.x >= self.x1 && point.x <= self.x2 && point.y >= self.y1 && point.y <= self.y2
    }
}

/// The fixed set of single-point landmarks a detector may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkKind {
    LeftEye,
    RightEye,
    NoseBase,
    MouthLeft,
    MouthRight,
    LeftEar,
    RightEar,
    LeftCheek,
    RightCheek,
}

impl LandmarkKind {
    pub const ALL: [LandmarkKind; 9] = [
        LandmarkKind::LeftEye,
        LandmarkKind::RightEye,
        LandmarkKind::NoseBase,
        LandmarkKind::MouthLeft,
        LandmarkKind::MouthRight,
        LandmarkKind::LeftEar,
        LandmarkKind::RightEar,
        LandmarkKind::LeftCheek,
        LandmarkKind::RightCheek,
    ];

    /// Landmarks a frame must carry to be scorable at all.
    pub const REQUIRED: [LandmarkKind; 3] = [
        LandmarkKind::LeftEye,
        LandmarkKind::RightEye,
        LandmarkKind::NoseBase,
    ];
}

/// The fixed set of multi-point contours a detector may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContourKind {
    FaceOval,
    LeftEyebrow,
    RightEyebrow,
    LeftEye,
    RightEye,
    UpperLip,
    LowerLip,
    NoseBridge,
}

impl ContourKind {
    pub const ALL: [ContourKind; 8] = [
        ContourKind::FaceOval,
        ContourKind::LeftEyebrow,
        ContourKind::RightEyebrow,
        ContourKind::LeftEye,
        ContourKind::RightEye,
        ContourKind::UpperLip,
        ContourKind::LowerLip,
        ContourKind::NoseBridge,
    ];

    /// Number of points a complete contour of this kind carries.
    pub fn expected_points(&self) -> usize {
        match self {
            ContourKind::FaceOval => 36,
            ContourKind::LeftEyebrow | ContourKind::RightEyebrow => 5,
            ContourKind::LeftEye | ContourKind::RightEye => 16,
            ContourKind::UpperLip | ContourKind::LowerLip => 9,
            ContourKind::NoseBridge => 2,
        }
    }
}

/// Head rotation reported by the detector, signed degrees.
///
/// Positive yaw is the head turned to the subject's right; positive pitch is
/// the head tilted up.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct HeadRotation {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

/// One detector output for one frame. Ephemeral: owned by the current
/// processing cycle, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceObservation {
    pub bounds: FaceBox,
    #[serde(default)]
    pub landmarks: BTreeMap<LandmarkKind, Point2>,
    #[serde(default)]
    pub contours: BTreeMap<ContourKind, Vec<Point2>>,
    pub rotation: HeadRotation,
    pub left_eye_open: f32,
    pub right_eye_open: f32,
    pub smile: f32,
}

impl FaceObservation {
    /// Mean of the two eye-open probabilities.
    pub fn eye_openness(&self) -> f32 {
        (self.left_eye_open + self.right_eye_open) / 2.0
    }

    /// True when every landmark the scorer depends on is present.
    pub fn has_required_landmarks(&self) -> bool {
        LandmarkKind::REQUIRED
            .iter()
            .all(|kind| self.landmarks.contains_key(kind))
    }
}

/// Per-frame scalars precomputed by the image pipeline and handed in
/// alongside the observation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FrameContext {
    /// Mean luminance of the frame, 8-bit units.
    pub luminance: f32,
    /// Edge-energy sharpness statistic of the frame.
    pub sharpness: f32,
}
