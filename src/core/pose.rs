use crate::core::observation::{FaceObservation, HeadRotation};
use serde::{Deserialize, Serialize};

/// Which way a directional look step points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookDirection {
    Left,
    Right,
    Up,
    Down,
}

/// How the stability gate must treat a target: sustained targets need a run
/// of consecutive qualifying frames, one-shot targets fire on a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Sustained,
    OneShot,
}

/// The pose or action one registration step requires.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PoseTarget {
    /// Yaw and pitch both within `tolerance_deg` of zero.
    Neutral { tolerance_deg: f32 },
    /// The relevant angle past `min_deg` in the correct sign while the
    /// orthogonal angle stays inside `band_deg`.
    Look {
        direction: LookDirection,
        min_deg: f32,
        band_deg: f32,
    },
    /// Smile probability at or above `min_probability`, sustained.
    Smile { min_probability: f32 },
    /// Eye-openness transition from open to closed; one-shot.
    Blink,
}

impl PoseTarget {
    pub fn kind(&self) -> TargetKind {
        match self {
            PoseTarget::Blink => TargetKind::OneShot,
            _ => TargetKind::Sustained,
        }
    }
}

/// Immutable definition of one registration step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    pub id: String,
    pub title: String,
    pub target: PoseTarget,
    /// Minimum acceptable overall quality for this step's capture.
    pub min_quality: f32,
    /// Position in the registration sequence, starting at 0.
    pub ordinal: usize,
}

/// Result of classifying one frame against one target.
#[derive(Debug, Clone, Copy)]
pub struct PoseCheck {
    pub satisfied: bool,
    /// How close the frame is to the target, in [0, 1].
    pub closeness: f32,
}

/// Classify a frame against a step target.
///
/// Blink is a one-shot action decided by the stability gate's openness
/// history; here it only reports closeness (how shut the eyes are) and never
/// satisfies on its own.
pub fn classify(observation: &FaceObservation, target: &PoseTarget) -> PoseCheck {
    let rotation = &observation.rotation;
    match target {
        PoseTarget::Neutral { tolerance_deg } => neutral_check(rotation, *tolerance_deg),
        PoseTarget::Look { direction, min_deg, band_deg } => {
            look_check(rotation, *direction, *min_deg, *band_deg)
        }
        PoseTarget::Smile { min_probability } => PoseCheck {
            satisfied: observation.smile >= *min_probability,
            closeness: (observation.smile / min_probability.max(f32::EPSILON)).min(1.0),
        },
        PoseTarget::Blink => PoseCheck {
            satisfied: false,
            closeness: 1.0 - observation.eye_openness().clamp(0.0, 1.0),
        },
    }
}

fn neutral_check(rotation: &HeadRotation, tolerance_deg: f32) -> PoseCheck {
    let deviation = rotation.yaw.abs().max(rotation.pitch.abs());
    PoseCheck {
        satisfied: rotation.yaw.abs() <= tolerance_deg && rotation.pitch.abs() <= tolerance_deg,
        closeness: (1.0 - deviation / tolerance_deg.max(f32::EPSILON)).max(0.0),
    }
}

fn look_check(
    rotation: &HeadRotation,
    direction: LookDirection,
    min_deg: f32,
    band_deg: f32,
) -> PoseCheck {
    // Signed angle that must move, and the one that must hold still.
    let (relevant, orthogonal) = match direction {
        LookDirection::Left => (-rotation.yaw, rotation.pitch),
        LookDirection::Right => (rotation.yaw, rotation.pitch),
        LookDirection::Up => (rotation.pitch, rotation.yaw),
        LookDirection::Down => (-rotation.pitch, rotation.yaw),
    };

    let in_band = orthogonal.abs() <= band_deg;
    let satisfied = relevant >= min_deg && in_band;

    let closeness = if relevant <= 0.0 || !in_band {
        0.0
    } else {
        (relevant / min_deg.max(f32::EPSILON)).min(1.0)
    };

    PoseCheck { satisfied, closeness }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::observation::{FaceBox, FaceObservation};
    use std::collections::BTreeMap;

    fn observation(yaw: f32, pitch: f32, smile: f32, eyes: f32) -> FaceObservation {
        FaceObservation {
            bounds: FaceBox { x1: 0.0, y1: 0.0, x2: 100.0, y2: 100.0 },
            landmarks: BTreeMap::new(),
            contours: BTreeMap::new(),
            rotation: HeadRotation { yaw, pitch, roll: 0.0 },
            left_eye_open: eyes,
            right_eye_open: eyes,
            smile,
        }
    }

    #[test]
    fn neutral_within_tolerance() {
        let check = classify(
            &observation(4.0, -3.0, 0.0, 1.0),
            &PoseTarget::Neutral { tolerance_deg: 10.0 },
        );
        assert!(check.satisfied);
        assert!(check.closeness > 0.5);
    }

    #[test]
    fn neutral_outside_tolerance() {
        let check = classify(
            &observation(30.0, 0.0, 0.0, 1.0),
            &PoseTarget::Neutral { tolerance_deg: 10.0 },
        );
        assert!(!check.satisfied);
        assert_eq!(check.closeness, 0.0);
    }

    #[test]
    fn look_left_needs_negative_yaw() {
        let target = PoseTarget::Look {
            direction: LookDirection::Left,
            min_deg: 15.0,
            band_deg: 12.0,
        };
        assert!(classify(&observation(-20.0, 0.0, 0.0, 1.0), &target).satisfied);
        assert!(!classify(&observation(20.0, 0.0, 0.0, 1.0), &target).satisfied);
        assert_eq!(classify(&observation(20.0, 0.0, 0.0, 1.0), &target).closeness, 0.0);
    }

    #[test]
    fn look_rejected_when_orthogonal_leaves_band() {
        let target = PoseTarget::Look {
            direction: LookDirection::Left,
            min_deg: 15.0,
            band_deg: 12.0,
        };
        let check = classify(&observation(-20.0, 25.0, 0.0, 1.0), &target);
        assert!(!check.satisfied);
        assert_eq!(check.closeness, 0.0);
    }

    #[test]
    fn look_up_uses_pitch() {
        let target = PoseTarget::Look {
            direction: LookDirection::Up,
            min_deg: 15.0,
            band_deg: 12.0,
        };
        assert!(classify(&observation(0.0, 18.0, 0.0, 1.0), &target).satisfied);
        assert!(!classify(&observation(0.0, -18.0, 0.0, 1.0), &target).satisfied);
    }

    #[test]
    fn smile_threshold() {
        let target = PoseTarget::Smile { min_probability: 0.7 };
        assert!(classify(&observation(0.0, 0.0, 0.85, 1.0), &target).satisfied);
        assert!(!classify(&observation(0.0, 0.0, 0.4, 1.0), &target).satisfied);
    }

    #[test]
    fn blink_never_satisfies_directly() {
        let check = classify(&observation(0.0, 0.0, 0.0, 0.1), &PoseTarget::Blink);
        assert!(!check.satisfied);
        assert!(check.closeness > 0.85);
        assert_eq!(PoseTarget::Blink.kind(), TargetKind::OneShot);
    }
}
