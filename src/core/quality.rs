use crate::common::config::{PoseConfig, QualityConfig};
use crate::core::observation::{ContourKind, FaceObservation, FrameContext, LandmarkKind};
use crate::core::pose::{self, LookDirection, PoseTarget};
use serde::{Deserialize, Serialize};

// Fixed aggregation weights, summing to 1.0. Pose and sharpness dominate
// because a blurred or off-pose capture is unusable regardless of the rest;
// contour completeness matters least.
const W_LIGHTING: f32 = 0.15;
const W_SHARPNESS: f32 = 0.20;
const W_POSE: f32 = 0.20;
const W_SYMMETRY: f32 = 0.10;
const W_EYE_OPENNESS: f32 = 0.10;
const W_MOUTH_VISIBILITY: f32 = 0.10;
const W_LANDMARK_QUALITY: f32 = 0.10;
const W_CONTOUR_COMPLETENESS: f32 = 0.05;

// Per-metric floors below which an issue tag is emitted.
const MIN_LIGHTING: f32 = 0.4;
const MIN_SHARPNESS_SCORE: f32 = 0.5;
const MIN_POSE: f32 = 0.5;
const MIN_SYMMETRY: f32 = 0.4;
const MIN_EYE_OPENNESS: f32 = 0.4;
const MIN_MOUTH_VISIBILITY: f32 = 0.5;
const MIN_LANDMARK_QUALITY: f32 = 0.6;
const MIN_CONTOUR_COMPLETENESS: f32 = 0.5;

/// Multi-metric assessment of one frame's suitability for capture.
///
/// `overall` is always the fixed weighted mean of the eight sub-scores,
/// never set independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityAnalysis {
    pub lighting: f32,
    pub sharpness: f32,
    pub pose: f32,
    pub symmetry: f32,
    pub eye_openness: f32,
    pub mouth_visibility: f32,
    pub landmark_quality: f32,
    pub contour_completeness: f32,
    pub overall: f32,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

impl QualityAnalysis {
    /// Score one observation against one step target.
    ///
    /// Never fails on a low-quality frame. A frame missing required landmark
    /// keys comes back all-zero with the `insufficient_landmarks` issue.
    pub fn evaluate(
        observation: &FaceObservation,
        context: &FrameContext,
        target: &PoseTarget,
        quality: &QualityConfig,
        pose_config: &PoseConfig,
    ) -> Self {
        if !observation.has_required_landmarks() {
            return Self::insufficient_landmarks();
        }

        let lighting = lighting_score(context.luminance, quality.ideal_luminance);
        let sharpness = sharpness_score(context.sharpness, quality.min_sharpness);
        let pose = pose_score(observation, target, pose_config);
        let symmetry = symmetry_score(observation);
        let eye_openness = observation.eye_openness().clamp(0.0, 1.0);
        let contour_completeness = contour_completeness_score(observation);
        let landmark_quality = landmark_quality_score(observation);
        let mouth_visibility = mouth_visibility_score(observation);

        let overall = weighted_overall(&[
            lighting,
            sharpness,
            pose,
            symmetry,
            eye_openness,
            mouth_visibility,
            landmark_quality,
            contour_completeness,
        ]);

        let mut analysis = Self {
            lighting,
            sharpness,
            pose,
            symmetry,
            eye_openness,
            mouth_visibility,
            landmark_quality,
            contour_completeness,
            overall,
            issues: Vec::new(),
            recommendations: Vec::new(),
        };
        analysis.collect_tags(context, target, quality);
        analysis
    }

    fn insufficient_landmarks() -> Self {
        Self {
            lighting: 0.0,
            sharpness: 0.0,
            pose: 0.0,
            symmetry: 0.0,
            eye_openness: 0.0,
            mouth_visibility: 0.0,
            landmark_quality: 0.0,
            contour_completeness: 0.0,
            overall: 0.0,
            issues: vec!["insufficient_landmarks".to_string()],
            recommendations: vec!["Keep your face fully visible to the camera".to_string()],
        }
    }

    fn collect_tags(&mut self, context: &FrameContext, target: &PoseTarget, quality: &QualityConfig) {
        let mut tag = |issue: &str, recommendation: &str| {
            self.issues.push(issue.to_string());
            self.recommendations.push(recommendation.to_string());
        };

        if self.lighting < MIN_LIGHTING {
            if context.luminance < quality.ideal_luminance {
                tag("low_light", "Move to a brighter area");
            } else {
                tag("overexposed", "Reduce direct light on your face");
            }
        }
        if self.sharpness < MIN_SHARPNESS_SCORE {
            tag("blurry", "Hold still while capturing");
        }
        if self.pose < MIN_POSE {
            tag("off_pose", "Follow the on-screen pose instruction");
        }
        if self.symmetry < MIN_SYMMETRY {
            tag("asymmetric_view", "Face the camera directly");
        }
        // Blink steps want the eyes shut at the capture instant, so low
        // openness is not an issue there.
        if self.eye_openness < MIN_EYE_OPENNESS && !matches!(target, PoseTarget::Blink) {
            tag("eyes_closed", "Keep your eyes open");
        }
        if self.mouth_visibility < MIN_MOUTH_VISIBILITY {
            tag("mouth_occluded", "Remove anything covering your mouth");
        }
        if self.landmark_quality < MIN_LANDMARK_QUALITY {
            tag("partial_face", "Move so your whole face is in view");
        }
        if self.contour_completeness < MIN_CONTOUR_COMPLETENESS {
            tag("incomplete_contours", "Move closer to the camera");
        }
    }

    /// Check if the quality meets a minimum requirement.
    pub fn meets_minimum(&self, min_quality: f32) -> bool {
        self.overall >= min_quality
    }

    /// Get a human-readable quality assessment.
    pub fn assessment(&self) -> String {
        let quality_level = if self.overall >= 0.8 {
            "Excellent"
        } else if self.overall >= 0.7 {
            "Good"
        } else if self.overall >= 0.6 {
            "Acceptable"
        } else if self.overall >= 0.5 {
            "Poor"
        } else {
            "Very Poor"
        };

        format!("Quality: {} (score: {:.2})", quality_level, self.overall)
    }
}

fn weighted_overall(scores: &[f32; 8]) -> f32 {
    scores[0] * W_LIGHTING
        + scores[1] * W_SHARPNESS
        + scores[2] * W_POSE
        + scores[3] * W_SYMMETRY
        + scores[4] * W_EYE_OPENNESS
        + scores[5] * W_MOUTH_VISIBILITY
        + scores[6] * W_LANDMARK_QUALITY
        + scores[7] * W_CONTOUR_COMPLETENESS
}

// Symmetric penalty for under- and over-exposure around the ideal band.
fn lighting_score(luminance: f32, ideal: f32) -> f32 {
    (1.0 - ((luminance - ideal).abs() / ideal)).clamp(0.0, 1.0)
}

// Quadratic falloff below the minimum acceptable statistic, so marginal blur
// costs more than proportionally.
fn sharpness_score(sharpness: f32, min_acceptable: f32) -> f32 {
    let ratio = (sharpness / min_acceptable.max(f32::EPSILON)).max(0.0);
    if ratio >= 1.0 {
        1.0
    } else {
        ratio * ratio
    }
}

// 1.0 within the step's tolerance, linear decay to 0 at twice the tolerance.
fn band_score(deviation: f32, tolerance: f32) -> f32 {
    (2.0 - deviation / tolerance.max(f32::EPSILON)).clamp(0.0, 1.0)
}

fn pose_score(observation: &FaceObservation, target: &PoseTarget, pose_config: &PoseConfig) -> f32 {
    let rotation = &observation.rotation;
    match target {
        PoseTarget::Neutral { tolerance_deg } => {
            band_score(rotation.yaw.abs().max(rotation.pitch.abs()), *tolerance_deg)
        }
        PoseTarget::Look { direction, min_deg, band_deg } => {
            let (relevant, orthogonal) = match direction {
                LookDirection::Left => (-rotation.yaw, rotation.pitch),
                LookDirection::Right => (rotation.yaw, rotation.pitch),
                LookDirection::Up => (rotation.pitch, rotation.yaw),
                LookDirection::Down => (-rotation.pitch, rotation.yaw),
            };
            if relevant >= *min_deg && orthogonal.abs() <= *band_deg {
                1.0
            } else {
                pose::classify(observation, target).closeness
            }
        }
        // Action steps assume a roughly frontal face.
        PoseTarget::Smile { .. } | PoseTarget::Blink => band_score(
            rotation.yaw.abs().max(rotation.pitch.abs()),
            pose_config.neutral_tolerance_deg,
        ),
    }
}

// Mirror consistency of left/right landmark pairs about the face midline.
// Independent of pose closeness: a severe turn shows up here even when the
// step asked for it.
fn symmetry_score(observation: &FaceObservation) -> f32 {
    const PAIRS: [(LandmarkKind, LandmarkKind); 3] = [
        (LandmarkKind::LeftEye, LandmarkKind::RightEye),
        (LandmarkKind::MouthLeft, LandmarkKind::MouthRight),
        (LandmarkKind::LeftCheek, LandmarkKind::RightCheek),
    ];

    let width = observation.bounds.width();
    let height = observation.bounds.height();
    if width <= 0.0 || height <= 0.0 {
        return 0.0;
    }
    let midline = observation.bounds.center_x();

    let mut total = 0.0f32;
    let mut pairs_seen = 0u32;
    for (left_kind, right_kind) in PAIRS {
        let (Some(left), Some(right)) = (
            observation.landmarks.get(&left_kind),
            observation.landmarks.get(&right_kind),
        ) else {
            continue;
        };

        let x_imbalance = ((midline - left.x) - (right.x - midline)).abs() / width;
        let y_offset = (left.y - right.y).abs() / height;
        total += (1.0 - (x_imbalance + y_offset)).clamp(0.0, 1.0);
        pairs_seen += 1;
    }

    if pairs_seen == 0 {
        // No pair available to judge; landmark_quality carries the penalty.
        0.5
    } else {
        total / pairs_seen as f32
    }
}

fn mouth_visibility_score(observation: &FaceObservation) -> f32 {
    let corners_present = observation.landmarks.contains_key(&LandmarkKind::MouthLeft)
        && observation.landmarks.contains_key(&LandmarkKind::MouthRight);
    if !corners_present {
        return 0.0;
    }

    // Occlusion proxy: how complete the lip contours came back.
    let expected = ContourKind::UpperLip.expected_points() + ContourKind::LowerLip.expected_points();
    let returned = [ContourKind::UpperLip, ContourKind::LowerLip]
        .iter()
        .map(|kind| {
            observation
                .contours
                .get(kind)
                .map_or(0, |points| points.len().min(kind.expected_points()))
        })
        .sum::<usize>();

    let completeness = returned as f32 / expected as f32;
    if completeness >= 0.8 {
        1.0
    } else {
        completeness
    }
}

fn landmark_quality_score(observation: &FaceObservation) -> f32 {
    let present = LandmarkKind::ALL
        .iter()
        .filter(|&kind| {
            observation
                .landmarks
                .get(kind)
                .is_some_and(|point| observation.bounds.contains(point))
        })
        .count();
    present as f32 / LandmarkKind::ALL.len() as f32
}

fn contour_completeness_score(observation: &FaceObservation) -> f32 {
    let expected: usize = ContourKind::ALL.iter().map(|kind| kind.expected_points()).sum();
    let returned: usize = ContourKind::ALL
        .iter()
        .map(|kind| {
            observation
                .contours
                .get(kind)
                .map_or(0, |points| points.len().min(kind.expected_points()))
        })
        .sum();
    returned as f32 / expected as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::observation::{FaceBox, HeadRotation, Point2};
    use std::collections::BTreeMap;

    fn full_observation() -> FaceObservation {
        let mut landmarks = BTreeMap::new();
        landmarks.insert(LandmarkKind::LeftEye, Point2 { x: 35.0, y: 40.0 });
        landmarks.insert(LandmarkKind::RightEye, Point2 { x: 65.0, y: 40.0 });
        landmarks.insert(LandmarkKind::NoseBase, Point2 { x: 50.0, y: 55.0 });
        landmarks.insert(LandmarkKind::MouthLeft, Point2 { x: 40.0, y: 70.0 });
        landmarks.insert(LandmarkKind::MouthRight, Point2 { x: 60.0, y: 70.0 });
        landmarks.insert(LandmarkKind::LeftEar, Point2 { x: 15.0, y: 45.0 });
        landmarks.insert(LandmarkKind::RightEar, Point2 { x: 85.0, y: 45.0 });
        landmarks.insert(LandmarkKind::LeftCheek, Point2 { x: 30.0, y: 60.0 });
        landmarks.insert(LandmarkKind::RightCheek, Point2 { x: 70.0, y: 60.0 });

        let mut contours = BTreeMap::new();
        for kind in ContourKind::ALL {
            contours.insert(
                kind,
                vec![Point2 { x: 50.0, y: 50.0 }; kind.expected_points()],
            );
        }

        FaceObservation {
            bounds: FaceBox { x1: 10.0, y1: 10.0, x2: 90.0, y2: 90.0 },
            landmarks,
            contours,
            rotation: HeadRotation::default(),
            left_eye_open: 0.95,
            right_eye_open: 0.95,
            smile: 0.1,
        }
    }

    fn good_context() -> FrameContext {
        FrameContext { luminance: 127.5, sharpness: 60.0 }
    }

    fn neutral() -> PoseTarget {
        PoseTarget::Neutral { tolerance_deg: 10.0 }
    }

    #[test]
    fn good_frame_scores_high() {
        let analysis = QualityAnalysis::evaluate(
            &full_observation(),
            &good_context(),
            &neutral(),
            &QualityConfig::default(),
            &PoseConfig::default(),
        );
        assert!(analysis.overall > 0.85, "got {}", analysis.overall);
        assert!(analysis.issues.is_empty(), "issues: {:?}", analysis.issues);
        assert!(analysis.meets_minimum(0.7));
    }

    #[test]
    fn missing_required_landmarks_zero_scores() {
        let mut obs = full_observation();
        obs.landmarks.remove(&LandmarkKind::NoseBase);
        let analysis = QualityAnalysis::evaluate(
            &obs,
            &good_context(),
            &neutral(),
            &QualityConfig::default(),
            &PoseConfig::default(),
        );
        assert_eq!(analysis.overall, 0.0);
        assert_eq!(analysis.issues, vec!["insufficient_landmarks".to_string()]);
    }

    #[test]
    fn overall_is_monotone_in_each_subscore() {
        let base = [0.5f32; 8];
        let baseline = weighted_overall(&base);
        for i in 0..8 {
            let mut raised = base;
            raised[i] = 0.9;
            assert!(
                weighted_overall(&raised) > baseline,
                "raising sub-score {} did not raise overall",
                i
            );
        }
    }

    #[test]
    fn weights_sum_to_one() {
        let sum = W_LIGHTING
            + W_SHARPNESS
            + W_POSE
            + W_SYMMETRY
            + W_EYE_OPENNESS
            + W_MOUTH_VISIBILITY
            + W_LANDMARK_QUALITY
            + W_CONTOUR_COMPLETENESS;
        assert!((sum - 1.0).abs() < 1e-6);
        assert!((weighted_overall(&[1.0; 8]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn lighting_penalizes_both_directions() {
        let dark = lighting_score(40.0, 127.5);
        let bright = lighting_score(215.0, 127.5);
        let ideal = lighting_score(127.5, 127.5);
        assert_eq!(ideal, 1.0);
        assert!(dark < 0.5);
        assert!((dark - bright).abs() < 0.01);
    }

    #[test]
    fn sharpness_degrades_quadratically_below_minimum() {
        assert_eq!(sharpness_score(50.0, 25.0), 1.0);
        assert_eq!(sharpness_score(25.0, 25.0), 1.0);
        let half = sharpness_score(12.5, 25.0);
        assert!((half - 0.25).abs() < 1e-6, "got {}", half);
    }

    #[test]
    fn pose_subscore_decays_to_zero_at_twice_tolerance() {
        let mut obs = full_observation();
        obs.rotation.yaw = 10.0;
        let cfg = QualityConfig::default();
        let pose_cfg = PoseConfig::default();
        let at_tol = QualityAnalysis::evaluate(&obs, &good_context(), &neutral(), &cfg, &pose_cfg);
        assert_eq!(at_tol.pose, 1.0);

        obs.rotation.yaw = 15.0;
        let mid = QualityAnalysis::evaluate(&obs, &good_context(), &neutral(), &cfg, &pose_cfg);
        assert!((mid.pose - 0.5).abs() < 1e-6);

        obs.rotation.yaw = 20.0;
        let at_double = QualityAnalysis::evaluate(&obs, &good_context(), &neutral(), &cfg, &pose_cfg);
        assert_eq!(at_double.pose, 0.0);
    }

    #[test]
    fn low_light_emits_tags() {
        let analysis = QualityAnalysis::evaluate(
            &full_observation(),
            &FrameContext { luminance: 20.0, sharpness: 60.0 },
            &neutral(),
            &QualityConfig::default(),
            &PoseConfig::default(),
        );
        assert!(analysis.issues.contains(&"low_light".to_string()));
        assert!(analysis
            .recommendations
            .contains(&"Move to a brighter area".to_string()));
    }

    #[test]
    fn closed_eyes_not_an_issue_for_blink_steps() {
        let mut obs = full_observation();
        obs.left_eye_open = 0.1;
        obs.right_eye_open = 0.1;
        let cfg = QualityConfig::default();
        let pose_cfg = PoseConfig::default();
        let ctx = good_context();

        let neutral_run = QualityAnalysis::evaluate(&obs, &ctx, &neutral(), &cfg, &pose_cfg);
        assert!(neutral_run.issues.contains(&"eyes_closed".to_string()));

        let blink_run = QualityAnalysis::evaluate(&obs, &ctx, &PoseTarget::Blink, &cfg, &pose_cfg);
        assert!(!blink_run.issues.contains(&"eyes_closed".to_string()));
    }

    #[test]
    fn missing_mouth_contours_lower_visibility() {
        let mut obs = full_observation();
        obs.contours.remove(&ContourKind::UpperLip);
        obs.contours.remove(&ContourKind::LowerLip);
        let analysis = QualityAnalysis::evaluate(
            &obs,
            &good_context(),
            &neutral(),
            &QualityConfig::default(),
            &PoseConfig::default(),
        );
        assert_eq!(analysis.mouth_visibility, 0.0);
        assert!(analysis.issues.contains(&"mouth_occluded".to_string()));
    }

    #[test]
    fn severe_turn_lowers_symmetry() {
        let mut obs = full_observation();
        // Shove the left-side landmarks toward the midline, as a hard turn does.
        obs.landmarks.insert(LandmarkKind::LeftEye, Point2 { x: 48.0, y: 40.0 });
        obs.landmarks.insert(LandmarkKind::MouthLeft, Point2 { x: 48.0, y: 70.0 });
        obs.landmarks.insert(LandmarkKind::LeftCheek, Point2 { x: 49.0, y: 60.0 });
        let analysis = QualityAnalysis::evaluate(
            &obs,
            &good_context(),
            &neutral(),
            &QualityConfig::default(),
            &PoseConfig::default(),
        );
        assert!(analysis.symmetry < 0.9, "got {}", analysis.symmetry);
    }
}
