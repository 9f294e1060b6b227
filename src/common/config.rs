use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use crate::common::error::{FaceGateError, Result};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub pose: PoseConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub verify: VerifyConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QualityConfig {
    /// Mid-point of the acceptable exposure band, in 8-bit luminance units.
    #[serde(default = "default_ideal_luminance")]
    pub ideal_luminance: f32,
    /// Minimum acceptable edge-energy statistic; frames below this degrade
    /// quadratically.
    #[serde(default = "default_min_sharpness")]
    pub min_sharpness: f32,
    /// Default per-step minimum quality when a StepSpec does not override it.
    #[serde(default = "default_min_quality")]
    pub min_quality: f32,
}

fn default_ideal_luminance() -> f32 { 127.5 }
fn default_min_sharpness() -> f32 { 25.0 }
fn default_min_quality() -> f32 { 0.7 }

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            ideal_luminance: default_ideal_luminance(),
            min_sharpness: default_min_sharpness(),
            min_quality: default_min_quality(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PoseConfig {
    /// Yaw/pitch tolerance for the neutral target, degrees.
    #[serde(default = "default_neutral_tolerance")]
    pub neutral_tolerance_deg: f32,
    /// Minimum magnitude a directional look must reach, degrees.
    #[serde(default = "default_look_min")]
    pub look_min_deg: f32,
    /// Band the orthogonal angle must stay within during a directional look.
    #[serde(default = "default_orthogonal_band")]
    pub orthogonal_band_deg: f32,
    /// Smile probability a smile step must sustain.
    #[serde(default = "default_smile_min")]
    pub smile_min_probability: f32,
}

fn default_neutral_tolerance() -> f32 { 10.0 }
fn default_look_min() -> f32 { 15.0 }
fn default_orthogonal_band() -> f32 { 12.0 }
fn default_smile_min() -> f32 { 0.7 }

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            neutral_tolerance_deg: default_neutral_tolerance(),
            look_min_deg: default_look_min(),
            orthogonal_band_deg: default_orthogonal_band(),
            smile_min_probability: default_smile_min(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GateConfig {
    /// Consecutive qualifying frames required before a sustained step arms.
    #[serde(default = "default_required_frames")]
    pub required_frames: u32,
    /// Eye-openness the blink window must have seen before the drop counts.
    #[serde(default = "default_blink_high")]
    pub blink_open_threshold: f32,
    /// Eye-openness at or below which the blink transition fires.
    #[serde(default = "default_blink_low")]
    pub blink_closed_threshold: f32,
    /// Number of recent frames of eye-openness kept for blink detection.
    #[serde(default = "default_blink_window")]
    pub blink_window_frames: usize,
}

fn default_required_frames() -> u32 { 15 }
fn default_blink_high() -> f32 { 0.8 }
fn default_blink_low() -> f32 { 0.2 }
fn default_blink_window() -> usize { 10 }

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            required_frames: default_required_frames(),
            blink_open_threshold: default_blink_high(),
            blink_closed_threshold: default_blink_low(),
            blink_window_frames: default_blink_window(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerifyConfig {
    /// Similarity at or above which two embeddings count as a match.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// Fixed embedding dimensionality accepted by attach_embedding.
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
}

fn default_similarity_threshold() -> f32 { 0.6 }
fn default_embedding_dim() -> usize { 512 }

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            embedding_dim: default_embedding_dim(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StorageConfig {
    /// Overrides the platform data directory for stored session records.
    #[serde(default)]
    pub sessions_dir: Option<PathBuf>,
}

impl Config {
    pub fn load_from_path(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Err(FaceGateError::Config(format!(
                "Config file not found: {}", path.display()
            )));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| FaceGateError::Config(format!("Config parse error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.quality.min_quality < 0.0 || self.quality.min_quality > 1.0 {
            return Err(FaceGateError::Config(format!(
                "min_quality must be between 0.0 and 1.0, got {}",
                self.quality.min_quality
            )));
        }
        if self.quality.min_sharpness <= 0.0 {
            return Err(FaceGateError::Config(format!(
                "min_sharpness must be positive, got {}", self.quality.min_sharpness
            )));
        }
        if self.quality.ideal_luminance <= 0.0 || self.quality.ideal_luminance > 255.0 {
            return Err(FaceGateError::Config(format!(
                "ideal_luminance must be between 0 and 255, got {}",
                self.quality.ideal_luminance
            )));
        }

        if self.pose.neutral_tolerance_deg <= 0.0 || self.pose.neutral_tolerance_deg > 45.0 {
            return Err(FaceGateError::Config(format!(
                "neutral_tolerance_deg must be between 0 and 45, got {}",
                self.pose.neutral_tolerance_deg
            )));
        }
        if self.pose.look_min_deg <= 0.0 || self.pose.look_min_deg > 90.0 {
            return Err(FaceGateError::Config(format!(
                "look_min_deg must be between 0 and 90, got {}", self.pose.look_min_deg
            )));
        }
        if self.pose.smile_min_probability < 0.0 || self.pose.smile_min_probability > 1.0 {
            return Err(FaceGateError::Config(format!(
                "smile_min_probability must be between 0.0 and 1.0, got {}",
                self.pose.smile_min_probability
            )));
        }

        if self.gate.required_frames == 0 {
            return Err(FaceGateError::Config(
                "required_frames must be at least 1".into()
            ));
        }
        if self.gate.blink_window_frames == 0 {
            return Err(FaceGateError::Config(
                "blink_window_frames must be at least 1".into()
            ));
        }
        if self.gate.blink_closed_threshold >= self.gate.blink_open_threshold {
            return Err(FaceGateError::Config(format!(
                "blink_closed_threshold ({}) must be below blink_open_threshold ({})",
                self.gate.blink_closed_threshold, self.gate.blink_open_threshold
            )));
        }
        for (name, v) in [
            ("blink_open_threshold", self.gate.blink_open_threshold),
            ("blink_closed_threshold", self.gate.blink_closed_threshold),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(FaceGateError::Config(format!(
                    "{} must be between 0.0 and 1.0, got {}", name, v
                )));
            }
        }

        if self.verify.similarity_threshold < 0.0 || self.verify.similarity_threshold > 1.0 {
            return Err(FaceGateError::Config(format!(
                "similarity_threshold must be between 0.0 and 1.0, got {}",
                self.verify.similarity_threshold
            )));
        }
        if self.verify.embedding_dim == 0 {
            return Err(FaceGateError::Config(
                "embedding_dim must be at least 1".into()
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let mut config = Config::default();
        config.quality.min_quality = 1.2;
        assert!(matches!(config.validate(), Err(FaceGateError::Config(_))));
    }

    #[test]
    fn rejects_inverted_blink_thresholds() {
        let mut config = Config::default();
        config.gate.blink_closed_threshold = 0.9;
        assert!(matches!(config.validate(), Err(FaceGateError::Config(_))));
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let config: Config = toml::from_str("[gate]\nrequired_frames = 5\n").unwrap();
        assert_eq!(config.gate.required_frames, 5);
        assert_eq!(config.verify.embedding_dim, 512);
        assert!(config.validate().is_ok());
    }
}
