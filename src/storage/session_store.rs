use crate::common::config::StorageConfig;
use crate::common::error::{FaceGateError, Result};
use crate::core::session::CapturedArtifact;
use crate::core::similarity::{average_embeddings, Embedding};
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const STORAGE_VERSION: u32 = 1;

/// One persisted capture: the step it satisfied, its quality, and the
/// embedding the collaborator computed for it. Frame pixels are not stored.
#[derive(Serialize, Deserialize)]
pub struct StoredArtifact {
    pub step_id: String,
    pub overall_quality: f32,
    pub captured_at: DateTime<Utc>,
    pub embedding: Option<Embedding>,
}

/// A completed registration session, ready for the verification flow.
#[derive(Serialize, Deserialize)]
pub struct SessionRecord {
    pub version: u32,
    pub subject: String,
    pub artifacts: Vec<StoredArtifact>,
    #[serde(default)]
    pub fused_embedding: Option<Embedding>,
}

impl SessionRecord {
    pub fn from_artifacts(subject: &str, artifacts: &[CapturedArtifact]) -> Self {
        let embeddings: Vec<Embedding> = artifacts
            .iter()
            .filter_map(|a| a.embedding().map(|e| e.to_vec()))
            .collect();
        let fused_embedding = if embeddings.is_empty() {
            None
        } else {
            Some(average_embeddings(&embeddings))
        };

        Self {
            version: STORAGE_VERSION,
            subject: subject.to_string(),
            artifacts: artifacts
                .iter()
                .map(|a| StoredArtifact {
                    step_id: a.step_id.clone(),
                    overall_quality: a.quality.overall,
                    captured_at: a.captured_at,
                    embedding: a.embedding().map(|e| e.to_vec()),
                })
                .collect(),
            fused_embedding,
        }
    }
}

/// Bincode-on-disk store for completed session records. This is the
/// persistence collaborator; the capture core never calls it.
pub struct SessionStore {
    data_dir: PathBuf,
}

impl SessionStore {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let data_dir = match &config.sessions_dir {
            Some(dir) => dir.clone(),
            None => ProjectDirs::from("com", "facegate", "FaceGate")
                .ok_or_else(|| FaceGateError::Storage("Failed to get project dirs".into()))?
                .data_dir()
                .join("sessions"),
        };
        fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    pub fn save(&self, record: &SessionRecord) -> Result<()> {
        let path = self.record_path(&record.subject);
        let encoded = bincode::serialize(record)
            .map_err(|e| FaceGateError::Storage(format!("Failed to serialize: {}", e)))?;
        fs::write(path, encoded)?;
        Ok(())
    }

    pub fn load(&self, subject: &str) -> Result<SessionRecord> {
        let path = self.record_path(subject);
        if !path.exists() {
            return Err(FaceGateError::Storage(format!(
                "no stored session for '{}'", subject
            )));
        }

        let data = fs::read(path)?;
        let mut record: SessionRecord = bincode::deserialize(&data)
            .map_err(|e| FaceGateError::Storage(format!("Failed to deserialize: {}", e)))?;

        if record.version < STORAGE_VERSION {
            record.version = STORAGE_VERSION;
        }

        Ok(record)
    }

    fn record_path(&self, subject: &str) -> PathBuf {
        self.data_dir.join(format!("{}.bincode", subject))
    }
}
