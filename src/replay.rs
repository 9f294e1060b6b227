//! JSON-lines frame recordings.
//!
//! The camera and detector are external collaborators; the CLI and tests
//! drive sessions from recorded observations instead. One JSON object per
//! line: the observation plus the frame's luminance/sharpness scalars.

use crate::common::error::{FaceGateError, Result};
use crate::core::observation::{FaceObservation, FrameContext};
use serde::{Deserialize, Serialize};
use std::io::BufRead;

/// One recorded frame: detector output plus image-pipeline scalars.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRecord {
    #[serde(flatten)]
    pub observation: FaceObservation,
    pub luminance: f32,
    pub sharpness: f32,
}

impl FrameRecord {
    pub fn context(&self) -> FrameContext {
        FrameContext {
            luminance: self.luminance,
            sharpness: self.sharpness,
        }
    }
}

/// Read a whole recording. A malformed line is a stream fault carrying the
/// line number.
pub fn read_frames(reader: impl BufRead) -> Result<Vec<FrameRecord>> {
    let mut frames = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: FrameRecord = serde_json::from_str(&line).map_err(|e| {
            FaceGateError::Stream(format!("malformed frame on line {}: {}", index + 1, e))
        })?;
        frames.push(record);
    }
    Ok(frames)
}

pub fn read_frames_from_path(path: &std::path::Path) -> Result<Vec<FrameRecord>> {
    let file = std::fs::File::open(path)?;
    read_frames(std::io::BufReader::new(file))
}
