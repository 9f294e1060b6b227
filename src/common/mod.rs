pub mod config;
pub mod error;

pub use config::{Config, GateConfig, PoseConfig, QualityConfig, StorageConfig, VerifyConfig};
pub use error::{FaceGateError, Result};
