// Core modules
pub mod common;
pub mod core;
pub mod replay;
pub mod storage;

// Re-export commonly used types
pub use common::{Config, FaceGateError, Result};
pub use core::{
    default_registration_steps, score_similarity, verification_steps, verify_match,
    CaptureSession, CapturedArtifact, Embedding, FaceBox, FaceObservation, FrameContext,
    FrameVerdict, HeadRotation, LandmarkKind, PoseTarget, QualityAnalysis,
    RegistrationProgress, SessionState, StabilityGate, StepEvent, StepSpec,
};
pub use replay::FrameRecord;
pub use storage::{SessionRecord, SessionStore};
