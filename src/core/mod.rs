pub mod gate;
pub mod observation;
pub mod pose;
pub mod quality;
pub mod session;
pub mod similarity;

pub use gate::{GateSignal, StabilityGate};
pub use observation::{ContourKind, FaceBox, FaceObservation, FrameContext, HeadRotation, LandmarkKind, Point2};
pub use pose::{LookDirection, PoseCheck, PoseTarget, StepSpec, TargetKind};
pub use quality::QualityAnalysis;
pub use session::{
    default_registration_steps, verification_steps, CaptureSession, CapturedArtifact,
    FrameVerdict, RegistrationProgress, SessionState, StepEvent,
};
pub use similarity::{average_embeddings, score_similarity, verify_match, Embedding};
