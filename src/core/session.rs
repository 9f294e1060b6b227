use crate::common::config::Config;
use crate::common::error::{FaceGateError, Result};
use crate::core::gate::{GateSignal, StabilityGate};
use crate::core::observation::{FaceObservation, FrameContext};
use crate::core::pose::{self, LookDirection, PoseTarget, StepSpec, TargetKind};
use crate::core::quality::QualityAnalysis;
use crate::core::similarity::Embedding;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The states a registration session moves through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NotStarted,
    Initializing,
    InProgress,
    StepComplete,
    AllStepsComplete,
    ProcessingData,
    Completed,
    Error(String),
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::NotStarted => "not_started",
            SessionState::Initializing => "initializing",
            SessionState::InProgress => "in_progress",
            SessionState::StepComplete => "step_complete",
            SessionState::AllStepsComplete => "all_steps_complete",
            SessionState::ProcessingData => "processing_data",
            SessionState::Completed => "completed",
            SessionState::Error(_) => "error",
        };
        write!(f, "{}", name)
    }
}

/// Step-level event produced by one submitted frame.
#[derive(Debug, Clone, PartialEq)]
pub enum StepEvent {
    StepComplete { ordinal: usize },
    AllStepsComplete,
}

/// What one submitted frame produced: its quality score and, when the gate
/// armed, a step event.
#[derive(Debug, Clone)]
pub struct FrameVerdict {
    pub quality: QualityAnalysis,
    pub event: Option<StepEvent>,
}

/// The frame retained when a step completes, with its quality record.
/// Created exactly once per step; the embedding slot is write-once.
#[derive(Debug, Clone)]
pub struct CapturedArtifact {
    pub step_id: String,
    pub frame_index: u64,
    pub observation: FaceObservation,
    pub quality: QualityAnalysis,
    pub captured_at: DateTime<Utc>,
    embedding: Option<Embedding>,
}

impl CapturedArtifact {
    pub fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }
}

/// Read-only snapshot of where a session stands. Recomputed on demand.
#[derive(Debug, Clone)]
pub struct RegistrationProgress {
    pub total_steps: usize,
    pub completed_steps: usize,
    pub current_step: usize,
    pub fraction: f32,
    /// Mean overall quality across completed captures, if any.
    pub average_quality: Option<f32>,
    /// Steps whose capture fell below their minimum quality. Advancement was
    /// not blocked; these are surfaced for caller-level redo decisions.
    pub below_threshold: Vec<String>,
    pub state: SessionState,
}

/// Pose-gated capture session: owns the ordered step list, the stability
/// gate, and the captured artifacts.
///
/// Entry points take `&mut self`; frames must be submitted from a single
/// writer in arrival order, since the gate's consecutive-frame counting is
/// order-sensitive.
pub struct CaptureSession {
    config: Config,
    steps: Vec<StepSpec>,
    state: SessionState,
    current: usize,
    gate: StabilityGate,
    artifacts: Vec<CapturedArtifact>,
    frames_seen: u64,
}

impl CaptureSession {
    /// Create a session over an ordered step list. Rejects empty lists,
    /// out-of-order ordinals, and out-of-range thresholds up front.
    pub fn new(steps: Vec<StepSpec>, config: Config) -> Result<Self> {
        config.validate()?;

        if steps.is_empty() {
            return Err(FaceGateError::Config("step list must not be empty".into()));
        }
        for (index, step) in steps.iter().enumerate() {
            if step.ordinal != index {
                return Err(FaceGateError::Config(format!(
                    "step '{}' has ordinal {}, expected {}",
                    step.id, step.ordinal, index
                )));
            }
            if step.min_quality < 0.0 || step.min_quality > 1.0 {
                return Err(FaceGateError::Config(format!(
                    "step '{}' min_quality must be between 0.0 and 1.0, got {}",
                    step.id, step.min_quality
                )));
            }
            validate_target(&step.id, &step.target)?;
            if steps[..index].iter().any(|other| other.id == step.id) {
                return Err(FaceGateError::Config(format!(
                    "duplicate step id '{}'", step.id
                )));
            }
        }

        let gate = StabilityGate::new(config.gate.clone());
        Ok(Self {
            config,
            steps,
            state: SessionState::NotStarted,
            current: 0,
            gate,
            artifacts: Vec::new(),
            frames_seen: 0,
        })
    }

    /// Begin (or, after an error, resume) the session. Captures already made
    /// are kept; the session continues at the first incomplete step.
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            SessionState::NotStarted | SessionState::Error(_) => {
                self.current = self.artifacts.len();
                if self.current >= self.steps.len() {
                    self.state = SessionState::AllStepsComplete;
                } else {
                    self.state = SessionState::Initializing;
                }
                self.gate = StabilityGate::new(self.config.gate.clone());
                tracing::info!(step = self.current, "session started");
                Ok(())
            }
            _ => Err(FaceGateError::Contract(format!(
                "cannot start a session in state {}", self.state
            ))),
        }
    }

    /// Process one detected-face observation with its frame context.
    ///
    /// A frame with missing required landmarks is scored zero and disarms
    /// the gate but never aborts the session.
    pub fn submit_frame(
        &mut self,
        observation: &FaceObservation,
        context: &FrameContext,
    ) -> Result<FrameVerdict> {
        match self.state {
            SessionState::Initializing => {
                // First frame confirms the stream is flowing.
                tracing::debug!("frame stream confirmed");
                self.state = SessionState::InProgress;
            }
            SessionState::InProgress => {}
            _ => {
                return Err(FaceGateError::Contract(format!(
                    "cannot submit frames in state {}", self.state
                )));
            }
        }

        self.frames_seen += 1;
        let step = &self.steps[self.current];

        let quality = QualityAnalysis::evaluate(
            observation,
            context,
            &step.target,
            &self.config.quality,
            &self.config.pose,
        );

        let landmarks_ok = observation.has_required_landmarks();
        let signal = match step.target.kind() {
            TargetKind::OneShot => {
                // Unreliable eye probabilities on a degraded frame: feed a
                // half-open value that neither opens nor closes the window.
                let openness = if landmarks_ok { observation.eye_openness() } else { 0.5 };
                GateSignal::EyeOpenness(openness)
            }
            TargetKind::Sustained => GateSignal::Sustained {
                satisfied: landmarks_ok && pose::classify(observation, &step.target).satisfied,
            },
        };

        let ready = self.gate.observe(step.ordinal, signal);
        if !ready {
            return Ok(FrameVerdict { quality, event: None });
        }

        self.state = SessionState::StepComplete;
        let completed_ordinal = step.ordinal;
        if !quality.meets_minimum(step.min_quality) {
            tracing::warn!(
                step = %step.id,
                overall = quality.overall,
                min = step.min_quality,
                "captured frame below step quality threshold"
            );
        }
        tracing::info!(step = %step.id, frame = self.frames_seen, "step captured");

        self.artifacts.push(CapturedArtifact {
            step_id: step.id.clone(),
            frame_index: self.frames_seen,
            observation: observation.clone(),
            quality: quality.clone(),
            captured_at: Utc::now(),
            embedding: None,
        });

        let event = if self.current + 1 < self.steps.len() {
            self.current += 1;
            self.state = SessionState::InProgress;
            StepEvent::StepComplete { ordinal: completed_ordinal }
        } else {
            self.state = SessionState::AllStepsComplete;
            tracing::info!("all steps complete");
            StepEvent::AllStepsComplete
        };

        Ok(FrameVerdict { quality, event: Some(event) })
    }

    /// Record that the frame source terminated mid-flow. The machine moves
    /// to `error` and stays there until the caller reissues `start`.
    pub fn stream_lost(&mut self, message: impl Into<String>) {
        let message = message.into();
        if !matches!(self.state, SessionState::Completed) {
            tracing::warn!(%message, "frame stream lost");
            self.state = SessionState::Error(message);
        }
    }

    /// Abort the session from any state. In-flight evaluation state is
    /// discarded; already-captured artifacts are preserved.
    pub fn abort(&mut self) {
        tracing::info!(from = %self.state, "session aborted");
        self.state = SessionState::NotStarted;
        self.gate = StabilityGate::new(self.config.gate.clone());
    }

    /// Drop all captured artifacts. Explicit, never implied by `abort`.
    pub fn clear_artifacts(&mut self) {
        self.artifacts.clear();
        self.current = 0;
    }

    /// Synchronous finalization: `all_steps_complete` through
    /// `processing_data` to `completed`, returning the artifact list for the
    /// embedding/upload collaborator.
    pub fn finalize(&mut self) -> Result<&[CapturedArtifact]> {
        if self.state != SessionState::AllStepsComplete {
            return Err(FaceGateError::Contract(format!(
                "cannot finalize in state {}", self.state
            )));
        }

        self.state = SessionState::ProcessingData;
        let progress = self.progress();
        tracing::info!(
            captures = self.artifacts.len(),
            average_quality = progress.average_quality.unwrap_or(0.0),
            "session finalized"
        );
        self.state = SessionState::Completed;
        Ok(&self.artifacts)
    }

    /// Attach the externally computed embedding for one completed step.
    /// Write-once and dimension-checked.
    pub fn attach_embedding(&mut self, ordinal: usize, embedding: Embedding) -> Result<()> {
        let expected_dim = self.config.verify.embedding_dim;
        let artifact = self.artifacts.get_mut(ordinal).ok_or_else(|| {
            FaceGateError::Contract(format!("no captured artifact for step index {}", ordinal))
        })?;

        if embedding.len() != expected_dim {
            return Err(FaceGateError::Contract(format!(
                "embedding dimension mismatch: expected {}, got {}",
                expected_dim,
                embedding.len()
            )));
        }
        if artifact.embedding.is_some() {
            return Err(FaceGateError::Contract(format!(
                "embedding already attached for step '{}'", artifact.step_id
            )));
        }

        artifact.embedding = Some(embedding);
        Ok(())
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn steps(&self) -> &[StepSpec] {
        &self.steps
    }

    pub fn artifacts(&self) -> &[CapturedArtifact] {
        &self.artifacts
    }

    /// Snapshot of overall progress, derived from the step list and
    /// artifacts on demand.
    pub fn progress(&self) -> RegistrationProgress {
        let completed = self.artifacts.len();
        let total = self.steps.len();

        let average_quality = if completed == 0 {
            None
        } else {
            let sum: f32 = self.artifacts.iter().map(|a| a.quality.overall).sum();
            Some(sum / completed as f32)
        };

        let below_threshold = self
            .artifacts
            .iter()
            .zip(self.steps.iter())
            .filter(|(artifact, step)| !artifact.quality.meets_minimum(step.min_quality))
            .map(|(artifact, _)| artifact.step_id.clone())
            .collect();

        RegistrationProgress {
            total_steps: total,
            completed_steps: completed,
            current_step: self.current,
            fraction: completed as f32 / total as f32,
            average_quality,
            below_threshold,
            state: self.state.clone(),
        }
    }
}

fn validate_target(step_id: &str, target: &PoseTarget) -> Result<()> {
    let bad = |what: &str| {
        Err(FaceGateError::Config(format!("step '{}': {}", step_id, what)))
    };
    match target {
        PoseTarget::Neutral { tolerance_deg } if *tolerance_deg <= 0.0 => {
            bad("neutral tolerance must be positive")
        }
        PoseTarget::Look { min_deg, band_deg, .. } if *min_deg <= 0.0 || *band_deg <= 0.0 => {
            bad("look angles must be positive")
        }
        PoseTarget::Smile { min_probability } if !(0.0..=1.0).contains(min_probability) => {
            bad("smile probability must be between 0.0 and 1.0")
        }
        _ => Ok(()),
    }
}

/// The standard registration sequence: neutral, look left, look right,
/// smile, blink.
pub fn default_registration_steps(config: &Config) -> Vec<StepSpec> {
    let pose = &config.pose;
    let min_quality = config.quality.min_quality;
    let look = |direction| PoseTarget::Look {
        direction,
        min_deg: pose.look_min_deg,
        band_deg: pose.orthogonal_band_deg,
    };

    let specs = [
        ("neutral", "Look straight at the camera", PoseTarget::Neutral {
            tolerance_deg: pose.neutral_tolerance_deg,
        }),
        ("look_left", "Turn your head to the left", look(LookDirection::Left)),
        ("look_right", "Turn your head to the right", look(LookDirection::Right)),
        ("smile", "Smile", PoseTarget::Smile {
            min_probability: pose.smile_min_probability,
        }),
        ("blink", "Blink", PoseTarget::Blink),
    ];

    specs
        .into_iter()
        .enumerate()
        .map(|(ordinal, (id, title, target))| StepSpec {
            id: id.to_string(),
            title: title.to_string(),
            target,
            min_quality,
            ordinal,
        })
        .collect()
}

/// Single-step configuration used by the verification flow: one neutral
/// capture, then similarity scoring against a stored template.
pub fn verification_steps(config: &Config) -> Vec<StepSpec> {
    vec![StepSpec {
        id: "verify_neutral".to_string(),
        title: "Look straight at the camera".to_string(),
        target: PoseTarget::Neutral {
            tolerance_deg: config.pose.neutral_tolerance_deg,
        },
        min_quality: config.quality.min_quality,
        ordinal: 0,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_steps() -> Vec<StepSpec> {
        vec![
            StepSpec {
                id: "neutral".into(),
                title: "Look straight".into(),
                target: PoseTarget::Neutral { tolerance_deg: 10.0 },
                min_quality: 0.7,
                ordinal: 0,
            },
            StepSpec {
                id: "look_left".into(),
                title: "Look left".into(),
                target: PoseTarget::Look {
                    direction: LookDirection::Left,
                    min_deg: 15.0,
                    band_deg: 12.0,
                },
                min_quality: 0.7,
                ordinal: 1,
            },
        ]
    }

    #[test]
    fn rejects_empty_step_list() {
        let result = CaptureSession::new(vec![], Config::default());
        assert!(matches!(result, Err(FaceGateError::Config(_))));
    }

    #[test]
    fn rejects_out_of_order_ordinals() {
        let mut steps = two_steps();
        steps[1].ordinal = 5;
        let result = CaptureSession::new(steps, Config::default());
        assert!(matches!(result, Err(FaceGateError::Config(_))));
    }

    #[test]
    fn rejects_threshold_outside_unit_range() {
        let mut steps = two_steps();
        steps[0].min_quality = 1.5;
        let result = CaptureSession::new(steps, Config::default());
        assert!(matches!(result, Err(FaceGateError::Config(_))));
    }

    #[test]
    fn rejects_duplicate_step_ids() {
        let mut steps = two_steps();
        steps[1].id = "neutral".into();
        let result = CaptureSession::new(steps, Config::default());
        assert!(matches!(result, Err(FaceGateError::Config(_))));
    }

    #[test]
    fn start_is_required_before_frames() {
        let mut session = CaptureSession::new(two_steps(), Config::default()).unwrap();
        assert_eq!(*session.state(), SessionState::NotStarted);
        assert!(session.start().is_ok());
        assert_eq!(*session.state(), SessionState::Initializing);
        // Starting twice is a contract violation.
        assert!(matches!(session.start(), Err(FaceGateError::Contract(_))));
    }

    #[test]
    fn stream_loss_enters_error_and_start_recovers() {
        let mut session = CaptureSession::new(two_steps(), Config::default()).unwrap();
        session.start().unwrap();
        session.stream_lost("camera disconnected");
        assert!(matches!(session.state(), SessionState::Error(_)));
        assert!(session.start().is_ok());
        assert_eq!(*session.state(), SessionState::Initializing);
    }

    #[test]
    fn default_steps_are_well_formed() {
        let config = Config::default();
        let steps = default_registration_steps(&config);
        assert_eq!(steps.len(), 5);
        assert!(CaptureSession::new(steps, config).is_ok());
    }

    #[test]
    fn verification_flow_is_single_step() {
        let config = Config::default();
        let steps = verification_steps(&config);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].ordinal, 0);
        assert!(CaptureSession::new(steps, config).is_ok());
    }
}
