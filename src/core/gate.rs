use crate::common::config::GateConfig;
use std::collections::VecDeque;

/// Per-frame signal fed to the gate, matching the step's target kind.
#[derive(Debug, Clone, Copy)]
pub enum GateSignal {
    /// Sustained targets report whether this frame qualifies.
    Sustained { satisfied: bool },
    /// One-shot (blink) targets report raw combined eye-openness.
    EyeOpenness(f32),
}

/// Debouncer that arms capture only after temporal stability.
///
/// Sustained targets need `required_frames` consecutive qualifying frames;
/// any disqualifying frame resets the streak. One-shot targets keep a short
/// openness history and arm on the open-to-closed transition. Once armed for
/// a step the gate is consumed and stays silent until the active step
/// changes.
#[derive(Debug)]
pub struct StabilityGate {
    config: GateConfig,
    active_step: Option<usize>,
    streak: u32,
    consumed: bool,
    openness_window: VecDeque<f32>,
}

impl StabilityGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            active_step: None,
            streak: 0,
            consumed: false,
            openness_window: VecDeque::new(),
        }
    }

    /// Feed one frame's signal for the given step ordinal. Returns true
    /// exactly once per step, when the gate arms.
    pub fn observe(&mut self, step_ordinal: usize, signal: GateSignal) -> bool {
        if self.active_step != Some(step_ordinal) {
            self.reset_for_step(step_ordinal);
        }

        if self.consumed {
            return false;
        }

        match signal {
            GateSignal::Sustained { satisfied } => self.observe_sustained(satisfied),
            GateSignal::EyeOpenness(openness) => self.observe_openness(openness),
        }
    }

    /// Consecutive qualifying frames counted so far for the active step.
    pub fn streak(&self) -> u32 {
        self.streak
    }

    fn observe_sustained(&mut self, satisfied: bool) -> bool {
        if !satisfied {
            self.streak = 0;
            return false;
        }

        self.streak += 1;
        if self.streak >= self.config.required_frames {
            tracing::debug!(streak = self.streak, "stability gate armed");
            self.consume();
            return true;
        }
        false
    }

    // Blink arms on the single frame where openness drops to the closed
    // threshold after the recent window saw the eyes open.
    fn observe_openness(&mut self, openness: f32) -> bool {
        let was_open = self
            .openness_window
            .iter()
            .any(|&o| o >= self.config.blink_open_threshold);

        if openness <= self.config.blink_closed_threshold && was_open {
            tracing::debug!(openness, "blink transition detected");
            self.consume();
            return true;
        }

        self.openness_window.push_back(openness);
        while self.openness_window.len() > self.config.blink_window_frames {
            self.openness_window.pop_front();
        }
        false
    }

    fn consume(&mut self) {
        self.consumed = true;
        self.streak = 0;
        self.openness_window.clear();
    }

    fn reset_for_step(&mut self, step_ordinal: usize) {
        self.active_step = Some(step_ordinal);
        self.streak = 0;
        self.consumed = false;
        self.openness_window.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(required: u32) -> StabilityGate {
        StabilityGate::new(GateConfig {
            required_frames: required,
            ..GateConfig::default()
        })
    }

    #[test]
    fn arms_after_exact_threshold() {
        let mut gate = gate(15);
        for i in 0..14 {
            assert!(!gate.observe(0, GateSignal::Sustained { satisfied: true }), "frame {}", i);
        }
        assert!(gate.observe(0, GateSignal::Sustained { satisfied: true }));
    }

    #[test]
    fn disqualifying_frame_resets_streak() {
        let mut gate = gate(15);
        for _ in 0..14 {
            gate.observe(0, GateSignal::Sustained { satisfied: true });
        }
        assert!(!gate.observe(0, GateSignal::Sustained { satisfied: false }));
        assert_eq!(gate.streak(), 0);

        // A full fresh run is needed afterward.
        for i in 0..14 {
            assert!(!gate.observe(0, GateSignal::Sustained { satisfied: true }), "frame {}", i);
        }
        assert!(gate.observe(0, GateSignal::Sustained { satisfied: true }));
    }

    #[test]
    fn fires_exactly_once_until_step_changes() {
        let mut gate = gate(3);
        for _ in 0..2 {
            gate.observe(0, GateSignal::Sustained { satisfied: true });
        }
        assert!(gate.observe(0, GateSignal::Sustained { satisfied: true }));

        // Holding the pose must not re-arm the same step.
        for _ in 0..10 {
            assert!(!gate.observe(0, GateSignal::Sustained { satisfied: true }));
        }

        // A new step starts clean.
        for _ in 0..2 {
            assert!(!gate.observe(1, GateSignal::Sustained { satisfied: true }));
        }
        assert!(gate.observe(1, GateSignal::Sustained { satisfied: true }));
    }

    #[test]
    fn step_switch_resets_mid_streak() {
        let mut gate = gate(5);
        for _ in 0..4 {
            gate.observe(0, GateSignal::Sustained { satisfied: true });
        }
        // Switch steps one frame short of arming.
        assert!(!gate.observe(1, GateSignal::Sustained { satisfied: true }));
        assert_eq!(gate.streak(), 1);
    }

    #[test]
    fn blink_arms_on_transition() {
        let mut gate = gate(15);
        // Eyes open for a few frames, then the drop.
        for _ in 0..4 {
            assert!(!gate.observe(0, GateSignal::EyeOpenness(0.95)));
        }
        assert!(gate.observe(0, GateSignal::EyeOpenness(0.1)));
    }

    #[test]
    fn blink_needs_prior_open_eyes() {
        let mut gate = gate(15);
        // Closed from the start: no transition to detect.
        for _ in 0..10 {
            assert!(!gate.observe(0, GateSignal::EyeOpenness(0.1)));
        }
    }

    #[test]
    fn blink_open_frame_outside_window_is_forgotten() {
        let mut gate = StabilityGate::new(GateConfig {
            blink_window_frames: 3,
            ..GateConfig::default()
        });
        gate.observe(0, GateSignal::EyeOpenness(0.95));
        // Push the open frame out of the 3-frame window with half-open eyes.
        for _ in 0..3 {
            gate.observe(0, GateSignal::EyeOpenness(0.5));
        }
        assert!(!gate.observe(0, GateSignal::EyeOpenness(0.1)));
    }
}
