//! Work/break countdown state machine.
//!
//! The timer is pure bookkeeping: it never awards anything on its own. When a
//! phase reaches zero it reports [`TickOutcome::PhaseElapsed`] and waits for
//! the owning session to settle the phase (pay out a work phase, or advance
//! past a break). Every transition bumps a generation counter so ticks
//! scheduled before a pause, skip or phase change are ignored.
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BREAK_MINUTES, DEFAULT_REPETITIONS, DEFAULT_WORK_MINUTES, LOG_TARGET_TIMER,
    MAX_REPETITIONS, MIN_WORK_MINUTES, SECONDS_PER_MINUTE,
};
use crate::error::SessionConfigError;
use crate::species::ElementalType;

const DEFAULT_TASK_LABEL: &str = "Focus Session";

/// Operator bounds applied when validating a [`SessionConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLimits {
    #[serde(default = "SessionLimits::default_min_work_minutes")]
    pub min_work_minutes: u32,
    #[serde(default = "SessionLimits::default_max_repetitions")]
    pub max_repetitions: u32,
}

impl SessionLimits {
    const fn default_min_work_minutes() -> u32 {
        MIN_WORK_MINUTES
    }

    const fn default_max_repetitions() -> u32 {
        MAX_REPETITIONS
    }
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            min_work_minutes: Self::default_min_work_minutes(),
            max_repetitions: Self::default_max_repetitions(),
        }
    }
}

/// Parameters of one focus session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "SessionConfig::default_work_minutes")]
    pub work_minutes: u32,
    #[serde(default = "SessionConfig::default_break_minutes")]
    pub break_minutes: u32,
    #[serde(default = "SessionConfig::default_repetitions")]
    pub num_repetitions: u32,
    #[serde(rename = "type")]
    pub elemental_type: ElementalType,
    #[serde(default = "SessionConfig::default_task_label")]
    pub task_label: String,
    /// Run a break after the final work phase before completing.
    #[serde(default)]
    pub final_break: bool,
}

impl SessionConfig {
    const fn default_work_minutes() -> u32 {
        DEFAULT_WORK_MINUTES
    }

    const fn default_break_minutes() -> u32 {
        DEFAULT_BREAK_MINUTES
    }

    const fn default_repetitions() -> u32 {
        DEFAULT_REPETITIONS
    }

    fn default_task_label() -> String {
        DEFAULT_TASK_LABEL.to_string()
    }

    #[must_use]
    pub fn new(elemental_type: ElementalType) -> Self {
        Self {
            work_minutes: Self::default_work_minutes(),
            break_minutes: Self::default_break_minutes(),
            num_repetitions: Self::default_repetitions(),
            elemental_type,
            task_label: Self::default_task_label(),
            final_break: false,
        }
    }

    #[must_use]
    pub const fn with_work_minutes(mut self, minutes: u32) -> Self {
        self.work_minutes = minutes;
        self
    }

    #[must_use]
    pub const fn with_break_minutes(mut self, minutes: u32) -> Self {
        self.break_minutes = minutes;
        self
    }

    #[must_use]
    pub const fn with_repetitions(mut self, repetitions: u32) -> Self {
        self.num_repetitions = repetitions;
        self
    }

    #[must_use]
    pub fn with_task_label(mut self, label: impl Into<String>) -> Self {
        self.task_label = label.into();
        self
    }

    #[must_use]
    pub const fn with_final_break(mut self, enabled: bool) -> Self {
        self.final_break = enabled;
        self
    }

    /// # Errors
    ///
    /// Returns [`SessionConfigError`] naming the first field outside `limits`.
    pub fn validate(&self, limits: &SessionLimits) -> Result<(), SessionConfigError> {
        if self.work_minutes < limits.min_work_minutes {
            return Err(SessionConfigError::MinViolation {
                field: "work_minutes",
                min: limits.min_work_minutes,
                value: self.work_minutes,
            });
        }
        if self.num_repetitions < 1 {
            return Err(SessionConfigError::MinViolation {
                field: "num_repetitions",
                min: 1,
                value: self.num_repetitions,
            });
        }
        if self.num_repetitions > limits.max_repetitions {
            return Err(SessionConfigError::MaxViolation {
                field: "num_repetitions",
                max: limits.max_repetitions,
                value: self.num_repetitions,
            });
        }
        if !self.elemental_type.is_session_type() {
            return Err(SessionConfigError::UnsupportedType(self.elemental_type));
        }
        Ok(())
    }

    #[must_use]
    pub const fn work_seconds(&self) -> u32 {
        self.work_minutes.saturating_mul(SECONDS_PER_MINUTE)
    }

    #[must_use]
    pub const fn break_seconds(&self) -> u32 {
        self.break_minutes.saturating_mul(SECONDS_PER_MINUTE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerPhase {
    WorkRunning,
    WorkPaused,
    BreakRunning,
    BreakPaused,
    AwaitingEncounterResolution,
    Completed,
}

impl TimerPhase {
    #[must_use]
    pub const fn is_work(self) -> bool {
        matches!(self, Self::WorkRunning | Self::WorkPaused)
    }

    #[must_use]
    pub const fn is_break(self) -> bool {
        matches!(self, Self::BreakRunning | Self::BreakPaused)
    }

    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::WorkRunning | Self::BreakRunning)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Work,
    Break,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// Every repetition ran.
    AllRepetitions,
    /// Ended during work; the phase was paid out first.
    EndedEarly,
    /// Ended during a break; remaining repetitions dropped without reward.
    Abandoned,
}

/// Handle for one scheduled tick. Only the most recently issued generation
/// is honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickToken(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Token predates the latest transition; nothing happened.
    Stale,
    /// Timer is paused, waiting on encounters, or finished.
    Idle,
    Counting { seconds_remaining: u32 },
    /// The running phase hit zero and awaits settlement.
    PhaseElapsed(PhaseKind),
}

/// Read-only snapshot handed to presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    pub phase: TimerPhase,
    pub current_repetition: u32,
    pub num_repetitions: u32,
    pub is_work_phase: bool,
    pub is_running: bool,
    pub seconds_remaining: u32,
    pub phase_total_seconds: u32,
    pub completed_repetitions: u32,
    pub completion: Option<CompletionReason>,
}

impl TimerState {
    /// `MM:SS` countdown label.
    #[must_use]
    pub fn clock_label(&self) -> String {
        let minutes = self.seconds_remaining / SECONDS_PER_MINUTE;
        let seconds = self.seconds_remaining % SECONDS_PER_MINUTE;
        format!("{minutes:02}:{seconds:02}")
    }

    /// Elapsed share of the current phase, 0–100.
    #[must_use]
    pub fn progress_pct(&self) -> f32 {
        if self.phase_total_seconds == 0 {
            return 100.0;
        }
        let elapsed = self
            .phase_total_seconds
            .saturating_sub(self.seconds_remaining);
        #[allow(clippy::cast_precision_loss)]
        let pct = elapsed as f32 / self.phase_total_seconds as f32 * 100.0;
        pct.clamp(0.0, 100.0)
    }

    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self.phase, TimerPhase::Completed)
    }
}

#[derive(Debug, Clone)]
pub struct SessionTimer {
    config: SessionConfig,
    phase: TimerPhase,
    current_repetition: u32,
    seconds_remaining: u32,
    completed_repetitions: u32,
    generation: u64,
    end_requested: bool,
    completion: Option<CompletionReason>,
}

impl SessionTimer {
    /// Start a session in its first work phase.
    ///
    /// # Errors
    ///
    /// Returns [`SessionConfigError`] when `config` violates `limits`.
    pub fn new(config: SessionConfig, limits: &SessionLimits) -> Result<Self, SessionConfigError> {
        config.validate(limits)?;
        let seconds_remaining = config.work_seconds();
        debug!(
            target: LOG_TARGET_TIMER,
            "timer start: {} x {} min work / {} min break ({})",
            config.num_repetitions, config.work_minutes, config.break_minutes, config.elemental_type
        );
        Ok(Self {
            config,
            phase: TimerPhase::WorkRunning,
            current_repetition: 1,
            seconds_remaining,
            completed_repetitions: 0,
            generation: 0,
            end_requested: false,
            completion: None,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub const fn phase(&self) -> TimerPhase {
        self.phase
    }

    #[must_use]
    pub const fn current_repetition(&self) -> u32 {
        self.current_repetition
    }

    #[must_use]
    pub const fn seconds_remaining(&self) -> u32 {
        self.seconds_remaining
    }

    #[must_use]
    pub const fn completed_repetitions(&self) -> u32 {
        self.completed_repetitions
    }

    #[must_use]
    pub const fn end_requested(&self) -> bool {
        self.end_requested
    }

    #[must_use]
    pub const fn token(&self) -> TickToken {
        TickToken(self.generation)
    }

    #[must_use]
    pub fn state(&self) -> TimerState {
        let phase_total_seconds = match self.phase {
            TimerPhase::WorkRunning | TimerPhase::WorkPaused => self.config.work_seconds(),
            TimerPhase::BreakRunning | TimerPhase::BreakPaused => self.config.break_seconds(),
            TimerPhase::AwaitingEncounterResolution | TimerPhase::Completed => 0,
        };
        TimerState {
            phase: self.phase,
            current_repetition: self.current_repetition,
            num_repetitions: self.config.num_repetitions,
            is_work_phase: self.phase.is_work()
                || self.phase == TimerPhase::AwaitingEncounterResolution,
            is_running: self.phase.is_running(),
            seconds_remaining: self.seconds_remaining,
            phase_total_seconds,
            completed_repetitions: self.completed_repetitions,
            completion: self.completion,
        }
    }

    fn advance_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    /// One second of cooperative countdown.
    pub fn tick(&mut self, token: TickToken) -> TickOutcome {
        if token != self.token() {
            warn!(
                target: LOG_TARGET_TIMER,
                "ignoring stale tick (generation {} != {})", token.0, self.generation
            );
            return TickOutcome::Stale;
        }
        let kind = match self.phase {
            TimerPhase::WorkRunning => PhaseKind::Work,
            TimerPhase::BreakRunning => PhaseKind::Break,
            _ => return TickOutcome::Idle,
        };
        self.seconds_remaining = self.seconds_remaining.saturating_sub(1);
        if self.seconds_remaining == 0 {
            debug!(target: LOG_TARGET_TIMER, "{kind:?} phase elapsed (repetition {})", self.current_repetition);
            TickOutcome::PhaseElapsed(kind)
        } else {
            TickOutcome::Counting {
                seconds_remaining: self.seconds_remaining,
            }
        }
    }

    /// Returns `false` when nothing is running.
    pub fn pause(&mut self) -> bool {
        let next = match self.phase {
            TimerPhase::WorkRunning => TimerPhase::WorkPaused,
            TimerPhase::BreakRunning => TimerPhase::BreakPaused,
            _ => return false,
        };
        self.phase = next;
        self.advance_generation();
        true
    }

    /// Returns `false` when nothing is paused.
    pub fn resume(&mut self) -> bool {
        let next = match self.phase {
            TimerPhase::WorkPaused => TimerPhase::WorkRunning,
            TimerPhase::BreakPaused => TimerPhase::BreakRunning,
            _ => return false,
        };
        self.phase = next;
        self.advance_generation();
        true
    }

    /// Remember that the player ended the session so the next resolution
    /// completes it instead of starting a break.
    pub(crate) fn request_end(&mut self) {
        self.end_requested = true;
    }

    /// Close the current work phase after its payout committed.
    ///
    /// Returns `false` when not in a work phase.
    pub fn enter_resolution(&mut self) -> bool {
        if !self.phase.is_work() {
            return false;
        }
        self.phase = TimerPhase::AwaitingEncounterResolution;
        self.seconds_remaining = 0;
        self.completed_repetitions = self.completed_repetitions.saturating_add(1);
        self.advance_generation();
        true
    }

    /// Leave encounter resolution: into a break, or finish the session after
    /// the final repetition or an early end.
    pub fn resolve_encounters(&mut self) -> Option<TimerPhase> {
        if self.phase != TimerPhase::AwaitingEncounterResolution {
            return None;
        }
        let last = self.current_repetition >= self.config.num_repetitions;
        if self.end_requested {
            self.complete(CompletionReason::EndedEarly);
        } else if last && !self.config.final_break {
            self.complete(CompletionReason::AllRepetitions);
        } else {
            self.phase = TimerPhase::BreakRunning;
            self.seconds_remaining = self.config.break_seconds();
            self.advance_generation();
        }
        Some(self.phase)
    }

    /// Close the current break: next work phase, or completion when no
    /// repetitions remain.
    pub fn finish_break(&mut self) -> Option<TimerPhase> {
        if !self.phase.is_break() {
            return None;
        }
        if self.current_repetition < self.config.num_repetitions {
            self.current_repetition += 1;
            self.phase = TimerPhase::WorkRunning;
            self.seconds_remaining = self.config.work_seconds();
            self.advance_generation();
        } else {
            self.complete(CompletionReason::AllRepetitions);
        }
        Some(self.phase)
    }

    /// End during a break: drop the remaining repetitions.
    pub fn abandon_break(&mut self) -> bool {
        if !self.phase.is_break() {
            return false;
        }
        self.complete(CompletionReason::Abandoned);
        true
    }

    fn complete(&mut self, reason: CompletionReason) {
        debug!(target: LOG_TARGET_TIMER, "session completed: {reason:?}");
        self.phase = TimerPhase::Completed;
        self.seconds_remaining = 0;
        self.completion = Some(reason);
        self.advance_generation();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer(config: SessionConfig) -> SessionTimer {
        SessionTimer::new(config, &SessionLimits::default()).expect("valid config")
    }

    fn run_down(timer: &mut SessionTimer) -> TickOutcome {
        loop {
            let outcome = timer.tick(timer.token());
            if !matches!(outcome, TickOutcome::Counting { .. }) {
                return outcome;
            }
        }
    }

    #[test]
    fn initial_state_is_first_work_phase() {
        let timer = timer(SessionConfig::new(ElementalType::Fire).with_work_minutes(25));
        let state = timer.state();
        assert_eq!(state.phase, TimerPhase::WorkRunning);
        assert_eq!(state.current_repetition, 1);
        assert_eq!(state.seconds_remaining, 25 * 60);
        assert!(state.is_running);
        assert!(state.is_work_phase);
        assert_eq!(state.clock_label(), "25:00");
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let limits = SessionLimits::default();
        let zero_work = SessionConfig::new(ElementalType::Fire).with_work_minutes(0);
        assert!(matches!(
            SessionTimer::new(zero_work, &limits),
            Err(SessionConfigError::MinViolation {
                field: "work_minutes",
                ..
            })
        ));
        let zero_reps = SessionConfig::new(ElementalType::Fire).with_repetitions(0);
        assert!(SessionTimer::new(zero_reps, &limits).is_err());
        let too_many = SessionConfig::new(ElementalType::Fire).with_repetitions(13);
        assert!(matches!(
            SessionTimer::new(too_many, &limits),
            Err(SessionConfigError::MaxViolation { max: 12, .. })
        ));
        let flavour = SessionConfig::new(ElementalType::Dragon);
        assert!(matches!(
            SessionTimer::new(flavour, &limits),
            Err(SessionConfigError::UnsupportedType(ElementalType::Dragon))
        ));
    }

    #[test]
    fn pause_and_resume_preserve_remaining_and_invalidate_tokens() {
        let mut timer = timer(SessionConfig::new(ElementalType::Water).with_work_minutes(1));
        timer.tick(timer.token());
        let before_pause = timer.token();
        assert!(timer.pause());
        assert!(!timer.pause());
        assert_eq!(timer.tick(timer.token()), TickOutcome::Idle);
        assert_eq!(timer.seconds_remaining(), 59);
        assert!(timer.resume());
        assert_eq!(timer.tick(before_pause), TickOutcome::Stale);
        assert_eq!(timer.seconds_remaining(), 59);
        assert_eq!(
            timer.tick(timer.token()),
            TickOutcome::Counting {
                seconds_remaining: 58
            }
        );
    }

    #[test]
    fn remaining_stays_within_phase_bounds() {
        let mut timer = timer(SessionConfig::new(ElementalType::Grass).with_work_minutes(1));
        let total = timer.state().phase_total_seconds;
        let mut last = timer.seconds_remaining();
        loop {
            let outcome = timer.tick(timer.token());
            let now = timer.seconds_remaining();
            assert!(now <= total);
            assert!(now < last || now == 0);
            last = now;
            if outcome == TickOutcome::PhaseElapsed(PhaseKind::Work) {
                break;
            }
        }
        // Elapsed phases hold at zero until settled.
        assert_eq!(
            timer.tick(timer.token()),
            TickOutcome::PhaseElapsed(PhaseKind::Work)
        );
        assert_eq!(timer.seconds_remaining(), 0);
    }

    #[test]
    fn full_cycle_without_trailing_break() {
        let mut timer = timer(
            SessionConfig::new(ElementalType::Ghost)
                .with_work_minutes(1)
                .with_break_minutes(1)
                .with_repetitions(2),
        );
        assert_eq!(run_down(&mut timer), TickOutcome::PhaseElapsed(PhaseKind::Work));
        assert!(timer.enter_resolution());
        assert_eq!(timer.resolve_encounters(), Some(TimerPhase::BreakRunning));
        assert_eq!(timer.seconds_remaining(), 60);
        assert_eq!(run_down(&mut timer), TickOutcome::PhaseElapsed(PhaseKind::Break));
        assert_eq!(timer.finish_break(), Some(TimerPhase::WorkRunning));
        assert_eq!(timer.current_repetition(), 2);
        assert_eq!(run_down(&mut timer), TickOutcome::PhaseElapsed(PhaseKind::Work));
        assert!(timer.enter_resolution());
        assert_eq!(timer.resolve_encounters(), Some(TimerPhase::Completed));
        let state = timer.state();
        assert_eq!(state.completed_repetitions, 2);
        assert_eq!(state.completion, Some(CompletionReason::AllRepetitions));
    }

    #[test]
    fn trailing_break_runs_when_enabled() {
        let mut timer = timer(
            SessionConfig::new(ElementalType::Ghost)
                .with_work_minutes(1)
                .with_repetitions(1)
                .with_final_break(true),
        );
        run_down(&mut timer);
        timer.enter_resolution();
        assert_eq!(timer.resolve_encounters(), Some(TimerPhase::BreakRunning));
        run_down(&mut timer);
        assert_eq!(timer.finish_break(), Some(TimerPhase::Completed));
    }

    #[test]
    fn zero_minute_break_elapses_on_next_tick() {
        let mut timer = timer(
            SessionConfig::new(ElementalType::Psychic)
                .with_work_minutes(1)
                .with_break_minutes(0)
                .with_repetitions(2),
        );
        run_down(&mut timer);
        timer.enter_resolution();
        timer.resolve_encounters();
        assert_eq!(
            timer.tick(timer.token()),
            TickOutcome::PhaseElapsed(PhaseKind::Break)
        );
    }

    #[test]
    fn end_request_completes_after_resolution() {
        let mut timer = timer(SessionConfig::new(ElementalType::Fire).with_repetitions(4));
        timer.request_end();
        assert!(timer.enter_resolution());
        assert_eq!(timer.resolve_encounters(), Some(TimerPhase::Completed));
        assert_eq!(timer.state().completion, Some(CompletionReason::EndedEarly));
    }

    #[test]
    fn abandoning_a_break_completes_without_more_work() {
        let mut timer = timer(SessionConfig::new(ElementalType::Fire).with_repetitions(3));
        timer.enter_resolution();
        timer.resolve_encounters();
        assert!(timer.abandon_break());
        let state = timer.state();
        assert_eq!(state.phase, TimerPhase::Completed);
        assert_eq!(state.completed_repetitions, 1);
        assert_eq!(state.completion, Some(CompletionReason::Abandoned));
        assert!(!timer.abandon_break());
    }

    #[test]
    fn clock_label_and_progress() {
        let mut timer = timer(SessionConfig::new(ElementalType::Electric).with_work_minutes(2));
        for _ in 0..30 {
            timer.tick(timer.token());
        }
        let state = timer.state();
        assert_eq!(state.clock_label(), "01:30");
        assert!((state.progress_pct() - 25.0).abs() < f32::EPSILON);
    }
}
