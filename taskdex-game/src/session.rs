use log::{debug, info};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::catching::{CatchOutcome, select_catches};
use crate::constants::LOG_TARGET_SESSION;
use crate::encounters::{EncounterBatch, generate_encounters};
use crate::error::{EngineError, EngineResult, SelectionError};
use crate::ledger::ProfileLedger;
use crate::progression::ProgressionEvent;
use crate::storage::ProfileStore;
use crate::timer::{
    CompletionReason, PhaseKind, SessionConfig, SessionTimer, TickOutcome, TickToken, TimerPhase,
    TimerState,
};

/// Result of driving the session one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStep {
    /// Tick token predates the latest transition.
    Stale,
    /// Nothing to do in the current phase.
    Idle,
    Counting { seconds_remaining: u32 },
    /// A work phase paid out; the batch awaits catch selection.
    EncountersReady {
        batch: EncounterBatch,
        events: Vec<ProgressionEvent>,
    },
    BreakStarted,
    WorkStarted { repetition: u32 },
    Completed(CompletionReason),
}

/// Running totals for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub work_phases_paid: u32,
    pub experience_awarded: u32,
    pub encounters_seen: u32,
    pub creatures_caught: u32,
    /// Species registered in the Pokédex for the first time.
    pub new_species: u32,
    pub evolutions: u32,
}

#[derive(Debug, Clone)]
struct PendingEncounters {
    batch: EncounterBatch,
    caught: BTreeSet<usize>,
}

/// One focus session for one trainer: the timer, the encounter RNG and the
/// profile ledger it pays into.
pub struct FocusSession<S: ProfileStore> {
    ledger: ProfileLedger<S>,
    timer: SessionTimer,
    rng: ChaCha20Rng,
    /// Batch drawn for an elapsed work phase whose payout has not committed yet.
    unsettled: Option<EncounterBatch>,
    pending: Option<PendingEncounters>,
    summary: SessionSummary,
}

impl<S: ProfileStore> FocusSession<S> {
    /// Start a session in its first work phase.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidConfig`] for a config outside the engine limits and
    /// [`EngineError::NoPartner`] for a profile without a partner.
    pub fn start(ledger: ProfileLedger<S>, config: SessionConfig, seed: u64) -> EngineResult<Self> {
        let timer = SessionTimer::new(config, &ledger.config().limits)?;
        if ledger.profile().partner().is_none() {
            return Err(EngineError::NoPartner);
        }
        info!(
            target: LOG_TARGET_SESSION,
            "{} started \"{}\" (seed {seed})",
            ledger.user(),
            timer.config().task_label
        );
        Ok(Self {
            ledger,
            timer,
            rng: ChaCha20Rng::seed_from_u64(seed),
            unsettled: None,
            pending: None,
            summary: SessionSummary::default(),
        })
    }

    #[must_use]
    pub fn timer_state(&self) -> TimerState {
        self.timer.state()
    }

    #[must_use]
    pub const fn tick_token(&self) -> TickToken {
        self.timer.token()
    }

    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        self.timer.config()
    }

    #[must_use]
    pub const fn ledger(&self) -> &ProfileLedger<S> {
        &self.ledger
    }

    #[must_use]
    pub const fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    #[must_use]
    pub fn pending_encounters(&self) -> Option<&EncounterBatch> {
        self.pending.as_ref().map(|pending| &pending.batch)
    }

    /// Indices of the pending batch already caught.
    #[must_use]
    pub fn caught_indices(&self) -> Vec<usize> {
        self.pending
            .as_ref()
            .map(|pending| pending.caught.iter().copied().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.timer.phase() == TimerPhase::Completed
    }

    #[must_use]
    pub fn into_ledger(self) -> ProfileLedger<S> {
        self.ledger
    }

    /// One cooperative second. A work phase that reaches zero pays out; a
    /// break that reaches zero advances the repetition.
    ///
    /// # Errors
    ///
    /// Payout failures from the ledger; the phase stays elapsed so the next
    /// tick or a skip retries.
    pub async fn tick(&mut self, token: TickToken) -> EngineResult<SessionStep> {
        match self.timer.tick(token) {
            TickOutcome::Stale => Ok(SessionStep::Stale),
            TickOutcome::Idle => Ok(SessionStep::Idle),
            TickOutcome::Counting { seconds_remaining } => {
                Ok(SessionStep::Counting { seconds_remaining })
            }
            TickOutcome::PhaseElapsed(PhaseKind::Work) => self.settle_work().await,
            TickOutcome::PhaseElapsed(PhaseKind::Break) => Ok(self.close_break()),
        }
    }

    pub fn pause(&mut self) -> bool {
        self.timer.pause()
    }

    pub fn resume(&mut self) -> bool {
        self.timer.resume()
    }

    /// Complete the current phase now. From work this pays out exactly like
    /// natural completion.
    ///
    /// # Errors
    ///
    /// [`EngineError::SessionFinished`] once completed, or payout failures.
    pub async fn skip(&mut self) -> EngineResult<SessionStep> {
        let phase = self.timer.phase();
        debug!(target: LOG_TARGET_SESSION, "skip requested in {phase:?}");
        match phase {
            TimerPhase::WorkRunning | TimerPhase::WorkPaused => self.settle_work().await,
            TimerPhase::BreakRunning | TimerPhase::BreakPaused => Ok(self.close_break()),
            TimerPhase::AwaitingEncounterResolution => Ok(SessionStep::Idle),
            TimerPhase::Completed => Err(EngineError::SessionFinished),
        }
    }

    /// End the session. During work the phase pays out first and the session
    /// completes once its encounters are resolved; during a break the
    /// remaining repetitions are dropped without reward.
    ///
    /// # Errors
    ///
    /// [`EngineError::SessionFinished`] once completed, or payout failures.
    pub async fn end(&mut self) -> EngineResult<SessionStep> {
        let phase = self.timer.phase();
        info!(target: LOG_TARGET_SESSION, "end requested in {phase:?}");
        match phase {
            TimerPhase::WorkRunning | TimerPhase::WorkPaused => {
                self.timer.request_end();
                self.settle_work().await
            }
            TimerPhase::BreakRunning | TimerPhase::BreakPaused => {
                self.timer.abandon_break();
                Ok(SessionStep::Completed(CompletionReason::Abandoned))
            }
            TimerPhase::AwaitingEncounterResolution => {
                self.timer.request_end();
                Ok(SessionStep::Idle)
            }
            TimerPhase::Completed => Err(EngineError::SessionFinished),
        }
    }

    /// Catch up to the configured number of encounters from the pending batch.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidSelection`] for a bad selection or no pending
    /// batch; ledger errors otherwise. A failed commit leaves the selection
    /// uncaught.
    pub async fn catch(&mut self, indices: &[usize]) -> EngineResult<CatchOutcome> {
        let pending = self
            .pending
            .as_ref()
            .ok_or(SelectionError::NoPendingBatch)?;
        let max = self.ledger.config().catching.max_selections;
        let names: Vec<String> = select_catches(&pending.batch, indices, &pending.caught, max)?
            .into_iter()
            .map(|species| species.name.clone())
            .collect();
        let award = pending.batch.experience_award;

        let dex_before = self.ledger.profile().pokedex.len();
        let outcome = self.ledger.catch(&names, award, &mut self.rng).await?;
        if let Some(pending) = self.pending.as_mut() {
            pending.caught.extend(indices.iter().copied());
        }
        self.summary.creatures_caught += u32::try_from(outcome.caught.len()).unwrap_or(u32::MAX);
        let registered = self.ledger.profile().pokedex.len().saturating_sub(dex_before);
        self.summary.new_species += u32::try_from(registered).unwrap_or(u32::MAX);
        Ok(outcome)
    }

    /// Leave the encounter screen: start the break, or complete the session
    /// after the final repetition or an early end.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidSelection`] when no batch is pending.
    pub fn resolve_encounters(&mut self) -> EngineResult<SessionStep> {
        if self.pending.is_none() {
            return Err(SelectionError::NoPendingBatch.into());
        }
        let next = self
            .timer
            .resolve_encounters()
            .ok_or(SelectionError::NoPendingBatch)?;
        self.pending = None;
        Ok(self.step_for(next))
    }

    /// Confirm evolution of the partner.
    ///
    /// # Errors
    ///
    /// Everything [`ProfileLedger::evolve_partner`] returns.
    pub async fn confirm_evolve(&mut self) -> EngineResult<ProgressionEvent> {
        let event = self.ledger.evolve_partner().await?;
        self.summary.evolutions += 1;
        Ok(event)
    }

    async fn settle_work(&mut self) -> EngineResult<SessionStep> {
        let batch = match self.unsettled.take() {
            Some(batch) => batch,
            None => {
                let config = self.timer.config();
                generate_encounters(
                    self.ledger.catalog(),
                    &self.ledger.config().encounters,
                    config.work_minutes,
                    config.elemental_type,
                    &mut self.rng,
                )
            }
        };
        let events = match self.ledger.award_partner(batch.experience_award).await {
            Ok(events) => events,
            Err(err) => {
                self.unsettled = Some(batch);
                return Err(err);
            }
        };
        self.timer.enter_resolution();
        self.summary.work_phases_paid += 1;
        self.summary.experience_awarded = self
            .summary
            .experience_awarded
            .saturating_add(batch.experience_award);
        self.summary.encounters_seen += u32::try_from(batch.len()).unwrap_or(u32::MAX);
        info!(
            target: LOG_TARGET_SESSION,
            "work phase {} paid {} XP with {} encounter(s)",
            self.timer.current_repetition(),
            batch.experience_award,
            batch.len()
        );
        self.pending = Some(PendingEncounters {
            batch: batch.clone(),
            caught: BTreeSet::new(),
        });
        Ok(SessionStep::EncountersReady { batch, events })
    }

    fn close_break(&mut self) -> SessionStep {
        match self.timer.finish_break() {
            Some(next) => self.step_for(next),
            None => SessionStep::Idle,
        }
    }

    fn step_for(&self, phase: TimerPhase) -> SessionStep {
        match phase {
            TimerPhase::BreakRunning | TimerPhase::BreakPaused => SessionStep::BreakStarted,
            TimerPhase::WorkRunning | TimerPhase::WorkPaused => SessionStep::WorkStarted {
                repetition: self.timer.current_repetition(),
            },
            TimerPhase::Completed => self
                .timer
                .state()
                .completion
                .map_or(SessionStep::Idle, SessionStep::Completed),
            TimerPhase::AwaitingEncounterResolution => SessionStep::Idle,
        }
    }
}
