use anyhow::{Result, bail, ensure};
use async_trait::async_trait;
use taskdex_game::{
    CompletionReason, ElementalType, EngineError, FocusSession, MemoryProfileStore, SessionConfig,
    SessionStep, encounter_count, experience_award,
};

use super::{Scenario, ScenarioCtx, onboard, run_phase};

fn partner_experience(session: &FocusSession<MemoryProfileStore>) -> Option<u32> {
    session.ledger().profile().partner().map(|p| p.experience)
}

/// One short Fire session: a single encounter, one catch, done.
pub struct Smoke;

#[async_trait]
impl Scenario for Smoke {
    fn name(&self) -> &'static str {
        "smoke"
    }

    fn description(&self) -> &'static str {
        "Onboard, run one 10 minute work phase, catch and complete"
    }

    async fn run(&self, ctx: &ScenarioCtx) -> Result<()> {
        let store = MemoryProfileStore::new();
        let ledger = onboard(ctx, &store, "Charmander").await?;
        let config = SessionConfig::new(ElementalType::Fire)
            .with_work_minutes(10)
            .with_repetitions(1);
        let mut session = FocusSession::start(ledger, config, ctx.seed)?;

        let step = run_phase(&mut session, ctx.tick).await?;
        let SessionStep::EncountersReady { batch, .. } = step else {
            bail!("expected encounters, got {step:?}");
        };
        ensure!(
            batch.len() == encounter_count(10) as usize,
            "expected {} encounter(s), got {}",
            encounter_count(10),
            batch.len()
        );
        ensure!(batch.experience_award == experience_award(10));
        if !batch.is_empty() {
            session.catch(&[0]).await?;
        }
        let done = session.resolve_encounters()?;
        ensure!(
            done == SessionStep::Completed(CompletionReason::AllRepetitions),
            "session ended with {done:?}"
        );
        Ok(())
    }
}

/// Default four-repetition session with catches after every work phase.
pub struct FullSession;

#[async_trait]
impl Scenario for FullSession {
    fn name(&self) -> &'static str {
        "full-session"
    }

    fn description(&self) -> &'static str {
        "Four 30 minute repetitions with breaks, catching after each"
    }

    async fn run(&self, ctx: &ScenarioCtx) -> Result<()> {
        let store = MemoryProfileStore::new();
        let ledger = onboard(ctx, &store, "Charmander").await?;
        let config = SessionConfig::new(ElementalType::Fire).with_task_label("QA marathon");
        let repetitions = config.num_repetitions;
        let work_minutes = config.work_minutes;
        let max_catches = ctx.config.catching.max_selections;
        let mut session = FocusSession::start(ledger, config, ctx.seed)?;

        let mut dex_size = session.ledger().profile().pokedex.len();
        for repetition in 1..=repetitions {
            let step = run_phase(&mut session, ctx.tick).await?;
            let SessionStep::EncountersReady { batch, .. } = step else {
                bail!("repetition {repetition}: expected encounters, got {step:?}");
            };
            let picks: Vec<usize> = (0..batch.len().min(max_catches)).collect();
            if !picks.is_empty() {
                session.catch(&picks).await?;
            }
            let dex_now = session.ledger().profile().pokedex.len();
            ensure!(dex_now >= dex_size, "Pokédex shrank after repetition {repetition}");
            dex_size = dex_now;

            match session.resolve_encounters()? {
                SessionStep::BreakStarted if repetition < repetitions => {
                    let next = run_phase(&mut session, ctx.tick).await?;
                    ensure!(
                        next == SessionStep::WorkStarted {
                            repetition: repetition + 1
                        },
                        "break ended with {next:?}"
                    );
                }
                SessionStep::Completed(CompletionReason::AllRepetitions)
                    if repetition == repetitions => {}
                other => bail!("repetition {repetition} resolved to {other:?}"),
            }
        }

        let summary = session.summary();
        let expected_xp = experience_award(work_minutes) * repetitions;
        ensure!(summary.work_phases_paid == repetitions);
        ensure!(
            summary.experience_awarded == expected_xp,
            "awarded {} XP, expected {expected_xp}",
            summary.experience_awarded
        );
        ensure!(summary.encounters_seen == encounter_count(work_minutes) * repetitions);

        let stored = store.snapshot(&ctx.user());
        ensure!(
            stored.as_ref() == Some(session.ledger().profile()),
            "stored profile diverged from the ledger"
        );
        Ok(())
    }
}

/// Skipping mid-phase must pay out exactly what running to zero pays.
pub struct SkipPayout;

#[async_trait]
impl Scenario for SkipPayout {
    fn name(&self) -> &'static str {
        "skip-payout"
    }

    fn description(&self) -> &'static str {
        "Skipping a work phase matches natural completion"
    }

    async fn run(&self, ctx: &ScenarioCtx) -> Result<()> {
        let config = SessionConfig::new(ElementalType::Electric)
            .with_work_minutes(20)
            .with_repetitions(1);
        let natural_store = MemoryProfileStore::new();
        let skipped_store = MemoryProfileStore::new();
        let mut natural = FocusSession::start(
            onboard(ctx, &natural_store, "Pikachu").await?,
            config.clone(),
            ctx.seed,
        )?;
        let mut skipped = FocusSession::start(
            onboard(ctx, &skipped_store, "Pikachu").await?,
            config,
            ctx.seed,
        )?;

        let elapsed = ctx.seed % u64::from(skipped.timer_state().seconds_remaining);
        for _ in 0..elapsed {
            let token = skipped.tick_token();
            skipped.tick(token).await?;
        }

        let natural_step = run_phase(&mut natural, ctx.tick).await?;
        let skipped_step = skipped.skip().await?;
        ensure!(
            natural_step == skipped_step,
            "skip produced {skipped_step:?}, natural run produced {natural_step:?}"
        );
        ensure!(natural.ledger().profile() == skipped.ledger().profile());
        ensure!(natural.timer_state().phase == skipped.timer_state().phase);
        Ok(())
    }
}

/// Ending during a break forfeits the remaining repetitions.
pub struct EndDuringBreak;

#[async_trait]
impl Scenario for EndDuringBreak {
    fn name(&self) -> &'static str {
        "end-during-break"
    }

    fn description(&self) -> &'static str {
        "End a session mid-break and confirm nothing more is paid"
    }

    async fn run(&self, ctx: &ScenarioCtx) -> Result<()> {
        let store = MemoryProfileStore::new();
        let ledger = onboard(ctx, &store, "Squirtle").await?;
        let config = SessionConfig::new(ElementalType::Water)
            .with_work_minutes(10)
            .with_break_minutes(1)
            .with_repetitions(3);
        let mut session = FocusSession::start(ledger, config, ctx.seed)?;

        let step = run_phase(&mut session, ctx.tick).await?;
        ensure!(
            matches!(step, SessionStep::EncountersReady { .. }),
            "expected encounters, got {step:?}"
        );
        ensure!(session.resolve_encounters()? == SessionStep::BreakStarted);
        for _ in 0..10 {
            let token = session.tick_token();
            session.tick(token).await?;
        }

        let ended = session.end().await?;
        ensure!(
            ended == SessionStep::Completed(CompletionReason::Abandoned),
            "end produced {ended:?}"
        );
        ensure!(session.is_completed());
        ensure!(session.summary().work_phases_paid == 1);
        ensure!(partner_experience(&session) == Some(experience_award(10)));
        ensure!(
            matches!(session.skip().await, Err(EngineError::SessionFinished)),
            "completed session accepted a skip"
        );
        Ok(())
    }
}

/// A rejected payout write leaves the profile untouched and retries cleanly.
pub struct CommitFailure;

#[async_trait]
impl Scenario for CommitFailure {
    fn name(&self) -> &'static str {
        "commit-failure"
    }

    fn description(&self) -> &'static str {
        "Inject a store failure at payout and retry with skip"
    }

    async fn run(&self, ctx: &ScenarioCtx) -> Result<()> {
        let store = MemoryProfileStore::new();
        let ledger = onboard(ctx, &store, "Bulbasaur").await?;
        let config = SessionConfig::new(ElementalType::Grass)
            .with_work_minutes(10)
            .with_repetitions(1);
        let mut session = FocusSession::start(ledger, config, ctx.seed)?;
        store.fail_next_commits(1);

        let failure = loop {
            let token = session.tick_token();
            match session.tick(token).await {
                Ok(SessionStep::Counting { .. }) => {}
                Ok(other) => bail!("payout succeeded despite injected failure: {other:?}"),
                Err(err) => break err,
            }
        };
        ensure!(
            matches!(failure, EngineError::CommitFailure(_)),
            "unexpected error {failure}"
        );
        ensure!(partner_experience(&session) == Some(0));
        ensure!(session.summary().work_phases_paid == 0);

        let retried = session.skip().await?;
        ensure!(
            matches!(retried, SessionStep::EncountersReady { .. }),
            "retry produced {retried:?}"
        );
        ensure!(partner_experience(&session) == Some(experience_award(10)));
        let stored = store
            .snapshot(&ctx.user())
            .and_then(|profile| profile.partner().map(|p| p.experience));
        ensure!(stored == Some(experience_award(10)), "store holds {stored:?}");
        Ok(())
    }
}
