use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use taskdex_game::{
    CompletionReason, ElementalType, EngineConfig, EngineError, FocusSession,
    MemoryProfileStore, ProfileLedger, SessionConfig, SessionStep, TimerPhase, TrainerGender,
    UserId, catalog,
};

async fn onboard(store: &MemoryProfileStore, user: &str, starter: &str) -> ProfileLedger<MemoryProfileStore> {
    ProfileLedger::create_profile(
        store.clone(),
        catalog::shared(),
        EngineConfig::default_config(),
        UserId::new(user),
        starter,
        TrainerGender::Female,
        &mut ChaCha20Rng::seed_from_u64(7),
    )
    .await
    .expect("onboarding")
}

/// Tick until something other than a countdown happens.
async fn run_phase(session: &mut FocusSession<MemoryProfileStore>) -> SessionStep {
    loop {
        let token = session.tick_token();
        match session.tick(token).await.expect("tick") {
            SessionStep::Counting { .. } => {}
            other => return other,
        }
    }
}

#[tokio::test]
async fn thirty_minute_fire_session_pays_three_encounters_and_100_xp() {
    let store = MemoryProfileStore::new();
    let ledger = onboard(&store, "ash", "Charmander").await;
    let config = SessionConfig::new(ElementalType::Fire)
        .with_work_minutes(30)
        .with_repetitions(1);
    let mut session = FocusSession::start(ledger, config, 2024).expect("start");

    let step = run_phase(&mut session).await;
    let SessionStep::EncountersReady { batch, .. } = step else {
        panic!("expected encounters, got {step:?}");
    };
    assert_eq!(batch.len(), 3);
    assert_eq!(batch.experience_award, 100);
    assert!(
        batch
            .species
            .iter()
            .all(|species| species.elemental_type == ElementalType::Fire)
    );
    assert_eq!(
        session.ledger().profile().partner().map(|p| p.experience),
        Some(100)
    );

    assert_eq!(
        session.resolve_encounters().expect("resolve"),
        SessionStep::Completed(CompletionReason::AllRepetitions)
    );
    let state = session.timer_state();
    assert_eq!(state.completed_repetitions, 1);
    assert!(state.is_completed());

    let stored = store.snapshot(&UserId::new("ash")).expect("stored");
    assert_eq!(stored.partner().map(|p| p.experience), Some(100));
}

#[tokio::test]
async fn skipping_work_matches_natural_completion() {
    let natural_store = MemoryProfileStore::new();
    let skipped_store = MemoryProfileStore::new();
    let config = SessionConfig::new(ElementalType::Electric)
        .with_work_minutes(20)
        .with_repetitions(1);

    let mut natural = FocusSession::start(
        onboard(&natural_store, "red", "Pikachu").await,
        config.clone(),
        99,
    )
    .expect("start");
    let mut skipped = FocusSession::start(
        onboard(&skipped_store, "red", "Pikachu").await,
        config,
        99,
    )
    .expect("start");

    // Let some time pass on the skipped session first.
    for _ in 0..125 {
        let token = skipped.tick_token();
        skipped.tick(token).await.expect("tick");
    }

    let natural_step = run_phase(&mut natural).await;
    let skipped_step = skipped.skip().await.expect("skip");
    assert_eq!(natural_step, skipped_step);
    assert_eq!(natural.timer_state().phase, skipped.timer_state().phase);
    assert_eq!(natural.ledger().profile(), skipped.ledger().profile());
}

#[tokio::test]
async fn multi_repetition_session_runs_breaks_between_work_phases() {
    let store = MemoryProfileStore::new();
    let ledger = onboard(&store, "misty", "Squirtle").await;
    let config = SessionConfig::new(ElementalType::Water)
        .with_work_minutes(10)
        .with_break_minutes(1)
        .with_repetitions(3);
    let mut session = FocusSession::start(ledger, config, 5).expect("start");

    for repetition in 1..=3 {
        assert_eq!(session.timer_state().current_repetition, repetition);
        let step = run_phase(&mut session).await;
        assert!(matches!(step, SessionStep::EncountersReady { .. }));
        session.catch(&[0]).await.expect("catch");
        let after = session.resolve_encounters().expect("resolve");
        if repetition < 3 {
            assert_eq!(after, SessionStep::BreakStarted);
            assert_eq!(session.timer_state().seconds_remaining, 60);
            assert_eq!(
                run_phase(&mut session).await,
                SessionStep::WorkStarted {
                    repetition: repetition + 1
                }
            );
        } else {
            assert_eq!(after, SessionStep::Completed(CompletionReason::AllRepetitions));
        }
    }

    let summary = session.summary();
    assert_eq!(summary.work_phases_paid, 3);
    assert_eq!(summary.experience_awarded, 99);
    assert_eq!(summary.encounters_seen, 3);
    assert_eq!(summary.creatures_caught, 3);
    let partner_xp = session.ledger().profile().partner().map(|p| p.experience);
    assert_eq!(partner_xp, Some(99));
}

#[tokio::test]
async fn ending_during_work_pays_out_then_completes() {
    let store = MemoryProfileStore::new();
    let ledger = onboard(&store, "brock", "Bulbasaur").await;
    let config = SessionConfig::new(ElementalType::Grass)
        .with_work_minutes(30)
        .with_repetitions(4);
    let mut session = FocusSession::start(ledger, config, 11).expect("start");

    for _ in 0..60 {
        let token = session.tick_token();
        session.tick(token).await.expect("tick");
    }
    let step = session.end().await.expect("end");
    assert!(matches!(step, SessionStep::EncountersReady { .. }));
    assert_eq!(
        session.ledger().profile().partner().map(|p| p.experience),
        Some(100)
    );
    assert_eq!(
        session.resolve_encounters().expect("resolve"),
        SessionStep::Completed(CompletionReason::EndedEarly)
    );
    assert!(matches!(session.skip().await, Err(EngineError::SessionFinished)));
}

#[tokio::test]
async fn ticks_scheduled_before_a_pause_are_ignored() {
    let store = MemoryProfileStore::new();
    let ledger = onboard(&store, "gary", "Eevee").await;
    let mut session =
        FocusSession::start(ledger, SessionConfig::new(ElementalType::Ghost), 3).expect("start");

    let scheduled = session.tick_token();
    assert!(session.pause());
    let paused_at = session.timer_state().seconds_remaining;
    assert_eq!(session.tick(scheduled).await.expect("tick"), SessionStep::Stale);
    let current = session.tick_token();
    assert_eq!(session.tick(current).await.expect("tick"), SessionStep::Idle);
    assert!(session.resume());
    assert_eq!(session.tick(scheduled).await.expect("tick"), SessionStep::Stale);
    assert_eq!(session.timer_state().seconds_remaining, paused_at);
    assert_eq!(session.timer_state().phase, TimerPhase::WorkRunning);
}

#[tokio::test]
async fn invalid_session_configs_are_rejected_up_front() {
    let store = MemoryProfileStore::new();
    let ledger = onboard(&store, "erika", "Chikorita").await;
    let result = FocusSession::start(
        ledger,
        SessionConfig::new(ElementalType::Grass).with_work_minutes(0),
        1,
    );
    assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
}

#[tokio::test]
async fn ticks_scheduled_before_ending_are_ignored() {
    let store = MemoryProfileStore::new();
    let ledger = onboard(&store, "sabrina", "Cyndaquil").await;
    let config = SessionConfig::new(ElementalType::Psychic)
        .with_work_minutes(10)
        .with_break_minutes(1)
        .with_repetitions(3);
    let mut session = FocusSession::start(ledger, config, 17).expect("start");

    // Ending mid-work pays out; the countdown tick queued before it must not.
    let during_work = session.tick_token();
    assert!(matches!(
        session.end().await.expect("end"),
        SessionStep::EncountersReady { .. }
    ));
    assert_eq!(session.tick(during_work).await.expect("tick"), SessionStep::Stale);
    assert_eq!(
        session.timer_state().phase,
        TimerPhase::AwaitingEncounterResolution
    );
    assert_eq!(
        session.resolve_encounters().expect("resolve"),
        SessionStep::Completed(CompletionReason::EndedEarly)
    );

    let ledger = session.into_ledger();
    let config = SessionConfig::new(ElementalType::Psychic)
        .with_work_minutes(10)
        .with_break_minutes(1)
        .with_repetitions(3);
    let mut session = FocusSession::start(ledger, config, 18).expect("restart");
    run_phase(&mut session).await;
    assert_eq!(
        session.resolve_encounters().expect("resolve"),
        SessionStep::BreakStarted
    );
    let during_break = session.tick_token();
    assert_eq!(
        session.end().await.expect("end"),
        SessionStep::Completed(CompletionReason::Abandoned)
    );
    assert_eq!(session.tick(during_break).await.expect("tick"), SessionStep::Stale);
    let state = session.timer_state();
    assert!(state.is_completed());
    assert_eq!(state.completed_repetitions, 1);
}
