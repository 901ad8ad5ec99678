use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::time::Duration;
use taskdex_game::{
    EngineConfig, FocusSession, MemoryProfileStore, ProfileLedger, ProfileStore, SessionStep,
    TrainerGender, UserId, catalog,
};

pub mod profile;
pub mod session;

/// How scripted sessions advance their clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickMode {
    /// Tick back-to-back without waiting.
    Virtual,
    /// Wait for a tokio interval before every tick.
    Paced(Duration),
}

impl TickMode {
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        if millis == 0 {
            Self::Virtual
        } else {
            Self::Paced(Duration::from_millis(millis))
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScenarioCtx {
    pub seed: u64,
    pub config: EngineConfig,
    pub tick: TickMode,
    pub verbose: bool,
}

impl ScenarioCtx {
    #[must_use]
    pub fn user(&self) -> UserId {
        UserId::new(format!("qa-{}", self.seed))
    }
}

#[async_trait]
pub trait Scenario: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    async fn run(&self, ctx: &ScenarioCtx) -> Result<()>;
}

fn all_scenarios() -> Vec<Box<dyn Scenario>> {
    vec![
        Box::new(session::Smoke),
        Box::new(session::FullSession),
        Box::new(session::SkipPayout),
        Box::new(session::EndDuringBreak),
        Box::new(session::CommitFailure),
        Box::new(profile::DuplicateCatch),
        Box::new(profile::EvolutionChain),
        Box::new(profile::DevUnlockRevert),
    ]
}

#[must_use]
pub fn get_scenario(name: &str) -> Option<Box<dyn Scenario>> {
    all_scenarios()
        .into_iter()
        .find(|scenario| scenario.name() == name)
}

#[must_use]
pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    all_scenarios()
        .iter()
        .map(|scenario| (scenario.name(), scenario.description()))
        .collect()
}

/// Onboard the scenario's trainer with `starter` in a fresh profile.
pub async fn onboard(
    ctx: &ScenarioCtx,
    store: &MemoryProfileStore,
    starter: &str,
) -> Result<ProfileLedger<MemoryProfileStore>> {
    let mut rng = ChaCha20Rng::seed_from_u64(ctx.seed);
    ProfileLedger::create_profile(
        store.clone(),
        catalog::shared(),
        ctx.config.clone(),
        ctx.user(),
        starter,
        TrainerGender::Female,
        &mut rng,
    )
    .await
    .with_context(|| format!("onboarding with {starter}"))
}

/// Tick until the current phase produces something other than a countdown.
pub async fn run_phase<S: ProfileStore>(
    session: &mut FocusSession<S>,
    mode: TickMode,
) -> Result<SessionStep> {
    let mut pacer = match mode {
        TickMode::Virtual => None,
        TickMode::Paced(period) => Some(tokio::time::interval(period)),
    };
    let budget = session.timer_state().seconds_remaining + 1;
    for _ in 0..budget {
        if let Some(pacer) = pacer.as_mut() {
            pacer.tick().await;
        }
        let token = session.tick_token();
        match session.tick(token).await? {
            SessionStep::Counting { .. } => {}
            other => return Ok(other),
        }
    }
    bail!("phase did not elapse within {budget} ticks")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_millis_ticks_virtually() {
        assert_eq!(TickMode::from_millis(0), TickMode::Virtual);
        assert_eq!(
            TickMode::from_millis(5),
            TickMode::Paced(Duration::from_millis(5))
        );
    }

    #[test]
    fn scenario_names_are_unique_and_resolvable() {
        let listed = list_scenarios();
        assert!(listed.iter().any(|(name, _)| *name == "smoke"));
        for (name, description) in &listed {
            assert!(!description.is_empty());
            assert_eq!(
                listed.iter().filter(|(other, _)| other == name).count(),
                1,
                "{name} listed twice"
            );
            assert!(get_scenario(name).is_some());
        }
        assert!(get_scenario("missing").is_none());
    }
}
