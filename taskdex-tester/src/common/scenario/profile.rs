use anyhow::{Context, Result, bail, ensure};
use async_trait::async_trait;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use taskdex_game::{EngineError, EvolutionThreshold, MemoryProfileStore, ProgressionEvent};

use super::{Scenario, ScenarioCtx, onboard};

/// Awards given before an evolution must be ready; generous for any threshold
/// in the bundled table.
const MAX_AWARDS_PER_STAGE: usize = 200;

pub struct DuplicateCatch;

#[async_trait]
impl Scenario for DuplicateCatch {
    fn name(&self) -> &'static str {
        "duplicate-catch"
    }

    fn description(&self) -> &'static str {
        "Catch the same species twice in one batch and merge into one row"
    }

    async fn run(&self, ctx: &ScenarioCtx) -> Result<()> {
        let store = MemoryProfileStore::new();
        let mut ledger = onboard(ctx, &store, "Squirtle").await?;
        let mut rng = ChaCha20Rng::seed_from_u64(ctx.seed);
        let award = 100;

        let outcome = ledger
            .catch(&["Charmander", "Charmander"], award, &mut rng)
            .await?;
        ensure!(outcome.has_new_species, "Charmander was not reported as new");

        let policy = ctx.config.catching;
        let expected = policy.new_catch_experience(award) + policy.duplicate_bonus;
        let rows: Vec<_> = ledger
            .profile()
            .inventory
            .iter()
            .filter(|row| row.current_name == "Charmander")
            .collect();
        ensure!(rows.len() == 1, "expected one Charmander row, got {}", rows.len());
        ensure!(
            rows[0].experience == expected,
            "Charmander holds {} XP, expected {expected}",
            rows[0].experience
        );
        ensure!(ledger.profile().inventory.partner_count() == 1);
        Ok(())
    }
}

/// Walk a starter up its whole chain, then confirm the final form refuses.
pub struct EvolutionChain;

#[async_trait]
impl Scenario for EvolutionChain {
    fn name(&self) -> &'static str {
        "evolution-chain"
    }

    fn description(&self) -> &'static str {
        "Level Charmander through every evolution to its final form"
    }

    async fn run(&self, ctx: &ScenarioCtx) -> Result<()> {
        let store = MemoryProfileStore::new();
        let mut ledger = onboard(ctx, &store, "Charmander").await?;

        loop {
            let partner = ledger.profile().partner().context("partner missing")?;
            let species = ledger
                .catalog()
                .by_name(&partner.current_name)
                .with_context(|| format!("{} not cataloged", partner.current_name))?;
            if let EvolutionThreshold::Final = species.evolution_threshold {
                break;
            }
            let target = species
                .evolution_target()
                .context("evolvable species without a target")?
                .to_string();

            let mut awards = 0;
            while !ledger.partner_ready_to_evolve() {
                ensure!(awards < MAX_AWARDS_PER_STAGE, "never became ready");
                ledger.award_partner(100).await?;
                awards += 1;
            }

            match ledger.evolve_partner().await? {
                ProgressionEvent::Evolved { to, .. } if to == target => {}
                other => bail!("expected evolution into {target}, got {other:?}"),
            }
            let partner = ledger.profile().partner().context("partner missing")?;
            ensure!(partner.experience == 0, "experience not reset on evolution");
            ensure!(partner.original_name == "Charmander");
            ensure!(
                ledger.profile().pokedex.contains(&target),
                "{target} not registered"
            );
            if ctx.verbose {
                println!("     ↳ evolved into {target} after {awards} award(s)");
            }
        }

        ensure!(
            matches!(
                ledger.evolve_partner().await,
                Err(EngineError::NotReadyToEvolve { .. })
            ),
            "final form accepted an evolution"
        );
        Ok(())
    }
}

/// Dev unlock followed by restore returns the exact pre-unlock progress.
pub struct DevUnlockRevert;

#[async_trait]
impl Scenario for DevUnlockRevert {
    fn name(&self) -> &'static str {
        "dev-unlock-revert"
    }

    fn description(&self) -> &'static str {
        "Unlock the full catalog, then restore the saved progress"
    }

    async fn run(&self, ctx: &ScenarioCtx) -> Result<()> {
        let store = MemoryProfileStore::new();
        let mut ledger = onboard(ctx, &store, "Cyndaquil").await?;
        let mut rng = ChaCha20Rng::seed_from_u64(ctx.seed);
        ledger.award_partner(100).await?;
        ledger.catch(&["Totodile"], 100, &mut rng).await?;
        let before = ledger.profile().clone();

        let added = ledger.unlock_catalog(&mut rng).await?;
        let catalog_size = ledger.catalog().len();
        ensure!(added == catalog_size - 2, "unlock added {added} creature(s)");
        ensure!(ledger.profile().pokedex.len() == catalog_size);
        ensure!(ledger.profile().inventory.partner_count() == 1);
        ensure!(ledger.profile().has_backup());

        // A second unlock keeps the first snapshot.
        ensure!(ledger.unlock_catalog(&mut rng).await? == 0);

        ledger.restore_backup().await?;
        let after = ledger.profile();
        ensure!(after.inventory == before.inventory, "inventory not restored");
        ensure!(after.pokedex == before.pokedex, "Pokédex not restored");
        ensure!(!after.has_backup());
        ensure!(
            matches!(ledger.restore_backup().await, Err(EngineError::NoBackup)),
            "restore without a snapshot succeeded"
        );
        Ok(())
    }
}
