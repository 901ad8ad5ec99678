//! Profile ledger: every mutation is computed on a copy of the profile,
//! committed through the store, and swapped in only once the commit succeeds.
use log::{info, warn};
use rand::Rng;
use std::sync::Arc;

use crate::catalog::SpeciesCatalog;
use crate::catching::{self, CatchOutcome};
use crate::config::EngineConfig;
use crate::constants::LOG_TARGET_LEDGER;
use crate::error::{EngineError, EngineResult};
use crate::inventory::{InstanceId, Inventory, InventoryEntry, Pokedex};
use crate::profile::{Profile, ProfileBackup, TrainerGender, UserId};
use crate::progression::{self, ProgressionEvent};
use crate::species::ElementalType;
use crate::storage::{BackupChange, ProfileStore, ProfileUpdate};
use crate::tasks::{Task, TaskId};

pub struct ProfileLedger<S: ProfileStore> {
    store: S,
    catalog: Arc<SpeciesCatalog>,
    config: EngineConfig,
    profile: Profile,
}

impl<S: ProfileStore> ProfileLedger<S> {
    /// Open the ledger for an onboarded user.
    ///
    /// # Errors
    ///
    /// [`EngineError::LoadFailure`] when the store cannot be read and
    /// [`EngineError::ProfileMissing`] when the user has no profile yet.
    pub async fn load(
        store: S,
        catalog: Arc<SpeciesCatalog>,
        config: EngineConfig,
        user: UserId,
    ) -> EngineResult<Self> {
        let profile = store
            .load_profile(&user)
            .await
            .map_err(|err| EngineError::LoadFailure(Box::new(err)))?
            .ok_or(EngineError::ProfileMissing(user))?;
        Ok(Self {
            store,
            catalog,
            config,
            profile,
        })
    }

    /// Onboard a user with a starter: one partner row at 0 XP and a Pokédex
    /// holding only the starter. Tasks already stored for the user survive.
    ///
    /// # Errors
    ///
    /// [`EngineError::ProfileExists`] for an onboarded user,
    /// [`EngineError::StarterNotAllowed`] / [`EngineError::UnknownSpecies`] for a
    /// bad starter, and load/commit failures from the store.
    pub async fn create_profile<R>(
        store: S,
        catalog: Arc<SpeciesCatalog>,
        config: EngineConfig,
        user: UserId,
        starter: &str,
        gender: TrainerGender,
        rng: &mut R,
    ) -> EngineResult<Self>
    where
        R: Rng + ?Sized,
    {
        if !config.is_starter(starter) {
            return Err(EngineError::StarterNotAllowed(starter.to_string()));
        }
        let species = catalog
            .by_name(starter)
            .ok_or_else(|| EngineError::UnknownSpecies(starter.to_string()))?;
        let starter_entry = InventoryEntry::from_species(InstanceId::generate(rng), species, 0, true);
        let mut pokedex = Pokedex::default();
        pokedex.register(species);

        let existing = store
            .load_profile(&user)
            .await
            .map_err(|err| EngineError::LoadFailure(Box::new(err)))?;
        if existing.as_ref().is_some_and(|profile| profile.profile_complete) {
            return Err(EngineError::ProfileExists(user));
        }
        let mut profile = existing.unwrap_or_else(|| Profile::new(user.clone()));
        profile.inventory = Inventory::new(vec![starter_entry]);
        profile.pokedex = pokedex;
        profile.backup = None;
        profile.trainer_gender = Some(gender);
        profile.profile_complete = true;

        store
            .commit_profile(&user, &ProfileUpdate::full(&profile))
            .await
            .map_err(|err| EngineError::CommitFailure(Box::new(err)))?;
        info!(target: LOG_TARGET_LEDGER, "{user} chose {starter} as their starter");
        Ok(Self {
            store,
            catalog,
            config,
            profile,
        })
    }

    #[must_use]
    pub const fn profile(&self) -> &Profile {
        &self.profile
    }

    #[must_use]
    pub const fn user(&self) -> &UserId {
        &self.profile.user_id
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn catalog(&self) -> &SpeciesCatalog {
        &self.catalog
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn into_profile(self) -> Profile {
        self.profile
    }

    #[must_use]
    pub fn partner_ready_to_evolve(&self) -> bool {
        self.profile
            .partner()
            .is_some_and(|partner| progression::is_ready_to_evolve(&self.catalog, partner))
    }

    async fn commit(&mut self, next: Profile, update: ProfileUpdate) -> EngineResult<()> {
        if update.is_empty() {
            self.profile = next;
            return Ok(());
        }
        if let Err(err) = self
            .store
            .commit_profile(&self.profile.user_id, &update)
            .await
        {
            warn!(
                target: LOG_TARGET_LEDGER,
                "commit for {} failed, keeping previous state: {err}", self.profile.user_id
            );
            return Err(EngineError::CommitFailure(Box::new(err)));
        }
        self.profile = next;
        Ok(())
    }

    /// Give the partner a work-phase experience award under the configured gate.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoPartner`], [`EngineError::UnknownSpecies`] or
    /// [`EngineError::CommitFailure`].
    pub async fn award_partner(&mut self, amount: u32) -> EngineResult<Vec<ProgressionEvent>> {
        let mut next = self.profile.clone();
        let gate = self.config.progression.experience_gate;
        let partner = next.inventory.partner_mut().ok_or(EngineError::NoPartner)?;
        let events = progression::award_experience(&self.catalog, partner, amount, gate)?;
        let changed = events
            .iter()
            .any(|event| matches!(event, ProgressionEvent::ExperienceAwarded { .. }));
        let update = if changed {
            ProfileUpdate::default().with_inventory(&next.inventory)
        } else {
            ProfileUpdate::default()
        };
        self.commit(next, update).await?;
        Ok(events)
    }

    /// Catch a batch of species as one combined inventory + Pokédex write.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownSpecies`] before anything changes, or
    /// [`EngineError::CommitFailure`].
    pub async fn catch<N, R>(
        &mut self,
        names: &[N],
        award: u32,
        rng: &mut R,
    ) -> EngineResult<CatchOutcome>
    where
        N: AsRef<str>,
        R: Rng + ?Sized,
    {
        let mut next = self.profile.clone();
        let outcome = catching::catch(
            &self.catalog,
            &self.config.catching,
            &mut next.inventory,
            &mut next.pokedex,
            names,
            award,
            rng,
        )?;
        let update = ProfileUpdate::default()
            .with_inventory(&next.inventory)
            .with_pokedex(&next.pokedex);
        self.commit(next, update).await?;
        info!(
            target: LOG_TARGET_LEDGER,
            "{} caught {} creature(s){}",
            self.profile.user_id,
            outcome.caught.len(),
            if outcome.has_new_species { ", new species registered" } else { "" }
        );
        Ok(outcome)
    }

    /// Evolve one creature on explicit confirmation.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownInstance`], [`EngineError::NotReadyToEvolve`],
    /// [`EngineError::UnknownSpecies`] or [`EngineError::CommitFailure`].
    pub async fn evolve(&mut self, instance_id: InstanceId) -> EngineResult<ProgressionEvent> {
        let mut next = self.profile.clone();
        let entry = next
            .inventory
            .get_mut(instance_id)
            .ok_or(EngineError::UnknownInstance(instance_id))?;
        let event = progression::evolve(&self.catalog, entry, &mut next.pokedex)?;
        let update = ProfileUpdate::default()
            .with_inventory(&next.inventory)
            .with_pokedex(&next.pokedex);
        self.commit(next, update).await?;
        Ok(event)
    }

    /// # Errors
    ///
    /// [`EngineError::NoPartner`] plus everything [`ProfileLedger::evolve`] returns.
    pub async fn evolve_partner(&mut self) -> EngineResult<ProgressionEvent> {
        let partner = self
            .profile
            .partner()
            .map(|partner| partner.instance_id)
            .ok_or(EngineError::NoPartner)?;
        self.evolve(partner).await
    }

    /// # Errors
    ///
    /// [`EngineError::UnknownInstance`] or [`EngineError::CommitFailure`].
    pub async fn set_partner(&mut self, instance_id: InstanceId) -> EngineResult<()> {
        if self
            .profile
            .partner()
            .is_some_and(|partner| partner.instance_id == instance_id)
        {
            return Ok(());
        }
        let mut next = self.profile.clone();
        if !next.inventory.set_partner(instance_id) {
            return Err(EngineError::UnknownInstance(instance_id));
        }
        let update = ProfileUpdate::default().with_inventory(&next.inventory);
        self.commit(next, update).await
    }

    /// Dev mode: snapshot the current inventory and Pokédex, then register
    /// every catalog species and add a fresh row for each one not owned.
    /// Owned rows keep their experience, evolution and partner flag. An
    /// existing snapshot is kept so repeated unlocks still restore the
    /// pre-unlock progress.
    ///
    /// # Errors
    ///
    /// [`EngineError::CommitFailure`].
    pub async fn unlock_catalog<R>(&mut self, rng: &mut R) -> EngineResult<usize>
    where
        R: Rng + ?Sized,
    {
        let mut next = self.profile.clone();
        let backup = self.profile.backup.clone().unwrap_or_else(|| ProfileBackup {
            inventory: self.profile.inventory.clone(),
            pokedex: self.profile.pokedex.clone(),
        });

        let mut added = 0;
        for species in self.catalog.iter() {
            next.pokedex.register(species);
            if next.inventory.owns_species(species.id) {
                continue;
            }
            let mut instance_id = InstanceId::generate(rng);
            while next.inventory.contains_instance(instance_id) {
                instance_id = InstanceId::generate(rng);
            }
            next.inventory
                .push(InventoryEntry::from_species(instance_id, species, 0, false));
            added += 1;
        }
        next.pokedex.sort_by_species_id();
        next.inventory.normalize_partner();
        next.backup = Some(backup.clone());

        let update = ProfileUpdate::default()
            .with_inventory(&next.inventory)
            .with_pokedex(&next.pokedex)
            .with_backup(BackupChange::Set(backup));
        self.commit(next, update).await?;
        info!(target: LOG_TARGET_LEDGER, "dev unlock added {added} creature(s)");
        Ok(added)
    }

    /// Restore the dev-mode snapshot wholesale and discard it. A snapshot
    /// taken without a partner promotes its first row.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoBackup`] or [`EngineError::CommitFailure`].
    pub async fn restore_backup(&mut self) -> EngineResult<()> {
        let backup = self.profile.backup.clone().ok_or(EngineError::NoBackup)?;
        let mut next = self.profile.clone();
        next.inventory = backup.inventory;
        next.pokedex = backup.pokedex;
        next.inventory.normalize_partner();
        next.backup = None;
        let update = ProfileUpdate::default()
            .with_inventory(&next.inventory)
            .with_pokedex(&next.pokedex)
            .with_backup(BackupChange::Clear);
        self.commit(next, update).await?;
        info!(target: LOG_TARGET_LEDGER, "restored pre-unlock progress");
        Ok(())
    }

    /// # Errors
    ///
    /// Task validation errors or [`EngineError::CommitFailure`].
    pub async fn add_task(
        &mut self,
        name: &str,
        elemental_type: ElementalType,
        description: &str,
    ) -> EngineResult<TaskId> {
        let mut next = self.profile.clone();
        let id = next.tasks.add(name, elemental_type, description)?;
        let update = ProfileUpdate::default().with_tasks(&next.tasks);
        self.commit(next, update).await?;
        Ok(id)
    }

    /// # Errors
    ///
    /// [`EngineError::UnknownTask`] or [`EngineError::CommitFailure`].
    pub async fn complete_task(&mut self, id: TaskId) -> EngineResult<()> {
        let mut next = self.profile.clone();
        next.tasks.complete(id)?;
        let update = ProfileUpdate::default().with_tasks(&next.tasks);
        self.commit(next, update).await
    }

    /// # Errors
    ///
    /// [`EngineError::UnknownTask`] or [`EngineError::CommitFailure`].
    pub async fn remove_task(&mut self, id: TaskId) -> EngineResult<Task> {
        let mut next = self.profile.clone();
        let removed = next.tasks.remove(id)?;
        let update = ProfileUpdate::default().with_tasks(&next.tasks);
        self.commit(next, update).await?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::storage::MemoryProfileStore;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    async fn onboarded(starter: &str) -> (MemoryProfileStore, ProfileLedger<MemoryProfileStore>) {
        let store = MemoryProfileStore::new();
        let ledger = ProfileLedger::create_profile(
            store.clone(),
            catalog::shared(),
            EngineConfig::default_config(),
            UserId::new("ash"),
            starter,
            TrainerGender::Male,
            &mut ChaCha20Rng::seed_from_u64(1),
        )
        .await
        .expect("onboarding");
        (store, ledger)
    }

    #[tokio::test]
    async fn starter_profile_has_single_partner_and_dex_entry() {
        let (store, ledger) = onboarded("Charmander").await;
        let profile = ledger.profile();
        assert!(profile.profile_complete);
        assert_eq!(profile.inventory.len(), 1);
        let partner = profile.partner().expect("partner");
        assert_eq!(partner.current_name, "Charmander");
        assert_eq!(partner.experience, 0);
        assert_eq!(profile.pokedex.names().collect::<Vec<_>>(), vec!["Charmander"]);
        assert_eq!(store.snapshot(ledger.user()).as_ref(), Some(profile));
    }

    #[tokio::test]
    async fn onboarding_twice_or_with_bad_starter_fails() {
        let (store, _) = onboarded("Squirtle").await;
        let again = ProfileLedger::create_profile(
            store.clone(),
            catalog::shared(),
            EngineConfig::default_config(),
            UserId::new("ash"),
            "Pikachu",
            TrainerGender::Male,
            &mut ChaCha20Rng::seed_from_u64(2),
        )
        .await;
        assert!(matches!(again, Err(EngineError::ProfileExists(_))));

        let not_starter = ProfileLedger::create_profile(
            store,
            catalog::shared(),
            EngineConfig::default_config(),
            UserId::new("brock"),
            "Mewtwo",
            TrainerGender::Male,
            &mut ChaCha20Rng::seed_from_u64(2),
        )
        .await;
        assert!(matches!(not_starter, Err(EngineError::StarterNotAllowed(name)) if name == "Mewtwo"));
    }

    #[tokio::test]
    async fn load_requires_an_existing_profile() {
        let store = MemoryProfileStore::new();
        let missing = ProfileLedger::load(
            store,
            catalog::shared(),
            EngineConfig::default_config(),
            UserId::new("nobody"),
        )
        .await;
        assert!(matches!(missing, Err(EngineError::ProfileMissing(_))));
    }

    #[tokio::test]
    async fn failed_commit_leaves_state_untouched() {
        let (store, mut ledger) = onboarded("Bulbasaur").await;
        let before = ledger.profile().clone();
        store.fail_next_commits(1);
        let err = ledger
            .catch(&["Oddish"], 100, &mut ChaCha20Rng::seed_from_u64(3))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::CommitFailure(_)));
        assert!(err.is_retryable());
        assert_eq!(ledger.profile(), &before);
        assert_eq!(store.snapshot(ledger.user()).as_ref(), Some(&before));

        ledger
            .catch(&["Oddish"], 100, &mut ChaCha20Rng::seed_from_u64(3))
            .await
            .unwrap();
        assert_eq!(ledger.profile().inventory.len(), 2);
    }

    #[tokio::test]
    async fn award_then_confirmed_evolution() {
        let (_, mut ledger) = onboarded("Charmander").await;
        for _ in 0..7 {
            ledger.award_partner(100).await.unwrap();
        }
        assert!(!ledger.partner_ready_to_evolve());
        assert!(matches!(
            ledger.evolve_partner().await,
            Err(EngineError::NotReadyToEvolve { experience: 700, .. })
        ));
        let events = ledger.award_partner(100).await.unwrap();
        assert!(
            events
                .iter()
                .any(|e| matches!(e, ProgressionEvent::ReadyToEvolve { .. }))
        );
        assert!(ledger.partner_ready_to_evolve());
        ledger.evolve_partner().await.unwrap();
        let partner = ledger.profile().partner().expect("partner");
        assert_eq!(partner.current_name, "Charmeleon");
        assert_eq!(partner.experience, 0);
        assert!(ledger.profile().pokedex.contains("Charmeleon"));
    }

    #[tokio::test]
    async fn set_partner_switches_and_rejects_unknown_ids() {
        let (_, mut ledger) = onboarded("Pikachu").await;
        let outcome = ledger
            .catch(&["Mareep"], 30, &mut ChaCha20Rng::seed_from_u64(9))
            .await
            .unwrap();
        let mareep = outcome.caught[0].instance_id;
        ledger.set_partner(mareep).await.unwrap();
        assert_eq!(ledger.profile().inventory.partner_count(), 1);
        assert_eq!(
            ledger.profile().partner().map(|p| p.instance_id),
            Some(mareep)
        );
        assert!(matches!(
            ledger.set_partner(InstanceId(0xdead)).await,
            Err(EngineError::UnknownInstance(_))
        ));
    }

    #[tokio::test]
    async fn unlock_and_restore_round_trip() {
        let (_, mut ledger) = onboarded("Cyndaquil").await;
        ledger.award_partner(100).await.unwrap();
        let before = ledger.profile().clone();
        let catalog_len = ledger.catalog().len();

        let added = ledger
            .unlock_catalog(&mut ChaCha20Rng::seed_from_u64(4))
            .await
            .unwrap();
        assert_eq!(added, catalog_len - 1);
        let unlocked = ledger.profile();
        assert_eq!(unlocked.pokedex.len(), catalog_len);
        assert_eq!(unlocked.inventory.len(), catalog_len);
        let partner = unlocked.partner().expect("partner");
        assert_eq!(partner.current_name, "Cyndaquil");
        assert_eq!(partner.experience, 100);
        assert!(unlocked.has_backup());

        ledger
            .unlock_catalog(&mut ChaCha20Rng::seed_from_u64(5))
            .await
            .unwrap();
        ledger.restore_backup().await.unwrap();
        assert_eq!(ledger.profile().inventory, before.inventory);
        assert_eq!(ledger.profile().pokedex, before.pokedex);
        assert!(!ledger.profile().has_backup());
        assert!(matches!(
            ledger.restore_backup().await,
            Err(EngineError::NoBackup)
        ));
    }

    #[tokio::test]
    async fn restore_assigns_a_partner_to_a_partnerless_snapshot() {
        let store = MemoryProfileStore::new();
        let user = UserId::new("misty");
        let catalog = catalog::shared();
        let mut profile = Profile::new(user.clone());
        profile.profile_complete = true;
        for (raw_id, name) in [(1, "Staryu"), (2, "Poliwag")] {
            let species = catalog.by_name(name).expect("cataloged");
            profile.inventory.push(InventoryEntry::from_species(
                InstanceId(raw_id),
                species,
                0,
                false,
            ));
            profile.pokedex.register(species);
        }
        store.insert_profile(profile);

        let mut ledger = ProfileLedger::load(
            store.clone(),
            catalog,
            EngineConfig::default_config(),
            user.clone(),
        )
        .await
        .unwrap();
        assert_eq!(ledger.profile().inventory.partner_count(), 0);

        ledger
            .unlock_catalog(&mut ChaCha20Rng::seed_from_u64(8))
            .await
            .unwrap();
        assert_eq!(ledger.profile().inventory.partner_count(), 1);

        ledger.restore_backup().await.unwrap();
        let restored = ledger.profile();
        assert_eq!(restored.inventory.len(), 2);
        assert_eq!(restored.inventory.partner_count(), 1);
        assert_eq!(
            restored.partner().map(|p| p.instance_id),
            Some(InstanceId(1))
        );
        let stored = store.snapshot(&user).expect("stored");
        assert_eq!(stored.inventory.partner_count(), 1);
    }

    #[tokio::test]
    async fn tasks_persist_through_the_store() {
        let (store, mut ledger) = onboarded("Totodile").await;
        let id = ledger
            .add_task("Write report", ElementalType::Water, "")
            .await
            .unwrap();
        ledger.complete_task(id).await.unwrap();
        let stored = store.snapshot(ledger.user()).expect("stored");
        assert!(stored.tasks.get(id).expect("task").completed);
        let removed = ledger.remove_task(id).await.unwrap();
        assert_eq!(removed.name, "Write report");
        assert!(store.snapshot(ledger.user()).expect("stored").tasks.is_empty());
    }
}
