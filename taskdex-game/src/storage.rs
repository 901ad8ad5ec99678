//! Persistence collaborator.
//!
//! The engine only ever talks to storage through [`ProfileStore`]. Hosts plug
//! in their own backend; [`MemoryProfileStore`] serves tests and the
//! simulation harness.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use crate::inventory::{Inventory, Pokedex};
use crate::profile::{Profile, ProfileBackup, TrainerGender, UserId};
use crate::tasks::TaskList;

/// Change to the dev-mode snapshot carried by an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "backup", rename_all = "snake_case")]
pub enum BackupChange {
    Set(ProfileBackup),
    Clear,
}

/// Partial profile write. `None` fields are left untouched by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<Inventory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pokedex: Option<Pokedex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<BackupChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trainer_gender: Option<TrainerGender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_complete: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<TaskList>,
}

impl ProfileUpdate {
    #[must_use]
    pub fn with_inventory(mut self, inventory: &Inventory) -> Self {
        self.inventory = Some(inventory.clone());
        self
    }

    #[must_use]
    pub fn with_pokedex(mut self, pokedex: &Pokedex) -> Self {
        self.pokedex = Some(pokedex.clone());
        self
    }

    #[must_use]
    pub fn with_backup(mut self, change: BackupChange) -> Self {
        self.backup = Some(change);
        self
    }

    #[must_use]
    pub fn with_tasks(mut self, tasks: &TaskList) -> Self {
        self.tasks = Some(tasks.clone());
        self
    }

    /// Every persisted field of `profile`, used when onboarding.
    #[must_use]
    pub fn full(profile: &Profile) -> Self {
        Self {
            inventory: Some(profile.inventory.clone()),
            pokedex: Some(profile.pokedex.clone()),
            backup: Some(
                profile
                    .backup
                    .clone()
                    .map_or(BackupChange::Clear, BackupChange::Set),
            ),
            trainer_gender: profile.trainer_gender,
            profile_complete: Some(profile.profile_complete),
            tasks: Some(profile.tasks.clone()),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.inventory.is_none()
            && self.pokedex.is_none()
            && self.backup.is_none()
            && self.trainer_gender.is_none()
            && self.profile_complete.is_none()
            && self.tasks.is_none()
    }

    /// Merge this update into `profile` (last write wins per field).
    pub fn apply_to(&self, profile: &mut Profile) {
        if let Some(inventory) = &self.inventory {
            profile.inventory.clone_from(inventory);
        }
        if let Some(pokedex) = &self.pokedex {
            profile.pokedex.clone_from(pokedex);
        }
        match &self.backup {
            Some(BackupChange::Set(backup)) => profile.backup = Some(backup.clone()),
            Some(BackupChange::Clear) => profile.backup = None,
            None => {}
        }
        if let Some(gender) = self.trainer_gender {
            profile.trainer_gender = Some(gender);
        }
        if let Some(complete) = self.profile_complete {
            profile.profile_complete = complete;
        }
        if let Some(tasks) = &self.tasks {
            profile.tasks.clone_from(tasks);
        }
    }
}

/// Callback fired with the merged profile after each committed update.
pub type ProfileListener = Arc<dyn Fn(&Profile) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Asynchronous profile persistence.
///
/// Commits are single-writer per user and last-write-wins; the engine never
/// assumes a commit has landed until the returned future resolves `Ok`.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    async fn load_profile(&self, user: &UserId) -> Result<Option<Profile>, Self::Error>;

    /// Apply `update` to the stored profile, creating it when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the write was not persisted.
    async fn commit_profile(&self, user: &UserId, update: &ProfileUpdate)
    -> Result<(), Self::Error>;

    /// # Errors
    ///
    /// Returns an error if the backend cannot register the listener.
    async fn subscribe_profile(
        &self,
        user: &UserId,
        listener: ProfileListener,
    ) -> Result<SubscriptionId, Self::Error>;
}

#[derive(Debug, Error)]
pub enum MemoryStoreError {
    #[error("simulated commit failure")]
    InjectedFailure,
    #[error("store is offline")]
    Offline,
}

struct Subscriber {
    id: SubscriptionId,
    user: UserId,
    listener: ProfileListener,
}

/// In-memory [`ProfileStore`] with listener fan-out and failure injection.
///
/// Clones share state, so a test can keep a handle while a ledger owns another.
#[derive(Clone, Default)]
pub struct MemoryProfileStore {
    profiles: Arc<Mutex<HashMap<UserId, Profile>>>,
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
    next_subscription: Arc<AtomicU64>,
    failing_commits: Arc<AtomicUsize>,
    offline: Arc<AtomicBool>,
    commits: Arc<AtomicUsize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryProfileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a stored profile directly, bypassing listeners.
    pub fn insert_profile(&self, profile: Profile) {
        lock(&self.profiles).insert(profile.user_id.clone(), profile);
    }

    #[must_use]
    pub fn snapshot(&self, user: &UserId) -> Option<Profile> {
        lock(&self.profiles).get(user).cloned()
    }

    /// Fail the next `count` commits with [`MemoryStoreError::InjectedFailure`].
    pub fn fail_next_commits(&self, count: usize) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    /// While offline every call fails with [`MemoryStoreError::Offline`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of commits that landed.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = lock(&self.subscribers);
        let before = subscribers.len();
        subscribers.retain(|sub| sub.id != id);
        subscribers.len() != before
    }

    fn ensure_online(&self) -> Result<(), MemoryStoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(MemoryStoreError::Offline);
        }
        Ok(())
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok()
    }

    fn notify(&self, profile: &Profile) {
        let listeners: Vec<ProfileListener> = lock(&self.subscribers)
            .iter()
            .filter(|sub| sub.user == profile.user_id)
            .map(|sub| Arc::clone(&sub.listener))
            .collect();
        for listener in listeners {
            listener(profile);
        }
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    type Error = MemoryStoreError;

    async fn load_profile(&self, user: &UserId) -> Result<Option<Profile>, Self::Error> {
        self.ensure_online()?;
        Ok(self.snapshot(user))
    }

    async fn commit_profile(
        &self,
        user: &UserId,
        update: &ProfileUpdate,
    ) -> Result<(), Self::Error> {
        self.ensure_online()?;
        if self.take_injected_failure() {
            return Err(MemoryStoreError::InjectedFailure);
        }
        let merged = {
            let mut profiles = lock(&self.profiles);
            let profile = profiles
                .entry(user.clone())
                .or_insert_with(|| Profile::new(user.clone()));
            update.apply_to(profile);
            profile.clone()
        };
        self.commits.fetch_add(1, Ordering::SeqCst);
        self.notify(&merged);
        Ok(())
    }

    async fn subscribe_profile(
        &self,
        user: &UserId,
        listener: ProfileListener,
    ) -> Result<SubscriptionId, Self::Error> {
        self.ensure_online()?;
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst));
        lock(&self.subscribers).push(Subscriber {
            id,
            user: user.clone(),
            listener,
        });
        Ok(id)
    }
}
