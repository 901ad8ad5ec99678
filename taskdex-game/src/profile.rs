use serde::{Deserialize, Serialize};
use std::fmt;

use crate::inventory::{Inventory, InventoryEntry, Pokedex};
use crate::tasks::TaskList;

/// Stable identity handed to the engine by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainerGender {
    Male,
    Female,
}

/// Snapshot taken before a dev-mode catalog unlock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileBackup {
    pub inventory: Inventory,
    pub pokedex: Pokedex,
}

/// Persistent trainer state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: UserId,
    #[serde(default)]
    pub trainer_gender: Option<TrainerGender>,
    #[serde(default)]
    pub profile_complete: bool,
    #[serde(default)]
    pub inventory: Inventory,
    #[serde(default)]
    pub pokedex: Pokedex,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<ProfileBackup>,
    #[serde(default)]
    pub tasks: TaskList,
}

impl Profile {
    /// Empty, not-yet-onboarded profile.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            trainer_gender: None,
            profile_complete: false,
            inventory: Inventory::default(),
            pokedex: Pokedex::default(),
            backup: None,
            tasks: TaskList::default(),
        }
    }

    #[must_use]
    pub fn partner(&self) -> Option<&InventoryEntry> {
        self.inventory.partner()
    }

    #[must_use]
    pub fn has_backup(&self) -> bool {
        self.backup.is_some()
    }

    /// Parse a profile document.
    ///
    /// # Errors
    ///
    /// Returns an error when the JSON does not describe a profile.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// # Errors
    ///
    /// Propagates serializer failures.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
