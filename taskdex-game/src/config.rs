//! Runtime policy for the engine.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::SpeciesCatalog;
use crate::catching::CatchPolicy;
use crate::constants::DEFAULT_STARTERS;
use crate::encounters::EncounterPolicy;
use crate::progression::ProgressionPolicy;
use crate::timer::SessionLimits;

#[derive(Debug, Error)]
pub enum EngineConfigError {
    #[error("engine config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{field} must be at least {min} (got {value})")]
    MinViolation {
        field: &'static str,
        min: u64,
        value: u64,
    },
    #[error("starter {0} is not in the species catalog")]
    UnknownStarter(String),
    #[error("excluded species {0} is not in the species catalog")]
    UnknownExclusion(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub encounters: EncounterPolicy,
    #[serde(default)]
    pub progression: ProgressionPolicy,
    #[serde(default)]
    pub catching: CatchPolicy,
    #[serde(default)]
    pub limits: SessionLimits,
    #[serde(default = "EngineConfig::default_starters")]
    pub starters: Vec<String>,
}

impl EngineConfig {
    fn default_starters() -> Vec<String> {
        DEFAULT_STARTERS.iter().map(|name| (*name).to_string()).collect()
    }

    #[must_use]
    pub fn default_config() -> Self {
        Self::default()
    }

    /// Parse and validate a config document; omitted sections take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`EngineConfigError`] when the JSON is malformed or a bound is
    /// violated.
    pub fn from_json(json: &str) -> Result<Self, EngineConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`EngineConfigError::MinViolation`] for the first out-of-range field.
    pub fn validate(&self) -> Result<(), EngineConfigError> {
        let checks: [(&'static str, u64, u64); 4] = [
            (
                "catching.new_catch_divisor",
                1,
                u64::from(self.catching.new_catch_divisor),
            ),
            (
                "catching.max_selections",
                1,
                self.catching.max_selections as u64,
            ),
            (
                "limits.min_work_minutes",
                1,
                u64::from(self.limits.min_work_minutes),
            ),
            (
                "limits.max_repetitions",
                1,
                u64::from(self.limits.max_repetitions),
            ),
        ];
        for (field, min, value) in checks {
            if value < min {
                return Err(EngineConfigError::MinViolation { field, min, value });
            }
        }
        if self.starters.is_empty() {
            return Err(EngineConfigError::MinViolation {
                field: "starters",
                min: 1,
                value: 0,
            });
        }
        Ok(())
    }

    /// Check that every species named by this config exists in `catalog`.
    ///
    /// # Errors
    ///
    /// Returns the first starter or exclusion missing from the catalog.
    pub fn validate_against(&self, catalog: &SpeciesCatalog) -> Result<(), EngineConfigError> {
        if let Some(missing) = self.starters.iter().find(|name| !catalog.contains(name)) {
            return Err(EngineConfigError::UnknownStarter(missing.clone()));
        }
        if let Some(missing) = self
            .encounters
            .excluded_species
            .iter()
            .find(|name| !catalog.contains(name))
        {
            return Err(EngineConfigError::UnknownExclusion(missing.clone()));
        }
        Ok(())
    }

    #[must_use]
    pub fn is_starter(&self, name: &str) -> bool {
        self.starters.iter().any(|starter| starter == name)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            encounters: EncounterPolicy::default(),
            progression: ProgressionPolicy::default(),
            catching: CatchPolicy::default(),
            limits: SessionLimits::default(),
            starters: Self::default_starters(),
        }
    }
}
