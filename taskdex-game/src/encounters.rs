//! Wild encounter generation for completed work phases.
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::catalog::SpeciesCatalog;
use crate::constants::{
    DEFAULT_WILD_EXCLUSIONS, EXPERIENCE_PER_BLOCK, LOG_TARGET_ENCOUNTER, MINUTES_PER_ENCOUNTER,
    MINUTES_PER_EXPERIENCE_BLOCK,
};
use crate::species::{ElementalType, Species};

/// Which catalog species may appear in the wild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterPolicy {
    /// Starter-exclusive species that never appear wild.
    #[serde(default = "EncounterPolicy::default_excluded_species")]
    pub excluded_species: BTreeSet<String>,
    /// Whether fully evolved species are part of the wild pool.
    #[serde(default = "EncounterPolicy::default_wild_final_forms")]
    pub wild_final_forms: bool,
}

impl EncounterPolicy {
    fn default_excluded_species() -> BTreeSet<String> {
        DEFAULT_WILD_EXCLUSIONS
            .iter()
            .map(|name| (*name).to_string())
            .collect()
    }

    const fn default_wild_final_forms() -> bool {
        true
    }

    #[must_use]
    pub fn allows(&self, species: &Species) -> bool {
        !self.excluded_species.contains(&species.name)
            && (self.wild_final_forms || !species.is_final_form())
    }
}

impl Default for EncounterPolicy {
    fn default() -> Self {
        Self {
            excluded_species: Self::default_excluded_species(),
            wild_final_forms: Self::default_wild_final_forms(),
        }
    }
}

/// Creatures met after one work phase plus the experience it earned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterBatch {
    pub species: Vec<Species>,
    pub experience_award: u32,
}

impl EncounterBatch {
    #[must_use]
    pub fn len(&self) -> usize {
        self.species.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.species.iter().map(|species| species.name.as_str())
    }
}

/// One encounter per full ten minutes of focus.
#[must_use]
pub const fn encounter_count(duration_minutes: u32) -> u32 {
    duration_minutes / MINUTES_PER_ENCOUNTER
}

/// `floor(duration / 30 * 100)` in double precision, so durations such as 69
/// minutes land on 229 rather than the exact-ratio 230.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn experience_award(duration_minutes: u32) -> u32 {
    let blocks = f64::from(duration_minutes) / f64::from(MINUTES_PER_EXPERIENCE_BLOCK);
    (blocks * f64::from(EXPERIENCE_PER_BLOCK)).floor() as u32
}

/// Draw the wild encounters for a finished work phase.
///
/// Species are sampled uniformly with replacement from the catalog entries of
/// `elemental_type` that `policy` allows. An empty pool yields an empty batch
/// but still carries the experience award.
pub fn generate_encounters<R>(
    catalog: &SpeciesCatalog,
    policy: &EncounterPolicy,
    duration_minutes: u32,
    elemental_type: ElementalType,
    rng: &mut R,
) -> EncounterBatch
where
    R: Rng + ?Sized,
{
    let count = encounter_count(duration_minutes);
    let experience = experience_award(duration_minutes);
    let pool: Vec<&Species> = catalog
        .of_type(elemental_type)
        .filter(|species| policy.allows(species))
        .collect();

    if pool.is_empty() {
        debug!(
            target: LOG_TARGET_ENCOUNTER,
            "no wild {elemental_type} species available; skipping {count} encounters"
        );
        return EncounterBatch {
            species: Vec::new(),
            experience_award: experience,
        };
    }

    let species: Vec<Species> = (0..count)
        .map(|_| pool[rng.gen_range(0..pool.len())].clone())
        .collect();
    debug!(
        target: LOG_TARGET_ENCOUNTER,
        "{duration_minutes} min {elemental_type} session met {} ({experience} XP)",
        species
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    EncounterBatch {
        species,
        experience_award: experience,
    }
}
