//! Catch ledger: merging caught creatures into the inventory and Pokédex.
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::catalog::SpeciesCatalog;
use crate::constants::{
    DUPLICATE_CATCH_BONUS, LOG_TARGET_LEDGER, MAX_CATCH_SELECTIONS, NEW_CATCH_EXPERIENCE_DIVISOR,
};
use crate::encounters::EncounterBatch;
use crate::error::{EngineError, EngineResult, SelectionError};
use crate::inventory::{InstanceId, Inventory, InventoryEntry, Pokedex};
use crate::progression::is_ready_to_evolve;
use crate::species::Species;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatchPolicy {
    /// Experience added to an owned non-partner row when its species is caught again.
    #[serde(default = "CatchPolicy::default_duplicate_bonus")]
    pub duplicate_bonus: u32,
    /// New rows start with `award / new_catch_divisor` experience.
    #[serde(default = "CatchPolicy::default_new_catch_divisor")]
    pub new_catch_divisor: u32,
    #[serde(default = "CatchPolicy::default_max_selections")]
    pub max_selections: usize,
}

impl CatchPolicy {
    const fn default_duplicate_bonus() -> u32 {
        DUPLICATE_CATCH_BONUS
    }

    const fn default_new_catch_divisor() -> u32 {
        NEW_CATCH_EXPERIENCE_DIVISOR
    }

    const fn default_max_selections() -> usize {
        MAX_CATCH_SELECTIONS
    }

    #[must_use]
    pub const fn new_catch_experience(&self, award: u32) -> u32 {
        if self.new_catch_divisor == 0 {
            0
        } else {
            award / self.new_catch_divisor
        }
    }
}

impl Default for CatchPolicy {
    fn default() -> Self {
        Self {
            duplicate_bonus: Self::default_duplicate_bonus(),
            new_catch_divisor: Self::default_new_catch_divisor(),
            max_selections: Self::default_max_selections(),
        }
    }
}

/// What happened to one caught name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaughtCreature {
    pub instance_id: InstanceId,
    pub name: String,
    /// `true` when merged into an existing row as a duplicate bonus.
    pub merged: bool,
    pub experience: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatchOutcome {
    pub has_new_species: bool,
    /// Partner readiness as it stood before this batch was applied.
    pub partner_ready_to_evolve: bool,
    pub caught: Vec<CaughtCreature>,
}

/// Resolve encounter indices chosen by the player into species.
///
/// # Errors
///
/// [`SelectionError`] when the selection is empty, too large, repeats an
/// index, points outside the batch, or re-selects an already caught encounter.
pub fn select_catches<'a>(
    batch: &'a EncounterBatch,
    indices: &[usize],
    already_caught: &BTreeSet<usize>,
    max_selections: usize,
) -> Result<Vec<&'a Species>, SelectionError> {
    if indices.is_empty() {
        return Err(SelectionError::Empty);
    }
    if indices.len() > max_selections {
        return Err(SelectionError::TooMany {
            selected: indices.len(),
            max: max_selections,
        });
    }
    let mut seen = BTreeSet::new();
    let mut picked = Vec::with_capacity(indices.len());
    for &index in indices {
        let species = batch.species.get(index).ok_or(SelectionError::OutOfRange {
            index,
            len: batch.len(),
        })?;
        if already_caught.contains(&index) {
            return Err(SelectionError::AlreadyCaught(index));
        }
        if !seen.insert(index) {
            return Err(SelectionError::Repeated(index));
        }
        picked.push(species);
    }
    Ok(picked)
}

/// Merge caught species into `inventory` and `pokedex`.
///
/// All names are resolved before anything is touched, so an unknown name
/// leaves both collections unchanged. Partner readiness is sampled before
/// the batch lands.
///
/// # Errors
///
/// [`EngineError::UnknownSpecies`] for any name missing from the catalog.
pub fn catch<R, S>(
    catalog: &SpeciesCatalog,
    policy: &CatchPolicy,
    inventory: &mut Inventory,
    pokedex: &mut Pokedex,
    names: &[S],
    award: u32,
    rng: &mut R,
) -> EngineResult<CatchOutcome>
where
    R: Rng + ?Sized,
    S: AsRef<str>,
{
    let resolved = names
        .iter()
        .map(|name| {
            catalog
                .by_name(name.as_ref())
                .ok_or_else(|| EngineError::UnknownSpecies(name.as_ref().to_string()))
        })
        .collect::<EngineResult<Vec<_>>>()?;

    let partner_ready_to_evolve = inventory
        .partner()
        .is_some_and(|partner| is_ready_to_evolve(catalog, partner));

    let mut outcome = CatchOutcome {
        has_new_species: false,
        partner_ready_to_evolve,
        caught: Vec::with_capacity(resolved.len()),
    };
    for species in resolved {
        if pokedex.register(species) {
            outcome.has_new_species = true;
        }
        if let Some(existing) = inventory.non_partner_named_mut(&species.name) {
            existing.experience = existing.experience.saturating_add(policy.duplicate_bonus);
            debug!(
                target: LOG_TARGET_LEDGER,
                "duplicate {} merged into {} (+{} XP)", species.name, existing.instance_id, policy.duplicate_bonus
            );
            outcome.caught.push(CaughtCreature {
                instance_id: existing.instance_id,
                name: species.name.clone(),
                merged: true,
                experience: existing.experience,
            });
            continue;
        }
        let mut instance_id = InstanceId::generate(rng);
        while inventory.contains_instance(instance_id) {
            instance_id = InstanceId::generate(rng);
        }
        let experience = policy.new_catch_experience(award);
        inventory.push(InventoryEntry::from_species(
            instance_id,
            species,
            experience,
            false,
        ));
        debug!(
            target: LOG_TARGET_LEDGER,
            "caught new {} as {instance_id} ({experience} XP)", species.name
        );
        outcome.caught.push(CaughtCreature {
            instance_id,
            name: species.name.clone(),
            merged: false,
            experience,
        });
    }
    Ok(outcome)
}
