//! Experience, evolution readiness and confirmed evolution.
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::catalog::SpeciesCatalog;
use crate::constants::LOG_TARGET_LEDGER;
use crate::error::{EngineError, EngineResult};
use crate::inventory::{InstanceId, InventoryEntry, Pokedex};
use crate::species::{EvolutionThreshold, Species};

/// When an experience award is allowed to land on a creature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceGate {
    /// Accumulate only while below the evolution threshold; final forms stay put.
    #[default]
    UntilThreshold,
    /// Always accumulate.
    Unbounded,
}

impl ExperienceGate {
    #[must_use]
    pub const fn admits(self, experience: u32, threshold: EvolutionThreshold) -> bool {
        match self {
            Self::Unbounded => true,
            Self::UntilThreshold => match threshold {
                EvolutionThreshold::Final => false,
                EvolutionThreshold::At(limit) => experience < limit,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgressionPolicy {
    #[serde(default)]
    pub experience_gate: ExperienceGate,
}

/// Progression facts surfaced to presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressionEvent {
    ExperienceAwarded {
        instance_id: InstanceId,
        name: String,
        amount: u32,
        total: u32,
    },
    ExperienceWithheld {
        instance_id: InstanceId,
        name: String,
        amount: u32,
    },
    ReadyToEvolve {
        instance_id: InstanceId,
        name: String,
        target: String,
    },
    Evolved {
        instance_id: InstanceId,
        from: String,
        to: String,
    },
}

fn species_of<'a>(catalog: &'a SpeciesCatalog, entry: &InventoryEntry) -> EngineResult<&'a Species> {
    catalog
        .by_id(entry.species_id)
        .ok_or_else(|| EngineError::UnknownSpecies(entry.current_name.clone()))
}

/// `threshold != -1 && experience >= threshold`, with a target to evolve into.
#[must_use]
pub fn is_ready_to_evolve(catalog: &SpeciesCatalog, entry: &InventoryEntry) -> bool {
    let Some(species) = catalog.by_id(entry.species_id) else {
        return false;
    };
    match species.evolution_threshold {
        EvolutionThreshold::Final => false,
        EvolutionThreshold::At(threshold) => {
            entry.experience >= threshold && species.evolution_target().is_some()
        }
    }
}

/// Apply an experience award to `entry` under `gate`.
///
/// Returns the events produced: either an award or a withheld notice, plus a
/// readiness notice when this award crossed the threshold.
///
/// # Errors
///
/// [`EngineError::UnknownSpecies`] when the entry's species is not cataloged.
pub fn award_experience(
    catalog: &SpeciesCatalog,
    entry: &mut InventoryEntry,
    amount: u32,
    gate: ExperienceGate,
) -> EngineResult<Vec<ProgressionEvent>> {
    let species = species_of(catalog, entry)?;
    let mut events = Vec::with_capacity(2);
    if amount == 0 || !gate.admits(entry.experience, species.evolution_threshold) {
        debug!(
            target: LOG_TARGET_LEDGER,
            "withheld {amount} XP from {} ({} XP)", entry.current_name, entry.experience
        );
        events.push(ProgressionEvent::ExperienceWithheld {
            instance_id: entry.instance_id,
            name: entry.current_name.clone(),
            amount,
        });
        return Ok(events);
    }

    let was_ready = is_ready_to_evolve(catalog, entry);
    entry.experience = entry.experience.saturating_add(amount);
    debug!(
        target: LOG_TARGET_LEDGER,
        "{} gained {amount} XP (now {})", entry.current_name, entry.experience
    );
    events.push(ProgressionEvent::ExperienceAwarded {
        instance_id: entry.instance_id,
        name: entry.current_name.clone(),
        amount,
        total: entry.experience,
    });
    if !was_ready
        && is_ready_to_evolve(catalog, entry)
        && let Some(target) = species.evolution_target()
    {
        events.push(ProgressionEvent::ReadyToEvolve {
            instance_id: entry.instance_id,
            name: entry.current_name.clone(),
            target: target.to_string(),
        });
    }
    Ok(events)
}

/// Confirmed evolution: take the first listed branch, reset experience and
/// register the new species.
///
/// # Errors
///
/// [`EngineError::NotReadyToEvolve`] when below threshold or a final form;
/// [`EngineError::UnknownSpecies`] when the current species or its target is
/// missing from the catalog.
pub fn evolve(
    catalog: &SpeciesCatalog,
    entry: &mut InventoryEntry,
    pokedex: &mut Pokedex,
) -> EngineResult<ProgressionEvent> {
    let species = species_of(catalog, entry)?;
    if !is_ready_to_evolve(catalog, entry) {
        return Err(EngineError::NotReadyToEvolve {
            name: entry.current_name.clone(),
            experience: entry.experience,
            threshold: species.evolution_threshold,
        });
    }
    let target_name = species
        .evolution_target()
        .ok_or_else(|| EngineError::UnknownSpecies(entry.current_name.clone()))?;
    let target = catalog
        .by_name(target_name)
        .ok_or_else(|| EngineError::UnknownSpecies(target_name.to_string()))?;

    let from = entry.current_name.clone();
    entry.become_species(target);
    entry.experience = 0;
    pokedex.register(target);
    info!(
        target: LOG_TARGET_LEDGER,
        "{from} evolved into {} ({})", target.name, entry.instance_id
    );
    Ok(ProgressionEvent::Evolved {
        instance_id: entry.instance_id,
        from,
        to: target.name.clone(),
    })
}
