//! Owned creatures and the Pokédex.
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::species::{ElementalType, Species, SpeciesId};

/// Identifier for one caught creature. Unique within a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub u64);

impl InstanceId {
    /// Draw a fresh id from the session RNG.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.r#gen::<u64>())
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// One row in a trainer's inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub instance_id: InstanceId,
    pub species_id: SpeciesId,
    /// Species at catch time; unchanged by evolution.
    pub original_name: String,
    pub current_name: String,
    #[serde(rename = "type")]
    pub elemental_type: ElementalType,
    pub evolution_stage: u8,
    #[serde(default)]
    pub experience: u32,
    #[serde(default)]
    pub is_partner: bool,
}

impl InventoryEntry {
    #[must_use]
    pub fn from_species(
        instance_id: InstanceId,
        species: &Species,
        experience: u32,
        is_partner: bool,
    ) -> Self {
        Self {
            instance_id,
            species_id: species.id,
            original_name: species.name.clone(),
            current_name: species.name.clone(),
            elemental_type: species.elemental_type,
            evolution_stage: species.evolution_stage,
            experience,
            is_partner,
        }
    }

    /// Rewrite this row as `target`, keeping its identity and original name.
    pub fn become_species(&mut self, target: &Species) {
        self.species_id = target.id;
        self.current_name.clone_from(&target.name);
        self.elemental_type = target.elemental_type;
        self.evolution_stage = target.evolution_stage;
    }
}

/// Ordered list of owned creatures. At most one row carries `is_partner`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inventory(Vec<InventoryEntry>);

impl Inventory {
    #[must_use]
    pub fn new(entries: Vec<InventoryEntry>) -> Self {
        Self(entries)
    }

    #[must_use]
    pub fn entries(&self) -> &[InventoryEntry] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, InventoryEntry> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, entry: InventoryEntry) {
        self.0.push(entry);
    }

    #[must_use]
    pub fn partner(&self) -> Option<&InventoryEntry> {
        self.0.iter().find(|entry| entry.is_partner)
    }

    pub fn partner_mut(&mut self) -> Option<&mut InventoryEntry> {
        self.0.iter_mut().find(|entry| entry.is_partner)
    }

    #[must_use]
    pub fn get(&self, id: InstanceId) -> Option<&InventoryEntry> {
        self.0.iter().find(|entry| entry.instance_id == id)
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut InventoryEntry> {
        self.0.iter_mut().find(|entry| entry.instance_id == id)
    }

    /// First non-partner row currently showing `name`.
    pub fn non_partner_named_mut(&mut self, name: &str) -> Option<&mut InventoryEntry> {
        self.0
            .iter_mut()
            .find(|entry| !entry.is_partner && entry.current_name == name)
    }

    #[must_use]
    pub fn contains_instance(&self, id: InstanceId) -> bool {
        self.get(id).is_some()
    }

    #[must_use]
    pub fn owns_species(&self, species_id: SpeciesId) -> bool {
        self.0.iter().any(|entry| entry.species_id == species_id)
    }

    /// Make `id` the sole partner. Returns `false` (and changes nothing) when
    /// no row has that id.
    pub fn set_partner(&mut self, id: InstanceId) -> bool {
        if !self.contains_instance(id) {
            return false;
        }
        for entry in &mut self.0 {
            entry.is_partner = entry.instance_id == id;
        }
        true
    }

    /// Restore the single-partner invariant after a bulk rewrite: extra
    /// partner flags are cleared, and a partnerless list promotes its first row.
    pub fn normalize_partner(&mut self) {
        let mut seen = false;
        for entry in &mut self.0 {
            if entry.is_partner {
                if seen {
                    entry.is_partner = false;
                }
                seen = true;
            }
        }
        if !seen && let Some(first) = self.0.first_mut() {
            first.is_partner = true;
        }
    }

    #[must_use]
    pub fn partner_count(&self) -> usize {
        self.0.iter().filter(|entry| entry.is_partner).count()
    }
}

/// A species the trainer has seen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PokedexEntry {
    pub species_id: SpeciesId,
    pub name: String,
}

/// Registered species in registration order. Membership only grows, except
/// when a dev-mode backup is restored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pokedex(Vec<PokedexEntry>);

impl Pokedex {
    #[must_use]
    pub fn new(entries: Vec<PokedexEntry>) -> Self {
        Self(entries)
    }

    #[must_use]
    pub fn entries(&self) -> &[PokedexEntry] {
        &self.0
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|entry| entry.name == name)
    }

    /// Register `species`; returns `true` when it was not seen before.
    pub fn register(&mut self, species: &Species) -> bool {
        if self.contains(&species.name) {
            return false;
        }
        self.0.push(PokedexEntry {
            species_id: species.id,
            name: species.name.clone(),
        });
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|entry| entry.name.as_str())
    }

    pub fn sort_by_species_id(&mut self) {
        self.0.sort_by_key(|entry| entry.species_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builtin;

    fn entry(id: u64, name: &str, partner: bool) -> InventoryEntry {
        let species = builtin().by_name(name).expect("species");
        InventoryEntry::from_species(InstanceId(id), species, 0, partner)
    }

    #[test]
    fn set_partner_moves_the_flag() {
        let mut inventory = Inventory::new(vec![
            entry(1, "Charmander", true),
            entry(2, "Squirtle", false),
        ]);
        assert!(inventory.set_partner(InstanceId(2)));
        assert_eq!(inventory.partner_count(), 1);
        assert_eq!(
            inventory.partner().map(|p| p.current_name.as_str()),
            Some("Squirtle")
        );
        assert!(!inventory.set_partner(InstanceId(99)));
        assert_eq!(inventory.partner().map(|p| p.instance_id), Some(InstanceId(2)));
    }

    #[test]
    fn normalize_partner_falls_back_to_first_row() {
        let mut inventory = Inventory::new(vec![
            entry(1, "Charmander", false),
            entry(2, "Squirtle", false),
        ]);
        inventory.normalize_partner();
        assert_eq!(inventory.partner().map(|p| p.instance_id), Some(InstanceId(1)));

        let mut doubled = Inventory::new(vec![
            entry(1, "Charmander", true),
            entry(2, "Squirtle", true),
        ]);
        doubled.normalize_partner();
        assert_eq!(doubled.partner_count(), 1);
        assert_eq!(doubled.partner().map(|p| p.instance_id), Some(InstanceId(1)));
    }

    #[test]
    fn duplicate_lookup_skips_the_partner() {
        let mut inventory = Inventory::new(vec![entry(1, "Charmander", true)]);
        assert!(inventory.non_partner_named_mut("Charmander").is_none());
        inventory.push(entry(2, "Charmander", false));
        assert_eq!(
            inventory
                .non_partner_named_mut("Charmander")
                .map(|row| row.instance_id),
            Some(InstanceId(2))
        );
    }

    #[test]
    fn pokedex_registration_is_idempotent() {
        let mut pokedex = Pokedex::default();
        let pikachu = builtin().by_name("Pikachu").expect("pikachu");
        assert!(pokedex.register(pikachu));
        assert!(!pokedex.register(pikachu));
        assert_eq!(pokedex.len(), 1);
        assert_eq!(pokedex.names().collect::<Vec<_>>(), vec!["Pikachu"]);
    }

    #[test]
    fn instance_ids_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&InstanceId(42)).unwrap();
        assert_eq!(json, "42");
        assert_eq!(InstanceId(255).to_string(), "00000000000000ff");
    }
}
