use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

use crate::species::{ElementalType, Species, SpeciesId};

const DEFAULT_SPECIES_DATA: &str = include_str!("../assets/species.json");

/// Problems detected while loading a species table.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("species catalog is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate species id {0}")]
    DuplicateId(SpeciesId),
    #[error("duplicate species name {0}")]
    DuplicateName(String),
    #[error("{species} evolves into unknown species {target}")]
    DanglingEvolution { species: String, target: String },
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    species: Vec<Species>,
}

/// Immutable species table indexed by id and by name.
#[derive(Debug, Clone, Default)]
pub struct SpeciesCatalog {
    species: Vec<Species>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<SpeciesId, usize>,
}

impl SpeciesCatalog {
    /// Parse and validate a catalog document shaped like `{"species": [...]}`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the JSON is malformed, ids or names repeat,
    /// or an evolution target is missing from the table.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::from_species(file.species)
    }

    /// Build a catalog from already-parsed entries.
    ///
    /// # Errors
    ///
    /// Same validation as [`SpeciesCatalog::from_json`].
    pub fn from_species(species: Vec<Species>) -> Result<Self, CatalogError> {
        let mut by_name = HashMap::with_capacity(species.len());
        let mut by_id = HashMap::with_capacity(species.len());
        for (idx, entry) in species.iter().enumerate() {
            if by_id.insert(entry.id, idx).is_some() {
                return Err(CatalogError::DuplicateId(entry.id));
            }
            if by_name.insert(entry.name.clone(), idx).is_some() {
                return Err(CatalogError::DuplicateName(entry.name.clone()));
            }
        }
        for entry in &species {
            if let Some(target) = entry
                .next_evolution
                .iter()
                .find(|target| !by_name.contains_key(target.as_str()))
            {
                return Err(CatalogError::DanglingEvolution {
                    species: entry.name.clone(),
                    target: target.clone(),
                });
            }
        }
        Ok(Self {
            species,
            by_name,
            by_id,
        })
    }

    /// Catalog bundled with the crate. Falls back to an empty table if the
    /// embedded asset fails validation.
    #[must_use]
    pub fn load_from_static() -> Self {
        Self::from_json(DEFAULT_SPECIES_DATA).unwrap_or_default()
    }

    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&Species> {
        self.by_name.get(name).map(|&idx| &self.species[idx])
    }

    #[must_use]
    pub fn by_id(&self, id: SpeciesId) -> Option<&Species> {
        self.by_id.get(&id).map(|&idx| &self.species[idx])
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Species of one elemental type, in catalog order.
    pub fn of_type(&self, elemental_type: ElementalType) -> impl Iterator<Item = &Species> {
        self.species
            .iter()
            .filter(move |species| species.elemental_type == elemental_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Species> {
        self.species.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.species.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }
}

fn builtin_cell() -> &'static Arc<SpeciesCatalog> {
    static CATALOG: OnceLock<Arc<SpeciesCatalog>> = OnceLock::new();
    CATALOG.get_or_init(|| Arc::new(SpeciesCatalog::load_from_static()))
}

/// Bundled catalog.
#[must_use]
pub fn builtin() -> &'static SpeciesCatalog {
    builtin_cell()
}

/// Bundled catalog as a shareable handle for sessions and ledgers.
#[must_use]
pub fn shared() -> Arc<SpeciesCatalog> {
    Arc::clone(builtin_cell())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::species::EvolutionThreshold;

    #[test]
    fn bundled_catalog_loads_and_indexes() {
        let catalog = builtin();
        assert!(!catalog.is_empty());

        let charmander = catalog.by_name("Charmander").expect("charmander");
        assert_eq!(charmander.id, 4);
        assert_eq!(charmander.elemental_type, ElementalType::Fire);
        assert_eq!(charmander.evolution_threshold, EvolutionThreshold::At(750));
        assert_eq!(charmander.evolution_target(), Some("Charmeleon"));
        assert_eq!(catalog.by_id(4).map(|s| s.name.as_str()), Some("Charmander"));

        let eevee = catalog.by_name("Eevee").expect("eevee");
        assert_eq!(eevee.elemental_type, ElementalType::Water);
    }

    #[test]
    fn bundled_catalog_covers_every_session_type() {
        let catalog = builtin();
        for kind in ElementalType::SESSION_TYPES {
            assert!(
                catalog.of_type(kind).next().is_some(),
                "no species for {kind}"
            );
        }
    }

    #[test]
    fn branching_evolution_lists_are_ordered() {
        let gloom = builtin().by_name("Gloom").expect("gloom");
        assert_eq!(
            gloom.next_evolution.as_slice(),
            ["Vileplume".to_string(), "Bellossom".to_string()]
        );
    }

    #[test]
    fn rejects_duplicate_names_and_dangling_targets() {
        let dup = r#"{"species": [
            {"id": 1, "name": "A", "type": "Fire", "evolution_stage": 1, "evolution_threshold": -1, "chain_length": 1},
            {"id": 2, "name": "A", "type": "Fire", "evolution_stage": 1, "evolution_threshold": -1, "chain_length": 1}
        ]}"#;
        assert!(matches!(
            SpeciesCatalog::from_json(dup),
            Err(CatalogError::DuplicateName(name)) if name == "A"
        ));

        let dangling = r#"{"species": [
            {"id": 1, "name": "A", "type": "Fire", "evolution_stage": 1,
             "next_evolution": ["B"], "evolution_threshold": 100, "chain_length": 2}
        ]}"#;
        assert!(matches!(
            SpeciesCatalog::from_json(dangling),
            Err(CatalogError::DanglingEvolution { target, .. }) if target == "B"
        ));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            SpeciesCatalog::from_json("{not json"),
            Err(CatalogError::Parse(_))
        ));
    }
}
