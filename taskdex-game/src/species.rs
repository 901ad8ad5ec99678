//! Species definitions shared by the catalog, encounters and progression.
use serde::{Deserialize, Deserializer, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

/// Numeric species identifier (national dex number).
pub type SpeciesId = u32;

/// Elemental typing. The first six variants are the session types a focus
/// session can be themed with; the rest only appear as flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementalType {
    Fire,
    Water,
    Grass,
    Electric,
    Ghost,
    Psychic,
    Normal,
    Rock,
    Ground,
    Poison,
    Ice,
    Fighting,
    Dragon,
    Bug,
    Flying,
}

impl ElementalType {
    /// Types a focus session can be started with.
    pub const SESSION_TYPES: [Self; 6] = [
        Self::Fire,
        Self::Water,
        Self::Grass,
        Self::Electric,
        Self::Ghost,
        Self::Psychic,
    ];

    #[must_use]
    pub const fn is_session_type(self) -> bool {
        matches!(
            self,
            Self::Fire | Self::Water | Self::Grass | Self::Electric | Self::Ghost | Self::Psychic
        )
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Fire => "Fire",
            Self::Water => "Water",
            Self::Grass => "Grass",
            Self::Electric => "Electric",
            Self::Ghost => "Ghost",
            Self::Psychic => "Psychic",
            Self::Normal => "Normal",
            Self::Rock => "Rock",
            Self::Ground => "Ground",
            Self::Poison => "Poison",
            Self::Ice => "Ice",
            Self::Fighting => "Fighting",
            Self::Dragon => "Dragon",
            Self::Bug => "Bug",
            Self::Flying => "Flying",
        }
    }
}

impl fmt::Display for ElementalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when parsing an unknown type label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown elemental type: {0}")]
pub struct ParseElementalTypeError(pub String);

impl FromStr for ElementalType {
    type Err = ParseElementalTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const ALL: [ElementalType; 15] = [
            ElementalType::Fire,
            ElementalType::Water,
            ElementalType::Grass,
            ElementalType::Electric,
            ElementalType::Ghost,
            ElementalType::Psychic,
            ElementalType::Normal,
            ElementalType::Rock,
            ElementalType::Ground,
            ElementalType::Poison,
            ElementalType::Ice,
            ElementalType::Fighting,
            ElementalType::Dragon,
            ElementalType::Bug,
            ElementalType::Flying,
        ];
        let trimmed = s.trim();
        ALL.into_iter()
            .find(|kind| kind.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseElementalTypeError(trimmed.to_string()))
    }
}

/// Experience needed before a species may evolve.
///
/// Serialized as an integer where `-1` marks a final form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum EvolutionThreshold {
    /// Final form; never evolves regardless of experience.
    Final,
    /// Evolution unlocks once experience reaches this value.
    At(u32),
}

impl EvolutionThreshold {
    #[must_use]
    pub const fn experience(self) -> Option<u32> {
        match self {
            Self::Final => None,
            Self::At(value) => Some(value),
        }
    }

    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Final)
    }
}

impl TryFrom<i64> for EvolutionThreshold {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value == -1 {
            return Ok(Self::Final);
        }
        match u32::try_from(value) {
            Ok(threshold) if threshold > 0 => Ok(Self::At(threshold)),
            _ => Err(format!(
                "evolution threshold must be positive or -1 (got {value})"
            )),
        }
    }
}

impl fmt::Display for EvolutionThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", i64::from(*self))
    }
}

impl From<EvolutionThreshold> for i64 {
    fn from(value: EvolutionThreshold) -> Self {
        match value {
            EvolutionThreshold::Final => -1,
            EvolutionThreshold::At(threshold) => Self::from(threshold),
        }
    }
}

/// Ordered evolution targets; the first entry is the default branch.
pub type EvolutionTargets = SmallVec<[String; 2]>;

/// A catalog entry. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Species {
    pub id: SpeciesId,
    pub name: String,
    #[serde(rename = "type")]
    pub elemental_type: ElementalType,
    pub evolution_stage: u8,
    #[serde(default, deserialize_with = "one_or_many")]
    pub next_evolution: EvolutionTargets,
    pub evolution_threshold: EvolutionThreshold,
    pub chain_length: u8,
}

impl Species {
    /// Branch chosen when this species evolves. Branching evolutions resolve
    /// to the first listed target.
    #[must_use]
    pub fn evolution_target(&self) -> Option<&str> {
        if self.evolution_threshold.is_final() {
            return None;
        }
        self.next_evolution.first().map(String::as_str)
    }

    #[must_use]
    pub const fn is_final_form(&self) -> bool {
        self.evolution_threshold.is_final()
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<EvolutionTargets, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(name) => smallvec::smallvec![name],
        OneOrMany::Many(names) => names.into_iter().collect(),
    })
}
