//! TaskDex Game Engine
//!
//! Platform-agnostic core of the TaskDex focus timer: the work/break session
//! timer, wild encounters, creature catching and partner progression.
//! Presentation and persistence backends live outside this crate; storage is
//! reached through the [`ProfileStore`] trait.

pub mod catalog;
pub mod catching;
pub mod config;
pub mod constants;
pub mod encounters;
pub mod error;
pub mod inventory;
pub mod ledger;
pub mod profile;
pub mod progression;
pub mod session;
pub mod species;
pub mod storage;
pub mod tasks;
pub mod timer;

// Re-export commonly used types
pub use catalog::{CatalogError, SpeciesCatalog};
pub use catching::{CatchOutcome, CatchPolicy, CaughtCreature, select_catches};
pub use config::{EngineConfig, EngineConfigError};
pub use encounters::{
    EncounterBatch, EncounterPolicy, encounter_count, experience_award, generate_encounters,
};
pub use error::{EngineError, EngineResult, SelectionError, SessionConfigError};
pub use inventory::{InstanceId, Inventory, InventoryEntry, Pokedex, PokedexEntry};
pub use ledger::ProfileLedger;
pub use profile::{Profile, ProfileBackup, TrainerGender, UserId};
pub use progression::{
    ExperienceGate, ProgressionEvent, ProgressionPolicy, award_experience, evolve,
    is_ready_to_evolve,
};
pub use session::{FocusSession, SessionStep, SessionSummary};
pub use species::{ElementalType, EvolutionThreshold, Species, SpeciesId};
pub use storage::{
    BackupChange, MemoryProfileStore, MemoryStoreError, ProfileListener, ProfileStore,
    ProfileUpdate, SubscriptionId,
};
pub use tasks::{Task, TaskId, TaskList};
pub use timer::{
    CompletionReason, PhaseKind, SessionConfig, SessionLimits, SessionTimer, TickOutcome,
    TickToken, TimerPhase, TimerState,
};
