//! Centralized balance and tuning constants for TaskDex engine logic.
//!
//! These values define the reward math for focus sessions. Runtime policy
//! that players or operators may reasonably change lives in
//! [`crate::config::EngineConfig`]; the numbers here only change through code
//! review.

// Logging targets ----------------------------------------------------------
pub(crate) const LOG_TARGET_TIMER: &str = "taskdex::timer";
pub(crate) const LOG_TARGET_ENCOUNTER: &str = "taskdex::encounter";
pub(crate) const LOG_TARGET_LEDGER: &str = "taskdex::ledger";
pub(crate) const LOG_TARGET_SESSION: &str = "taskdex::session";

// Clock --------------------------------------------------------------------
pub const SECONDS_PER_MINUTE: u32 = 60;
pub const TICK_PERIOD_MILLIS: u64 = 1_000;

// Encounter tuning ---------------------------------------------------------
/// One wild encounter per this many focused minutes.
pub const MINUTES_PER_ENCOUNTER: u32 = 10;
/// Experience is awarded in blocks of [`EXPERIENCE_PER_BLOCK`] per this many minutes.
pub const MINUTES_PER_EXPERIENCE_BLOCK: u32 = 30;
pub const EXPERIENCE_PER_BLOCK: u32 = 100;

// Catch tuning -------------------------------------------------------------
pub const DUPLICATE_CATCH_BONUS: u32 = 150;
pub const NEW_CATCH_EXPERIENCE_DIVISOR: u32 = 3;
pub const MAX_CATCH_SELECTIONS: usize = 2;

// Session defaults ---------------------------------------------------------
pub const DEFAULT_WORK_MINUTES: u32 = 30;
pub const DEFAULT_BREAK_MINUTES: u32 = 5;
pub const DEFAULT_REPETITIONS: u32 = 4;
pub const MIN_WORK_MINUTES: u32 = 1;
pub const MAX_REPETITIONS: u32 = 12;

// Catalog policy -----------------------------------------------------------
pub(crate) const DEFAULT_WILD_EXCLUSIONS: &[&str] = &["Eevee"];
pub(crate) const DEFAULT_STARTERS: &[&str] = &[
    "Bulbasaur",
    "Charmander",
    "Squirtle",
    "Chikorita",
    "Cyndaquil",
    "Totodile",
    "Pikachu",
    "Eevee",
];
