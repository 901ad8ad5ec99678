use thiserror::Error;

use crate::inventory::InstanceId;
use crate::profile::UserId;
use crate::species::{ElementalType, EvolutionThreshold};
use crate::tasks::TaskId;

/// Boxed collaborator error carried through [`EngineError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A session configuration that cannot drive a timer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionConfigError {
    #[error("{field} must be at least {min} (got {value})")]
    MinViolation {
        field: &'static str,
        min: u32,
        value: u32,
    },
    #[error("{field} must be at most {max} (got {value})")]
    MaxViolation {
        field: &'static str,
        max: u32,
        value: u32,
    },
    #[error("{0} is not a session type")]
    UnsupportedType(ElementalType),
}

/// Rejected catch selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("select at least one encounter")]
    Empty,
    #[error("at most {max} creatures may be caught at once (selected {selected})")]
    TooMany { selected: usize, max: usize },
    #[error("encounter {index} is out of range for a batch of {len}")]
    OutOfRange { index: usize, len: usize },
    #[error("encounter {0} was selected more than once")]
    Repeated(usize),
    #[error("encounter {0} has already been caught")]
    AlreadyCaught(usize),
    #[error("no encounter batch is awaiting resolution")]
    NoPendingBatch,
}

/// Every recoverable failure the engine reports. None of them are fatal and
/// the engine never retries on its own.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid session config: {0}")]
    InvalidConfig(#[from] SessionConfigError),
    #[error("{name} is not ready to evolve ({experience} XP, threshold {threshold})")]
    NotReadyToEvolve {
        name: String,
        experience: u32,
        threshold: EvolutionThreshold,
    },
    #[error("unknown species: {0}")]
    UnknownSpecies(String),
    #[error("no creature with instance id {0}")]
    UnknownInstance(InstanceId),
    #[error("no task with id {0}")]
    UnknownTask(TaskId),
    #[error("task name must not be empty")]
    EmptyTaskName,
    #[error("profile has no partner")]
    NoPartner,
    #[error("invalid catch selection: {0}")]
    InvalidSelection(#[from] SelectionError),
    #[error("{0} is not an allowed starter")]
    StarterNotAllowed(String),
    #[error("no dev-mode backup to restore")]
    NoBackup,
    #[error("no profile for user {0}")]
    ProfileMissing(UserId),
    #[error("user {0} already has a profile")]
    ProfileExists(UserId),
    #[error("session has already completed")]
    SessionFinished,
    #[error("failed to load profile")]
    LoadFailure(#[source] BoxError),
    #[error("failed to commit profile update")]
    CommitFailure(#[source] BoxError),
}

impl EngineError {
    /// True when the in-memory state is untouched and the same call may be
    /// repeated once the store recovers.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::CommitFailure(_) | Self::LoadFailure(_))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
