//! Focus tasks a trainer can start sessions from.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{DEFAULT_BREAK_MINUTES, DEFAULT_REPETITIONS, DEFAULT_WORK_MINUTES};
use crate::error::{EngineError, EngineResult, SessionConfigError};
use crate::species::ElementalType;
use crate::timer::SessionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u32);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    #[serde(rename = "type")]
    pub elemental_type: ElementalType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub completed: bool,
}

impl Task {
    /// Session started from this task: standard 30/5 split themed with the
    /// task's type.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            work_minutes: DEFAULT_WORK_MINUTES,
            break_minutes: DEFAULT_BREAK_MINUTES,
            num_repetitions: DEFAULT_REPETITIONS,
            elemental_type: self.elemental_type,
            task_label: self.name.clone(),
            final_break: false,
        }
    }
}

/// Tasks in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskList(Vec<Task>);

impl TaskList {
    /// Append a new open task.
    ///
    /// # Errors
    ///
    /// [`EngineError::EmptyTaskName`] for a blank name and
    /// [`EngineError::InvalidConfig`] when the type cannot theme a session.
    pub fn add(
        &mut self,
        name: &str,
        elemental_type: ElementalType,
        description: &str,
    ) -> EngineResult<TaskId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::EmptyTaskName);
        }
        if !elemental_type.is_session_type() {
            return Err(SessionConfigError::UnsupportedType(elemental_type).into());
        }
        let id = self.next_id();
        self.0.push(Task {
            id,
            name: name.to_string(),
            elemental_type,
            description: description.trim().to_string(),
            completed: false,
        });
        Ok(id)
    }

    /// # Errors
    ///
    /// [`EngineError::UnknownTask`] when no task has this id.
    pub fn complete(&mut self, id: TaskId) -> EngineResult<()> {
        let task = self
            .0
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or(EngineError::UnknownTask(id))?;
        task.completed = true;
        Ok(())
    }

    /// # Errors
    ///
    /// [`EngineError::UnknownTask`] when no task has this id.
    pub fn remove(&mut self, id: TaskId) -> EngineResult<Task> {
        let idx = self
            .0
            .iter()
            .position(|task| task.id == id)
            .ok_or(EngineError::UnknownTask(id))?;
        Ok(self.0.remove(idx))
    }

    #[must_use]
    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.0.iter().find(|task| task.id == id)
    }

    pub fn open(&self) -> impl Iterator<Item = &Task> {
        self.0.iter().filter(|task| !task.completed)
    }

    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn next_id(&self) -> TaskId {
        TaskId(self.0.iter().map(|task| task.id.0).max().map_or(1, |max| max + 1))
    }
}
