//! # Actor Lifecycle Machine
//!
//! Every actor moves through the same one-directional lifecycle:
//! `idle → loading → running → shuttingDown`. The machine is an explicit edge
//! table; any requested transition not in the table fails with
//! `InvalidTransition` and leaves the observable state unchanged. Operations
//! that are only meaningful while `running` (event dispatch, renders) guard
//! themselves with [`Lifecycle::ensure_running`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::ViewerError;

/// Lifecycle states, in order. `ShuttingDown` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleState {
    Idle,
    Loading,
    Running,
    ShuttingDown,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Running => "running",
            Self::ShuttingDown => "shuttingDown",
        };
        write!(f, "{}", name)
    }
}

/// Commands that request a lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleCommand {
    Load,
    Run,
    Shutdown,
}

impl fmt::Display for LifecycleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Load => "load",
            Self::Run => "run",
            Self::Shutdown => "shutdown",
        };
        write!(f, "{}", name)
    }
}

/// The declared transition edges. Everything else is rejected.
const TRANSITIONS: &[(LifecycleState, LifecycleCommand, LifecycleState)] = &[
    (LifecycleState::Idle, LifecycleCommand::Load, LifecycleState::Loading),
    (LifecycleState::Loading, LifecycleCommand::Run, LifecycleState::Running),
    (
        LifecycleState::Running,
        LifecycleCommand::Shutdown,
        LifecycleState::ShuttingDown,
    ),
];

/// A single actor's position in the lifecycle.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: LifecycleState,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Idle,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    fn next(state: LifecycleState, command: LifecycleCommand) -> Option<LifecycleState> {
        TRANSITIONS
            .iter()
            .find(|(from, cmd, _)| *from == state && *cmd == command)
            .map(|(_, _, to)| *to)
    }

    /// Apply a transition command, returning the new state.
    ///
    /// On an undeclared edge the state is left untouched and
    /// `InvalidTransition` is returned.
    pub fn apply(&mut self, command: LifecycleCommand) -> Result<LifecycleState, ViewerError> {
        match Self::next(self.state, command) {
            Some(next) => {
                self.state = next;
                Ok(next)
            }
            None => Err(ViewerError::InvalidTransition {
                state: self.state,
                command,
            }),
        }
    }

    /// Guard for internal transitions that are only valid while `running`.
    pub fn ensure_running(&self) -> Result<(), ViewerError> {
        if self.state == LifecycleState::Running {
            Ok(())
        } else {
            Err(ViewerError::ActorNotReady { state: self.state })
        }
    }

    /// Roll a cascaded transition back to the state observed before it.
    ///
    /// Only used by parents undoing a partial fan-out after a sibling failed;
    /// children are small in-memory objects so reverting is safe.
    pub(crate) fn revert_to(&mut self, prior: LifecycleState) {
        self.state = prior;
    }
}
