// src/kitchen/state.rs

//! Lifecycle state machine for a single cook
//!
//! ```text
//! Init → Fetching → Verifying → Resolving → Building → Installing → Testing → Done
//!                                                                 └──────────→ Done (no test)
//! any non-terminal state ──→ Failed(phase, kind)
//! ```

use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::{AsRefStr, Display};

/// One step of the recipe lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    /// Dependency classification and host checks, before any network access
    Init,
    /// Retrieve the source payload and check its digest
    Fetching,
    /// Unpack the verified payload into a trusted source tree
    Verifying,
    /// Resolve build variables and render flags
    Resolving,
    /// Run the build tool
    Building,
    /// Place artifacts into the prefix
    Installing,
    /// Run the smoke test in a sandbox
    Testing,
    /// Everything succeeded
    Done,
}

impl Phase {
    /// Check whether moving from `self` to `next` is a legal transition
    ///
    /// `has_test` decides whether Installing must be followed by Testing.
    pub fn can_advance_to(&self, next: Phase, has_test: bool) -> bool {
        matches!(
            (self, next),
            (Phase::Init, Phase::Fetching)
                | (Phase::Fetching, Phase::Verifying)
                | (Phase::Verifying, Phase::Resolving)
                | (Phase::Resolving, Phase::Building)
                | (Phase::Building, Phase::Installing)
                | (Phase::Testing, Phase::Done)
        ) || match (self, next) {
            (Phase::Installing, Phase::Testing) => has_test,
            (Phase::Installing, Phase::Done) => !has_test,
            _ => false,
        }
    }
}

/// A position in the lifecycle, including the terminal failure state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CookState {
    /// Inside (or finished with, for `Done`) a phase
    At(Phase),
    /// Halted; carries the phase that failed and the error kind
    Failed { phase: Phase, kind: ErrorKind },
}

impl CookState {
    /// Check if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, CookState::At(Phase::Done) | CookState::Failed { .. })
    }
}

impl fmt::Display for CookState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CookState::At(phase) => write!(f, "{}", phase),
            CookState::Failed { phase, kind } => write!(f, "failed({} in {})", kind, phase),
        }
    }
}

/// Ordered record of every state a cook passed through
#[derive(Debug, Clone)]
pub struct Lifecycle {
    trail: Vec<CookState>,
    has_test: bool,
}

impl Lifecycle {
    /// Start a new lifecycle in `Init`
    pub fn new(has_test: bool) -> Self {
        Self {
            trail: vec![CookState::At(Phase::Init)],
            has_test,
        }
    }

    /// The current state
    pub fn current(&self) -> CookState {
        // The trail always holds at least `Init`
        self.trail.last().copied().unwrap_or(CookState::At(Phase::Init))
    }

    /// The phase currently executing, or the one that failed
    pub fn phase(&self) -> Phase {
        match self.current() {
            CookState::At(phase) => phase,
            CookState::Failed { phase, .. } => phase,
        }
    }

    /// Move to the next phase
    ///
    /// Returns false (and records nothing) for an illegal transition or when
    /// the lifecycle has already terminated.
    pub fn advance(&mut self, next: Phase) -> bool {
        let current = self.current();
        match current {
            CookState::At(phase) if phase.can_advance_to(next, self.has_test) => {
                self.trail.push(CookState::At(next));
                true
            }
            _ => false,
        }
    }

    /// Halt in the current phase with the given error kind
    pub fn fail(&mut self, kind: ErrorKind) {
        if self.current().is_terminal() {
            return;
        }
        let phase = self.phase();
        self.trail.push(CookState::Failed { phase, kind });
    }

    /// Every state visited, in order
    pub fn trail(&self) -> &[CookState] {
        &self.trail
    }

    /// Consume the lifecycle, returning the trail
    pub fn into_trail(self) -> Vec<CookState> {
        self.trail
    }
}
