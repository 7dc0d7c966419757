//! Mutation state and error normalisation.
//!
//! A mutation is a named asynchronous state-changing operation. Its observable
//! state is a pair of flags, [`MutationState`], which a runner updates on every
//! lifecycle transition. The runner itself lives in the runtime crate.

use serde::{Deserialize, Serialize};

/// Message used for failures that carried no usable error value.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error";

/// Observable flags of a mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationState {
    /// An invocation has started and not yet settled
    pub is_pending: bool,

    /// The last settled invocation failed
    pub is_error: bool,
}

impl MutationState {
    /// Flags when nothing has run yet.
    pub const IDLE: Self = Self {
        is_pending: false,
        is_error: false,
    };

    /// Flags at the start of an invocation.
    pub const PENDING: Self = Self {
        is_pending: true,
        is_error: false,
    };

    /// Flags after a successful settlement.
    pub const SUCCEEDED: Self = Self {
        is_pending: false,
        is_error: false,
    };

    /// Flags after a failed settlement.
    pub const FAILED: Self = Self {
        is_pending: false,
        is_error: true,
    };
}

/// A normalised mutation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum MutationError {
    /// The operation returned an error
    #[error("{0}")]
    Operation(String),

    /// The operation failed without an error value (for example, it panicked)
    #[error("Unknown error")]
    Unknown,
}

impl MutationError {
    /// Normalise an operation error.
    ///
    /// Errors whose message is empty carry no information and collapse into
    /// [`MutationError::Unknown`].
    pub fn from_error<E: std::fmt::Display>(error: &E) -> Self {
        let message = error.to_string();
        if message.is_empty() {
            Self::Unknown
        } else {
            Self::Operation(message)
        }
    }

    /// User-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Operation(message) => message,
            Self::Unknown => UNKNOWN_ERROR_MESSAGE,
        }
    }
}

/// How overlapping invocations of one runner share the observable flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlapPolicy {
    /// Every invocation writes the shared flags; whichever transitions last wins.
    Shared,

    /// Only the most recently started invocation may write the shared flags.
    /// Each invocation still tracks its own flags in its [`MutationTrace`].
    #[default]
    Isolated,
}

impl std::str::FromStr for OverlapPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "shared" => Ok(Self::Shared),
            "isolated" => Ok(Self::Isolated),
            other => Err(format!("unknown overlap policy '{other}' (expected shared or isolated)")),
        }
    }
}

/// Per-invocation record of every flag transition.
///
/// Two invocations with identical arguments produce two separate traces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationTrace {
    /// Sequence number of the invocation within its runner (1-based)
    pub invocation: u64,

    /// Flags observed by this invocation, oldest first
    pub transitions: Vec<MutationState>,
}

impl MutationTrace {
    /// Start a trace for an invocation.
    #[must_use]
    pub fn new(invocation: u64) -> Self {
        Self {
            invocation,
            transitions: Vec::with_capacity(2),
        }
    }

    /// Record a transition.
    pub fn record(&mut self, state: MutationState) {
        self.transitions.push(state);
    }

    /// Flags after the last recorded transition.
    #[must_use]
    pub fn current(&self) -> MutationState {
        self.transitions.last().copied().unwrap_or(MutationState::IDLE)
    }

    /// Whether the invocation has settled.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.transitions.len() > 1 && !self.current().is_pending
    }
}
