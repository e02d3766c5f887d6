//! Error types for the joosopt peephole optimizer
//!
//! Almost every variant here is an internal invariant violation: a rule that
//! forgot a `drop_label`, a splice that ran off the end of a body, a driver
//! that never reached its fixpoint. None of them describe a problem with the
//! user's program. Malformed input is rejected once, at construction time,
//! with [`Error::MalformedBody`].

use crate::bytecode::LabelId;
use thiserror::Error;

/// Main error type for joosopt
#[derive(Error, Debug)]
pub enum Error {
    /// A jump or table lookup named a label the table does not know
    #[error("InternalError: unresolved label {0}")]
    UnknownLabel(LabelId),

    /// The label table disagrees with the instruction sequence
    #[error("InternalError: label {id} out of sync: {message}")]
    LabelDesync { id: LabelId, message: String },

    /// A rule dropped more references than the label had
    #[error("InternalError: reference count of label {0} would go negative")]
    LabelUnderflow(LabelId),

    /// A synthesized label reused an existing id
    #[error("InternalError: label {0} is already registered")]
    DuplicateLabel(LabelId),

    /// A splice asked for more instructions than remain in the body
    #[error("InternalError: window of {wanted} instructions runs past the end ({available} available)")]
    WindowOverrun { wanted: usize, available: usize },

    /// A position that was already spliced out was used again
    #[error("InternalError: position {0} no longer holds an instruction")]
    StalePosition(usize),

    /// The defensive rewrite cap tripped
    #[error("InternalError: no fixpoint after {limit} rewrites")]
    RewriteLimitExceeded { limit: usize },

    /// The front end handed over a body that is not well-formed
    #[error("MalformedBody: {0}")]
    MalformedBody(String),

    /// IO error
    #[error("IOError: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    /// JSON (de)serialization error
    #[error("JsonError: {source}")]
    JsonError {
        #[from]
        source: serde_json::Error,
    },
}

impl Error {
    /// Create a label desynchronization error
    pub fn desync(id: LabelId, message: impl Into<String>) -> Self {
        Error::LabelDesync {
            id,
            message: message.into(),
        }
    }

    /// Create a malformed body error
    pub fn malformed(message: impl Into<String>) -> Self {
        Error::MalformedBody(message.into())
    }

    /// Whether this error signals a bug in the optimizer itself
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Error::UnknownLabel(_)
                | Error::LabelDesync { .. }
                | Error::LabelUnderflow(_)
                | Error::DuplicateLabel(_)
                | Error::WindowOverrun { .. }
                | Error::StalePosition(_)
                | Error::RewriteLimitExceeded { .. }
        )
    }
}

/// Result type alias for joosopt
pub type Result<T> = std::result::Result<T, Error>;
