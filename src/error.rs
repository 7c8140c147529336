//! Error types for markup writing.

use thiserror::Error;

use crate::writer::State;

/// Errors that can occur while writing markup.
///
/// Everything except [`Error::Io`] and [`Error::Utf8`] is a usage error: the
/// caller issued an operation the current writer state does not permit.
/// Usage errors are raised before the failing call emits anything.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{operation} is not allowed in state {state}, expected {expected}")]
    IllegalState {
        operation: &'static str,
        state: State,
        expected: &'static str,
    },

    #[error("end tag </{found}> does not match open element <{expected}>")]
    MismatchedEndTag { expected: String, found: String },

    #[error("end tag </{found}> without an open element")]
    NoOpenElement { found: String },

    #[error("single char {0:?} cannot be written to a class list")]
    SingleCharClass(char),

    #[error("not a valid comment literal: {0:?}")]
    InvalidComment(String),

    #[error("not a valid element or attribute name: {0:?}")]
    InvalidName(String),

    #[error("attribute {0:?} already written in the current tag")]
    DuplicateAttribute(String),

    #[error("quoted subtree closed in state {state} with {depth} open elements")]
    UnclosedQuotedSubtree { depth: usize, state: State },

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl Error {
    /// Whether this error reports a protocol violation by the caller rather
    /// than a failure of the output sink.
    pub fn is_usage(&self) -> bool {
        !matches!(self, Error::Io(_) | Error::Utf8(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
