//! Load-time failures of a level script.
//!
//! Every variant carries the 1-based script line it was raised on so the
//! host can point the author at the offending instruction.

use thiserror::Error;

/// Result type alias for script loading.
pub type Result<T> = std::result::Result<T, ScriptError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    /// A known instruction was given fewer fields than it needs.
    #[error("line {line}: `{keyword}` expects at least {expected} fields, found {found}")]
    MissingField {
        line: usize,
        keyword: String,
        expected: usize,
        found: usize,
    },

    /// A numeric field could not be parsed.
    #[error("line {line}: malformed number `{text}`")]
    Number { line: usize, text: String },

    /// A packed pattern literal could not be parsed.
    #[error("line {line}: malformed pattern `{text}`")]
    Pattern { line: usize, text: String },

    /// A spawn-group member code does not start with an enemy letter.
    #[error("line {line}: malformed group member `{text}`")]
    MemberCode { line: usize, text: String },

    /// A trajectory `(` was never closed.
    #[error("line {line}: {open} trajectory block(s) left open")]
    UnbalancedNesting { line: usize, open: usize },

    /// A trajectory `)` without a matching `(`.
    #[error("line {line}: `)` without a matching `(`")]
    UnexpectedClose { line: usize },

    /// A `stage` token inside an open trajectory block.
    #[error("line {line}: `stage` is not allowed inside a trajectory block")]
    StageInsideNesting { line: usize },
}

impl ScriptError {
    /// The 1-based line the error was raised on.
    pub fn line(&self) -> usize {
        match self {
            ScriptError::MissingField { line, .. }
            | ScriptError::Number { line, .. }
            | ScriptError::Pattern { line, .. }
            | ScriptError::MemberCode { line, .. }
            | ScriptError::UnbalancedNesting { line, .. }
            | ScriptError::UnexpectedClose { line }
            | ScriptError::StageInsideNesting { line } => *line,
        }
    }
}
