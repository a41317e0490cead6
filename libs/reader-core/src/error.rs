//! Error types for reader-core.

use thiserror::Error;

/// Result type alias using CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Domain errors raised by catalog lookups and the practice state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("no content for level {level}")]
    ContentNotFound { level: u32 },

    #[error("item {content_id} not found in level {level}")]
    ItemNotFound { level: u32, content_id: String },

    #[error("no content available to build a deck")]
    NoContentAvailable,

    #[error("no active session")]
    NoActiveSession,

    #[error("a session is already active")]
    SessionAlreadyActive,

    #[error("session is blocked")]
    SessionBlocked,

    #[error("session is waiting for a care choice")]
    AwaitingCare,

    #[error("pet needs revival first")]
    PetDead,

    #[error("daily session limit of {limit} reached")]
    DailyLimitReached { limit: u32 },

    #[error("care action {action} is not one of the offered options")]
    InvalidCareChoice { action: String },

    #[error("unknown pet type: {0}")]
    UnknownPetType(String),

    #[error("speech synthesis unavailable: {0}")]
    TtsUnavailable(String),
}

/// Errors that can occur while parsing content files.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("missing text at line {line}")]
    MissingText { line: usize },

    #[error("unknown field '{field}' at line {line}")]
    UnknownField { line: usize, field: String },

    #[error("invalid sublevel '{value}' at line {line}")]
    InvalidSublevel { line: usize, value: String },

    #[error("duplicate ID {id} at line {line}")]
    DuplicateId { id: String, line: usize },
}
