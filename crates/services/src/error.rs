//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::CatalogError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by sequence planning.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SelectionError {
    /// Focused mode was requested with no previously-missed questions.
    ///
    /// Recoverable; callers fall back to random mode rather than surface
    /// this to the end user.
    #[error("no previously-missed questions to focus on")]
    Exhausted,
}

/// Errors emitted by the grading oracle.
///
/// All variants are retryable from the session's point of view: the
/// current position keeps waiting for a terminal grade.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OracleError {
    #[error("grading oracle is not configured")]
    Disabled,
    #[error("grading oracle returned an empty response")]
    EmptyResponse,
    #[error("grading oracle request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("grading oracle returned an unparseable verdict: {0}")]
    MalformedVerdict(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by session services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("caller is not signed in")]
    Anonymous,
    #[error("no resumable session for this account")]
    NoActiveSession,
    #[error("session already completed")]
    Completed,
    #[error("no questions available for session")]
    Empty,
    #[error("sequence index {0} is outside the question bank")]
    InvalidIndex(usize),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping engine storage.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineSetupError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
