use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur when decoding session fields.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionFieldError {
    #[error("unknown session status: {0}")]
    UnknownStatus(String),
    #[error("unknown study mode: {0}")]
    UnknownStudyMode(String),
    #[error("unknown quiz style: {0}")]
    UnknownStyle(String),
}

/// Lifecycle state of an attempt.
///
/// Transitions are monotonic forward; the only way back to `NotStarted`
/// is starting a new session, which discards the prior sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Passed,
    Failed,
}

impl SessionStatus {
    /// True for `Passed` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Passed | SessionStatus::Failed)
    }

    /// Stable string form used for storage columns.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::NotStarted => "not_started",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Passed => "passed",
            SessionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = SessionFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(SessionStatus::NotStarted),
            "in_progress" => Ok(SessionStatus::InProgress),
            "passed" => Ok(SessionStatus::Passed),
            "failed" => Ok(SessionStatus::Failed),
            other => Err(SessionFieldError::UnknownStatus(other.to_string())),
        }
    }
}

/// Which questions a new session draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyMode {
    /// Prioritizes previously-unseen questions, falling back to seen ones.
    Random,
    /// Restricted to previously-missed questions.
    Focused,
}

impl StudyMode {
    /// Stable string form used for storage columns.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StudyMode::Random => "random",
            StudyMode::Focused => "focused",
        }
    }
}

impl fmt::Display for StudyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StudyMode {
    type Err = SessionFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(StudyMode::Random),
            "focused" => Ok(StudyMode::Focused),
            other => Err(SessionFieldError::UnknownStudyMode(other.to_string())),
        }
    }
}

/// Presentation style handed to the grading oracle for feedback tone.
/// Orthogonal to grading itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizStyle {
    Formal,
    Comedy,
}

impl QuizStyle {
    /// Stable string form used for storage columns.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuizStyle::Formal => "formal",
            QuizStyle::Comedy => "comedy",
        }
    }
}

impl fmt::Display for QuizStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuizStyle {
    type Err = SessionFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "formal" => Ok(QuizStyle::Formal),
            "comedy" => Ok(QuizStyle::Comedy),
            other => Err(SessionFieldError::UnknownStyle(other.to_string())),
        }
    }
}
