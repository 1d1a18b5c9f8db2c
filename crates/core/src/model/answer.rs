use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Errors that can occur when decoding grades.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GradeError {
    #[error("unknown answer grade: {0}")]
    Unknown(String),
}

//
// ─── ANSWER GRADE ─────────────────────────────────────────────────────────────
//

/// Verdict from the grading oracle for one submission.
///
/// `Correct` and `Incorrect` are terminal: they end evaluation of a
/// sequence position. `Partial` permits exactly one retry of the same
/// position before the engine forces a terminal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerGrade {
    Correct,
    Partial,
    Incorrect,
}

impl AnswerGrade {
    /// True for grades that end evaluation of a position.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, AnswerGrade::Partial)
    }

    /// Stable string form used for storage columns and the oracle wire format.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AnswerGrade::Correct => "correct",
            AnswerGrade::Partial => "partial",
            AnswerGrade::Incorrect => "incorrect",
        }
    }
}

impl fmt::Display for AnswerGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnswerGrade {
    type Err = GradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "correct" => Ok(AnswerGrade::Correct),
            "partial" => Ok(AnswerGrade::Partial),
            "incorrect" => Ok(AnswerGrade::Incorrect),
            other => Err(GradeError::Unknown(other.to_string())),
        }
    }
}

//
// ─── QUESTION RESULT ──────────────────────────────────────────────────────────
//

/// Record of one graded sequence position.
///
/// Only terminal grades land here; a retry-eligible partial is not a
/// result yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_text: String,
    pub user_answer: String,
    pub accepted_answer: String,
    pub grade: AnswerGrade,
    pub feedback: String,
}
