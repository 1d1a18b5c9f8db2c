use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur when working with editions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EditionError {
    #[error("unknown edition: {0}")]
    Unknown(String),
}

/// A dated version of the question set.
///
/// Each edition carries its own fixed session policy: how many questions a
/// session presents and the pass/fail thresholds. Because
/// `fail < total - pass + 1`, an outcome can become certain before every
/// question is shown; callers stop early once a threshold is hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Edition {
    A,
    B,
}

impl Edition {
    /// Number of questions a full session presents.
    #[must_use]
    pub fn session_length(self) -> usize {
        match self {
            Edition::A => 10,
            Edition::B => 20,
        }
    }

    /// Correct answers required to pass.
    #[must_use]
    pub fn pass_threshold(self) -> u32 {
        match self {
            Edition::A => 6,
            Edition::B => 12,
        }
    }

    /// Incorrect answers that end the session as failed.
    #[must_use]
    pub fn fail_threshold(self) -> u32 {
        match self {
            Edition::A => 5,
            Edition::B => 9,
        }
    }

    /// Stable string form used for storage columns.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Edition::A => "A",
            Edition::B => "B",
        }
    }
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Edition {
    type Err = EditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Edition::A),
            "B" => Ok(Edition::B),
            other => Err(EditionError::Unknown(other.to_string())),
        }
    }
}
