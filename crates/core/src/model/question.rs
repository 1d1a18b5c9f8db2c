use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Edition;

/// A single canonical test question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    prompt: String,
    accepted_answer: String,
}

impl Question {
    #[must_use]
    pub fn new(prompt: impl Into<String>, accepted_answer: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            accepted_answer: accepted_answer.into(),
        }
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn accepted_answer(&self) -> &str {
        &self.accepted_answer
    }
}

/// The canonical, immutable, ordered question list for one edition.
///
/// Sessions and progress records refer to questions by index into this
/// list, never by value, so question-text edits cannot corrupt saved state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionBank {
    edition: Edition,
    questions: Vec<Question>,
}

impl QuestionBank {
    #[must_use]
    pub fn new(edition: Edition, questions: Vec<Question>) -> Self {
        Self { edition, questions }
    }

    /// Builds a bank from `(prompt, accepted_answer)` pairs.
    #[must_use]
    pub fn from_pairs<P, A>(edition: Edition, pairs: impl IntoIterator<Item = (P, A)>) -> Self
    where
        P: Into<String>,
        A: Into<String>,
    {
        let questions = pairs
            .into_iter()
            .map(|(prompt, answer)| Question::new(prompt, answer))
            .collect();
        Self::new(edition, questions)
    }

    #[must_use]
    pub fn edition(&self) -> Edition {
        self.edition
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Returns the question at the given canonical index, if in range.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    /// True when the canonical index refers to a real question.
    #[must_use]
    pub fn contains_index(&self, index: usize) -> bool {
        index < self.questions.len()
    }
}

/// Errors surfaced by catalog lookups.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("no question bank registered for edition {0}")]
    MissingBank(Edition),
}

/// All supported editions and their banks.
#[derive(Debug, Clone)]
pub struct QuestionCatalog {
    banks: Vec<QuestionBank>,
}

impl QuestionCatalog {
    #[must_use]
    pub fn new(banks: Vec<QuestionBank>) -> Self {
        Self { banks }
    }

    /// Looks up the bank for an edition.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::MissingBank` if the edition has no bank.
    pub fn bank(&self, edition: Edition) -> Result<&QuestionBank, CatalogError> {
        self.banks
            .iter()
            .find(|b| b.edition() == edition)
            .ok_or(CatalogError::MissingBank(edition))
    }
}
