use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::AnswerGrade;

/// Per-user, per-edition record of which canonical questions have been
/// asked and which were last answered correctly.
///
/// The incorrect set is always derived as `asked - correct`, never stored:
/// an index in `asked` but not in `correct` was missed on its most recent
/// terminal attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    asked: BTreeSet<usize>,
    correct: BTreeSet<usize>,
}

/// Counts derived from a progress record, used by callers to decide
/// whether focused mode is worth offering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressStats {
    pub asked: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub total: usize,
}

impl ProgressRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rehydrate from persisted index sets.
    ///
    /// Correct indices are folded into `asked` as well; storage rows that
    /// predate an index being asked cannot produce a correct-but-unasked
    /// state.
    #[must_use]
    pub fn from_persisted(
        asked: impl IntoIterator<Item = usize>,
        correct: impl IntoIterator<Item = usize>,
    ) -> Self {
        let mut record = Self {
            asked: asked.into_iter().collect(),
            correct: correct.into_iter().collect(),
        };
        for index in &record.correct {
            record.asked.insert(*index);
        }
        record
    }

    /// Applies one terminal grade for a canonical index.
    ///
    /// The index always joins `asked`. A correct grade marks it mastered;
    /// any other terminal grade revokes prior mastery of that index.
    pub fn record_outcome(&mut self, index: usize, grade: AnswerGrade) {
        self.asked.insert(index);
        if grade == AnswerGrade::Correct {
            self.correct.insert(index);
        } else {
            self.correct.remove(&index);
        }
    }

    /// Clears both sets. Explicit user action, not a fallback path.
    pub fn reset(&mut self) {
        self.asked.clear();
        self.correct.clear();
    }

    #[must_use]
    pub fn asked(&self) -> &BTreeSet<usize> {
        &self.asked
    }

    #[must_use]
    pub fn correct(&self) -> &BTreeSet<usize> {
        &self.correct
    }

    /// Indices whose most recent terminal attempt was not correct.
    #[must_use]
    pub fn incorrect(&self) -> BTreeSet<usize> {
        self.asked.difference(&self.correct).copied().collect()
    }

    /// True when any question has been asked.
    #[must_use]
    pub fn has_history(&self) -> bool {
        !self.asked.is_empty()
    }

    /// Summarizes the record against the canonical total for the edition.
    #[must_use]
    pub fn stats(&self, total: usize) -> ProgressStats {
        let asked = self.asked.len();
        let correct = self.correct.len();
        ProgressStats {
            asked,
            correct,
            incorrect: asked.saturating_sub(correct),
            total,
        }
    }
}
