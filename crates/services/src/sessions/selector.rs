use rand::rng;
use rand::seq::SliceRandom;

use quiz_core::model::{ProgressRecord, StudyMode};

use crate::error::SelectionError;

/// Hard cap on focused-mode sequences. A presentation limit, not a
/// correctness requirement.
pub const FOCUSED_SESSION_CAP: usize = 20;

/// Builds an ordered sequence of canonical indices for a new session.
///
/// The planner never duplicates an index within one sequence, and random
/// mode always front-loads questions the user has not seen yet.
pub struct SequencePlanner<'a> {
    progress: &'a ProgressRecord,
    bank_len: usize,
}

impl<'a> SequencePlanner<'a> {
    #[must_use]
    pub fn new(progress: &'a ProgressRecord, bank_len: usize) -> Self {
        Self { progress, bank_len }
    }

    /// Plan a sequence of at most `needed` indices for the given mode.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::Exhausted` in focused mode when the user
    /// has no previously-missed questions; the caller decides the
    /// fallback.
    pub fn plan(&self, mode: StudyMode, needed: usize) -> Result<Vec<usize>, SelectionError> {
        match mode {
            StudyMode::Random => Ok(self.plan_random(needed)),
            StudyMode::Focused => self.plan_focused(),
        }
    }

    fn plan_random(&self, needed: usize) -> Vec<usize> {
        let mut unasked: Vec<usize> = (0..self.bank_len)
            .filter(|i| !self.progress.asked().contains(i))
            .collect();

        let mut rng = rng();
        unasked.as_mut_slice().shuffle(&mut rng);

        if unasked.len() >= needed {
            unasked.truncate(needed);
            return unasked;
        }

        // Not enough unseen questions: append the seen ones, shuffled
        // separately, so unseen stay in front and nothing repeats.
        let mut asked: Vec<usize> = self
            .progress
            .asked()
            .iter()
            .copied()
            .filter(|i| *i < self.bank_len)
            .collect();
        asked.as_mut_slice().shuffle(&mut rng);

        let mut sequence = unasked;
        sequence.extend(asked);
        sequence.truncate(needed);
        sequence
    }

    fn plan_focused(&self) -> Result<Vec<usize>, SelectionError> {
        let mut incorrect: Vec<usize> = self
            .progress
            .incorrect()
            .into_iter()
            .filter(|i| *i < self.bank_len)
            .collect();

        if incorrect.is_empty() {
            return Err(SelectionError::Exhausted);
        }

        let mut rng = rng();
        incorrect.as_mut_slice().shuffle(&mut rng);
        incorrect.truncate(FOCUSED_SESSION_CAP);
        Ok(incorrect)
    }

    /// Unconditional shuffle of the full canonical list. Last-resort path
    /// for restoration when regeneration produced nothing.
    #[must_use]
    pub fn full_shuffle(&self) -> Vec<usize> {
        let mut all: Vec<usize> = (0..self.bank_len).collect();
        let mut rng = rng();
        all.as_mut_slice().shuffle(&mut rng);
        all
    }
}
