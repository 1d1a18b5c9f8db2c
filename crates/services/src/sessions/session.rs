use chrono::{DateTime, Utc};
use std::fmt;

use quiz_core::model::{
    Edition, Question, QuestionResult, QuizStyle, SessionStatus, StudyMode,
};
use storage::repository::SessionSnapshot;

use crate::error::SessionError;
use crate::grading::GradedAnswer;

//
// ─── GRADE APPLICATION ─────────────────────────────────────────────────────────
//

/// What applying one oracle verdict did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GradeApplication {
    /// First `partial` for this position: the question stays pending for
    /// exactly one more submission. No counts moved.
    NeedsRetry { feedback: String },
    /// A terminal grade was recorded and the cursor advanced.
    Terminal {
        result: QuestionResult,
        status: SessionStatus,
    },
}

//
// ─── QUIZ SESSION ──────────────────────────────────────────────────────────────
//

/// In-memory state of one attempt.
///
/// Holds the materialized sequence of canonical indices, the cursor, the
/// running counts, and the per-position retry micro-state. Status moves
/// monotonically forward; a finished session rejects further grades.
pub struct QuizSession {
    edition: Edition,
    study_mode: StudyMode,
    style: QuizStyle,
    sequence: Vec<usize>,
    cursor: usize,
    correct_count: u32,
    incorrect_count: u32,
    results: Vec<QuestionResult>,
    status: SessionStatus,
    awaiting_retry: bool,
}

impl QuizSession {
    /// Create a new in-progress session over a planned sequence.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if the sequence has no questions.
    pub fn new(
        edition: Edition,
        study_mode: StudyMode,
        style: QuizStyle,
        sequence: Vec<usize>,
    ) -> Result<Self, SessionError> {
        if sequence.is_empty() {
            return Err(SessionError::Empty);
        }

        Ok(Self {
            edition,
            study_mode,
            style,
            sequence,
            cursor: 0,
            correct_count: 0,
            incorrect_count: 0,
            results: Vec::new(),
            status: SessionStatus::InProgress,
            awaiting_retry: false,
        })
    }

    #[must_use]
    pub fn edition(&self) -> Edition {
        self.edition
    }

    #[must_use]
    pub fn study_mode(&self) -> StudyMode {
        self.study_mode
    }

    #[must_use]
    pub fn style(&self) -> QuizStyle {
        self.style
    }

    #[must_use]
    pub fn sequence(&self) -> &[usize] {
        &self.sequence
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn incorrect_count(&self) -> u32 {
        self.incorrect_count
    }

    #[must_use]
    pub fn results(&self) -> &[QuestionResult] {
        &self.results
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// True when the current position already consumed its one retry.
    #[must_use]
    pub fn awaiting_retry(&self) -> bool {
        self.awaiting_retry
    }

    /// Canonical index of the question currently awaiting an answer.
    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        if self.status != SessionStatus::InProgress {
            return None;
        }
        self.sequence.get(self.cursor).copied()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply one oracle verdict to the current position.
    ///
    /// A first `partial` keeps the position pending with the retry flag
    /// set. On a retried position, a second `partial` is clamped to
    /// `incorrect` — the protocol has no slot for a second ambiguous
    /// state — so every position contributes exactly one terminal count.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` if the session is already finished.
    pub fn apply_grade(
        &mut self,
        graded: GradedAnswer,
        question: &Question,
        user_answer: &str,
    ) -> Result<GradeApplication, SessionError> {
        if self.current_index().is_none() {
            return Err(SessionError::Completed);
        }

        let terminal_grade = match (graded.grade, self.awaiting_retry) {
            (grade, _) if grade.is_terminal() => grade,
            (_, false) => {
                self.awaiting_retry = true;
                return Ok(GradeApplication::NeedsRetry {
                    feedback: graded.feedback,
                });
            }
            (_, true) => quiz_core::model::AnswerGrade::Incorrect,
        };

        let result = QuestionResult {
            question_text: question.prompt().to_owned(),
            user_answer: user_answer.to_owned(),
            accepted_answer: question.accepted_answer().to_owned(),
            grade: terminal_grade,
            feedback: graded.feedback,
        };

        if terminal_grade == quiz_core::model::AnswerGrade::Correct {
            self.correct_count += 1;
        } else {
            self.incorrect_count += 1;
        }
        self.results.push(result.clone());
        self.cursor += 1;
        self.awaiting_retry = false;

        self.check_completion();

        Ok(GradeApplication::Terminal {
            result,
            status: self.status,
        })
    }

    /// Completion is checked in a fixed order: pass threshold first, then
    /// fail threshold, then sequence exhaustion. Hitting a threshold
    /// before the sequence runs out is intentional early stopping.
    fn check_completion(&mut self) {
        if self.correct_count >= self.edition.pass_threshold() {
            self.status = SessionStatus::Passed;
        } else if self.incorrect_count >= self.edition.fail_threshold() {
            self.status = SessionStatus::Failed;
        } else if self.cursor >= self.sequence.len() {
            self.status = SessionStatus::Failed;
        }
    }

    //
    // ─── SNAPSHOT CONVERSION ───────────────────────────────────────────────
    //

    /// Capture the session for durable storage.
    ///
    /// The retry flag is deliberately not persisted: a resumed session
    /// re-asks the current question with a fresh retry allowance.
    #[must_use]
    pub fn to_snapshot(&self, now: DateTime<Utc>) -> SessionSnapshot {
        SessionSnapshot {
            edition: self.edition,
            study_mode: self.study_mode,
            style: self.style,
            status: self.status,
            sequence: self.sequence.clone(),
            cursor: self.cursor,
            correct_count: self.correct_count,
            incorrect_count: self.incorrect_count,
            results: self.results.clone(),
            updated_at: now,
        }
    }

    /// Rehydrate a session from a snapshot whose indices have already been
    /// validated against the current question bank.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` for an empty sequence and
    /// `SessionError::Completed` for a snapshot that is not in progress;
    /// cursor/result invariants are checked as well.
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Result<Self, SessionError> {
        if snapshot.status != SessionStatus::InProgress {
            return Err(SessionError::Completed);
        }
        if snapshot.sequence.is_empty() {
            return Err(SessionError::Empty);
        }
        if snapshot.cursor > snapshot.sequence.len()
            || snapshot.results.len() > snapshot.sequence.len()
        {
            return Err(SessionError::InvalidIndex(snapshot.cursor));
        }

        Ok(Self {
            edition: snapshot.edition,
            study_mode: snapshot.study_mode,
            style: snapshot.style,
            sequence: snapshot.sequence.clone(),
            cursor: snapshot.cursor,
            correct_count: snapshot.correct_count,
            incorrect_count: snapshot.incorrect_count,
            results: snapshot.results.clone(),
            status: snapshot.status,
            awaiting_retry: false,
        })
    }
}

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSession")
            .field("edition", &self.edition)
            .field("study_mode", &self.study_mode)
            .field("sequence_len", &self.sequence.len())
            .field("cursor", &self.cursor)
            .field("correct_count", &self.correct_count)
            .field("incorrect_count", &self.incorrect_count)
            .field("status", &self.status)
            .field("awaiting_retry", &self.awaiting_retry)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::AnswerGrade;
    use quiz_core::time::fixed_now;

    fn build_session(edition: Edition, len: usize) -> QuizSession {
        QuizSession::new(
            edition,
            StudyMode::Random,
            QuizStyle::Formal,
            (0..len).collect(),
        )
        .unwrap()
    }

    fn verdict(grade: AnswerGrade) -> GradedAnswer {
        GradedAnswer {
            grade,
            feedback: String::from("fb"),
        }
    }

    fn answer(session: &mut QuizSession, grade: AnswerGrade) -> GradeApplication {
        let question = Question::new("Q", "A");
        session.apply_grade(verdict(grade), &question, "user").unwrap()
    }

    #[test]
    fn empty_sequence_is_rejected() {
        let err =
            QuizSession::new(Edition::A, StudyMode::Random, QuizStyle::Formal, Vec::new())
                .unwrap_err();
        assert!(matches!(err, SessionError::Empty));
    }

    #[test]
    fn passes_early_after_six_correct_of_seven() {
        let mut session = build_session(Edition::A, 10);
        answer(&mut session, AnswerGrade::Incorrect);
        for _ in 0..5 {
            answer(&mut session, AnswerGrade::Correct);
        }
        assert_eq!(session.status(), SessionStatus::InProgress);

        let applied = answer(&mut session, AnswerGrade::Correct);
        assert!(matches!(
            applied,
            GradeApplication::Terminal {
                status: SessionStatus::Passed,
                ..
            }
        ));
        // Questions 8-10 are never presented.
        assert_eq!(session.cursor(), 7);
        assert!(session.current_index().is_none());
    }

    #[test]
    fn fails_early_after_five_incorrect_of_eight() {
        let mut session = build_session(Edition::A, 10);
        for _ in 0..3 {
            answer(&mut session, AnswerGrade::Correct);
        }
        for _ in 0..4 {
            answer(&mut session, AnswerGrade::Incorrect);
        }
        assert_eq!(session.status(), SessionStatus::InProgress);

        let applied = answer(&mut session, AnswerGrade::Incorrect);
        assert!(matches!(
            applied,
            GradeApplication::Terminal {
                status: SessionStatus::Failed,
                ..
            }
        ));
        assert_eq!(session.cursor(), 8);
    }

    #[test]
    fn pass_check_wins_when_sequence_runs_out() {
        // A focused session can be shorter than the nominal length; a
        // finished sequence passes only when the pass threshold was met.
        let mut session = QuizSession::new(
            Edition::A,
            StudyMode::Focused,
            QuizStyle::Formal,
            vec![1, 3, 5],
        )
        .unwrap();
        answer(&mut session, AnswerGrade::Correct);
        answer(&mut session, AnswerGrade::Correct);
        let applied = answer(&mut session, AnswerGrade::Correct);
        assert!(matches!(
            applied,
            GradeApplication::Terminal {
                status: SessionStatus::Failed,
                ..
            }
        ));
    }

    #[test]
    fn partial_keeps_the_position_pending_once() {
        let mut session = build_session(Edition::A, 10);
        let before = session.current_index();

        let applied = answer(&mut session, AnswerGrade::Partial);
        assert!(matches!(applied, GradeApplication::NeedsRetry { .. }));
        assert_eq!(session.current_index(), before);
        assert!(session.awaiting_retry());
        assert_eq!(session.correct_count() + session.incorrect_count(), 0);
        assert!(session.results().is_empty());

        let applied = answer(&mut session, AnswerGrade::Correct);
        assert!(matches!(applied, GradeApplication::Terminal { .. }));
        assert_eq!(session.correct_count(), 1);
        assert_eq!(session.cursor(), 1);
        assert!(!session.awaiting_retry());
    }

    #[test]
    fn second_partial_is_clamped_to_incorrect() {
        let mut session = build_session(Edition::A, 10);
        answer(&mut session, AnswerGrade::Partial);

        let applied = answer(&mut session, AnswerGrade::Partial);
        let GradeApplication::Terminal { result, .. } = applied else {
            panic!("second partial must be terminal");
        };
        assert_eq!(result.grade, AnswerGrade::Incorrect);
        assert_eq!(session.incorrect_count(), 1);
        assert_eq!(session.results().len(), 1);
        assert!(!session.awaiting_retry());
    }

    #[test]
    fn finished_session_rejects_grades() {
        let mut session = build_session(Edition::A, 10);
        for _ in 0..6 {
            answer(&mut session, AnswerGrade::Correct);
        }
        assert_eq!(session.status(), SessionStatus::Passed);

        let question = Question::new("Q", "A");
        let err = session
            .apply_grade(verdict(AnswerGrade::Correct), &question, "user")
            .unwrap_err();
        assert!(matches!(err, SessionError::Completed));
    }

    #[test]
    fn each_position_counts_exactly_once() {
        let mut session = build_session(Edition::B, 20);
        // One retried position and one direct position.
        answer(&mut session, AnswerGrade::Partial);
        answer(&mut session, AnswerGrade::Incorrect);
        answer(&mut session, AnswerGrade::Correct);

        assert_eq!(session.correct_count(), 1);
        assert_eq!(session.incorrect_count(), 1);
        assert_eq!(session.results().len(), 2);
        assert_eq!(session.cursor(), 2);
    }

    #[test]
    fn snapshot_roundtrip_preserves_state() {
        let mut session = build_session(Edition::B, 20);
        answer(&mut session, AnswerGrade::Correct);
        answer(&mut session, AnswerGrade::Incorrect);

        let snapshot = session.to_snapshot(fixed_now());
        assert_eq!(snapshot.cursor, 2);
        assert_eq!(snapshot.updated_at, fixed_now());

        let restored = QuizSession::from_snapshot(&snapshot).unwrap();
        assert_eq!(restored.sequence(), session.sequence());
        assert_eq!(restored.cursor(), 2);
        assert_eq!(restored.correct_count(), 1);
        assert_eq!(restored.incorrect_count(), 1);
        assert_eq!(restored.results().len(), 2);
        assert!(!restored.awaiting_retry());
    }

    #[test]
    fn terminal_snapshot_does_not_resume() {
        let mut session = build_session(Edition::A, 10);
        for _ in 0..6 {
            answer(&mut session, AnswerGrade::Correct);
        }
        let snapshot = session.to_snapshot(fixed_now());
        let err = QuizSession::from_snapshot(&snapshot).unwrap_err();
        assert!(matches!(err, SessionError::Completed));
    }
}
