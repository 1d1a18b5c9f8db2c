use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use quiz_core::Clock;
use quiz_core::model::{
    AccountId, Edition, Identity, Question, QuestionCatalog, QuestionResult, QuizStyle,
    QuotaRecord, SessionStatus, StudyMode,
};
use storage::repository::Storage;

use crate::error::{EngineSetupError, SessionError};
use crate::grading::GradingOracle;
use super::restore::{RestoredSession, restore_session};
use super::selector::SequencePlanner;
use super::session::{GradeApplication, QuizSession};

/// Result of submitting one answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The daily allowance is spent. No grading happened and the session
    /// did not move.
    QuotaExceeded { resets_at: DateTime<Utc> },
    /// The answer was close; the same question is asked once more.
    NeedsRetry { feedback: String },
    /// A terminal grade was recorded and the session advanced.
    Answered {
        result: QuestionResult,
        status: SessionStatus,
    },
}

/// Daily allowance evaluated at one instant by the engine's clock.
///
/// Callers read `allowed` instead of re-deriving the gate with their own
/// notion of now, which could disagree with the clock the engine grades
/// against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaStatus {
    pub allowed: bool,
    pub record: QuotaRecord,
}

/// Orchestrates sessions for signed-in accounts.
///
/// Every operation takes an explicit [`Identity`]; anonymous callers are
/// rejected up front rather than falling through to some shared default
/// record. After a terminal grade the engine writes in a fixed order:
/// progress first, then the quota counter, then the snapshot. The first
/// two propagate failures; only the snapshot write is best-effort.
pub struct QuizEngine {
    clock: Clock,
    catalog: QuestionCatalog,
    storage: Storage,
    oracle: Arc<dyn GradingOracle>,
}

impl QuizEngine {
    #[must_use]
    pub fn new(catalog: QuestionCatalog, storage: Storage, oracle: Arc<dyn GradingOracle>) -> Self {
        Self {
            clock: Clock::default(),
            catalog,
            storage,
            oracle,
        }
    }

    /// Engine backed by a SQLite database at `url`.
    ///
    /// # Errors
    ///
    /// Returns `EngineSetupError` if the database cannot be opened or
    /// migrated.
    pub async fn sqlite(
        url: &str,
        catalog: QuestionCatalog,
        oracle: Arc<dyn GradingOracle>,
    ) -> Result<Self, EngineSetupError> {
        let storage = Storage::sqlite(url).await?;
        Ok(Self::new(catalog, storage, oracle))
    }

    /// Replace the wall clock, for deterministic tests.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn account(identity: Identity) -> Result<AccountId, SessionError> {
        identity.account_id().ok_or(SessionError::Anonymous)
    }

    /// Start a fresh session, replacing any stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Anonymous` for signed-out callers,
    /// `SessionError::Selection` when focused mode has nothing to review,
    /// and storage or catalog errors as they occur.
    pub async fn start_session(
        &self,
        identity: Identity,
        edition: Edition,
        study_mode: StudyMode,
        style: QuizStyle,
    ) -> Result<QuizSession, SessionError> {
        let account = Self::account(identity)?;
        let bank = self.catalog.bank(edition)?;
        let progress = self.storage.progress.progress(account, edition).await?;

        let planner = SequencePlanner::new(&progress, bank.len());
        let sequence = planner.plan(study_mode, edition.session_length())?;
        let session = QuizSession::new(edition, study_mode, style, sequence)?;

        tracing::info!(
            %account,
            %edition,
            %study_mode,
            questions = session.sequence().len(),
            "session started"
        );
        self.save_snapshot_best_effort(account, &session).await;
        Ok(session)
    }

    /// The question the session is currently waiting on.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` for a finished session and
    /// `SessionError::InvalidIndex` if the sequence points outside the
    /// current question list.
    pub fn current_question(&self, session: &QuizSession) -> Result<&Question, SessionError> {
        let index = session.current_index().ok_or(SessionError::Completed)?;
        let bank = self.catalog.bank(session.edition())?;
        bank.get(index).ok_or(SessionError::InvalidIndex(index))
    }

    /// Grade one answer for the current question.
    ///
    /// The quota gate runs before the oracle is consulted, so a blocked
    /// submission costs nothing. Grading failures surface before any
    /// state mutation; the caller simply retries the submission.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Anonymous` for signed-out callers,
    /// `SessionError::Completed` for finished sessions, and oracle,
    /// catalog, or storage errors as they occur.
    pub async fn submit_answer(
        &self,
        identity: Identity,
        session: &mut QuizSession,
        answer: &str,
    ) -> Result<SubmitOutcome, SessionError> {
        let account = Self::account(identity)?;
        let index = session.current_index().ok_or(SessionError::Completed)?;

        let now = self.clock.now();
        let quota = self.quota_for(account, now).await?;
        if !quota.can_answer(now) {
            let resets_at = quota.reset_at + Duration::hours(24);
            tracing::debug!(%account, %resets_at, "daily allowance exhausted");
            return Ok(SubmitOutcome::QuotaExceeded { resets_at });
        }

        let edition = session.edition();
        let bank = self.catalog.bank(edition)?;
        let question = bank.get(index).ok_or(SessionError::InvalidIndex(index))?;

        let graded = self.oracle.grade(question, answer, session.style()).await?;
        let applied = session.apply_grade(graded, question, answer)?;

        match applied {
            GradeApplication::NeedsRetry { feedback } => {
                Ok(SubmitOutcome::NeedsRetry { feedback })
            }
            GradeApplication::Terminal { result, status } => {
                // Durable writes in fixed order: progress, quota, snapshot.
                self.storage
                    .progress
                    .record_outcome(
                        account,
                        edition,
                        index,
                        result.grade == quiz_core::model::AnswerGrade::Correct,
                    )
                    .await?;
                self.storage.quotas.increment_answered(account).await?;

                if status.is_terminal() {
                    tracing::info!(%account, %edition, %status, "session finished");
                    self.clear_snapshot_best_effort(account).await;
                } else {
                    self.save_snapshot_best_effort(account, session).await;
                }

                Ok(SubmitOutcome::Answered { result, status })
            }
        }
    }

    /// Resume the stored session for this account, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoActiveSession` when nothing resumable is
    /// stored, plus catalog and storage errors as they occur.
    pub async fn resume_session(&self, identity: Identity) -> Result<RestoredSession, SessionError> {
        let account = Self::account(identity)?;

        let snapshot = self
            .storage
            .snapshots
            .load_snapshot(account)
            .await?
            .ok_or(SessionError::NoActiveSession)?;
        if snapshot.status != SessionStatus::InProgress {
            // Stale leftover from an interrupted cleanup.
            self.clear_snapshot_best_effort(account).await;
            return Err(SessionError::NoActiveSession);
        }

        let bank = self.catalog.bank(snapshot.edition)?;
        let progress = self
            .storage
            .progress
            .progress(account, snapshot.edition)
            .await?;

        let restored = restore_session(bank, &progress, &snapshot)?;
        if restored.notice.is_some() {
            // The stored copy no longer matches what the user will see.
            self.save_snapshot_best_effort(account, &restored.session).await;
        }
        Ok(restored)
    }

    /// Drop the stored session without finishing it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Anonymous` for signed-out callers or a
    /// storage error if the delete fails.
    pub async fn abandon_session(&self, identity: Identity) -> Result<(), SessionError> {
        let account = Self::account(identity)?;
        self.storage.snapshots.clear_snapshot(account).await?;
        Ok(())
    }

    /// Current allowance, evaluated against the engine clock, with the
    /// rolling window lazily rotated.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Anonymous` for signed-out callers or a
    /// storage error.
    pub async fn check_quota(&self, identity: Identity) -> Result<QuotaStatus, SessionError> {
        let account = Self::account(identity)?;
        let now = self.clock.now();
        let record = self.quota_for(account, now).await?;
        Ok(QuotaStatus {
            allowed: record.can_answer(now),
            record,
        })
    }

    /// Clear all mastery history for an edition. Explicit user action.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Anonymous` for signed-out callers or a
    /// storage error.
    pub async fn reset_progress(
        &self,
        identity: Identity,
        edition: Edition,
    ) -> Result<(), SessionError> {
        let account = Self::account(identity)?;
        self.storage.progress.reset_progress(account, edition).await?;
        tracing::info!(%account, %edition, "progress reset");
        Ok(())
    }

    /// Load the quota record, creating a free-tier one on first touch and
    /// rotating the window when 24h have passed.
    async fn quota_for(
        &self,
        account: AccountId,
        now: DateTime<Utc>,
    ) -> Result<QuotaRecord, SessionError> {
        let Some(mut record) = self.storage.quotas.quota(account).await? else {
            let record = QuotaRecord::free(now);
            self.storage.quotas.upsert_quota(account, &record).await?;
            return Ok(record);
        };

        if record.window_expired(now) {
            self.storage.quotas.reset_window(account, now).await?;
            record.reset_window(now);
        }
        Ok(record)
    }

    async fn save_snapshot_best_effort(&self, account: AccountId, session: &QuizSession) {
        let snapshot = session.to_snapshot(self.clock.now());
        if let Err(error) = self.storage.snapshots.save_snapshot(account, &snapshot).await {
            tracing::warn!(%account, %error, "failed to save session snapshot");
        }
    }

    async fn clear_snapshot_best_effort(&self, account: AccountId) {
        if let Err(error) = self.storage.snapshots.clear_snapshot(account).await {
            tracing::warn!(%account, %error, "failed to clear session snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quiz_core::model::{AnswerGrade, FREE_DAILY_LIMIT, QuestionBank};
    use quiz_core::time::fixed_clock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::OracleError;
    use crate::grading::GradedAnswer;

    struct FixedOracle {
        grade: AnswerGrade,
        calls: AtomicUsize,
    }

    impl FixedOracle {
        fn new(grade: AnswerGrade) -> Arc<Self> {
            Arc::new(Self {
                grade,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl GradingOracle for FixedOracle {
        async fn grade(
            &self,
            _question: &Question,
            _user_answer: &str,
            _style: QuizStyle,
        ) -> Result<GradedAnswer, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(GradedAnswer {
                grade: self.grade,
                feedback: String::from("fb"),
            })
        }
    }

    fn catalog(count: usize) -> QuestionCatalog {
        QuestionCatalog::new(vec![QuestionBank::from_pairs(
            Edition::A,
            (0..count).map(|i| (format!("Q{i}"), format!("A{i}"))),
        )])
    }

    fn engine(oracle: Arc<dyn GradingOracle>) -> QuizEngine {
        QuizEngine::new(catalog(50), Storage::in_memory(), oracle).with_clock(fixed_clock())
    }

    #[tokio::test]
    async fn anonymous_callers_are_rejected() {
        let engine = engine(FixedOracle::new(AnswerGrade::Correct));
        let err = engine
            .start_session(
                Identity::Anonymous,
                Edition::A,
                StudyMode::Random,
                QuizStyle::Formal,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Anonymous));
    }

    #[tokio::test]
    async fn starting_a_session_stores_a_resumable_snapshot() {
        let engine = engine(FixedOracle::new(AnswerGrade::Correct));
        let identity = Identity::Authenticated(AccountId::generate());

        let session = engine
            .start_session(identity, Edition::A, StudyMode::Random, QuizStyle::Formal)
            .await
            .unwrap();
        assert_eq!(session.sequence().len(), Edition::A.session_length());

        let restored = engine.resume_session(identity).await.unwrap();
        assert_eq!(restored.session.sequence(), session.sequence());
        assert!(restored.notice.is_none());
    }

    #[tokio::test]
    async fn quota_blocks_before_the_oracle_is_consulted() {
        // Correct answers: edition A needs 6 to pass, so 5 leave the
        // session in progress while spending the whole free allowance.
        let oracle = FixedOracle::new(AnswerGrade::Correct);
        let engine = engine(oracle.clone());
        let identity = Identity::Authenticated(AccountId::generate());

        let mut session = engine
            .start_session(identity, Edition::A, StudyMode::Random, QuizStyle::Formal)
            .await
            .unwrap();

        for _ in 0..FREE_DAILY_LIMIT {
            let outcome = engine
                .submit_answer(identity, &mut session, "right")
                .await
                .unwrap();
            assert!(matches!(outcome, SubmitOutcome::Answered { .. }));
        }
        assert_eq!(session.status(), SessionStatus::InProgress);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), FREE_DAILY_LIMIT as usize);

        // The gate reports the spent allowance through the engine clock.
        let status = engine.check_quota(identity).await.unwrap();
        assert!(!status.allowed);
        assert_eq!(status.record.answered_today, FREE_DAILY_LIMIT);

        // The sixth answer of the day is refused without grading.
        let outcome = engine
            .submit_answer(identity, &mut session, "right")
            .await
            .unwrap();
        assert!(matches!(outcome, SubmitOutcome::QuotaExceeded { .. }));
        assert_eq!(oracle.calls.load(Ordering::SeqCst), FREE_DAILY_LIMIT as usize);
    }

    #[tokio::test]
    async fn quota_window_rotates_after_a_day() {
        let oracle = FixedOracle::new(AnswerGrade::Correct);
        let identity = Identity::Authenticated(AccountId::generate());
        let storage = Storage::in_memory();
        let engine = QuizEngine::new(catalog(50), storage.clone(), oracle.clone())
            .with_clock(fixed_clock());

        let mut session = engine
            .start_session(identity, Edition::A, StudyMode::Random, QuizStyle::Formal)
            .await
            .unwrap();
        for _ in 0..FREE_DAILY_LIMIT {
            engine
                .submit_answer(identity, &mut session, "right")
                .await
                .unwrap();
        }
        let outcome = engine
            .submit_answer(identity, &mut session, "right")
            .await
            .unwrap();
        assert!(matches!(outcome, SubmitOutcome::QuotaExceeded { .. }));

        // Same storage, one day later.
        let mut clock = fixed_clock();
        clock.advance(Duration::hours(25));
        let late_engine =
            QuizEngine::new(catalog(50), storage, oracle).with_clock(clock);

        let outcome = late_engine
            .submit_answer(identity, &mut session, "right")
            .await
            .unwrap();
        let SubmitOutcome::Answered { status, .. } = outcome else {
            panic!("expected a graded answer after the window reset");
        };
        // Sixth correct answer of edition A: the session passes.
        assert_eq!(status, SessionStatus::Passed);
        let quota = late_engine.check_quota(identity).await.unwrap();
        assert_eq!(quota.record.answered_today, 1);
    }

    #[tokio::test]
    async fn retry_consumes_no_quota() {
        let oracle = FixedOracle::new(AnswerGrade::Partial);
        let engine = engine(oracle);
        let identity = Identity::Authenticated(AccountId::generate());

        let mut session = engine
            .start_session(identity, Edition::A, StudyMode::Random, QuizStyle::Formal)
            .await
            .unwrap();
        let outcome = engine
            .submit_answer(identity, &mut session, "close")
            .await
            .unwrap();
        assert!(matches!(outcome, SubmitOutcome::NeedsRetry { .. }));

        let quota = engine.check_quota(identity).await.unwrap();
        assert_eq!(quota.record.answered_today, 0);
    }

    #[tokio::test]
    async fn finished_sessions_drop_their_snapshot() {
        let engine = engine(FixedOracle::new(AnswerGrade::Correct));
        let identity = Identity::Authenticated(AccountId::generate());

        let mut session = engine
            .start_session(identity, Edition::A, StudyMode::Random, QuizStyle::Formal)
            .await
            .unwrap();
        // Free limit is 5; finish needs 6. Use a premium account.
        let account = identity.account_id().unwrap();
        let premium = QuotaRecord::premium(
            engine.clock.now(),
            engine.clock.now() + Duration::days(30),
        );
        engine
            .storage
            .quotas
            .upsert_quota(account, &premium)
            .await
            .unwrap();

        for _ in 0..Edition::A.pass_threshold() {
            engine
                .submit_answer(identity, &mut session, "right")
                .await
                .unwrap();
        }
        assert_eq!(session.status(), SessionStatus::Passed);

        let err = engine.resume_session(identity).await.unwrap_err();
        assert!(matches!(err, SessionError::NoActiveSession));
    }

    #[tokio::test]
    async fn check_quota_bootstraps_a_free_record() {
        let engine = engine(FixedOracle::new(AnswerGrade::Correct));
        let identity = Identity::Authenticated(AccountId::generate());

        let quota = engine.check_quota(identity).await.unwrap();
        assert!(quota.allowed);
        assert_eq!(quota.record.tier, quiz_core::model::Tier::Free);
        assert_eq!(quota.record.answered_today, 0);
    }
}
