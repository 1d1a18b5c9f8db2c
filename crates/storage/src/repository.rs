use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use quiz_core::model::{
    AccountId, Edition, ProgressRecord, QuestionResult, QuizStyle, QuotaRecord, SessionStatus,
    StudyMode,
};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted shape of an in-progress attempt.
///
/// The sequence is stored as canonical indices, never as question text,
/// so edition question-list changes cannot silently corrupt a saved
/// session; restoration validates the indices against the current bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub edition: Edition,
    pub study_mode: StudyMode,
    pub style: QuizStyle,
    pub status: SessionStatus,
    pub sequence: Vec<usize>,
    pub cursor: usize,
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub results: Vec<QuestionResult>,
    pub updated_at: DateTime<Utc>,
}

/// Repository contract for per-edition mastery records.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch the progress record for an account and edition.
    ///
    /// Accounts with no history get an empty record, not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be read.
    async fn progress(
        &self,
        account: AccountId,
        edition: Edition,
    ) -> Result<ProgressRecord, StorageError>;

    /// Apply one terminal outcome for a canonical index.
    ///
    /// This is an atomic storage-level upsert; concurrent devices must
    /// not lose each other's outcomes through stale read-then-write.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the outcome cannot be stored.
    async fn record_outcome(
        &self,
        account: AccountId,
        edition: Edition,
        index: usize,
        correct: bool,
    ) -> Result<(), StorageError>;

    /// Clear all progress for an account and edition. Explicit user action.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the rows cannot be deleted.
    async fn reset_progress(
        &self,
        account: AccountId,
        edition: Edition,
    ) -> Result<(), StorageError>;
}

/// Repository contract for daily answer allowances.
#[async_trait]
pub trait QuotaRepository: Send + Sync {
    /// Fetch the quota record for an account, if one exists yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be read.
    async fn quota(&self, account: AccountId) -> Result<Option<QuotaRecord>, StorageError>;

    /// Insert or replace the quota record for an account.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn upsert_quota(
        &self,
        account: AccountId,
        record: &QuotaRecord,
    ) -> Result<(), StorageError>;

    /// Start a fresh 24h window at `now` with the counter cleared.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no record exists.
    async fn reset_window(
        &self,
        account: AccountId,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Atomically add one answered question and return the new count.
    ///
    /// The increment must be a storage-level read-modify-write so a race
    /// between devices cannot grant extra answers.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no record exists.
    async fn increment_answered(&self, account: AccountId) -> Result<u32, StorageError>;
}

/// Repository contract for resumable session snapshots.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Persist the latest snapshot for an account, replacing any prior one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be stored.
    async fn save_snapshot(
        &self,
        account: AccountId,
        snapshot: &SessionSnapshot,
    ) -> Result<(), StorageError>;

    /// Fetch the stored snapshot for an account, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be read.
    async fn load_snapshot(
        &self,
        account: AccountId,
    ) -> Result<Option<SessionSnapshot>, StorageError>;

    /// Remove the stored snapshot. Missing snapshots are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn clear_snapshot(&self, account: AccountId) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY ADAPTER ────────────────────────────────────────────────────────
//

/// Simple in-memory repository implementation for testing and prototyping.
///
/// All mutations happen under one mutex per map, which gives the same
/// atomic read-modify-write guarantees the SQLite adapter provides.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    progress: Arc<Mutex<HashMap<(AccountId, Edition), ProgressRecord>>>,
    quotas: Arc<Mutex<HashMap<AccountId, QuotaRecord>>>,
    snapshots: Arc<Mutex<HashMap<AccountId, SessionSnapshot>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_err<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn progress(
        &self,
        account: AccountId,
        edition: Edition,
    ) -> Result<ProgressRecord, StorageError> {
        let guard = self.progress.lock().map_err(lock_err)?;
        Ok(guard.get(&(account, edition)).cloned().unwrap_or_default())
    }

    async fn record_outcome(
        &self,
        account: AccountId,
        edition: Edition,
        index: usize,
        correct: bool,
    ) -> Result<(), StorageError> {
        let mut guard = self.progress.lock().map_err(lock_err)?;
        let record = guard.entry((account, edition)).or_default();
        let grade = if correct {
            quiz_core::model::AnswerGrade::Correct
        } else {
            quiz_core::model::AnswerGrade::Incorrect
        };
        record.record_outcome(index, grade);
        Ok(())
    }

    async fn reset_progress(
        &self,
        account: AccountId,
        edition: Edition,
    ) -> Result<(), StorageError> {
        let mut guard = self.progress.lock().map_err(lock_err)?;
        guard.remove(&(account, edition));
        Ok(())
    }
}

#[async_trait]
impl QuotaRepository for InMemoryRepository {
    async fn quota(&self, account: AccountId) -> Result<Option<QuotaRecord>, StorageError> {
        let guard = self.quotas.lock().map_err(lock_err)?;
        Ok(guard.get(&account).cloned())
    }

    async fn upsert_quota(
        &self,
        account: AccountId,
        record: &QuotaRecord,
    ) -> Result<(), StorageError> {
        let mut guard = self.quotas.lock().map_err(lock_err)?;
        guard.insert(account, record.clone());
        Ok(())
    }

    async fn reset_window(
        &self,
        account: AccountId,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self.quotas.lock().map_err(lock_err)?;
        let record = guard.get_mut(&account).ok_or(StorageError::NotFound)?;
        record.reset_window(now);
        Ok(())
    }

    async fn increment_answered(&self, account: AccountId) -> Result<u32, StorageError> {
        let mut guard = self.quotas.lock().map_err(lock_err)?;
        let record = guard.get_mut(&account).ok_or(StorageError::NotFound)?;
        record.answered_today = record.answered_today.saturating_add(1);
        Ok(record.answered_today)
    }
}

#[async_trait]
impl SnapshotRepository for InMemoryRepository {
    async fn save_snapshot(
        &self,
        account: AccountId,
        snapshot: &SessionSnapshot,
    ) -> Result<(), StorageError> {
        let mut guard = self.snapshots.lock().map_err(lock_err)?;
        guard.insert(account, snapshot.clone());
        Ok(())
    }

    async fn load_snapshot(
        &self,
        account: AccountId,
    ) -> Result<Option<SessionSnapshot>, StorageError> {
        let guard = self.snapshots.lock().map_err(lock_err)?;
        Ok(guard.get(&account).cloned())
    }

    async fn clear_snapshot(&self, account: AccountId) -> Result<(), StorageError> {
        let mut guard = self.snapshots.lock().map_err(lock_err)?;
        guard.remove(&account);
        Ok(())
    }
}

//
// ─── AGGREGATE ────────────────────────────────────────────────────────────────
//

/// Aggregates the engine's repositories behind trait objects for easy
/// backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
    pub quotas: Arc<dyn QuotaRepository>,
    pub snapshots: Arc<dyn SnapshotRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let quotas: Arc<dyn QuotaRepository> = Arc::new(repo.clone());
        let snapshots: Arc<dyn SnapshotRepository> = Arc::new(repo);
        Self {
            progress,
            quotas,
            snapshots,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::time::fixed_now;

    #[tokio::test]
    async fn missing_progress_reads_as_empty() {
        let repo = InMemoryRepository::new();
        let record = repo
            .progress(AccountId::generate(), Edition::A)
            .await
            .unwrap();
        assert!(!record.has_history());
    }

    #[tokio::test]
    async fn outcomes_accumulate_and_revoke() {
        let repo = InMemoryRepository::new();
        let account = AccountId::generate();

        repo.record_outcome(account, Edition::A, 3, true).await.unwrap();
        repo.record_outcome(account, Edition::A, 3, false)
            .await
            .unwrap();

        let record = repo.progress(account, Edition::A).await.unwrap();
        assert!(record.asked().contains(&3));
        assert!(!record.correct().contains(&3));
    }

    #[tokio::test]
    async fn progress_is_scoped_per_edition() {
        let repo = InMemoryRepository::new();
        let account = AccountId::generate();
        repo.record_outcome(account, Edition::A, 1, true).await.unwrap();

        let other = repo.progress(account, Edition::B).await.unwrap();
        assert!(!other.has_history());
    }

    #[tokio::test]
    async fn quota_increment_requires_a_record() {
        let repo = InMemoryRepository::new();
        let account = AccountId::generate();
        let err = repo.increment_answered(account).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));

        repo.upsert_quota(account, &QuotaRecord::free(fixed_now()))
            .await
            .unwrap();
        assert_eq!(repo.increment_answered(account).await.unwrap(), 1);
        assert_eq!(repo.increment_answered(account).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn snapshot_lifecycle() {
        let repo = InMemoryRepository::new();
        let account = AccountId::generate();
        assert!(repo.load_snapshot(account).await.unwrap().is_none());

        let snapshot = SessionSnapshot {
            edition: Edition::A,
            study_mode: StudyMode::Random,
            style: QuizStyle::Formal,
            status: SessionStatus::InProgress,
            sequence: vec![5, 1, 9],
            cursor: 1,
            correct_count: 1,
            incorrect_count: 0,
            results: Vec::new(),
            updated_at: fixed_now(),
        };
        repo.save_snapshot(account, &snapshot).await.unwrap();
        assert_eq!(repo.load_snapshot(account).await.unwrap(), Some(snapshot));

        repo.clear_snapshot(account).await.unwrap();
        assert!(repo.load_snapshot(account).await.unwrap().is_none());
    }
}
