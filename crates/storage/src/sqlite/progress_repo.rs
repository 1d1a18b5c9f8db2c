use sqlx::Row;

use quiz_core::model::{AccountId, Edition, ProgressRecord};

use super::SqliteRepository;
use super::mapping::{account_to_text, conn, index_to_i64, ser, usize_from_i64};
use crate::repository::{ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn progress(
        &self,
        account: AccountId,
        edition: Edition,
    ) -> Result<ProgressRecord, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT question_index, correct
                FROM progress_entries
                WHERE account_id = ?1 AND edition = ?2
                ORDER BY question_index ASC
            ",
        )
        .bind(account_to_text(account))
        .bind(edition.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut asked = Vec::with_capacity(rows.len());
        let mut correct = Vec::new();
        for row in rows {
            let index =
                usize_from_i64("question_index", row.try_get::<i64, _>("question_index").map_err(ser)?)?;
            asked.push(index);
            if row.try_get::<i64, _>("correct").map_err(ser)? != 0 {
                correct.push(index);
            }
        }

        Ok(ProgressRecord::from_persisted(asked, correct))
    }

    async fn record_outcome(
        &self,
        account: AccountId,
        edition: Edition,
        index: usize,
        correct: bool,
    ) -> Result<(), StorageError> {
        // One row per (account, edition, index); the upsert makes the
        // read-modify-write atomic at the database.
        sqlx::query(
            r"
                INSERT INTO progress_entries (account_id, edition, question_index, correct)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(account_id, edition, question_index)
                DO UPDATE SET correct = excluded.correct
            ",
        )
        .bind(account_to_text(account))
        .bind(edition.as_str())
        .bind(index_to_i64(index)?)
        .bind(i64::from(correct))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn reset_progress(
        &self,
        account: AccountId,
        edition: Edition,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
                DELETE FROM progress_entries
                WHERE account_id = ?1 AND edition = ?2
            ",
        )
        .bind(account_to_text(account))
        .bind(edition.as_str())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }
}
