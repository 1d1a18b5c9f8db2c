use chrono::{DateTime, Utc};
use sqlx::Row;

use quiz_core::model::{AccountId, Edition, QuestionResult, QuizStyle, SessionStatus, StudyMode};

use super::SqliteRepository;
use super::mapping::{account_to_text, conn, ser, u32_from_i64, usize_from_i64};
use crate::repository::{SessionSnapshot, SnapshotRepository, StorageError};

fn map_snapshot_row(row: &sqlx::sqlite::SqliteRow) -> Result<SessionSnapshot, StorageError> {
    let edition: String = row.try_get("edition").map_err(ser)?;
    let study_mode: String = row.try_get("study_mode").map_err(ser)?;
    let style: String = row.try_get("style").map_err(ser)?;
    let status: String = row.try_get("status").map_err(ser)?;
    let sequence: String = row.try_get("sequence").map_err(ser)?;
    let results: String = row.try_get("results").map_err(ser)?;
    let cursor = usize_from_i64("cursor", row.try_get::<i64, _>("cursor").map_err(ser)?)?;
    let correct_count = u32_from_i64(
        "correct_count",
        row.try_get::<i64, _>("correct_count").map_err(ser)?,
    )?;
    let incorrect_count = u32_from_i64(
        "incorrect_count",
        row.try_get::<i64, _>("incorrect_count").map_err(ser)?,
    )?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(ser)?;

    Ok(SessionSnapshot {
        edition: edition.parse::<Edition>().map_err(ser)?,
        study_mode: study_mode.parse::<StudyMode>().map_err(ser)?,
        style: style.parse::<QuizStyle>().map_err(ser)?,
        status: status.parse::<SessionStatus>().map_err(ser)?,
        sequence: serde_json::from_str::<Vec<usize>>(&sequence).map_err(ser)?,
        cursor,
        correct_count,
        incorrect_count,
        results: serde_json::from_str::<Vec<QuestionResult>>(&results).map_err(ser)?,
        updated_at,
    })
}

#[async_trait::async_trait]
impl SnapshotRepository for SqliteRepository {
    async fn save_snapshot(
        &self,
        account: AccountId,
        snapshot: &SessionSnapshot,
    ) -> Result<(), StorageError> {
        let sequence = serde_json::to_string(&snapshot.sequence).map_err(ser)?;
        let results = serde_json::to_string(&snapshot.results).map_err(ser)?;
        let cursor = i64::try_from(snapshot.cursor)
            .map_err(|_| StorageError::Serialization("cursor overflow".into()))?;

        sqlx::query(
            r"
                INSERT INTO session_snapshots (
                    account_id, edition, study_mode, style, status,
                    sequence, cursor, correct_count, incorrect_count,
                    results, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ON CONFLICT(account_id) DO UPDATE SET
                    edition = excluded.edition,
                    study_mode = excluded.study_mode,
                    style = excluded.style,
                    status = excluded.status,
                    sequence = excluded.sequence,
                    cursor = excluded.cursor,
                    correct_count = excluded.correct_count,
                    incorrect_count = excluded.incorrect_count,
                    results = excluded.results,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(account_to_text(account))
        .bind(snapshot.edition.as_str())
        .bind(snapshot.study_mode.as_str())
        .bind(snapshot.style.as_str())
        .bind(snapshot.status.as_str())
        .bind(sequence)
        .bind(cursor)
        .bind(i64::from(snapshot.correct_count))
        .bind(i64::from(snapshot.incorrect_count))
        .bind(results)
        .bind(snapshot.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn load_snapshot(
        &self,
        account: AccountId,
    ) -> Result<Option<SessionSnapshot>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT edition, study_mode, style, status, sequence,
                       cursor, correct_count, incorrect_count, results, updated_at
                FROM session_snapshots
                WHERE account_id = ?1
            ",
        )
        .bind(account_to_text(account))
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_snapshot_row).transpose()
    }

    async fn clear_snapshot(&self, account: AccountId) -> Result<(), StorageError> {
        sqlx::query(
            r"
                DELETE FROM session_snapshots WHERE account_id = ?1
            ",
        )
        .bind(account_to_text(account))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }
}
