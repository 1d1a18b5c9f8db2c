use chrono::{DateTime, Utc};
use sqlx::Row;

use quiz_core::model::{AccountId, QuotaRecord, Tier};

use super::SqliteRepository;
use super::mapping::{account_to_text, conn, ser, u32_from_i64};
use crate::repository::{QuotaRepository, StorageError};

fn map_quota_row(row: &sqlx::sqlite::SqliteRow) -> Result<QuotaRecord, StorageError> {
    let tier: String = row.try_get("tier").map_err(ser)?;
    let tier = tier.parse::<Tier>().map_err(ser)?;
    let answered_today = u32_from_i64(
        "answered_today",
        row.try_get::<i64, _>("answered_today").map_err(ser)?,
    )?;
    let reset_at: DateTime<Utc> = row.try_get("reset_at").map_err(ser)?;
    let premium_expires_at: Option<DateTime<Utc>> =
        row.try_get("premium_expires_at").map_err(ser)?;

    Ok(QuotaRecord {
        tier,
        answered_today,
        reset_at,
        premium_expires_at,
    })
}

#[async_trait::async_trait]
impl QuotaRepository for SqliteRepository {
    async fn quota(&self, account: AccountId) -> Result<Option<QuotaRecord>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT tier, answered_today, reset_at, premium_expires_at
                FROM quota_records
                WHERE account_id = ?1
            ",
        )
        .bind(account_to_text(account))
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_quota_row).transpose()
    }

    async fn upsert_quota(
        &self,
        account: AccountId,
        record: &QuotaRecord,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO quota_records (
                    account_id, tier, answered_today, reset_at, premium_expires_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(account_id) DO UPDATE SET
                    tier = excluded.tier,
                    answered_today = excluded.answered_today,
                    reset_at = excluded.reset_at,
                    premium_expires_at = excluded.premium_expires_at
            ",
        )
        .bind(account_to_text(account))
        .bind(record.tier.as_str())
        .bind(i64::from(record.answered_today))
        .bind(record.reset_at)
        .bind(record.premium_expires_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn reset_window(
        &self,
        account: AccountId,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
                UPDATE quota_records
                SET answered_today = 0, reset_at = ?2
                WHERE account_id = ?1
            ",
        )
        .bind(account_to_text(account))
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn increment_answered(&self, account: AccountId) -> Result<u32, StorageError> {
        // The single UPDATE statement is the atomic read-modify-write;
        // the follow-up SELECT runs in the same transaction.
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let res = sqlx::query(
            r"
                UPDATE quota_records
                SET answered_today = answered_today + 1
                WHERE account_id = ?1
            ",
        )
        .bind(account_to_text(account))
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        let row = sqlx::query(
            r"
                SELECT answered_today FROM quota_records WHERE account_id = ?1
            ",
        )
        .bind(account_to_text(account))
        .fetch_one(&mut *tx)
        .await
        .map_err(conn)?;

        let answered = u32_from_i64(
            "answered_today",
            row.try_get::<i64, _>("answered_today").map_err(ser)?,
        )?;

        tx.commit().await.map_err(conn)?;
        Ok(answered)
    }
}
