use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use reco_core::domain::record::{NewRecord, Record, RecordPage, UserId};

use super::{
    decode_error, decode_timestamp, encode_timestamp, excluded_id, RecordRepository,
    RepositoryError,
};
use crate::DbPool;

const RECORD_COLUMNS: &str = "id, user_id, key_norm, key_text, value, created_at";

pub struct SqlRecordRepository {
    pool: DbPool,
}

impl SqlRecordRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_record(row: &SqliteRow) -> Result<Record, RepositoryError> {
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    Ok(Record {
        id: row.try_get("id").map_err(decode_error)?,
        owner_id: UserId(row.try_get("user_id").map_err(decode_error)?),
        key_norm: row.try_get("key_norm").map_err(decode_error)?,
        key_text: row.try_get("key_text").map_err(decode_error)?,
        value: row.try_get("value").map_err(decode_error)?,
        created_at: decode_timestamp(&created_at)?,
    })
}

/// Escapes `LIKE` wildcards so the needle matches literally.
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for ch in needle.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn count_from(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[async_trait::async_trait]
impl RecordRepository for SqlRecordRepository {
    async fn upsert(
        &self,
        record: NewRecord,
        at: DateTime<Utc>,
    ) -> Result<Record, RepositoryError> {
        let stamp = encode_timestamp(at);
        let row = sqlx::query(&format!(
            "INSERT INTO records (user_id, key_norm, key_text, value, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(user_id, key_norm) DO UPDATE SET
                key_text = excluded.key_text,
                value = excluded.value,
                updated_at = excluded.updated_at
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(record.owner_id.0)
        .bind(&record.key_norm)
        .bind(&record.key_text)
        .bind(&record.value)
        .bind(&stamp)
        .bind(&stamp)
        .fetch_one(&self.pool)
        .await?;

        row_to_record(&row)
    }

    async fn find_exact(
        &self,
        owner: UserId,
        key_norm: &str,
    ) -> Result<Option<Record>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM records WHERE user_id = ? AND key_norm = ?"
        ))
        .bind(owner.0)
        .bind(key_norm)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn update_value(
        &self,
        owner: UserId,
        key_norm: &str,
        key_text: &str,
        value: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Record>, RepositoryError> {
        let row = sqlx::query(&format!(
            "UPDATE records SET key_text = ?, value = ?, updated_at = ?
             WHERE user_id = ? AND key_norm = ?
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(key_text)
        .bind(value)
        .bind(encode_timestamp(at))
        .bind(owner.0)
        .bind(key_norm)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn search_substring(
        &self,
        owner: UserId,
        needle: &str,
        limit: u32,
    ) -> Result<Vec<Record>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM records
             WHERE user_id = ? AND key_norm LIKE ? ESCAPE '\\'
             ORDER BY created_at DESC, id DESC
             LIMIT ?"
        ))
        .bind(owner.0)
        .bind(like_pattern(needle))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    async fn delete_exact(
        &self,
        owner: UserId,
        key_norm: &str,
    ) -> Result<Option<Record>, RepositoryError> {
        let row = sqlx::query(&format!(
            "DELETE FROM records WHERE user_id = ? AND key_norm = ? RETURNING {RECORD_COLUMNS}"
        ))
        .bind(owner.0)
        .bind(key_norm)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn list_page(
        &self,
        owner: UserId,
        offset: u64,
        limit: u32,
    ) -> Result<RecordPage, RepositoryError> {
        let total = self.count_for_owner(owner).await?;
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM records
             WHERE user_id = ?
             ORDER BY created_at DESC, id DESC
             LIMIT ? OFFSET ?"
        ))
        .bind(owner.0)
        .bind(i64::from(limit))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let records = rows.iter().map(row_to_record).collect::<Result<Vec<_>, _>>()?;
        Ok(RecordPage { records, total })
    }

    async fn count_for_owner(&self, owner: UserId) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE user_id = ?")
            .bind(owner.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(count_from(count))
    }

    async fn delete_all_for_owner(&self, owner: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM records WHERE user_id = ?")
            .bind(owner.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count_all(&self, excluding: Option<UserId>) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE user_id != ?")
            .bind(excluded_id(excluding))
            .fetch_one(&self.pool)
            .await?;
        Ok(count_from(count))
    }
}
