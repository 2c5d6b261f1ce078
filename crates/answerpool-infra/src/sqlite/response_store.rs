//! SQLite shared cache tier.
//!
//! Implements `SharedCacheStore` from `answerpool-core`. Payloads are stored
//! as JSON text; `expires_at` is unix milliseconds and every read filters on
//! it, so expired rows are invisible even before `purge_expired` runs.

use std::time::Duration;

use chrono::Utc;
use sqlx::Row;

use answerpool_core::cache::store::{SharedCacheStore, SharedEntry};
use answerpool_types::answer::CachedAnswer;
use answerpool_types::error::CacheStoreError;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `SharedCacheStore`.
#[derive(Clone)]
pub struct SqliteResponseStore {
    pool: DatabasePool,
}

impl SqliteResponseStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Open the database at `database_url` and wrap it.
    pub async fn connect(database_url: &str) -> Result<Self, CacheStoreError> {
        let pool = DatabasePool::new(database_url)
            .await
            .map_err(|e| CacheStoreError::Connection(e.to_string()))?;
        Ok(Self::new(pool))
    }

    /// Delete rows whose TTL has passed. Returns the number removed.
    pub async fn purge_expired(&self) -> Result<u64, CacheStoreError> {
        let result = sqlx::query("DELETE FROM response_cache WHERE expires_at <= ?")
            .bind(now_ms())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| CacheStoreError::Query(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl SharedCacheStore for SqliteResponseStore {
    async fn get(&self, fingerprint: &str) -> Result<Option<SharedEntry>, CacheStoreError> {
        let now = now_ms();
        let row = sqlx::query(
            "SELECT payload, expires_at FROM response_cache WHERE fingerprint = ? AND expires_at > ?",
        )
        .bind(fingerprint)
        .bind(now)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| CacheStoreError::Query(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let payload: String = row
            .try_get("payload")
            .map_err(|e| CacheStoreError::Query(e.to_string()))?;
        let expires_at: i64 = row
            .try_get("expires_at")
            .map_err(|e| CacheStoreError::Query(e.to_string()))?;
        let answer: CachedAnswer = serde_json::from_str(&payload)
            .map_err(|e| CacheStoreError::Payload(format!("invalid cached answer: {e}")))?;

        Ok(Some(SharedEntry {
            answer,
            remaining_ttl: Duration::from_millis((expires_at - now).max(0) as u64),
        }))
    }

    async fn set(
        &self,
        fingerprint: &str,
        answer: &CachedAnswer,
        ttl: Duration,
    ) -> Result<(), CacheStoreError> {
        let payload = serde_json::to_string(answer)
            .map_err(|e| CacheStoreError::Payload(format!("failed to serialize answer: {e}")))?;
        let now = Utc::now();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = now.timestamp_millis().saturating_add(ttl_ms);

        sqlx::query(
            "INSERT INTO response_cache (fingerprint, payload, created_at, expires_at) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(fingerprint) DO UPDATE SET \
               payload = excluded.payload, \
               created_at = excluded.created_at, \
               expires_at = excluded.expires_at",
        )
        .bind(fingerprint)
        .bind(&payload)
        .bind(now.to_rfc3339())
        .bind(expires_at)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| CacheStoreError::Query(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, fingerprint: &str) -> Result<(), CacheStoreError> {
        sqlx::query("DELETE FROM response_cache WHERE fingerprint = ?")
            .bind(fingerprint)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| CacheStoreError::Query(e.to_string()))?;
        Ok(())
    }

    async fn clear(&self) -> Result<u64, CacheStoreError> {
        let result = sqlx::query("DELETE FROM response_cache")
            .execute(&self.pool.writer)
            .await
            .map_err(|e| CacheStoreError::Query(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> (tempfile::TempDir, SqliteResponseStore) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("cache.db").display());
        let store = SqliteResponseStore::connect(&url).await.unwrap();
        (dir, store)
    }

    fn answer(text: &str) -> CachedAnswer {
        CachedAnswer {
            answer: text.to_string(),
            provider: "siliconflow".to_string(),
            model: "deepseek-chat".to_string(),
        }
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let (_dir, store) = store().await;
        store
            .set("fp1", &answer("北京"), Duration::from_secs(60))
            .await
            .unwrap();

        let entry = store.get("fp1").await.unwrap().unwrap();
        assert_eq!(entry.answer, answer("北京"));
        assert!(entry.remaining_ttl <= Duration::from_secs(60));
        assert!(entry.remaining_ttl > Duration::from_secs(50));
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let (_dir, store) = store().await;
        store.set("fp", &answer("old"), Duration::from_secs(60)).await.unwrap();
        store.set("fp", &answer("new"), Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("fp").await.unwrap().unwrap().answer.answer, "new");

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM response_cache")
            .fetch_one(&store.pool.reader)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn test_expired_rows_are_invisible_and_purged() {
        let (_dir, store) = store().await;
        store.set("fresh", &answer("a"), Duration::from_secs(60)).await.unwrap();
        store.set("stale", &answer("b"), Duration::from_millis(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(store.get("stale").await.unwrap().is_none());
        assert!(store.get("fresh").await.unwrap().is_some());
        assert_eq!(store.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let (_dir, store) = store().await;
        for fp in ["a", "b", "c"] {
            store.set(fp, &answer(fp), Duration::from_secs(60)).await.unwrap();
        }
        store.delete("a").await.unwrap();
        store.delete("never-existed").await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());

        assert_eq!(store.clear().await.unwrap(), 2);
        assert!(store.get("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_payload_is_payload_error() {
        let (_dir, store) = store().await;
        sqlx::query(
            "INSERT INTO response_cache (fingerprint, payload, created_at, expires_at) VALUES ('bad', 'not json', '', ?)",
        )
        .bind(i64::MAX)
        .execute(&store.pool.writer)
        .await
        .unwrap();

        assert!(matches!(
            store.get("bad").await,
            Err(CacheStoreError::Payload(_))
        ));
    }
}
