use sqlx::SqlitePool;

use crate::error::AppError;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct KvEntry {
    pub key: String,
    pub value: String,
    pub is_encrypted: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Local key-value entries. The settings page stores its whole object under
/// one key.
#[derive(Clone)]
pub struct SettingsRepo {
    read_pool: SqlitePool,
    write_pool: SqlitePool,
}

impl SettingsRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            read_pool: pool.clone(),
            write_pool: pool,
        }
    }

    pub fn with_pools(read_pool: SqlitePool, write_pool: SqlitePool) -> Self {
        Self {
            read_pool,
            write_pool,
        }
    }

    pub async fn put(&self, key: &str, value: &str, is_encrypted: bool) -> Result<KvEntry, AppError> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, is_encrypted)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key)
            DO UPDATE SET value = excluded.value,
                          is_encrypted = excluded.is_encrypted,
                          updated_at = datetime('now','utc')
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(if is_encrypted { 1 } else { 0 })
        .execute(&self.write_pool)
        .await?;

        self.get(key).await?.ok_or_else(|| AppError::NotFound {
            entity: "kv_entry".to_string(),
            id: key.to_string(),
        })
    }

    pub async fn get(&self, key: &str) -> Result<Option<KvEntry>, AppError> {
        let row = sqlx::query_as::<_, KvEntry>("SELECT * FROM kv_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.read_pool)
            .await?;

        Ok(row)
    }

    /// Returns whether an entry was removed.
    pub async fn delete(&self, key: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM kv_store WHERE key = ?1")
            .bind(key)
            .execute(&self.write_pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::SettingsRepo;
    use crate::db::Database;

    #[tokio::test]
    async fn put_get_delete_roundtrip() {
        let db = Database::in_memory().await.unwrap();
        let repo = SettingsRepo::with_pools(db.read_pool().clone(), db.write_pool().clone());

        assert!(repo.get("adk-settings").await.unwrap().is_none());

        repo.put("adk-settings", r#"{"theme":"dark"}"#, false).await.unwrap();
        let updated = repo.put("adk-settings", r#"{"theme":"light"}"#, true).await.unwrap();
        assert_eq!(updated.value, r#"{"theme":"light"}"#);
        assert_eq!(updated.is_encrypted, 1);

        assert!(repo.delete("adk-settings").await.unwrap());
        assert!(!repo.delete("adk-settings").await.unwrap());
        assert!(repo.get("adk-settings").await.unwrap().is_none());
    }
}
