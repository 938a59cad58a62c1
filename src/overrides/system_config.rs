// shopsync/src/overrides/system_config.rs
//! Upserts into the application's key/value configuration table. Values are
//! wrapped in the `{"_value": ...}` envelope the application expects; rows
//! are keyed by configuration key plus optional sales-channel scope.

use chrono::Utc;
use sqlx::MySqlPool;
use uuid::Uuid;

use crate::errors::{Result, SyncError};

/// Supplies identifiers for inserted configuration rows. Injected so tests
/// can pin deterministic ids.
pub trait IdGenerator {
    /// Returns a 32-character lowercase hex id.
    fn generate(&self) -> String;
}

pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// Wraps a configuration value in the application's envelope format.
pub fn envelope(value: &serde_json::Value) -> Result<String> {
    Ok(serde_json::to_string(&serde_json::json!({ "_value": value }))?)
}

fn validate_scope(scope_id: &str) -> Result<()> {
    match hex::decode(scope_id) {
        Ok(bytes) if bytes.len() == 16 => Ok(()),
        _ => Err(SyncError::Override(format!(
            "scope id {scope_id:?} is not a 16-byte hex identifier"
        ))),
    }
}

/// Update-if-exists, else insert with a generated id and current timestamp.
/// Applying the same key twice must leave exactly one row.
pub async fn upsert(
    pool: &MySqlPool,
    ids: &dyn IdGenerator,
    key: &str,
    value: &serde_json::Value,
    scope_id: Option<&str>,
) -> Result<()> {
    let payload = envelope(value)?;
    let now = Utc::now().naive_utc();

    let existing: Option<(Vec<u8>,)> = match scope_id {
        Some(scope) => {
            validate_scope(scope)?;
            sqlx::query_as(
                "SELECT id FROM system_config \
                 WHERE configuration_key = ? AND sales_channel_id = UNHEX(?)",
            )
            .bind(key)
            .bind(scope)
            .fetch_optional(pool)
            .await?
        }
        None => {
            sqlx::query_as(
                "SELECT id FROM system_config \
                 WHERE configuration_key = ? AND sales_channel_id IS NULL",
            )
            .bind(key)
            .fetch_optional(pool)
            .await?
        }
    };

    match existing {
        Some((id,)) => {
            sqlx::query("UPDATE system_config SET configuration_value = ?, updated_at = ? WHERE id = ?")
                .bind(&payload)
                .bind(now)
                .bind(&id)
                .execute(pool)
                .await?;
        }
        None => {
            let id = ids.generate();
            match scope_id {
                Some(scope) => {
                    sqlx::query(
                        "INSERT INTO system_config \
                         (id, configuration_key, configuration_value, sales_channel_id, created_at) \
                         VALUES (UNHEX(?), ?, ?, UNHEX(?), ?)",
                    )
                    .bind(&id)
                    .bind(key)
                    .bind(&payload)
                    .bind(scope)
                    .bind(now)
                    .execute(pool)
                    .await?;
                }
                None => {
                    sqlx::query(
                        "INSERT INTO system_config \
                         (id, configuration_key, configuration_value, sales_channel_id, created_at) \
                         VALUES (UNHEX(?), ?, ?, NULL, ?)",
                    )
                    .bind(&id)
                    .bind(key)
                    .bind(&payload)
                    .bind(now)
                    .execute(pool)
                    .await?;
                }
            }
        }
    }
    Ok(())
}
