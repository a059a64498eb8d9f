//! SQL text for one entry table.

use coffer_config::validation::is_identifier;
use coffer_core::{CacheError, CacheResult};

/// Statements bound to a table name, built once per driver.
#[derive(Debug)]
pub(super) struct Queries {
    pub table: String,
    pub create_table: String,
    pub select: String,
    pub exists: String,
    pub upsert: String,
    pub lock_row: String,
    pub update_value: String,
    pub delete: String,
    pub delete_expired: String,
    pub flush: String,
}

impl Queries {
    /// The name is interpolated into SQL text, so only plain identifiers pass.
    pub fn for_table(table: &str) -> CacheResult<Self> {
        if !is_identifier(table) {
            return Err(CacheError::configuration(format!(
                "Invalid cache table name '{}'",
                table
            )));
        }

        Ok(Self {
            table: table.to_string(),
            create_table: format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    cache_key  TEXT PRIMARY KEY NOT NULL,
                    kind       TEXT NOT NULL,
                    payload    BLOB NOT NULL,
                    expires_at INTEGER NULL
                )
                "#
            ),
            select: format!(
                "SELECT kind, payload, expires_at FROM {table} WHERE cache_key = ?"
            ),
            exists: format!(
                "SELECT 1 FROM {table} WHERE cache_key = ? AND (expires_at IS NULL OR expires_at > ?)"
            ),
            upsert: format!(
                r#"
                INSERT INTO {table} (cache_key, kind, payload, expires_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT (cache_key) DO UPDATE SET
                    kind = excluded.kind,
                    payload = excluded.payload,
                    expires_at = excluded.expires_at
                "#
            ),
            lock_row: format!("UPDATE {table} SET cache_key = cache_key WHERE cache_key = ?"),
            update_value: format!("UPDATE {table} SET kind = ?, payload = ? WHERE cache_key = ?"),
            delete: format!("DELETE FROM {table} WHERE cache_key = ? RETURNING expires_at"),
            delete_expired: format!(
                "DELETE FROM {table} WHERE expires_at IS NOT NULL AND expires_at <= ?"
            ),
            flush: format!("DELETE FROM {table}"),
        })
    }
}
