//! `graphrag-store`: a libSQL-backed implementation of
//! [`graphrag_core::graph::GraphRepository`] and
//! [`graphrag_core::suggester::CapabilityRepository`].
//!
//! This crate owns the SQL schema and connection lifecycle; all domain
//! semantics (weight algebra, promotion, cycle handling) live in
//! `graphrag-core` and are untouched here — this crate only moves rows.

pub mod error;
mod repository;
pub mod schema;

pub use error::{Error, Result};
pub use repository::GraphStoreDb;

use libsql::{Builder, Database};

/// Connection-lifecycle tunables. Unlike the teacher's storage crate this
/// carries no pooling, compression, or circuit-breaker configuration —
/// `graphrag-core` treats a `GraphRepository` failure as fatal to the
/// caller of `Sync` (spec.md §7), so there is nothing here to retry
/// transparently.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: String,
    pub auth_token: Option<String>,
}

impl StoreConfig {
    #[must_use]
    pub fn new(url: impl Into<String>, auth_token: Option<String>) -> Self {
        Self {
            url: url.into(),
            auth_token,
        }
    }
}

/// Open a database connection and ensure the schema exists.
///
/// Only `libsql://`, `file:`, and `:memory:` URLs are accepted — plain
/// `http://`/`https://` URLs are rejected the way the teacher's
/// `TursoStorage::new` rejects them, since a bare HTTP endpoint carries no
/// libSQL auth handshake.
///
/// # Errors
///
/// Returns [`Error::InsecureUrl`] for a disallowed scheme, or
/// [`Error::Connection`] if the database cannot be opened or migrated.
pub async fn connect(config: &StoreConfig) -> Result<Database> {
    validate_url(&config.url)?;

    let db = if config.url == ":memory:" {
        Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?
    } else if let Some(path) = config.url.strip_prefix("file:") {
        Builder::new_local(path)
            .build()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?
    } else {
        Builder::new_remote(config.url.clone(), config.auth_token.clone().unwrap_or_default())
            .build()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?
    };

    let conn = db.connect().map_err(|e| Error::Connection(e.to_string()))?;
    for statement in schema::ALL_STATEMENTS {
        conn.execute(statement, ())
            .await
            .map_err(|e| Error::Query(e.to_string()))?;
    }

    tracing::info!(url = %redact(&config.url), "store.connected");
    Ok(db)
}

fn validate_url(url: &str) -> Result<()> {
    if url == ":memory:" || url.starts_with("libsql://") || url.starts_with("file:") {
        Ok(())
    } else {
        Err(Error::InsecureUrl(url.to_string()))
    }
}

fn redact(url: &str) -> String {
    url.split('?').next().unwrap_or(url).to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn http_urls_are_rejected() {
        assert!(validate_url("http://example.com").is_err());
        assert!(validate_url("https://example.com").is_err());
    }

    #[test]
    fn libsql_file_and_memory_urls_are_accepted() {
        assert!(validate_url("libsql://db.turso.io").is_ok());
        assert!(validate_url("file:local.db").is_ok());
        assert!(validate_url(":memory:").is_ok());
    }

    #[tokio::test]
    async fn connect_to_memory_db_runs_migrations() {
        let config = StoreConfig::new(":memory:", None);
        let db = connect(&config).await.unwrap();
        let conn = db.connect().unwrap();
        let mut rows = conn.query("SELECT name FROM sqlite_master WHERE type='table'", ()).await.unwrap();
        let mut names = Vec::new();
        while let Some(row) = rows.next().await.unwrap() {
            let name: String = row.get(0).unwrap();
            names.push(name);
        }
        assert!(names.contains(&"tool_embedding".to_string()));
        assert!(names.contains(&"tool_dependency".to_string()));
        assert!(names.contains(&"capability".to_string()));
    }
}
