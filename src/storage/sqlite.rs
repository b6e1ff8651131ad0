//! SQLite-backed snippet store (`sqlite:<path>`).
//!
//! rusqlite is blocking, so every call runs on the blocking pool while holding
//! the connection lock. Insert-if-absent and the follow-up comparison happen
//! under one lock acquisition.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{NewSnippet, Snippet, SnippetId, SnippetStore, StoreError};
use crate::engine::JqOption;
use crate::fetch::HttpSource;

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

/// Raw database row before decoding.
struct SnippetRow {
    slug: String,
    json: Option<String>,
    http: Option<String>,
    query: String,
    options: String,
    created_at: String,
}

impl SnippetRow {
    fn into_snippet(self) -> Result<Snippet, StoreError> {
        let options: Vec<JqOption> =
            serde_json::from_str(&self.options).map_err(|e| StoreError::Corrupt {
                id: self.slug.clone(),
                reason: format!("invalid options: {}", e),
            })?;
        let http: Option<HttpSource> = self
            .http
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| StoreError::Corrupt {
                id: self.slug.clone(),
                reason: format!("invalid http source: {}", e),
            })?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| StoreError::Corrupt {
                id: self.slug.clone(),
                reason: format!("invalid created_at: {}", e),
            })?
            .with_timezone(&Utc);
        let id = SnippetId::parse(&self.slug).ok_or_else(|| StoreError::Corrupt {
            id: self.slug.clone(),
            reason: "invalid identifier".to_string(),
        })?;

        Ok(Snippet {
            id,
            query: self.query,
            json: self.json,
            http,
            options,
            created_at,
        })
    }
}

pub fn create_tables(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS snippets (
            slug TEXT NOT NULL PRIMARY KEY,
            json TEXT,
            http TEXT,
            query TEXT NOT NULL,
            options TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

fn select(conn: &Connection, slug: &str) -> Result<Option<Snippet>, StoreError> {
    let row = conn
        .query_row(
            "SELECT slug, json, http, query, options, created_at FROM snippets WHERE slug = ?1",
            params![slug],
            |row| {
                Ok(SnippetRow {
                    slug: row.get(0)?,
                    json: row.get(1)?,
                    http: row.get(2)?,
                    query: row.get(3)?,
                    options: row.get(4)?,
                    created_at: row.get(5)?,
                })
            },
        )
        .optional()?;

    row.map(SnippetRow::into_snippet).transpose()
}

impl SqliteStore {
    /// Open (or create) the database at `path`; `:memory:` opens a private
    /// in-memory database.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let path = path.to_string();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, StoreError> {
            let conn = if path == ":memory:" {
                Connection::open_in_memory()?
            } else {
                Connection::open(&path)?
            };
            create_tables(&conn)?;
            Ok(conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))??;

        tracing::debug!("SQLite snippet store opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?
    }
}

#[async_trait]
impl SnippetStore for SqliteStore {
    async fn insert(&self, id: SnippetId, snippet: NewSnippet) -> Result<Snippet, StoreError> {
        self.with_conn(move |conn| {
            let encode_failed = |e: serde_json::Error| StoreError::Corrupt {
                id: id.to_string(),
                reason: e.to_string(),
            };
            let options = serde_json::to_string(&snippet.options).map_err(encode_failed)?;
            let http = snippet
                .http
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(encode_failed)?;
            let created_at = Utc::now();

            let inserted = conn.execute(
                "INSERT OR IGNORE INTO snippets (slug, json, http, query, options, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.as_str(),
                    snippet.json,
                    http,
                    snippet.query,
                    options,
                    created_at.to_rfc3339(),
                ],
            )?;

            let stored = select(conn, id.as_str())?
                .ok_or_else(|| StoreError::Unavailable("snippet vanished after insert".into()))?;

            if inserted == 0 && !stored.has_content(&snippet) {
                return Err(StoreError::Collision(id));
            }
            Ok(stored)
        })
        .await
    }

    async fn get(&self, id: &SnippetId) -> Result<Option<Snippet>, StoreError> {
        let slug = id.as_str().to_string();
        self.with_conn(move |conn| select(conn, &slug)).await
    }
}
