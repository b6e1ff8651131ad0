//! Shared snippet persistence.
//!
//! # Data Flow
//! ```text
//! POST /s
//!     → NewSnippet (validated, options normalized)
//!     → SnippetId::derive (content hash)
//!     → SnippetStore::insert (memory.rs | sqlite.rs)
//!
//! GET /s/{id}
//!     → SnippetId::parse
//!     → SnippetStore::get
//! ```
//!
//! # Design Decisions
//! - Snippets are immutable; the store never updates or deletes them
//! - Identifiers are derived from content, so identical submissions share an
//!   identifier and different content under one identifier is a collision
//! - The backend is chosen by connection string at startup

pub mod memory;
pub mod sqlite;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::engine::JqOption;
use crate::fetch::HttpSource;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Identifier length before trailing-underscore extension.
const ID_LEN: usize = 15;
const MAX_ID_LEN: usize = 64;

/// Opaque, URL-safe snippet identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnippetId(String);

impl SnippetId {
    /// Derive the identifier for a snippet from its content.
    ///
    /// Every field is hashed with a tag, a presence byte and a length prefix,
    /// so distinct snippets never feed the hasher the same bytes.
    pub fn derive(snippet: &NewSnippet) -> Self {
        let mut hasher = Sha256::new();
        hash_field(&mut hasher, b'j', snippet.json.as_deref());
        match &snippet.http {
            Some(http) => {
                hasher.update([b'h', 1]);
                hash_field(&mut hasher, b'm', Some(http.method.as_str()));
                hash_field(&mut hasher, b'u', Some(http.url.as_str()));
                hash_field(&mut hasher, b'H', http.headers.as_deref());
                hash_field(&mut hasher, b'b', http.body.as_deref());
            }
            None => hasher.update([b'h', 0]),
        }
        hash_field(&mut hasher, b'q', Some(snippet.query.as_str()));
        let mut flags: Vec<&str> = snippet.options.iter().map(JqOption::as_flag).collect();
        flags.sort_unstable();
        hash_field(&mut hasher, b'o', Some(flags.join(",").as_str()));

        let encoded = URL_SAFE_NO_PAD.encode(hasher.finalize());
        let bytes = encoded.as_bytes();

        // Identifiers never end in `_`.
        let mut len = ID_LEN;
        while len <= bytes.len() && bytes[len - 1] == b'_' {
            len += 1;
        }
        let len = len.min(bytes.len());
        Self(encoded[..len].to_string())
    }

    /// Accept an identifier from a client, rejecting anything that could not
    /// have been issued.
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_ID_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        valid.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn hash_field(hasher: &mut Sha256, tag: u8, value: Option<&str>) {
    match value {
        Some(value) => {
            hasher.update([tag, 1]);
            hasher.update((value.len() as u64).to_be_bytes());
            hasher.update(value.as_bytes());
        }
        None => hasher.update([tag, 0]),
    }
}

impl fmt::Display for SnippetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content of a snippet about to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSnippet {
    pub query: String,
    pub json: Option<String>,
    pub http: Option<HttpSource>,
    pub options: Vec<JqOption>,
}

impl NewSnippet {
    /// Options are kept sorted and deduplicated so equal content compares equal.
    pub fn new(
        query: String,
        json: Option<String>,
        http: Option<HttpSource>,
        mut options: Vec<JqOption>,
    ) -> Self {
        options.sort_unstable();
        options.dedup();
        Self {
            query,
            json,
            http,
            options,
        }
    }
}

/// A stored snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snippet {
    pub id: SnippetId,
    pub query: String,
    pub json: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpSource>,
    pub options: Vec<JqOption>,
    pub created_at: DateTime<Utc>,
}

impl Snippet {
    fn from_new(id: SnippetId, new: NewSnippet, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            query: new.query,
            json: new.json,
            http: new.http,
            options: new.options,
            created_at,
        }
    }

    /// Whether this snippet holds exactly the given content.
    pub fn has_content(&self, new: &NewSnippet) -> bool {
        self.query == new.query
            && self.json == new.json
            && self.http == new.http
            && self.options == new.options
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unsupported store connection string `{0}`")]
    UnsupportedUrl(String),

    #[error("identifier `{0}` already holds different content")]
    Collision(SnippetId),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("stored snippet `{id}` is corrupt: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Key-addressed snippet persistence.
#[async_trait]
pub trait SnippetStore: Send + Sync {
    /// Store `snippet` under `id`. Storing identical content again returns the
    /// existing record; different content under a taken `id` is a collision.
    async fn insert(&self, id: SnippetId, snippet: NewSnippet) -> Result<Snippet, StoreError>;

    async fn get(&self, id: &SnippetId) -> Result<Option<Snippet>, StoreError>;
}

/// Open the store named by a connection string.
///
/// Supported forms: `memory:`, `sqlite:<path>`, `sqlite://<path>`,
/// `sqlite::memory:`.
pub async fn connect(database_url: &str) -> Result<Arc<dyn SnippetStore>, StoreError> {
    let parsed = url::Url::parse(database_url)
        .map_err(|e| StoreError::UnsupportedUrl(format!("{}: {}", database_url, e)))?;

    match parsed.scheme() {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        "sqlite" => {
            let rest = &database_url[parsed.scheme().len() + 1..];
            let path = rest.strip_prefix("//").unwrap_or(rest);
            if path.is_empty() {
                return Err(StoreError::UnsupportedUrl(database_url.to_string()));
            }
            Ok(Arc::new(SqliteStore::open(path).await?))
        }
        _ => Err(StoreError::UnsupportedUrl(database_url.to_string())),
    }
}
