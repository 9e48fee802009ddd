//! SQLite-based profile storage for single-machine deployments

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{ProfileStore, StoreError};
use crate::types::Profile;

/// SQLite-backed profile store, one JSON document per user
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`
    pub async fn new<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a private in-memory database
    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                user_id TEXT PRIMARY KEY,
                document TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
    }

    /// Number of stored profiles
    pub async fn count(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))
            .map_err(unavailable)?;
        Ok(count as usize)
    }
}

fn unavailable(e: rusqlite::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[async_trait::async_trait]
impl ProfileStore for SqliteStore {
    async fn load(&self, user_id: &str) -> Result<Profile, StoreError> {
        let conn = self.conn.lock().await;

        let document: Option<String> = conn
            .query_row(
                "SELECT document FROM profiles WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(unavailable)?;

        let Some(document) = document else {
            debug!("No stored profile for {}", user_id);
            return Ok(Profile::default());
        };

        match serde_json::from_str(&document) {
            Ok(value) => Ok(Profile::from_document(value)),
            Err(e) => {
                warn!("Stored profile for {} is not valid JSON ({}), using defaults", user_id, e);
                Ok(Profile::default())
            }
        }
    }

    async fn save(&self, user_id: &str, profile: &Profile) -> Result<(), StoreError> {
        let document = serde_json::to_string(profile)?;
        let conn = self.conn.lock().await;

        conn.execute(
            r#"INSERT OR REPLACE INTO profiles (user_id, document, updated_at)
               VALUES (?1, ?2, ?3)"#,
            params![user_id, document, Utc::now().to_rfc3339()],
        )
        .map_err(unavailable)?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
