//! Self-hosted identity provider
//!
//! Accounts live in a SQLite table with salted SHA-256 password hashes, so
//! they survive a restart alongside the profiles. User ids are random and
//! never derived from the email. Rejection reasons use the same codes as the
//! hosted Identity Toolkit.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::info;

use super::{AuthError, IdentityProvider, SignedIn, SignedUp};

const MIN_PASSWORD_LEN: usize = 6;

pub struct LocalIdentity {
    conn: Arc<Mutex<Connection>>,
}

impl LocalIdentity {
    /// Open (or create) the account database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create account directory")?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open account database {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init_schema(&conn)?;
        info!("Local accounts stored in {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Accounts that vanish with the process
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
            CREATE TABLE IF NOT EXISTS accounts (
                email TEXT PRIMARY KEY,
                user_id TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
    }

    pub async fn account_count(&self) -> usize {
        let conn = self.conn.lock().await;
        conn.query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
            .unwrap_or(0)
    }
}

fn storage_error(e: rusqlite::Error) -> AuthError {
    AuthError::Transport(format!("account database: {}", e))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn random_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    BASE64.encode(bytes)
}

fn new_user_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Hash a password with a random salt, as `salt$hash`
pub fn hash_password(password: &str) -> String {
    let salt: [u8; 16] = rand::rng().random();
    let salt_b64 = BASE64.encode(salt);
    let hash = Sha256::digest(format!("{}{}", password, salt_b64).as_bytes());
    format!("{}${}", salt_b64, BASE64.encode(hash))
}

/// Check a password against a `salt$hash` string
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_b64, hash_b64)) = stored.split_once('$') else {
        return false;
    };
    let computed = Sha256::digest(format!("{}{}", password, salt_b64).as_bytes());
    BASE64.encode(computed) == hash_b64
}

#[async_trait::async_trait]
impl IdentityProvider for LocalIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, AuthError> {
        let conn = self.conn.lock().await;

        let account: Option<(String, String)> = conn
            .query_row(
                "SELECT user_id, password_hash FROM accounts WHERE email = ?1",
                params![normalize_email(email)],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(storage_error)?;

        match account {
            Some((user_id, hash)) if verify_password(password, &hash) => Ok(SignedIn {
                user_id,
                session_token: random_token(),
            }),
            _ => Err(AuthError::Rejected("INVALID_LOGIN_CREDENTIALS".to_string())),
        }
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignedUp, AuthError> {
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(AuthError::Rejected("INVALID_EMAIL".to_string()));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::Rejected("WEAK_PASSWORD".to_string()));
        }

        let conn = self.conn.lock().await;
        let exists: Option<String> = conn
            .query_row(
                "SELECT user_id FROM accounts WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )
            .optional()
            .map_err(storage_error)?;
        if exists.is_some() {
            return Err(AuthError::Rejected("EMAIL_EXISTS".to_string()));
        }

        let user_id = new_user_id();
        conn.execute(
            "INSERT INTO accounts (email, user_id, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![email, user_id, hash_password(password), Utc::now().to_rfc3339()],
        )
        .map_err(storage_error)?;

        Ok(SignedUp { user_id })
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, ProfileStore};
    use crate::types::Profile;
    use tempfile::tempdir;

    fn identity() -> LocalIdentity {
        LocalIdentity::in_memory().unwrap()
    }

    #[test]
    fn test_password_hashing() {
        let hash = hash_password("my_secure_password");
        assert!(verify_password("my_secure_password", &hash));
        assert!(!verify_password("wrong_password", &hash));
        assert!(!verify_password("my_secure_password", "no-separator"));
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let identity = identity();
        let signed_up = identity.sign_up("Ada@Example.com", "hunter22").await.unwrap();
        let signed_in = identity.sign_in("ada@example.com ", "hunter22").await.unwrap();

        assert_eq!(signed_in.user_id, signed_up.user_id);
        assert_eq!(signed_up.user_id.len(), 32);
        assert!(!signed_in.session_token.is_empty());
    }

    #[tokio::test]
    async fn test_same_email_elsewhere_gets_a_new_id() {
        let store = MemoryStore::new();

        let first = identity().sign_up("ada@example.com", "hunter22").await.unwrap();
        store
            .save(&first.user_id, &Profile { coins: 999, ..Profile::default() })
            .await
            .unwrap();

        let second = identity().sign_up("ada@example.com", "other-pass").await.unwrap();
        assert_ne!(first.user_id, second.user_id);
        assert_eq!(store.load(&second.user_id).await.unwrap().coins, 0);
    }

    #[tokio::test]
    async fn test_accounts_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("accounts.db");

        let signed_up = LocalIdentity::open(&path)
            .unwrap()
            .sign_up("ada@example.com", "hunter22")
            .await
            .unwrap();

        let reopened = LocalIdentity::open(&path).unwrap();
        let err = reopened.sign_up("ada@example.com", "other-pass").await.unwrap_err();
        assert!(matches!(err, AuthError::Rejected(ref code) if code == "EMAIL_EXISTS"));
        assert!(reopened.sign_in("ada@example.com", "other-pass").await.is_err());

        let signed_in = reopened.sign_in("ada@example.com", "hunter22").await.unwrap();
        assert_eq!(signed_in.user_id, signed_up.user_id);
    }

    #[tokio::test]
    async fn test_duplicate_registration() {
        let identity = identity();
        identity.sign_up("ada@example.com", "hunter22").await.unwrap();
        let err = identity.sign_up("ADA@example.com", "other-pass").await.unwrap_err();
        assert!(matches!(err, AuthError::Rejected(ref code) if code == "EMAIL_EXISTS"));
        assert_eq!(identity.account_count().await, 1);
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let identity = identity();
        identity.sign_up("ada@example.com", "hunter22").await.unwrap();
        assert!(identity.sign_in("ada@example.com", "hunter23").await.is_err());
        assert!(identity.sign_in("bob@example.com", "hunter22").await.is_err());
    }

    #[tokio::test]
    async fn test_sign_up_validation() {
        let identity = identity();
        assert!(identity.sign_up("not-an-email", "hunter22").await.is_err());
        assert!(identity.sign_up("ada@example.com", "123").await.is_err());
        assert_eq!(identity.account_count().await, 0);
    }
}
