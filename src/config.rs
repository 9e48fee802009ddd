//! Configuration management
//!
//! Manages service configuration: Firebase project settings, identity and
//! store backends, rewards, the avatar catalog and session tokens.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::catalog::Catalog;
use crate::identity::IdentityBackend;
use crate::session::Rewards;
use crate::store::{RetryPolicy, StoreBackend};

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "LEVELUP_CONFIG";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Firebase project settings
    #[serde(default)]
    pub firebase: FirebaseConfig,
    /// Identity provider selection
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Profile store selection
    #[serde(default)]
    pub store: StoreConfig,
    /// Rewards per completed task
    #[serde(default)]
    pub rewards: Rewards,
    /// Default avatars and shop items
    #[serde(default)]
    pub catalog: Catalog,
    /// JWT session settings
    #[serde(default)]
    pub auth: AuthConfig,
    /// HTTP listener
    #[serde(default)]
    pub server: ServerConfig,
}

/// Firebase project settings, as in the web app config snippet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirebaseConfig {
    /// Web API key is stored in keyring, this is just an override
    #[serde(skip)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub auth_domain: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default)]
    pub storage_bucket: String,
}

fn default_database_url() -> String {
    "https://your-project-default-rtdb.firebaseio.com/".to_string()
}

impl Default for FirebaseConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            auth_domain: String::new(),
            database_url: default_database_url(),
            storage_bucket: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_identity_backend")]
    pub backend: IdentityBackend,
    /// Account database for the local backend; defaults to `accounts.db` in
    /// the data directory
    #[serde(default)]
    pub accounts_path: Option<PathBuf>,
}

fn default_identity_backend() -> IdentityBackend {
    IdentityBackend::Local
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            backend: default_identity_backend(),
            accounts_path: None,
        }
    }
}

impl IdentityConfig {
    pub fn accounts_path(&self) -> Result<PathBuf> {
        match &self.accounts_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("accounts.db")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,
    /// SQLite file; defaults to `profiles.db` in the data directory
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,
    /// Save attempts before reporting the store unavailable
    #[serde(default = "default_save_attempts")]
    pub save_attempts: u32,
    /// Delay before the first retry (doubles each time)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::Sqlite
}

fn default_save_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    200
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            sqlite_path: None,
            save_attempts: default_save_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl StoreConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.save_attempts.max(1),
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub fn sqlite_path(&self) -> Result<PathBuf> {
        match &self.sqlite_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("profiles.db")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// JWT secret key (auto-generated if not set)
    pub jwt_secret: Option<String>,
    /// Access token expiration (minutes)
    #[serde(default = "default_token_expiry")]
    pub access_token_expiry_minutes: i64,
    /// Refresh token expiration (days)
    #[serde(default = "default_refresh_expiry")]
    pub refresh_token_expiry_days: i64,
    /// Maximum failed login attempts
    #[serde(default = "default_max_attempts")]
    pub max_login_attempts: u32,
    /// Lockout duration after failed attempts (minutes)
    #[serde(default = "default_lockout_duration")]
    pub lockout_duration_minutes: i64,
}

fn default_token_expiry() -> i64 {
    60
}

fn default_refresh_expiry() -> i64 {
    7
}

fn default_max_attempts() -> u32 {
    5
}

fn default_lockout_duration() -> i64 {
    30
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            access_token_expiry_minutes: default_token_expiry(),
            refresh_token_expiry_days: default_refresh_expiry(),
            max_login_attempts: default_max_attempts(),
            lockout_duration_minutes: default_lockout_duration(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Minutes before an unused session is dropped from memory
    #[serde(default = "default_session_idle_minutes")]
    pub session_idle_minutes: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_session_idle_minutes() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            session_idle_minutes: default_session_idle_minutes(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating it with defaults if missing
    pub fn load() -> Result<Self> {
        let config_path = config_path()?;

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            Self::from_toml(&contents)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings serde cannot express
    pub fn validate(&self) -> Result<()> {
        self.catalog.validate().context("Invalid [catalog] section")
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = config_path()?;
        let parent = config_path.parent()
            .context("Config path has no parent")?;

        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Generate and save JWT secret if not exists
    pub fn ensure_jwt_secret(&mut self) -> Result<String> {
        if let Some(secret) = &self.auth.jwt_secret {
            return Ok(secret.clone());
        }

        let secret = crate::server::auth::generate_jwt_secret();
        self.auth.jwt_secret = Some(secret.clone());
        self.save()?;
        Ok(secret)
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return Ok(PathBuf::from(path));
    }
    let base = directories::ProjectDirs::from("com", "levelup", "levelup")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}

/// Get the data directory path
pub fn data_dir() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "levelup", "levelup")
        .context("Failed to get project directories")?;
    Ok(base.data_dir().to_path_buf())
}

/// Show current configuration
pub fn show_config() -> Result<()> {
    let config = Config::load()?;

    println!("Configuration ({})", config_path()?.display());
    println!();
    println!("  Identity backend:  {:?}", config.identity.backend);
    if config.identity.backend == IdentityBackend::Local {
        println!("  Account file:      {}", config.identity.accounts_path()?.display());
    }
    println!("  Store backend:     {:?}", config.store.backend);
    if config.store.backend == StoreBackend::Sqlite {
        println!("  SQLite file:       {}", config.store.sqlite_path()?.display());
    }
    println!("  Database URL:      {}", config.firebase.database_url);
    println!("  Save attempts:     {} (backoff {} ms)", config.store.save_attempts, config.store.retry_backoff_ms);
    println!("  Rewards per task:  {} XP, {} coins", config.rewards.task_xp, config.rewards.task_coins);
    println!("  Default avatars:   {}", config.catalog.default_avatars.join(" "));
    println!("  Listen address:    {}:{}", config.server.host, config.server.port);

    println!();
    println!("Secrets:");
    for (kind, present) in crate::security::secret_status() {
        println!("  {:?}: {}", kind, if present { "configured" } else { "not configured" });
    }
    println!("  JWT secret: {}", config.auth.jwt_secret.as_ref().map(|_| "configured").unwrap_or("not configured"));

    Ok(())
}

/// Generate new JWT secret
pub fn rotate_jwt_secret() -> Result<()> {
    let mut config = Config::load()?;
    let new_secret = crate::server::auth::generate_jwt_secret();
    config.auth.jwt_secret = Some(new_secret);
    config.save()?;
    println!("JWT secret rotated. All existing tokens are now invalid.");
    Ok(())
}

/// Reset configuration to defaults
pub fn reset_config() -> Result<()> {
    let config = Config::default();
    config.save()?;
    println!("Configuration reset to defaults.");
    Ok(())
}

/// Get default configuration as TOML string
pub fn default_config_toml() -> String {
    let config = Config::default();
    toml::to_string_pretty(&config).unwrap_or_else(|_| "# Default configuration\n".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.identity.backend, IdentityBackend::Local);
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.rewards, Rewards::default());
        assert_eq!(config.catalog.shop.len(), 2);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_toml(
            r#"
            [identity]
            backend = "rest"

            [store]
            backend = "firebase"
            save_attempts = 5

            [rewards]
            task_coins = 25

            [[catalog.shop]]
            emoji = "🐉"
            price = 500
            "#,
        )
        .unwrap();

        assert_eq!(config.identity.backend, IdentityBackend::Rest);
        assert_eq!(config.store.backend, StoreBackend::Firebase);
        assert_eq!(config.store.retry_policy().attempts, 5);
        assert_eq!(config.rewards.task_xp, 50);
        assert_eq!(config.rewards.task_coins, 25);
        assert_eq!(config.catalog.shop.len(), 1);
        assert_eq!(config.catalog.default_avatars.len(), 5);
    }

    #[test]
    fn test_default_toml_round_trips() {
        let text = default_config_toml();
        let config = Config::from_toml(&text).unwrap();
        assert_eq!(config.store.save_attempts, 3);
        assert_eq!(config.catalog.first_default(), "🐱");
    }

    #[test]
    fn test_empty_default_avatars_rejected() {
        let err = Config::from_toml("[catalog]\ndefault_avatars = []\n").unwrap_err();
        assert!(format!("{:#}", err).contains("default_avatars"));

        let overlapping = r#"
            [[catalog.shop]]
            emoji = "🐱"
            price = 10
        "#;
        assert!(Config::from_toml(overlapping).is_err());
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let store = StoreConfig { save_attempts: 0, ..StoreConfig::default() };
        assert_eq!(store.retry_policy().attempts, 1);
    }
}
