//! Keyring integration for Firebase secrets
//! Falls back to file storage if keyring is unavailable

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

const SERVICE_NAME: &str = "levelup";

/// A secret the service needs at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    /// Firebase web API key (identity toolkit)
    ApiKey,
    /// Realtime Database secret (profile store)
    DatabaseSecret,
}

impl SecretKind {
    fn username(&self) -> &'static str {
        match self {
            SecretKind::ApiKey => "firebase-api-key",
            SecretKind::DatabaseSecret => "firebase-database-secret",
        }
    }

    fn file_name(&self) -> &'static str {
        match self {
            SecretKind::ApiKey => "firebase_api_key.txt",
            SecretKind::DatabaseSecret => "database_secret.txt",
        }
    }

    /// Environment variable that overrides the stored value
    pub fn env_var(&self) -> &'static str {
        match self {
            SecretKind::ApiKey => "LEVELUP_FIREBASE_API_KEY",
            SecretKind::DatabaseSecret => "LEVELUP_DATABASE_SECRET",
        }
    }

    fn cli_flag(&self) -> &'static str {
        match self {
            SecretKind::ApiKey => "--set-api-key",
            SecretKind::DatabaseSecret => "--set-database-secret",
        }
    }
}

/// Get the path for a fallback secret file
fn secret_file_path(kind: SecretKind) -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "levelup", "levelup")
        .context("Failed to get project directories")?;
    let dir = base.config_dir();
    fs::create_dir_all(dir).context("Failed to create config directory")?;
    Ok(dir.join(kind.file_name()))
}

/// Store a secret - tries keyring first, falls back to file
pub fn set_secret(kind: SecretKind, value: &str) -> Result<()> {
    if let Ok(entry) = keyring::Entry::new(SERVICE_NAME, kind.username()) {
        if entry.set_password(value).is_ok() {
            // Also save to file as backup in case keyring retrieval fails
            let _ = save_to_file(kind, value);
            return Ok(());
        }
    }

    save_to_file(kind, value)?;
    println!("Note: Using file-based storage (keyring unavailable)");
    Ok(())
}

fn save_to_file(kind: SecretKind, value: &str) -> Result<()> {
    let path = secret_file_path(kind)?;
    fs::write(&path, value).context("Failed to write secret file")?;

    // Set restrictive permissions on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))
            .context("Failed to set file permissions")?;
    }

    Ok(())
}

/// Get a secret - environment first, then keyring, then file
pub fn get_secret(kind: SecretKind) -> Result<String> {
    if let Ok(value) = std::env::var(kind.env_var()) {
        if !value.trim().is_empty() {
            return Ok(value.trim().to_string());
        }
    }

    if let Ok(entry) = keyring::Entry::new(SERVICE_NAME, kind.username()) {
        if let Ok(value) = entry.get_password() {
            return Ok(value);
        }
    }

    let path = secret_file_path(kind)?;
    let value = fs::read_to_string(&path).with_context(|| {
        format!(
            "Failed to read {}. Set {} or run 'levelup config {} VALUE' first.",
            kind.username(),
            kind.env_var(),
            kind.cli_flag()
        )
    })?;
    Ok(value.trim().to_string())
}

/// Delete a secret from both keyring and file
pub fn delete_secret(kind: SecretKind) -> Result<()> {
    if let Ok(entry) = keyring::Entry::new(SERVICE_NAME, kind.username()) {
        let _ = entry.delete_credential();
    }

    let path = secret_file_path(kind)?;
    if path.exists() {
        fs::remove_file(&path).context("Failed to delete secret file")?;
    }

    Ok(())
}

/// Check if a secret is available from any source
pub fn has_secret(kind: SecretKind) -> bool {
    get_secret(kind).map(|v| !v.is_empty()).unwrap_or(false)
}
