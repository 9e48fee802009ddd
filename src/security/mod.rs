//! Secrets for the hosted backends
//!
//! The Firebase web API key and the Realtime Database secret are read from
//! the environment, the OS keyring, or a private fallback file.

pub mod keyring;

use anyhow::Result;

pub use keyring::SecretKind;

/// Store the Firebase web API key
pub fn set_api_key(key: &str) -> Result<()> {
    keyring::set_secret(SecretKind::ApiKey, key)
}

/// Get the Firebase web API key
pub fn get_api_key() -> Result<String> {
    keyring::get_secret(SecretKind::ApiKey)
}

/// Delete the Firebase web API key
pub fn delete_api_key() -> Result<()> {
    keyring::delete_secret(SecretKind::ApiKey)
}

/// Store the Realtime Database secret
pub fn set_database_secret(secret: &str) -> Result<()> {
    keyring::set_secret(SecretKind::DatabaseSecret, secret)
}

/// Get the Realtime Database secret
pub fn get_database_secret() -> Result<String> {
    keyring::get_secret(SecretKind::DatabaseSecret)
}

/// Delete the Realtime Database secret
pub fn delete_database_secret() -> Result<()> {
    keyring::delete_secret(SecretKind::DatabaseSecret)
}

/// Whether each secret is configured, for status output
pub fn secret_status() -> [(SecretKind, bool); 2] {
    [
        (SecretKind::ApiKey, keyring::has_secret(SecretKind::ApiKey)),
        (SecretKind::DatabaseSecret, keyring::has_secret(SecretKind::DatabaseSecret)),
    ]
}
