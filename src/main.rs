//! LevelUp Life - habit and goal tracker
//!
//! Serves the gamified profile API and a few maintenance commands.

use levelup::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Rustls 0.23+ needs a process-wide crypto provider for HTTPS; a second
    // install attempt fails harmlessly
    let _ = rustls::crypto::ring::default_provider().install_default();

    // Initialize logging (WARN level by default, use RUST_LOG=info for debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into())
        )
        .init();

    cli::run().await
}
