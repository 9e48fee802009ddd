//! CLI interface for levelup

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::progression;
use crate::stats::{self, ProgressSummary};

#[derive(Parser)]
#[command(name = "levelup")]
#[command(about = "LevelUp Life: habits and goals as XP, levels, streaks and coins", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server
    Serve {
        /// Port to listen on (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,
        /// Host to bind to (defaults to the configured host)
        #[arg(long)]
        host: Option<String>,
        /// Enable HTTPS
        #[arg(long)]
        https: bool,
        /// Path to SSL certificate
        #[arg(long, requires = "https")]
        cert: Option<String>,
        /// Path to SSL private key
        #[arg(long, requires = "https")]
        key: Option<String>,
    },
    /// Configure the service
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
        /// Reset configuration to defaults
        #[arg(long)]
        reset: bool,
        /// Store the Firebase web API key
        #[arg(long)]
        set_api_key: Option<String>,
        /// Store the Realtime Database secret
        #[arg(long)]
        set_database_secret: Option<String>,
        /// Remove the stored Firebase web API key
        #[arg(long)]
        delete_api_key: bool,
        /// Remove the stored Realtime Database secret
        #[arg(long)]
        delete_database_secret: bool,
        /// Generate a new JWT secret, invalidating issued tokens
        #[arg(long)]
        rotate_jwt_secret: bool,
    },
    /// Print the XP needed for each level
    Levels {
        /// Last level to show
        #[arg(long, default_value = "10")]
        up_to: u32,
    },
    /// List the avatar shop
    Shop,
    /// Show a stored profile
    Profile {
        /// User ID as issued by the identity provider
        user_id: String,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, host, https, cert, key } => {
            let config = Config::load()?;
            let host = host.unwrap_or(config.server.host);
            let port = port.unwrap_or(config.server.port);

            println!("Starting web server on {}:{}", host, port);
            if https {
                if let Some(ref cert_path) = cert {
                    println!("  Certificate: {}", cert_path);
                }
                if let Some(ref key_path) = key {
                    println!("  Private key: {}", key_path);
                }
            }

            crate::server::start(&host, port, https, cert, key).await?;
        }
        Commands::Config {
            show,
            reset,
            set_api_key,
            set_database_secret,
            delete_api_key,
            delete_database_secret,
            rotate_jwt_secret,
        } => {
            if let Some(key) = set_api_key {
                crate::security::set_api_key(&key)?;
                println!("Firebase API key stored securely in keyring.");
            } else if let Some(secret) = set_database_secret {
                crate::security::set_database_secret(&secret)?;
                println!("Database secret stored securely in keyring.");
            } else if delete_api_key {
                crate::security::delete_api_key()?;
                println!("Firebase API key removed.");
            } else if delete_database_secret {
                crate::security::delete_database_secret()?;
                println!("Database secret removed.");
            } else if rotate_jwt_secret {
                crate::config::rotate_jwt_secret()?;
            } else if reset {
                crate::config::reset_config()?;
            } else if show {
                crate::config::show_config()?;
            } else {
                println!("Config file: {}", crate::config::config_path()?.display());
                println!();
                println!("{}", crate::config::default_config_toml());
                println!("Use --show for the active configuration.");
            }
        }
        Commands::Levels { up_to } => {
            println!("{:>6}  {:>10}  {:>12}", "Level", "XP needed", "Total XP");
            for row in progression::level_table(up_to) {
                println!("{:>6}  {:>10}  {:>12}", row.level, row.threshold, row.cumulative);
            }
        }
        Commands::Shop => {
            let config = Config::load()?;
            println!("Default avatars: {}", config.catalog.default_avatars.join(" "));
            println!();
            println!("Shop:");
            for item in &config.catalog.shop {
                println!("  {}  {} coins", item.emoji, item.price);
            }
        }
        Commands::Profile { user_id } => {
            let config = Config::load()?;
            let store = crate::store::from_config(&config).await?;
            let mut profile = store.load(&user_id).await?;
            profile.repair(&config.catalog);
            print_profile(&user_id, &profile);
        }
    }

    Ok(())
}

fn print_profile(user_id: &str, profile: &crate::types::Profile) {
    let summary = ProgressSummary::of(profile);

    println!("{} {}", summary.avatar, user_id);
    println!(
        "  Level {}  ({} / {} XP, {:.0}%)",
        summary.level,
        summary.xp,
        summary.xp_to_next_level,
        summary.progress * 100.0
    );
    println!("  Coins: {}", summary.coins);
    println!("  Streak: {} day(s)", summary.streak);
    if let Some(date) = profile.last_task_date {
        println!("  Last completion: {}", date);
    }

    println!();
    println!("Tasks ({} open, {} done):", summary.open_tasks, summary.completed_tasks);
    for (index, task) in profile.tasks.iter().enumerate() {
        let mark = if task.completed { "✓" } else { " " };
        println!("  [{}] {:>2}. {} ({})", mark, index, task.title, task.kind);
    }

    if !profile.purchased_avatars.is_empty() {
        let owned: Vec<&str> = profile.purchased_avatars.iter().map(String::as_str).collect();
        println!();
        println!("Owned avatars: {}", owned.join(" "));
    }

    println!();
    println!("Completions by weekday:");
    for day in stats::weekly_completions(&profile.history) {
        println!("  {:<9} {}", day.day, "█".repeat(day.completions));
    }
}
