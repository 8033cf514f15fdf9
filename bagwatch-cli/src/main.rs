// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! bagwatch CLI - watch marketplace favourites from the command line.
//!
//! # Examples
//!
//! ```bash
//! # Log in (confirmation link by email)
//! bagwatch --user alice set-email alice@example.com
//! bagwatch --user alice login
//!
//! # Watch an item and every favourite
//! bagwatch --user alice target add 1170509
//! bagwatch --user alice target add '*'
//!
//! # What would match right now
//! bagwatch --user alice matches
//!
//! # Poll in the foreground, or every watching user in the background
//! bagwatch --user alice watch --interval 30
//! bagwatch daemon
//!
//! # Stop a user polled by the daemon
//! bagwatch --user alice stop
//! ```

mod commands;
mod console;
mod output;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use bagwatch_store::{AppSettings, default_config_dir};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{account, orders, targets, watch};

// ============================================================================
// CLI Definition
// ============================================================================

/// bagwatch - alerts for surplus-food bags in your favourites.
#[derive(Parser)]
#[command(name = "bagwatch")]
#[command(about = "Watches marketplace favourites and alerts on new availability")]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Config directory.
    #[arg(long, global = true, env = "BAGWATCH_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// User to act on.
    #[arg(long, short, global = true, env = "BAGWATCH_USER", default_value = "default")]
    pub user: String,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Verbose output (debug logging).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,
}

impl Cli {
    /// Config directory in effect.
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir.clone().unwrap_or_else(default_config_dir)
    }

    /// Loads the process settings from the config directory.
    pub async fn settings(&self) -> Result<AppSettings> {
        let dir = self.config_dir();
        AppSettings::load(&dir)
            .await
            .with_context(|| format!("loading settings from {}", dir.display()))
    }
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// List known users.
    Users,

    /// Set the login email of the user.
    SetEmail {
        /// Email address.
        email: String,
    },

    /// Log in by email confirmation link, or by PIN.
    Login(account::LoginArgs),

    /// Rotate the session tokens.
    Refresh,

    /// Log out and forget the session.
    Logout,

    /// Manage watched items.
    #[command(visible_alias = "t")]
    Target(targets::TargetArgs),

    /// Show what currently matches, without notifying.
    #[command(visible_alias = "m")]
    Matches,

    /// Poll the user's favourites in the foreground.
    #[command(visible_alias = "w")]
    Watch(watch::WatchArgs),

    /// Poll every watching user until interrupted.
    Daemon,

    /// Stop watching the user's favourites.
    Stop,

    /// Announce already-notified items again.
    ClearHistory,

    /// Supply the cookie obtained by solving a challenge.
    Cookie {
        /// Cookie header value.
        cookie: String,
    },

    /// List and manage active orders.
    Orders(orders::OrdersArgs),

    /// Show the common errors reference.
    Errors,

    /// Show the user's session and watch state.
    #[command(visible_alias = "s")]
    Status,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug,hyper=info,reqwest=info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match &cli.command {
        Commands::Users => account::users(&cli).await,
        Commands::SetEmail { email } => account::set_email(email, &cli).await,
        Commands::Login(args) => account::login(args, &cli).await,
        Commands::Refresh => account::refresh(&cli).await,
        Commands::Logout => account::logout(&cli).await,
        Commands::Target(args) => targets::run(args, &cli).await,
        Commands::Matches => watch::matches(&cli).await,
        Commands::Watch(args) => watch::run(args, &cli).await,
        Commands::Daemon => watch::daemon(&cli).await,
        Commands::Stop => watch::stop(&cli).await,
        Commands::ClearHistory => watch::clear_history(&cli).await,
        Commands::Cookie { cookie } => account::cookie(cookie, &cli).await,
        Commands::Orders(args) => orders::run(args, &cli).await,
        Commands::Errors => {
            println!("{}", bagwatch_watch::COMMON_ERRORS);
            Ok(())
        }
        Commands::Status => account::status(&cli).await,
    }
}
