//! CLI command implementations.

pub mod account;
pub mod orders;
pub mod targets;
pub mod watch;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use bagwatch_core::Notifier;
use bagwatch_market::Account;
use bagwatch_store::{AppSettings, UserStore};
use bagwatch_watch::WatchRegistry;

use crate::console::ConsoleNotifier;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Opens the selected user's config, creating it on first use.
pub async fn open_store(cli: &Cli) -> Result<UserStore> {
    UserStore::open(&cli.config_dir(), &cli.user)
        .await
        .with_context(|| format!("opening config of user {}", cli.user))
}

/// Opens the selected user's account.
pub async fn open_account(cli: &Cli) -> Result<(Account, AppSettings)> {
    let settings = cli.settings().await?;
    let store = open_store(cli).await?;
    let account = Account::new(store, &settings).context("building HTTP client")?;
    Ok((account, settings))
}

/// Notifier that prints to this terminal.
pub fn console(cli: &Cli) -> Arc<dyn Notifier> {
    Arc::new(ConsoleNotifier::new(!cli.no_color))
}

/// Registry over the config directory.
pub async fn registry(cli: &Cli) -> Result<Arc<WatchRegistry>> {
    let settings = cli.settings().await?;
    Ok(Arc::new(WatchRegistry::new(cli.config_dir(), settings, console(cli))))
}

/// Prints either the text or the JSON rendering, as selected.
pub fn emit(
    cli: &Cli,
    text: impl FnOnce(&TextFormatter) -> String,
    json: impl FnOnce(&JsonFormatter) -> Result<String>,
) -> Result<()> {
    match cli.format {
        OutputFormat::Text => println!("{}", text(&TextFormatter::new(!cli.no_color))),
        OutputFormat::Json => println!("{}", json(&JsonFormatter::new(cli.pretty))?),
    }
    Ok(())
}
