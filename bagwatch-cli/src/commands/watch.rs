//! Polling commands: dry-run matches, foreground watch, daemon, stop.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use bagwatch_market::MatchEngine;
use bagwatch_store::{MAX_WATCH_INTERVAL, watch_interval_from_secs};
use bagwatch_watch::{StartOutcome, Supervisor};
use clap::Args;
use tracing::info;

use super::{emit, open_account, registry};
use crate::Cli;

/// Arguments for watch command.
#[derive(Args)]
pub struct WatchArgs {
    /// Polling interval in seconds (defaults to the saved or configured one).
    #[arg(long, short)]
    pub interval: Option<f64>,
}

/// Lists current matches, sold-out targets included, without notifying.
pub async fn matches(cli: &Cli) -> Result<()> {
    let (mut account, settings) = open_account(cli).await?;
    let targets = account.store().config().targets.clone();
    if targets.is_empty() {
        println!("No targets. Add one with `bagwatch target add <item_id>`.");
        return Ok(());
    }
    let engine = MatchEngine::new(settings.page_size, settings.max_pages);
    let report = engine
        .get_matches(&mut account, &targets, 0)
        .await
        .context("fetching favourites")?;
    emit(cli, |t| t.format_report(&report), |j| j.format_report(&report))
}

async fn wait_for_ctrl_c() -> Result<()> {
    tokio::signal::ctrl_c().await.context("installing Ctrl+C handler")
}

/// Polls one user in the foreground. Ctrl+C stops the watch.
pub async fn run(args: &WatchArgs, cli: &Cli) -> Result<()> {
    let interval = args
        .interval
        .map(|secs| {
            watch_interval_from_secs(secs).with_context(|| {
                format!(
                    "Invalid interval: {secs} (expected 0 to {} seconds)",
                    MAX_WATCH_INTERVAL.as_secs()
                )
            })
        })
        .transpose()?;

    let registry = registry(cli).await?;
    let outcome = registry.start(&cli.user, interval).await?;
    let status = registry.status(&cli.user).await?;
    println!(
        "🔄 Refreshing the favourites every {:.0} seconds. Press Ctrl+C to stop.",
        status.interval.as_secs_f64()
    );
    if outcome == StartOutcome::AlreadyRunning {
        info!(user = %cli.user, "Watch already running");
    }

    wait_for_ctrl_c().await?;
    registry.stop(&cli.user).await?;
    Ok(())
}

/// Polls every watching user until Ctrl+C. Users stay marked as watching.
pub async fn daemon(cli: &Cli) -> Result<()> {
    let registry = registry(cli).await?;
    let loaded = registry.load_all().await?;
    let started = registry.resurrect_dead().await;
    info!(users = loaded.len(), watching = started.len(), "Daemon started");
    println!(
        "Watching {} of {} user(s). Press Ctrl+C to stop.",
        started.len(),
        loaded.len()
    );

    let period = registry.settings().supervisor_interval();
    let supervisor = Supervisor::new(Arc::clone(&registry), period).spawn();

    wait_for_ctrl_c().await?;
    info!("Shutting down");
    registry.shutdown().await;
    supervisor.await.context("joining supervisor")?;
    Ok(())
}

/// Stops the user's watch. A daemon polling the user stops at its next tick.
pub async fn stop(cli: &Cli) -> Result<()> {
    let registry = registry(cli).await?;
    registry.register(&cli.user).await?;
    registry.stop(&cli.user).await?;
    Ok(())
}

/// Forgets which items were already announced, so they are announced again.
pub async fn clear_history(cli: &Cli) -> Result<()> {
    registry(cli).await?.clear_history(&cli.user).await?;
    println!("🧹 History cleared for {}.", cli.user);
    Ok(())
}
