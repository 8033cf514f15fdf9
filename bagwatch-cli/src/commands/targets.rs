//! Target command - manage watched items.

use anyhow::{Context as _, Result};
use bagwatch_watch::TargetChange;
use clap::{Args, Subcommand};

use super::{emit, open_store, registry};
use crate::Cli;

/// Arguments for the target command.
#[derive(Args)]
pub struct TargetArgs {
    #[command(subcommand)]
    pub action: TargetAction,
}

/// Target subcommands.
#[derive(Subcommand)]
pub enum TargetAction {
    /// Watch an item (`*` for every favourite). A quantity of 0 removes it.
    Add {
        /// Item id, or `*`.
        item_id: String,
        /// Quantity wanted.
        #[arg(default_value = "1")]
        quantity: u32,
    },

    /// Stop watching an item.
    #[command(visible_alias = "rm")]
    Remove {
        /// Item id, or `*`.
        item_id: String,
    },

    /// List watched items.
    #[command(visible_alias = "ls")]
    List,
}

/// Runs the target command.
pub async fn run(args: &TargetArgs, cli: &Cli) -> Result<()> {
    match &args.action {
        TargetAction::Add { item_id, quantity } => {
            let change = registry(cli)
                .await?
                .add_target(&cli.user, item_id, *quantity)
                .await
                .with_context(|| format!("adding target {item_id}"))?;
            print_change(&change);
            Ok(())
        }
        TargetAction::Remove { item_id } => {
            let change = registry(cli).await?.remove_target(&cli.user, item_id).await?;
            print_change(&change);
            Ok(())
        }
        TargetAction::List => {
            let store = open_store(cli).await?;
            let targets = &store.config().targets;
            emit(cli, |t| t.format_targets(targets), |j| j.format_targets(targets))
        }
    }
}

fn print_change(change: &TargetChange) {
    match change {
        TargetChange::Added(t) if t.is_wildcard() => {
            println!("➕ Watching all favourites (x{}).", t.quantity);
        }
        TargetChange::Added(t) => println!("➕ Watching {} (x{}).", t.display_name, t.quantity),
        TargetChange::Removed(t) => println!("➖ No longer watching {}.", t.display_name),
        TargetChange::NotTargeted(id) => println!("{id} was not being watched."),
    }
}
