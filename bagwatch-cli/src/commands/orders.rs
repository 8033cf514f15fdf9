//! Orders command - list, cancel, and share active orders.

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};

use super::{emit, open_account};
use crate::Cli;

/// Arguments for the orders command.
#[derive(Args)]
pub struct OrdersArgs {
    #[command(subcommand)]
    pub action: Option<OrdersAction>,
}

/// Orders subcommands.
#[derive(Subcommand)]
pub enum OrdersAction {
    /// List active orders (default).
    List,

    /// Cancel an order.
    Abort {
        /// Order id.
        order_id: String,
        /// Cancel reason code.
        #[arg(long)]
        reason: Option<u32>,
    },

    /// Create a pickup invitation link for an order.
    Invite {
        /// Order id.
        order_id: String,
    },

    /// Disable a pickup invitation.
    Uninvite {
        /// Invitation id.
        invitation_id: String,
    },
}

/// Runs the orders command.
pub async fn run(args: &OrdersArgs, cli: &Cli) -> Result<()> {
    let (mut account, _settings) = open_account(cli).await?;
    match args.action.as_ref().unwrap_or(&OrdersAction::List) {
        OrdersAction::List => {
            let orders = account.active_orders().await.context("listing orders")?;
            emit(cli, |t| t.format_orders(&orders), |j| j.format_orders(&orders))
        }
        OrdersAction::Abort { order_id, reason } => {
            account
                .abort_order(order_id, *reason)
                .await
                .with_context(|| format!("aborting order {order_id}"))?;
            println!("Order {order_id} cancelled.");
            Ok(())
        }
        OrdersAction::Invite { order_id } => {
            let invitation = account
                .create_invitation(order_id)
                .await
                .with_context(|| format!("inviting for order {order_id}"))?;
            match invitation.url {
                Some(url) => println!("Invitation {}: {url}", invitation.invitation_id),
                None => println!("Invitation {} created.", invitation.invitation_id),
            }
            Ok(())
        }
        OrdersAction::Uninvite { invitation_id } => {
            account
                .disable_invitation(invitation_id)
                .await
                .with_context(|| format!("disabling invitation {invitation_id}"))?;
            println!("Invitation {invitation_id} disabled.");
            Ok(())
        }
    }
}
