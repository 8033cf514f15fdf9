//! Session commands: users, email, login, refresh, logout, cookie, status.

use anyhow::{Context as _, Result, bail};
use bagwatch_market::PollOutcome;
use bagwatch_store::{UserStore, list_user_ids};
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use super::{emit, open_account, open_store, registry};
use crate::Cli;
use crate::output::UserRow;

/// Arguments for the login command.
#[derive(Args)]
pub struct LoginArgs {
    /// Confirm with the PIN from the email instead of the link.
    #[arg(long)]
    pub pin: bool,
}

/// Lists every user with a config file.
pub async fn users(cli: &Cli) -> Result<()> {
    let dir = cli.config_dir();
    let mut rows = Vec::new();
    for user_id in list_user_ids(&dir).await? {
        match UserStore::open(&dir, &user_id).await {
            Ok(store) => {
                let config = store.config();
                rows.push(UserRow {
                    user_id,
                    logged_in: config.session.is_logged_in(),
                    watching: config.watching,
                    targets: config.targets.len(),
                });
            }
            Err(e) => warn!(user = %user_id, error = %e, "Skipping unreadable config"),
        }
    }
    emit(cli, |t| t.format_users(&rows), |j| j.format_users(&rows))
}

/// Stores the login email.
pub async fn set_email(email: &str, cli: &Cli) -> Result<()> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        bail!("Not an email address: {email:?}");
    }
    let mut store = open_store(cli).await?;
    store
        .update(|c| c.credentials.email = Some(email.to_string()))
        .await?;
    println!("Email for {} set to {email}.", cli.user);
    Ok(())
}

async fn read_pin() -> Result<String> {
    println!("Enter the PIN from the email:");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("reading PIN")?;
    let pin = line.trim().to_string();
    if pin.is_empty() {
        bail!("No PIN entered");
    }
    Ok(pin)
}

/// Runs the email login flow.
pub async fn login(args: &LoginArgs, cli: &Cli) -> Result<()> {
    let (mut account, _settings) = open_account(cli).await?;
    account
        .auth_by_email()
        .await
        .context("requesting login email")?;
    let email = account
        .store()
        .config()
        .credentials
        .email()
        .unwrap_or_default()
        .to_string();
    println!("📬 Login email sent to {email}.");

    if args.pin {
        let pin = read_pin().await?;
        account.auth_by_pin(&pin).await.context("confirming PIN")?;
    } else {
        println!("Open the link in the email on a computer (not on the phone with the app installed).");
        match account.auth_poll().await.context("waiting for confirmation")? {
            PollOutcome::LoggedIn => {}
            PollOutcome::StillPending => {
                bail!("The link was not confirmed in time. Run `bagwatch login` again.")
            }
        }
    }

    info!(user = %cli.user, "Logged in");
    println!("✅ Logged in as {}.", cli.user);
    Ok(())
}

/// Rotates the session tokens.
pub async fn refresh(cli: &Cli) -> Result<()> {
    let (mut account, _settings) = open_account(cli).await?;
    account.refresh().await.context("refreshing session")?;
    println!("🔄 Session refreshed.");
    Ok(())
}

/// Logs out and clears the stored session.
pub async fn logout(cli: &Cli) -> Result<()> {
    let (mut account, _settings) = open_account(cli).await?;
    account.logout().await.context("logging out")?;
    println!("👋 Logged out.");
    Ok(())
}

/// Stores a challenge cookie. A running daemon picks it up on its next tick.
pub async fn cookie(cookie: &str, cli: &Cli) -> Result<()> {
    if cookie.trim().is_empty() {
        bail!("The cookie is empty");
    }
    registry(cli).await?.supply_cookie(&cli.user, cookie).await?;
    println!("🍪 Cookie stored.");
    Ok(())
}

/// Shows the user's session and watch state.
pub async fn status(cli: &Cli) -> Result<()> {
    let registry = registry(cli).await?;
    let user = registry.register(&cli.user).await?;
    let email = user
        .lock()
        .await
        .account()
        .store()
        .config()
        .credentials
        .email()
        .map(ToString::to_string);
    let status = registry.status(&cli.user).await?;
    emit(
        cli,
        |t| t.format_status(&status, email.as_deref()),
        |j| j.format_status(&status, email.as_deref()),
    )
}
