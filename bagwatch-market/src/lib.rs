// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # bagwatch Market
//!
//! Client for the surplus-food marketplace API.
//!
//! - [`Account`] - one user's transport, config, and login state
//! - [`AuthSessionManager`] - email/poll login, token refresh, logout
//! - [`MatchEngine`] - favourites pagination and target matching
//! - [`PriceFormatter`] - pluggable price rendering
//!
//! ## Usage
//!
//! ```ignore
//! use bagwatch_market::{Account, MatchEngine};
//!
//! let mut account = Account::new(user_store, &settings)?;
//! account.auth_by_email().await?;
//! account.auth_poll().await?;
//!
//! let engine = MatchEngine::new(settings.page_size, settings.max_pages);
//! let targets = account.store().config().targets.clone();
//! let report = engine.get_matches(&mut account, &targets, 1).await?;
//! ```

pub mod account;
pub mod api;
pub mod auth;
pub mod endpoints;
pub mod error;
pub mod matcher;
pub mod parser;
pub mod price;

pub use account::Account;
pub use auth::{AuthSessionManager, AuthState, PollOutcome};
pub use error::MarketError;
pub use matcher::{Match, MatchEngine, MatchReport, select_matches};
pub use parser::{Invitation, Order};
pub use price::{DefaultPriceFormatter, PriceFormatter};
