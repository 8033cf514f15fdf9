// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # bagwatch Fetch
//!
//! The authenticated request contract used to talk to the marketplace API.
//!
//! - [`client::TransportClient`] - POSTs JSON, merges baseline headers,
//!   classifies non-2xx responses, and keeps the per-user quota counters
//! - [`error::ApiError`] - one error value with a discriminated [`ErrorKind`]
//! - [`counters::QuotaCounters`] - requests since refresh, consecutive failures
//! - [`retry::RetrySchedule`] - backoff schedule for polling loops
//!
//! ## Example
//!
//! ```ignore
//! use bagwatch_fetch::{TransportClient, TransportConfig};
//!
//! let mut client = TransportClient::new(TransportConfig::default())?
//!     .with_counter_exempt("token/v1/refresh");
//! let response = client.post("auth/v5/authByEmail", &body, HeaderMap::new()).await?;
//! ```

pub mod client;
pub mod counters;
pub mod error;
pub mod retry;

pub use client::{ApiResponse, TransportClient, TransportConfig, DEFAULT_BASE_URL};
pub use counters::QuotaCounters;
pub use error::{ApiError, BuildError, ErrorKind};
pub use retry::RetrySchedule;
