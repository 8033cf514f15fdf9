// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # bagwatch Watch
//!
//! Background polling of favourites for every registered user.
//!
//! - [`UserWatch`] - one user's tick: quota, matches, dedup, error policy
//! - [`run_watch_loop`] - the jittered loop around it
//! - [`WatchRegistry`] - users, their tasks, and the command boundary
//! - [`Supervisor`] - restarts loops that died while still watching
//!
//! ## Usage
//!
//! ```ignore
//! use bagwatch_watch::{LogNotifier, Supervisor, WatchRegistry};
//!
//! let registry = Arc::new(WatchRegistry::new(dir, settings, Arc::new(LogNotifier)));
//! registry.load_all().await?;
//! registry.resurrect_dead().await;
//! let supervisor = Supervisor::new(Arc::clone(&registry), period).spawn();
//! // ...
//! registry.shutdown().await;
//! ```

pub mod error;
pub mod notify;
pub mod policy;
pub mod registry;
pub mod scheduler;
pub mod seen;
pub mod supervisor;

pub use error::WatchError;
pub use notify::{LogNotifier, RecordingNotifier, SentMessage};
pub use policy::{COMMON_ERRORS, ErrorPolicy, PolicyAction, error_text};
pub use registry::{StartOutcome, TargetChange, WatchRegistry, WatchStatus};
pub use scheduler::{
    LoopControl, StopReason, TickOutcome, UserWatch, WatchLimits, next_sleep, run_watch_loop,
};
pub use seen::SeenState;
pub use supervisor::Supervisor;

#[cfg(test)]
mod watch_tests;
