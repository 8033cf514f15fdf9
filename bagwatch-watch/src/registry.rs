//! Process-wide directory of users and their watch tasks.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bagwatch_core::{Notifier, Target};
use bagwatch_fetch::QuotaCounters;
use bagwatch_market::{Account, AuthState};
use bagwatch_store::{AppSettings, UserStore, list_user_ids};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::WatchError;
use crate::scheduler::{LoopControl, StopReason, UserWatch, run_watch_loop};

type LoopResult = Result<StopReason, WatchError>;

struct WatchTask {
    handle: JoinHandle<LoopResult>,
    stop: CancellationToken,
}

impl WatchTask {
    fn is_alive(&self) -> bool {
        !self.handle.is_finished()
    }
}

struct UserSlot {
    user: Arc<Mutex<UserWatch>>,
    task: Option<WatchTask>,
}

impl UserSlot {
    fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(WatchTask::is_alive)
    }
}

/// Whether a start request spawned a new loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new loop was spawned.
    Started,
    /// A loop was already running; only the interval was updated.
    AlreadyRunning,
}

/// Result of a target change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetChange {
    /// The target was added or updated.
    Added(Target),
    /// The target was removed.
    Removed(Target),
    /// Nothing to remove.
    NotTargeted(String),
}

/// Snapshot of one user's watch.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchStatus {
    /// User id.
    pub user_id: String,
    /// A loop task is alive.
    pub running: bool,
    /// The persisted watching flag.
    pub watching: bool,
    /// Polling interval.
    pub interval: Duration,
    /// Login state.
    pub auth_state: AuthState,
    /// Number of targets.
    pub targets: usize,
    /// Quota counters.
    pub counters: QuotaCounters,
    /// Challenge link polling is held on.
    pub held_on: Option<String>,
}

/// Users known to the process and their loop tasks.
pub struct WatchRegistry {
    slots: RwLock<HashMap<String, UserSlot>>,
    config_dir: PathBuf,
    settings: AppSettings,
    notifier: Arc<dyn Notifier>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for WatchRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchRegistry")
            .field("config_dir", &self.config_dir)
            .finish_non_exhaustive()
    }
}

impl WatchRegistry {
    /// Creates an empty registry.
    pub fn new(config_dir: impl Into<PathBuf>, settings: AppSettings, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            config_dir: config_dir.into(),
            settings,
            notifier,
            shutdown: CancellationToken::new(),
        }
    }

    /// Config directory users are loaded from.
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Process settings.
    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Token cancelled by [`WatchRegistry::shutdown`].
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Returns the user's entry, loading its config on first contact.
    ///
    /// The config is opened under the write lock so that concurrent first
    /// contacts share one store and one device id.
    ///
    /// # Errors
    ///
    /// Fails when the config is malformed or the transport cannot be built.
    #[instrument(skip(self))]
    pub async fn register(&self, user_id: &str) -> Result<Arc<Mutex<UserWatch>>, WatchError> {
        if let Some(slot) = self.slots.read().await.get(user_id) {
            return Ok(Arc::clone(&slot.user));
        }

        let mut slots = self.slots.write().await;
        if let Some(slot) = slots.get(user_id) {
            return Ok(Arc::clone(&slot.user));
        }
        let store = UserStore::open(&self.config_dir, user_id).await?;
        let account = Account::new(store, &self.settings)?;
        let user = Arc::new(Mutex::new(UserWatch::new(
            account,
            &self.settings,
            Arc::clone(&self.notifier),
        )));
        slots.insert(
            user_id.to_string(),
            UserSlot {
                user: Arc::clone(&user),
                task: None,
            },
        );
        debug!(user = %user_id, "Registered user");
        Ok(user)
    }

    /// Registers every user with a config file.
    ///
    /// A user whose config fails to load is skipped.
    pub async fn load_all(&self) -> Result<Vec<String>, WatchError> {
        let mut loaded = Vec::new();
        for user_id in list_user_ids(&self.config_dir).await? {
            match self.register(&user_id).await {
                Ok(_) => loaded.push(user_id),
                Err(e) => warn!(user = %user_id, error = %e, "Skipping user with unusable config"),
            }
        }
        Ok(loaded)
    }

    /// Registered user ids.
    pub async fn user_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.slots.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn spawn_loop(&self, user: Arc<Mutex<UserWatch>>) -> WatchTask {
        let control = LoopControl::child_of(&self.shutdown);
        let stop = control.stop.clone();
        let handle = tokio::spawn(run_watch_loop(user, control));
        WatchTask { handle, stop }
    }

    /// Starts (or keeps) the user's loop and persists the watching flag.
    pub async fn start(&self, user_id: &str, interval: Option<Duration>) -> Result<StartOutcome, WatchError> {
        let user = self.register(user_id).await?;
        {
            let mut watch = user.lock().await;
            let interval_secs = interval.map(|i| i.as_secs_f64());
            watch
                .account_mut()
                .store_mut()
                .update(|c| {
                    c.watching = true;
                    if interval_secs.is_some() {
                        c.watch_interval_secs = interval_secs;
                    }
                })
                .await?;
            if let Some(interval) = interval {
                watch.set_interval(interval);
            }
        }

        let mut slots = self.slots.write().await;
        let slot = slots
            .get_mut(user_id)
            .ok_or_else(|| WatchError::UnknownUser(user_id.to_string()))?;
        if slot.is_running() {
            return Ok(StartOutcome::AlreadyRunning);
        }
        slot.task = Some(self.spawn_loop(Arc::clone(&user)));
        info!(user = %user_id, "Watch started");
        Ok(StartOutcome::Started)
    }

    /// Stops the user's loop and waits for it to finish.
    ///
    /// The loop sends the stopped message and clears the watching flag. When
    /// no loop is running the flag is cleared here.
    pub async fn stop(&self, user_id: &str) -> Result<(), WatchError> {
        let (user, task) = {
            let mut slots = self.slots.write().await;
            let slot = slots
                .get_mut(user_id)
                .ok_or_else(|| WatchError::UnknownUser(user_id.to_string()))?;
            (Arc::clone(&slot.user), slot.task.take())
        };

        match task {
            Some(task) if task.is_alive() => {
                task.stop.cancel();
                match task.handle.await {
                    Ok(Ok(reason)) => debug!(user = %user_id, ?reason, "Loop joined"),
                    Ok(Err(e)) => {
                        warn!(user = %user_id, error = %e, "Loop ended with error");
                        user.lock().await.finish(StopReason::Requested).await?;
                    }
                    Err(e) => {
                        user.lock().await.finish(StopReason::Requested).await?;
                        return Err(WatchError::Task(e.to_string()));
                    }
                }
            }
            _ => user.lock().await.finish(StopReason::Requested).await?,
        }
        Ok(())
    }

    /// Status of one user.
    pub async fn status(&self, user_id: &str) -> Result<WatchStatus, WatchError> {
        let (user, running) = {
            let slots = self.slots.read().await;
            let slot = slots
                .get(user_id)
                .ok_or_else(|| WatchError::UnknownUser(user_id.to_string()))?;
            (Arc::clone(&slot.user), slot.is_running())
        };
        let watch = user.lock().await;
        let config = watch.account().store().config();
        Ok(WatchStatus {
            user_id: user_id.to_string(),
            running,
            watching: config.watching,
            interval: watch.limits().interval,
            auth_state: watch.account().auth_state(),
            targets: config.targets.len(),
            counters: watch.account().counters(),
            held_on: watch.held_on().map(ToString::to_string),
        })
    }

    /// Restarts every loop whose user is marked as watching but whose task
    /// is not alive. Returns the restarted user ids.
    ///
    /// The flag is read from disk, so a start written by another process is
    /// picked up here.
    #[instrument(skip(self))]
    pub async fn resurrect_dead(&self) -> Vec<String> {
        if self.shutdown.is_cancelled() {
            return Vec::new();
        }

        let candidates: Vec<_> = {
            let slots = self.slots.read().await;
            slots
                .iter()
                .filter(|(_, slot)| !slot.is_running())
                .map(|(id, slot)| (id.clone(), Arc::clone(&slot.user)))
                .collect()
        };

        let mut restarted = Vec::new();
        for (user_id, user) in candidates {
            {
                let mut watch = user.lock().await;
                if let Err(e) = watch.account_mut().sync_from_disk().await {
                    debug!(user = %user_id, error = %e, "Could not re-read user config");
                }
                if !watch.account().store().config().watching {
                    continue;
                }
            }
            let mut slots = self.slots.write().await;
            let Some(slot) = slots.get_mut(&user_id) else {
                continue;
            };
            if slot.is_running() {
                continue;
            }
            if let Some(dead) = slot.task.take() {
                if let Ok(Err(e)) = dead.handle.await {
                    warn!(user = %user_id, error = %e, "Resurrecting crashed loop");
                }
            }
            slot.task = Some(self.spawn_loop(user));
            info!(user = %user_id, "Watch loop resurrected");
            restarted.push(user_id);
        }
        restarted
    }

    /// Cancels every loop, waits for them to exit, and drops every entry.
    ///
    /// Watching flags are left as they are so the next start resumes.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handles: Vec<_> = {
            let mut slots = self.slots.write().await;
            slots
                .drain()
                .filter_map(|(_, slot)| slot.task)
                .map(|task| task.handle)
                .collect()
        };
        info!(tasks = handles.len(), "Shutting down watch loops");
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                warn!(error = %e, "Watch task failed during shutdown");
            }
        }
    }

    // ========================================================================
    // Command Boundary
    // ========================================================================

    async fn user(&self, user_id: &str) -> Result<Arc<Mutex<UserWatch>>, WatchError> {
        self.register(user_id).await
    }

    /// Adds or updates a target; a quantity of zero removes it.
    pub async fn add_target(&self, user_id: &str, item_id: &str, quantity: u32) -> Result<TargetChange, WatchError> {
        if quantity == 0 {
            return self.remove_target(user_id, item_id).await;
        }
        let user = self.user(user_id).await?;
        let mut watch = user.lock().await;
        let target = watch.account_mut().resolve_target(item_id, quantity).await?;
        let stored = target.clone();
        watch
            .account_mut()
            .store_mut()
            .update(|c| c.targets.upsert(stored))
            .await?;
        Ok(TargetChange::Added(target))
    }

    /// Removes a target and forgets its dedup memory.
    pub async fn remove_target(&self, user_id: &str, item_id: &str) -> Result<TargetChange, WatchError> {
        let user = self.user(user_id).await?;
        let mut watch = user.lock().await;
        let item_id = item_id.trim();
        let removed = watch
            .account_mut()
            .store_mut()
            .update(|c| c.targets.remove(item_id))
            .await?;
        match removed {
            Some(target) => {
                if target.is_wildcard() {
                    watch.seen_mut().clear();
                } else {
                    watch.seen_mut().forget(&target.item_id);
                }
                Ok(TargetChange::Removed(target))
            }
            None => Ok(TargetChange::NotTargeted(item_id.to_string())),
        }
    }

    /// Forgets every notified item of the user.
    ///
    /// The request is also written to the user's file, where a loop running
    /// in another process picks it up on its next tick.
    pub async fn clear_history(&self, user_id: &str) -> Result<(), WatchError> {
        let user = self.user(user_id).await?;
        let mut watch = user.lock().await;
        watch.seen_mut().clear();
        watch
            .account_mut()
            .store_mut()
            .update(|c| c.clear_history_requested = true)
            .await?;
        Ok(())
    }

    /// Stores a challenge cookie and lifts any hold.
    pub async fn supply_cookie(&self, user_id: &str, cookie: &str) -> Result<(), WatchError> {
        let user = self.user(user_id).await?;
        let mut watch = user.lock().await;
        let cookie = cookie.trim().to_string();
        watch
            .account_mut()
            .store_mut()
            .update(|c| c.session.challenge_cookie = Some(cookie).filter(|v| !v.is_empty()))
            .await?;
        watch.release_hold();
        Ok(())
    }
}
