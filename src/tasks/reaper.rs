//! Expiry Reaper Task
//!
//! Background task that periodically removes expired cache entries so that
//! keys which are never read again do not linger until the next lookup.

use std::sync::Weak;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::{CacheError, Result};

// == Sweep Target ==
/// Something the reaper can sweep.
pub trait Sweep: Send + Sync + 'static {
    /// Removes every expired entry and returns how many were removed.
    fn sweep_expired(&self) -> usize;
}

// == Reaper ==
/// Handle to a running reaper task.
///
/// The task holds only a weak reference to its target and exits on its own
/// once the target is dropped.
#[derive(Debug)]
pub struct Reaper {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Reaper {
    /// Spawns a reaper on the current tokio runtime.
    ///
    /// The first sweep runs one `interval` after spawning. Fails with
    /// [`CacheError::InvalidConfig`] when called outside a runtime.
    pub fn spawn<T: Sweep>(target: Weak<T>, interval: Duration) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| {
            CacheError::InvalidConfig(
                "a clean interval needs a running tokio runtime".to_string(),
            )
        })?;
        let (shutdown, mut stop) = watch::channel(false);

        let handle = runtime.spawn(async move {
            info!("Starting expiry reaper with interval of {:?}", interval);

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop.changed() => break,
                }

                let Some(target) = target.upgrade() else {
                    break;
                };
                let removed = target.sweep_expired();
                drop(target);

                if removed > 0 {
                    info!("Expiry sweep: removed {} expired entries", removed);
                } else {
                    debug!("Expiry sweep: no expired entries found");
                }
            }

            debug!("Expiry reaper stopped");
        });

        Ok(Self { shutdown, handle })
    }

    /// Signals the task to stop and waits for it. A sweep already running
    /// finishes before this returns.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.handle.await {
            warn!("Expiry reaper ended abnormally: {}", err);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
