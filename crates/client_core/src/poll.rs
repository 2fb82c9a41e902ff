//! Mutate, record the returned id, then poll until the resource settles.
//!
//! A [`PollTracker`] owns at most one tracked key and at most one pending
//! poll timer. Arming a timer always cancels the previous one. Every state
//! change that follows an `.await` is checked against a lifecycle token
//! ([`Epoch`]): results for a replaced key, or arriving after
//! [`PollTracker::deactivate`], are dropped on the floor.

use std::{
    fmt::Debug,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::error::ClientError;

/// Delay between two poll cycles.
pub const POLL_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackPhase {
    #[default]
    Idle,
    Mutating,
    Polling,
    Terminal,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackState<K, S> {
    pub phase: TrackPhase,
    pub key: Option<K>,
    pub snapshot: Option<S>,
    pub error: Option<String>,
}

impl<K, S> Default for TrackState<K, S> {
    fn default() -> Self {
        Self {
            phase: TrackPhase::Idle,
            key: None,
            snapshot: None,
            error: None,
        }
    }
}

/// The resource-specific half of a poll loop.
#[async_trait]
pub trait PollTarget: Send + Sync + 'static {
    type Key: Clone + PartialEq + Debug + Send + Sync + 'static;
    type Snapshot: Clone + Debug + Send + Sync + 'static;

    async fn fetch(&self, key: &Self::Key) -> Result<Self::Snapshot, ClientError>;

    fn in_progress(&self, snapshot: &Self::Snapshot) -> bool;

    /// Runs once per poll cycle that observes a terminal snapshot.
    async fn on_terminal(&self, _snapshot: &Self::Snapshot) {}
}

/// Lifecycle token handed out when a tracker starts something new.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epoch(u64);

struct PendingPoll {
    id: u64,
    handle: JoinHandle<()>,
}

struct Core {
    active: bool,
    epoch: u64,
    next_timer: u64,
    pending: Option<PendingPoll>,
}

impl Core {
    fn is_current(&self, epoch: Epoch) -> bool {
        self.active && self.epoch == epoch.0
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.handle.abort();
        }
    }
}

type SharedState<T> = TrackState<<T as PollTarget>::Key, <T as PollTarget>::Snapshot>;

struct Shared<T: PollTarget> {
    target: T,
    interval: Duration,
    core: Mutex<Core>,
    state: watch::Sender<SharedState<T>>,
}

impl<T: PollTarget> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cycle(self: &Arc<Self>, epoch: Epoch, key: T::Key) -> BoxFuture<'static, ()> {
        let shared = Arc::clone(self);
        async move {
            let fetched = shared.target.fetch(&key).await;
            let settled = {
                let mut core = shared.lock();
                if !core.is_current(epoch) {
                    debug!(?key, "discarding poll result for a replaced or inactive tracker");
                    return;
                }
                core.cancel_pending();
                match fetched {
                    Ok(snapshot) => {
                        let in_progress = shared.target.in_progress(&snapshot);
                        if in_progress {
                            shared.arm(&mut core, epoch, key.clone());
                        }
                        let phase = if in_progress {
                            TrackPhase::Polling
                        } else {
                            TrackPhase::Terminal
                        };
                        debug!(?key, ?phase, "poll cycle finished");
                        let settled = (!in_progress).then(|| snapshot.clone());
                        shared.state.send_modify(|state| {
                            state.phase = phase;
                            state.snapshot = Some(snapshot);
                        });
                        settled
                    }
                    Err(err) => {
                        warn!(?key, error = %err, "poll failed; stopping");
                        shared.state.send_modify(|state| {
                            state.phase = TrackPhase::Failed;
                            state.error = Some(err.to_string());
                        });
                        None
                    }
                }
            };

            if let Some(snapshot) = settled {
                info!(?key, "tracked resource settled");
                shared.target.on_terminal(&snapshot).await;
            }
        }
        .boxed()
    }

    fn arm(self: &Arc<Self>, core: &mut Core, epoch: Epoch, key: T::Key) {
        core.cancel_pending();
        core.next_timer += 1;
        let id = core.next_timer;
        let shared = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(shared.interval).await;
            {
                let mut core = shared.lock();
                if core.pending.as_ref().map(|pending| pending.id) != Some(id) {
                    return;
                }
                core.pending = None;
            }
            shared.cycle(epoch, key).await;
        });
        core.pending = Some(PendingPoll { id, handle });
    }
}

pub struct PollTracker<T: PollTarget> {
    shared: Arc<Shared<T>>,
}

impl<T: PollTarget> PollTracker<T> {
    pub fn new(target: T) -> Self {
        Self::with_interval(target, POLL_INTERVAL)
    }

    pub fn with_interval(target: T, interval: Duration) -> Self {
        let (state, _) = watch::channel(TrackState::default());
        Self {
            shared: Arc::new(Shared {
                target,
                interval,
                core: Mutex::new(Core {
                    active: true,
                    epoch: 0,
                    next_timer: 0,
                    pending: None,
                }),
                state,
            }),
        }
    }

    pub fn target(&self) -> &T {
        &self.shared.target
    }

    pub fn subscribe(&self) -> watch::Receiver<SharedState<T>> {
        self.shared.state.subscribe()
    }

    pub fn state(&self) -> SharedState<T> {
        self.shared.state.borrow().clone()
    }

    pub fn has_pending_poll(&self) -> bool {
        self.shared.lock().pending.is_some()
    }

    /// Creates the resource with `mutate`, then tracks and polls the returned key.
    pub async fn launch<F>(&self, mutate: F)
    where
        F: Future<Output = Result<T::Key, ClientError>> + Send,
    {
        let Some(epoch) = self.enter(TrackPhase::Mutating) else {
            return;
        };

        match mutate.await {
            Ok(key) => {
                let recorded = self.update(epoch, |state| {
                    if state.key.as_ref() != Some(&key) {
                        state.snapshot = None;
                    }
                    state.key = Some(key.clone());
                    state.phase = TrackPhase::Polling;
                });
                if recorded {
                    info!(?key, "resource created; polling");
                    self.shared.cycle(epoch, key).await;
                }
            }
            Err(err) => {
                self.fail(epoch, &err);
            }
        }
    }

    /// Starts tracking an existing `key`. Returns `None` once deactivated.
    pub fn track(&self, key: T::Key) -> Option<Epoch> {
        let mut core = self.shared.lock();
        if !core.active {
            return None;
        }
        Some(self.retarget(&mut core, key))
    }

    /// Like [`track`](Self::track), but only while `expected` is still the current lifecycle.
    pub fn track_from(&self, expected: Epoch, key: T::Key) -> Option<Epoch> {
        let mut core = self.shared.lock();
        if !core.is_current(expected) {
            return None;
        }
        Some(self.retarget(&mut core, key))
    }

    fn retarget(&self, core: &mut Core, key: T::Key) -> Epoch {
        core.epoch += 1;
        core.cancel_pending();
        self.shared.state.send_modify(|state| {
            if state.key.as_ref() != Some(&key) {
                state.snapshot = None;
            }
            state.key = Some(key);
            state.error = None;
        });
        Epoch(core.epoch)
    }

    /// Adopts a snapshot fetched for the tracked key: polls on if it is still in
    /// progress, otherwise settles without running the terminal side effect.
    pub async fn follow(&self, epoch: Epoch, snapshot: T::Snapshot) {
        let key = {
            let core = self.shared.lock();
            if !core.is_current(epoch) {
                return;
            }
            let in_progress = self.shared.target.in_progress(&snapshot);
            let mut key = None;
            self.shared.state.send_modify(|state| {
                state.snapshot = Some(snapshot);
                if in_progress {
                    state.phase = TrackPhase::Polling;
                    key = state.key.clone();
                } else {
                    state.phase = TrackPhase::Terminal;
                }
            });
            key
        };

        if let Some(key) = key {
            self.shared.cycle(epoch, key).await;
        }
    }

    /// Records a failure for the lifecycle `epoch`.
    pub fn fail(&self, epoch: Epoch, error: &ClientError) -> bool {
        let mut core = self.shared.lock();
        if !core.is_current(epoch) {
            return false;
        }
        core.cancel_pending();
        warn!(error = %error, "tracking failed");
        self.shared.state.send_modify(|state| {
            state.phase = TrackPhase::Failed;
            state.error = Some(error.to_string());
        });
        true
    }

    /// Fails immediately, before anything was sent.
    pub fn reject(&self, error: &ClientError) {
        if let Some(epoch) = self.enter(TrackPhase::Failed) {
            self.fail(epoch, error);
        }
    }

    /// Back to idle with nothing tracked.
    pub fn clear(&self) -> Option<Epoch> {
        let mut core = self.shared.lock();
        if !core.active {
            return None;
        }
        core.epoch += 1;
        core.cancel_pending();
        self.shared.state.send_replace(TrackState::default());
        Some(Epoch(core.epoch))
    }

    /// Runs one poll cycle for the tracked key right away. No-op when nothing is tracked.
    pub async fn refresh(&self) {
        let tracked = {
            let core = self.shared.lock();
            if !core.active {
                return;
            }
            let key = self.shared.state.borrow().key.clone();
            key.map(|key| (Epoch(core.epoch), key))
        };

        if let Some((epoch, key)) = tracked {
            self.shared.cycle(epoch, key).await;
        }
    }

    /// Cancels the pending poll; nothing reaches this tracker's state afterwards.
    pub fn deactivate(&self) {
        let mut core = self.shared.lock();
        if core.active {
            debug!("deactivating poll tracker");
        }
        core.active = false;
        core.cancel_pending();
    }

    fn enter(&self, phase: TrackPhase) -> Option<Epoch> {
        let mut core = self.shared.lock();
        if !core.active {
            return None;
        }
        core.epoch += 1;
        core.cancel_pending();
        self.shared.state.send_modify(|state| {
            state.phase = phase;
            state.error = None;
        });
        Some(Epoch(core.epoch))
    }

    fn update(&self, epoch: Epoch, apply: impl FnOnce(&mut SharedState<T>)) -> bool {
        let core = self.shared.lock();
        if !core.is_current(epoch) {
            return false;
        }
        self.shared.state.send_modify(apply);
        true
    }
}

impl<T: PollTarget> Drop for PollTracker<T> {
    fn drop(&mut self) {
        self.deactivate();
    }
}

#[cfg(test)]
#[path = "tests/poll_tests.rs"]
mod tests;
