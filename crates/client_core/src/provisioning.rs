//! Store provisioning: create the signed-in user's store, then follow it until
//! the manager reports it AVAILABLE, LOST or ERROR.

use std::sync::Arc;

use async_trait::async_trait;
use shared::{
    domain::{ProfileId, StoreId},
    protocol::{ManagerStatus, Process, Profile, Store},
};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::{
    api::ManagerApi,
    error::ClientError,
    poll::{PollTarget, PollTracker, TrackPhase, TrackState},
    status::{StatusRefresher, StatusView},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreKey {
    pub profile_id: ProfileId,
    pub store_id: StoreId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot {
    pub store: Store,
    /// Active background processes working on the store.
    pub processes: Vec<Process>,
}

struct StoreTarget {
    api: Arc<dyn ManagerApi>,
    status: Arc<dyn StatusRefresher>,
}

#[async_trait]
impl PollTarget for StoreTarget {
    type Key = StoreKey;
    type Snapshot = StoreSnapshot;

    async fn fetch(&self, key: &StoreKey) -> Result<StoreSnapshot, ClientError> {
        let (store, processes) = futures::try_join!(
            self.api.get_profile_store(&key.profile_id, &key.store_id),
            self.api
                .list_store_processes(&key.profile_id, &key.store_id, true),
        )?;
        Ok(StoreSnapshot { store, processes })
    }

    fn in_progress(&self, snapshot: &StoreSnapshot) -> bool {
        snapshot.store.is_provisioning()
    }

    async fn on_terminal(&self, _snapshot: &StoreSnapshot) {
        self.status.reload().await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProvisioningPhase {
    #[default]
    Idle,
    Creating,
    Polling,
    Ready,
    Error,
}

impl From<TrackPhase> for ProvisioningPhase {
    fn from(phase: TrackPhase) -> Self {
        match phase {
            TrackPhase::Idle => Self::Idle,
            TrackPhase::Mutating => Self::Creating,
            TrackPhase::Polling => Self::Polling,
            TrackPhase::Terminal => Self::Ready,
            TrackPhase::Failed => Self::Error,
        }
    }
}

/// What a view renders for the provisioning flow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvisioningView {
    pub phase: ProvisioningPhase,
    pub store_id: Option<StoreId>,
    pub store: Option<Store>,
    pub processes: Vec<Process>,
    pub error: Option<String>,
}

impl From<&TrackState<StoreKey, StoreSnapshot>> for ProvisioningView {
    fn from(state: &TrackState<StoreKey, StoreSnapshot>) -> Self {
        Self {
            phase: state.phase.into(),
            store_id: state.key.as_ref().map(|key| key.store_id.clone()),
            store: state.snapshot.as_ref().map(|snapshot| snapshot.store.clone()),
            processes: state
                .snapshot
                .as_ref()
                .map(|snapshot| snapshot.processes.clone())
                .unwrap_or_default(),
            error: state.error.clone(),
        }
    }
}

pub struct StoreProvisioning {
    tracker: PollTracker<StoreTarget>,
    profile: Option<Profile>,
}

impl StoreProvisioning {
    pub fn new(
        api: Arc<dyn ManagerApi>,
        status: Arc<dyn StatusRefresher>,
        profile: Option<Profile>,
    ) -> Self {
        Self {
            tracker: PollTracker::new(StoreTarget { api, status }),
            profile,
        }
    }

    pub fn view(&self) -> ProvisioningView {
        ProvisioningView::from(&self.tracker.state())
    }

    pub fn phase(&self) -> ProvisioningPhase {
        self.tracker.state().phase.into()
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackState<StoreKey, StoreSnapshot>> {
        self.tracker.subscribe()
    }

    pub fn has_pending_poll(&self) -> bool {
        self.tracker.has_pending_poll()
    }

    /// Re-attaches to the first known store. Call on activation and whenever the
    /// known store ids change.
    pub async fn attach(&self, store_ids: &[StoreId]) {
        let Some(profile) = &self.profile else {
            debug!("profile not loaded; nothing to attach to");
            return;
        };
        let Some(store_id) = store_ids.first() else {
            self.tracker.clear();
            return;
        };

        let key = StoreKey {
            profile_id: profile.id.clone(),
            store_id: store_id.clone(),
        };
        let Some(epoch) = self.tracker.track(key) else {
            return;
        };

        let api = &self.tracker.target().api;
        match api.get_profile_store(&profile.id, store_id).await {
            Ok(store) => {
                info!(%store_id, status = ?store.status, "attached to existing store");
                self.tracker
                    .follow(
                        epoch,
                        StoreSnapshot {
                            store,
                            processes: Vec::new(),
                        },
                    )
                    .await;
            }
            Err(err) => {
                self.tracker.fail(epoch, &err);
            }
        }
    }

    /// Re-attaches whenever the known store ids in `updates` change, starting
    /// with the current value. Views still loading are skipped. Returns once the
    /// status publisher is gone.
    pub async fn follow_status(&self, mut updates: watch::Receiver<StatusView>) {
        let mut attached: Option<Vec<StoreId>> = None;
        loop {
            let store_ids = {
                let view = updates.borrow_and_update();
                (!view.loading).then(|| {
                    view.status
                        .as_ref()
                        .map(ManagerStatus::store_ids)
                        .unwrap_or_default()
                })
            };
            if let Some(store_ids) = store_ids {
                if attached.as_ref() != Some(&store_ids) {
                    debug!(stores = store_ids.len(), "known stores changed; re-attaching");
                    self.attach(&store_ids).await;
                    attached = Some(store_ids);
                }
            }
            if updates.changed().await.is_err() {
                return;
            }
        }
    }

    /// Creates a store for the loaded profile and polls it until it settles.
    /// `name` overrides the profile-derived store name.
    pub async fn start(&self, name: Option<&str>) {
        let Some(profile) = &self.profile else {
            self.tracker.reject(&ClientError::ProfileNotLoaded);
            return;
        };

        let name = name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| profile.store_name())
            .to_string();
        let profile_id = profile.id.clone();
        let api = Arc::clone(&self.tracker.target().api);

        info!(%profile_id, %name, "creating store");
        self.tracker
            .launch(async move {
                let store_id = api.create_profile_store(&profile_id, &name).await?;
                Ok(StoreKey {
                    profile_id,
                    store_id,
                })
            })
            .await;
    }

    pub async fn refresh(&self) {
        self.tracker.refresh().await;
    }

    /// Resolves once nothing is in flight: idle, ready or error.
    pub async fn settled(&self) -> ProvisioningView {
        let mut updates = self.tracker.subscribe();
        let settled = updates
            .wait_for(|state| {
                !matches!(state.phase, TrackPhase::Mutating | TrackPhase::Polling)
            })
            .await
            .map(|state| ProvisioningView::from(&*state));
        settled.unwrap_or_else(|_| self.view())
    }

    pub fn deactivate(&self) {
        self.tracker.deactivate();
    }
}

#[cfg(test)]
#[path = "tests/provisioning_tests.rs"]
mod tests;
