//! Read-through cache of `GET /api/status`: does the signed-in user have an app or a store.

use std::sync::Arc;

use async_trait::async_trait;
use shared::{
    domain::StoreId,
    protocol::{Application, ManagerStatus},
};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{api::ManagerApi, session::PrincipalProvider};

/// Something dependent views watch, refreshed once a tracked resource settles.
#[async_trait]
pub trait StatusRefresher: Send + Sync {
    async fn reload(&self);
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusView {
    pub status: Option<ManagerStatus>,
    pub loading: bool,
    pub error: Option<String>,
}

pub struct StatusCache {
    api: Arc<dyn ManagerApi>,
    principal: Arc<dyn PrincipalProvider>,
    view: watch::Sender<StatusView>,
}

impl StatusCache {
    pub fn new(api: Arc<dyn ManagerApi>, principal: Arc<dyn PrincipalProvider>) -> Self {
        let (view, _) = watch::channel(StatusView::default());
        Self {
            api,
            principal,
            view,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusView> {
        self.view.subscribe()
    }

    pub fn view(&self) -> StatusView {
        self.view.borrow().clone()
    }

    pub fn store_ids(&self) -> Vec<StoreId> {
        self.view
            .borrow()
            .status
            .as_ref()
            .map(ManagerStatus::store_ids)
            .unwrap_or_default()
    }

    pub fn apps(&self) -> Vec<Application> {
        self.view
            .borrow()
            .status
            .as_ref()
            .map(|status| status.apps.clone())
            .unwrap_or_default()
    }

    pub fn has_app(&self) -> bool {
        self.view
            .borrow()
            .status
            .as_ref()
            .is_some_and(ManagerStatus::has_app)
    }

    pub fn has_store(&self) -> bool {
        self.view
            .borrow()
            .status
            .as_ref()
            .is_some_and(ManagerStatus::has_store)
    }
}

#[async_trait]
impl StatusRefresher for StatusCache {
    async fn reload(&self) {
        if !self.principal.is_authenticated() {
            self.view.send_replace(StatusView::default());
            return;
        }

        self.view.send_modify(|view| {
            view.loading = true;
            view.error = None;
        });

        match self.api.status().await {
            Ok(status) => {
                debug!(
                    stores = status.store_ids().len(),
                    apps = status.apps.len(),
                    "manager status loaded"
                );
                self.view.send_modify(|view| {
                    view.status = Some(status);
                    view.loading = false;
                });
            }
            Err(err) => {
                warn!(error = %err, "failed to load manager status");
                self.view.send_modify(|view| {
                    view.error = Some(err.to_string());
                    view.loading = false;
                });
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/status_tests.rs"]
mod tests;
