//! App commands: run a named command against an app, then follow the resulting
//! process while it is TASK_RUNNING.
//!
//! Every other process status ends polling with [`CommandPhase::Completed`],
//! FAILED and ROLLED_BACK included. Callers that care about the outcome read
//! the status off [`CommandView::current_process`].

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use shared::{
    domain::{AppId, ProcessId, ProcessStatus},
    protocol::Process,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    api::ManagerApi,
    error::ClientError,
    poll::{PollTarget, PollTracker, TrackPhase, TrackState},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessKey {
    pub app_id: AppId,
    pub process_id: ProcessId,
}

struct ProcessTarget {
    api: Arc<dyn ManagerApi>,
}

#[async_trait]
impl PollTarget for ProcessTarget {
    type Key = ProcessKey;
    type Snapshot = Process;

    async fn fetch(&self, key: &ProcessKey) -> Result<Process, ClientError> {
        self.api.get_app_process(&key.app_id, &key.process_id).await
    }

    fn in_progress(&self, process: &Process) -> bool {
        process.is_task_running()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandPhase {
    #[default]
    Idle,
    Running,
    Polling,
    Completed,
    Error,
}

impl From<TrackPhase> for CommandPhase {
    fn from(phase: TrackPhase) -> Self {
        match phase {
            TrackPhase::Idle => Self::Idle,
            TrackPhase::Mutating => Self::Running,
            TrackPhase::Polling => Self::Polling,
            TrackPhase::Terminal => Self::Completed,
            TrackPhase::Failed => Self::Error,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandView {
    pub phase: CommandPhase,
    pub process_id: Option<ProcessId>,
    pub current_process: Option<Process>,
    pub error: Option<String>,
}

impl From<&TrackState<ProcessKey, Process>> for CommandView {
    fn from(state: &TrackState<ProcessKey, Process>) -> Self {
        Self {
            phase: state.phase.into(),
            process_id: state.key.as_ref().map(|key| key.process_id.clone()),
            current_process: state.snapshot.clone(),
            error: state.error.clone(),
        }
    }
}

pub struct AppCommand {
    tracker: PollTracker<ProcessTarget>,
    activated_for: Mutex<Option<AppId>>,
}

impl AppCommand {
    pub fn new(api: Arc<dyn ManagerApi>) -> Self {
        Self {
            tracker: PollTracker::new(ProcessTarget { api }),
            activated_for: Mutex::new(None),
        }
    }

    pub fn view(&self) -> CommandView {
        CommandView::from(&self.tracker.state())
    }

    pub fn phase(&self) -> CommandPhase {
        self.tracker.state().phase.into()
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackState<ProcessKey, Process>> {
        self.tracker.subscribe()
    }

    pub fn has_pending_poll(&self) -> bool {
        self.tracker.has_pending_poll()
    }

    /// Picks up a process already running for `app_id`. Only the first listed
    /// process the manager still counts as running is followed: apps run one
    /// process at a time. Repeated calls for
    /// the same app do nothing; another app resets the controller.
    pub async fn activate(&self, app_id: &AppId) {
        {
            let mut activated = self
                .activated_for
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if activated.as_ref() == Some(app_id) {
                return;
            }
            *activated = Some(app_id.clone());
        }

        let Some(epoch) = self.tracker.clear() else {
            return;
        };

        let api = &self.tracker.target().api;
        let processes = match api.list_app_processes(app_id, true).await {
            Ok(processes) => processes,
            Err(err) => {
                warn!(%app_id, error = %err, "active process lookup failed; ignoring");
                return;
            }
        };

        let Some(active) = processes
            .into_iter()
            .find(|process| process.status.is_some_and(ProcessStatus::is_running))
        else {
            debug!(%app_id, "no active process");
            return;
        };
        let key = ProcessKey {
            app_id: app_id.clone(),
            process_id: active.id.clone(),
        };
        let Some(epoch) = self.tracker.track_from(epoch, key) else {
            return;
        };
        info!(%app_id, process_id = %active.id, status = ?active.status, "following active process");
        self.tracker.follow(epoch, active).await;
    }

    pub async fn run_command(&self, app_id: &AppId, command: &str) {
        let api = Arc::clone(&self.tracker.target().api);
        let app_id = app_id.clone();
        let command = command.to_string();

        info!(%app_id, %command, "running app command");
        self.tracker
            .launch(async move {
                let process_id = api.run_app_command(&app_id, &command).await?;
                Ok(ProcessKey { app_id, process_id })
            })
            .await;
    }

    pub async fn refresh(&self) {
        self.tracker.refresh().await;
    }

    /// Resolves once nothing is in flight: idle, completed or error.
    pub async fn settled(&self) -> CommandView {
        let mut updates = self.tracker.subscribe();
        let settled = updates
            .wait_for(|state| {
                !matches!(state.phase, TrackPhase::Mutating | TrackPhase::Polling)
            })
            .await
            .map(|state| CommandView::from(&*state));
        settled.unwrap_or_else(|_| self.view())
    }

    pub fn deactivate(&self) {
        self.tracker.deactivate();
    }
}

#[cfg(test)]
#[path = "tests/command_tests.rs"]
mod tests;
