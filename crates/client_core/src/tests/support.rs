//! In-memory manager used by the controller tests.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use shared::{
    domain::{AppId, ProcessId, ProcessStatus, ProfileId, StoreId, StoreStatus},
    protocol::{ManagerStatus, Process, Profile, Store},
};

use crate::{api::ManagerApi, error::ClientError, status::StatusRefresher};

#[derive(Default)]
pub struct FakeManagerApi {
    calls: Mutex<Vec<String>>,
    pub profile: Mutex<Option<Profile>>,
    pub created_store: Mutex<Option<Result<StoreId, ClientError>>>,
    pub stores: Mutex<VecDeque<Result<Store, ClientError>>>,
    pub store_processes: Mutex<Vec<Process>>,
    pub status: Mutex<Option<ManagerStatus>>,
    pub command_process: Mutex<Option<Result<ProcessId, ClientError>>>,
    pub processes: Mutex<VecDeque<Result<Process, ClientError>>>,
    pub active_processes: Mutex<Option<Result<Vec<Process>, ClientError>>>,
}

impl FakeManagerApi {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls").clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    pub fn push_store(&self, store: Store) {
        self.stores.lock().expect("stores").push_back(Ok(store));
    }

    pub fn push_process(&self, process: Process) {
        self.processes
            .lock()
            .expect("processes")
            .push_back(Ok(process));
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("calls").push(call);
    }
}

fn not_found() -> ClientError {
    ClientError::Status {
        status: 404,
        body: "not found".into(),
    }
}

#[async_trait]
impl ManagerApi for FakeManagerApi {
    async fn health(&self) -> Result<serde_json::Value, ClientError> {
        self.record("getHealth".into());
        Ok(serde_json::json!({ "status": "UP" }))
    }

    async fn current_profile(&self) -> Result<Profile, ClientError> {
        self.record("getCurrentProfile".into());
        self.profile.lock().expect("profile").clone().ok_or_else(not_found)
    }

    async fn list_profile_stores(&self, profile_id: &ProfileId) -> Result<Vec<StoreId>, ClientError> {
        self.record(format!("listProfileStores {profile_id}"));
        Ok(Vec::new())
    }

    async fn get_profile_store(
        &self,
        profile_id: &ProfileId,
        store_id: &StoreId,
    ) -> Result<Store, ClientError> {
        self.record(format!("getProfileStore {profile_id} {store_id}"));
        self.stores
            .lock()
            .expect("stores")
            .pop_front()
            .unwrap_or_else(|| Err(not_found()))
    }

    async fn list_store_processes(
        &self,
        profile_id: &ProfileId,
        store_id: &StoreId,
        active: bool,
    ) -> Result<Vec<Process>, ClientError> {
        self.record(format!(
            "getProfileStoreProcesses {profile_id} {store_id} active={active}"
        ));
        Ok(self.store_processes.lock().expect("store processes").clone())
    }

    async fn create_profile_store(
        &self,
        profile_id: &ProfileId,
        name: &str,
    ) -> Result<StoreId, ClientError> {
        self.record(format!("createProfileStore {profile_id} name={name}"));
        self.created_store
            .lock()
            .expect("created store")
            .take()
            .unwrap_or(Err(ClientError::MissingField {
                operation: "createProfileStore",
                field: "storeId",
            }))
    }

    async fn status(&self) -> Result<ManagerStatus, ClientError> {
        self.record("getStatus".into());
        self.status.lock().expect("status").clone().ok_or_else(not_found)
    }

    async fn run_app_command(&self, app_id: &AppId, command: &str) -> Result<ProcessId, ClientError> {
        self.record(format!("runAppCommand {app_id} command={command}"));
        self.command_process
            .lock()
            .expect("command process")
            .take()
            .unwrap_or(Err(ClientError::MissingField {
                operation: "runAppCommand",
                field: "procId",
            }))
    }

    async fn get_app_process(
        &self,
        app_id: &AppId,
        process_id: &ProcessId,
    ) -> Result<Process, ClientError> {
        self.record(format!("getAppProc {app_id} {process_id}"));
        self.processes
            .lock()
            .expect("processes")
            .pop_front()
            .unwrap_or_else(|| Err(not_found()))
    }

    async fn list_app_processes(
        &self,
        app_id: &AppId,
        active: bool,
    ) -> Result<Vec<Process>, ClientError> {
        self.record(format!("getAppProcs {app_id} active={active}"));
        self.active_processes
            .lock()
            .expect("active processes")
            .take()
            .unwrap_or(Ok(Vec::new()))
    }
}

#[derive(Default)]
pub struct CountingRefresher {
    reloads: AtomicUsize,
}

impl CountingRefresher {
    pub fn reloads(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusRefresher for CountingRefresher {
    async fn reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn profile(id: &str, username: Option<&str>) -> Profile {
    Profile {
        id: ProfileId::new(id),
        username: username.map(str::to_string),
        email: None,
    }
}

pub fn store(id: &str, status: StoreStatus) -> Store {
    Store {
        id: StoreId::new(id),
        kind: Some("DOCKER_STORE".into()),
        owner: None,
        name: None,
        creation_date: None,
        usage: None,
        status: Some(status),
        log: None,
        location: None,
    }
}

pub fn process(id: &str, status: ProcessStatus) -> Process {
    Process {
        id: ProcessId::new(id),
        owner: None,
        app_id: None,
        name: None,
        task_list: None,
        context: None,
        log: None,
        status: Some(status),
        next_task_id: None,
        running_task_job_id: None,
        creation_date: None,
        start_date: None,
        end_date: None,
    }
}

/// Lets spawned poll timers run after virtual time moved.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
