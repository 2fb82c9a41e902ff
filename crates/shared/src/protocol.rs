use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    AppId, ApplicationStatus, ProcessId, ProcessStatus, ProfileId, StoreId, StoreStatus,
};

/// Application type the manager assigns to store backends.
pub const DOCKER_STORE_APP_TYPE: &str = "DOCKER_STORE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: ProfileId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Profile {
    /// Name given to a store created for this profile: the username, or the id when it has none.
    pub fn store_name(&self) -> &str {
        self.username.as_deref().unwrap_or(self.id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub id: StoreId,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StoreStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Store {
    pub fn is_provisioning(&self) -> bool {
        self.status.is_some_and(StoreStatus::is_provisioning)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries: Option<BTreeMap<String, BTreeMap<String, serde_json::Value>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    pub id: ProcessId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<AppId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_list: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ProcessContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ProcessStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running_task_job_id: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub end_date: Option<DateTime<Utc>>,
}

impl Process {
    pub fn is_task_running(&self) -> bool {
        self.status.is_some_and(ProcessStatus::is_task_running)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: AppId,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ApplicationStatus>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub creation_date: Option<DateTime<Utc>>,
}

impl Application {
    pub fn is_store(&self) -> bool {
        self.kind.as_deref() == Some(DOCKER_STORE_APP_TYPE)
    }
}

/// Body of `GET /api/status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManagerStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(
        rename = "connected-profile",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub connected_profile: Option<String>,
    #[serde(default)]
    pub stores: Vec<StoreId>,
    #[serde(default)]
    pub apps: Vec<Application>,
}

impl ManagerStatus {
    /// Known store ids: the explicit `stores` list first, then store-typed apps not already listed.
    pub fn store_ids(&self) -> Vec<StoreId> {
        let mut ids = self.stores.clone();
        for app in self.apps.iter().filter(|app| app.is_store()) {
            let id = StoreId::new(app.id.as_str());
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    pub fn has_app(&self) -> bool {
        !self.apps.is_empty()
    }

    pub fn has_store(&self) -> bool {
        !self.store_ids().is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStoreResponse {
    #[serde(default)]
    pub store_id: Option<StoreId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCommandResponse {
    #[serde(default)]
    pub proc_id: Option<ProcessId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_decodes_manager_payload() {
        let store: Store = serde_json::from_str(
            r#"{"id":"s1","type":"DOCKER_STORE","owner":"u1","name":"alice",
                "creationDate":1735689600000,"status":"STARTING","location":"alice.s.mbyte.fr"}"#,
        )
        .expect("decode store");

        assert_eq!(store.id, StoreId::new("s1"));
        assert_eq!(store.status, Some(StoreStatus::Starting));
        assert!(store.is_provisioning());
        assert_eq!(
            store.creation_date.map(|date| date.timestamp_millis()),
            Some(1_735_689_600_000)
        );
    }

    #[test]
    fn store_without_status_is_not_provisioning() {
        let store: Store = serde_json::from_str(r#"{"id":"s1"}"#).expect("decode store");
        assert!(!store.is_provisioning());
    }

    #[test]
    fn process_decodes_context_entries() {
        let process: Process = serde_json::from_str(
            r#"{"id":"p1","appId":"a1","status":"TASK_RUNNING",
                "taskList":["create-volume","start-store"],
                "context":{"entries":{"create-volume":{"volume":"vol-1"}}}}"#,
        )
        .expect("decode process");

        assert!(process.is_task_running());
        assert_eq!(process.app_id, Some(AppId::new("a1")));
        let entries = process
            .context
            .and_then(|context| context.entries)
            .expect("entries");
        assert_eq!(entries["create-volume"]["volume"], "vol-1");
    }

    #[test]
    fn profile_store_name_falls_back_to_id() {
        let named = Profile {
            id: ProfileId::new("u1"),
            username: Some("alice".into()),
            email: None,
        };
        assert_eq!(named.store_name(), "alice");

        let anonymous = Profile {
            id: ProfileId::new("u1"),
            username: None,
            email: None,
        };
        assert_eq!(anonymous.store_name(), "u1");

        let blank = Profile {
            id: ProfileId::new("u1"),
            username: Some(String::new()),
            email: None,
        };
        assert_eq!(blank.store_name(), "");
    }

    #[test]
    fn manager_status_merges_store_list_and_store_apps() {
        let status: ManagerStatus = serde_json::from_str(
            r#"{"status":"ok","connected-profile":"alice","stores":["s1"],
                "apps":[{"id":"s1","type":"DOCKER_STORE"},{"id":"s2","type":"DOCKER_STORE"},
                        {"id":"a9","type":"DOKKU_APP"}]}"#,
        )
        .expect("decode status");

        assert_eq!(status.store_ids(), vec![StoreId::new("s1"), StoreId::new("s2")]);
        assert!(status.has_app());
        assert!(status.has_store());
    }

    #[test]
    fn manager_status_decodes_started_and_unlisted_app_statuses() {
        let status: ManagerStatus = serde_json::from_str(
            r#"{"status":"ok","stores":["s1"],
                "apps":[{"id":"s1","type":"DOCKER_STORE","status":"STARTED"},
                        {"id":"s2","type":"DOCKER_STORE","status":"CREATED"},
                        {"id":"a9","type":"DOKKU_APP","status":"STOPPED"}]}"#,
        )
        .expect("decode status");

        assert_eq!(status.store_ids(), vec![StoreId::new("s1"), StoreId::new("s2")]);
        let statuses: Vec<_> = status.apps.iter().map(|app| app.status).collect();
        assert_eq!(
            statuses,
            vec![
                Some(ApplicationStatus::Started),
                Some(ApplicationStatus::Created),
                Some(ApplicationStatus::Unknown),
            ]
        );
    }

    #[test]
    fn empty_manager_status_has_nothing() {
        let status: ManagerStatus = serde_json::from_str(r#"{"status":"ok"}"#).expect("decode");
        assert!(!status.has_app());
        assert!(!status.has_store());
    }
}
