//! Manager REST API: the operations the console consumes, and a `reqwest` implementation.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use shared::{
    domain::{AppId, ProcessId, ProfileId, StoreId},
    protocol::{CreateStoreResponse, ManagerStatus, Process, Profile, RunCommandResponse, Store},
};
use tracing::{debug, warn};
use url::Url;

use crate::{
    error::{ClientError, Result},
    session::PrincipalProvider,
};

#[async_trait]
pub trait ManagerApi: Send + Sync {
    async fn health(&self) -> Result<serde_json::Value>;
    async fn current_profile(&self) -> Result<Profile>;
    async fn list_profile_stores(&self, profile_id: &ProfileId) -> Result<Vec<StoreId>>;
    async fn get_profile_store(&self, profile_id: &ProfileId, store_id: &StoreId) -> Result<Store>;
    async fn list_store_processes(
        &self,
        profile_id: &ProfileId,
        store_id: &StoreId,
        active: bool,
    ) -> Result<Vec<Process>>;
    async fn create_profile_store(&self, profile_id: &ProfileId, name: &str) -> Result<StoreId>;
    async fn status(&self) -> Result<ManagerStatus>;
    async fn run_app_command(&self, app_id: &AppId, command: &str) -> Result<ProcessId>;
    async fn get_app_process(&self, app_id: &AppId, process_id: &ProcessId) -> Result<Process>;
    async fn list_app_processes(&self, app_id: &AppId, active: bool) -> Result<Vec<Process>>;
}

pub struct HttpManagerApi {
    http: Client,
    base_url: Url,
    principal: Arc<dyn PrincipalProvider>,
}

impl HttpManagerApi {
    pub fn new(base_url: &str, principal: Arc<dyn PrincipalProvider>) -> Result<Self> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            principal,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn execute(&self, operation: &'static str, request: RequestBuilder) -> Result<String> {
        let token = self.principal.access_token().await?;
        let response = request.bearer_auth(token).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!(operation, status = status.as_u16(), "manager api call failed");
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        debug!(operation, status = status.as_u16(), "manager api call succeeded");
        Ok(body)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = self.base_url.join(path)?;
        let body = self
            .execute(operation, self.http.get(url).query(query))
            .await?;
        decode_body(operation, &body)
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<T> {
        let url = self.base_url.join(path)?;
        let body = self
            .execute(operation, self.http.post(url).form(form))
            .await?;
        decode_body(operation, &body)
    }
}

/// Empty bodies decode as JSON `null`.
fn decode_body<T: DeserializeOwned>(operation: &'static str, body: &str) -> Result<T> {
    let body = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(body).map_err(|source| ClientError::Decode { operation, source })
}

fn active_flag(active: bool) -> &'static str {
    if active {
        "true"
    } else {
        "false"
    }
}

#[async_trait]
impl ManagerApi for HttpManagerApi {
    async fn health(&self) -> Result<serde_json::Value> {
        let url = self.base_url.join("/q/health")?;
        let body = self.execute("getHealth", self.http.get(url)).await?;
        // Health endpoints may answer with plain text.
        Ok(decode_body("getHealth", &body).unwrap_or(serde_json::Value::String(body)))
    }

    async fn current_profile(&self) -> Result<Profile> {
        // The manager answers with a redirect to /api/profiles/{id}; reqwest follows it.
        self.get_json("getCurrentProfile", "/api/profiles", &[]).await
    }

    async fn list_profile_stores(&self, profile_id: &ProfileId) -> Result<Vec<StoreId>> {
        self.get_json(
            "listProfileStores",
            &format!("/api/profiles/{profile_id}/stores"),
            &[],
        )
        .await
    }

    async fn get_profile_store(&self, profile_id: &ProfileId, store_id: &StoreId) -> Result<Store> {
        self.get_json(
            "getProfileStore",
            &format!("/api/profiles/{profile_id}/stores/{store_id}"),
            &[],
        )
        .await
    }

    async fn list_store_processes(
        &self,
        profile_id: &ProfileId,
        store_id: &StoreId,
        active: bool,
    ) -> Result<Vec<Process>> {
        self.get_json(
            "getProfileStoreProcesses",
            &format!("/api/profiles/{profile_id}/stores/{store_id}/processes"),
            &[("active", active_flag(active))],
        )
        .await
    }

    async fn create_profile_store(&self, profile_id: &ProfileId, name: &str) -> Result<StoreId> {
        let response: Option<CreateStoreResponse> = self
            .post_form(
                "createProfileStore",
                &format!("/api/profiles/{profile_id}/stores"),
                &[("name", name)],
            )
            .await?;
        response
            .and_then(|response| response.store_id)
            .filter(|store_id| !store_id.as_str().is_empty())
            .ok_or(ClientError::MissingField {
                operation: "createProfileStore",
                field: "storeId",
            })
    }

    async fn status(&self) -> Result<ManagerStatus> {
        self.get_json("getStatus", "/api/status", &[]).await
    }

    async fn run_app_command(&self, app_id: &AppId, command: &str) -> Result<ProcessId> {
        let response: Option<RunCommandResponse> = self
            .post_form(
                "runAppCommand",
                &format!("/api/apps/{app_id}/procs"),
                &[("command", command)],
            )
            .await?;
        response
            .and_then(|response| response.proc_id)
            .filter(|proc_id| !proc_id.as_str().is_empty())
            .ok_or(ClientError::MissingField {
                operation: "runAppCommand",
                field: "procId",
            })
    }

    async fn get_app_process(&self, app_id: &AppId, process_id: &ProcessId) -> Result<Process> {
        self.get_json(
            "getAppProc",
            &format!("/api/apps/{app_id}/procs/{process_id}"),
            &[],
        )
        .await
    }

    async fn list_app_processes(&self, app_id: &AppId, active: bool) -> Result<Vec<Process>> {
        self.get_json(
            "getAppProcs",
            &format!("/api/apps/{app_id}/procs"),
            &[("active", active_flag(active))],
        )
        .await
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
