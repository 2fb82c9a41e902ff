//! Direct access to a user's store host, `<username>.<stores domain>`.

use std::sync::Arc;

use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::{
    error::{ClientError, Result},
    session::PrincipalProvider,
};

pub const DEFAULT_STORES_DOMAIN: &str = "s.mbyte.fr";
pub const DEFAULT_STORES_SCHEME: &str = "http";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLocator {
    pub username: String,
}

impl StoreLocator {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// Base URL of the store host, with a trailing slash so absolute paths join cleanly.
pub fn store_base_url(locator: &StoreLocator, domain: &str, scheme: &str) -> Result<Url> {
    let username = locator.username.trim();
    if username.is_empty() {
        return Err(ClientError::EmptyUsername);
    }
    Ok(Url::parse(&format!("{scheme}://{username}.{domain}/"))?)
}

pub struct StoreClient {
    http: Client,
    base_url: Url,
    principal: Arc<dyn PrincipalProvider>,
}

impl StoreClient {
    pub fn new(base_url: Url, principal: Arc<dyn PrincipalProvider>) -> Self {
        Self {
            http: Client::new(),
            base_url,
            principal,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn health(&self) -> Result<serde_json::Value> {
        let token = self.principal.access_token().await?;
        let url = self.base_url.join("/q/health")?;
        let response = self.http.get(url).bearer_auth(token).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::StoreHealth {
                status: status.as_u16(),
                body,
            });
        }
        debug!(store = %self.base_url, "store health fetched");
        Ok(serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body)))
    }
}

#[cfg(test)]
#[path = "tests/store_api_tests.rs"]
mod tests;
