use std::{collections::HashMap, fs, path::Path};

use anyhow::{anyhow, Context};
use client_core::store_api::{DEFAULT_STORES_DOMAIN, DEFAULT_STORES_SCHEME};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub manager_base_url: Option<String>,
    /// Overrides the `<username>.<stores_domain>` store host.
    pub store_base_url: Option<String>,
    pub stores_domain: String,
    pub stores_scheme: String,
    pub access_token: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            manager_base_url: None,
            store_base_url: None,
            stores_domain: DEFAULT_STORES_DOMAIN.into(),
            stores_scheme: DEFAULT_STORES_SCHEME.into(),
            access_token: None,
        }
    }
}

impl Settings {
    pub fn manager_base_url(&self) -> anyhow::Result<&str> {
        self.manager_base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| anyhow!("MANAGER_BASE_URL is not set (env or console.toml manager_base_url)"))
    }

    pub fn store_base_url(&self) -> anyhow::Result<Option<Url>> {
        self.store_base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .map(|url| Url::parse(url).with_context(|| format!("invalid STORE_BASE_URL {url:?}")))
            .transpose()
    }
}

pub fn load_settings(path: &Path) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());

    settings
}

fn apply_file(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) else {
        tracing::warn!("ignoring console config: expected a flat table of strings");
        return;
    };
    if let Some(v) = file_cfg.get("manager_base_url") {
        settings.manager_base_url = Some(v.clone());
    }
    if let Some(v) = file_cfg.get("store_base_url") {
        settings.store_base_url = Some(v.clone());
    }
    if let Some(v) = file_cfg.get("stores_domain") {
        settings.stores_domain = v.clone();
    }
    if let Some(v) = file_cfg.get("stores_scheme") {
        settings.stores_scheme = v.clone();
    }
    if let Some(v) = file_cfg.get("access_token") {
        settings.access_token = Some(v.clone());
    }
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("MANAGER_BASE_URL") {
        settings.manager_base_url = Some(v);
    }
    if let Some(v) = var("APP__MANAGER_BASE_URL") {
        settings.manager_base_url = Some(v);
    }

    if let Some(v) = var("STORE_BASE_URL") {
        settings.store_base_url = Some(v);
    }

    if let Some(v) = var("STORES_DOMAIN") {
        settings.stores_domain = v;
    }
    if let Some(v) = var("STORES_SCHEME") {
        settings.stores_scheme = v;
    }

    if let Some(v) = var("ACCESS_TOKEN") {
        settings.access_token = Some(v);
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
