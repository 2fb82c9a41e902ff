mod config;

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_profile, store_base_url, AppCommand, HttpManagerApi, ManagerApi, PrincipalProvider,
    StatusCache, StatusRefresher, StoreClient, StoreLocator, StoreProvisioning, TokenPrincipal,
};
use shared::{domain::AppId, protocol::Profile};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{load_settings, Settings};

#[derive(Parser, Debug)]
#[command(name = "mbyte-console", about = "Drive an mbyte manager from the terminal")]
struct Args {
    /// Flat key/value TOML file; environment variables override it.
    #[arg(long, default_value = "console.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manager health endpoint.
    Health,
    /// Profile of the signed-in user.
    Profile,
    /// Apps and stores known to the manager for this user.
    Status,
    /// Create a store and wait until it is ready.
    Provision {
        #[arg(long)]
        name: Option<String>,
    },
    /// Attach to the user's existing store and wait for it to settle.
    Store,
    /// Run a command against an app and wait for its process to finish.
    Run { app_id: String, command: String },
    /// Health endpoint of the user's store host.
    StoreHealth,
}

struct Console {
    settings: Settings,
    principal: Arc<TokenPrincipal>,
    api: Arc<HttpManagerApi>,
}

impl Console {
    fn new(settings: Settings) -> Result<Self> {
        let principal = Arc::new(TokenPrincipal::new(settings.access_token.clone()));
        let api = HttpManagerApi::new(settings.manager_base_url()?, principal.clone())
            .context("invalid manager base url")?;
        info!(manager = %api.base_url(), user = ?principal.user_id(), "console configured");
        Ok(Self {
            settings,
            principal,
            api: Arc::new(api),
        })
    }

    async fn profile(&self) -> Result<Profile> {
        load_profile(self.principal.as_ref(), self.api.as_ref())
            .await
            .context("failed to load profile")?
            .context("not signed in: set ACCESS_TOKEN")
    }

    async fn status_cache(&self) -> Arc<StatusCache> {
        let status = Arc::new(StatusCache::new(self.api.clone(), self.principal.clone()));
        status.reload().await;
        status
    }

    async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Health => print_json(&self.api.health().await?),
            Command::Profile => print_json(&self.profile().await?),
            Command::Status => {
                let view = self.status_cache().await.view();
                if let Some(error) = view.error {
                    bail!("failed to load manager status: {error}");
                }
                print_json(&view.status.unwrap_or_default())
            }
            Command::Provision { name } => {
                let profile = self.profile().await?;
                let status = self.status_cache().await;
                let controller = StoreProvisioning::new(self.api.clone(), status, Some(profile));
                controller.start(name.as_deref()).await;
                let view = controller.settled().await;
                info!(phase = ?view.phase, store_id = ?view.store_id, "provisioning settled");
                if let Some(error) = view.error {
                    bail!("store provisioning failed: {error}");
                }
                print_json(&view.store)
            }
            Command::Store => {
                let profile = self.profile().await?;
                let status = self.status_cache().await;
                let store_ids = status.store_ids();
                if store_ids.is_empty() {
                    bail!("no store yet: run `provision` first");
                }
                let controller = StoreProvisioning::new(self.api.clone(), status, Some(profile));
                controller.attach(&store_ids).await;
                let view = controller.settled().await;
                if let Some(error) = view.error {
                    bail!("store lookup failed: {error}");
                }
                print_json(&view.store)?;
                print_json(&view.processes)
            }
            Command::Run { app_id, command } => {
                let app_id = AppId::new(app_id);
                let controller = AppCommand::new(self.api.clone());
                controller.run_command(&app_id, &command).await;
                let view = controller.settled().await;
                info!(phase = ?view.phase, process_id = ?view.process_id, "command settled");
                if let Some(error) = view.error {
                    bail!("command {command} failed: {error}");
                }
                print_json(&view.current_process)
            }
            Command::StoreHealth => {
                let base_url = match self.settings.store_base_url()? {
                    Some(url) => url,
                    None => {
                        let profile = self.profile().await?;
                        store_base_url(
                            &StoreLocator::new(profile.username.unwrap_or_default()),
                            &self.settings.stores_domain,
                            &self.settings.stores_scheme,
                        )?
                    }
                };
                let client = StoreClient::new(base_url, self.principal.clone());
                print_json(&client.health().await?)
            }
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let settings = load_settings(&args.config);
    let console = Console::new(settings)?;
    console.run(args.command).await
}
