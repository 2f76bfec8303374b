use crate::analyzer::{analyze, ModelArtifact};
use crate::api::server::start_server;
use crate::config::DeployerConfig;
use crate::deployment::observer::{ChannelObserver, DeploymentEvent};
use crate::deployment::{DeploymentOrchestrator, ResourceConfig};
use crate::poller::StatusPoller;
use crate::utils::loop_heartbeats::LoopHeartbeats;
use anyhow::{anyhow, bail, Result};
use clap::{Args, Parser, Subcommand};
use log::{error, info, warn};
use serde::Serialize;
use shared::models::volume::{VolumeRequest, VolumeUpdate, DEFAULT_VOLUME_UNIT};
use shared::provider::{ModelCatalog, ProviderClient, ResourceProvider, DEFAULT_PROVIDER_URL};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

#[derive(Parser)]
#[command(author, version, about = "Deploy model artifacts onto GPULab", long_about = None)]
pub struct Cli {
    /// GPULab API base URL
    #[arg(long, global = true, default_value = DEFAULT_PROVIDER_URL)]
    pub provider_url: String,

    /// URL recorded as the author of registered models
    #[arg(long, global = true, default_value = "http://localhost:8090")]
    pub author_url: String,

    /// Log level
    #[arg(short = 'l', long, global = true, default_value = "info")]
    pub log_level: String,

    /// Per-request timeout in seconds (transport default when unset)
    #[arg(long, global = true)]
    pub request_timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the deployment descriptor for a model file
    Analyze { path: PathBuf },

    /// Analyze a model file and deploy it
    Deploy {
        path: PathBuf,

        #[command(flatten)]
        resources: ResourceArgs,
    },

    /// List deployed models
    Models,

    /// Manage network volumes
    Volumes {
        #[command(subcommand)]
        action: VolumeCommands,
    },

    /// List GPU types that are currently available
    Gpus,

    /// Check that the provider is reachable with the configured key
    CheckConnection,

    /// Delete resources left behind by a failed deployment
    Cleanup {
        #[arg(long)]
        model_id: Option<String>,

        #[arg(long)]
        volume_id: Option<String>,

        #[arg(long)]
        container_address: Option<String>,
    },

    /// Run the status poller and the HTTP API
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        #[arg(short = 'p', long, default_value = "8090")]
        port: u16,

        /// Seconds between model status refreshes
        #[arg(short = 'i', long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..))]
        poll_interval: u64,

        /// Admin api key
        #[arg(short = 'a', long, default_value = "admin")]
        admin_api_key: String,
    },
}

#[derive(Subcommand)]
pub enum VolumeCommands {
    /// List network volumes
    List,

    /// Resize or rename a network volume
    Resize {
        id: String,

        /// Template name the volume is known by
        #[arg(long)]
        name: String,

        #[arg(long)]
        space: u32,

        #[arg(long, default_value = DEFAULT_VOLUME_UNIT)]
        unit: String,

        #[arg(long)]
        region: Option<String>,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ResourceArgs {
    #[arg(long)]
    pub gpu_count: Option<u32>,

    #[arg(long)]
    pub gpu_type: Option<String>,

    /// Minimum GPU memory in GB
    #[arg(long)]
    pub min_vram: Option<u32>,

    /// Container disk in GB
    #[arg(long)]
    pub container_disk: Option<u32>,

    /// Model volume disk in GB
    #[arg(long)]
    pub volume_disk: Option<u32>,

    /// Container environment variable, KEY=VALUE; repeatable
    #[arg(long = "env", value_parser = parse_env_var)]
    pub env: Vec<(String, String)>,

    /// Redeploy onto this running container instead of a new one
    #[arg(long)]
    pub existing_container: Option<String>,

    #[arg(long)]
    pub gpu_memory_fraction: Option<f64>,

    #[arg(long)]
    pub cpu_limit: Option<String>,

    #[arg(long)]
    pub network_tier: Option<String>,

    #[arg(long, default_value = "false")]
    pub auto_scaling: bool,

    #[arg(long, default_value = "false")]
    pub monitoring: bool,
}

fn parse_env_var(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{value}'")),
    }
}

impl From<ResourceArgs> for ResourceConfig {
    fn from(args: ResourceArgs) -> Self {
        ResourceConfig {
            gpu_memory_fraction: args.gpu_memory_fraction,
            cpu_limit: args.cpu_limit,
            network_tier: args.network_tier,
            auto_scaling: args.auto_scaling,
            monitoring: args.monitoring,
            gpu_count: args.gpu_count,
            gpu_type: args.gpu_type,
            min_vram: args.min_vram,
            container_disk: args.container_disk,
            volume_disk: args.volume_disk,
            env_vars: args.env.into_iter().collect(),
            existing_container_address: args.existing_container,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_progress(event: &DeploymentEvent) {
    if let Some((index, step)) = event
        .steps
        .iter()
        .enumerate()
        .find(|(_, step)| step.id == event.transition.step)
    {
        println!(
            "[{}/{}] {}: {}",
            index + 1,
            event.steps.len(),
            step.name,
            step.status
        );
    }
}

pub async fn execute(cli: Cli) -> Result<()> {
    let Cli {
        provider_url,
        author_url,
        request_timeout,
        command,
        ..
    } = cli;
    let connect = || -> Result<(DeployerConfig, Arc<ProviderClient>)> {
        let config = DeployerConfig::from_env(
            &provider_url,
            &author_url,
            request_timeout.map(Duration::from_secs),
        )?;
        let provider = Arc::new(config.provider_client()?);
        Ok((config, provider))
    };

    match command {
        Commands::Analyze { path } => {
            let artifact = ModelArtifact::from_path(&path)?;
            print_json(&analyze(&artifact)?)
        }
        Commands::Deploy { path, resources } => {
            let artifact = ModelArtifact::from_path(&path)?;
            let descriptor = analyze(&artifact)?;
            let (config, provider) = connect()?;
            let orchestrator = DeploymentOrchestrator::new(provider, config.author_url);

            let (tx, mut rx) = mpsc::unbounded_channel();
            let printer = tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    print_progress(&event);
                }
            });
            let observer = ChannelObserver::new(tx);
            let outcome = orchestrator
                .deploy(&artifact, &descriptor, &resources.into(), &observer)
                .await;
            drop(observer);
            printer.await?;

            if outcome.success {
                match &outcome.endpoint {
                    Some(endpoint) => println!("Deployed: {endpoint}"),
                    None => println!("Deployed without a public endpoint"),
                }
                return Ok(());
            }
            if outcome.created.any() {
                println!("Resources left behind: {}", outcome.created);
                println!("Remove them with the cleanup command.");
            }
            Err(anyhow!(
                "Deployment failed: {}",
                outcome.error.unwrap_or_default()
            ))
        }
        Commands::Models => {
            let (_, provider) = connect()?;
            let models = provider
                .list_models()
                .await
                .into_result("Failed to fetch models")
                .map_err(anyhow::Error::msg)?;
            print_json(&models)
        }
        Commands::Volumes { action } => {
            let (_, provider) = connect()?;
            match action {
                VolumeCommands::List => {
                    let volumes = provider
                        .list_volumes()
                        .await
                        .into_result("Failed to list network volumes")
                        .map_err(anyhow::Error::msg)?;
                    print_json(&volumes)
                }
                VolumeCommands::Resize {
                    id,
                    name,
                    space,
                    unit,
                    region,
                } => {
                    let mut volume = VolumeRequest::builder(name).volume_space(space).unit(unit);
                    if let Some(region) = region {
                        volume = volume.region_type(region);
                    }
                    let update = VolumeUpdate::new(id, volume.build()?)?;
                    resize_volume(provider.as_ref(), &update).await
                }
            }
        }
        Commands::Gpus => {
            let (_, provider) = connect()?;
            let gpus = provider
                .list_gpus()
                .await
                .into_result("Failed to fetch GPUs")
                .map_err(anyhow::Error::msg)?;
            print_json(&gpus)
        }
        Commands::CheckConnection => {
            let (_, provider) = connect()?;
            let health = provider
                .check_connection()
                .await
                .into_result("Failed to connect to GPULab")
                .map_err(anyhow::Error::msg)?;
            print_json(&health)
        }
        Commands::Cleanup {
            model_id,
            volume_id,
            container_address,
        } => {
            let (_, provider) = connect()?;
            cleanup(
                provider.as_ref(),
                model_id.as_deref(),
                volume_id.as_deref(),
                container_address.as_deref(),
            )
            .await
        }
        Commands::Serve {
            host,
            port,
            poll_interval,
            admin_api_key,
        } => {
            let (config, provider) = connect()?;
            let stale_after = poll_interval.saturating_mul(4).max(120);
            let heartbeats = Arc::new(LoopHeartbeats::with_threshold(
                i64::try_from(stale_after).unwrap_or(i64::MAX),
            ));
            let orchestrator = Arc::new(DeploymentOrchestrator::new(
                provider.clone(),
                config.author_url,
            ));
            let poller = Arc::new(StatusPoller::new(
                provider,
                Duration::from_secs(poll_interval),
                Some(heartbeats.clone()),
            ));

            let mut tasks: JoinSet<Result<()>> = JoinSet::new();
            let poller_task = poller.clone();
            tasks.spawn(async move { poller_task.run().await });

            tokio::select! {
                res = start_server(&host, port, orchestrator, poller.clone(), heartbeats, admin_api_key) => {
                    if let Err(e) = res {
                        error!("Server error: {e}");
                    }
                }
                Some(res) = tasks.join_next() => {
                    if let Err(e) = res? {
                        error!("Task error: {e}");
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                }
            }

            poller.stop();
            tasks.shutdown().await;
            Ok(())
        }
    }
}

pub async fn resize_volume(provider: &dyn ResourceProvider, update: &VolumeUpdate) -> Result<()> {
    provider
        .update_volume(update)
        .await
        .into_result("Failed to update network volume")
        .map_err(anyhow::Error::msg)?;
    info!(
        "Updated volume {} to {} {}",
        update.volume_server_identifier, update.volume.volume_space, update.volume.unit
    );
    Ok(())
}

/// Deletes the given resources newest first. Every deletion is attempted even
/// when an earlier one fails.
pub async fn cleanup(
    provider: &dyn ResourceProvider,
    model_id: Option<&str>,
    volume_id: Option<&str>,
    container_address: Option<&str>,
) -> Result<()> {
    if model_id.is_none() && volume_id.is_none() && container_address.is_none() {
        bail!("Nothing to clean up: pass --model-id, --volume-id or --container-address");
    }

    let mut failures = Vec::new();
    if let Some(address) = container_address {
        match provider.delete_container(address).await.into_result("Failed to delete container") {
            Ok(_) => info!("Deleted container {address}"),
            Err(e) => failures.push(format!("container {address}: {e}")),
        }
    }
    if let Some(id) = volume_id {
        match provider.delete_volume(id).await.into_result("Failed to delete volume") {
            Ok(_) => info!("Deleted volume {id}"),
            Err(e) => failures.push(format!("volume {id}: {e}")),
        }
    }
    if let Some(id) = model_id {
        match provider.delete_model(id).await.into_result("Failed to delete model") {
            Ok(_) => info!("Deleted model {id}"),
            Err(e) => failures.push(format!("model {id}: {e}")),
        }
    }

    if failures.is_empty() {
        return Ok(());
    }
    for failure in &failures {
        warn!("Cleanup failed for {failure}");
    }
    bail!("{} cleanup step(s) failed", failures.len())
}
