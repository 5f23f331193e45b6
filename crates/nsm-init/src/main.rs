//! nsm-init - connects a workload to its network services before it starts.
//!
//! Reads the desired services from a mounted configuration resource, waits
//! for the local NSM to answer discovery, then requests a connection for
//! each service in order. Exits with status 1 on the first failure.

use anyhow::{Context, Result};
use clap::Parser;
use nsm_init_core::{
    current_netns, load_desired_services, ClientConfig, InitConfig, InitOutcome, Initializer,
    IpcBrokerClient, Metadata, RetryPolicy, TokioClock,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "nsm-init")]
#[command(about = "Request NSM connections for a workload")]
struct Args {
    /// Location of NSM process client access socket
    #[arg(long = "nsm-socket", default_value_os_t = ClientConfig::default_socket_path())]
    nsm_socket: PathBuf,

    /// Mounted configuration resource with the requested network services
    #[arg(long, env = "NSM_CONFIG")]
    config: Option<PathBuf>,

    /// Namespace of the workload
    #[arg(long, env = "INIT_NAMESPACE", default_value = "")]
    namespace: String,

    /// Name of the workload
    #[arg(long = "pod-name", env = "HOSTNAME", default_value = "")]
    pod_name: String,

    /// Idempotency token for connection requests (random per process if unset)
    #[arg(long = "request-id", env = "POD_UID")]
    request_id: Option<String>,

    /// Time to wait for each of discovery and connection admission
    #[arg(long = "timeout-secs", default_value_t = ClientConfig::CONNECTION_TIMEOUT.as_secs())]
    timeout_secs: u64,

    /// Interval between attempts
    #[arg(long = "retry-interval-secs", default_value_t = ClientConfig::CONNECTION_RETRY_INTERVAL.as_secs())]
    retry_interval_secs: u64,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn init_config(&self) -> InitConfig {
        let request_id = self
            .request_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut config = InitConfig::new(
            Metadata::new(self.pod_name.clone(), self.namespace.clone()),
            request_id,
        )
        .with_socket_path(&self.nsm_socket)
        .with_policy(RetryPolicy::new(
            Duration::from_secs(self.timeout_secs),
            Duration::from_secs(self.retry_interval_secs),
        ));
        if let Some(path) = &self.config {
            config = config.with_services_path(path);
        }
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    match run(&args.init_config()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("nsm client: {:#}, exiting...", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &InitConfig) -> Result<()> {
    let Some(services_path) = &config.services_path else {
        info!("nsm client: no client's configuration was provided, exiting...");
        return Ok(());
    };

    config.validate()?;

    let desired = load_desired_services(services_path).await.with_context(|| {
        format!(
            "failure to parse client's configuration {}",
            services_path.display()
        )
    })?;
    if desired.is_empty() {
        info!(
            "nsm client: no NetworkServices were discovered in client's configuration {}, exiting...",
            services_path.display()
        );
        return Ok(());
    }

    let broker = IpcBrokerClient::connect(&config.socket_path).await?;

    let linux_namespace = current_netns().with_context(|| {
        format!(
            "failed to get a linux namespace for pod {}",
            config.requester
        )
    })?;

    let outcome = Initializer::new(config, &broker, &TokioClock)
        .run(&desired, &linux_namespace)
        .await?;

    match outcome {
        InitOutcome::Connected(connections) => info!(
            "nsm client: initialization is completed successfully, {} connections established",
            connections.len()
        ),
        InitOutcome::NothingRequested | InitOutcome::NoServicesDiscovered => {
            info!("nsm client: nothing to connect, exiting...")
        }
    }

    Ok(())
}
