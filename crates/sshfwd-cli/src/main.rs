use std::sync::Arc;
use clap::{Parser, Subcommand};
use merge::Merge;
use sshfwd_config::{Config, ConfigService, ConfigServiceImpl};
use sshfwd_logging::init_logging;
use sshfwd_ssh::{
    Forwarder, ForwarderFactory, ForwardingDirection, PortPairs, RemoteConnection,
    SshForwarderFactory, SshRemoteConnection, KEEP_ALIVE_COMMAND,
};
use sshfwd_traits::forward::forwarding_args;
use tokio::signal;
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Device under test. Omit or use a loopback name for a local device.
    #[arg(long, env = "SSHFWD_HOST")]
    pub host: Option<String>,
    #[arg(long)]
    pub ssh_port: Option<u16>,
    #[arg(long)]
    pub ssh_username: Option<String>,
    #[arg(long)]
    pub ssh_identity: Option<String>,
    #[arg(long)]
    pub ssh_binary: Option<String>,
    /// http port pair as LOCAL:REMOTE.
    #[arg(long)]
    pub http: Option<String>,
    #[arg(long)]
    pub https: Option<String>,
    #[arg(long)]
    pub dns: Option<String>,
    /// R: the device listens and forwards back to us. L: we listen and forward to the device.
    #[arg(long)]
    pub direction: Option<String>,
    #[arg(long)]
    pub ready_timeout_secs: Option<u64>,
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,
    #[arg(long)]
    pub log_level: Option<String>,
    #[arg(long)]
    pub config: Option<String>,
    #[arg(long)]
    pub no_color: bool,
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Opens the forwarding and holds it until Ctrl+C.
    Forward,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // --- Configuration Setup ---
    let file_config = match &cli.config {
        Some(path) => ConfigServiceImpl::load_from_file(path)?,
        None => ConfigServiceImpl::load_from_paths()?,
    };
    let cli_config = Config {
        hostname: cli.host,
        ssh_port: cli.ssh_port,
        ssh_username: cli.ssh_username,
        ssh_identity: cli.ssh_identity,
        ssh_binary: cli.ssh_binary,
        http: cli.http,
        https: cli.https,
        dns: cli.dns,
        direction: cli.direction,
        ready_timeout_secs: cli.ready_timeout_secs,
        poll_interval_ms: cli.poll_interval_ms,
        log_level: cli.log_level,
    };
    let mut config = Config::default();
    config.merge(file_config);
    config.merge(cli_config);

    // --- Logging ---
    init_logging(config.log_level.as_deref().unwrap_or("info"), !cli.no_color)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    // --- Path Expansion ---
    if let Some(path) = config.ssh_identity.clone() {
        let expanded = ConfigServiceImpl::expand_tilde(&path)
            .ok_or_else(|| anyhow::anyhow!("Cannot resolve home directory for '{}'", path))?;
        config.ssh_identity = Some(expanded.to_string_lossy().into_owned());
    }

    debug!("Final configuration: {:#?}", config);

    let port_pairs = config.port_pairs()?;
    if port_pairs.http.is_none() {
        anyhow::bail!("An http port pair is required (--http LOCAL:REMOTE)");
    }
    let direction = config.direction()?;
    let remote = Arc::new(SshRemoteConnection::new(&config));

    match cli.command {
        Commands::Forward => {
            if cli.dry_run {
                dry_run(&remote, port_pairs, direction);
                return Ok(());
            }
            forward(remote, &config, port_pairs, direction).await
        }
    }
}

fn dry_run(remote: &SshRemoteConnection, port_pairs: PortPairs, direction: ForwardingDirection) {
    if remote.is_local() {
        info!("[dry-run] Device is local, nothing would be forwarded");
        return;
    }
    let command_line =
        remote.form_ssh_command_line(&KEEP_ALIVE_COMMAND, &forwarding_args(&port_pairs, direction));
    info!("[dry-run] Would execute the following steps:");
    info!("[dry-run] 1. Run: {}", command_line.join(" "));
    info!("[dry-run] 2. Wait for an HTTP server behind the forwarded port");
    info!("[dry-run] 3. On exit, kill the SSH process");
}

async fn forward(
    remote: Arc<SshRemoteConnection>,
    config: &Config,
    port_pairs: PortPairs,
    direction: ForwardingDirection,
) -> anyhow::Result<()> {
    let factory = SshForwarderFactory::new(remote, config.wait_policy());
    info!("Opening forwarding to {}...", config.hostname.as_deref().unwrap_or("localhost"));
    let mut forwarder = factory.create(port_pairs, direction).await?;
    info!(
        "Forwarded endpoint is {}:{}",
        forwarder.host_ip(),
        forwarder.host_port()
    );
    info!("Press Ctrl+C to exit.");

    // Wait for either the tunnel to drop or for a shutdown signal
    tokio::select! {
        res = forwarder.wait_exit() => {
            if let Err(e) = res {
                error!("Forwarding failed: {}", e);
            }
        }
        res = signal::ctrl_c() => {
            match res {
                Ok(()) => warn!("Received shutdown signal. Cleaning up..."),
                Err(e) => error!("Failed to listen for ctrl-c: {}", e),
            }
        }
    }

    forwarder.close().await;
    info!("Shutdown complete.");
    Ok(())
}
