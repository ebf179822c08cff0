//! SONiC lagmgrd entry point.

use clap::Parser;
use sonic_asic_platform::{IssuInfo, SimulatedPlatform};
use sonic_lagmgrd::audit::init_logging;
use sonic_lagmgrd::{LagDaemon, LagmgrConfig};
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

/// SONiC LAG management daemon
#[derive(Parser, Debug)]
#[command(name = "lagmgrd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = sonic_lagmgrd::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long)]
    log_level: Option<String>,

    /// RPC listen address
    #[arg(long)]
    listen: Option<String>,

    /// Warm boot from preserved HA state
    #[arg(short = 'w', long)]
    warm_boot: bool,

    /// Keep HA state on shutdown
    #[arg(short = 'k', long)]
    keep_ha_file: bool,

    /// HA file instance number
    #[arg(short = 'g', long)]
    ha_instance: Option<u32>,

    /// Run ISSU version upgrade (requires warm boot)
    #[arg(short = 'u', long)]
    issu: bool,

    /// ISSU start version
    #[arg(short = 's', long, requires = "issu")]
    start_version: Option<String>,

    /// ISSU current version
    #[arg(short = 'v', long, requires = "issu")]
    current_version: Option<String>,

    /// Platform SDK configuration file
    #[arg(short = 'y', long)]
    platform_config: Option<PathBuf>,
}

impl Args {
    fn apply(&self, config: &mut LagmgrConfig) {
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(listen) = &self.listen {
            config.server.listen_addr = listen.clone();
        }
        if self.warm_boot {
            config.platform.warm_boot = true;
        }
        if self.keep_ha_file {
            config.platform.keep_ha_file = true;
        }
        if self.ha_instance.is_some() {
            config.platform.ha_instance = self.ha_instance;
        }
        if self.issu {
            let issu = config.platform.issu.get_or_insert_with(IssuInfo::default);
            if self.start_version.is_some() {
                issu.start_version = self.start_version.clone();
            }
            if self.current_version.is_some() {
                issu.current_version = self.current_version.clone();
            }
        }
        if let Some(path) = &self.platform_config {
            config.platform.config_file = path.clone();
        }
    }
}

/// Installs the SIGTERM handler and returns a future that resolves on
/// SIGTERM or ctrl-c.
fn shutdown_signal() -> std::io::Result<impl Future<Output = ()> + Send + 'static> {
    #[cfg(unix)]
    let mut terminate =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    Ok(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = terminate.recv();
        #[cfg(not(unix))]
        let terminate = std::future::pending::<Option<()>>();

        tokio::select! {
            _ = ctrl_c => info!("Received ctrl-c, shutting down"),
            _ = terminate => info!("Received SIGTERM, shutting down"),
        }
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let (mut config, found) = match LagmgrConfig::load(&args.config) {
        Ok(Some(config)) => (config, true),
        Ok(None) => (LagmgrConfig::default(), false),
        Err(e) => {
            eprintln!("lagmgrd: {}", e);
            return ExitCode::FAILURE;
        }
    };
    args.apply(&mut config);

    init_logging(&config.logging.level, config.logging.format);

    info!("Starting SONiC lagmgrd");
    if !found {
        info!(path = %args.config.display(), "Config file not found, using defaults");
    }
    info!(config = %args.config.display(), listen = %config.server.listen_addr, "Configuration loaded");
    if config.platform.warm_boot {
        info!("Warm boot mode: ENABLED");
    }

    let shutdown = match shutdown_signal() {
        Ok(shutdown) => shutdown,
        Err(e) => {
            error!(error = %e, "Failed to install signal handlers");
            return ExitCode::FAILURE;
        }
    };

    let platform = Arc::new(SimulatedPlatform::default());
    let daemon = LagDaemon::new(config, platform);

    match daemon.run(shutdown).await {
        Ok(()) => {
            info!("lagmgrd exited cleanly");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "lagmgrd failed");
            ExitCode::FAILURE
        }
    }
}
