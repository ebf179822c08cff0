//! Daemon lifecycle: platform init, registry restore, serve, drain,
//! snapshot and platform shutdown.

use sonic_asic_platform::{Platform, PlatformError};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::config::{ConfigError, LagmgrConfig};
use crate::gate::GateState;
use crate::metrics::LagMetrics;
use crate::registry::LagRegistry;
use crate::server;
use crate::service::LagService;
use crate::snapshot::{SnapshotError, SnapshotStore};

const SOURCE: &str = "lagmgrd";

/// Errors that stop the daemon.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("Failed to create metrics: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("RPC server failed: {0}")]
    Server(#[source] std::io::Error),
}

/// The LAG management daemon.
pub struct LagDaemon {
    config: LagmgrConfig,
    platform: Arc<dyn Platform>,
    snapshots: Option<SnapshotStore>,
}

impl LagDaemon {
    pub fn new(config: LagmgrConfig, platform: Arc<dyn Platform>) -> Self {
        let snapshots = config
            .snapshot
            .enabled
            .then(|| SnapshotStore::new(config.snapshot.path.clone()));
        Self {
            config,
            platform,
            snapshots,
        }
    }

    /// Binds the configured address and runs until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<(), DaemonError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.config.validate()?;
        let addr = self.config.listen_addr()?;
        let service = self.start().await?;

        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(source) => {
                error!(%addr, error = %source, "Failed to bind RPC listener");
                let _ = self.stop(&service).await;
                return Err(DaemonError::Bind { addr, source });
            }
        };

        self.serve(listener, service, shutdown).await
    }

    /// Runs on an already bound listener until `shutdown` resolves.
    pub async fn run_with_listener<F>(
        self,
        listener: TcpListener,
        shutdown: F,
    ) -> Result<(), DaemonError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.config.validate()?;
        let service = self.start().await?;
        self.serve(listener, service, shutdown).await
    }

    async fn serve<F>(
        &self,
        listener: TcpListener,
        service: LagService,
        shutdown: F,
    ) -> Result<(), DaemonError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let gate = Arc::clone(service.gate());
        let drain_timeout = self.config.drain_timeout();
        let drain = async move {
            shutdown.await;
            info!("Shutdown requested, closing service gate");
            let remaining = gate.drain(drain_timeout).await;
            if remaining > 0 {
                warn!(remaining, "Stopping with operations still in flight");
            }
        };

        let served = server::serve(listener, service.clone(), drain)
            .await
            .map_err(DaemonError::Server);
        if let Err(e) = &served {
            error!(error = %e, "RPC server stopped unexpectedly");
        }

        let stopped = self.stop(&service).await;
        served.and(stopped)
    }

    /// Brings up the platform, restores the registry and opens the gate.
    pub async fn start(&self) -> Result<LagService, DaemonError> {
        let platform_config = &self.config.platform;
        info!(
            platform = self.platform.name(),
            warm_boot = platform_config.warm_boot,
            "Starting LAG management daemon"
        );

        if let Err(e) = self.platform.init(platform_config).await {
            audit_log!(AuditRecord::new(
                AuditCategory::SystemLifecycle,
                SOURCE,
                "platform_init"
            )
            .with_object_type("platform")
            .with_object_id(self.platform.name())
            .with_error(e.to_string()));
            error!(error = %e, "Platform initialization failed");
            return Err(e.into());
        }
        audit_log!(AuditRecord::new(AuditCategory::SystemLifecycle, SOURCE, "platform_init")
            .with_object_type("platform")
            .with_object_id(self.platform.name())
            .with_outcome(AuditOutcome::Success));

        let registry = match self.restore() {
            Ok(registry) => registry,
            Err(e) => {
                error!(error = %e, "Failed to restore LAG registry");
                if let Err(shutdown_err) = self.platform.shutdown(Default::default()).await {
                    warn!(error = %shutdown_err, "Platform shutdown after failed restore");
                }
                return Err(e);
            }
        };

        let metrics = LagMetrics::new()?;
        let service = LagService::new(registry, metrics, self.config.lock_timeout());
        service.gate().open();
        Ok(service)
    }

    fn restore(&self) -> Result<LagRegistry, DaemonError> {
        let Some(store) = &self.snapshots else {
            return Ok(LagRegistry::new());
        };

        if !self.config.platform.warm_boot {
            if store.path().exists() {
                info!(path = %store.path().display(), "Cold boot, ignoring LAG snapshot");
            }
            return Ok(LagRegistry::new());
        }

        let restored = store.load();
        let record = AuditRecord::new(AuditCategory::WarmRestart, SOURCE, "restore_snapshot")
            .with_object_type("snapshot")
            .with_object_id(store.path().display().to_string());
        match restored {
            Ok(Some(registry)) => {
                audit_log!(record
                    .with_details(serde_json::json!({
                        "lags": registry.lag_count(),
                        "members": registry.member_count(),
                    }))
                    .with_outcome(AuditOutcome::Success));
                Ok(registry)
            }
            Ok(None) => {
                warn!("Warm boot without LAG snapshot, starting empty");
                Ok(LagRegistry::new())
            }
            Err(e) => {
                audit_log!(record.with_error(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Closes the gate, saves the snapshot if HA state is kept, and shuts
    /// the platform down.
    pub async fn stop(&self, service: &LagService) -> Result<(), DaemonError> {
        if service.gate().state() != GateState::Stopped {
            service.gate().drain(self.config.drain_timeout()).await;
        }

        let flags = self.config.platform.shutdown_flags();
        let saved = match &self.snapshots {
            Some(store) if flags.keep_ha_file => {
                let registry = service.registry().read().await;
                let saved = store.save(&registry);
                let record =
                    AuditRecord::new(AuditCategory::WarmRestart, SOURCE, "save_snapshot")
                        .with_object_type("snapshot")
                        .with_object_id(store.path().display().to_string());
                match &saved {
                    Ok(()) => {
                        audit_log!(record.with_outcome(AuditOutcome::Success));
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to save LAG snapshot");
                        audit_log!(record.with_error(e.to_string()));
                    }
                }
                saved.map_err(DaemonError::from)
            }
            _ => Ok(()),
        };

        let shutdown = self.platform.shutdown(flags).await;
        let record = AuditRecord::new(AuditCategory::SystemLifecycle, SOURCE, "platform_shutdown")
            .with_object_type("platform")
            .with_object_id(self.platform.name());
        match &shutdown {
            Ok(()) => {
                audit_log!(record.with_outcome(AuditOutcome::Success));
                info!("LAG management daemon stopped");
            }
            Err(e) => {
                error!(error = %e, "Platform shutdown failed");
                audit_log!(record.with_error(e.to_string()));
            }
        }

        saved.and(shutdown.map_err(DaemonError::from))
    }
}
