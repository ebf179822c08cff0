//! In-process platform that walks the SDK bring-up phases without hardware.
//!
//! Each phase is logged and recorded. A failure can be injected at any phase
//! so daemon lifecycle handling can be exercised in tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::{PlatformConfig, ShutdownFlags};
use crate::error::{PlatformError, PlatformPhase, PlatformResult};
use crate::lifecycle::Platform;

#[derive(Debug, Default)]
struct SimulatedState {
    initialized: bool,
    ha_instance: Option<u32>,
    ha_state_kept: bool,
    phase_log: Vec<PlatformPhase>,
}

/// Simulated switch platform.
#[derive(Debug)]
pub struct SimulatedPlatform {
    devices: Vec<String>,
    fail_at: Option<PlatformPhase>,
    state: Mutex<SimulatedState>,
}

impl SimulatedPlatform {
    /// Creates a platform that probes `device_count` devices.
    pub fn new(device_count: usize) -> Self {
        let devices = (0..device_count).map(|unit| format!("unit{}", unit)).collect();
        Self {
            devices,
            fail_at: None,
            state: Mutex::new(SimulatedState::default()),
        }
    }

    /// Makes the given phase fail on its next run.
    pub fn fail_at(mut self, phase: PlatformPhase) -> Self {
        self.fail_at = Some(phase);
        self
    }

    /// Returns true between a successful `init` and `shutdown`.
    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    /// Returns whether the last shutdown preserved HA state.
    pub fn ha_state_kept(&self) -> bool {
        self.state.lock().ha_state_kept
    }

    /// Returns every phase that ran, in order, including the failed one.
    pub fn phase_log(&self) -> Vec<PlatformPhase> {
        self.state.lock().phase_log.clone()
    }

    fn run_phase(&self, state: &mut SimulatedState, phase: PlatformPhase) -> PlatformResult<()> {
        state.phase_log.push(phase);
        if self.fail_at == Some(phase) {
            error!(phase = %phase, "Platform phase failed");
            return Err(PlatformError::phase_failed(phase, "injected failure"));
        }
        debug!(phase = %phase, "Platform phase complete");
        Ok(())
    }

    fn bring_up(&self, config: &PlatformConfig) -> PlatformResult<()> {
        config.validate()?;

        let mut state = self.state.lock();
        if state.initialized {
            return Err(PlatformError::AlreadyInitialized);
        }

        self.run_phase(&mut state, PlatformPhase::LogInit)?;
        self.run_phase(&mut state, PlatformPhase::CliInit)?;

        self.run_phase(&mut state, PlatformPhase::DeviceProbe)?;
        if self.devices.is_empty() {
            return Err(PlatformError::phase_failed(
                PlatformPhase::DeviceProbe,
                "no devices found",
            ));
        }
        info!("Found {} devices", self.devices.len());

        self.run_phase(&mut state, PlatformPhase::HaInit)?;
        let instance = config.ha_instance.unwrap_or(0);
        if config.warm_boot {
            for device in &self.devices {
                info!(device = %device, instance, "Warm boot, using HA state for unit");
            }
        } else {
            debug!(instance, "Cold boot, fresh HA state");
        }
        state.ha_instance = Some(instance);

        if let Some(issu) = &config.issu {
            self.run_phase(&mut state, PlatformPhase::IssuStart)?;
            info!(
                start_version = issu.start_version.as_deref().unwrap_or("unknown"),
                current_version = issu.current_version.as_deref().unwrap_or("unknown"),
                "ISSU upgrade started"
            );
        }

        if !config.warm_boot {
            info!(config_file = %config.config_file.display(), "Loading platform config");
        }
        let system_init = self.run_phase(&mut state, PlatformPhase::SystemInit);

        // ISSU must be closed out even when system init fails.
        if config.issu.is_some() {
            let issu_done = self.run_phase(&mut state, PlatformPhase::IssuDone);
            system_init?;
            issu_done?;
        } else {
            system_init?;
        }

        state.initialized = true;
        state.ha_state_kept = false;
        Ok(())
    }

    fn tear_down(&self, flags: ShutdownFlags) -> PlatformResult<()> {
        let mut state = self.state.lock();
        if !state.initialized {
            return Err(PlatformError::NotInitialized);
        }
        state.initialized = false;

        self.run_phase(&mut state, PlatformPhase::SystemShutdown)?;

        self.run_phase(&mut state, PlatformPhase::HaCleanup)?;
        if flags.keep_ha_file {
            info!(instance = ?state.ha_instance, "Keeping HA state for warm restart");
        } else {
            debug!(instance = ?state.ha_instance, "Removing HA state");
        }
        state.ha_state_kept = flags.keep_ha_file;

        self.run_phase(&mut state, PlatformPhase::DeviceDetach)?;
        Ok(())
    }
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::new(1)
    }
}

#[async_trait]
impl Platform for SimulatedPlatform {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn init(&self, config: &PlatformConfig) -> PlatformResult<()> {
        info!(
            warm_boot = config.warm_boot,
            issu = config.issu.is_some(),
            "Initializing simulated platform"
        );
        self.bring_up(config)
    }

    async fn shutdown(&self, flags: ShutdownFlags) -> PlatformResult<()> {
        info!(keep_ha_file = flags.keep_ha_file, "Shutting down simulated platform");
        self.tear_down(flags).inspect_err(|e| {
            warn!(error = %e, "Simulated platform shutdown incomplete");
        })
    }
}
