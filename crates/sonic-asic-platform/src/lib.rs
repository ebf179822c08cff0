//! Switch ASIC platform lifecycle boundary for SONiC daemons.
//!
//! Daemons that program the switch need the vendor SDK brought up before they
//! serve requests and torn down after they stop. This crate reduces that
//! bring-up to a narrow, mockable interface:
//!
//! - [`Platform`]: `init` / `shutdown` lifecycle pair
//! - [`PlatformConfig`]: boot mode, HA instance and ISSU versions
//! - [`ShutdownFlags`]: teardown options (keep HA state for warm restart)
//! - [`PlatformError`]: failures tagged with the [`PlatformPhase`] that failed
//! - [`SimulatedPlatform`]: in-process platform for tests and lab setups
//!
//! # Bring-up sequence
//!
//! ```text
//! log_init -> cli_init -> device_probe -> ha_init
//!          -> [issu_start] -> system_init -> [issu_done]
//! ```
//!
//! Teardown runs `system_shutdown -> ha_cleanup -> device_detach`.
//!
//! # Example
//!
//! ```
//! use sonic_asic_platform::{Platform, PlatformConfig, ShutdownFlags, SimulatedPlatform};
//!
//! # tokio_test_block_on(async {
//! let platform = SimulatedPlatform::new(1);
//! platform.init(&PlatformConfig::default()).await.unwrap();
//! platform.shutdown(ShutdownFlags::default()).await.unwrap();
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

mod config;
mod error;
mod lifecycle;
mod simulated;

pub use config::{IssuInfo, PlatformConfig, ShutdownFlags, DEFAULT_PLATFORM_CONFIG_FILE};
pub use error::{PlatformError, PlatformPhase, PlatformResult};
pub use lifecycle::Platform;
pub use simulated::SimulatedPlatform;
