//! Platform lifecycle trait.

use async_trait::async_trait;

use crate::config::{PlatformConfig, ShutdownFlags};
use crate::error::PlatformResult;

/// Switch platform brought up before a daemon serves and torn down after.
///
/// # Lifecycle
///
/// 1. `init` runs once at process start; the daemon must not serve requests
///    until it returns `Ok`.
/// 2. The daemon stops accepting new work.
/// 3. `shutdown` runs once at process exit.
///
/// A failure in either call aborts the corresponding lifecycle phase.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Returns the platform name (for logging).
    fn name(&self) -> &str;

    /// Brings the platform up.
    async fn init(&self, config: &PlatformConfig) -> PlatformResult<()>;

    /// Tears the platform down.
    async fn shutdown(&self, flags: ShutdownFlags) -> PlatformResult<()>;
}
