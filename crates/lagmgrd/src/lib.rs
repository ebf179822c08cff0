//! SONiC LAG management daemon.
//!
//! lagmgrd owns the registry of link-aggregation groups and their member
//! ports and serves the `Net.LagManagement` operations over HTTP/JSON:
//!
//! - CreateLag / DeleteLag
//! - AddLagMember / RemoveLagMember
//! - GetLag / ListLags
//!
//! The switch platform is brought up through [`sonic_asic_platform::Platform`]
//! before the service admits requests and torn down after it drains.
//!
//! # Architecture
//!
//! ```text
//! HTTP (axum) -> server -> LagService -> RwLock<LagRegistry>
//!                              |
//!                    ServiceGate, audit, metrics
//! ```

#[macro_use]
pub mod audit;

pub mod config;
pub mod daemon;
pub mod error;
pub mod gate;
pub mod metrics;
pub mod registry;
pub mod rpc;
pub mod server;
pub mod service;
pub mod snapshot;
pub mod types;

pub use config::{ConfigError, LagmgrConfig};
pub use daemon::{DaemonError, LagDaemon};
pub use error::{LagError, LagResult};
pub use gate::{GateState, ServiceGate};
pub use metrics::LagMetrics;
pub use registry::LagRegistry;
pub use rpc::LagStatus;
pub use service::LagService;
pub use snapshot::{SnapshotError, SnapshotStore};
pub use types::{LagGroup, LagId, LagInfo, PortId};
