//! LAG service: registry operations behind the readiness gate and a
//! bounded-wait lock, with audit records and metrics for each call.
//!
//! The only await point in an operation is lock acquisition. Once the guard
//! is held, validation and mutation run without yielding, so a cancelled
//! request either never touched the registry or committed completely.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, instrument};

use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::error::{LagError, LagResult};
use crate::gate::ServiceGate;
use crate::metrics::{LagMetrics, Operation};
use crate::registry::LagRegistry;
use crate::rpc::LagStatus;
use crate::types::{parse_members, parse_optional_members, LagId, LagInfo, PortId};

const SOURCE: &str = "LagService";

/// Default wait for the registry lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(500);

/// Shared handle to the LAG registry. Cheap to clone.
#[derive(Clone)]
pub struct LagService {
    registry: Arc<RwLock<LagRegistry>>,
    gate: Arc<ServiceGate>,
    metrics: LagMetrics,
    lock_timeout: Duration,
}

impl LagService {
    pub fn new(registry: LagRegistry, metrics: LagMetrics, lock_timeout: Duration) -> Self {
        metrics.set_registry_size(registry.lag_count(), registry.member_count());
        Self {
            registry: Arc::new(RwLock::new(registry)),
            gate: Arc::new(ServiceGate::new()),
            metrics,
            lock_timeout,
        }
    }

    pub fn gate(&self) -> &Arc<ServiceGate> {
        &self.gate
    }

    pub fn metrics(&self) -> &LagMetrics {
        &self.metrics
    }

    /// Returns the registry lock, for snapshotting and tests.
    pub fn registry(&self) -> &Arc<RwLock<LagRegistry>> {
        &self.registry
    }

    async fn write(&self) -> LagResult<RwLockWriteGuard<'_, LagRegistry>> {
        tokio::time::timeout(self.lock_timeout, self.registry.write())
            .await
            .map_err(|_| {
                LagError::busy(format!(
                    "registry lock not acquired within {}ms",
                    self.lock_timeout.as_millis()
                ))
            })
    }

    async fn read(&self) -> LagResult<RwLockReadGuard<'_, LagRegistry>> {
        tokio::time::timeout(self.lock_timeout, self.registry.read())
            .await
            .map_err(|_| {
                LagError::busy(format!(
                    "registry lock not acquired within {}ms",
                    self.lock_timeout.as_millis()
                ))
            })
    }

    fn publish_size(&self, registry: &LagRegistry) {
        self.metrics
            .set_registry_size(registry.lag_count(), registry.member_count());
    }

    fn record<T>(&self, operation: Operation, started: Instant, result: &LagResult<T>) {
        let status = match result {
            Ok(_) => LagStatus::Ok,
            Err(e) => e.status(),
        };
        self.metrics
            .record_operation(operation, status, started.elapsed());
    }

    fn audit<T>(&self, record: AuditRecord, result: &LagResult<T>) {
        let record = match result {
            Ok(_) => record.with_outcome(AuditOutcome::Success),
            Err(e) => record.with_error(e.to_string()),
        };
        audit_log!(record);
    }

    // ============ Mutations ============

    /// Creates a LAG. With `lag_id` absent the server assigns one.
    #[instrument(skip(self, lag_id, members), fields(lag_id = lag_id.unwrap_or("<auto>")))]
    pub async fn create_lag(&self, lag_id: Option<&str>, members: &[String]) -> LagResult<LagId> {
        let started = Instant::now();
        let result = self.do_create_lag(lag_id, members).await;
        self.record(Operation::CreateLag, started, &result);

        let object_id = match &result {
            Ok(id) => id.to_string(),
            Err(_) => lag_id.unwrap_or_default().to_string(),
        };
        self.audit(
            AuditRecord::new(AuditCategory::ResourceCreate, SOURCE, "create_lag")
                .with_object_type("lag")
                .with_object_id(object_id)
                .with_details(serde_json::json!({ "members": members })),
            &result,
        );
        result
    }

    async fn do_create_lag(&self, lag_id: Option<&str>, members: &[String]) -> LagResult<LagId> {
        let _admitted = self.gate.enter()?;
        let lag_id = lag_id.map(str::parse::<LagId>).transpose()?;
        let members = parse_optional_members(members)?;

        let mut registry = self.write().await?;
        let id = registry.create_lag(lag_id, &members)?;
        self.publish_size(&registry);

        info!(lag_id = %id, members = members.len(), "Created LAG");
        Ok(id)
    }

    /// Deletes a LAG and releases its member ports.
    #[instrument(skip(self))]
    pub async fn delete_lag(&self, lag_id: &str) -> LagResult<()> {
        let started = Instant::now();
        let result = self.do_delete_lag(lag_id).await;
        self.record(Operation::DeleteLag, started, &result);

        let mut record = AuditRecord::new(AuditCategory::ResourceDelete, SOURCE, "delete_lag")
            .with_object_type("lag")
            .with_object_id(lag_id);
        if let Ok(released) = &result {
            record = record.with_details(serde_json::json!({ "released_members": released }));
        }
        self.audit(record, &result);
        result.map(|_| ())
    }

    async fn do_delete_lag(&self, lag_id: &str) -> LagResult<Vec<String>> {
        let _admitted = self.gate.enter()?;
        let lag_id: LagId = lag_id.parse()?;

        let mut registry = self.write().await?;
        let group = registry.remove_lag(&lag_id)?;
        self.publish_size(&registry);

        info!(lag_id = %lag_id, released = group.member_count(), "Deleted LAG");
        Ok(group.members.iter().map(PortId::to_string).collect())
    }

    /// Adds ports to a LAG, all or nothing.
    #[instrument(skip(self, members), fields(count = members.len()))]
    pub async fn add_lag_members(&self, lag_id: &str, members: &[String]) -> LagResult<()> {
        let started = Instant::now();
        let result = self.do_add_lag_members(lag_id, members).await;
        self.record(Operation::AddLagMember, started, &result);
        self.audit(
            AuditRecord::new(AuditCategory::ResourceModify, SOURCE, "add_lag_member")
                .with_object_type("lag")
                .with_object_id(lag_id)
                .with_details(serde_json::json!({ "members": members })),
            &result,
        );
        result
    }

    async fn do_add_lag_members(&self, lag_id: &str, members: &[String]) -> LagResult<()> {
        let _admitted = self.gate.enter()?;
        let lag_id: LagId = lag_id.parse()?;
        let members = parse_members(members)?;

        let mut registry = self.write().await?;
        registry.add_lag_members(&lag_id, &members)?;
        self.publish_size(&registry);

        info!(lag_id = %lag_id, added = members.len(), "Added LAG members");
        Ok(())
    }

    /// Removes ports from a LAG, all or nothing.
    #[instrument(skip(self, members), fields(count = members.len()))]
    pub async fn remove_lag_members(&self, lag_id: &str, members: &[String]) -> LagResult<()> {
        let started = Instant::now();
        let result = self.do_remove_lag_members(lag_id, members).await;
        self.record(Operation::RemoveLagMember, started, &result);
        self.audit(
            AuditRecord::new(AuditCategory::ResourceModify, SOURCE, "remove_lag_member")
                .with_object_type("lag")
                .with_object_id(lag_id)
                .with_details(serde_json::json!({ "members": members })),
            &result,
        );
        result
    }

    async fn do_remove_lag_members(&self, lag_id: &str, members: &[String]) -> LagResult<()> {
        let _admitted = self.gate.enter()?;
        let lag_id: LagId = lag_id.parse()?;
        let members = parse_members(members)?;

        let mut registry = self.write().await?;
        registry.remove_lag_members(&lag_id, &members)?;
        self.publish_size(&registry);

        info!(lag_id = %lag_id, removed = members.len(), "Removed LAG members");
        Ok(())
    }

    /// Accounts for a mutation whose request never reached the registry,
    /// such as an undecodable body. Returns the error for the response.
    pub fn reject(&self, operation: Operation, err: LagError) -> LagError {
        let category = match operation {
            Operation::CreateLag => AuditCategory::ResourceCreate,
            Operation::DeleteLag => AuditCategory::ResourceDelete,
            _ => AuditCategory::ResourceModify,
        };
        let result = Err::<(), _>(err.clone());
        self.record(operation, Instant::now(), &result);
        self.audit(
            AuditRecord::new(category, SOURCE, operation.as_str()).with_object_type("lag"),
            &result,
        );
        err
    }

    // ============ Queries ============

    /// Returns one LAG.
    pub async fn get_lag(&self, lag_id: &str) -> LagResult<LagInfo> {
        let started = Instant::now();
        let result: LagResult<LagInfo> = async {
            let _admitted = self.gate.enter()?;
            let lag_id: LagId = lag_id.parse()?;
            let registry = self.read().await?;
            registry
                .get_lag(&lag_id)
                .ok_or_else(|| LagError::lag_not_found(&lag_id))
        }
        .await;
        self.record(Operation::GetLag, started, &result);
        debug!(lag_id, ok = result.is_ok(), "GetLag");
        result
    }

    /// Returns all LAGs sorted by id.
    pub async fn list_lags(&self) -> LagResult<Vec<LagInfo>> {
        let started = Instant::now();
        let result: LagResult<Vec<LagInfo>> = async {
            let _admitted = self.gate.enter()?;
            let registry = self.read().await?;
            Ok(registry.list_lags())
        }
        .await;
        self.record(Operation::ListLags, started, &result);
        result
    }

    /// Returns the LAG owning a port.
    pub async fn get_port_lag(&self, port: &str) -> LagResult<LagId> {
        let started = Instant::now();
        let result: LagResult<LagId> = async {
            let _admitted = self.gate.enter()?;
            let port: PortId = port.parse()?;
            let registry = self.read().await?;
            registry
                .get_lag_for_member(&port)
                .cloned()
                .ok_or_else(|| LagError::port_not_aggregated(&port))
        }
        .await;
        self.record(Operation::GetPortLag, started, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ready_service() -> LagService {
        let service = LagService::new(
            LagRegistry::new(),
            LagMetrics::new().unwrap(),
            Duration::from_millis(50),
        );
        service.gate().open();
        service
    }

    fn names(ports: &[&str]) -> Vec<String> {
        ports.iter().map(|p| p.to_string()).collect()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let service = ready_service();
        let id = service
            .create_lag(Some("PortChannel1"), &names(&["Ethernet4", "Ethernet0"]))
            .await
            .unwrap();
        assert_eq!(id.as_str(), "PortChannel1");

        let info = service.get_lag("PortChannel1").await.unwrap();
        let members: Vec<&str> = info.members.iter().map(PortId::as_str).collect();
        assert_eq!(members, vec!["Ethernet0", "Ethernet4"]);
        assert_eq!(service.metrics().lags.get(), 1);
        assert_eq!(service.metrics().lag_members.get(), 2);
    }

    #[tokio::test]
    async fn test_create_auto_id() {
        let service = ready_service();
        let id = service.create_lag(None, &[]).await.unwrap();
        assert_eq!(id.as_str(), "PortChannel0001");
        let id = service.create_lag(None, &[]).await.unwrap();
        assert_eq!(id.as_str(), "PortChannel0002");
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let service = ready_service();
        assert_eq!(
            service.create_lag(Some("bad id"), &[]).await.unwrap_err().status(),
            LagStatus::InvalidArgument
        );
        service.create_lag(Some("PortChannel1"), &[]).await.unwrap();
        assert_eq!(
            service
                .add_lag_members("PortChannel1", &[])
                .await
                .unwrap_err()
                .status(),
            LagStatus::InvalidArgument
        );
        assert_eq!(
            service
                .remove_lag_members("PortChannel1", &names(&["Ethernet0", "Ethernet0"]))
                .await
                .unwrap_err()
                .status(),
            LagStatus::InvalidArgument
        );
        assert_eq!(
            service.delete_lag("").await.unwrap_err().status(),
            LagStatus::InvalidArgument
        );
    }

    #[tokio::test]
    async fn test_get_port_lag() {
        let service = ready_service();
        service
            .create_lag(Some("PortChannel1"), &names(&["Ethernet0"]))
            .await
            .unwrap();

        assert_eq!(
            service.get_port_lag("Ethernet0").await.unwrap().as_str(),
            "PortChannel1"
        );
        assert_eq!(
            service.get_port_lag("Ethernet4").await.unwrap_err().status(),
            LagStatus::NotFound
        );
    }

    #[tokio::test]
    async fn test_busy_before_gate_opens() {
        let service = LagService::new(
            LagRegistry::new(),
            LagMetrics::new().unwrap(),
            DEFAULT_LOCK_TIMEOUT,
        );
        let err = service.create_lag(Some("PortChannel1"), &[]).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(service.list_lags().await.is_err());

        service.gate().open();
        assert!(service.list_lags().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lock_timeout_returns_busy() {
        let service = ready_service();
        let held = service.registry().write().await;

        let err = service
            .create_lag(Some("PortChannel1"), &[])
            .await
            .unwrap_err();
        assert_eq!(err.status(), LagStatus::Busy);
        drop(held);

        assert!(service.list_lags().await.unwrap().is_empty());
        assert_eq!(
            service
                .metrics()
                .operation_count(Operation::CreateLag, LagStatus::Busy),
            1
        );
    }

    #[tokio::test]
    async fn test_failures_are_counted() {
        let service = ready_service();
        service.create_lag(Some("PortChannel1"), &[]).await.unwrap();
        service
            .create_lag(Some("PortChannel1"), &[])
            .await
            .unwrap_err();
        service.delete_lag("PortChannel2").await.unwrap_err();

        let metrics = service.metrics();
        assert_eq!(
            metrics.operation_count(Operation::CreateLag, LagStatus::Ok),
            1
        );
        assert_eq!(
            metrics.operation_count(Operation::CreateLag, LagStatus::AlreadyExists),
            1
        );
        assert_eq!(
            metrics.operation_count(Operation::DeleteLag, LagStatus::NotFound),
            1
        );
    }

    #[tokio::test]
    async fn test_cancelled_request_leaves_no_partial_state() {
        let service = ready_service();
        service.create_lag(Some("PortChannel1"), &[]).await.unwrap();

        let held = service.registry().write().await;
        let pending = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .add_lag_members("PortChannel1", &names(&["Ethernet0", "Ethernet4"]))
                    .await
            })
        };
        tokio::task::yield_now().await;
        pending.abort();
        drop(held);

        let info = service.get_lag("PortChannel1").await.unwrap();
        assert!(info.members.is_empty() || info.members.len() == 2);
        assert!(service.registry().read().await.is_consistent());
    }
}
