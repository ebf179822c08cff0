//! LAG registry: group table plus the port to LAG reverse index.
//!
//! Every mutation validates all of its preconditions before touching either
//! table, so a failed call leaves the registry exactly as it was.

use std::collections::{BTreeMap, HashMap};

use crate::error::{LagError, LagResult};
use crate::types::{LagGroup, LagId, LagInfo, PortId};

/// In-memory table of LAG groups and their member ports.
#[derive(Debug, Default)]
pub struct LagRegistry {
    /// Groups indexed by id, kept ordered for listing.
    groups: BTreeMap<LagId, LagGroup>,
    /// Member port to owning LAG.
    member_to_lag: HashMap<PortId, LagId>,
}

impl LagRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a registry from persisted groups.
    ///
    /// Fails if two groups share an id or a port appears in more than one group.
    pub fn from_groups(groups: Vec<LagGroup>) -> LagResult<Self> {
        let mut registry = Self::new();
        for group in groups {
            if registry.groups.contains_key(&group.id) {
                return Err(LagError::already_exists(group.id.as_str()));
            }
            for port in &group.members {
                if let Some(owner) = registry.member_to_lag.get(port) {
                    return Err(LagError::already_member(port.as_str(), owner.as_str()));
                }
                registry
                    .member_to_lag
                    .insert(port.clone(), group.id.clone());
            }
            registry.groups.insert(group.id.clone(), group);
        }
        Ok(registry)
    }

    /// Returns all groups in id order.
    pub fn groups(&self) -> Vec<LagGroup> {
        self.groups.values().cloned().collect()
    }

    // ============ Queries ============

    /// Returns true if a LAG exists with the given id.
    pub fn has_lag(&self, id: &LagId) -> bool {
        self.groups.contains_key(id)
    }

    /// Gets a LAG by id.
    pub fn get_lag(&self, id: &LagId) -> Option<LagInfo> {
        self.groups.get(id).map(LagGroup::info)
    }

    /// Returns all LAGs sorted by id.
    pub fn list_lags(&self) -> Vec<LagInfo> {
        self.groups.values().map(LagGroup::info).collect()
    }

    /// Gets the LAG owning a port.
    pub fn get_lag_for_member(&self, port: &PortId) -> Option<&LagId> {
        self.member_to_lag.get(port)
    }

    /// Returns the number of LAGs.
    pub fn lag_count(&self) -> usize {
        self.groups.len()
    }

    /// Returns the number of aggregated ports across all LAGs.
    pub fn member_count(&self) -> usize {
        self.member_to_lag.len()
    }

    /// Returns the first free server-assigned id.
    pub fn allocate_id(&self) -> LagId {
        (1..=u32::MAX)
            .map(LagId::auto)
            .find(|id| !self.groups.contains_key(id))
            .unwrap_or_else(|| LagId::auto(0))
    }

    // ============ Mutations ============

    /// Creates a LAG, optionally with initial members.
    ///
    /// With `id` absent the first free `PortChannelNNNN` is assigned.
    pub fn create_lag(&mut self, id: Option<LagId>, members: &[PortId]) -> LagResult<LagId> {
        let id = match id {
            Some(id) => {
                if self.groups.contains_key(&id) {
                    return Err(LagError::already_exists(id.as_str()));
                }
                id
            }
            None => self.allocate_id(),
        };
        self.check_free(members)?;

        let mut group = LagGroup::new(id.clone());
        for port in members {
            group.members.insert(port.clone());
            self.member_to_lag.insert(port.clone(), id.clone());
        }
        self.groups.insert(id.clone(), group);

        Ok(id)
    }

    /// Removes a LAG and releases all of its member ports.
    pub fn remove_lag(&mut self, id: &LagId) -> LagResult<LagGroup> {
        let group = self
            .groups
            .remove(id)
            .ok_or_else(|| LagError::lag_not_found(id))?;

        for port in &group.members {
            self.member_to_lag.remove(port);
        }

        Ok(group)
    }

    /// Adds ports to a LAG. Either all are added or none.
    pub fn add_lag_members(&mut self, id: &LagId, members: &[PortId]) -> LagResult<()> {
        if members.is_empty() {
            return Err(LagError::invalid_argument("member list must not be empty"));
        }
        if !self.groups.contains_key(id) {
            return Err(LagError::lag_not_found(id));
        }
        self.check_free(members)?;

        let group = self
            .groups
            .get_mut(id)
            .ok_or_else(|| LagError::internal(format!("LAG '{}' vanished", id)))?;
        for port in members {
            group.members.insert(port.clone());
            self.member_to_lag.insert(port.clone(), id.clone());
        }

        Ok(())
    }

    /// Removes ports from a LAG. Either all are removed or none.
    pub fn remove_lag_members(&mut self, id: &LagId, members: &[PortId]) -> LagResult<()> {
        if members.is_empty() {
            return Err(LagError::invalid_argument("member list must not be empty"));
        }
        let group = self
            .groups
            .get_mut(id)
            .ok_or_else(|| LagError::lag_not_found(id))?;

        if let Some(port) = members.iter().find(|port| !group.has_member(port)) {
            return Err(LagError::not_member(port, id));
        }

        for port in members {
            group.members.remove(port);
            self.member_to_lag.remove(port);
        }

        Ok(())
    }

    /// Fails if any port is listed twice or already belongs to a LAG.
    fn check_free(&self, members: &[PortId]) -> LagResult<()> {
        for (i, port) in members.iter().enumerate() {
            if members[..i].contains(port) {
                return Err(LagError::invalid_argument(format!(
                    "port '{}' listed more than once",
                    port
                )));
            }
            if let Some(owner) = self.member_to_lag.get(port) {
                return Err(LagError::already_member(port.as_str(), owner.as_str()));
            }
        }
        Ok(())
    }

    /// Returns true if the reverse index and group member sets agree.
    pub fn is_consistent(&self) -> bool {
        let indexed: usize = self.groups.values().map(LagGroup::member_count).sum();
        indexed == self.member_to_lag.len()
            && self.member_to_lag.iter().all(|(port, lag)| {
                self.groups
                    .get(lag)
                    .is_some_and(|group| group.has_member(port))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lag(id: &str) -> LagId {
        id.parse().unwrap()
    }

    fn ports(names: &[&str]) -> Vec<PortId> {
        names.iter().map(|n| n.parse().unwrap()).collect()
    }

    #[test]
    fn test_registry_new() {
        let registry = LagRegistry::new();
        assert_eq!(registry.lag_count(), 0);
        assert_eq!(registry.member_count(), 0);
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_create_lag() {
        let mut registry = LagRegistry::new();
        let id = registry.create_lag(Some(lag("PortChannel1")), &[]).unwrap();

        assert_eq!(id, lag("PortChannel1"));
        assert!(registry.has_lag(&id));
        assert!(registry.get_lag(&id).unwrap().members.is_empty());
    }

    #[test]
    fn test_create_duplicate_lag() {
        let mut registry = LagRegistry::new();
        registry.create_lag(Some(lag("PortChannel1")), &[]).unwrap();
        let before = registry.list_lags();

        assert_eq!(
            registry.create_lag(Some(lag("PortChannel1")), &[]),
            Err(LagError::already_exists("PortChannel1"))
        );
        assert_eq!(registry.list_lags(), before);
    }

    #[test]
    fn test_create_with_auto_id() {
        let mut registry = LagRegistry::new();
        registry
            .create_lag(Some(lag("PortChannel0001")), &[])
            .unwrap();
        registry
            .create_lag(Some(lag("PortChannel0003")), &[])
            .unwrap();

        assert_eq!(
            registry.create_lag(None, &[]).unwrap(),
            lag("PortChannel0002")
        );
        assert_eq!(
            registry.create_lag(None, &[]).unwrap(),
            lag("PortChannel0004")
        );
    }

    #[test]
    fn test_create_with_members() {
        let mut registry = LagRegistry::new();
        let id = registry
            .create_lag(Some(lag("PortChannel1")), &ports(&["Ethernet0", "Ethernet4"]))
            .unwrap();

        assert_eq!(registry.get_lag(&id).unwrap().members.len(), 2);
        assert_eq!(
            registry.get_lag_for_member(&ports(&["Ethernet0"])[0]),
            Some(&id)
        );
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_create_with_aggregated_member_is_atomic() {
        let mut registry = LagRegistry::new();
        registry
            .create_lag(Some(lag("PortChannel1")), &ports(&["Ethernet4"]))
            .unwrap();

        let err = registry
            .create_lag(Some(lag("PortChannel2")), &ports(&["Ethernet0", "Ethernet4"]))
            .unwrap_err();
        assert_eq!(err, LagError::already_member("Ethernet4", "PortChannel1"));
        assert!(!registry.has_lag(&lag("PortChannel2")));
        assert!(registry
            .get_lag_for_member(&ports(&["Ethernet0"])[0])
            .is_none());
    }

    #[test]
    fn test_remove_lag_releases_members() {
        let mut registry = LagRegistry::new();
        let id = registry
            .create_lag(Some(lag("PortChannel1")), &ports(&["Ethernet0", "Ethernet4"]))
            .unwrap();

        let removed = registry.remove_lag(&id).unwrap();
        assert_eq!(removed.member_count(), 2);
        assert_eq!(registry.member_count(), 0);
        assert!(!registry.has_lag(&id));

        registry
            .create_lag(Some(lag("PortChannel2")), &ports(&["Ethernet0"]))
            .unwrap();
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_remove_unknown_lag() {
        let mut registry = LagRegistry::new();
        assert!(matches!(
            registry.remove_lag(&lag("PortChannel9")),
            Err(LagError::NotFound { .. })
        ));
    }

    #[test]
    fn test_add_members() {
        let mut registry = LagRegistry::new();
        let id = registry.create_lag(Some(lag("PortChannel1")), &[]).unwrap();

        registry
            .add_lag_members(&id, &ports(&["Ethernet0", "Ethernet4"]))
            .unwrap();
        assert_eq!(registry.member_count(), 2);
    }

    #[test]
    fn test_add_member_already_in_same_lag() {
        let mut registry = LagRegistry::new();
        let id = registry
            .create_lag(Some(lag("PortChannel1")), &ports(&["Ethernet0"]))
            .unwrap();

        assert_eq!(
            registry.add_lag_members(&id, &ports(&["Ethernet0"])),
            Err(LagError::already_member("Ethernet0", "PortChannel1"))
        );
    }

    #[test]
    fn test_add_members_all_or_nothing() {
        let mut registry = LagRegistry::new();
        let l1 = registry.create_lag(Some(lag("PortChannel1")), &[]).unwrap();
        let l2 = registry
            .create_lag(Some(lag("PortChannel2")), &ports(&["Ethernet4"]))
            .unwrap();

        let err = registry
            .add_lag_members(&l1, &ports(&["Ethernet0", "Ethernet4"]))
            .unwrap_err();
        assert_eq!(err.status(), crate::rpc::LagStatus::AlreadyMember);
        assert!(registry.get_lag(&l1).unwrap().members.is_empty());
        assert_eq!(registry.get_lag(&l2).unwrap().members.len(), 1);
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_add_members_invalid() {
        let mut registry = LagRegistry::new();
        let id = registry.create_lag(Some(lag("PortChannel1")), &[]).unwrap();

        assert!(matches!(
            registry.add_lag_members(&id, &[]),
            Err(LagError::InvalidArgument { .. })
        ));
        assert!(matches!(
            registry.add_lag_members(&id, &ports(&["Ethernet0", "Ethernet0"])),
            Err(LagError::InvalidArgument { .. })
        ));
        assert!(matches!(
            registry.add_lag_members(&lag("PortChannel9"), &ports(&["Ethernet0"])),
            Err(LagError::NotFound { .. })
        ));
        assert_eq!(registry.member_count(), 0);
    }

    #[test]
    fn test_remove_members() {
        let mut registry = LagRegistry::new();
        let id = registry
            .create_lag(Some(lag("PortChannel1")), &ports(&["Ethernet0", "Ethernet4"]))
            .unwrap();

        registry
            .remove_lag_members(&id, &ports(&["Ethernet0"]))
            .unwrap();
        assert_eq!(
            registry.get_lag(&id).unwrap().members,
            ports(&["Ethernet4"])
        );
        assert!(registry
            .get_lag_for_member(&ports(&["Ethernet0"])[0])
            .is_none());
    }

    #[test]
    fn test_remove_members_all_or_nothing() {
        let mut registry = LagRegistry::new();
        let id = registry
            .create_lag(Some(lag("PortChannel1")), &ports(&["Ethernet0"]))
            .unwrap();
        registry
            .create_lag(Some(lag("PortChannel2")), &ports(&["Ethernet8"]))
            .unwrap();

        let err = registry
            .remove_lag_members(&id, &ports(&["Ethernet0", "Ethernet8"]))
            .unwrap_err();
        assert_eq!(err, LagError::not_member("Ethernet8", "PortChannel1"));
        assert_eq!(
            registry.get_lag(&id).unwrap().members,
            ports(&["Ethernet0"])
        );
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_list_sorted() {
        let mut registry = LagRegistry::new();
        for id in ["PortChannel3", "PortChannel1", "PortChannel2"] {
            registry.create_lag(Some(lag(id)), &[]).unwrap();
        }
        let ids: Vec<String> = registry
            .list_lags()
            .into_iter()
            .map(|info| info.id.to_string())
            .collect();
        assert_eq!(ids, vec!["PortChannel1", "PortChannel2", "PortChannel3"]);
    }

    #[test]
    fn test_from_groups_roundtrip() {
        let mut registry = LagRegistry::new();
        registry
            .create_lag(Some(lag("PortChannel1")), &ports(&["Ethernet0"]))
            .unwrap();
        registry
            .create_lag(Some(lag("PortChannel2")), &ports(&["Ethernet4", "Ethernet8"]))
            .unwrap();

        let restored = LagRegistry::from_groups(registry.groups()).unwrap();
        assert_eq!(restored.list_lags(), registry.list_lags());
        assert_eq!(restored.member_count(), 3);
        assert!(restored.is_consistent());
    }

    #[test]
    fn test_from_groups_rejects_shared_port() {
        let mut g1 = LagGroup::new(lag("PortChannel1"));
        g1.members.insert(ports(&["Ethernet0"]).remove(0));
        let mut g2 = LagGroup::new(lag("PortChannel2"));
        g2.members.insert(ports(&["Ethernet0"]).remove(0));

        assert!(matches!(
            LagRegistry::from_groups(vec![g1, g2]),
            Err(LagError::AlreadyMember { .. })
        ));
    }

    #[test]
    fn test_from_groups_rejects_duplicate_id() {
        let g1 = LagGroup::new(lag("PortChannel1"));
        let g2 = LagGroup::new(lag("PortChannel1"));
        assert!(matches!(
            LagRegistry::from_groups(vec![g1, g2]),
            Err(LagError::AlreadyExists { .. })
        ));
    }
}
