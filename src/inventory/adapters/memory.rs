//! In-memory inventory store for service tests.
//!
//! Transactions are serialised behind one mutex and run against a copy of
//! the state that replaces the original only when the work succeeds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use crate::inventory::{
    domain::{
        Group, GroupId, GroupName, NewNode, NewSubscription, Node, NodeAttributes, NodeId,
        RunSnapshot, Subscription, SubscriptionId, System, SystemId, Tag,
    },
    ports::{
        InventoryStore, InventoryStoreError, InventoryStoreResult, InventoryTransaction, NodeScope,
    },
};

/// Thread-safe in-memory inventory store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryStore {
    state: Arc<Mutex<InventoryState>>,
}

impl InMemoryInventoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default)]
struct InventoryState {
    last_node_id: i64,
    last_subscription_id: i64,
    last_group_id: i64,
    nodes: BTreeMap<NodeId, Node>,
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    groups: BTreeMap<GroupId, Group>,
    memberships: BTreeSet<(GroupId, NodeId)>,
    system: Option<System>,
}

const SINGLETON_SYSTEM_ID: SystemId = SystemId::from_persisted(1);

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn in_transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn InventoryTransaction) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<InventoryStoreError> + Send + 'static,
    {
        let mut committed = self.state.lock().map_err(|err| {
            InventoryStoreError::persistence(std::io::Error::other(err.to_string()))
        })?;
        let mut working = committed.clone();
        let outcome = work(&mut InMemoryTransaction {
            state: &mut working,
        });
        if outcome.is_ok() {
            *committed = working;
        }
        outcome
    }
}

struct InMemoryTransaction<'a> {
    state: &'a mut InventoryState,
}

impl InMemoryTransaction<'_> {
    fn tag_taken_by_other_node(&self, tag: &Tag, id: Option<NodeId>) -> bool {
        self.state
            .nodes
            .values()
            .any(|node| node.tag() == Some(tag) && Some(node.id()) != id)
    }

    fn group_mut(&mut self, id: GroupId) -> InventoryStoreResult<&mut Group> {
        self.state
            .groups
            .get_mut(&id)
            .ok_or_else(|| InventoryStoreError::MissingReference(format!("group {id}")))
    }

    fn system_mut(&mut self, id: SystemId) -> InventoryStoreResult<&mut System> {
        self.state
            .system
            .as_mut()
            .filter(|system| system.id == id)
            .ok_or_else(|| InventoryStoreError::MissingReference(format!("system {id}")))
    }
}

impl InventoryTransaction for InMemoryTransaction<'_> {
    fn find_node(&mut self, id: NodeId) -> InventoryStoreResult<Option<Node>> {
        Ok(self.state.nodes.get(&id).cloned())
    }

    fn find_node_by_name(
        &mut self,
        name: &str,
        subscription_id: Option<SubscriptionId>,
    ) -> InventoryStoreResult<Option<Node>> {
        Ok(self
            .state
            .nodes
            .values()
            .find(|node| node.name() == name && node.subscription_id() == subscription_id)
            .cloned())
    }

    fn insert_node(&mut self, node: &NewNode) -> InventoryStoreResult<Node> {
        let name_taken = self.state.nodes.values().any(|existing| {
            existing.name() == node.attributes.name
                && existing.subscription_id() == node.subscription_id
        });
        if name_taken {
            return Err(InventoryStoreError::DuplicateNodeName {
                name: node.attributes.name.clone(),
                subscription_id: node.subscription_id,
            });
        }
        if let Some(tag) = &node.tag {
            if self.tag_taken_by_other_node(tag, None) {
                return Err(InventoryStoreError::DuplicateTag(tag.clone()));
            }
        }
        if let Some(subscription_id) = node.subscription_id {
            if !self.state.subscriptions.contains_key(&subscription_id) {
                return Err(InventoryStoreError::MissingReference(format!(
                    "subscription {subscription_id}"
                )));
            }
        }

        self.state.last_node_id += 1;
        let id = NodeId::from_persisted(self.state.last_node_id);
        let stored = Node::from_new(id, node.clone());
        self.state.nodes.insert(id, stored.clone());
        Ok(stored)
    }

    fn update_node_attributes(
        &mut self,
        id: NodeId,
        attributes: &NodeAttributes,
        updated_at: DateTime<Utc>,
    ) -> InventoryStoreResult<u64> {
        let Some(node) = self.state.nodes.get(&id) else {
            return Ok(0);
        };
        let clash = self.state.nodes.values().any(|other| {
            other.id() != id
                && other.name() == attributes.name
                && other.subscription_id() == node.subscription_id()
        });
        if clash {
            return Err(InventoryStoreError::DuplicateNodeName {
                name: attributes.name.clone(),
                subscription_id: node.subscription_id(),
            });
        }
        if let Some(node) = self.state.nodes.get_mut(&id) {
            node.apply_attributes(attributes.clone(), updated_at);
        }
        Ok(1)
    }

    fn set_node_tag(&mut self, id: NodeId, tag: &Tag) -> InventoryStoreResult<u64> {
        if !self.state.nodes.contains_key(&id) {
            return Ok(0);
        }
        if self.tag_taken_by_other_node(tag, Some(id)) {
            return Err(InventoryStoreError::DuplicateTag(tag.clone()));
        }
        if let Some(node) = self.state.nodes.get_mut(&id) {
            node.set_tag(tag.clone());
        }
        Ok(1)
    }

    fn delete_nodes(&mut self, ids: &[NodeId]) -> InventoryStoreResult<u64> {
        if let Some((_, node_id)) = self
            .state
            .memberships
            .iter()
            .find(|(_, node_id)| ids.contains(node_id))
        {
            return Err(InventoryStoreError::MissingReference(format!(
                "node {node_id} is still referenced by a group"
            )));
        }
        let before = self.state.nodes.len();
        self.state.nodes.retain(|id, _| !ids.contains(id));
        Ok(count(before - self.state.nodes.len()))
    }

    fn node_ids_by_subscriptions(
        &mut self,
        ids: &[SubscriptionId],
    ) -> InventoryStoreResult<Vec<NodeId>> {
        Ok(self
            .state
            .nodes
            .values()
            .filter(|node| node.subscription_id().is_some_and(|id| ids.contains(&id)))
            .map(Node::id)
            .collect())
    }

    fn list_nodes(
        &mut self,
        scope: NodeScope,
        after: Option<NodeId>,
        limit: usize,
    ) -> InventoryStoreResult<Vec<Node>> {
        Ok(self
            .state
            .nodes
            .values()
            .filter(|node| after.is_none_or(|after| node.id() > after))
            .filter(|node| scope.contains(node))
            .take(limit)
            .cloned()
            .collect())
    }

    fn count_nodes(&mut self, scope: NodeScope) -> InventoryStoreResult<u64> {
        Ok(count(
            self.state
                .nodes
                .values()
                .filter(|node| scope.contains(node))
                .count(),
        ))
    }

    fn insert_subscription(
        &mut self,
        subscription: &NewSubscription,
    ) -> InventoryStoreResult<Subscription> {
        if let Some(tag) = &subscription.tag {
            let taken = self
                .state
                .subscriptions
                .values()
                .any(|existing| existing.tag() == Some(tag));
            if taken {
                return Err(InventoryStoreError::DuplicateTag(tag.clone()));
            }
        }
        self.state.last_subscription_id += 1;
        let id = SubscriptionId::from_persisted(self.state.last_subscription_id);
        let stored = Subscription::from_new(id, subscription.clone());
        self.state.subscriptions.insert(id, stored.clone());
        Ok(stored)
    }

    fn find_subscription(
        &mut self,
        id: SubscriptionId,
    ) -> InventoryStoreResult<Option<Subscription>> {
        Ok(self.state.subscriptions.get(&id).cloned())
    }

    fn update_subscription_status(
        &mut self,
        id: SubscriptionId,
        status: &str,
        info: &str,
        updated_at: DateTime<Utc>,
    ) -> InventoryStoreResult<u64> {
        Ok(match self.state.subscriptions.get_mut(&id) {
            Some(subscription) => {
                subscription.record_refresh(status, info, updated_at);
                1
            }
            None => 0,
        })
    }

    fn set_subscription_tag(&mut self, id: SubscriptionId, tag: &Tag) -> InventoryStoreResult<u64> {
        if !self.state.subscriptions.contains_key(&id) {
            return Ok(0);
        }
        let taken = self
            .state
            .subscriptions
            .values()
            .any(|other| other.id() != id && other.tag() == Some(tag));
        if taken {
            return Err(InventoryStoreError::DuplicateTag(tag.clone()));
        }
        if let Some(subscription) = self.state.subscriptions.get_mut(&id) {
            subscription.set_tag(tag.clone());
        }
        Ok(1)
    }

    fn delete_subscriptions(&mut self, ids: &[SubscriptionId]) -> InventoryStoreResult<u64> {
        if let Some(node) = self
            .state
            .nodes
            .values()
            .find(|node| node.subscription_id().is_some_and(|id| ids.contains(&id)))
        {
            return Err(InventoryStoreError::MissingReference(format!(
                "subscription still owns node {}",
                node.id()
            )));
        }
        let before = self.state.subscriptions.len();
        self.state.subscriptions.retain(|id, _| !ids.contains(id));
        Ok(count(before - self.state.subscriptions.len()))
    }

    fn insert_group(&mut self, name: &GroupName, policy: &str) -> InventoryStoreResult<Group> {
        self.state.last_group_id += 1;
        let group = Group {
            id: GroupId::from_persisted(self.state.last_group_id),
            name: name.clone(),
            policy: policy.to_owned(),
            version: 0,
            system_id: None,
        };
        self.state.groups.insert(group.id, group.clone());
        Ok(group)
    }

    fn find_group(&mut self, id: GroupId) -> InventoryStoreResult<Option<Group>> {
        Ok(self.state.groups.get(&id).cloned())
    }

    fn group_node_ids(&mut self, id: GroupId) -> InventoryStoreResult<Vec<NodeId>> {
        Ok(self
            .state
            .memberships
            .iter()
            .filter(|(group_id, _)| *group_id == id)
            .map(|(_, node_id)| *node_id)
            .collect())
    }

    fn insert_group_memberships(
        &mut self,
        group_id: GroupId,
        node_ids: &[NodeId],
    ) -> InventoryStoreResult<u64> {
        self.group_mut(group_id)?;
        if let Some(missing) = node_ids
            .iter()
            .find(|id| !self.state.nodes.contains_key(*id))
        {
            return Err(InventoryStoreError::MissingReference(format!("node {missing}")));
        }
        let inserted = node_ids
            .iter()
            .filter(|node_id| self.state.memberships.insert((group_id, **node_id)))
            .count();
        Ok(count(inserted))
    }

    fn delete_group_memberships(
        &mut self,
        group_id: GroupId,
        node_ids: &[NodeId],
    ) -> InventoryStoreResult<u64> {
        let removed = node_ids
            .iter()
            .filter(|node_id| self.state.memberships.remove(&(group_id, **node_id)))
            .count();
        Ok(count(removed))
    }

    fn delete_node_memberships(&mut self, node_ids: &[NodeId]) -> InventoryStoreResult<u64> {
        let before = self.state.memberships.len();
        self.state
            .memberships
            .retain(|(_, node_id)| !node_ids.contains(node_id));
        Ok(count(before - self.state.memberships.len()))
    }

    fn increment_group_versions_for_nodes(
        &mut self,
        system_id: SystemId,
        node_ids: &[NodeId],
    ) -> InventoryStoreResult<u64> {
        let affected: BTreeSet<GroupId> = self
            .state
            .memberships
            .iter()
            .filter(|(_, node_id)| node_ids.contains(node_id))
            .map(|(group_id, _)| *group_id)
            .collect();
        let mut bumped = 0;
        for group in self.state.groups.values_mut() {
            if group.system_id == Some(system_id) && affected.contains(&group.id) {
                group.version += 1;
                bumped += 1;
            }
        }
        Ok(bumped)
    }

    fn increment_group_version(&mut self, id: GroupId) -> InventoryStoreResult<u64> {
        Ok(match self.state.groups.get_mut(&id) {
            Some(group) => {
                group.version += 1;
                1
            }
            None => 0,
        })
    }

    fn get_or_create_system(&mut self) -> InventoryStoreResult<System> {
        Ok(self
            .state
            .system
            .get_or_insert_with(|| System::stopped(SINGLETON_SYSTEM_ID))
            .clone())
    }

    fn save_system_run(
        &mut self,
        system_id: SystemId,
        snapshot: &RunSnapshot,
        running_at: DateTime<Utc>,
    ) -> InventoryStoreResult<System> {
        let mut version_sum = 0_u64;
        for group_id in &snapshot.group_ids {
            version_sum += self.group_mut(*group_id)?.version;
        }
        for group in self.state.groups.values_mut() {
            group.system_id = snapshot
                .group_ids
                .contains(&group.id)
                .then_some(system_id);
        }
        let system = self.system_mut(system_id)?;
        system.running = true;
        system.running_config_id = snapshot.config_id;
        system.running_config_version = snapshot.config_version;
        system.running_dns_id = snapshot.dns_id;
        system.running_dns_version = snapshot.dns_version;
        system.running_routing_id = snapshot.routing_id;
        system.running_routing_version = snapshot.routing_version;
        system.running_group_ids.clone_from(&snapshot.group_ids);
        system.running_group_version_sum = version_sum;
        system.running_at = Some(running_at);
        Ok(system.clone())
    }

    fn save_system_stop(&mut self, system_id: SystemId) -> InventoryStoreResult<System> {
        for group in self.state.groups.values_mut() {
            if group.system_id == Some(system_id) {
                group.system_id = None;
            }
        }
        let system = self.system_mut(system_id)?;
        system.running = false;
        Ok(system.clone())
    }
}

fn count(rows: usize) -> u64 {
    u64::try_from(rows).unwrap_or(u64::MAX)
}
