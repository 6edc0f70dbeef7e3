//! Diesel row models for inventory persistence.

use super::schema::{group_nodes, groups, nodes, subscriptions, system};
use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::inventory::{
    domain::{
        Group, GroupId, GroupName, NewNode, NewSubscription, Node, NodeAttributes, NodeId,
        PersistedNodeData, Subscription, SubscriptionId, System, SystemId, Tag, parse_group_ids,
    },
    ports::{InventoryStoreError, InventoryStoreResult},
};

/// Query result row for nodes.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = nodes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NodeRow {
    pub id: i64,
    pub link: String,
    pub name: String,
    pub address: String,
    pub protocol: String,
    pub tag: Option<String>,
    pub subscription_id: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

impl NodeRow {
    pub fn into_domain(self) -> InventoryStoreResult<Node> {
        Ok(Node::from_persisted(PersistedNodeData {
            id: NodeId::from_persisted(self.id),
            attributes: NodeAttributes {
                link: self.link,
                name: self.name,
                address: self.address,
                protocol: self.protocol,
            },
            tag: persisted_tag(self.tag)?,
            subscription_id: self.subscription_id.map(SubscriptionId::from_persisted),
            updated_at: self.updated_at,
        }))
    }
}

/// Insert model for nodes.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = nodes)]
pub struct NewNodeRow<'a> {
    pub link: &'a str,
    pub name: &'a str,
    pub address: &'a str,
    pub protocol: &'a str,
    pub tag: Option<&'a str>,
    pub subscription_id: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

impl<'a> From<&'a NewNode> for NewNodeRow<'a> {
    fn from(node: &'a NewNode) -> Self {
        Self {
            link: &node.attributes.link,
            name: &node.attributes.name,
            address: &node.attributes.address,
            protocol: &node.attributes.protocol,
            tag: node.tag.as_ref().map(Tag::as_str),
            subscription_id: node.subscription_id.map(SubscriptionId::value),
            updated_at: node.updated_at,
        }
    }
}

/// Query result row for subscriptions.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = subscriptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SubscriptionRow {
    pub id: i64,
    pub link: String,
    pub status: String,
    pub info: String,
    pub tag: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionRow {
    pub fn into_domain(self) -> InventoryStoreResult<Subscription> {
        let id = SubscriptionId::from_persisted(self.id);
        Ok(Subscription::from_new(
            id,
            NewSubscription {
                link: self.link,
                tag: persisted_tag(self.tag)?,
                status: self.status,
                info: self.info,
                updated_at: self.updated_at,
            },
        ))
    }
}

/// Insert model for subscriptions.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = subscriptions)]
pub struct NewSubscriptionRow<'a> {
    pub link: &'a str,
    pub status: &'a str,
    pub info: &'a str,
    pub tag: Option<&'a str>,
    pub updated_at: DateTime<Utc>,
}

impl<'a> From<&'a NewSubscription> for NewSubscriptionRow<'a> {
    fn from(subscription: &'a NewSubscription) -> Self {
        Self {
            link: &subscription.link,
            status: &subscription.status,
            info: &subscription.info,
            tag: subscription.tag.as_ref().map(Tag::as_str),
            updated_at: subscription.updated_at,
        }
    }
}

/// Query result row for groups.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = groups)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct GroupRow {
    pub id: i64,
    pub name: String,
    pub policy: String,
    pub version: i64,
    pub system_id: Option<i64>,
}

impl GroupRow {
    pub fn into_domain(self) -> InventoryStoreResult<Group> {
        Ok(Group {
            id: GroupId::from_persisted(self.id),
            name: GroupName::new(self.name).map_err(InventoryStoreError::persistence)?,
            policy: self.policy,
            version: to_counter(self.version)?,
            system_id: self.system_id.map(SystemId::from_persisted),
        })
    }
}

/// Insert model for groups.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = groups)]
pub struct NewGroupRow<'a> {
    pub name: &'a str,
    pub policy: &'a str,
}

/// Insert model for membership edges.
#[derive(Debug, Clone, Copy, Insertable)]
#[diesel(table_name = group_nodes)]
pub struct GroupNodeRow {
    pub group_id: i64,
    pub node_id: i64,
}

/// Query result row for the system record.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = system)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SystemRow {
    pub id: i64,
    pub running: bool,
    pub running_config_version: i64,
    pub running_dns_version: i64,
    pub running_routing_version: i64,
    pub running_group_version_sum: i64,
    pub running_group_ids: String,
    pub running_at: Option<DateTime<Utc>>,
    pub running_config_id: Option<i64>,
    pub running_dns_id: Option<i64>,
    pub running_routing_id: Option<i64>,
}

impl SystemRow {
    pub fn into_domain(self) -> InventoryStoreResult<System> {
        Ok(System {
            id: SystemId::from_persisted(self.id),
            running: self.running,
            running_config_version: to_counter(self.running_config_version)?,
            running_dns_version: to_counter(self.running_dns_version)?,
            running_routing_version: to_counter(self.running_routing_version)?,
            running_group_version_sum: to_counter(self.running_group_version_sum)?,
            running_group_ids: parse_group_ids(&self.running_group_ids),
            running_at: self.running_at,
            running_config_id: self.running_config_id,
            running_dns_id: self.running_dns_id,
            running_routing_id: self.running_routing_id,
        })
    }
}

fn persisted_tag(tag: Option<String>) -> InventoryStoreResult<Option<Tag>> {
    tag.map(Tag::new)
        .transpose()
        .map_err(InventoryStoreError::persistence)
}

fn to_counter(value: i64) -> InventoryStoreResult<u64> {
    u64::try_from(value).map_err(InventoryStoreError::persistence)
}

pub fn to_column(value: u64) -> InventoryStoreResult<i64> {
    i64::try_from(value).map_err(InventoryStoreError::persistence)
}
