//! Proxy node aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{NodeId, SubscriptionId, Tag};

/// Connection attributes derived from a node link.
///
/// The link is the source of truth; `name`, `address` and `protocol` are
/// always recomputed from it by a link parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAttributes {
    /// Canonical connection string.
    pub link: String,
    /// Display name, used as the deduplication key within a subscription.
    pub name: String,
    /// `host:port` of the endpoint.
    pub address: String,
    /// Protocol scheme such as `ss` or `vmess`.
    pub protocol: String,
}

/// Insert payload for a node that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNode {
    /// Parsed connection attributes.
    pub attributes: NodeAttributes,
    /// Optional globally unique tag.
    pub tag: Option<Tag>,
    /// Owning subscription; `None` for manually added nodes.
    pub subscription_id: Option<SubscriptionId>,
    /// Timestamp recorded as `updated_at`.
    pub updated_at: DateTime<Utc>,
}

/// Persisted node field bundle used to rebuild a [`Node`] from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedNodeData {
    /// Store-assigned identifier.
    pub id: NodeId,
    /// Connection attributes.
    pub attributes: NodeAttributes,
    /// Optional tag.
    pub tag: Option<Tag>,
    /// Owning subscription.
    pub subscription_id: Option<SubscriptionId>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A single proxy endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    id: NodeId,
    #[serde(flatten)]
    attributes: NodeAttributes,
    tag: Option<Tag>,
    subscription_id: Option<SubscriptionId>,
    updated_at: DateTime<Utc>,
}

impl Node {
    /// Reconstructs a node from persisted storage data.
    #[must_use]
    pub fn from_persisted(data: PersistedNodeData) -> Self {
        Self {
            id: data.id,
            attributes: data.attributes,
            tag: data.tag,
            subscription_id: data.subscription_id,
            updated_at: data.updated_at,
        }
    }

    /// Materialises a freshly inserted node.
    #[must_use]
    pub fn from_new(id: NodeId, new_node: NewNode) -> Self {
        Self {
            id,
            attributes: new_node.attributes,
            tag: new_node.tag,
            subscription_id: new_node.subscription_id,
            updated_at: new_node.updated_at,
        }
    }

    /// Returns the node identifier.
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Returns the connection attributes.
    #[must_use]
    pub const fn attributes(&self) -> &NodeAttributes {
        &self.attributes
    }

    /// Returns the canonical link.
    #[must_use]
    pub fn link(&self) -> &str {
        &self.attributes.link
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.attributes.name
    }

    /// Returns the endpoint address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.attributes.address
    }

    /// Returns the protocol scheme.
    #[must_use]
    pub fn protocol(&self) -> &str {
        &self.attributes.protocol
    }

    /// Returns the tag, if any.
    #[must_use]
    pub const fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    /// Returns the owning subscription, if any.
    #[must_use]
    pub const fn subscription_id(&self) -> Option<SubscriptionId> {
        self.subscription_id
    }

    /// Returns the last update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Replaces the connection attributes, keeping identity and tag.
    pub fn apply_attributes(&mut self, attributes: NodeAttributes, updated_at: DateTime<Utc>) {
        self.attributes = attributes;
        self.updated_at = updated_at;
    }

    /// Replaces the tag.
    pub fn set_tag(&mut self, tag: Tag) {
        self.tag = Some(tag);
    }
}
