//! Subscription aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{SubscriptionId, Tag};

/// Insert payload for a new subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubscription {
    /// Remote subscription link.
    pub link: String,
    /// Optional globally unique tag.
    pub tag: Option<Tag>,
    /// Last fetch result summary.
    pub status: String,
    /// Provider metadata.
    pub info: String,
    /// Timestamp recorded as `updated_at`.
    pub updated_at: DateTime<Utc>,
}

/// A remote source that yields zero or more nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    id: SubscriptionId,
    link: String,
    tag: Option<Tag>,
    status: String,
    info: String,
    updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Materialises a stored subscription.
    #[must_use]
    pub fn from_new(id: SubscriptionId, new_subscription: NewSubscription) -> Self {
        Self {
            id,
            link: new_subscription.link,
            tag: new_subscription.tag,
            status: new_subscription.status,
            info: new_subscription.info,
            updated_at: new_subscription.updated_at,
        }
    }

    /// Returns the subscription identifier.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns the subscription link.
    #[must_use]
    pub fn link(&self) -> &str {
        &self.link
    }

    /// Returns the tag, if any.
    #[must_use]
    pub const fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    /// Returns the last fetch status.
    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Returns provider metadata.
    #[must_use]
    pub fn info(&self) -> &str {
        &self.info
    }

    /// Returns the last update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Records a new fetch result.
    pub fn record_refresh(
        &mut self,
        status: impl Into<String>,
        info: impl Into<String>,
        updated_at: DateTime<Utc>,
    ) {
        self.status = status.into();
        self.info = info.into();
        self.updated_at = updated_at;
    }

    /// Replaces the tag.
    pub fn set_tag(&mut self, tag: Tag) {
        self.tag = Some(tag);
    }
}
