//! Subscription lifecycle: creation with an initial node set, refresh,
//! removal with explicit cascade, and tagging.

use super::{
    error::{InventoryServiceError, InventoryServiceResult},
    importer::{PreparedCandidate, import_batch},
    nodes::remove_nodes_in,
    propagation::propagate_node_change,
    settings::ServiceSettings,
};
use crate::inventory::{
    domain::{
        ImportCandidate, ImportResult, NewSubscription, NodeId, Subscription,
        SubscriptionId, Tag,
    },
    ports::{InventoryStore, LinkParser, NodeScope},
};
use mockable::Clock;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

/// Request payload for creating a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSubscriptionRequest {
    link: String,
    tag: Option<String>,
    status: String,
    info: String,
    candidates: Vec<ImportCandidate>,
}

impl CreateSubscriptionRequest {
    /// Creates a request for `link` with no nodes.
    #[must_use]
    pub fn new(link: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            tag: None,
            status: String::new(),
            info: String::new(),
            candidates: Vec::new(),
        }
    }

    /// Sets the subscription tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Sets the fetch status and provider info.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>, info: impl Into<String>) -> Self {
        self.status = status.into();
        self.info = info.into();
        self
    }

    /// Sets the node links fetched from the subscription.
    #[must_use]
    pub fn with_candidates(mut self, candidates: impl IntoIterator<Item = ImportCandidate>) -> Self {
        self.candidates = candidates.into_iter().collect();
        self
    }
}

/// A created subscription with the per-link results of its initial import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionImport {
    /// The stored subscription.
    pub subscription: Subscription,
    /// Import results, in candidate order.
    pub results: Vec<ImportResult>,
}

/// Subscription orchestration service.
pub struct SubscriptionService<S, P, C>
where
    S: InventoryStore,
    P: LinkParser,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    parser: Arc<P>,
    clock: Arc<C>,
    settings: ServiceSettings,
}

impl<S, P, C> Clone for SubscriptionService<S, P, C>
where
    S: InventoryStore,
    P: LinkParser,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            parser: Arc::clone(&self.parser),
            clock: Arc::clone(&self.clock),
            settings: self.settings,
        }
    }
}

impl<S, P, C> SubscriptionService<S, P, C>
where
    S: InventoryStore,
    P: LinkParser,
    C: Clock + Send + Sync,
{
    /// Creates a new subscription service.
    #[must_use]
    pub const fn new(store: Arc<S>, parser: Arc<P>, clock: Arc<C>, settings: ServiceSettings) -> Self {
        Self {
            store,
            parser,
            clock,
            settings,
        }
    }

    /// Creates a subscription and imports its nodes without aborting on
    /// per-link failures.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed tag,
    /// [`InventoryServiceError::Conflict`] when the tag is taken, and store
    /// errors.
    pub async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> InventoryServiceResult<SubscriptionImport> {
        let tag = request.tag.map(Tag::new).transpose()?;
        let prepared = PreparedCandidate::prepare_all(&*self.parser, request.candidates);
        let now = self.clock.utc();
        let new_subscription = NewSubscription {
            link: request.link,
            tag,
            status: request.status,
            info: request.info,
            updated_at: now,
        };

        let created = self
            .store
            .in_transaction(move |tx| {
                let subscription = tx.insert_subscription(&new_subscription)?;
                let outcome = import_batch(tx, false, Some(subscription.id()), prepared, now)?;
                Ok::<_, InventoryServiceError>(SubscriptionImport {
                    subscription,
                    results: outcome.results,
                })
            })
            .await?;
        info!(
            subscription_id = %created.subscription.id(),
            nodes = created.results.iter().filter(|result| result.is_success()).count(),
            "subscription created"
        );
        Ok(created)
    }

    /// Records a fresh fetch of subscription `id`.
    ///
    /// Imports `candidates` without aborting, then removes owned nodes whose
    /// names no longer appear among the candidate links that parsed, bumping
    /// the active groups that referenced them. A candidate whose tag is
    /// invalid still keeps its node.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryServiceError::NotFound`] for an unknown
    /// subscription and store errors.
    pub async fn refresh_subscription(
        &self,
        id: SubscriptionId,
        status: impl Into<String>,
        info: impl Into<String>,
        candidates: Vec<ImportCandidate>,
    ) -> InventoryServiceResult<Vec<ImportResult>> {
        let fetch_status = status.into();
        let provider_info = info.into();
        let prepared = PreparedCandidate::prepare_all(&*self.parser, candidates);
        let fetched_names: BTreeSet<String> = prepared
            .iter()
            .filter_map(PreparedCandidate::name)
            .map(str::to_owned)
            .collect();
        let now = self.clock.utc();
        let propagate_updates = self.settings.propagates_attribute_updates();

        let (results, removed) = self
            .store
            .in_transaction(move |tx| {
                if tx.update_subscription_status(id, &fetch_status, &provider_info, now)? == 0 {
                    return Err(InventoryServiceError::not_found(format!("subscription {id}")));
                }
                let outcome = import_batch(tx, false, Some(id), prepared, now)?;
                if propagate_updates {
                    propagate_node_change(tx, &outcome.updated)?;
                }

                let stale: Vec<NodeId> = tx
                    .list_nodes(NodeScope::Subscription(id), None, usize::MAX)?
                    .into_iter()
                    .filter(|node| !fetched_names.contains(node.name()))
                    .map(|node| node.id())
                    .collect();
                let removed = remove_nodes_in(tx, &stale)?;
                Ok((outcome.results, removed))
            })
            .await?;
        info!(subscription_id = %id, removed, "subscription refreshed");
        Ok(results)
    }

    /// Removes subscriptions together with their nodes and those nodes'
    /// group memberships. Returns the number of subscriptions removed.
    ///
    /// # Errors
    ///
    /// Returns store errors; nothing is removed in that case.
    pub async fn remove_subscriptions(&self, ids: &[SubscriptionId]) -> InventoryServiceResult<u64> {
        let mut unique_ids = ids.to_vec();
        unique_ids.sort_unstable();
        unique_ids.dedup();

        let removed = self
            .store
            .in_transaction(move |tx| {
                if unique_ids.is_empty() {
                    return Ok(0);
                }
                let owned = tx.node_ids_by_subscriptions(&unique_ids)?;
                remove_nodes_in(tx, &owned)?;
                Ok::<_, InventoryServiceError>(tx.delete_subscriptions(&unique_ids)?)
            })
            .await?;
        info!(removed, "subscriptions removed");
        Ok(removed)
    }

    /// Sets the tag of subscription `id`. Returns 0 when none matched.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed tag and
    /// [`InventoryServiceError::Conflict`] when another subscription holds
    /// it.
    pub async fn tag_subscription(&self, id: SubscriptionId, tag: &str) -> InventoryServiceResult<u64> {
        let validated = Tag::new(tag)?;
        self.store
            .in_transaction(move |tx| {
                Ok::<_, InventoryServiceError>(tx.set_subscription_tag(id, &validated)?)
            })
            .await
    }

    /// Returns subscription `id`, if present.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryServiceError::Store`] when the lookup fails.
    pub async fn find_subscription(
        &self,
        id: SubscriptionId,
    ) -> InventoryServiceResult<Option<Subscription>> {
        self.store
            .in_transaction(move |tx| Ok::<_, InventoryServiceError>(tx.find_subscription(id)?))
            .await
    }
}
