//! Node mutations and listings, each run as one store transaction.

use super::{
    error::{InventoryServiceError, InventoryServiceResult},
    importer::{ImportOutcome, PreparedCandidate, import_batch, import_node},
    propagation::propagate_node_change,
    settings::ServiceSettings,
};
use crate::cursor::{Cursor, Edge, Page, PageInfo, PageRequest};
use crate::inventory::{
    domain::{ImportCandidate, ImportResult, Node, NodeId, SubscriptionId, Tag},
    ports::{InventoryStore, InventoryTransaction, LinkParser, NodeScope},
};
use mockable::Clock;
use std::sync::Arc;
use tracing::info;

/// Coordinates node imports, updates, removals, tagging and listing.
pub struct NodeInventoryService<S, P, C>
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

impl<S, P, C> Clone for NodeInventoryService<S, P, C>
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

impl<S, P, C> NodeInventoryService<S, P, C>
where
    S: InventoryStore,
    P: LinkParser,
    C: Clock + Send + Sync,
{
    /// Creates a new node service.
    #[must_use]
    pub const fn new(store: Arc<S>, parser: Arc<P>, clock: Arc<C>, settings: ServiceSettings) -> Self {
        Self {
            store,
            parser,
            clock,
            settings,
        }
    }

    /// Imports one link.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryServiceError::Duplicate`] when an identical node
    /// already exists, a validation error for a bad link or tag, and
    /// [`InventoryServiceError::Conflict`] when the tag is taken.
    pub async fn import_node(
        &self,
        candidate: ImportCandidate,
        subscription_id: Option<SubscriptionId>,
    ) -> InventoryServiceResult<Node> {
        let attributes = self.parser.parse(&candidate.link)?;
        let tag = candidate.tag.map(Tag::new).transpose()?;
        let now = self.clock.utc();
        let propagate_updates = self.settings.propagates_attribute_updates();

        self.store
            .in_transaction(move |tx| {
                ensure_subscription(tx, subscription_id)?;
                match import_node(tx, attributes, tag, subscription_id, now)? {
                    ImportOutcome::Unchanged(node) => Err(InventoryServiceError::Duplicate {
                        name: node.name().to_owned(),
                        subscription_id,
                    }),
                    ImportOutcome::Updated(node) => {
                        if propagate_updates {
                            propagate_node_change(tx, &[node.id()])?;
                        }
                        Ok(node)
                    }
                    ImportOutcome::Created(node) => Ok(node),
                }
            })
            .await
    }

    /// Imports `candidates` in order as one transaction.
    ///
    /// With `abort_on_error` unset the call only fails on store errors and
    /// every candidate gets a result. With it set, the first error other
    /// than a duplicate rolls back the whole batch.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryServiceError`] as described above, or
    /// [`InventoryServiceError::NotFound`] for an unknown subscription.
    pub async fn import_batch(
        &self,
        abort_on_error: bool,
        subscription_id: Option<SubscriptionId>,
        candidates: Vec<ImportCandidate>,
    ) -> InventoryServiceResult<Vec<ImportResult>> {
        let prepared = PreparedCandidate::prepare_all(&*self.parser, candidates);
        let now = self.clock.utc();
        let propagate_updates = self.settings.propagates_attribute_updates();

        let results = self
            .store
            .in_transaction(move |tx| {
                ensure_subscription(tx, subscription_id)?;
                let outcome = import_batch(tx, abort_on_error, subscription_id, prepared, now)?;
                if propagate_updates {
                    propagate_node_change(tx, &outcome.updated)?;
                }
                Ok::<_, InventoryServiceError>(outcome.results)
            })
            .await?;
        info!(
            candidates = results.len(),
            imported = results.iter().filter(|result| result.is_success()).count(),
            "import batch committed"
        );
        Ok(results)
    }

    /// Replaces the link of node `id` and returns the updated node.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad link,
    /// [`InventoryServiceError::NotFound`] when no node has `id`, and
    /// [`InventoryServiceError::Duplicate`] when the new name clashes with a
    /// sibling.
    pub async fn update_node(&self, id: NodeId, link: &str) -> InventoryServiceResult<Node> {
        let attributes = self.parser.parse(link)?;
        let now = self.clock.utc();
        let propagate_updates = self.settings.propagates_attribute_updates();

        let node = self
            .store
            .in_transaction(move |tx| {
                if tx.update_node_attributes(id, &attributes, now)? == 0 {
                    return Err(InventoryServiceError::not_found(format!("node {id}")));
                }
                if propagate_updates {
                    propagate_node_change(tx, &[id])?;
                }
                tx.find_node(id)?
                    .ok_or_else(|| InventoryServiceError::not_found(format!("node {id}")))
            })
            .await?;
        info!(node_id = %id, "node updated");
        Ok(node)
    }

    /// Removes nodes and their group memberships, bumping the active groups
    /// that referenced them. Returns the number of nodes removed.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryServiceError::Store`] when any step fails; nothing
    /// is removed or bumped in that case.
    pub async fn remove_nodes(&self, ids: &[NodeId]) -> InventoryServiceResult<u64> {
        let mut unique_ids = ids.to_vec();
        unique_ids.sort_unstable();
        unique_ids.dedup();

        let removed = self
            .store
            .in_transaction(move |tx| remove_nodes_in(tx, &unique_ids))
            .await?;
        info!(removed, "nodes removed");
        Ok(removed)
    }

    /// Removes the nodes named by opaque cursors.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryServiceError::Cursor`] before any write when a
    /// token is invalid, otherwise as [`Self::remove_nodes`].
    pub async fn remove_nodes_by_cursor(&self, cursors: &[Cursor]) -> InventoryServiceResult<u64> {
        let ids = cursors
            .iter()
            .map(|cursor| Ok(NodeId::from_persisted(cursor.decode()?)))
            .collect::<InventoryServiceResult<Vec<_>>>()?;
        self.remove_nodes(&ids).await
    }

    /// Sets the tag of node `id`. Returns 0 when no node matched.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed tag and
    /// [`InventoryServiceError::Conflict`] when another node holds it.
    pub async fn tag_node(&self, id: NodeId, tag: &str) -> InventoryServiceResult<u64> {
        let validated = Tag::new(tag)?;
        self.store
            .in_transaction(move |tx| {
                Ok::<_, InventoryServiceError>(tx.set_node_tag(id, &validated)?)
            })
            .await
    }

    /// Returns node `id`, if present.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryServiceError::Store`] when the lookup fails.
    pub async fn find_node(&self, id: NodeId) -> InventoryServiceResult<Option<Node>> {
        self.store
            .in_transaction(move |tx| Ok::<_, InventoryServiceError>(tx.find_node(id)?))
            .await
    }

    /// Lists nodes of one subscription, or of every subscription and the
    /// manual scope when `subscription_id` is `None`, in ascending
    /// identifier order.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an oversized page or an invalid
    /// `after` cursor.
    pub async fn list_nodes_by_subscription(
        &self,
        subscription_id: Option<SubscriptionId>,
        request: PageRequest,
    ) -> InventoryServiceResult<Page<Node>> {
        self.list_nodes(NodeScope::from_filter(subscription_id), request)
            .await
    }

    /// Lists nodes in `scope`.
    ///
    /// # Errors
    ///
    /// As [`Self::list_nodes_by_subscription`].
    pub async fn list_nodes(
        &self,
        scope: NodeScope,
        request: PageRequest,
    ) -> InventoryServiceResult<Page<Node>> {
        let first = usize::try_from(self.settings.page_size(&request)?).unwrap_or(usize::MAX);
        let after = request
            .after
            .as_ref()
            .map(|cursor| cursor.decode().map(NodeId::from_persisted))
            .transpose()?;

        let (mut nodes, total_count) = self
            .store
            .in_transaction(move |tx| {
                let nodes = tx.list_nodes(scope, after, first.saturating_add(1))?;
                let total = tx.count_nodes(scope)?;
                Ok::<_, InventoryServiceError>((nodes, total))
            })
            .await?;

        let has_next_page = nodes.len() > first;
        nodes.truncate(first);
        let edges: Vec<Edge<Node>> = nodes
            .into_iter()
            .map(|node| Edge {
                cursor: Cursor::encode(node.id().value()),
                node,
            })
            .collect();
        let end_cursor = edges.last().map(|edge| edge.cursor.clone());
        Ok(Page {
            edges,
            page_info: PageInfo {
                has_next_page,
                end_cursor,
            },
            total_count,
        })
    }
}

/// Propagates, then deletes memberships and node rows.
pub(crate) fn remove_nodes_in(
    tx: &mut dyn InventoryTransaction,
    ids: &[NodeId],
) -> InventoryServiceResult<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    propagate_node_change(tx, ids)?;
    tx.delete_node_memberships(ids)?;
    Ok(tx.delete_nodes(ids)?)
}

pub(crate) fn ensure_subscription(
    tx: &mut dyn InventoryTransaction,
    subscription_id: Option<SubscriptionId>,
) -> InventoryServiceResult<()> {
    match subscription_id {
        Some(id) if tx.find_subscription(id)?.is_none() => {
            Err(InventoryServiceError::not_found(format!("subscription {id}")))
        }
        _ => Ok(()),
    }
}
