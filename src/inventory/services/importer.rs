//! Node importer: turns raw links into stored nodes, deduplicating by name
//! within a subscription scope.
//!
//! Links are parsed before the transaction opens; only the lookup and the
//! write run inside it.

use crate::inventory::{
    domain::{
        ImportCandidate, ImportResult, ImportStatus, InventoryDomainError, NewNode, Node,
        NodeAttributes, NodeId, SubscriptionId, Tag,
    },
    ports::{InventoryTransaction, LinkParser},
    services::error::{InventoryErrorKind, InventoryServiceError, InventoryServiceResult},
};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// A candidate parsed and validated outside the transaction.
#[derive(Debug, Clone)]
pub struct PreparedCandidate {
    link: String,
    attributes: Result<NodeAttributes, InventoryDomainError>,
    tag: Result<Option<Tag>, InventoryDomainError>,
}

impl PreparedCandidate {
    /// Parses the link and validates the tag of `candidate`.
    #[must_use]
    pub fn prepare<P>(parser: &P, candidate: ImportCandidate) -> Self
    where
        P: LinkParser + ?Sized,
    {
        let attributes = parser.parse(&candidate.link);
        let tag = candidate.tag.map(Tag::new).transpose();
        Self {
            link: candidate.link,
            attributes,
            tag,
        }
    }

    /// Returns the derived node name when the link parsed, whatever the
    /// outcome of tag validation.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.attributes
            .as_ref()
            .ok()
            .map(|attributes| attributes.name.as_str())
    }

    /// Prepares a whole batch, preserving order.
    #[must_use]
    pub fn prepare_all<P>(parser: &P, candidates: Vec<ImportCandidate>) -> Vec<Self>
    where
        P: LinkParser + ?Sized,
    {
        candidates
            .into_iter()
            .map(|candidate| Self::prepare(parser, candidate))
            .collect()
    }
}

/// How [`import_node`] resolved one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// A new row was inserted.
    Created(Node),
    /// The same-named node's link changed and was updated in place.
    Updated(Node),
    /// An identical node already existed.
    Unchanged(Node),
}

impl ImportOutcome {
    /// Returns the stored node.
    #[must_use]
    pub const fn node(&self) -> &Node {
        match self {
            Self::Created(node) | Self::Updated(node) | Self::Unchanged(node) => node,
        }
    }
}

/// Imports one parsed node inside `tx`.
///
/// An existing node with the same name in the same subscription scope is
/// updated in place when its link differs, keeping its identifier and tag;
/// the candidate tag only applies to newly created nodes.
///
/// # Errors
///
/// Returns [`InventoryServiceError::Duplicate`] when a concurrent writer
/// inserted the same name first and [`InventoryServiceError::Conflict`]
/// when the tag is taken.
pub fn import_node(
    tx: &mut dyn InventoryTransaction,
    attributes: NodeAttributes,
    tag: Option<Tag>,
    subscription_id: Option<SubscriptionId>,
    now: DateTime<Utc>,
) -> InventoryServiceResult<ImportOutcome> {
    if let Some(mut existing) = tx.find_node_by_name(&attributes.name, subscription_id)? {
        if existing.link() == attributes.link {
            return Ok(ImportOutcome::Unchanged(existing));
        }
        if tx.update_node_attributes(existing.id(), &attributes, now)? == 0 {
            return Err(InventoryServiceError::not_found(format!(
                "node {}",
                existing.id()
            )));
        }
        existing.apply_attributes(attributes, now);
        return Ok(ImportOutcome::Updated(existing));
    }

    let node = tx.insert_node(&NewNode {
        attributes,
        tag,
        subscription_id,
        updated_at: now,
    })?;
    Ok(ImportOutcome::Created(node))
}

/// Results of one batch plus the nodes updated in place.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Per-candidate results, in input order.
    pub results: Vec<ImportResult>,
    /// Nodes whose attributes changed.
    pub updated: Vec<NodeId>,
}

/// Imports `candidates` in order inside `tx`.
///
/// Duplicates never abort. Other failures are recorded per item unless
/// `abort_on_error` is set, in which case the first one is returned. Store
/// failures always propagate.
///
/// # Errors
///
/// Returns the first non-duplicate error when `abort_on_error` is set, and
/// any [`InventoryServiceError::Store`] error.
pub fn import_batch(
    tx: &mut dyn InventoryTransaction,
    abort_on_error: bool,
    subscription_id: Option<SubscriptionId>,
    candidates: Vec<PreparedCandidate>,
    now: DateTime<Utc>,
) -> InventoryServiceResult<BatchOutcome> {
    let mut outcome = BatchOutcome::default();
    for PreparedCandidate {
        link,
        attributes: parsed,
        tag: validated,
    } in candidates
    {
        let imported = match (parsed, validated) {
            (Ok(attributes), Ok(tag)) => import_node(tx, attributes, tag, subscription_id, now),
            (Err(err), _) | (Ok(_), Err(err)) => Err(err.into()),
        };
        let result = match imported {
            Ok(ImportOutcome::Created(node)) => {
                debug!(node_id = %node.id(), name = node.name(), "imported node");
                success(link, ImportStatus::Created, node)
            }
            Ok(ImportOutcome::Updated(node)) => {
                debug!(node_id = %node.id(), name = node.name(), "updated node link");
                outcome.updated.push(node.id());
                success(link, ImportStatus::Updated, node)
            }
            Ok(ImportOutcome::Unchanged(node)) => {
                debug!(node_id = %node.id(), "node already present");
                let error = InventoryServiceError::Duplicate {
                    name: node.name().to_owned(),
                    subscription_id,
                };
                ImportResult {
                    link,
                    status: ImportStatus::Duplicate,
                    error: Some(error.to_string()),
                    node: Some(node),
                }
            }
            Err(err) => match err.kind() {
                InventoryErrorKind::Duplicate => failure(link, ImportStatus::Duplicate, &err),
                InventoryErrorKind::Store => return Err(err),
                _ if abort_on_error => return Err(err),
                _ => {
                    warn!(link = %link, error = %err, "skipping node");
                    failure(link, ImportStatus::Failed, &err)
                }
            },
        };
        outcome.results.push(result);
    }
    Ok(outcome)
}

fn success(link: String, status: ImportStatus, node: Node) -> ImportResult {
    ImportResult {
        link,
        status,
        error: None,
        node: Some(node),
    }
}

fn failure(link: String, status: ImportStatus, err: &InventoryServiceError) -> ImportResult {
    ImportResult {
        link,
        status,
        error: Some(err.to_string()),
        node: None,
    }
}
