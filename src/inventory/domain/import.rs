//! Import candidates and per-link outcomes.

use serde::{Deserialize, Serialize};

use super::Node;

/// A raw link to import, with an optional tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCandidate {
    /// Node link.
    pub link: String,
    /// Unvalidated tag.
    pub tag: Option<String>,
}

impl ImportCandidate {
    /// Creates an untagged candidate.
    #[must_use]
    pub fn new(link: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            tag: None,
        }
    }

    /// Attaches a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

/// How the importer resolved a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    /// A new node row was inserted.
    Created,
    /// An existing node with the same name had its link replaced.
    Updated,
    /// An identical node already existed; nothing was written.
    Duplicate,
    /// The candidate was rejected.
    Failed,
}

/// Caller-facing result for one candidate of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    /// The candidate link, echoed back.
    pub link: String,
    /// Resolution status.
    pub status: ImportStatus,
    /// Error message for duplicate and failed candidates.
    pub error: Option<String>,
    /// The stored node for created, updated and duplicate candidates.
    pub node: Option<Node>,
}

impl ImportResult {
    /// Returns `true` when the candidate produced or refreshed a node.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.status, ImportStatus::Created | ImportStatus::Updated)
    }
}
