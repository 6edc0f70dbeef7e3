//! Process-wide record describing the active configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{GroupId, SystemId};

/// Singleton system row.
///
/// The row is created lazily by the first transaction that needs it and is
/// otherwise written only by the reconciliation process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct System {
    /// Store-assigned identifier.
    pub id: SystemId,
    /// Whether a configuration is currently applied.
    pub running: bool,
    /// Version of the applied config record.
    pub running_config_version: u64,
    /// Version of the applied DNS record.
    pub running_dns_version: u64,
    /// Version of the applied routing record.
    pub running_routing_version: u64,
    /// Sum of the active groups' versions at apply time.
    pub running_group_version_sum: u64,
    /// Active groups at apply time.
    pub running_group_ids: Vec<GroupId>,
    /// When the configuration was last applied.
    pub running_at: Option<DateTime<Utc>>,
    /// Applied config record, owned by the reconciliation process.
    pub running_config_id: Option<i64>,
    /// Applied DNS record, owned by the reconciliation process.
    pub running_dns_id: Option<i64>,
    /// Applied routing record, owned by the reconciliation process.
    pub running_routing_id: Option<i64>,
}

impl System {
    /// Returns a freshly created, stopped system record.
    #[must_use]
    pub const fn stopped(id: SystemId) -> Self {
        Self {
            id,
            running: false,
            running_config_version: 0,
            running_dns_version: 0,
            running_routing_version: 0,
            running_group_version_sum: 0,
            running_group_ids: Vec::new(),
            running_at: None,
            running_config_id: None,
            running_dns_id: None,
            running_routing_id: None,
        }
    }
}

/// What the reconciliation process applied.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunSnapshot {
    /// Applied config record.
    pub config_id: Option<i64>,
    /// Applied config version.
    pub config_version: u64,
    /// Applied DNS record.
    pub dns_id: Option<i64>,
    /// Applied DNS version.
    pub dns_version: u64,
    /// Applied routing record.
    pub routing_id: Option<i64>,
    /// Applied routing version.
    pub routing_version: u64,
    /// Groups selected by the applied configuration.
    pub group_ids: Vec<GroupId>,
}

/// Serialises group identifiers into the persisted comma-separated form.
#[must_use]
pub fn encode_group_ids(ids: &[GroupId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Parses the persisted comma-separated group identifier list.
///
/// Blank input yields an empty list; entries that are not positive integers
/// are skipped.
#[must_use]
pub fn parse_group_ids(raw: &str) -> Vec<GroupId> {
    raw.split(',')
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .filter_map(|value| GroupId::new(value).ok())
        .collect()
}
