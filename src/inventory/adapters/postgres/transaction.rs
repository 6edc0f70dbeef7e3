//! Diesel implementation of [`InventoryTransaction`].

use super::{
    models::{
        GroupNodeRow, GroupRow, NewGroupRow, NewNodeRow, NewSubscriptionRow, NodeRow,
        SubscriptionRow, SystemRow, to_column,
    },
    schema::{group_nodes, groups, nodes, subscriptions, system},
};
use crate::inventory::{
    domain::{
        Group, GroupId, GroupName, NewNode, NewSubscription, Node, NodeAttributes, NodeId,
        RunSnapshot, Subscription, SubscriptionId, System, SystemId, Tag, encode_group_ids,
    },
    ports::{InventoryStoreError, InventoryStoreResult, InventoryTransaction, NodeScope},
};
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};
use tokio_util::sync::CancellationToken;

const NODE_NAME_UNIQUE: &str = "idx_nodes_subscription_name_unique";
const NODE_TAG_UNIQUE: &str = "idx_nodes_tag_unique";
const SUBSCRIPTION_TAG_UNIQUE: &str = "idx_subscriptions_tag_unique";

/// Open transaction over one pooled connection.
///
/// Every method first checks the cancellation token so abandoned callers
/// stop issuing statements; the commit check in the store does the rest.
pub struct PgInventoryTransaction<'a> {
    conn: &'a mut PgConnection,
    cancel: &'a CancellationToken,
}

impl<'a> PgInventoryTransaction<'a> {
    pub const fn new(conn: &'a mut PgConnection, cancel: &'a CancellationToken) -> Self {
        Self { conn, cancel }
    }

    pub fn ensure_active(&self) -> InventoryStoreResult<()> {
        if self.cancel.is_cancelled() {
            return Err(InventoryStoreError::Cancelled);
        }
        Ok(())
    }

    fn find_system(&mut self, id: SystemId) -> InventoryStoreResult<System> {
        system::table
            .filter(system::id.eq(id.value()))
            .select(SystemRow::as_select())
            .first::<SystemRow>(self.conn)
            .optional()
            .map_err(InventoryStoreError::persistence)?
            .ok_or_else(|| InventoryStoreError::MissingReference(format!("system {id}")))?
            .into_domain()
    }
}

impl InventoryTransaction for PgInventoryTransaction<'_> {
    fn find_node(&mut self, id: NodeId) -> InventoryStoreResult<Option<Node>> {
        self.ensure_active()?;
        nodes::table
            .filter(nodes::id.eq(id.value()))
            .select(NodeRow::as_select())
            .first::<NodeRow>(self.conn)
            .optional()
            .map_err(InventoryStoreError::persistence)?
            .map(NodeRow::into_domain)
            .transpose()
    }

    fn find_node_by_name(
        &mut self,
        name: &str,
        subscription_id: Option<SubscriptionId>,
    ) -> InventoryStoreResult<Option<Node>> {
        self.ensure_active()?;
        let query = nodes::table
            .filter(nodes::name.eq(name))
            .select(NodeRow::as_select())
            .into_boxed();
        let query = match subscription_id {
            Some(id) => query.filter(nodes::subscription_id.eq(id.value())),
            None => query.filter(nodes::subscription_id.is_null()),
        };
        query
            .first::<NodeRow>(self.conn)
            .optional()
            .map_err(InventoryStoreError::persistence)?
            .map(NodeRow::into_domain)
            .transpose()
    }

    fn insert_node(&mut self, node: &NewNode) -> InventoryStoreResult<Node> {
        self.ensure_active()?;
        let row = NewNodeRow::from(node);
        // Nested transaction: a savepoint, so a rejected row leaves the
        // surrounding transaction usable.
        let inserted = self.conn.transaction::<NodeRow, DieselError, _>(|conn| {
            diesel::insert_into(nodes::table)
                .values(&row)
                .returning(NodeRow::as_returning())
                .get_result(conn)
        });
        inserted
            .map_err(|err| match (err, node.tag.as_ref()) {
                (DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info), _)
                    if violates(info.as_ref(), NODE_NAME_UNIQUE) =>
                {
                    InventoryStoreError::DuplicateNodeName {
                        name: node.attributes.name.clone(),
                        subscription_id: node.subscription_id,
                    }
                }
                (other, Some(tag)) => map_tag_error(other, tag, NODE_TAG_UNIQUE),
                (other, None) => map_write_error(other),
            })?
            .into_domain()
    }

    fn update_node_attributes(
        &mut self,
        id: NodeId,
        attributes: &NodeAttributes,
        updated_at: DateTime<Utc>,
    ) -> InventoryStoreResult<u64> {
        self.ensure_active()?;
        let updated = self.conn.transaction::<usize, DieselError, _>(|conn| {
            diesel::update(nodes::table.filter(nodes::id.eq(id.value())))
                .set((
                    nodes::link.eq(attributes.link.as_str()),
                    nodes::name.eq(attributes.name.as_str()),
                    nodes::address.eq(attributes.address.as_str()),
                    nodes::protocol.eq(attributes.protocol.as_str()),
                    nodes::updated_at.eq(updated_at),
                ))
                .execute(conn)
        });
        match updated {
            Ok(rows) => Ok(rows_affected(rows)),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info))
                if violates(info.as_ref(), NODE_NAME_UNIQUE) =>
            {
                let subscription_id = nodes::table
                    .filter(nodes::id.eq(id.value()))
                    .select(nodes::subscription_id)
                    .first::<Option<i64>>(self.conn)
                    .map_err(InventoryStoreError::persistence)?
                    .map(SubscriptionId::from_persisted);
                Err(InventoryStoreError::DuplicateNodeName {
                    name: attributes.name.clone(),
                    subscription_id,
                })
            }
            Err(err) => Err(map_write_error(err)),
        }
    }

    fn set_node_tag(&mut self, id: NodeId, tag: &Tag) -> InventoryStoreResult<u64> {
        self.ensure_active()?;
        self.conn
            .transaction::<usize, DieselError, _>(|conn| {
                diesel::update(nodes::table.filter(nodes::id.eq(id.value())))
                    .set(nodes::tag.eq(tag.as_str()))
                    .execute(conn)
            })
            .map(rows_affected)
            .map_err(|err| map_tag_error(err, tag, NODE_TAG_UNIQUE))
    }

    fn delete_nodes(&mut self, ids: &[NodeId]) -> InventoryStoreResult<u64> {
        self.ensure_active()?;
        diesel::delete(nodes::table.filter(nodes::id.eq_any(node_values(ids))))
            .execute(self.conn)
            .map(rows_affected)
            .map_err(map_write_error)
    }

    fn node_ids_by_subscriptions(
        &mut self,
        ids: &[SubscriptionId],
    ) -> InventoryStoreResult<Vec<NodeId>> {
        self.ensure_active()?;
        let values: Vec<i64> = ids.iter().map(|id| id.value()).collect();
        nodes::table
            .filter(nodes::subscription_id.eq_any(values))
            .order(nodes::id.asc())
            .select(nodes::id)
            .load::<i64>(self.conn)
            .map(|rows| rows.into_iter().map(NodeId::from_persisted).collect())
            .map_err(InventoryStoreError::persistence)
    }

    fn list_nodes(
        &mut self,
        scope: NodeScope,
        after: Option<NodeId>,
        limit: usize,
    ) -> InventoryStoreResult<Vec<Node>> {
        self.ensure_active()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut query = scoped_nodes(scope)
            .order(nodes::id.asc())
            .limit(limit)
            .select(NodeRow::as_select());
        if let Some(after) = after {
            query = query.filter(nodes::id.gt(after.value()));
        }
        query
            .load::<NodeRow>(self.conn)
            .map_err(InventoryStoreError::persistence)?
            .into_iter()
            .map(NodeRow::into_domain)
            .collect()
    }

    fn count_nodes(&mut self, scope: NodeScope) -> InventoryStoreResult<u64> {
        self.ensure_active()?;
        let total = scoped_nodes(scope)
            .count()
            .get_result::<i64>(self.conn)
            .map_err(InventoryStoreError::persistence)?;
        u64::try_from(total).map_err(InventoryStoreError::persistence)
    }

    fn insert_subscription(
        &mut self,
        subscription: &NewSubscription,
    ) -> InventoryStoreResult<Subscription> {
        self.ensure_active()?;
        let row = NewSubscriptionRow::from(subscription);
        let inserted = self
            .conn
            .transaction::<SubscriptionRow, DieselError, _>(|conn| {
                diesel::insert_into(subscriptions::table)
                    .values(&row)
                    .returning(SubscriptionRow::as_returning())
                    .get_result(conn)
            });
        match (inserted, subscription.tag.as_ref()) {
            (Ok(row), _) => row.into_domain(),
            (Err(err), Some(tag)) => Err(map_tag_error(err, tag, SUBSCRIPTION_TAG_UNIQUE)),
            (Err(err), None) => Err(map_write_error(err)),
        }
    }

    fn find_subscription(
        &mut self,
        id: SubscriptionId,
    ) -> InventoryStoreResult<Option<Subscription>> {
        self.ensure_active()?;
        subscriptions::table
            .filter(subscriptions::id.eq(id.value()))
            .select(SubscriptionRow::as_select())
            .first::<SubscriptionRow>(self.conn)
            .optional()
            .map_err(InventoryStoreError::persistence)?
            .map(SubscriptionRow::into_domain)
            .transpose()
    }

    fn update_subscription_status(
        &mut self,
        id: SubscriptionId,
        status: &str,
        info: &str,
        updated_at: DateTime<Utc>,
    ) -> InventoryStoreResult<u64> {
        self.ensure_active()?;
        diesel::update(subscriptions::table.filter(subscriptions::id.eq(id.value())))
            .set((
                subscriptions::status.eq(status),
                subscriptions::info.eq(info),
                subscriptions::updated_at.eq(updated_at),
            ))
            .execute(self.conn)
            .map(rows_affected)
            .map_err(InventoryStoreError::persistence)
    }

    fn set_subscription_tag(&mut self, id: SubscriptionId, tag: &Tag) -> InventoryStoreResult<u64> {
        self.ensure_active()?;
        self.conn
            .transaction::<usize, DieselError, _>(|conn| {
                diesel::update(subscriptions::table.filter(subscriptions::id.eq(id.value())))
                    .set(subscriptions::tag.eq(tag.as_str()))
                    .execute(conn)
            })
            .map(rows_affected)
            .map_err(|err| map_tag_error(err, tag, SUBSCRIPTION_TAG_UNIQUE))
    }

    fn delete_subscriptions(&mut self, ids: &[SubscriptionId]) -> InventoryStoreResult<u64> {
        self.ensure_active()?;
        let values: Vec<i64> = ids.iter().map(|id| id.value()).collect();
        diesel::delete(subscriptions::table.filter(subscriptions::id.eq_any(values)))
            .execute(self.conn)
            .map(rows_affected)
            .map_err(map_write_error)
    }

    fn insert_group(&mut self, name: &GroupName, policy: &str) -> InventoryStoreResult<Group> {
        self.ensure_active()?;
        diesel::insert_into(groups::table)
            .values(&NewGroupRow {
                name: name.as_str(),
                policy,
            })
            .returning(GroupRow::as_returning())
            .get_result::<GroupRow>(self.conn)
            .map_err(InventoryStoreError::persistence)?
            .into_domain()
    }

    fn find_group(&mut self, id: GroupId) -> InventoryStoreResult<Option<Group>> {
        self.ensure_active()?;
        groups::table
            .filter(groups::id.eq(id.value()))
            .select(GroupRow::as_select())
            .first::<GroupRow>(self.conn)
            .optional()
            .map_err(InventoryStoreError::persistence)?
            .map(GroupRow::into_domain)
            .transpose()
    }

    fn group_node_ids(&mut self, id: GroupId) -> InventoryStoreResult<Vec<NodeId>> {
        self.ensure_active()?;
        group_nodes::table
            .filter(group_nodes::group_id.eq(id.value()))
            .order(group_nodes::node_id.asc())
            .select(group_nodes::node_id)
            .load::<i64>(self.conn)
            .map(|rows| rows.into_iter().map(NodeId::from_persisted).collect())
            .map_err(InventoryStoreError::persistence)
    }

    fn insert_group_memberships(
        &mut self,
        group_id: GroupId,
        node_ids: &[NodeId],
    ) -> InventoryStoreResult<u64> {
        self.ensure_active()?;
        if node_ids.is_empty() {
            return Ok(0);
        }
        let rows: Vec<GroupNodeRow> = node_ids
            .iter()
            .map(|node_id| GroupNodeRow {
                group_id: group_id.value(),
                node_id: node_id.value(),
            })
            .collect();
        self.conn
            .transaction::<usize, DieselError, _>(|conn| {
                diesel::insert_into(group_nodes::table)
                    .values(&rows)
                    .on_conflict_do_nothing()
                    .execute(conn)
            })
            .map(rows_affected)
            .map_err(map_write_error)
    }

    fn delete_group_memberships(
        &mut self,
        group_id: GroupId,
        node_ids: &[NodeId],
    ) -> InventoryStoreResult<u64> {
        self.ensure_active()?;
        diesel::delete(
            group_nodes::table
                .filter(group_nodes::group_id.eq(group_id.value()))
                .filter(group_nodes::node_id.eq_any(node_values(node_ids))),
        )
        .execute(self.conn)
        .map(rows_affected)
        .map_err(InventoryStoreError::persistence)
    }

    fn delete_node_memberships(&mut self, node_ids: &[NodeId]) -> InventoryStoreResult<u64> {
        self.ensure_active()?;
        diesel::delete(group_nodes::table.filter(group_nodes::node_id.eq_any(node_values(node_ids))))
            .execute(self.conn)
            .map(rows_affected)
            .map_err(InventoryStoreError::persistence)
    }

    fn increment_group_versions_for_nodes(
        &mut self,
        system_id: SystemId,
        node_ids: &[NodeId],
    ) -> InventoryStoreResult<u64> {
        self.ensure_active()?;
        let member_groups = group_nodes::table
            .filter(group_nodes::node_id.eq_any(node_values(node_ids)))
            .select(group_nodes::group_id);
        diesel::update(
            groups::table
                .filter(groups::system_id.eq(system_id.value()))
                .filter(groups::id.eq_any(member_groups)),
        )
        .set(groups::version.eq(groups::version + 1_i64))
        .execute(self.conn)
        .map(rows_affected)
        .map_err(InventoryStoreError::persistence)
    }

    fn increment_group_version(&mut self, id: GroupId) -> InventoryStoreResult<u64> {
        self.ensure_active()?;
        diesel::update(groups::table.filter(groups::id.eq(id.value())))
            .set(groups::version.eq(groups::version + 1_i64))
            .execute(self.conn)
            .map(rows_affected)
            .map_err(InventoryStoreError::persistence)
    }

    fn get_or_create_system(&mut self) -> InventoryStoreResult<System> {
        self.ensure_active()?;
        diesel::insert_into(system::table)
            .values(system::singleton.eq(true))
            .on_conflict(system::singleton)
            .do_nothing()
            .execute(self.conn)
            .map_err(InventoryStoreError::persistence)?;
        system::table
            .select(SystemRow::as_select())
            .first::<SystemRow>(self.conn)
            .map_err(InventoryStoreError::persistence)?
            .into_domain()
    }

    fn save_system_run(
        &mut self,
        system_id: SystemId,
        snapshot: &RunSnapshot,
        running_at: DateTime<Utc>,
    ) -> InventoryStoreResult<System> {
        self.ensure_active()?;
        let mut group_values: Vec<i64> = snapshot.group_ids.iter().map(|id| id.value()).collect();
        group_values.sort_unstable();
        group_values.dedup();
        let versions = groups::table
            .filter(groups::id.eq_any(&group_values))
            .select(groups::version)
            .load::<i64>(self.conn)
            .map_err(InventoryStoreError::persistence)?;
        if versions.len() != group_values.len() {
            return Err(InventoryStoreError::MissingReference(
                "applied snapshot names an unknown group".to_owned(),
            ));
        }
        let version_sum = versions.iter().sum::<i64>();

        diesel::update(
            groups::table
                .filter(groups::system_id.eq(system_id.value()))
                .filter(groups::id.ne_all(&group_values)),
        )
        .set(groups::system_id.eq(None::<i64>))
        .execute(self.conn)
        .map_err(InventoryStoreError::persistence)?;
        diesel::update(groups::table.filter(groups::id.eq_any(&group_values)))
            .set(groups::system_id.eq(system_id.value()))
            .execute(self.conn)
            .map_err(InventoryStoreError::persistence)?;

        let updated = diesel::update(system::table.filter(system::id.eq(system_id.value())))
            .set((
                system::running.eq(true),
                system::running_config_id.eq(snapshot.config_id),
                system::running_config_version.eq(to_column(snapshot.config_version)?),
                system::running_dns_id.eq(snapshot.dns_id),
                system::running_dns_version.eq(to_column(snapshot.dns_version)?),
                system::running_routing_id.eq(snapshot.routing_id),
                system::running_routing_version.eq(to_column(snapshot.routing_version)?),
                system::running_group_ids.eq(encode_group_ids(&snapshot.group_ids)),
                system::running_group_version_sum.eq(version_sum),
                system::running_at.eq(Some(running_at)),
            ))
            .execute(self.conn)
            .map_err(InventoryStoreError::persistence)?;
        if updated == 0 {
            return Err(InventoryStoreError::MissingReference(format!(
                "system {system_id}"
            )));
        }
        self.find_system(system_id)
    }

    fn save_system_stop(&mut self, system_id: SystemId) -> InventoryStoreResult<System> {
        self.ensure_active()?;
        diesel::update(groups::table.filter(groups::system_id.eq(system_id.value())))
            .set(groups::system_id.eq(None::<i64>))
            .execute(self.conn)
            .map_err(InventoryStoreError::persistence)?;
        diesel::update(system::table.filter(system::id.eq(system_id.value())))
            .set(system::running.eq(false))
            .execute(self.conn)
            .map_err(InventoryStoreError::persistence)?;
        self.find_system(system_id)
    }
}

type BoxedNodeQuery<'a> = nodes::BoxedQuery<'a, diesel::pg::Pg>;

fn scoped_nodes<'a>(scope: NodeScope) -> BoxedNodeQuery<'a> {
    let query = nodes::table.into_boxed();
    match scope {
        NodeScope::All => query,
        NodeScope::Manual => query.filter(nodes::subscription_id.is_null()),
        NodeScope::Subscription(id) => query.filter(nodes::subscription_id.eq(id.value())),
    }
}

fn node_values(ids: &[NodeId]) -> Vec<i64> {
    ids.iter().map(|id| id.value()).collect()
}

fn rows_affected(rows: usize) -> u64 {
    u64::try_from(rows).unwrap_or(u64::MAX)
}

fn violates(info: &dyn DatabaseErrorInformation, constraint: &str) -> bool {
    info.constraint_name().is_some_and(|name| name == constraint)
}

fn map_tag_error(err: DieselError, tag: &Tag, constraint: &str) -> InventoryStoreError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info)
            if violates(info.as_ref(), constraint) =>
        {
            InventoryStoreError::DuplicateTag(tag.clone())
        }
        other => map_write_error(other),
    }
}

fn map_write_error(err: DieselError) -> InventoryStoreError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, ref info) => {
            InventoryStoreError::MissingReference(info.message().to_owned())
        }
        other => InventoryStoreError::persistence(other),
    }
}
