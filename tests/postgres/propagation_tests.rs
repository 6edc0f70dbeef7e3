//! Group version propagation against `PostgreSQL`.

use crate::postgres::helpers::{PgContext, link, prepare};
use node_inventory::inventory::domain::{Group, ImportCandidate, NodeId, RunSnapshot};
use node_inventory::inventory::services::CreateSubscriptionRequest;
use rstest::rstest;

fn running_group(ctx: &PgContext, name: &str, members: &[NodeId]) -> Group {
    let group = ctx
        .runtime
        .block_on(ctx.groups.create_group(name, "random"))
        .expect("group creation");
    ctx.runtime
        .block_on(ctx.groups.add_group_nodes(group.id, members))
        .expect("membership");
    let mut active = ctx
        .runtime
        .block_on(ctx.system.get_or_create())
        .expect("system")
        .running_group_ids;
    active.push(group.id);
    ctx.runtime
        .block_on(ctx.system.record_run(RunSnapshot {
            group_ids: active,
            ..RunSnapshot::default()
        }))
        .expect("record run");
    reload(ctx, &group)
}

fn reload(ctx: &PgContext, group: &Group) -> Group {
    ctx.runtime
        .block_on(ctx.groups.find_group(group.id))
        .expect("group lookup")
        .expect("group exists")
}

fn seed(ctx: &PgContext, names: &[&str]) -> Vec<NodeId> {
    let candidates = names
        .iter()
        .map(|name| ImportCandidate::new(link(name, "host.example")))
        .collect();
    ctx.runtime
        .block_on(ctx.nodes.import_batch(true, None, candidates))
        .expect("seed import")
        .into_iter()
        .map(|result| result.node.expect("seeded node").id())
        .collect()
}

#[rstest]
fn removal_bumps_each_active_group_once() {
    let Some(ctx) = prepare().expect("test schema setup") else {
        return;
    };
    let ids = seed(&ctx, &["a", "b", "c"]);
    let shared = running_group(&ctx, "shared", &ids);
    let other = running_group(&ctx, "other", ids.get(2..).expect("third node"));
    let idle = ctx
        .runtime
        .block_on(ctx.groups.create_group("idle", "random"))
        .expect("group creation");
    ctx.runtime
        .block_on(ctx.groups.add_group_nodes(idle.id, &ids))
        .expect("membership");

    let removed = ctx
        .runtime
        .block_on(ctx.nodes.remove_nodes(ids.get(..2).expect("two nodes")))
        .expect("removal");

    assert_eq!(removed, 2);
    assert_eq!(reload(&ctx, &shared).version, shared.version + 1);
    assert_eq!(reload(&ctx, &other).version, other.version);
    assert_eq!(reload(&ctx, &idle).version, 0);
    let remaining = ctx
        .runtime
        .block_on(ctx.groups.group_nodes(shared.id))
        .expect("members");
    assert_eq!(remaining, ids.get(2..).expect("third node").to_vec());

    ctx.guard.cleanup().expect("cleanup schema");
}

#[rstest]
fn stopping_the_system_freezes_versions() {
    let Some(ctx) = prepare().expect("test schema setup") else {
        return;
    };
    let ids = seed(&ctx, &["a"]);
    let group = running_group(&ctx, "proxy", &ids);
    let stopped = ctx
        .runtime
        .block_on(ctx.system.record_stop())
        .expect("record stop");

    ctx.runtime
        .block_on(ctx.nodes.remove_nodes(&ids))
        .expect("removal");

    assert!(!stopped.running);
    let after = reload(&ctx, &group);
    assert_eq!(after.version, group.version);
    assert_eq!(after.system_id, None);

    ctx.guard.cleanup().expect("cleanup schema");
}

#[rstest]
fn run_records_sum_active_versions() {
    let Some(ctx) = prepare().expect("test schema setup") else {
        return;
    };
    let ids = seed(&ctx, &["a"]);
    let group = running_group(&ctx, "proxy", &[]);
    ctx.runtime
        .block_on(ctx.groups.add_group_nodes(group.id, &ids))
        .expect("membership");

    let system = ctx
        .runtime
        .block_on(ctx.system.record_run(RunSnapshot {
            group_ids: vec![group.id],
            config_version: 4,
            ..RunSnapshot::default()
        }))
        .expect("record run");

    assert!(system.running);
    assert_eq!(system.running_group_ids, vec![group.id]);
    assert_eq!(system.running_group_version_sum, group.version + 1);
    assert_eq!(system.running_config_version, 4);

    ctx.guard.cleanup().expect("cleanup schema");
}

#[rstest]
fn subscription_removal_cascades_and_bumps() {
    let Some(ctx) = prepare().expect("test schema setup") else {
        return;
    };
    let created = ctx
        .runtime
        .block_on(ctx.subscriptions.create_subscription(
            CreateSubscriptionRequest::new("https://provider.example/sub").with_candidates([
                ImportCandidate::new(link("hk", "hk.example")),
                ImportCandidate::new(link("sg", "sg.example")),
            ]),
        ))
        .expect("subscription import");
    let owned: Vec<NodeId> = created
        .results
        .iter()
        .filter_map(|result| result.node.as_ref().map(|node| node.id()))
        .collect();
    let group = running_group(&ctx, "proxy", &owned);

    let removed = ctx
        .runtime
        .block_on(
            ctx.subscriptions
                .remove_subscriptions(&[created.subscription.id()]),
        )
        .expect("removal");

    assert_eq!(removed, 1);
    assert_eq!(reload(&ctx, &group).version, group.version + 1);
    let members = ctx
        .runtime
        .block_on(ctx.groups.group_nodes(group.id))
        .expect("members");
    assert!(members.is_empty());
    let gone = ctx
        .runtime
        .block_on(ctx.subscriptions.find_subscription(created.subscription.id()))
        .expect("lookup");
    assert!(gone.is_none());

    ctx.guard.cleanup().expect("cleanup schema");
}
