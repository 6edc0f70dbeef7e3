//! Given steps for node inventory BDD scenarios.

use super::world::{InventoryWorld, link, run_async};
use eyre::WrapErr;
use node_inventory::inventory::{
    domain::{ImportCandidate, RunSnapshot},
    services::CreateSubscriptionRequest,
};
use rstest_bdd_macros::given;

#[given(r#"a subscription with nodes "{first}" and "{second}""#)]
fn subscription_with_nodes(
    world: &mut InventoryWorld,
    first: String,
    second: String,
) -> Result<(), eyre::Report> {
    let request = CreateSubscriptionRequest::new("https://provider.example/sub")
        .with_status("ok", "")
        .with_candidates([&first, &second].map(|name| {
            ImportCandidate::new(link(name, &format!("{name}.example")))
        }));
    let created = run_async(world.subscriptions.create_subscription(request))
        .wrap_err("create subscription for scenario")?;

    for result in created.results {
        let node = result
            .node
            .ok_or_else(|| eyre::eyre!("seed link '{}' was not imported", result.link))?;
        world.seeded.insert(node.name().to_owned(), node);
    }
    world.subscription = Some(created.subscription);
    Ok(())
}

#[given(r#"a running group containing node "{name}""#)]
fn running_group(world: &mut InventoryWorld, name: String) -> Result<(), eyre::Report> {
    let member = world.seeded_node(&name)?.id();
    let group = run_async(world.groups.create_group("scenario", "random"))
        .wrap_err("create group")?;
    run_async(world.groups.add_group_nodes(group.id, &[member])).wrap_err("add member")?;
    run_async(world.system.record_run(RunSnapshot {
        group_ids: vec![group.id],
        ..RunSnapshot::default()
    }))
    .wrap_err("record run")?;

    let active = run_async(world.groups.find_group(group.id))
        .wrap_err("reload group")?
        .ok_or_else(|| eyre::eyre!("group vanished after creation"))?;
    world.group = Some(active);
    Ok(())
}

#[given("the system is stopped")]
fn system_stopped(world: &mut InventoryWorld) -> Result<(), eyre::Report> {
    run_async(world.system.record_stop()).wrap_err("record stop")?;
    Ok(())
}

#[given("{count:usize} manual nodes")]
fn manual_nodes(world: &mut InventoryWorld, count: usize) -> Result<(), eyre::Report> {
    let candidates = (0..count)
        .map(|index| ImportCandidate::new(link(&format!("node-{index}"), "pool.example")))
        .collect();
    run_async(world.nodes.import_batch(true, None, candidates)).wrap_err("seed manual nodes")?;
    Ok(())
}
