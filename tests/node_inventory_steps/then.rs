//! Then steps for node inventory BDD scenarios.

use super::world::{InventoryWorld, run_async};
use eyre::WrapErr;
use node_inventory::cursor::PageRequest;
use node_inventory::inventory::{
    domain::{ImportStatus, Node, SubscriptionId},
    services::InventoryErrorKind,
};
use rstest_bdd_macros::then;

fn current(world: &InventoryWorld, name: &str) -> Result<Node, eyre::Report> {
    let id = world.seeded_node(name)?.id();
    run_async(world.nodes.find_node(id))
        .wrap_err("load node")?
        .ok_or_else(|| eyre::eyre!("node '{name}' no longer exists"))
}

fn listed_names(
    world: &InventoryWorld,
    subscription_id: Option<SubscriptionId>,
) -> Result<Vec<String>, eyre::Report> {
    let page = run_async(
        world
            .nodes
            .list_nodes_by_subscription(subscription_id, PageRequest::first_page()),
    )
    .wrap_err("list nodes")?;
    Ok(page.items().map(|node| node.name().to_owned()).collect())
}

#[then(r#"node "{name}" points at host "{host}""#)]
fn node_points_at(world: &InventoryWorld, name: String, host: String) -> Result<(), eyre::Report> {
    let original = world.seeded_node(&name)?;
    let node = current(world, &name)?;
    if node.id() != original.id() {
        return Err(eyre::eyre!("node '{name}' was replaced instead of updated"));
    }
    if node.address() != format!("{host}:443") {
        return Err(eyre::eyre!("node '{name}' points at {}", node.address()));
    }
    Ok(())
}

#[then(r#"node "{name}" is unchanged"#)]
fn node_unchanged(world: &InventoryWorld, name: String) -> Result<(), eyre::Report> {
    let node = current(world, &name)?;
    if &node != world.seeded_node(&name)? {
        return Err(eyre::eyre!("node '{name}' changed: {node:?}"));
    }
    Ok(())
}

#[then("the group version has increased by {delta:u64}")]
fn group_version_increased(world: &InventoryWorld, delta: u64) -> Result<(), eyre::Report> {
    let before = world
        .group
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing group in scenario world"))?;
    let after = run_async(world.groups.find_group(before.id))
        .wrap_err("reload group")?
        .ok_or_else(|| eyre::eyre!("group vanished"))?;
    if after.version != before.version + delta {
        return Err(eyre::eyre!(
            "expected version {}, found {}",
            before.version + delta,
            after.version
        ));
    }
    Ok(())
}

#[then(r#"the subscription lists only node "{name}""#)]
fn subscription_lists_only(world: &InventoryWorld, name: String) -> Result<(), eyre::Report> {
    let subscription_id = world
        .subscription
        .as_ref()
        .map(node_inventory::inventory::domain::Subscription::id)
        .ok_or_else(|| eyre::eyre!("missing subscription in scenario world"))?;
    let names = listed_names(world, Some(subscription_id))?;
    if names != [name.clone()] {
        return Err(eyre::eyre!("expected only '{name}', found {names:?}"));
    }
    Ok(())
}

#[then("the batch reports {created:usize} created and {failed:usize} failed")]
fn batch_reports(world: &InventoryWorld, created: usize, failed: usize) -> Result<(), eyre::Report> {
    let results = match world.last_batch.as_ref() {
        Some(Ok(results)) => results,
        Some(Err(err)) => return Err(eyre::eyre!("batch failed: {err}")),
        None => return Err(eyre::eyre!("missing batch result")),
    };
    let count = |status: ImportStatus| results.iter().filter(|r| r.status == status).count();
    if (count(ImportStatus::Created), count(ImportStatus::Failed)) != (created, failed) {
        return Err(eyre::eyre!("unexpected batch results: {results:?}"));
    }
    Ok(())
}

#[then("the import fails with a validation error")]
fn import_fails_validation(world: &InventoryWorld) -> Result<(), eyre::Report> {
    match world.last_batch.as_ref() {
        Some(Err(err)) if err.kind() == InventoryErrorKind::Validation => Ok(()),
        other => Err(eyre::eyre!("expected a validation error, got {other:?}")),
    }
}

#[then("{count:usize} manual nodes exist")]
fn manual_nodes_exist(world: &InventoryWorld, count: usize) -> Result<(), eyre::Report> {
    let names = listed_names(world, None)?;
    if names.len() != count {
        return Err(eyre::eyre!("expected {count} nodes, found {names:?}"));
    }
    Ok(())
}

#[then("{pages:usize} pages were read covering all {total:usize} nodes")]
fn pages_cover_all(world: &InventoryWorld, pages: usize, total: usize) -> Result<(), eyre::Report> {
    let mut unique = world.listed.clone();
    unique.sort_unstable();
    unique.dedup();
    if world.pages_read != pages || world.listed.len() != total || unique.len() != total {
        return Err(eyre::eyre!(
            "read {} pages and {} nodes ({} distinct)",
            world.pages_read,
            world.listed.len(),
            unique.len()
        ));
    }
    if world.listed != unique {
        return Err(eyre::eyre!("nodes were not listed in identifier order"));
    }
    Ok(())
}
