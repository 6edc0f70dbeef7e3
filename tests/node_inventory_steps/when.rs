//! When steps for node inventory BDD scenarios.

use super::world::{InventoryWorld, link, run_async};
use eyre::WrapErr;
use node_inventory::cursor::PageRequest;
use node_inventory::inventory::domain::ImportCandidate;
use rstest_bdd_macros::when;

#[when(r#"node "{name}" is re-imported from host "{host}""#)]
fn reimport_node(world: &mut InventoryWorld, name: String, host: String) -> Result<(), eyre::Report> {
    let subscription_id = world
        .subscription
        .as_ref()
        .map(node_inventory::inventory::domain::Subscription::id);
    let candidate = ImportCandidate::new(link(&name, &host));
    run_async(world.nodes.import_batch(false, subscription_id, vec![candidate]))
        .wrap_err("re-import node")?;
    Ok(())
}

#[when(r#"node "{name}" is removed"#)]
fn remove_node(world: &mut InventoryWorld, name: String) -> Result<(), eyre::Report> {
    let id = world.seeded_node(&name)?.id();
    let removed = run_async(world.nodes.remove_nodes(&[id])).wrap_err("remove node")?;
    if removed != 1 {
        return Err(eyre::eyre!("expected one node removed, got {removed}"));
    }
    Ok(())
}

fn import_with_invalid(world: &mut InventoryWorld, name: &str, abort_on_error: bool) {
    let candidates = vec![
        ImportCandidate::new(link(name, "manual.example")),
        ImportCandidate::new("definitely not a link"),
    ];
    world.last_batch = Some(run_async(
        world.nodes.import_batch(abort_on_error, None, candidates),
    ));
}

#[when(r#"manual node "{name}" and an invalid link are imported without aborting"#)]
fn import_lenient(world: &mut InventoryWorld, name: String) {
    import_with_invalid(world, &name, false);
}

#[when(r#"manual node "{name}" and an invalid link are imported with abort on error"#)]
fn import_strict(world: &mut InventoryWorld, name: String) {
    import_with_invalid(world, &name, true);
}

#[when("the nodes are listed {size:u32} at a time")]
fn list_in_pages(world: &mut InventoryWorld, size: u32) -> Result<(), eyre::Report> {
    let mut request = PageRequest::first_page().with_first(size);
    loop {
        let page = run_async(world.nodes.list_nodes_by_subscription(None, request.clone()))
            .wrap_err("list page")?;
        world.pages_read += 1;
        world.listed.extend(page.items().map(node_inventory::inventory::domain::Node::id));
        match page.page_info.end_cursor {
            Some(cursor) if page.page_info.has_next_page => {
                request = PageRequest::first_page().with_first(size).with_after(cursor);
            }
            _ => return Ok(()),
        }
    }
}
