//! Uniqueness, tagging, pagination and rollback against `PostgreSQL`.

use crate::postgres::helpers::{link, prepare};
use node_inventory::cursor::PageRequest;
use node_inventory::inventory::{
    domain::{ImportCandidate, ImportStatus, Node},
    services::{CreateSubscriptionRequest, InventoryErrorKind, InventoryServiceError},
};
use rstest::rstest;

#[rstest]
fn manual_nodes_share_one_name_scope() {
    let Some(ctx) = prepare().expect("test schema setup") else {
        return;
    };

    let first = ctx
        .runtime
        .block_on(ctx.nodes.import_node(ImportCandidate::new(link("hk", "a.example")), None))
        .expect("first import");
    let results = ctx
        .runtime
        .block_on(ctx.nodes.import_batch(
            false,
            None,
            vec![
                ImportCandidate::new(link("hk", "a.example")),
                ImportCandidate::new(link("hk", "b.example")),
            ],
        ))
        .expect("batch import");

    let statuses: Vec<ImportStatus> = results.iter().map(|result| result.status).collect();
    assert_eq!(statuses, vec![ImportStatus::Duplicate, ImportStatus::Updated]);
    let updated = results
        .get(1)
        .and_then(|result| result.node.clone())
        .expect("updated node");
    assert_eq!(updated.id(), first.id());
    assert_eq!(updated.address(), "b.example:443");

    ctx.guard.cleanup().expect("cleanup schema");
}

#[rstest]
fn subscriptions_scope_node_names() {
    let Some(ctx) = prepare().expect("test schema setup") else {
        return;
    };
    let subscribe = |host: &str| {
        ctx.runtime
            .block_on(ctx.subscriptions.create_subscription(
                CreateSubscriptionRequest::new("https://provider.example/sub")
                    .with_candidates([ImportCandidate::new(link("hk", host))]),
            ))
            .expect("subscription import")
    };

    let first = subscribe("one.example");
    let second = subscribe("two.example");

    for created in [&first, &second] {
        let statuses: Vec<ImportStatus> =
            created.results.iter().map(|result| result.status).collect();
        assert_eq!(statuses, vec![ImportStatus::Created]);
    }
    let page = ctx
        .runtime
        .block_on(ctx.nodes.list_nodes_by_subscription(None, PageRequest::first_page()))
        .expect("listing");
    assert_eq!(page.total_count, 2);

    ctx.guard.cleanup().expect("cleanup schema");
}

#[rstest]
fn tag_collisions_are_conflicts() {
    let Some(ctx) = prepare().expect("test schema setup") else {
        return;
    };
    let results = ctx
        .runtime
        .block_on(ctx.nodes.import_batch(
            true,
            None,
            vec![
                ImportCandidate::new(link("hk", "hk.example")),
                ImportCandidate::new(link("sg", "sg.example")),
            ],
        ))
        .expect("seed import");
    let ids: Vec<_> = results
        .iter()
        .filter_map(|result| result.node.as_ref().map(Node::id))
        .collect();
    let [first, second] = ids.as_slice() else {
        panic!("expected two seeded nodes, got {ids:?}");
    };

    ctx.runtime
        .block_on(ctx.nodes.tag_node(*first, "primary"))
        .expect("first tag");
    let conflict = ctx.runtime.block_on(ctx.nodes.tag_node(*second, "primary"));
    let subscription_tag = ctx.runtime.block_on(ctx.subscriptions.create_subscription(
        CreateSubscriptionRequest::new("https://provider.example/sub").with_tag("primary"),
    ));

    assert!(
        matches!(conflict, Err(InventoryServiceError::Conflict(ref message)) if message.contains("primary")),
        "expected a tag conflict, got {conflict:?}"
    );
    assert!(subscription_tag.is_ok(), "node and subscription tags are separate");

    ctx.guard.cleanup().expect("cleanup schema");
}

#[rstest]
fn aborted_batches_roll_back_every_row() {
    let Some(ctx) = prepare().expect("test schema setup") else {
        return;
    };

    let result = ctx.runtime.block_on(ctx.nodes.import_batch(
        true,
        None,
        vec![
            ImportCandidate::new(link("hk", "hk.example")),
            ImportCandidate::new("not a link"),
        ],
    ));
    let page = ctx
        .runtime
        .block_on(ctx.nodes.list_nodes_by_subscription(None, PageRequest::first_page()))
        .expect("listing");

    assert_eq!(result.map_err(|err| err.kind()).err(), Some(InventoryErrorKind::Validation));
    assert_eq!(page.total_count, 0);

    ctx.guard.cleanup().expect("cleanup schema");
}

#[rstest]
fn pages_follow_identifier_order() {
    let Some(ctx) = prepare().expect("test schema setup") else {
        return;
    };
    let candidates = (0..5)
        .map(|index| ImportCandidate::new(link(&format!("node-{index}"), "pool.example")))
        .collect();
    ctx.runtime
        .block_on(ctx.nodes.import_batch(true, None, candidates))
        .expect("seed import");

    let first = ctx
        .runtime
        .block_on(
            ctx.nodes
                .list_nodes_by_subscription(None, PageRequest::first_page().with_first(2)),
        )
        .expect("first page");
    let cursor = first.page_info.end_cursor.clone().expect("end cursor");
    let rest = ctx
        .runtime
        .block_on(
            ctx.nodes
                .list_nodes_by_subscription(None, PageRequest::first_page().with_after(cursor)),
        )
        .expect("second page");

    let names: Vec<&str> = first.items().chain(rest.items()).map(Node::name).collect();
    assert_eq!(names, vec!["node-0", "node-1", "node-2", "node-3", "node-4"]);
    assert!(first.page_info.has_next_page);
    assert!(!rest.page_info.has_next_page);
    assert_eq!(rest.total_count, 5);

    ctx.guard.cleanup().expect("cleanup schema");
}

#[rstest]
fn concurrent_imports_of_one_name_keep_one_row() {
    let Some(ctx) = prepare().expect("test schema setup") else {
        return;
    };

    let outcomes = ctx.runtime.block_on(async {
        let handles: Vec<_> = ["one.example", "two.example", "three.example"]
            .into_iter()
            .map(|host| {
                let nodes = ctx.nodes.clone();
                tokio::spawn(async move {
                    nodes
                        .import_batch(false, None, vec![ImportCandidate::new(link("hk", host))])
                        .await
                })
            })
            .collect();
        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.expect("import task should join"));
        }
        outcomes
    });
    let page = ctx
        .runtime
        .block_on(ctx.nodes.list_nodes_by_subscription(None, PageRequest::first_page()))
        .expect("listing");

    assert!(outcomes.iter().all(Result::is_ok), "imports failed: {outcomes:?}");
    assert_eq!(page.total_count, 1);

    ctx.guard.cleanup().expect("cleanup schema");
}

#[rstest]
fn system_row_is_a_singleton() {
    let Some(ctx) = prepare().expect("test schema setup") else {
        return;
    };

    let first = ctx
        .runtime
        .block_on(ctx.system.get_or_create())
        .expect("first access");
    let second = ctx
        .runtime
        .block_on(ctx.system.get_or_create())
        .expect("second access");

    assert_eq!(first.id, second.id);
    assert!(!second.running);

    ctx.guard.cleanup().expect("cleanup schema");
}
