//! Shared world state for node inventory BDD scenarios.

use std::collections::BTreeMap;
use std::sync::Arc;

use mockable::DefaultClock;
use node_inventory::inventory::{
    adapters::{InMemoryInventoryStore, UriLinkParser},
    domain::{Group, ImportResult, Node, NodeId, Subscription},
    services::{
        GroupService, InventoryServiceError, NodeInventoryService, ServiceSettings,
        SubscriptionService, SystemService,
    },
};
use rstest::fixture;

/// Node service type used by the BDD world.
pub type TestNodeService =
    NodeInventoryService<InMemoryInventoryStore, UriLinkParser, DefaultClock>;

/// Subscription service type used by the BDD world.
pub type TestSubscriptionService =
    SubscriptionService<InMemoryInventoryStore, UriLinkParser, DefaultClock>;

/// Scenario world for node inventory behaviour tests.
pub struct InventoryWorld {
    pub nodes: TestNodeService,
    pub subscriptions: TestSubscriptionService,
    pub groups: GroupService<InMemoryInventoryStore>,
    pub system: SystemService<InMemoryInventoryStore, DefaultClock>,
    pub subscription: Option<Subscription>,
    pub seeded: BTreeMap<String, Node>,
    pub group: Option<Group>,
    pub last_batch: Option<Result<Vec<ImportResult>, InventoryServiceError>>,
    pub pages_read: usize,
    pub listed: Vec<NodeId>,
}

impl InventoryWorld {
    /// Creates a world over an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        let store = Arc::new(InMemoryInventoryStore::new());
        let parser = Arc::new(UriLinkParser::new());
        let clock = Arc::new(DefaultClock);
        let settings = ServiceSettings::default();

        Self {
            nodes: NodeInventoryService::new(
                Arc::clone(&store),
                Arc::clone(&parser),
                Arc::clone(&clock),
                settings,
            ),
            subscriptions: SubscriptionService::new(
                Arc::clone(&store),
                parser,
                Arc::clone(&clock),
                settings,
            ),
            groups: GroupService::new(Arc::clone(&store)),
            system: SystemService::new(store, clock),
            subscription: None,
            seeded: BTreeMap::new(),
            group: None,
            last_batch: None,
            pages_read: 0,
            listed: Vec::new(),
        }
    }

    /// Returns the node seeded under `name`.
    pub fn seeded_node(&self, name: &str) -> Result<&Node, eyre::Report> {
        self.seeded
            .get(name)
            .ok_or_else(|| eyre::eyre!("no node named '{name}' was seeded"))
    }
}

impl Default for InventoryWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> InventoryWorld {
    InventoryWorld::default()
}

/// Builds a trojan link whose derived name is `name`.
pub fn link(name: &str, host: &str) -> String {
    format!("trojan://secret@{host}:443#{name}")
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
