//! Shared helpers for `PostgreSQL` integration tests.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use mockable::DefaultClock;
use node_inventory::config::ENV_PREFIX;
use node_inventory::inventory::{
    adapters::{PostgresInventoryStore, UriLinkParser},
    services::{
        GroupService, NodeInventoryService, ServiceSettings, SubscriptionService, SystemService,
    },
};
use std::sync::Arc;
use tokio::runtime::Runtime;
use uuid::Uuid;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// SQL creating the inventory tables.
pub const CREATE_TABLES_SQL: &str =
    include_str!("../../migrations/2026-10-01-000000_create_inventory_tables/up.sql");

/// Node service over the `PostgreSQL` store.
pub type PgNodeService = NodeInventoryService<PostgresInventoryStore, UriLinkParser, DefaultClock>;

/// Subscription service over the `PostgreSQL` store.
pub type PgSubscriptionService =
    SubscriptionService<PostgresInventoryStore, UriLinkParser, DefaultClock>;

/// Returns the test server URL, if configured.
#[must_use]
pub fn test_database_url() -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}TEST_DATABASE_URL"))
        .ok()
        .filter(|url| !url.trim().is_empty())
}

/// Builds the runtime that drives the async services from sync tests.
///
/// # Errors
///
/// Returns an error if the runtime cannot be built.
pub fn test_runtime() -> Result<Runtime, BoxError> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .map_err(|err| Box::new(err) as BoxError)
}

#[derive(Debug)]
struct SearchPath {
    schema: String,
}

impl CustomizeConnection<PgConnection, diesel::r2d2::Error> for SearchPath {
    fn on_acquire(&self, conn: &mut PgConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(&format!("SET search_path TO {}", self.schema))
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Drops the test schema when cleaned up.
pub struct SchemaGuard {
    url: String,
    schema: String,
}

impl SchemaGuard {
    /// Drops the schema and everything in it.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached.
    pub fn cleanup(self) -> Result<(), BoxError> {
        let mut conn = PgConnection::establish(&self.url).map_err(|err| Box::new(err) as BoxError)?;
        conn.batch_execute(&format!("DROP SCHEMA IF EXISTS {} CASCADE", self.schema))
            .map_err(|err| Box::new(err) as BoxError)
    }
}

/// Services wired to a fresh schema.
pub struct PgContext {
    pub runtime: Runtime,
    pub guard: SchemaGuard,
    pub nodes: PgNodeService,
    pub subscriptions: PgSubscriptionService,
    pub groups: GroupService<PostgresInventoryStore>,
    pub system: SystemService<PostgresInventoryStore, DefaultClock>,
}

/// Creates a schema with the inventory tables and wires the services to it.
///
/// Returns `None` when no test server is configured.
///
/// # Errors
///
/// Returns an error if the schema or the pool cannot be created.
pub fn prepare() -> Result<Option<PgContext>, BoxError> {
    let Some(url) = test_database_url() else {
        return Ok(None);
    };
    let schema = format!("inventory_test_{}", Uuid::new_v4().simple());

    let mut conn = PgConnection::establish(&url).map_err(|err| Box::new(err) as BoxError)?;
    conn.batch_execute(&format!(
        "CREATE SCHEMA {schema}; SET search_path TO {schema};"
    ))
    .map_err(|err| Box::new(err) as BoxError)?;
    conn.batch_execute(CREATE_TABLES_SQL)
        .map_err(|err| Box::new(err) as BoxError)?;

    let pool = Pool::builder()
        .max_size(4)
        .connection_customizer(Box::new(SearchPath {
            schema: schema.clone(),
        }))
        .build(ConnectionManager::<PgConnection>::new(&url))
        .map_err(|err| Box::new(err) as BoxError)?;

    let store = Arc::new(PostgresInventoryStore::new(pool));
    let parser = Arc::new(UriLinkParser::new());
    let clock = Arc::new(DefaultClock);
    let settings = ServiceSettings::default();
    Ok(Some(PgContext {
        runtime: test_runtime()?,
        guard: SchemaGuard { url, schema },
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
    }))
}

/// Builds a trojan link whose derived name is `name`.
#[must_use]
pub fn link(name: &str, host: &str) -> String {
    format!("trojan://secret@{host}:443#{name}")
}
