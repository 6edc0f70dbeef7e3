//! Application services for the inventory.
//!
//! Each public operation runs as exactly one store transaction. The
//! [`importer`] and [`propagation`] building blocks run inside a caller's
//! transaction and can be composed into new operations.

mod error;
mod groups;
pub mod importer;
mod nodes;
pub mod propagation;
mod settings;
mod subscriptions;
mod system;

pub use error::{InventoryErrorKind, InventoryServiceError, InventoryServiceResult};
pub use groups::GroupService;
pub use nodes::NodeInventoryService;
pub use settings::ServiceSettings;
pub use subscriptions::{CreateSubscriptionRequest, SubscriptionImport, SubscriptionService};
pub use system::SystemService;
