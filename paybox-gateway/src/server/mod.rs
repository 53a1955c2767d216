//! Paybox server endpoints and failover selection.
//!
//! Paybox operates several servers per product: Paybox System (hosted payment
//! page) and Paybox Direct (server-to-server) each have a primary and one or more
//! backups. A request must be sent to a single server; after a transport failure
//! or a "retry elsewhere" response code the caller moves to another one with
//! [`ServerSelector::find_from`].
//!
//! Endpoints are grouped by service and operation type:
//!
//! | Service  | Operation        | Used by                                   |
//! |----------|------------------|-------------------------------------------|
//! | `paybox` | `paybox`         | [`Authorization`](crate::requests::Authorization) |
//! | `paybox` | `paybox_direct`  | [`DirectRequest`](crate::requests::DirectRequest) |
//!
//! # Configuration
//!
//! ```toml
//! [servers]
//! rotation = "primary_backup"
//!
//! [[servers.endpoints]]
//! service = "paybox"
//! operation = "paybox_direct"
//! role = "primary"
//! url = "https://ppps.paybox.com/PPPS.php"
//! ```
//!
//! Without a `[servers]` section the built-in production or pre-production set
//! from [`ServerSelector::paybox_defaults`] is used.

mod endpoint;
mod selector;

pub use endpoint::{RotationPolicy, ServerConfig, ServerEndpoint, ServerRole};
pub use selector::ServerSelector;

/// Service name of every Paybox endpoint.
pub const SERVICE: &str = "paybox";

/// Operation type of the Paybox System hosted payment page.
pub const OPERATION_SYSTEM: &str = "paybox";

/// Operation type of Paybox Direct.
pub const OPERATION_DIRECT: &str = "paybox_direct";
