//! HTTP API handlers

pub mod corrections;
pub mod health;
pub mod inbound;
pub mod providers;
pub mod transactions;

pub use corrections::correct_category;
pub use health::{health_check, health_routes};
pub use inbound::{inbound_default, inbound_with_provider};
pub use providers::{list_providers, provider_health};
pub use transactions::{get_transaction, mapping_stats};
