//! Organization-scoped repositories
//!
//! Every write carries an `org_id` and every read filters by one; no query in
//! this module can cross a tenant boundary.

pub mod aliases;
pub mod organizations;
pub mod provider_log;
pub mod transactions;
