//! Keeps jobs and routes in step with the configured source list.
//!
//! - [`RouteTable`]: HTTP path → namespace, read by the lookup handler
//! - [`SyncService`]: validates a new list and reconciles jobs and routes to it

pub mod error;
pub mod reconciler;
pub mod routes;

pub use error::SyncError;
pub use reconciler::{ReconcileReport, SyncService};
pub use routes::{RouteMatch, RouteTable};
