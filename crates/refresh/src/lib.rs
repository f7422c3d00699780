//! Fetch-transform-store pipeline.
//!
//! A refresh pulls one source's complete listGrid table, turns every row into
//! a [`GridRecord`] keyed by facility code, and writes the batch into the
//! source's cache namespace.

pub mod error;
pub mod fetch;
pub mod grid;
pub mod pipeline;

pub use error::FetchError;
pub use fetch::{full_table_url, GridFetcher, HttpGridFetcher};
pub use grid::{transform_grid, GridRecord, ListGrid, ListGridResponse, Transformed};
pub use pipeline::{namespace_for, RefreshOutcome, RefreshPipeline, Refresher};
