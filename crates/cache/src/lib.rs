//! Namespaced key-value cache for refreshed grid records.
//!
//! Each configured source owns one namespace. Writes are whole batches: either
//! every record of a batch lands or none does.

pub mod error;
pub mod memory;
pub mod store;

pub use error::CacheError;
pub use memory::MemoryStore;
pub use store::{CacheRecord, CacheStore, Namespace};
