//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_graph_store;
mod postgres_graph_store;

pub use in_memory_graph_store::{InMemoryGraphStore, TenantRows};
pub use postgres_graph_store::PostgresGraphStore;
