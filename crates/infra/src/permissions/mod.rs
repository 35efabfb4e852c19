//! `PermissionStore` adapters.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryPermissionStore;
pub use postgres::PostgresPermissionStore;
