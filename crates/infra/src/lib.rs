//! Infrastructure layer: persistence adapters and health probes.
//!
//! Every port has an in-memory adapter (tests, local development without a
//! database) and a Postgres adapter backed by a shared `PgPool`.

pub mod audit_log;
pub mod directory;
pub mod health;
pub mod permissions;

mod pg;

pub use audit_log::{InMemoryAuditStore, PostgresAuditStore};
pub use directory::{InMemoryAccountDirectory, PostgresAccountDirectory};
pub use health::{DatabaseHealth, HealthProbe, HealthReport, PgHealthProbe, StaticHealthProbe};
pub use permissions::{InMemoryPermissionStore, PostgresPermissionStore};
