//! `stratum-audit`: append-only security audit trail.

pub mod record;
pub mod redact;
pub mod store;

pub use record::{AuditAction, AuditRecord, EntityType, UNKNOWN_ACTOR};
pub use redact::{REDACTED_MESSAGE, contains_sensitive, redact};
pub use store::{AuditPage, AuditStore};
