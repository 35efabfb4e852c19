//! Time and identifier ports.
//!
//! Passed explicitly through constructors so token expiry, audit timestamps and
//! correlation ids stay deterministic under test.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Source of "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Generator of opaque identifiers (request correlation ids).
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random UUIDv4 identifiers.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}
