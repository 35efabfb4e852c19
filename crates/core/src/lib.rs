//! `stratum-core`: shared primitives for the access-control pipeline.
//!
//! This crate contains **no** transport or storage concerns: identifiers,
//! the runtime environment flag, time/id ports and the persistence error type
//! that every adapter maps into.

pub mod clock;
pub mod environment;
pub mod error;
pub mod id;

pub use clock::{Clock, IdGenerator, SystemClock, UuidGenerator};
pub use environment::Environment;
pub use error::{StoreError, StoreResult};
pub use id::{RoleId, TenantId, UserId};
