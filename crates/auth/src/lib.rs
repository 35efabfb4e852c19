//! `stratum-auth`: authentication strategies and table-scoped authorization.
//!
//! No HTTP or storage types appear here: strategies see
//! an [`AuthRequest`] rather than a framework request, and persistence is
//! reached through the [`AccountDirectory`] and [`PermissionStore`] ports.

pub mod authorize;
pub mod bypass;
pub mod claims;
pub mod directory;
pub mod permissions;
pub mod principal;
pub mod registry;
pub mod store;
pub mod strategy;
pub mod token;

pub use authorize::{AuthorizationEngine, AuthzError};
pub use bypass::BypassStrategy;
pub use claims::{Hs256TokenVerifier, TokenClaims, TokenError, TokenVerifier, VerifiedClaims};
pub use directory::{AccountDirectory, TenantAccount, UserAccount};
pub use permissions::{
    CrudAction, PermissionGrant, PermissionPatch, PermissionRequirement, PermissionScope,
    PermissionSet, TablePermission,
};
pub use principal::Principal;
pub use registry::{InvalidResource, ManagedTable, all_tables, is_allowed_resource, validate_resource};
pub use store::{PermissionRecord, PermissionStore};
pub use strategy::{AuthError, AuthRequest, AuthStrategy};
pub use token::TokenStrategy;
