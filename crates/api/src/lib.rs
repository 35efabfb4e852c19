//! HTTP API: routing, authentication guard, and the security exception pipeline.

pub mod app;
pub mod authz;
pub mod config;
pub mod context;
pub mod middleware;
