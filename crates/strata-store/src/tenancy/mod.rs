//! Tenant lifecycle
//!
//! Each tenant owns one SQLite file under the configured data directory.

pub mod atomic;
pub mod manager;

pub use manager::{validate_tenant_name, TenantManager, TenantStore};
