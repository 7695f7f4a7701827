//! # Data Models
//!
//! SeaORM entities for tenants, listings, their links and per-pair performance
//! records, plus small response types shared by handlers.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod listing;
pub mod performance;
pub mod tenant;
pub mod tenant_listing;

pub use listing::Entity as Listing;
pub use performance::Entity as Performance;
pub use tenant::Entity as Tenant;
pub use tenant_listing::Entity as TenantListing;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
