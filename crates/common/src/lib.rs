//! Shared types for the inventory pipeline.
//!
//! Every entity key is a distinct newtype over [`uuid::Uuid`] so a tenant id
//! can never be passed where a location id is expected.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{
    IngredientId, InventoryItemId, JobRunId, LocationId, MenuItemId, PurchaseOrderId, SnapshotId,
    TenantId, VendorId,
};
