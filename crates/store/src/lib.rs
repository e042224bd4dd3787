//! Relational data model and storage backends for the inventory pipeline.
//!
//! - [`model`] holds the row types: source tables written by upstream
//!   collaborators and derived tables owned by the pipeline stages
//! - [`InventoryStore`] is the set of queries and writes the stages need
//! - [`InMemoryStore`] backs tests and local runs, [`PostgresStore`] backs
//!   production

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod query;
pub mod store;

pub use common::{
    IngredientId, InventoryItemId, JobRunId, LocationId, MenuItemId, Money, PurchaseOrderId,
    SnapshotId, TenantId, VendorId,
};
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use model::{
    ActiveSpecLine, DemandForecastDaily, DrinkSpec, DrinkSpecLine, InventoryItem,
    InventorySnapshot, InventorySnapshotLine, ItemUsage, JobRun, JobStatus, PurchaseOrder,
    PurchaseOrderLine, PurchaseOrderStatus, ReorderInput, ReorderPolicy, Severity, SoldLine,
    SoldOrder, SoldOrderItem, TheoreticalUsageDaily, VarianceFlag, VendorItem,
};
pub use postgres::PostgresStore;
pub use query::{DateRange, Scope};
pub use store::InventoryStore;
