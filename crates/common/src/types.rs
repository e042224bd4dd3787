use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a UUID-backed identifier newtype.
///
/// Each identifier gets the same surface: random construction, conversion
/// to and from [`Uuid`], `Display`, and transparent serde.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id!(
    /// Top-level account scope. All pipeline data is partitioned by tenant.
    TenantId
);
uuid_id!(
    /// A bar or restaurant location belonging to one tenant.
    LocationId
);
uuid_id!(
    /// A trackable stock unit at one location.
    InventoryItemId
);
uuid_id!(
    /// A named substance (spirit, mixer, ...) measured in ounces.
    IngredientId
);
uuid_id!(
    /// A sellable menu item referenced by POS line items and drink specs.
    MenuItemId
);
uuid_id!(
    /// A supplier of purchasable SKUs.
    VendorId
);
uuid_id!(PurchaseOrderId);
uuid_id!(
    /// A physical count event.
    SnapshotId
);
uuid_id!(
    /// One pipeline invocation.
    JobRunId
);
