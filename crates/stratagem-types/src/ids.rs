//! Type-safe identifier wrappers around `u64`.
//!
//! Entities and plans are identified by plain integers so that iteration
//! order (ascending id) is stable across runs. Entity ids are owned by the
//! host simulation; plan ids are issued by the executor from a monotonic
//! counter at submission time.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Generates a newtype wrapper around `u64` with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub u64);

        impl $name {
            /// Create an identifier from its raw value.
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Return the inner raw value.
            pub const fn into_inner(self) -> u64 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a simulated unit that can carry a plan.
    EntityId
}

define_id! {
    /// Identifier of an admitted plan, unique for the lifetime of an executor.
    PlanId
}
