//! Newtype identifiers for the core entities.
//!
//! Every long-running job and task carries a stable identifier so that
//! periodic services can address it across ticks without holding a reference.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! entity_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(OrderId);
entity_id!(PieceId);
entity_id!(UnitPieceId);
entity_id!(FilamentId);
entity_id!(PrinterId);
entity_id!(ControllerId);
entity_id!(TaskId);
entity_id!(PrintJobId);
entity_id!(FilamentChangeId);
entity_id!(SliceJobId);
entity_id!(ScheduleId);
entity_id!(ScheduleEntryId);
