//! World and object identifiers.

use serde::{Deserialize, Serialize};

/// Identifier of a world, an isolated execution context with its own
/// object registry and transports.
///
/// World ids are monotonically increasing integers. The root world is
/// always id 0; every other world receives its id from the side that
/// spawned it, before its transport carries any other traffic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct WorldId(pub u64);

impl WorldId {
    /// The root world created at process start.
    pub const ROOT: WorldId = WorldId(0);
}

impl std::fmt::Display for WorldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// Identifier of an object within one world's registry.
///
/// Object ids are monotonic per world and are never reused for the
/// lifetime of the world; disposed entries are tombstoned, not
/// recycled. Id 0 is the world's root object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct ObjectId(pub u64);

impl ObjectId {
    /// The built-in root object present in every world.
    pub const ROOT: ObjectId = ObjectId(0);
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "o{}", self.0)
    }
}
