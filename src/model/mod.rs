//! # Cluster Model
//!
//! Plain data that crosses every boundary: index ↔ controller ↔ caller.
//!
//! Design rule: no index client types here. This module is pure data:
//! no I/O, no state, no async.

pub mod id;
pub mod neighbor;
pub mod result;

pub use id::{EntityId, CellId, CELLS_PER_EXPERIMENT};
pub use neighbor::NeighborMatch;
pub use result::{ClusterMember, ClusterResult};
