//! Linear-algebra core: traits, vector layout and dense wrappers.

pub mod partitioner;
pub mod traits;
pub mod vector;
pub mod wrappers;

pub use partitioner::{CellRef, Neighbor, Partitioner};
pub use traits::{BlockDiagonalProvider, DiagonalProvider, DofVector, MatVec};
pub use vector::{DistributedVector, GhostedValues};
