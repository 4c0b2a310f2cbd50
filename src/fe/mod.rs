//! Discrete function space: reference element, quadrature and DoF layout.

pub mod dof;
pub mod quadrature;
pub mod shape;

pub use dof::{DofSpace, Mapping, QUAD_OVERINTEGRATION, QUAD_STANDARD};
pub use shape::ShapeInfo;
