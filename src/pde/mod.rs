//! Operator facades of the supported problems.
//!
//! - [`convection_diffusion`]: linear convection–diffusion, steady or unsteady.
//! - [`nonlinear`]: stationary reaction–diffusion with a cubic reaction term, solved
//!   by Newton's method under a load factor.

pub mod convection_diffusion;
pub mod nonlinear;

pub use convection_diffusion::ConvectionDiffusionOperator;
pub use nonlinear::NonlinearOperator;
