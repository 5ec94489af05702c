//! pmfem -- Nonlinear finite element assembly-and-solve driver for porous media mechanics
//!
//! The [base] module holds the input data (configuration, stages, time functions) and the
//! [fem] module holds the driver: equation numbering, the element contract and registry,
//! the Lagrange-multiplier constraints, the dynamic coefficients, and the Newton-Raphson solver.

/// Defines a type alias for the error type as a static string
pub type StrError = &'static str;

pub mod base;
pub mod fem;
pub mod prelude;
