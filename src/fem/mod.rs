//! Implements the finite element method

mod communicator;
mod domain;
mod dyn_coefs;
mod element;
mod element_porous_rod;
mod element_rod;
mod element_rod_joint;
mod element_seepage;
mod essential_bcs;
mod file_io;
mod linear_solver;
mod node;
mod point_natural_bcs;
mod registry;
mod solution;
mod solver;
mod summary;
mod tangent;
pub use crate::fem::communicator::*;
pub use crate::fem::domain::*;
pub use crate::fem::dyn_coefs::*;
pub use crate::fem::element::*;
pub use crate::fem::element_porous_rod::*;
pub use crate::fem::element_rod::*;
pub use crate::fem::element_rod_joint::*;
pub use crate::fem::element_seepage::*;
pub use crate::fem::essential_bcs::*;
pub use crate::fem::file_io::*;
pub use crate::fem::linear_solver::*;
pub use crate::fem::node::*;
pub use crate::fem::point_natural_bcs::*;
pub use crate::fem::registry::*;
pub use crate::fem::solution::*;
pub use crate::fem::solver::*;
pub use crate::fem::summary::*;
pub use crate::fem::tangent::*;
