//! Implements the input data structures for a finite element simulation

mod config;
mod constants;
mod element_data;
mod enums;
mod fn_time;
mod sample_meshes;
mod sim_input;
mod stage;
pub use crate::base::config::*;
pub use crate::base::constants::*;
pub use crate::base::element_data::*;
pub use crate::base::enums::*;
pub use crate::base::fn_time::*;
pub use crate::base::sample_meshes::*;
pub use crate::base::sim_input::*;
pub use crate::base::stage::*;
