//! Makes available common structures needed to run a simulation
//!
//! You may write `use pmfem::prelude::*` in your code and obtain
//! access to commonly used functionality.

pub use crate::base::{Config, Dof, EleCond, ElementData, EssentialKey, FnTime, LinSol, Nbc, Pbc};
pub use crate::base::{SimInput, Stage, TimeControl, DEFAULT_OUT_DIR, DEFAULT_TEST_DIR};
pub use crate::fem::{Domain, ElementRegistry, FileIo, RunStatus, SerialComm, Solver, ThreadComm};
