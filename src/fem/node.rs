use crate::base::Dof;
use gemlab::mesh::PointId;
use serde::{Deserialize, Serialize};

/// Holds a degree of freedom and its global equation number
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct DofEq {
    /// The DOF key
    pub dof: Dof,

    /// Global equation number
    pub eq: usize,
}

/// Holds the DOFs attached to a mesh point during a stage
///
/// The DOFs are kept in the order they were created.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Node {
    /// The point (vertex) of the mesh where this node lives
    pub point_id: PointId,

    /// DOFs and equation numbers
    pub dofs: Vec<DofEq>,
}

impl Node {
    /// Allocates a new node without DOFs
    pub fn new(point_id: PointId) -> Self {
        Node {
            point_id,
            dofs: Vec::new(),
        }
    }

    /// Adds a DOF, if not present yet, with equation number `eq`
    ///
    /// Returns the next available equation number: `eq + 1` if the DOF was added or `eq` otherwise.
    pub fn add_dof_and_eq(&mut self, dof: Dof, eq: usize) -> usize {
        if self.eq(dof).is_some() {
            return eq;
        }
        self.dofs.push(DofEq { dof, eq });
        eq + 1
    }

    /// Returns the equation number of a DOF
    pub fn eq(&self, dof: Dof) -> Option<usize> {
        self.dofs.iter().find(|d| d.dof == dof).map(|d| d.eq)
    }

    /// Returns the (DOF, equation) pairs
    pub fn pairs(&self) -> Vec<(Dof, usize)> {
        self.dofs.iter().map(|d| (d.dof, d.eq)).collect()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
