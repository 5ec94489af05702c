use super::{Solution, TangentSink};
use crate::base::{Dof, EleCond, FnTime, Nbc};
use crate::StrError;
use gemlab::mesh::{Cell, CellId};
use russell_lab::Vector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Holds the information needed to number the equations of an element
///
/// Returned by the registry before any element is allocated.
#[derive(Clone, Debug, Default)]
pub struct ElementInfo {
    /// DOFs of each vertex of the cell (npoint)
    pub dofs: Vec<Vec<Dof>>,

    /// Pairs (y key, f key) mapping primary variables to their conjugated natural quantities
    pub y_to_f: Vec<(Dof, &'static str)>,

    /// DOFs with first order time derivatives
    pub t1_vars: Vec<Dof>,

    /// DOFs with second order time derivatives
    pub t2_vars: Vec<Dof>,

    /// The element is a joint (connector) that does not create its own nodes
    pub is_joint: bool,
}

impl ElementInfo {
    /// Allocates a new instance with the same DOFs at every vertex
    ///
    /// The (y, f) pairs are derived from the DOFs with conjugated natural quantities.
    pub fn new(npoint: usize, dofs: &[Dof], t1_vars: &[Dof], t2_vars: &[Dof]) -> Self {
        ElementInfo {
            dofs: vec![dofs.to_vec(); npoint],
            y_to_f: dofs.iter().filter_map(|d| d.natural_key().map(|f| (*d, f))).collect(),
            t1_vars: t1_vars.to_vec(),
            t2_vars: t2_vars.to_vec(),
            is_joint: false,
        }
    }
}

/// Holds the data of a cell passed to the registry functions
#[derive(Clone, Debug)]
pub struct CellInput {
    /// Space dimension
    pub ndim: usize,

    /// The cell
    pub cell: Cell,

    /// Coordinates of each vertex of the cell
    pub coords: Vec<Vec<f64>>,

    /// Natural conditions applied to the faces of the cell (face index, condition)
    pub face_conds: Vec<(usize, Nbc)>,
}

impl CellInput {
    /// Returns the length of a two-node line cell and its unit direction vector
    pub fn line_geometry(&self) -> Result<(f64, Vec<f64>), StrError> {
        line_geometry(&self.coords)
    }

    /// Indicates whether a face has a given natural condition
    pub fn has_face_cond(&self, nbc: Nbc) -> bool {
        self.face_conds.iter().any(|(_, n)| *n == nbc)
    }
}

/// Holds the equations and coordinates of a cell required by a connector
#[derive(Clone, Debug)]
pub struct ConnectedCell {
    /// (DOF, equation) pairs of each vertex of the cell
    pub dofs: Vec<Vec<(Dof, usize)>>,

    /// Coordinates of each vertex of the cell
    pub coords: Vec<Vec<f64>>,
}

/// Holds named values computed at an integration point (for output)
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct IpOutput {
    /// Coordinates of the integration point
    pub coords: Vec<f64>,

    /// Named values (e.g., "sig" or "wl")
    pub values: HashMap<String, f64>,
}

/// Defines the contract of all elements
///
/// The residual R and its derivative with respect to the primary variables (the tangent)
/// are assembled directly into the global arrays using the equation numbers received
/// by [ElementTrait::set_equations].
pub trait ElementTrait: Send {
    /// Sets the (DOF, equation) pairs of each vertex of the cell
    ///
    /// May be called at every stage; thus it must be idempotent.
    fn set_equations(&mut self, eqs: &[Vec<(Dof, usize)>]) -> Result<(), StrError>;

    /// Sets an element condition (e.g., gravity)
    fn set_ele_cond(&mut self, cond: EleCond, f: &FnTime) -> Result<(), StrError>;

    /// Sets a natural boundary condition on a face of the cell
    fn set_nat_bc(&mut self, nbc: Nbc, face: usize, f: &FnTime) -> Result<(), StrError>;

    /// Clears all element and natural conditions (before a new stage sets them again)
    fn clear_conditions(&mut self);

    /// Interpolates the starred variables (ψ*, ζ*, χ*) to the element
    fn interp_star_vars(&mut self, sol: &Solution) -> Result<(), StrError>;

    /// Adds -R to the global right-hand side vector
    fn add_to_rhs(&mut self, fb: &mut Vector, sol: &Solution) -> Result<(), StrError>;

    /// Adds the derivatives of R to the global tangent matrix
    fn add_to_kb(&mut self, kb: &mut dyn TangentSink, sol: &Solution, first_iteration: bool) -> Result<(), StrError>;

    /// Updates the internal state after the primary variables have been updated
    ///
    /// `sol.delta_y` holds the accumulated increment since the beginning of the time step.
    fn update(&mut self, sol: &Solution) -> Result<(), StrError>;

    /// Returns whether the tangent contribution is symmetric or not
    fn symmetric_jacobian(&self) -> bool;

    /// Returns values at integration points (for output)
    fn out_ips_data(&self, sol: &Solution) -> Vec<IpOutput>;

    /// Returns the internal variables capability, if any
    fn intvars(&mut self) -> Option<&mut dyn ElementIntvars> {
        None
    }

    /// Returns the connector capability, if any
    fn connector(&mut self) -> Option<&mut dyn ElementConnector> {
        None
    }
}

/// Defines the capability of elements with internal variables (e.g., stresses)
pub trait ElementIntvars {
    /// Initializes the internal variables of a newly activated element
    fn init_ivs(&mut self, sol: &Solution) -> Result<(), StrError>;

    /// Sets the internal variables from named values
    fn set_ivs(&mut self, values: &HashMap<String, Vec<f64>>) -> Result<(), StrError>;

    /// Makes a copy of the internal variables
    fn backup_ivs(&mut self);

    /// Restores the internal variables from the copy
    fn restore_ivs(&mut self);

    /// Encodes the internal variables (for persistence)
    fn encode_ivs(&self) -> Result<serde_json::Value, StrError>;

    /// Decodes the internal variables
    fn decode_ivs(&mut self, value: &serde_json::Value) -> Result<(), StrError>;
}

/// Defines the capability of elements linking other elements (e.g., joints)
pub trait ElementConnector {
    /// Returns the ids of the cells this element depends on
    fn dependencies(&self) -> Vec<CellId>;

    /// Connects this element to the cells it depends on
    ///
    /// Returns the number of extra non-zero values in the global tangent.
    fn connect(&mut self, cells: &HashMap<CellId, ConnectedCell>) -> Result<usize, StrError>;
}

/// Returns the length and unit direction vector of a segment defined by two points
pub fn line_geometry(coords: &[Vec<f64>]) -> Result<(f64, Vec<f64>), StrError> {
    if coords.len() != 2 {
        return Err("line elements require exactly two points");
    }
    let ndim = coords[0].len();
    let mut d: Vec<f64> = (0..ndim).map(|i| coords[1][i] - coords[0][i]).collect();
    let l = d.iter().fold(0.0, |acc, x| acc + x * x).sqrt();
    if l <= 0.0 {
        return Err("line element must have a positive length");
    }
    for x in d.iter_mut() {
        *x /= l;
    }
    Ok((l, d))
}

/// Splits the (DOF, equation) pairs of each vertex into the subset of a child element
///
/// Used by composite elements: each child receives only the pairs whose DOF is in `keys`,
/// in the order of `keys`.
pub fn split_equations(eqs: &[Vec<(Dof, usize)>], keys: &[Dof]) -> Vec<Vec<(Dof, usize)>> {
    eqs.iter()
        .map(|vertex| {
            keys.iter()
                .filter_map(|key| vertex.iter().find(|(dof, _)| dof == key).copied())
                .collect()
        })
        .collect()
}

/// Returns the equation of a DOF in the list of pairs of a vertex
pub fn find_eq(vertex: &[(Dof, usize)], dof: Dof) -> Result<usize, StrError> {
    vertex
        .iter()
        .find(|(d, _)| *d == dof)
        .map(|(_, eq)| *eq)
        .ok_or("cannot find the equation of a required DOF")
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
