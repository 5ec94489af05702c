use super::{Node, Solution, TangentSink};
use crate::base::{Dof, EssentialKey, FnTime};
use crate::StrError;
use russell_lab::Vector;
use std::collections::HashMap;
use std::fmt;

/// Defines the right-hand side c(t) of a constraint row
#[derive(Clone, Debug, PartialEq)]
pub enum ConstraintRhs {
    /// c(t) = 0
    Zero,

    /// c(t) = f(t)
    Function(FnTime),

    /// c(t) = γl · H(t) - γl · z
    Head { f: FnTime, gamma_l: f64, z: f64 },
}

impl ConstraintRhs {
    /// Evaluates c(t)
    pub fn eval(&self, t: f64) -> f64 {
        match self {
            ConstraintRhs::Zero => 0.0,
            ConstraintRhs::Function(f) => f.eval(t),
            ConstraintRhs::Head { f, gamma_l, z } => gamma_l * f.eval(t) - gamma_l * z,
        }
    }
}

/// Holds a constraint row `Σ coefs[k] · y[eqs[k]] = c(t)` imposed by a Lagrange multiplier
#[derive(Clone, Debug)]
pub struct EssentialBc {
    /// The essential condition that generated this constraint
    pub key: EssentialKey,

    /// Equation numbers
    pub eqs: Vec<usize>,

    /// Coefficients
    pub coefs: Vec<f64>,

    /// Right-hand side
    pub rhs: ConstraintRhs,

    /// Only active constraints become rows of the augmented system
    pub active: bool,

    /// Row of the augmented system (ny + index), valid after build
    pub row: usize,
}

/// Holds the constraints (essential boundary conditions) of a stage
///
/// The augmented system is:
///
/// ```text
/// ┌       ┐ ┌    ┐   ┌    ┐
/// │ K  Aᵀ │ │ δy │   │ fb │
/// │       │ │    │ = │    │
/// │ A  0  │ │ δλ │   │ fc │
/// └       ┘ └    ┘   └    ┘
///
/// fb = -R - Aᵀ λ
/// fc = c(t) - A y
/// ```
///
/// A new constraint on an equation deactivates the existing overridable constraints
/// on that equation (single-point and hydraulic head). Rigid links and inclined supports
/// are never overridden.
#[derive(Clone, Debug)]
pub struct EssentialBcs {
    /// All constraints (active or not) in insertion order
    pub all: Vec<EssentialBc>,

    /// Maps equation numbers to the indices of the constraints involving them
    eq_to_idx: HashMap<usize, Vec<usize>>,

    /// Number of active constraints (Lagrange multipliers)
    pub nlam: usize,

    /// Number of non-zero values in A
    pub nnz_a: usize,
}

impl EssentialBcs {
    /// Allocates a new instance
    pub fn new() -> Self {
        EssentialBcs {
            all: Vec::new(),
            eq_to_idx: HashMap::new(),
            nlam: 0,
            nnz_a: 0,
        }
    }

    /// Removes all constraints
    pub fn reset(&mut self) {
        self.all.clear();
        self.eq_to_idx.clear();
        self.nlam = 0;
        self.nnz_a = 0;
    }

    /// Adds a constraint row after deactivating the overridable constraints on its equations
    pub fn add(&mut self, key: EssentialKey, eqs: Vec<usize>, coefs: Vec<f64>, rhs: ConstraintRhs) {
        for eq in &eqs {
            if let Some(indices) = self.eq_to_idx.get(eq) {
                for idx in indices {
                    if self.all[*idx].key.overridable() {
                        self.all[*idx].active = false;
                    }
                }
            }
        }
        let idx = self.all.len();
        for eq in &eqs {
            self.eq_to_idx.entry(*eq).or_insert_with(Vec::new).push(idx);
        }
        self.all.push(EssentialBc {
            key,
            eqs,
            coefs,
            rhs,
            active: true,
            row: 0,
        });
    }

    /// Sets an essential condition on a set of nodes
    ///
    /// # Input
    ///
    /// * `key` -- the essential condition
    /// * `nodes` -- the nodes (for a rigid link, the first one is the master)
    /// * `elevations` -- the last coordinate of each node (for the hydraulic head)
    /// * `ndim` -- space dimension
    /// * `f` -- the prescribed function (ignored by rigid links and inclined supports)
    pub fn set(
        &mut self,
        key: EssentialKey,
        nodes: &[&Node],
        elevations: &[f64],
        ndim: usize,
        f: &FnTime,
    ) -> Result<(), StrError> {
        match key {
            EssentialKey::Dof(dof) => {
                for node in nodes {
                    let eq = node.eq(dof).ok_or("cannot set essential condition because the DOF does not exist")?;
                    self.add(key, vec![eq], vec![1.0], ConstraintRhs::Function(f.clone()));
                }
            }
            EssentialKey::HydraulicHead { gamma_l } => {
                if elevations.len() != nodes.len() {
                    return Err("hydraulic head requires the elevation of each node");
                }
                for (node, z) in nodes.iter().zip(elevations) {
                    if let Some(eq) = node.eq(Dof::Pl) {
                        let rhs = ConstraintRhs::Head {
                            f: f.clone(),
                            gamma_l,
                            z: *z,
                        };
                        self.add(key, vec![eq], vec![1.0], rhs);
                    }
                }
            }
            EssentialKey::Rigid => {
                if nodes.len() < 2 {
                    return Err("rigid link requires at least two nodes");
                }
                let master = nodes[0];
                for slave in &nodes[1..] {
                    for pair in &master.dofs {
                        if let Some(eq) = slave.eq(pair.dof) {
                            self.add(key, vec![pair.eq, eq], vec![1.0, -1.0], ConstraintRhs::Zero);
                        }
                    }
                }
            }
            EssentialKey::IncSup { alpha } => {
                if ndim != 2 {
                    return Err("inclined support is only available in 2D");
                }
                let (s, c) = f64::sin_cos(alpha * std::f64::consts::PI / 180.0);
                for node in nodes {
                    let eq_ux = node.eq(Dof::Ux).ok_or("inclined support requires ux and uy")?;
                    let eq_uy = node.eq(Dof::Uy).ok_or("inclined support requires ux and uy")?;
                    self.add(key, vec![eq_ux, eq_uy], vec![c, s], ConstraintRhs::Zero);
                }
            }
        }
        Ok(())
    }

    /// Assigns the rows of the active constraints
    ///
    /// Returns `(nlam, nnz_a)`: the number of Lagrange multipliers and the number of non-zero values in A.
    pub fn build(&mut self, ny: usize) -> (usize, usize) {
        let mut nlam = 0;
        let mut nnz_a = 0;
        for bc in self.all.iter_mut().filter(|bc| bc.active) {
            bc.row = ny + nlam;
            nlam += 1;
            nnz_a += bc.eqs.len();
        }
        self.nlam = nlam;
        self.nnz_a = nnz_a;
        (nlam, nnz_a)
    }

    /// Returns an iterator over the active constraints
    pub fn active(&self) -> impl Iterator<Item = &EssentialBc> {
        self.all.iter().filter(|bc| bc.active)
    }

    /// Adds the constraint terms to the augmented right-hand side vector
    ///
    /// `fb[eq] -= coef · λ` and `fb[row] = c(t) - Σ coef · y[eq]`
    pub fn add_to_rhs(&self, fb: &mut Vector, sol: &Solution) {
        let ny = sol.ny();
        for bc in self.active() {
            let lambda = sol.lambda[bc.row - ny];
            let mut ay = 0.0;
            for (eq, coef) in bc.eqs.iter().zip(&bc.coefs) {
                fb[*eq] -= coef * lambda;
                ay += coef * sol.y[*eq];
            }
            fb[bc.row] = bc.rhs.eval(sol.t) - ay;
        }
    }

    /// Puts A and Aᵀ into the augmented tangent
    pub fn put_into_kb(&self, kb: &mut dyn TangentSink) -> Result<(), StrError> {
        for bc in self.active() {
            for (eq, coef) in bc.eqs.iter().zip(&bc.coefs) {
                kb.put(bc.row, *eq, *coef)?;
                kb.put(*eq, bc.row, *coef)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for EssentialBcs {
    /// Prints a formatted summary of the constraints
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Constraints\n").unwrap();
        write!(f, "===========\n").unwrap();
        for bc in self.active() {
            write!(f, "{} : {:?} eqs = {:?} coefs = {:?}\n", bc.row, bc.key, bc.eqs, bc.coefs).unwrap();
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
