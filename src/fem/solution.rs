use super::DynCoefs;
use russell_lab::Vector;
use serde::{Deserialize, Serialize};

/// Holds the primary variables, their time derivatives, and the Lagrange multipliers
///
/// The vectors are re-allocated at every stage because the number of equations may change.
/// The time derivatives and the starred vectors are empty for steady analyses.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Solution {
    /// Current time
    pub t: f64,

    /// Current time increment
    pub dt: f64,

    /// Steady analysis (no time derivatives)
    pub steady: bool,

    /// Primary variables y (ny)
    pub y: Vector,

    /// Accumulated increment of y within the current time step (ny)
    pub delta_y: Vector,

    /// First time derivative dy/dt (ny)
    pub dydt: Vector,

    /// Second time derivative d²y/dt² (ny)
    pub d2ydt2: Vector,

    /// Starred variables for first order derivatives: ψ* = β1 y + β2 dy/dt (ny)
    pub psi: Vector,

    /// Starred variables for second order derivatives: ζ* = α1 y + α2 dy/dt + α3 d²y/dt² (ny)
    pub zet: Vector,

    /// Starred variables for second order derivatives: χ* = α4 y + α5 dy/dt + α6 d²y/dt² (ny)
    pub chi: Vector,

    /// Lagrange multipliers (nlam)
    pub lambda: Vector,

    /// Coefficients for the time integration (recomputed at each time step)
    pub dc: DynCoefs,
}

/// Holds a copy of the state variables of a solution (used to retry a time step)
#[derive(Clone, Debug)]
pub struct SolutionBackup {
    t: f64,
    y: Vector,
    dydt: Vector,
    d2ydt2: Vector,
    lambda: Vector,
}

impl Solution {
    /// Allocates a new instance
    pub fn new(ny: usize, nlam: usize, steady: bool, dc: DynCoefs) -> Self {
        let nt = if steady { 0 } else { ny };
        Solution {
            t: 0.0,
            dt: 0.0,
            steady,
            y: Vector::new(ny),
            delta_y: Vector::new(ny),
            dydt: Vector::new(nt),
            d2ydt2: Vector::new(nt),
            psi: Vector::new(nt),
            zet: Vector::new(nt),
            chi: Vector::new(nt),
            lambda: Vector::new(nlam),
            dc,
        }
    }

    /// Returns the number of (unconstrained) equations
    pub fn ny(&self) -> usize {
        self.y.dim()
    }

    /// Returns the number of Lagrange multipliers
    pub fn nlam(&self) -> usize {
        self.lambda.dim()
    }

    /// Makes a copy of the state variables
    pub fn backup(&self) -> SolutionBackup {
        SolutionBackup {
            t: self.t,
            y: self.y.clone(),
            dydt: self.dydt.clone(),
            d2ydt2: self.d2ydt2.clone(),
            lambda: self.lambda.clone(),
        }
    }

    /// Restores the state variables from a copy
    pub fn restore(&mut self, backup: &SolutionBackup) {
        self.t = backup.t;
        self.y = backup.y.clone();
        self.dydt = backup.dydt.clone();
        self.d2ydt2 = backup.d2ydt2.clone();
        self.lambda = backup.lambda.clone();
        self.delta_y.fill(0.0);
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
