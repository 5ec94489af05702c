use super::Solution;
use crate::base::{FnTime, Pbc};
use russell_lab::Vector;

/// Holds a concentrated load (or flux) applied to an equation
#[derive(Clone, Debug)]
pub struct PointNaturalBc {
    /// The kind of load
    pub pbc: Pbc,

    /// Equation number
    pub eq: usize,

    /// The load as a function of time
    pub f: FnTime,
}

/// Holds the concentrated loads of a stage
///
/// A new load on an equation replaces the previous one.
#[derive(Clone, Debug)]
pub struct PointNaturalBcs {
    /// All loads
    pub all: Vec<PointNaturalBc>,
}

impl PointNaturalBcs {
    /// Allocates a new instance
    pub fn new() -> Self {
        PointNaturalBcs { all: Vec::new() }
    }

    /// Removes all loads
    pub fn reset(&mut self) {
        self.all.clear();
    }

    /// Sets (or replaces) the load on an equation
    pub fn set(&mut self, pbc: Pbc, eq: usize, f: &FnTime) {
        match self.all.iter_mut().find(|p| p.eq == eq) {
            Some(p) => {
                p.pbc = pbc;
                p.f = f.clone();
            }
            None => self.all.push(PointNaturalBc { pbc, eq, f: f.clone() }),
        }
    }

    /// Adds the loads to the right-hand side vector (fb[eq] += f(t))
    ///
    /// With the HHT method, forces and moments are combined as the internal forces of the elements:
    ///
    /// ```text
    /// fb[eq] += (1 + α) f(t) - α f(t - Δt)
    /// ```
    ///
    /// Liquid fluxes are never combined.
    pub fn add_to_rhs(&self, fb: &mut Vector, sol: &Solution) {
        let hht = !sol.steady && sol.dc.hht;
        for p in &self.all {
            if hht && p.pbc != Pbc::Ql {
                let alpha = sol.dc.hht_alpha;
                fb[p.eq] += (1.0 + alpha) * p.f.eval(sol.t) - alpha * p.f.eval(sol.t - sol.dt);
            } else {
                fb[p.eq] += p.f.eval(sol.t);
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
