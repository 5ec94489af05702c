use super::{assemble_residual, assemble_tangent, find_eq, CellInput, ElementInfo, ElementIntvars, ElementTrait};
use super::{DynCoefs, IpOutput, Solution, TangentSink};
use crate::base::{Dof, EleCond, ElementData, FnTime, Nbc};
use crate::StrError;
use russell_lab::{Matrix, Vector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Holds the parameters of a linear-elastic rod
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct ParamRod {
    /// Young's modulus
    pub young: f64,

    /// Cross-sectional area
    pub area: f64,

    /// Density (for mass and gravity)
    #[serde(default)]
    pub density: f64,
}

impl ParamRod {
    /// Returns a sample set of parameters
    pub fn sample() -> Self {
        ParamRod {
            young: 1000.0,
            area: 1.0,
            density: 0.0,
        }
    }
}

/// Holds the internal state of a rod
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct RodState {
    /// Axial stress
    pub sig: f64,
}

/// Implements a linear-elastic rod (truss) element with two nodes
///
/// The axial stress is updated incrementally from the accumulated increment of displacements;
/// thus, a rod activated on already-displaced nodes starts stress-free.
///
/// The residual vector is:
///
/// ```text
/// R = M a + α8 (C v + fi - fext) - α (C v + fi - fext)ₙ    (transient)
/// R = fi - fext                                             (steady)
///
/// a = α1 u - ζ*
/// v = α4 u - χ*
/// C = ray_m M + ray_k K
/// fi = A σ [-d, d]
/// ```
///
/// where `d` is the unit vector along the rod, `α8 = 1 + α` and `(·)ₙ` is evaluated at the
/// beginning of the time step with the HHT method (otherwise `α8 = 1` and `α = 0`).
///
/// # References
///
/// * Felippa C., Chapter 20: Implementation of One-Dimensional Elements (IFEM.Ch20.pdf)
pub struct ElementRod {
    /// Number of space dimensions
    pub ndim: usize,

    /// Material parameters
    pub param: ParamRod,

    /// Length of the rod
    pub length: f64,

    /// Unit direction vector from the first to the second node
    pub dir: Vec<f64>,

    /// Middle point of the rod
    pub center: Vec<f64>,

    /// Local-to-global mapping
    pub local_to_global: Vec<usize>,

    /// Pre-computed stiffness matrix
    pub stiffness: Matrix,

    /// Pre-computed consistent mass matrix
    pub mass: Matrix,

    /// Gravity function g(t)
    pub gravity: Option<FnTime>,

    /// Local starred variables ζ*
    pub zet_star: Vector,

    /// Local starred variables χ*
    pub chi_star: Vector,

    /// Local (C v + fi - fext) at the beginning of the time step (HHT method)
    pub hht_star: Vector,

    /// Internal state
    pub state: RodState,

    /// Backup of the internal state
    pub backup: RodState,
}

impl ElementRod {
    /// Returns the DOFs of a rod
    pub fn info(input: &CellInput) -> Result<ElementInfo, StrError> {
        if input.cell.points.len() != 2 {
            return Err("number of nodes for Rod must be 2");
        }
        let dofs = Dof::displacements(input.ndim);
        Ok(ElementInfo::new(2, dofs, &[], dofs))
    }

    /// Allocates a rod element (registry function)
    pub fn allocate(input: &CellInput, data: &ElementData) -> Result<Box<dyn ElementTrait>, StrError> {
        let param: ParamRod = data.params()?;
        Ok(Box::new(ElementRod::new(input, param)?))
    }

    /// Allocates a new instance
    pub fn new(input: &CellInput, param: ParamRod) -> Result<Self, StrError> {
        if input.cell.points.len() != 2 {
            return Err("number of nodes for Rod must be 2");
        }
        if param.young <= 0.0 || param.area <= 0.0 || param.density < 0.0 {
            return Err("rod parameters must satisfy young > 0, area > 0, density ≥ 0");
        }
        let ndim = input.ndim;
        let (length, dir) = input.line_geometry()?;
        let center = (0..ndim)
            .map(|i| (input.coords[0][i] + input.coords[1][i]) / 2.0)
            .collect();
        let n = 2 * ndim;
        let mut stiffness = Matrix::new(n, n);
        let mut mass = Matrix::new(n, n);
        let ea_l = param.young * param.area / length;
        let m = param.density * param.area * length / 6.0;
        for a in 0..2 {
            for b in 0..2 {
                let sign = if a == b { 1.0 } else { -1.0 };
                let mass_coef = if a == b { 2.0 * m } else { m };
                for i in 0..ndim {
                    for j in 0..ndim {
                        stiffness.set(a * ndim + i, b * ndim + j, sign * ea_l * dir[i] * dir[j]);
                    }
                    mass.set(a * ndim + i, b * ndim + i, mass_coef);
                }
            }
        }
        Ok(ElementRod {
            ndim,
            param,
            length,
            dir,
            center,
            local_to_global: Vec::new(),
            stiffness,
            mass,
            gravity: None,
            zet_star: Vector::new(n),
            chi_star: Vector::new(n),
            hht_star: Vector::new(n),
            state: RodState::default(),
            backup: RodState::default(),
        })
    }

    /// Returns the local displacements (or any other global vector) of this element
    fn local(&self, global: &Vector) -> Vector {
        let n = self.local_to_global.len();
        let mut uu = Vector::new(n);
        for l in 0..n {
            uu[l] = global[self.local_to_global[l]];
        }
        uu
    }

    /// Calculates fi - fext at time t
    fn calc_static_residual(&self, t: f64) -> Vector {
        let n = 2 * self.ndim;
        let mut rr = Vector::new(n);
        let fa = self.param.area * self.state.sig;
        for i in 0..self.ndim {
            rr[i] = -fa * self.dir[i];
            rr[self.ndim + i] = fa * self.dir[i];
        }
        if let Some(g) = &self.gravity {
            let w = self.param.density * self.param.area * self.length * g.eval(t) / 2.0;
            rr[self.ndim - 1] += w;
            rr[n - 1] += w;
        }
        rr
    }

    /// Calculates the damping forces C v with C = ray_m M + ray_k K
    fn calc_damping(&self, dc: &DynCoefs, vv: &Vector) -> Vector {
        let n = 2 * self.ndim;
        let mut cv = Vector::new(n);
        if dc.rayleigh() {
            for l in 0..n {
                for ll in 0..n {
                    let c = dc.ray_m * self.mass.get(l, ll) + dc.ray_k * self.stiffness.get(l, ll);
                    cv[l] += c * vv[ll];
                }
            }
        }
        cv
    }

    /// Calculates the local residual vector
    pub fn calc_residual(&self, sol: &Solution) -> Vector {
        let mut rr = self.calc_static_residual(sol.t);
        if !sol.steady {
            let n = 2 * self.ndim;
            let uu = self.local(&sol.y);
            let dc = &sol.dc;
            let mut aa = Vector::new(n);
            let mut vv = Vector::new(n);
            for l in 0..n {
                aa[l] = dc.alpha1 * uu[l] - self.zet_star[l];
                vv[l] = dc.alpha4 * uu[l] - self.chi_star[l];
            }
            let cv = self.calc_damping(dc, &vv);
            for l in 0..n {
                let mut ma = 0.0;
                for ll in 0..n {
                    ma += self.mass.get(l, ll) * aa[ll];
                }
                rr[l] = ma + dc.alpha8 * (cv[l] + rr[l]);
                if dc.hht {
                    rr[l] -= dc.hht_alpha * self.hht_star[l];
                }
            }
        }
        rr
    }

    /// Calculates the local tangent matrix
    pub fn calc_tangent(&self, sol: &Solution) -> Matrix {
        let n = 2 * self.ndim;
        let (bm, bk) = if sol.steady { (0.0, 1.0) } else { (sol.dc.bm, sol.dc.bk) };
        let mut kk = Matrix::new(n, n);
        for l in 0..n {
            for ll in 0..n {
                kk.set(l, ll, bm * self.mass.get(l, ll) + bk * self.stiffness.get(l, ll));
            }
        }
        kk
    }
}

impl ElementTrait for ElementRod {
    fn set_equations(&mut self, eqs: &[Vec<(Dof, usize)>]) -> Result<(), StrError> {
        if eqs.len() != 2 {
            return Err("number of nodes for Rod must be 2");
        }
        let mut local_to_global = Vec::with_capacity(2 * self.ndim);
        for vertex in eqs {
            for dof in Dof::displacements(self.ndim) {
                local_to_global.push(find_eq(vertex, *dof)?);
            }
        }
        self.local_to_global = local_to_global;
        Ok(())
    }

    fn set_ele_cond(&mut self, cond: EleCond, f: &FnTime) -> Result<(), StrError> {
        match cond {
            EleCond::Gravity => {
                self.gravity = Some(f.clone());
                Ok(())
            }
            EleCond::Source => Err("Rod does not handle liquid sources"),
        }
    }

    fn set_nat_bc(&mut self, _nbc: Nbc, _face: usize, _f: &FnTime) -> Result<(), StrError> {
        Err("Rod does not handle natural boundary conditions")
    }

    fn clear_conditions(&mut self) {
        self.gravity = None;
    }

    fn interp_star_vars(&mut self, sol: &Solution) -> Result<(), StrError> {
        if !sol.steady {
            self.zet_star = self.local(&sol.zet);
            self.chi_star = self.local(&sol.chi);
            if sol.dc.hht {
                // sig and dy/dt still hold the values at the beginning of the step
                let vv = self.local(&sol.dydt);
                let cv = self.calc_damping(&sol.dc, &vv);
                let rr = self.calc_static_residual(sol.t - sol.dt);
                for l in 0..rr.dim() {
                    self.hht_star[l] = cv[l] + rr[l];
                }
            }
        }
        Ok(())
    }

    fn add_to_rhs(&mut self, fb: &mut Vector, sol: &Solution) -> Result<(), StrError> {
        let rr = self.calc_residual(sol);
        assemble_residual(fb, &rr, &self.local_to_global);
        Ok(())
    }

    fn add_to_kb(&mut self, kb: &mut dyn TangentSink, sol: &Solution, _first_iteration: bool) -> Result<(), StrError> {
        let kk = self.calc_tangent(sol);
        assemble_tangent(kb, &kk, &self.local_to_global)
    }

    fn update(&mut self, sol: &Solution) -> Result<(), StrError> {
        let duu = self.local(&sol.delta_y);
        let mut deps = 0.0;
        for i in 0..self.ndim {
            deps += self.dir[i] * (duu[self.ndim + i] - duu[i]);
        }
        deps /= self.length;
        self.state.sig += self.param.young * deps;
        Ok(())
    }

    fn symmetric_jacobian(&self) -> bool {
        true
    }

    fn out_ips_data(&self, _sol: &Solution) -> Vec<IpOutput> {
        let mut values = HashMap::new();
        values.insert("sig".to_string(), self.state.sig);
        values.insert("n".to_string(), self.param.area * self.state.sig);
        vec![IpOutput {
            coords: self.center.clone(),
            values,
        }]
    }

    fn intvars(&mut self) -> Option<&mut dyn ElementIntvars> {
        Some(self)
    }
}

impl ElementIntvars for ElementRod {
    fn init_ivs(&mut self, _sol: &Solution) -> Result<(), StrError> {
        self.state = RodState::default();
        self.backup = self.state;
        Ok(())
    }

    fn set_ivs(&mut self, values: &HashMap<String, Vec<f64>>) -> Result<(), StrError> {
        if let Some(sig) = values.get("sig") {
            if sig.len() != 1 {
                return Err("Rod requires exactly one value of \"sig\"");
            }
            self.state.sig = sig[0];
        }
        Ok(())
    }

    fn backup_ivs(&mut self) {
        self.backup = self.state;
    }

    fn restore_ivs(&mut self) {
        self.state = self.backup;
    }

    fn encode_ivs(&self) -> Result<serde_json::Value, StrError> {
        serde_json::to_value(&self.state).map_err(|_| "cannot encode internal values")
    }

    fn decode_ivs(&mut self, value: &serde_json::Value) -> Result<(), StrError> {
        self.state = serde_json::from_value(value.clone()).map_err(|_| "cannot decode internal values")?;
        self.backup = self.state;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
