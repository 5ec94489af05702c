use super::{assemble_residual, assemble_tangent, find_eq, CellInput, ElementInfo, ElementTrait};
use super::{IpOutput, Solution, TangentSink};
use crate::base::{Dof, EleCond, ElementData, FnTime, Nbc};
use crate::StrError;
use russell_lab::{Matrix, Vector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Holds the parameters of the liquid seepage (diffusion) line element
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct ParamSeepage {
    /// Liquid conductivity coefficient (permeability divided by viscosity)
    pub kl: f64,

    /// Storage coefficient (liquid compressibility)
    pub cpl: f64,

    /// Intrinsic density of the liquid
    pub rho_l: f64,

    /// Cross-sectional area
    pub area: f64,

    /// Penalty-like coefficient of the seepage face condition
    #[serde(default = "default_kappa")]
    pub kappa: f64,

    /// Smoothing coefficient of the ramp function of the seepage face condition
    #[serde(default = "default_beta_ramp")]
    pub beta_ramp: f64,
}

fn default_kappa() -> f64 {
    1.0
}

fn default_beta_ramp() -> f64 {
    70.0
}

impl ParamSeepage {
    /// Returns a sample set of parameters
    pub fn sample() -> Self {
        ParamSeepage {
            kl: 1e-2,
            cpl: 1e-3,
            rho_l: 1.0,
            area: 1.0,
            kappa: default_kappa(),
            beta_ramp: default_beta_ramp(),
        }
    }
}

/// Implements a two-node line element for the liquid pressure (seepage/diffusion)
///
/// The residual vector corresponding to the liquid pressure is:
///
/// ```text
/// R = Mc (β1 p - ψ*) + K p - kl ρl g_s A [-1, 1] - A L s/2 [1, 1] - A ql + A fl
/// ```
///
/// where `g_s` is the projection of the gravity vector along the element and `s` is the source.
/// The storage term vanishes in steady analyses.
///
/// Vertices on a seepage face receive the extra freedom `fl` (the liquid flux leaving
/// the domain) with the complementarity-like equation:
///
/// ```text
/// r_fl = fl - ramp(fl + κ (pl - plmax(t)))
/// ```
pub struct ElementSeepage {
    /// Number of space dimensions
    pub ndim: usize,

    /// Parameters
    pub param: ParamSeepage,

    /// Length of the element
    pub length: f64,

    /// Unit direction vector from the first to the second node
    pub dir: Vec<f64>,

    /// Middle point of the element
    pub center: Vec<f64>,

    /// Equation numbers of pl at each vertex
    pub eq_pl: Vec<usize>,

    /// Equation numbers of fl at each vertex (only on seepage faces)
    pub eq_fl: Vec<Option<usize>>,

    /// Gravity function g(t)
    pub gravity: Option<FnTime>,

    /// Liquid source function s(t)
    pub source: Option<FnTime>,

    /// Prescribed fluxes (vertex, ql(t))
    pub fluxes: Vec<(usize, FnTime)>,

    /// Seepage faces (vertex, plmax(t))
    pub seepage: Vec<(usize, FnTime)>,

    /// Local starred variables ψ*
    pub psi_star: Vec<f64>,
}

/// Returns the smooth ramp function
fn ramp(x: f64, beta: f64) -> f64 {
    if x >= 0.0 {
        x + f64::ln_1p(f64::exp(-beta * x)) / beta
    } else {
        f64::ln_1p(f64::exp(beta * x)) / beta
    }
}

/// Returns the derivative of the smooth ramp function (a smooth Heaviside)
fn ramp_deriv(x: f64, beta: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + f64::exp(-beta * x))
    } else {
        let e = f64::exp(beta * x);
        e / (1.0 + e)
    }
}

impl ElementSeepage {
    /// Returns the DOFs of the seepage element
    ///
    /// The vertices of faces with a seepage condition also receive [Dof::Fl].
    pub fn info(input: &CellInput) -> Result<ElementInfo, StrError> {
        if input.cell.points.len() != 2 {
            return Err("number of nodes for Seepage must be 2");
        }
        let mut info = ElementInfo::new(2, &[Dof::Pl], &[Dof::Pl], &[]);
        for (face, nbc) in &input.face_conds {
            if *nbc == Nbc::Seepage {
                if *face > 1 {
                    return Err("face index of line element must be 0 or 1");
                }
                if !info.dofs[*face].contains(&Dof::Fl) {
                    info.dofs[*face].push(Dof::Fl);
                }
            }
        }
        Ok(info)
    }

    /// Allocates a seepage element (registry function)
    pub fn allocate(input: &CellInput, data: &ElementData) -> Result<Box<dyn ElementTrait>, StrError> {
        let param: ParamSeepage = data.params()?;
        Ok(Box::new(ElementSeepage::new(input, param)?))
    }

    /// Allocates a new instance
    pub fn new(input: &CellInput, param: ParamSeepage) -> Result<Self, StrError> {
        if input.cell.points.len() != 2 {
            return Err("number of nodes for Seepage must be 2");
        }
        if param.kl <= 0.0 || param.cpl < 0.0 || param.rho_l < 0.0 || param.area <= 0.0 {
            return Err("seepage parameters must satisfy kl > 0, cpl ≥ 0, rho_l ≥ 0, area > 0");
        }
        if param.kappa <= 0.0 || param.beta_ramp <= 0.0 {
            return Err("seepage face parameters must satisfy kappa > 0, beta_ramp > 0");
        }
        let ndim = input.ndim;
        let (length, dir) = input.line_geometry()?;
        let center = (0..ndim)
            .map(|i| (input.coords[0][i] + input.coords[1][i]) / 2.0)
            .collect();
        Ok(ElementSeepage {
            ndim,
            param,
            length,
            dir,
            center,
            eq_pl: Vec::new(),
            eq_fl: Vec::new(),
            gravity: None,
            source: None,
            fluxes: Vec::new(),
            seepage: Vec::new(),
            psi_star: vec![0.0; 2],
        })
    }

    /// Returns the local-to-global mapping [pl0, pl1, fl...]
    fn local_to_global(&self) -> Vec<usize> {
        let mut l2g = self.eq_pl.clone();
        l2g.extend(self.eq_fl.iter().flatten());
        l2g
    }

    /// Returns the projection of the gravity vector along the element
    fn gravity_along(&self, t: f64) -> f64 {
        match &self.gravity {
            Some(g) => -g.eval(t) * self.dir[self.ndim - 1],
            None => 0.0,
        }
    }

    /// Returns the local index of fl at a vertex
    fn local_fl(&self, m: usize) -> Option<usize> {
        let mut index = 2;
        for n in 0..m {
            if self.eq_fl[n].is_some() {
                index += 1;
            }
        }
        self.eq_fl[m].map(|_| index)
    }

    /// Calculates the local residual vector
    pub fn calc_residual(&self, sol: &Solution) -> Vector {
        let nloc = self.local_to_global().len();
        let mut rr = Vector::new(nloc);
        let a = self.param.area;
        let l = self.length;
        let pp = [sol.y[self.eq_pl[0]], sol.y[self.eq_pl[1]]];
        let kc = self.param.kl * a / l;
        let g_s = self.gravity_along(sol.t);
        let src = match &self.source {
            Some(s) => s.eval(sol.t),
            None => 0.0,
        };
        let sign = [-1.0, 1.0];
        for m in 0..2 {
            let n = 1 - m;
            rr[m] = kc * (pp[m] - pp[n]) - self.param.kl * self.param.rho_l * g_s * a * sign[m] - a * l * src / 2.0;
        }
        if !sol.steady {
            let mc = self.param.cpl * a * l / 6.0;
            let rate = [
                sol.dc.beta1 * pp[0] - self.psi_star[0],
                sol.dc.beta1 * pp[1] - self.psi_star[1],
            ];
            rr[0] += mc * (2.0 * rate[0] + rate[1]);
            rr[1] += mc * (rate[0] + 2.0 * rate[1]);
        }
        for (m, ql) in &self.fluxes {
            rr[*m] -= a * ql.eval(sol.t);
        }
        for (m, plmax) in &self.seepage {
            if let (Some(eq), Some(i)) = (self.eq_fl[*m], self.local_fl(*m)) {
                let fl = sol.y[eq];
                rr[*m] += a * fl;
                let x = fl + self.param.kappa * (pp[*m] - plmax.eval(sol.t));
                rr[i] = fl - ramp(x, self.param.beta_ramp);
            }
        }
        rr
    }

    /// Calculates the local tangent matrix
    pub fn calc_tangent(&self, sol: &Solution) -> Matrix {
        let nloc = self.local_to_global().len();
        let mut kk = Matrix::new(nloc, nloc);
        let a = self.param.area;
        let l = self.length;
        let kc = self.param.kl * a / l;
        let mc = if sol.steady {
            0.0
        } else {
            sol.dc.beta1 * self.param.cpl * a * l / 6.0
        };
        for m in 0..2 {
            for n in 0..2 {
                let (k, c) = if m == n { (kc, 2.0 * mc) } else { (-kc, mc) };
                kk.set(m, n, k + c);
            }
        }
        // the fl rows of vertices without a seepage function remain fl = 0
        for m in 0..2 {
            if let Some(i) = self.local_fl(m) {
                kk.set(i, i, 1.0);
            }
        }
        for (m, plmax) in &self.seepage {
            if let (Some(eq), Some(i)) = (self.eq_fl[*m], self.local_fl(*m)) {
                let fl = sol.y[eq];
                let x = fl + self.param.kappa * (sol.y[self.eq_pl[*m]] - plmax.eval(sol.t));
                let h = ramp_deriv(x, self.param.beta_ramp);
                kk.set(*m, i, a);
                kk.set(i, i, 1.0 - h);
                kk.set(i, *m, -h * self.param.kappa);
            }
        }
        kk
    }

    /// Returns the Darcy velocity along the element
    pub fn darcy_velocity(&self, sol: &Solution) -> f64 {
        let dpds = (sol.y[self.eq_pl[1]] - sol.y[self.eq_pl[0]]) / self.length;
        -self.param.kl * (dpds - self.param.rho_l * self.gravity_along(sol.t))
    }
}

impl ElementTrait for ElementSeepage {
    fn set_equations(&mut self, eqs: &[Vec<(Dof, usize)>]) -> Result<(), StrError> {
        if eqs.len() != 2 {
            return Err("number of nodes for Seepage must be 2");
        }
        self.eq_pl = vec![find_eq(&eqs[0], Dof::Pl)?, find_eq(&eqs[1], Dof::Pl)?];
        self.eq_fl = eqs
            .iter()
            .map(|vertex| vertex.iter().find(|(d, _)| *d == Dof::Fl).map(|(_, eq)| *eq))
            .collect();
        Ok(())
    }

    fn set_ele_cond(&mut self, cond: EleCond, f: &FnTime) -> Result<(), StrError> {
        match cond {
            EleCond::Gravity => self.gravity = Some(f.clone()),
            EleCond::Source => self.source = Some(f.clone()),
        }
        Ok(())
    }

    fn set_nat_bc(&mut self, nbc: Nbc, face: usize, f: &FnTime) -> Result<(), StrError> {
        if face > 1 {
            return Err("face index of line element must be 0 or 1");
        }
        match nbc {
            Nbc::Ql => self.fluxes.push((face, f.clone())),
            Nbc::Seepage => {
                if self.eq_fl.get(face).copied().flatten().is_none() {
                    return Err("seepage face requires the fl DOF");
                }
                self.seepage.push((face, f.clone()));
            }
            Nbc::Qn => return Err("Seepage does not handle normal distributed loads"),
        }
        Ok(())
    }

    fn clear_conditions(&mut self) {
        self.gravity = None;
        self.source = None;
        self.fluxes.clear();
        self.seepage.clear();
    }

    fn interp_star_vars(&mut self, sol: &Solution) -> Result<(), StrError> {
        if !sol.steady {
            self.psi_star = vec![sol.psi[self.eq_pl[0]], sol.psi[self.eq_pl[1]]];
        }
        Ok(())
    }

    fn add_to_rhs(&mut self, fb: &mut Vector, sol: &Solution) -> Result<(), StrError> {
        let rr = self.calc_residual(sol);
        assemble_residual(fb, &rr, &self.local_to_global());
        Ok(())
    }

    fn add_to_kb(&mut self, kb: &mut dyn TangentSink, sol: &Solution, _first_iteration: bool) -> Result<(), StrError> {
        let kk = self.calc_tangent(sol);
        assemble_tangent(kb, &kk, &self.local_to_global())
    }

    fn update(&mut self, _sol: &Solution) -> Result<(), StrError> {
        Ok(())
    }

    fn symmetric_jacobian(&self) -> bool {
        self.eq_fl.iter().all(|eq| eq.is_none())
    }

    fn out_ips_data(&self, sol: &Solution) -> Vec<IpOutput> {
        let mut values = HashMap::new();
        values.insert("pl".to_string(), (sol.y[self.eq_pl[0]] + sol.y[self.eq_pl[1]]) / 2.0);
        values.insert("wl".to_string(), self.darcy_velocity(sol));
        vec![IpOutput {
            coords: self.center.clone(),
            values,
        }]
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
