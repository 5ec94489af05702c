use super::{split_equations, CellInput, ElementInfo, ElementIntvars, ElementRod, ElementSeepage, ElementTrait};
use super::{IpOutput, ParamRod, ParamSeepage, Solution, TangentSink};
use crate::base::{Dof, EleCond, ElementData, FnTime, Nbc};
use crate::StrError;
use russell_lab::{Matrix, Vector};
use serde::{Deserialize, Serialize};

/// Holds the parameters of the porous rod
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct ParamPorousRod {
    /// Parameters of the solid skeleton
    pub rod: ParamRod,

    /// Parameters of the liquid flow
    pub seepage: ParamSeepage,

    /// Biot coefficient
    #[serde(default = "default_biot")]
    pub alpha: f64,
}

fn default_biot() -> f64 {
    1.0
}

/// Implements a composite displacement-pressure (u-pl) rod element
///
/// The element owns a [ElementRod] (effective stress) and a [ElementSeepage] (liquid flow)
/// and adds the coupling terms:
///
/// ```text
/// Ru = Ru(rod) - Q p
/// Rp = Rp(seepage) + Qᵀ v      (transient)
///
/// Q[(m,i), n] = σm di α A / 2      with σ = [-1, 1]
/// v = α4 u - χ*
/// ```
pub struct ElementPorousRod {
    /// Solid skeleton
    pub rod: ElementRod,

    /// Liquid flow
    pub seepage: ElementSeepage,

    /// Coupling matrix Q (2 ndim × 2)
    pub qq: Matrix,

    /// Equation numbers of the displacements
    pub eq_u: Vec<usize>,

    /// Equation numbers of the liquid pressure
    pub eq_p: Vec<usize>,

    /// Local starred variables χ*
    pub chi_star: Vec<f64>,
}

impl ElementPorousRod {
    /// Returns the DOFs of the porous rod
    pub fn info(input: &CellInput) -> Result<ElementInfo, StrError> {
        let rod = ElementRod::info(input)?;
        let seepage = ElementSeepage::info(input)?;
        let mut info = rod.clone();
        for (m, dofs) in seepage.dofs.iter().enumerate() {
            info.dofs[m].extend(dofs);
        }
        info.y_to_f.extend(seepage.y_to_f);
        info.t1_vars = seepage.t1_vars;
        Ok(info)
    }

    /// Allocates a porous rod element (registry function)
    pub fn allocate(input: &CellInput, data: &ElementData) -> Result<Box<dyn ElementTrait>, StrError> {
        let param: ParamPorousRod = data.params()?;
        Ok(Box::new(ElementPorousRod::new(input, param)?))
    }

    /// Allocates a new instance
    pub fn new(input: &CellInput, param: ParamPorousRod) -> Result<Self, StrError> {
        if param.alpha < 0.0 || param.alpha > 1.0 {
            return Err("Biot coefficient must satisfy 0 ≤ alpha ≤ 1");
        }
        let rod = ElementRod::new(input, param.rod)?;
        let seepage = ElementSeepage::new(input, param.seepage)?;
        let ndim = rod.ndim;
        let mut qq = Matrix::new(2 * ndim, 2);
        let sigma = [-1.0, 1.0];
        for m in 0..2 {
            for i in 0..ndim {
                let value = sigma[m] * rod.dir[i] * param.alpha * param.rod.area / 2.0;
                qq.set(m * ndim + i, 0, value);
                qq.set(m * ndim + i, 1, value);
            }
        }
        Ok(ElementPorousRod {
            rod,
            seepage,
            qq,
            eq_u: Vec::new(),
            eq_p: Vec::new(),
            chi_star: vec![0.0; 2 * ndim],
        })
    }

    /// Returns the velocity of the solid skeleton (Newmark)
    fn velocity(&self, sol: &Solution) -> Vec<f64> {
        self.eq_u
            .iter()
            .enumerate()
            .map(|(l, eq)| sol.dc.alpha4 * sol.y[*eq] - self.chi_star[l])
            .collect()
    }
}

impl ElementTrait for ElementPorousRod {
    fn set_equations(&mut self, eqs: &[Vec<(Dof, usize)>]) -> Result<(), StrError> {
        let u_keys = Dof::displacements(self.rod.ndim);
        let eqs_u = split_equations(eqs, u_keys);
        let eqs_p = split_equations(eqs, &[Dof::Pl, Dof::Fl]);
        self.rod.set_equations(&eqs_u)?;
        self.seepage.set_equations(&eqs_p)?;
        self.eq_u = self.rod.local_to_global.clone();
        self.eq_p = self.seepage.eq_pl.clone();
        Ok(())
    }

    fn set_ele_cond(&mut self, cond: EleCond, f: &FnTime) -> Result<(), StrError> {
        if cond == EleCond::Gravity {
            self.rod.set_ele_cond(cond, f)?;
        }
        self.seepage.set_ele_cond(cond, f)
    }

    fn set_nat_bc(&mut self, nbc: Nbc, face: usize, f: &FnTime) -> Result<(), StrError> {
        match nbc {
            Nbc::Ql | Nbc::Seepage => self.seepage.set_nat_bc(nbc, face, f),
            Nbc::Qn => Err("PorousRod does not handle normal distributed loads"),
        }
    }

    fn clear_conditions(&mut self) {
        self.rod.clear_conditions();
        self.seepage.clear_conditions();
    }

    fn interp_star_vars(&mut self, sol: &Solution) -> Result<(), StrError> {
        self.rod.interp_star_vars(sol)?;
        self.seepage.interp_star_vars(sol)?;
        if !sol.steady {
            self.chi_star = self.eq_u.iter().map(|eq| sol.chi[*eq]).collect();
        }
        Ok(())
    }

    fn add_to_rhs(&mut self, fb: &mut Vector, sol: &Solution) -> Result<(), StrError> {
        self.rod.add_to_rhs(fb, sol)?;
        self.seepage.add_to_rhs(fb, sol)?;
        let pp = [sol.y[self.eq_p[0]], sol.y[self.eq_p[1]]];
        for (l, eq) in self.eq_u.iter().enumerate() {
            fb[*eq] += self.qq.get(l, 0) * pp[0] + self.qq.get(l, 1) * pp[1];
        }
        if !sol.steady {
            let vv = self.velocity(sol);
            for n in 0..2 {
                let mut qv = 0.0;
                for l in 0..vv.len() {
                    qv += self.qq.get(l, n) * vv[l];
                }
                fb[self.eq_p[n]] -= qv;
            }
        }
        Ok(())
    }

    fn add_to_kb(&mut self, kb: &mut dyn TangentSink, sol: &Solution, first_iteration: bool) -> Result<(), StrError> {
        self.rod.add_to_kb(kb, sol, first_iteration)?;
        self.seepage.add_to_kb(kb, sol, first_iteration)?;
        for (l, eq) in self.eq_u.iter().enumerate() {
            for n in 0..2 {
                kb.put(*eq, self.eq_p[n], -self.qq.get(l, n))?;
                if !sol.steady {
                    kb.put(self.eq_p[n], *eq, sol.dc.alpha4 * self.qq.get(l, n))?;
                }
            }
        }
        Ok(())
    }

    fn update(&mut self, sol: &Solution) -> Result<(), StrError> {
        self.rod.update(sol)?;
        self.seepage.update(sol)
    }

    fn symmetric_jacobian(&self) -> bool {
        false
    }

    fn out_ips_data(&self, sol: &Solution) -> Vec<IpOutput> {
        let mut out = self.rod.out_ips_data(sol);
        for ip in self.seepage.out_ips_data(sol) {
            out[0].values.extend(ip.values);
        }
        out
    }

    fn intvars(&mut self) -> Option<&mut dyn ElementIntvars> {
        self.rod.intvars()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
