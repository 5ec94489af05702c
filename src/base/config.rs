use super::{CONFIG_MIN_DT_MIN, CONFIG_MIN_TOL, DEFAULT_OUT_DIR, MACHINE_EPSILON};
use crate::StrError;
use russell_sparse::Genie;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Selects the sparse direct solver
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum LinSol {
    /// UMFPACK (SuiteSparse)
    Umfpack,

    /// KLU (SuiteSparse)
    Klu,

    /// MUMPS
    Mumps,
}

impl LinSol {
    /// Returns the russell_sparse genie
    pub fn genie(&self) -> Genie {
        match self {
            LinSol::Umfpack => Genie::Umfpack,
            LinSol::Klu => Genie::Klu,
            LinSol::Mumps => Genie::Mumps,
        }
    }
}

/// Holds the simulation-wide configuration parameters
///
/// # Notes
///
/// * `theta` -- Theta-method parameter `θ` with `1e-5 ≤ θ ≤ 1.0`
/// * `theta1` -- First Newmark parameter `θ1` (aka, γ) with `0.0001 ≤ θ1 ≤ 1.0`
/// * `theta2` -- Second Newmark parameter`θ2` (aka, 2 β) with `0.0001 ≤ θ2 ≤ 1.0`
/// * `hht_method` -- Indicates the use of Hilber-Hughes-Taylor method
/// * `hht_alpha` -- Hilber-Hughes-Taylor `α` parameter with `-1/3 ≤ α ≤ 0`
/// * if `hht_method` is true, `θ1` and `θ2` are automatically calculated for unconditional stability
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Transient analysis (time derivatives are considered); steady otherwise
    pub transient: bool,

    /// Coefficient θ for the θ-method
    pub theta: f64,

    /// Coefficient θ1 = γ for the Newmark method
    pub theta1: f64,

    /// Coefficient θ2 = 2·β for the Newmark method
    pub theta2: f64,

    /// Use the Hilber-Hughes-Taylor method
    pub hht_method: bool,

    /// Hilber-Hughes-Taylor α parameter
    pub hht_alpha: f64,

    /// Rayleigh damping coefficient multiplying the mass matrix
    pub ray_m: f64,

    /// Rayleigh damping coefficient multiplying the stiffness matrix
    pub ray_k: f64,

    /// Maximum number of iterations
    pub n_max_iterations: usize,

    /// Relative tolerance on the largest component of the residual vector
    pub tol_fb: f64,

    /// Absolute floor of the largest component of the residual vector
    pub tol_fb_min: f64,

    /// Absolute tolerance for the iterative increment
    pub atol: f64,

    /// Relative tolerance for the iterative increment
    pub rtol: f64,

    /// Use constant tangent (modified Newton) during iterations
    pub constant_tangent: bool,

    /// Divergence control
    pub divergence_control: bool,

    /// Maximum number of consecutive diverging steps (each one halves Δt)
    pub n_max_divergence: usize,

    /// Minimum allowed time increment min(Δt)
    pub dt_min: f64,

    /// Linear solver
    pub lin_sol: LinSol,

    /// Use the symmetric mode of the linear solver (if all elements are symmetric)
    pub symmetric: bool,

    /// Verbose mode during timesteps
    pub verbose_timesteps: bool,

    /// Verbose mode during iterations
    pub verbose_iterations: bool,

    /// Write the state and summary files
    pub write_files: bool,

    /// Directory for the output files
    pub out_dir: String,

    /// Stem of the output filenames
    pub filename_stem: String,
}

impl Config {
    /// Allocates a new instance with default values
    pub fn new() -> Self {
        Config {
            transient: false,
            theta: 0.5,
            theta1: 0.5,
            theta2: 0.5,
            hht_method: false,
            hht_alpha: 0.0,
            ray_m: 0.0,
            ray_k: 0.0,
            n_max_iterations: 20,
            tol_fb: 1e-8,
            tol_fb_min: 1e-14,
            atol: 1e-6,
            rtol: 1e-6,
            constant_tangent: false,
            divergence_control: false,
            n_max_divergence: 20,
            dt_min: 1e-8,
            lin_sol: LinSol::Umfpack,
            symmetric: false,
            verbose_timesteps: false,
            verbose_iterations: false,
            write_files: false,
            out_dir: DEFAULT_OUT_DIR.to_string(),
            filename_stem: "simulation".to_string(),
        }
    }

    /// Indicates a steady analysis (no time derivatives)
    pub fn steady(&self) -> bool {
        !self.transient
    }

    /// Returns the tolerance for the normalized increment
    ///
    /// ```text
    /// itol = max(10 ϵ / rtol, min(0.01, √rtol))
    /// ```
    pub fn itol(&self) -> f64 {
        f64::max(10.0 * MACHINE_EPSILON / self.rtol, f64::min(0.01, f64::sqrt(self.rtol)))
    }

    /// Sets a transient analysis
    pub fn set_transient(&mut self, flag: bool) -> &mut Self {
        self.transient = flag;
        self
    }

    /// Sets the θ-method parameter
    pub fn set_theta(&mut self, value: f64) -> Result<&mut Self, StrError> {
        if !(1e-5..=1.0).contains(&value) {
            return Err("θ-method requires 1e-5 ≤ θ ≤ 1.0");
        }
        self.theta = value;
        Ok(self)
    }

    /// Sets the Newmark parameters
    pub fn set_newmark(&mut self, theta1: f64, theta2: f64) -> Result<&mut Self, StrError> {
        if !(0.0001..=1.0).contains(&theta1) {
            return Err("Newmark's method requires: 0.0001 ≤ θ1 ≤ 1.0");
        }
        if !(0.0001..=1.0).contains(&theta2) {
            return Err("Newmark's method requires: 0.0001 ≤ θ2 ≤ 1.0");
        }
        self.theta1 = theta1;
        self.theta2 = theta2;
        Ok(self)
    }

    /// Sets the Hilber-Hughes-Taylor method
    pub fn set_hht(&mut self, alpha: f64) -> Result<&mut Self, StrError> {
        if !(-1.0 / 3.0..=0.0).contains(&alpha) {
            return Err("HHT method requires: -1/3 ≤ α ≤ 0");
        }
        self.hht_method = true;
        self.hht_alpha = alpha;
        Ok(self)
    }

    /// Sets the Rayleigh damping coefficients
    pub fn set_rayleigh(&mut self, ray_m: f64, ray_k: f64) -> Result<&mut Self, StrError> {
        if !(0.0..).contains(&ray_m) || !(0.0..).contains(&ray_k) {
            return Err("Rayleigh coefficients must be ≥ 0.0");
        }
        self.ray_m = ray_m;
        self.ray_k = ray_k;
        Ok(self)
    }

    /// Sets the maximum number of iterations
    pub fn set_n_max_iterations(&mut self, value: usize) -> Result<&mut Self, StrError> {
        if value < 1 {
            return Err("n_max_iterations must be ≥ 1");
        }
        self.n_max_iterations = value;
        Ok(self)
    }

    /// Sets the tolerances on the residual vector (relative and absolute floor)
    pub fn set_tol_fb(&mut self, tol_fb: f64, tol_fb_min: f64) -> Result<&mut Self, StrError> {
        if !(CONFIG_MIN_TOL..).contains(&tol_fb) || !(CONFIG_MIN_TOL..).contains(&tol_fb_min) {
            return Err("residual tolerances must be ≥ 1e-15");
        }
        self.tol_fb = tol_fb;
        self.tol_fb_min = tol_fb_min;
        Ok(self)
    }

    /// Sets the tolerances on the iterative increment
    pub fn set_tol_increment(&mut self, atol: f64, rtol: f64) -> Result<&mut Self, StrError> {
        if !(CONFIG_MIN_TOL..).contains(&atol) || !(CONFIG_MIN_TOL..).contains(&rtol) {
            return Err("increment tolerances must be ≥ 1e-15");
        }
        self.atol = atol;
        self.rtol = rtol;
        Ok(self)
    }

    /// Sets the constant tangent (modified Newton) mode
    pub fn set_constant_tangent(&mut self, flag: bool) -> &mut Self {
        self.constant_tangent = flag;
        self
    }

    /// Sets the divergence control
    pub fn set_divergence_control(&mut self, flag: bool, n_max_divergence: usize) -> &mut Self {
        self.divergence_control = flag;
        self.n_max_divergence = n_max_divergence;
        self
    }

    /// Sets the minimum time increment
    pub fn set_dt_min(&mut self, value: f64) -> Result<&mut Self, StrError> {
        if !(CONFIG_MIN_DT_MIN..).contains(&value) {
            return Err("dt_min must be ≥ 1e-10");
        }
        self.dt_min = value;
        Ok(self)
    }

    /// Sets the linear solver
    pub fn set_lin_sol(&mut self, lin_sol: LinSol, symmetric: bool) -> &mut Self {
        self.lin_sol = lin_sol;
        self.symmetric = symmetric;
        self
    }

    /// Sets the verbose mode
    pub fn set_verbose(&mut self, timesteps: bool, iterations: bool) -> &mut Self {
        self.verbose_timesteps = timesteps;
        self.verbose_iterations = iterations;
        self
    }

    /// Enables the generation of output files
    ///
    /// None means that the default directory will be used; see [DEFAULT_OUT_DIR]
    pub fn set_output(&mut self, filename_stem: &str, out_dir: Option<&str>) -> &mut Self {
        self.write_files = true;
        self.filename_stem = filename_stem.to_string();
        self.out_dir = out_dir.unwrap_or(DEFAULT_OUT_DIR).to_string();
        self
    }

    /// Validates all data
    ///
    /// Returns a message with the inconsistent data, or returns None if everything is all right.
    pub fn validate(&self) -> Option<String> {
        if !(1e-5..=1.0).contains(&self.theta) {
            return Some(format!(
                "theta = {:?} is incorrect; it must be 1e-5 ≤ θ ≤ 1.0",
                self.theta
            ));
        }
        if self.hht_method {
            if !(-1.0 / 3.0..=0.0).contains(&self.hht_alpha) {
                return Some(format!(
                    "hht_alpha = {:?} is incorrect; it must be -1/3 ≤ α ≤ 0",
                    self.hht_alpha
                ));
            }
        } else {
            if !(0.0001..=1.0).contains(&self.theta1) {
                return Some(format!(
                    "theta1 = {:?} is incorrect; it must be 0.0001 ≤ θ₁ ≤ 1.0",
                    self.theta1
                ));
            }
            if !(0.0001..=1.0).contains(&self.theta2) {
                return Some(format!(
                    "theta2 = {:?} is incorrect; it must be 0.0001 ≤ θ₂ ≤ 1.0",
                    self.theta2
                ));
            }
        }
        if !(0.0..).contains(&self.ray_m) || !(0.0..).contains(&self.ray_k) {
            return Some(format!(
                "ray_m = {:?} and ray_k = {:?} are incorrect; they must be ≥ 0.0",
                self.ray_m, self.ray_k
            ));
        }
        if self.n_max_iterations < 1 {
            return Some("n_max_iterations = 0 is incorrect; it must be ≥ 1".to_string());
        }
        if !(CONFIG_MIN_TOL..).contains(&self.tol_fb) {
            return Some(format!(
                "tol_fb = {:?} is incorrect; it must be ≥ {:e}",
                self.tol_fb, CONFIG_MIN_TOL
            ));
        }
        if !(CONFIG_MIN_TOL..).contains(&self.tol_fb_min) {
            return Some(format!(
                "tol_fb_min = {:?} is incorrect; it must be ≥ {:e}",
                self.tol_fb_min, CONFIG_MIN_TOL
            ));
        }
        if !(CONFIG_MIN_TOL..).contains(&self.atol) {
            return Some(format!(
                "atol = {:?} is incorrect; it must be ≥ {:e}",
                self.atol, CONFIG_MIN_TOL
            ));
        }
        if !(CONFIG_MIN_TOL..).contains(&self.rtol) {
            return Some(format!(
                "rtol = {:?} is incorrect; it must be ≥ {:e}",
                self.rtol, CONFIG_MIN_TOL
            ));
        }
        if !(CONFIG_MIN_DT_MIN..).contains(&self.dt_min) {
            return Some(format!(
                "dt_min = {:?} is incorrect; it must be ≥ {:e}",
                self.dt_min, CONFIG_MIN_DT_MIN
            ));
        }
        None // all good
    }

    /// Prints the header of the table with timestep and iteration data
    #[inline]
    pub fn print_header(&self) {
        if self.verbose_timesteps || self.verbose_iterations {
            println!("Legend:");
            println!("✅ : converged");
            println!("👍 : converging");
            println!("🥵 : diverging");
            println!("😱 : found NaN or Inf\n");
            println!(
                "{:>8} {:>13} {:>13} {:>5} {:>9}   {:>9}  ",
                "timestep", "t", "Δt", "iter", "max|fb|", "Lδu"
            );
        }
    }

    /// Prints timestep data
    #[inline]
    #[rustfmt::skip]
    pub fn print_timestep(&self, timestep: usize, t: f64, dt: f64) {
        if !self.verbose_timesteps {
            return ;
        }
        println!(
            "{:>8} {:>13.6e} {:>13.6e} {:>5} {:>9}   {:>9}  ",
            timestep+1, t, dt, ".", ".", "."
        );
    }

    /// Prints iteration data
    #[inline]
    pub fn print_iteration(&self, it: usize, larg_fb: f64, larg_fb0: f64, larg_fb_prev: f64, ldu: f64) {
        // skip if not verbose
        if !self.verbose_iterations {
            return;
        }
        let icon = if !larg_fb.is_finite() {
            "😱" // found NaN or Inf
        } else if larg_fb < self.tol_fb_min {
            "✅" // converged on absolute residual
        } else if it == 0 {
            "  " // first iteration (we don't have larg_fb0 yet)
        } else if larg_fb < self.tol_fb * larg_fb0 {
            "✅" // converged on relative residual
        } else if it > 1 && larg_fb > larg_fb_prev {
            "🥵" // diverging
        } else {
            "👍" // converging
        };
        println!(
            "{:>8} {:>13} {:>13} {:>5} {:>9.2e}{} {:>9.2e}",
            ".",
            ".",
            ".",
            it + 1,
            larg_fb,
            icon,
            ldu,
        );
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration data\n").unwrap();
        write!(f, "==================\n").unwrap();
        write!(f, "transient = {:?}\n", self.transient).unwrap();
        write!(f, "theta = {:?}\n", self.theta).unwrap();
        write!(f, "theta1 = {:?}\n", self.theta1).unwrap();
        write!(f, "theta2 = {:?}\n", self.theta2).unwrap();
        write!(f, "hht_method = {:?}\n", self.hht_method).unwrap();
        write!(f, "hht_alpha = {:?}\n", self.hht_alpha).unwrap();
        write!(f, "ray_m = {:?}\n", self.ray_m).unwrap();
        write!(f, "ray_k = {:?}\n", self.ray_k).unwrap();
        write!(f, "\nNonlinear solver\n").unwrap();
        write!(f, "================\n").unwrap();
        write!(f, "n_max_iterations = {:?}\n", self.n_max_iterations).unwrap();
        write!(f, "tol_fb = {:?}\n", self.tol_fb).unwrap();
        write!(f, "tol_fb_min = {:?}\n", self.tol_fb_min).unwrap();
        write!(f, "atol = {:?}\n", self.atol).unwrap();
        write!(f, "rtol = {:?}\n", self.rtol).unwrap();
        write!(f, "itol = {:?}\n", self.itol()).unwrap();
        write!(f, "constant_tangent = {:?}\n", self.constant_tangent).unwrap();
        write!(f, "divergence_control = {:?}\n", self.divergence_control).unwrap();
        write!(f, "n_max_divergence = {:?}\n", self.n_max_divergence).unwrap();
        write!(f, "dt_min = {:?}\n", self.dt_min).unwrap();
        write!(f, "lin_sol = {:?}\n", self.lin_sol).unwrap();
        write!(f, "symmetric = {:?}\n", self.symmetric).unwrap();
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
