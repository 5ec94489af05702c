use crate::base::Config;
use crate::StrError;
use serde::{Deserialize, Serialize};

/// Holds the coefficients for (implicit) transient and dynamic analyses
///
/// # Notes
///
/// * `theta` -- Theta-method parameter `θ` with `1e-5 ≤ θ ≤ 1.0`
/// * `theta1` -- First Newmark parameter `θ1` (aka, γ) with `0.0001 ≤ θ1 ≤ 1.0`
/// * `theta2` -- Second Newmark parameter`θ2` (aka, 2 β) with `0.0001 ≤ θ2 ≤ 1.0`
/// * `hht_alpha` -- Hilber-Hughes-Taylor `α` parameter with `-1/3 ≤ α ≤ 0`
/// * With the HHT method, `θ1` and `θ2` are calculated for unconditional stability
///
/// The β coefficients correspond to first order time derivatives (θ-method) and the α
/// coefficients correspond to second order time derivatives (Newmark/HHT):
///
/// ```text
/// ψ* = β1 y + β2 dy/dt          dy/dt = β1 y - ψ*
///
/// ζ* = α1 y + α2 dy/dt + α3 d²y/dt²     d²y/dt² = α1 y - ζ*
/// χ* = α4 y + α5 dy/dt + α6 d²y/dt²     dy/dt   = α4 y - χ*
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct DynCoefs {
    /// θ-method parameter
    pub theta: f64,

    /// First Newmark parameter (updated if HHT)
    pub theta1: f64,

    /// Second Newmark parameter (updated if HHT)
    pub theta2: f64,

    /// HHT α parameter
    pub hht_alpha: f64,

    /// Use the HHT method
    pub hht: bool,

    /// Rayleigh damping coefficient (mass)
    pub ray_m: f64,

    /// Rayleigh damping coefficient (stiffness)
    pub ray_k: f64,

    /// Minimum Δt
    pub dt_min: f64,

    /// Coefficients for first order time derivatives
    pub beta1: f64,
    pub beta2: f64,

    /// Coefficients for second order time derivatives
    pub alpha1: f64,
    pub alpha2: f64,
    pub alpha3: f64,
    pub alpha4: f64,
    pub alpha5: f64,
    pub alpha6: f64,

    /// HHT coefficients
    pub alpha7: f64,
    pub alpha8: f64,

    /// Mass coefficient for the tangent: `bm = α1 + α7 · ray_m`
    pub bm: f64,

    /// Stiffness coefficient for the tangent: `bk = α8 + α7 · ray_k`
    pub bk: f64,
}

impl DynCoefs {
    /// Allocates a new instance with validated parameters and zero coefficients
    pub fn new(config: &Config) -> Result<Self, StrError> {
        // check θ-method parameters
        if !(1e-5..=1.0).contains(&config.theta) {
            return Err("θ-method requires 1e-5 ≤ θ ≤ 1.0");
        }

        // check HHT method parameters and/or calculate theta1 and theta2
        let (theta1, theta2) = if config.hht_method {
            if !(-1.0 / 3.0..=0.0).contains(&config.hht_alpha) {
                return Err("HHT method requires: -1/3 ≤ α ≤ 0");
            }
            let theta1 = (1.0 - 2.0 * config.hht_alpha) / 2.0;
            let theta2 = (1.0 - config.hht_alpha) * (1.0 - config.hht_alpha) / 2.0;
            (theta1, theta2)
        } else {
            // Newmark's method
            if !(0.0001..=1.0).contains(&config.theta1) {
                return Err("Newmark's method requires: 0.0001 ≤ θ1 ≤ 1.0");
            }
            if !(0.0001..=1.0).contains(&config.theta2) {
                return Err("Newmark's method requires: 0.0001 ≤ θ2 ≤ 1.0");
            }
            (config.theta1, config.theta2)
        };

        // new instance
        Ok(DynCoefs {
            theta: config.theta,
            theta1,
            theta2,
            hht_alpha: config.hht_alpha,
            hht: config.hht_method,
            ray_m: config.ray_m,
            ray_k: config.ray_k,
            dt_min: config.dt_min,
            ..Default::default()
        })
    }

    /// Indicates that Rayleigh damping is enabled
    pub fn rayleigh(&self) -> bool {
        self.ray_m > 0.0 || self.ray_k > 0.0
    }

    /// Calculates the β coefficients for the θ-method
    pub fn calc_betas(&mut self, dt: f64) -> Result<(), StrError> {
        if dt < self.dt_min {
            return Err("Δt is smaller than the allowed minimum");
        }
        self.beta1 = 1.0 / (self.theta * dt);
        self.beta2 = (1.0 - self.theta) / self.theta;
        Ok(())
    }

    /// Calculates the α coefficients for the Newmark/HHT method
    pub fn calc_alphas(&mut self, dt: f64) -> Result<(), StrError> {
        if dt < self.dt_min {
            return Err("Δt is smaller than the allowed minimum");
        }

        // α coefficients
        let m = dt * dt / 2.0;
        self.alpha1 = 1.0 / (self.theta2 * m);
        self.alpha2 = dt / (self.theta2 * m);
        self.alpha3 = 1.0 / self.theta2 - 1.0;
        self.alpha4 = self.theta1 * dt / (self.theta2 * m);
        self.alpha5 = 2.0 * self.theta1 / self.theta2 - 1.0;
        self.alpha6 = (self.theta1 / self.theta2 - 1.0) * dt;

        // HHT method
        self.alpha7 = self.alpha4;
        self.alpha8 = 1.0;
        if self.hht {
            self.alpha7 = (1.0 + self.hht_alpha) * self.alpha4;
            self.alpha8 = 1.0 + self.hht_alpha;
        }

        // Rayleigh damping
        self.bm = self.alpha1 + self.alpha7 * self.ray_m;
        self.bk = self.alpha8 + self.alpha7 * self.ray_k;
        Ok(())
    }

    /// Calculates both the β and α coefficients
    pub fn calc_both(&mut self, dt: f64) -> Result<(), StrError> {
        self.calc_betas(dt)?;
        self.calc_alphas(dt)
    }

    /// Resets all coefficients to zero (steady analyses)
    ///
    /// With zero coefficients, the time derivative terms vanish from residuals and tangents.
    pub fn reset(&mut self) {
        self.beta1 = 0.0;
        self.beta2 = 0.0;
        self.alpha1 = 0.0;
        self.alpha2 = 0.0;
        self.alpha3 = 0.0;
        self.alpha4 = 0.0;
        self.alpha5 = 0.0;
        self.alpha6 = 0.0;
        self.alpha7 = 0.0;
        self.alpha8 = 1.0;
        self.bm = 0.0;
        self.bk = 1.0;
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
