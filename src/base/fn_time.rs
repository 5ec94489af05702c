use crate::StrError;
use serde::{Deserialize, Serialize};

/// Defines a scalar function of time f(t) used by boundary conditions and time control
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub enum FnTime {
    /// Returns zero
    Zero,

    /// Returns a constant value
    Constant(f64),

    /// Returns `a + b · t`
    Linear { a: f64, b: f64 },

    /// Ramp from `(t0, v0)` to `(t1, v1)`; constant before `t0` and after `t1`
    ///
    /// ```text
    ///  v1 -            ,--------
    ///                 /
    ///  v0 - ---------'
    ///               t0 t1
    /// ```
    Ramp { t0: f64, t1: f64, v0: f64, v1: f64 },

    /// Piecewise linear interpolation of `(t, value)` pairs sorted by time
    ///
    /// The first and last values are extended as constants.
    PiecewiseLinear(Vec<(f64, f64)>),

    /// Returns `amplitude · sin(omega · t) + offset`
    Sine { amplitude: f64, omega: f64, offset: f64 },
}

impl FnTime {
    /// Evaluates the function at time t
    pub fn eval(&self, t: f64) -> f64 {
        match self {
            FnTime::Zero => 0.0,
            FnTime::Constant(c) => *c,
            FnTime::Linear { a, b } => a + b * t,
            FnTime::Ramp { t0, t1, v0, v1 } => {
                if t <= *t0 {
                    *v0
                } else if t >= *t1 {
                    *v1
                } else {
                    v0 + (v1 - v0) * (t - t0) / (t1 - t0)
                }
            }
            FnTime::PiecewiseLinear(points) => {
                let n = points.len();
                if n == 0 {
                    return 0.0;
                }
                if t <= points[0].0 {
                    return points[0].1;
                }
                if t >= points[n - 1].0 {
                    return points[n - 1].1;
                }
                for i in 1..n {
                    let (ta, va) = points[i - 1];
                    let (tb, vb) = points[i];
                    if t <= tb {
                        return va + (vb - va) * (t - ta) / (tb - ta);
                    }
                }
                points[n - 1].1
            }
            FnTime::Sine {
                amplitude,
                omega,
                offset,
            } => amplitude * f64::sin(omega * t) + offset,
        }
    }

    /// Checks the consistency of the function data
    pub fn validate(&self) -> Result<(), StrError> {
        match self {
            FnTime::Ramp { t0, t1, .. } => {
                if t1 <= t0 {
                    return Err("ramp function requires t1 > t0");
                }
            }
            FnTime::PiecewiseLinear(points) => {
                if points.is_empty() {
                    return Err("piecewise-linear function requires at least one point");
                }
                for i in 1..points.len() {
                    if points[i].0 <= points[i - 1].0 {
                        return Err("piecewise-linear function requires increasing times");
                    }
                }
            }
            _ => (),
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
