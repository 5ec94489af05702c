use crate::StrError;
use russell_lab::{Matrix, Vector};
use russell_sparse::SparseMatrix;

/// Receives the contributions to the global tangent (Jacobian) matrix
///
/// Repeated `(i, j)` entries are summed.
pub trait TangentSink {
    /// Adds a value to the (i, j) entry
    fn put(&mut self, i: usize, j: usize, value: f64) -> Result<(), StrError>;
}

impl TangentSink for SparseMatrix {
    fn put(&mut self, i: usize, j: usize, value: f64) -> Result<(), StrError> {
        SparseMatrix::put(self, i, j, value)
    }
}

/// Holds tangent contributions as (i, j, value) triplets
///
/// Used by distributed runs to exchange the contributions of each rank.
#[derive(Clone, Debug, Default)]
pub struct Triplets {
    /// All triplets in insertion order
    pub entries: Vec<(usize, usize, f64)>,
}

impl Triplets {
    /// Allocates a new instance
    pub fn new() -> Self {
        Triplets { entries: Vec::new() }
    }

    /// Clears all triplets
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns the triplets as a flat array [i0, j0, v0, i1, j1, v1, ...]
    pub fn to_flat(&self) -> Vec<f64> {
        let mut flat = Vec::with_capacity(3 * self.entries.len());
        for (i, j, v) in &self.entries {
            flat.push(*i as f64);
            flat.push(*j as f64);
            flat.push(*v);
        }
        flat
    }

    /// Puts all triplets in a flat array into a sink
    pub fn put_flat(sink: &mut dyn TangentSink, flat: &[f64]) -> Result<(), StrError> {
        if flat.len() % 3 != 0 {
            return Err("flat array of triplets must have a length multiple of 3");
        }
        for t in flat.chunks(3) {
            sink.put(t[0] as usize, t[1] as usize, t[2])?;
        }
        Ok(())
    }
}

impl TangentSink for Triplets {
    fn put(&mut self, i: usize, j: usize, value: f64) -> Result<(), StrError> {
        self.entries.push((i, j, value));
        Ok(())
    }
}

/// Assembles a local residual vector into the global right-hand side (fb -= r)
///
/// # Input
///
/// * `fb` -- global right-hand side vector (negative of the residual)
/// * `r_local` -- local residual vector
/// * `local_to_global` -- global equation numbers of the local equations
///
/// # Panics
///
/// This function will panic if the indices are out-of-bounds
#[inline]
pub fn assemble_residual(fb: &mut Vector, r_local: &Vector, local_to_global: &[usize]) {
    for l in 0..r_local.dim() {
        fb[local_to_global[l]] -= r_local[l];
    }
}

/// Assembles a local matrix into the global tangent
///
/// # Input
///
/// * `kb` -- global tangent
/// * `kk_local` -- local square matrix
/// * `local_to_global` -- global equation numbers of the local equations
pub fn assemble_tangent(kb: &mut dyn TangentSink, kk_local: &Matrix, local_to_global: &[usize]) -> Result<(), StrError> {
    let (n, _) = kk_local.dims();
    for l in 0..n {
        for ll in 0..n {
            kb.put(local_to_global[l], local_to_global[ll], kk_local.get(l, ll))?;
        }
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
