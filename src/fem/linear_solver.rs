use super::TangentSink;
use crate::base::LinSol;
use crate::StrError;
use russell_lab::Vector;
use russell_sparse::{LinSolver, SparseMatrix};

/// Defines the linear solver used by the Newton-Raphson iterations
///
/// The matrix is assembled through [LinearSolver::sink] after [LinearSolver::reset_matrix].
pub trait LinearSolver {
    /// Allocates the matrix and the solver for a system with n equations
    fn initialize(&mut self, n: usize, nnz: usize, symmetric: bool) -> Result<(), StrError>;

    /// Returns the sink receiving the tangent contributions
    fn sink(&mut self) -> Result<&mut dyn TangentSink, StrError>;

    /// Clears the matrix (keeping its allocation)
    fn reset_matrix(&mut self) -> Result<(), StrError>;

    /// Factorizes the matrix
    fn factorize(&mut self) -> Result<(), StrError>;

    /// Solves the linear system with the factorized matrix
    fn solve(&mut self, x: &mut Vector, rhs: &Vector) -> Result<(), StrError>;

    /// Releases the resources
    fn cleanup(&mut self);
}

/// Implements the linear solver with russell_sparse
///
/// The matrix is stored in COO format. With a symmetric tangent and a solver that works
/// with the lower triangle only, the entries above the diagonal are skipped.
pub struct SparseSolver {
    /// Selected solver
    pub lin_sol: LinSol,

    /// Skip the entries above the diagonal
    triangular: bool,

    /// Global tangent matrix
    kk: Option<SparseMatrix>,

    /// Linear solver
    solver: Option<LinSolver<'static>>,
}

impl SparseSolver {
    /// Allocates a new instance
    pub fn new(lin_sol: LinSol) -> Self {
        SparseSolver {
            lin_sol,
            triangular: false,
            kk: None,
            solver: None,
        }
    }

    /// Returns the matrix (after initialize)
    pub fn matrix(&self) -> Option<&SparseMatrix> {
        self.kk.as_ref()
    }
}

impl TangentSink for SparseSolver {
    fn put(&mut self, i: usize, j: usize, value: f64) -> Result<(), StrError> {
        if self.triangular && j > i {
            return Ok(());
        }
        let kk = self.kk.as_mut().ok_or("linear solver must be initialized first")?;
        kk.put(i, j, value)
    }
}

impl LinearSolver for SparseSolver {
    fn initialize(&mut self, n: usize, nnz: usize, symmetric: bool) -> Result<(), StrError> {
        self.cleanup();
        let genie = self.lin_sol.genie();
        let sym = genie.symmetry(symmetric);
        self.triangular = sym.triangular();
        let max_nnz = usize::max(nnz, 1);
        self.kk = Some(SparseMatrix::new_coo(n, n, max_nnz, sym)?);
        self.solver = Some(LinSolver::new(genie)?);
        Ok(())
    }

    fn sink(&mut self) -> Result<&mut dyn TangentSink, StrError> {
        if self.kk.is_none() {
            return Err("linear solver must be initialized first");
        }
        Ok(self)
    }

    fn reset_matrix(&mut self) -> Result<(), StrError> {
        let kk = self.kk.as_mut().ok_or("linear solver must be initialized first")?;
        kk.get_coo_mut()?.reset();
        Ok(())
    }

    fn factorize(&mut self) -> Result<(), StrError> {
        let kk = self.kk.as_mut().ok_or("linear solver must be initialized first")?;
        let solver = self.solver.as_mut().ok_or("linear solver must be initialized first")?;
        solver.actual.factorize(kk, None)
    }

    fn solve(&mut self, x: &mut Vector, rhs: &Vector) -> Result<(), StrError> {
        let kk = self.kk.as_ref().ok_or("linear solver must be initialized first")?;
        let solver = self.solver.as_mut().ok_or("linear solver must be initialized first")?;
        solver.actual.solve(x, kk, rhs, false)
    }

    fn cleanup(&mut self) {
        self.solver = None;
        self.kk = None;
    }
}

impl Drop for SparseSolver {
    fn drop(&mut self) {
        self.cleanup();
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
