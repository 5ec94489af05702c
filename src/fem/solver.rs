use super::{Domain, FileIo, LinearSolver, SparseSolver, StepRecord, Summary, Triplets};
use crate::base::Stage;
use crate::StrError;
use russell_lab::{vec_norm, Norm, Vector};

/// Defines the outcome of the iterations of a time step
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StepOutcome {
    /// The residual (or the increment) is small enough
    Converged,

    /// The residual has increased (with divergence control)
    Diverged,

    /// The maximum number of iterations has been reached
    MaxIterations,

    /// An element, the factorization, or the linear solution has failed
    Failed(StrError),
}

impl StepOutcome {
    /// Returns a short description
    pub fn as_str(&self) -> &'static str {
        match self {
            StepOutcome::Converged => "converged",
            StepOutcome::Diverged => "diverged",
            StepOutcome::MaxIterations => "max-iterations",
            StepOutcome::Failed(_) => "failed",
        }
    }
}

/// Holds the results of the iterations of a time step
#[derive(Clone, Copy, Debug)]
pub struct StepReport {
    /// Outcome
    pub outcome: StepOutcome,

    /// Number of iterations performed
    pub iterations: usize,

    /// Largest absolute component of the right-hand side vector at the last iteration
    pub larg_fb: f64,
}

/// Defines the final status of a simulation
#[derive(Clone, Debug, PartialEq)]
pub enum RunStatus {
    /// All stages have been completed
    Completed,

    /// A time step could not be completed
    StepFailed {
        /// Time at the end of the failed step
        t: f64,

        /// Number of iterations of the failed step
        iterations: usize,

        /// Reason of the failure
        reason: String,
    },
}

/// Implements the Newton-Raphson solver with Lagrange multipliers
///
/// ```text
/// ┌       ┐ ┌    ┐   ┌    ┐
/// │ K  Aᵀ │ │ δy │   │ fb │
/// │       │ │    │ = │    │
/// │ A  0  │ │ δλ │   │ fc │
/// └       ┘ └    ┘   └    ┘
/// ```
pub struct Solver {
    /// Linear solver
    pub linear: Box<dyn LinearSolver>,

    /// Output files
    pub file_io: FileIo,

    /// Summary of the simulation
    pub summary: Summary,

    /// Augmented right-hand side vector (ny + nlam)
    fb: Vector,

    /// Augmented increment vector (ny + nlam)
    mdu: Vector,

    /// Tangent contributions of the local elements (distributed runs)
    triplets: Triplets,
}

/// Agrees on the failure of an operation that may have failed on some ranks only
fn agree_failure(domain: &Domain, local: Result<(), StrError>) -> Result<Option<StrError>, StrError> {
    let any_failed = domain.comm.any_stop(local.is_err())?;
    match local {
        Err(e) => Ok(Some(e)),
        Ok(()) if any_failed => Ok(Some("another rank has failed")),
        Ok(()) => Ok(None),
    }
}

impl Solver {
    /// Allocates a new instance
    pub fn new(domain: &Domain) -> Result<Self, StrError> {
        let config = &domain.config;
        if let Some(msg) = config.validate() {
            println!("ERROR: {}", msg);
            return Err("cannot allocate solver because config.validate() failed");
        }
        let file_io = if config.write_files {
            FileIo::new_enabled(&config.filename_stem, Some(&config.out_dir), domain.comm.rank())?
        } else {
            FileIo::new()
        };
        Ok(Solver {
            linear: Box::new(SparseSolver::new(config.lin_sol)),
            file_io,
            summary: Summary::new(domain.comm.size()),
            fb: Vector::new(0),
            mdu: Vector::new(0),
            triplets: Triplets::new(),
        })
    }

    /// Allocates the vectors and the linear solver for the current stage of a domain
    pub fn initialize_stage(&mut self, domain: &Domain) -> Result<(), StrError> {
        let nyb = domain.nyb();
        self.fb = Vector::new(nyb);
        self.mdu = Vector::new(nyb);
        let symmetric = domain.config.symmetric && domain.symmetric;
        self.linear.initialize(nyb, domain.nnz_total(), symmetric)
    }

    /// Returns the augmented right-hand side vector of the last iteration
    pub fn rhs(&self) -> &Vector {
        &self.fb
    }

    /// Performs the iterations of a time step from t - Δt to t
    ///
    /// Hard errors (returned as `Err`) are those that prevent any retry, such as a broken
    /// communication channel; numerical failures are reported with [StepOutcome::Failed].
    pub fn run_iterations(&mut self, domain: &mut Domain, t: f64, dt: f64) -> Result<StepReport, StrError> {
        let config = domain.config.clone();
        let ny = domain.info.ny;
        let nlam = domain.info.nlam;
        if self.fb.dim() != ny + nlam {
            return Err("solver must be initialized for the current stage");
        }
        let distributed = domain.comm.distributed();
        let verbose = domain.comm.root();

        // predictor
        domain.sol.t = t;
        domain.sol.dt = dt;
        if domain.sol.steady {
            domain.sol.dc.reset();
        } else {
            domain.sol.dc.calc_both(dt)?;
        }
        domain.sol.delta_y.fill(0.0);
        let local = domain.compute_star_vars();
        if let Some(reason) = agree_failure(domain, local)? {
            return Ok(StepReport {
                outcome: StepOutcome::Failed(reason),
                iterations: 0,
                larg_fb: 0.0,
            });
        }

        let mut larg_fb = 0.0;
        let mut larg_fb0 = 0.0;
        let mut larg_fb_prev = 0.0;
        let mut ldu = 0.0;
        let report = |outcome: StepOutcome, iterations: usize, larg_fb: f64| StepReport {
            outcome,
            iterations,
            larg_fb,
        };
        for it in 0..config.n_max_iterations {
            // right-hand side
            self.fb.fill(0.0);
            let local = domain.add_elements_to_rhs(&mut self.fb);
            if let Some(reason) = agree_failure(domain, local)? {
                return Ok(report(StepOutcome::Failed(reason), it, larg_fb));
            }
            if distributed {
                domain.comm.all_reduce_sum(&mut self.fb.as_mut_data()[..ny])?;
            }
            domain.point_loads.add_to_rhs(&mut self.fb, &domain.sol);
            domain.essential.add_to_rhs(&mut self.fb, &domain.sol);

            // check convergence on the residual
            larg_fb = vec_norm(&self.fb, Norm::Max);
            if it == 0 {
                larg_fb0 = larg_fb;
            }
            if verbose {
                config.print_iteration(it, larg_fb, larg_fb0, larg_fb_prev, ldu);
            }
            if !larg_fb.is_finite() {
                return Ok(report(StepOutcome::Failed("found NaN or Inf in the residual"), it, larg_fb));
            }
            if larg_fb < config.tol_fb_min || (it > 0 && larg_fb < config.tol_fb * larg_fb0) {
                return Ok(report(StepOutcome::Converged, it, larg_fb));
            }
            if config.divergence_control && it > 1 && larg_fb > larg_fb_prev {
                return Ok(report(StepOutcome::Diverged, it, larg_fb));
            }
            larg_fb_prev = larg_fb;

            // tangent
            if it == 0 || !config.constant_tangent {
                self.linear.reset_matrix()?;
                let local = if distributed {
                    self.triplets.clear();
                    domain.add_elements_to_kb(&mut self.triplets, it == 0)
                } else {
                    domain.add_elements_to_kb(self.linear.sink()?, it == 0)
                };
                if let Some(reason) = agree_failure(domain, local)? {
                    return Ok(report(StepOutcome::Failed(reason), it, larg_fb));
                }
                if distributed {
                    let all = domain.comm.all_gather(&self.triplets.to_flat())?;
                    Triplets::put_flat(self.linear.sink()?, &all)?;
                }
                domain.essential.put_into_kb(self.linear.sink()?)?;
                if let Err(reason) = self.linear.factorize() {
                    return Ok(report(StepOutcome::Failed(reason), it, larg_fb));
                }
            }

            // increment
            if let Err(reason) = self.linear.solve(&mut self.mdu, &self.fb) {
                return Ok(report(StepOutcome::Failed(reason), it, larg_fb));
            }
            {
                let sol = &mut domain.sol;
                for i in 0..ny {
                    sol.y[i] += self.mdu[i];
                    sol.delta_y[i] += self.mdu[i];
                }
                for i in 0..nlam {
                    sol.lambda[i] += self.mdu[ny + i];
                }
            }
            domain.update_derivatives();

            // internal values
            if it == 0 {
                domain.backup_ivs();
            } else {
                domain.restore_ivs();
            }
            let local = domain.update_elements();
            if let Some(reason) = agree_failure(domain, local)? {
                return Ok(report(StepOutcome::Failed(reason), it + 1, larg_fb));
            }

            // check convergence on the increment
            let mut sum = 0.0;
            for i in 0..ny {
                let scaled = self.mdu[i] / (config.atol + config.rtol * f64::abs(domain.sol.y[i]));
                sum += scaled * scaled;
            }
            ldu = if ny > 0 { f64::sqrt(sum / (ny as f64)) } else { 0.0 };
            if ldu < config.itol() {
                if verbose {
                    config.print_iteration(it + 1, larg_fb, larg_fb0, larg_fb_prev, ldu);
                }
                return Ok(report(StepOutcome::Converged, it + 1, larg_fb));
            }
        }
        Ok(report(StepOutcome::MaxIterations, config.n_max_iterations, larg_fb))
    }

    /// Runs all stages
    ///
    /// Each stage goes from the current time to `control.tf` (absolute time).
    pub fn run(&mut self, domain: &mut Domain, stages: &[Stage]) -> Result<RunStatus, StrError> {
        let config = domain.config.clone();
        let root = domain.comm.root();
        let verbose = root && (config.verbose_timesteps || config.verbose_iterations);
        if root {
            config.print_header();
        }
        let mut timestep = 0;
        for (index, stage) in stages.iter().enumerate() {
            // stage set up
            let info = domain.set_stage(index, stage)?;
            self.summary.stages.push(info);
            self.summary.push_log(
                format!(
                    "stage {} ({}): ny = {}, nlam = {}, nnz_kb = {}, nnz_a = {}, nt1eqs = {}, nt2eqs = {}",
                    index, stage.desc, info.ny, info.nlam, info.nnz_kb, info.nnz_a, info.nt1eqs, info.nt2eqs
                ),
                verbose,
            );
            self.initialize_stage(domain)?;
            self.file_io.write_equations(domain)?;
            self.summary.stage_starts.push(self.summary.output_indices.len());
            self.output(domain)?;

            // time loop
            let control = &stage.control;
            let mut t_out = domain.sol.t + control.dt_out.eval(domain.sol.t);
            let mut dt_retry: Option<f64> = None;
            let mut n_divergence = 0;
            while domain.sol.t < control.tf {
                let t0 = domain.sol.t;
                let mut dt = match dt_retry {
                    Some(dt) => dt,
                    None => control.dt.eval(t0),
                };
                let last = t0 + dt >= control.tf - config.dt_min;
                if last {
                    dt = control.tf - t0;
                }
                if dt < config.dt_min {
                    return Err("Δt is smaller than the allowed minimum");
                }
                let t = if last { control.tf } else { t0 + dt };
                if root {
                    config.print_timestep(timestep, t, dt);
                }
                timestep += 1;

                // checkpoint
                let backup = domain.sol.backup();
                domain.backup_ivs();

                // iterations
                let report = self.run_iterations(domain, t, dt)?;
                self.summary.steps.push(StepRecord {
                    stage: index,
                    t,
                    dt,
                    iterations: report.iterations,
                    larg_fb: report.larg_fb,
                    outcome: report.outcome.as_str().to_string(),
                });
                if report.outcome == StepOutcome::Converged {
                    dt_retry = None;
                    n_divergence = 0;
                    if domain.sol.t >= t_out || last {
                        self.output(domain)?;
                        t_out += control.dt_out.eval(domain.sol.t);
                    }
                    continue;
                }

                // restore the checkpoint
                domain.sol.restore(&backup);
                domain.restore_ivs();
                if let StepOutcome::Failed(reason) = report.outcome {
                    if !config.divergence_control {
                        let message = format!(
                            "step failed at t = {:?} after {} iterations: {}",
                            t, report.iterations, reason
                        );
                        self.summary.push_log(message, verbose);
                        self.finish(root)?;
                        return Err(reason);
                    }
                }
                if config.divergence_control && n_divergence < config.n_max_divergence {
                    n_divergence += 1;
                    dt_retry = Some(dt / 2.0);
                    self.summary.push_log(
                        format!(
                            "step {} at t = {:?}; retrying with Δt = {:?}",
                            report.outcome.as_str(),
                            t,
                            dt / 2.0
                        ),
                        verbose,
                    );
                    continue;
                }
                let reason = match report.outcome {
                    StepOutcome::Failed(reason) => reason.to_string(),
                    StepOutcome::Diverged if config.divergence_control => {
                        "the maximum number of consecutive divergences has been reached".to_string()
                    }
                    _ => format!("step {}", report.outcome.as_str()),
                };
                self.summary.push_log(
                    format!("step failed at t = {:?} after {} iterations: {}", t, report.iterations, reason),
                    verbose,
                );
                self.finish(root)?;
                return Ok(RunStatus::StepFailed {
                    t,
                    iterations: report.iterations,
                    reason,
                });
            }
        }
        self.finish(root)?;
        Ok(RunStatus::Completed)
    }

    /// Writes the state of a domain and records the output
    fn output(&mut self, domain: &mut Domain) -> Result<(), StrError> {
        if let Some(index) = self.file_io.write_state(domain)? {
            self.summary.output_indices.push(index);
            self.summary.output_times.push(domain.sol.t);
        }
        Ok(())
    }

    /// Releases the linear solver and writes the summary (root rank only)
    fn finish(&mut self, root: bool) -> Result<(), StrError> {
        self.linear.cleanup();
        if root && self.file_io.enabled() {
            self.summary.write_json(&self.file_io.path_summary())?;
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{RunStatus, Solver, StepOutcome};
    use crate::base::{Config, Dof, ElementData, EssentialKey, FnTime, Pbc, SampleMeshes, SimInput, Stage};
    use crate::fem::{Domain, ElementRegistry, ParamRod, SerialComm};
    use russell_lab::approx_eq;

    fn rod_problem(config: Config) -> (SimInput, Stage) {
        let mut stage = Stage::new("loading");
        stage
            .essential_at(&[0], EssentialKey::Dof(Dof::Ux), FnTime::Zero)
            .essential_at(&[0, 1], EssentialKey::Dof(Dof::Uy), FnTime::Zero)
            .load_at(&[1], Pbc::Fx, FnTime::Linear { a: 0.0, b: 10.0 })
            .set_control(1.0, FnTime::Constant(0.5), FnTime::Constant(0.5));
        let input = SimInput {
            desc: "rod".to_string(),
            mesh: SampleMeshes::one_rod(2.0),
            elements: vec![(1, ElementData::new("rod", &ParamRod::sample()).unwrap())],
            config,
            stages: vec![stage.clone()],
            partition: None,
        };
        (input, stage)
    }

    #[test]
    fn step_outcome_as_str_works() {
        assert_eq!(StepOutcome::Converged.as_str(), "converged");
        assert_eq!(StepOutcome::Diverged.as_str(), "diverged");
        assert_eq!(StepOutcome::MaxIterations.as_str(), "max-iterations");
        assert_eq!(StepOutcome::Failed("x").as_str(), "failed");
    }

    #[test]
    fn run_iterations_captures_errors() {
        let (input, stage) = rod_problem(Config::new());
        let mut domain = Domain::new(&input, ElementRegistry::with_defaults(), Box::new(SerialComm::new())).unwrap();
        domain.set_stage(0, &stage).unwrap();
        let mut solver = Solver::new(&domain).unwrap();
        assert_eq!(
            solver.run_iterations(&mut domain, 1.0, 1.0).err(),
            Some("solver must be initialized for the current stage")
        );
    }

    #[test]
    fn run_iterations_works_for_linear_rod() {
        let (input, stage) = rod_problem(Config::new());
        let mut domain = Domain::new(&input, ElementRegistry::with_defaults(), Box::new(SerialComm::new())).unwrap();
        domain.set_stage(0, &stage).unwrap();
        let mut solver = Solver::new(&domain).unwrap();
        solver.initialize_stage(&domain).unwrap();
        let report = solver.run_iterations(&mut domain, 1.0, 1.0).unwrap();
        assert_eq!(report.outcome, StepOutcome::Converged);
        assert!(report.iterations <= 2);
        // u = F L / (E A) = 10 · 2 / (1000 · 1)
        let eq = domain.eq(1, Dof::Ux).unwrap();
        approx_eq(domain.sol.y[eq], 0.02, 1e-13);
        // reaction
        assert_eq!(domain.sol.lambda.dim(), 3);
        approx_eq(domain.sol.lambda[0], 10.0, 1e-10);
    }

    #[test]
    fn run_works_for_linear_rod() {
        let (input, _) = rod_problem(Config::new());
        let mut domain = Domain::new(&input, ElementRegistry::with_defaults(), Box::new(SerialComm::new())).unwrap();
        let mut solver = Solver::new(&domain).unwrap();
        let status = solver.run(&mut domain, &input.stages).unwrap();
        assert_eq!(status, RunStatus::Completed);
        assert_eq!(solver.summary.n_converged(), 2);
        assert_eq!(solver.summary.stages[0].ny, 4);
        assert_eq!(domain.sol.t, 1.0);
        let eq = domain.eq(1, Dof::Ux).unwrap();
        approx_eq(domain.sol.y[eq], 0.02, 1e-13);
    }

    #[test]
    fn run_reports_max_iterations() {
        let mut config = Config::new();
        config.set_n_max_iterations(1).unwrap();
        let (input, _) = rod_problem(config);
        let mut domain = Domain::new(&input, ElementRegistry::with_defaults(), Box::new(SerialComm::new())).unwrap();
        let mut solver = Solver::new(&domain).unwrap();
        let status = solver.run(&mut domain, &input.stages).unwrap();
        match status {
            RunStatus::StepFailed { t, iterations, reason } => {
                assert_eq!(t, 0.5);
                assert_eq!(iterations, 1);
                assert_eq!(reason, "step max-iterations");
            }
            _ => panic!("max iterations should have been reached"),
        }
        // the checkpoint has been restored
        assert_eq!(domain.sol.t, 0.0);
    }
}
