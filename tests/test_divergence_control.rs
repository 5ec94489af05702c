use pmfem::base::SampleMeshes;
use pmfem::fem::{find_eq, CellInput, ElementInfo, ElementTrait, IpOutput, Solution, TangentSink};
use pmfem::prelude::*;
use pmfem::StrError;
use russell_lab::{approx_eq, Vector};

/// A linear spring along x that misbehaves with time increments larger than 0.3
///
/// The "fragile" variant fails right away. The "growing" variant adds a spurious
/// force that grows tenfold at each iteration, so the residual increases.
struct TroubledSpring {
    k: f64,
    eqs: Vec<usize>,
    growing: bool,
    count: i32,
}

impl TroubledSpring {
    fn info(input: &CellInput) -> Result<ElementInfo, StrError> {
        Ok(ElementInfo::new(input.cell.points.len(), &[Dof::Ux, Dof::Uy], &[], &[]))
    }

    fn allocate(data: &ElementData, growing: bool) -> Result<Box<dyn ElementTrait>, StrError> {
        let k: f64 = data.params()?;
        Ok(Box::new(TroubledSpring {
            k,
            eqs: Vec::new(),
            growing,
            count: 0,
        }))
    }

    fn allocate_fragile(_input: &CellInput, data: &ElementData) -> Result<Box<dyn ElementTrait>, StrError> {
        TroubledSpring::allocate(data, false)
    }

    fn allocate_growing(_input: &CellInput, data: &ElementData) -> Result<Box<dyn ElementTrait>, StrError> {
        TroubledSpring::allocate(data, true)
    }
}

impl ElementTrait for TroubledSpring {
    fn set_equations(&mut self, eqs: &[Vec<(Dof, usize)>]) -> Result<(), StrError> {
        self.eqs = vec![find_eq(&eqs[0], Dof::Ux)?, find_eq(&eqs[1], Dof::Ux)?];
        Ok(())
    }
    fn set_ele_cond(&mut self, _cond: EleCond, _f: &FnTime) -> Result<(), StrError> {
        Err("not available")
    }
    fn set_nat_bc(&mut self, _nbc: Nbc, _face: usize, _f: &FnTime) -> Result<(), StrError> {
        Err("not available")
    }
    fn clear_conditions(&mut self) {}
    fn interp_star_vars(&mut self, _sol: &Solution) -> Result<(), StrError> {
        self.count = 0; // new step
        Ok(())
    }
    fn add_to_rhs(&mut self, fb: &mut Vector, sol: &Solution) -> Result<(), StrError> {
        let f = self.k * (sol.y[self.eqs[1]] - sol.y[self.eqs[0]]);
        fb[self.eqs[0]] += f;
        fb[self.eqs[1]] -= f;
        if sol.dt > 0.3 {
            if !self.growing {
                return Err("time increment is too large for the fragile spring");
            }
            fb[self.eqs[1]] += f64::powi(10.0, self.count);
            self.count += 1;
        }
        Ok(())
    }
    fn add_to_kb(&mut self, kb: &mut dyn TangentSink, _sol: &Solution, _first: bool) -> Result<(), StrError> {
        let (a, b) = (self.eqs[0], self.eqs[1]);
        kb.put(a, a, self.k)?;
        kb.put(a, b, -self.k)?;
        kb.put(b, a, -self.k)?;
        kb.put(b, b, self.k)
    }
    fn update(&mut self, _sol: &Solution) -> Result<(), StrError> {
        Ok(())
    }
    fn symmetric_jacobian(&self) -> bool {
        true
    }
    fn out_ips_data(&self, _sol: &Solution) -> Vec<IpOutput> {
        Vec::new()
    }
}

fn spring_input(kind: &str, divergence_control: bool) -> Result<SimInput, StrError> {
    let mut stage = Stage::new("pull");
    stage
        .essential_at(&[0], EssentialKey::Dof(Dof::Ux), FnTime::Zero)
        .essential_at(&[0, 1], EssentialKey::Dof(Dof::Uy), FnTime::Zero)
        .load_at(&[1], Pbc::Fx, FnTime::Linear { a: 0.0, b: 4.0 })
        .set_control(1.0, FnTime::Constant(0.5), FnTime::Constant(0.5));
    let mut config = Config::new();
    config.set_divergence_control(divergence_control, 3);
    Ok(SimInput {
        desc: "troubled spring".to_string(),
        mesh: SampleMeshes::one_rod(1.0),
        elements: vec![(1, ElementData::new(kind, &2.0)?)],
        config,
        stages: vec![stage],
        partition: None,
    })
}

fn registry() -> ElementRegistry {
    let mut registry = ElementRegistry::with_defaults();
    registry
        .register("fragile-spring", TroubledSpring::info, TroubledSpring::allocate_fragile)
        .register("growing-spring", TroubledSpring::info, TroubledSpring::allocate_growing);
    registry
}

#[test]
fn test_divergence_control_retries_with_smaller_steps() -> Result<(), StrError> {
    let input = spring_input("fragile-spring", true)?;
    let mut domain = Domain::new(&input, registry(), Box::new(SerialComm::new()))?;
    let mut solver = Solver::new(&domain)?;
    assert_eq!(solver.run(&mut domain, &input.stages)?, RunStatus::Completed);

    // every step with Δt = 0.5 fails and is retried with Δt = 0.25
    let outcomes: Vec<_> = solver.summary.steps.iter().map(|s| s.outcome.as_str()).collect();
    assert_eq!(
        outcomes,
        &["failed", "converged", "failed", "converged", "failed", "converged", "converged"]
    );
    let times: Vec<_> = solver.summary.steps.iter().map(|s| s.t).collect();
    assert_eq!(times, &[0.5, 0.25, 0.75, 0.5, 1.0, 0.75, 1.0]);

    // u = F / k
    approx_eq(domain.sol.y[domain.eq(1, Dof::Ux)?], 4.0 / 2.0, 1e-14);
    assert_eq!(domain.sol.t, 1.0);
    Ok(())
}

// With Δt = 0.5 (t = 0.5, F = 2, k = 2), the residual at the free equation is:
//
// it = 0: F + 1 = 3
// it = 1: F - k u + 10 = 2 - 3 + 10 = 9
// it = 2: F - k u + 100 = 2 - 12 + 100 = 90 > 9 ⇒ diverged
#[test]
fn test_divergence_control_catches_growing_residuals() -> Result<(), StrError> {
    let input = spring_input("growing-spring", true)?;
    let mut domain = Domain::new(&input, registry(), Box::new(SerialComm::new()))?;
    let mut solver = Solver::new(&domain)?;
    assert_eq!(solver.run(&mut domain, &input.stages)?, RunStatus::Completed);

    // every step with Δt = 0.5 diverges and is retried with Δt = 0.25
    let outcomes: Vec<_> = solver.summary.steps.iter().map(|s| s.outcome.as_str()).collect();
    assert_eq!(
        outcomes,
        &["diverged", "converged", "diverged", "converged", "diverged", "converged", "converged"]
    );
    let times: Vec<_> = solver.summary.steps.iter().map(|s| s.t).collect();
    assert_eq!(times, &[0.5, 0.25, 0.75, 0.5, 1.0, 0.75, 1.0]);
    let dts: Vec<_> = solver.summary.steps.iter().map(|s| s.dt).collect();
    assert_eq!(dts, &[0.5, 0.25, 0.5, 0.25, 0.5, 0.25, 0.25]);
    let first = &solver.summary.steps[0];
    assert_eq!(first.iterations, 2);
    approx_eq(first.larg_fb, 90.0, 1e-12);
    assert!(solver.summary.log[1].starts_with("step diverged at t = 0.5"));

    // the diverged steps have been discarded
    approx_eq(domain.sol.y[domain.eq(1, Dof::Ux)?], 4.0 / 2.0, 1e-14);
    Ok(())
}

#[test]
fn test_divergence_control_disabled_makes_failures_fatal() -> Result<(), StrError> {
    let input = spring_input("fragile-spring", false)?;
    let mut domain = Domain::new(&input, registry(), Box::new(SerialComm::new()))?;
    let mut solver = Solver::new(&domain)?;
    assert_eq!(
        solver.run(&mut domain, &input.stages).err(),
        Some("time increment is too large for the fragile spring")
    );
    assert_eq!(
        solver.summary.log.last().map(|s| s.as_str()),
        Some("step failed at t = 0.5 after 0 iterations: time increment is too large for the fragile spring")
    );
    Ok(())
}

#[test]
fn test_divergence_control_gives_up() -> Result<(), StrError> {
    let mut input = spring_input("fragile-spring", true)?;
    input.config.set_divergence_control(true, 1);
    input.stages[0].set_control(1.0, FnTime::Constant(1.0), FnTime::Constant(1.0));
    let mut domain = Domain::new(&input, registry(), Box::new(SerialComm::new()))?;
    let mut solver = Solver::new(&domain)?;
    let status = solver.run(&mut domain, &input.stages)?;
    assert_eq!(
        status,
        RunStatus::StepFailed {
            t: 0.5,
            iterations: 0,
            reason: "time increment is too large for the fragile spring".to_string(),
        }
    );
    assert_eq!(solver.summary.log.len(), 3); // stage, one retry, failure
    assert_eq!(
        solver.summary.log[2],
        "step failed at t = 0.5 after 0 iterations: time increment is too large for the fragile spring"
    );
    Ok(())
}

#[test]
fn test_divergence_control_gives_up_on_growing_residuals() -> Result<(), StrError> {
    let mut input = spring_input("growing-spring", true)?;
    input.config.set_divergence_control(true, 1);
    input.stages[0].set_control(1.0, FnTime::Constant(1.0), FnTime::Constant(1.0));
    let mut domain = Domain::new(&input, registry(), Box::new(SerialComm::new()))?;
    let mut solver = Solver::new(&domain)?;
    let status = solver.run(&mut domain, &input.stages)?;
    assert_eq!(
        status,
        RunStatus::StepFailed {
            t: 0.5,
            iterations: 2,
            reason: "the maximum number of consecutive divergences has been reached".to_string(),
        }
    );
    assert_eq!(domain.sol.t, 0.0);
    Ok(())
}
