use pmfem::base::SampleMeshes;
use pmfem::fem::ParamRod;
use pmfem::prelude::*;
use pmfem::StrError;
use russell_lab::approx_eq;

// A rod fixed at the left end and pulled at the right end
//
//  0-----[0](1)-----1  → F
//  0.0              L
//
// u = F L / (E A)
#[test]
fn test_rod_tension() -> Result<(), StrError> {
    // mesh and parameters
    let length = 3.0;
    let mesh = SampleMeshes::one_rod(length);
    let param = ParamRod {
        young: 200.0,
        area: 0.5,
        density: 0.0,
    };

    // stage
    let force = 25.0;
    let mut stage = Stage::new("tension");
    stage
        .essential_at(&[0], EssentialKey::Dof(Dof::Ux), FnTime::Zero)
        .essential_at(&[0, 1], EssentialKey::Dof(Dof::Uy), FnTime::Zero)
        .load_at(&[1], Pbc::Fx, FnTime::Linear { a: 0.0, b: force })
        .set_control(1.0, FnTime::Constant(0.25), FnTime::Constant(0.25));

    // input
    let input = SimInput {
        desc: "rod tension".to_string(),
        mesh,
        elements: vec![(1, ElementData::new("rod", &param)?)],
        config: Config::new(),
        stages: vec![stage],
        partition: None,
    };

    // run
    let mut domain = Domain::new(&input, ElementRegistry::with_defaults(), Box::new(SerialComm::new()))?;
    let mut solver = Solver::new(&domain)?;
    let status = solver.run(&mut domain, &input.stages)?;
    assert_eq!(status, RunStatus::Completed);
    assert_eq!(solver.summary.n_converged(), 4);

    // check
    let u = force * length / (param.young * param.area);
    approx_eq(domain.sol.y[domain.eq(1, Dof::Ux)?], u, 1e-13);
    approx_eq(domain.sol.y[domain.eq(1, Dof::Uy)?], 0.0, 1e-15);
    let ivs = domain.encode_ivs()?;
    let sig = ivs.get(&0).unwrap()["sig"].as_f64().unwrap();
    approx_eq(sig, force / param.area, 1e-11);

    // reactions (Lagrange multipliers) balance the load
    approx_eq(domain.sol.lambda[0], force, 1e-11);
    Ok(())
}
