use gemlab::mesh::CellId;
use pmfem::base::SampleMeshes;
use pmfem::fem::{state_path, EquationsFile, ParamRod, StateFile, StepRecord, Summary};
use pmfem::prelude::*;
use pmfem::StrError;
use russell_lab::{approx_eq, Vector};
use serde_json::Value;
use std::collections::HashMap;
use std::thread;

fn rod_input(stage: Stage, config: Config) -> Result<SimInput, StrError> {
    let param = ParamRod {
        young: 200.0,
        area: 0.5,
        density: 0.0,
    };
    Ok(SimInput {
        desc: "persistence".to_string(),
        mesh: SampleMeshes::one_rod(3.0),
        elements: vec![(1, ElementData::new("rod", &param)?)],
        config,
        stages: vec![stage],
        partition: None,
    })
}

#[test]
fn test_persistence_writes_and_imports_states() -> Result<(), StrError> {
    // first simulation: pull the rod and write the results
    let out_dir = format!("{}/persistence", DEFAULT_TEST_DIR);
    let mut stage = Stage::new("pull");
    stage
        .essential_at(&[0], EssentialKey::Dof(Dof::Ux), FnTime::Zero)
        .essential_at(&[0, 1], EssentialKey::Dof(Dof::Uy), FnTime::Zero)
        .load_at(&[1], Pbc::Fx, FnTime::Linear { a: 0.0, b: 25.0 })
        .set_control(1.0, FnTime::Constant(0.25), FnTime::Constant(0.25));
    let mut config = Config::new();
    config.set_output("persistence", Some(out_dir.as_str()));
    let input = rod_input(stage.clone(), config)?;

    // run
    let mut domain = Domain::new(&input, ElementRegistry::with_defaults(), Box::new(SerialComm::new()))?;
    let mut solver = Solver::new(&domain)?;
    assert_eq!(solver.run(&mut domain, &input.stages)?, RunStatus::Completed);

    // check the summary
    let summary = Summary::read_json(&solver.file_io.path_summary())?;
    assert_eq!(summary.nrank, 1);
    assert_eq!(summary.output_indices, &[0, 1, 2, 3, 4]);
    assert_eq!(summary.output_times, &[0.0, 0.25, 0.5, 0.75, 1.0]);
    assert_eq!(summary.stage_starts, &[0]);
    assert_eq!(summary.stages[0].ny, 4);
    assert_eq!(summary.n_converged(), 4);

    // check the equations file
    let equations = EquationsFile::read_json(&solver.file_io.path_equations(0))?;
    assert_eq!(equations.info.ny, 4);
    assert_eq!(equations.nodes.len(), 2);
    assert_eq!(equations.y_to_f.len(), 2);

    // the last state matches the domain exactly
    let last = summary.output_indices[4];
    let state = solver.file_io.read_state(last)?;
    assert_eq!(state.t, 1.0);
    assert_eq!(state.y.as_data(), domain.sol.y.as_data());
    assert_eq!(state.lambda.as_data(), domain.sol.lambda.as_data());
    assert_eq!(state.ivs, domain.encode_ivs()?);
    assert_eq!(state.ips.get(&0).map(|ips| ips.len()), Some(1));

    // the first state is the initial one
    let first = StateFile::read_json(&solver.file_io.path_state(0))?;
    assert_eq!(first.t, 0.0);
    assert_eq!(first.y.as_data(), &[0.0, 0.0, 0.0, 0.0]);

    // second simulation: continue from the last state holding the load
    let mut stage = Stage::new("hold");
    stage
        .essential_at(&[0], EssentialKey::Dof(Dof::Ux), FnTime::Zero)
        .essential_at(&[0, 1], EssentialKey::Dof(Dof::Uy), FnTime::Zero)
        .load_at(&[1], Pbc::Fx, FnTime::Constant(25.0))
        .set_control(1.5, FnTime::Constant(0.25), FnTime::Constant(0.25));
    stage.set_import(&out_dir, "persistence", last);
    let input = rod_input(stage, Config::new())?;
    let mut imported = Domain::new(&input, ElementRegistry::with_defaults(), Box::new(SerialComm::new()))?;
    let mut solver = Solver::new(&imported)?;
    assert_eq!(solver.run(&mut imported, &input.stages)?, RunStatus::Completed);

    // the imported state is already in equilibrium
    assert_eq!(solver.summary.steps.len(), 2);
    assert_eq!(solver.summary.steps[0].t, 1.25);
    assert!(solver.summary.steps[0].iterations <= 1);
    approx_eq(imported.sol.y[imported.eq(1, Dof::Ux)?], 25.0 * 3.0 / (200.0 * 0.5), 1e-13);
    let ivs = imported.encode_ivs()?;
    approx_eq(ivs.get(&0).unwrap()["sig"].as_f64().unwrap(), 50.0, 1e-11);
    Ok(())
}

#[test]
fn test_persistence_captures_import_errors() -> Result<(), StrError> {
    let mut stage = Stage::new("import");
    stage
        .essential_at(&[0], EssentialKey::Dof(Dof::Ux), FnTime::Zero)
        .set_control(1.0, FnTime::Constant(1.0), FnTime::Constant(1.0))
        .set_import("/tmp/pmfem", "__does_not_exist__", 0);
    let input = rod_input(stage.clone(), Config::new())?;
    let mut domain = Domain::new(&input, ElementRegistry::with_defaults(), Box::new(SerialComm::new()))?;
    assert_eq!(domain.set_stage(0, &stage).err(), Some("cannot open file"));

    // a valid state of the same problem
    let mut other = Domain::new(&input, ElementRegistry::with_defaults(), Box::new(SerialComm::new()))?;
    let mut plain = Stage::new("plain");
    plain.essential_at(&[0], EssentialKey::Dof(Dof::Ux), FnTime::Zero);
    other.set_stage(0, &plain)?;

    // state with the wrong number of equations
    let mut state = StateFile::new(&mut other)?;
    state.y = Vector::new(7);
    state.write_json(&state_path(DEFAULT_TEST_DIR, "persistence_wrong_size", 0, 0))?;
    stage.set_import(DEFAULT_TEST_DIR, "persistence_wrong_size", 0);
    let mut domain = Domain::new(&input, ElementRegistry::with_defaults(), Box::new(SerialComm::new()))?;
    assert_eq!(
        domain.set_stage(0, &stage).err(),
        Some("imported state does not match the number of equations")
    );

    // state without the internal values of the rod
    let mut state = StateFile::new(&mut other)?;
    state.ivs.clear();
    state.write_json(&state_path(DEFAULT_TEST_DIR, "persistence_missing_ivs", 0, 0))?;
    stage.set_import(DEFAULT_TEST_DIR, "persistence_missing_ivs", 0);
    let mut domain = Domain::new(&input, ElementRegistry::with_defaults(), Box::new(SerialComm::new()))?;
    assert_eq!(
        domain.set_stage(0, &stage).err(),
        Some("cannot find the internal values of a local element in the imported state")
    );
    Ok(())
}

// A column of four rods pulled at the top, run by two ranks that save their states;
// a second pair of ranks continues from the saved states
fn column_input(stage: Stage, config: Config) -> Result<SimInput, StrError> {
    Ok(SimInput {
        desc: "column".to_string(),
        mesh: SampleMeshes::column(4, 4.0),
        elements: vec![(1, ElementData::new("rod", &ParamRod::sample())?)],
        config,
        stages: vec![stage],
        partition: None,
    })
}

fn column_stage(desc: &str, tf: f64, load: FnTime) -> Stage {
    let mut stage = Stage::new(desc);
    stage
        .essential_at(&[0, 1, 2, 3, 4], EssentialKey::Dof(Dof::Ux), FnTime::Zero)
        .essential_at(&[0], EssentialKey::Dof(Dof::Uy), FnTime::Zero)
        .load_at(&[4], Pbc::Fy, load)
        .set_control(tf, FnTime::Constant(0.5), FnTime::Constant(0.5));
    stage
}

fn run_threads(input: &SimInput) -> Result<Vec<(RunStatus, Vec<StepRecord>, HashMap<CellId, Value>)>, StrError> {
    let handles: Vec<_> = ThreadComm::group(2)?
        .into_iter()
        .map(|comm| {
            let input = input.clone();
            thread::spawn(move || -> Result<_, StrError> {
                let mut domain = Domain::new(&input, ElementRegistry::with_defaults(), Box::new(comm))?;
                let mut solver = Solver::new(&domain)?;
                let status = solver.run(&mut domain, &input.stages)?;
                Ok((status, solver.summary.steps.clone(), domain.encode_ivs()?))
            })
        })
        .collect();
    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.join().map_err(|_| "a rank has panicked")??);
    }
    Ok(results)
}

#[test]
fn test_persistence_distributed_import() -> Result<(), StrError> {
    // save with two ranks
    let out_dir = format!("{}/persistence_threads", DEFAULT_TEST_DIR);
    let mut config = Config::new();
    config.set_output("column", Some(out_dir.as_str()));
    let input = column_input(column_stage("pull", 1.0, FnTime::Linear { a: 0.0, b: 8.0 }), config)?;
    let results = run_threads(&input)?;
    let mut saved = HashMap::new();
    for (status, _, ivs) in results {
        assert_eq!(status, RunStatus::Completed);
        saved.extend(ivs);
    }
    assert_eq!(saved.len(), 4);

    // each rank wrote its own files with its own cells
    let last = 2; // t = 0, 0.5, 1.0
    let state0 = StateFile::read_json(&state_path(&out_dir, "column", 0, last))?;
    let state1 = StateFile::read_json(&state_path(&out_dir, "column", 1, last))?;
    let mut cells0: Vec<_> = state0.ivs.keys().copied().collect();
    let mut cells1: Vec<_> = state1.ivs.keys().copied().collect();
    cells0.sort();
    cells1.sort();
    assert_eq!(cells0, &[0, 2]);
    assert_eq!(cells1, &[1, 3]);

    // continue with two ranks holding the load
    let mut stage = column_stage("hold", 1.5, FnTime::Constant(8.0));
    stage.set_import(&out_dir, "column", last);
    let input = column_input(stage, Config::new())?;
    let results = run_threads(&input)?;
    let mut continued = HashMap::new();
    for (status, steps, ivs) in results {
        assert_eq!(status, RunStatus::Completed);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].t, 1.5);
        assert!(steps[0].iterations <= 1);
        continued.extend(ivs);
    }

    // every element resumes from its saved stress (σ = F / A)
    assert_eq!(continued.len(), 4);
    for cell_id in 0..4 {
        let sig_saved = saved.get(&cell_id).unwrap()["sig"].as_f64().unwrap();
        let sig = continued.get(&cell_id).unwrap()["sig"].as_f64().unwrap();
        approx_eq(sig_saved, 8.0, 1e-12);
        approx_eq(sig, 8.0, 1e-12);
    }
    Ok(())
}
