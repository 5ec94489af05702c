use pmfem::prelude::*;
use pmfem::StrError;
use std::fs;
use std::thread;
use structopt::StructOpt;

/// Command line options
#[derive(StructOpt, Debug)]
#[structopt(name = "pmfem_run", about = "Runs a finite element simulation described by a JSON file")]
struct Options {
    /// Simulation input file (JSON)
    input: String,

    /// Erase previous output files with the same filename stem
    #[structopt(long)]
    erase: bool,

    /// Print timesteps and iterations
    #[structopt(long)]
    verbose: bool,

    /// Output directory (overrides the configuration)
    #[structopt(long)]
    out_dir: Option<String>,

    /// Number of ranks (threads) sharing the elements
    #[structopt(long, default_value = "1")]
    nrank: usize,
}

/// Removes the files in a directory whose names start with `{stem}-`
fn erase_previous(out_dir: &str, stem: &str) -> Result<(), StrError> {
    let entries = match fs::read_dir(out_dir) {
        Ok(entries) => entries,
        Err(_) => return Ok(()), // nothing to erase
    };
    let prefix = format!("{}-", stem);
    for entry in entries {
        let path = entry.map_err(|_| "cannot read output directory")?.path();
        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with(&prefix))
            .unwrap_or(false);
        if path.is_file() && matches {
            fs::remove_file(&path).map_err(|_| "cannot remove previous output file")?;
        }
    }
    Ok(())
}

/// Runs the simulation on one rank
fn run(input: &SimInput, comm: Box<dyn pmfem::fem::Communicator>) -> Result<(RunStatus, Vec<String>), StrError> {
    let mut domain = Domain::new(input, ElementRegistry::with_defaults(), comm)?;
    let mut solver = Solver::new(&domain)?;
    let status = solver.run(&mut domain, &input.stages)?;
    Ok((status, solver.summary.log.clone()))
}

fn main() -> Result<(), StrError> {
    // parse options
    let options = Options::from_args();

    // load data
    let mut input = SimInput::read_json(&options.input)?;
    if let Some(out_dir) = &options.out_dir {
        input.config.out_dir = out_dir.clone();
    }
    if options.verbose {
        input.config.set_verbose(true, true);
    }
    if options.erase {
        erase_previous(&input.config.out_dir, &input.config.filename_stem)?;
    }
    if options.nrank < 1 {
        return Err("the number of ranks must be at least 1");
    }

    // run
    let (status, log) = if options.nrank == 1 {
        run(&input, Box::new(SerialComm::new()))?
    } else {
        let group = ThreadComm::group(options.nrank)?;
        let handles: Vec<_> = group
            .into_iter()
            .map(|comm| {
                let input = input.clone();
                thread::spawn(move || run(&input, Box::new(comm)))
            })
            .collect();
        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.join().map_err(|_| "a rank has panicked")?);
        }
        results.remove(0)?
    };

    // message
    if !options.verbose {
        for line in &log {
            println!("{}", line);
        }
    }
    match status {
        RunStatus::Completed => {
            println!("simulation completed");
            Ok(())
        }
        RunStatus::StepFailed { t, iterations, reason } => {
            println!("step failed at t = {:?} after {} iterations: {}", t, iterations, reason);
            Err("simulation failed")
        }
    }
}
