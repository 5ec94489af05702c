use super::StageInfo;
use crate::StrError;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

/// Holds the record of a time step (accepted or not)
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct StepRecord {
    /// Index of the stage
    pub stage: usize,

    /// Time at the end of the step
    pub t: f64,

    /// Time increment
    pub dt: f64,

    /// Number of iterations
    pub iterations: usize,

    /// Largest absolute component of the right-hand side vector at the last iteration
    pub larg_fb: f64,

    /// Outcome of the step (e.g., "converged" or "diverged")
    pub outcome: String,
}

/// Holds the summary of a simulation (written by the root rank)
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Summary {
    /// Number of ranks
    pub nrank: usize,

    /// Indices of the output files
    pub output_indices: Vec<usize>,

    /// Times of the output files
    pub output_times: Vec<f64>,

    /// Index of the first output file of each stage
    pub stage_starts: Vec<usize>,

    /// Sizes of each stage
    pub stages: Vec<StageInfo>,

    /// All time steps
    pub steps: Vec<StepRecord>,

    /// Messages
    pub log: Vec<String>,
}

impl Summary {
    /// Allocates a new instance
    pub fn new(nrank: usize) -> Self {
        Summary {
            nrank,
            ..Default::default()
        }
    }

    /// Appends a message to the log (and prints it if verbose)
    pub fn push_log(&mut self, message: String, verbose: bool) {
        if verbose {
            println!("{}", message);
        }
        self.log.push(message);
    }

    /// Returns the number of accepted steps
    pub fn n_converged(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome == "converged").count()
    }

    /// Reads a JSON file containing the summary
    ///
    /// # Input
    ///
    /// * `full_path` -- may be a String, &str, or Path
    pub fn read_json<P>(full_path: &P) -> Result<Self, StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        let input = File::open(path).map_err(|_| "cannot open file")?;
        let buffered = BufReader::new(input);
        let summary = serde_json::from_reader(buffered).map_err(|_| "cannot parse JSON file")?;
        Ok(summary)
    }

    /// Writes a JSON file with the summary
    ///
    /// # Input
    ///
    /// * `full_path` -- may be a String, &str, or Path
    pub fn write_json<P>(&self, full_path: &P) -> Result<(), StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        if let Some(p) = path.parent() {
            fs::create_dir_all(p).map_err(|_| "cannot create directory")?;
        }
        let mut file = File::create(&path).map_err(|_| "cannot create file")?;
        serde_json::to_writer_pretty(&mut file, &self).map_err(|_| "cannot write file")?;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
