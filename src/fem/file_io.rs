use super::{Domain, IpOutput, Node, StageInfo};
use crate::base::{Dof, DEFAULT_OUT_DIR};
use crate::StrError;
use gemlab::mesh::CellId;
use russell_lab::Vector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

/// Holds the state of a simulation at an output time (written by each rank)
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StateFile {
    /// Time
    pub t: f64,

    /// Time increment
    pub dt: f64,

    /// Primary variables
    pub y: Vector,

    /// First time derivatives (empty if steady)
    pub dydt: Vector,

    /// Second time derivatives (empty if steady)
    pub d2ydt2: Vector,

    /// Lagrange multipliers
    pub lambda: Vector,

    /// Encoded internal values of the local elements (cell_id ⇒ values)
    pub ivs: HashMap<CellId, serde_json::Value>,

    /// Output values of the local elements (cell_id ⇒ values)
    #[serde(default)]
    pub ips: HashMap<CellId, Vec<IpOutput>>,
}

/// Holds the equation numbers of a stage
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EquationsFile {
    /// Sizes of the stage
    pub info: StageInfo,

    /// Nodes with their DOFs and equation numbers
    pub nodes: Vec<Node>,

    /// Pairs (y key, f key)
    pub y_to_f: Vec<(Dof, String)>,
}

impl StateFile {
    /// Allocates a new instance with the current state of a domain
    pub fn new(domain: &mut Domain) -> Result<Self, StrError> {
        let ivs = domain.encode_ivs()?;
        let ips = domain.out_ips_data();
        let sol = &domain.sol;
        Ok(StateFile {
            t: sol.t,
            dt: sol.dt,
            y: sol.y.clone(),
            dydt: sol.dydt.clone(),
            d2ydt2: sol.d2ydt2.clone(),
            lambda: sol.lambda.clone(),
            ivs,
            ips,
        })
    }

    /// Reads a JSON file with the state data
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
        let state = serde_json::from_reader(buffered).map_err(|_| "cannot parse JSON file")?;
        Ok(state)
    }

    /// Writes a JSON file with the state data
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
        serde_json::to_writer(&mut file, &self).map_err(|_| "cannot write file")?;
        Ok(())
    }
}

impl EquationsFile {
    /// Reads a JSON file with the equation numbers
    pub fn read_json<P>(full_path: &P) -> Result<Self, StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        let input = File::open(path).map_err(|_| "cannot open file")?;
        let buffered = BufReader::new(input);
        let equations = serde_json::from_reader(buffered).map_err(|_| "cannot parse JSON file")?;
        Ok(equations)
    }
}

/// Returns the path of the state file written by a rank
pub fn state_path(out_dir: &str, filename_stem: &str, rank: usize, index: usize) -> String {
    format!("{}/{}-p{}-{:0>20}.json", out_dir, filename_stem, rank, index)
}

/// Assists in generating output files
///
/// Each rank writes its own state files; the summary is written by the root rank.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileIo {
    /// Holds a flag to enable/disable the file generation
    enabled: bool,

    /// Defines the output directory
    output_dir: String,

    /// Defines the filename stem
    filename_stem: String,

    /// Rank of the process writing the files
    rank: usize,

    /// Holds the count of files written
    output_count: usize,

    /// Holds the indices of the output files
    pub indices: Vec<usize>,

    /// Holds the simulation times corresponding to each output file
    pub times: Vec<f64>,
}

impl FileIo {
    /// Allocates a new instance with deactivated generation of files
    pub fn new() -> Self {
        FileIo {
            enabled: false,
            output_dir: String::new(),
            filename_stem: String::new(),
            rank: 0,
            output_count: 0,
            indices: Vec::new(),
            times: Vec::new(),
        }
    }

    /// Allocates a new instance with enabled generation of files
    ///
    /// # Input
    ///
    /// * `filename_stem` -- the last part of the filename without extension, e.g., "my_simulation"
    /// * `output_directory` -- the directory to save the output files.
    ///   None means that the default directory will be used; see [DEFAULT_OUT_DIR]
    /// * `rank` -- the rank of the process writing the files
    pub fn new_enabled(filename_stem: &str, output_directory: Option<&str>, rank: usize) -> Result<Self, StrError> {
        let out_dir = match output_directory {
            Some(d) => d,
            None => DEFAULT_OUT_DIR,
        };
        fs::create_dir_all(out_dir).map_err(|_| "cannot create output directory")?;
        Ok(FileIo {
            enabled: true,
            output_dir: out_dir.to_string(),
            filename_stem: filename_stem.to_string(),
            rank,
            output_count: 0,
            indices: Vec::new(),
            times: Vec::new(),
        })
    }

    /// Returns true if the generation of files is enabled
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Generates the filename path for the summary file
    pub fn path_summary(&self) -> String {
        if self.enabled {
            format!("{}/{}-summary.json", self.output_dir, self.filename_stem)
        } else {
            "".to_string()
        }
    }

    /// Generates the filename path for the state files
    pub fn path_state(&self, index: usize) -> String {
        if self.enabled {
            state_path(&self.output_dir, &self.filename_stem, self.rank, index)
        } else {
            "".to_string()
        }
    }

    /// Generates the filename path for the equation numbers of a stage
    pub fn path_equations(&self, stage: usize) -> String {
        if self.enabled {
            format!("{}/{}-p{}-stage{}-eqs.json", self.output_dir, self.filename_stem, self.rank, stage)
        } else {
            "".to_string()
        }
    }

    /// Writes the current state of a domain to a file
    ///
    /// Returns the index of the output file (or None if the generation of files is disabled).
    pub fn write_state(&mut self, domain: &mut Domain) -> Result<Option<usize>, StrError> {
        if !self.enabled {
            return Ok(None);
        }
        let state = StateFile::new(domain)?;
        let index = self.output_count;
        state.write_json(&self.path_state(index))?;
        self.indices.push(index);
        self.times.push(state.t);
        self.output_count += 1;
        Ok(Some(index))
    }

    /// Writes the equation numbers of the current stage of a domain
    pub fn write_equations(&self, domain: &Domain) -> Result<(), StrError> {
        if !self.enabled {
            return Ok(());
        }
        let equations = EquationsFile {
            info: domain.info,
            nodes: domain.nodes.clone(),
            y_to_f: domain.y_to_f.iter().map(|(d, f)| (*d, f.to_string())).collect(),
        };
        let path = Path::new(&self.path_equations(domain.info.stage)).to_path_buf();
        let mut file = File::create(&path).map_err(|_| "cannot create file")?;
        serde_json::to_writer(&mut file, &equations).map_err(|_| "cannot write file")?;
        Ok(())
    }

    /// Reads the state file with a given index
    pub fn read_state(&self, index: usize) -> Result<StateFile, StrError> {
        if !self.enabled {
            return Err("cannot read state because the generation of files is disabled");
        }
        StateFile::read_json(&self.path_state(index))
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{FileIo, StateFile};
    use crate::base::DEFAULT_TEST_DIR;
    use russell_lab::Vector;
    use std::collections::HashMap;

    #[test]
    fn paths_work() {
        let file_io = FileIo::new();
        assert!(!file_io.enabled());
        assert_eq!(file_io.path_summary(), "");
        assert_eq!(file_io.path_state(0), "");
        assert_eq!(file_io.path_equations(0), "");
        assert_eq!(file_io.read_state(0).err(), Some("cannot read state because the generation of files is disabled"));

        let file_io = FileIo::new_enabled("paths", Some(DEFAULT_TEST_DIR), 1).unwrap();
        assert_eq!(file_io.path_summary(), format!("{}/paths-summary.json", DEFAULT_TEST_DIR));
        assert_eq!(
            file_io.path_state(3),
            format!("{}/paths-p1-00000000000000000003.json", DEFAULT_TEST_DIR)
        );
        assert_eq!(file_io.path_equations(2), format!("{}/paths-p1-stage2-eqs.json", DEFAULT_TEST_DIR));
    }

    #[test]
    fn state_file_read_write_work() {
        let mut ivs = HashMap::new();
        ivs.insert(4, serde_json::json!({"sig": 0.1 + 0.2}));
        let state = StateFile {
            t: 0.3,
            dt: 0.1,
            y: Vector::from(&[1.0 / 3.0, -2.0 / 7.0, 1e-300]),
            dydt: Vector::new(0),
            d2ydt2: Vector::new(0),
            lambda: Vector::from(&[std::f64::consts::PI]),
            ivs,
            ips: HashMap::new(),
        };
        let path = format!("{}/state_file_read_write_works.json", DEFAULT_TEST_DIR);
        state.write_json(&path).unwrap();
        let read = StateFile::read_json(&path).unwrap();
        assert_eq!(read.t, 0.3);
        assert_eq!(read.y.as_data(), state.y.as_data());
        assert_eq!(read.lambda.as_data(), state.lambda.as_data());
        assert_eq!(read.ivs.get(&4), state.ivs.get(&4));
        assert_eq!(StateFile::read_json("/tmp/pmfem/__does_not_exist__.json").err(), Some("cannot open file"));
    }
}
