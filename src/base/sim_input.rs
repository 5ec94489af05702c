use super::{Config, ElementData, Stage};
use crate::StrError;
use gemlab::mesh::Mesh;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

/// Holds the description of a simulation (mesh, elements, configuration, and stages)
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SimInput {
    /// Description of the simulation
    #[serde(default)]
    pub desc: String,

    /// The mesh
    pub mesh: Mesh,

    /// Element data associated with each cell attribute
    pub elements: Vec<(usize, ElementData)>,

    /// Configuration
    #[serde(default)]
    pub config: Config,

    /// Analysis stages (run in sequence)
    pub stages: Vec<Stage>,

    /// Rank owning each cell (indexed by cell id) for distributed runs
    #[serde(default)]
    pub partition: Option<Vec<usize>>,
}

impl SimInput {
    /// Validates all data
    ///
    /// Returns a message with the inconsistent data, or returns None if everything is all right.
    pub fn validate(&self) -> Option<String> {
        if let Some(msg) = self.config.validate() {
            return Some(msg);
        }
        if self.stages.is_empty() {
            return Some("there must be at least one stage".to_string());
        }
        for cell in &self.mesh.cells {
            if !self.elements.iter().any(|(attribute, _)| *attribute == cell.attribute) {
                return Some(format!(
                    "cannot find element data for cell attribute {}",
                    cell.attribute
                ));
            }
        }
        if let Some(partition) = &self.partition {
            if partition.len() != self.mesh.cells.len() {
                return Some(format!(
                    "partition has {} entries but the mesh has {} cells",
                    partition.len(),
                    self.mesh.cells.len()
                ));
            }
        }
        let mut tf_prev = 0.0;
        for stage in &self.stages {
            if let Some(msg) = stage.validate() {
                return Some(msg);
            }
            if stage.control.tf < tf_prev {
                return Some(format!(
                    "stage {:?} has tf = {:?} smaller than the final time of the previous stage",
                    stage.desc, stage.control.tf
                ));
            }
            tf_prev = stage.control.tf;
        }
        None // all good
    }

    /// Reads a JSON file containing the simulation input
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
        let data = serde_json::from_reader(buffered).map_err(|_| "cannot parse JSON file")?;
        Ok(data)
    }

    /// Writes a JSON file with the simulation input
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
