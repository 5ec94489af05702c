use super::{EleCond, EssentialKey, FnTime, Nbc, Pbc};
use gemlab::mesh::{CellId, PointId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Holds the time stepping data of a stage
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TimeControl {
    /// Final time of the stage (absolute)
    pub tf: f64,

    /// Time increment Δt(t)
    pub dt: FnTime,

    /// Time increment for the output of results Δt_out(t)
    pub dt_out: FnTime,
}

impl Default for TimeControl {
    fn default() -> Self {
        TimeControl {
            tf: 1.0,
            dt: FnTime::Constant(1.0),
            dt_out: FnTime::Constant(1.0),
        }
    }
}

/// Holds boundary conditions applied to cell faces
///
/// A face is identified by `(cell_id, face_index)` where the face index follows the local
/// numbering of the cell shape (edges in 2D, faces in 3D, end points for line cells).
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct FaceBc {
    /// Pairs of (cell_id, face_index)
    pub faces: Vec<(CellId, usize)>,

    /// Essential conditions applied to the vertices of the faces
    pub essential: Vec<(EssentialKey, FnTime)>,

    /// Natural conditions handed over to the elements
    pub natural: Vec<(Nbc, FnTime)>,
}

/// Holds boundary conditions applied to points (vertices)
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct NodeBc {
    /// Point ids
    pub points: Vec<PointId>,

    /// Essential conditions
    ///
    /// A rigid link is applied to all points at once (the first point is the master);
    /// the other conditions are applied to each point.
    pub essential: Vec<(EssentialKey, FnTime)>,

    /// Concentrated loads and fluxes
    pub concentrated: Vec<(Pbc, FnTime)>,
}

/// Holds element conditions (body forces, sources) applied to all cells with an attribute
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EleCondBc {
    /// Cell attribute
    pub attribute: usize,

    /// Conditions
    pub conditions: Vec<(EleCond, FnTime)>,
}

/// Holds the data to set a hydrostatic initial state of liquid pressure
///
/// ```text
/// pl = γl · (max(z_max, z_water) - z)
/// ```
///
/// where z_max is the largest elevation in the mesh; i.e., a water table below the
/// top of the mesh is raised to the top.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Hydrostatic {
    /// Elevation of the water table
    pub z_water: f64,

    /// Unit weight of the liquid
    pub gamma_l: f64,
}

/// Holds the location of the state files written by a previous simulation
///
/// The file read by each rank is `{out_dir}/{filename_stem}-p{rank}-{index:0>20}.json`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ImportState {
    /// Output directory of the previous simulation
    pub out_dir: String,

    /// Filename stem of the previous simulation
    pub filename_stem: String,

    /// Index of the output file
    pub index: usize,
}

/// Holds the data of an analysis stage
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Stage {
    /// Description of the stage
    pub desc: String,

    /// Cell attributes to be activated at the beginning of this stage
    pub activate: Vec<usize>,

    /// Cell attributes to be deactivated at the beginning of this stage
    pub deactivate: Vec<usize>,

    /// Element conditions
    pub ele_conds: Vec<EleCondBc>,

    /// Face boundary conditions
    pub face_bcs: Vec<FaceBc>,

    /// Node boundary conditions
    pub node_bcs: Vec<NodeBc>,

    /// Hydrostatic initial state
    pub hydrostatic: Option<Hydrostatic>,

    /// State written by a previous simulation to import (each rank reads its own file)
    pub import: Option<ImportState>,

    /// Initial internal values handed over to the elements (cell_id ⇒ name ⇒ values)
    pub initial_ivs: HashMap<CellId, HashMap<String, Vec<f64>>>,

    /// Time control
    pub control: TimeControl,
}

impl Stage {
    /// Allocates a new instance with default time control and no conditions
    pub fn new(desc: &str) -> Self {
        Stage {
            desc: desc.to_string(),
            ..Default::default()
        }
    }

    /// Sets the time control
    pub fn set_control(&mut self, tf: f64, dt: FnTime, dt_out: FnTime) -> &mut Self {
        self.control = TimeControl { tf, dt, dt_out };
        self
    }

    /// Activates cells with a given attribute
    pub fn activate(&mut self, attribute: usize) -> &mut Self {
        self.activate.push(attribute);
        self
    }

    /// Deactivates cells with a given attribute
    pub fn deactivate(&mut self, attribute: usize) -> &mut Self {
        self.deactivate.push(attribute);
        self
    }

    /// Sets an element condition to all cells with a given attribute
    pub fn ele_cond(&mut self, attribute: usize, cond: EleCond, f: FnTime) -> &mut Self {
        self.ele_conds.push(EleCondBc {
            attribute,
            conditions: vec![(cond, f)],
        });
        self
    }

    /// Sets an essential condition on faces
    pub fn essential_on(&mut self, faces: &[(CellId, usize)], key: EssentialKey, f: FnTime) -> &mut Self {
        self.face_bcs.push(FaceBc {
            faces: faces.to_vec(),
            essential: vec![(key, f)],
            natural: Vec::new(),
        });
        self
    }

    /// Sets a natural condition on faces
    pub fn natural_on(&mut self, faces: &[(CellId, usize)], nbc: Nbc, f: FnTime) -> &mut Self {
        self.face_bcs.push(FaceBc {
            faces: faces.to_vec(),
            essential: Vec::new(),
            natural: vec![(nbc, f)],
        });
        self
    }

    /// Sets an essential condition at points
    pub fn essential_at(&mut self, points: &[PointId], key: EssentialKey, f: FnTime) -> &mut Self {
        self.node_bcs.push(NodeBc {
            points: points.to_vec(),
            essential: vec![(key, f)],
            concentrated: Vec::new(),
        });
        self
    }

    /// Sets a concentrated load or flux at points
    pub fn load_at(&mut self, points: &[PointId], pbc: Pbc, f: FnTime) -> &mut Self {
        self.node_bcs.push(NodeBc {
            points: points.to_vec(),
            essential: Vec::new(),
            concentrated: vec![(pbc, f)],
        });
        self
    }

    /// Sets the hydrostatic initial state
    pub fn set_hydrostatic(&mut self, z_water: f64, gamma_l: f64) -> &mut Self {
        self.hydrostatic = Some(Hydrostatic { z_water, gamma_l });
        self
    }

    /// Sets the state (written by a previous simulation) to import
    pub fn set_import(&mut self, out_dir: &str, filename_stem: &str, index: usize) -> &mut Self {
        self.import = Some(ImportState {
            out_dir: out_dir.to_string(),
            filename_stem: filename_stem.to_string(),
            index,
        });
        self
    }

    /// Validates all data
    ///
    /// Returns a message with the inconsistent data, or returns None if everything is all right.
    pub fn validate(&self) -> Option<String> {
        if self.control.tf < 0.0 {
            return Some(format!("tf = {:?} is incorrect; it must be ≥ 0.0", self.control.tf));
        }
        let mut functions = vec![&self.control.dt, &self.control.dt_out];
        for ec in &self.ele_conds {
            functions.extend(ec.conditions.iter().map(|(_, f)| f));
        }
        for fb in &self.face_bcs {
            functions.extend(fb.essential.iter().map(|(_, f)| f));
            functions.extend(fb.natural.iter().map(|(_, f)| f));
        }
        for nb in &self.node_bcs {
            functions.extend(nb.essential.iter().map(|(_, f)| f));
            functions.extend(nb.concentrated.iter().map(|(_, f)| f));
        }
        for f in functions {
            if let Err(e) = f.validate() {
                return Some(format!("stage {:?} has an invalid function: {}", self.desc, e));
            }
        }
        if let Some(h) = &self.hydrostatic {
            if h.gamma_l <= 0.0 {
                return Some(format!(
                    "hydrostatic gamma_l = {:?} is incorrect; it must be > 0.0",
                    h.gamma_l
                ));
            }
        }
        if let Some(import) = &self.import {
            if import.filename_stem.is_empty() {
                return Some(format!("stage {:?} has an empty import filename stem", self.desc));
            }
        }
        None // all good
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stage: {}\n", self.desc).unwrap();
        write!(f, "activate = {:?}\n", self.activate).unwrap();
        write!(f, "deactivate = {:?}\n", self.deactivate).unwrap();
        write!(f, "number of element conditions = {}\n", self.ele_conds.len()).unwrap();
        write!(f, "number of face conditions = {}\n", self.face_bcs.len()).unwrap();
        write!(f, "number of node conditions = {}\n", self.node_bcs.len()).unwrap();
        write!(f, "tf = {:?}\n", self.control.tf).unwrap();
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
