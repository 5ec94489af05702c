use super::{CellInput, Communicator, ConnectedCell, DynCoefs, ElementInfo, ElementRegistry, ElementTrait};
use super::{state_path, EssentialBcs, IpOutput, Node, PointNaturalBcs, Solution, StateFile, TangentSink};
use crate::base::{Config, Dof, ElementData, EssentialKey, FnTime, Nbc, SimInput, Stage};
use crate::StrError;
use gemlab::mesh::{Cell, CellId, Mesh, PointId};
use russell_lab::Vector;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Holds the sizes of the global system of a stage (for logging)
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct StageInfo {
    /// Index of the stage
    pub stage: usize,

    /// Number of equations (primary variables)
    pub ny: usize,

    /// Number of Lagrange multipliers
    pub nlam: usize,

    /// Maximum number of non-zero values in the tangent (without the constraints)
    pub nnz_kb: usize,

    /// Number of non-zero values in the constraints matrix A
    pub nnz_a: usize,

    /// Number of equations with first order time derivatives
    pub nt1eqs: usize,

    /// Number of equations with second order time derivatives
    pub nt2eqs: usize,
}

/// Natural conditions on the faces of a cell (face, condition, function)
type FaceNatural = HashMap<CellId, Vec<(usize, Nbc, FnTime)>>;

/// Holds the nodes, elements, constraints, and solution of the current stage
///
/// Every rank numbers the equations of all active cells (the numbering is replicated)
/// but only allocates the elements of the cells it owns.
pub struct Domain {
    /// The mesh
    pub mesh: Mesh,

    /// Element data associated with each cell attribute
    pub elements_data: HashMap<usize, ElementData>,

    /// Configuration
    pub config: Config,

    /// Collective channel among the ranks
    pub comm: Box<dyn Communicator>,

    /// Available element types
    pub registry: ElementRegistry,

    /// Rank owning each cell
    pub partition: Vec<usize>,

    /// Inactive flag of each cell attribute (persists across stages)
    pub inactive: HashMap<usize, bool>,

    /// Nodes of the current stage
    pub nodes: Vec<Node>,

    /// Maps point ids to indices in `nodes`
    pub vid_to_node: Vec<Option<usize>>,

    /// (DOF, equation) pairs of each vertex of each active cell
    pub cell_eqs: Vec<Option<Vec<Vec<(Dof, usize)>>>>,

    /// All elements allocated so far (reused when a cell is activated again)
    pub elements: Vec<Box<dyn ElementTrait>>,

    /// Cell id of each element
    pub element_cid: Vec<CellId>,

    /// Maps cell ids to indices in `elements`
    pub cid_to_element: Vec<Option<usize>>,

    /// Indices of the elements active in the current stage
    pub active: Vec<usize>,

    /// Constraints
    pub essential: EssentialBcs,

    /// Concentrated loads
    pub point_loads: PointNaturalBcs,

    /// Equations with first order time derivatives
    pub t1_eqs: Vec<usize>,

    /// Equations with second order time derivatives
    pub t2_eqs: Vec<usize>,

    /// Pairs (y key, f key) of the active elements
    pub y_to_f: Vec<(Dof, &'static str)>,

    /// All tangent contributions are symmetric
    pub symmetric: bool,

    /// Sizes of the current stage
    pub info: StageInfo,

    /// The solution
    pub sol: Solution,
}

/// Returns the coordinates of the vertices of a cell
fn cell_coords(mesh: &Mesh, cell: &Cell) -> Vec<Vec<f64>> {
    cell.points.iter().map(|p| mesh.points[*p].coords.clone()).collect()
}

impl Domain {
    /// Allocates a new instance
    ///
    /// The equations are only numbered when [Domain::set_stage] is called.
    pub fn new(input: &SimInput, registry: ElementRegistry, comm: Box<dyn Communicator>) -> Result<Self, StrError> {
        if let Some(msg) = input.validate() {
            println!("ERROR: {}", msg);
            return Err("cannot allocate domain because input.validate() failed");
        }
        let ncell = input.mesh.cells.len();
        for (i, cell) in input.mesh.cells.iter().enumerate() {
            if cell.id != i {
                return Err("cell ids must be equal to the cell indices");
            }
        }
        let size = comm.size();
        let partition = match &input.partition {
            Some(p) => {
                if p.iter().any(|rank| *rank >= size) {
                    return Err("partition refers to a rank that does not exist");
                }
                p.clone()
            }
            None => (0..ncell).map(|cid| cid % size).collect(),
        };
        let mut elements_data = HashMap::new();
        let mut inactive = HashMap::new();
        for (attribute, data) in &input.elements {
            elements_data.insert(*attribute, data.clone());
            inactive.insert(*attribute, data.inactive);
        }
        let mut dc = DynCoefs::new(&input.config)?;
        let steady = input.config.steady();
        if steady {
            dc.reset();
        }
        Ok(Domain {
            mesh: input.mesh.clone(),
            elements_data,
            config: input.config.clone(),
            comm,
            registry,
            partition,
            inactive,
            nodes: Vec::new(),
            vid_to_node: vec![None; input.mesh.points.len()],
            cell_eqs: vec![None; ncell],
            elements: Vec::new(),
            element_cid: Vec::new(),
            cid_to_element: vec![None; ncell],
            active: Vec::new(),
            essential: EssentialBcs::new(),
            point_loads: PointNaturalBcs::new(),
            t1_eqs: Vec::new(),
            t2_eqs: Vec::new(),
            y_to_f: Vec::new(),
            symmetric: true,
            info: StageInfo::default(),
            sol: Solution::new(0, 0, steady, dc),
        })
    }

    /// Returns the dimension of space
    pub fn ndim(&self) -> usize {
        self.mesh.ndim
    }

    /// Returns the total number of equations (primary variables plus Lagrange multipliers)
    pub fn nyb(&self) -> usize {
        self.info.ny + self.info.nlam
    }

    /// Returns the maximum number of non-zero values in the augmented tangent
    pub fn nnz_total(&self) -> usize {
        self.info.nnz_kb + 2 * self.info.nnz_a
    }

    /// Returns the points (vertices) of a face of a cell
    ///
    /// The faces of line cells are the end points; the faces of 2D cells are edges.
    pub fn face_points(&self, cell_id: CellId, face: usize) -> Result<Vec<PointId>, StrError> {
        let cell = self.mesh.cells.get(cell_id).ok_or("cell id is out of range")?;
        let kind = cell.kind;
        match kind.ndim() {
            1 => {
                if face > 1 {
                    return Err("face index is out of range");
                }
                Ok(vec![cell.points[face]])
            }
            2 => {
                if face >= kind.nedge() {
                    return Err("face index is out of range");
                }
                Ok((0..kind.edge_nnode())
                    .map(|i| cell.points[kind.edge_node_id(face, i)])
                    .collect())
            }
            _ => {
                if face >= kind.nface() {
                    return Err("face index is out of range");
                }
                Ok((0..kind.face_nnode())
                    .map(|i| cell.points[kind.face_node_id(face, i)])
                    .collect())
            }
        }
    }

    /// Returns the node at a point
    pub fn node_at(&self, point_id: PointId) -> Result<&Node, StrError> {
        let index = self.vid_to_node.get(point_id).ok_or("point id is out of range")?;
        let index = index.ok_or("point does not have DOFs in the current stage")?;
        Ok(&self.nodes[index])
    }

    /// Returns the equation number of a DOF at a point
    pub fn eq(&self, point_id: PointId, dof: Dof) -> Result<usize, StrError> {
        self.node_at(point_id)?
            .eq(dof)
            .ok_or("point does not have the requested DOF in the current stage")
    }

    /// Returns the result of an operation that may have failed on some ranks only
    ///
    /// All ranks must call this function at the same point.
    pub fn agree<T>(&self, result: Result<T, StrError>) -> Result<T, StrError> {
        let any_failed = self.comm.any_stop(result.is_err())?;
        match result {
            Err(e) => Err(e),
            Ok(_) if any_failed => Err("another rank has failed"),
            Ok(value) => Ok(value),
        }
    }


    /// Sets the equations, elements, and conditions of a stage
    ///
    /// The values of (point, DOF) pairs that existed in the previous stage are carried over.
    pub fn set_stage(&mut self, index: usize, stage: &Stage) -> Result<StageInfo, StrError> {
        if let Some(msg) = stage.validate() {
            println!("ERROR: {}", msg);
            return Err("cannot set stage because stage.validate() failed");
        }

        // activation and deactivation
        for attribute in &stage.activate {
            self.inactive.insert(*attribute, false);
        }
        for attribute in &stage.deactivate {
            self.inactive.insert(*attribute, true);
        }

        // natural conditions on faces
        let mut face_nat: FaceNatural = HashMap::new();
        for fb in &stage.face_bcs {
            for (cell_id, face) in &fb.faces {
                self.face_points(*cell_id, *face)?;
                for (nbc, f) in &fb.natural {
                    face_nat.entry(*cell_id).or_insert_with(Vec::new).push((*face, *nbc, f.clone()));
                }
            }
        }

        // numbering (replicated on all ranks)
        let numbering = self.number_equations(&face_nat)?;
        let old_nodes = std::mem::replace(&mut self.nodes, numbering.nodes);
        self.vid_to_node = numbering.vid_to_node;
        self.cell_eqs = numbering.cell_eqs;
        self.y_to_f = numbering.y_to_f;
        let ny = numbering.ny;

        // elements owned by this rank
        let local = self.setup_elements(&numbering.inputs, &face_nat, stage);
        let (new_elements, extra_nnz, symmetric) = self.agree(local)?;
        let mut extra = [extra_nnz as f64];
        self.comm.all_reduce_sum(&mut extra)?;
        self.symmetric = !self.comm.any_stop(!symmetric)?;

        // constraints and concentrated loads (replicated on all ranks)
        self.essential.reset();
        self.point_loads.reset();
        for fb in &stage.face_bcs {
            if fb.essential.is_empty() {
                continue;
            }
            let mut points = Vec::new();
            for (cell_id, face) in &fb.faces {
                for p in self.face_points(*cell_id, *face)? {
                    if !points.contains(&p) {
                        points.push(p);
                    }
                }
            }
            for (key, f) in &fb.essential {
                self.set_essential(*key, &points, f)?;
            }
        }
        for nb in &stage.node_bcs {
            for (key, f) in &nb.essential {
                self.set_essential(*key, &nb.points, f)?;
            }
            for (pbc, f) in &nb.concentrated {
                for p in &nb.points {
                    let eq = self
                        .node_at(*p)?
                        .eq(pbc.dof())
                        .ok_or("cannot set point load because the DOF does not exist")?;
                    self.point_loads.set(*pbc, eq, f);
                }
            }
        }

        // equations with time derivatives
        self.t1_eqs.clear();
        self.t2_eqs.clear();
        for node in &self.nodes {
            for pair in &node.dofs {
                if numbering.t1_keys.contains(&pair.dof) {
                    self.t1_eqs.push(pair.eq);
                }
                if numbering.t2_keys.contains(&pair.dof) {
                    self.t2_eqs.push(pair.eq);
                }
            }
        }
        let (nlam, nnz_a) = self.essential.build(ny);
        self.info = StageInfo {
            stage: index,
            ny,
            nlam,
            nnz_kb: numbering.nnz_kb + extra[0] as usize,
            nnz_a,
            nt1eqs: self.t1_eqs.len(),
            nt2eqs: self.t2_eqs.len(),
        };

        // primary variables
        self.carry_over(&old_nodes);
        if let Some(hydrostatic) = &stage.hydrostatic {
            // the water table is never below the top of the mesh
            let last = self.mesh.ndim - 1;
            let z_max = self.mesh.points.iter().fold(f64::MIN, |acc, p| f64::max(acc, p.coords[last]));
            let z_water = f64::max(z_max, hydrostatic.z_water);
            for node in &self.nodes {
                if let Some(eq) = node.eq(Dof::Pl) {
                    let z = self.mesh.points[node.point_id].coords[last];
                    self.sol.y[eq] = hydrostatic.gamma_l * (z_water - z);
                }
            }
        }
        let state = match &stage.import {
            Some(import) => {
                let path = state_path(&import.out_dir, &import.filename_stem, self.comm.rank(), import.index);
                Some(self.agree(StateFile::read_json(&path))?)
            }
            None => None,
        };
        if let Some(state) = &state {
            let local = self.import_solution(state);
            self.agree(local)?;
        }

        // internal values (local to this rank)
        let local = self.initialize_ivs(&new_elements, stage, state.as_ref());
        self.agree(local)?;
        Ok(self.info)
    }

    /// Numbers the equations of all active cells
    fn number_equations(&self, face_nat: &FaceNatural) -> Result<Numbering, StrError> {
        let ndim = self.mesh.ndim;
        let ncell = self.mesh.cells.len();
        let mut nodes: Vec<Node> = Vec::new();
        let mut vid_to_node: Vec<Option<usize>> = vec![None; self.mesh.points.len()];
        let mut inputs: Vec<Option<(CellInput, ElementInfo)>> = vec![None; ncell];
        let mut t1_keys = HashSet::new();
        let mut t2_keys = HashSet::new();
        let mut y_to_f: Vec<(Dof, &'static str)> = Vec::new();
        let mut eq = 0;
        let mut nnz_kb = 0;
        for cell in &self.mesh.cells {
            if self.inactive.get(&cell.attribute).copied().unwrap_or(false) {
                continue;
            }
            let data = self
                .elements_data
                .get(&cell.attribute)
                .ok_or("cannot find element data for cell attribute")?;
            let face_conds = match face_nat.get(&cell.id) {
                Some(list) => list.iter().map(|(face, nbc, _)| (*face, *nbc)).collect(),
                None => Vec::new(),
            };
            let input = CellInput {
                ndim,
                cell: cell.clone(),
                coords: cell_coords(&self.mesh, cell),
                face_conds,
            };
            let info = self.registry.info(&data.kind, &input)?;
            if info.dofs.len() != cell.points.len() {
                return Err("number of DOF lists must equal the number of cell points");
            }
            if !info.is_joint {
                let mut ndof = 0;
                for (m, p) in cell.points.iter().enumerate() {
                    let index = match vid_to_node[*p] {
                        Some(index) => index,
                        None => {
                            nodes.push(Node::new(*p));
                            vid_to_node[*p] = Some(nodes.len() - 1);
                            nodes.len() - 1
                        }
                    };
                    for dof in &info.dofs[m] {
                        eq = nodes[index].add_dof_and_eq(*dof, eq);
                    }
                    ndof += info.dofs[m].len();
                }
                nnz_kb += ndof * ndof;
            }
            t1_keys.extend(info.t1_vars.iter().copied());
            t2_keys.extend(info.t2_vars.iter().copied());
            for pair in &info.y_to_f {
                if !y_to_f.contains(pair) {
                    y_to_f.push(*pair);
                }
            }
            inputs[cell.id] = Some((input, info));
        }

        // project the global numbering onto the vertices of each cell
        let mut cell_eqs = vec![None; ncell];
        for (cell_id, entry) in inputs.iter().enumerate() {
            if let Some((input, info)) = entry {
                let mut eqs = Vec::with_capacity(input.cell.points.len());
                for (m, p) in input.cell.points.iter().enumerate() {
                    let index = vid_to_node[*p].ok_or("joint vertex does not have DOFs in the current stage")?;
                    let mut pairs = Vec::with_capacity(info.dofs[m].len());
                    for dof in &info.dofs[m] {
                        let e = nodes[index]
                            .eq(*dof)
                            .ok_or("joint vertex does not have the required DOF in the current stage")?;
                        pairs.push((*dof, e));
                    }
                    eqs.push(pairs);
                }
                cell_eqs[cell_id] = Some(eqs);
            }
        }
        Ok(Numbering {
            inputs,
            nodes,
            vid_to_node,
            cell_eqs,
            ny: eq,
            nnz_kb,
            t1_keys,
            t2_keys,
            y_to_f,
        })
    }

    /// Allocates (or reuses) the elements of the active cells owned by this rank
    ///
    /// Returns the indices of the new elements, the extra number of non-zero values
    /// required by the connectors, and whether all local tangents are symmetric.
    fn setup_elements(
        &mut self,
        inputs: &[Option<(CellInput, ElementInfo)>],
        face_nat: &FaceNatural,
        stage: &Stage,
    ) -> Result<(Vec<usize>, usize, bool), StrError> {
        let rank = self.comm.rank();
        let mut new_elements = Vec::new();
        self.active.clear();
        for (cell_id, entry) in inputs.iter().enumerate() {
            let input = match entry {
                Some((input, _)) => input,
                None => continue,
            };
            if self.partition[cell_id] != rank {
                continue;
            }
            let index = match self.cid_to_element[cell_id] {
                Some(index) => {
                    self.elements[index].clear_conditions();
                    index
                }
                None => {
                    let data = self
                        .elements_data
                        .get(&input.cell.attribute)
                        .ok_or("cannot find element data for cell attribute")?;
                    let element = self.registry.allocate(input, data)?;
                    self.elements.push(element);
                    self.element_cid.push(cell_id);
                    let index = self.elements.len() - 1;
                    self.cid_to_element[cell_id] = Some(index);
                    new_elements.push(index);
                    index
                }
            };
            let eqs = self.cell_eqs[cell_id]
                .as_ref()
                .ok_or("cannot find the equations of an active cell")?;
            self.elements[index].set_equations(eqs)?;
            self.active.push(index);
        }

        // connect joints to their host cells
        let mut extra_nnz = 0;
        for k in 0..self.active.len() {
            let index = self.active[k];
            if let Some(connector) = self.elements[index].connector() {
                let mut cells = HashMap::new();
                for dep in connector.dependencies() {
                    let cell = self.mesh.cells.get(dep).ok_or("joint dependency cell id is out of range")?;
                    if let Some(eqs) = &self.cell_eqs[dep] {
                        let connected = ConnectedCell {
                            dofs: eqs.clone(),
                            coords: cell_coords(&self.mesh, cell),
                        };
                        cells.insert(dep, connected);
                    }
                }
                extra_nnz += connector.connect(&cells)?;
            }
        }

        // element conditions
        for ec in &stage.ele_conds {
            for index in &self.active {
                let cell_id = self.element_cid[*index];
                if self.mesh.cells[cell_id].attribute == ec.attribute {
                    for (cond, f) in &ec.conditions {
                        self.elements[*index].set_ele_cond(*cond, f)?;
                    }
                }
            }
        }

        // natural conditions on faces
        for (cell_id, list) in face_nat {
            if inputs[*cell_id].is_none() || self.partition[*cell_id] != rank {
                continue;
            }
            if let Some(index) = self.cid_to_element[*cell_id] {
                for (face, nbc, f) in list {
                    self.elements[index].set_nat_bc(*nbc, *face, f)?;
                }
            }
        }

        let symmetric = self.active.iter().all(|index| self.elements[*index].symmetric_jacobian());
        Ok((new_elements, extra_nnz, symmetric))
    }

    /// Sets an essential condition on a set of points
    fn set_essential(&mut self, key: EssentialKey, points: &[PointId], f: &FnTime) -> Result<(), StrError> {
        let ndim = self.mesh.ndim;
        let mut nodes = Vec::with_capacity(points.len());
        let mut elevations = Vec::with_capacity(points.len());
        for p in points {
            let index = (*self.vid_to_node.get(*p).ok_or("point id is out of range")?)
                .ok_or("cannot set essential condition because the point does not have DOFs")?;
            nodes.push(&self.nodes[index]);
            elevations.push(self.mesh.points[*p].coords[ndim - 1]);
        }
        self.essential.set(key, &nodes, &elevations, ndim, f)
    }

    /// Allocates the solution of the new stage and copies the values of (point, DOF) pairs
    /// that existed in the previous stage
    fn carry_over(&mut self, old_nodes: &[Node]) {
        let steady = self.config.steady();
        let mut sol = Solution::new(self.info.ny, self.info.nlam, steady, self.sol.dc);
        sol.t = self.sol.t;
        sol.dt = self.sol.dt;
        for old in old_nodes {
            let index = match self.vid_to_node.get(old.point_id) {
                Some(Some(index)) => *index,
                _ => continue,
            };
            for pair in &old.dofs {
                if let Some(eq) = self.nodes[index].eq(pair.dof) {
                    sol.y[eq] = self.sol.y[pair.eq];
                    if !steady {
                        sol.dydt[eq] = self.sol.dydt[pair.eq];
                        sol.d2ydt2[eq] = self.sol.d2ydt2[pair.eq];
                    }
                }
            }
        }
        self.sol = sol;
    }

    /// Copies the primary variables of a state written by a previous simulation
    fn import_solution(&mut self, state: &StateFile) -> Result<(), StrError> {
        if state.y.dim() != self.info.ny {
            return Err("imported state does not match the number of equations");
        }
        self.sol.t = state.t;
        self.sol.y = state.y.clone();
        if !self.sol.steady && state.dydt.dim() == self.info.ny && state.d2ydt2.dim() == self.info.ny {
            self.sol.dydt = state.dydt.clone();
            self.sol.d2ydt2 = state.d2ydt2.clone();
        }
        if state.lambda.dim() == self.info.nlam {
            self.sol.lambda = state.lambda.clone();
        }
        Ok(())
    }

    /// Initializes the internal values of new elements, then sets the given and imported values
    fn initialize_ivs(
        &mut self,
        new_elements: &[usize],
        stage: &Stage,
        state: Option<&StateFile>,
    ) -> Result<(), StrError> {
        for index in new_elements {
            if let Some(intvars) = self.elements[*index].intvars() {
                intvars.init_ivs(&self.sol)?;
            }
        }
        for (cell_id, values) in &stage.initial_ivs {
            if *cell_id >= self.mesh.cells.len() {
                return Err("initial internal values refer to a cell that does not exist");
            }
            let index = match self.cid_to_element[*cell_id] {
                Some(index) if self.active.contains(&index) => index,
                _ => continue,
            };
            match self.elements[index].intvars() {
                Some(intvars) => intvars.set_ivs(values)?,
                None => return Err("cannot set initial values because the element does not have internal values"),
            }
        }
        if let Some(state) = state {
            self.decode_ivs(&state.ivs)?;
        }
        Ok(())
    }

    /// Computes the starred variables and hands them over to the elements
    pub fn compute_star_vars(&mut self) -> Result<(), StrError> {
        if !self.sol.steady {
            let dc = self.sol.dc;
            let sol = &mut self.sol;
            for eq in &self.t1_eqs {
                sol.psi[*eq] = dc.beta1 * sol.y[*eq] + dc.beta2 * sol.dydt[*eq];
            }
            for eq in &self.t2_eqs {
                sol.zet[*eq] = dc.alpha1 * sol.y[*eq] + dc.alpha2 * sol.dydt[*eq] + dc.alpha3 * sol.d2ydt2[*eq];
                sol.chi[*eq] = dc.alpha4 * sol.y[*eq] + dc.alpha5 * sol.dydt[*eq] + dc.alpha6 * sol.d2ydt2[*eq];
            }
        }
        for index in &self.active {
            self.elements[*index].interp_star_vars(&self.sol)?;
        }
        Ok(())
    }

    /// Updates the time derivatives after the primary variables have been incremented
    pub fn update_derivatives(&mut self) {
        if self.sol.steady {
            return;
        }
        let dc = self.sol.dc;
        let sol = &mut self.sol;
        for eq in &self.t1_eqs {
            sol.dydt[*eq] = dc.beta1 * sol.y[*eq] - sol.psi[*eq];
        }
        for eq in &self.t2_eqs {
            sol.d2ydt2[*eq] = dc.alpha1 * sol.y[*eq] - sol.zet[*eq];
            sol.dydt[*eq] = dc.alpha4 * sol.y[*eq] - sol.chi[*eq];
        }
    }

    /// Adds the contributions of the local elements to the right-hand side vector
    pub fn add_elements_to_rhs(&mut self, fb: &mut Vector) -> Result<(), StrError> {
        for index in &self.active {
            self.elements[*index].add_to_rhs(fb, &self.sol)?;
        }
        Ok(())
    }

    /// Adds the contributions of the local elements to the tangent
    pub fn add_elements_to_kb(&mut self, kb: &mut dyn TangentSink, first_iteration: bool) -> Result<(), StrError> {
        for index in &self.active {
            self.elements[*index].add_to_kb(kb, &self.sol, first_iteration)?;
        }
        Ok(())
    }

    /// Updates the state of the local elements
    pub fn update_elements(&mut self) -> Result<(), StrError> {
        for index in &self.active {
            self.elements[*index].update(&self.sol)?;
        }
        Ok(())
    }

    /// Makes a copy of the internal values of the local elements
    pub fn backup_ivs(&mut self) {
        for index in &self.active {
            if let Some(intvars) = self.elements[*index].intvars() {
                intvars.backup_ivs();
            }
        }
    }

    /// Restores the internal values of the local elements from the copy
    pub fn restore_ivs(&mut self) {
        for index in &self.active {
            if let Some(intvars) = self.elements[*index].intvars() {
                intvars.restore_ivs();
            }
        }
    }

    /// Encodes the internal values of the local elements (keyed by cell id)
    pub fn encode_ivs(&mut self) -> Result<HashMap<CellId, serde_json::Value>, StrError> {
        let mut ivs = HashMap::new();
        for index in &self.active {
            let cell_id = self.element_cid[*index];
            if let Some(intvars) = self.elements[*index].intvars() {
                ivs.insert(cell_id, intvars.encode_ivs()?);
            }
        }
        Ok(ivs)
    }

    /// Decodes the internal values of the local elements
    ///
    /// Every active local element with internal values must have an entry in the map.
    pub fn decode_ivs(&mut self, ivs: &HashMap<CellId, serde_json::Value>) -> Result<(), StrError> {
        for index in &self.active {
            let cell_id = self.element_cid[*index];
            if let Some(intvars) = self.elements[*index].intvars() {
                let value = ivs
                    .get(&cell_id)
                    .ok_or("cannot find the internal values of a local element in the imported state")?;
                intvars.decode_ivs(value)?;
            }
        }
        Ok(())
    }

    /// Returns the output values of the local elements (keyed by cell id)
    pub fn out_ips_data(&self) -> HashMap<CellId, Vec<IpOutput>> {
        self.active
            .iter()
            .map(|index| (self.element_cid[*index], self.elements[*index].out_ips_data(&self.sol)))
            .collect()
    }
}

/// Holds the results of the numbering pass
struct Numbering {
    inputs: Vec<Option<(CellInput, ElementInfo)>>,
    nodes: Vec<Node>,
    vid_to_node: Vec<Option<usize>>,
    cell_eqs: Vec<Option<Vec<Vec<(Dof, usize)>>>>,
    ny: usize,
    nnz_kb: usize,
    t1_keys: HashSet<Dof>,
    t2_keys: HashSet<Dof>,
    y_to_f: Vec<(Dof, &'static str)>,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::Domain;
    use crate::base::{Config, Dof, ElementData, EssentialKey, FnTime, Nbc, Pbc, SampleMeshes, SimInput, Stage};
    use crate::fem::{ElementRegistry, ParamRod, ParamSeepage, SerialComm};
    use gemlab::mesh::Mesh;

    fn rod_input(mesh: Mesh, attributes: &[usize], stages: Vec<Stage>) -> SimInput {
        let elements = attributes
            .iter()
            .map(|a| (*a, ElementData::new("rod", &ParamRod::sample()).unwrap()))
            .collect();
        SimInput {
            desc: String::new(),
            mesh,
            elements,
            config: Config::new(),
            stages,
            partition: None,
        }
    }

    fn new_domain(input: &SimInput) -> Domain {
        Domain::new(input, ElementRegistry::with_defaults(), Box::new(SerialComm::new())).unwrap()
    }

    #[test]
    fn new_captures_errors() {
        let mut input = rod_input(SampleMeshes::one_rod(1.0), &[1], vec![Stage::new("s0")]);
        input.stages.clear();
        assert_eq!(
            Domain::new(&input, ElementRegistry::with_defaults(), Box::new(SerialComm::new())).err(),
            Some("cannot allocate domain because input.validate() failed")
        );
    }

    #[test]
    fn set_stage_numbers_equations() {
        let stage = Stage::new("s0");
        let input = rod_input(SampleMeshes::two_rods_in_sequence(), &[1, 2], vec![stage.clone()]);
        let mut domain = new_domain(&input);
        let info = domain.set_stage(0, &stage).unwrap();
        assert_eq!(info.ny, 6);
        assert_eq!(info.nlam, 0);
        assert_eq!(info.nnz_kb, 32);
        assert_eq!(info.nt1eqs, 0);
        assert_eq!(info.nt2eqs, 6);
        assert_eq!(domain.eq(0, Dof::Ux).unwrap(), 0);
        assert_eq!(domain.eq(0, Dof::Uy).unwrap(), 1);
        assert_eq!(domain.eq(1, Dof::Ux).unwrap(), 2);
        assert_eq!(domain.eq(2, Dof::Uy).unwrap(), 5);
        assert_eq!(domain.cell_eqs[1].as_ref().unwrap()[0], &[(Dof::Ux, 2), (Dof::Uy, 3)]);
        assert_eq!(domain.active, &[0, 1]);
        assert!(domain.symmetric);
        assert_eq!(domain.sol.y.dim(), 6);
    }

    #[test]
    fn set_stage_handles_deactivation_and_reuse() {
        let mut s1 = Stage::new("s1");
        s1.deactivate(2);
        let mut s2 = Stage::new("s2");
        s2.activate(2);
        let s0 = Stage::new("s0");
        let input = rod_input(
            SampleMeshes::two_rods_in_sequence(),
            &[1, 2],
            vec![s0.clone(), s1.clone(), s2.clone()],
        );
        let mut domain = new_domain(&input);
        domain.set_stage(0, &s0).unwrap();
        domain.sol.y[2] = 0.5; // ux at point 1
        domain.sol.y[4] = 0.7; // ux at point 2
        let info = domain.set_stage(1, &s1).unwrap();
        assert_eq!(info.ny, 4);
        assert_eq!(domain.active, &[0]);
        assert!(domain.node_at(2).is_err());
        assert_eq!(domain.sol.y[2], 0.5);
        let info = domain.set_stage(2, &s2).unwrap();
        assert_eq!(info.ny, 6);
        assert_eq!(domain.elements.len(), 2); // reused
        assert_eq!(domain.sol.y[2], 0.5);
        assert_eq!(domain.sol.y[4], 0.0); // point 2 was not active in the previous stage
    }

    #[test]
    fn set_stage_sets_constraints_and_loads() {
        let mut stage = Stage::new("s0");
        stage
            .essential_at(&[0], EssentialKey::Dof(Dof::Ux), FnTime::Zero)
            .essential_at(&[0, 3], EssentialKey::Dof(Dof::Uy), FnTime::Zero)
            .essential_at(&[1, 2], EssentialKey::Rigid, FnTime::Zero)
            .load_at(&[3], Pbc::Fx, FnTime::Constant(1.0));
        let input = rod_input(SampleMeshes::two_rods_apart(), &[1], vec![stage.clone()]);
        let mut domain = new_domain(&input);
        let info = domain.set_stage(0, &stage).unwrap();
        assert_eq!(info.ny, 8);
        assert_eq!(info.nlam, 5);
        assert_eq!(info.nnz_a, 7);
        assert_eq!(domain.nyb(), 13);
        assert_eq!(domain.nnz_total(), 32 + 14);
        assert_eq!(domain.point_loads.all.len(), 1);
        assert_eq!(domain.point_loads.all[0].eq, 6);
    }

    #[test]
    fn set_stage_captures_errors() {
        let mut stage = Stage::new("s0");
        stage.essential_at(&[0], EssentialKey::Dof(Dof::Pl), FnTime::Zero);
        let input = rod_input(SampleMeshes::one_rod(1.0), &[1], vec![stage.clone()]);
        let mut domain = new_domain(&input);
        assert_eq!(
            domain.set_stage(0, &stage).err(),
            Some("cannot set essential condition because the DOF does not exist")
        );

        let mut stage = Stage::new("s0");
        stage.natural_on(&[(0, 2)], Nbc::Ql, FnTime::Zero);
        assert_eq!(domain.set_stage(0, &stage).err(), Some("face index is out of range"));

        let mut input = rod_input(SampleMeshes::one_rod(1.0), &[1], vec![Stage::new("s0")]);
        input.elements[0].1.kind = "beam".to_string();
        let mut domain = new_domain(&input);
        assert_eq!(
            domain.set_stage(0, &Stage::new("s0")).err(),
            Some("element type is not available in the registry")
        );
    }

    #[test]
    fn seepage_face_adds_fl_and_hydrostatic_works() {
        let mut stage = Stage::new("s0");
        stage.natural_on(&[(1, 1)], Nbc::Seepage, FnTime::Zero);
        stage.set_hydrostatic(2.0, 10.0);
        let data = ElementData::new("seepage", &ParamSeepage::sample()).unwrap();
        let mut config = Config::new();
        config.set_transient(true);
        let input = SimInput {
            desc: String::new(),
            mesh: SampleMeshes::column(2, 2.0),
            elements: vec![(1, data)],
            config,
            stages: vec![stage.clone()],
            partition: None,
        };
        let mut domain = new_domain(&input);
        let info = domain.set_stage(0, &stage).unwrap();
        assert_eq!(info.ny, 4);
        assert_eq!(info.nt1eqs, 3);
        assert_eq!(domain.eq(2, Dof::Fl).unwrap(), 3);
        assert!(!domain.symmetric);
        assert_eq!(domain.sol.y.as_data(), &[20.0, 10.0, 0.0, 0.0]);
        assert_eq!(domain.face_points(1, 1).unwrap(), &[2]);
    }

    #[test]
    fn hydrostatic_water_table_is_raised_to_the_top() {
        let mut stage = Stage::new("s0");
        stage.set_hydrostatic(1.0, 10.0);
        let data = ElementData::new("seepage", &ParamSeepage::sample()).unwrap();
        let mut config = Config::new();
        config.set_transient(true);
        let input = SimInput {
            desc: String::new(),
            mesh: SampleMeshes::column(2, 2.0),
            elements: vec![(1, data)],
            config,
            stages: vec![stage.clone()],
            partition: None,
        };
        let mut domain = new_domain(&input);
        domain.set_stage(0, &stage).unwrap();
        // z_water = 1 is below the top (z = 2)
        assert_eq!(domain.sol.y.as_data(), &[20.0, 10.0, 0.0]);
    }
}
