use super::{assemble_tangent, find_eq, line_geometry, CellInput, ConnectedCell, ElementConnector, ElementInfo};
use super::{ElementIntvars, ElementTrait, IpOutput, Solution, TangentSink};
use crate::base::{Dof, EleCond, ElementData, FnTime, Nbc};
use crate::StrError;
use gemlab::mesh::CellId;
use russell_lab::{Matrix, Vector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tolerance to decide whether a point lies on a host segment (relative to the host length)
const JOINT_TOLERANCE: f64 = 1e-8;

/// Holds the parameters of the rod-joint element
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ParamRodJoint {
    /// Spring stiffness per unit length
    pub ks: f64,

    /// Ids of the (line) cells hosting the rod
    pub hosts: Vec<CellId>,
}

/// Holds the internal state of a rod joint
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct JointState {
    /// Spring forces at each vertex (2 × ndim)
    pub forces: Vec<Vec<f64>>,
}

/// Holds the connection of a joint vertex to a host segment
#[derive(Clone, Debug)]
struct HostLink {
    /// Displacement equations of each host vertex
    eqs: Vec<Vec<usize>>,

    /// Shape functions of the host evaluated at the projection of the vertex
    shape: [f64; 2],
}

/// Implements a joint bonding a rod to a host line element through springs at the rod's vertices
///
/// The joint cell shares the vertices of the rod; thus it does not create new nodes.
/// The relative displacement at each vertex is:
///
/// ```text
/// w = u_rod - Σ N_k u_host(k)
/// ```
///
/// and the spring force is `f = ks Lt w` where `Lt` is the tributary length (L/2).
/// The host is only known after the connect pass.
pub struct ElementRodJoint {
    /// Number of space dimensions
    pub ndim: usize,

    /// Parameters
    pub param: ParamRodJoint,

    /// Coordinates of the vertices
    pub coords: Vec<Vec<f64>>,

    /// Tributary length of each vertex
    pub trib_length: f64,

    /// Displacement equations of the rod at each vertex
    pub eq_rod: Vec<Vec<usize>>,

    /// Links to the host at each vertex (after connect)
    links: Vec<HostLink>,

    /// Internal state
    pub state: JointState,

    /// Backup of the internal state
    pub backup: JointState,
}

impl ElementRodJoint {
    /// Returns the DOFs of the joint (used to verify that the rod DOFs exist)
    pub fn info(input: &CellInput) -> Result<ElementInfo, StrError> {
        if input.cell.points.len() != 2 {
            return Err("number of nodes for RodJoint must be 2");
        }
        let dofs = Dof::displacements(input.ndim);
        Ok(ElementInfo {
            dofs: vec![dofs.to_vec(); 2],
            is_joint: true,
            ..Default::default()
        })
    }

    /// Allocates a rod-joint element (registry function)
    pub fn allocate(input: &CellInput, data: &ElementData) -> Result<Box<dyn ElementTrait>, StrError> {
        let param: ParamRodJoint = data.params()?;
        Ok(Box::new(ElementRodJoint::new(input, param)?))
    }

    /// Allocates a new instance
    pub fn new(input: &CellInput, param: ParamRodJoint) -> Result<Self, StrError> {
        if input.cell.points.len() != 2 {
            return Err("number of nodes for RodJoint must be 2");
        }
        if param.ks <= 0.0 {
            return Err("rod-joint parameter ks must be > 0");
        }
        if param.hosts.is_empty() {
            return Err("rod-joint requires at least one host cell");
        }
        let ndim = input.ndim;
        let (length, _) = input.line_geometry()?;
        let state = JointState {
            forces: vec![vec![0.0; ndim]; 2],
        };
        Ok(ElementRodJoint {
            ndim,
            param,
            coords: input.coords.clone(),
            trib_length: length / 2.0,
            eq_rod: Vec::new(),
            links: Vec::new(),
            backup: state.clone(),
            state,
        })
    }

    /// Returns the relative displacements (rod minus host) of a global vector at a vertex
    fn relative(&self, m: usize, global: &Vector) -> Vec<f64> {
        let link = &self.links[m];
        (0..self.ndim)
            .map(|i| {
                global[self.eq_rod[m][i]]
                    - link.shape[0] * global[link.eqs[0][i]]
                    - link.shape[1] * global[link.eqs[1][i]]
            })
            .collect()
    }

    /// Returns the local-to-global map of a vertex [rod, host0, host1] and the B matrix
    fn vertex_map(&self, m: usize) -> (Vec<usize>, Matrix) {
        let link = &self.links[m];
        let mut l2g = self.eq_rod[m].clone();
        l2g.extend(&link.eqs[0]);
        l2g.extend(&link.eqs[1]);
        let mut bb = Matrix::new(self.ndim, 3 * self.ndim);
        for i in 0..self.ndim {
            bb.set(i, i, 1.0);
            bb.set(i, self.ndim + i, -link.shape[0]);
            bb.set(i, 2 * self.ndim + i, -link.shape[1]);
        }
        (l2g, bb)
    }

    fn check_connected(&self) -> Result<(), StrError> {
        if self.links.len() != 2 {
            return Err("rod-joint must be connected before use");
        }
        Ok(())
    }
}

impl ElementTrait for ElementRodJoint {
    fn set_equations(&mut self, eqs: &[Vec<(Dof, usize)>]) -> Result<(), StrError> {
        if eqs.len() != 2 {
            return Err("number of nodes for RodJoint must be 2");
        }
        let mut eq_rod = Vec::with_capacity(2);
        for vertex in eqs {
            let mut e = Vec::with_capacity(self.ndim);
            for dof in Dof::displacements(self.ndim) {
                e.push(find_eq(vertex, *dof)?);
            }
            eq_rod.push(e);
        }
        self.eq_rod = eq_rod;
        Ok(())
    }

    fn set_ele_cond(&mut self, _cond: EleCond, _f: &FnTime) -> Result<(), StrError> {
        Err("RodJoint does not handle element conditions")
    }

    fn set_nat_bc(&mut self, _nbc: Nbc, _face: usize, _f: &FnTime) -> Result<(), StrError> {
        Err("RodJoint does not handle natural boundary conditions")
    }

    fn clear_conditions(&mut self) {}

    fn interp_star_vars(&mut self, _sol: &Solution) -> Result<(), StrError> {
        Ok(())
    }

    fn add_to_rhs(&mut self, fb: &mut Vector, _sol: &Solution) -> Result<(), StrError> {
        self.check_connected()?;
        for m in 0..2 {
            let link = &self.links[m];
            for i in 0..self.ndim {
                let f = self.state.forces[m][i];
                fb[self.eq_rod[m][i]] -= f;
                fb[link.eqs[0][i]] += link.shape[0] * f;
                fb[link.eqs[1][i]] += link.shape[1] * f;
            }
        }
        Ok(())
    }

    fn add_to_kb(&mut self, kb: &mut dyn TangentSink, _sol: &Solution, _first_iteration: bool) -> Result<(), StrError> {
        self.check_connected()?;
        let k = self.param.ks * self.trib_length;
        for m in 0..2 {
            let (l2g, bb) = self.vertex_map(m);
            let n = l2g.len();
            let mut kk = Matrix::new(n, n);
            for a in 0..n {
                for b in 0..n {
                    let mut sum = 0.0;
                    for i in 0..self.ndim {
                        sum += bb.get(i, a) * bb.get(i, b);
                    }
                    kk.set(a, b, k * sum);
                }
            }
            assemble_tangent(kb, &kk, &l2g)?;
        }
        Ok(())
    }

    fn update(&mut self, sol: &Solution) -> Result<(), StrError> {
        self.check_connected()?;
        let k = self.param.ks * self.trib_length;
        for m in 0..2 {
            let dw = self.relative(m, &sol.delta_y);
            for i in 0..self.ndim {
                self.state.forces[m][i] += k * dw[i];
            }
        }
        Ok(())
    }

    fn symmetric_jacobian(&self) -> bool {
        true
    }

    fn out_ips_data(&self, _sol: &Solution) -> Vec<IpOutput> {
        let keys = ["fx", "fy", "fz"];
        (0..2)
            .map(|m| IpOutput {
                coords: self.coords[m].clone(),
                values: (0..self.ndim)
                    .map(|i| (keys[i].to_string(), self.state.forces[m][i]))
                    .collect(),
            })
            .collect()
    }

    fn intvars(&mut self) -> Option<&mut dyn ElementIntvars> {
        Some(self)
    }

    fn connector(&mut self) -> Option<&mut dyn ElementConnector> {
        Some(self)
    }
}

impl ElementIntvars for ElementRodJoint {
    fn init_ivs(&mut self, _sol: &Solution) -> Result<(), StrError> {
        self.state.forces = vec![vec![0.0; self.ndim]; 2];
        self.backup = self.state.clone();
        Ok(())
    }

    fn set_ivs(&mut self, values: &HashMap<String, Vec<f64>>) -> Result<(), StrError> {
        if let Some(forces) = values.get("forces") {
            if forces.len() != 2 * self.ndim {
                return Err("RodJoint requires 2 × ndim values of \"forces\"");
            }
            self.state.forces = forces.chunks(self.ndim).map(|c| c.to_vec()).collect();
        }
        Ok(())
    }

    fn backup_ivs(&mut self) {
        self.backup.clone_from(&self.state);
    }

    fn restore_ivs(&mut self) {
        self.state.clone_from(&self.backup);
    }

    fn encode_ivs(&self) -> Result<serde_json::Value, StrError> {
        serde_json::to_value(&self.state).map_err(|_| "cannot encode internal values")
    }

    fn decode_ivs(&mut self, value: &serde_json::Value) -> Result<(), StrError> {
        let state: JointState = serde_json::from_value(value.clone()).map_err(|_| "cannot decode internal values")?;
        if state.forces.len() != 2 || state.forces.iter().any(|f| f.len() != self.ndim) {
            return Err("internal values of RodJoint have incorrect dimensions");
        }
        self.state = state;
        self.backup = self.state.clone();
        Ok(())
    }
}

impl ElementConnector for ElementRodJoint {
    fn dependencies(&self) -> Vec<CellId> {
        self.param.hosts.clone()
    }

    fn connect(&mut self, cells: &HashMap<CellId, ConnectedCell>) -> Result<usize, StrError> {
        let mut links = Vec::with_capacity(2);
        for m in 0..2 {
            let x = &self.coords[m];
            let mut found = None;
            for host_id in &self.param.hosts {
                let host = cells.get(host_id).ok_or("joint dependency is not available")?;
                let (length, dir) = line_geometry(&host.coords)?;
                let proj: f64 = (0..self.ndim).map(|i| (x[i] - host.coords[0][i]) * dir[i]).sum();
                let s = proj / length;
                let dist2: f64 = (0..self.ndim)
                    .map(|i| {
                        let d = x[i] - host.coords[0][i] - proj * dir[i];
                        d * d
                    })
                    .sum();
                let tol = JOINT_TOLERANCE * length;
                if s >= -JOINT_TOLERANCE && s <= 1.0 + JOINT_TOLERANCE && dist2.sqrt() <= tol {
                    let mut eqs = Vec::with_capacity(2);
                    for vertex in &host.dofs {
                        let mut e = Vec::with_capacity(self.ndim);
                        for dof in Dof::displacements(self.ndim) {
                            e.push(find_eq(vertex, *dof)?);
                        }
                        eqs.push(e);
                    }
                    found = Some(HostLink {
                        eqs,
                        shape: [1.0 - s, s],
                    });
                    break;
                }
            }
            links.push(found.ok_or("cannot find a host cell for a joint vertex")?);
        }
        self.links = links;
        let n = 3 * self.ndim;
        Ok(2 * n * n)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{ElementRodJoint, ParamRodJoint};
    use crate::base::Dof;
    use crate::fem::{CellInput, ConnectedCell, DynCoefs, ElementTrait, Solution, Triplets};
    use gemlab::mesh::Cell;
    use gemlab::shapes::GeoKind;
    use russell_lab::{approx_eq, Vector};
    use std::collections::HashMap;

    fn joint() -> ElementRodJoint {
        let input = CellInput {
            ndim: 2,
            cell: Cell {
                id: 2,
                attribute: 3,
                kind: GeoKind::Lin2,
                points: vec![0, 1],
            },
            coords: vec![vec![0.0, 0.0], vec![2.0, 0.0]],
            face_conds: Vec::new(),
        };
        let param = ParamRodJoint { ks: 10.0, hosts: vec![1] };
        let mut ele = ElementRodJoint::new(&input, param).unwrap();
        ele.set_equations(&[vec![(Dof::Ux, 0), (Dof::Uy, 1)], vec![(Dof::Ux, 2), (Dof::Uy, 3)]])
            .unwrap();
        ele
    }

    fn host_map() -> HashMap<usize, ConnectedCell> {
        let mut cells = HashMap::new();
        cells.insert(
            1,
            ConnectedCell {
                dofs: vec![vec![(Dof::Ux, 4), (Dof::Uy, 5)], vec![(Dof::Ux, 6), (Dof::Uy, 7)]],
                coords: vec![vec![0.0, 0.0], vec![2.0, 0.0]],
            },
        );
        cells
    }

    #[test]
    fn connect_works() {
        let mut ele = joint();
        let sol = Solution::new(8, 0, true, DynCoefs::default());
        let mut fb = Vector::new(8);
        assert_eq!(
            ele.add_to_rhs(&mut fb, &sol).err(),
            Some("rod-joint must be connected before use")
        );
        assert_eq!(
            ele.connector().unwrap().connect(&HashMap::new()).err(),
            Some("joint dependency is not available")
        );
        let mut far = host_map();
        far.get_mut(&1).unwrap().coords = vec![vec![0.0, 1.0], vec![2.0, 1.0]];
        assert_eq!(
            ele.connector().unwrap().connect(&far).err(),
            Some("cannot find a host cell for a joint vertex")
        );
        let connector = ele.connector().unwrap();
        assert_eq!(connector.dependencies(), &[1]);
        assert_eq!(connector.connect(&host_map()), Ok(72));
        assert_eq!(ele.links[0].shape, [1.0, 0.0]);
        assert_eq!(ele.links[1].shape, [0.0, 1.0]);
    }

    #[test]
    fn spring_forces_work() {
        let mut ele = joint();
        ele.connector().unwrap().connect(&host_map()).unwrap();
        let mut sol = Solution::new(8, 0, true, DynCoefs::default());
        sol.delta_y[2] = 0.1; // rod end moves right; host stays
        ele.intvars().unwrap().backup_ivs();
        ele.update(&sol).unwrap();
        // k = ks · L/2 = 10
        approx_eq(ele.state.forces[1][0], 1.0, 1e-15);
        let mut fb = Vector::new(8);
        ele.add_to_rhs(&mut fb, &sol).unwrap();
        approx_eq(fb[2], -1.0, 1e-15);
        approx_eq(fb[6], 1.0, 1e-15);
        let mut kb = Triplets::new();
        ele.add_to_kb(&mut kb, &sol, true).unwrap();
        assert_eq!(kb.entries.len(), 72);
        assert!(kb.entries.contains(&(2, 6, -10.0)));

        // restore twice yields the same state
        let ivs = ele.intvars().unwrap();
        ivs.restore_ivs();
        ivs.restore_ivs();
        assert_eq!(ele.state.forces, vec![vec![0.0, 0.0], vec![0.0, 0.0]]);
    }

    #[test]
    fn intvars_work() {
        let mut ele = joint();
        let mut values = HashMap::new();
        values.insert("forces".to_string(), vec![1.0, 2.0, 3.0, 4.0]);
        let ivs = ele.intvars().unwrap();
        ivs.set_ivs(&values).unwrap();
        let encoded = ivs.encode_ivs().unwrap();
        ivs.init_ivs(&Solution::new(0, 0, true, DynCoefs::default())).unwrap();
        ivs.decode_ivs(&encoded).unwrap();
        assert_eq!(ele.state.forces, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        values.insert("forces".to_string(), vec![1.0]);
        assert_eq!(
            ele.intvars().unwrap().set_ivs(&values).err(),
            Some("RodJoint requires 2 × ndim values of \"forces\"")
        );
    }
}
