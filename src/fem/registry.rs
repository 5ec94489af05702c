use super::{CellInput, ElementInfo, ElementTrait};
use super::{ElementPorousRod, ElementRod, ElementRodJoint, ElementSeepage};
use crate::base::ElementData;
use crate::StrError;
use std::collections::HashMap;

/// Defines the function returning the DOFs of an element (before allocation)
pub type InfoFn = fn(&CellInput) -> Result<ElementInfo, StrError>;

/// Defines the function allocating an element
pub type AllocFn = fn(&CellInput, &ElementData) -> Result<Box<dyn ElementTrait>, StrError>;

/// Holds the element types available to the domain
///
/// Elements are registered by name. The name is the `kind` field in [ElementData].
pub struct ElementRegistry {
    entries: HashMap<String, (InfoFn, AllocFn)>,
}

impl ElementRegistry {
    /// Allocates an empty registry
    pub fn new() -> Self {
        ElementRegistry {
            entries: HashMap::new(),
        }
    }

    /// Allocates a registry with the built-in elements
    ///
    /// * `rod` -- [ElementRod]
    /// * `seepage` -- [ElementSeepage]
    /// * `porous-rod` -- [ElementPorousRod]
    /// * `rod-joint` -- [ElementRodJoint]
    pub fn with_defaults() -> Self {
        let mut registry = ElementRegistry::new();
        registry
            .register("rod", ElementRod::info, ElementRod::allocate)
            .register("seepage", ElementSeepage::info, ElementSeepage::allocate)
            .register("porous-rod", ElementPorousRod::info, ElementPorousRod::allocate)
            .register("rod-joint", ElementRodJoint::info, ElementRodJoint::allocate);
        registry
    }

    /// Registers (or replaces) an element type
    pub fn register(&mut self, name: &str, info: InfoFn, allocate: AllocFn) -> &mut Self {
        self.entries.insert(name.to_string(), (info, allocate));
        self
    }

    /// Indicates whether an element type is available
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns the DOFs information of an element
    pub fn info(&self, name: &str, input: &CellInput) -> Result<ElementInfo, StrError> {
        let (info, _) = self
            .entries
            .get(name)
            .ok_or("element type is not available in the registry")?;
        info(input)
    }

    /// Allocates an element
    pub fn allocate(&self, input: &CellInput, data: &ElementData) -> Result<Box<dyn ElementTrait>, StrError> {
        let (_, allocate) = self
            .entries
            .get(&data.kind)
            .ok_or("element type is not available in the registry")?;
        allocate(input, data)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::ElementRegistry;
    use crate::base::{Dof, ElementData};
    use crate::fem::{CellInput, ElementInfo, ElementTrait};
    use crate::StrError;
    use gemlab::mesh::Cell;
    use gemlab::shapes::GeoKind;
    use serde_json::json;

    fn sample_input() -> CellInput {
        CellInput {
            ndim: 2,
            cell: Cell {
                id: 0,
                attribute: 1,
                kind: GeoKind::Lin2,
                points: vec![0, 1],
            },
            coords: vec![vec![0.0, 0.0], vec![1.0, 0.0]],
            face_conds: Vec::new(),
        }
    }

    fn bad_info(_: &CellInput) -> Result<ElementInfo, StrError> {
        Err("bad element")
    }

    fn bad_alloc(_: &CellInput, _: &ElementData) -> Result<Box<dyn ElementTrait>, StrError> {
        Err("bad element")
    }

    #[test]
    fn registry_captures_errors() {
        let mut registry = ElementRegistry::new();
        let input = sample_input();
        let data = ElementData::new("rod", &json!({"young": 1.0, "area": 1.0})).unwrap();
        assert_eq!(
            registry.info("rod", &input).err(),
            Some("element type is not available in the registry")
        );
        assert_eq!(
            registry.allocate(&input, &data).err(),
            Some("element type is not available in the registry")
        );
        registry.register("rod", bad_info, bad_alloc);
        assert_eq!(registry.info("rod", &input).err(), Some("bad element"));
        assert_eq!(registry.allocate(&input, &data).err(), Some("bad element"));
    }

    #[test]
    fn with_defaults_works() {
        let registry = ElementRegistry::with_defaults();
        for name in ["rod", "seepage", "porous-rod", "rod-joint"] {
            assert!(registry.contains(name));
        }
        let info = registry.info("rod", &sample_input()).unwrap();
        assert_eq!(info.dofs, vec![vec![Dof::Ux, Dof::Uy], vec![Dof::Ux, Dof::Uy]]);
        assert!(!info.is_joint);
        let data = ElementData::new("rod", &json!({"young": 1.0, "area": 1.0})).unwrap();
        let element = registry.allocate(&sample_input(), &data).unwrap();
        assert!(element.symmetric_jacobian());
    }
}
