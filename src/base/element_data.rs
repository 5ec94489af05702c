use crate::StrError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Holds the data of the elements associated with a cell attribute
///
/// The parameters are kept as a JSON value and decoded by each element
/// type into its own parameters structure.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ElementData {
    /// Element type name in the registry (e.g., "rod")
    pub kind: String,

    /// Element parameters (material data, cross-sectional area, etc.)
    pub params: serde_json::Value,

    /// The elements start inactive (they may be activated by a later stage)
    #[serde(default)]
    pub inactive: bool,
}

impl ElementData {
    /// Allocates a new instance with the given parameters structure
    pub fn new<T: Serialize>(kind: &str, params: &T) -> Result<Self, StrError> {
        let params = serde_json::to_value(params).map_err(|_| "cannot serialize element parameters")?;
        Ok(ElementData {
            kind: kind.to_string(),
            params,
            inactive: false,
        })
    }

    /// Sets the inactive flag
    pub fn set_inactive(mut self, flag: bool) -> Self {
        self.inactive = flag;
        self
    }

    /// Decodes the parameters structure
    pub fn params<T: DeserializeOwned>(&self) -> Result<T, StrError> {
        serde_json::from_value(self.params.clone()).map_err(|_| "cannot decode element parameters")
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
