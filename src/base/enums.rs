use crate::StrError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Defines degrees-of-freedom (DOF) types
///
/// Note: The fixed numbering scheme assists in sorting the DOFs.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Deserialize, Serialize)]
pub enum Dof {
    /// Displacement along the first dimension
    Ux = 0,

    /// Displacement along the second dimension
    Uy = 1,

    /// Displacement along the third dimension
    Uz = 2,

    /// Rotation around the first axis
    Rx = 3,

    /// Rotation around the second axis
    Ry = 4,

    /// Rotation around the third axis
    Rz = 5,

    /// Liquid pressure
    Pl = 6,

    /// Gas pressure
    Pg = 7,

    /// Liquid flux leaving a seepage face
    ///
    /// This freedom only exists at vertices of faces with a seepage condition.
    Fl = 8,
}

impl Dof {
    /// Returns the key of this DOF (e.g., "ux")
    pub fn key(&self) -> &'static str {
        match self {
            Dof::Ux => "ux",
            Dof::Uy => "uy",
            Dof::Uz => "uz",
            Dof::Rx => "rx",
            Dof::Ry => "ry",
            Dof::Rz => "rz",
            Dof::Pl => "pl",
            Dof::Pg => "pg",
            Dof::Fl => "fl",
        }
    }

    /// Returns the key of the natural (force/flux) quantity conjugated to this DOF
    ///
    /// Returns None if the DOF has no conjugated natural quantity.
    pub fn natural_key(&self) -> Option<&'static str> {
        match self {
            Dof::Ux => Some("fx"),
            Dof::Uy => Some("fy"),
            Dof::Uz => Some("fz"),
            Dof::Rx => Some("mx"),
            Dof::Ry => Some("my"),
            Dof::Rz => Some("mz"),
            Dof::Pl => Some("ql"),
            Dof::Pg => Some("qg"),
            Dof::Fl => None,
        }
    }

    /// Returns the displacement DOFs for a given space dimension
    pub fn displacements(ndim: usize) -> &'static [Dof] {
        if ndim == 3 {
            &[Dof::Ux, Dof::Uy, Dof::Uz]
        } else {
            &[Dof::Ux, Dof::Uy]
        }
    }
}

impl FromStr for Dof {
    type Err = StrError;
    fn from_str(key: &str) -> Result<Self, Self::Err> {
        match key {
            "ux" => Ok(Dof::Ux),
            "uy" => Ok(Dof::Uy),
            "uz" => Ok(Dof::Uz),
            "rx" => Ok(Dof::Rx),
            "ry" => Ok(Dof::Ry),
            "rz" => Ok(Dof::Rz),
            "pl" => Ok(Dof::Pl),
            "pg" => Ok(Dof::Pg),
            "fl" => Ok(Dof::Fl),
            _ => Err("DOF key is unknown"),
        }
    }
}

impl fmt::Display for Dof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Defines essential boundary conditions (resolved into constraint rows)
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub enum EssentialKey {
    /// Prescribed value of a DOF (single-point constraint)
    Dof(Dof),

    /// Prescribed hydraulic head H(t) converted into a liquid pressure
    ///
    /// ```text
    /// pl(t) = γl · H(t) - γl · z
    /// ```
    ///
    /// where `γl` is the unit weight of the liquid and `z` the vertical coordinate.
    HydraulicHead { gamma_l: f64 },

    /// Rigid link between the first node and all other nodes of the condition
    ///
    /// One constraint row `u_first - u_other = 0` is added for each matching DOF.
    Rigid,

    /// Inclined support (2D only) with the support direction given by `alpha` (degrees)
    ///
    /// ```text
    /// cos(α) ux + sin(α) uy = 0
    /// ```
    IncSup { alpha: f64 },
}

impl EssentialKey {
    /// Indicates whether the constraint can be overridden by a newer one on the same equation
    pub fn overridable(&self) -> bool {
        match self {
            EssentialKey::Rigid | EssentialKey::IncSup { .. } => false,
            _ => true,
        }
    }
}

/// Defines natural boundary conditions (NBC) applied to cell faces
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum Nbc {
    /// Normal distributed load
    Qn,

    /// Liquid flux (inflow is positive)
    Ql,

    /// Seepage face with the function giving the maximum liquid pressure
    ///
    /// Liquid may leave the domain through the face only if the pressure reaches
    /// the prescribed limit. Adds the [Dof::Fl] freedom to the vertices of the face.
    Seepage,
}

/// Defines point boundary conditions (e.g., point loads)
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum Pbc {
    /// Concentrated load parallel to x
    Fx,

    /// Concentrated load parallel to y
    Fy,

    /// Concentrated load parallel to z
    Fz,

    /// Concentrated moment around x
    Mx,

    /// Concentrated moment around y
    My,

    /// Concentrated moment around z
    Mz,

    /// Concentrated liquid flux (inflow is positive)
    Ql,
}

impl Pbc {
    /// Returns the DOF corresponding to the concentrated load
    pub fn dof(&self) -> Dof {
        match self {
            Pbc::Fx => Dof::Ux,
            Pbc::Fy => Dof::Uy,
            Pbc::Fz => Dof::Uz,
            Pbc::Mx => Dof::Rx,
            Pbc::My => Dof::Ry,
            Pbc::Mz => Dof::Rz,
            Pbc::Ql => Dof::Pl,
        }
    }
}

/// Defines element conditions (body forces and sources)
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum EleCond {
    /// Gravity acceleration (acting against the last coordinate axis)
    Gravity,

    /// Liquid source per unit volume
    Source,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
