use gemlab::mesh::{Cell, Mesh, Point};
use gemlab::shapes::GeoKind;

/// Holds samples of meshes made of line cells
pub struct SampleMeshes {}

impl SampleMeshes {
    /// Returns a 2D mesh with a single horizontal rod of given length
    ///
    /// ```text
    ///  0-----[0](1)-----1  → x
    ///  0.0              L
    /// ```
    ///
    /// `[#]` indicates id and `(#)` indicates attribute
    pub fn one_rod(length: f64) -> Mesh {
        Mesh {
            ndim: 2,
            points: vec![
                Point { id: 0, marker: 0, coords: vec![0.0, 0.0] },
                Point { id: 1, marker: 0, coords: vec![length, 0.0] },
            ],
            cells: vec![Cell { id: 0, attribute: 1, kind: GeoKind::Lin2, points: vec![0, 1] }],
        }
    }

    /// Returns a 2D mesh with two horizontal rods that do not share points
    ///
    /// ```text
    ///  0-----[0](1)-----1   2-----[1](1)-----3  → x
    ///  0.0             1.0  1.0             2.0
    /// ```
    ///
    /// Points 1 and 2 are at the same location and are meant to be connected by a rigid link.
    pub fn two_rods_apart() -> Mesh {
        Mesh {
            ndim: 2,
            points: vec![
                Point { id: 0, marker: 0, coords: vec![0.0, 0.0] },
                Point { id: 1, marker: 0, coords: vec![1.0, 0.0] },
                Point { id: 2, marker: 0, coords: vec![1.0, 0.0] },
                Point { id: 3, marker: 0, coords: vec![2.0, 0.0] },
            ],
            cells: vec![
                Cell { id: 0, attribute: 1, kind: GeoKind::Lin2, points: vec![0, 1] },
                Cell { id: 1, attribute: 1, kind: GeoKind::Lin2, points: vec![2, 3] },
            ],
        }
    }

    /// Returns a 2D mesh with a vertical column of line cells from y = 0 to y = height
    ///
    /// ```text
    ///  n  ← y = height
    ///  |
    /// ...
    ///  |
    ///  1
    ///  |  [0](1)
    ///  0  ← y = 0
    /// ```
    ///
    /// The cells are numbered from the bottom to the top; all have attribute 1.
    pub fn column(ncell: usize, height: f64) -> Mesh {
        let h = height / (ncell as f64);
        let points = (0..(ncell + 1))
            .map(|i| Point {
                id: i,
                marker: 0,
                coords: vec![0.0, (i as f64) * h],
            })
            .collect();
        let cells = (0..ncell)
            .map(|i| Cell {
                id: i,
                attribute: 1,
                kind: GeoKind::Lin2,
                points: vec![i, i + 1],
            })
            .collect();
        Mesh { ndim: 2, points, cells }
    }

    /// Returns a 2D mesh with two rods in sequence, each with a different attribute
    ///
    /// ```text
    ///  0-----[0](1)-----1-----[1](2)-----2  → x
    ///  0.0             1.0              2.0
    /// ```
    pub fn two_rods_in_sequence() -> Mesh {
        Mesh {
            ndim: 2,
            points: vec![
                Point { id: 0, marker: 0, coords: vec![0.0, 0.0] },
                Point { id: 1, marker: 0, coords: vec![1.0, 0.0] },
                Point { id: 2, marker: 0, coords: vec![2.0, 0.0] },
            ],
            cells: vec![
                Cell { id: 0, attribute: 1, kind: GeoKind::Lin2, points: vec![0, 1] },
                Cell { id: 1, attribute: 2, kind: GeoKind::Lin2, points: vec![1, 2] },
            ],
        }
    }

    /// Returns a 2D mesh with a bar embedded in a host rod through a joint cell
    ///
    /// ```text
    ///  host:   2----------[1](2)----------3
    ///  bar:    0----------[0](1)----------1
    ///  joint:  0----------[2](3)----------1
    ///         0.0                        2.0
    /// ```
    ///
    /// The bar and the host occupy the same location but do not share points.
    /// The joint cell uses the points of the bar.
    pub fn bar_in_host() -> Mesh {
        Mesh {
            ndim: 2,
            points: vec![
                Point { id: 0, marker: 0, coords: vec![0.0, 0.0] },
                Point { id: 1, marker: 0, coords: vec![2.0, 0.0] },
                Point { id: 2, marker: 0, coords: vec![0.0, 0.0] },
                Point { id: 3, marker: 0, coords: vec![2.0, 0.0] },
            ],
            cells: vec![
                Cell { id: 0, attribute: 1, kind: GeoKind::Lin2, points: vec![0, 1] },
                Cell { id: 1, attribute: 2, kind: GeoKind::Lin2, points: vec![2, 3] },
                Cell { id: 2, attribute: 3, kind: GeoKind::Lin2, points: vec![0, 1] },
            ],
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
