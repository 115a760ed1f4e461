use nalgebra::Point3;

use crate::datatypes::{CellType, Mesh, MeshBundle, MeshFunction};
use crate::error::{FemkitError, Result};

pub const BOTTOM: i64 = 1;
pub const RIGHT: i64 = 2;
pub const TOP: i64 = 3;
pub const LEFT: i64 = 4;

/// Triangulates the rectangle spanned by `p0` and `p1` with `nx` × `ny`
/// squares, each split along its rising diagonal.
///
/// Boundary facets are tagged bottom 1, right 2, top 3, left 4; cells are
/// left untagged.
pub fn rectangle_mesh(p0: [f64; 2], p1: [f64; 2], nx: usize, ny: usize) -> Result<MeshBundle> {
    if nx == 0 || ny == 0 {
        return Err(FemkitError::InvalidMesh(format!(
            "rectangle needs at least one cell per direction, got {nx}x{ny}"
        )));
    }
    if !(p1[0] > p0[0] && p1[1] > p0[1]) {
        return Err(FemkitError::InvalidMesh(format!(
            "degenerate rectangle {p0:?} - {p1:?}"
        )));
    }

    let hx = (p1[0] - p0[0]) / nx as f64;
    let hy = (p1[1] - p0[1]) / ny as f64;
    let vertex = |i: usize, j: usize| j * (nx + 1) + i;

    let mut coordinates: Vec<Point3<f64>> = Vec::with_capacity((nx + 1) * (ny + 1));
    for j in 0..=ny {
        for i in 0..=nx {
            let x = if i == nx { p1[0] } else { p0[0] + i as f64 * hx };
            let y = if j == ny { p1[1] } else { p0[1] + j as f64 * hy };
            coordinates.push(Point3::new(x, y, 0.0));
        }
    }

    let mut cells: Vec<Vec<usize>> = Vec::with_capacity(2 * nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            let v0 = vertex(i, j);
            let v1 = vertex(i + 1, j);
            let v2 = vertex(i + 1, j + 1);
            let v3 = vertex(i, j + 1);
            cells.push(vec![v0, v1, v2]);
            cells.push(vec![v0, v2, v3]);
        }
    }

    let mesh = Mesh::new(CellType::Triangle, 2, coordinates, cells)?;

    let grid = |v: usize| (v % (nx + 1), v / (nx + 1));
    let mut boundaries = MeshFunction::zeros_on(&mesh, 1)?;
    for (f, facet) in mesh.facets().iter().enumerate() {
        let (ia, ja) = grid(facet[0]);
        let (ib, jb) = grid(facet[1]);
        boundaries.values[f] = if ja == 0 && jb == 0 {
            BOTTOM
        } else if ia == nx && ib == nx {
            RIGHT
        } else if ja == ny && jb == ny {
            TOP
        } else if ia == 0 && ib == 0 {
            LEFT
        } else {
            0
        };
    }

    let subdomains = MeshFunction::zeros_on(&mesh, 2)?;

    Ok(MeshBundle {
        mesh,
        subdomains,
        boundaries,
    })
}
