use std::collections::HashMap;
use std::fmt::Display;

use nalgebra::Point3;

use crate::error::{FemkitError, Result};

/// Simplex cell types understood by the readers and writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellType {
    Point,
    Interval,
    Triangle,
    Tetrahedron,
}

impl CellType {
    /// Topological dimension
    pub fn dim(&self) -> usize {
        match self {
            CellType::Point => 0,
            CellType::Interval => 1,
            CellType::Triangle => 2,
            CellType::Tetrahedron => 3,
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.dim() + 1
    }

    /// Name used by DOLFIN for the `celltype` attribute and the XML cell tags.
    pub fn name(&self) -> &'static str {
        match self {
            CellType::Point => "point",
            CellType::Interval => "interval",
            CellType::Triangle => "triangle",
            CellType::Tetrahedron => "tetrahedron",
        }
    }

    pub fn from_name(name: &str) -> Option<CellType> {
        match name.trim() {
            "point" | "vertex" => Some(CellType::Point),
            "interval" => Some(CellType::Interval),
            "triangle" => Some(CellType::Triangle),
            "tetrahedron" => Some(CellType::Tetrahedron),
            _ => None,
        }
    }

    pub fn from_dim(dim: usize) -> Option<CellType> {
        match dim {
            0 => Some(CellType::Point),
            1 => Some(CellType::Interval),
            2 => Some(CellType::Triangle),
            3 => Some(CellType::Tetrahedron),
            _ => None,
        }
    }

    pub fn facet_type(&self) -> Option<CellType> {
        match self {
            CellType::Point => None,
            other => CellType::from_dim(other.dim() - 1),
        }
    }
}

impl Display for CellType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Value type of a tag map, mirroring the `size_t` / `int` mesh functions of
/// the XML format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    SizeT,
    Int,
}

impl TagKind {
    /// Whether a `type` attribute found in a tag file can be loaded as this kind
    pub fn accepts(&self, type_name: &str) -> bool {
        match self {
            TagKind::SizeT => matches!(type_name, "size_t" | "uint" | "uint64"),
            TagKind::Int => matches!(type_name, "int" | "int64"),
        }
    }

    pub fn xml_name(&self) -> &'static str {
        match self {
            TagKind::SizeT => "uint",
            TagKind::Int => "int",
        }
    }
}

impl Display for TagKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TagKind::SizeT => write!(f, "size_t"),
            TagKind::Int => write!(f, "int"),
        }
    }
}

/// Sorted vertex tuple identifying a mesh entity independent of its local
/// orientation.
pub type EntityKey = Vec<usize>;

pub fn entity_key(vertices: &[usize]) -> EntityKey {
    let mut key = vertices.to_vec();
    key.sort_unstable();
    key
}

/// Geometry and simplex topology of a mesh.
///
/// Facets are numbered by first appearance: cells are walked in order and,
/// within a cell, local facet `i` is the one opposite local vertex `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    cell_type: CellType,
    gdim: usize,
    coordinates: Vec<Point3<f64>>,
    cells: Vec<Vec<usize>>,
    facets: Vec<Vec<usize>>,
}

impl Mesh {
    pub fn new(
        cell_type: CellType,
        gdim: usize,
        coordinates: Vec<Point3<f64>>,
        cells: Vec<Vec<usize>>,
    ) -> Result<Mesh> {
        if cell_type == CellType::Point {
            return Err(FemkitError::InvalidMesh(
                "point meshes are not supported".to_string(),
            ));
        }
        if gdim == 0 || gdim > 3 || gdim < cell_type.dim() {
            return Err(FemkitError::InvalidMesh(format!(
                "geometric dimension {gdim} is invalid for {cell_type} cells"
            )));
        }

        let nv = cell_type.num_vertices();
        for (i, cell) in cells.iter().enumerate() {
            if cell.len() != nv {
                return Err(FemkitError::InvalidMesh(format!(
                    "cell {i} has {} vertices, {cell_type} needs {nv}",
                    cell.len()
                )));
            }
            if let Some(v) = cell.iter().find(|v| **v >= coordinates.len()) {
                return Err(FemkitError::InvalidMesh(format!(
                    "cell {i} references vertex {v} but mesh has {} vertices",
                    coordinates.len()
                )));
            }
        }

        let facets = compute_facets(&cells);

        Ok(Mesh {
            cell_type,
            gdim,
            coordinates,
            cells,
            facets,
        })
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    /// Topological dimension
    pub fn tdim(&self) -> usize {
        self.cell_type.dim()
    }

    pub fn gdim(&self) -> usize {
        self.gdim
    }

    pub fn coordinates(&self) -> &[Point3<f64>] {
        &self.coordinates
    }

    pub fn cells(&self) -> &[Vec<usize>] {
        &self.cells
    }

    pub fn facets(&self) -> &[Vec<usize>] {
        &self.facets
    }

    pub fn num_vertices(&self) -> usize {
        self.coordinates.len()
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn num_facets(&self) -> usize {
        self.facets.len()
    }

    /// Number of entities of dimension `dim`, for the dimensions the mesh
    /// stores (vertices, facets, cells).
    pub fn num_entities(&self, dim: usize) -> Option<usize> {
        self.entities(dim).map(|e| e.len())
    }

    /// Vertex lists of all entities of dimension `dim`, if stored.
    pub fn entities(&self, dim: usize) -> Option<&[Vec<usize>]> {
        let tdim = self.tdim();
        if dim == tdim {
            Some(&self.cells)
        } else if dim + 1 == tdim {
            Some(&self.facets)
        } else {
            None
        }
    }

    /// Lookup from sorted vertex tuple to entity index.
    pub fn entity_index_map(&self, dim: usize) -> Option<HashMap<EntityKey, usize>> {
        self.entities(dim).map(|entities| {
            entities
                .iter()
                .enumerate()
                .map(|(i, e)| (entity_key(e), i))
                .collect()
        })
    }

    /// Key of local facet `local` of cell `cell`, the facet opposite its
    /// local vertex `local`.
    pub fn facet_key(&self, cell: usize, local: usize) -> Option<EntityKey> {
        let vertices = self.cells.get(cell)?;
        if local >= vertices.len() {
            return None;
        }
        let facet: Vec<usize> = vertices
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != local)
            .map(|(_, v)| *v)
            .collect();
        Some(entity_key(&facet))
    }

    /// Global facet index of local facet `local` of cell `cell`.
    ///
    /// Scans the facet list; build [`Mesh::entity_index_map`] once for
    /// repeated lookups.
    pub fn cell_facet(&self, cell: usize, local: usize) -> Option<usize> {
        let key = self.facet_key(cell, local)?;
        self.facets.iter().position(|f| *f == key)
    }
}

fn compute_facets(cells: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut seen: HashMap<EntityKey, usize> = HashMap::new();
    let mut facets: Vec<Vec<usize>> = Vec::new();

    for cell in cells {
        for local in 0..cell.len() {
            let facet: Vec<usize> = cell
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != local)
                .map(|(_, v)| *v)
                .collect();
            let key = entity_key(&facet);
            if !seen.contains_key(&key) {
                seen.insert(key.clone(), facets.len());
                facets.push(key);
            }
        }
    }

    facets
}

/// Integer tags over all entities of one dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshFunction {
    pub dim: usize,
    pub kind: TagKind,
    pub values: Vec<i64>,
}

impl MeshFunction {
    pub fn zeros(dim: usize, size: usize) -> MeshFunction {
        MeshFunction {
            dim,
            kind: TagKind::SizeT,
            values: vec![0; size],
        }
    }

    /// All-zero tags over every entity of dimension `dim` in `mesh`.
    pub fn zeros_on(mesh: &Mesh, dim: usize) -> Result<MeshFunction> {
        let size = mesh.num_entities(dim).ok_or_else(|| {
            FemkitError::InvalidMesh(format!("mesh does not store entities of dimension {dim}"))
        })?;
        Ok(MeshFunction::zeros(dim, size))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_all_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0)
    }

    /// Distinct tag values in ascending order
    pub fn tags(&self) -> Vec<i64> {
        let mut tags = self.values.clone();
        tags.sort_unstable();
        tags.dedup();
        tags
    }
}

/// A mesh together with its cell (subdomain) and facet (boundary) tags.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshBundle {
    pub mesh: Mesh,
    pub subdomains: MeshFunction,
    pub boundaries: MeshFunction,
}

impl MeshBundle {
    /// Bundle with all-zero subdomain and boundary tags.
    pub fn untagged(mesh: Mesh) -> Result<MeshBundle> {
        let subdomains = MeshFunction::zeros_on(&mesh, mesh.tdim())?;
        let boundaries = MeshFunction::zeros_on(&mesh, mesh.tdim() - 1)?;
        Ok(MeshBundle {
            mesh,
            subdomains,
            boundaries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Mesh {
        let coordinates = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let cells = vec![vec![0, 1, 2], vec![0, 2, 3]];
        Mesh::new(CellType::Triangle, 2, coordinates, cells).unwrap()
    }

    #[test]
    fn facets_are_shared_between_cells() {
        let mesh = unit_square();
        assert_eq!(mesh.num_facets(), 5);
        assert_eq!(mesh.facets()[0], vec![1, 2]);
        assert_eq!(mesh.num_entities(1), Some(5));
        assert_eq!(mesh.num_entities(2), Some(2));
    }

    #[test]
    fn cell_facet_resolves_shared_diagonal() {
        let mesh = unit_square();
        // diagonal 0-2 is opposite vertex 1 in cell 0 and vertex 2 in cell 1
        let a = mesh.cell_facet(0, 1).unwrap();
        let b = mesh.cell_facet(1, 2).unwrap();
        assert_eq!(a, b);
        assert_eq!(mesh.facets()[a], vec![0, 2]);
    }

    #[test]
    fn facet_keys_agree_with_index_map() {
        let mesh = unit_square();
        let index = mesh.entity_index_map(1).unwrap();
        for cell in 0..mesh.num_cells() {
            for local in 0..3 {
                let key = mesh.facet_key(cell, local).unwrap();
                assert_eq!(index.get(&key).copied(), mesh.cell_facet(cell, local));
            }
        }
        assert_eq!(mesh.facet_key(0, 3), None);
        assert_eq!(mesh.facet_key(2, 0), None);
    }

    #[test]
    fn rejects_out_of_range_vertices() {
        let coordinates = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let err = Mesh::new(CellType::Interval, 1, coordinates, vec![vec![0, 2]]);
        assert!(matches!(err, Err(FemkitError::InvalidMesh(_))));
    }

    #[test]
    fn untagged_bundle_covers_all_entities() {
        let bundle = MeshBundle::untagged(unit_square()).unwrap();
        assert_eq!(bundle.subdomains.len(), 2);
        assert_eq!(bundle.boundaries.len(), 5);
        assert!(bundle.subdomains.is_all_zero());
        assert!(bundle.boundaries.is_all_zero());
    }

    #[test]
    fn tag_kinds_accept_their_type_names() {
        assert!(TagKind::SizeT.accepts("uint"));
        assert!(TagKind::SizeT.accepts("size_t"));
        assert!(!TagKind::SizeT.accepts("int"));
        assert!(TagKind::Int.accepts("int"));
        assert!(!TagKind::Int.accepts("double"));
    }
}
