use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::ProgressBar;
use nalgebra::Point3;
use serde::Deserialize;
use tracing::{info, warn};

use crate::cluster::ensure_dir;
use crate::datatypes::{entity_key, CellType, Mesh, MeshBundle, MeshFunction};
use crate::error::{FemkitError, Result};
use crate::hdf5_io;
use crate::params::ParameterSet;

pub const BOTTOM_TAG: i64 = 1;
pub const RIGHT_TAG: i64 = 2;
pub const TOP_TAG: i64 = 3;
pub const LEFT_TAG: i64 = 4;
pub const COLLAGEN_TAG: i64 = 5;
pub const HEALTHY_TAG: i64 = 6;

const COARSE_LENGTH: f64 = 0.5;
const UNREFINE_LENGTH: f64 = 1.0;
const EPS: f64 = 1e-10;

/// `mesh` section of the parameter file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FibroParameters {
    /// Lattice spacing in y
    pub a: f64,
    /// Lattice spacing in x
    pub b: f64,
    /// Collagen fraction of `a`
    pub theta_c: f64,
    /// Collagen fraction of `b`
    pub theta_f: f64,
    pub base: f64,
    #[serde(rename = "altura")]
    pub height: f64,
    #[serde(rename = "desp")]
    pub offset: f64,
}

/// `io` section entries used by the mesher.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MeshIoParameters {
    pub results: PathBuf,
    #[serde(default = "default_mesh_dir")]
    pub meshes: PathBuf,
}

fn default_mesh_dir() -> PathBuf {
    PathBuf::from("meshes")
}

impl FibroParameters {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("a", self.a),
            ("b", self.b),
            ("base", self.base),
            ("altura", self.height),
        ] {
            if !(value > 0.0) {
                return Err(FemkitError::Mesher(format!(
                    "mesh.{name} must be positive, got {value}"
                )));
            }
        }
        for (name, value) in [("theta_c", self.theta_c), ("theta_f", self.theta_f)] {
            if !(value > 0.0 && value < 1.0) {
                return Err(FemkitError::Mesher(format!(
                    "mesh.{name} must lie in (0, 1), got {value}"
                )));
            }
        }
        if !(self.offset >= 0.0) {
            return Err(FemkitError::Mesher(format!(
                "mesh.desp must not be negative, got {}",
                self.offset
            )));
        }
        Ok(())
    }

    /// Base name of the generated mesh files
    pub fn output_name(&self) -> String {
        format!(
            "fibro_{}x{}_{}_{}_{}_{}",
            self.base as i64,
            self.height as i64,
            (self.a * 10.0) as i64,
            (self.b * 10.0) as i64,
            (self.theta_c * 100.0) as i64,
            (self.theta_f * 100.0) as i64
        )
    }

    /// Characteristic length on the collagen inclusions
    pub fn inclusion_length(&self) -> f64 {
        if self.theta_c < self.theta_f {
            self.theta_c * self.a
        } else {
            self.theta_f * self.b
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    fn contains(&self, x: f64, y: f64, margin: f64) -> bool {
        x >= self.x0 - margin && x <= self.x1 + margin && y >= self.y0 - margin && y <= self.y1 + margin
    }
}

/// Rectangular domain with a lattice of collagen inclusions.
#[derive(Debug, Clone, PartialEq)]
pub struct FibroGeometry {
    pub base: f64,
    pub height: f64,
    pub inclusion_length: f64,
    pub inclusions: Vec<Rect>,
    /// Points in the healthy tissue where the mesh may be coarse
    pub coarse_points: Vec<[f64; 2]>,
}

fn lattice_count(extent: f64, spacing: f64, offset: f64, theta: f64) -> i64 {
    (extent / spacing - offset / theta / spacing).floor() as i64
}

impl FibroGeometry {
    pub fn new(params: &FibroParameters) -> Result<FibroGeometry> {
        params.validate()?;

        let nx = lattice_count(params.base, params.b, params.offset, params.theta_f);
        let ny = lattice_count(params.height, params.a, params.offset, params.theta_c);

        let mut inclusions: Vec<Rect> = Vec::new();
        let mut dropped: usize = 0;
        for px in 0..=nx {
            for py in 0..=ny {
                let x0 = px as f64 * params.b + params.offset;
                let y0 = py as f64 * params.a + params.offset;
                let rect = Rect {
                    x0,
                    y0,
                    x1: x0 + params.b * params.theta_f,
                    y1: y0 + params.a * params.theta_c,
                };
                let inside = rect.x0 > EPS
                    && rect.y0 > EPS
                    && rect.x1 < params.base - EPS
                    && rect.y1 < params.height - EPS;
                if inside {
                    inclusions.push(rect);
                } else {
                    dropped += 1;
                }
            }
        }
        if dropped > 0 {
            warn!("dropped {dropped} inclusions touching the domain boundary");
        }

        let inclusion_length = params.inclusion_length();
        let ys: Vec<f64> = (1..(params.height * 3.0) as i64)
            .map(|k| 0.33 * k as f64)
            .collect();
        let xs: Vec<f64> = (1..(params.base / params.b) as i64)
            .map(|k| {
                params.offset + params.b * (params.theta_f + 1.0) / 2.0 - params.b
                    + params.b * k as f64
            })
            .collect();

        let mut coarse_points: Vec<[f64; 2]> = Vec::new();
        for y in &ys {
            for x in &xs {
                let in_domain = *x > EPS && *x < params.base - EPS && *y > EPS && *y < params.height - EPS;
                let in_inclusion = inclusions
                    .iter()
                    .any(|r| r.contains(*x, *y, EPS));
                if in_domain && !in_inclusion {
                    coarse_points.push([*x, *y]);
                }
            }
        }

        Ok(FibroGeometry {
            base: params.base,
            height: params.height,
            inclusion_length,
            inclusions,
            coarse_points,
        })
    }
}

/// Builds the Gmsh geometry script of a fibrotic domain
///
/// # Arguments
/// * `geometry` - The domain with its collagen inclusions
///
/// # Returns
/// The contents of the .geo file
pub fn build_geo(geometry: &FibroGeometry) -> Result<String> {
    let mut geo = String::new();
    let fmt_err = |_| FemkitError::Mesher("failed to format .geo script".to_string());

    // Outer boundary
    writeln!(geo, "// Define outer points").map_err(fmt_err)?;
    let corners = [
        [0.0, 0.0],
        [geometry.base, 0.0],
        [geometry.base, geometry.height],
        [0.0, geometry.height],
    ];
    for (i, corner) in corners.iter().enumerate() {
        writeln!(
            geo,
            "Point({}) = {{ {}, {}, 0, {} }};",
            i + 1,
            corner[0],
            corner[1],
            COARSE_LENGTH
        )
        .map_err(fmt_err)?;
    }
    writeln!(geo, "\n// Outer lines: bottom, right, top, left").map_err(fmt_err)?;
    for i in 0..4 {
        writeln!(geo, "Line({}) = {{ {}, {} }};", i + 1, i + 1, (i + 1) % 4 + 1).map_err(fmt_err)?;
    }
    writeln!(geo, "Line Loop(1) = {{ 1, 2, 3, 4 }};").map_err(fmt_err)?;

    // Inclusions: points and lines 5.. in blocks of four, loop/surface 2..
    writeln!(geo, "\n// Collagen inclusions").map_err(fmt_err)?;
    let mut inclusion_surfaces: Vec<usize> = Vec::with_capacity(geometry.inclusions.len());
    for (k, rect) in geometry.inclusions.iter().enumerate() {
        let first = 5 + 4 * k;
        let corners = [
            [rect.x0, rect.y0],
            [rect.x1, rect.y0],
            [rect.x1, rect.y1],
            [rect.x0, rect.y1],
        ];
        for (i, corner) in corners.iter().enumerate() {
            writeln!(
                geo,
                "Point({}) = {{ {}, {}, 0, {} }};",
                first + i,
                corner[0],
                corner[1],
                geometry.inclusion_length
            )
            .map_err(fmt_err)?;
        }
        for i in 0..4 {
            writeln!(
                geo,
                "Line({}) = {{ {}, {} }};",
                first + i,
                first + i,
                first + (i + 1) % 4
            )
            .map_err(fmt_err)?;
        }
        let surface = k + 2;
        writeln!(
            geo,
            "Line Loop({surface}) = {{ {}, {}, {}, {} }};",
            first,
            first + 1,
            first + 2,
            first + 3
        )
        .map_err(fmt_err)?;
        writeln!(geo, "Plane Surface({surface}) = {{ {surface} }};").map_err(fmt_err)?;
        inclusion_surfaces.push(surface);
    }

    // Healthy tissue: outer loop with the inclusions as holes
    let loops: Vec<String> = std::iter::once(1)
        .chain(inclusion_surfaces.iter().copied())
        .map(|l| l.to_string())
        .collect();
    writeln!(geo, "\n// Define surface").map_err(fmt_err)?;
    writeln!(geo, "Plane Surface(1) = {{ {} }};", loops.join(", ")).map_err(fmt_err)?;

    if !geometry.coarse_points.is_empty() {
        writeln!(geo, "\n// Coarsening points").map_err(fmt_err)?;
        let first = 5 + 4 * geometry.inclusions.len();
        let mut ids: Vec<String> = Vec::with_capacity(geometry.coarse_points.len());
        for (i, point) in geometry.coarse_points.iter().enumerate() {
            writeln!(
                geo,
                "Point({}) = {{ {}, {}, 0, {} }};",
                first + i,
                point[0],
                point[1],
                UNREFINE_LENGTH
            )
            .map_err(fmt_err)?;
            ids.push((first + i).to_string());
        }
        writeln!(geo, "Point{{ {} }} In Surface{{ 1 }};", ids.join(", ")).map_err(fmt_err)?;
    }

    writeln!(geo, "\n// Physical groups").map_err(fmt_err)?;
    for (line, tag) in [(1, BOTTOM_TAG), (2, RIGHT_TAG), (3, TOP_TAG), (4, LEFT_TAG)] {
        writeln!(geo, "Physical Line({tag}) = {{ {line} }};").map_err(fmt_err)?;
    }
    if !inclusion_surfaces.is_empty() {
        let surfaces: Vec<String> = inclusion_surfaces.iter().map(|s| s.to_string()).collect();
        writeln!(
            geo,
            "Physical Surface({COLLAGEN_TAG}) = {{ {} }};",
            surfaces.join(", ")
        )
        .map_err(fmt_err)?;
    }
    writeln!(geo, "Physical Surface({HEALTHY_TAG}) = {{ 1 }};").map_err(fmt_err)?;

    writeln!(
        geo,
        "\n// Define Mesh Settings\n\
        Mesh.ElementOrder = 1;\n\
        Mesh.MshFileVersion = 2.2;"
    )
    .map_err(fmt_err)?;

    Ok(geo)
}

/// Runs Gmsh on a .geo file
///
/// # Arguments
/// * `gmsh` - The Gmsh executable
/// * `geo_file` - The input .geo file
/// * `output` - The output filepath of the .msh file
pub fn compute_mesh(gmsh: &str, geo_file: &Path, output: &Path) -> Result<()> {
    info!("running {gmsh} on {}", geo_file.display());

    let spinner = ProgressBar::new_spinner();
    spinner.set_message("meshing with gmsh...");
    spinner.enable_steady_tick(Duration::from_millis(120));

    let result = std::process::Command::new(gmsh)
        .arg(geo_file)
        .arg("-2")
        .arg("-format")
        .arg("msh2")
        .arg("-o")
        .arg(output)
        .output();
    spinner.finish_and_clear();

    let output_status = match result {
        Ok(out) => out,
        Err(err) => return Err(FemkitError::Mesher(format!("Gmsh failed: {err}"))),
    };
    if !output_status.status.success() {
        return Err(FemkitError::Mesher(format!(
            "Gmsh exited with {}: {}",
            output_status.status,
            String::from_utf8_lossy(&output_status.stderr).trim()
        )));
    }
    if !output.is_file() {
        return Err(FemkitError::Mesher(format!(
            "Gmsh did not produce {}",
            output.display()
        )));
    }

    Ok(())
}

enum MeshParseState {
    Format,
    Nodes,
    Elements,
    Limbo,
}

/// Gmsh element type, node count and topological dimension
fn element_shape(element_type: usize) -> Option<(usize, usize)> {
    match element_type {
        15 => Some((1, 0)),
        1 => Some((2, 1)),
        2 => Some((3, 2)),
        4 => Some((4, 3)),
        _ => None,
    }
}

fn to_index(value: i64, what: &str, path: &Path, line_no: usize) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| FemkitError::parse(path, format!("line {line_no}: invalid {what} {value}")))
}

struct RawElement {
    dim: usize,
    tag: i64,
    nodes: Vec<usize>,
}

fn parse_numbers<T: std::str::FromStr>(line: &str, path: &Path, line_no: usize) -> Result<Vec<T>> {
    line.split_whitespace()
        .map(|token| {
            token.parse::<T>().map_err(|_| {
                FemkitError::parse(path, format!("line {line_no}: unexpected token `{token}`"))
            })
        })
        .collect()
}

/// Parses a MSH 2.2 file into a tagged mesh
///
/// # Arguments
/// * `mesh_file` - The path to the mesh file
///
/// # Returns
/// A bundle whose cells carry the physical surface tags and whose facets
/// carry the physical line tags.
pub fn parse_mesh(mesh_file: &Path) -> Result<MeshBundle> {
    let contents = match std::fs::read_to_string(mesh_file) {
        Ok(c) => c,
        Err(_) => return Err(FemkitError::FileNotFound(mesh_file.to_path_buf())),
    };

    let mut parser_state = MeshParseState::Limbo;
    let mut parsed_section_metadata = false;

    let mut node_index: HashMap<usize, usize> = HashMap::new();
    let mut coordinates: Vec<Point3<f64>> = Vec::new();
    let mut elements: Vec<RawElement> = Vec::new();

    for (line_no, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with("$End") {
            parser_state = MeshParseState::Limbo;
            continue;
        }

        match parser_state {
            MeshParseState::Limbo => {
                parsed_section_metadata = false;

                if line.starts_with("$MeshFormat") {
                    parser_state = MeshParseState::Format;
                } else if line.starts_with("$Nodes") {
                    parser_state = MeshParseState::Nodes;
                } else if line.starts_with("$Elements") {
                    parser_state = MeshParseState::Elements;
                }
                continue;
            }
            MeshParseState::Format => {
                let version = line.split_whitespace().next().unwrap_or_default();
                if !version.starts_with("2.") {
                    return Err(FemkitError::parse(
                        mesh_file,
                        format!("MSH version {version} is not supported, write version 2.2"),
                    ));
                }
            }
            MeshParseState::Nodes => {
                if !parsed_section_metadata {
                    parsed_section_metadata = true;
                    continue;
                }

                let (id, xyz) = line.split_once(char::is_whitespace).ok_or_else(|| {
                    FemkitError::parse(mesh_file, format!("line {line_no}: truncated node"))
                })?;
                let id = parse_numbers::<usize>(id, mesh_file, line_no)?[0];
                let xyz: Vec<f64> = parse_numbers(xyz, mesh_file, line_no)?;
                if xyz.len() != 3 {
                    return Err(FemkitError::parse(
                        mesh_file,
                        format!("line {line_no}: expected node id and 3 coordinates"),
                    ));
                }
                node_index.insert(id, coordinates.len());
                coordinates.push(Point3::new(xyz[0], xyz[1], xyz[2]));
            }
            MeshParseState::Elements => {
                if !parsed_section_metadata {
                    parsed_section_metadata = true;
                    continue;
                }

                let data: Vec<i64> = parse_numbers(line, mesh_file, line_no)?;
                if data.len() < 3 {
                    return Err(FemkitError::parse(
                        mesh_file,
                        format!("line {line_no}: truncated element"),
                    ));
                }
                let element_type = to_index(data[1], "element type", mesh_file, line_no)?;
                let num_tags = to_index(data[2], "tag count", mesh_file, line_no)?;
                let Some((num_nodes, dim)) = element_shape(element_type) else {
                    warn!("skipping unsupported gmsh element type {element_type}");
                    continue;
                };
                let expected = num_tags.checked_add(3 + num_nodes).ok_or_else(|| {
                    FemkitError::parse(mesh_file, format!("line {line_no}: tag count {num_tags} out of range"))
                })?;
                if data.len() != expected {
                    return Err(FemkitError::parse(
                        mesh_file,
                        format!("line {line_no}: element has {} entries", data.len()),
                    ));
                }
                let tag = if num_tags > 0 { data[3] } else { 0 };
                let nodes = data[3 + num_tags..]
                    .iter()
                    .map(|id| {
                        let id = to_index(*id, "node", mesh_file, line_no)?;
                        node_index.get(&id).copied().ok_or_else(|| {
                            FemkitError::parse(mesh_file, format!("line {line_no}: unknown node {id}"))
                        })
                    })
                    .collect::<Result<Vec<usize>>>()?;
                elements.push(RawElement { dim, tag, nodes });
            }
        }
    }

    let tdim = elements.iter().map(|e| e.dim).max().unwrap_or(0);
    let cell_type = CellType::from_dim(tdim)
        .filter(|c| *c != CellType::Point)
        .ok_or_else(|| FemkitError::parse(mesh_file, "no cells in mesh"))?;
    let gdim = if tdim <= 2 && coordinates.iter().all(|p| p.z == 0.0) {
        tdim.max(2)
    } else {
        3
    };

    let (cells, cell_tags): (Vec<Vec<usize>>, Vec<i64>) = elements
        .iter()
        .filter(|e| e.dim == tdim)
        .map(|e| (e.nodes.clone(), e.tag))
        .unzip();
    let mesh = Mesh::new(cell_type, gdim, coordinates, cells)?;

    let subdomains = MeshFunction {
        dim: tdim,
        kind: crate::datatypes::TagKind::SizeT,
        values: cell_tags,
    };

    let facet_index = mesh
        .entity_index_map(tdim - 1)
        .ok_or_else(|| FemkitError::InvalidMesh("mesh has no facets".to_string()))?;
    let mut boundaries = MeshFunction::zeros_on(&mesh, tdim - 1)?;
    for element in elements.iter().filter(|e| e.dim + 1 == tdim) {
        let i = facet_index.get(&entity_key(&element.nodes)).ok_or_else(|| {
            FemkitError::InvalidMesh(format!(
                "boundary element {:?} is not a facet of the mesh",
                element.nodes
            ))
        })?;
        boundaries.values[*i] = element.tag;
    }

    info!(
        "loaded {} nodes and {} elements",
        mesh.num_vertices(),
        mesh.num_cells()
    );

    Ok(MeshBundle {
        mesh,
        subdomains,
        boundaries,
    })
}

/// Generates the fibrotic mesh described by `params`
///
/// # Arguments
/// * `params` - Parameters with `mesh` and `io` sections
/// * `gmsh` - The Gmsh executable
///
/// # Returns
/// The path of the written HDF5 mesh
pub fn run(params: &ParameterSet, gmsh: &str) -> Result<PathBuf> {
    let fibro: FibroParameters = params.section("mesh")?;
    let io: MeshIoParameters = params.section("io")?;

    let geometry = FibroGeometry::new(&fibro)?;
    info!(
        "building .geo with {} inclusions, l_size = {}",
        geometry.inclusions.len(),
        geometry.inclusion_length
    );

    ensure_dir(&io.results)?;
    ensure_dir(&io.meshes)?;

    let name = fibro.output_name();
    let geo_filepath = io.meshes.join(format!("{name}.geo"));
    let msh_filepath = io.meshes.join(format!("{name}.msh"));
    let h5_filepath = io.meshes.join(format!("{name}.h5"));

    std::fs::write(&geo_filepath, build_geo(&geometry)?)?;
    compute_mesh(gmsh, &geo_filepath, &msh_filepath)?;
    let bundle = parse_mesh(&msh_filepath)?;

    info!("writing HDF5 mesh {}", h5_filepath.display());
    hdf5_io::write_bundle(&bundle, &h5_filepath)?;

    std::fs::remove_file(&geo_filepath)?;
    std::fs::remove_file(&msh_filepath)?;

    Ok(h5_filepath)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FibroParameters {
        FibroParameters {
            a: 1.0,
            b: 1.0,
            theta_c: 0.5,
            theta_f: 0.5,
            base: 4.0,
            height: 2.0,
            offset: 0.25,
        }
    }

    #[test]
    fn lattice_fills_the_domain() {
        let geometry = FibroGeometry::new(&sample()).unwrap();
        assert_eq!(geometry.inclusions.len(), 8);
        assert_eq!(
            geometry.inclusions[0],
            Rect {
                x0: 0.25,
                y0: 0.25,
                x1: 0.75,
                y1: 0.75
            }
        );
        assert_eq!(geometry.inclusion_length, 0.5);
        assert_eq!(geometry.coarse_points.len(), 15);
    }

    #[test]
    fn inclusions_on_the_boundary_are_dropped() {
        let params = FibroParameters {
            offset: 0.0,
            ..sample()
        };
        let geometry = FibroGeometry::new(&params).unwrap();
        assert!(geometry.inclusions.iter().all(|r| r.x0 > 0.0 && r.y0 > 0.0));
    }

    #[test]
    fn invalid_fractions_are_rejected() {
        let params = FibroParameters {
            theta_f: 1.0,
            ..sample()
        };
        assert!(matches!(
            FibroGeometry::new(&params),
            Err(FemkitError::Mesher(_))
        ));
    }

    #[test]
    fn output_name_encodes_parameters() {
        assert_eq!(sample().output_name(), "fibro_4x2_10_10_50_50");
    }

    #[test]
    fn geo_script_declares_physical_groups() {
        let geometry = FibroGeometry::new(&sample()).unwrap();
        let geo = build_geo(&geometry).unwrap();
        assert!(geo.contains("Plane Surface(1) = { 1, 2, 3, 4, 5, 6, 7, 8, 9 };"));
        assert!(geo.contains("Physical Surface(5) = { 2, 3, 4, 5, 6, 7, 8, 9 };"));
        assert!(geo.contains("Physical Surface(6) = { 1 };"));
        assert!(geo.contains("Physical Line(4) = { 4 };"));
        assert!(geo.contains("Line(4) = { 4, 1 };"));
        assert!(geo.contains("In Surface{ 1 };"));
    }

    const SQUARE_MSH: &str = "$MeshFormat
2.2 0 8
$EndMeshFormat
$Nodes
4
1 0 0 0
2 1 0 0
3 1 1 0
4 0 1 0
$EndNodes
$Elements
5
1 1 2 1 1 1 2
2 1 2 4 4 4 1
3 15 2 0 1 1
4 2 2 6 1 1 2 3
5 2 2 5 1 1 3 4
$EndElements
";

    #[test]
    fn msh2_tags_become_mesh_functions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("square.msh");
        std::fs::write(&path, SQUARE_MSH).unwrap();

        let bundle = parse_mesh(&path).unwrap();
        assert_eq!(bundle.mesh.gdim(), 2);
        assert_eq!(bundle.mesh.num_cells(), 2);
        assert_eq!(bundle.subdomains.values, vec![HEALTHY_TAG, COLLAGEN_TAG]);

        let facets = bundle.mesh.entity_index_map(1).unwrap();
        assert_eq!(bundle.boundaries.values[facets[&vec![0, 1]]], BOTTOM_TAG);
        assert_eq!(bundle.boundaries.values[facets[&vec![0, 3]]], LEFT_TAG);
        assert_eq!(bundle.boundaries.values[facets[&vec![0, 2]]], 0);
    }

    #[test]
    fn malformed_elements_are_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.msh");
        let header = "$MeshFormat\n2.2 0 8\n$EndMeshFormat\n\
            $Nodes\n3\n1 0 0 0\n2 1 0 0\n3 0 1 0\n$EndNodes\n";

        for element in ["1 2 -1 1 2 3", "1 -2 0 1 2 3", "1 2 0 1 2 -3", "1 2 9223372036854775807 1 2 3"] {
            let contents = format!("{header}$Elements\n1\n{element}\n$EndElements\n");
            std::fs::write(&path, contents).unwrap();
            assert!(
                matches!(parse_mesh(&path), Err(FemkitError::Parse { .. })),
                "{element}"
            );
        }
    }

    #[test]
    fn msh4_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.msh");
        std::fs::write(&path, "$MeshFormat\n4.1 0 8\n$EndMeshFormat\n").unwrap();
        assert!(matches!(parse_mesh(&path), Err(FemkitError::Parse { .. })));
    }

    #[test]
    fn missing_gmsh_is_a_mesher_error() {
        let dir = tempfile::tempdir().unwrap();
        let geo = dir.path().join("domain.geo");
        std::fs::write(&geo, "Point(1) = { 0, 0, 0, 1 };\n").unwrap();
        let err = compute_mesh(
            "gmsh-that-does-not-exist",
            &geo,
            &dir.path().join("domain.msh"),
        )
        .unwrap_err();
        assert!(matches!(err, FemkitError::Mesher(_)));
    }
}
