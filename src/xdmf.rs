//! XDMF light data pointing at HDF5 heavy data.
//!
//! The mesh lives in a grid named `mesh` carrying the `subdomains` cell
//! attribute; boundary tags live in a second grid named `boundaries` whose
//! topology lists the tagged facets.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use nalgebra::Point3;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::warn;

use crate::datatypes::{entity_key, CellType, Mesh, MeshBundle, MeshFunction, TagKind};
use crate::error::{FemkitError, Result};
use crate::format::TagPolicy;
use crate::hdf5_io;

fn topology_type(cell_type: CellType) -> &'static str {
    match cell_type {
        CellType::Point => "Polyvertex",
        CellType::Interval => "PolyLine",
        CellType::Triangle => "Triangle",
        CellType::Tetrahedron => "Tetrahedron",
    }
}

fn cell_type_from_topology(name: &str) -> Option<CellType> {
    match name.to_ascii_lowercase().as_str() {
        "polyvertex" => Some(CellType::Point),
        "polyline" => Some(CellType::Interval),
        "triangle" => Some(CellType::Triangle),
        "tetrahedron" => Some(CellType::Tetrahedron),
        _ => None,
    }
}

fn geometry_type(gdim: usize) -> &'static str {
    match gdim {
        1 => "X",
        2 => "XY",
        _ => "XYZ",
    }
}

/// Heavy-data file written next to an `.xdmf` file.
pub fn heavy_data_path(path: &Path) -> PathBuf {
    path.with_extension("h5")
}

struct DataItem<'a> {
    dimensions: String,
    number_type: &'a str,
    reference: String,
}

fn write_data_item<W: Write>(writer: &mut Writer<W>, item: DataItem) -> Result<()> {
    let mut start = BytesStart::new("DataItem");
    start.push_attribute(("Dimensions", item.dimensions.as_str()));
    start.push_attribute(("NumberType", item.number_type));
    start.push_attribute(("Precision", "8"));
    start.push_attribute(("Format", "HDF"));
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(&item.reference)))?;
    writer.write_event(Event::End(BytesEnd::new("DataItem")))?;
    Ok(())
}

fn write_grid<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    heavy: &str,
    mesh: &Mesh,
    topology: (CellType, usize, &str),
    attribute: Option<(&str, usize)>,
) -> Result<()> {
    let (cell_type, count, topology_path) = topology;

    let mut grid = BytesStart::new("Grid");
    grid.push_attribute(("Name", name));
    grid.push_attribute(("GridType", "Uniform"));
    writer.write_event(Event::Start(grid))?;

    let mut start = BytesStart::new("Topology");
    start.push_attribute(("TopologyType", topology_type(cell_type)));
    start.push_attribute(("NumberOfElements", count.to_string().as_str()));
    start.push_attribute(("NodesPerElement", cell_type.num_vertices().to_string().as_str()));
    writer.write_event(Event::Start(start))?;
    write_data_item(
        writer,
        DataItem {
            dimensions: format!("{count} {}", cell_type.num_vertices()),
            number_type: "UInt",
            reference: format!("{heavy}:{topology_path}"),
        },
    )?;
    writer.write_event(Event::End(BytesEnd::new("Topology")))?;

    let mut start = BytesStart::new("Geometry");
    start.push_attribute(("GeometryType", geometry_type(mesh.gdim())));
    writer.write_event(Event::Start(start))?;
    write_data_item(
        writer,
        DataItem {
            dimensions: format!("{} {}", mesh.num_vertices(), mesh.gdim()),
            number_type: "Float",
            reference: format!("{heavy}:/{}/coordinates", hdf5_io::MESH_GROUP),
        },
    )?;
    writer.write_event(Event::End(BytesEnd::new("Geometry")))?;

    if let Some((attribute_name, size)) = attribute {
        let mut start = BytesStart::new("Attribute");
        start.push_attribute(("Name", attribute_name));
        start.push_attribute(("AttributeType", "Scalar"));
        start.push_attribute(("Center", "Cell"));
        writer.write_event(Event::Start(start))?;
        write_data_item(
            writer,
            DataItem {
                dimensions: size.to_string(),
                number_type: "Int",
                reference: format!("{heavy}:/{attribute_name}/values"),
            },
        )?;
        writer.write_event(Event::End(BytesEnd::new("Attribute")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("Grid")))?;
    Ok(())
}

/// Writes `path` and its heavy data file; tag maps that are `None` are left
/// out of both.
pub fn write_xdmf(
    path: &Path,
    mesh: &Mesh,
    subdomains: Option<&MeshFunction>,
    boundaries: Option<&MeshFunction>,
) -> Result<()> {
    let heavy_path = heavy_data_path(path);
    hdf5_io::write_mesh_container(&heavy_path, mesh, subdomains, boundaries)?;
    let heavy = heavy_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let file = File::create(path)?;
    let mut writer = Writer::new_with_indent(BufWriter::new(file), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    let mut root = BytesStart::new("Xdmf");
    root.push_attribute(("Version", "3.0"));
    writer.write_event(Event::Start(root))?;
    writer.write_event(Event::Start(BytesStart::new("Domain")))?;

    let cell_topology = format!("/{}/topology", hdf5_io::MESH_GROUP);
    write_grid(
        &mut writer,
        hdf5_io::MESH_GROUP,
        &heavy,
        mesh,
        (mesh.cell_type(), mesh.num_cells(), cell_topology.as_str()),
        subdomains.map(|s| (hdf5_io::SUBDOMAINS_GROUP, s.len())),
    )?;

    if let (Some(boundaries), Some(facet_type)) = (boundaries, mesh.cell_type().facet_type()) {
        let facet_topology = format!("/{}/topology", hdf5_io::BOUNDARIES_GROUP);
        write_grid(
            &mut writer,
            hdf5_io::BOUNDARIES_GROUP,
            &heavy,
            mesh,
            (facet_type, mesh.num_facets(), facet_topology.as_str()),
            Some((hdf5_io::BOUNDARIES_GROUP, boundaries.len())),
        )?;
    }

    writer.write_event(Event::End(BytesEnd::new("Domain")))?;
    writer.write_event(Event::End(BytesEnd::new("Xdmf")))?;
    writer.get_mut().write_all(b"\n")?;
    writer.into_inner().flush()?;
    Ok(())
}

pub fn write_bundle(bundle: &MeshBundle, path: &Path) -> Result<()> {
    write_xdmf(
        path,
        &bundle.mesh,
        Some(&bundle.subdomains),
        Some(&bundle.boundaries),
    )
}

fn child<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(name))
}

/// Reads the numbers of a `DataItem`, inline (`Format="XML"`) or from HDF5
/// (`Format="HDF"`, `file.h5:/dataset` relative to the xdmf file).
fn read_data_item<T>(item: roxmltree::Node, path: &Path) -> Result<Vec<T>>
where
    T: FromStr + hdf5::H5Type,
{
    let text = item.text().unwrap_or_default().trim();
    match item.attribute("Format").unwrap_or("XML") {
        "XML" => text
            .split_whitespace()
            .map(|token| {
                token.parse::<T>().map_err(|_| {
                    FemkitError::parse(path, format!("invalid number `{token}` in DataItem"))
                })
            })
            .collect(),
        "HDF" => {
            let (file_name, dataset) = text.split_once(':').ok_or_else(|| {
                FemkitError::parse(path, format!("malformed HDF reference `{text}`"))
            })?;
            let heavy = path
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(file_name.trim());
            let file = hdf5_io::open_container(&heavy)?;
            if !file.link_exists(dataset.trim()) {
                return Err(FemkitError::dataset_not_found(&heavy, dataset.trim()));
            }
            let dataset = file.dataset(dataset.trim())?;
            if dataset.size() == 0 {
                return Ok(Vec::new());
            }
            Ok(dataset.read_raw::<T>()?)
        }
        other => Err(FemkitError::parse(
            path,
            format!("unsupported DataItem format `{other}`"),
        )),
    }
}

/// Topology of a grid as (cell type, vertex lists).
fn read_topology(grid: roxmltree::Node, path: &Path) -> Result<(CellType, Vec<Vec<usize>>)> {
    let topology = child(grid, "Topology")
        .ok_or_else(|| FemkitError::parse(path, "grid without <Topology>"))?;
    let name = topology.attribute("TopologyType").unwrap_or_default();
    let cell_type = cell_type_from_topology(name)
        .ok_or_else(|| FemkitError::parse(path, format!("unsupported TopologyType `{name}`")))?;
    let item = child(topology, "DataItem")
        .ok_or_else(|| FemkitError::parse(path, "<Topology> without <DataItem>"))?;

    let data = read_data_item::<u64>(item, path)?;
    let nv = cell_type.num_vertices();
    if data.len() % nv != 0 {
        return Err(FemkitError::parse(
            path,
            format!("{} topology entries are not a multiple of {nv}", data.len()),
        ));
    }
    let rows = data
        .chunks(nv)
        .map(|row| row.iter().map(|v| *v as usize).collect())
        .collect();
    Ok((cell_type, rows))
}

fn read_geometry(grid: roxmltree::Node, path: &Path) -> Result<(usize, Vec<Point3<f64>>)> {
    let geometry = child(grid, "Geometry")
        .ok_or_else(|| FemkitError::parse(path, "grid without <Geometry>"))?;
    let gdim = match geometry.attribute("GeometryType").unwrap_or("XYZ") {
        "X" => 1,
        "XY" => 2,
        "XYZ" => 3,
        other => {
            return Err(FemkitError::parse(
                path,
                format!("unsupported GeometryType `{other}`"),
            ))
        }
    };
    let item = child(geometry, "DataItem")
        .ok_or_else(|| FemkitError::parse(path, "<Geometry> without <DataItem>"))?;
    let data = read_data_item::<f64>(item, path)?;
    if data.len() % gdim != 0 {
        return Err(FemkitError::parse(
            path,
            format!("{} coordinates are not a multiple of {gdim}", data.len()),
        ));
    }
    let points = data
        .chunks(gdim)
        .map(|row| {
            let mut xyz = [0.0; 3];
            xyz[..gdim].copy_from_slice(row);
            Point3::new(xyz[0], xyz[1], xyz[2])
        })
        .collect();
    Ok((gdim, points))
}

fn find_attribute<'a, 'input>(
    grid: roxmltree::Node<'a, 'input>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    grid.children()
        .find(|n| n.has_tag_name("Attribute") && n.attribute("Name") == Some(name))
}

fn read_attribute_values(attribute: roxmltree::Node, path: &Path) -> Result<Vec<i64>> {
    let item = child(attribute, "DataItem")
        .ok_or_else(|| FemkitError::parse(path, "<Attribute> without <DataItem>"))?;
    read_data_item::<i64>(item, path)
}

fn missing_tags(
    mesh: &Mesh,
    dim: usize,
    name: &str,
    policy: TagPolicy,
    path: &Path,
) -> Result<MeshFunction> {
    match policy {
        TagPolicy::Fallback => {
            warn!("no <{name}> attribute found in file {}", path.display());
            MeshFunction::zeros_on(mesh, dim)
        }
        TagPolicy::Require => Err(FemkitError::dataset_not_found(path, name)),
    }
}

fn with_kind(mut function: MeshFunction) -> MeshFunction {
    if function.values.iter().any(|v| *v < 0) {
        function.kind = TagKind::Int;
    }
    function
}

pub fn read_xdmf(path: &Path, policy: TagPolicy) -> Result<MeshBundle> {
    if !path.is_file() {
        return Err(FemkitError::FileNotFound(path.to_path_buf()));
    }
    let contents = std::fs::read_to_string(path)?;
    let doc = roxmltree::Document::parse(&contents)
        .map_err(|err| FemkitError::parse(path, err.to_string()))?;

    let grids: Vec<roxmltree::Node> = doc
        .descendants()
        .filter(|n| n.has_tag_name("Grid") && child(*n, "Topology").is_some())
        .collect();
    let mesh_grid = grids
        .iter()
        .find(|g| g.attribute("Name") == Some(hdf5_io::MESH_GROUP))
        .or_else(|| grids.first())
        .copied()
        .ok_or_else(|| FemkitError::parse(path, "no <Grid> with a <Topology>"))?;

    let (cell_type, cells) = read_topology(mesh_grid, path)?;
    let (gdim, points) = read_geometry(mesh_grid, path)?;
    let mesh = Mesh::new(cell_type, gdim, points, cells)?;
    let tdim = mesh.tdim();

    let subdomains = match find_attribute(mesh_grid, hdf5_io::SUBDOMAINS_GROUP) {
        Some(attribute) => {
            let values = read_attribute_values(attribute, path)?;
            if values.len() != mesh.num_cells() {
                return Err(FemkitError::InvalidMesh(format!(
                    "{} subdomain values for {} cells",
                    values.len(),
                    mesh.num_cells()
                )));
            }
            with_kind(MeshFunction {
                dim: tdim,
                kind: TagKind::SizeT,
                values,
            })
        }
        None => missing_tags(&mesh, tdim, hdf5_io::SUBDOMAINS_GROUP, policy, path)?,
    };

    let boundary_grid = grids
        .iter()
        .copied()
        .find(|g| find_attribute(*g, hdf5_io::BOUNDARIES_GROUP).is_some());
    let boundaries = match boundary_grid {
        Some(grid) => {
            let attribute = find_attribute(grid, hdf5_io::BOUNDARIES_GROUP)
                .ok_or_else(|| FemkitError::parse(path, "boundary grid lost its attribute"))?;
            let values = read_attribute_values(attribute, path)?;
            let (facet_type, facets) = read_topology(grid, path)?;
            if facet_type.dim() + 1 != tdim || facets.len() != values.len() {
                return Err(FemkitError::InvalidMesh(format!(
                    "boundary grid has {} {facet_type} entities and {} values",
                    facets.len(),
                    values.len()
                )));
            }
            let index = mesh.entity_index_map(tdim - 1).ok_or_else(|| {
                FemkitError::InvalidMesh("mesh has no facets".to_string())
            })?;
            let mut function = MeshFunction::zeros_on(&mesh, tdim - 1)?;
            for (facet, value) in facets.iter().zip(values) {
                let i = index.get(&entity_key(facet)).ok_or_else(|| {
                    FemkitError::InvalidMesh(format!("facet {facet:?} not present in mesh"))
                })?;
                function.values[*i] = value;
            }
            with_kind(function)
        }
        None => missing_tags(&mesh, tdim - 1, hdf5_io::BOUNDARIES_GROUP, policy, path)?,
    };

    Ok(MeshBundle {
        mesh,
        subdomains,
        boundaries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rectangle::rectangle_mesh;

    #[test]
    fn written_xdmf_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rect.xdmf");
        let mut bundle = rectangle_mesh([0.0, 0.0], [1.0, 1.0], 3, 3).unwrap();
        bundle.subdomains.values[0] = 2;

        write_bundle(&bundle, &path).unwrap();
        assert!(heavy_data_path(&path).is_file());

        let read = read_xdmf(&path, TagPolicy::Require).unwrap();
        assert_eq!(read, bundle);
    }

    #[test]
    fn inline_data_items_are_supported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inline.xdmf");
        std::fs::write(
            &path,
            r#"<?xml version="1.0"?>
<Xdmf Version="3.0"><Domain>
  <Grid Name="mesh">
    <Topology TopologyType="Triangle" NumberOfElements="2">
      <DataItem Dimensions="2 3" Format="XML">0 1 2  0 2 3</DataItem>
    </Topology>
    <Geometry GeometryType="XY">
      <DataItem Dimensions="4 2" Format="XML">0 0 1 0 1 1 0 1</DataItem>
    </Geometry>
    <Attribute Name="subdomains" Center="Cell">
      <DataItem Dimensions="2" Format="XML">5 6</DataItem>
    </Attribute>
  </Grid>
</Domain></Xdmf>"#,
        )
        .unwrap();

        let strict = read_xdmf(&path, TagPolicy::Require);
        assert!(matches!(
            strict,
            Err(FemkitError::DatasetNotFound { dataset, .. }) if dataset == "boundaries"
        ));

        let lenient = read_xdmf(&path, TagPolicy::Fallback).unwrap();
        assert_eq!(lenient.subdomains.values, vec![5, 6]);
        assert_eq!(lenient.boundaries.len(), 5);
        assert!(lenient.boundaries.is_all_zero());
    }
}
