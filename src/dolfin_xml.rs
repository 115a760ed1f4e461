//! DOLFIN XML meshes and tag files.
//!
//! A mesh `case.xml` is accompanied by `case_physical_region.xml` (cell tags)
//! and `case_facet_region.xml` (facet tags), both stored as `mesh_function`
//! documents.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use nalgebra::Point3;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use crate::datatypes::{CellType, Mesh, MeshFunction, TagKind};
use crate::error::{FemkitError, Result};

const DOLFIN_NAMESPACE: &str = "http://fenicsproject.org";

fn read_document(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(FemkitError::FileNotFound(path.to_path_buf()));
    }
    Ok(std::fs::read_to_string(path)?)
}

fn parse_attribute<T: std::str::FromStr>(
    node: &roxmltree::Node,
    name: &str,
    path: &Path,
) -> Result<T> {
    let raw = node.attribute(name).ok_or_else(|| {
        FemkitError::parse(
            path,
            format!("missing `{name}` attribute on <{}>", node.tag_name().name()),
        )
    })?;
    raw.trim().parse().map_err(|_| {
        FemkitError::parse(
            path,
            format!(
                "invalid `{name}` value `{raw}` on <{}>",
                node.tag_name().name()
            ),
        )
    })
}

/// Reads the `<mesh>` element of a DOLFIN XML file.
pub fn read_mesh(path: &Path) -> Result<Mesh> {
    let contents = read_document(path)?;
    let doc = roxmltree::Document::parse(&contents)
        .map_err(|err| FemkitError::parse(path, err.to_string()))?;

    let mesh_node = doc
        .descendants()
        .find(|n| n.has_tag_name("mesh"))
        .ok_or_else(|| FemkitError::parse(path, "no <mesh> element"))?;

    let celltype: String = parse_attribute(&mesh_node, "celltype", path)?;
    let cell_type = CellType::from_name(&celltype)
        .ok_or_else(|| FemkitError::parse(path, format!("unknown celltype `{celltype}`")))?;
    let gdim: usize = parse_attribute(&mesh_node, "dim", path)?;

    // Vertices
    let vertices_node = mesh_node
        .children()
        .find(|n| n.has_tag_name("vertices"))
        .ok_or_else(|| FemkitError::parse(path, "no <vertices> element"))?;
    let num_vertices: usize = parse_attribute(&vertices_node, "size", path)?;
    check_declared_size(&vertices_node, "vertex", num_vertices, path)?;

    let mut coordinates: Vec<Option<Point3<f64>>> = vec![None; num_vertices];
    for vertex in vertices_node.children().filter(|n| n.has_tag_name("vertex")) {
        let index: usize = parse_attribute(&vertex, "index", path)?;
        let mut xyz = [0.0; 3];
        for (axis, name) in ["x", "y", "z"].iter().enumerate().take(gdim) {
            xyz[axis] = parse_attribute(&vertex, name, path)?;
        }
        match coordinates.get_mut(index) {
            Some(slot) => *slot = Some(Point3::new(xyz[0], xyz[1], xyz[2])),
            None => {
                return Err(FemkitError::parse(
                    path,
                    format!("vertex index {index} exceeds declared size {num_vertices}"),
                ))
            }
        }
    }
    let coordinates = coordinates
        .into_iter()
        .enumerate()
        .map(|(i, c)| c.ok_or_else(|| FemkitError::parse(path, format!("vertex {i} missing"))))
        .collect::<Result<Vec<_>>>()?;

    // Cells
    let cells_node = mesh_node
        .children()
        .find(|n| n.has_tag_name("cells"))
        .ok_or_else(|| FemkitError::parse(path, "no <cells> element"))?;
    let num_cells: usize = parse_attribute(&cells_node, "size", path)?;
    check_declared_size(&cells_node, cell_type.name(), num_cells, path)?;

    let mut cells: Vec<Option<Vec<usize>>> = vec![None; num_cells];
    for cell in cells_node
        .children()
        .filter(|n| n.has_tag_name(cell_type.name()))
    {
        let index: usize = parse_attribute(&cell, "index", path)?;
        let vertices = (0..cell_type.num_vertices())
            .map(|i| parse_attribute(&cell, &format!("v{i}"), path))
            .collect::<Result<Vec<usize>>>()?;
        match cells.get_mut(index) {
            Some(slot) => *slot = Some(vertices),
            None => {
                return Err(FemkitError::parse(
                    path,
                    format!("cell index {index} exceeds declared size {num_cells}"),
                ))
            }
        }
    }
    let cells = cells
        .into_iter()
        .enumerate()
        .map(|(i, c)| c.ok_or_else(|| FemkitError::parse(path, format!("cell {i} missing"))))
        .collect::<Result<Vec<_>>>()?;

    Mesh::new(cell_type, gdim, coordinates, cells)
}

/// The `size` attribute must match the number of `tag` children.
fn check_declared_size(node: &roxmltree::Node, tag: &str, size: usize, path: &Path) -> Result<()> {
    let found = node.children().filter(|n| n.has_tag_name(tag)).count();
    if found != size {
        return Err(FemkitError::parse(
            path,
            format!("<{}> declares size {size} but holds {found} <{tag}> entries", node.tag_name().name()),
        ));
    }
    Ok(())
}

/// Reads a tag file as `kind`.
///
/// Fails with `FileNotFound` if the file is absent and with
/// `TagTypeMismatch` if its declared type (or a value) does not fit `kind`,
/// so callers can retry with another kind or fall back to zero tags.
pub fn read_mesh_function(path: &Path, mesh: &Mesh, kind: TagKind) -> Result<MeshFunction> {
    let contents = read_document(path)?;
    let doc = roxmltree::Document::parse(&contents)
        .map_err(|err| FemkitError::parse(path, err.to_string()))?;

    let node = doc
        .descendants()
        .find(|n| n.has_tag_name("mesh_function") || n.has_tag_name("mesh_value_collection"))
        .ok_or_else(|| {
            FemkitError::parse(path, "no <mesh_function> or <mesh_value_collection> element")
        })?;

    let type_name: String = parse_attribute(&node, "type", path)?;
    if !kind.accepts(&type_name) {
        return Err(FemkitError::TagTypeMismatch {
            file: path.to_path_buf(),
            expected: kind,
            found: type_name,
        });
    }

    let dim: usize = parse_attribute(&node, "dim", path)?;
    let num_entities = mesh.num_entities(dim).ok_or_else(|| {
        FemkitError::parse(path, format!("unsupported entity dimension {dim}"))
    })?;

    let mut function = MeshFunction {
        dim,
        kind,
        values: vec![0; num_entities],
    };

    let check_value = |value: i64| -> Result<i64> {
        if kind == TagKind::SizeT && value < 0 {
            return Err(FemkitError::TagTypeMismatch {
                file: path.to_path_buf(),
                expected: kind,
                found: value.to_string(),
            });
        }
        Ok(value)
    };

    if node.has_tag_name("mesh_function") {
        let size: usize = parse_attribute(&node, "size", path)?;
        if size != num_entities {
            return Err(FemkitError::parse(
                path,
                format!("size {size} does not match the {num_entities} mesh entities of dimension {dim}"),
            ));
        }
        for entity in node.children().filter(|n| n.has_tag_name("entity")) {
            let index: usize = parse_attribute(&entity, "index", path)?;
            let value = check_value(parse_attribute(&entity, "value", path)?)?;
            match function.values.get_mut(index) {
                Some(slot) => *slot = value,
                None => {
                    return Err(FemkitError::parse(
                        path,
                        format!("entity index {index} out of range"),
                    ))
                }
            }
        }
    } else {
        let facet_index = mesh.entity_index_map(mesh.tdim() - 1).unwrap_or_default();
        for entry in node.children().filter(|n| n.has_tag_name("value")) {
            let cell: usize = parse_attribute(&entry, "cell_index", path)?;
            let local: usize = parse_attribute(&entry, "local_entity", path)?;
            let value = check_value(parse_attribute(&entry, "value", path)?)?;

            let index = if dim == mesh.tdim() {
                Some(cell).filter(|c| *c < mesh.num_cells())
            } else {
                mesh.facet_key(cell, local)
                    .and_then(|key| facet_index.get(&key).copied())
            };
            match index {
                Some(i) => function.values[i] = value,
                None => {
                    return Err(FemkitError::parse(
                        path,
                        format!("no entity for cell {cell}, local entity {local}"),
                    ))
                }
            }
        }
    }

    Ok(function)
}

/// Loads a tag file as `size_t`, retrying as `int` on a type mismatch.
pub fn read_mesh_function_any(path: &Path, mesh: &Mesh) -> Result<MeshFunction> {
    match read_mesh_function(path, mesh, TagKind::SizeT) {
        Err(FemkitError::TagTypeMismatch { .. }) => read_mesh_function(path, mesh, TagKind::Int),
        other => other,
    }
}

fn begin_document<W: Write>(writer: &mut Writer<W>) -> Result<()> {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    let mut root = BytesStart::new("dolfin");
    root.push_attribute(("xmlns:dolfin", DOLFIN_NAMESPACE));
    writer.write_event(Event::Start(root))?;
    Ok(())
}

fn end_document<W: Write>(writer: &mut Writer<W>) -> Result<()> {
    writer.write_event(Event::End(BytesEnd::new("dolfin")))?;
    writer.get_mut().write_all(b"\n")?;
    Ok(())
}

/// Writes `mesh` as a DOLFIN XML document.
pub fn write_mesh(mesh: &Mesh, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = Writer::new_with_indent(BufWriter::new(file), b' ', 2);
    begin_document(&mut writer)?;

    let mut mesh_start = BytesStart::new("mesh");
    mesh_start.push_attribute(("celltype", mesh.cell_type().name()));
    mesh_start.push_attribute(("dim", mesh.gdim().to_string().as_str()));
    writer.write_event(Event::Start(mesh_start))?;

    let mut vertices_start = BytesStart::new("vertices");
    vertices_start.push_attribute(("size", mesh.num_vertices().to_string().as_str()));
    writer.write_event(Event::Start(vertices_start))?;
    for (i, point) in mesh.coordinates().iter().enumerate() {
        let mut vertex = BytesStart::new("vertex");
        vertex.push_attribute(("index", i.to_string().as_str()));
        for (axis, name) in ["x", "y", "z"].iter().enumerate().take(mesh.gdim()) {
            vertex.push_attribute((*name, point[axis].to_string().as_str()));
        }
        writer.write_event(Event::Empty(vertex))?;
    }
    writer.write_event(Event::End(BytesEnd::new("vertices")))?;

    let mut cells_start = BytesStart::new("cells");
    cells_start.push_attribute(("size", mesh.num_cells().to_string().as_str()));
    writer.write_event(Event::Start(cells_start))?;
    for (i, cell) in mesh.cells().iter().enumerate() {
        let mut element = BytesStart::new(mesh.cell_type().name());
        element.push_attribute(("index", i.to_string().as_str()));
        for (j, v) in cell.iter().enumerate() {
            element.push_attribute((format!("v{j}").as_str(), v.to_string().as_str()));
        }
        writer.write_event(Event::Empty(element))?;
    }
    writer.write_event(Event::End(BytesEnd::new("cells")))?;

    writer.write_event(Event::End(BytesEnd::new("mesh")))?;
    end_document(&mut writer)?;
    writer.into_inner().flush()?;
    Ok(())
}

/// Writes a tag map as a `mesh_function` document.
pub fn write_mesh_function(function: &MeshFunction, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = Writer::new_with_indent(BufWriter::new(file), b' ', 2);
    begin_document(&mut writer)?;

    let mut start = BytesStart::new("mesh_function");
    start.push_attribute(("type", function.kind.xml_name()));
    start.push_attribute(("dim", function.dim.to_string().as_str()));
    start.push_attribute(("size", function.len().to_string().as_str()));
    writer.write_event(Event::Start(start))?;
    for (i, value) in function.values.iter().enumerate() {
        let mut entity = BytesStart::new("entity");
        entity.push_attribute(("index", i.to_string().as_str()));
        entity.push_attribute(("value", value.to_string().as_str()));
        writer.write_event(Event::Empty(entity))?;
    }
    writer.write_event(Event::End(BytesEnd::new("mesh_function")))?;

    end_document(&mut writer)?;
    writer.into_inner().flush()?;
    Ok(())
}
