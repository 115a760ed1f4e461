//! Mesh containers in HDF5.
//!
//! Layout: `/mesh/coordinates` (f64, vertices × gdim), `/mesh/topology`
//! (u64, cells × vertices per cell, attribute `celltype`), and for each tag
//! map a group with `topology` (entity vertices) and `values` (i64).

use std::path::Path;

use hdf5::types::VarLenUnicode;
use hdf5::{File, Group};
use nalgebra::Point3;
use tracing::{debug, warn};

use crate::datatypes::{entity_key, CellType, Mesh, MeshBundle, MeshFunction, TagKind};
use crate::error::{FemkitError, Result};
use crate::format::TagPolicy;

pub const MESH_GROUP: &str = "mesh";
pub const SUBDOMAINS_GROUP: &str = "subdomains";
pub const BOUNDARIES_GROUP: &str = "boundaries";

/// Opens an existing container read-only.
pub fn open_container(path: &Path) -> Result<File> {
    if !path.is_file() {
        return Err(FemkitError::FileNotFound(path.to_path_buf()));
    }
    Ok(File::open(path)?)
}

fn flatten_rows(rows: &[Vec<usize>]) -> Vec<u64> {
    rows.iter().flatten().map(|v| *v as u64).collect()
}

fn write_u64_matrix(group: &Group, name: &str, rows: &[Vec<usize>], width: usize) -> Result<()> {
    let dataset = group
        .new_dataset::<u64>()
        .shape((rows.len(), width))
        .create(name)?;
    if !rows.is_empty() {
        dataset.write_raw(&flatten_rows(rows))?;
    }
    Ok(())
}

/// Reads a 2D dataset as (rows, columns, row-major data).
fn read_matrix<T: hdf5::H5Type>(group: &Group, name: &str) -> Result<(usize, usize, Vec<T>)> {
    let dataset = group.dataset(name)?;
    let shape = dataset.shape();
    let (rows, cols) = match shape.as_slice() {
        [rows] => (*rows, 1),
        [rows, cols] => (*rows, *cols),
        other => {
            return Err(FemkitError::InvalidMesh(format!(
                "dataset `{name}` has unexpected shape {other:?}"
            )))
        }
    };
    let data = if rows * cols == 0 {
        Vec::new()
    } else {
        dataset.read_raw::<T>()?
    };
    Ok((rows, cols, data))
}

fn to_rows(data: &[u64], width: usize) -> Vec<Vec<usize>> {
    if width == 0 {
        return Vec::new();
    }
    data.chunks(width)
        .map(|row| row.iter().map(|v| *v as usize).collect())
        .collect()
}

pub fn write_mesh_group(file: &Group, mesh: &Mesh) -> Result<()> {
    let group = file.create_group(MESH_GROUP)?;

    let gdim = mesh.gdim();
    let coordinates: Vec<f64> = mesh
        .coordinates()
        .iter()
        .flat_map(|p| p.coords.iter().take(gdim).copied().collect::<Vec<f64>>())
        .collect();
    let dataset = group
        .new_dataset::<f64>()
        .shape((mesh.num_vertices(), gdim))
        .create("coordinates")?;
    if !coordinates.is_empty() {
        dataset.write_raw(&coordinates)?;
    }

    write_u64_matrix(
        &group,
        "topology",
        mesh.cells(),
        mesh.cell_type().num_vertices(),
    )?;
    let celltype: VarLenUnicode = mesh
        .cell_type()
        .name()
        .parse()
        .map_err(|_| FemkitError::InvalidMesh("cell type name is not valid unicode".to_string()))?;
    group
        .dataset("topology")?
        .new_attr::<VarLenUnicode>()
        .shape(())
        .create("celltype")?
        .write_scalar(&celltype)?;

    Ok(())
}

/// Writes `function` under `name`, storing the vertices of each tagged entity
/// so the tags can be matched back to the mesh by vertex set.
pub fn write_tags_group(file: &Group, name: &str, mesh: &Mesh, function: &MeshFunction) -> Result<()> {
    let entities = mesh.entities(function.dim).ok_or_else(|| {
        FemkitError::InvalidMesh(format!(
            "mesh does not store entities of dimension {}",
            function.dim
        ))
    })?;
    if entities.len() != function.len() {
        return Err(FemkitError::InvalidMesh(format!(
            "`{name}` has {} values for {} entities",
            function.len(),
            entities.len()
        )));
    }

    let group = file.create_group(name)?;
    write_u64_matrix(&group, "topology", entities, function.dim + 1)?;
    let values = group
        .new_dataset::<i64>()
        .shape(function.len())
        .create("values")?;
    if !function.is_empty() {
        values.write_raw(&function.values)?;
    }
    Ok(())
}

pub fn read_mesh_group(file: &Group, path: &Path) -> Result<Mesh> {
    if !file.link_exists(MESH_GROUP) {
        return Err(FemkitError::dataset_not_found(path, format!("/{MESH_GROUP}")));
    }
    let group = file.group(MESH_GROUP)?;

    let (num_vertices, gdim, coordinates) = read_matrix::<f64>(&group, "coordinates")?;
    let (_, nv, topology) = read_matrix::<u64>(&group, "topology")?;

    let topology_ds = group.dataset("topology")?;
    let cell_type = if topology_ds
        .attr_names()?
        .iter()
        .any(|name| name == "celltype")
    {
        let name = topology_ds
            .attr("celltype")?
            .read_scalar::<VarLenUnicode>()?;
        CellType::from_name(name.as_str()).ok_or_else(|| {
            FemkitError::parse(path, format!("unknown celltype `{}`", name.as_str()))
        })?
    } else {
        CellType::from_dim(nv.saturating_sub(1))
            .ok_or_else(|| FemkitError::parse(path, format!("cannot infer cell type from {nv} vertices")))?
    };

    let points = (0..num_vertices)
        .map(|i| {
            let row = &coordinates[i * gdim..(i + 1) * gdim];
            let mut xyz = [0.0; 3];
            xyz[..gdim.min(3)].copy_from_slice(&row[..gdim.min(3)]);
            Point3::new(xyz[0], xyz[1], xyz[2])
        })
        .collect();

    Mesh::new(cell_type, gdim, points, to_rows(&topology, nv))
}

/// Reads the tag group `name`, matching its entities against `mesh`.
pub fn read_tags_group(file: &Group, name: &str, mesh: &Mesh) -> Result<MeshFunction> {
    let group = file.group(name)?;
    let (rows, width, topology) = read_matrix::<u64>(&group, "topology")?;
    let (count, _, values) = read_matrix::<i64>(&group, "values")?;
    if count != rows {
        return Err(FemkitError::InvalidMesh(format!(
            "`{name}` has {rows} entities but {count} values"
        )));
    }

    let dim = width.saturating_sub(1);
    let index = mesh.entity_index_map(dim).ok_or_else(|| {
        FemkitError::InvalidMesh(format!("`{name}` tags entities of unsupported dimension {dim}"))
    })?;

    let mut function = MeshFunction::zeros_on(mesh, dim)?;
    for (entity, value) in to_rows(&topology, width).iter().zip(values) {
        let i = index.get(&entity_key(entity)).ok_or_else(|| {
            FemkitError::InvalidMesh(format!("`{name}` tags entity {entity:?} not present in mesh"))
        })?;
        function.values[*i] = value;
    }
    if function.values.iter().any(|v| *v < 0) {
        function.kind = TagKind::Int;
    }
    Ok(function)
}

/// Reads optional tags of dimension `dim`, applying `policy` when the group
/// is absent.
pub fn read_tags_or_default(
    file: &Group,
    name: &str,
    mesh: &Mesh,
    dim: usize,
    policy: TagPolicy,
    path: &Path,
) -> Result<MeshFunction> {
    if file.link_exists(name) {
        debug!("reading <{name}> from {}", path.display());
        let function = read_tags_group(file, name, mesh)?;
        if function.dim != dim {
            return Err(FemkitError::InvalidMesh(format!(
                "`{name}` in {} tags entities of dimension {}, expected {dim}",
                path.display(),
                function.dim
            )));
        }
        return Ok(function);
    }
    match policy {
        TagPolicy::Fallback => {
            warn!("no <{name}> datasets found in file {}", path.display());
            MeshFunction::zeros_on(mesh, dim)
        }
        TagPolicy::Require => Err(FemkitError::dataset_not_found(path, format!("/{name}"))),
    }
}

/// Reads a mesh container; `/subdomains` and `/boundaries` are optional under
/// `TagPolicy::Fallback`.
pub fn read_mesh_container(path: &Path, policy: TagPolicy) -> Result<MeshBundle> {
    let file = open_container(path)?;
    let mesh = read_mesh_group(&file, path)?;
    let tdim = mesh.tdim();

    let subdomains = read_tags_or_default(&file, SUBDOMAINS_GROUP, &mesh, tdim, policy, path)?;
    let boundaries = read_tags_or_default(&file, BOUNDARIES_GROUP, &mesh, tdim - 1, policy, path)?;

    Ok(MeshBundle {
        mesh,
        subdomains,
        boundaries,
    })
}

/// Writes a mesh container, including only the tag maps that are given.
pub fn write_mesh_container(
    path: &Path,
    mesh: &Mesh,
    subdomains: Option<&MeshFunction>,
    boundaries: Option<&MeshFunction>,
) -> Result<()> {
    let file = File::create(path)?;
    write_mesh_group(&file, mesh)?;
    if let Some(subdomains) = subdomains {
        write_tags_group(&file, SUBDOMAINS_GROUP, mesh, subdomains)?;
    }
    if let Some(boundaries) = boundaries {
        write_tags_group(&file, BOUNDARIES_GROUP, mesh, boundaries)?;
    }
    file.close()?;
    Ok(())
}

pub fn write_bundle(bundle: &MeshBundle, path: &Path) -> Result<()> {
    write_mesh_container(
        path,
        &bundle.mesh,
        Some(&bundle.subdomains),
        Some(&bundle.boundaries),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rectangle::rectangle_mesh;

    #[test]
    fn bundle_survives_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rect.h5");
        let mut bundle = rectangle_mesh([0.0, 0.0], [1.0, 2.0], 2, 3).unwrap();
        bundle.subdomains.values[3] = 9;

        write_bundle(&bundle, &path).unwrap();
        let read = read_mesh_container(&path, TagPolicy::Require).unwrap();
        assert_eq!(read, bundle);
    }

    #[test]
    fn absent_tag_groups_follow_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.h5");
        let bundle = rectangle_mesh([0.0, 0.0], [1.0, 1.0], 2, 2).unwrap();
        write_mesh_container(&path, &bundle.mesh, Some(&bundle.subdomains), None).unwrap();

        let lenient = read_mesh_container(&path, TagPolicy::Fallback).unwrap();
        assert!(lenient.boundaries.is_all_zero());
        assert_eq!(lenient.boundaries.len(), bundle.mesh.num_facets());

        let strict = read_mesh_container(&path, TagPolicy::Require);
        assert!(matches!(
            strict,
            Err(FemkitError::DatasetNotFound { dataset, .. }) if dataset == "/boundaries"
        ));
    }

    #[test]
    fn tags_of_the_wrong_dimension_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swap.h5");
        let bundle = rectangle_mesh([0.0, 0.0], [1.0, 1.0], 1, 1).unwrap();
        // facet tags stored where cell tags are expected
        write_mesh_container(&path, &bundle.mesh, Some(&bundle.boundaries), None).unwrap();

        assert!(matches!(
            read_mesh_container(&path, TagPolicy::Fallback),
            Err(FemkitError::InvalidMesh(_))
        ));
    }

    #[test]
    fn container_without_mesh_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.h5");
        File::create(&path).unwrap().close().unwrap();

        assert!(matches!(
            read_mesh_container(&path, TagPolicy::Fallback),
            Err(FemkitError::DatasetNotFound { .. })
        ));
    }
}
