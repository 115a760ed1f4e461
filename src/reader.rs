use std::path::Path;

use tracing::{info, warn};

use crate::datatypes::{Mesh, MeshBundle, MeshFunction};
use crate::dolfin_xml;
use crate::error::{FemkitError, Result};
use crate::format::{companion_files, MeshFormat, TagPolicy};
use crate::{hdf5_io, xdmf};

/// Reads a mesh and its subdomain and boundary tags.
///
/// The encoding is chosen from the extension (`xml`, `h5`, `xdmf`). Missing
/// tag sources fall back to all-zero tags for XML and HDF5; XDMF requires
/// them (see [`MeshFormat::default_tag_policy`]).
pub fn read_mesh(path: impl AsRef<Path>) -> Result<MeshBundle> {
    let path = path.as_ref();
    let format = MeshFormat::from_path(path)?;
    read_mesh_with_policy(path, format.default_tag_policy())
}

pub fn read_mesh_with_policy(path: impl AsRef<Path>, policy: TagPolicy) -> Result<MeshBundle> {
    let path = path.as_ref();
    let format = MeshFormat::from_path(path)?;
    info!("reading {:?} mesh {}", format, path.display());

    let bundle = match format {
        MeshFormat::Xml => read_xml_triple(path, policy)?,
        MeshFormat::Hdf5 => hdf5_io::read_mesh_container(path, policy)?,
        MeshFormat::Xdmf => xdmf::read_xdmf(path, policy)?,
    };

    info!(
        "loaded {} vertices, {} cells, {} facets",
        bundle.mesh.num_vertices(),
        bundle.mesh.num_cells(),
        bundle.mesh.num_facets()
    );
    Ok(bundle)
}

/// Loads a companion tag file, `None` if it does not exist.
pub fn read_companion(path: &Path, mesh: &Mesh) -> Result<Option<MeshFunction>> {
    match dolfin_xml::read_mesh_function_any(path, mesh) {
        Ok(function) => Ok(Some(function)),
        Err(FemkitError::FileNotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

fn companion_or_default(
    path: &Path,
    mesh: &Mesh,
    dim: usize,
    policy: TagPolicy,
) -> Result<MeshFunction> {
    if let Some(function) = read_companion(path, mesh)? {
        if function.dim != dim {
            return Err(FemkitError::parse(
                path,
                format!("expected tags of dimension {dim}, found {}", function.dim),
            ));
        }
        return Ok(function);
    }
    match policy {
        TagPolicy::Fallback => {
            warn!("no tag file found ({})", path.display());
            MeshFunction::zeros_on(mesh, dim)
        }
        TagPolicy::Require => Err(FemkitError::MissingCompanionFile(path.to_path_buf())),
    }
}

fn read_xml_triple(path: &Path, policy: TagPolicy) -> Result<MeshBundle> {
    let mesh = dolfin_xml::read_mesh(path)?;
    let companions = companion_files(path);
    let tdim = mesh.tdim();

    let subdomains = companion_or_default(&companions.subdomains, &mesh, tdim, policy)?;
    let boundaries = companion_or_default(&companions.boundaries, &mesh, tdim - 1, policy)?;

    Ok(MeshBundle {
        mesh,
        subdomains,
        boundaries,
    })
}
