use std::path::{Path, PathBuf};

use tracing::info;

use crate::dolfin_xml;
use crate::error::{FemkitError, Result};
use crate::format::companion_files;
use crate::reader::read_companion;
use crate::{hdf5_io, xdmf};

/// Target encoding of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Hdf5,
    Xdmf,
}

impl Target {
    fn extension(&self) -> &'static str {
        match self {
            Target::Hdf5 => "h5",
            Target::Xdmf => "xdmf",
        }
    }
}

fn check_input(infile: &Path) -> Result<()> {
    if !infile.is_file() {
        return Err(FemkitError::FileNotFound(infile.to_path_buf()));
    }
    match infile.extension().and_then(|e| e.to_str()) {
        Some("xml") => Ok(()),
        other => Err(FemkitError::unsupported_format(
            other.unwrap_or_default(),
            "Conversion expects a DOLFIN mesh with .xml extension",
        )),
    }
}

/// Converts a DOLFIN XML mesh and whichever companion tag files exist into
/// `target`, written next to the input. Returns the path of the written file.
pub fn convert(infile: impl AsRef<Path>, target: Target) -> Result<PathBuf> {
    let infile = infile.as_ref();
    check_input(infile)?;
    let outfile = infile.with_extension(target.extension());

    info!("reading DOLFIN mesh {}", infile.display());
    let mesh = dolfin_xml::read_mesh(infile)?;

    let companions = companion_files(infile);
    let subdomains = read_companion(&companions.subdomains, &mesh)?;
    match &subdomains {
        Some(_) => info!("writing subdomain tags"),
        None => info!("no subdomain tags found"),
    }
    let boundaries = read_companion(&companions.boundaries, &mesh)?;
    match &boundaries {
        Some(_) => info!("writing boundary tags"),
        None => info!("no boundary tags found"),
    }

    info!("writing {:?} mesh {}", target, outfile.display());
    match target {
        Target::Hdf5 => hdf5_io::write_mesh_container(
            &outfile,
            &mesh,
            subdomains.as_ref(),
            boundaries.as_ref(),
        )?,
        Target::Xdmf => {
            xdmf::write_xdmf(&outfile, &mesh, subdomains.as_ref(), boundaries.as_ref())?
        }
    }

    Ok(outfile)
}

pub fn xml_to_hdf5(infile: impl AsRef<Path>) -> Result<PathBuf> {
    convert(infile, Target::Hdf5)
}

pub fn xml_to_xdmf(infile: impl AsRef<Path>) -> Result<PathBuf> {
    convert(infile, Target::Xdmf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_xml_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mesh.msh");
        std::fs::write(&path, "$MeshFormat").unwrap();

        let err = xml_to_hdf5(&path).unwrap_err();
        assert!(matches!(
            &err,
            FemkitError::UnsupportedFormat { format, .. } if format == "msh"
        ));
        let message = err.to_string();
        assert!(message.contains(".xml extension"), "{message}");
        assert!(!message.contains("Try XDMF"), "{message}");
        assert!(matches!(
            xml_to_hdf5(dir.path().join("absent.xml")),
            Err(FemkitError::FileNotFound(_))
        ));
    }
}
