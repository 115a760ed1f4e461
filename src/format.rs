use std::path::{Path, PathBuf};

use crate::error::{FemkitError, Result};

pub const PHYSICAL_REGION_SUFFIX: &str = "_physical_region.xml";
pub const FACET_REGION_SUFFIX: &str = "_facet_region.xml";

const READABLE_FORMATS: &str = "Try XDMF or HDF5 (or XML, deprecated)";

/// On-disk mesh encodings, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    /// DOLFIN XML triple: mesh plus two companion tag files
    Xml,
    /// Single HDF5 container with `/mesh`, `/subdomains`, `/boundaries`
    Hdf5,
    /// XDMF light data, heavy data inline or in an HDF5 file
    Xdmf,
}

/// What to do when a tag source (companion file, dataset or attribute) is
/// missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagPolicy {
    /// Fall back to all-zero tags and log a warning
    Fallback,
    /// Fail with a typed error
    Require,
}

impl MeshFormat {
    pub fn from_path(path: &Path) -> Result<MeshFormat> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match extension {
            "xml" => Ok(MeshFormat::Xml),
            "h5" => Ok(MeshFormat::Hdf5),
            "xdmf" => Ok(MeshFormat::Xdmf),
            other => Err(FemkitError::unsupported_format(other, READABLE_FORMATS)),
        }
    }

    /// XDMF tag data was historically read without presence checks, so it
    /// stays strict unless the caller opts out.
    pub fn default_tag_policy(&self) -> TagPolicy {
        match self {
            MeshFormat::Xml | MeshFormat::Hdf5 => TagPolicy::Fallback,
            MeshFormat::Xdmf => TagPolicy::Require,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            MeshFormat::Xml => "xml",
            MeshFormat::Hdf5 => "h5",
            MeshFormat::Xdmf => "xdmf",
        }
    }
}

/// Companion tag files of a DOLFIN XML mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanionFiles {
    pub subdomains: PathBuf,
    pub boundaries: PathBuf,
}

/// Builds `<prefix>_physical_region.xml` and `<prefix>_facet_region.xml`,
/// where the prefix is the mesh path without its extension.
pub fn companion_files(mesh_file: &Path) -> CompanionFiles {
    let prefix = mesh_file.with_extension("");
    let prefix = prefix.as_os_str().to_string_lossy();

    CompanionFiles {
        subdomains: PathBuf::from(format!("{prefix}{PHYSICAL_REGION_SUFFIX}")),
        boundaries: PathBuf::from(format!("{prefix}{FACET_REGION_SUFFIX}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_on_extension() {
        assert_eq!(
            MeshFormat::from_path(Path::new("meshes/case.xml")).unwrap(),
            MeshFormat::Xml
        );
        assert_eq!(
            MeshFormat::from_path(Path::new("case.h5")).unwrap(),
            MeshFormat::Hdf5
        );
        assert_eq!(
            MeshFormat::from_path(Path::new("case.xdmf")).unwrap(),
            MeshFormat::Xdmf
        );
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let err = MeshFormat::from_path(Path::new("mesh.unknown")).unwrap_err();
        assert!(matches!(err, FemkitError::UnsupportedFormat { format, .. } if format == "unknown"));
        assert!(matches!(
            MeshFormat::from_path(Path::new("mesh")),
            Err(FemkitError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn companion_names_strip_only_last_extension() {
        let companions = companion_files(Path::new("/data/run.v2/case.xml"));
        assert_eq!(
            companions.subdomains,
            PathBuf::from("/data/run.v2/case_physical_region.xml")
        );
        assert_eq!(
            companions.boundaries,
            PathBuf::from("/data/run.v2/case_facet_region.xml")
        );
    }

    #[test]
    fn xdmf_requires_tags_by_default() {
        assert_eq!(MeshFormat::Xml.default_tag_policy(), TagPolicy::Fallback);
        assert_eq!(MeshFormat::Hdf5.default_tag_policy(), TagPolicy::Fallback);
        assert_eq!(MeshFormat::Xdmf.default_tag_policy(), TagPolicy::Require);
    }
}
