//! Deployment conventions for running on the cluster.
//!
//! Cluster nodes are recognised by hostname (`leftraruN` login nodes and
//! `cnNNN` compute nodes). On those hosts meshes are copied into a
//! memory-backed scratch directory before use.

use std::path::{Component, Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::error::{FemkitError, Result};

/// Anchored at the start of the hostname only.
pub const CLUSTER_HOST_PATTERN: &str = r"^(?:leftraru\d|cn\d\d\d)";
pub const DEFAULT_SCRATCH_DIR: &str = "/dev/shm";

static CLUSTER_HOST: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(CLUSTER_HOST_PATTERN));

pub fn is_cluster_host(hostname: &str) -> Result<bool> {
    let pattern = CLUSTER_HOST.as_ref().map_err(Clone::clone)?;
    Ok(pattern.is_match(hostname))
}

/// Name of the current host, empty if it cannot be determined.
pub fn hostname() -> String {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .map(|name| name.trim().to_string())
        .ok()
        .filter(|name| !name.is_empty())
        .or_else(|| std::env::var("HOSTNAME").ok())
        .unwrap_or_default()
}

pub fn on_cluster() -> Result<bool> {
    is_cluster_host(&hostname())
}

/// Where meshes are looked up and, on the cluster, staged.
#[derive(Debug, Clone)]
pub struct MeshLocator {
    pub on_cluster: bool,
    /// Directory mesh names are relative to
    pub source_dir: PathBuf,
    pub scratch_dir: PathBuf,
}

impl MeshLocator {
    pub fn for_current_host() -> Result<MeshLocator> {
        Ok(MeshLocator {
            on_cluster: on_cluster()?,
            source_dir: std::env::current_dir()?,
            scratch_dir: PathBuf::from(DEFAULT_SCRATCH_DIR),
        })
    }

    /// On the cluster, copies `<source_dir>/<name>` to `<scratch_dir>/<name>`
    /// and returns the copy; elsewhere returns `name` unchanged.
    ///
    /// Absolute names are staged under their full path inside `scratch_dir`.
    /// Names containing `..` are rejected.
    pub fn resolve_mesh_path(&self, name: impl AsRef<Path>) -> Result<PathBuf> {
        let name = name.as_ref();
        if !self.on_cluster {
            return Ok(name.to_path_buf());
        }

        let staged_name = scratch_relative(name)?;
        let source = self.source_dir.join(name);
        if !source.is_file() {
            return Err(FemkitError::FileNotFound(source));
        }
        let target = self.scratch_dir.join(staged_name);
        if same_file(&source, &target) {
            debug!("mesh {} is already in scratch", target.display());
            return Ok(target);
        }
        if let Some(parent) = target.parent() {
            ensure_dir(parent)?;
        }
        info!("copying mesh {} to {}", source.display(), target.display());
        std::fs::copy(&source, &target)?;
        Ok(target)
    }
}

/// `name` with its root removed, so that joining it never leaves the base.
fn scratch_relative(name: &Path) -> Result<PathBuf> {
    let mut relative = PathBuf::new();
    for component in name.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::ParentDir => {
                return Err(FemkitError::InvalidPath {
                    path: name.to_path_buf(),
                    reason: "mesh names must not contain `..`".to_string(),
                })
            }
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(FemkitError::InvalidPath {
            path: name.to_path_buf(),
            reason: "mesh name has no file component".to_string(),
        });
    }
    Ok(relative)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Resolves a mesh name for the current host.
pub fn prep_mesh(name: impl AsRef<Path>) -> Result<PathBuf> {
    MeshLocator::for_current_host()?.resolve_mesh_path(name)
}

/// Creates `path` and its parents; an existing directory is not an error.
pub fn ensure_dir(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    match std::fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(_) if path.is_dir() => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Commit hash of HEAD in the git repository containing `path`.
pub fn git_rev_hash(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let path = path.canonicalize().map_err(|_| FemkitError::FileNotFound(path.to_path_buf()))?;
    let dir = if path.is_dir() {
        path
    } else {
        path.parent().map(Path::to_path_buf).unwrap_or(path)
    };

    debug!("querying git revision in {}", dir.display());
    let output = match Command::new("git")
        .arg("-C")
        .arg(&dir)
        .arg("rev-parse")
        .arg("HEAD")
        .output()
    {
        Ok(out) => out,
        Err(err) => return Err(FemkitError::Git(format!("failed to run git: {err}"))),
    };

    if !output.status.success() {
        return Err(FemkitError::Git(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_cluster_hostnames() {
        for host in ["leftraru3", "cn042", "leftraru1.nlhpc.cl"] {
            assert!(is_cluster_host(host).unwrap(), "{host}");
        }
        for host in ["laptop", "cn42", "node-cn123", ""] {
            assert!(!is_cluster_host(host).unwrap(), "{host}");
        }
    }

    #[test]
    fn local_hosts_keep_the_name() {
        let locator = MeshLocator {
            on_cluster: false,
            source_dir: PathBuf::from("/nonexistent"),
            scratch_dir: PathBuf::from("/nonexistent/scratch"),
        };
        assert_eq!(
            locator.resolve_mesh_path("meshes/case.h5").unwrap(),
            PathBuf::from("meshes/case.h5")
        );
    }

    #[test]
    fn cluster_hosts_stage_into_scratch() {
        let source = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        std::fs::create_dir(source.path().join("meshes")).unwrap();
        std::fs::write(source.path().join("meshes/case.h5"), b"mesh").unwrap();

        let locator = MeshLocator {
            on_cluster: true,
            source_dir: source.path().to_path_buf(),
            scratch_dir: scratch.path().to_path_buf(),
        };
        let staged = locator.resolve_mesh_path("meshes/case.h5").unwrap();
        assert_eq!(staged, scratch.path().join("meshes/case.h5"));
        assert_eq!(std::fs::read(&staged).unwrap(), b"mesh");

        assert!(matches!(
            locator.resolve_mesh_path("meshes/other.h5"),
            Err(FemkitError::FileNotFound(_))
        ));
    }

    #[test]
    fn absolute_names_never_alias_the_source() {
        let source = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let mesh = source.path().join("case.h5");
        std::fs::write(&mesh, b"precious mesh").unwrap();

        let locator = MeshLocator {
            on_cluster: true,
            source_dir: PathBuf::from("/nonexistent"),
            scratch_dir: scratch.path().to_path_buf(),
        };
        let staged = locator.resolve_mesh_path(&mesh).unwrap();
        assert!(staged.starts_with(scratch.path()));
        assert_ne!(staged, mesh);
        assert_eq!(std::fs::read(&staged).unwrap(), b"precious mesh");
        assert_eq!(std::fs::read(&mesh).unwrap(), b"precious mesh");
    }

    #[test]
    fn parent_components_are_rejected() {
        let scratch = tempfile::tempdir().unwrap();
        let locator = MeshLocator {
            on_cluster: true,
            source_dir: scratch.path().join("meshes"),
            scratch_dir: scratch.path().join("stage"),
        };
        assert!(matches!(
            locator.resolve_mesh_path("../case.h5"),
            Err(FemkitError::InvalidPath { .. })
        ));
    }

    #[test]
    fn mesh_already_in_scratch_is_left_alone() {
        let scratch = tempfile::tempdir().unwrap();
        std::fs::write(scratch.path().join("case.h5"), b"precious mesh").unwrap();

        let locator = MeshLocator {
            on_cluster: true,
            source_dir: scratch.path().to_path_buf(),
            scratch_dir: scratch.path().to_path_buf(),
        };
        let staged = locator.resolve_mesh_path("case.h5").unwrap();
        assert_eq!(staged, scratch.path().join("case.h5"));
        assert_eq!(std::fs::read(&staged).unwrap(), b"precious mesh");
    }

    #[test]
    fn ensure_dir_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("results/run/1");
        ensure_dir(&nested).unwrap();
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
