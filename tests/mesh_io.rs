use std::path::Path;

use femkit::convert::{xml_to_hdf5, xml_to_xdmf};
use femkit::format::{companion_files, TagPolicy};
use femkit::reader::read_mesh_with_policy;
use femkit::rectangle::{rectangle_mesh, BOTTOM, TOP};
use femkit::{dolfin_xml, hdf5_io, read_mesh, FemkitError, MeshBundle};

fn tagged_rectangle() -> MeshBundle {
    let mut bundle = rectangle_mesh([0.0, 0.0], [2.0, 1.0], 4, 2).unwrap();
    for (i, value) in bundle.subdomains.values.iter_mut().enumerate() {
        *value = if i % 2 == 0 { 5 } else { 6 };
    }
    bundle
}

fn write_xml_triple(dir: &Path, bundle: &MeshBundle, subdomains: bool, boundaries: bool) -> std::path::PathBuf {
    let path = dir.join("rect.xml");
    dolfin_xml::write_mesh(&bundle.mesh, &path).unwrap();
    let companions = companion_files(&path);
    if subdomains {
        dolfin_xml::write_mesh_function(&bundle.subdomains, &companions.subdomains).unwrap();
    }
    if boundaries {
        dolfin_xml::write_mesh_function(&bundle.boundaries, &companions.boundaries).unwrap();
    }
    path
}

#[test]
fn xml_without_region_files_gets_zero_tags() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = tagged_rectangle();
    let path = write_xml_triple(dir.path(), &bundle, false, false);

    let read = read_mesh(&path).unwrap();
    assert_eq!(read.mesh.num_cells(), 16);
    assert_eq!(read.subdomains.len(), read.mesh.num_cells());
    assert_eq!(read.boundaries.len(), read.mesh.num_facets());
    assert!(read.subdomains.is_all_zero());
    assert!(read.boundaries.is_all_zero());
}

#[test]
fn xml_with_only_facet_regions() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = tagged_rectangle();
    let path = write_xml_triple(dir.path(), &bundle, false, true);

    let read = read_mesh(&path).unwrap();
    assert!(read.subdomains.is_all_zero());
    assert_eq!(read.boundaries.values, bundle.boundaries.values);
    assert!(read.boundaries.values.contains(&BOTTOM));
    assert!(read.boundaries.values.contains(&TOP));
}

#[test]
fn xml_strict_policy_requires_region_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_xml_triple(dir.path(), &tagged_rectangle(), true, false);

    assert!(matches!(
        read_mesh_with_policy(&path, TagPolicy::Require),
        Err(FemkitError::MissingCompanionFile(_))
    ));
}

#[test]
fn hdf5_without_tag_groups_gets_zero_tags() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = tagged_rectangle();
    let path = dir.path().join("rect.h5");
    hdf5_io::write_mesh_container(&path, &bundle.mesh, None, None).unwrap();

    let read = read_mesh(&path).unwrap();
    assert_eq!(read.mesh.num_vertices(), bundle.mesh.num_vertices());
    assert!(read.subdomains.is_all_zero());
    assert!(read.boundaries.is_all_zero());
}

#[test]
fn unknown_extension_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mesh.unknown");
    std::fs::write(&path, "").unwrap();

    assert!(matches!(
        read_mesh(&path),
        Err(FemkitError::UnsupportedFormat { .. })
    ));
}

#[test]
fn missing_mesh_is_file_not_found() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        read_mesh(dir.path().join("absent.h5")),
        Err(FemkitError::FileNotFound(_))
    ));
}

#[test]
fn converted_meshes_keep_tags() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = tagged_rectangle();
    let path = write_xml_triple(dir.path(), &bundle, true, true);

    let h5 = xml_to_hdf5(&path).unwrap();
    assert_eq!(h5, dir.path().join("rect.h5"));
    let from_h5 = read_mesh(&h5).unwrap();
    assert_eq!(from_h5.subdomains.values, bundle.subdomains.values);
    assert_eq!(from_h5.boundaries.values, bundle.boundaries.values);

    let xdmf = xml_to_xdmf(&path).unwrap();
    assert_eq!(xdmf, dir.path().join("rect.xdmf"));
    let from_xdmf = read_mesh(&xdmf).unwrap();
    assert_eq!(from_xdmf.mesh.cells(), bundle.mesh.cells());
    assert_eq!(from_xdmf.subdomains.values, bundle.subdomains.values);
    assert_eq!(from_xdmf.boundaries.values, bundle.boundaries.values);
}
