//! Checkpoints of solution fields.
//!
//! A field named `u` is stored as the dataset `u/vector_0` of a container
//! file; its time lives in the `timestamp` attribute of that dataset. Series
//! written with [`append_checkpoint`] continue with `vector_1`, `vector_2`...

use std::path::Path;

use hdf5::{File, Group};
use nalgebra::DVector;
use tracing::debug;

use crate::error::{FemkitError, Result};
use crate::hdf5_io::open_container;

pub const TIMESTAMP_ATTRIBUTE: &str = "timestamp";
const VECTOR_PREFIX: &str = "vector_";

/// A stored field value and the time it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub field: DVector<f64>,
    pub timestamp: f64,
}

impl Checkpoint {
    pub fn new(field: DVector<f64>) -> Checkpoint {
        Checkpoint {
            field,
            timestamp: 0.0,
        }
    }

    pub fn at(field: DVector<f64>, timestamp: f64) -> Checkpoint {
        Checkpoint { field, timestamp }
    }
}

fn normalize(name: &str) -> &str {
    name.trim_matches('/')
}

/// Opens `name` as a group, creating it and its parents if needed.
fn require_group(file: &File, name: &str) -> Result<Group> {
    let mut path = String::new();
    for component in normalize(name).split('/').filter(|c| !c.is_empty()) {
        if !path.is_empty() {
            path.push('/');
        }
        path.push_str(component);
        if !file.link_exists(&path) {
            file.create_group(&path)?;
        }
    }
    if path.is_empty() {
        return Err(FemkitError::dataset_not_found(
            file.filename(),
            name.to_string(),
        ));
    }
    Ok(file.group(&path)?)
}

fn write_vector(group: &Group, index: usize, field: &DVector<f64>, timestamp: f64) -> Result<()> {
    let dataset = group
        .new_dataset::<f64>()
        .shape(field.len())
        .create(format!("{VECTOR_PREFIX}{index}").as_str())?;
    if !field.is_empty() {
        dataset.write_raw(field.as_slice())?;
    }
    dataset
        .new_attr::<f64>()
        .shape(())
        .create(TIMESTAMP_ATTRIBUTE)?
        .write_scalar(&timestamp)?;
    Ok(())
}

fn vector_indices(group: &Group) -> Result<Vec<usize>> {
    let mut indices: Vec<usize> = group
        .member_names()?
        .iter()
        .filter_map(|name| name.strip_prefix(VECTOR_PREFIX))
        .filter_map(|suffix| suffix.parse().ok())
        .collect();
    indices.sort_unstable();
    Ok(indices)
}

fn read_vector(group: &Group, index: usize) -> Result<Checkpoint> {
    let dataset = group.dataset(&format!("{VECTOR_PREFIX}{index}"))?;
    let values: Vec<f64> = if dataset.size() == 0 {
        Vec::new()
    } else {
        dataset.read_raw::<f64>()?
    };

    let has_timestamp = dataset
        .attr_names()?
        .iter()
        .any(|name| name == TIMESTAMP_ATTRIBUTE);
    let timestamp = if has_timestamp {
        dataset.attr(TIMESTAMP_ATTRIBUTE)?.read_scalar::<f64>()?
    } else {
        0.0
    };

    Ok(Checkpoint {
        field: DVector::from_vec(values),
        timestamp,
    })
}

/// Writes `field` as `name` into a new container, replacing any existing
/// file.
pub fn write_checkpoint(
    container: impl AsRef<Path>,
    name: &str,
    field: &DVector<f64>,
    timestamp: f64,
) -> Result<()> {
    let container = container.as_ref();
    debug!(
        "writing checkpoint `{name}` (t = {timestamp}) to {}",
        container.display()
    );
    let file = File::create(container)?;
    let group = require_group(&file, name)?;
    write_vector(&group, 0, field, timestamp)?;
    file.close()?;
    Ok(())
}

/// Same as [`write_checkpoint`] with timestamp 0.
pub fn write_checkpoint_default(
    container: impl AsRef<Path>,
    name: &str,
    field: &DVector<f64>,
) -> Result<()> {
    write_checkpoint(container, name, field, 0.0)
}

/// Adds `field` as the next record of `name`, keeping everything already in
/// the container. Returns the index of the new record.
pub fn append_checkpoint(
    container: impl AsRef<Path>,
    name: &str,
    field: &DVector<f64>,
    timestamp: f64,
) -> Result<usize> {
    let container = container.as_ref();
    let file = File::append(container)?;
    let group = require_group(&file, name)?;
    let index = vector_indices(&group)?
        .last()
        .map(|last| last + 1)
        .unwrap_or(0);
    debug!(
        "appending checkpoint `{name}` #{index} (t = {timestamp}) to {}",
        container.display()
    );
    write_vector(&group, index, field, timestamp)?;
    file.close()?;
    Ok(index)
}

fn open_group(container: &Path, name: &str) -> Result<(File, Group)> {
    let file = open_container(container)?;
    let key = normalize(name);
    if key.is_empty() || !file.link_exists(key) {
        return Err(FemkitError::dataset_not_found(container, name));
    }
    let group = file.group(key)?;
    Ok((file, group))
}

/// Reads the first record of `name`. The timestamp is 0 when the record
/// carries none.
pub fn read_checkpoint(container: impl AsRef<Path>, name: &str) -> Result<Checkpoint> {
    let container = container.as_ref();
    let (_file, group) = open_group(container, name)?;
    if !group.link_exists(&format!("{VECTOR_PREFIX}0")) {
        return Err(FemkitError::dataset_not_found(
            container,
            format!("{}/{VECTOR_PREFIX}0", normalize(name)),
        ));
    }
    read_vector(&group, 0)
}

/// Reads every record of `name` in index order.
pub fn read_checkpoint_series(
    container: impl AsRef<Path>,
    name: &str,
) -> Result<Vec<Checkpoint>> {
    let container = container.as_ref();
    let (_file, group) = open_group(container, name)?;
    vector_indices(&group)?
        .into_iter()
        .map(|index| read_vector(&group, index))
        .collect()
}
