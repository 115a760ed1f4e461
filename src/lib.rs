//! Mesh and data I/O for finite element simulations.
//!
//! Meshes are read from DOLFIN XML, HDF5 and XDMF files together with their
//! subdomain (cell) and boundary (facet) tags. Solution vectors are stored as
//! timestamped checkpoints in HDF5 containers.

pub mod checkpoint;
pub mod cluster;
pub mod convert;
pub mod datatypes;
pub mod dolfin_xml;
pub mod error;
pub mod format;
pub mod hdf5_io;
pub mod logging;
pub mod mesher;
pub mod params;
pub mod pulse;
pub mod reader;
pub mod rectangle;
pub mod xdmf;

pub use datatypes::{CellType, Mesh, MeshBundle, MeshFunction, TagKind};
pub use error::{FemkitError, Result};
pub use format::{MeshFormat, TagPolicy};
pub use reader::read_mesh;
