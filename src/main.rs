use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use femkit::cluster::prep_mesh;
use femkit::convert::{xml_to_hdf5, xml_to_xdmf};
use femkit::logging::{self, LogConfig};
use femkit::params::{load_parameters, print_parameters};
use femkit::{mesher, read_mesh, Result};

#[derive(Parser)]
#[command(name = "femkit", version, about = "Mesh conversion and simulation I/O utilities")]
struct Cli {
    /// Log verbosity (error, warn, info, debug, trace, off)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Also write the log to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a DOLFIN XML mesh and its region files to HDF5
    Xml2hdf5 { infile: PathBuf },
    /// Convert a DOLFIN XML mesh and its region files to XDMF
    Xml2xdmf { infile: PathBuf },
    /// Read a mesh and summarise it
    Info { mesh: PathBuf },
    /// Print a YAML parameter file
    Params { file: PathBuf },
    /// Generate a fibrotic tissue mesh with Gmsh
    FibroMesh {
        file: PathBuf,
        #[arg(long, default_value = "gmsh")]
        gmsh: String,
    },
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Xml2hdf5 { infile } => {
            let outfile = xml_to_hdf5(&infile)?;
            info!("wrote {}", outfile.display());
        }
        Command::Xml2xdmf { infile } => {
            let outfile = xml_to_xdmf(&infile)?;
            info!("wrote {}", outfile.display());
        }
        Command::Info { mesh } => {
            let path = prep_mesh(&mesh)?;
            let bundle = read_mesh(&path)?;
            info!(
                "{}: {} mesh, gdim {}, {} vertices, {} cells, {} facets",
                path.display(),
                bundle.mesh.cell_type(),
                bundle.mesh.gdim(),
                bundle.mesh.num_vertices(),
                bundle.mesh.num_cells(),
                bundle.mesh.num_facets()
            );
            info!("subdomain tags: {:?}", bundle.subdomains.tags());
            info!("boundary tags: {:?}", bundle.boundaries.tags());
        }
        Command::Params { file } => {
            let params = load_parameters(&file)?;
            print_parameters(&params);
        }
        Command::FibroMesh { file, gmsh } => {
            let params = load_parameters(&file)?;
            let outfile = mesher::run(&params, &gmsh)?;
            info!("wrote {}", outfile.display());
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let mut config = match LogConfig::default().with_level(&cli.log_level) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2)
        }
    };
    if let Some(log_file) = cli.log_file {
        config = config.with_logfile(log_file);
    }
    if let Err(err) = logging::init(&config) {
        eprintln!("failed to set up logging: {err}");
        std::process::exit(1)
    }

    if let Err(err) = run(cli.command) {
        error!("{err}");
        std::process::exit(1)
    }
}
