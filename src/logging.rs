//! Console and file log sinks.
//!
//! The library only emits `tracing` events. A binary (or a test) builds a
//! [`Dispatch`] from a [`LogConfig`] and installs it, either globally with
//! [`init`] or for a scope with `tracing::dispatcher::with_default`.

use std::fs::File;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

use tracing::Dispatch;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::error::{FemkitError, Result};

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LevelFilter,
    /// Plain-text copy of the log; an existing file is replaced.
    pub logfile: Option<PathBuf>,
    /// Process rank in a distributed run; only rank 0 emits.
    pub rank: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: LevelFilter::INFO,
            logfile: None,
            rank: 0,
        }
    }
}

impl LogConfig {
    pub fn with_level(mut self, level: &str) -> Result<Self> {
        self.level = parse_level(level)?;
        Ok(self)
    }

    pub fn with_logfile(mut self, logfile: impl Into<PathBuf>) -> Self {
        self.logfile = Some(logfile.into());
        self
    }

    pub fn with_rank(mut self, rank: usize) -> Self {
        self.rank = rank;
        self
    }

    pub fn effective_level(&self) -> LevelFilter {
        if self.rank == 0 {
            self.level
        } else {
            LevelFilter::OFF
        }
    }
}

pub fn parse_level(level: &str) -> Result<LevelFilter> {
    LevelFilter::from_str(level.trim())
        .map_err(|_| FemkitError::parse("<log level>", format!("unknown log level `{level}`")))
}

/// Builds the subscriber described by `config` without installing it.
pub fn dispatch(config: &LogConfig) -> Result<Dispatch> {
    let level = config.effective_level();

    let file_layer = match &config.logfile {
        Some(path) if level != LevelFilter::OFF => {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = File::create(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(Mutex::new(file)),
            )
        }
        _ => None,
    };

    let console_layer = fmt::layer()
        .with_target(true)
        .without_time()
        .with_writer(std::io::stderr);

    let subscriber = tracing_subscriber::registry()
        .with(level)
        .with(console_layer)
        .with(file_layer);

    Ok(Dispatch::new(subscriber))
}

/// Installs the subscriber described by `config` for the whole process.
pub fn init(config: &LogConfig) -> Result<()> {
    let dispatch = dispatch(config)?;
    tracing::dispatcher::set_global_default(dispatch)
        .map_err(|err| FemkitError::Io(std::io::Error::other(err.to_string())))
}
