use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::plugin::host::CommandTable;
use crate::plugin::runtime::ModuleLoader;

/// File stems ending in this marker are entry points.
pub const ENTRY_SUFFIX: &str = "_plugin";

#[derive(Debug, Error)]
pub enum BindError {
    #[error("cannot scan {}: {source}", .dir.display())]
    Scan {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("command {command}: {source}")]
    Load {
        command: String,
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    /// Command name: the file stem without [`ENTRY_SUFFIX`].
    pub command: String,
    pub path: PathBuf,
}

/// Outcome of binding one plugin directory.
#[derive(Debug, Default)]
pub struct BindReport {
    pub bound: Vec<String>,
    pub failed: Vec<BindError>,
}

/// Strips the entry suffix (ASCII case-insensitive) from a file stem.
pub fn command_name(stem: &str) -> Option<&str> {
    let split = stem.len().checked_sub(ENTRY_SUFFIX.len())?;
    if !stem.is_char_boundary(split) || !stem[split..].eq_ignore_ascii_case(ENTRY_SUFFIX) {
        return None;
    }

    let command = &stem[..split];
    (!command.is_empty()).then_some(command)
}

/// Entry points among the immediate files of `dir`, sorted by command name.
pub fn discover_entry_points(dir: &Path, extension: &str) -> io::Result<Vec<EntryPoint>> {
    let mut found = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let path = entry.path();
        let matches_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if !matches_extension {
            continue;
        }

        let Some(command) = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(command_name)
        else {
            continue;
        };

        found.push(EntryPoint {
            command: command.to_string(),
            path,
        });
    }

    found.sort_by(|a, b| a.command.cmp(&b.command));
    Ok(found)
}

/// Exposes an installed plugin's entry points as host commands.
pub struct CommandBinder {
    loader: Box<dyn ModuleLoader>,
}

impl CommandBinder {
    pub fn new(loader: Box<dyn ModuleLoader>) -> Self {
        Self { loader }
    }

    pub fn entry_points(&self, dir: &Path) -> io::Result<Vec<EntryPoint>> {
        discover_entry_points(dir, self.loader.extension())
    }

    /// Load every entry point in `dir` and register it on `table`.
    ///
    /// An entry point that fails to load is reported and skipped; the rest
    /// are still bound. Existing commands with the same name are replaced.
    pub fn bind(&self, dir: &Path, table: &mut dyn CommandTable) -> BindReport {
        let mut report = BindReport::default();

        let entry_points = match self.entry_points(dir) {
            Ok(entry_points) => entry_points,
            Err(source) => {
                report.failed.push(BindError::Scan {
                    dir: dir.to_path_buf(),
                    source,
                });
                return report;
            }
        };

        for EntryPoint { command, path } in entry_points {
            match self.loader.load(&path) {
                Ok(callable) => {
                    table.register_command(&command, callable);
                    tracing::info!("bound command {command} -> {}", path.display());
                    report.bound.push(command);
                }
                Err(err) => {
                    tracing::warn!("skipping entry point {}: {err:#}", path.display());
                    report.failed.push(BindError::Load {
                        command,
                        path,
                        source: err.into(),
                    });
                }
            }
        }

        report
    }

    /// Unregister the commands `dir` provides. Returns the names that were
    /// actually registered.
    pub fn unbind(&self, dir: &Path, table: &mut dyn CommandTable) -> Vec<String> {
        let entry_points = match self.entry_points(dir) {
            Ok(entry_points) => entry_points,
            Err(err) => {
                tracing::debug!("nothing to unbind in {}: {err}", dir.display());
                return Vec::new();
            }
        };

        entry_points
            .into_iter()
            .filter(|entry| table.unregister_command(&entry.command))
            .map(|entry| entry.command)
            .collect()
    }
}
