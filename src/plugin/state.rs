use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Answers "is this plugin installed?" by looking at the plugin root.
///
/// A plugin is installed iff a directory named after its download name
/// exists directly under the root. Nothing is cached: every call lists the
/// directory again, so answers stay correct across installs and removals
/// made between two queries.
#[derive(Debug, Clone)]
pub struct InstallState {
    root: PathBuf,
}

impl InstallState {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory a plugin lives in, whether or not it exists yet.
    ///
    /// `None` when `download_name` is not a plain directory name and would
    /// resolve outside the root.
    pub fn plugin_dir(&self, download_name: &str) -> Option<PathBuf> {
        is_plain_component(download_name).then(|| self.root.join(download_name))
    }

    /// Follows symlinks, like [`InstallState::list_installed`].
    pub fn is_installed(&self, download_name: &str) -> bool {
        let installed = self
            .plugin_dir(download_name)
            .is_some_and(|dir| dir.is_dir());
        tracing::debug!("installed({download_name}) = {installed}");
        installed
    }

    /// Download names of every immediate subdirectory of the root.
    ///
    /// A missing root means nothing is installed.
    pub fn list_installed(&self) -> io::Result<BTreeSet<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(err) => return Err(err),
        };

        let mut installed = BTreeSet::new();
        for entry in entries {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => {
                    installed.insert(name);
                }
                Err(raw) => {
                    tracing::debug!("ignoring non-UTF-8 plugin directory {raw:?}");
                }
            }
        }

        Ok(installed)
    }
}

/// True when `name` is exactly one ordinary path component, so that
/// joining it onto the plugin root cannot leave the root.
pub fn is_plain_component(name: &str) -> bool {
    if name.is_empty() || name.contains(['/', '\\']) {
        return false;
    }

    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
