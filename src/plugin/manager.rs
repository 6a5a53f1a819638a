use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::model::config::AppConfig;
use crate::plugin::binder::{BindReport, CommandBinder};
use crate::plugin::host::CommandTable;
use crate::plugin::outcome::{Outcome, ResultCode};
use crate::plugin::query::{Listing, NamePattern};
use crate::plugin::registry::{Registry, RegistryError};
use crate::plugin::runtime::WasmLoader;
use crate::plugin::state::InstallState;
use crate::plugin::vcs::{GitCli, Vcs};
use crate::plugin::workdir::with_working_dir;

/// Drives install, update and removal of registry plugins.
///
/// Every decision re-queries [`InstallState`]; no installed flag is kept
/// between operations. Batch operations evaluate each target on its own
/// and report exactly one [`Outcome`] per target.
pub struct PluginManager {
    registry: Registry,
    registry_errors: Vec<RegistryError>,
    state: InstallState,
    vcs: Box<dyn Vcs>,
    binder: CommandBinder,
    protected: Vec<String>,
}

impl PluginManager {
    pub fn new(
        registry: Registry,
        state: InstallState,
        vcs: Box<dyn Vcs>,
        binder: CommandBinder,
        protected: Vec<String>,
    ) -> Self {
        Self {
            registry,
            registry_errors: Vec::new(),
            state,
            vcs,
            binder,
            protected,
        }
    }

    /// Build the manager the binary uses: git subprocess, wasm entry
    /// points, registry read from the configured file.
    ///
    /// Malformed registry lines are skipped and kept for
    /// [`PluginManager::startup_notifications`]; an unreadable registry
    /// is an error.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mut registry = Registry::default();
        let registry_path = config.registry_path();
        let registry_errors = registry
            .load(&registry_path)
            .with_context(|| format!("loading plugin registry {}", registry_path.display()))?;

        let mut manager = Self::new(
            registry,
            InstallState::new(config.plugin_root()),
            Box::new(GitCli::new(&config.vcs.program, config.vcs_timeout())),
            CommandBinder::new(Box::new(WasmLoader)),
            config.protection.names.clone(),
        );
        manager.registry_errors = registry_errors;

        tracing::info!(
            "plugin manager ready: {} registry entries, root {}",
            manager.registry.len(),
            manager.state.root().display()
        );
        Ok(manager)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn state(&self) -> &InstallState {
        &self.state
    }

    /// Re-read the registry file; skipped lines replace the previous ones.
    pub fn reload_registry(&mut self) -> Result<(), RegistryError> {
        self.registry_errors = self.registry.reload()?;
        Ok(())
    }

    pub fn startup_notifications(&self) -> Vec<String> {
        let mut notices: Vec<String> = self
            .registry_errors
            .iter()
            .map(|err| match err {
                RegistryError::MalformedEntry {
                    line,
                    content,
                    reason,
                } => Outcome::new(format!("registry line {line}"), ResultCode::MalformedEntry)
                    .with_detail(format!("{content:?} skipped, {reason}"))
                    .to_string(),
                other => format!("registry: {other}"),
            })
            .collect();

        for name in self.registry.duplicate_names() {
            notices.push(format!("registry: duplicate name {name}, first entry wins"));
        }

        notices
    }

    pub fn is_protected(&self, name: &str) -> bool {
        self.protected.iter().any(|protected| protected == name)
    }

    pub fn install<S: AsRef<str>>(
        &mut self,
        names: &[S],
        table: &mut dyn CommandTable,
    ) -> Vec<Outcome> {
        names
            .iter()
            .map(|name| self.install_one(name.as_ref(), table))
            .collect()
    }

    /// Clone a registry plugin into its directory and bind its commands.
    ///
    /// A failed clone removes the directory it was cloned into, so the
    /// plugin stays uninstalled and can be retried.
    pub fn install_one(&mut self, name: &str, table: &mut dyn CommandTable) -> Outcome {
        let Some(descriptor) = self.registry.find(name) else {
            return Outcome::new(name, ResultCode::NotFound);
        };
        let download_name = descriptor.download_name.clone();
        let source_url = descriptor.source_url.clone();

        // Registry parsers are pluggable; nothing outside the root is touched.
        let Some(dir) = self.state.plugin_dir(&download_name) else {
            tracing::warn!("install {name}: download name {download_name:?} rejected");
            return Outcome::new(name, ResultCode::GeneralFailure)
                .with_detail(format!("{download_name:?} is not a plain directory name"));
        };

        if self.state.is_installed(&download_name) {
            return Outcome::new(name, ResultCode::AlreadyInstalled)
                .with_detail("use update to download the latest version");
        }

        if let Err(err) = fs::create_dir_all(&dir) {
            tracing::warn!("install {name}: cannot create {}: {err}", dir.display());
            return Outcome::new(name, ResultCode::GeneralFailure)
                .with_detail(format!("cannot create {}: {err}", dir.display()));
        }

        let cloned = with_working_dir(&dir, || self.vcs.clone_here(&source_url))
            .map_err(|err| format!("cannot enter {}: {err}", dir.display()))
            .and_then(|result| result.map_err(|err| err.to_string()));

        if let Err(reason) = cloned {
            tracing::warn!("install {name} from {source_url} failed: {reason}");
            discard_partial_install(&dir);
            return Outcome::new(name, ResultCode::GeneralFailure).with_detail(reason);
        }

        let report = self.binder.bind(&dir, table);
        tracing::info!("installed {name} into {}", dir.display());
        Outcome::new(name, ResultCode::Ok).with_detail(describe_binding(&report))
    }

    /// Pull the given plugins, or every installed plugin when `names` is
    /// empty.
    ///
    /// Names are resolved through the registry when listed there and used
    /// as download names otherwise, so plugins dropped from the registry
    /// stay updatable. Only a failure to list the plugin root is an error.
    pub fn update<S: AsRef<str>>(&mut self, names: &[S]) -> Result<Vec<Outcome>> {
        if names.is_empty() {
            let installed = self
                .state
                .list_installed()
                .with_context(|| format!("listing {}", self.state.root().display()))?;

            return Ok(installed
                .iter()
                .map(|download_name| self.pull(download_name, download_name))
                .collect());
        }

        Ok(names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                let download_name = self.resolve_download_name(name).to_string();
                self.pull(name, &download_name)
            })
            .collect())
    }

    fn pull(&self, target: &str, download_name: &str) -> Outcome {
        let Some(dir) = self.installed_dir(download_name) else {
            return Outcome::new(target, ResultCode::NotInstalled);
        };

        let pulled = with_working_dir(&dir, || self.vcs.pull_here())
            .map_err(|err| format!("cannot enter {}: {err}", dir.display()))
            .and_then(|result| result.map_err(|err| err.to_string()));

        match pulled {
            Ok(output) => {
                tracing::info!("updated {target}");
                let summary = output.lines().last().unwrap_or_default().trim();
                let outcome = Outcome::new(target, ResultCode::Ok);
                if summary.is_empty() {
                    outcome
                } else {
                    outcome.with_detail(summary)
                }
            }
            Err(reason) => {
                tracing::warn!("update {target} failed: {reason}");
                Outcome::new(target, ResultCode::GeneralFailure).with_detail(reason)
            }
        }
    }

    pub fn remove<S: AsRef<str>>(
        &mut self,
        names: &[S],
        table: &mut dyn CommandTable,
    ) -> Vec<Outcome> {
        names
            .iter()
            .map(|name| self.remove_one(name.as_ref(), table))
            .collect()
    }

    /// Unbind a plugin's commands and delete its directory.
    ///
    /// Protected names are refused before anything else is looked at.
    /// Deletion is not atomic: a failure can leave the directory partially
    /// removed.
    pub fn remove_one(&mut self, name: &str, table: &mut dyn CommandTable) -> Outcome {
        let download_name = self.resolve_download_name(name).to_string();
        if self.is_protected(name) || self.is_protected(&download_name) {
            return Outcome::new(name, ResultCode::ProtectedEntry);
        }

        let Some(dir) = self.installed_dir(&download_name) else {
            return Outcome::new(name, ResultCode::NotInstalled);
        };

        let unbound = self.binder.unbind(&dir, table);

        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::info!("removed {name} from {}", dir.display());
                let outcome = Outcome::new(name, ResultCode::Ok);
                if unbound.is_empty() {
                    outcome
                } else {
                    outcome.with_detail(format!("unregistered {}", unbound.join(", ")))
                }
            }
            Err(err) => {
                tracing::warn!("remove {name}: deleting {} failed: {err}", dir.display());
                Outcome::new(name, ResultCode::GeneralFailure)
                    .with_detail(format!("cannot delete {}: {err}", dir.display()))
            }
        }
    }

    /// Registry entries whose name matches `pattern`, with installed state
    /// read from disk now.
    pub fn list(&self, pattern: &NamePattern) -> Vec<Listing> {
        self.registry
            .iter()
            .filter(|descriptor| pattern.matches(&descriptor.name))
            .map(|descriptor| Listing {
                name: descriptor.name.clone(),
                description: descriptor.description.clone(),
                installed: self.state.is_installed(&descriptor.download_name),
            })
            .collect()
    }

    /// Bind the entry points of every installed plugin.
    pub fn bind_installed(&self, table: &mut dyn CommandTable) -> Result<Vec<BindReport>> {
        let installed = self
            .state
            .list_installed()
            .with_context(|| format!("listing {}", self.state.root().display()))?;

        Ok(installed
            .iter()
            .filter_map(|download_name| self.state.plugin_dir(download_name))
            .map(|dir| self.binder.bind(&dir, table))
            .collect())
    }

    fn installed_dir(&self, download_name: &str) -> Option<PathBuf> {
        self.state
            .plugin_dir(download_name)
            .filter(|_| self.state.is_installed(download_name))
    }

    fn resolve_download_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.registry
            .find(name)
            .map(|descriptor| descriptor.download_name.as_str())
            .unwrap_or(name)
    }
}

fn discard_partial_install(dir: &Path) {
    if let Err(err) = fs::remove_dir_all(dir) {
        tracing::warn!("could not clean up {}: {err}", dir.display());
    }
}

fn describe_binding(report: &BindReport) -> String {
    let mut detail = if report.bound.is_empty() {
        "no commands bound".to_string()
    } else {
        format!("bound {}", report.bound.join(", "))
    };

    for failure in &report.failed {
        detail.push_str(&format!("; {failure}"));
    }

    detail
}
