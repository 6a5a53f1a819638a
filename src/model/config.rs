use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULTS: &str = include_str!("../../config/default.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub vcs: VcsConfig,
    pub protection: ProtectionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    pub plugin_root: PathBuf,
    pub registry_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VcsConfig {
    pub program: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProtectionConfig {
    pub names: Vec<String>,
}

impl AppConfig {
    /// Load configuration with layering: defaults → user config.
    ///
    /// An explicit path must exist; the per-user file is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let user_path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path().filter(|path| path.exists()),
        };

        let user_str = match user_path {
            Some(path) => {
                tracing::debug!("loading config from {}", path.display());
                Some(
                    fs::read_to_string(&path)
                        .with_context(|| format!("reading config {}", path.display()))?,
                )
            }
            None => None,
        };

        Self::from_layers(user_str.as_deref())
    }

    /// Merge an optional user TOML document over the built-in defaults.
    pub fn from_layers(user: Option<&str>) -> Result<Self> {
        let mut merged: toml::Table =
            toml::from_str(DEFAULTS).context("parsing built-in defaults")?;

        if let Some(user) = user {
            let overlay: toml::Table = toml::from_str(user).context("parsing user config")?;
            merge_tables(&mut merged, overlay);
        }

        let config: AppConfig = toml::Value::Table(merged)
            .try_into()
            .context("invalid configuration")?;

        if config.vcs.program.trim().is_empty() {
            return Err(anyhow!("vcs.program must not be empty"));
        }

        Ok(config)
    }

    pub fn plugin_root(&self) -> PathBuf {
        resolve_path(&self.general.plugin_root)
    }

    pub fn registry_path(&self) -> PathBuf {
        resolve_path(&self.general.registry_path)
    }

    pub fn vcs_timeout(&self) -> Duration {
        Duration::from_secs(self.vcs.timeout_secs)
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "shellpm")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Per-user data directory; plugin roots and logs live here by default.
pub fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "shellpm")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".shellpm"))
}

fn resolve_path(raw: &Path) -> PathBuf {
    let expanded = expand_tilde(raw);
    if expanded.is_absolute() {
        expanded
    } else {
        data_dir().join(expanded)
    }
}

/// Only a leading `~` component expands; `~user` forms are left alone.
fn expand_tilde(raw: &Path) -> PathBuf {
    let Ok(rest) = raw.strip_prefix("~") else {
        return raw.to_path_buf();
    };

    match directories::BaseDirs::new() {
        Some(base_dirs) => base_dirs.home_dir().join(rest),
        None => raw.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_without_user_layer() {
        let config = AppConfig::from_layers(None).expect("defaults parse");
        assert_eq!(config.vcs.program, "git");
        assert_eq!(config.vcs_timeout(), Duration::from_secs(300));
        assert_eq!(config.protection.names, vec!["plugin", "git"]);
    }

    #[test]
    fn user_layer_overrides_only_given_keys() {
        let config = AppConfig::from_layers(Some(
            "[general]\nplugin_root = \"/srv/shell/extensions\"\n[vcs]\ntimeout_secs = 5\n",
        ))
        .expect("merged config");

        assert_eq!(config.plugin_root(), PathBuf::from("/srv/shell/extensions"));
        assert_eq!(config.general.registry_path, PathBuf::from("plugin_urls.txt"));
        assert_eq!(config.vcs.program, "git");
        assert_eq!(config.vcs_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn relative_paths_resolve_under_data_dir() {
        let config = AppConfig::from_layers(None).expect("defaults parse");
        assert_eq!(config.registry_path(), data_dir().join("plugin_urls.txt"));
    }

    #[test]
    fn tilde_expands_only_as_a_whole_component() {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return;
        };
        let home = base_dirs.home_dir();

        assert_eq!(expand_tilde(Path::new("~/plugins")), home.join("plugins"));
        assert_eq!(expand_tilde(Path::new("~")), home.to_path_buf());
        assert_eq!(expand_tilde(Path::new("~other/x")), PathBuf::from("~other/x"));
        assert_eq!(expand_tilde(Path::new("/abs/~")), PathBuf::from("/abs/~"));
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_paths_survive_untouched() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let mut config = AppConfig::from_layers(None).expect("defaults parse");
        let raw = PathBuf::from(OsStr::from_bytes(b"/srv/plug\xffins"));
        config.general.plugin_root = raw.clone();
        assert_eq!(config.plugin_root(), raw);
    }

    #[test]
    fn empty_vcs_program_is_rejected() {
        let err = AppConfig::from_layers(Some("[vcs]\nprogram = \" \"\n")).unwrap_err();
        assert!(err.to_string().contains("vcs.program"));
    }

    #[test]
    fn malformed_user_layer_is_an_error() {
        assert!(AppConfig::from_layers(Some("[general\n")).is_err());
    }
}
