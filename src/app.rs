use anyhow::{Context, Result, anyhow};

use crate::command::{PluginCommand, USAGE};
use crate::model::config::AppConfig;
use crate::plugin::host::CommandRegistry;
use crate::plugin::query::NamePattern;
use crate::plugin::{Outcome, PluginManager};

/// Lines to show the user, plus whether every target succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub lines: Vec<String>,
    pub success: bool,
}

impl Response {
    fn from_outcomes(outcomes: &[Outcome]) -> Self {
        if outcomes.is_empty() {
            return Self {
                lines: vec!["plugins: nothing to do".to_string()],
                success: true,
            };
        }

        Self {
            lines: outcomes.iter().map(Outcome::to_string).collect(),
            success: outcomes.iter().all(|outcome| outcome.code.is_ok()),
        }
    }

    fn failure(lines: Vec<String>) -> Self {
        Self {
            lines,
            success: false,
        }
    }
}

/// The plugin manager as a host shell sees it: one command table, one
/// manager, text in and report lines out.
pub struct App {
    pub plugin_manager: PluginManager,
    pub commands: CommandRegistry,
}

impl App {
    pub fn new(config: &AppConfig) -> Result<Self> {
        Ok(Self::with_manager(PluginManager::from_config(config)?))
    }

    pub fn with_manager(plugin_manager: PluginManager) -> Self {
        Self {
            plugin_manager,
            commands: CommandRegistry::default(),
        }
    }

    pub fn startup_notifications(&self) -> Vec<String> {
        self.plugin_manager.startup_notifications()
    }

    /// Handle the argument line of the host's `plugin` command. Hard errors
    /// are reported as a line instead of escaping to the shell loop.
    pub fn execute_line(&mut self, line: &str) -> Response {
        let command = match PluginCommand::parse(line) {
            Ok(command) => command,
            Err(err) => {
                tracing::debug!("usage error: {err}");
                return Response::failure(vec![format!("{err}"), USAGE.to_string()]);
            }
        };

        self.execute(command).unwrap_or_else(|err| {
            tracing::error!("plugin command failed: {err:#}");
            Response::failure(vec![format!("Error: {err:#}")])
        })
    }

    pub fn execute(&mut self, command: PluginCommand) -> Result<Response> {
        tracing::debug!("executing {command:?}");

        let response = match command {
            PluginCommand::List { pattern } => {
                let raw = pattern.as_deref().unwrap_or(NamePattern::MATCH_ALL);
                let pattern = NamePattern::new(raw)
                    .with_context(|| format!("invalid list pattern ({} bytes)", raw.len()))?;
                let rows = self.plugin_manager.list(&pattern);
                let lines = if rows.is_empty() {
                    vec!["plugins: no registry entries match".to_string()]
                } else {
                    rows.iter().flat_map(|row| row.render()).collect()
                };
                Response {
                    lines,
                    success: true,
                }
            }
            PluginCommand::Install { names } => Response::from_outcomes(
                &self.plugin_manager.install(&names, &mut self.commands),
            ),
            PluginCommand::Update { names } => {
                Response::from_outcomes(&self.plugin_manager.update(&names)?)
            }
            PluginCommand::Remove { names } => Response::from_outcomes(
                &self.plugin_manager.remove(&names, &mut self.commands),
            ),
        };

        Ok(response)
    }

    /// Invoke a plugin-provided command, binding installed plugins first if
    /// it is not registered yet.
    pub fn run_plugin_command(&mut self, name: &str, args: &str) -> Result<String> {
        if !self.commands.contains(name) {
            for report in self.plugin_manager.bind_installed(&mut self.commands)? {
                for failure in report.failed {
                    tracing::warn!("bind failed: {failure}");
                }
            }
        }

        self.commands
            .invoke(name, args)
            .ok_or_else(|| anyhow!("plugin command not found: {name}"))?
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::*;
    use crate::plugin::binder::CommandBinder;
    use crate::plugin::host::HostCommand;
    use crate::plugin::registry::Registry;
    use crate::plugin::runtime::ModuleLoader;
    use crate::plugin::state::InstallState;
    use crate::plugin::vcs::{Vcs, VcsError};

    struct ScriptVcs;

    impl Vcs for ScriptVcs {
        fn clone_here(&self, url: &str) -> Result<String, VcsError> {
            fs::write("greet_plugin.txt", format!("{url}:")).expect("write entry point");
            Ok(String::new())
        }

        fn pull_here(&self) -> Result<String, VcsError> {
            Ok("Already up to date.\n".to_string())
        }
    }

    struct TextLoader;

    impl ModuleLoader for TextLoader {
        fn extension(&self) -> &str {
            "txt"
        }

        fn load(&self, path: &Path) -> Result<Box<dyn HostCommand>> {
            let body = fs::read_to_string(path)?;
            Ok(Box::new(move |args: &str| -> Result<String> {
                Ok(format!("{body}{args}"))
            }))
        }
    }

    fn app(root: &Path) -> App {
        let mut registry = Registry::default();
        registry.parse_source("hello|hello|Says hello|https://example.com/hello.git\n");
        App::with_manager(PluginManager::new(
            registry,
            InstallState::new(root),
            Box::new(ScriptVcs),
            CommandBinder::new(Box::new(TextLoader)),
            vec!["plugin".to_string()],
        ))
    }

    #[test]
    fn empty_and_unknown_lines_print_usage() {
        let root = tempfile::tempdir().expect("tempdir");
        let mut app = app(root.path());

        for line in ["", "frobnicate"] {
            let response = app.execute_line(line);
            assert!(!response.success);
            assert_eq!(response.lines.last().map(String::as_str), Some(USAGE));
        }
    }

    #[test]
    fn install_list_update_remove_round() {
        let root = tempfile::tempdir().expect("tempdir");
        let mut app = app(root.path());

        let listed = app.execute_line("list");
        assert_eq!(listed.lines, ["Name:hello", "- Description: Says hello"]);

        let installed = app.execute_line("install hello");
        assert!(installed.success);
        assert_eq!(installed.lines, ["hello: ok: bound greet"]);
        assert!(app.commands.contains("greet"));

        let listed = app.execute_line("list h*");
        assert_eq!(listed.lines[0], "Name:hello ** Installed");

        let updated = app.execute_line("update");
        assert_eq!(updated.lines, ["hello: ok: Already up to date."]);

        let removed = app.execute_line("remove hello plugin");
        assert!(!removed.success);
        assert_eq!(
            removed.lines,
            ["hello: ok: unregistered greet", "plugin: protected"]
        );
        assert!(!app.commands.contains("greet"));
    }

    #[test]
    fn run_binds_installed_plugins_on_demand() {
        let root = tempfile::tempdir().expect("tempdir");
        app(root.path()).execute_line("install hello");

        let mut fresh = app(root.path());
        let out = fresh.run_plugin_command("greet", "world").expect("runs");
        assert_eq!(out, "https://example.com/hello.git:world");

        assert!(fresh.run_plugin_command("missing", "").is_err());
    }

    #[test]
    fn oversized_list_pattern_is_reported_not_fatal() {
        let root = tempfile::tempdir().expect("tempdir");
        let mut app = app(root.path());

        let response = app.execute_line(&format!("list {}", "a*".repeat(20_000)));
        assert!(!response.success);
        assert!(response.lines[0].starts_with("Error: invalid list pattern"));

        assert!(app.execute_line("list").success);
    }

    #[test]
    fn update_with_nothing_installed_is_a_no_op() {
        let root = tempfile::tempdir().expect("tempdir");
        let response = app(&root.path().join("extensions")).execute_line("update");
        assert!(response.success);
        assert_eq!(response.lines, ["plugins: nothing to do"]);
    }
}
