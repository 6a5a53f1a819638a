//! Plugin lifecycle manager for an extensible command shell.
//!
//! A text registry lists installable plugins; a plugin is installed iff a
//! directory named after its download name exists under the plugin root.
//! [`plugin::PluginManager`] installs (VCS clone), updates (VCS pull) and
//! removes plugins, binding each installed plugin's `*_plugin` entry points
//! as commands on the host's [`plugin::host::CommandTable`].

pub mod app;
pub mod command;
pub mod model;
pub mod plugin;
