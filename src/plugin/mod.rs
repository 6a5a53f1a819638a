pub mod binder;
pub mod host;
pub mod manager;
pub mod outcome;
pub mod query;
pub mod registry;
pub mod runtime;
pub mod state;
pub mod vcs;
pub mod workdir;

pub use manager::PluginManager;
pub use outcome::{Outcome, ResultCode};
