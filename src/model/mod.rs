pub mod config;
pub mod descriptor;

pub use descriptor::PluginDescriptor;
