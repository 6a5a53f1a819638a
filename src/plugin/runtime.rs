use std::path::Path;

use crate::plugin::host::HostCommand;

/// Exported function every entry-point module must provide.
pub const ENTRY_FUNCTION: &str = "main";

/// Turns an entry-point file into a callable host command.
pub trait ModuleLoader {
    /// Extension (without the dot) of files this loader understands.
    fn extension(&self) -> &str;
    fn load(&self, path: &Path) -> anyhow::Result<Box<dyn HostCommand>>;
}

/// Loads `*_plugin.wasm` entry points through the extism runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct WasmLoader;

impl ModuleLoader for WasmLoader {
    fn extension(&self) -> &str {
        "wasm"
    }

    #[cfg(feature = "plugins")]
    fn load(&self, path: &Path) -> anyhow::Result<Box<dyn HostCommand>> {
        use anyhow::Context;

        let manifest = extism::Manifest::new([extism::Wasm::file(path)]);
        let plugin = extism::Plugin::new(&manifest, [], true)
            .with_context(|| format!("loading wasm module {}", path.display()))?;

        if !plugin.function_exists(ENTRY_FUNCTION) {
            anyhow::bail!(
                "{} does not export `{ENTRY_FUNCTION}`",
                path.display()
            );
        }

        Ok(Box::new(wasm::WasmCommand::new(path, plugin)))
    }

    #[cfg(not(feature = "plugins"))]
    fn load(&self, path: &Path) -> anyhow::Result<Box<dyn HostCommand>> {
        anyhow::bail!(
            "{}: shellpm was built without the `plugins` feature",
            path.display()
        )
    }
}

#[cfg(feature = "plugins")]
mod wasm {
    use std::path::{Path, PathBuf};

    use anyhow::Context;

    use super::ENTRY_FUNCTION;
    use crate::plugin::host::HostCommand;

    pub(super) struct WasmCommand {
        path: PathBuf,
        plugin: extism::Plugin,
    }

    impl WasmCommand {
        pub(super) fn new(path: &Path, plugin: extism::Plugin) -> Self {
            Self {
                path: path.to_path_buf(),
                plugin,
            }
        }
    }

    impl HostCommand for WasmCommand {
        fn invoke(&mut self, args: &str) -> anyhow::Result<String> {
            let output = self
                .plugin
                .call::<&str, &str>(ENTRY_FUNCTION, args)
                .with_context(|| format!("{}: `{ENTRY_FUNCTION}` failed", self.path.display()))?;
            Ok(output.to_string())
        }
    }
}
