/// One installable plugin as listed in the registry file.
///
/// Descriptors are created once when the registry is parsed and never
/// mutated afterwards. Installation state is deliberately absent: it is
/// derived from the plugin root on every query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDescriptor {
    /// Human-facing identifier used by `install`/`list`.
    pub name: String,
    /// On-disk directory name and installation-state key.
    pub download_name: String,
    pub description: String,
    /// Location handed to the VCS clone operation.
    pub source_url: String,
}

impl PluginDescriptor {
    pub fn new(
        name: impl Into<String>,
        download_name: impl Into<String>,
        description: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            download_name: download_name.into(),
            description: description.into(),
            source_url: source_url.into(),
        }
    }
}
