use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::model::PluginDescriptor;
use crate::plugin::state::is_plain_component;

/// Why a single registry line could not become a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryError {
    #[error("expected 4 fields, found {found}")]
    TooFewFields { found: usize },
    #[error("field `{0}` is empty")]
    EmptyField(&'static str),
    #[error("download name {0:?} is not a plain directory name")]
    InvalidDownloadName(String),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("line {line}: malformed registry entry {content:?}: {reason}")]
    MalformedEntry {
        line: usize,
        content: String,
        reason: EntryError,
    },
    #[error("failed to read registry {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("registry has no backing file to reload")]
    NoSource,
}

/// Strategy for turning one line of registry text into zero or one
/// descriptor. `Ok(None)` means the line carries no entry (comment, blank).
pub trait EntryParser: Send + Sync {
    fn parse_line(&self, line: &str) -> Result<Option<PluginDescriptor>, EntryError>;
}

/// `name | download_name | description | source_url`, `#` comments.
#[derive(Debug, Default, Clone, Copy)]
pub struct PipeEntryParser;

impl PipeEntryParser {
    pub const DELIMITER: char = '|';
    pub const COMMENT: char = '#';
}

impl EntryParser for PipeEntryParser {
    fn parse_line(&self, line: &str) -> Result<Option<PluginDescriptor>, EntryError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with(Self::COMMENT) {
            return Ok(None);
        }

        // Fields past the fourth are ignored.
        let fields: Vec<&str> = line.split(Self::DELIMITER).map(str::trim).collect();
        let &[name, download_name, description, source_url, ..] = fields.as_slice() else {
            return Err(EntryError::TooFewFields {
                found: fields.len(),
            });
        };

        if name.is_empty() {
            return Err(EntryError::EmptyField("name"));
        }
        if source_url.is_empty() {
            return Err(EntryError::EmptyField("source_url"));
        }
        if !is_plain_component(download_name) {
            return Err(EntryError::InvalidDownloadName(download_name.to_string()));
        }

        Ok(Some(PluginDescriptor::new(
            name,
            download_name,
            description,
            source_url,
        )))
    }
}

/// Ordered collection of descriptors, in source order.
///
/// Lookups are first-match-wins; duplicate names are kept and reported
/// rather than rejected.
pub struct Registry {
    source: Option<PathBuf>,
    parser: Box<dyn EntryParser>,
    entries: Vec<PluginDescriptor>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("source", &self.source)
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Box::new(PipeEntryParser))
    }
}

impl Registry {
    pub fn new(parser: Box<dyn EntryParser>) -> Self {
        Self {
            source: None,
            parser,
            entries: Vec::new(),
        }
    }

    /// Read and parse `path`, replacing the current entries.
    ///
    /// Malformed lines are returned to the caller, which decides whether to
    /// skip or abort; the well-formed entries are kept either way. Only an
    /// unreadable file is a hard error.
    pub fn load(&mut self, path: &Path) -> Result<Vec<RegistryError>, RegistryError> {
        let text = fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        self.source = Some(path.to_path_buf());
        Ok(self.parse_source(&text))
    }

    /// Re-read the file last passed to [`Registry::load`].
    pub fn reload(&mut self) -> Result<Vec<RegistryError>, RegistryError> {
        let path = self.source.clone().ok_or(RegistryError::NoSource)?;
        self.load(&path)
    }

    /// Parse in-memory registry text, replacing the current entries.
    pub fn parse_source(&mut self, text: &str) -> Vec<RegistryError> {
        let mut entries = Vec::new();
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for (index, raw) in text.lines().enumerate() {
            match self.parser.parse_line(raw) {
                Ok(Some(descriptor)) => {
                    if !seen.insert(descriptor.name.clone()) {
                        tracing::warn!(
                            "registry line {}: duplicate plugin name {:?} is shadowed",
                            index + 1,
                            descriptor.name
                        );
                    }
                    entries.push(descriptor);
                }
                Ok(None) => {}
                Err(reason) => {
                    let err = RegistryError::MalformedEntry {
                        line: index + 1,
                        content: raw.trim_end().to_string(),
                        reason,
                    };
                    tracing::warn!("{err}");
                    errors.push(err);
                }
            }
        }

        tracing::debug!(
            "registry parsed: {} entries, {} malformed",
            entries.len(),
            errors.len()
        );
        self.entries = entries;
        errors
    }

    pub fn find(&self, name: &str) -> Option<&PluginDescriptor> {
        self.entries.iter().find(|descriptor| descriptor.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PluginDescriptor> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Names that appear more than once, in order of first repetition.
    pub fn duplicate_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for descriptor in &self.entries {
            let name = descriptor.name.as_str();
            if !seen.insert(name) && !duplicates.contains(&name) {
                duplicates.push(name);
            }
        }
        duplicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# available plugins
A|a|desc A|https://example.com/a.git

   # indented comment
B | b | desc B | https://example.com/b.git
";

    #[test]
    fn parses_in_file_order_skipping_comments_and_blanks() {
        let mut registry = Registry::default();
        let errors = registry.parse_source(SAMPLE);

        assert!(errors.is_empty());
        let names: Vec<_> = registry.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["A", "B"]);

        let b = registry.find("B").expect("B parsed");
        assert_eq!(b.download_name, "b");
        assert_eq!(b.description, "desc B");
        assert_eq!(b.source_url, "https://example.com/b.git");
    }

    #[test]
    fn short_line_is_reported_without_dropping_neighbours() {
        let mut registry = Registry::default();
        let errors = registry.parse_source("A|a|desc A|urlA\nbroken|line\nC|c|desc C|urlC\n");

        assert_eq!(registry.len(), 2);
        assert!(registry.find("A").is_some());
        assert!(registry.find("C").is_some());

        assert_eq!(errors.len(), 1);
        match &errors[0] {
            RegistryError::MalformedEntry {
                line,
                content,
                reason,
            } => {
                assert_eq!(*line, 2);
                assert_eq!(content, "broken|line");
                assert_eq!(*reason, EntryError::TooFewFields { found: 2 });
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn extra_fields_are_ignored() {
        let parsed = PipeEntryParser
            .parse_line("A|a|desc|url|future-column")
            .expect("parses");
        assert_eq!(parsed.map(|d| d.source_url), Some("url".to_string()));
    }

    #[test]
    fn download_name_must_stay_inside_plugin_root() {
        for bad in ["../escape", "nested/dir", "", ".", ".."] {
            let line = format!("A|{bad}|desc|url");
            assert!(
                PipeEntryParser.parse_line(&line).is_err(),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn duplicate_names_resolve_to_first_entry() {
        let mut registry = Registry::default();
        registry.parse_source("A|first|one|url1\nA|second|two|url2\nA|third|three|url3\n");

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.find("A").map(|d| d.download_name.as_str()), Some("first"));
        assert_eq!(registry.duplicate_names(), ["A"]);
    }

    #[test]
    fn alternate_parser_can_be_substituted() {
        struct CsvParser;
        impl EntryParser for CsvParser {
            fn parse_line(&self, line: &str) -> Result<Option<PluginDescriptor>, EntryError> {
                let fields: Vec<&str> = line.split(',').collect();
                match fields.as_slice() {
                    [""] => Ok(None),
                    [name, dir, url] => Ok(Some(PluginDescriptor::new(*name, *dir, "", *url))),
                    _ => Err(EntryError::TooFewFields {
                        found: fields.len(),
                    }),
                }
            }
        }

        let mut registry = Registry::new(Box::new(CsvParser));
        let errors = registry.parse_source("x,x-dir,url\n\ny,y-dir,url\n");
        assert!(errors.is_empty());
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.find("y").map(|d| d.download_name.as_str()), Some("y-dir"));
    }

    #[test]
    fn load_and_reload_follow_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("plugin_urls.txt");
        fs::write(&path, "A|a|desc|url\n").expect("write registry");

        let mut registry = Registry::default();
        registry.load(&path).expect("load");
        assert_eq!(registry.len(), 1);

        fs::write(&path, "A|a|desc|url\nB|b|desc|url\n").expect("rewrite registry");
        registry.reload().expect("reload");
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.source(), Some(path.as_path()));
    }

    #[test]
    fn unreadable_registry_is_a_hard_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut registry = Registry::default();
        let err = registry.load(&dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, RegistryError::Io { .. }));
        assert!(matches!(registry.reload(), Err(RegistryError::NoSource)));
    }
}
