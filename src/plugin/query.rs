use std::sync::LazyLock;

use regex::Regex;

static MATCH_ALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^").expect("valid match-all regex"));

/// `*`-wildcard name filter, anchored at the start of the name only:
/// `foo*` and `foo` both match `foobar`.
#[derive(Debug, Clone)]
pub struct NamePattern {
    regex: Regex,
}

impl NamePattern {
    pub const MATCH_ALL: &'static str = "*";

    /// Fails only when the translated pattern exceeds the regex size limit.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let translated = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let regex = Regex::new(&format!("^(?:{translated})"))?;
        Ok(Self { regex })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

impl Default for NamePattern {
    fn default() -> Self {
        Self {
            regex: MATCH_ALL_RE.clone(),
        }
    }
}

/// One row of `list` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub name: String,
    pub description: String,
    pub installed: bool,
}

impl Listing {
    pub fn render(&self) -> [String; 2] {
        let marker = if self.installed { " ** Installed" } else { "" };
        [
            format!("Name:{}{marker}", self.name),
            format!("- Description: {}", self.description),
        ]
    }
}
