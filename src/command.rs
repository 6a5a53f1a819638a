use thiserror::Error;

pub const USAGE: &str = "usage: plugin [list [pattern] | install <name>... | update [name...] | remove <name>...]";

/// Every subcommand the plugin manager understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginCommand {
    /// Show registry entries, optionally filtered by a `*` wildcard.
    List { pattern: Option<String> },
    Install { names: Vec<String> },
    /// An empty list means every installed plugin.
    Update { names: Vec<String> },
    Remove { names: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("no subcommand given")]
    Empty,
    #[error("unknown subcommand `{0}`")]
    UnknownSubcommand(String),
    #[error("`{0}` needs at least one plugin name")]
    MissingName(&'static str),
    #[error("`list` takes at most one pattern")]
    TooManyPatterns,
}

impl PluginCommand {
    /// Parse a host-shell argument line such as `install hello world`.
    pub fn parse(line: &str) -> Result<Self, UsageError> {
        let mut words = line.split_whitespace();
        let subcommand = words.next().ok_or(UsageError::Empty)?;
        let rest: Vec<String> = words.map(str::to_string).collect();

        match subcommand {
            "list" => {
                if rest.len() > 1 {
                    return Err(UsageError::TooManyPatterns);
                }
                Ok(PluginCommand::List {
                    pattern: rest.into_iter().next(),
                })
            }
            "install" => non_empty("install", rest).map(|names| PluginCommand::Install { names }),
            "update" => Ok(PluginCommand::Update { names: rest }),
            "remove" => non_empty("remove", rest).map(|names| PluginCommand::Remove { names }),
            other => Err(UsageError::UnknownSubcommand(other.to_string())),
        }
    }
}

fn non_empty(subcommand: &'static str, names: Vec<String>) -> Result<Vec<String>, UsageError> {
    if names.is_empty() {
        Err(UsageError::MissingName(subcommand))
    } else {
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_subcommand() {
        assert_eq!(
            PluginCommand::parse("list"),
            Ok(PluginCommand::List { pattern: None })
        );
        assert_eq!(
            PluginCommand::parse("  list   foo*  "),
            Ok(PluginCommand::List {
                pattern: Some("foo*".into())
            })
        );
        assert_eq!(
            PluginCommand::parse("install hello world"),
            Ok(PluginCommand::Install {
                names: vec!["hello".into(), "world".into()]
            })
        );
        assert_eq!(
            PluginCommand::parse("update"),
            Ok(PluginCommand::Update { names: vec![] })
        );
        assert_eq!(
            PluginCommand::parse("remove hello"),
            Ok(PluginCommand::Remove {
                names: vec!["hello".into()]
            })
        );
    }

    #[test]
    fn malformed_lines_are_usage_errors() {
        assert_eq!(PluginCommand::parse("   "), Err(UsageError::Empty));
        assert_eq!(
            PluginCommand::parse("upgrade all"),
            Err(UsageError::UnknownSubcommand("upgrade".into()))
        );
        assert_eq!(
            PluginCommand::parse("install"),
            Err(UsageError::MissingName("install"))
        );
        assert_eq!(
            PluginCommand::parse("list a b"),
            Err(UsageError::TooManyPatterns)
        );
    }
}
