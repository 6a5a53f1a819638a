use std::collections::BTreeMap;
use std::fmt;

/// A callable the host shell can dispatch to by name.
pub trait HostCommand {
    /// Run the command with its raw argument string, returning its output.
    fn invoke(&mut self, args: &str) -> anyhow::Result<String>;
}

impl<F> HostCommand for F
where
    F: FnMut(&str) -> anyhow::Result<String>,
{
    fn invoke(&mut self, args: &str) -> anyhow::Result<String> {
        self(args)
    }
}

/// The host shell's command table, as seen by the plugin binder.
pub trait CommandTable {
    /// Register `command` under `name`. An existing entry with the same name
    /// is replaced.
    fn register_command(&mut self, name: &str, command: Box<dyn HostCommand>);
    /// Drop `name`; returns whether it was present. Absence is not an error.
    fn unregister_command(&mut self, name: &str) -> bool;
}

/// In-process command table.
#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Box<dyn HostCommand>>,
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.commands.keys()).finish()
    }
}

impl CommandRegistry {
    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Dispatch to a registered command; `None` if `name` is unknown.
    pub fn invoke(&mut self, name: &str, args: &str) -> Option<anyhow::Result<String>> {
        self.commands
            .get_mut(name)
            .map(|command| command.invoke(args))
    }
}

impl CommandTable for CommandRegistry {
    fn register_command(&mut self, name: &str, command: Box<dyn HostCommand>) {
        if self.commands.insert(name.to_string(), command).is_some() {
            tracing::debug!("command {name} re-registered, previous binding replaced");
        } else {
            tracing::debug!("command {name} registered");
        }
    }

    fn unregister_command(&mut self, name: &str) -> bool {
        let removed = self.commands.remove(name).is_some();
        tracing::debug!("command {name} unregistered (present: {removed})");
        removed
    }
}
