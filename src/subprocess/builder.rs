use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use super::runner::{OutputMode, ProcessCommand, DEFAULT_TIMEOUT};

/// Fluent construction of a [`ProcessCommand`].
pub struct ProcessCommandBuilder {
    command: ProcessCommand,
}

impl ProcessCommandBuilder {
    pub fn new(program: &Path) -> Self {
        Self {
            command: ProcessCommand {
                program: program.to_path_buf(),
                args: Vec::new(),
                env: None,
                working_dir: None,
                timeout: DEFAULT_TIMEOUT,
                output: OutputMode::Captured,
            },
        }
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.command.args.push(arg.to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.command
            .args
            .extend(args.into_iter().map(|s| s.as_ref().to_string()));
        self
    }

    /// Append a `key=value` pair as a single argv entry.
    ///
    /// This is the only supported way to pass module parameters. Because the
    /// pair stays one argument and no shell is involved, values containing
    /// spaces or metacharacters reach the module byte-for-byte.
    pub fn kv(mut self, key: &str, value: impl std::fmt::Display) -> Self {
        self.command.args.push(format!("{key}={value}"));
        self
    }

    /// Replace the child environment wholesale. The map must be a complete
    /// environment; nothing from this process is inherited alongside it.
    pub fn env_map(mut self, env: HashMap<String, String>) -> Self {
        self.command.env = Some(env);
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.command.working_dir = Some(dir.to_path_buf());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.command.timeout = timeout;
        self
    }

    /// Stream the child's output to this process's stdio instead of
    /// capturing it.
    pub fn inherit_output(mut self) -> Self {
        self.command.output = OutputMode::Inherited;
        self
    }

    pub fn build(self) -> ProcessCommand {
        self.command
    }
}
