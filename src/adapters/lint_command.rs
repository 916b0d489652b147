use std::path::Path;
use std::process::Command;

use crate::data::{LintError, LintRunner};

/// Runs a fixed lint command, e.g. `pnpm lint`, in the project directory.
#[derive(Debug, Clone)]
pub struct CommandLintRunner {
    program: String,
    args: Vec<String>,
}

impl CommandLintRunner {
    /// Splits `command` on whitespace into program and arguments.
    pub fn new(command: &str) -> Result<Self, LintError> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(LintError::EmptyCommand)?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl LintRunner for CommandLintRunner {
    fn run(&self, project_dir: &Path) -> Result<String, LintError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .current_dir(project_dir)
            .output()
            .map_err(|source| LintError::Spawn {
                command: self.command_line(),
                source,
            })?;

        log::debug!("`{}` exited with {}", self.command_line(), output.status);
        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(text)
    }
}
