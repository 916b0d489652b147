//! Boundaries to the collaborators the control loops depend on.
//!
//! Every port is a plain synchronous trait so the loops can be driven by
//! scripted fakes in tests and by the adapters in `crate::adapters` at runtime.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::{Message, ToolCall};

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion service is not configured: {0}")]
    NotConfigured(String),
    #[error("completion request failed: {0}")]
    Transport(String),
    #[error("completion service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid completion payload: {0}")]
    InvalidPayload(String),
}

/// Text-completion service.
pub trait CompletionPort {
    /// Answers `question` using `context` and returns the raw response text.
    ///
    /// # Errors
    /// Transport and service failures are returned as-is; callers decide
    /// whether to retry.
    fn complete(&self, context: &str, question: &str) -> Result<String, CompletionError>;
}

impl<T: CompletionPort + ?Sized> CompletionPort for &T {
    fn complete(&self, context: &str, question: &str) -> Result<String, CompletionError> {
        (**self).complete(context, question)
    }
}

/// Schema of a tool offered to the agent model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// JSON schema of the argument object.
    pub parameters: serde_json::Value,
}

/// One step of the tool-calling model.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReply {
    pub content: String,
    pub tool_call: Option<ToolCall>,
}

/// Completion service that may answer with a tool-call directive.
pub trait AgentModel {
    fn invoke(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<AgentReply, CompletionError>;
}

impl<T: AgentModel + ?Sized> AgentModel for &T {
    fn invoke(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<AgentReply, CompletionError> {
        (**self).invoke(messages, tools)
    }
}

#[derive(Debug, Error)]
pub enum LintError {
    #[error("lint command is empty")]
    EmptyCommand,
    #[error("failed to run lint command `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
}

/// External static-analysis tool.
pub trait LintRunner {
    /// Runs the linter over `project_dir` and returns its combined output.
    /// The exit status is not interpreted.
    fn run(&self, project_dir: &Path) -> Result<String, LintError>;
}

impl<T: LintRunner + ?Sized> LintRunner for &T {
    fn run(&self, project_dir: &Path) -> Result<String, LintError> {
        (**self).run(project_dir)
    }
}

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("nothing to commit")]
    NothingToCommit,
    #[error("`git {command}` failed: {details}")]
    Command { command: String, details: String },
    #[error("failed to run git: {0}")]
    Io(#[from] io::Error),
}

/// Version control sink for finished artifacts.
pub trait VersionControl {
    fn commit(&self, paths: &[PathBuf], message: &str) -> Result<(), VcsError>;
}
