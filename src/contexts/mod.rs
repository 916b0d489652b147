mod artifact_writer;
mod code_editor;
mod code_generator;
mod commit_message;
mod definition_generator;
mod lint_fix;
mod output_parser;
mod probe;
mod prompt_runner;
mod requirements_agent;
mod session;
mod tool_registry;

#[cfg(test)]
mod testing;

pub use artifact_writer::{ArtifactWriter, WriteError};
pub use code_editor::{CodeEditor, EditError, EditOutcome};
pub use code_generator::{
    assemble_boilerplate, label_root, load_boilerplates, Boilerplate, CodeGenerator, GenerateError,
    GeneratedFile, GenerationReport,
};
pub use commit_message::{clean_commit_message, CommitMessageSynthesizer};
pub use definition_generator::{
    prompt_for, DefinitionGenerateError, DefinitionGenerator, DEFINITION_ATTEMPTS,
};
pub use lint_fix::{outstanding_errors, LintFixError, LintFixLoop, LintFixOutcome, DEFAULT_ATTEMPTS};
pub use output_parser::{MarkerParser, ResponseParser, SkippedSegment, SplitArtifacts};
pub use probe::ProbeGenerator;
pub use prompt_runner::{
    prompts, replace_placeholders, PopulateError, PromptError, PromptRegistry, PromptRunner,
};
pub use requirements_agent::{AgentError, AgentRun, RequirementsAgent, DEFAULT_MAX_STEPS};
pub use session::{ChatSession, SessionError, TurnOutcome, CANCEL_TOKEN, GREETING};
pub use tool_registry::{
    get_requirements, update_requirement, Dispatched, ToolError, ToolName, ToolRegistry,
};
