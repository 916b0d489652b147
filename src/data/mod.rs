mod artifact;
mod conversation;
mod definition;
mod diagnostics;
mod ports;
mod requirements;

pub use artifact::{
    canonicalize_page_path, sanitize_filename, sanitize_relative_path, CodeArtifact, PAGE_LEAF,
};
pub use conversation::{render_transcript, ConversationState, Message, Role, ToolCall, AGENT_WINDOW};
pub use definition::{load_definition, DefinitionEntry, DefinitionError, DefinitionKind};
pub use diagnostics::{normalize_lint_path, LintDiagnostics};
pub use ports::{
    AgentModel, AgentReply, CompletionError, CompletionPort, LintError, LintRunner, ToolSpec,
    VcsError, VersionControl,
};
pub use requirements::{RequirementField, RequirementsRecord};
