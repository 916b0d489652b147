mod git;
mod lint_command;
mod openai;

pub use git::GitCli;
pub use lint_command::CommandLintRunner;
pub use openai::{rag_prompt, OpenAiClient};
