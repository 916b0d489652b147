use serde_json::json;

use crate::contexts::prompt_runner::{prompts, PromptError, PromptRegistry, PromptRunner};
use crate::data::CompletionPort;

/// Turns the running list of user instructions into a one-line commit message.
pub struct CommitMessageSynthesizer<'a, P, R>
where
    P: CompletionPort,
    R: PromptRegistry,
{
    runner: &'a PromptRunner<P, R>,
}

impl<'a, P, R> CommitMessageSynthesizer<'a, P, R>
where
    P: CompletionPort,
    R: PromptRegistry,
{
    pub fn new(runner: &'a PromptRunner<P, R>) -> Self {
        Self { runner }
    }

    /// `None` when the model answers with nothing usable.
    pub fn synthesize(&self, instructions: &[String]) -> Result<Option<String>, PromptError> {
        let context = instructions
            .iter()
            .enumerate()
            .map(|(i, instruction)| format!("{}. {}", i + 1, instruction))
            .collect::<Vec<_>>()
            .join("\n");

        let raw = self
            .runner
            .ask(prompts::COMMIT_MESSAGE, &context, &json!({ "count": instructions.len() }))?;
        Ok(clean_commit_message(&raw))
    }
}

/// First non-empty line, trimmed and lowercased.
pub fn clean_commit_message(raw: &str) -> Option<String> {
    raw.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.trim_matches('`').trim().to_lowercase())
        .filter(|line| !line.is_empty())
}
