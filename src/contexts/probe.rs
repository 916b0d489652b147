use serde::Serialize;

use crate::contexts::prompt_runner::{prompts, PromptError, PromptRegistry, PromptRunner};
use crate::data::{render_transcript, CompletionPort, Message, RequirementsRecord, AGENT_WINDOW};

#[derive(Serialize)]
struct ProbeInput<'a> {
    model: &'a str,
    fields: String,
    folder_location: &'a str,
    next_field: &'static str,
}

/// Asks the completion port for the single next clarifying question.
pub struct ProbeGenerator<'a, P, R>
where
    P: CompletionPort,
    R: PromptRegistry,
{
    runner: &'a PromptRunner<P, R>,
}

impl<'a, P, R> ProbeGenerator<'a, P, R>
where
    P: CompletionPort,
    R: PromptRegistry,
{
    pub fn new(runner: &'a PromptRunner<P, R>) -> Self {
        Self { runner }
    }

    /// Returns `None` without calling the port when nothing is missing.
    ///
    /// Only the last two entries of `recent` are sent as context. Whether the
    /// answer targets the right slot is left to the model.
    pub fn next_question(&self, requirements: &RequirementsRecord, recent: &[Message]) -> Result<Option<String>, PromptError> {
        let Some(next_field) = requirements.next_missing() else {
            return Ok(None);
        };

        let input = ProbeInput {
            model: &requirements.model,
            fields: requirements.fields.join(","),
            folder_location: &requirements.folder_location,
            next_field: next_field.as_str(),
        };
        let start = recent.len().saturating_sub(AGENT_WINDOW);
        let context = render_transcript(&recent[start..]);

        let question = self
            .runner
            .ask(prompts::PROBE_NEXT_QUESTION, &context, &input)?;
        log::debug!("Probe for {}: {}", next_field, question.trim());
        Ok(Some(question.trim().to_string()))
    }
}
