use serde_json::json;
use thiserror::Error;

use crate::contexts::probe::ProbeGenerator;
use crate::contexts::prompt_runner::{prompts, PopulateError, PromptError, PromptRegistry, PromptRunner};
use crate::contexts::requirements_agent::{AgentError, RequirementsAgent, DEFAULT_MAX_STEPS};
use crate::data::{AgentModel, CompletionPort, ConversationState, Message, RequirementsRecord, AGENT_WINDOW};

pub const GREETING: &str = "What is the model entity you want to work with?";
pub const CANCEL_TOKEN: &str = "bye";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Populate(#[from] PopulateError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The user typed the cancel token. Nothing was recorded.
    Cancelled,
    /// All requirements are filled.
    Ready(RequirementsRecord),
    Continue {
        reply: String,
        probe: Option<String>,
    },
}

/// One requirements-gathering conversation.
///
/// Sessions share nothing; every piece of turn state lives here.
pub struct ChatSession<'a, M, P, R>
where
    M: AgentModel,
    P: CompletionPort,
    R: PromptRegistry,
{
    model: M,
    runner: &'a PromptRunner<P, R>,
    state: ConversationState,
    instructions: Vec<String>,
    max_agent_steps: usize,
}

impl<'a, M, P, R> ChatSession<'a, M, P, R>
where
    M: AgentModel,
    P: CompletionPort,
    R: PromptRegistry,
{
    pub fn new(model: M, runner: &'a PromptRunner<P, R>) -> Self {
        Self {
            model,
            runner,
            state: ConversationState::with_greeting(GREETING),
            instructions: Vec::new(),
            max_agent_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_agent_steps(mut self, max_agent_steps: usize) -> Self {
        self.max_agent_steps = max_agent_steps;
        self
    }

    pub fn greeting(&self) -> &'static str {
        GREETING
    }

    pub fn requirements(&self) -> &RequirementsRecord {
        &self.state.requirements
    }

    pub fn history(&self) -> &[Message] {
        self.state.messages()
    }

    /// User inputs so far, oldest first.
    pub fn instructions(&self) -> &[String] {
        &self.instructions
    }

    pub fn record_instruction(&mut self, instruction: impl Into<String>) {
        self.instructions.push(instruction.into());
    }

    /// Role method: session.handle_message
    ///
    /// # Errors
    /// Agent and completion failures abort the turn. The user message stays
    /// in history so the turn can be retried.
    pub fn handle_message(&mut self, text: &str) -> Result<TurnOutcome, SessionError> {
        let text = text.trim();
        if text.eq_ignore_ascii_case(CANCEL_TOKEN) {
            return Ok(TurnOutcome::Cancelled);
        }
        if self.state.requirements.is_complete() {
            return Ok(TurnOutcome::Ready(self.state.requirements.clone()));
        }

        self.state.push(Message::user(text));
        self.instructions.push(text.to_string());

        let requirements = &self.state.requirements;
        let system_prompt = self.runner.populate(
            prompts::REQUIREMENTS_AGENT,
            &json!({
                "model": requirements.model,
                "fields": requirements.fields.join(","),
                "folder_location": requirements.folder_location,
            }),
        )?;
        let agent = RequirementsAgent::new(&self.model)
            .with_system_prompt(system_prompt)
            .with_max_steps(self.max_agent_steps);
        let run = agent.run(self.state.window(AGENT_WINDOW), &self.state.requirements)?;

        self.state.extend(run.messages);
        self.state.requirements = run.requirements;

        if self.state.requirements.is_complete() {
            log::info!("Requirements complete: {:?}", self.state.requirements);
            return Ok(TurnOutcome::Ready(self.state.requirements.clone()));
        }

        let probe = ProbeGenerator::new(self.runner).next_question(&self.state.requirements, self.state.messages())?;
        if let Some(question) = &probe {
            self.state.push(Message::assistant(question.clone()));
        }
        Ok(TurnOutcome::Continue {
            reply: run.reply,
            probe,
        })
    }
}
