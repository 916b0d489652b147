use thiserror::Error;

use crate::contexts::tool_registry::{ToolError, ToolName, ToolRegistry};
use crate::data::{AgentModel, CompletionError, Message, RequirementField, RequirementsRecord, ToolCall};

pub const DEFAULT_MAX_STEPS: usize = 16;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error("tool dispatch failed: {0}")]
    Tool(ToolError),
    #[error("requirements agent did not settle within {limit} model calls")]
    StepLimitExceeded { limit: usize },
}

/// What one pass of the agent produced.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRun {
    /// Messages appended during the pass, in order.
    pub messages: Vec<Message>,
    pub requirements: RequirementsRecord,
    /// Content of the final, tool-free model reply.
    pub reply: String,
    pub tool_calls: usize,
}

enum AgentState {
    Agent,
    Tools(ToolCall),
}

/// Requirements Agent context: alternates model calls and tool dispatch
/// until the model answers without a tool call.
pub struct RequirementsAgent<M>
where
    M: AgentModel,
{
    model: M,
    registry: ToolRegistry,
    system_prompt: Option<String>,
    max_steps: usize,
}

impl<M> RequirementsAgent<M>
where
    M: AgentModel,
{
    pub fn new(model: M) -> Self {
        Self {
            model,
            registry: ToolRegistry::new(),
            system_prompt: None,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Role method: agent.run
    ///
    /// Runs one user turn over `window`. The record is copied in and the
    /// updated copy is returned in [`AgentRun::requirements`].
    ///
    /// # Errors
    /// Completion failures and unknown tools abort the turn. Invalid tool
    /// arguments do not: the error text is handed back to the model as the
    /// tool result.
    pub fn run(&self, window: &[Message], requirements: &RequirementsRecord) -> Result<AgentRun, AgentError> {
        let specs = self.registry.specs();
        let mut requirements = requirements.clone();
        let mut produced: Vec<Message> = Vec::new();
        let mut tool_calls = 0;
        let mut steps = 0;
        let mut state = AgentState::Agent;

        loop {
            state = match state {
                AgentState::Agent => {
                    if steps >= self.max_steps {
                        return Err(AgentError::StepLimitExceeded { limit: self.max_steps });
                    }
                    steps += 1;

                    let history = self.history(window, &produced);
                    let reply = self.model.invoke(&history, &specs)?;
                    match reply.tool_call {
                        Some(call) => {
                            log::debug!("Agent step {} requested tool {}", steps, call.name);
                            produced.push(Message::assistant_tool_call(reply.content, call.clone()));
                            AgentState::Tools(call)
                        }
                        None => {
                            log::debug!("Agent settled after {} step(s)", steps);
                            produced.push(Message::assistant(reply.content.clone()));
                            return Ok(AgentRun {
                                messages: produced,
                                requirements,
                                reply: reply.content,
                                tool_calls,
                            });
                        }
                    }
                }
                AgentState::Tools(call) => {
                    tool_calls += 1;
                    match self.registry.dispatch(&call, &requirements) {
                        Ok(dispatched) => {
                            if dispatched.tool == ToolName::UpdateRequirement {
                                merge_update(&mut requirements, &dispatched.output);
                            }
                            produced.push(dispatched.message);
                        }
                        Err(err) if err.is_fatal() => return Err(AgentError::Tool(err)),
                        Err(err) => {
                            log::warn!("Tool call rejected: {}", err);
                            produced.push(Message::tool_result(&call, format!("Error: {}", err)));
                        }
                    }
                    AgentState::Agent
                }
            };
        }
    }

    fn history(&self, window: &[Message], produced: &[Message]) -> Vec<Message> {
        let mut history = Vec::with_capacity(window.len() + produced.len() + 1);
        if let Some(prompt) = &self.system_prompt {
            history.push(Message::system(prompt.clone()));
        }
        history.extend_from_slice(window);
        history.extend_from_slice(produced);
        history
    }
}

/// Folds an `update_requirement` output (`{name: value}`) into the record.
fn merge_update(requirements: &mut RequirementsRecord, output: &serde_json::Value) {
    let Some(map) = output.as_object() else {
        return;
    };
    for (name, value) in map {
        match (name.parse::<RequirementField>(), value.as_str()) {
            (Ok(field), Some(value)) => {
                log::info!("Requirement {} set to {:?}", field, value);
                requirements.apply(field, value);
            }
            _ => log::warn!("Ignoring requirement update {}={}", name, value),
        }
    }
}
