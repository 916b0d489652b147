//! Scripted fakes of the ports, shared by the unit tests in this module tree.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::Path;

use crate::data::{
    AgentModel, AgentReply, CompletionError, CompletionPort, LintError, LintRunner, Message,
    ToolCall, ToolSpec,
};

/// Replays canned responses in order and records every request.
#[derive(Default)]
pub struct ScriptedCompletion {
    responses: RefCell<VecDeque<Result<String, String>>>,
    pub calls: RefCell<Vec<(String, String)>>,
}

impl ScriptedCompletion {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: RefCell::new(responses.into_iter().map(|s| Ok(s.into())).collect()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn push_failure(&self, message: &str) {
        self.responses.borrow_mut().push_back(Err(message.to_string()));
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl CompletionPort for ScriptedCompletion {
    fn complete(&self, context: &str, question: &str) -> Result<String, CompletionError> {
        self.calls
            .borrow_mut()
            .push((context.to_string(), question.to_string()));
        match self.responses.borrow_mut().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(CompletionError::Transport(message)),
            None => Err(CompletionError::Transport("script exhausted".to_string())),
        }
    }
}

/// Agent model fake: replays replies and keeps the message lists it saw.
#[derive(Default)]
pub struct ScriptedAgentModel {
    replies: RefCell<VecDeque<AgentReply>>,
    /// When set, every call past the script returns this reply.
    repeat: Option<AgentReply>,
    pub seen: RefCell<Vec<Vec<Message>>>,
}

impl ScriptedAgentModel {
    pub fn new(replies: Vec<AgentReply>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            repeat: None,
            seen: RefCell::new(Vec::new()),
        }
    }

    pub fn repeating(reply: AgentReply) -> Self {
        Self {
            replies: RefCell::new(VecDeque::new()),
            repeat: Some(reply),
            seen: RefCell::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.seen.borrow().len()
    }
}

impl AgentModel for ScriptedAgentModel {
    fn invoke(&self, messages: &[Message], _tools: &[ToolSpec]) -> Result<AgentReply, CompletionError> {
        self.seen.borrow_mut().push(messages.to_vec());
        if let Some(reply) = self.replies.borrow_mut().pop_front() {
            return Ok(reply);
        }
        self.repeat
            .clone()
            .ok_or_else(|| CompletionError::Transport("script exhausted".to_string()))
    }
}

pub fn text_reply(content: &str) -> AgentReply {
    AgentReply {
        content: content.to_string(),
        tool_call: None,
    }
}

pub fn tool_reply(name: &str, arguments: serde_json::Value) -> AgentReply {
    AgentReply {
        content: String::new(),
        tool_call: Some(ToolCall {
            id: format!("call_{}", name),
            name: name.to_string(),
            arguments,
        }),
    }
}

/// Lint runner that always prints the same output.
pub struct FixedLint {
    output: String,
    runs: Cell<usize>,
}

impl FixedLint {
    pub fn new(output: &str) -> Self {
        Self {
            output: output.to_string(),
            runs: Cell::new(0),
        }
    }

    pub fn runs(&self) -> usize {
        self.runs.get()
    }
}

impl LintRunner for FixedLint {
    fn run(&self, _project_dir: &Path) -> Result<String, LintError> {
        self.runs.set(self.runs.get() + 1);
        Ok(self.output.clone())
    }
}
