//! Integration tests for the full pipeline through the public API:
//! requirements conversation, generation from boilerplate or a definition
//! file, lint-and-fix, generation log and commit.
//!
//! The live smoke test needs an API key and a lint command:
//! KEVIN_API_KEY=... cargo test live_generation --test pipeline_test -- --ignored --nocapture
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use tempfile::tempdir;

use kevin::contexts::{
    ChatSession, CodeGenerator, CommitMessageSynthesizer, DefinitionGenerator, LintFixLoop,
    PromptRunner, TurnOutcome, DEFINITION_ATTEMPTS,
};
use kevin::data::{
    load_definition, AgentModel, AgentReply, CompletionError, CompletionPort, DefinitionKind,
    LintError, LintRunner, Message, RequirementField, RequirementsRecord, ToolCall, ToolSpec,
    VcsError, VersionControl,
};
use kevin::generation_log::GenerationLog;
use kevin::registries::{BuiltinPrompts, FilePromptRegistry};

struct Script {
    responses: RefCell<VecDeque<String>>,
    questions: RefCell<Vec<String>>,
}

impl Script {
    fn new(responses: &[&str]) -> Self {
        Self {
            responses: RefCell::new(responses.iter().map(|s| s.to_string()).collect()),
            questions: RefCell::new(Vec::new()),
        }
    }

    fn remaining(&self) -> usize {
        self.responses.borrow().len()
    }
}

impl CompletionPort for Script {
    fn complete(&self, _context: &str, question: &str) -> Result<String, CompletionError> {
        self.questions.borrow_mut().push(question.to_string());
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| CompletionError::Transport("script exhausted".to_string()))
    }
}

struct Agent {
    replies: RefCell<VecDeque<AgentReply>>,
}

impl Agent {
    fn new(replies: Vec<AgentReply>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
        }
    }
}

impl AgentModel for Agent {
    fn invoke(&self, _messages: &[Message], tools: &[ToolSpec]) -> Result<AgentReply, CompletionError> {
        assert_eq!(tools.len(), 2, "both requirement tools are offered");
        self.replies
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| CompletionError::Transport("agent script exhausted".to_string()))
    }
}

fn update(name: &str, value: &str) -> AgentReply {
    AgentReply {
        content: String::new(),
        tool_call: Some(ToolCall {
            id: format!("call_{}", name),
            name: "update_requirement".to_string(),
            arguments: json!({ "variable_name": name, "value": value }),
        }),
    }
}

fn say(text: &str) -> AgentReply {
    AgentReply {
        content: text.to_string(),
        tool_call: None,
    }
}

struct EchoLint(String);

impl LintRunner for EchoLint {
    fn run(&self, _project_dir: &Path) -> Result<String, LintError> {
        Ok(self.0.clone())
    }
}

#[derive(Default)]
struct MemoryVcs {
    commits: RefCell<Vec<(Vec<PathBuf>, String)>>,
}

impl VersionControl for MemoryVcs {
    fn commit(&self, paths: &[PathBuf], message: &str) -> Result<(), VcsError> {
        if paths.is_empty() {
            return Err(VcsError::NothingToCommit);
        }
        self.commits
            .borrow_mut()
            .push((paths.to_vec(), message.to_string()));
        Ok(())
    }
}

fn seed_templates(root: &Path) -> PathBuf {
    let templates = root.join("templates");
    let dir = templates.join("app/cases");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("add-case.tsx"), "export function AddCase() {}\n").unwrap();
    fs::write(dir.join("case-table.tsx"), "export function CaseTable() {}\n").unwrap();
    templates
}

const GENERATED: &str = "Filename: templates/app/cases/add-user.tsx\n\
Code: ```tsx\nexport function AddUser() { let unused = 1; }\n```\n\n\
Filename: templates/app/cases/user-table.tsx\n\
Code: ```tsx\nexport function UserTable() {}\n```\n";

#[test]
fn conversation_to_verified_files() {
    let dir = tempdir().unwrap();
    let templates = seed_templates(dir.path());
    let out = dir.path().join("out");

    let agent = Agent::new(vec![
        update("model", "User"),
        update("fields", "id,name,email"),
        update("folder_location", &out.to_string_lossy()),
        say("Got everything."),
    ]);
    let port = Script::new(&[
        GENERATED,
        "Errors:\nLine 1: 'unused' is assigned a value but never used.",
        "```tsx\nexport function AddUser() {}\n```",
        "No errors found.",
        "No errors found.",
    ]);
    let runner = PromptRunner::new(&port, BuiltinPrompts);

    let mut session = ChatSession::new(&agent, &runner);
    let requirements = match session.handle_message("A User with id, name and email in out").unwrap() {
        TurnOutcome::Ready(record) => record,
        other => panic!("expected complete requirements, got {:?}", other),
    };
    assert_eq!(requirements.fields, vec!["id", "name", "email"]);
    assert_eq!(port.remaining(), 5, "a complete record needs no probe");

    let generator = CodeGenerator::new(&runner, &templates).with_template_prefix("templates/");
    let mut report = generator.generate(&requirements).unwrap();
    assert_eq!(report.expected, 2);
    assert!(!report.is_degraded());

    let lint = EchoLint("out/app/cases/add-user.tsx\n  1:30  error  'unused' is assigned a value but never used  no-unused-vars\n".to_string());
    let fixer = LintFixLoop::new(&runner, lint, dir.path())
        .with_transcript_dir(dir.path().join(".kevin/lint_fixes"));
    generator.verify(&mut report, &fixer, 3).unwrap();

    assert_eq!(port.remaining(), 0);
    assert_eq!(report.unverified().count(), 0);
    assert_eq!(report.files[0].lint.as_ref().unwrap().attempts, 1);
    assert_eq!(
        fs::read_to_string(out.join("app/cases/add-user.tsx")).unwrap(),
        "export function AddUser() {}"
    );
    assert_eq!(
        fs::read_to_string(out.join("app/cases/user-table.tsx")).unwrap(),
        "export function UserTable() {}"
    );
}

#[test]
fn exhausted_budget_is_reported_not_fatal() {
    let dir = tempdir().unwrap();
    let templates = seed_templates(dir.path());
    let out = dir.path().join("out");

    let mut requirements = RequirementsRecord::new();
    requirements.apply(RequirementField::Model, "User");
    requirements.apply(RequirementField::Fields, "id");
    requirements.apply(RequirementField::FolderLocation, &out.to_string_lossy());

    // Only one file comes back, and it never lints clean.
    let port = Script::new(&[
        "Filename: templates/app/cases/add-user.tsx\nCode: ```tsx\nbroken\n```",
        "Errors: Line 1: Parsing error",
        "```tsx\nstill broken\n```",
    ]);
    let runner = PromptRunner::new(&port, BuiltinPrompts);
    let generator = CodeGenerator::new(&runner, &templates).with_template_prefix("templates/");
    let mut report = generator.generate(&requirements).unwrap();
    assert_eq!(report.shortfall(), 1);

    let fixer = LintFixLoop::new(&runner, EchoLint("error".to_string()), dir.path());
    generator.verify(&mut report, &fixer, 1).unwrap();

    let file = &report.files[0];
    assert_eq!(file.verified(), Some(false));
    assert_eq!(file.code, "still broken");
    assert_eq!(fs::read_to_string(&file.path).unwrap(), "still broken");
}

#[test]
fn definition_file_to_linted_table() {
    let dir = tempdir().unwrap();
    let examples = dir.path().join("templates/table-ui");
    fs::create_dir_all(&examples).unwrap();
    fs::write(examples.join("case-search-table.tsx"), "export function CaseSearchTable() {}\n").unwrap();
    let definition = dir.path().join("definition-file.json");
    fs::write(
        &definition,
        r#"{ "table_ui": { "file_name": "user-table.tsx", "columns": ["name", "email"] } }"#,
    )
    .unwrap();
    let out = dir.path().join("apps/web/components");

    let port = Script::new(&["```tsx\nexport function UserTable() {}\n```", "No errors found."]);
    let runner = PromptRunner::new(&port, BuiltinPrompts);
    let entry = load_definition(&definition, DefinitionKind::TableUi).unwrap();
    let fixer = LintFixLoop::new(&runner, EchoLint(String::new()), dir.path());

    let file = DefinitionGenerator::new(&runner, dir.path().join("templates"))
        .with_schema_file(dir.path().join("packages/db-prisma/schema.prisma"))
        .generate_and_verify(&entry, &out, &fixer, DEFINITION_ATTEMPTS)
        .unwrap();

    assert_eq!(file.verified(), Some(true));
    assert_eq!(
        fs::read_to_string(out.join("user-table.tsx")).unwrap(),
        "export function UserTable() {}"
    );
    assert!(port.questions.borrow()[0].contains("\"columns\""));
    assert_eq!(port.remaining(), 0);
}

#[test]
fn log_then_commit_with_synthesized_message() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("out/user.tsx");
    fs::create_dir_all(file.parent().unwrap()).unwrap();
    fs::write(&file, "export {}").unwrap();

    let log_path = dir.path().join(".kevin/generation_log.json");
    let mut log = GenerationLog::load(&log_path).unwrap();
    log.record_instruction("create a User page");
    log.record(&file, Some(true)).unwrap();
    log.save(&log_path).unwrap();

    let mut log = GenerationLog::load(&log_path).unwrap();
    assert_eq!(log.touched_files(), vec![file.clone()]);

    let port = Script::new(&["`feat: add user page`\n\nextra detail"]);
    let runner = PromptRunner::new(&port, FilePromptRegistry::new(Some(dir.path().join("prompts"))));
    let message = CommitMessageSynthesizer::new(&runner)
        .synthesize(log.instructions())
        .unwrap()
        .unwrap();
    assert_eq!(message, "feat: add user page");
    assert_eq!(port.questions.borrow().len(), 1);

    let vcs = MemoryVcs::default();
    vcs.commit(&log.touched_files(), &message).unwrap();
    assert_eq!(log.clear(), 1);
    log.save(&log_path).unwrap();

    assert!(GenerationLog::load(&log_path).unwrap().is_empty());
    assert_eq!(vcs.commits.borrow()[0].1, "feat: add user page");
}

#[test]
#[ignore] // Needs an API key, boilerplate in ./templates and a working lint command
fn live_generation() {
    use kevin::adapters::{CommandLintRunner, OpenAiClient};
    use kevin::settings::Settings;

    let settings = Settings::load(None).expect("settings");
    let client = OpenAiClient::new(&settings).expect("configured client");
    let runner = PromptRunner::new(&client, FilePromptRegistry::new(Some(settings.prompts_dir.clone())));

    let dir = tempdir().unwrap();
    let mut requirements = RequirementsRecord::new();
    requirements.apply(RequirementField::Model, "Department");
    requirements.apply(RequirementField::Fields, "id,name");
    requirements.apply(RequirementField::FolderLocation, &dir.path().to_string_lossy());

    let generator = CodeGenerator::new(&runner, &settings.boilerplate_dir)
        .with_template_prefix(settings.template_prefix.clone());
    let mut report = generator.generate(&requirements).expect("generation");
    println!("Generated {} of {} file(s)", report.files.len(), report.expected);

    let lint = CommandLintRunner::new(&settings.lint_command).expect("lint command");
    let fixer = LintFixLoop::new(&runner, lint, &settings.project_dir);
    generator.verify(&mut report, &fixer, settings.lint_attempts).expect("lint-fix");
    for file in &report.files {
        println!("{} verified={:?}", file.path.display(), file.verified());
    }
}
