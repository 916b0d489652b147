use anyhow::{Context, Result};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

mod progress;

use kevin::adapters::{CommandLintRunner, GitCli, OpenAiClient};
use kevin::contexts::{
    ArtifactWriter, ChatSession, CodeEditor, CodeGenerator, CommitMessageSynthesizer,
    DefinitionGenerator, GenerationReport, LintFixLoop, LintFixOutcome, PromptRegistry,
    PromptRunner, TurnOutcome, DEFINITION_ATTEMPTS,
};
use kevin::data::{
    load_definition, CompletionPort, DefinitionKind, RequirementField, RequirementsRecord, VcsError,
    VersionControl,
};
use kevin::generation_log::GenerationLog;
use kevin::registries::FilePromptRegistry;
use kevin::settings::Settings;
use progress::{ItemStatus, ProgressIndicator};

#[derive(Clone, Copy)]
pub struct Config {
    pub verbose: bool,
    pub dry_run: bool,
}

pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let settings = match path {
        Some(path) => Settings::load(Some(path))
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::load(None).context("Failed to load settings")?,
    };
    log::debug!(
        "Settings: model={} boilerplate_dir={} lint_command={:?}",
        settings.model,
        settings.boilerplate_dir.display(),
        settings.lint_command
    );
    Ok(settings)
}

/// Completion calls block, so every command body runs on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .context("Worker thread panicked")?
}

fn prompt_registry(settings: &Settings) -> FilePromptRegistry {
    FilePromptRegistry::new(Some(settings.prompts_dir.clone()))
}

pub async fn chat(settings: Settings, config: &Config) -> Result<()> {
    let config = *config;
    blocking(move || run_chat(&settings, &config)).await
}

fn run_chat(settings: &Settings, config: &Config) -> Result<()> {
    let client = OpenAiClient::new(settings).context("Language model is not configured")?;
    let runner = PromptRunner::new(&client, prompt_registry(settings));
    let mut session = ChatSession::new(&client, &runner).with_max_agent_steps(settings.max_agent_steps);

    println!("{}", session.greeting());
    let requirements = loop {
        let Some(line) = read_line("> ")? else {
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }
        match session.handle_message(&line) {
            Ok(TurnOutcome::Cancelled) => {
                println!("Bye.");
                return Ok(());
            }
            Ok(TurnOutcome::Ready(record)) => break record,
            Ok(TurnOutcome::Continue { reply, probe }) => {
                if !reply.trim().is_empty() {
                    println!("{}", reply.trim());
                }
                if let Some(question) = probe {
                    println!("{}", question);
                }
            }
            Err(e) => eprintln!("✗ {}", e),
        }
    };

    print_requirements(&requirements);
    if !confirm("Generate the code now?")? {
        println!("Nothing generated.");
        return Ok(());
    }

    let mut log = load_log(settings)?;
    for instruction in session.instructions() {
        log.record_instruction(instruction.clone());
    }
    let report = generate_files(settings, config, &runner, &requirements, true, settings.lint_attempts)?;
    record_report(&mut log, &report, config)?;
    save_log(&log, settings, config)?;

    if config.dry_run || report.files.is_empty() {
        return Ok(());
    }
    if confirm("Commit the generated files?")? {
        commit_logged(settings, config, &runner, &mut log)?;
    }
    Ok(())
}

pub async fn generate(
    settings: Settings,
    model: String,
    fields: String,
    folder: String,
    lint: bool,
    attempts: Option<usize>,
    config: &Config,
) -> Result<()> {
    let config = *config;
    blocking(move || {
        let requirements = requirements_from_args(&model, &fields, &folder);
        if let Some(missing) = requirements.next_missing() {
            anyhow::bail!("Missing requirement: {}", missing.as_str());
        }

        let client = OpenAiClient::new(&settings).context("Language model is not configured")?;
        let runner = PromptRunner::new(&client, prompt_registry(&settings));
        let budget = attempts.unwrap_or(settings.lint_attempts);

        let mut log = load_log(&settings)?;
        log.record_instruction(format!(
            "generate {} ({}) in {}",
            requirements.model,
            requirements.fields.join(", "),
            requirements.folder_location
        ));
        let report = generate_files(&settings, &config, &runner, &requirements, lint, budget)?;
        record_report(&mut log, &report, &config)?;
        save_log(&log, &settings, &config)
    })
    .await
}

pub async fn generate_from_definition(
    settings: Settings,
    kind: DefinitionKind,
    definition: Option<PathBuf>,
    output: PathBuf,
    attempts: Option<usize>,
    config: &Config,
) -> Result<()> {
    let config = *config;
    blocking(move || {
        let definition = definition.unwrap_or_else(|| settings.definition_file.clone());
        let entry = load_definition(&definition, kind)
            .with_context(|| format!("Failed to load the '{}' definition", kind))?;

        let client = OpenAiClient::new(&settings).context("Language model is not configured")?;
        let runner = PromptRunner::new(&client, prompt_registry(&settings));
        let generator = DefinitionGenerator::new(&runner, &settings.templates_root)
            .with_schema_file(settings.schema_path())
            .with_writer(ArtifactWriter::new(config.dry_run));

        println!("Generating {} from {}", entry.file_name, definition.display());
        if config.dry_run {
            let file = generator.generate(&entry, &output).context("Code generation failed")?;
            println!("[DRY RUN] Would write {}:\n{}", file.path.display(), file.code);
            return Ok(());
        }

        let lint = CommandLintRunner::new(&settings.lint_command)?;
        let fixer = LintFixLoop::new(&runner, lint, &settings.project_dir)
            .with_transcript_dir(settings.lint_transcript_dir());
        let budget = attempts.unwrap_or(DEFINITION_ATTEMPTS);
        let file = generator
            .generate_and_verify(&entry, &output, &fixer, budget)
            .context("Code generation failed")?;

        let label = file.path.display().to_string();
        println!("✓ Wrote {}", label);
        if let Some(lint) = &file.lint {
            report_outcome(&label, lint, &config);
        }

        let mut log = load_log(&settings)?;
        log.record_instruction(format!("generated {}", entry.file_name));
        log.record(&file.path, file.verified())?;
        save_log(&log, &settings, &config)
    })
    .await
}

pub async fn lint_fix(settings: Settings, file: PathBuf, attempts: Option<usize>, config: &Config) -> Result<()> {
    let config = *config;
    blocking(move || {
        let candidate = fs::read_to_string(&file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        if config.dry_run {
            println!("[DRY RUN] Would lint and fix {}", file.display());
            return Ok(());
        }

        let client = OpenAiClient::new(&settings).context("Language model is not configured")?;
        let runner = PromptRunner::new(&client, prompt_registry(&settings));
        let lint = CommandLintRunner::new(&settings.lint_command)?;
        let fixer = LintFixLoop::new(&runner, lint, &settings.project_dir)
            .with_transcript_dir(settings.lint_transcript_dir());
        let budget = attempts.unwrap_or(settings.lint_attempts);

        let mut progress = ProgressIndicator::new(1);
        let label = file.display().to_string();
        progress.start_item(&label);
        let outcome = match fixer.run(&file, &candidate, budget) {
            Ok(outcome) => outcome,
            Err(e) => {
                progress.complete_item(&label, ItemStatus::Failed);
                eprintln!("✗ Failed to lint {}: {}", label, e);
                progress.finish();
                return Err(e.into());
            }
        };
        progress.complete_item(&label, item_status(&outcome));
        report_outcome(&label, &outcome, &config);
        progress.finish();

        let mut log = load_log(&settings)?;
        log.record_instruction(format!("lint-fix {}", label));
        log.record(&file, Some(outcome.verified))?;
        save_log(&log, &settings, &config)
    })
    .await
}

pub async fn edit(
    settings: Settings,
    file: PathBuf,
    instruction: String,
    attempts: Option<usize>,
    revert_on_unverified: bool,
    config: &Config,
) -> Result<()> {
    let config = *config;
    blocking(move || {
        let client = OpenAiClient::new(&settings).context("Language model is not configured")?;
        let runner = PromptRunner::new(&client, prompt_registry(&settings));
        let editor = CodeEditor::new(&runner).with_writer(ArtifactWriter::new(config.dry_run));
        let label = file.display().to_string();

        if config.dry_run {
            let outcome = editor
                .edit(&file, &instruction)
                .with_context(|| format!("Failed to edit {}", label))?;
            println!("[DRY RUN] Proposed contents for {}:\n{}", label, outcome.code);
            return Ok(());
        }

        let lint = CommandLintRunner::new(&settings.lint_command)?;
        let fixer = LintFixLoop::new(&runner, lint, &settings.project_dir)
            .with_transcript_dir(settings.lint_transcript_dir());
        let budget = attempts.unwrap_or(settings.lint_attempts);
        let outcome = editor
            .edit_and_verify(&file, &instruction, &fixer, budget)
            .with_context(|| format!("Failed to edit {}", label))?;

        println!("✓ Edited {}", label);
        if let Some(lint) = &outcome.lint {
            report_outcome(&label, lint, &config);
        }
        if revert_on_unverified && outcome.lint.as_ref().is_some_and(|lint| !lint.verified) {
            editor
                .revert(&outcome)
                .with_context(|| format!("Failed to revert {}", label))?;
            println!("↺ Reverted {} to its original contents", label);
            return Ok(());
        }

        let mut log = load_log(&settings)?;
        log.record_instruction(instruction.clone());
        log.record(&file, outcome.lint.as_ref().map(|lint| lint.verified))?;
        save_log(&log, &settings, &config)
    })
    .await
}

pub async fn commit(settings: Settings, message: Option<String>, config: &Config) -> Result<()> {
    let config = *config;
    blocking(move || {
        let mut log = load_log(&settings)?;
        if log.touched_files().is_empty() {
            println!("Nothing to commit");
            return Ok(());
        }

        match message {
            Some(message) => commit_with_message(&settings, &config, &mut log, &message),
            None => {
                let client = OpenAiClient::new(&settings).context("Language model is not configured")?;
                let runner = PromptRunner::new(&client, prompt_registry(&settings));
                commit_logged(&settings, &config, &runner, &mut log)
            }
        }
    })
    .await
}

pub fn status(settings: &Settings) -> Result<()> {
    let log = load_log(settings)?;
    println!("{}", log.summary());

    for path in log.touched_files() {
        match log.changed_since_recorded(&path) {
            Ok(true) => println!("  {} changed since it was recorded", path.display()),
            Ok(false) => {}
            Err(e) => println!("  {} unreadable: {}", path.display(), e),
        }
    }
    Ok(())
}

/// Generates every artifact and, when `lint` is set, routes each one
/// through the lint-and-fix loop with `budget` attempts.
fn generate_files<P, R>(
    settings: &Settings,
    config: &Config,
    runner: &PromptRunner<P, R>,
    requirements: &RequirementsRecord,
    lint: bool,
    budget: usize,
) -> Result<GenerationReport>
where
    P: CompletionPort,
    R: PromptRegistry,
{
    let generator = CodeGenerator::new(runner, &settings.boilerplate_dir)
        .with_template_prefix(settings.template_prefix.clone())
        .with_debug_dir(settings.debug_dir.clone())
        .with_writer(ArtifactWriter::new(config.dry_run));

    println!(
        "Generating {} files from {}",
        requirements.model,
        settings.boilerplate_dir.display()
    );
    let mut report = generator.generate(requirements).context("Code generation failed")?;

    for file in &report.files {
        if config.dry_run {
            println!("[DRY RUN] Would write {}", file.path.display());
        } else {
            println!("✓ Wrote {}", file.path.display());
        }
    }
    for skipped in &report.skipped {
        eprintln!("✗ Skipped a response segment: {:?}", skipped);
    }
    if report.shortfall() > 0 {
        eprintln!(
            "⚠ Expected {} files but received {}; {} missing",
            report.expected,
            report.files.len(),
            report.shortfall()
        );
    }

    if !lint || report.files.is_empty() {
        return Ok(report);
    }
    if config.dry_run {
        println!("[DRY RUN] Skipping lint-and-fix");
        return Ok(report);
    }

    let lint_runner = CommandLintRunner::new(&settings.lint_command)?;
    let fixer = LintFixLoop::new(runner, lint_runner, &settings.project_dir)
        .with_transcript_dir(settings.lint_transcript_dir());

    let mut progress = ProgressIndicator::new(report.files.len());
    for file in &mut report.files {
        let label = file.path.display().to_string();
        progress.start_item(&label);
        match fixer.run(&file.path, &file.code, budget) {
            Ok(outcome) => {
                progress.complete_item(&label, item_status(&outcome));
                report_outcome(&label, &outcome, config);
                file.code = outcome.code.clone();
                file.lint = Some(outcome);
            }
            Err(e) => {
                progress.complete_item(&label, ItemStatus::Failed);
                eprintln!("✗ Failed to lint {}: {}", label, e);
            }
        }
    }
    progress.finish();

    let unverified: Vec<_> = report.unverified().map(|f| f.path.display().to_string()).collect();
    if !unverified.is_empty() {
        eprintln!("⚠ NOT fully verified: {}", unverified.join(", "));
    }
    Ok(report)
}

fn commit_logged<P, R>(
    settings: &Settings,
    config: &Config,
    runner: &PromptRunner<P, R>,
    log: &mut GenerationLog,
) -> Result<()>
where
    P: CompletionPort,
    R: PromptRegistry,
{
    let message = CommitMessageSynthesizer::new(runner)
        .synthesize(log.instructions())
        .context("Failed to synthesize a commit message")?
        .unwrap_or_else(|| "chore: update generated code".to_string());
    commit_with_message(settings, config, log, &message)
}

fn commit_with_message(settings: &Settings, config: &Config, log: &mut GenerationLog, message: &str) -> Result<()> {
    let paths = log.touched_files();
    if config.dry_run {
        println!("[DRY RUN] Would commit {} file(s): {}", paths.len(), message);
        return Ok(());
    }

    match GitCli::new(&settings.project_dir, settings.push).commit(&paths, message) {
        Ok(()) => {
            println!("✓ Committed {} file(s): {}", paths.len(), message);
            if settings.push {
                println!("✓ Pushed");
            }
        }
        Err(VcsError::NothingToCommit) => {
            println!("Nothing to commit");
            return Ok(());
        }
        Err(e) => return Err(e).context("Commit failed"),
    }

    let removed = log.clear();
    if config.verbose {
        println!("Cleared {} entries from the generation log", removed);
    }
    save_log(log, settings, config)
}

fn requirements_from_args(model: &str, fields: &str, folder: &str) -> RequirementsRecord {
    let mut requirements = RequirementsRecord::new();
    requirements.apply(RequirementField::Model, model.trim());
    // Shell input like "id, name" is tidied before the record's own comma split.
    let fields = fields
        .split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .collect::<Vec<_>>()
        .join(",");
    requirements.apply(RequirementField::Fields, &fields);
    requirements.apply(RequirementField::FolderLocation, folder.trim());
    requirements
}

fn record_report(log: &mut GenerationLog, report: &GenerationReport, config: &Config) -> Result<()> {
    if config.dry_run {
        return Ok(());
    }
    for file in &report.files {
        log.record(&file.path, file.verified())?;
    }
    Ok(())
}

fn load_log(settings: &Settings) -> Result<GenerationLog> {
    let path = settings.generation_log_path();
    GenerationLog::load(&path).with_context(|| format!("Failed to load {}", path.display()))
}

fn save_log(log: &GenerationLog, settings: &Settings, config: &Config) -> Result<()> {
    if config.dry_run {
        return Ok(());
    }
    let path = settings.generation_log_path();
    log.save(&path).with_context(|| format!("Failed to save {}", path.display()))
}

fn item_status(outcome: &LintFixOutcome) -> ItemStatus {
    if outcome.verified {
        ItemStatus::Verified
    } else {
        ItemStatus::Unverified
    }
}

fn report_outcome(label: &str, outcome: &LintFixOutcome, config: &Config) {
    if outcome.verified {
        if config.verbose {
            println!(
                "  {} lints clean after {} fix attempt(s)",
                label, outcome.attempts
            );
        }
    } else {
        eprintln!(
            "⚠ {} is NOT fully verified after {} attempt(s)",
            label, outcome.attempts
        );
        if let Some(errors) = &outcome.outstanding {
            eprintln!("  Outstanding errors:\n{}", indent(errors));
        }
    }
    if let Some(transcript) = &outcome.transcript {
        if config.verbose {
            println!("  Transcript: {}", transcript.display());
        }
    }
}

fn print_requirements(requirements: &RequirementsRecord) {
    println!("\nRequirements:");
    println!("  Model:   {}", requirements.model);
    println!("  Fields:  {}", requirements.fields.join(", "));
    println!("  Folder:  {}", requirements.folder_location);
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `None` on end of input.
fn read_line(prompt: &str) -> Result<Option<String>> {
    print!("{}", prompt);
    io::stdout().flush().context("Failed to flush stdout")?;

    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

fn confirm(question: &str) -> Result<bool> {
    let answer = read_line(&format!("{} [y/N] ", question))?.unwrap_or_default();
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
