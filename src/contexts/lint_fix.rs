use chrono::Utc;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::contexts::artifact_writer::{ArtifactWriter, WriteError};
use crate::contexts::output_parser::{MarkerParser, ResponseParser};
use crate::contexts::prompt_runner::{prompts, PromptError, PromptRegistry, PromptRunner};
use crate::data::{normalize_lint_path, CompletionPort, LintDiagnostics, LintError, LintRunner};

pub const DEFAULT_ATTEMPTS: usize = 3;

const CLEAN_SENTINELS: [&str; 3] = ["no errors found", "i don't know", "none"];
const ERRORS_PREFIX: &str = "Errors:";

#[derive(Debug, Error)]
pub enum LintFixError {
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error(transparent)]
    Lint(#[from] LintError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// Result of one lint-and-fix run over a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintFixOutcome {
    /// Final candidate text, as persisted.
    pub code: String,
    /// `false` when the attempt budget ran out before a clean lint.
    pub verified: bool,
    /// Fix requests sent to the completion port.
    pub attempts: usize,
    pub lint_runs: usize,
    /// Last diagnostics reported for the file when unverified.
    pub outstanding: Option<String>,
    pub transcript: Option<PathBuf>,
}

/// Lint-and-Fix context: writes, lints, and asks for repairs until the file
/// lints clean or the attempt budget is spent.
pub struct LintFixLoop<'a, P, R, L>
where
    P: CompletionPort,
    R: PromptRegistry,
    L: LintRunner,
{
    runner: &'a PromptRunner<P, R>,
    lint: L,
    project_dir: PathBuf,
    writer: ArtifactWriter,
    parser: Box<dyn ResponseParser + 'a>,
    transcript_root: Option<PathBuf>,
}

impl<'a, P, R, L> LintFixLoop<'a, P, R, L>
where
    P: CompletionPort,
    R: PromptRegistry,
    L: LintRunner,
{
    pub fn new(runner: &'a PromptRunner<P, R>, lint: L, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            lint,
            project_dir: project_dir.into(),
            writer: ArtifactWriter::default(),
            parser: Box::new(MarkerParser::new()),
            transcript_root: None,
        }
    }

    /// Writes per-attempt lint output, diagnostics, and fixes under `root`.
    pub fn with_transcript_dir(mut self, root: impl Into<PathBuf>) -> Self {
        self.transcript_root = Some(root.into());
        self
    }

    pub fn with_parser(mut self, parser: impl ResponseParser + 'a) -> Self {
        self.parser = Box::new(parser);
        self
    }

    /// Role method: lint_fix.run
    ///
    /// Returns the last candidate even when diagnostics remain; check
    /// [`LintFixOutcome::verified`].
    ///
    /// # Errors
    /// Write, lint-process and completion failures abort the run. Files
    /// already written stay as they are.
    pub fn run(&self, file: &Path, candidate: &str, budget: usize) -> Result<LintFixOutcome, LintFixError> {
        let lint_key = self.lint_key(file);
        let session_dir = self.session_dir(&lint_key);
        let mut code = candidate.to_string();
        let mut attempts = 0;
        let mut lint_runs = 0;
        let mut outstanding = None;

        for attempt in 1..=budget {
            log::info!("Linting {} (attempt {}/{})", lint_key, attempt, budget);
            self.writer.write(file, &code)?;

            let raw = self.lint.run(&self.project_dir)?;
            lint_runs += 1;
            let context = LintDiagnostics::parse(&raw)
                .render_for(&lint_key)
                .unwrap_or_else(|| raw.clone());

            let answer = self
                .runner
                .ask(prompts::EXTRACT_LINT_ERRORS, &context, &json!({ "file_path": lint_key }))?;

            let attempt_dir = session_dir.as_ref().and_then(|dir| attempt_dir(dir, attempt));
            if let Some(dir) = &attempt_dir {
                fs::write(dir.join("lint_output.txt"), &raw).ok();
                fs::write(dir.join("diagnostics.txt"), &answer).ok();
            }

            let Some(errors) = outstanding_errors(&answer) else {
                log::info!("{} lints clean", lint_key);
                return Ok(LintFixOutcome {
                    code,
                    verified: true,
                    attempts,
                    lint_runs,
                    outstanding: None,
                    transcript: session_dir,
                });
            };

            log::debug!("Diagnostics for {}: {}", lint_key, errors);
            let response = self
                .runner
                .ask(prompts::FIX_LINT_ERRORS, &code, &json!({ "errors": errors }))?;
            attempts += 1;

            match self.parser.code_only(&response) {
                Some(fixed) => code = fixed,
                None => log::warn!(
                    "Fix attempt {} for {} returned no code; keeping the previous candidate",
                    attempt,
                    lint_key
                ),
            }
            if let Some(dir) = &attempt_dir {
                fs::write(dir.join("fixed.txt"), &code).ok();
            }
            outstanding = Some(errors);
        }

        self.writer.write(file, &code)?;
        if budget > 0 {
            log::warn!("{} is not fully verified after {} attempt(s)", lint_key, budget);
        }
        Ok(LintFixOutcome {
            code,
            verified: false,
            attempts,
            lint_runs,
            outstanding,
            transcript: session_dir,
        })
    }

    /// The file as the linter prints it: relative to the project when possible.
    fn lint_key(&self, file: &Path) -> String {
        let relative = file.strip_prefix(&self.project_dir).unwrap_or(file);
        normalize_lint_path(&relative.to_string_lossy())
    }

    fn session_dir(&self, lint_key: &str) -> Option<PathBuf> {
        let root = self.transcript_root.as_ref()?;
        let ts = Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string();
        let label: String = lint_key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        let dir = root.join(format!("{}_{}", ts, label));
        match fs::create_dir_all(&dir) {
            Ok(()) => Some(dir),
            Err(e) => {
                log::warn!("Lint transcript disabled: failed to create {}: {}", dir.display(), e);
                None
            }
        }
    }
}

fn attempt_dir(session_dir: &Path, attempt: usize) -> Option<PathBuf> {
    let dir = session_dir.join(format!("attempt_{}", attempt));
    fs::create_dir_all(&dir).ok().map(|_| dir)
}

/// `None` when the extraction answer means the file is clean.
///
/// The sentinels are checked on the raw answer and again after the
/// `Errors:` prefix.
pub fn outstanding_errors(answer: &str) -> Option<String> {
    let trimmed = answer.trim();
    if is_clean_sentinel(trimmed) {
        return None;
    }

    let errors = trimmed.strip_prefix(ERRORS_PREFIX).unwrap_or(trimmed).trim();
    if is_clean_sentinel(errors) {
        return None;
    }
    Some(errors.to_string())
}

fn is_clean_sentinel(text: &str) -> bool {
    let normalized = text.trim().trim_end_matches('.').trim().to_lowercase();
    normalized.is_empty() || CLEAN_SENTINELS.contains(&normalized.as_str())
}
