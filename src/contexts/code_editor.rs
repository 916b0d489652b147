use serde_json::json;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::contexts::artifact_writer::{ArtifactWriter, WriteError};
use crate::contexts::lint_fix::{LintFixError, LintFixLoop, LintFixOutcome};
use crate::contexts::output_parser::{MarkerParser, ResponseParser};
use crate::contexts::prompt_runner::{prompts, PromptError, PromptRegistry, PromptRunner};
use crate::data::{CompletionPort, LintRunner};

#[derive(Debug, Error)]
pub enum EditError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("the edit response for {0} contained no code; file left untouched")]
    MalformedResponse(PathBuf),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error(transparent)]
    LintFix(#[from] LintFixError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOutcome {
    pub path: PathBuf,
    /// Contents before the edit, for reverting.
    pub previous: String,
    pub code: String,
    pub lint: Option<LintFixOutcome>,
}

/// Applies a free-form instruction to an existing file.
pub struct CodeEditor<'a, P, R>
where
    P: CompletionPort,
    R: PromptRegistry,
{
    runner: &'a PromptRunner<P, R>,
    writer: ArtifactWriter,
    parser: Box<dyn ResponseParser + 'a>,
}

impl<'a, P, R> CodeEditor<'a, P, R>
where
    P: CompletionPort,
    R: PromptRegistry,
{
    pub fn new(runner: &'a PromptRunner<P, R>) -> Self {
        Self {
            runner,
            writer: ArtifactWriter::default(),
            parser: Box::new(MarkerParser::new()),
        }
    }

    pub fn with_writer(mut self, writer: ArtifactWriter) -> Self {
        self.writer = writer;
        self
    }

    /// Asks for the edited file and writes it.
    pub fn edit(&self, file: &Path, instruction: &str) -> Result<EditOutcome, EditError> {
        let outcome = self.propose(file, instruction)?;
        self.writer.write(file, &outcome.code)?;
        Ok(outcome)
    }

    /// Like [`Self::edit`], then lints and repairs the result.
    pub fn edit_and_verify<L>(
        &self,
        file: &Path,
        instruction: &str,
        fixer: &LintFixLoop<'_, P, R, L>,
        budget: usize,
    ) -> Result<EditOutcome, EditError>
    where
        L: LintRunner,
    {
        let mut outcome = self.propose(file, instruction)?;
        let lint = fixer.run(file, &outcome.code, budget)?;
        outcome.code = lint.code.clone();
        outcome.lint = Some(lint);
        Ok(outcome)
    }

    /// Writes `outcome.previous` back over the edited file.
    ///
    /// The original contents may be empty, so this bypasses the writer's
    /// empty-content check.
    pub fn revert(&self, outcome: &EditOutcome) -> Result<(), EditError> {
        if self.writer.is_dry_run() {
            log::info!("[dry-run] would revert {}", outcome.path.display());
            return Ok(());
        }
        fs::write(&outcome.path, &outcome.previous).map_err(|source| WriteError::Io {
            path: outcome.path.clone(),
            source,
        })?;
        log::info!("Reverted {}", outcome.path.display());
        Ok(())
    }

    fn propose(&self, file: &Path, instruction: &str) -> Result<EditOutcome, EditError> {
        let previous = fs::read_to_string(file).map_err(|source| EditError::Read {
            path: file.to_path_buf(),
            source,
        })?;

        let response = self
            .runner
            .ask(prompts::EDIT_CODE, &previous, &json!({ "instruction": instruction }))?;
        let code = self
            .parser
            .code_only(&response)
            .ok_or_else(|| EditError::MalformedResponse(file.to_path_buf()))?;

        Ok(EditOutcome {
            path: file.to_path_buf(),
            previous,
            code,
            lint: None,
        })
    }
}
