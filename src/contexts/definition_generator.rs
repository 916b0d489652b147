use serde_json::json;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::contexts::artifact_writer::{ArtifactWriter, WriteError};
use crate::contexts::code_generator::GeneratedFile;
use crate::contexts::lint_fix::{LintFixError, LintFixLoop};
use crate::contexts::output_parser::{MarkerParser, ResponseParser};
use crate::contexts::prompt_runner::{prompts, PromptError, PromptRegistry, PromptRunner};
use crate::data::{sanitize_relative_path, CompletionPort, DefinitionEntry, DefinitionKind, LintRunner};

/// Lint-fix attempts the definition path spends unless told otherwise.
pub const DEFINITION_ATTEMPTS: usize = 1;

#[derive(Debug, Error)]
pub enum DefinitionGenerateError {
    #[error("no example files found in {0}")]
    NoExamples(PathBuf),
    #[error("failed to read {path}: {source}")]
    ReadContext {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unusable file_name {0:?}")]
    InvalidFileName(String),
    #[error("the response for {0} contained no code; nothing written")]
    MalformedResponse(String),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error(transparent)]
    LintFix(#[from] LintFixError),
}

pub fn prompt_for(kind: DefinitionKind) -> &'static str {
    match kind {
        DefinitionKind::PrismaSchema => prompts::GENERATE_PRISMA_SCHEMA,
        DefinitionKind::ApiRoute => prompts::GENERATE_API_ROUTE,
        DefinitionKind::ApiRouteFilters => prompts::GENERATE_API_ROUTE_FILTERS,
        DefinitionKind::TableUi => prompts::GENERATE_TABLE_UI,
        DefinitionKind::FormUi => prompts::GENERATE_FORM_UI,
    }
}

/// Generates a single file from one definition-file section, using the
/// kind's example files and the project schema as context.
pub struct DefinitionGenerator<'a, P, R>
where
    P: CompletionPort,
    R: PromptRegistry,
{
    runner: &'a PromptRunner<P, R>,
    templates_root: PathBuf,
    schema_file: Option<PathBuf>,
    writer: ArtifactWriter,
    parser: Box<dyn ResponseParser + 'a>,
}

impl<'a, P, R> DefinitionGenerator<'a, P, R>
where
    P: CompletionPort,
    R: PromptRegistry,
{
    pub fn new(runner: &'a PromptRunner<P, R>, templates_root: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            templates_root: templates_root.into(),
            schema_file: None,
            writer: ArtifactWriter::default(),
            parser: Box::new(MarkerParser::new()),
        }
    }

    /// Appends the schema to every context. A missing file is skipped.
    pub fn with_schema_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_file = Some(path.into());
        self
    }

    pub fn with_writer(mut self, writer: ArtifactWriter) -> Self {
        self.writer = writer;
        self
    }

    pub fn with_parser(mut self, parser: impl ResponseParser + 'a) -> Self {
        self.parser = Box::new(parser);
        self
    }

    /// Every file directly under `<templates_root>/<subpath>`, in name order,
    /// followed by the schema.
    pub fn context_for(&self, kind: DefinitionKind) -> Result<String, DefinitionGenerateError> {
        let examples_dir = self.templates_root.join(kind.template_subpath());
        let mut files = list_files(&examples_dir)?;
        if files.is_empty() {
            return Err(DefinitionGenerateError::NoExamples(examples_dir));
        }
        files.sort();

        match &self.schema_file {
            Some(schema) if schema.is_file() => files.push(schema.clone()),
            Some(schema) => log::warn!("Schema {} not found; generating without it", schema.display()),
            None => {}
        }

        let mut context = String::new();
        for path in files {
            let content = fs::read_to_string(&path).map_err(|source| DefinitionGenerateError::ReadContext {
                path: path.clone(),
                source,
            })?;
            context.push_str(&format!("Example for {}:\n{}\n", example_name(&path), content));
        }
        Ok(context)
    }

    /// Role method: definition.generate
    ///
    /// Writes the code to `<output_dir>/<file_name>`. A response without a
    /// fenced block writes nothing.
    pub fn generate(&self, entry: &DefinitionEntry, output_dir: &Path) -> Result<GeneratedFile, DefinitionGenerateError> {
        let relative = sanitize_relative_path(&entry.file_name, "");
        if relative.is_empty() {
            return Err(DefinitionGenerateError::InvalidFileName(entry.file_name.clone()));
        }

        let context = self.context_for(entry.kind)?;
        log::info!("Generating {} from the '{}' definition", entry.file_name, entry.kind);
        let response = self
            .runner
            .ask(prompt_for(entry.kind), &context, &json!({ "definition": entry.render() }))?;
        let code = self
            .parser
            .code_only(&response)
            .ok_or_else(|| DefinitionGenerateError::MalformedResponse(entry.file_name.clone()))?;

        let path = self.writer.write(&output_dir.join(relative), &code)?;
        Ok(GeneratedFile { path, code, lint: None })
    }

    /// Like [`Self::generate`], then runs the file through `fixer`.
    pub fn generate_and_verify<L>(
        &self,
        entry: &DefinitionEntry,
        output_dir: &Path,
        fixer: &LintFixLoop<'_, P, R, L>,
        budget: usize,
    ) -> Result<GeneratedFile, DefinitionGenerateError>
    where
        L: LintRunner,
    {
        let mut file = self.generate(entry, output_dir)?;
        let outcome = fixer.run(&file.path, &file.code, budget)?;
        file.code = outcome.code.clone();
        file.lint = Some(outcome);
        Ok(file)
    }
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>, DefinitionGenerateError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let read_err = |source| DefinitionGenerateError::ReadContext {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

/// `case-route.ts` becomes `CASE-ROUTE`.
fn example_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_uppercase())
        .unwrap_or_default()
}
