use serde_json::json;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::contexts::artifact_writer::{ArtifactWriter, WriteError};
use crate::contexts::lint_fix::{LintFixError, LintFixLoop, LintFixOutcome};
use crate::contexts::output_parser::{MarkerParser, ResponseParser, SkippedSegment};
use crate::contexts::prompt_runner::{prompts, PromptError, PromptRegistry, PromptRunner};
use crate::data::{CompletionPort, LintRunner, RequirementField, RequirementsRecord};

const BOILERPLATE_DUMP: &str = "boilerplate.txt";

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("requirements are incomplete: {0} is missing")]
    Incomplete(RequirementField),
    #[error("no boilerplate files found in {0}")]
    NoBoilerplate(PathBuf),
    #[error("failed to read boilerplate {path}: {source}")]
    ReadBoilerplate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error(transparent)]
    LintFix(#[from] LintFixError),
}

/// An example file the completion port adapts to the requested model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boilerplate {
    /// Path as shown to the model, e.g. `templates/app/cases/add-case.tsx`.
    pub label: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub code: String,
    /// Set once the file has been through the lint-fix loop.
    pub lint: Option<LintFixOutcome>,
}

impl GeneratedFile {
    pub fn verified(&self) -> Option<bool> {
        self.lint.as_ref().map(|outcome| outcome.verified)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    /// Number of boilerplate files sent, i.e. artifacts expected back.
    pub expected: usize,
    pub files: Vec<GeneratedFile>,
    pub skipped: Vec<SkippedSegment>,
}

impl GenerationReport {
    /// Artifacts missing compared to the boilerplate count.
    pub fn shortfall(&self) -> usize {
        self.expected.saturating_sub(self.files.len())
    }

    pub fn is_degraded(&self) -> bool {
        self.shortfall() > 0 || !self.skipped.is_empty()
    }

    pub fn unverified(&self) -> impl Iterator<Item = &GeneratedFile> {
        self.files.iter().filter(|f| f.verified() == Some(false))
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }
}

/// Directory the boilerplate labels are relative to, and the label prefix.
///
/// The root is the nearest ancestor of `dir` (itself included) whose trailing
/// components spell `template_prefix`, so a nested boilerplate dir such as
/// `templates/app/(protected)/cases` keeps its route subtree in the labels.
/// Without a match the labels start at `dir`'s own name.
pub fn label_root(dir: &Path, template_prefix: &str) -> (PathBuf, String) {
    let wanted: Vec<&str> = template_prefix
        .split('/')
        .filter(|part| !part.is_empty())
        .collect();

    if !wanted.is_empty() {
        for ancestor in dir.ancestors() {
            let tail: Vec<String> = ancestor
                .components()
                .rev()
                .take(wanted.len())
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect();
            if tail.len() == wanted.len() && tail.iter().rev().zip(&wanted).all(|(a, b)| a.as_str() == *b) {
                return (ancestor.to_path_buf(), wanted.join("/"));
            }
        }
        log::debug!(
            "No '{}' ancestor for {}; labelling from the directory itself",
            template_prefix,
            dir.display()
        );
    }
    (dir.to_path_buf(), dir_label(dir))
}

/// Reads every file under `dir`, recursively, in path order.
///
/// Labels are rooted as [`label_root`] describes, so they match the prefix
/// stripped from the paths the model echoes back.
pub fn load_boilerplates(dir: &Path, template_prefix: &str) -> Result<Vec<Boilerplate>, GenerateError> {
    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    files.sort();

    let (root, label_prefix) = label_root(dir, template_prefix);
    files
        .into_iter()
        .map(|path| {
            let content = fs::read_to_string(&path).map_err(|source| GenerateError::ReadBoilerplate {
                path: path.clone(),
                source,
            })?;
            let relative = path.strip_prefix(&root).unwrap_or(&path);
            let relative = relative.to_string_lossy().replace('\\', "/");
            let label = if label_prefix.is_empty() {
                relative
            } else {
                format!("{}/{}", label_prefix, relative)
            };
            Ok(Boilerplate { label, content })
        })
        .collect()
}

fn dir_label(dir: &Path) -> String {
    dir.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn collect_files(current_dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), GenerateError> {
    if !current_dir.is_dir() {
        return Ok(());
    }

    let entries = fs::read_dir(current_dir).map_err(|source| GenerateError::ReadBoilerplate {
        path: current_dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let path = entry
            .map_err(|source| GenerateError::ReadBoilerplate {
                path: current_dir.to_path_buf(),
                source,
            })?
            .path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

/// Concatenates boilerplates between numbered start/end markers.
pub fn assemble_boilerplate(boilerplates: &[Boilerplate]) -> String {
    let mut out = String::new();
    for (index, boilerplate) in boilerplates.iter().enumerate() {
        let k = index + 1;
        out.push_str(&format!("Start of Boilerplate #{}: {}\n", k, boilerplate.label));
        out.push_str(&boilerplate.content);
        if !boilerplate.content.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&format!("End of Boilerplate #{}: {}\n\n", k, boilerplate.label));
    }
    out
}

/// Code Generation context: one completion call for all boilerplates, then
/// one written file per parsed artifact.
pub struct CodeGenerator<'a, P, R>
where
    P: CompletionPort,
    R: PromptRegistry,
{
    runner: &'a PromptRunner<P, R>,
    boilerplate_dir: PathBuf,
    template_prefix: String,
    debug_dir: Option<PathBuf>,
    writer: ArtifactWriter,
    parser: Box<dyn ResponseParser + 'a>,
}

impl<'a, P, R> CodeGenerator<'a, P, R>
where
    P: CompletionPort,
    R: PromptRegistry,
{
    pub fn new(runner: &'a PromptRunner<P, R>, boilerplate_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            boilerplate_dir: boilerplate_dir.into(),
            template_prefix: String::new(),
            debug_dir: None,
            writer: ArtifactWriter::default(),
            parser: Box::new(MarkerParser::new()),
        }
    }

    /// Names the template root; stripped from the paths the model echoes back.
    pub fn with_template_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.template_prefix = prefix.into();
        self
    }

    /// Dumps the assembled boilerplate to `<dir>/boilerplate.txt`.
    pub fn with_debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = Some(dir.into());
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

    /// Role method: generator.generate
    ///
    /// Fewer artifacts than boilerplates is reported through
    /// [`GenerationReport::shortfall`], not as an error.
    pub fn generate(&self, requirements: &RequirementsRecord) -> Result<GenerationReport, GenerateError> {
        if let Some(missing) = requirements.next_missing() {
            return Err(GenerateError::Incomplete(missing));
        }

        let boilerplates = load_boilerplates(&self.boilerplate_dir, &self.template_prefix)?;
        if boilerplates.is_empty() {
            return Err(GenerateError::NoBoilerplate(self.boilerplate_dir.clone()));
        }
        let assembled = assemble_boilerplate(&boilerplates);
        self.dump_boilerplate(&assembled);

        log::info!(
            "Generating {} file(s) for {} from {}",
            boilerplates.len(),
            requirements.model,
            self.boilerplate_dir.display()
        );
        let input = json!({
            "count": boilerplates.len(),
            "model": requirements.model,
            "fields_newline": requirements.fields_newline(),
        });
        let response = self
            .runner
            .ask(prompts::GENERATE_FROM_BOILERPLATE, &assembled, &input)?;

        let (_, label_prefix) = label_root(&self.boilerplate_dir, &self.template_prefix);
        let split = self.parser.split_artifacts(&response, &format!("{}/", label_prefix));
        let folder = Path::new(&requirements.folder_location);
        let mut report = GenerationReport {
            expected: boilerplates.len(),
            files: Vec::with_capacity(split.artifacts.len()),
            skipped: split.skipped,
        };

        for artifact in split.artifacts {
            let path = self.writer.write(&artifact.resolve(folder), &artifact.source_text)?;
            report.files.push(GeneratedFile {
                path,
                code: artifact.source_text,
                lint: None,
            });
        }

        if report.shortfall() > 0 {
            log::warn!(
                "Expected {} file(s) but the response contained {}",
                report.expected,
                report.files.len()
            );
        }
        Ok(report)
    }

    /// Runs every generated file through `fixer`, updating code and status.
    pub fn verify<L>(&self, report: &mut GenerationReport, fixer: &LintFixLoop<'_, P, R, L>, budget: usize) -> Result<(), GenerateError>
    where
        L: LintRunner,
    {
        for file in &mut report.files {
            let outcome = fixer.run(&file.path, &file.code, budget)?;
            file.code = outcome.code.clone();
            file.lint = Some(outcome);
        }
        Ok(())
    }

    fn dump_boilerplate(&self, assembled: &str) {
        let Some(dir) = &self.debug_dir else {
            return;
        };
        if self.writer.is_dry_run() {
            log::debug!("[dry-run] would write {}", dir.join(BOILERPLATE_DUMP).display());
            return;
        }
        let target = dir.join(BOILERPLATE_DUMP);
        if let Err(e) = fs::create_dir_all(dir).and_then(|_| fs::write(&target, assembled)) {
            log::warn!("Failed to write {}: {}", target.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contexts::testing::{FixedLint, ScriptedCompletion};
    use crate::registries::BuiltinPrompts;
    use tempfile::{tempdir, TempDir};

    fn seed_boilerplate() -> TempDir {
        let dir = tempdir().unwrap();
        let cases = dir.path().join("templates/app/(protected)/cases");
        fs::create_dir_all(&cases).unwrap();
        fs::write(cases.join("add-case.tsx"), "export function AddCase() {}\n").unwrap();
        fs::write(cases.join("case-page.tsx"), "export default function CasePage() {}\n").unwrap();
        dir
    }

    fn record(folder: &Path) -> RequirementsRecord {
        let mut record = RequirementsRecord::new();
        record.apply(RequirementField::Model, "User");
        record.apply(RequirementField::Fields, "id,name,email");
        record.apply(RequirementField::FolderLocation, &folder.to_string_lossy());
        record
    }

    const TWO_FILES: &str = "Filename: templates/app/(protected)/cases/add-user.tsx\n\
Code: ```tsx\nexport function AddUser() {}\n```\n\
Filename: templates/app/(protected)/cases/user-page.tsx\n\
Code: ```tsx\nexport default function UserPage() {}\n```\n";

    #[test]
    fn test_assemble_boilerplate_markers() {
        let assembled = assemble_boilerplate(&[
            Boilerplate { label: "t/a.ts".to_string(), content: "a".to_string() },
            Boilerplate { label: "t/b.ts".to_string(), content: "b\n".to_string() },
        ]);
        assert_eq!(
            assembled,
            "Start of Boilerplate #1: t/a.ts\na\nEnd of Boilerplate #1: t/a.ts\n\n\
Start of Boilerplate #2: t/b.ts\nb\nEnd of Boilerplate #2: t/b.ts\n\n"
        );
    }

    #[test]
    fn test_load_boilerplates_recursive_and_sorted() {
        let dir = seed_boilerplate();
        fs::write(dir.path().join("templates/zz.ts"), "z").unwrap();

        let loaded = load_boilerplates(&dir.path().join("templates"), "templates/").unwrap();
        let labels: Vec<&str> = loaded.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "templates/app/(protected)/cases/add-case.tsx",
                "templates/app/(protected)/cases/case-page.tsx",
                "templates/zz.ts",
            ]
        );
    }

    #[test]
    fn test_label_root_finds_prefix_ancestor() {
        let dir = seed_boilerplate();
        let nested = dir.path().join("templates/app/(protected)/cases");

        let (root, prefix) = label_root(&nested, "templates/");
        assert_eq!(root, dir.path().join("templates"));
        assert_eq!(prefix, "templates");

        let (root, prefix) = label_root(&nested, "");
        assert_eq!(root, nested);
        assert_eq!(prefix, "cases");

        let (root, prefix) = label_root(&nested, "elsewhere/");
        assert_eq!(root, nested);
        assert_eq!(prefix, "cases");
    }

    #[test]
    fn test_nested_boilerplate_dir_keeps_route_subtree() {
        let dir = seed_boilerplate();
        let nested = dir.path().join("templates/app/(protected)/cases");
        let loaded = load_boilerplates(&nested, "templates/").unwrap();
        assert_eq!(loaded[0].label, "templates/app/(protected)/cases/add-case.tsx");

        let out = dir.path().join("out");
        let port = ScriptedCompletion::new([TWO_FILES]);
        let runner = PromptRunner::new(&port, BuiltinPrompts);
        let report = CodeGenerator::new(&runner, &nested)
            .with_template_prefix("templates/")
            .generate(&record(&out))
            .unwrap();

        assert!(report.skipped.is_empty());
        assert_eq!(report.files[0].path, out.join("app/(protected)/cases/add-user.tsx"));
        assert!(out.join("app/(protected)/cases/add-user.tsx").is_file());

        let calls = port.calls.borrow();
        assert!(calls[0].0.contains("Start of Boilerplate #1: templates/app/(protected)/cases/add-case.tsx"));
    }

    #[test]
    fn test_dry_run_skips_boilerplate_dump() {
        let dir = seed_boilerplate();
        let out = dir.path().join("out");
        let port = ScriptedCompletion::new([TWO_FILES]);
        let runner = PromptRunner::new(&port, BuiltinPrompts);

        let report = CodeGenerator::new(&runner, dir.path().join("templates"))
            .with_template_prefix("templates/")
            .with_debug_dir(dir.path().join("debug"))
            .with_writer(ArtifactWriter::new(true))
            .generate(&record(&out))
            .unwrap();

        assert_eq!(report.files.len(), 2);
        assert!(!out.exists());
        assert!(!dir.path().join("debug").exists());
    }

    #[test]
    fn test_generate_writes_each_artifact_once() {
        let dir = seed_boilerplate();
        let out = dir.path().join("out");
        let port = ScriptedCompletion::new([TWO_FILES]);
        let runner = PromptRunner::new(&port, BuiltinPrompts);

        let report = CodeGenerator::new(&runner, dir.path().join("templates"))
            .with_template_prefix("templates/")
            .with_debug_dir(dir.path().join("debug"))
            .generate(&record(&out))
            .unwrap();

        assert_eq!(port.call_count(), 1);
        assert_eq!(report.expected, 2);
        assert_eq!(report.shortfall(), 0);
        assert_eq!(
            report.paths(),
            vec![
                out.join("app/(protected)/cases/add-user.tsx"),
                out.join("app/(protected)/cases/page.tsx"),
            ]
        );
        assert_eq!(
            fs::read_to_string(out.join("app/(protected)/cases/page.tsx")).unwrap(),
            "export default function UserPage() {}"
        );

        let calls = port.calls.borrow();
        let (context, question) = &calls[0];
        assert!(context.contains("Start of Boilerplate #1:"));
        assert!(context.contains("End of Boilerplate #2:"));
        assert!(question.contains("Replace the table name of the boilerplate with User."));
        assert!(question.contains("id\nname\nemail"));

        let dump = fs::read_to_string(dir.path().join("debug/boilerplate.txt")).unwrap();
        assert_eq!(&dump, context);
    }

    #[test]
    fn test_short_response_is_degraded_not_fatal() {
        let dir = seed_boilerplate();
        let out = dir.path().join("out");
        let port = ScriptedCompletion::new([
            "Filename: templates/app/(protected)/cases/add-user.tsx\nCode: ```tsx\nx\n```",
        ]);
        let runner = PromptRunner::new(&port, BuiltinPrompts);

        let report = CodeGenerator::new(&runner, dir.path().join("templates"))
            .generate(&record(&out))
            .unwrap();

        assert_eq!(report.files.len(), 1);
        assert_eq!(report.shortfall(), 1);
        assert!(report.is_degraded());
    }

    #[test]
    fn test_incomplete_requirements_rejected_before_port() {
        let dir = seed_boilerplate();
        let port = ScriptedCompletion::new(["unused"]);
        let runner = PromptRunner::new(&port, BuiltinPrompts);
        let mut requirements = RequirementsRecord::new();
        requirements.apply(RequirementField::Model, "User");

        let err = CodeGenerator::new(&runner, dir.path().join("templates"))
            .generate(&requirements)
            .unwrap_err();

        assert!(matches!(err, GenerateError::Incomplete(RequirementField::Fields)));
        assert_eq!(port.call_count(), 0);
    }

    #[test]
    fn test_missing_boilerplate_dir() {
        let dir = tempdir().unwrap();
        let port = ScriptedCompletion::new(["unused"]);
        let runner = PromptRunner::new(&port, BuiltinPrompts);

        let err = CodeGenerator::new(&runner, dir.path().join("nope"))
            .generate(&record(dir.path()))
            .unwrap_err();
        assert!(matches!(err, GenerateError::NoBoilerplate(_)));
    }

    #[test]
    fn test_verify_routes_each_file_through_lint_fix() {
        let dir = seed_boilerplate();
        let out = dir.path().join("out");
        let port = ScriptedCompletion::new([TWO_FILES, "No errors found.", "Errors: bad", "```tsx\nfixed\n```"]);
        let runner = PromptRunner::new(&port, BuiltinPrompts);
        let lint = FixedLint::new("");
        let generator = CodeGenerator::new(&runner, dir.path().join("templates"));

        let mut report = generator.generate(&record(&out)).unwrap();
        let fixer = LintFixLoop::new(&runner, &lint, dir.path());
        generator.verify(&mut report, &fixer, 1).unwrap();

        assert_eq!(lint.runs(), 2);
        assert_eq!(report.files[0].verified(), Some(true));
        assert_eq!(report.files[1].verified(), Some(false));
        assert_eq!(report.files[1].code, "fixed");
        assert_eq!(report.unverified().count(), 1);
    }
}
