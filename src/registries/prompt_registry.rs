use crate::contexts::{prompts, PopulateError, PromptRegistry};
use std::fs;
use std::path::PathBuf;

const REQUIREMENTS_AGENT: &str = "You are a systems analyst. Your task is to collect the following information:
1. model: [model or entity name]
2. fields: [fields of the model]
3. folder_location: [folder location of the project]

Ask only one question at a time with missing information in proper order.
Whenever the user answers one of these, call update_requirement with the requirement name and the answer.
Fields are passed as a single comma-separated list without spaces.
Call get_requirements when the user asks what has been collected so far.

Below is the information you already know:
model: '{{input.model}}'
fields: '{{input.fields}}'
folder_location: '{{input.folder_location}}'
";

const PROBE_NEXT_QUESTION: &str = "You are a systems analyst. Your task is to ask for the following information:
1. model: [model or entity name]
2. fields: [fields of the model]
3. folder_location: [folder location of the project]

Below is the information you know:
model: '{{input.model}}'
fields: '{{input.fields}}'
folder_location: '{{input.folder_location}}'

Ask about: {{input.next_field}}
Ask exactly one question with missing information in proper order. Respond with the question only.
";

const GENERATE_FROM_BOILERPLATE: &str = "Generate {{input.count}} source code files using next.js and prisma
based on the {{input.count}} boilerplate files given in the context.
Follow the boilerplate markers to generate the multiple code files, in the same order.

Replace the table name of the boilerplate with {{input.model}}.

Replace the fields of the boilerplate to include the new fields below:
{{input.fields_newline}}

Respond immediately in the following format, once per file:
Filename: [filename]
Code: ```tsx
[code]
```
";

const EXTRACT_LINT_ERRORS: &str = "Get the corresponding lint warnings/errors for the file in {{input.file_path}} in the given lint results.

Strictly respond using the following format only:
Errors: [insert actual errors here]
However, if there are no errors/warnings, strictly respond with \"No errors found.\"
";

const FIX_LINT_ERRORS: &str = "Fix the errors/warnings: {{input.errors}} in the given code.

Strictly respond with the complete fixed code in a single fenced code block. No other text is needed.
";

const EDIT_CODE: &str = "Modify the given code based on the following instructions: {{input.instruction}}

Strictly respond with the complete modified code in a single fenced code block. No other text is needed.
";

const COMMIT_MESSAGE: &str = "Write a commit message for the actions listed in the context.

Choose only one of the following commit types:
- feat: a new feature
- fix: a bug fix
- chore: other changes that don't modify src or test files
- docs: documentation only changes
- style: changes that do not affect the meaning of the code
- refactor: a code change that neither fixes a bug nor adds a feature
- perf: a code change that improves performance
- test: adding missing tests or correcting existing tests
- build: changes that affect the build system or external dependencies
- revert: reverts a previous commit

Strictly respond with the format commit type: commit summary only. No other text is needed.
";

const GENERATE_PRISMA_SCHEMA: &str = "You are editing a Prisma schema. Use the examples and the current schema in the context.
Edit the existing schema rather than overwriting it, keeping every model that is already there.

Generate code based on the following definition file:
{{input.definition}}

Strictly respond with the complete code in a single fenced code block. No other text is needed.
";

const GENERATE_API_ROUTE: &str = "You are creating an API route in NextJS. Use the examples and the Prisma schema in the context.

Generate code based on the following definition file:
{{input.definition}}

Strictly respond with the complete code in a single fenced code block. No other text is needed.
";

const GENERATE_API_ROUTE_FILTERS: &str = "You are creating an API route with specific filters used for fetching data in NextJS. Use the examples and the Prisma schema in the context.
Besides the GET method, include the POST, PATCH and DELETE methods.

Generate code based on the following definition file:
{{input.definition}}

Strictly respond with the complete code in a single fenced code block. No other text is needed.
";

const GENERATE_TABLE_UI: &str = "You are creating a table component in NextJS. Use the examples and the Prisma schema in the context.

Generate code based on the following definition file:
{{input.definition}}

Strictly respond with the complete code in a single fenced code block. No other text is needed.
";

const GENERATE_FORM_UI: &str = "You are creating a form in NextJS. Use the examples and the Prisma schema in the context.

Generate code based on the following definition file:
{{input.definition}}

Strictly respond with the complete code in a single fenced code block. No other text is needed.
";

/// Templates compiled into the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinPrompts;

impl BuiltinPrompts {
    pub fn template(prompt_name: &str) -> Option<&'static str> {
        match prompt_name {
            prompts::REQUIREMENTS_AGENT => Some(REQUIREMENTS_AGENT),
            prompts::PROBE_NEXT_QUESTION => Some(PROBE_NEXT_QUESTION),
            prompts::GENERATE_FROM_BOILERPLATE => Some(GENERATE_FROM_BOILERPLATE),
            prompts::EXTRACT_LINT_ERRORS => Some(EXTRACT_LINT_ERRORS),
            prompts::FIX_LINT_ERRORS => Some(FIX_LINT_ERRORS),
            prompts::EDIT_CODE => Some(EDIT_CODE),
            prompts::COMMIT_MESSAGE => Some(COMMIT_MESSAGE),
            prompts::GENERATE_PRISMA_SCHEMA => Some(GENERATE_PRISMA_SCHEMA),
            prompts::GENERATE_API_ROUTE => Some(GENERATE_API_ROUTE),
            prompts::GENERATE_API_ROUTE_FILTERS => Some(GENERATE_API_ROUTE_FILTERS),
            prompts::GENERATE_TABLE_UI => Some(GENERATE_TABLE_UI),
            prompts::GENERATE_FORM_UI => Some(GENERATE_FORM_UI),
            _ => None,
        }
    }
}

impl PromptRegistry for BuiltinPrompts {
    fn get_template(&self, prompt_name: &str) -> Result<String, PopulateError> {
        Self::template(prompt_name)
            .map(str::to_string)
            .ok_or_else(|| PopulateError::PromptNotFound(prompt_name.to_string()))
    }
}

/// File-based implementation of PromptRegistry
/// Reads `<prompts_dir>/<name>.yml` and falls back to the built-in template
#[derive(Clone)]
pub struct FilePromptRegistry {
    prompts_dir: PathBuf,
}

impl FilePromptRegistry {
    /// Creates a new FilePromptRegistry
    ///
    /// # Arguments
    /// * `prompts_dir` - Optional path to prompts directory (defaults to "prompts")
    pub fn new(prompts_dir: Option<PathBuf>) -> Self {
        Self {
            prompts_dir: prompts_dir.unwrap_or_else(|| PathBuf::from("prompts")),
        }
    }
}

impl PromptRegistry for FilePromptRegistry {
    fn get_template(&self, prompt_name: &str) -> Result<String, PopulateError> {
        let prompt_path = self.prompts_dir.join(format!("{}.yml", prompt_name));

        if !prompt_path.exists() {
            return BuiltinPrompts.get_template(prompt_name);
        }

        log::debug!("Using prompt override {}", prompt_path.display());
        fs::read_to_string(&prompt_path)
            .map_err(|e| {
                PopulateError::InvalidTemplate(format!(
                    "Failed to read prompt {}: {}",
                    prompt_path.display(),
                    e
                ))
            })
            .and_then(|content| extract_template(&content))
    }
}

/// Extracts the template field from a YAML prompt file
fn extract_template(yaml_content: &str) -> Result<String, PopulateError> {
    use yaml_rust::YamlLoader;

    let docs = YamlLoader::load_from_str(yaml_content)
        .map_err(|e| PopulateError::InvalidTemplate(format!("Invalid YAML: {}", e)))?;

    let Some(doc) = docs.first() else {
        return Err(PopulateError::InvalidTemplate("Empty YAML document".to_string()));
    };

    doc["template"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| PopulateError::InvalidTemplate("No template field found in prompt file".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_every_prompt_has_builtin() {
        for name in prompts::ALL {
            assert!(BuiltinPrompts.get_template(name).is_ok(), "missing {}", name);
        }
        assert!(matches!(
            BuiltinPrompts.get_template("nope"),
            Err(PopulateError::PromptNotFound(_))
        ));
    }

    #[test]
    fn test_extract_template() {
        let yaml = r#"
description: Shorter probe
template: |
  Ask about {{input.next_field}}.
  One question only.
"#;

        let template = extract_template(yaml).unwrap();
        assert!(template.starts_with("Ask about {{input.next_field}}."));
    }

    #[test]
    fn test_extract_template_missing() {
        let yaml = r#"
description: no template here
"#;
        assert!(extract_template(yaml).is_err());
    }

    #[test]
    fn test_file_override_and_fallback() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("commit_message.yml"),
            "template: \"Summarise: {{input.count}}\"\n",
        )
        .unwrap();

        let registry = FilePromptRegistry::new(Some(dir.path().to_path_buf()));
        assert_eq!(registry.get_template(prompts::COMMIT_MESSAGE).unwrap(), "Summarise: {{input.count}}");
        assert_eq!(
            registry.get_template(prompts::EDIT_CODE).unwrap(),
            BuiltinPrompts.get_template(prompts::EDIT_CODE).unwrap()
        );
    }
}
