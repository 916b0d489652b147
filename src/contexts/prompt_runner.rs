use serde::Serialize;
use thiserror::Error;

use crate::data::{CompletionError, CompletionPort};

/// Prompt names known to the registry.
pub mod prompts {
    pub const REQUIREMENTS_AGENT: &str = "requirements_agent";
    pub const PROBE_NEXT_QUESTION: &str = "probe_next_question";
    pub const GENERATE_FROM_BOILERPLATE: &str = "generate_from_boilerplate";
    pub const EXTRACT_LINT_ERRORS: &str = "extract_lint_errors";
    pub const FIX_LINT_ERRORS: &str = "fix_lint_errors";
    pub const EDIT_CODE: &str = "edit_code";
    pub const COMMIT_MESSAGE: &str = "commit_message";
    pub const GENERATE_PRISMA_SCHEMA: &str = "generate_prisma_schema";
    pub const GENERATE_API_ROUTE: &str = "generate_api_route";
    pub const GENERATE_API_ROUTE_FILTERS: &str = "generate_api_route_filters";
    pub const GENERATE_TABLE_UI: &str = "generate_table_ui";
    pub const GENERATE_FORM_UI: &str = "generate_form_ui";

    pub const ALL: [&str; 12] = [
        REQUIREMENTS_AGENT,
        PROBE_NEXT_QUESTION,
        GENERATE_FROM_BOILERPLATE,
        EXTRACT_LINT_ERRORS,
        FIX_LINT_ERRORS,
        EDIT_CODE,
        COMMIT_MESSAGE,
        GENERATE_PRISMA_SCHEMA,
        GENERATE_API_ROUTE,
        GENERATE_API_ROUTE_FILTERS,
        GENERATE_TABLE_UI,
        GENERATE_FORM_UI,
    ];
}

/// Errors that can occur while populating a prompt template
#[derive(Debug, Error)]
pub enum PopulateError {
    #[error("Required placeholder '{0}' could not be resolved")]
    MissingMandatoryPlaceholder(String),
    #[error("Invalid path '{0}' in placeholder")]
    InvalidPlaceholderPath(String),
    #[error("Prompt '{0}' not found in registry")]
    PromptNotFound(String),
    #[error("Prompt template is invalid: {0}")]
    InvalidTemplate(String),
}

#[derive(Debug, Error)]
pub enum PromptError {
    #[error(transparent)]
    Populate(#[from] PopulateError),
    #[error(transparent)]
    Completion(#[from] CompletionError),
}

/// Trait for loading prompt templates by name
pub trait PromptRegistry {
    fn get_template(&self, prompt_name: &str) -> Result<String, PopulateError>;
}

impl<T: PromptRegistry + ?Sized> PromptRegistry for &T {
    fn get_template(&self, prompt_name: &str) -> Result<String, PopulateError> {
        (**self).get_template(prompt_name)
    }
}

/// Prompt Runner context: fills a named template and sends it to the completion port.
pub struct PromptRunner<P, R>
where
    P: CompletionPort,
    R: PromptRegistry,
{
    port: P,
    registry: R,
}

impl<P, R> PromptRunner<P, R>
where
    P: CompletionPort,
    R: PromptRegistry,
{
    pub fn new(port: P, registry: R) -> Self {
        Self { port, registry }
    }

    /// Role method: prompt.populate
    ///
    /// Loads the template for `prompt_name` and resolves its placeholders
    /// against `input`.
    pub fn populate<T: Serialize>(&self, prompt_name: &str, input: &T) -> Result<String, PopulateError> {
        let template = self.registry.get_template(prompt_name)?;
        let input_json = serde_json::to_value(input)
            .map_err(|e| PopulateError::InvalidTemplate(e.to_string()))?;
        replace_placeholders(&template, &input_json)
    }

    /// Role method: prompt.ask
    ///
    /// Populates the question template and asks it against `context`.
    pub fn ask<T: Serialize>(&self, prompt_name: &str, context: &str, input: &T) -> Result<String, PromptError> {
        let question = self.populate(prompt_name, input)?;
        log::debug!("Asking '{}' ({} chars of context)", prompt_name, context.len());
        let response = self.port.complete(context, &question)?;
        log::debug!("'{}' answered: {}", prompt_name, response);
        Ok(response)
    }
}

/// Replaces placeholders in a template
///
/// Supports:
/// - Mandatory: {{input.prop_name}}
/// - Optional: {{input.prop_name?}}
/// - Nested: {{input.prop1.prop2}}
pub fn replace_placeholders(template: &str, input_json: &serde_json::Value) -> Result<String, PopulateError> {
    let mut result = template.to_string();
    let mut offset = 0;

    while let Some(start) = result[offset..].find("{{") {
        let start = offset + start;
        let Some(end_pos) = result[start..].find("}}") else {
            break;
        };
        let end = start + end_pos;

        let placeholder = result[start + 2..end].trim().to_string();
        let (path, is_optional) = match placeholder.strip_suffix('?') {
            Some(path) => (path.to_string(), true),
            None => (placeholder, false),
        };

        match resolve_path(input_json, &path)? {
            Some(value) => {
                let replacement = match value {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Number(n) => n.to_string(),
                    serde_json::Value::Bool(b) => b.to_string(),
                    serde_json::Value::Null => String::new(),
                    other => serde_json::to_string(other)
                        .map_err(|e| PopulateError::InvalidTemplate(e.to_string()))?,
                };
                result.replace_range(start..end + 2, &replacement);
                offset = start + replacement.len();
            }
            None if is_optional => {
                result.replace_range(start..end + 2, "");
                offset = start;
            }
            None => return Err(PopulateError::MissingMandatoryPlaceholder(path)),
        }
    }

    Ok(result)
}

/// Resolves a dotted path such as `input.location.city`
fn resolve_path<'a>(value: &'a serde_json::Value, path: &str) -> Result<Option<&'a serde_json::Value>, PopulateError> {
    let parts: Vec<&str> = path.split('.').collect();
    if parts.is_empty() || parts[0] != "input" {
        return Err(PopulateError::InvalidPlaceholderPath(path.to_string()));
    }

    let mut current = value;
    for part in &parts[1..] {
        match current.get(part) {
            Some(v) => current = v,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}
