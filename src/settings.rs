//! Runtime settings.
//!
//! Resolved in three layers: built-in defaults, then an optional YAML file
//! (`kevin.yml` or `--config <path>`), then `KEVIN_*` environment variables.
//! A `.env` file in the working directory is loaded before the environment
//! is read.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::contexts::{DEFAULT_ATTEMPTS, DEFAULT_MAX_STEPS};

pub const DEFAULT_CONFIG_FILE: &str = "kevin.yml";
const ENV_PREFIX: &str = "KEVIN_";
const API_KEY_FALLBACK: &str = "OPENAI_API_KEY";
const LINT_FIXES_DIR: &str = "lint_fixes";
const GENERATION_LOG_FILE: &str = "generation_log.json";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_base: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub request_timeout_secs: u64,
    /// Working directory for the lint command.
    pub project_dir: PathBuf,
    pub lint_command: String,
    pub boilerplate_dir: PathBuf,
    /// Names the template root. Boilerplate labels are relative to the
    /// nearest ancestor of `boilerplate_dir` matching it, and the prefix is
    /// stripped from paths echoed back by the model.
    pub template_prefix: String,
    /// Examples for definition-file generation live in per-kind
    /// subdirectories of this root.
    pub templates_root: PathBuf,
    pub definition_file: PathBuf,
    /// Prisma schema appended to the definition-file context, relative to
    /// `project_dir`. Skipped when missing.
    pub schema_file: PathBuf,
    pub prompts_dir: PathBuf,
    pub debug_dir: PathBuf,
    pub state_dir: PathBuf,
    pub lint_attempts: usize,
    pub max_agent_steps: usize,
    /// Push after committing.
    pub push: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o".to_string(),
            request_timeout_secs: 120,
            project_dir: PathBuf::from("."),
            lint_command: "pnpm lint".to_string(),
            boilerplate_dir: PathBuf::from("templates"),
            template_prefix: "templates/".to_string(),
            templates_root: PathBuf::from("templates"),
            definition_file: PathBuf::from("definition-file.json"),
            schema_file: PathBuf::from("packages/db-prisma/schema.prisma"),
            prompts_dir: PathBuf::from("prompts"),
            debug_dir: PathBuf::from("debug"),
            state_dir: PathBuf::from(".kevin"),
            lint_attempts: DEFAULT_ATTEMPTS,
            max_agent_steps: DEFAULT_MAX_STEPS,
            push: false,
        }
    }
}

impl Settings {
    /// Loads `.env`, the YAML file and the process environment.
    ///
    /// An explicit `config_path` must exist; the default file is optional.
    pub fn load(config_path: Option<&Path>) -> Result<Self, SettingsError> {
        if let Err(e) = dotenvy::dotenv() {
            log::debug!("No .env loaded: {}", e);
        }

        let mut settings = match config_path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Overlays `KEVIN_<FIELD>` variables read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = var("API_BASE") {
            self.api_base = v;
        }
        if let Some(v) = var("API_KEY").or_else(|| lookup(API_KEY_FALLBACK).filter(|v| !v.trim().is_empty())) {
            self.api_key = Some(v.trim().to_string());
        }
        if let Some(v) = var("MODEL") {
            self.model = v;
        }
        if let Some(v) = var("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_number("KEVIN_REQUEST_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = var("PROJECT_DIR") {
            self.project_dir = PathBuf::from(v);
        }
        if let Some(v) = var("LINT_COMMAND") {
            self.lint_command = v;
        }
        if let Some(v) = var("BOILERPLATE_DIR") {
            self.boilerplate_dir = PathBuf::from(v);
        }
        if let Some(v) = var("TEMPLATE_PREFIX") {
            self.template_prefix = v;
        }
        if let Some(v) = var("TEMPLATES_ROOT") {
            self.templates_root = PathBuf::from(v);
        }
        if let Some(v) = var("DEFINITION_FILE") {
            self.definition_file = PathBuf::from(v);
        }
        if let Some(v) = var("SCHEMA_FILE") {
            self.schema_file = PathBuf::from(v);
        }
        if let Some(v) = var("PROMPTS_DIR") {
            self.prompts_dir = PathBuf::from(v);
        }
        if let Some(v) = var("DEBUG_DIR") {
            self.debug_dir = PathBuf::from(v);
        }
        if let Some(v) = var("STATE_DIR") {
            self.state_dir = PathBuf::from(v);
        }
        if let Some(v) = var("LINT_ATTEMPTS") {
            self.lint_attempts = parse_number("KEVIN_LINT_ATTEMPTS", &v)?;
        }
        if let Some(v) = var("MAX_AGENT_STEPS") {
            self.max_agent_steps = parse_number("KEVIN_MAX_AGENT_STEPS", &v)?;
        }
        if let Some(v) = var("PUSH") {
            self.push = parse_bool("KEVIN_PUSH", &v)?;
        }
        Ok(())
    }

    pub fn lint_transcript_dir(&self) -> PathBuf {
        self.state_dir.join(LINT_FIXES_DIR)
    }

    pub fn schema_path(&self) -> PathBuf {
        self.project_dir.join(&self.schema_file)
    }

    pub fn generation_log_path(&self) -> PathBuf {
        self.state_dir.join(GENERATION_LOG_FILE)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, SettingsError> {
    value.parse().map_err(|_| SettingsError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, SettingsError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SettingsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}
