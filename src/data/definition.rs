use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// The sections of a definition file, one per kind of generated artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionKind {
    PrismaSchema,
    ApiRoute,
    ApiRouteFilters,
    TableUi,
    FormUi,
}

impl DefinitionKind {
    pub const ALL: [DefinitionKind; 5] = [
        DefinitionKind::PrismaSchema,
        DefinitionKind::ApiRoute,
        DefinitionKind::ApiRouteFilters,
        DefinitionKind::TableUi,
        DefinitionKind::FormUi,
    ];

    /// Key of this kind's section in the definition file.
    pub fn as_str(&self) -> &'static str {
        match self {
            DefinitionKind::PrismaSchema => "prisma_schema",
            DefinitionKind::ApiRoute => "api_route",
            DefinitionKind::ApiRouteFilters => "api_route_filters",
            DefinitionKind::TableUi => "table_ui",
            DefinitionKind::FormUi => "form_ui",
        }
    }

    /// Directory under the templates root holding this kind's examples.
    pub fn template_subpath(&self) -> &'static str {
        match self {
            DefinitionKind::PrismaSchema => "prisma-schemas",
            DefinitionKind::ApiRoute => "route",
            DefinitionKind::ApiRouteFilters => "route-filters",
            DefinitionKind::TableUi => "table-ui",
            DefinitionKind::FormUi => "forms",
        }
    }
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DefinitionKind {
    type Err = String;

    /// Accepts the section key or its dashed form (`api-route-filters`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().replace('-', "_");
        DefinitionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == key)
            .ok_or_else(|| {
                format!(
                    "unknown definition kind '{}' (expected prisma_schema, api_route, api_route_filters, table_ui, or form_ui)",
                    s.trim()
                )
            })
    }
}

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("failed to read definition file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse definition file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path} has no '{kind}' section")]
    MissingSection { path: PathBuf, kind: DefinitionKind },
    #[error("the '{0}' section has no file_name")]
    MissingFileName(DefinitionKind),
}

/// One section of the definition file.
///
/// Only `file_name` and `model_name` are interpreted; the whole section is
/// passed to the completion service as written.
#[derive(Debug, Clone, PartialEq)]
pub struct DefinitionEntry {
    pub kind: DefinitionKind,
    pub file_name: String,
    pub model_name: Option<String>,
    pub raw: Value,
}

impl DefinitionEntry {
    pub fn from_value(kind: DefinitionKind, raw: Value) -> Result<Self, DefinitionError> {
        let file_name = raw
            .get("file_name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(DefinitionError::MissingFileName(kind))?
            .to_string();
        let model_name = raw
            .get("model_name")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            kind,
            file_name,
            model_name,
            raw,
        })
    }

    /// The section as pretty JSON, as embedded in the generation question.
    pub fn render(&self) -> String {
        serde_json::to_string_pretty(&self.raw).unwrap_or_else(|_| self.raw.to_string())
    }
}

/// Reads the `kind` section of the JSON definition file at `path`.
pub fn load_definition(path: &Path, kind: DefinitionKind) -> Result<DefinitionEntry, DefinitionError> {
    let content = fs::read_to_string(path).map_err(|source| DefinitionError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut document: Value = serde_json::from_str(&content).map_err(|source| DefinitionError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let section = document
        .get_mut(kind.as_str())
        .map(Value::take)
        .filter(|section| !section.is_null())
        .ok_or_else(|| DefinitionError::MissingSection {
            path: path.to_path_buf(),
            kind,
        })?;
    DefinitionEntry::from_value(kind, section)
}
