use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three slots the assistant fills before generation can start.
///
/// The declaration order is the precedence order used when probing the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementField {
    Model,
    Fields,
    FolderLocation,
}

impl RequirementField {
    pub const PRECEDENCE: [RequirementField; 3] = [
        RequirementField::Model,
        RequirementField::Fields,
        RequirementField::FolderLocation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementField::Model => "model",
            RequirementField::Fields => "fields",
            RequirementField::FolderLocation => "folder_location",
        }
    }
}

impl fmt::Display for RequirementField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequirementField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "model" => Ok(RequirementField::Model),
            "fields" => Ok(RequirementField::Fields),
            "folder_location" => Ok(RequirementField::FolderLocation),
            other => Err(format!(
                "unknown requirement '{}' (expected model, fields, or folder_location)",
                other
            )),
        }
    }
}

/// Requirements gathered from the conversation.
///
/// Only the tool dispatcher writes to this record; everything else reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementsRecord {
    pub model: String,
    pub fields: Vec<String>,
    pub folder_location: String,
}

impl RequirementsRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_filled(&self, field: RequirementField) -> bool {
        match field {
            RequirementField::Model => !self.model.is_empty(),
            RequirementField::Fields => !self.fields.is_empty(),
            RequirementField::FolderLocation => !self.folder_location.is_empty(),
        }
    }

    pub fn is_complete(&self) -> bool {
        RequirementField::PRECEDENCE
            .iter()
            .all(|field| self.is_filled(*field))
    }

    /// First unfilled slot in precedence order.
    pub fn next_missing(&self) -> Option<RequirementField> {
        RequirementField::PRECEDENCE
            .iter()
            .copied()
            .find(|field| !self.is_filled(*field))
    }

    /// Stores a raw tool value into the named slot.
    ///
    /// `fields` is comma-split without trimming; every other slot is a plain
    /// overwrite.
    pub fn apply(&mut self, field: RequirementField, value: &str) {
        match field {
            RequirementField::Model => self.model = value.to_string(),
            RequirementField::Fields => {
                self.fields = if value.is_empty() {
                    Vec::new()
                } else {
                    value.split(',').map(|s| s.to_string()).collect()
                };
            }
            RequirementField::FolderLocation => self.folder_location = value.to_string(),
        }
    }

    /// Field list joined one per line, as the generation prompt expects.
    pub fn fields_newline(&self) -> String {
        self.fields.join("\n")
    }
}
