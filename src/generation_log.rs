//! Generation log
//!
//! Stores a hash per written artifact plus the user instructions that led to
//! it under the state directory, so later commands (status, commit) can see
//! what the assistant touched.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Tracks a single written artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// SHA-256 of the content as written
    pub content_hash: String,
    /// Timestamp of last write
    pub timestamp: String,
    /// Lint verification result; `None` when the file was never linted
    pub verified: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationLog {
    /// Maps: artifact path -> record
    artifacts: BTreeMap<String, ArtifactRecord>,
    /// User instructions in the order they were given
    instructions: Vec<String>,
}

impl GenerationLog {
    /// Load the log from disk, or create a new one
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(GenerationLog::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read generation log {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse generation log {}", path.display()))
    }

    /// Save the log to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .context("Failed to serialize generation log")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write generation log {}", path.display()))?;
        Ok(())
    }

    /// Record a written artifact by hashing its current contents
    pub fn record(&mut self, artifact: &Path, verified: Option<bool>) -> Result<()> {
        let content_hash = Self::hash_file(artifact)?;
        let timestamp = chrono::Utc::now().to_rfc3339();

        self.artifacts.insert(
            Self::key(artifact),
            ArtifactRecord {
                content_hash,
                timestamp,
                verified,
            },
        );
        Ok(())
    }

    pub fn record_instruction(&mut self, instruction: impl Into<String>) {
        self.instructions.push(instruction.into());
    }

    pub fn instructions(&self) -> &[String] {
        &self.instructions
    }

    pub fn get(&self, artifact: &Path) -> Option<&ArtifactRecord> {
        self.artifacts.get(&Self::key(artifact))
    }

    /// Every artifact path recorded, in path order
    pub fn touched_files(&self) -> Vec<PathBuf> {
        self.artifacts.keys().map(PathBuf::from).collect()
    }

    /// True when the file is gone or differs from what was recorded
    pub fn changed_since_recorded(&self, artifact: &Path) -> Result<bool> {
        let Some(record) = self.get(artifact) else {
            return Ok(true);
        };
        if !artifact.exists() {
            return Ok(true);
        }
        Ok(Self::hash_file(artifact)? != record.content_hash)
    }

    /// Forget artifacts and instructions, typically after a commit.
    /// Returns number of artifact entries removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.artifacts.len();
        self.artifacts.clear();
        self.instructions.clear();
        removed
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty() && self.instructions.is_empty()
    }

    /// Get a summary of recorded artifacts
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        lines.push("Generation Log Summary:".to_string());

        if self.artifacts.is_empty() {
            lines.push("  No generated files".to_string());
        }
        for (path, record) in &self.artifacts {
            let status = match record.verified {
                Some(true) => "verified",
                Some(false) => "NOT fully verified",
                None => "not linted",
            };
            lines.push(format!("  {} [{}] (updated: {})", path, status, record.timestamp));
        }

        if !self.instructions.is_empty() {
            lines.push("\nInstructions:".to_string());
            for (i, instruction) in self.instructions.iter().enumerate() {
                lines.push(format!("  {}. {}", i + 1, instruction));
            }
        }

        lines.join("\n")
    }

    fn key(artifact: &Path) -> String {
        artifact.to_string_lossy().replace('\\', "/")
    }

    /// Compute SHA256 hash of a file
    fn hash_file(path: &Path) -> Result<String> {
        let content = fs::read(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;

        let mut hasher = Sha256::new();
        hasher.update(&content);
        Ok(hex::encode(hasher.finalize()))
    }
}
