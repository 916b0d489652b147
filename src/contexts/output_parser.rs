//! Lexical contract between the assistant and free-form completion text.
//!
//! Responses are expected to carry either a `Filename:` / `Code:` pair with a
//! fenced block, one or more such groups, or a bare fenced block. Callers only
//! see the [`ResponseParser`] trait so the contract can be replaced without
//! touching them.

use regex::Regex;
use std::sync::OnceLock;

use crate::data::{sanitize_filename, CodeArtifact};

const FILENAME_MARKER: &str = "Filename: ";
const CODE_MARKER: &str = "Code:";
const LEAKED_FENCE_TAGS: [&str; 3] = ["tsx", "typescript", "```"];

/// A `Filename:` group that could not be turned into an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSegment {
    /// 1-based position of the group in the response.
    pub index: usize,
    pub reason: String,
}

/// Result of splitting a multi-file response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitArtifacts {
    pub artifacts: Vec<CodeArtifact>,
    pub skipped: Vec<SkippedSegment>,
}

pub trait ResponseParser {
    /// Extracts a sanitized file name and code body.
    ///
    /// `None` means the response did not follow the contract; it is not an error.
    fn filename_and_code(&self, response: &str) -> Option<(String, String)>;

    /// Extracts the interior of the first fenced block.
    fn code_only(&self, response: &str) -> Option<String>;

    /// Splits a response holding several `Filename:` / `Code:` groups.
    ///
    /// Malformed groups are skipped and reported; the rest of the batch survives.
    fn split_artifacts(&self, response: &str, template_prefix: &str) -> SplitArtifacts;
}

/// Regex implementation of the marker contract.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkerParser;

impl MarkerParser {
    pub fn new() -> Self {
        Self
    }
}

impl ResponseParser for MarkerParser {
    fn filename_and_code(&self, response: &str) -> Option<(String, String)> {
        let filename = filename_re()
            .captures(response)
            .and_then(|cap| cap.get(1))
            .map(|m| sanitize_filename(m.as_str()))?;
        let code = code_marker_re()
            .captures(response)
            .and_then(|cap| cap.get(1))
            .map(|m| strip_leaked_fence_tags(m.as_str()))?;

        if filename.is_empty() || code.is_empty() {
            return None;
        }
        Some((filename, code))
    }

    fn code_only(&self, response: &str) -> Option<String> {
        fenced_block_re()
            .captures(response)
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|code| !code.is_empty())
    }

    fn split_artifacts(&self, response: &str, template_prefix: &str) -> SplitArtifacts {
        let mut result = SplitArtifacts::default();

        // Text before the first marker is preamble, not a group.
        for (index, segment) in response.split(FILENAME_MARKER).enumerate().skip(1) {
            if segment.trim().is_empty() {
                continue;
            }

            let Some((head, body)) = segment.split_once(CODE_MARKER) else {
                log::warn!("Skipping response segment #{}: missing '{}' separator", index, CODE_MARKER);
                result.skipped.push(SkippedSegment {
                    index,
                    reason: format!("missing '{}' separator", CODE_MARKER),
                });
                continue;
            };

            let raw_path = head.lines().next().unwrap_or("").trim();
            let code = self
                .code_only(body)
                .unwrap_or_else(|| strip_leaked_fence_tags(body));

            if code.is_empty() {
                log::warn!("Skipping response segment #{} ({}): empty code", index, raw_path);
                result.skipped.push(SkippedSegment {
                    index,
                    reason: "empty code".to_string(),
                });
                continue;
            }

            match CodeArtifact::from_raw(raw_path, code, template_prefix) {
                Some(artifact) => result.artifacts.push(artifact),
                None => {
                    log::warn!("Skipping response segment #{}: unusable file name {:?}", index, raw_path);
                    result.skipped.push(SkippedSegment {
                        index,
                        reason: format!("unusable file name {:?}", raw_path),
                    });
                }
            }
        }

        result
    }
}

/// Trims the body and drops a fence tag line that leaked into it.
fn strip_leaked_fence_tags(body: &str) -> String {
    let mut text = body.trim();
    loop {
        let first_line = text.lines().next().unwrap_or("").trim();
        if !LEAKED_FENCE_TAGS.contains(&first_line) {
            break;
        }
        text = text[first_line.len()..].trim_start();
    }
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim().to_string()
}

fn filename_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Filename:\s*(.+)").expect("valid regex"))
}

fn code_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Code:\s*```([\s\S]*?)```").expect("valid regex"))
}

fn fenced_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"```[A-Za-z0-9_+\-]*[ \t]*\r?\n([\s\S]*?)```").expect("valid regex")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = "Filename: foo.tsx\nCode:```tsx\nconst x=1;\n```";

    #[test]
    fn test_filename_and_code_extraction() {
        let parser = MarkerParser::new();
        let (filename, code) = parser.filename_and_code(WELL_FORMED).expect("parsed");
        assert_eq!(filename, "foo.tsx");
        assert_eq!(code, "const x=1;");
    }

    #[test]
    fn test_reparse_is_idempotent() {
        let parser = MarkerParser::new();
        let first = parser.filename_and_code(WELL_FORMED);
        let second = parser.filename_and_code(WELL_FORMED);
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn test_filename_is_sanitized() {
        let parser = MarkerParser::new();
        let response = "Filename: ../../evil<>.tsx\nCode:\n```tsx\nx\n```";
        let (filename, _) = parser.filename_and_code(response).expect("parsed");
        assert_eq!(filename, "....evil.tsx");
        assert!(!filename.contains('/'));
    }

    #[test]
    fn test_typescript_tag_is_stripped() {
        let parser = MarkerParser::new();
        let response = "Filename: route.ts\nCode: ```typescript\nexport const GET = 1;\n```";
        let (_, code) = parser.filename_and_code(response).expect("parsed");
        assert_eq!(code, "export const GET = 1;");
    }

    #[test]
    fn test_missing_markers_yield_none() {
        let parser = MarkerParser::new();
        assert!(parser.filename_and_code("Code:```\nx\n```").is_none());
        assert!(parser.filename_and_code("Filename: a.ts\nno code here").is_none());
        assert!(parser.filename_and_code("").is_none());
    }

    #[test]
    fn test_code_only_with_and_without_tag() {
        let parser = MarkerParser::new();
        assert_eq!(
            parser.code_only("Here:\n```tsx\n  let a = 1;\n```\nthanks").as_deref(),
            Some("let a = 1;")
        );
        assert_eq!(parser.code_only("```\nplain\n```").as_deref(), Some("plain"));
        assert_eq!(parser.code_only("no fences at all"), None);
        assert_eq!(parser.code_only("```\n   \n```"), None);
    }

    #[test]
    fn test_split_two_groups_in_order() {
        let parser = MarkerParser::new();
        let response = "Sure, here they are.\n\
Filename: templates/app/(protected)/users/add-user.tsx\nCode: ```tsx\nexport const A = 1;\n```\n\n\
Filename: templates/app/(protected)/users/user-page.tsx\nCode: ```tsx\nexport default function Page() {}\n```\n";

        let split = parser.split_artifacts(response, "templates/");
        assert!(split.skipped.is_empty());
        assert_eq!(split.artifacts.len(), 2);
        assert_eq!(split.artifacts[0].relative_path, "app/(protected)/users/add-user.tsx");
        assert_eq!(split.artifacts[0].source_text, "export const A = 1;");
        assert_eq!(split.artifacts[1].relative_path, "app/(protected)/users/user-page.tsx");
    }

    #[test]
    fn test_split_skips_malformed_segment() {
        let parser = MarkerParser::new();
        let response = "Filename: a.ts\nno separator here\n\
Filename: b.ts\nCode: ```ts\nconst b = 2;\n```";

        let split = parser.split_artifacts(response, "");
        assert_eq!(split.artifacts.len(), 1);
        assert_eq!(split.artifacts[0].relative_path, "b.ts");
        assert_eq!(split.skipped.len(), 1);
        assert_eq!(split.skipped[0].index, 1);
    }

    #[test]
    fn test_split_accepts_unfenced_code() {
        let parser = MarkerParser::new();
        let split = parser.split_artifacts("Filename: c.ts\nCode: const c = 3;\n", "");
        assert_eq!(split.artifacts.len(), 1);
        assert_eq!(split.artifacts[0].source_text, "const c = 3;");
    }
}
