use std::collections::BTreeMap;

const PATH_MARKER: &str = "./";

/// Linter output grouped by file.
///
/// A line starting with `./` opens a group for that path, following lines
/// belong to it, and a blank line closes it. Anything outside a group is
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LintDiagnostics {
    groups: BTreeMap<String, Vec<String>>,
}

impl LintDiagnostics {
    pub fn parse(raw: &str) -> Self {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut current: Option<String> = None;

        for line in raw.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                current = None;
                continue;
            }
            if trimmed.starts_with(PATH_MARKER) {
                let key = normalize_lint_path(trimmed);
                groups.entry(key.clone()).or_default();
                current = Some(key);
                continue;
            }
            if let Some(key) = &current {
                groups.entry(key.clone()).or_default().push(trimmed.to_string());
            }
        }

        Self { groups }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(|k| k.as_str())
    }

    /// Diagnostic lines for `path`, matched exactly or by path suffix so
    /// that monorepo package-relative paths still line up.
    pub fn for_path(&self, path: &str) -> Option<&[String]> {
        let wanted = normalize_lint_path(path);
        if let Some(lines) = self.groups.get(&wanted) {
            return Some(lines.as_slice());
        }
        self.groups
            .iter()
            .find(|(key, _)| {
                wanted.ends_with(&format!("/{}", key)) || key.ends_with(&format!("/{}", wanted))
            })
            .map(|(_, lines)| lines.as_slice())
    }

    /// The group for `path` rendered back in linter layout.
    pub fn render_for(&self, path: &str) -> Option<String> {
        let lines = self.for_path(path)?;
        let mut out = format!("{}{}", PATH_MARKER, normalize_lint_path(path));
        for line in lines {
            out.push('\n');
            out.push_str(line);
        }
        Some(out)
    }
}

/// Forward slashes, no leading `./`, no surrounding whitespace.
pub fn normalize_lint_path(path: &str) -> String {
    let p = path.trim().replace('\\', "/");
    p.strip_prefix(PATH_MARKER).unwrap_or(&p).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
> web@0.1.0 lint
> next lint

./app/(protected)/users/page.tsx
12:7  Error: 'x' is assigned a value but never used.  no-unused-vars
20:1  Warning: Missing return type.

./app/api/user/route.ts
3:10  Error: 'z' is defined but never used.

info  - Need to disable some ESLint rules?
";

    #[test]
    fn test_groups_by_path_marker() {
        let diags = LintDiagnostics::parse(SAMPLE);
        let paths: Vec<&str> = diags.paths().collect();
        assert_eq!(paths, vec!["app/(protected)/users/page.tsx", "app/api/user/route.ts"]);

        let lines = diags.for_path("./app/(protected)/users/page.tsx").expect("group");
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("12:7"));
    }

    #[test]
    fn test_blank_line_ends_group() {
        let diags = LintDiagnostics::parse(SAMPLE);
        let lines = diags.for_path("app/api/user/route.ts").expect("group");
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn test_suffix_match() {
        let diags = LintDiagnostics::parse(SAMPLE);
        assert!(diags.for_path("apps/web/app/api/user/route.ts").is_some());
        assert!(diags.for_path("app/api/other/route.ts").is_none());
    }

    #[test]
    fn test_clean_output_has_no_groups() {
        let diags = LintDiagnostics::parse("✔ No ESLint warnings or errors\n");
        assert!(diags.is_empty());
    }

    #[test]
    fn test_render_for() {
        let diags = LintDiagnostics::parse(SAMPLE);
        let rendered = diags.render_for("app/api/user/route.ts").expect("rendered");
        assert_eq!(rendered, "./app/api/user/route.ts\n3:10  Error: 'z' is defined but never used.");
    }
}
