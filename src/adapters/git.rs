use std::path::{Path, PathBuf};
use std::process::Command;

use crate::data::{VcsError, VersionControl};

/// Commits through the `git` command line.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_dir: PathBuf,
    push: bool,
}

impl GitCli {
    pub fn new(repo_dir: impl Into<PathBuf>, push: bool) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            push,
        }
    }

    fn git(&self, args: &[String]) -> Result<String, VcsError> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_dir)
            .output()?;

        if !output.status.success() {
            return Err(VcsError::Command {
                command: args.first().cloned().unwrap_or_default(),
                details: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl VersionControl for GitCli {
    fn commit(&self, paths: &[PathBuf], message: &str) -> Result<(), VcsError> {
        if paths.is_empty() {
            return Err(VcsError::NothingToCommit);
        }

        let mut add = vec!["add".to_string(), "--".to_string()];
        add.extend(paths.iter().map(|p| relative_to(p, &self.repo_dir)));
        self.git(&add)?;

        self.git(&["commit".to_string(), "-m".to_string(), message.to_string()])?;
        log::info!("Committed {} file(s): {}", paths.len(), message);

        if self.push {
            self.git(&["push".to_string()])?;
            log::info!("Pushed");
        }
        Ok(())
    }
}

fn relative_to(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_nothing_to_commit() {
        let dir = tempdir().unwrap();
        let err = GitCli::new(dir.path(), false).commit(&[], "feat: x").unwrap_err();
        assert!(matches!(err, VcsError::NothingToCommit));
    }

    #[test]
    fn test_paths_are_made_repo_relative() {
        let base = Path::new("/work/repo");
        assert_eq!(relative_to(Path::new("/work/repo/app/page.tsx"), base), "app/page.tsx");
        assert_eq!(relative_to(Path::new("other/page.tsx"), base), "other/page.tsx");
    }

    #[test]
    fn test_outside_a_repository_fails() {
        if Command::new("git").arg("--version").output().is_err() {
            return;
        }
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.ts");
        std::fs::write(&file, "a").unwrap();

        let err = GitCli::new(dir.path(), false)
            .commit(&[file], "feat: add a")
            .unwrap_err();
        assert!(matches!(err, VcsError::Command { ref command, .. } if command == "add"));
    }
}
