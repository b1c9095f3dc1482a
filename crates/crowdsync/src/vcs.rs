//! Version-control collaborator.
//!
//! The engine only needs a handful of git operations and treats their output
//! as plain text. [`GitCli`] shells out to `git -C <root>`; tests substitute
//! an in-memory implementation of [`Vcs`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::process::Command;

use crate::descriptor::RepositoryDescriptor;

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("`git {command}` exited with {status}: {stderr}")]
    Command {
        command: String,
        status: i32,
        stderr: String,
    },
}

/// Operations the reconciliation engine performs on the working tree.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Working tree root.
    fn root(&self) -> &Path;

    /// Switch to `reference`.
    async fn checkout(&self, reference: &str) -> Result<(), VcsError>;

    /// Paths changed in `range` (`a..b`).
    async fn diff_names(&self, range: &str) -> Result<Vec<String>, VcsError>;

    /// Paths with uncommitted changes.
    async fn status_short(&self) -> Result<Vec<String>, VcsError>;

    /// Every path tracked at `reference`.
    async fn ls_tree(&self, reference: &str) -> Result<Vec<String>, VcsError>;

    async fn add(&self, paths: &[String]) -> Result<(), VcsError>;

    /// Commit staged changes. Returns `false` when there was nothing to commit.
    async fn commit(&self, message: &str) -> Result<bool, VcsError>;

    async fn rebase(&self, reference: &str) -> Result<(), VcsError>;

    async fn fetch(&self, remote: &str, refspec: &str) -> Result<(), VcsError>;

    async fn config(&self, key: &str) -> Result<Option<String>, VcsError>;
}

/// Paths from `git status -s` output. Renames report the new path.
pub fn parse_status(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| line.len() > 3)
        .map(|line| {
            let path = &line[3..];
            path.rsplit_once(" -> ")
                .map(|(_, new)| new)
                .unwrap_or(path)
                .trim_matches('"')
                .to_string()
        })
        .collect()
}

fn lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// `git` command-line implementation.
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
}

impl GitCli {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn run(&self, args: &[&str]) -> Result<String, VcsError> {
        tracing::debug!(root = %self.root.display(), "git {}", args.join(" "));
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(args)
            .output()
            .await?;
        if !output.status.success() {
            return Err(VcsError::Command {
                command: args.join(" "),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Vcs for GitCli {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn checkout(&self, reference: &str) -> Result<(), VcsError> {
        self.run(&["checkout", reference]).await.map(drop)
    }

    async fn diff_names(&self, range: &str) -> Result<Vec<String>, VcsError> {
        Ok(lines(&self.run(&["diff", "--name-only", range]).await?))
    }

    async fn status_short(&self) -> Result<Vec<String>, VcsError> {
        Ok(parse_status(&self.run(&["status", "-s", "-uall"]).await?))
    }

    async fn ls_tree(&self, reference: &str) -> Result<Vec<String>, VcsError> {
        Ok(lines(
            &self.run(&["ls-tree", "-r", "--name-only", reference]).await?,
        ))
    }

    async fn add(&self, paths: &[String]) -> Result<(), VcsError> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["add", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.run(&args).await.map(drop)
    }

    async fn commit(&self, message: &str) -> Result<bool, VcsError> {
        let staged = self.run(&["diff", "--cached", "--name-only"]).await?;
        if staged.trim().is_empty() {
            return Ok(false);
        }
        self.run(&["commit", "-m", message]).await?;
        Ok(true)
    }

    async fn rebase(&self, reference: &str) -> Result<(), VcsError> {
        self.run(&["rebase", reference]).await.map(drop)
    }

    async fn fetch(&self, remote: &str, refspec: &str) -> Result<(), VcsError> {
        self.run(&["fetch", remote, refspec]).await.map(drop)
    }

    async fn config(&self, key: &str) -> Result<Option<String>, VcsError> {
        match self.run(&["config", "--get", key]).await {
            Ok(value) => Ok(Some(value.trim().to_string())),
            // git config exits 1 when the key is unset
            Err(VcsError::Command { status: 1, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Files changed since the last cycle.
///
/// With an upstream to follow, this is the upstream diff (after which the
/// branch is rebased onto it); otherwise it is the dirty working tree.
pub async fn changed_files(
    vcs: &dyn Vcs,
    repo: &RepositoryDescriptor,
) -> Result<Vec<String>, VcsError> {
    if repo.check_upstream() {
        let branch = repo.branch();
        vcs.fetch("upstream", branch).await?;
        let upstream_ref = format!("upstream/{branch}");
        let changed = vcs
            .diff_names(&format!("origin/{branch}..{upstream_ref}"))
            .await?;
        vcs.rebase(&upstream_ref).await?;
        Ok(changed)
    } else {
        vcs.status_short().await
    }
}

/// Stage and commit downloaded translations.
pub async fn commit_translations(vcs: &dyn Vcs, paths: &[String]) -> Result<bool, VcsError> {
    if paths.is_empty() {
        return Ok(false);
    }
    vcs.add(paths).await?;
    let message = format!("Updated translations {}", Utc::now().format("%Y-%m-%d %H:%M:%S"));
    vcs.commit(&message).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_status_extracts_paths() {
        let out = " M docs/en/a.md\n?? docs/en/new.md\nR  docs/en/old.md -> docs/en/moved.md\n";
        assert_eq!(
            parse_status(out),
            vec!["docs/en/a.md", "docs/en/new.md", "docs/en/moved.md"]
        );
    }

    #[test]
    fn parse_status_ignores_blank_lines() {
        assert!(parse_status("\n\n").is_empty());
    }

    fn git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn git(root: &Path, args: &[&str]) {
        let status = std::process::Command::new("git")
            .arg("-C")
            .arg(root)
            .args(args)
            .status()
            .expect("git runs");
        assert!(status.success(), "git {args:?}");
    }

    #[tokio::test]
    async fn git_cli_lists_tree_and_commits() {
        if !git_available() {
            return;
        }
        let dir = tempfile::TempDir::new().expect("tempdir");
        let root = dir.path();
        git(root, &["init", "-q", "-b", "main"]);
        git(root, &["config", "user.email", "sync@example.com"]);
        git(root, &["config", "user.name", "sync"]);
        std::fs::create_dir_all(root.join("docs/en")).expect("mkdir");
        std::fs::write(root.join("docs/en/a.md"), "# A\n").expect("write");
        git(root, &["add", "."]);
        git(root, &["commit", "-q", "-m", "init"]);

        let vcs = GitCli::new(root);
        assert_eq!(vcs.ls_tree("main").await.expect("ls-tree"), vec!["docs/en/a.md"]);
        assert!(vcs.status_short().await.expect("status").is_empty());
        assert_eq!(
            vcs.config("user.name").await.expect("config").as_deref(),
            Some("sync")
        );
        assert_eq!(vcs.config("crowdsync.unset").await.expect("config"), None);

        std::fs::write(root.join("docs/en/a.md"), "# A changed\n").expect("write");
        assert_eq!(vcs.status_short().await.expect("status"), vec!["docs/en/a.md"]);
        git(root, &["checkout", "--", "docs/en/a.md"]);
        assert!(vcs.status_short().await.expect("status").is_empty());

        std::fs::create_dir_all(root.join("docs/ja")).expect("mkdir");
        std::fs::write(root.join("docs/ja/a.md"), "# エー\n").expect("write");
        let committed = commit_translations(&vcs, &["docs/ja/a.md".to_string()])
            .await
            .expect("commit");
        assert!(committed);
        assert!(!vcs.commit("nothing").await.expect("empty commit"));
    }
}
