//! One tracking issue per root folder, grouped under two milestones.
//!
//! Issue numbers and milestone numbers are persisted through
//! [`StateStore`] right after the creating call succeeds, so a crashed run
//! never opens a second issue for the same folder.

use std::collections::BTreeSet;

use crate::descriptor::is_within;
use crate::github::{GitHubClient, Issue, IssueState, IssueUpdate};
use crate::metadata::{MetadataSnapshot, folder_metadata};
use crate::state::{IssueMap, MilestoneMap, StateStore};

use super::error::Result;
use super::progress::{ProgressCallback, SyncProgress, emit};

/// Milestone for work a person started by hand.
pub const HUMAN_MILESTONE: &str = "human";

/// Milestone for work the engine discovered on its own.
pub const MACHINE_MILESTONE: &str = "machine";

const TRANSLATE_URL: &str = "https://crowdin.com/translate";

pub fn issue_title(branch: &str, folder: &str) -> String {
    format!("{branch} - {folder}")
}

/// Folder named by an issue title for `branch`, if the title has that shape.
pub fn folder_from_title<'a>(branch: &str, title: &'a str) -> Option<&'a str> {
    title
        .strip_prefix(branch)?
        .strip_prefix(" - ")
        .filter(|folder| !folder.is_empty())
}

fn name_of(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, name)| name)
}

/// Markdown body listing every uploaded file under `remote_prefix`.
///
/// Sub-folders get a bold heading with their aggregate progress; files link
/// to the platform editor.
pub fn render_issue_body(
    project_name: &str,
    source_language: &str,
    target_language: &str,
    remote_prefix: &str,
    snapshot: &MetadataSnapshot,
) -> String {
    let files: Vec<(&String, u64)> = snapshot
        .iter()
        .filter(|(path, _)| is_within(path, remote_prefix) && path.as_str() != remote_prefix)
        .filter_map(|(path, m)| m.id().map(|id| (path, id)))
        .collect();

    let mut folders = BTreeSet::new();
    for (path, _) in &files {
        let mut dir = path.as_str();
        while let Some((parent, _)) = dir.rsplit_once('/') {
            if parent.len() <= remote_prefix.len() || !is_within(parent, remote_prefix) {
                break;
            }
            folders.insert(parent.to_string());
            dir = parent;
        }
    }

    // Folder entries sort right before their own children.
    let mut entries: Vec<(String, String)> = Vec::new();
    for folder in &folders {
        if let Some(m) = folder_metadata(snapshot, folder) {
            entries.push((
                folder.clone(),
                format!(
                    "\n**{}** ({}% translated, {}% proofread)\n",
                    name_of(folder),
                    m.translated_percent(),
                    m.approved_percent()
                ),
            ));
        }
    }
    for (path, id) in files {
        let Some(m) = snapshot.get(path) else {
            continue;
        };
        entries.push((
            path.clone(),
            format!(
                "* [{}]({TRANSLATE_URL}/{project_name}/{id}/{source_language}-{target_language}) ({}% translated, {}% proofread)",
                name_of(path),
                m.translated_percent(),
                m.approved_percent()
            ),
        ));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    entries
        .into_iter()
        .map(|(_, line)| line)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Issue and milestone bookkeeping for one repository branch.
pub struct IssueTracker<'a> {
    github: &'a GitHubClient,
    store: &'a StateStore,
    origin: &'a str,
    branch: &'a str,
    project_folder: &'a str,
    milestones: Option<MilestoneMap>,
}

impl<'a> IssueTracker<'a> {
    pub fn new(
        github: &'a GitHubClient,
        store: &'a StateStore,
        origin: &'a str,
        branch: &'a str,
        project_folder: &'a str,
    ) -> Self {
        Self {
            github,
            store,
            origin,
            branch,
            project_folder,
            milestones: None,
        }
    }

    /// Known issues for this branch, limited to the project folder.
    pub fn issues(&self) -> Result<IssueMap> {
        Ok(self.store.load_issues(self.branch, self.project_folder)?)
    }

    /// Milestone numbers, created on GitHub once per origin and cached.
    pub async fn milestones(&mut self) -> Result<&MilestoneMap> {
        if self.milestones.is_none() {
            let mut map = self.store.load_milestones()?.unwrap_or_default();
            let complete = [HUMAN_MILESTONE, MACHINE_MILESTONE]
                .iter()
                .all(|title| map.contains_key(*title));
            if !complete {
                for milestone in self.github.list_milestones(self.origin).await? {
                    map.insert(milestone.title, milestone.number);
                }
                for title in [HUMAN_MILESTONE, MACHINE_MILESTONE] {
                    if map.contains_key(title) {
                        continue;
                    }
                    let created = self.github.create_milestone(self.origin, title).await?;
                    tracing::info!(origin = %self.origin, title, number = created.number, "Created milestone");
                    map.insert(title.to_string(), created.number);
                    self.store.save_milestones(&map)?;
                }
                self.store.save_milestones(&map)?;
            }
            self.milestones = Some(map);
        }
        Ok(self.milestones.get_or_insert_with(MilestoneMap::new))
    }

    async fn milestone(&mut self, title: &str) -> Result<Option<u64>> {
        Ok(self.milestones().await?.get(title).copied())
    }

    async fn create_issue(
        &mut self,
        folder: &str,
        body: &str,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Issue> {
        let milestone = self.milestone(MACHINE_MILESTONE).await?;
        let issue = self
            .github
            .create_issue(
                self.origin,
                &issue_title(self.branch, folder),
                body,
                milestone,
            )
            .await?;
        self.store.save_issue(self.branch, folder, issue.number)?;
        tracing::info!(folder = %folder, issue = issue.number, "Created tracking issue");
        emit(
            on_progress,
            SyncProgress::IssueCreated {
                folder: folder.to_string(),
                number: issue.number,
            },
        );
        Ok(issue)
    }

    /// Issue number for `folder`, creating the issue on first use.
    pub async fn ensure_issue(
        &mut self,
        folder: &str,
        body: &str,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<u64> {
        if let Some(number) = self.issues()?.get(folder) {
            return Ok(*number);
        }
        Ok(self.create_issue(folder, body, on_progress).await?.number)
    }

    /// Reopen the issue, refresh its body or attach the machine milestone,
    /// writing only what differs. `None` when the issue no longer exists.
    pub async fn reopen_issue(
        &mut self,
        folder: &str,
        number: u64,
        body: &str,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Option<Issue>> {
        let Some(issue) = self.github.get_issue(self.origin, number).await? else {
            tracing::warn!(folder = %folder, issue = number, "Tracked issue no longer exists");
            return Ok(None);
        };

        let mut update = IssueUpdate::default();
        if issue.state == IssueState::Closed {
            update.state = Some(IssueState::Open);
        }
        if issue.body.as_deref().unwrap_or_default().trim() != body.trim() {
            update.body = Some(body.to_string());
        }
        if issue.milestone.is_none() {
            update.milestone = self.milestone(MACHINE_MILESTONE).await?;
        }
        if update.is_empty() {
            return Ok(Some(issue));
        }

        let reopened = update.state.is_some();
        let updated = self.github.update_issue(self.origin, number, &update).await?;
        tracing::info!(folder = %folder, issue = number, reopened, "Refreshed tracking issue");
        emit(
            on_progress,
            SyncProgress::IssueReopened {
                folder: folder.to_string(),
                number,
            },
        );
        Ok(Some(updated))
    }

    /// Bring the folder's issue up to date, creating it if needed.
    pub async fn sync_issue(
        &mut self,
        folder: &str,
        body: &str,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Issue> {
        if let Some(number) = self.issues()?.get(folder).copied()
            && let Some(issue) = self.reopen_issue(folder, number, body, on_progress).await?
        {
            return Ok(issue);
        }
        self.create_issue(folder, body, on_progress).await
    }

    /// Close the issue if it is open. Returns whether a write happened.
    pub async fn close_issue(
        &mut self,
        folder: &str,
        number: u64,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<bool> {
        let Some(issue) = self.github.get_issue(self.origin, number).await? else {
            return Ok(false);
        };
        if issue.state == IssueState::Closed {
            return Ok(false);
        }
        let update = IssueUpdate {
            state: Some(IssueState::Closed),
            ..IssueUpdate::default()
        };
        self.github.update_issue(self.origin, number, &update).await?;
        tracing::info!(folder = %folder, issue = number, "Closed tracking issue");
        emit(
            on_progress,
            SyncProgress::IssueClosed {
                folder: folder.to_string(),
                number,
            },
        );
        Ok(true)
    }

    /// Issues filed under the human milestone.
    pub async fn human_issues(&mut self) -> Result<Vec<Issue>> {
        match self.milestone(HUMAN_MILESTONE).await? {
            Some(number) => Ok(self.github.list_issues(self.origin, Some(number)).await?),
            None => Ok(Vec::new()),
        }
    }
}
