//! Project board placement for tracking issues.
//!
//! [`RemoteTrackerBackend`] picks one [`ProjectBoard`] implementation at
//! configuration time; the engine only talks to the trait.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::descriptor::{RemoteTrackerBackend, RepositoryDescriptor};
use crate::github::{GitHubClient, Issue, ProjectColumn, ProjectV2};
use crate::metadata::BoardColumn;

use super::error::Result;
use super::progress::{ProgressCallback, SyncProgress, emit};

/// Handle to an issue's entry on a board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardItem {
    /// Classic project card and the column it sits in.
    Card { id: u64, column_id: u64 },
    /// Projects v2 item.
    Item { id: String },
}

#[async_trait]
pub trait ProjectBoard: Send {
    /// Put `issue` on the board if it is not there yet. New entries land in
    /// `column`, or the first column when none is known.
    async fn ensure_item(
        &mut self,
        issue: &Issue,
        column: Option<BoardColumn>,
    ) -> Result<Option<BoardItem>>;

    /// Move an entry to `column`. Returns `false` when it was already there.
    async fn move_item(&mut self, item: &BoardItem, column: BoardColumn) -> Result<bool>;
}

/// Ensure the issue's entry and move it to `column` when one is known.
pub async fn place_issue(
    board: &mut dyn ProjectBoard,
    folder: &str,
    issue: &Issue,
    column: Option<BoardColumn>,
    on_progress: Option<&ProgressCallback>,
) -> Result<bool> {
    let Some(item) = board.ensure_item(issue, column).await? else {
        return Ok(false);
    };
    let Some(column) = column else {
        return Ok(false);
    };
    let moved = board.move_item(&item, column).await?;
    if moved {
        tracing::info!(folder = %folder, issue = issue.number, column = %column, "Moved board item");
        emit(
            on_progress,
            SyncProgress::CardMoved {
                folder: folder.to_string(),
                issue: issue.number,
                column: column.title().to_string(),
            },
        );
    }
    Ok(moved)
}

/// Issues and milestones only.
#[derive(Debug, Default)]
pub struct NoBoard;

#[async_trait]
impl ProjectBoard for NoBoard {
    async fn ensure_item(&mut self, _: &Issue, _: Option<BoardColumn>) -> Result<Option<BoardItem>> {
        Ok(None)
    }

    async fn move_item(&mut self, _: &BoardItem, _: BoardColumn) -> Result<bool> {
        Ok(false)
    }
}

struct ClassicLayout {
    /// Column id per board column, in board order.
    columns: BTreeMap<BoardColumn, u64>,
    /// Issue number -> (card id, column id).
    cards: BTreeMap<u64, (u64, u64)>,
}

/// Repository project with REST columns and cards.
pub struct ClassicBoard<'a> {
    github: &'a GitHubClient,
    origin: String,
    name: String,
    layout: Option<ClassicLayout>,
}

impl<'a> ClassicBoard<'a> {
    pub fn new(github: &'a GitHubClient, origin: &str, name: impl Into<String>) -> Self {
        Self {
            github,
            origin: origin.to_string(),
            name: name.into(),
            layout: None,
        }
    }

    async fn layout(&mut self) -> Result<&mut ClassicLayout> {
        let layout = match self.layout.take() {
            Some(layout) => layout,
            None => self.load_layout().await?,
        };
        Ok(self.layout.insert(layout))
    }

    /// Find or create the project, its columns in board order, and index
    /// every card.
    async fn load_layout(&self) -> Result<ClassicLayout> {
        let project = match self
            .github
            .list_projects(&self.origin)
            .await?
            .into_iter()
            .find(|p| p.name == self.name)
        {
            Some(project) => project,
            None => {
                tracing::info!(origin = %self.origin, name = %self.name, "Creating project board");
                self.github.create_project(&self.origin, &self.name).await?
            }
        };

        let existing: Vec<ProjectColumn> = self.github.list_columns(project.id).await?;
        let mut columns = BTreeMap::new();
        for column in BoardColumn::ALL {
            if let Some(found) = existing.iter().find(|c| c.name == column.title()) {
                columns.insert(column, found.id);
                continue;
            }
            let created = self.github.create_column(project.id, column.title()).await?;
            // New columns are appended; pull them back in front of later ones.
            let later_exists = existing
                .iter()
                .any(|c| BoardColumn::from_title(&c.name).is_some_and(|other| other > column));
            if later_exists {
                let position = match column.index() {
                    0 => "first".to_string(),
                    i => columns
                        .get(&BoardColumn::ALL[i - 1])
                        .map_or_else(|| "first".to_string(), |previous| format!("after:{previous}")),
                };
                self.github.move_column(created.id, &position).await?;
            }
            columns.insert(column, created.id);
        }

        let mut cards = BTreeMap::new();
        for column_id in columns.values() {
            for card in self.github.list_cards(*column_id).await? {
                if let Some(number) = card.issue_number() {
                    cards.insert(number, (card.id, *column_id));
                }
            }
        }
        Ok(ClassicLayout { columns, cards })
    }
}

#[async_trait]
impl ProjectBoard for ClassicBoard<'_> {
    async fn ensure_item(
        &mut self,
        issue: &Issue,
        column: Option<BoardColumn>,
    ) -> Result<Option<BoardItem>> {
        let github = self.github;
        let layout = self.layout().await?;
        if let Some((id, column_id)) = layout.cards.get(&issue.number) {
            return Ok(Some(BoardItem::Card {
                id: *id,
                column_id: *column_id,
            }));
        }
        let column = column.unwrap_or(BoardColumn::SelectedForTranslation);
        let Some(column_id) = layout.columns.get(&column).copied() else {
            return Ok(None);
        };
        let card = github.create_card(column_id, issue.id).await?;
        layout.cards.insert(issue.number, (card.id, column_id));
        Ok(Some(BoardItem::Card {
            id: card.id,
            column_id,
        }))
    }

    async fn move_item(&mut self, item: &BoardItem, column: BoardColumn) -> Result<bool> {
        let BoardItem::Card { id, column_id } = item else {
            return Ok(false);
        };
        let github = self.github;
        let layout = self.layout().await?;
        let Some(target) = layout.columns.get(&column).copied() else {
            return Ok(false);
        };
        if target == *column_id {
            return Ok(false);
        }
        github.move_card(*id, target).await?;
        for placement in layout.cards.values_mut() {
            if placement.0 == *id {
                placement.1 = target;
            }
        }
        Ok(true)
    }
}

/// GraphQL project whose `Status` options are named after the columns.
pub struct ProjectV2Board<'a> {
    github: &'a GitHubClient,
    owner: String,
    number: u64,
    project: Option<Option<ProjectV2>>,
}

impl<'a> ProjectV2Board<'a> {
    pub fn new(github: &'a GitHubClient, owner: &str, number: u64) -> Self {
        Self {
            github,
            owner: owner.to_string(),
            number,
            project: None,
        }
    }

    async fn project(&mut self) -> Result<Option<&ProjectV2>> {
        if self.project.is_none() {
            let found = self.github.project_v2(&self.owner, self.number).await?;
            if found.is_none() {
                tracing::warn!(owner = %self.owner, number = self.number, "Project board not found");
            }
            self.project = Some(found);
        }
        Ok(self.project.as_ref().and_then(Option::as_ref))
    }
}

#[async_trait]
impl ProjectBoard for ProjectV2Board<'_> {
    async fn ensure_item(
        &mut self,
        issue: &Issue,
        _column: Option<BoardColumn>,
    ) -> Result<Option<BoardItem>> {
        let github = self.github;
        let Some(project) = self.project().await? else {
            return Ok(None);
        };
        let id = github.add_project_v2_item(&project.id, &issue.node_id).await?;
        Ok(Some(BoardItem::Item { id }))
    }

    async fn move_item(&mut self, item: &BoardItem, column: BoardColumn) -> Result<bool> {
        let BoardItem::Item { id } = item else {
            return Ok(false);
        };
        let github = self.github;
        let Some(project) = self.project().await? else {
            return Ok(false);
        };
        let Some(option) = project.status_options.get(column.title()) else {
            tracing::warn!(column = %column, "Board has no status option for column");
            return Ok(false);
        };
        if github.project_v2_item_status(id).await?.as_deref() == Some(option.as_str()) {
            return Ok(false);
        }
        github.set_project_v2_item_status(project, id, option).await?;
        Ok(true)
    }
}

/// Classic boards are named after the branch and project folder.
pub fn classic_board_name(repo: &RepositoryDescriptor) -> String {
    format!("{} - {}", repo.branch(), repo.project_folder())
}

/// Board implementation for `backend`.
pub fn board_for<'a>(
    backend: RemoteTrackerBackend,
    github: &'a GitHubClient,
    repo: &RepositoryDescriptor,
) -> Box<dyn ProjectBoard + 'a> {
    match backend {
        RemoteTrackerBackend::Issues => Box::new(NoBoard),
        RemoteTrackerBackend::ProjectsClassic => Box::new(ClassicBoard::new(
            github,
            repo.origin(),
            classic_board_name(repo),
        )),
        RemoteTrackerBackend::ProjectsV2 { number } => {
            let owner = repo.origin().split('/').next().unwrap_or_default();
            Box::new(ProjectV2Board::new(github, owner, number))
        }
    }
}
