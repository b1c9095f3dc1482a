//! Project board endpoints: classic REST projects and GraphQL projects v2.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use super::client::GitHubClient;
use super::types::{Project, ProjectCard, ProjectColumn};
use crate::http::HttpMethod;
use crate::remote::{RemoteError, Result};

/// A projects-v2 board and its `Status` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectV2 {
    pub id: String,
    pub status_field_id: String,
    /// Option name -> option id.
    pub status_options: BTreeMap<String, String>,
}

const PROJECT_V2_QUERY: &str = r#"
query($owner: String!, $number: Int!) {
  repositoryOwner(login: $owner) {
    ... on Organization { projectV2(number: $number) { ...board } }
    ... on User { projectV2(number: $number) { ...board } }
  }
}
fragment board on ProjectV2 {
  id
  field(name: "Status") {
    ... on ProjectV2SingleSelectField { id options { id name } }
  }
}
"#;

const ADD_ITEM_MUTATION: &str = r#"
mutation($project: ID!, $content: ID!) {
  addProjectV2ItemById(input: { projectId: $project, contentId: $content }) { item { id } }
}
"#;

const ITEM_STATUS_QUERY: &str = r#"
query($item: ID!) {
  node(id: $item) {
    ... on ProjectV2Item {
      fieldValueByName(name: "Status") {
        ... on ProjectV2ItemFieldSingleSelectValue { optionId }
      }
    }
  }
}
"#;

const SET_STATUS_MUTATION: &str = r#"
mutation($project: ID!, $item: ID!, $field: ID!, $option: String!) {
  updateProjectV2ItemFieldValue(input: {
    projectId: $project, itemId: $item, fieldId: $field,
    value: { singleSelectOptionId: $option }
  }) { projectV2Item { id } }
}
"#;

fn parse_project_v2(data: &Value) -> Option<ProjectV2> {
    let project = data.get("repositoryOwner")?.get("projectV2")?;
    let field = project.get("field")?;
    let status_options = field
        .get("options")?
        .as_array()?
        .iter()
        .filter_map(|o| {
            Some((
                o.get("name")?.as_str()?.to_string(),
                o.get("id")?.as_str()?.to_string(),
            ))
        })
        .collect();
    Some(ProjectV2 {
        id: project.get("id")?.as_str()?.to_string(),
        status_field_id: field.get("id")?.as_str()?.to_string(),
        status_options,
    })
}

impl GitHubClient {
    pub async fn list_projects(&self, origin: &str) -> Result<Vec<Project>> {
        self.request_all(&format!("/repos/{origin}/projects?state=all"))
            .collect_all()
            .await
    }

    pub async fn create_project(&self, origin: &str, name: &str) -> Result<Project> {
        self.send_json(
            HttpMethod::Post,
            &format!("/repos/{origin}/projects"),
            &json!({ "name": name }),
        )
        .await
    }

    pub async fn list_columns(&self, project_id: u64) -> Result<Vec<ProjectColumn>> {
        self.request_all(&format!("/projects/{project_id}/columns"))
            .collect_all()
            .await
    }

    pub async fn create_column(&self, project_id: u64, name: &str) -> Result<ProjectColumn> {
        self.send_json(
            HttpMethod::Post,
            &format!("/projects/{project_id}/columns"),
            &json!({ "name": name }),
        )
        .await
    }

    /// `position` is `first`, `last` or `after:<column_id>`.
    pub async fn move_column(&self, column_id: u64, position: &str) -> Result<()> {
        self.request(
            HttpMethod::Post,
            &format!("/projects/columns/{column_id}/moves"),
            Some(&json!({ "position": position })),
        )
        .await
        .map(drop)
    }

    pub async fn list_cards(&self, column_id: u64) -> Result<Vec<ProjectCard>> {
        self.request_all(&format!("/projects/columns/{column_id}/cards"))
            .collect_all()
            .await
    }

    pub async fn create_card(&self, column_id: u64, issue_id: u64) -> Result<ProjectCard> {
        self.send_json(
            HttpMethod::Post,
            &format!("/projects/columns/{column_id}/cards"),
            &json!({ "content_id": issue_id, "content_type": "Issue" }),
        )
        .await
    }

    pub async fn move_card(&self, card_id: u64, column_id: u64) -> Result<()> {
        self.request(
            HttpMethod::Post,
            &format!("/projects/columns/cards/{card_id}/moves"),
            Some(&json!({ "position": "top", "column_id": column_id })),
        )
        .await
        .map(drop)
    }

    /// Look up a projects-v2 board by owner login and number.
    pub async fn project_v2(&self, owner: &str, number: u64) -> Result<Option<ProjectV2>> {
        let data = self
            .graphql(PROJECT_V2_QUERY, json!({ "owner": owner, "number": number }))
            .await?;
        Ok(parse_project_v2(&data))
    }

    /// Add an issue to a board; returns the existing item if already present.
    pub async fn add_project_v2_item(&self, project_id: &str, content_id: &str) -> Result<String> {
        let data = self
            .graphql(
                ADD_ITEM_MUTATION,
                json!({ "project": project_id, "content": content_id }),
            )
            .await?;
        data.pointer("/addProjectV2ItemById/item/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| RemoteError::internal("addProjectV2ItemById returned no item id"))
    }

    /// Currently selected `Status` option id of an item.
    pub async fn project_v2_item_status(&self, item_id: &str) -> Result<Option<String>> {
        let data = self
            .graphql(ITEM_STATUS_QUERY, json!({ "item": item_id }))
            .await?;
        Ok(data
            .pointer("/node/fieldValueByName/optionId")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    pub async fn set_project_v2_item_status(
        &self,
        project: &ProjectV2,
        item_id: &str,
        option_id: &str,
    ) -> Result<()> {
        self.graphql(
            SET_STATUS_MUTATION,
            json!({
                "project": project.id,
                "item": item_id,
                "field": project.status_field_id,
                "option": option_id,
            }),
        )
        .await
        .map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::client::tests::{API, client, response};
    use crate::http::MockTransport;

    #[test]
    fn parses_project_v2_status_options() {
        let data = json!({
            "repositoryOwner": {
                "projectV2": {
                    "id": "PVT_1",
                    "field": {
                        "id": "PVTSSF_1",
                        "options": [
                            { "id": "a", "name": "Selected for translation" },
                            { "id": "b", "name": "Translation started" }
                        ]
                    }
                }
            }
        });
        let project = parse_project_v2(&data).expect("parsed");
        assert_eq!(project.id, "PVT_1");
        assert_eq!(project.status_field_id, "PVTSSF_1");
        assert_eq!(
            project.status_options.get("Translation started").map(String::as_str),
            Some("b")
        );
    }

    #[test]
    fn missing_project_parses_as_none() {
        assert!(parse_project_v2(&json!({ "repositoryOwner": { "projectV2": null } })).is_none());
        assert!(parse_project_v2(&json!({ "repositoryOwner": null })).is_none());
    }

    #[tokio::test]
    async fn move_card_posts_target_column() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Post,
            format!("{API}/projects/columns/cards/9/moves"),
            response(201, vec![], ""),
        );
        client(&transport).move_card(9, 44).await.expect("moved");
        let body: Value = serde_json::from_slice(&transport.requests()[0].body).expect("json");
        assert_eq!(body, json!({ "position": "top", "column_id": 44 }));
    }

    #[tokio::test]
    async fn add_item_returns_item_id() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Post,
            format!("{API}/graphql"),
            response(
                200,
                vec![],
                json!({ "data": { "addProjectV2ItemById": { "item": { "id": "PVTI_7" } } } })
                    .to_string(),
            ),
        );
        let item = client(&transport)
            .add_project_v2_item("PVT_1", "I_7")
            .await
            .expect("added");
        assert_eq!(item, "PVTI_7");
    }
}
