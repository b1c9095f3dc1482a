//! Issue and milestone endpoints.

use serde::Serialize;
use serde_json::json;

use super::client::GitHubClient;
use super::types::{Issue, IssueState, Milestone};
use crate::http::HttpMethod;
use crate::remote::Result;

/// Partial update for `PATCH /repos/{origin}/issues/{number}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IssueUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<IssueState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone: Option<u64>,
}

impl IssueUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl GitHubClient {
    /// All milestones, open and closed.
    pub async fn list_milestones(&self, origin: &str) -> Result<Vec<Milestone>> {
        self.request_all(&format!("/repos/{origin}/milestones?state=all"))
            .collect_all()
            .await
    }

    pub async fn create_milestone(&self, origin: &str, title: &str) -> Result<Milestone> {
        self.send_json(
            HttpMethod::Post,
            &format!("/repos/{origin}/milestones"),
            &json!({ "title": title }),
        )
        .await
    }

    pub async fn create_issue(
        &self,
        origin: &str,
        title: &str,
        body: &str,
        milestone: Option<u64>,
    ) -> Result<Issue> {
        let mut payload = json!({ "title": title, "body": body });
        if let Some(milestone) = milestone {
            payload["milestone"] = json!(milestone);
        }
        self.send_json(
            HttpMethod::Post,
            &format!("/repos/{origin}/issues"),
            &payload,
        )
        .await
    }

    pub async fn get_issue(&self, origin: &str, number: u64) -> Result<Option<Issue>> {
        self.get(&format!("/repos/{origin}/issues/{number}")).await
    }

    pub async fn update_issue(
        &self,
        origin: &str,
        number: u64,
        update: &IssueUpdate,
    ) -> Result<Issue> {
        let payload = serde_json::to_value(update).unwrap_or_default();
        self.send_json(
            HttpMethod::Patch,
            &format!("/repos/{origin}/issues/{number}"),
            &payload,
        )
        .await
    }

    /// Issues in any state, optionally limited to one milestone.
    pub async fn list_issues(&self, origin: &str, milestone: Option<u64>) -> Result<Vec<Issue>> {
        let mut path = format!("/repos/{origin}/issues?state=all");
        if let Some(milestone) = milestone {
            path.push_str(&format!("&milestone={milestone}"));
        }
        self.request_all(&path).collect_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::client::tests::{API, client, response};
    use crate::http::MockTransport;

    fn issue_json(number: u64, state: &str) -> serde_json::Value {
        json!({
            "id": 1000 + number,
            "node_id": format!("I_{number}"),
            "number": number,
            "title": "main - docs/en",
            "body": "",
            "state": state,
            "milestone": { "number": 2, "title": "machine" }
        })
    }

    #[test]
    fn issue_update_serializes_only_set_fields() {
        let update = IssueUpdate {
            state: Some(IssueState::Open),
            ..IssueUpdate::default()
        };
        assert_eq!(
            serde_json::to_value(&update).expect("json"),
            json!({ "state": "open" })
        );
        assert!(IssueUpdate::default().is_empty());
    }

    #[tokio::test]
    async fn create_issue_sends_milestone() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Post,
            format!("{API}/repos/acme/docs/issues"),
            response(201, vec![], issue_json(5, "open").to_string()),
        );
        let issue = client(&transport)
            .create_issue("acme/docs", "main - docs/en", "body", Some(2))
            .await
            .expect("created");
        assert_eq!(issue.number, 5);

        let sent: serde_json::Value =
            serde_json::from_slice(&transport.requests()[0].body).expect("json body");
        assert_eq!(sent["milestone"], 2);
        assert_eq!(sent["title"], "main - docs/en");
    }

    #[tokio::test]
    async fn list_issues_filters_by_milestone() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Get,
            format!("{API}/repos/acme/docs/issues?state=all&milestone=1&per_page=100"),
            response(200, vec![], json!([issue_json(3, "closed")]).to_string()),
        );
        let issues = client(&transport)
            .list_issues("acme/docs", Some(1))
            .await
            .expect("listed");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].state, IssueState::Closed);
    }

    #[tokio::test]
    async fn missing_issue_is_none() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Get,
            format!("{API}/repos/acme/docs/issues/404"),
            response(404, vec![], "{}"),
        );
        assert!(
            client(&transport)
                .get_issue("acme/docs", 404)
                .await
                .expect("none")
                .is_none()
        );
    }
}
