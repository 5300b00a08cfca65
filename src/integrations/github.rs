use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::{IssueEdit, IssueState, IssueTracker, NewIssue, RemoteComment, RemoteIssue};
use crate::config::GitHubConfig;
use crate::error::SyncError;

const USER_AGENT: &str = concat!("diary-sync/", env!("CARGO_PKG_VERSION"));
const PAGE_SIZE: &str = "100";

#[derive(Deserialize)]
struct ApiLabel {
    name: String,
}

#[derive(Deserialize)]
struct ApiIssue {
    number: u64,
    title: String,
    body: Option<String>,
    #[serde(default)]
    labels: Vec<ApiLabel>,
    state: IssueState,
    updated_at: DateTime<Utc>,
    pull_request: Option<serde_json::Value>,
}

impl From<ApiIssue> for RemoteIssue {
    fn from(issue: ApiIssue) -> Self {
        RemoteIssue {
            number: issue.number,
            title: issue.title,
            body: issue.body.unwrap_or_default(),
            labels: issue.labels.into_iter().map(|label| label.name).collect(),
            state: issue.state,
            updated_at: issue.updated_at,
        }
    }
}

#[derive(Deserialize)]
struct ApiComment {
    id: u64,
    body: Option<String>,
    updated_at: DateTime<Utc>,
}

impl From<ApiComment> for RemoteComment {
    fn from(comment: ApiComment) -> Self {
        RemoteComment {
            id: comment.id,
            body: comment.body.unwrap_or_default(),
            updated_at: comment.updated_at,
        }
    }
}

/// Blocking client for one GitHub repository's issues.
pub struct GitHubTracker {
    client: Client,
    api_url: String,
    repo: String,
    token: String,
}

impl GitHubTracker {
    pub fn new(config: &GitHubConfig) -> Result<Self, SyncError> {
        let repo = config.full_repo_name();
        if repo.is_empty() || !repo.contains('/') {
            return Err(SyncError::Config(
                "GitHub repo is not configured; set github.repo_name and github.user_name.".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(5)))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SyncError::Request(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            repo,
            token: config.resolve_token(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/repos/{}/{path}", self.api_url, self.repo)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Accept", "application/vnd.github+json");
        if self.token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.token)
        }
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T, SyncError> {
        let response = self
            .authorize(request)
            .send()
            .map_err(|e| SyncError::Request(format!("GitHub {what} failed: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|e| SyncError::Request(format!("GitHub {what} read failed: {e}")))?;
        if !status.is_success() {
            return Err(SyncError::Request(format!("GitHub {what} failed ({status}): {body}")));
        }
        log::debug!("GitHub {what}: HTTP {status}");
        Ok(serde_json::from_str(&body)?)
    }
}

/// Issues listing also returns pull requests; those never enter the diary.
fn open_issues_from(body: Vec<ApiIssue>) -> Vec<RemoteIssue> {
    body.into_iter()
        .filter(|issue| issue.pull_request.is_none())
        .map(RemoteIssue::from)
        .collect()
}

impl IssueTracker for GitHubTracker {
    fn fetch_open_issues(&self) -> Result<Vec<RemoteIssue>, SyncError> {
        let request = self
            .client
            .get(self.url("issues"))
            .query(&[("state", "open"), ("per_page", PAGE_SIZE)]);
        let issues: Vec<ApiIssue> = self.send(request, "issue list")?;
        Ok(open_issues_from(issues))
    }

    fn fetch_comments(&self, issue: u64) -> Result<Vec<RemoteComment>, SyncError> {
        let request = self
            .client
            .get(self.url(&format!("issues/{issue}/comments")))
            .query(&[("per_page", PAGE_SIZE)]);
        let comments: Vec<ApiComment> = self.send(request, "comment list")?;
        Ok(comments.into_iter().map(RemoteComment::from).collect())
    }

    fn fetch_issue(&self, issue: u64) -> Result<RemoteIssue, SyncError> {
        let request = self.client.get(self.url(&format!("issues/{issue}")));
        let issue: ApiIssue = self.send(request, "issue fetch")?;
        Ok(issue.into())
    }

    fn create_issue(&self, issue: &NewIssue) -> Result<RemoteIssue, SyncError> {
        let request = self.client.post(self.url("issues")).json(issue);
        let created: ApiIssue = self.send(request, "issue create")?;
        log::info!("Created GitHub issue #{}", created.number);
        Ok(created.into())
    }

    fn create_comment(&self, issue: u64, body: &str) -> Result<RemoteComment, SyncError> {
        let request = self
            .client
            .post(self.url(&format!("issues/{issue}/comments")))
            .json(&json!({ "body": body }));
        let created: ApiComment = self.send(request, "comment create")?;
        Ok(created.into())
    }

    fn edit_issue(&self, issue: u64, edit: &IssueEdit) -> Result<RemoteIssue, SyncError> {
        let request = self.client.patch(self.url(&format!("issues/{issue}"))).json(edit);
        let updated: ApiIssue = self.send(request, "issue edit")?;
        Ok(updated.into())
    }

    fn edit_comment(&self, comment_id: u64, body: &str) -> Result<RemoteComment, SyncError> {
        let request = self
            .client
            .patch(self.url(&format!("issues/comments/{comment_id}")))
            .json(&json!({ "body": body }));
        let updated: ApiComment = self.send(request, "comment edit")?;
        Ok(updated.into())
    }
}
