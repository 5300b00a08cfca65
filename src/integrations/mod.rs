pub mod github;
pub mod google;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::models::{CalendarEvent, Comment, Issue};
use crate::timestamp::format_comment_time;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteIssue {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub state: IssueState,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteComment {
    pub id: u64,
    pub body: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct NewIssue {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

/// Fields to change on an existing issue; `None` leaves the field alone.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IssueEdit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<IssueState>,
}

/// Issue tracker the diary's Issues section mirrors.
pub trait IssueTracker {
    fn name(&self) -> &str {
        "GitHub"
    }

    fn fetch_open_issues(&self) -> Result<Vec<RemoteIssue>, SyncError>;
    /// Comments in creation order, not including the issue body.
    fn fetch_comments(&self, issue: u64) -> Result<Vec<RemoteComment>, SyncError>;
    fn fetch_issue(&self, issue: u64) -> Result<RemoteIssue, SyncError>;
    fn create_issue(&self, issue: &NewIssue) -> Result<RemoteIssue, SyncError>;
    fn create_comment(&self, issue: u64, body: &str) -> Result<RemoteComment, SyncError>;
    fn edit_issue(&self, issue: u64, edit: &IssueEdit) -> Result<RemoteIssue, SyncError>;
    fn edit_comment(&self, comment_id: u64, body: &str) -> Result<RemoteComment, SyncError>;
}

/// Calendar the diary's Schedule section mirrors.
pub trait CalendarService {
    fn name(&self) -> &str {
        "Google Calendar"
    }

    /// Events overlapping `date`, already filtered to the configured calendars.
    fn fetch_events(&self, date: NaiveDate) -> Result<Vec<CalendarEvent>, SyncError>;
    fn insert_event(&self, event: &CalendarEvent) -> Result<(), SyncError>;
}

/// Splits a tracker body into diary lines, trimming blank lines at either end.
pub fn split_comment(body: &str) -> Vec<String> {
    let lines: Vec<&str> = body.lines().collect();
    let start = lines.iter().position(|line| !line.trim().is_empty());
    let end = lines.iter().rposition(|line| !line.trim().is_empty());
    match (start, end) {
        (Some(start), Some(end)) => lines[start..=end].iter().map(|line| line.to_string()).collect(),
        _ => vec![String::new()],
    }
}

pub fn issue_from_remote(issue: &RemoteIssue, comments: &[RemoteComment], timezone: Tz) -> Issue {
    let mut all_comments = Vec::with_capacity(comments.len() + 1);
    all_comments.push(Comment {
        number: 0,
        body: split_comment(&issue.body),
        tags: Vec::new(),
        updated_at: format_comment_time(issue.updated_at, timezone),
    });
    all_comments.extend(comments.iter().enumerate().map(|(index, comment)| Comment {
        number: index + 1,
        body: split_comment(&comment.body),
        tags: Vec::new(),
        updated_at: format_comment_time(comment.updated_at, timezone),
    }));

    Issue {
        number: issue.number,
        title: issue.title.clone(),
        complete: issue.state == IssueState::Closed,
        labels: issue.labels.clone(),
        all_comments,
        metadata: Vec::new(),
    }
}

/// Every open issue with its comments, converted to diary records.
pub fn fetch_issues(tracker: &dyn IssueTracker, timezone: Tz) -> Result<Vec<Issue>, SyncError> {
    let remote = tracker.fetch_open_issues()?;
    let mut issues = Vec::with_capacity(remote.len());
    for issue in &remote {
        let comments = tracker.fetch_comments(issue.number)?;
        issues.push(issue_from_remote(issue, &comments, timezone));
    }
    log::debug!("Fetched {} open issues from {}", issues.len(), tracker.name());
    Ok(issues)
}
