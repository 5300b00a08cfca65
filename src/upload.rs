use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use log::{debug, info, warn};

use crate::error::SyncError;
use crate::integrations::{IssueEdit, IssueState, IssueTracker, NewIssue};
use crate::markdown::{MarkdownStyle, check_markdown_style};
use crate::models::{Issue, Tag};
use crate::tags::{CommentIndex, IgnoreList};
use crate::timestamp::format_comment_time;

const LINE_SEPARATOR: &str = "\r\n";

/// An issue selected for upload, with its body already in tracker style.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuePayload {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    /// Basis timestamp of the issue body.
    pub updated_at: String,
    pub conflicted: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommentPayload {
    pub issue_number: u64,
    pub comment_number: usize,
    pub body: String,
    pub updated_at: String,
    pub conflicted: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub count: usize,
    pub ignored: IgnoreList,
    pub messages: Vec<String>,
}

fn tracker_body(lines: &[String]) -> String {
    lines
        .iter()
        .map(|line| check_markdown_style(line, MarkdownStyle::GitHub))
        .collect::<Vec<_>>()
        .join(LINE_SEPARATOR)
}

/// Issues whose metadata carries `tag`, plus their positions in `issues`.
pub fn filter_issues(issues: &[Issue], tag: &Tag) -> (Vec<IssuePayload>, Vec<usize>) {
    issues
        .iter()
        .enumerate()
        .filter(|(_, issue)| issue.has_tag(tag))
        .map(|(index, issue)| {
            let body = issue.body();
            let payload = IssuePayload {
                number: issue.number,
                title: issue.title.clone(),
                body: body.map(|comment| tracker_body(&comment.body)).unwrap_or_default(),
                labels: issue.labels.clone(),
                updated_at: body.map(|comment| comment.updated_at.clone()).unwrap_or_default(),
                conflicted: issue.has_tag(&Tag::Conflict),
            };
            (payload, index)
        })
        .unzip()
}

/// Comments carrying `tag`, plus their (issue, comment) positions.
pub fn filter_comments(issues: &[Issue], tag: &Tag) -> (Vec<CommentPayload>, Vec<CommentIndex>) {
    let mut payloads = Vec::new();
    let mut indexes = Vec::new();
    for (issue_index, issue) in issues.iter().enumerate() {
        for (comment_index, comment) in issue.all_comments.iter().enumerate() {
            if !comment.has_tag(tag) {
                continue;
            }
            payloads.push(CommentPayload {
                issue_number: issue.number,
                comment_number: comment.number,
                body: tracker_body(&comment.body),
                updated_at: comment.updated_at.clone(),
                conflicted: comment.has_tag(&Tag::Conflict),
            });
            indexes.push(CommentIndex {
                issue: issue_index,
                comment: comment_index,
            });
        }
    }
    (payloads, indexes)
}

/// Outcome of pushing one edited record.
enum Pushed {
    Updated(DateTime<Utc>),
    Refused(String),
}

/// Creates every `+new` issue. Issues without a title are left for later.
pub fn upload_issues(
    tracker: &dyn IssueTracker,
    issues: &mut [Issue],
    timezone: Tz,
) -> Result<UploadReport, SyncError> {
    let (payloads, indexes) = filter_issues(issues, &Tag::New);
    let mut report = UploadReport::default();

    for (payload, index) in payloads.into_iter().zip(indexes) {
        if payload.title.trim().is_empty() {
            debug!("Skipping new issue without a title");
            report.ignored.issues.push(index);
            continue;
        }

        let title = payload.title.clone();
        let created = match tracker.create_issue(&NewIssue {
            title: payload.title,
            body: payload.body,
            labels: payload.labels,
        }) {
            Ok(created) => created,
            Err(err) => {
                warn!("Failed to create issue {title:?}: {err}");
                report.messages.push(format!("Failed to upload issue \"{title}\": {err}"));
                report.ignored.issues.push(index);
                continue;
            }
        };

        let issue = &mut issues[index];
        issue.number = created.number;
        if let Some(body) = issue.all_comments.first_mut() {
            body.updated_at = format_comment_time(created.updated_at, timezone);
        }
        report.count += 1;
    }

    info!("Created {} issues, skipped {}", report.count, report.ignored.issues.len());
    report
        .messages
        .push(format!("Uploaded {} issues to {}.", report.count, tracker.name()));
    Ok(report)
}

/// Creates every `+new` comment on an issue that already exists remotely.
pub fn upload_comments(
    tracker: &dyn IssueTracker,
    issues: &mut [Issue],
    timezone: Tz,
) -> Result<UploadReport, SyncError> {
    let (payloads, indexes) = filter_comments(issues, &Tag::New);
    let mut report = UploadReport::default();

    for (payload, index) in payloads.into_iter().zip(indexes) {
        // Comment 0 is the body of an issue that has not been created yet.
        if payload.issue_number == 0 || payload.comment_number == 0 || payload.body.trim().is_empty() {
            report.ignored.comments.push(index);
            continue;
        }

        match tracker.create_comment(payload.issue_number, &payload.body) {
            Ok(created) => {
                issues[index.issue].all_comments[index.comment].updated_at =
                    format_comment_time(created.updated_at, timezone);
                report.count += 1;
            }
            Err(err) => {
                let label = format!("{}:{}", payload.issue_number, payload.comment_number);
                warn!("Failed to create comment {label}: {err}");
                report.messages.push(format!("Failed to upload comment {label}: {err}"));
                report.ignored.comments.push(index);
            }
        }
    }

    info!("Created {} comments, skipped {}", report.count, report.ignored.comments.len());
    report
        .messages
        .push(format!("Uploaded {} comments to {}.", report.count, tracker.name()));
    Ok(report)
}

fn push_comment_edit(
    tracker: &dyn IssueTracker,
    payload: &CommentPayload,
    label: &str,
    timezone: Tz,
) -> Result<Pushed, SyncError> {
    if payload.comment_number == 0 {
        let remote = tracker.fetch_issue(payload.issue_number)?;
        if format_comment_time(remote.updated_at, timezone) != payload.updated_at {
            warn!("Issue body {label} changed remotely, not updating");
            return Ok(Pushed::Refused(format!("Mismatch with comment {label}.")));
        }
        let edit = IssueEdit {
            body: Some(payload.body.clone()),
            ..IssueEdit::default()
        };
        return Ok(Pushed::Updated(tracker.edit_issue(payload.issue_number, &edit)?.updated_at));
    }

    let comments = tracker.fetch_comments(payload.issue_number)?;
    let Some(remote) = comments.get(payload.comment_number - 1) else {
        return Ok(Pushed::Refused(format!("Comment {label} does not exist remotely.")));
    };
    if format_comment_time(remote.updated_at, timezone) != payload.updated_at {
        warn!("Comment {label} changed remotely, not updating");
        return Ok(Pushed::Refused(format!("Mismatch with comment {label}.")));
    }
    Ok(Pushed::Updated(tracker.edit_comment(remote.id, &payload.body)?.updated_at))
}

/// Pushes `+edit` comments, refusing any whose remote copy moved on since
/// the diary last saw it.
pub fn update_comments(
    tracker: &dyn IssueTracker,
    issues: &mut [Issue],
    timezone: Tz,
) -> Result<UploadReport, SyncError> {
    let (payloads, indexes) = filter_comments(issues, &Tag::Edit);
    let mut report = UploadReport::default();

    for (payload, index) in payloads.into_iter().zip(indexes) {
        let label = format!("{}:{}", payload.issue_number, payload.comment_number);
        if payload.issue_number == 0 {
            report.ignored.comments.push(index);
            continue;
        }
        if payload.conflicted {
            report.messages.push(format!("Comment {label} is in conflict, skipping."));
            report.ignored.comments.push(index);
            continue;
        }

        match push_comment_edit(tracker, &payload, &label, timezone) {
            Ok(Pushed::Updated(updated_at)) => {
                issues[index.issue].all_comments[index.comment].updated_at =
                    format_comment_time(updated_at, timezone);
                report.count += 1;
            }
            Ok(Pushed::Refused(message)) => {
                report.messages.push(message);
                report.ignored.comments.push(index);
            }
            Err(err) => {
                warn!("Failed to update comment {label}: {err}");
                report.messages.push(format!("Failed to update comment {label}: {err}"));
                report.ignored.comments.push(index);
            }
        }
    }

    report
        .messages
        .push(format!("Updated {} comments on {}.", report.count, tracker.name()));
    Ok(report)
}

fn push_issue_edit(tracker: &dyn IssueTracker, payload: IssuePayload, timezone: Tz) -> Result<Pushed, SyncError> {
    let remote = tracker.fetch_issue(payload.number)?;
    if format_comment_time(remote.updated_at, timezone) != payload.updated_at {
        warn!("Issue {} changed remotely, not updating", payload.number);
        return Ok(Pushed::Refused(format!("Mismatch with issue {}.", payload.number)));
    }

    let edit = IssueEdit {
        title: Some(payload.title),
        body: Some(payload.body),
        labels: Some(payload.labels),
        state: None,
    };
    Ok(Pushed::Updated(tracker.edit_issue(payload.number, &edit)?.updated_at))
}

/// Pushes title, labels and body for every `+edit` issue.
pub fn update_issues(
    tracker: &dyn IssueTracker,
    issues: &mut [Issue],
    timezone: Tz,
) -> Result<UploadReport, SyncError> {
    let (payloads, indexes) = filter_issues(issues, &Tag::Edit);
    let mut report = UploadReport::default();

    for (payload, index) in payloads.into_iter().zip(indexes) {
        let number = payload.number;
        if number == 0 {
            report.ignored.issues.push(index);
            continue;
        }
        if payload.conflicted {
            report.messages.push(format!("Issue {number} is in conflict, skipping."));
            report.ignored.issues.push(index);
            continue;
        }

        match push_issue_edit(tracker, payload, timezone) {
            Ok(Pushed::Updated(updated_at)) => {
                if let Some(body) = issues[index].all_comments.first_mut() {
                    body.updated_at = format_comment_time(updated_at, timezone);
                }
                report.count += 1;
            }
            Ok(Pushed::Refused(message)) => {
                report.messages.push(message);
                report.ignored.issues.push(index);
            }
            Err(err) => {
                warn!("Failed to update issue {number}: {err}");
                report.messages.push(format!("Failed to update issue {number}: {err}"));
                report.ignored.issues.push(index);
            }
        }
    }

    report
        .messages
        .push(format!("Updated {} issues on {}.", report.count, tracker.name()));
    Ok(report)
}

/// Returns whether the remote state had to change.
fn sync_completion(tracker: &dyn IssueTracker, issue: &Issue) -> Result<bool, SyncError> {
    let remote = tracker.fetch_issue(issue.number)?;
    let target = match (issue.complete, remote.state) {
        (true, IssueState::Open) => IssueState::Closed,
        (false, IssueState::Closed) => IssueState::Open,
        _ => return Ok(false),
    };
    let edit = IssueEdit {
        state: Some(target),
        ..IssueEdit::default()
    };
    tracker.edit_issue(issue.number, &edit)?;
    Ok(true)
}

/// Opens or closes remote issues so they match the diary's checkboxes.
pub fn complete_issues(tracker: &dyn IssueTracker, issues: &[Issue]) -> Result<UploadReport, SyncError> {
    let mut report = UploadReport::default();

    for (index, issue) in issues.iter().enumerate().filter(|(_, issue)| issue.number != 0) {
        match sync_completion(tracker, issue) {
            Ok(true) => report.count += 1,
            Ok(false) => {}
            Err(err) => {
                warn!("Failed to sync completion of issue {}: {err}", issue.number);
                report
                    .messages
                    .push(format!("Failed to change the completion status of issue {}: {err}", issue.number));
                report.ignored.issues.push(index);
            }
        }
    }

    report.messages.push(format!(
        "Changed the completion status of {} issues on {}.",
        report.count,
        tracker.name()
    ));
    Ok(report)
}
