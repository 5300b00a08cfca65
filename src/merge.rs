use std::cmp::Ordering;

use chrono::NaiveDate;
use log::{debug, info};

use crate::models::{CalendarEvent, Comment, Issue, Tag};
use crate::timestamp::normalize_timestamp;

/// Result of folding the diary's issues into freshly fetched remote ones.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub issues: Vec<Issue>,
    /// Local issues with no remote counterpart.
    pub added: usize,
    /// Local edits whose basis predates the remote copy.
    pub conflicts: usize,
}

fn normalize_event(event: &CalendarEvent, date: NaiveDate) -> CalendarEvent {
    CalendarEvent {
        name: event.name.clone(),
        start: normalize_timestamp(&event.start, date),
        end: normalize_timestamp(&event.end, date),
        calendar: event.calendar.clone(),
    }
}

fn same_event(a: &CalendarEvent, b: &CalendarEvent) -> bool {
    a.name == b.name && a.start == b.start && a.end == b.end
}

/// The diary's schedule followed by any remote events it does not already hold.
///
/// The calendar name is not part of an event's identity; a diary line never
/// records which calendar it came from.
pub fn combine_events(
    markdown: &[CalendarEvent],
    remote: &[CalendarEvent],
    date: NaiveDate,
) -> Vec<CalendarEvent> {
    let mut combined: Vec<CalendarEvent> = markdown
        .iter()
        .map(|event| normalize_event(event, date))
        .collect();

    for event in remote.iter().map(|event| normalize_event(event, date)) {
        if !combined.iter().any(|existing| same_event(existing, &event)) {
            combined.push(event);
        }
    }

    combined
}

/// Remote issues are the base; local dirty records are layered on top.
///
/// Comments are aligned by their `number`, not their position, so a
/// previously appended conflict copy never shifts the alignment.
pub fn combine_issues(markdown: &[Issue], remote: &[Issue]) -> MergeOutcome {
    let mut outcome = MergeOutcome {
        issues: remote.to_vec(),
        ..MergeOutcome::default()
    };

    for local in markdown {
        let base = outcome
            .issues
            .iter_mut()
            .find(|issue| local.number != 0 && issue.number == local.number);

        let Some(base) = base else {
            debug!("Keeping local-only issue {{{}}}", local.number);
            outcome.issues.push(local.clone());
            outcome.added += 1;
            continue;
        };

        outcome.conflicts += merge_issue(base, local);
    }

    info!(
        "Merged {} local issues into {} remote issues: {} added, {} conflicts",
        markdown.len(),
        remote.len(),
        outcome.added,
        outcome.conflicts
    );
    outcome
}

/// Applies one local issue onto its remote counterpart; returns the conflict count.
fn merge_issue(base: &mut Issue, local: &Issue) -> usize {
    let mut conflicts = 0;

    // The checkbox in the diary is authoritative until it is uploaded.
    base.complete = local.complete;

    if local.has_tag(&Tag::Edit) {
        let local_basis = local.body().map_or("", |comment| comment.updated_at.as_str());
        let remote_basis = base.body().map_or("", |comment| comment.updated_at.as_str());
        if local_basis >= remote_basis {
            base.title = local.title.clone();
            base.labels = local.labels.clone();
            add_issue_tag(base, Tag::Edit);
        } else {
            add_issue_tag(base, Tag::Conflict);
            conflicts += 1;
        }
    }

    for comment in &local.all_comments {
        let position = base
            .all_comments
            .iter()
            .position(|existing| existing.number == comment.number);

        let Some(index) = position else {
            base.all_comments.push(comment.clone());
            continue;
        };

        if comment.has_tag(&Tag::New) {
            let mut appended = comment.clone();
            appended.number = base.all_comments.len();
            base.all_comments.push(appended);
            continue;
        }

        if !comment.has_tag(&Tag::Edit) {
            continue;
        }

        match comment.updated_at.as_str().cmp(base.all_comments[index].updated_at.as_str()) {
            Ordering::Equal | Ordering::Greater => base.all_comments[index] = comment.clone(),
            Ordering::Less => {
                debug!(
                    "Comment {{{}}} on issue {{{}}} changed remotely since it was edited",
                    comment.number, base.number
                );
                base.all_comments.push(conflict_copy(comment, base.all_comments.len()));
                conflicts += 1;
            }
        }
    }

    conflicts
}

fn conflict_copy(comment: &Comment, number: usize) -> Comment {
    let mut copy = comment.clone();
    copy.number = number;
    copy.add_tag(Tag::Edit);
    copy.add_tag(Tag::Conflict);
    copy
}

fn add_issue_tag(issue: &mut Issue, tag: Tag) {
    if !issue.metadata.contains(&tag) {
        issue.metadata.push(tag);
    }
}
