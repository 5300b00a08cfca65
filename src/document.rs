use std::ops::Range;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::buffer::TextBuffer;
use crate::error::DiaryError;
use crate::format::{comment_header, format_issues, produce_schedule_markdown};
use crate::models::{CalendarEvent, Comment, Issue, Tag};
use crate::parser::{
    ISSUES_HEADING, LineToken, SCHEDULE_HEADING, classify_line, find_heading, parse_buffer_events,
    section_range,
};
use crate::sort::{SortOrder, sorted_issues};
use crate::tags::upsert_tag;
use crate::timestamp::parse_timestamp;

const DRAFT_ISSUE_HEADING: &str = "### [ ] Issue {00}: +new";
const DRAFT_TITLE: &str = "#### Title: ";

/// Which heading an `+edit` marker is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditTarget {
    Issue,
    Comment,
}

impl FromStr for EditTarget {
    type Err = DiaryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "issue" => Ok(EditTarget::Issue),
            "comment" => Ok(EditTarget::Comment),
            other => Err(DiaryError::UnknownTarget(other.to_string())),
        }
    }
}

/// Replaces the Issues section with `issues`, sorting them when `order` is given.
pub fn set_issues_from_issues_list<B: TextBuffer + ?Sized>(
    buffer: &mut B,
    issues: &[Issue],
    order: Option<&SortOrder>,
) {
    let mut lines = vec![String::new()];
    match order {
        Some(order) => lines.extend(format_issues(&sorted_issues(issues, order))),
        None => lines.extend(format_issues(issues)),
    }
    replace_section(buffer, ISSUES_HEADING, lines, Some(SCHEDULE_HEADING));
}

pub fn set_schedule_from_events_list<B: TextBuffer + ?Sized>(
    buffer: &mut B,
    events: &[CalendarEvent],
    date: NaiveDate,
) {
    let mut lines = produce_schedule_markdown(events, date);
    lines.remove(0);
    replace_section(buffer, SCHEDULE_HEADING, lines, None);
}

/// Rewrites a section body; a missing section is created before `before`, or
/// at the end of the buffer.
fn replace_section<B: TextBuffer + ?Sized>(
    buffer: &mut B,
    heading: &str,
    body: Vec<String>,
    before: Option<&str>,
) {
    if let Some(range) = section_range(buffer.lines(), heading) {
        buffer.set_lines(range.start, range.end, body);
        return;
    }

    let at = before
        .and_then(|next| find_heading(buffer.lines(), next))
        .unwrap_or(buffer.lines().len());
    let mut lines = vec![heading.to_string()];
    lines.extend(body);
    buffer.set_lines(at, at, lines);
}

/// Drops schedule entries that start on a different day than the diary.
pub fn remove_events_not_from_today<B: TextBuffer + ?Sized>(buffer: &mut B, date: NaiveDate) -> bool {
    let events = parse_buffer_events(buffer.lines(), date);
    let kept: Vec<_> = events
        .iter()
        .filter(|event| parse_timestamp(&event.start, date).is_some_and(|start| start.date() == date))
        .cloned()
        .collect();
    if kept.len() == events.len() {
        return false;
    }
    set_schedule_from_events_list(buffer, &kept, date);
    true
}

/// Appends a draft issue to the Issues section and puts the cursor on its title.
pub fn insert_new_issue<B: TextBuffer + ?Sized>(buffer: &mut B) -> bool {
    let Some(range) = section_range(buffer.lines(), ISSUES_HEADING) else {
        return false;
    };

    let draft = vec![
        DRAFT_ISSUE_HEADING.to_string(),
        String::new(),
        DRAFT_TITLE.to_string(),
        String::new(),
        comment_header(&Comment::draft(0)),
        String::new(),
    ];
    buffer.set_lines(range.end, range.end, draft);
    buffer.set_cursor(range.end + 3, DRAFT_TITLE.len() - 1);
    true
}

/// Appends a draft comment to the issue under the cursor.
pub fn insert_new_comment<B: TextBuffer + ?Sized>(buffer: &mut B) -> bool {
    let Some(issue) = issue_under_cursor(&*buffer) else {
        return false;
    };

    let existing = buffer.lines()[issue.clone()]
        .iter()
        .filter(|line| matches!(classify_line(line), LineToken::CommentStart { .. }))
        .count();
    let lines = vec![comment_header(&Comment::draft(existing)), String::new(), String::new()];
    buffer.set_lines(issue.end, issue.end, lines);
    buffer.set_cursor(issue.end + 2, 0);
    true
}

/// Marks the issue or comment under the cursor with `+edit`.
pub fn insert_edit_tag<B: TextBuffer + ?Sized>(buffer: &mut B, target: EditTarget) -> bool {
    let Some(issue) = issue_under_cursor(&*buffer) else {
        return false;
    };

    let heading = match target {
        EditTarget::Issue => issue.start,
        EditTarget::Comment => {
            let cursor = cursor_index(&*buffer).unwrap_or(issue.start);
            let found = (issue.start..=cursor).rev().find(|&index| {
                matches!(classify_line(&buffer.lines()[index]), LineToken::CommentStart { .. })
            });
            match found {
                Some(index) => index,
                None => return false,
            }
        }
    };

    let tagged = upsert_tag(&buffer.lines()[heading], &Tag::Edit);
    if tagged == buffer.lines()[heading] {
        return false;
    }
    buffer.set_lines(heading, heading + 1, vec![tagged]);
    true
}

/// Flips the checkbox on the issue under the cursor.
pub fn toggle_issue_completion<B: TextBuffer + ?Sized>(buffer: &mut B) -> bool {
    let Some(issue) = issue_under_cursor(&*buffer) else {
        return false;
    };

    let line = &buffer.lines()[issue.start];
    let toggled = if let Some(rest) = line.strip_prefix("### [ ]") {
        format!("### [X]{rest}")
    } else if let Some(rest) = line.strip_prefix("### [X]").or_else(|| line.strip_prefix("### [x]")) {
        format!("### [ ]{rest}")
    } else {
        return false;
    };
    buffer.set_lines(issue.start, issue.start + 1, vec![toggled]);
    true
}

fn cursor_index<B: TextBuffer + ?Sized>(buffer: &B) -> Option<usize> {
    let (row, _) = buffer.cursor();
    let index = row.checked_sub(1)?;
    (index < buffer.lines().len()).then_some(index)
}

/// Line range of the issue containing the cursor, from its heading up to the
/// next issue heading or the end of the Issues section.
fn issue_under_cursor<B: TextBuffer + ?Sized>(buffer: &B) -> Option<Range<usize>> {
    let cursor = cursor_index(buffer)?;
    let section = section_range(buffer.lines(), ISSUES_HEADING)?;
    if !section.contains(&cursor) {
        return None;
    }

    let lines = buffer.lines();
    let is_issue = |index: &usize| matches!(classify_line(&lines[*index]), LineToken::IssueStart { .. });
    let start = (section.start..=cursor).rev().find(is_issue)?;
    let end = (start + 1..section.end).find(is_issue).unwrap_or(section.end);
    Some(start..end)
}
