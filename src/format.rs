use chrono::NaiveDate;

use crate::markdown::{MarkdownStyle, check_markdown_style};
use crate::models::{CalendarEvent, Comment, Issue};
use crate::parser::{
    COMMENT_HEADING_LEVEL, DIARY_TITLE_PREFIX, ISSUE_HEADING_LEVEL, ISSUES_HEADING,
    SCHEDULE_HEADING,
};
use crate::sort::{SortOrder, sorted_issues};
use crate::timestamp::{DATE_FORMAT, display_timestamp};

const EMPTY_TODO: &str = "[ ]";
const CHECKED_TODO: &str = "[X]";
const BULLET_POINT: &str = "-";

pub fn issue_header(issue: &Issue) -> String {
    let checkbox = if issue.complete { CHECKED_TODO } else { EMPTY_TODO };
    let mut header = format!("{ISSUE_HEADING_LEVEL} {checkbox} Issue {{{}}}:", issue.number);
    for label in &issue.labels {
        header.push_str(" +label:");
        header.push_str(label);
    }
    for tag in &issue.metadata {
        header.push(' ');
        header.push_str(&tag.to_string());
    }
    header.trim_end().to_string()
}

pub fn comment_header(comment: &Comment) -> String {
    let mut header = format!(
        "{COMMENT_HEADING_LEVEL} Comment {{{}}} - {}:",
        comment.number, comment.updated_at
    );
    for tag in &comment.tags {
        header.push(' ');
        header.push_str(&tag.to_string());
    }
    header
}

/// Issue records to diary lines, in the order given.
pub fn format_issues(issues: &[Issue]) -> Vec<String> {
    let mut lines = Vec::new();
    for issue in issues {
        lines.push(issue_header(issue));
        lines.push(String::new());
        lines.push(format!("{COMMENT_HEADING_LEVEL} Title: {}", issue.title));
        lines.push(String::new());

        for comment in &issue.all_comments {
            lines.push(comment_header(comment));
            lines.extend(
                comment
                    .body
                    .iter()
                    .map(|line| check_markdown_style(line, MarkdownStyle::Vimwiki)),
            );
            lines.push(String::new());
        }
    }
    lines
}

/// Event lines followed by the blank line that closes the schedule.
pub fn format_events(events: &[CalendarEvent], date: NaiveDate) -> Vec<String> {
    let mut lines: Vec<String> = events
        .iter()
        .map(|event| {
            format!(
                "{BULLET_POINT} {} - {}: {}",
                display_timestamp(&event.start, date),
                display_timestamp(&event.end, date),
                event.name
            )
        })
        .collect();
    lines.push(String::new());
    lines
}

pub fn produce_issue_markdown(issues: &[Issue], order: &SortOrder) -> Vec<String> {
    let mut lines = vec![ISSUES_HEADING.to_string(), String::new()];
    lines.extend(format_issues(&sorted_issues(issues, order)));
    lines
}

pub fn produce_schedule_markdown(events: &[CalendarEvent], date: NaiveDate) -> Vec<String> {
    let mut lines = vec![SCHEDULE_HEADING.to_string(), String::new()];
    lines.extend(format_events(events, date));
    lines
}

fn markdown_metadata(date: NaiveDate) -> Vec<String> {
    vec![
        "<!---".to_string(),
        format!("    Date: {}", date.format(DATE_FORMAT)),
        "    Tags:".to_string(),
        "--->".to_string(),
    ]
}

/// A fresh diary page: metadata, title, one section per daily heading, then
/// the Issues and Schedule sections.
pub fn make_diary_template(
    date: NaiveDate,
    daily_headings: &[String],
    issues: &[Issue],
    events: &[CalendarEvent],
    order: &SortOrder,
) -> Vec<String> {
    let mut lines = markdown_metadata(date);
    lines.push(format!("{DIARY_TITLE_PREFIX}{}", date.format(DATE_FORMAT)));
    lines.push(String::new());
    for heading in daily_headings {
        lines.push(format!("## {heading}"));
        lines.push(String::new());
    }
    lines.extend(produce_issue_markdown(issues, order));
    lines.extend(produce_schedule_markdown(events, date));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Tag, UNSYNCED_TIMESTAMP};
    use crate::parser::{parse_event_lines, parse_issue_lines};

    fn diary_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2018, 1, 1).unwrap()
    }

    fn comment(number: usize, body: &[&str], tags: Vec<Tag>, updated_at: &str) -> Comment {
        Comment {
            number,
            body: body.iter().map(|line| line.to_string()).collect(),
            tags,
            updated_at: updated_at.to_string(),
        }
    }

    fn sample_issues() -> Vec<Issue> {
        vec![
            Issue {
                number: 1,
                title: "Test Issue".to_string(),
                complete: false,
                labels: vec!["backlog".to_string(), "personal".to_string()],
                all_comments: vec![comment(0, &["Line 1", "Line 2"], vec![], "2018-08-19 18:18")],
                metadata: vec![],
            },
            Issue {
                number: 2,
                title: "Test Issue 2".to_string(),
                complete: true,
                labels: vec!["personal".to_string()],
                all_comments: vec![comment(0, &["Line 1", "Line 2"], vec![], "2018-08-19 18:18")],
                metadata: vec![],
            },
            Issue {
                number: 3,
                title: "Test Issue 3".to_string(),
                complete: false,
                labels: vec!["inprogress".to_string(), "work".to_string()],
                all_comments: vec![
                    comment(0, &["Line 1", "Line 2"], vec![], "2018-08-19 18:18"),
                    comment(1, &["Line 2-1", "Line 2-2"], vec![Tag::Edit], "2018-08-19 12:18"),
                ],
                metadata: vec![],
            },
        ]
    }

    #[test]
    fn issue_markdown_is_sorted_and_formatted() {
        let expected = vec![
            "## Issues",
            "",
            "### [ ] Issue {3}: +label:inprogress +label:work",
            "",
            "#### Title: Test Issue 3",
            "",
            "#### Comment {0} - 2018-08-19 18:18:",
            "Line 1",
            "Line 2",
            "",
            "#### Comment {1} - 2018-08-19 12:18: +edit",
            "Line 2-1",
            "Line 2-2",
            "",
            "### [ ] Issue {1}: +label:backlog +label:personal",
            "",
            "#### Title: Test Issue",
            "",
            "#### Comment {0} - 2018-08-19 18:18:",
            "Line 1",
            "Line 2",
            "",
            "### [X] Issue {2}: +label:personal",
            "",
            "#### Title: Test Issue 2",
            "",
            "#### Comment {0} - 2018-08-19 18:18:",
            "Line 1",
            "Line 2",
            "",
        ];
        assert_eq!(produce_issue_markdown(&sample_issues(), &SortOrder::default()), expected);
    }

    #[test]
    fn issue_round_trip_is_lossless() {
        let issue = Issue {
            number: 1,
            title: "Test Issue".to_string(),
            complete: false,
            labels: vec!["backlog".to_string(), "personal".to_string()],
            all_comments: vec![comment(0, &["This is the main issue body"], vec![], "2018-01-01 12:00")],
            metadata: vec![],
        };
        let reparsed = parse_issue_lines(&format_issues(&[issue.clone()]));
        assert_eq!(reparsed, vec![issue]);

        let issues = sample_issues();
        let formatted = format_issues(&issues);
        assert_eq!(parse_issue_lines(&formatted), issues);
        assert_eq!(format_issues(&parse_issue_lines(&formatted)), formatted);
    }

    #[test]
    fn draft_comment_survives_round_trip() {
        let draft = Issue {
            number: 0,
            title: String::new(),
            complete: false,
            labels: vec![],
            all_comments: vec![Comment::draft(0)],
            metadata: vec![Tag::New],
        };
        let formatted = format_issues(&[draft.clone()]);
        assert_eq!(formatted[0], "### [ ] Issue {0}: +new");
        assert_eq!(formatted[4], format!("#### Comment {{0}} - {UNSYNCED_TIMESTAMP}: +new"));
        assert_eq!(parse_issue_lines(&formatted), vec![draft]);
    }

    #[test]
    fn body_checkboxes_render_in_vimwiki_style() {
        let mut issues = sample_issues();
        issues[0].all_comments[0].body = vec!["- [x] shipped".to_string()];
        let formatted = format_issues(&issues[..1]);
        assert_eq!(formatted[5], "- [X] shipped");
    }

    #[test]
    fn schedule_markdown_matches_layout() {
        let events = vec![
            CalendarEvent::new("Event 1", "2018-01-01T10:00:00", "2018-01-01T11:00:00"),
            CalendarEvent::new("Event 2", "2018-01-01T14:00:00", "2018-01-02T15:00:00"),
        ];
        let expected = vec![
            "## Schedule",
            "",
            "- 10:00 - 11:00: Event 1",
            "- 14:00 - 02/01/2018 15:00: Event 2",
            "",
        ];
        assert_eq!(produce_schedule_markdown(&events, diary_day()), expected);

        let lines = format_events(&events, diary_day());
        assert_eq!(parse_event_lines(&lines, diary_day()), events);
    }

    #[test]
    fn empty_template_has_every_section() {
        let lines = make_diary_template(
            diary_day(),
            &["Notes".to_string()],
            &[],
            &[],
            &SortOrder::default(),
        );
        let expected = vec![
            "<!---",
            "    Date: 2018-01-01",
            "    Tags:",
            "--->",
            "# Diary for 2018-01-01",
            "",
            "## Notes",
            "",
            "## Issues",
            "",
            "## Schedule",
            "",
            "",
        ];
        assert_eq!(lines, expected);
    }
}
