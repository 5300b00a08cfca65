use std::ops::Range;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::models::{CalendarEvent, Comment, Issue, Tag};
use crate::tags::parse_tag_tokens;
use crate::timestamp::{normalize_timestamp, parse_date};

pub const ISSUES_HEADING: &str = "## Issues";
pub const SCHEDULE_HEADING: &str = "## Schedule";
pub const DIARY_TITLE_PREFIX: &str = "# Diary for ";
pub const ISSUE_HEADING_LEVEL: &str = "###";
pub const COMMENT_HEADING_LEVEL: &str = "####";

fn issue_start_regex() -> &'static Regex {
    static ISSUE_START: OnceLock<Regex> = OnceLock::new();
    ISSUE_START.get_or_init(|| {
        Regex::new(r"^### \[([ xX])\] Issue \{([0-9]+)\}:(.*)$").expect("Valid issue regex")
    })
}

fn comment_start_regex() -> &'static Regex {
    static COMMENT_START: OnceLock<Regex> = OnceLock::new();
    COMMENT_START.get_or_init(|| {
        Regex::new(r"^#### Comment \{([0-9]+)\} - ([0-9]{4}-[0-9]{2}-[0-9]{2} [0-9]{2}:[0-9]{2}):(.*)$")
            .expect("Valid comment regex")
    })
}

fn event_regex() -> &'static Regex {
    static EVENT: OnceLock<Regex> = OnceLock::new();
    EVENT.get_or_init(|| {
        let stamp = r"(?:[0-9]{1,2}/[0-9]{1,2}/[0-9]{4} [0-9]{1,2}:[0-9]{1,2}|[0-9]{1,2}:[0-9]{1,2})";
        Regex::new(&format!(r"^\s*-\s+({stamp})\s+-\s+({stamp}):\s?(.*)$")).expect("Valid event regex")
    })
}

const TITLE_PREFIX: &str = "#### Title:";

/// One classified diary line inside the Issues section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineToken<'a> {
    IssueStart {
        number: u64,
        complete: bool,
        labels: Vec<String>,
        tags: Vec<Tag>,
    },
    Title(&'a str),
    CommentStart {
        number: usize,
        updated_at: &'a str,
        tags: Vec<Tag>,
    },
    Text(&'a str),
    Blank,
}

pub fn classify_line(line: &str) -> LineToken<'_> {
    if line.trim().is_empty() {
        return LineToken::Blank;
    }

    if let Some(caps) = issue_start_regex().captures(line) {
        let (labels, tags) = parse_tag_tokens(caps.get(3).map_or("", |m| m.as_str()));
        return LineToken::IssueStart {
            number: caps[2].parse().unwrap_or(0),
            complete: !caps[1].trim().is_empty(),
            labels,
            tags,
        };
    }

    if let Some(title) = line.strip_prefix(TITLE_PREFIX) {
        return LineToken::Title(title.trim());
    }

    if let Some(caps) = comment_start_regex().captures(line) {
        let (_, tags) = parse_tag_tokens(caps.get(3).map_or("", |m| m.as_str()));
        return LineToken::CommentStart {
            number: caps[1].parse().unwrap_or(0),
            updated_at: caps.get(2).map_or("", |m| m.as_str()),
            tags,
        };
    }

    LineToken::Text(line)
}

/// Builds issue records from the lines of an Issues section.
///
/// Lines before the first issue heading are ignored, as are text lines
/// between an issue heading and its first comment.
pub fn parse_issue_lines<S: AsRef<str>>(lines: &[S]) -> Vec<Issue> {
    let mut issues: Vec<Issue> = Vec::new();
    let mut comment_open = false;

    for line in lines {
        match classify_line(line.as_ref()) {
            LineToken::IssueStart {
                number,
                complete,
                labels,
                tags,
            } => {
                issues.push(Issue {
                    number,
                    title: String::new(),
                    complete,
                    labels,
                    all_comments: Vec::new(),
                    metadata: tags,
                });
                comment_open = false;
            }
            LineToken::Title(title) => {
                if let Some(issue) = issues.last_mut() {
                    issue.title = title.to_string();
                }
                comment_open = false;
            }
            LineToken::CommentStart {
                number,
                updated_at,
                tags,
            } => {
                if let Some(issue) = issues.last_mut() {
                    issue.all_comments.push(Comment {
                        number,
                        body: Vec::new(),
                        tags,
                        updated_at: updated_at.to_string(),
                    });
                    comment_open = true;
                }
            }
            LineToken::Text(text) => {
                if comment_open && let Some(comment) = open_comment(&mut issues) {
                    comment.body.push(text.to_string());
                }
            }
            LineToken::Blank => {
                if comment_open && let Some(comment) = open_comment(&mut issues) {
                    comment.body.push(String::new());
                }
            }
        }
    }

    for issue in &mut issues {
        if issue.all_comments.is_empty() {
            issue.all_comments.push(Comment::draft(0));
        }
        for comment in &mut issue.all_comments {
            if comment.body.last().is_some_and(|line| line.is_empty()) {
                comment.body.pop();
            }
            if comment.body.is_empty() {
                comment.body.push(String::new());
            }
        }
    }

    issues
}

fn open_comment(issues: &mut [Issue]) -> Option<&mut Comment> {
    issues.last_mut()?.all_comments.last_mut()
}

/// Builds events from Schedule lines; anything that is not an event line is skipped.
pub fn parse_event_lines<S: AsRef<str>>(lines: &[S], date: NaiveDate) -> Vec<CalendarEvent> {
    lines
        .iter()
        .filter_map(|line| {
            let caps = event_regex().captures(line.as_ref())?;
            Some(CalendarEvent::new(
                caps[3].trim(),
                normalize_timestamp(&caps[1], date),
                normalize_timestamp(&caps[2], date),
            ))
        })
        .collect()
}

pub fn find_heading<S: AsRef<str>>(lines: &[S], heading: &str) -> Option<usize> {
    lines.iter().position(|line| line.as_ref().trim_end() == heading)
}

/// Body rows of a `##` section: after its heading, up to the next `#`/`##` heading.
///
/// Issue bodies may carry headings of their own, so the Issues section runs
/// up to the Schedule heading, or the end of the buffer.
pub fn section_range<S: AsRef<str>>(lines: &[S], heading: &str) -> Option<Range<usize>> {
    let start = find_heading(lines, heading)? + 1;
    let rest = &lines[start..];
    let offset = if heading == ISSUES_HEADING {
        find_heading(rest, SCHEDULE_HEADING)
    } else {
        rest.iter().position(|line| is_section_boundary(line.as_ref()))
    };
    Some(start..offset.map_or(lines.len(), |offset| start + offset))
}

fn is_section_boundary(line: &str) -> bool {
    line.starts_with("# ") || line.starts_with("## ")
}

pub fn parse_buffer_issues<S: AsRef<str>>(lines: &[S]) -> Vec<Issue> {
    match section_range(lines, ISSUES_HEADING) {
        Some(range) => parse_issue_lines(&lines[range]),
        None => Vec::new(),
    }
}

pub fn parse_buffer_events<S: AsRef<str>>(lines: &[S], date: NaiveDate) -> Vec<CalendarEvent> {
    match section_range(lines, SCHEDULE_HEADING) {
        Some(range) => parse_event_lines(&lines[range], date),
        None => Vec::new(),
    }
}

/// Date of the diary page, from its title or its metadata block.
pub fn diary_date<S: AsRef<str>>(lines: &[S]) -> Option<NaiveDate> {
    lines.iter().find_map(|line| {
        let line = line.as_ref();
        line.strip_prefix(DIARY_TITLE_PREFIX)
            .or_else(|| line.trim_start().strip_prefix("Date:"))
            .and_then(parse_date)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UNSYNCED_TIMESTAMP;

    fn diary_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2018, 1, 1).unwrap()
    }

    fn sample_buffer() -> Vec<&'static str> {
        vec![
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
            "### [ ] Issue {1}: +label:work",
            "",
            "#### Title: Test Issue 1",
            "",
            "#### Comment {0} - 2018-01-01 12:00:",
            "Test comment body.",
            "",
            "- [X] done item",
            "",
            "#### Comment {1} - 2018-01-01 13:00: +edit",
            "Second comment.",
            "",
            "### [X] Issue {2}: +label:backlog +label:personal +new",
            "",
            "#### Title: Another",
            "",
            "#### Comment {0} - 0000-00-00 00:00: +new",
            "",
            "## Schedule",
            "",
            "- 10:00 - 11:00: Event 1",
            "- 02/01/2018 19:00 - 02/01/2018 22:00: Event 2",
            "not an event",
            "",
        ]
    }

    #[test]
    fn classifies_each_kind_of_line() {
        assert_eq!(classify_line("   "), LineToken::Blank);
        assert_eq!(classify_line("#### Title:  Hello "), LineToken::Title("Hello"));
        assert_eq!(classify_line("plain"), LineToken::Text("plain"));
        assert_eq!(
            classify_line("### [X] Issue {7}: +label:work +edit"),
            LineToken::IssueStart {
                number: 7,
                complete: true,
                labels: vec!["work".to_string()],
                tags: vec![Tag::Edit],
            }
        );
        assert_eq!(
            classify_line("#### Comment {2} - 2018-01-01 12:00: +new"),
            LineToken::CommentStart {
                number: 2,
                updated_at: "2018-01-01 12:00",
                tags: vec![Tag::New],
            }
        );
        assert_eq!(
            classify_line("### [ ] Issue {00}: +new"),
            LineToken::IssueStart {
                number: 0,
                complete: false,
                labels: vec![],
                tags: vec![Tag::New],
            }
        );
    }

    #[test]
    fn parses_issues_section() {
        let issues = parse_buffer_issues(&sample_buffer());
        assert_eq!(issues.len(), 2);

        let first = &issues[0];
        assert_eq!(first.number, 1);
        assert!(!first.complete);
        assert_eq!(first.title, "Test Issue 1");
        assert_eq!(first.labels, vec!["work"]);
        assert_eq!(first.all_comments.len(), 2);
        assert_eq!(
            first.all_comments[0].body,
            vec!["Test comment body.", "", "- [X] done item"]
        );
        assert_eq!(first.all_comments[1].tags, vec![Tag::Edit]);
        assert_eq!(first.all_comments[1].updated_at, "2018-01-01 13:00");

        let second = &issues[1];
        assert!(second.complete);
        assert_eq!(second.labels, vec!["backlog", "personal"]);
        assert_eq!(second.metadata, vec![Tag::New]);
        assert_eq!(second.all_comments[0].body, vec![""]);
        assert_eq!(second.all_comments[0].updated_at, UNSYNCED_TIMESTAMP);
    }

    #[test]
    fn missing_sections_parse_as_empty() {
        let lines = vec!["# Diary for 2018-01-01", "", "## Notes"];
        assert!(parse_buffer_issues(&lines).is_empty());
        assert!(parse_buffer_events(&lines, diary_day()).is_empty());
    }

    #[test]
    fn parses_events_and_skips_noise() {
        let events = parse_buffer_events(&sample_buffer(), diary_day());
        assert_eq!(
            events,
            vec![
                CalendarEvent::new("Event 1", "2018-01-01T10:00:00", "2018-01-01T11:00:00"),
                CalendarEvent::new("Event 2", "2018-01-02T19:00:00", "2018-01-02T22:00:00"),
            ]
        );
    }

    #[test]
    fn finds_the_diary_date() {
        assert_eq!(diary_date(&sample_buffer()), Some(diary_day()));
        assert_eq!(diary_date(&["# Diary for 2019-05-04"]), NaiveDate::from_ymd_opt(2019, 5, 4));
        assert_eq!(diary_date(&["nothing here"]), None);
    }

    #[test]
    fn issues_section_spans_headings_in_bodies() {
        let lines = [
            "## Issues",
            "",
            "### [ ] Issue {1}:",
            "",
            "#### Title: Steps",
            "",
            "#### Comment {0} - 2018-01-01 12:00:",
            "## Steps",
            "# Done",
            "",
            "### [ ] Issue {2}:",
            "",
            "#### Title: Second",
            "",
            "## Schedule",
            "",
        ];
        assert_eq!(section_range(&lines, ISSUES_HEADING), Some(1..14));

        let issues = parse_buffer_issues(&lines);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].all_comments[0].body, vec!["## Steps", "# Done"]);
        assert_eq!(section_range(&lines[..14], ISSUES_HEADING), Some(1..14));
    }

    #[test]
    fn section_range_stops_at_next_heading() {
        let lines = sample_buffer();
        let range = section_range(&lines, ISSUES_HEADING).unwrap();
        assert_eq!(range, 9..28);
        let schedule = section_range(&lines, SCHEDULE_HEADING).unwrap();
        assert_eq!(schedule.end, lines.len());
    }
}
