use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use chrono_tz::Tz;
use log::{info, warn};

use crate::buffer::TextBuffer;
use crate::cache::{Cache, EVENT_CACHE_DURATION, ISSUE_CACHE_DURATION};
use crate::config::Config;
use crate::document::{
    EditTarget, insert_edit_tag, insert_new_comment, insert_new_issue, remove_events_not_from_today,
    set_issues_from_issues_list, set_schedule_from_events_list, toggle_issue_completion,
};
use crate::error::{DiaryError, DiaryResult, SyncError};
use crate::format::make_diary_template;
use crate::integrations::github::GitHubTracker;
use crate::integrations::google::GoogleCalendar;
use crate::integrations::{CalendarService, IssueTracker, fetch_issues};
use crate::merge::{combine_events, combine_issues};
use crate::models::{CalendarEvent, Issue, Tag};
use crate::parser::{parse_buffer_events, parse_buffer_issues};
use crate::sort::{sort_events, sorted_issues};
use crate::tags::{TagScope, remove_tag_from_issues};
use crate::timestamp::DATE_FORMAT;
use crate::upload::{complete_issues, update_comments, update_issues, upload_comments, upload_issues};

const ISSUES_CACHE: &str = "issues";

/// Every action the editor can ask for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Fill an empty buffer with today's template. `auto` is set when the
    /// editor opens a diary file rather than the user asking.
    MakeDiary { auto: bool },
    UploadCalendar,
    GrabCalendar,
    UpdateCalendar,
    SortCalendar,
    GetIssues,
    SortIssues,
    InsertIssue,
    InsertComment,
    EditIssue,
    EditComment,
    ToggleCompletion,
    UploadNew,
    UploadEdits,
    UploadCompletion,
    UploadIssues,
}

impl Command {
    pub const NAMES: [&'static str; 16] = [
        "make_diary",
        "upload_calendar",
        "grab_calendar",
        "update_calendar",
        "sort_calendar",
        "get_issues",
        "sort_issues",
        "insert_issue",
        "insert_comment",
        "edit_issue",
        "edit_comment",
        "toggle_completion",
        "upload_new",
        "upload_edits",
        "upload_completion",
        "upload_issues",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Command::MakeDiary { .. } => "make_diary",
            Command::UploadCalendar => "upload_calendar",
            Command::GrabCalendar => "grab_calendar",
            Command::UpdateCalendar => "update_calendar",
            Command::SortCalendar => "sort_calendar",
            Command::GetIssues => "get_issues",
            Command::SortIssues => "sort_issues",
            Command::InsertIssue => "insert_issue",
            Command::InsertComment => "insert_comment",
            Command::EditIssue => "edit_issue",
            Command::EditComment => "edit_comment",
            Command::ToggleCompletion => "toggle_completion",
            Command::UploadNew => "upload_new",
            Command::UploadEdits => "upload_edits",
            Command::UploadCompletion => "upload_completion",
            Command::UploadIssues => "upload_issues",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Command {
    type Err = DiaryError;

    /// Accepts `snake_case` or `kebab-case` names.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let command = match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "make_diary" => Command::MakeDiary { auto: false },
            "upload_calendar" => Command::UploadCalendar,
            "grab_calendar" => Command::GrabCalendar,
            "update_calendar" => Command::UpdateCalendar,
            "sort_calendar" => Command::SortCalendar,
            "get_issues" => Command::GetIssues,
            "sort_issues" => Command::SortIssues,
            "insert_issue" => Command::InsertIssue,
            "insert_comment" => Command::InsertComment,
            "edit_issue" => Command::EditIssue,
            "edit_comment" => Command::EditComment,
            "toggle_completion" => Command::ToggleCompletion,
            "upload_new" => Command::UploadNew,
            "upload_edits" => Command::UploadEdits,
            "upload_completion" => Command::UploadCompletion,
            "upload_issues" => Command::UploadIssues,
            _ => return Err(DiaryError::UnknownCommand(value.to_string())),
        };
        Ok(command)
    }
}

/// Messages for the user, in the order they happened.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandReport {
    pub messages: Vec<String>,
}

impl CommandReport {
    fn say(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    fn extend(&mut self, other: CommandReport) {
        self.messages.extend(other.messages);
    }
}

/// The diary's options and remote services, shared by every command.
pub struct Diary {
    config: Config,
    cache: Cache,
    tracker: Option<Box<dyn IssueTracker>>,
    calendar: Option<Box<dyn CalendarService>>,
    timezone: Tz,
}

impl Diary {
    /// A diary with no remote services attached.
    pub fn new(config: Config) -> DiaryResult<Self> {
        let timezone = config.timezone()?;
        let cache = Cache::new(config.cache_path.clone());
        Ok(Self {
            config,
            cache,
            tracker: None,
            calendar: None,
            timezone,
        })
    }

    /// Attaches the services enabled in `config`. One that cannot be set up is
    /// logged and left out, so offline editing keeps working.
    pub fn connect(config: Config) -> DiaryResult<Self> {
        let mut diary = Self::new(config)?;

        if diary.config.github.use_github_repo {
            match GitHubTracker::new(&diary.config.github) {
                Ok(tracker) => diary.tracker = Some(Box::new(tracker)),
                Err(err) => warn!("GitHub unavailable: {err}"),
            }
        }

        if diary.config.google.use_google_calendar {
            match GoogleCalendar::connect(&diary.config.google, diary.timezone, &diary.cache) {
                Ok(calendar) => diary.calendar = Some(Box::new(calendar)),
                Err(err) => warn!("Google Calendar unavailable: {err}"),
            }
        }

        Ok(diary)
    }

    pub fn with_tracker(mut self, tracker: Box<dyn IssueTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn with_calendar(mut self, calendar: Box<dyn CalendarService>) -> Self {
        self.calendar = Some(calendar);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run(&self, command: Command, buffer: &mut dyn TextBuffer, date: NaiveDate) -> DiaryResult<CommandReport> {
        if !self.config.active {
            info!("Diary inactive, ignoring {command}");
            return Ok(CommandReport::default());
        }
        info!("Running {command} for {date}");

        match command {
            Command::MakeDiary { auto } => self.make_diary(buffer, date, auto),
            Command::UploadCalendar => self.upload_calendar(buffer, date),
            Command::GrabCalendar => self.grab_calendar(buffer, date),
            Command::UpdateCalendar => {
                let mut report = self.upload_calendar(buffer, date)?;
                report.extend(self.grab_calendar(buffer, date)?);
                Ok(report)
            }
            Command::SortCalendar => Ok(self.sort_calendar(buffer, date)),
            Command::GetIssues => self.get_issues(buffer),
            Command::SortIssues => Ok(self.sort_issues(buffer)),
            Command::InsertIssue => Ok(edited(insert_new_issue(buffer), "No Issues section to add to.")),
            Command::InsertComment => Ok(edited(insert_new_comment(buffer), "Cursor is not inside an issue.")),
            Command::EditIssue => Ok(self.edit_tag(buffer, EditTarget::Issue)),
            Command::EditComment => Ok(self.edit_tag(buffer, EditTarget::Comment)),
            Command::ToggleCompletion => {
                Ok(edited(toggle_issue_completion(buffer), "Cursor is not inside an issue."))
            }
            Command::UploadNew => self.upload_new(buffer),
            Command::UploadEdits => self.upload_edits(buffer),
            Command::UploadCompletion => self.upload_completion(buffer),
            Command::UploadIssues => {
                let mut report = self.upload_new(buffer)?;
                report.extend(self.upload_edits(buffer)?);
                report.extend(self.upload_completion(buffer)?);
                Ok(report)
            }
        }
    }

    fn tracker(&self) -> Result<&dyn IssueTracker, SyncError> {
        self.tracker.as_deref().ok_or_else(|| {
            SyncError::Config("GitHub is not set up; enable github.use_github_repo and check the log.".to_string())
        })
    }

    fn calendar(&self) -> Result<&dyn CalendarService, SyncError> {
        self.calendar.as_deref().ok_or_else(|| {
            SyncError::Config(
                "Google Calendar is not set up; enable google.use_google_calendar and check the log.".to_string(),
            )
        })
    }

    fn events_cache(date: NaiveDate) -> String {
        format!("events-{}", date.format(DATE_FORMAT))
    }

    fn cached_issues(&self) -> Result<Vec<Issue>, SyncError> {
        match self.tracker.as_deref() {
            Some(tracker) => self
                .cache
                .check(ISSUES_CACHE, ISSUE_CACHE_DURATION, || fetch_issues(tracker, self.timezone)),
            None => Ok(Vec::new()),
        }
    }

    fn cached_events(&self, date: NaiveDate) -> Result<Vec<CalendarEvent>, SyncError> {
        match self.calendar.as_deref() {
            Some(calendar) => self
                .cache
                .check(&Self::events_cache(date), EVENT_CACHE_DURATION, || calendar.fetch_events(date)),
            None => Ok(Vec::new()),
        }
    }

    fn make_diary(&self, buffer: &mut dyn TextBuffer, date: NaiveDate, auto: bool) -> DiaryResult<CommandReport> {
        let mut report = CommandReport::default();
        if !buffer.is_empty() {
            if !auto {
                report.say("Buffer is not empty, can't create diary.");
            }
            return Ok(report);
        }

        let issues = self.cached_issues()?;
        let mut events = self.cached_events(date)?;
        sort_events(&mut events);

        let lines = make_diary_template(
            date,
            &self.config.daily_headings,
            &issues,
            &events,
            &self.config.sort_order,
        );
        buffer.set_all(lines);
        info!("Created diary for {date} with {} issues and {} events", issues.len(), events.len());
        Ok(report)
    }

    /// Pushes schedule lines the calendar lacks, then drops lines for other days.
    fn upload_calendar(&self, buffer: &mut dyn TextBuffer, date: NaiveDate) -> DiaryResult<CommandReport> {
        let calendar = self.calendar()?;
        if !self.config.google.add_to_google_cal {
            let mut report = CommandReport::default();
            report.say("Uploading to Google Calendar is off; set google.add_to_google_cal to enable it.");
            return Ok(report);
        }
        let markdown = parse_buffer_events(buffer.lines(), date);
        let remote = calendar.fetch_events(date)?;

        let combined = combine_events(&remote, &markdown, date);
        let missing = &combined[remote.len()..];
        for event in missing {
            calendar.insert_event(event)?;
        }
        self.cache.invalidate(&Self::events_cache(date))?;

        let mut report = CommandReport::default();
        report.say(format!(
            "Added {} events to {} calendar.",
            missing.len(),
            self.config.google.google_cal_name
        ));
        if remove_events_not_from_today(buffer, date) {
            info!("Removed schedule entries not on {date}");
        }
        Ok(report)
    }

    fn grab_calendar(&self, buffer: &mut dyn TextBuffer, date: NaiveDate) -> DiaryResult<CommandReport> {
        let calendar = self.calendar()?;
        let markdown = parse_buffer_events(buffer.lines(), date);
        let remote = self.cached_events(date)?;

        let mut combined = combine_events(&markdown, &remote, date);
        let added = combined.len() - markdown.len();
        sort_events(&mut combined);
        set_schedule_from_events_list(buffer, &combined, date);

        let mut report = CommandReport::default();
        report.say(format!("Grabbed {added} events from {}.", calendar.name()));
        Ok(report)
    }

    fn sort_calendar(&self, buffer: &mut dyn TextBuffer, date: NaiveDate) -> CommandReport {
        let events = parse_buffer_events(buffer.lines(), date);
        let mut sorted = events.clone();
        sort_events(&mut sorted);
        if sorted != events {
            set_schedule_from_events_list(buffer, &sorted, date);
        }
        CommandReport::default()
    }

    fn get_issues(&self, buffer: &mut dyn TextBuffer) -> DiaryResult<CommandReport> {
        let tracker = self.tracker()?;
        self.cache.invalidate(ISSUES_CACHE)?;
        let remote = self.cached_issues()?;
        let markdown = parse_buffer_issues(buffer.lines());

        let outcome = combine_issues(&markdown, &remote);
        set_issues_from_issues_list(buffer, &outcome.issues, Some(&self.config.sort_order));

        let mut report = CommandReport::default();
        report.say(format!(
            "Fetched {} issues from {}, kept {} local, {} conflicts.",
            remote.len(),
            tracker.name(),
            outcome.added,
            outcome.conflicts
        ));
        Ok(report)
    }

    fn sort_issues(&self, buffer: &mut dyn TextBuffer) -> CommandReport {
        let issues = parse_buffer_issues(buffer.lines());
        if sorted_issues(&issues, &self.config.sort_order) != issues {
            set_issues_from_issues_list(buffer, &issues, Some(&self.config.sort_order));
        }
        CommandReport::default()
    }

    fn edit_tag(&self, buffer: &mut dyn TextBuffer, target: EditTarget) -> CommandReport {
        let missing = match target {
            EditTarget::Issue => "Cursor is not inside an issue.",
            EditTarget::Comment => "Cursor is not inside a comment, or it is already marked.",
        };
        edited(insert_edit_tag(buffer, target), missing)
    }

    /// Writes `issues` back, sorted if the options ask for it, and drops the
    /// cached issue list. A failed cache removal is only logged.
    fn store_issues(&self, buffer: &mut dyn TextBuffer, issues: &[Issue]) {
        let order = self.config.sort_issues_on_upload.then_some(&self.config.sort_order);
        set_issues_from_issues_list(buffer, issues, order);
        if let Err(err) = self.cache.invalidate(ISSUES_CACHE) {
            warn!("Failed to clear the issue cache: {err}");
        }
    }

    fn upload_new(&self, buffer: &mut dyn TextBuffer) -> DiaryResult<CommandReport> {
        let tracker = self.tracker()?;
        let mut issues = parse_buffer_issues(buffer.lines());

        let created = upload_issues(tracker, &mut issues, self.timezone)?;
        remove_tag_from_issues(&mut issues, &Tag::New, TagScope::Issues, &created.ignored);
        let commented = upload_comments(tracker, &mut issues, self.timezone)?;
        remove_tag_from_issues(&mut issues, &Tag::New, TagScope::Comments, &commented.ignored);

        self.store_issues(buffer, &issues);

        let mut report = CommandReport::default();
        report.messages.extend(created.messages);
        report.messages.extend(commented.messages);
        Ok(report)
    }

    fn upload_edits(&self, buffer: &mut dyn TextBuffer) -> DiaryResult<CommandReport> {
        let tracker = self.tracker()?;
        let mut issues = parse_buffer_issues(buffer.lines());

        let comments = update_comments(tracker, &mut issues, self.timezone)?;
        let edited_issues = update_issues(tracker, &mut issues, self.timezone)?;

        // Clearing an issue's tag also clears its body's, so a refused body
        // edit must hold back its issue as well.
        let mut issue_ignores = edited_issues.ignored.clone();
        issue_ignores.issues.extend(
            comments
                .ignored
                .comments
                .iter()
                .filter(|index| index.comment == 0)
                .map(|index| index.issue),
        );
        remove_tag_from_issues(&mut issues, &Tag::Edit, TagScope::Comments, &comments.ignored);
        remove_tag_from_issues(&mut issues, &Tag::Edit, TagScope::Issues, &issue_ignores);

        self.store_issues(buffer, &issues);

        let mut report = CommandReport::default();
        report.messages.extend(comments.messages);
        report.messages.extend(edited_issues.messages);
        Ok(report)
    }

    fn upload_completion(&self, buffer: &mut dyn TextBuffer) -> DiaryResult<CommandReport> {
        let tracker = self.tracker()?;
        let issues = parse_buffer_issues(buffer.lines());
        let completed = complete_issues(tracker, &issues)?;

        self.store_issues(buffer, &issues);

        let mut report = CommandReport::default();
        report.messages.extend(completed.messages);
        Ok(report)
    }
}

fn edited(changed: bool, otherwise: &str) -> CommandReport {
    let mut report = CommandReport::default();
    if !changed {
        report.say(otherwise);
    }
    report
}
