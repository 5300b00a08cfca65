use serde::{Deserialize, Serialize};
use std::fmt;

/// `updated_at` value for comments that have never been synced.
pub const UNSYNCED_TIMESTAMP: &str = "0000-00-00 00:00";

/// Inline marker carried on issue and comment headings as `+word`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Tag {
    New,
    Edit,
    Conflict,
    Other(String),
}

impl Tag {
    pub fn from_token(token: &str) -> Self {
        match token {
            "new" => Tag::New,
            "edit" => Tag::Edit,
            "conflict" => Tag::Conflict,
            other => Tag::Other(other.to_string()),
        }
    }

    pub fn as_token(&self) -> &str {
        match self {
            Tag::New => "new",
            Tag::Edit => "edit",
            Tag::Conflict => "conflict",
            Tag::Other(value) => value,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{}", self.as_token())
    }
}

impl From<String> for Tag {
    fn from(value: String) -> Self {
        Tag::from_token(&value)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.as_token().to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub name: String,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub calendar: String,
}

impl CalendarEvent {
    pub fn new(name: impl Into<String>, start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: start.into(),
            end: end.into(),
            calendar: String::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Sequence index; 0 is the issue body.
    pub number: usize,
    pub body: Vec<String>,
    pub tags: Vec<Tag>,
    pub updated_at: String,
}

impl Comment {
    /// A fresh local comment that has never been uploaded.
    pub fn draft(number: usize) -> Self {
        Self {
            number,
            body: vec![String::new()],
            tags: vec![Tag::New],
            updated_at: UNSYNCED_TIMESTAMP.to_string(),
        }
    }

    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.tags.contains(tag)
    }

    pub fn add_tag(&mut self, tag: Tag) {
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Tracker number; 0 until the issue is created remotely.
    pub number: u64,
    pub title: String,
    pub complete: bool,
    pub labels: Vec<String>,
    pub all_comments: Vec<Comment>,
    pub metadata: Vec<Tag>,
}

impl Issue {
    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.metadata.contains(tag)
    }

    pub fn body(&self) -> Option<&Comment> {
        self.all_comments.first()
    }

    /// Newest `updated_at` across every comment, including the body.
    pub fn latest_update(&self) -> &str {
        self.all_comments
            .iter()
            .map(|comment| comment.updated_at.as_str())
            .max()
            .unwrap_or(UNSYNCED_TIMESTAMP)
    }
}
