use crate::models::{Issue, Tag};

const LABEL_PREFIX: &str = "label";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagToken {
    Label(String),
    Tag(Tag),
}

/// Splits the tag tail of a heading into `+label:X` values and bare `+tag`s.
pub fn parse_tag_tokens(text: &str) -> (Vec<String>, Vec<Tag>) {
    let mut labels = Vec::new();
    let mut tags = Vec::new();
    for token in scan_tokens(text) {
        match token {
            TagToken::Label(label) => labels.push(label),
            TagToken::Tag(tag) => tags.push(tag),
        }
    }
    (labels, tags)
}

/// Appends `+tag` to a heading unless the heading already carries it.
pub fn upsert_tag(line: &str, tag: &Tag) -> String {
    let present = scan_tokens(line)
        .into_iter()
        .any(|token| token == TagToken::Tag(tag.clone()));
    if present {
        return line.to_string();
    }

    let mut output = line.trim_end().to_string();
    output.push(' ');
    output.push_str(&tag.to_string());
    output
}

fn scan_tokens(text: &str) -> Vec<TagToken> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0usize;

    while i < bytes.len() {
        if bytes[i] != b'+' || (i > 0 && !bytes[i - 1].is_ascii_whitespace()) {
            i += 1;
            continue;
        }

        i += 1;
        let word_start = i;
        while i < bytes.len() && is_tag_byte(bytes[i]) {
            i += 1;
        }
        if word_start == i {
            continue;
        }
        let word = &text[word_start..i];

        if word == LABEL_PREFIX && i < bytes.len() && bytes[i] == b':' {
            i += 1;
            let value_start = i;
            while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if value_start == i {
                continue;
            }
            tokens.push(TagToken::Label(text[value_start..i].to_string()));
            continue;
        }

        if i < bytes.len() && !bytes[i].is_ascii_whitespace() {
            // `+foo:bar` or `+a.b` is prose, not a tag.
            continue;
        }

        tokens.push(TagToken::Tag(Tag::from_token(word)));
    }

    tokens
}

fn is_tag_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// Which records a tag removal applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagScope {
    All,
    /// Issue metadata, plus comment 0 which shares the issue's flags.
    Issues,
    Comments,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CommentIndex {
    pub issue: usize,
    pub comment: usize,
}

/// Positions whose tags must survive a removal because the upload skipped them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IgnoreList {
    pub issues: Vec<usize>,
    pub comments: Vec<CommentIndex>,
}

impl IgnoreList {
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty() && self.comments.is_empty()
    }

    fn skips_issue(&self, issue: usize) -> bool {
        self.issues.contains(&issue)
    }

    fn skips_comment(&self, issue: usize, comment: usize) -> bool {
        self.comments.contains(&CommentIndex { issue, comment })
    }
}

pub fn remove_tag(tags: &mut Vec<Tag>, tag: &Tag) {
    tags.retain(|existing| existing != tag);
}

/// Clears `tag` from the given scope, except for positions in `ignore`.
pub fn remove_tag_from_issues(issues: &mut [Issue], tag: &Tag, scope: TagScope, ignore: &IgnoreList) {
    for (issue_index, issue) in issues.iter_mut().enumerate() {
        if matches!(scope, TagScope::All | TagScope::Issues) && !ignore.skips_issue(issue_index) {
            remove_tag(&mut issue.metadata, tag);
            if let Some(body) = issue.all_comments.first_mut() {
                remove_tag(&mut body.tags, tag);
            }
        }

        if matches!(scope, TagScope::All | TagScope::Comments) {
            for (comment_index, comment) in issue.all_comments.iter_mut().enumerate() {
                if ignore.skips_comment(issue_index, comment_index) {
                    continue;
                }
                if scope == TagScope::All && comment_index == 0 && ignore.skips_issue(issue_index) {
                    continue;
                }
                remove_tag(&mut comment.tags, tag);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Comment;

    fn issue_with_edits() -> Issue {
        Issue {
            number: 3,
            title: "Test Issue 3".to_string(),
            complete: false,
            labels: vec!["inprogress".to_string()],
            metadata: vec![Tag::Edit],
            all_comments: vec![
                Comment {
                    number: 0,
                    body: vec!["Line 1".to_string()],
                    tags: vec![Tag::Edit],
                    updated_at: "2018-08-19 18:18".to_string(),
                },
                Comment {
                    number: 1,
                    body: vec!["Line 2-1".to_string()],
                    tags: vec![Tag::Edit],
                    updated_at: "2018-08-19 12:18".to_string(),
                },
            ],
        }
    }

    #[test]
    fn parses_labels_and_tags_separately() {
        let (labels, tags) = parse_tag_tokens(" +label:backlog +label:personal +new +edit");
        assert_eq!(labels, vec!["backlog", "personal"]);
        assert_eq!(tags, vec![Tag::New, Tag::Edit]);
    }

    #[test]
    fn ignores_plus_inside_words() {
        let (labels, tags) = parse_tag_tokens(" c++ a+b +ok");
        assert!(labels.is_empty());
        assert_eq!(tags, vec![Tag::Other("ok".to_string())]);
    }

    #[test]
    fn upsert_is_idempotent() {
        let line = "### [ ] Issue {1}: +label:work";
        let once = upsert_tag(line, &Tag::Edit);
        assert_eq!(once, "### [ ] Issue {1}: +label:work +edit");
        assert_eq!(upsert_tag(&once, &Tag::Edit), once);
    }

    #[test]
    fn issue_scope_clears_comment_zero_only() {
        let mut issues = vec![issue_with_edits()];
        remove_tag_from_issues(&mut issues, &Tag::Edit, TagScope::Issues, &IgnoreList::default());
        assert!(issues[0].metadata.is_empty());
        assert!(issues[0].all_comments[0].tags.is_empty());
        assert_eq!(issues[0].all_comments[1].tags, vec![Tag::Edit]);
    }

    #[test]
    fn comment_scope_leaves_issue_metadata() {
        let mut issues = vec![issue_with_edits()];
        remove_tag_from_issues(&mut issues, &Tag::Edit, TagScope::Comments, &IgnoreList::default());
        assert_eq!(issues[0].metadata, vec![Tag::Edit]);
        assert!(issues[0].all_comments[1].tags.is_empty());
    }

    #[test]
    fn ignored_positions_keep_their_tags() {
        let mut issues = vec![issue_with_edits()];
        let ignore = IgnoreList {
            issues: vec![],
            comments: vec![CommentIndex { issue: 0, comment: 1 }],
        };
        remove_tag_from_issues(&mut issues, &Tag::Edit, TagScope::Comments, &ignore);
        assert_eq!(issues[0].all_comments[1].tags, vec![Tag::Edit]);
        assert!(issues[0].all_comments[0].tags.is_empty());

        let mut issues = vec![issue_with_edits()];
        let ignore = IgnoreList {
            issues: vec![0],
            comments: vec![],
        };
        remove_tag_from_issues(&mut issues, &Tag::Edit, TagScope::All, &ignore);
        assert_eq!(issues[0].metadata, vec![Tag::Edit]);
        assert_eq!(issues[0].all_comments[0].tags, vec![Tag::Edit]);
        assert!(issues[0].all_comments[1].tags.is_empty());
    }
}
