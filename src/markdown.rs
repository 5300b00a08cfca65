use std::str::FromStr;

use crate::error::DiaryError;

/// Checkbox dialect of a body line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkdownStyle {
    /// Editor-native: `[X]` checked, `[.]`/`[o]`/`[O]` partially done.
    Vimwiki,
    /// Tracker: `[x]` checked, no intermediate states.
    GitHub,
}

impl MarkdownStyle {
    fn checked(self) -> char {
        match self {
            MarkdownStyle::Vimwiki => 'X',
            MarkdownStyle::GitHub => 'x',
        }
    }
}

impl FromStr for MarkdownStyle {
    type Err = DiaryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "vimwiki" => Ok(MarkdownStyle::Vimwiki),
            "github" => Ok(MarkdownStyle::GitHub),
            other => Err(DiaryError::UnknownStyle(other.to_string())),
        }
    }
}

/// Rewrites a list-item checkbox into `style`. Lines without one pass through.
pub fn check_markdown_style(line: &str, style: MarkdownStyle) -> String {
    let Some((offset, marker)) = checkbox_marker(line) else {
        return line.to_string();
    };

    let replacement = match (marker, style) {
        ('x' | 'X', target) => target.checked(),
        ('.' | 'o' | 'O', MarkdownStyle::GitHub) => ' ',
        (other, _) => other,
    };
    if replacement == marker {
        return line.to_string();
    }

    let mut output = String::with_capacity(line.len());
    output.push_str(&line[..offset]);
    output.push(replacement);
    output.push_str(&line[offset + 1..]);
    output
}

/// Byte offset and value of the state character in `- [?] `, if present.
fn checkbox_marker(line: &str) -> Option<(usize, char)> {
    let indent = line.len() - line.trim_start_matches([' ', '\t']).len();
    let rest = &line[indent..];
    let bullet = bullet_marker(rest)?;
    let bytes = rest[bullet..].as_bytes();
    if bytes.len() < 3 || bytes[0] != b'[' || bytes[2] != b']' {
        return None;
    }
    if bytes.len() > 3 && bytes[3] != b' ' {
        return None;
    }

    let marker = bytes[1] as char;
    matches!(marker, ' ' | 'x' | 'X' | '.' | 'o' | 'O').then_some((indent + bullet + 1, marker))
}

fn bullet_marker(rest: &str) -> Option<usize> {
    for marker in ["- ", "* ", "+ "] {
        if rest.starts_with(marker) {
            return Some(marker.len());
        }
    }

    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let tail = &rest.as_bytes()[digits..];
    if tail.len() >= 2 && matches!(tail[0], b'.' | b')') && tail[1] == b' ' {
        return Some(digits + 2);
    }
    None
}
