use std::fs;
use std::io;
use std::path::Path;

/// Editor-side view of the diary. Rows are 1-based like the host editor's
/// cursor; line ranges are 0-based and end-exclusive.
pub trait TextBuffer {
    fn lines(&self) -> &[String];
    fn set_lines(&mut self, start: usize, end: usize, replacement: Vec<String>);
    /// `(row, column)`; row 0 means the cursor is outside the buffer.
    fn cursor(&self) -> (usize, usize);
    fn set_cursor(&mut self, row: usize, column: usize);

    fn is_empty(&self) -> bool {
        self.lines().iter().all(|line| line.is_empty())
    }

    fn set_all(&mut self, lines: Vec<String>) {
        let end = self.lines().len();
        self.set_lines(0, end, lines);
    }
}

/// In-memory buffer backed by a diary file on disk.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LineBuffer {
    lines: Vec<String>,
    cursor: (usize, usize),
}

impl LineBuffer {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines, cursor: (0, 0) }
    }

    pub fn from_text(content: &str) -> Self {
        Self::new(content.lines().map(|line| line.to_string()).collect())
    }

    /// A missing file reads as an empty buffer.
    pub fn load(path: &Path) -> io::Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Self::from_text(&content)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err),
        }
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        // Every line is newline-terminated, so `from_text` reads back the same rows.
        let content: String = self.lines.iter().map(|line| format!("{line}\n")).collect();
        fs::write(path, content)
    }

    pub fn with_cursor(mut self, row: usize, column: usize) -> Self {
        self.cursor = (row, column);
        self
    }
}

impl TextBuffer for LineBuffer {
    fn lines(&self) -> &[String] {
        &self.lines
    }

    fn set_lines(&mut self, start: usize, end: usize, replacement: Vec<String>) {
        let end = end.min(self.lines.len());
        let start = start.min(end);
        self.lines.splice(start..end, replacement);
    }

    fn cursor(&self) -> (usize, usize) {
        self.cursor
    }

    fn set_cursor(&mut self, row: usize, column: usize) {
        self.cursor = (row, column);
    }
}
