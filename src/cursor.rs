const EXCERPT_RADIUS: usize = 20;

/// Byte offset and line tracking over a single parse buffer.
#[derive(Debug, Clone)]
pub(crate) struct Cursor<'a> {
    data: &'a str,
    offset: usize,
    line: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(data: &'a str) -> Self {
        Self {
            data,
            offset: 0,
            line: 1,
        }
    }

    pub(crate) fn data(&self) -> &'a str {
        self.data
    }

    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    pub(crate) fn line(&self) -> usize {
        self.line
    }

    pub(crate) fn is_eof(&self) -> bool {
        self.offset >= self.data.len()
    }

    pub(crate) fn rest(&self) -> &'a str {
        &self.data[self.offset..]
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub(crate) fn prev(&self) -> Option<char> {
        self.data[..self.offset].chars().next_back()
    }

    pub(crate) fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.offset += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
        }
        Some(ch)
    }

    /// Advance over `len` bytes, which must end on a char boundary.
    pub(crate) fn advance(&mut self, len: usize) {
        let end = (self.offset + len).min(self.data.len());
        self.line += self.data[self.offset..end].matches('\n').count();
        self.offset = end;
    }

    pub(crate) fn context(&self, path: &str) -> FormatErrorContext {
        FormatErrorContext::new(self.data, path, self.line, self.offset)
    }
}

/// Snapshot of the parse state at the point of failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatErrorContext {
    data: String,
    path: String,
    line: usize,
    offset: usize,
}

impl FormatErrorContext {
    pub fn new(data: &str, path: &str, line: usize, offset: usize) -> Self {
        Self {
            data: data.to_owned(),
            path: path.to_owned(),
            line,
            offset: offset.min(data.len()),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Render up to 20 bytes around the offset and a caret line under it.
    pub fn details(&self) -> String {
        let start = ceil_char_boundary(&self.data, self.offset.saturating_sub(EXCERPT_RADIUS));
        let end = floor_char_boundary(&self.data, self.offset + EXCERPT_RADIUS);
        let before = self.data[start..self.offset].replace('\n', "\\n");
        let after = self.data[self.offset..end].replace('\n', "\\n");

        format!(
            "...{before}{after}...\n{}^ line {} offset {}",
            " ".repeat(before.chars().count() + 2),
            self.line,
            self.offset
        )
    }
}

fn floor_char_boundary(data: &str, idx: usize) -> usize {
    let mut idx = idx.min(data.len());
    while !data.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(data: &str, idx: usize) -> usize {
    let mut idx = idx.min(data.len());
    while !data.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
