use std::borrow::Cow;

use crate::cursor::Cursor;
use crate::error::{FormatError, FormatErrorKind};
use crate::expand::{CommandRunner, EmptyView, Expander, ShellCommandRunner, VariableView};
use crate::model::{Declaration, Declarations};

const DEFAULT_PATH: &str = ".env";

/// Parse dotenv text with no outside variables in scope.
///
/// Command substitutions run through [`ShellCommandRunner`].
pub fn parse_str(input: &str) -> Result<Vec<Declaration>, FormatError> {
    parse(input, DEFAULT_PATH, &EmptyView, &ShellCommandRunner)
}

/// Parse dotenv text, resolving references against `view` and running
/// substitutions with `runner`. `path` is only used in diagnostics.
pub fn parse(
    input: &str,
    path: &str,
    view: &dyn VariableView,
    runner: &dyn CommandRunner,
) -> Result<Vec<Declaration>, FormatError> {
    let normalized = normalize_newlines(input);
    Parser {
        cursor: Cursor::new(normalized.as_ref()),
        path,
        expander: Expander::new(view, runner),
        declarations: Declarations::default(),
    }
    .run()
}

fn normalize_newlines(input: &str) -> Cow<'_, str> {
    if !input.contains('\r') {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\r' {
            out.push('\n');
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            continue;
        }
        out.push(ch);
    }

    Cow::Owned(out)
}

struct Parser<'a> {
    cursor: Cursor<'a>,
    path: &'a str,
    expander: Expander<'a>,
    declarations: Declarations,
}

impl Parser<'_> {
    fn run(mut self) -> Result<Vec<Declaration>, FormatError> {
        self.skip_empty_lines();
        while !self.cursor.is_eof() {
            let line = self.cursor.line();
            let (name, exported) = self.lex_name()?;
            let value = self.lex_value(line)?;
            self.declarations.insert(Declaration {
                name,
                value,
                exported,
                line,
            });
        }
        Ok(self.declarations.into_vec())
    }

    fn error(&self, kind: FormatErrorKind) -> FormatError {
        FormatError::new(kind, self.cursor.context(self.path))
    }

    /// Skip whitespace (newlines included) and whole-line comments.
    fn skip_empty_lines(&mut self) {
        loop {
            match self.cursor.peek() {
                Some(ch) if ch.is_ascii_whitespace() => {
                    self.cursor.bump();
                }
                Some('#') => {
                    let len = self.cursor.rest().find('\n').unwrap_or(self.cursor.rest().len());
                    self.cursor.advance(len);
                }
                _ => return,
            }
        }
    }

    /// Lex `[export ]NAME=` and leave the cursor on the first value character.
    fn lex_name(&mut self) -> Result<(String, bool), FormatError> {
        let exported = self.skip_export_keyword();

        let start = self.cursor.offset();
        match self.cursor.peek() {
            Some(ch) if is_name_start(ch) => {}
            _ => return Err(self.error(FormatErrorKind::InvalidCharacterInName)),
        }
        while self.cursor.peek().is_some_and(is_name_char) {
            self.cursor.bump();
        }
        let name = self.cursor.data()[start..self.cursor.offset()].to_owned();

        match self.cursor.peek() {
            None | Some('\n' | '#') if exported => {
                Err(self.error(FormatErrorKind::CannotUnsetVariable))
            }
            None | Some('\n' | '#') => Err(self.error(FormatErrorKind::MissingEquals)),
            Some(' ' | '\t') => Err(self.error(FormatErrorKind::WhitespaceAfterName)),
            Some('=') => {
                self.cursor.bump();
                Ok((name, exported))
            }
            Some(ch) if ch.is_alphanumeric() => {
                Err(self.error(FormatErrorKind::InvalidCharacterInName))
            }
            Some(_) => Err(self.error(FormatErrorKind::MissingEquals)),
        }
    }

    /// Consume `export` plus its separating blanks when a name follows.
    fn skip_export_keyword(&mut self) -> bool {
        let Some(rest) = self.cursor.rest().strip_prefix("export") else {
            return false;
        };
        let blanks = rest.len() - rest.trim_start_matches([' ', '\t']).len();
        if blanks == 0 || !rest[blanks..].starts_with(is_name_start) {
            return false;
        }
        self.cursor.advance("export".len() + blanks);
        true
    }

    fn lex_value(&mut self, line: usize) -> Result<String, FormatError> {
        let line_end = self
            .cursor
            .rest()
            .find('\n')
            .unwrap_or(self.cursor.rest().len());
        let blank_or_comment = self.cursor.rest()[..line_end].trim_start_matches([' ', '\t']);
        if blank_or_comment.is_empty() || blank_or_comment.starts_with('#') {
            self.cursor.advance(line_end);
            self.skip_empty_lines();
            return Ok(String::new());
        }

        if matches!(self.cursor.peek(), Some(' ' | '\t')) {
            return Err(self.error(FormatErrorKind::WhitespaceBeforeValue));
        }

        let mut value = String::new();
        loop {
            match self.cursor.peek() {
                Some('\'') => value.push_str(&self.lex_single_quoted()?),
                Some('"') => value.push_str(&self.lex_double_quoted(line)?),
                _ => {
                    let start = self.cursor.offset();
                    value.push_str(&self.lex_unquoted(line)?);
                    if self.cursor.peek() == Some('#') || self.cursor.offset() == start {
                        break;
                    }
                }
            }
            if matches!(self.cursor.peek(), None | Some('\n')) {
                break;
            }
        }

        self.skip_empty_lines();
        Ok(value)
    }

    fn lex_single_quoted(&mut self) -> Result<String, FormatError> {
        self.cursor.bump();
        let start = self.cursor.offset();
        loop {
            match self.cursor.bump() {
                None => return Err(self.error(FormatErrorKind::MissingClosingQuote)),
                Some('\'') => break,
                Some(_) => {}
            }
        }
        let end = self.cursor.offset() - 1;
        Ok(self.cursor.data()[start..end].to_owned())
    }

    fn lex_double_quoted(&mut self, line: usize) -> Result<String, FormatError> {
        self.cursor.bump();
        let mut raw = String::new();
        loop {
            match self.cursor.bump() {
                None => return Err(self.error(FormatErrorKind::MissingClosingQuote)),
                Some('"') => break,
                Some('\\') => match self.cursor.bump() {
                    None => return Err(self.error(FormatErrorKind::MissingClosingQuote)),
                    Some('"') => raw.push('"'),
                    Some('n') => raw.push('\n'),
                    Some('r') => raw.push('\r'),
                    Some('t') => raw.push('\t'),
                    Some(ch) => {
                        raw.push('\\');
                        raw.push(ch);
                    }
                },
                Some(ch) => raw.push(ch),
            }
        }
        self.expand(&raw, line)
    }

    /// Lex an unquoted chunk, stopping at a newline, a quote, or a comment.
    fn lex_unquoted(&mut self, line: usize) -> Result<String, FormatError> {
        let mut raw = String::new();
        let mut first_blank = None;
        let mut prev = self.cursor.prev();

        while let Some(ch) = self.cursor.peek() {
            if matches!(ch, '\n' | '"' | '\'') {
                break;
            }
            if ch == '#' && matches!(prev, Some(' ' | '\t')) {
                break;
            }

            self.cursor.bump();
            match ch {
                '\\' if matches!(self.cursor.peek(), Some('"' | '\'')) => {
                    if let Some(quote) = self.cursor.bump() {
                        raw.push(quote);
                    }
                }
                '$' if self.cursor.peek() == Some('(') => {
                    raw.push('$');
                    self.lex_nested_expression(&mut raw)?;
                }
                '`' => {
                    raw.push('`');
                    self.lex_backticks(&mut raw)?;
                }
                ' ' | '\t' => {
                    first_blank.get_or_insert(raw.len());
                    raw.push(ch);
                }
                _ => raw.push(ch),
            }
            prev = self.cursor.prev();
        }

        let trimmed = raw.trim_end_matches(|ch: char| ch.is_ascii_whitespace());
        if first_blank.is_some_and(|idx| idx < trimmed.len()) {
            return Err(self.error(FormatErrorKind::ValueContainsUnquotedSpace));
        }
        self.expand(trimmed, line)
    }

    /// Copy a `(...)` group, nested groups included, into `raw`.
    fn lex_nested_expression(&mut self, raw: &mut String) -> Result<(), FormatError> {
        self.cursor.bump();
        raw.push('(');
        loop {
            match self.cursor.peek() {
                None | Some('\n') => {
                    return Err(self.error(FormatErrorKind::MissingClosingParenthesis));
                }
                Some(')') => {
                    self.cursor.bump();
                    raw.push(')');
                    return Ok(());
                }
                Some('(') => self.lex_nested_expression(raw)?,
                Some(ch) => {
                    self.cursor.bump();
                    raw.push(ch);
                }
            }
        }
    }

    fn lex_backticks(&mut self, raw: &mut String) -> Result<(), FormatError> {
        loop {
            match self.cursor.peek() {
                None | Some('\n') => {
                    return Err(self.error(FormatErrorKind::MissingClosingParenthesis));
                }
                Some(ch) => {
                    self.cursor.bump();
                    raw.push(ch);
                    if ch == '`' {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn expand(&mut self, raw: &str, line: usize) -> Result<String, FormatError> {
        self.expander
            .expand(raw, &mut self.declarations, line)
            .map_err(|kind| self.error(kind))
    }
}

fn is_name_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}
