use std::collections::BTreeMap;
use std::process::Command;

use crate::error::{CommandError, FormatErrorKind};
use crate::model::{Declaration, Declarations};

/// Read-only lookup of variables that exist outside the current parse pass.
pub trait VariableView {
    fn lookup(&self, name: &str) -> Option<String>;

    /// Names written by an earlier populate call resolve from the pass first.
    fn is_memorized(&self, _name: &str) -> bool {
        false
    }

    /// Live variables handed to substituted commands, lowest priority first.
    fn live_vars(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// A view with no variables at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyView;

impl VariableView for EmptyView {
    fn lookup(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Runs the text of a `$(...)` or backtick substitution and captures stdout.
pub trait CommandRunner {
    fn run(&self, command: &str, env: &[(String, String)]) -> Result<String, CommandError>;
}

/// Runs substitutions through the platform shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellCommandRunner;

impl CommandRunner for ShellCommandRunner {
    fn run(&self, command: &str, env: &[(String, String)]) -> Result<String, CommandError> {
        let mut process = shell_command(command);
        process.envs(env.iter().map(|(key, value)| (key, value)));

        let output = process.output()?;
        if !output.status.success() {
            return Err(CommandError::Failed {
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut process = Command::new("sh");
    process.arg("-c").arg(command);
    process
}

#[cfg(not(unix))]
fn shell_command(command: &str) -> Command {
    let mut process = Command::new("cmd");
    process.arg("/C").arg(command);
    process
}

pub(crate) struct Expander<'a> {
    view: &'a dyn VariableView,
    runner: &'a dyn CommandRunner,
}

impl<'a> Expander<'a> {
    pub(crate) fn new(view: &'a dyn VariableView, runner: &'a dyn CommandRunner) -> Self {
        Self { view, runner }
    }

    /// Resolve references, defaults, substitutions and escapes in `raw`.
    ///
    /// `line` is recorded on declarations created by `${NAME:=DEFAULT}`.
    pub(crate) fn expand(
        &self,
        raw: &str,
        locals: &mut Declarations,
        line: usize,
    ) -> Result<String, FormatErrorKind> {
        if !raw.contains(['$', '\\', '`']) {
            return Ok(raw.to_owned());
        }

        let mut out = String::with_capacity(raw.len());
        let mut idx = 0usize;
        while let Some(ch) = raw[idx..].chars().next() {
            match ch {
                '\\' => match raw[idx + 1..].chars().next() {
                    Some(escaped @ ('\\' | '$' | '`')) => {
                        out.push(escaped);
                        idx += 2;
                    }
                    _ => {
                        out.push('\\');
                        idx += 1;
                    }
                },
                '$' => {
                    let (text, end) = self.expand_dollar(raw, idx, locals, line)?;
                    out.push_str(&text);
                    idx = end;
                }
                '`' => {
                    let start = idx + 1;
                    let Some(len) = raw[start..].find('`') else {
                        return Err(FormatErrorKind::MissingClosingParenthesis);
                    };
                    out.push_str(&self.substitute(&raw[start..start + len], locals)?);
                    idx = start + len + 1;
                }
                _ => {
                    out.push(ch);
                    idx += ch.len_utf8();
                }
            }
        }

        Ok(out)
    }

    /// Expand the reference starting at the `$` at `start`.
    ///
    /// Returns the substituted text and the offset right after the reference.
    fn expand_dollar(
        &self,
        raw: &str,
        start: usize,
        locals: &mut Declarations,
        line: usize,
    ) -> Result<(String, usize), FormatErrorKind> {
        let after = start + 1;
        match raw[after..].chars().next() {
            Some('(') => {
                let end = matching_paren(raw, after)?;
                let output = self.substitute(&raw[after + 1..end], locals)?;
                Ok((output, end + 1))
            }
            Some('{') => self.expand_braced(raw, after + 1, locals, line),
            _ => {
                let name_end = scan_name(raw, after);
                if name_end == after {
                    return Ok(("$".to_owned(), after));
                }
                Ok((self.resolve(&raw[after..name_end], locals), name_end))
            }
        }
    }

    fn expand_braced(
        &self,
        raw: &str,
        name_start: usize,
        locals: &mut Declarations,
        line: usize,
    ) -> Result<(String, usize), FormatErrorKind> {
        let name_end = scan_name(raw, name_start);
        if name_end == name_start {
            return Ok(("${".to_owned(), name_start));
        }
        let name = &raw[name_start..name_end];

        let rest = &raw[name_end..];
        if rest.starts_with('}') {
            return Ok((self.resolve(name, locals), name_end + 1));
        }

        let assign = rest.starts_with(":=");
        if !assign && !rest.starts_with(":-") {
            return Err(FormatErrorKind::UnclosedBraces);
        }

        let (default, close) = scan_default(raw, name_end + 2, name)?;
        let mut value = self.resolve(name, locals);
        if value.is_empty() {
            value = default;
            if assign {
                locals.insert(Declaration {
                    name: name.to_owned(),
                    value: value.clone(),
                    exported: false,
                    line,
                });
            }
        }

        Ok((value, close + 1))
    }

    fn resolve(&self, name: &str, locals: &Declarations) -> String {
        if self.view.is_memorized(name)
            && let Some(value) = locals.get(name)
        {
            return value.to_owned();
        }

        self.view
            .lookup(name)
            .or_else(|| locals.get(name).map(str::to_owned))
            .unwrap_or_default()
    }

    fn substitute(&self, command: &str, locals: &Declarations) -> Result<String, FormatErrorKind> {
        let mut env = self.view.live_vars().into_iter().collect::<BTreeMap<_, _>>();
        for declaration in locals.iter().filter(|declaration| {
            self.view.is_memorized(&declaration.name)
                || self.view.lookup(&declaration.name).is_none()
        }) {
            env.insert(declaration.name.clone(), declaration.value.clone());
        }
        let env = env.into_iter().collect::<Vec<_>>();

        let mut output = self
            .runner
            .run(command, &env)
            .map_err(|err| FormatErrorKind::CommandFailed {
                message: err.to_string(),
            })?;
        if output.ends_with('\n') {
            output.pop();
        }
        Ok(output)
    }
}

fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// End offset of the longest `[A-Za-z0-9_]` run starting at `start`.
fn scan_name(raw: &str, start: usize) -> usize {
    raw[start..]
        .char_indices()
        .find(|(_, ch)| !is_name_char(*ch))
        .map_or(raw.len(), |(offset, _)| start + offset)
}

/// Offset of the `)` closing the `(` at `open`, honoring nesting.
fn matching_paren(raw: &str, open: usize) -> Result<usize, FormatErrorKind> {
    let mut depth = 0usize;
    for (offset, ch) in raw[open..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(open + offset);
                }
            }
            _ => {}
        }
    }
    Err(FormatErrorKind::MissingClosingParenthesis)
}

/// Scan a default value up to the `}` that closes the reference.
///
/// Balanced `{...}` groups are kept verbatim; a backslash takes the next
/// character literally.
fn scan_default(raw: &str, start: usize, name: &str) -> Result<(String, usize), FormatErrorKind> {
    let mut out = String::new();
    let mut depth = 0usize;
    let mut chars = raw[start..].char_indices();
    while let Some((offset, ch)) = chars.next() {
        match ch {
            '\\' => {
                if let Some((_, escaped)) = chars.next() {
                    out.push(escaped);
                }
            }
            '{' => {
                depth += 1;
                out.push(ch);
            }
            '}' if depth == 0 => return Ok((out, start + offset)),
            '}' => {
                depth -= 1;
                out.push(ch);
            }
            '\'' | '"' | '$' => {
                return Err(FormatErrorKind::UnsupportedCharacterInDefault {
                    character: ch,
                    name: name.to_owned(),
                });
            }
            _ => out.push(ch),
        }
    }
    Err(FormatErrorKind::UnclosedBraces)
}
