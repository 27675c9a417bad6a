//! Line-oriented scripts driving a comment store without the terminal UI.
//!
//! ```text
//! # comments start with '#'
//! as Alice
//! post Hello everyone
//! reply 1 Thanks!\nSecond line
//! edit 2 Thanks a lot!
//! delete 1
//! show
//! ```

use chrono::{DateTime, Utc};
use std::io::{self, Write};
use threadview_core::{CommentError, CommentId, CommentStore};
use threadview_ui::{build_rows, plain_text, UiStates};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Author used by the following posts and replies
    As(String),
    Post(String),
    Reply(CommentId, String),
    Edit(CommentId, String),
    Delete(CommentId),
    Show,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("line {line}: unknown command {command:?}")]
    UnknownCommand { line: usize, command: String },

    #[error("line {line}: {command} expects {expected}")]
    MissingArgument {
        line: usize,
        command: &'static str,
        expected: &'static str,
    },

    #[error("line {line}: invalid comment id {value:?}")]
    InvalidId { line: usize, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    steps: Vec<(usize, Command)>,
}

impl Script {
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut steps = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let (word, rest) = split_word(trimmed);
            let command = match word {
                "as" => Command::As(required(rest, line, "as", "a name")?.to_string()),
                "post" => Command::Post(unescape(required(rest, line, "post", "text")?)),
                "reply" => {
                    let (id, text) = split_word(required(rest, line, "reply", "an id and text")?);
                    let id = parse_id(id, line)?;
                    let text = required(text, line, "reply", "text after the id")?;
                    Command::Reply(id, unescape(text))
                }
                "edit" => {
                    let (id, text) = split_word(required(rest, line, "edit", "an id and text")?);
                    let id = parse_id(id, line)?;
                    let text = required(text, line, "edit", "text after the id")?;
                    Command::Edit(id, unescape(text))
                }
                "delete" => {
                    let id = required(rest, line, "delete", "an id")?;
                    Command::Delete(parse_id(id, line)?)
                }
                "show" => Command::Show,
                other => {
                    return Err(ParseError::UnknownCommand {
                        line,
                        command: other.to_string(),
                    })
                }
            };
            steps.push((line, command));
        }

        Ok(Script { steps })
    }

    pub fn steps(&self) -> &[(usize, Command)] {
        &self.steps
    }
}

fn split_word(text: &str) -> (&str, &str) {
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (text, ""),
    }
}

fn required<'a>(
    text: &'a str,
    line: usize,
    command: &'static str,
    expected: &'static str,
) -> Result<&'a str, ParseError> {
    if text.is_empty() {
        return Err(ParseError::MissingArgument { line, command, expected });
    }
    Ok(text)
}

fn parse_id(text: &str, line: usize) -> Result<CommentId, ParseError> {
    text.parse().map_err(|_| ParseError::InvalidId {
        line,
        value: text.to_string(),
    })
}

/// `\n` becomes a line break, `\\` a backslash
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// What a script run did
#[derive(Debug, Default)]
pub struct Report {
    pub applied: usize,
    /// Steps the store refused, by line; each left the forest unchanged
    pub rejected: Vec<(usize, CommentError)>,
}

/// Settings for `run`
pub struct RunOptions<'a> {
    pub author: &'a str,
    pub now: DateTime<Utc>,
    pub date_format: &'a str,
    pub indent_width: usize,
}

/// Apply every step in order; rejected steps are recorded and skipped
pub fn run<W: Write>(
    script: &Script,
    store: &mut CommentStore,
    options: &RunOptions<'_>,
    out: &mut W,
) -> io::Result<Report> {
    let mut report = Report::default();
    let mut author = options.author.to_string();

    for (line, command) in script.steps() {
        let result = match command {
            Command::As(name) => {
                author = name.clone();
                continue;
            }
            Command::Show => {
                let forest = store.forest();
                let rows = build_rows(forest, &UiStates::new(), options.now, options.date_format);
                write!(out, "{}", plain_text(forest, &rows, options.indent_width))?;
                continue;
            }
            Command::Post(text) => store.post_top_level(&author, text),
            Command::Reply(parent, text) => store.post_reply(*parent, &author, text),
            Command::Edit(id, text) => store.update_content(*id, text),
            Command::Delete(id) => store.delete_subtree(*id),
        };

        match result {
            Ok(_) => report.applied += 1,
            Err(err) => {
                warn!(line, %err, "script step rejected");
                report.rejected.push((*line, err));
            }
        }
    }

    Ok(report)
}
