//! Assembly script parsing.
//!
//! One command per line, `#` starts a comment. Field targets are
//! written `<protocol>.<field>`; `set`/`expr` values run to the end of
//! the line, `raw` values are hex.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptCommand {
    Append(String),
    Remove,
    Set {
        protocol: String,
        field: String,
        value: String,
    },
    Expr {
        protocol: String,
        field: String,
        expr: String,
    },
    Raw {
        protocol: String,
        field: String,
        bytes: Vec<u8>,
    },
    Reset {
        protocol: String,
        field: String,
    },
    Random {
        protocol: String,
        field: String,
    },
    Recalc,
    Undo,
    Redo,
    Show,
}

/// A command with the 1-based script line it came from, for error
/// reporting during execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub line: usize,
    pub command: ScriptCommand,
}

#[derive(Debug)]
pub struct ScriptError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ScriptError {}

fn err(line: usize, message: impl Into<String>) -> ScriptError {
    ScriptError {
        line,
        message: message.into(),
    }
}

fn parse_target(line: usize, target: &str) -> Result<(String, String), ScriptError> {
    match target.split_once('.') {
        Some((protocol, field)) if !protocol.is_empty() && !field.is_empty() => {
            Ok((protocol.to_string(), field.to_string()))
        }
        _ => Err(err(
            line,
            format!("expected <protocol>.<field>, got '{target}'"),
        )),
    }
}

pub fn parse(source: &str) -> Result<Vec<Located>, ScriptError> {
    let mut commands = Vec::new();

    for (index, raw_line) in source.lines().enumerate() {
        let line = index + 1;
        let text = raw_line.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }

        let (keyword, rest) = match text.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (text, ""),
        };

        let command = match keyword {
            "append" => {
                if rest.is_empty() || rest.contains(char::is_whitespace) {
                    return Err(err(line, "append takes one protocol id"));
                }
                ScriptCommand::Append(rest.to_string())
            }
            "remove" | "recalc" | "undo" | "redo" | "show" => {
                if !rest.is_empty() {
                    return Err(err(line, format!("{keyword} takes no argument")));
                }
                match keyword {
                    "remove" => ScriptCommand::Remove,
                    "recalc" => ScriptCommand::Recalc,
                    "undo" => ScriptCommand::Undo,
                    "redo" => ScriptCommand::Redo,
                    _ => ScriptCommand::Show,
                }
            }
            "set" | "expr" => {
                let (target, value) = rest
                    .split_once(char::is_whitespace)
                    .map(|(target, value)| (target, value.trim()))
                    .ok_or_else(|| err(line, format!("{keyword} takes a target and a value")))?;
                let (protocol, field) = parse_target(line, target)?;
                if keyword == "set" {
                    ScriptCommand::Set {
                        protocol,
                        field,
                        value: value.to_string(),
                    }
                } else {
                    ScriptCommand::Expr {
                        protocol,
                        field,
                        expr: value.to_string(),
                    }
                }
            }
            "raw" => {
                let (target, value) = rest
                    .split_once(char::is_whitespace)
                    .map(|(target, value)| (target, value.trim()))
                    .ok_or_else(|| err(line, "raw takes a target and a hex value"))?;
                let (protocol, field) = parse_target(line, target)?;
                let bytes = hex::decode(value)
                    .map_err(|decode_err| err(line, format!("bad hex value: {decode_err}")))?;
                ScriptCommand::Raw {
                    protocol,
                    field,
                    bytes,
                }
            }
            "reset" | "random" => {
                if rest.is_empty() || rest.contains(char::is_whitespace) {
                    return Err(err(line, format!("{keyword} takes one <protocol>.<field>")));
                }
                let (protocol, field) = parse_target(line, rest)?;
                if keyword == "reset" {
                    ScriptCommand::Reset { protocol, field }
                } else {
                    ScriptCommand::Random { protocol, field }
                }
            }
            other => return Err(err(line, format!("unknown command '{other}'"))),
        };

        commands.push(Located { line, command });
    }

    Ok(commands)
}
