//! Wire format.
//!
//! A request is a verb line (`GET`, `PUT` or `DELETE`) followed by a JSON
//! payload line. The payload may also follow the verb on the same line,
//! separated by whitespace. Any other verb line gets an error response and
//! no payload is read for it. Every response is a single JSON line.

use crate::error::{KvError, KvResult};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};

const LINE_ENDINGS: &[char] = &['\n', '\r'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Put,
    Delete,
}

impl Verb {
    /// Exact, case-sensitive match.
    pub fn parse(token: &str) -> Option<Verb> {
        match token {
            "GET" => Some(Verb::Get),
            "PUT" => Some(Verb::Put),
            "DELETE" => Some(Verb::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
        }
    }
}

/// What a verb line asks for.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandLine<'a> {
    /// A known verb, with its payload when it was sent on the same line.
    Verb(Verb, Option<&'a str>),
    Unexpected,
}

pub fn parse_command_line(line: &str) -> CommandLine<'_> {
    let line = line.trim();
    let (head, rest) = match line.find(char::is_whitespace) {
        Some(idx) => (&line[..idx], line[idx..].trim_start()),
        None => (line, ""),
    };
    match Verb::parse(head) {
        Some(verb) if rest.is_empty() => CommandLine::Verb(verb, None),
        Some(verb) => CommandLine::Verb(verb, Some(rest)),
        None => CommandLine::Unexpected,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GetRequest {
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PutRequest {
    pub key: String,
    pub value: String,
    pub expiration: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DeleteRequest {
    pub key: String,
}

/// Response line. `Value` is only present for GET; `Err` is empty on success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub err: String,
}

impl Response {
    pub fn ok() -> Self {
        Response::default()
    }

    pub fn value(value: String) -> Self {
        Response {
            value: Some(value),
            err: String::new(),
        }
    }

    pub fn error(err: &KvError) -> Self {
        Response {
            value: None,
            err: err.to_wire(),
        }
    }

    pub fn from_get(result: KvResult<String>) -> Self {
        match result {
            Ok(value) => Response::value(value),
            Err(e) => Response {
                value: Some(String::new()),
                err: e.to_wire(),
            },
        }
    }

    pub fn from_unit(result: KvResult<()>) -> Self {
        match result {
            Ok(()) => Response::ok(),
            Err(e) => Response::error(&e),
        }
    }

    pub fn encode(&self) -> KvResult<Vec<u8>> {
        encode_line(self)
    }

    /// The server-side error carried by this response, if any.
    pub fn into_result(self) -> KvResult<Option<String>> {
        match KvError::from_wire(&self.err) {
            Some(e) => Err(e),
            None => Ok(self.value),
        }
    }
}

/// Serialize as one JSON line, newline included.
pub fn encode_line<T: Serialize>(message: &T) -> KvResult<Vec<u8>> {
    let mut encoded = serde_json::to_vec(message)?;
    encoded.push(b'\n');
    Ok(encoded)
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("line exceeds {0} bytes")]
    TooLong(usize),

    #[error("line is not valid UTF-8")]
    InvalidUtf8,
}

/// Pulls newline-terminated lines out of a read buffer.
///
/// Call `parse()` repeatedly as data arrives. `Ok(None)` means more data is
/// needed. A line with invalid UTF-8 is consumed before the error is
/// returned, so the caller can carry on with the next one.
///
/// Bytes already searched for a newline are not searched again when more
/// data arrives.
#[derive(Debug)]
pub struct LineParser {
    max_len: usize,
    scanned: usize,
}

impl LineParser {
    pub fn new(max_len: usize) -> Self {
        LineParser { max_len, scanned: 0 }
    }

    pub fn parse(&mut self, buf: &mut BytesMut) -> Result<Option<String>, FrameError> {
        let start = self.scanned.min(buf.len());
        let Some(offset) = buf[start..].iter().position(|b| *b == b'\n') else {
            self.scanned = buf.len();
            if buf.len() > self.max_len {
                return Err(FrameError::TooLong(self.max_len));
            }
            return Ok(None);
        };
        let pos = start + offset;
        self.scanned = 0;
        if pos > self.max_len {
            return Err(FrameError::TooLong(self.max_len));
        }

        let line = buf.split_to(pos + 1);
        match std::str::from_utf8(&line) {
            Ok(s) => Ok(Some(s.trim_end_matches(LINE_ENDINGS).to_string())),
            Err(_) => Err(FrameError::InvalidUtf8),
        }
    }
}
