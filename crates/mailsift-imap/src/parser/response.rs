//! Typed server responses.

use super::fetch::{FetchItem, parse_fetch_items};
use super::{Reader, Value};
use crate::error::{Error, Result};
use crate::types::{Capability, Flag, ListResponse, MailboxAttribute, decode_mailbox_name};

/// Completion or condition status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// `OK`
    Ok,
    /// `NO`
    No,
    /// `BAD`
    Bad,
    /// `PREAUTH`
    PreAuth,
    /// `BYE`
    Bye,
}

impl Status {
    fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_uppercase().as_str() {
            "OK" => Some(Self::Ok),
            "NO" => Some(Self::No),
            "BAD" => Some(Self::Bad),
            "PREAUTH" => Some(Self::PreAuth),
            "BYE" => Some(Self::Bye),
            _ => None,
        }
    }
}

/// Bracketed response code of a status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// `[CAPABILITY ...]`
    Capability(Vec<Capability>),
    /// `[UIDVALIDITY n]`
    UidValidity(u32),
    /// `[UIDNEXT n]`
    UidNext(u32),
    /// `[READ-ONLY]`
    ReadOnly,
    /// `[READ-WRITE]`
    ReadWrite,
    /// `[TRYCREATE]`, the target mailbox does not exist.
    TryCreate,
    /// Any other code, by name.
    Other(String),
}

/// A complete server response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Completion of a command.
    Tagged {
        /// Tag of the completed command.
        tag: String,
        /// Completion status.
        status: Status,
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// Untagged data (`* ...`).
    Untagged(Untagged),
    /// Continuation request (`+ ...`).
    Continuation(String),
}

/// Untagged server data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Untagged {
    /// `* OK/NO/BAD/PREAUTH/BYE [code] text`
    Status {
        /// Condition.
        status: Status,
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* CAPABILITY ...`
    Capability(Vec<Capability>),
    /// `* LIST (...) "/" name`
    List(ListResponse),
    /// `* SEARCH n...` (UIDs when answering UID SEARCH)
    Search(Vec<u32>),
    /// `* FLAGS (...)`
    Flags(Vec<Flag>),
    /// `* n EXISTS`
    Exists(u32),
    /// `* n RECENT`
    Recent(u32),
    /// `* n EXPUNGE`
    Expunge(u32),
    /// `* n FETCH (...)`
    Fetch {
        /// Sequence number of the message.
        seq: u32,
        /// Returned data items.
        items: Vec<FetchItem>,
    },
    /// Anything the client has no use for, by keyword.
    Other(String),
}

/// Parses one response line, literals included.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the line is malformed.
pub fn parse_response(line: &[u8]) -> Result<Response> {
    let mut reader = Reader::new(line);
    if reader.eat(b'+') {
        reader.eat(b' ');
        return Ok(Response::Continuation(reader.rest()));
    }
    let tag = reader.word()?;
    reader.expect(b' ')?;
    if tag == "*" {
        return parse_untagged(&mut reader).map(Response::Untagged);
    }

    let word = reader.word()?;
    let status = Status::parse(word)
        .ok_or_else(|| Error::parse(0, format!("unknown completion status {word}")))?;
    let (code, text) = parse_resp_text(&mut reader)?;
    Ok(Response::Tagged {
        tag: tag.to_string(),
        status,
        code,
        text,
    })
}

fn parse_untagged(reader: &mut Reader<'_>) -> Result<Untagged> {
    let word = reader.word()?;

    if let Ok(n) = word.parse::<u32>() {
        reader.expect(b' ')?;
        let keyword = reader.word()?.to_ascii_uppercase();
        return match keyword.as_str() {
            "EXISTS" => Ok(Untagged::Exists(n)),
            "RECENT" => Ok(Untagged::Recent(n)),
            "EXPUNGE" => Ok(Untagged::Expunge(n)),
            "FETCH" => {
                reader.expect(b' ')?;
                reader.expect(b'(')?;
                let values = reader.values_until(b')')?;
                Ok(Untagged::Fetch {
                    seq: n,
                    items: parse_fetch_items(&values)?,
                })
            }
            _ => Ok(Untagged::Other(keyword)),
        };
    }

    if let Some(status) = Status::parse(word) {
        let (code, text) = parse_resp_text(reader)?;
        return Ok(Untagged::Status { status, code, text });
    }

    let keyword = word.to_ascii_uppercase();
    match keyword.as_str() {
        "CAPABILITY" => Ok(Untagged::Capability(
            reader.rest().split_whitespace().map(Capability::parse).collect(),
        )),
        "LIST" | "LSUB" => parse_list(reader).map(Untagged::List),
        "SEARCH" => {
            // Trailing "(MODSEQ n)" and the like are not UIDs.
            let rest = reader.rest();
            let uids = rest
                .split_whitespace()
                .take_while(|w| !w.starts_with('('))
                .map(|w| {
                    w.parse()
                        .map_err(|_| Error::parse(0, format!("invalid SEARCH result {w}")))
                })
                .collect::<Result<_>>()?;
            Ok(Untagged::Search(uids))
        }
        "FLAGS" => {
            reader.expect(b' ')?;
            reader.expect(b'(')?;
            let values = reader.values_until(b')')?;
            Ok(Untagged::Flags(
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|s| Flag::parse(&s))
                    .collect(),
            ))
        }
        _ => Ok(Untagged::Other(keyword)),
    }
}

fn parse_list(reader: &mut Reader<'_>) -> Result<ListResponse> {
    reader.expect(b' ')?;
    reader.expect(b'(')?;
    let attributes = reader
        .values_until(b')')?
        .iter()
        .filter_map(Value::as_str)
        .map(|s| MailboxAttribute::parse(&s))
        .collect();
    reader.expect(b' ')?;
    let delimiter = reader
        .value()?
        .as_str()
        .and_then(|s| s.chars().next());
    reader.expect(b' ')?;
    let name = reader
        .astring()?
        .nstring()
        .ok_or_else(|| Error::parse(0, "LIST without mailbox name"))?;
    Ok(ListResponse {
        attributes,
        delimiter,
        name: decode_mailbox_name(&name),
    })
}

fn parse_resp_text(reader: &mut Reader<'_>) -> Result<(Option<ResponseCode>, String)> {
    reader.eat(b' ');
    let code = if reader.eat(b'[') {
        let values = reader.values_until(b']')?;
        reader.eat(b' ');
        Some(parse_code(&values))
    } else {
        None
    };
    Ok((code, reader.rest()))
}

fn parse_code(values: &[Value]) -> ResponseCode {
    let Some(name) = values.first().and_then(Value::as_str) else {
        return ResponseCode::Other(String::new());
    };
    let number = || {
        values
            .get(1)
            .and_then(Value::as_number)
            .and_then(|n| u32::try_from(n).ok())
    };
    match name.to_ascii_uppercase().as_str() {
        "CAPABILITY" => ResponseCode::Capability(
            values[1..]
                .iter()
                .filter_map(Value::as_str)
                .map(|s| Capability::parse(&s))
                .collect(),
        ),
        "UIDVALIDITY" => number().map_or_else(
            || ResponseCode::Other(name.into_owned()),
            ResponseCode::UidValidity,
        ),
        "UIDNEXT" => number().map_or_else(
            || ResponseCode::Other(name.into_owned()),
            ResponseCode::UidNext,
        ),
        "READ-ONLY" => ResponseCode::ReadOnly,
        "READ-WRITE" => ResponseCode::ReadWrite,
        "TRYCREATE" => ResponseCode::TryCreate,
        _ => ResponseCode::Other(name.into_owned()),
    }
}
