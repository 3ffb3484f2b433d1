//! FETCH data items: envelopes and body structures.

use super::Value;
use crate::error::{Error, Result};
use crate::types::{Flag, Uid};

/// A data item of a FETCH response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    /// `UID`
    Uid(Uid),
    /// `FLAGS`
    Flags(Vec<Flag>),
    /// `ENVELOPE`
    Envelope(Box<Envelope>),
    /// `BODYSTRUCTURE` (or the non-extensible `BODY`)
    BodyStructure(BodyStructure),
    /// `RFC822.SIZE`
    Rfc822Size(u64),
    /// `INTERNALDATE`
    InternalDate(String),
}

/// Parsed ENVELOPE structure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    /// Date header, unparsed.
    pub date: Option<String>,
    /// Subject header, undecoded.
    pub subject: Option<String>,
    /// From addresses.
    pub from: Vec<Address>,
    /// Sender addresses.
    pub sender: Vec<Address>,
    /// Reply-To addresses.
    pub reply_to: Vec<Address>,
    /// To addresses.
    pub to: Vec<Address>,
    /// Cc addresses.
    pub cc: Vec<Address>,
    /// Bcc addresses.
    pub bcc: Vec<Address>,
    /// In-Reply-To header.
    pub in_reply_to: Option<String>,
    /// Message-ID header.
    pub message_id: Option<String>,
}

/// An envelope address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    /// Display name.
    pub name: Option<String>,
    /// Local part.
    pub mailbox: Option<String>,
    /// Domain.
    pub host: Option<String>,
}

impl Address {
    /// `mailbox@host`, or just the local part when the host is missing.
    #[must_use]
    pub fn email(&self) -> Option<String> {
        match (&self.mailbox, &self.host) {
            (Some(mailbox), Some(host)) => Some(format!("{mailbox}@{host}")),
            (Some(mailbox), None) => Some(mailbox.clone()),
            _ => None,
        }
    }
}

/// Content-Disposition of a body part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disposition {
    /// Disposition type, such as `attachment` or `inline`.
    pub kind: String,
    /// Disposition parameters.
    pub params: Vec<(String, String)>,
}

impl Disposition {
    /// Looks up a parameter, ignoring case.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        find_param(&self.params, name)
    }

    /// True for `attachment`.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.kind.eq_ignore_ascii_case("attachment")
    }
}

/// MIME structure of a message as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyStructure {
    /// A leaf part.
    Single {
        /// Media type, such as `APPLICATION`.
        media_type: String,
        /// Media subtype, such as `PDF`.
        media_subtype: String,
        /// Content-Type parameters.
        params: Vec<(String, String)>,
        /// Encoded size in bytes.
        size: u64,
        /// Content-Disposition, if the server reported extension data.
        disposition: Option<Disposition>,
    },
    /// An encapsulated `message/rfc822` part.
    Message {
        /// Encoded size in bytes.
        size: u64,
        /// Structure of the encapsulated message.
        body: Box<BodyStructure>,
        /// Content-Disposition, if reported.
        disposition: Option<Disposition>,
    },
    /// A `multipart/*` container.
    Multipart {
        /// Multipart subtype, such as `MIXED`.
        subtype: String,
        /// Child parts in order.
        parts: Vec<BodyStructure>,
        /// Content-Disposition, if reported.
        disposition: Option<Disposition>,
    },
}

impl BodyStructure {
    /// Parses the list following `BODYSTRUCTURE`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] when required fields are missing.
    pub fn from_values(values: &[Value]) -> Result<Self> {
        if matches!(values.first(), Some(Value::List(_))) {
            return Self::multipart(values);
        }

        let text = |i: usize, what: &str| -> Result<String> {
            values
                .get(i)
                .and_then(Value::nstring)
                .ok_or_else(|| Error::parse(0, format!("body part without {what}")))
        };
        let media_type = text(0, "media type")?;
        let media_subtype = text(1, "media subtype")?;
        let params = values.get(2).map(parse_params).unwrap_or_default();
        let size = values.get(6).and_then(Value::as_number).unwrap_or(0);

        if media_type.eq_ignore_ascii_case("MESSAGE") && media_subtype.eq_ignore_ascii_case("RFC822") {
            if let Some(inner) = values.get(8).and_then(Value::as_list) {
                return Ok(Self::Message {
                    size,
                    body: Box::new(Self::from_values(inner)?),
                    disposition: values.get(11).and_then(parse_disposition),
                });
            }
        }

        // Extension data follows the fields specific to the media type.
        let disposition_index = if media_type.eq_ignore_ascii_case("TEXT") { 9 } else { 8 };
        Ok(Self::Single {
            media_type,
            media_subtype,
            params,
            size,
            disposition: values.get(disposition_index).and_then(parse_disposition),
        })
    }

    fn multipart(values: &[Value]) -> Result<Self> {
        let mut parts = Vec::new();
        let mut rest = values;
        while let Some((Value::List(inner), tail)) = rest.split_first() {
            parts.push(Self::from_values(inner)?);
            rest = tail;
        }
        let subtype = rest
            .first()
            .and_then(Value::nstring)
            .ok_or_else(|| Error::parse(0, "multipart without subtype"))?;
        Ok(Self::Multipart {
            subtype,
            parts,
            disposition: rest.get(2).and_then(parse_disposition),
        })
    }

    /// Looks up a Content-Type parameter of a leaf part, ignoring case.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        match self {
            Self::Single { params, .. } => find_param(params, name),
            Self::Message { .. } | Self::Multipart { .. } => None,
        }
    }
}

fn find_param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

fn parse_params(value: &Value) -> Vec<(String, String)> {
    value
        .as_list()
        .map(|items| {
            items
                .chunks_exact(2)
                .filter_map(|pair| Some((pair[0].nstring()?, pair[1].nstring()?)))
                .collect()
        })
        .unwrap_or_default()
}

fn parse_disposition(value: &Value) -> Option<Disposition> {
    match value {
        Value::List(items) => Some(Disposition {
            kind: items.first()?.nstring()?,
            params: items.get(1).map(parse_params).unwrap_or_default(),
        }),
        Value::Quoted(_) | Value::Literal(_) | Value::Atom(_) => Some(Disposition {
            kind: value.nstring()?,
            params: Vec::new(),
        }),
        Value::Nil | Value::Number(_) | Value::Section(_) => None,
    }
}

fn parse_addresses(value: Option<&Value>) -> Vec<Address> {
    value
        .and_then(Value::as_list)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_list)
                .map(|fields| Address {
                    name: fields.first().and_then(Value::nstring),
                    mailbox: fields.get(2).and_then(Value::nstring),
                    host: fields.get(3).and_then(Value::nstring),
                })
                // Group start/end markers carry no mailbox.
                .filter(|address| address.mailbox.is_some())
                .collect()
        })
        .unwrap_or_default()
}

impl Envelope {
    /// Parses the list following `ENVELOPE`.
    #[must_use]
    pub fn from_values(values: &[Value]) -> Self {
        let field = |i: usize| values.get(i).and_then(Value::nstring);
        Self {
            date: field(0),
            subject: field(1),
            from: parse_addresses(values.get(2)),
            sender: parse_addresses(values.get(3)),
            reply_to: parse_addresses(values.get(4)),
            to: parse_addresses(values.get(5)),
            cc: parse_addresses(values.get(6)),
            bcc: parse_addresses(values.get(7)),
            in_reply_to: field(8),
            message_id: field(9),
        }
    }
}

/// Interprets the contents of a FETCH response's parenthesized list.
pub(crate) fn parse_fetch_items(values: &[Value]) -> Result<Vec<FetchItem>> {
    let mut items = Vec::new();
    let mut i = 0;
    while i < values.len() {
        let Some(name) = values[i].as_str().map(|s| s.to_ascii_uppercase()) else {
            return Err(Error::parse(0, "FETCH item without a name"));
        };
        i += 1;

        // BODY[...]<origin> and friends: skip the section and the payload.
        if matches!(values.get(i), Some(Value::Section(_))) {
            i += 1;
            if matches!(values.get(i), Some(Value::Atom(a)) if a.starts_with('<')) {
                i += 1;
            }
            i += 1;
            continue;
        }

        let Some(value) = values.get(i) else {
            return Err(Error::parse(0, format!("FETCH item {name} without a value")));
        };
        i += 1;

        match name.as_str() {
            "UID" => {
                let uid = value
                    .as_number()
                    .and_then(|n| u32::try_from(n).ok())
                    .and_then(Uid::new)
                    .ok_or_else(|| Error::parse(0, "invalid UID"))?;
                items.push(FetchItem::Uid(uid));
            }
            "FLAGS" => {
                let flags = value
                    .as_list()
                    .unwrap_or_default()
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|s| Flag::parse(&s))
                    .collect();
                items.push(FetchItem::Flags(flags));
            }
            "RFC822.SIZE" => {
                if let Some(size) = value.as_number() {
                    items.push(FetchItem::Rfc822Size(size));
                }
            }
            "INTERNALDATE" => {
                if let Some(date) = value.nstring() {
                    items.push(FetchItem::InternalDate(date));
                }
            }
            "ENVELOPE" => {
                if let Some(fields) = value.as_list() {
                    items.push(FetchItem::Envelope(Box::new(Envelope::from_values(fields))));
                }
            }
            "BODYSTRUCTURE" | "BODY" => {
                if let Some(fields) = value.as_list() {
                    items.push(FetchItem::BodyStructure(BodyStructure::from_values(fields)?));
                }
            }
            _ => {}
        }
    }
    Ok(items)
}
