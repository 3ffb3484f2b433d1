//! Message metadata decoded from FETCH items.

use chrono::{DateTime, FixedOffset};
use mailsift_imap::{Address, BodyStructure, FetchAttribute, FetchItem, Flag, Uid};

/// Items fetched to build a [`MessageSummary`].
pub const SUMMARY_ATTRIBUTES: [FetchAttribute; 5] = [
    FetchAttribute::Flags,
    FetchAttribute::Envelope,
    FetchAttribute::BodyStructure,
    FetchAttribute::Rfc822Size,
    FetchAttribute::InternalDate,
];

/// Summary of one message, without its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSummary {
    /// Unique identifier within the folder.
    pub uid: Uid,
    /// Sender address.
    pub address: String,
    /// Sender display name, if any.
    pub name: Option<String>,
    /// Subject header, undecoded.
    pub subject: String,
    /// Internal date, or the Date header when the server sent none.
    pub date: Option<DateTime<FixedOffset>>,
    /// `\Seen`
    pub seen: bool,
    /// `\Answered`
    pub answered: bool,
    /// `\Flagged`
    pub flagged: bool,
    /// `\Draft`
    pub draft: bool,
    /// `\Deleted`
    pub deleted: bool,
    /// Total size in bytes.
    pub size: u64,
    /// Attachments found in the body structure.
    pub attachments: Vec<Attachment>,
}

impl MessageSummary {
    /// Builds a summary from one message's FETCH items.
    #[must_use]
    pub fn from_items(uid: Uid, items: &[FetchItem]) -> Self {
        let mut summary = Self {
            uid,
            address: String::new(),
            name: None,
            subject: String::new(),
            date: None,
            seen: false,
            answered: false,
            flagged: false,
            draft: false,
            deleted: false,
            size: 0,
            attachments: Vec::new(),
        };
        let mut header_date = None;

        for item in items {
            match item {
                FetchItem::Flags(flags) => {
                    for flag in flags {
                        match flag {
                            Flag::Seen => summary.seen = true,
                            Flag::Answered => summary.answered = true,
                            Flag::Flagged => summary.flagged = true,
                            Flag::Draft => summary.draft = true,
                            Flag::Deleted => summary.deleted = true,
                            Flag::Recent | Flag::Keyword(_) => {}
                        }
                    }
                }
                FetchItem::Envelope(envelope) => {
                    if let Some(from) = envelope.from.first() {
                        summary.address = email(from);
                        summary.name = from.name.clone().filter(|n| !n.trim().is_empty());
                    }
                    summary.subject = envelope.subject.clone().unwrap_or_default();
                    header_date = envelope
                        .date
                        .as_deref()
                        .and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok());
                }
                FetchItem::BodyStructure(body) => summary.attachments = attachments(body),
                FetchItem::Rfc822Size(size) => summary.size = *size,
                FetchItem::InternalDate(text) => summary.date = parse_internal_date(text),
                FetchItem::Uid(_) => {}
            }
        }
        if summary.date.is_none() {
            summary.date = header_date;
        }
        summary
    }

    /// Display name if present, otherwise the address.
    #[must_use]
    pub fn sender(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }

    /// Combined size of all attachments.
    #[must_use]
    pub fn attachment_size(&self) -> u64 {
        self.attachments.iter().map(|a| a.size).sum()
    }
}

fn email(address: &Address) -> String {
    address.email().unwrap_or_default()
}

/// Parses an INTERNALDATE such as ` 1-Feb-2024 10:00:00 +0100`.
fn parse_internal_date(text: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(text.trim(), "%d-%b-%Y %H:%M:%S %z").ok()
}

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name as sent.
    pub filename: String,
    /// Encoded size in bytes.
    pub size: u64,
}

impl Attachment {
    /// Category derived from the file extension.
    #[must_use]
    pub fn kind(&self) -> AttachmentKind {
        AttachmentKind::from_filename(&self.filename)
    }
}

/// Broad attachment category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    /// PDF document.
    Pdf,
    /// Office or text document.
    Document,
    /// Picture.
    Image,
    /// Compressed archive.
    Archive,
    /// Calendar invitation.
    Calendar,
    /// Anything else.
    Other,
}

impl AttachmentKind {
    /// Detects the category from a file name's extension.
    #[must_use]
    pub fn from_filename(filename: &str) -> Self {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "pdf" => Self::Pdf,
            "doc" | "docx" | "odt" | "rtf" | "txt" | "xls" | "xlsx" | "ods" | "csv" | "ppt"
            | "pptx" | "odp" => Self::Document,
            "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp" | "heic" | "tif" | "tiff" | "svg" => {
                Self::Image
            }
            "zip" | "gz" | "tgz" | "tar" | "bz2" | "xz" | "7z" | "rar" => Self::Archive,
            "ics" | "vcs" => Self::Calendar,
            _ => Self::Other,
        }
    }
}

/// Collects attachments from a body structure, descending into multipart
/// and encapsulated message parts.
///
/// A part counts when it is `application/*` or `image/*`, has an
/// `attachment` disposition and carries a file name.
#[must_use]
pub fn attachments(body: &BodyStructure) -> Vec<Attachment> {
    let mut found = Vec::new();
    collect(body, &mut found);
    found
}

fn collect(body: &BodyStructure, found: &mut Vec<Attachment>) {
    match body {
        BodyStructure::Multipart { parts, .. } => {
            for part in parts {
                collect(part, found);
            }
        }
        BodyStructure::Message { body, .. } => collect(body, found),
        BodyStructure::Single {
            media_type,
            size,
            disposition,
            ..
        } => {
            let candidate = media_type.eq_ignore_ascii_case("application")
                || media_type.eq_ignore_ascii_case("image");
            let Some(disposition) = disposition.as_ref().filter(|d| d.is_attachment()) else {
                return;
            };
            if !candidate {
                return;
            }
            let filename = disposition
                .param("filename")
                .or_else(|| body.param("name"))
                .filter(|name| !name.is_empty());
            if let Some(filename) = filename {
                found.push(Attachment {
                    filename: filename.to_string(),
                    size: *size,
                });
            }
        }
    }
}
