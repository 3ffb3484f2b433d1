//! Plain-text output.

use std::fmt::Write;

use mailsift_core::MessageSummary;

/// One listing line: markers, UID, date, attachment marker, sender, subject
/// and, when there are attachments, their count and total size.
pub fn message_line(summary: &MessageSummary, show_names: bool) -> String {
    let mut line = String::new();
    line.push(if summary.seen { ' ' } else { '*' });
    line.push(if summary.answered { 'R' } else { ' ' });
    line.push(if summary.flagged { 'F' } else { ' ' });

    let date = summary
        .date
        .map_or_else(|| "----------".to_string(), |d| d.format("%Y-%m-%d").to_string());
    let marker = if summary.attachments.is_empty() { ' ' } else { '@' };
    let sender = if show_names {
        summary.sender()
    } else {
        summary.address.as_str()
    };
    let _ = write!(
        line,
        " {:>6} {date} {marker} {:<32} {}",
        summary.uid.get(),
        truncate(sender, 32),
        summary.subject
    );
    if !summary.attachments.is_empty() {
        let _ = write!(
            line,
            " [{} {}, {}]",
            summary.attachments.len(),
            if summary.attachments.len() == 1 { "file" } else { "files" },
            human_size(summary.attachment_size())
        );
    }
    line
}

/// Count line printed after a listing.
pub fn count_line(count: usize) -> String {
    match count {
        1 => "1 message".to_string(),
        n => format!("{n} messages"),
    }
}

/// One `--unique` line.
pub fn sender_line(address: &str, count: usize) -> String {
    format!("{count:>6} {address}")
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('~');
    cut
}

#[allow(clippy::cast_precision_loss)]
fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    while size >= 1024.0 && unit + 1 < UNITS.len() {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.1} {}", UNITS[unit])
}
