//! Helpers for putting player-supplied strings (user ids, share text, storage
//! values) into log lines without breaking the one-record-per-line format.

const MAX_PREVIEW: usize = 120;

/// Escape control characters and cap the length of a string bound for a log line.
///
/// Newlines, carriage returns and tabs become `\n`, `\r`, `\t`; other control
/// characters become `\xNN`. Anything past the preview length is replaced by `…`.
pub fn escape_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 4);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Log form of an optional id: the escaped id or `anonymous`.
pub fn who(user: Option<&str>) -> String {
    user.map(escape_log)
        .unwrap_or_else(|| "anonymous".to_string())
}
