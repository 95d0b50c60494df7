//! Plain-text attachments (text, code, structured text).

/// Script entry-point guards stripped from code attachments.
const ENTRY_POINT_MARKERS: [&str; 2] = [
    "if __name__ == \"__main__\":",
    "if __name__ == '__main__':",
];

/// Decode `bytes` as UTF-8, dropping invalid sequences, and remove entry-point
/// guards wherever they occur.
pub fn extract_text(bytes: &[u8]) -> String {
    strip_entry_point(&decode_utf8_dropping_invalid(bytes))
}

/// Best-effort UTF-8 decoding: invalid byte sequences are skipped rather than
/// replaced.
pub fn decode_utf8_dropping_invalid(mut bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                out.push_str(valid);
                return out;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                // valid_up_to() guarantees this prefix is UTF-8
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                match e.error_len() {
                    Some(len) => bytes = &rest[len..],
                    None => return out,
                }
            }
        }
    }
}

/// Remove every occurrence of the guard text; the guarded body stays.
fn strip_entry_point(text: &str) -> String {
    ENTRY_POINT_MARKERS
        .iter()
        .fold(text.to_string(), |acc, marker| acc.replace(marker, ""))
}
