//! Extraction of the canonical answer from the model's final message.

use std::sync::OnceLock;

use regex::Regex;

/// Marker the system prompt asks the model to put before its answer.
pub const FINAL_ANSWER_MARKER: &str = "FINAL ANSWER:";

fn marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)FINAL ANSWER:\s*(.*)").expect("valid regex"))
}

/// Return the trimmed text after the first `FINAL ANSWER:` marker (matched
/// case-insensitively, up to the end of that line), or the input unchanged
/// when no marker is present.
pub fn format_response(response: &str) -> String {
    match marker_re().captures(response).and_then(|c| c.get(1)) {
        Some(answer) => answer.as_str().trim().to_string(),
        None => response.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_answer_after_marker() {
        assert_eq!(format_response("Some reasoning. FINAL ANSWER: 42"), "42");
    }

    #[test]
    fn identity_without_marker() {
        assert_eq!(format_response("no marker here"), "no marker here");
        assert_eq!(format_response(""), "");
    }

    #[test]
    fn marker_is_case_insensitive() {
        assert_eq!(format_response("final answer:   Paris  "), "Paris");
        assert_eq!(format_response("Final Answer: b4, Qxf2"), "b4, Qxf2");
    }

    #[test]
    fn answer_on_following_line() {
        assert_eq!(format_response("Thoughts...\nFINAL ANSWER:\n132, 133, 134"), "132, 133, 134");
    }

    #[test]
    fn trailing_lines_after_answer_are_dropped() {
        assert_eq!(
            format_response("FINAL ANSWER: 3\nLet me know if you need more."),
            "3"
        );
    }

    #[test]
    fn first_marker_wins() {
        assert_eq!(format_response("FINAL ANSWER: a\nFINAL ANSWER: b"), "a");
    }

    #[test]
    fn marker_with_empty_answer() {
        assert_eq!(format_response("FINAL ANSWER:"), "");
    }
}
