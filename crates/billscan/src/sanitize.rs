//! Helpers for keeping untrusted or sensitive text out of prompts and logs.

use std::path::Path;

/// Maximum length for response bodies echoed into errors and logs.
pub const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Escapes chat-template control sequences so OCR text cannot masquerade as
/// instructions when embedded in a prompt.
pub fn sanitize_for_prompt(text: &str) -> String {
    text.replace("<|", "< |")
        .replace("|>", "| >")
        .replace("<s>", "< s >")
        .replace("</s>", "< / s >")
        .replace("[INST]", "[ INST ]")
        .replace("[/INST]", "[ / INST ]")
        .replace("<<SYS>>", "< < SYS > >")
        .replace("<</SYS>>", "< < / SYS > >")
        .replace("```", "'''")
}

/// Truncates a body to [`MAX_ERROR_BODY_LENGTH`] characters.
pub fn truncate_body(body: &str) -> String {
    if body.chars().count() > MAX_ERROR_BODY_LENGTH {
        let head: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
        format!("{}... (truncated)", head)
    } else {
        body.to_string()
    }
}

/// Returns only the filename component of a path.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}
