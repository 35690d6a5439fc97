//! Answer extraction from free-form model output.
//!
//! Models "think out loud" and may produce several candidate answers; every extractor
//! here returns the **last** delimited token because that is the one the model committed to.

use std::sync::LazyLock;

use regex::Regex;

use crate::constants::BOXED_MARKER;

static GENERIC_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```([\w#+]+)\n(.*?)```").expect("generic fence pattern is valid")
});

/// Returns the last `\boxed{...}` expression including the marker and outer braces.
///
/// Braces are matched with a depth counter so nested groups such as
/// `\boxed{\frac{1}{2}}` are captured whole. Returns `None` when there is no marker or
/// the braces after the last marker never balance.
pub fn extract_last_boxed(text: &str) -> Option<&str> {
    let start = text.rfind(BOXED_MARKER)?;

    let mut depth = 0usize;
    for (offset, byte) in text.as_bytes()[start..].iter().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                // A stray closing brace before any opening one cannot close the box.
                if depth == 0 {
                    return None;
                }
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Returns the content of the last fenced block tagged exactly `language`.
///
/// The tag comparison is case-sensitive and the tag must be followed directly by a
/// newline, so ` ```python3 ` does not match `python`.
pub fn extract_fenced_code<'a>(text: &'a str, language: &str) -> Option<&'a str> {
    let opening = format!("```{language}\n");
    let mut rest = text;
    let mut last = None;

    while let Some(start) = rest.find(&opening) {
        let body = &rest[start + opening.len()..];
        let Some(end) = body.find("```") else {
            break;
        };
        last = Some(&body[..end]);
        rest = &body[end + 3..];
    }

    last
}

/// Returns the trimmed content of the last fenced block with any non-empty tag.
pub fn extract_last_generic_code_block(text: &str) -> Option<&str> {
    GENERIC_FENCE
        .captures_iter(text)
        .last()
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().trim())
}

/// Returns the assistant turn of a rendered transcript.
///
/// Everything after the last `split_token` is the model's own output; prompts echoed
/// before it must not be scored. Text without the token is returned unchanged.
pub fn assistant_response<'a>(text: &'a str, split_token: &str) -> &'a str {
    if split_token.is_empty() {
        return text;
    }
    text.rsplit_once(split_token)
        .map(|(_, response)| response)
        .unwrap_or(text)
}
