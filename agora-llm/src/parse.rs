//! Pulling structured JSON out of free-form model output.
//!
//! Models wrap JSON in prose, in ```` ```json ```` fences, or in both. The
//! extraction order is: fenced block, then the outermost `{ ... }` span,
//! then the trimmed text as-is.

use serde::de::DeserializeOwned;

use crate::error::LlmError;

/// Return the most likely JSON payload inside `text`.
#[must_use]
pub fn extract_json(text: &str) -> &str {
    if let Some(block) = fenced_block(text).filter(|b| b.starts_with(['{', '['])) {
        return block;
    }
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text.trim(),
    }
}

fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    // Skip the language tag on the fence line.
    let body_start = after_fence.find('\n').map_or(0, |i| i + 1);
    let body = &after_fence[body_start..];
    let close = body.find("```")?;
    let block = body[..close].trim();
    (!block.is_empty()).then_some(block)
}

/// Parse a raw model response as structured JSON of type `T`.
///
/// # Errors
/// [`LlmError::EmptyResponse`] for blank text, [`LlmError::ParseError`] if no
/// payload deserializes into `T`.
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    if text.trim().is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    let payload = extract_json(text);
    serde_json::from_str(payload).map_err(|e| {
        LlmError::ParseError(format!("JSON parse error: {e}; raw text: '{text}'"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ArbitrationResponse;

    #[test]
    fn fenced_json_block() {
        let text = "Here you go:\n```json\n{\"combat_log\":\"A hit B\",\"narrative\":\"Steel rang.\"}\n```\nGood luck.";
        let parsed: ArbitrationResponse = parse_structured(text).unwrap();
        assert_eq!(parsed.combat_log, "A hit B");
        assert!(parsed.hp_updates.is_empty());
    }

    #[test]
    fn bare_object_in_prose() {
        let text = "Sure! {\"combat_log\":\"x\",\"narrative\":\"y\"} hope that helps";
        assert_eq!(extract_json(text), "{\"combat_log\":\"x\",\"narrative\":\"y\"}");
    }

    #[test]
    fn fence_without_language_tag() {
        assert_eq!(extract_json("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn empty_and_malformed() {
        assert!(matches!(
            parse_structured::<ArbitrationResponse>("   "),
            Err(LlmError::EmptyResponse)
        ));
        assert!(matches!(
            parse_structured::<ArbitrationResponse>("I refuse."),
            Err(LlmError::ParseError(_))
        ));
        assert!(matches!(
            parse_structured::<ArbitrationResponse>("```json\n{\"narrative\":1}\n```"),
            Err(LlmError::ParseError(_))
        ));
    }
}
