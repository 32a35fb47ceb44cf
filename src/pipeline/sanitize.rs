//! Recovery of a JSON object from free-form model output.

use regex::Regex;
use std::sync::OnceLock;

fn fenced_json() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```json\s*(\{.*?\})\s*```").expect("fence pattern is valid")
    })
}

/// Extract the most plausible JSON object from `text`.
///
/// In order: the body of a ```` ```json ```` fence, the span from the first `{` to the last
/// `}`, or the input unchanged. Never fails; a bad guess shows up as a parse error upstream.
pub fn sanitize(text: &str) -> String {
    if let Some(body) = fenced_json()
        .captures(text)
        .and_then(|captures| captures.get(1))
    {
        return body.as_str().to_string();
    }

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => text[start..=end].to_string(),
        _ => text.to_string(),
    }
}
