//! Turning raw model output into validated [`ParsedVariants`].
//!
//! Models wrap JSON in code fences, add prefaces and otherwise stray from
//! the requested shape. Parsing is deliberately loose; validation is not.

use pipeline::{ParseValidationError, ParsedVariants, Variant, VariantId};
use serde::Deserialize;

/// Caption openings that mark model chatter rather than caption text.
const FORBIDDEN_PREFIXES: &[&str] = &[
    "harika bir görev",
    "işte",
    "aşağıda",
    "öneri",
    "editör",
    "editor",
    "tekrar yaz",
    "revize",
    "---",
];

#[derive(Debug, Default, Deserialize)]
struct RawOutput {
    #[serde(default)]
    variants: Vec<RawVariant>,
}

#[derive(Debug, Default, Deserialize)]
struct RawVariant {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    hashtags: Option<Vec<String>>,
}

/// Strips code fences and returns the outermost `{...}` object.
pub fn extract_json(text: &str) -> Option<&str> {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```") {
        body = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    }
    body = body.trim_end().trim_end_matches("```");
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (start < end).then(|| &body[start..=end])
}

/// Drops a leading preamble line and strips `--` separators at either end.
pub fn sanitize_caption(text: &str) -> String {
    let mut t = text.trim().to_string();
    // Dotted capital I lowercases to "i" plus a combining dot.
    let lower = t.to_lowercase().replace('\u{307}', "");
    if FORBIDDEN_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        let lines: Vec<&str> = t.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        t = lines.get(1..).map(|rest| rest.join(" ")).unwrap_or_default();
    }
    strip_dashes(&t).to_string()
}

fn strip_dashes(t: &str) -> &str {
    let mut s = t;
    if s.starts_with("--") {
        s = s.trim_start_matches('-');
    }
    if s.ends_with("--") {
        s = s.trim_end_matches('-');
    }
    s.trim()
}

/// Parses and validates raw model output.
///
/// Items with no id, an empty sanitised caption or no `#` hashtags are
/// dropped; a repeated id keeps its first occurrence. Fails if nothing
/// valid remains.
pub fn parse_variants(raw: &str) -> Result<ParsedVariants, ParseValidationError> {
    let json = extract_json(raw)
        .ok_or_else(|| ParseValidationError("no JSON object in model output".into()))?;
    let output: RawOutput = serde_json::from_str(json)
        .map_err(|e| ParseValidationError(format!("invalid JSON in model output: {e}")))?;

    let mut variants: Vec<Variant> = Vec::new();
    for item in output.variants {
        let Some(id) = item.id.and_then(|id| VariantId::new(id.trim())) else {
            continue;
        };
        if variants.iter().any(|v| v.id == id) {
            tracing::debug!(id = %id, "dropping duplicate variant id");
            continue;
        }
        let text = sanitize_caption(item.caption.as_deref().unwrap_or_default());
        let tags: Vec<String> = item
            .hashtags
            .unwrap_or_default()
            .iter()
            .map(|h| h.trim())
            .filter(|h| h.starts_with('#'))
            .map(str::to_string)
            .collect();
        if text.is_empty() || tags.is_empty() {
            continue;
        }
        variants.push(Variant { id, text, tags });
    }

    ParsedVariants::new(variants)
}
