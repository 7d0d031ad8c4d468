//! Caption prompt construction.

use pipeline::GenerationRequest;

pub const MAX_DESCRIPTION_CHARS: usize = 700;
pub const MAX_TAGS: usize = 20;
pub const MAX_TRENDS: usize = 20;
pub const MAX_ASO_KEYWORDS: usize = 30;

const SYSTEM: &str = "You are a social media content editor and app-store optimisation expert. \
You answer only in the requested JSON format, with no explanation, preface, warning or free text.";

const RULES: &str = r##"Rules:
1) Return JSON only (no code block), in exactly this shape:
{
  "variants": [
    {"id":"v1","caption":"...","hashtags":["#..."]},
    {"id":"v2","caption":"...","hashtags":["#..."]},
    {"id":"v3","caption":"...","hashtags":["#..."]}
  ]
}
2) caption: 1-2 sentences (90-220 characters), clear, with a call to action; emoji allowed in moderation.
3) Do not write any preface or introduction.
4) hashtags: 8-12 per variant, each starting with a single #; use at least one of the trend terms.
5) Forbidden: bullet points, numbering, '---' separators and meta phrases such as "Suggestion:", "editor", "rewrite" or "revised"."##;

fn head(items: &[String], n: usize) -> String {
    items.iter().take(n).map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// Builds the full prompt for one generation pass.
pub fn build_prompt(request: &GenerationRequest) -> String {
    let description: String = request.description.chars().take(MAX_DESCRIPTION_CHARS).collect();
    let mut prompt = format!(
        "{SYSTEM}\n\n\
         Write 3 different Instagram post variants from the information below.\n\n\
         - Language: {language}\n\
         - Game name: {game}\n\
         - Game description (summary): {description}\n\
         - Image/video tags: {tags}\n\
         - Trend terms: {trends}\n\
         - ASO keywords: {aso}\n\n\
         {RULES}\n",
        language = request.language,
        game = request.game_name,
        tags = head(&request.tags, MAX_TAGS),
        trends = head(&request.trend_terms, MAX_TRENDS),
        aso = head(&request.aso_keywords, MAX_ASO_KEYWORDS),
    );
    if let Some(critique) = request.critique.as_deref().filter(|c| !c.trim().is_empty()) {
        prompt.push_str("\nRevision instruction: ");
        prompt.push_str(critique.trim());
        prompt.push('\n');
    }
    prompt.push_str("\nNow return only valid JSON.");
    prompt
}
