//! Multi-criteria caption scoring.
//!
//! Every function here is pure and deterministic: the same caption, tags,
//! trend terms and media metrics always produce a bit-identical
//! [`ScoreBreakdown`]. Breakpoints and weights are part of the output
//! contract and must not be tuned.
//!
//! | Component | Scale | Weight in total |
//! |-----------|-------|-----------------|
//! | format (caption length) | 0–1 | 0.25 |
//! | hashtag count | 0–1 | 0.25 |
//! | repetition | 0–1 | 0.15 |
//! | media fit (once per job) | 0–1 | 0.20 |
//! | trend fit | 0–100, divided by 100 | 0.15 |
//!
//! The weighted sum is scaled to 0–100 and multiplied by the banned-term
//! penalty. Trend fit and the total are stored rounded to one decimal, the
//! precision the revision thresholds are compared at; the total is computed
//! from the unrounded trend fit.
//!
//! Trend fit is the only component that needs a model. If the embedder
//! fails, scoring fails with the embedder's [`CollaboratorError`].

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::errors::CollaboratorError;
use crate::similarity::{mean_top_similarity, Embedder};
use crate::state::Variant;
use crate::{MediaMetrics, PercentScore, UnitScore, VariantId};

// ---------------------------------------------------------------------------
// Contract constants
// ---------------------------------------------------------------------------

pub const FORMAT_WEIGHT: f64 = 0.25;
pub const HASHTAG_WEIGHT: f64 = 0.25;
pub const REPETITION_WEIGHT: f64 = 0.15;
pub const MEDIA_FIT_WEIGHT: f64 = 0.20;
pub const TREND_FIT_WEIGHT: f64 = 0.15;

/// Multiplier applied to the total when a banned phrase appears.
pub const BANNED_TERM_PENALTY: f64 = 0.9;

/// A word occurring this many times or more triggers the repetition penalty.
pub const REPETITION_LIMIT: usize = 4;

/// Phrases penalised when they appear in a caption (case-insensitive).
pub const DEFAULT_BANNED_TERMS: &[&str] = &["FREE", "BEDAVA", "NO ADS"];

// Target platform profile: 9:16 portrait short-form video.
const MIN_PORTRAIT_WIDTH: u32 = 720;
const MIN_PORTRAIT_HEIGHT: u32 = 1280;
const TARGET_ASPECT: f64 = 9.0 / 16.0;
const ASPECT_TOLERANCE: f64 = 0.05;
const MIN_DURATION_SECONDS: f64 = 5.0;
const MAX_DURATION_SECONDS: f64 = 90.0;
const MIN_BITRATE: u64 = 500_000;

// (weight, fallback fraction when the condition is unmet)
const RESOLUTION_RULE: (f64, f64) = (0.35, 0.6);
const ASPECT_RULE: (f64, f64) = (0.35, 0.5);
const DURATION_RULE: (f64, f64) = (0.2, 0.6);
const BITRATE_RULE: (f64, f64) = (0.1, 0.7);

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// The full set of sub-scores and the derived total for one variant at one
/// quality-check pass. Never updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub format: UnitScore,
    pub hashtags: UnitScore,
    pub repetition: UnitScore,
    pub media_fit: UnitScore,
    pub trend_fit: PercentScore,
    /// The probed metrics `media_fit` was computed from.
    pub media: MediaMetrics,
    /// `1.0`, or [`BANNED_TERM_PENALTY`] if a banned phrase was found.
    pub banned_penalty: f64,
    pub total: PercentScore,
}

impl ScoreBreakdown {
    /// Assembles a breakdown from its components.
    ///
    /// The total is derived from the unrounded `trend_fit`; both are then
    /// rounded to one decimal.
    pub fn new(
        format: UnitScore,
        hashtags: UnitScore,
        repetition: UnitScore,
        media_fit: UnitScore,
        trend_fit: PercentScore,
        media: MediaMetrics,
        banned_penalty: f64,
    ) -> Self {
        let unpenalized = weighted_total(format, hashtags, repetition, media_fit, trend_fit);
        Self {
            format,
            hashtags,
            repetition,
            media_fit,
            trend_fit: trend_fit.rounded(),
            media,
            banned_penalty,
            total: PercentScore::saturating(unpenalized * banned_penalty).rounded(),
        }
    }
}

/// Score breakdowns keyed by variant id.
///
/// Keyed storage makes the merge order of independently scored variants
/// irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreBoard(BTreeMap<VariantId, ScoreBreakdown>);

impl ScoreBoard {
    pub fn get(&self, id: &VariantId) -> Option<&ScoreBreakdown> {
        self.0.get(id)
    }

    pub fn insert(&mut self, id: VariantId, breakdown: ScoreBreakdown) {
        self.0.insert(id, breakdown);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, id: &VariantId) -> bool {
        self.0.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&VariantId, &ScoreBreakdown)> {
        self.0.iter()
    }
}

impl FromIterator<(VariantId, ScoreBreakdown)> for ScoreBoard {
    fn from_iter<I: IntoIterator<Item = (VariantId, ScoreBreakdown)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Configurable inputs to scoring that are not part of the media or caption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringPolicy {
    /// Phrases that trigger the banned-term penalty.
    pub banned_terms: Vec<String>,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            banned_terms: DEFAULT_BANNED_TERMS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sub-scores
// ---------------------------------------------------------------------------

/// Caption length preference, measured in characters.
pub fn format_score(text: &str) -> UnitScore {
    let len = text.chars().count();
    let s = match len {
        0..=180 => 1.0,
        181..=300 => 0.8,
        301..=600 => 0.6,
        _ => 0.4,
    };
    UnitScore::saturating(s)
}

/// Hashtag density preference. Under-tagging is penalised harder than
/// moderate over-tagging.
pub fn hashtag_score(count: usize) -> UnitScore {
    let s = match count {
        8..=12 => 1.0,
        5..=7 => 0.7,
        13..=15 => 0.8,
        _ => 0.5,
    };
    UnitScore::saturating(s)
}

/// Binary penalty when any word (case-insensitive) occurs
/// [`REPETITION_LIMIT`] times or more.
pub fn repetition_score(text: &str) -> UnitScore {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        *counts.entry(word.to_lowercase()).or_default() += 1;
    }
    let worst = counts.values().copied().max().unwrap_or(0);
    UnitScore::saturating(if worst >= REPETITION_LIMIT { 0.7 } else { 1.0 })
}

/// How well the probed media matches a 9:16 portrait short-form profile.
///
/// Unknown (zero) duration and bitrate count as acceptable. Each unmet rule
/// still contributes a fallback share of its weight, so the result is never
/// zero; a zero media fit is reserved for media that could not be read at
/// all, which callers represent with [`UnitScore::saturating`]`(0.0)`.
pub fn media_fit(m: &MediaMetrics) -> UnitScore {
    let ok_resolution = m.width >= MIN_PORTRAIT_WIDTH && m.height >= MIN_PORTRAIT_HEIGHT;
    let ok_aspect = m.height > 0
        && (f64::from(m.width) / f64::from(m.height) - TARGET_ASPECT).abs() <= ASPECT_TOLERANCE;
    let ok_duration = m.duration_seconds == 0.0
        || (MIN_DURATION_SECONDS..=MAX_DURATION_SECONDS).contains(&m.duration_seconds);
    let ok_bitrate = m.bitrate == 0 || m.bitrate >= MIN_BITRATE;

    let rule = |(weight, fallback): (f64, f64), ok: bool| weight * if ok { 1.0 } else { fallback };
    UnitScore::saturating(
        rule(RESOLUTION_RULE, ok_resolution)
            + rule(ASPECT_RULE, ok_aspect)
            + rule(DURATION_RULE, ok_duration)
            + rule(BITRATE_RULE, ok_bitrate),
    )
}

/// Semantic closeness of the caption to the trend terms, on a 0–100 scale,
/// unrounded.
///
/// Neutral (50.0) when there are no non-empty terms or the caption is empty;
/// the embedder is not consulted in that case.
pub fn trend_fit(
    embedder: &dyn Embedder,
    text: &str,
    trend_terms: &[String],
) -> Result<PercentScore, CollaboratorError> {
    let terms: Vec<&str> = trend_terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    if text.trim().is_empty() || terms.is_empty() {
        return Ok(PercentScore::NEUTRAL);
    }
    Ok(match mean_top_similarity(embedder, text, &terms)? {
        Some(mean) => PercentScore::saturating(mean * 100.0),
        None => PercentScore::NEUTRAL,
    })
}

/// [`BANNED_TERM_PENALTY`] if any banned phrase is a case-insensitive
/// substring of `text`, else `1.0`.
pub fn banned_penalty(text: &str, banned_terms: &[String]) -> f64 {
    let lower = text.to_lowercase();
    let hit = banned_terms
        .iter()
        .filter(|b| !b.trim().is_empty())
        .any(|b| lower.contains(&b.to_lowercase()));
    if hit {
        BANNED_TERM_PENALTY
    } else {
        1.0
    }
}

fn weighted_total(
    format: UnitScore,
    hashtags: UnitScore,
    repetition: UnitScore,
    media_fit: UnitScore,
    trend_fit: PercentScore,
) -> f64 {
    100.0
        * (FORMAT_WEIGHT * format.as_f64()
            + HASHTAG_WEIGHT * hashtags.as_f64()
            + REPETITION_WEIGHT * repetition.as_f64()
            + MEDIA_FIT_WEIGHT * media_fit.as_f64()
            + TREND_FIT_WEIGHT * (trend_fit.as_f64() / 100.0))
}

// ---------------------------------------------------------------------------
// Variant scoring
// ---------------------------------------------------------------------------

/// Everything a quality-check pass needs besides the variants themselves.
///
/// `media_fit` is computed once per job and shared by every variant.
pub struct ScoringContext<'a> {
    pub embedder: &'a dyn Embedder,
    pub trend_terms: &'a [String],
    pub media: MediaMetrics,
    pub media_fit: UnitScore,
    pub policy: &'a ScoringPolicy,
}

impl<'a> ScoringContext<'a> {
    /// Builds a context, deriving media fit from `media`.
    pub fn new(
        embedder: &'a dyn Embedder,
        trend_terms: &'a [String],
        media: MediaMetrics,
        policy: &'a ScoringPolicy,
    ) -> Self {
        Self {
            embedder,
            trend_terms,
            media,
            media_fit: media_fit(&media),
            policy,
        }
    }

    /// Scores one caption with its tags.
    pub fn score(&self, text: &str, tags: &[String]) -> Result<ScoreBreakdown, CollaboratorError> {
        Ok(ScoreBreakdown::new(
            format_score(text),
            hashtag_score(tags.len()),
            repetition_score(text),
            self.media_fit,
            trend_fit(self.embedder, text, self.trend_terms)?,
            self.media,
            banned_penalty(text, &self.policy.banned_terms),
        ))
    }

    /// Scores every variant, producing a fresh board.
    pub fn score_all(&self, variants: &[Variant]) -> Result<ScoreBoard, CollaboratorError> {
        variants
            .iter()
            .map(|v| self.score(&v.text, &v.tags).map(|b| (v.id.clone(), b)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::HashingEmbedder;

    fn tags(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("#tag{i}")).collect()
    }

    fn portrait() -> MediaMetrics {
        MediaMetrics {
            width: 1080,
            height: 1920,
            duration_seconds: 30.0,
            bitrate: 4_000_000,
        }
    }

    #[test]
    fn format_boundaries() {
        assert_eq!(format_score(&"a".repeat(180)).as_f64(), 1.0);
        assert_eq!(format_score(&"a".repeat(181)).as_f64(), 0.8);
        assert_eq!(format_score(&"a".repeat(300)).as_f64(), 0.8);
        assert_eq!(format_score(&"a".repeat(600)).as_f64(), 0.6);
        assert_eq!(format_score(&"a".repeat(601)).as_f64(), 0.4);
    }

    #[test]
    fn format_counts_characters_not_bytes() {
        assert_eq!(format_score(&"ş".repeat(180)).as_f64(), 1.0);
    }

    #[test]
    fn hashtag_boundaries() {
        assert_eq!(hashtag_score(8).as_f64(), 1.0);
        assert_eq!(hashtag_score(12).as_f64(), 1.0);
        assert_eq!(hashtag_score(7).as_f64(), 0.7);
        assert_eq!(hashtag_score(5).as_f64(), 0.7);
        assert_eq!(hashtag_score(4).as_f64(), 0.5);
        assert_eq!(hashtag_score(13).as_f64(), 0.8);
        assert_eq!(hashtag_score(15).as_f64(), 0.8);
        assert_eq!(hashtag_score(16).as_f64(), 0.5);
        assert_eq!(hashtag_score(0).as_f64(), 0.5);
    }

    #[test]
    fn repetition_is_case_insensitive_and_binary() {
        assert_eq!(repetition_score("go go go").as_f64(), 1.0);
        assert_eq!(repetition_score("Go go GO, gO!").as_f64(), 0.7);
        assert_eq!(repetition_score("").as_f64(), 1.0);
    }

    #[test]
    fn media_fit_rewards_portrait_profile() {
        assert!((media_fit(&portrait()).as_f64() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn media_fit_treats_zero_duration_and_bitrate_as_unknown() {
        let m = MediaMetrics {
            duration_seconds: 0.0,
            bitrate: 0,
            ..portrait()
        };
        assert!((media_fit(&m).as_f64() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn media_fit_never_drops_to_zero() {
        let landscape = MediaMetrics {
            width: 640,
            height: 360,
            duration_seconds: 400.0,
            bitrate: 100_000,
        };
        let expected = 0.35 * 0.6 + 0.35 * 0.5 + 0.2 * 0.6 + 0.1 * 0.7;
        assert!((media_fit(&landscape).as_f64() - expected).abs() < 1e-12);

        let unknown = MediaMetrics::default();
        let expected = 0.35 * 0.6 + 0.35 * 0.5 + 0.2 + 0.1;
        assert!((media_fit(&unknown).as_f64() - expected).abs() < 1e-12);
    }

    #[test]
    fn trend_fit_is_neutral_without_signal() {
        let e = HashingEmbedder::default();
        assert_eq!(trend_fit(&e, "anything", &[]).unwrap().as_f64(), 50.0);
        assert_eq!(trend_fit(&e, "", &["racing".into()]).unwrap().as_f64(), 50.0);
        assert_eq!(trend_fit(&e, "anything", &["  ".into()]).unwrap().as_f64(), 50.0);
    }

    #[test]
    fn trend_fit_is_high_for_matching_terms() {
        let e = HashingEmbedder::default();
        let fit = trend_fit(&e, "racing", &["racing".into()]).unwrap();
        assert!((fit.as_f64() - 100.0).abs() < 1e-4);
    }

    #[test]
    fn banned_terms_match_case_insensitive_substrings() {
        let banned = ScoringPolicy::default().banned_terms;
        assert_eq!(banned_penalty("Play for free today", &banned), 0.9);
        assert_eq!(banned_penalty("Totally no ads!", &banned), 0.9);
        assert_eq!(banned_penalty("Play today", &banned), 1.0);
    }

    #[test]
    fn banned_term_scales_total_by_point_nine() {
        let one = UnitScore::saturating(1.0);
        let fit = PercentScore::saturating(40.0);
        let clean = ScoreBreakdown::new(one, one, one, one, fit, portrait(), 1.0);
        let banned = ScoreBreakdown::new(one, one, one, one, fit, portrait(), BANNED_TERM_PENALTY);
        // 100 * (0.85 + 0.15 * 0.4) = 91.0
        assert_eq!(clean.total.as_f64(), 91.0);
        assert_eq!(banned.total.as_f64(), 81.9);
    }

    #[test]
    fn banned_policy_applies_through_the_context() {
        let e = HashingEmbedder::default();
        let policy = ScoringPolicy::default();
        let ctx = ScoringContext::new(&e, &[], portrait(), &policy);
        let b = ctx.score("Race now, free spirit", &tags(9)).unwrap();
        assert_eq!(b.banned_penalty, 0.9);
    }

    #[test]
    fn total_uses_contract_weights() {
        let e = HashingEmbedder::default();
        let policy = ScoringPolicy::default();
        let ctx = ScoringContext::new(&e, &[], portrait(), &policy);
        let b = ctx.score("Short caption", &tags(10)).unwrap();
        // format 1, hashtags 1, repetition 1, media 1, trend fit neutral 50
        let expected = 100.0 * (0.25 + 0.25 + 0.15 + 0.20 + 0.15 * 0.5);
        assert!((b.total.as_f64() - expected).abs() < 1e-9);
    }

    #[test]
    fn stored_scores_are_rounded_to_one_decimal() {
        let one = UnitScore::saturating(1.0);
        // 65 + 20 * 0.0483 + 0.15 * 59.96 = 74.96 before rounding
        let b = ScoreBreakdown::new(
            one,
            one,
            one,
            UnitScore::saturating(0.0483),
            PercentScore::saturating(59.96),
            MediaMetrics::default(),
            1.0,
        );
        assert_eq!(b.trend_fit.as_f64(), 60.0);
        assert_eq!(b.total.as_f64(), 75.0);
    }

    #[test]
    fn total_is_derived_from_unrounded_trend_fit() {
        let one = UnitScore::saturating(1.0);
        let zero = UnitScore::saturating(0.0);
        // 65 + 0.15 * 66.34 = 74.951, whereas the rounded 66.3 would give 74.945
        let b = ScoreBreakdown::new(
            one,
            one,
            one,
            zero,
            PercentScore::saturating(66.34),
            MediaMetrics::default(),
            1.0,
        );
        assert_eq!(b.trend_fit.as_f64(), 66.3);
        assert_eq!(b.total.as_f64(), 75.0);
    }

    #[test]
    fn scoring_is_deterministic() {
        let e = HashingEmbedder::default();
        let policy = ScoringPolicy::default();
        let terms = vec!["drift".to_string(), "arcade racing".to_string()];
        let ctx = ScoringContext::new(&e, &terms, portrait(), &policy);
        let a = ctx.score("Drift through the arcade", &tags(8)).unwrap();
        let b = ctx.score("Drift through the arcade", &tags(8)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.total.as_f64().to_bits(), b.total.as_f64().to_bits());
    }

    #[test]
    fn score_all_keys_by_variant_id() {
        let e = HashingEmbedder::default();
        let policy = ScoringPolicy::default();
        let ctx = ScoringContext::new(&e, &[], portrait(), &policy);
        let variants = vec![
            Variant {
                id: VariantId::new("v1").unwrap(),
                text: "one".into(),
                tags: tags(8),
            },
            Variant {
                id: VariantId::new("v2").unwrap(),
                text: "two".into(),
                tags: tags(3),
            },
        ];
        let board = ctx.score_all(&variants).unwrap();
        assert_eq!(board.len(), 2);
        assert!(board.contains(&VariantId::new("v2").unwrap()));
    }
}
