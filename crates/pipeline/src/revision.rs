//! The revision decision: should the pipeline regenerate once more?
//!
//! [`evaluate`] is a pure function of the score board and the revision
//! budget. It never touches the revision counter; the orchestrator consumes
//! budget when (and only when) it actually takes the revise edge, so calling
//! [`evaluate`] repeatedly for diagnostics cannot double-count.
//!
//! The same [`select_best`] rule picks the finalize winner, so the variant
//! judged here is exactly the one exported.

use serde::{Deserialize, Serialize};

use crate::scoring::{ScoreBoard, ScoreBreakdown};
use crate::state::Variant;
use crate::VariantId;

/// Best-variant total below which a revision is requested.
pub const TOTAL_THRESHOLD: f64 = 75.0;

/// Best-variant trend fit below which a revision is requested.
pub const TREND_FIT_THRESHOLD: f64 = 60.0;

/// The outcome of one quality-check decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityVerdict {
    /// The best-scoring variant.
    pub best: VariantId,
    pub best_total: f64,
    pub best_trend_fit: f64,
    /// `best_total < TOTAL_THRESHOLD`.
    pub below_total: bool,
    /// `best_trend_fit < TREND_FIT_THRESHOLD`.
    pub below_trend_fit: bool,
    /// Whether another revision was still permitted when decided.
    pub budget_available: bool,
    /// The final decision.
    pub needs_revision: bool,
}

impl QualityVerdict {
    /// Returns `true` if the best variant missed either threshold.
    pub fn below_quality_bar(&self) -> bool {
        self.below_total || self.below_trend_fit
    }

    /// Builds the instruction passed to the generator on a revision pass.
    pub fn critique(&self) -> String {
        let mut problems = Vec::new();
        if self.below_total {
            problems.push(format!(
                "overall quality score {:.1} is below {:.0}",
                self.best_total, TOTAL_THRESHOLD
            ));
        }
        if self.below_trend_fit {
            problems.push(format!(
                "trend fit {:.1} is below {:.0}",
                self.best_trend_fit, TREND_FIT_THRESHOLD
            ));
        }
        format!(
            "The previous best caption ({}) was rejected: {}. Rewrite all variants: weave in \
             the trend terms naturally, keep captions short, use 8-12 hashtags, and avoid \
             repeating words.",
            self.best,
            problems.join("; ")
        )
    }
}

/// Picks the best-scoring variant.
///
/// Highest total wins; on a tie the variant that appears first in `variants`
/// wins. Variants without a breakdown, and breakdowns without a variant, are
/// ignored.
pub fn select_best<'a>(
    variants: &'a [Variant],
    board: &'a ScoreBoard,
) -> Option<(&'a Variant, &'a ScoreBreakdown)> {
    let mut best: Option<(&Variant, &ScoreBreakdown)> = None;
    for variant in variants {
        let Some(score) = board.get(&variant.id) else {
            continue;
        };
        let better = match best {
            Some((_, current)) => score.total.as_f64() > current.total.as_f64(),
            None => true,
        };
        if better {
            best = Some((variant, score));
        }
    }
    best
}

/// Decides whether to revise.
///
/// `needs_revision` is true iff the best variant misses either threshold
/// **and** `revision_count < max_revisions`. Scores are compared as stored,
/// rounded to one decimal, so a total of 74.96 counts as 75.0. Returns
/// `None` when no variant has been scored.
pub fn evaluate(
    variants: &[Variant],
    board: &ScoreBoard,
    revision_count: u32,
    max_revisions: u32,
) -> Option<QualityVerdict> {
    let (variant, score) = select_best(variants, board)?;

    let best_total = score.total.as_f64();
    let best_trend_fit = score.trend_fit.as_f64();
    let below_total = best_total < TOTAL_THRESHOLD;
    let below_trend_fit = best_trend_fit < TREND_FIT_THRESHOLD;
    let budget_available = revision_count < max_revisions;

    Some(QualityVerdict {
        best: variant.id.clone(),
        best_total,
        best_trend_fit,
        below_total,
        below_trend_fit,
        budget_available,
        needs_revision: (below_total || below_trend_fit) && budget_available,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MediaMetrics, PercentScore, UnitScore};

    fn variant(id: &str) -> Variant {
        Variant {
            id: VariantId::new(id).unwrap(),
            text: format!("caption {id}"),
            tags: vec!["#a".into()],
        }
    }

    fn breakdown(total: f64, trend_fit: f64) -> ScoreBreakdown {
        let one = UnitScore::saturating(1.0);
        ScoreBreakdown {
            format: one,
            hashtags: one,
            repetition: one,
            media_fit: one,
            trend_fit: PercentScore::saturating(trend_fit),
            media: MediaMetrics::default(),
            banned_penalty: 1.0,
            total: PercentScore::saturating(total),
        }
    }

    fn board(entries: &[(&str, f64, f64)]) -> ScoreBoard {
        entries
            .iter()
            .map(|(id, total, tf)| (VariantId::new(*id).unwrap(), breakdown(*total, *tf)))
            .collect()
    }

    #[test]
    fn good_scores_do_not_request_revision() {
        let variants = vec![variant("v1")];
        let verdict = evaluate(&variants, &board(&[("v1", 82.0, 65.0)]), 0, 1).unwrap();
        assert!(!verdict.needs_revision);
        assert!(!verdict.below_quality_bar());
    }

    #[test]
    fn low_scores_request_revision_while_budget_remains() {
        let variants = vec![variant("v1")];
        let verdict = evaluate(&variants, &board(&[("v1", 70.0, 40.0)]), 0, 1).unwrap();
        assert!(verdict.needs_revision);
        assert!(verdict.below_total && verdict.below_trend_fit);
    }

    #[test]
    fn exhausted_budget_suppresses_revision() {
        let variants = vec![variant("v1")];
        let verdict = evaluate(&variants, &board(&[("v1", 70.0, 40.0)]), 1, 1).unwrap();
        assert!(!verdict.needs_revision);
        assert!(!verdict.budget_available);
        assert!(verdict.below_quality_bar());
    }

    #[test]
    fn low_trend_fit_alone_requests_revision() {
        let variants = vec![variant("v1")];
        let verdict = evaluate(&variants, &board(&[("v1", 90.0, 59.9)]), 0, 1).unwrap();
        assert!(verdict.needs_revision);
        assert!(!verdict.below_total);
    }

    #[test]
    fn thresholds_are_inclusive_passes() {
        let variants = vec![variant("v1")];
        let verdict = evaluate(&variants, &board(&[("v1", 75.0, 60.0)]), 0, 1).unwrap();
        assert!(!verdict.needs_revision);
    }

    #[test]
    fn borderline_scores_pass_after_rounding() {
        let one = UnitScore::saturating(1.0);
        // unrounded: total 74.96, trend fit 59.96
        let scored = ScoreBreakdown::new(
            one,
            one,
            one,
            UnitScore::saturating(0.0483),
            PercentScore::saturating(59.96),
            MediaMetrics::default(),
            1.0,
        );
        let variants = vec![variant("v1")];
        let board: ScoreBoard = [(VariantId::new("v1").unwrap(), scored)].into_iter().collect();
        let verdict = evaluate(&variants, &board, 0, 1).unwrap();
        assert_eq!(verdict.best_total, 75.0);
        assert_eq!(verdict.best_trend_fit, 60.0);
        assert!(!verdict.needs_revision);
    }

    #[test]
    fn ties_go_to_the_first_variant_in_generation_order() {
        let variants = vec![variant("v3"), variant("v1"), variant("v2")];
        let b = board(&[("v1", 80.0, 70.0), ("v2", 80.0, 70.0), ("v3", 80.0, 70.0)]);
        let (best, _) = select_best(&variants, &b).unwrap();
        assert_eq!(best.id.as_str(), "v3");
    }

    #[test]
    fn highest_total_wins() {
        let variants = vec![variant("v1"), variant("v2")];
        let b = board(&[("v1", 60.0, 90.0), ("v2", 61.0, 10.0)]);
        let (best, score) = select_best(&variants, &b).unwrap();
        assert_eq!(best.id.as_str(), "v2");
        assert_eq!(score.total.as_f64(), 61.0);
    }

    #[test]
    fn no_scores_means_no_verdict() {
        let variants = vec![variant("v1")];
        assert!(evaluate(&variants, &ScoreBoard::default(), 0, 1).is_none());
        assert!(evaluate(&[], &board(&[("v1", 90.0, 90.0)]), 0, 1).is_none());
    }

    #[test]
    fn evaluate_is_side_effect_free() {
        let variants = vec![variant("v1")];
        let b = board(&[("v1", 70.0, 40.0)]);
        let first = evaluate(&variants, &b, 0, 1);
        let second = evaluate(&variants, &b, 0, 1);
        assert_eq!(first, second);
    }

    #[test]
    fn critique_names_the_failed_criteria() {
        let variants = vec![variant("v2")];
        let verdict = evaluate(&variants, &board(&[("v2", 70.0, 40.0)]), 0, 1).unwrap();
        let critique = verdict.critique();
        assert!(critique.contains("v2"));
        assert!(critique.contains("70.0"));
        assert!(critique.contains("trend fit 40.0"));
    }
}
