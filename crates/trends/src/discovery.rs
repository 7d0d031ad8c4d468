//! [`TrendSource`] that aggregates related queries and falls back to the
//! seeds.

use std::path::Path;

use async_trait::async_trait;
use pipeline::{CollaboratorError, Timestamp, TrendOrigin, TrendReport, TrendSource, TrendTerm};

use crate::client::{RelatedQuery, TrendFetcher};
use crate::normalize::normalize_seeds;

/// Seeds sent to the trend service.
pub const QUERIED_SEEDS: usize = 5;
/// Most fetched terms kept.
pub const MAX_TERMS: usize = 40;
/// Weight of a seed returned as a fallback term.
pub const SEED_WEIGHT: f64 = 1.0;

/// Discovers trend terms through a [`TrendFetcher`].
#[derive(Debug, Clone)]
pub struct TrendDiscovery<F> {
    fetcher: F,
}

impl<F: TrendFetcher> TrendDiscovery<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    /// Queries the first [`QUERIED_SEEDS`] seeds and aggregates the results.
    ///
    /// Any fetch error aborts the whole aggregation.
    async fn fetch(&self, seeds: &[String]) -> Result<Vec<TrendTerm>, CollaboratorError> {
        let mut batches = Vec::new();
        for seed in seeds.iter().take(QUERIED_SEEDS) {
            batches.push(self.fetcher.related_queries(seed).await?);
        }
        Ok(aggregate(seeds, batches.iter().map(Vec::as_slice)))
    }
}

/// Sums values per lowercased query, excluding the seeds themselves, and
/// returns the top [`MAX_TERMS`] by summed value. Ties keep first-seen order.
pub fn aggregate<'a>(
    seeds: &[String],
    batches: impl IntoIterator<Item = &'a [RelatedQuery]>,
) -> Vec<TrendTerm> {
    let mut bag: Vec<(String, u64)> = Vec::new();
    for q in batches.into_iter().flatten() {
        let term = q.query.trim().to_lowercase();
        if term.is_empty() || seeds.contains(&term) {
            continue;
        }
        match bag.iter_mut().find(|(t, _)| *t == term) {
            Some((_, total)) => *total += q.value,
            None => bag.push((term, q.value)),
        }
    }
    // Stable sort keeps first-seen order among equal totals.
    bag.sort_by(|a, b| b.1.cmp(&a.1));
    bag.into_iter()
        .take(MAX_TERMS)
        .map(|(term, total)| TrendTerm::new(term, total as f64))
        .collect()
}

fn seed_terms(seeds: &[String]) -> Vec<TrendTerm> {
    seeds
        .iter()
        .map(|s| TrendTerm::new(s.clone(), SEED_WEIGHT))
        .collect()
}

#[async_trait]
impl<F: TrendFetcher> TrendSource for TrendDiscovery<F> {
    async fn discover(&self, _job_dir: &Path, seeds: &[String]) -> Result<TrendReport, CollaboratorError> {
        let seeds = normalize_seeds(seeds);
        let (terms, origin) = if seeds.is_empty() {
            (Vec::new(), TrendOrigin::SeedFallback)
        } else {
            match self.fetch(&seeds).await {
                Ok(terms) if !terms.is_empty() => (terms, TrendOrigin::Fetched),
                Ok(_) => {
                    tracing::info!("trend service returned nothing; using seeds");
                    (seed_terms(&seeds), TrendOrigin::SeedFallback)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "trend fetch failed; using seeds");
                    (seed_terms(&seeds), TrendOrigin::SeedFallback)
                }
            }
        };

        Ok(TrendReport {
            terms,
            timestamp: Timestamp::now(),
            origin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Unconfigured;
    use std::sync::Mutex;

    struct Canned {
        answers: Vec<(&'static str, Vec<(&'static str, u64)>)>,
        asked: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TrendFetcher for Canned {
        async fn related_queries(&self, keyword: &str) -> Result<Vec<RelatedQuery>, CollaboratorError> {
            self.asked.lock().unwrap().push(keyword.to_string());
            Ok(self
                .answers
                .iter()
                .find(|(k, _)| *k == keyword)
                .map(|(_, qs)| {
                    qs.iter()
                        .map(|(q, v)| RelatedQuery {
                            query: q.to_string(),
                            value: *v,
                        })
                        .collect()
                })
                .unwrap_or_default())
        }
    }

    fn seeds(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn terms(report: &TrendReport) -> Vec<&str> {
        report.terms.iter().map(|t| t.term.as_str()).collect()
    }

    #[tokio::test]
    async fn failing_service_returns_the_seeds_exactly() {
        let source = TrendDiscovery::new(Unconfigured);
        let report = source
            .discover(Path::new("/tmp"), &seeds(&["racing", "arcade"]))
            .await
            .unwrap();
        assert_eq!(terms(&report), vec!["racing", "arcade"]);
        assert_eq!(report.origin, TrendOrigin::SeedFallback);
        assert!(report.terms.iter().all(|t| t.weight == SEED_WEIGHT));
    }

    #[tokio::test]
    async fn empty_results_fall_back_to_normalised_seeds() {
        let source = TrendDiscovery::new(Canned {
            answers: vec![],
            asked: Mutex::new(vec![]),
        });
        let report = source
            .discover(Path::new("/tmp"), &seeds(&[" Racing ", "racing", "Drift"]))
            .await
            .unwrap();
        assert_eq!(terms(&report), vec!["racing", "drift"]);
    }

    #[tokio::test]
    async fn no_seeds_means_no_terms() {
        let source = TrendDiscovery::new(Unconfigured);
        let report = source.discover(Path::new("/tmp"), &[]).await.unwrap();
        assert!(report.terms.is_empty());
    }

    #[tokio::test]
    async fn aggregates_values_and_excludes_seeds() {
        let source = TrendDiscovery::new(Canned {
            answers: vec![
                ("racing", vec![("Car Games", 40), ("arcade", 100), ("drift", 30)]),
                ("arcade", vec![("car games", 40), ("retro", 90)]),
            ],
            asked: Mutex::new(vec![]),
        });
        let report = source
            .discover(Path::new("/tmp"), &seeds(&["racing", "arcade"]))
            .await
            .unwrap();
        assert_eq!(report.origin, TrendOrigin::Fetched);
        assert_eq!(terms(&report), vec!["retro", "car games", "drift"]);
        assert_eq!(report.terms[1].weight, 80.0);
    }

    #[tokio::test]
    async fn only_the_first_five_seeds_are_queried() {
        let fetcher = Canned {
            answers: vec![],
            asked: Mutex::new(vec![]),
        };
        let input: Vec<String> = (0..8).map(|i| format!("s{i}")).collect();
        let source = TrendDiscovery::new(fetcher);
        source.discover(Path::new("/tmp"), &input).await.unwrap();
        assert_eq!(source.fetcher.asked.lock().unwrap().len(), QUERIED_SEEDS);
    }

    #[test]
    fn aggregate_caps_at_forty_and_keeps_first_seen_ties() {
        let batch: Vec<RelatedQuery> = (0..50)
            .map(|i| RelatedQuery {
                query: format!("term{i}"),
                value: 50,
            })
            .collect();
        let out = aggregate(&[], [batch.as_slice()]);
        assert_eq!(out.len(), MAX_TERMS);
        assert_eq!(out[0].term, "term0");
        assert_eq!(out[39].term, "term39");
    }
}
