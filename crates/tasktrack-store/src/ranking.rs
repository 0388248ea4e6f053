//! Exhaustive similarity ranking over the task corpus.
//!
//! Scores are `1 - distance / max_distance`, where `max_distance` is taken
//! over the corpus being ranked. A score is therefore only meaningful
//! relative to the other results of the same call.

use crate::error::{Result, StoreError};
use crate::record::{SearchResult, StoredTask};

/// Default minimum score (exclusive) a match must exceed.
pub const DEFAULT_THRESHOLD: f32 = 0.01;

/// Default maximum number of results.
pub const DEFAULT_LIMIT: usize = 10;

/// Filtering and truncation applied after scoring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankParams {
    pub threshold: f32,
    pub limit: usize,
}

impl Default for RankParams {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl RankParams {
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Euclidean distance, or `None` when the lengths differ.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }

    let sum: f32 = a
        .iter()
        .zip(b)
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum();

    Some(sum.sqrt())
}

/// Rank `corpus` against `query`.
///
/// Fails if any stored vector has a different length than the query. An
/// empty corpus, or one where every vector equals the query, yields no
/// results. Ties keep corpus order.
pub fn rank(
    query: &[f32],
    corpus: &[StoredTask],
    params: RankParams,
) -> Result<Vec<SearchResult>> {
    let mut distances = Vec::with_capacity(corpus.len());
    let mut max_distance = 0.0_f32;

    for stored in corpus {
        let vector = &stored.record.embedding;
        let distance =
            euclidean_distance(query, vector).ok_or_else(|| StoreError::DimensionMismatch {
                id: stored.record.id.clone(),
                expected: query.len(),
                actual: vector.len(),
            })?;

        max_distance = max_distance.max(distance);
        distances.push(distance);
    }

    if max_distance == 0.0 {
        return Ok(Vec::new());
    }

    let mut results: Vec<SearchResult> = corpus
        .iter()
        .zip(distances)
        .filter_map(|(stored, distance)| {
            let score = 1.0 - distance / max_distance;
            (score > params.threshold).then(|| SearchResult {
                task: stored.to_task(),
                score,
            })
        })
        .collect();

    // `sort_by` is stable, so equal scores stay in corpus order.
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(params.limit);

    Ok(results)
}
