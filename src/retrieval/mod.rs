//! Candidate generation: vector search first, keyword search as the fallback.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::catalog::{
    CatalogStore, FilterSet, FuzzyOptions, ScoredProduct, TEXT_SEARCH_FIELDS, TextQuery,
    VectorQuery,
};
use crate::constants::{MIN_NUM_CANDIDATES, NUM_CANDIDATES_FACTOR};
use crate::kinds::KindRegistry;

/// Which path produced the candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalPath {
    Vector,
    Text,
    /// Neither path ran or both came back empty.
    Empty,
}

#[derive(Debug, Clone, Copy)]
pub struct RetrievalRequest<'a> {
    pub kind: &'a str,
    pub vector: Option<&'a [f32]>,
    /// Keyword query used when the vector path yields nothing; empty disables the fallback.
    pub fallback_text: &'a str,
    pub filters: Option<&'a FilterSet>,
    pub k: usize,
}

/// Ordered candidates, best first, scores in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieved {
    pub candidates: Vec<ScoredProduct>,
    pub path: RetrievalPath,
}

impl Retrieved {
    fn empty() -> Self {
        Self {
            candidates: Vec::new(),
            path: RetrievalPath::Empty,
        }
    }
}

/// `max(200, 10k)`
pub fn num_candidates(k: usize) -> usize {
    MIN_NUM_CANDIDATES.max(k.saturating_mul(NUM_CANDIDATES_FACTOR))
}

pub struct RetrievalAdapter<S: CatalogStore> {
    catalog: Arc<S>,
    kinds: Arc<KindRegistry>,
}

impl<S: CatalogStore> std::fmt::Debug for RetrievalAdapter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalAdapter")
            .field("kinds", &self.kinds.names())
            .finish_non_exhaustive()
    }
}

impl<S: CatalogStore> RetrievalAdapter<S> {
    pub fn new(catalog: Arc<S>, kinds: Arc<KindRegistry>) -> Self {
        Self { catalog, kinds }
    }

    /// Runs the vector path, then the text path if the vector path produced nothing.
    ///
    /// Store errors count as zero results. The two paths are never merged.
    #[instrument(skip(self, request), fields(kind = request.kind, k = request.k, has_vector = request.vector.is_some()))]
    pub async fn retrieve(&self, request: RetrievalRequest<'_>) -> Retrieved {
        if request.k == 0 {
            return Retrieved::empty();
        }
        let filters = request.filters.and_then(FilterSet::sanitized);

        if let Some(vector) = request.vector.filter(|v| !v.is_empty()) {
            let hits = self.vector_path(request.kind, vector, filters, request.k).await;
            if !hits.is_empty() {
                debug!(hits = hits.len(), "vector retrieval");
                return Retrieved {
                    candidates: hits,
                    path: RetrievalPath::Vector,
                };
            }
        }

        let text = request.fallback_text.trim();
        if text.is_empty() {
            return Retrieved::empty();
        }

        let hits = self.text_path(text, filters, request.k).await;
        debug!(hits = hits.len(), "text retrieval");
        if hits.is_empty() {
            Retrieved::empty()
        } else {
            Retrieved {
                candidates: hits,
                path: RetrievalPath::Text,
            }
        }
    }

    async fn vector_path(
        &self,
        kind: &str,
        vector: &[f32],
        filter: Option<&FilterSet>,
        k: usize,
    ) -> Vec<ScoredProduct> {
        let vector_field = self
            .kinds
            .get(kind)
            .map_or(kind, |spec| spec.vector_field.as_str());

        let query = VectorQuery {
            vector_field,
            vector,
            limit: k,
            num_candidates: num_candidates(k),
            filter,
        };
        match self.catalog.vector_search(query).await {
            Ok(mut hits) => {
                for hit in &mut hits {
                    hit.score = hit.score.clamp(0.0, 1.0);
                }
                hits.sort_by(|a, b| b.score.total_cmp(&a.score));
                hits.truncate(k);
                hits
            }
            Err(e) => {
                warn!(error = %e, "vector search failed");
                Vec::new()
            }
        }
    }

    async fn text_path(&self, text: &str, filter: Option<&FilterSet>, k: usize) -> Vec<ScoredProduct> {
        let query = TextQuery {
            query: text,
            fields: TEXT_SEARCH_FIELDS,
            fuzzy: Some(FuzzyOptions::default()),
            filter,
            limit: k,
        };
        match self.catalog.text_search(query).await {
            Ok(mut hits) => {
                hits.truncate(k);
                normalize_relevance(&mut hits);
                hits
            }
            Err(e) => {
                warn!(error = %e, "text search failed");
                Vec::new()
            }
        }
    }
}

/// Scales raw relevance so the best hit scores `1.0`.
pub fn normalize_relevance(hits: &mut [ScoredProduct]) {
    let max = hits
        .iter()
        .map(|h| h.score)
        .filter(|s| s.is_finite())
        .fold(0.0f32, f32::max);
    for hit in hits.iter_mut() {
        hit.score = if max > 0.0 && hit.score.is_finite() {
            (hit.score / max).clamp(0.0, 1.0)
        } else {
            0.0
        };
    }
}
