//! Model-based reranking with strict output validation and score blending.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::error::{RerankError, RerankResult};
use super::payload::build_user_payload;
use super::provider::{ChatTurn, CompletionProvider, CompletionRequest};
use super::schema::{RANK_RESPONSE_SCHEMA, RankedEntry, parse_rank_response};
use crate::catalog::Product;
use crate::constants::{
    DEFAULT_RERANK_ALPHA, DEFAULT_RERANK_MAX_RETRIES, MAX_RERANK_CANDIDATES,
    RERANK_BASE_MAX_TOKENS,
};
use crate::kinds::{KindRegistry, KindSpec};
use crate::recommend::RecommendationItem;

const CORRECTION_PROMPT: &str = "Your previous response did not conform to the required JSON format. You MUST return JSON that matches the provided JSON Schema exactly. No prose, no code fences, no comments.";

/// Result of a fail-open rerank.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankOutcome {
    pub items: Vec<RecommendationItem>,
    /// `false` when the input was returned unchanged.
    pub applied: bool,
}

/// Blends a model score with a retrieval score.
pub fn blend(alpha: f32, model: f32, retrieval: f32) -> f32 {
    alpha * model + (1.0 - alpha) * retrieval
}

pub struct RerankValidator<P: CompletionProvider> {
    provider: Arc<P>,
    kinds: Arc<KindRegistry>,
    alpha: f32,
    max_retries: usize,
}

impl<P: CompletionProvider> std::fmt::Debug for RerankValidator<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RerankValidator")
            .field("model", &self.provider.model_id())
            .field("alpha", &self.alpha)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl<P: CompletionProvider> RerankValidator<P> {
    pub fn new(provider: Arc<P>, kinds: Arc<KindRegistry>) -> Self {
        Self {
            provider,
            kinds,
            alpha: DEFAULT_RERANK_ALPHA,
            max_retries: DEFAULT_RERANK_MAX_RETRIES,
        }
    }

    /// Weight of the model score; clamped to `[0, 1]`.
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha.clamp(0.0, 1.0);
        self
    }

    /// Additional attempts after a schema violation.
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn model_id(&self) -> &str {
        self.provider.model_id()
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Reranks, returning the input unchanged (`applied = false`) on any failure.
    pub async fn rerank(
        &self,
        kind: &str,
        source: &Product,
        candidates: &[RecommendationItem],
        docs: &[Product],
        include_rationale: bool,
    ) -> RerankOutcome {
        if candidates.is_empty() {
            return RerankOutcome {
                items: Vec::new(),
                applied: false,
            };
        }

        match self
            .try_rerank(kind, source, candidates, docs, include_rationale)
            .await
        {
            Ok(items) => RerankOutcome {
                items,
                applied: true,
            },
            Err(e) => {
                warn!(kind, product_id = %source.product_id, error = %e, "rerank failed, keeping retrieval order");
                RerankOutcome {
                    items: candidates.to_vec(),
                    applied: false,
                }
            }
        }
    }

    /// Reranks and surfaces failures.
    ///
    /// Candidates without a document, or beyond the payload cap, are not shown to the model and
    /// keep their retrieval score.
    #[instrument(skip_all, fields(kind = %kind, product_id = %source.product_id, candidates = candidates.len()))]
    pub async fn try_rerank(
        &self,
        kind: &str,
        source: &Product,
        candidates: &[RecommendationItem],
        docs: &[Product],
        include_rationale: bool,
    ) -> RerankResult<Vec<RecommendationItem>> {
        let fallback_spec;
        let spec = match self.kinds.get(kind) {
            Some(spec) => spec,
            None => {
                fallback_spec = KindSpec::new(kind);
                &fallback_spec
            }
        };

        let by_id: HashMap<&str, &Product> =
            docs.iter().map(|p| (p.product_id.as_str(), p)).collect();
        let shown: Vec<&Product> = candidates
            .iter()
            .filter_map(|c| by_id.get(c.product_id.as_str()).copied())
            .take(MAX_RERANK_CANDIDATES)
            .collect();
        if shown.is_empty() {
            debug!("no candidate documents to rank");
            return Ok(candidates.to_vec());
        }

        let payload = build_user_payload(source, &shown, &spec.task_prompt(include_rationale));
        debug!(bytes = payload.len(), shown = shown.len(), "rerank payload built");

        let max_tokens = if include_rationale {
            RERANK_BASE_MAX_TOKENS * 2
        } else {
            RERANK_BASE_MAX_TOKENS
        };
        let ranked = self
            .complete_validated(
                vec![
                    ChatTurn::system(spec.system_prompt.clone()),
                    ChatTurn::user(payload),
                ],
                max_tokens,
                &source.product_id,
            )
            .await?;

        let items = self.blend_and_filter(spec.min_score, candidates, ranked, include_rationale);
        info!(kept = items.len(), "rerank applied");
        Ok(items)
    }

    async fn complete_validated(
        &self,
        mut messages: Vec<ChatTurn>,
        max_tokens: u32,
        query_id: &str,
    ) -> RerankResult<Vec<RankedEntry>> {
        let attempts = self.max_retries + 1;
        let mut last_violation = String::new();

        for attempt in 1..=attempts {
            let request = CompletionRequest {
                messages: messages.clone(),
                max_tokens,
                temperature: 0.0,
                json_mode: true,
            };
            let raw = self.provider.complete(&request).await?;

            match parse_rank_response(&raw, query_id) {
                Ok(entries) => {
                    debug!(attempt, entries = entries.len(), "ranking accepted");
                    return Ok(entries);
                }
                Err(violation) => {
                    warn!(attempt, %violation, "ranking rejected");
                    messages.push(ChatTurn::system(CORRECTION_PROMPT));
                    messages.push(ChatTurn::user(format!(
                        "Validation error was:\n{violation}\n\nHere is the JSON Schema you MUST follow exactly:\n{RANK_RESPONSE_SCHEMA}\n\nReturn ONLY the JSON object."
                    )));
                    last_violation = violation;
                }
            }
        }

        Err(RerankError::SchemaViolation {
            attempts,
            reason: last_violation,
        })
    }

    fn blend_and_filter(
        &self,
        min_score: f32,
        candidates: &[RecommendationItem],
        ranked: Vec<RankedEntry>,
        include_rationale: bool,
    ) -> Vec<RecommendationItem> {
        let mut seen = HashSet::new();
        let by_id: HashMap<String, RankedEntry> = ranked
            .into_iter()
            .filter(|entry| seen.insert(entry.id.clone()))
            .map(|entry| (entry.id.clone(), entry))
            .collect();

        let mut blended: Vec<RecommendationItem> = candidates
            .iter()
            .map(|candidate| match by_id.get(&candidate.product_id) {
                Some(entry) => {
                    let score = blend(self.alpha, entry.score as f32, candidate.score);
                    let item = RecommendationItem::new(candidate.product_id.clone(), score);
                    match (&entry.rationale, include_rationale) {
                        (Some(rationale), true) => item.with_rationale(rationale.clone()),
                        _ => item,
                    }
                }
                None => RecommendationItem::new(candidate.product_id.clone(), candidate.score),
            })
            .collect();

        blended.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        blended.retain(|item| item.score >= min_score);
        blended
    }
}
