//! Strict parsing of ranking completions.

use serde::{Deserialize, Serialize};

/// Longest accepted rationale, in characters.
pub const MAX_RATIONALE_CHARS: usize = 300;

/// JSON Schema of the expected completion, sent back to the model on violations.
pub const RANK_RESPONSE_SCHEMA: &str = r#"{"type":"object","additionalProperties":false,"required":["query_id","results"],"properties":{"query_id":{"type":"string","minLength":1},"results":{"type":"array","items":{"type":"object","additionalProperties":false,"required":["id","score"],"properties":{"id":{"type":"string","minLength":1},"score":{"type":"number","minimum":0,"maximum":1},"rationale":{"type":"string","maxLength":300}}}}}}"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RankResponse {
    pub query_id: String,
    pub results: Vec<RankedEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RankedEntry {
    pub id: String,
    pub score: f64,
    #[serde(default)]
    pub rationale: Option<String>,
}

/// Removes a surrounding Markdown code fence (with or without a `json` tag).
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parses and validates a completion for the query product `query_id`.
///
/// The error string describes the first violation and is fed back to the model on retry.
pub fn parse_rank_response(raw: &str, query_id: &str) -> Result<Vec<RankedEntry>, String> {
    let body = strip_code_fences(raw);
    let response: RankResponse =
        serde_json::from_str(body).map_err(|e| format!("invalid JSON: {e}"))?;

    if response.query_id != query_id {
        return Err(format!(
            "query_id must be \"{query_id}\", got \"{}\"",
            response.query_id
        ));
    }

    for (idx, entry) in response.results.iter().enumerate() {
        if entry.id.trim().is_empty() {
            return Err(format!("results[{idx}].id must be a non-empty string"));
        }
        if !entry.score.is_finite() || !(0.0..=1.0).contains(&entry.score) {
            return Err(format!(
                "results[{idx}].score must be within [0, 1], got {}",
                entry.score
            ));
        }
        if let Some(rationale) = &entry.rationale {
            let len = rationale.chars().count();
            if len > MAX_RATIONALE_CHARS {
                return Err(format!(
                    "results[{idx}].rationale must be at most {MAX_RATIONALE_CHARS} characters, got {len}"
                ));
            }
        }
    }

    Ok(response.results)
}
