//! Keyword tokenization and fuzzy token matching for text search.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::filter::field_values;

/// Fuzzy matching parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzyOptions {
    /// Maximum edit distance between a query token and a document token.
    pub max_edits: usize,
    /// Leading characters that must match exactly before edits are allowed.
    pub prefix_length: usize,
}

impl Default for FuzzyOptions {
    fn default() -> Self {
        Self {
            max_edits: 1,
            prefix_length: 3,
        }
    }
}

/// Lowercased alphanumeric tokens of at least two characters.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_lowercase)
        .collect()
}

/// Returns `true` if `query` matches `token` exactly or within the fuzzy budget.
pub fn tokens_match(query: &str, token: &str, fuzzy: Option<FuzzyOptions>) -> bool {
    if query == token {
        return true;
    }
    let Some(fuzzy) = fuzzy else {
        return false;
    };
    if fuzzy.max_edits == 0 {
        return false;
    }

    let q: Vec<char> = query.chars().collect();
    let t: Vec<char> = token.chars().collect();
    if q.len() < fuzzy.prefix_length || t.len() < fuzzy.prefix_length {
        return false;
    }
    if q[..fuzzy.prefix_length] != t[..fuzzy.prefix_length] {
        return false;
    }
    if q.len().abs_diff(t.len()) > fuzzy.max_edits {
        return false;
    }

    edit_distance(&q, &t) <= fuzzy.max_edits
}

fn edit_distance(a: &[char], b: &[char]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Relevance of a document for a query: matched query tokens, counting name hits double.
///
/// Returns `0.0` when nothing matches.
pub fn text_relevance(
    query: &str,
    doc: &Value,
    fields: &[&str],
    fuzzy: Option<FuzzyOptions>,
) -> f32 {
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() {
        return 0.0;
    }

    let mut score = 0.0f32;
    for field in fields {
        let weight = if *field == "name" { 2.0 } else { 1.0 };
        let field_tokens: Vec<String> = field_values(doc, field)
            .iter()
            .filter_map(|v| v.as_str())
            .flat_map(tokenize)
            .collect();
        if field_tokens.is_empty() {
            continue;
        }

        let hits = query_tokens
            .iter()
            .filter(|q| field_tokens.iter().any(|t| tokens_match(q, t, fuzzy)))
            .count();
        score += weight * hits as f32;
    }

    score
}
