//! Compact, pruned JSON context for ranking requests.

use serde_json::{Map, Value, json};

use crate::catalog::Product;
use crate::kinds::truncate_chars;

const SOURCE_DESC_CHARS: usize = 220;
const CANDIDATE_DESC_CHARS: usize = 200;
const MAX_TAGS: usize = 8;

fn first_tags(product: &Product) -> Vec<&str> {
    product
        .tags
        .iter()
        .take(MAX_TAGS)
        .map(String::as_str)
        .collect()
}

pub fn compact_source(product: &Product) -> Value {
    json!({
        "product_id": product.product_id,
        "name": product.name,
        "brand": product.brand,
        "desc": product.description.as_deref().map(|d| truncate_chars(d.trim(), SOURCE_DESC_CHARS)),
        "category_id": product.category_id,
        "category_path": product.category_path,
        "tags": first_tags(product),
    })
}

pub fn compact_candidate(product: &Product) -> Value {
    json!({
        "product_id": product.product_id,
        "name": product.name,
        "brand": product.brand,
        "category_id": product.category_id,
        "price": product.current_price,
        "tags": first_tags(product),
        "desc": product.description.as_deref().map(|d| truncate_chars(d.trim(), CANDIDATE_DESC_CHARS)),
    })
}

/// Drops nulls, blank strings and empty containers recursively; trims strings.
///
/// Returns `None` when nothing is left. `0` and `false` are kept.
pub fn prune_empty(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| Value::String(trimmed.to_string()))
        }
        Value::Array(items) => {
            let kept: Vec<Value> = items.into_iter().filter_map(prune_empty).collect();
            (!kept.is_empty()).then_some(Value::Array(kept))
        }
        Value::Object(map) => {
            let kept: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| prune_empty(v).map(|v| (k, v)))
                .collect();
            (!kept.is_empty()).then_some(Value::Object(kept))
        }
        other => Some(other),
    }
}

/// Minified user message: the query product, candidate summaries and the task rubric.
pub fn build_user_payload(source: &Product, candidates: &[&Product], task: &str) -> String {
    let payload = json!({
        "query_product": compact_source(source),
        "candidates": candidates.iter().map(|p| compact_candidate(p)).collect::<Vec<_>>(),
        "task": task,
    });
    prune_empty(payload)
        .map(|v| v.to_string())
        .unwrap_or_else(|| "{}".to_string())
}
