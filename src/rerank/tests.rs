use std::sync::Arc;

use serde_json::json;

use super::payload::{build_user_payload, prune_empty};
use super::*;
use crate::catalog::Product;
use crate::kinds::KindRegistry;
use crate::recommend::RecommendationItem;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-5
}

fn source() -> Product {
    Product::new("P1", "Trail Runner")
        .with_brand("Acme")
        .with_category("shoes")
        .with_description("Light trail shoe")
}

fn docs() -> Vec<Product> {
    vec![
        Product::new("c1", "Road Runner").with_price(90.0),
        Product::new("c2", "Trail Racer").with_price(120.0),
        Product::new("c3", "Hiking Boot").with_price(150.0),
    ]
}

fn candidates() -> Vec<RecommendationItem> {
    vec![
        RecommendationItem::new("c1", 0.9),
        RecommendationItem::new("c2", 0.7),
        RecommendationItem::new("c3", 0.5),
    ]
}

fn validator(completer: MockCompleter) -> (RerankValidator<MockCompleter>, Arc<MockCompleter>) {
    let completer = Arc::new(completer);
    let validator = RerankValidator::new(
        Arc::clone(&completer),
        Arc::new(KindRegistry::with_defaults()),
    );
    (validator, completer)
}

#[test]
fn test_blend_weights_model_score() {
    assert!(approx(blend(0.75, 0.8, 0.4), 0.70));
    assert!(approx(blend(0.0, 0.8, 0.4), 0.4));
    assert!(approx(blend(1.0, 0.8, 0.4), 0.8));
}

#[test]
fn test_strip_code_fences() {
    assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    assert_eq!(strip_code_fences("```\n[]\n```"), "[]");
    assert_eq!(strip_code_fences("  {}  "), "{}");
}

#[test]
fn test_parse_rank_response_accepts_valid_output() {
    let raw = r#"```json
{"query_id":"P1","results":[{"id":"c1","score":0.6},{"id":"c2","score":0.9,"rationale":"same use"}]}
```"#;
    let entries = parse_rank_response(raw, "P1").unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].rationale.as_deref(), Some("same use"));
}

#[test]
fn test_parse_rank_response_rejects_violations() {
    assert!(parse_rank_response("not json", "P1").is_err());
    assert!(parse_rank_response(&ranking_json("P2", &[("c1", 0.5)]), "P1").is_err());
    assert!(parse_rank_response(&ranking_json("P1", &[("c1", 1.5)]), "P1").is_err());
    assert!(parse_rank_response(&ranking_json("P1", &[("", 0.5)]), "P1").is_err());
    assert!(parse_rank_response(r#"{"query_id":"P1","results":[],"extra":1}"#, "P1").is_err());

    let long = json!({
        "query_id": "P1",
        "results": [{"id": "c1", "score": 0.5, "rationale": "x".repeat(301)}]
    })
    .to_string();
    let err = parse_rank_response(&long, "P1").unwrap_err();
    assert!(err.contains("rationale"));
}

#[test]
fn test_prune_empty_keeps_zero_and_false() {
    let pruned = prune_empty(json!({
        "a": null,
        "b": "  ",
        "c": [],
        "d": {"e": ""},
        "f": 0,
        "g": false,
        "h": [" x ", ""]
    }))
    .unwrap();
    assert_eq!(pruned, json!({"f": 0, "g": false, "h": ["x"]}));
    assert!(prune_empty(json!({"a": null})).is_none());
}

#[test]
fn test_user_payload_is_compact_and_truncated() {
    let src = Product::new("P1", "Tee")
        .with_description("d".repeat(400))
        .with_tags((0..12).map(|i| format!("t{i}")));
    let cand = Product::new("c1", "Shorts").with_description("e".repeat(400));
    let payload = build_user_payload(&src, &[&cand], "TASK");
    let value: serde_json::Value = serde_json::from_str(&payload).unwrap();

    assert!(!payload.contains(": "));
    assert_eq!(value["query_product"]["desc"].as_str().unwrap().len(), 220);
    assert_eq!(value["query_product"]["tags"].as_array().unwrap().len(), 8);
    assert_eq!(value["candidates"][0]["desc"].as_str().unwrap().len(), 200);
    assert!(value["candidates"][0].get("brand").is_none());
    assert_eq!(value["task"], "TASK");
}

#[tokio::test]
async fn test_p1_scenario_orders_and_thresholds() {
    let (validator, completer) = validator(MockCompleter::always(ranking_json(
        "P1",
        &[("c1", 0.6), ("c2", 0.9), ("c3", 0.2)],
    )));

    let items = validator
        .try_rerank("sim", &source(), &candidates(), &docs(), false)
        .await
        .unwrap();

    let ids: Vec<&str> = items.iter().map(|i| i.product_id.as_str()).collect();
    assert_eq!(ids, vec!["c2", "c1"]);
    assert!(approx(items[0].score, 0.85));
    assert!(approx(items[1].score, 0.675));
    assert_eq!(completer.call_count(), 1);
}

#[tokio::test]
async fn test_unknown_kind_keeps_low_scores() {
    let (validator, _) = validator(MockCompleter::always(ranking_json(
        "P1",
        &[("c1", 0.6), ("c2", 0.9), ("c3", 0.2)],
    )));

    let items = validator
        .try_rerank("bundle", &source(), &candidates(), &docs(), false)
        .await
        .unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[2].product_id, "c3");
    assert!(approx(items[2].score, 0.275));
}

#[tokio::test]
async fn test_request_shape() {
    let (validator, completer) =
        validator(MockCompleter::always(ranking_json("P1", &[("c1", 0.6)])));

    validator
        .try_rerank("comp", &source(), &candidates(), &docs(), true)
        .await
        .unwrap();

    let request = &completer.requests()[0];
    assert_eq!(request.temperature, 0.0);
    assert_eq!(request.max_tokens, 512);
    assert!(request.json_mode);
    assert_eq!(request.messages.len(), 2);
    assert_eq!(request.messages[0].role, ChatRole::System);
    assert!(request.messages[0].content.contains("COMPLEMENTARITY"));
    assert!(request.messages[1].content.contains(r#""query_product""#));
}

#[tokio::test]
async fn test_omitted_candidates_keep_retrieval_score() {
    let (validator, _) = validator(MockCompleter::always(ranking_json("P1", &[("c2", 0.8)])));

    let items = validator
        .try_rerank("xsell", &source(), &candidates(), &docs(), false)
        .await
        .unwrap();

    let c1 = items.iter().find(|i| i.product_id == "c1").unwrap();
    let c2 = items.iter().find(|i| i.product_id == "c2").unwrap();
    assert!(approx(c1.score, 0.9));
    assert!(approx(c2.score, 0.775));
}

#[tokio::test]
async fn test_duplicate_ids_first_wins() {
    let (validator, _) = validator(MockCompleter::always(ranking_json(
        "P1",
        &[("c1", 0.8), ("c1", 0.1)],
    )));

    let items = validator
        .try_rerank("xsell", &source(), &candidates()[..1], &docs(), false)
        .await
        .unwrap();
    assert!(approx(items[0].score, blend(0.75, 0.8, 0.9)));
}

#[tokio::test]
async fn test_third_attempt_success_is_used() {
    let completer = MockCompleter::new();
    completer.push_text("sorry, here you go");
    completer.push_text(ranking_json("P1", &[("c1", 2.0)]));
    completer.push_text(ranking_json("P1", &[("c3", 1.0), ("c1", 0.4)]));
    let (validator, completer) = validator(completer);

    let items = validator
        .try_rerank("xsell", &source(), &candidates(), &docs(), false)
        .await
        .unwrap();

    assert_eq!(completer.call_count(), 3);
    assert_eq!(items[0].product_id, "c3");

    let requests = completer.requests();
    assert_eq!(requests[1].messages.len(), 4);
    assert_eq!(requests[2].messages.len(), 6);
    assert!(requests[1].messages[2].content.contains("did not conform"));
    assert!(requests[1].messages[3].content.contains(RANK_RESPONSE_SCHEMA));
}

#[tokio::test]
async fn test_never_valid_fails_open() {
    let (validator, completer) = validator(MockCompleter::always("nope"));

    let err = validator
        .try_rerank("sim", &source(), &candidates(), &docs(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, RerankError::SchemaViolation { attempts: 3, .. }));
    assert_eq!(completer.call_count(), 3);

    let outcome = validator
        .rerank("sim", &source(), &candidates(), &docs(), false)
        .await;
    assert!(!outcome.applied);
    assert_eq!(outcome.items, candidates());
}

#[tokio::test]
async fn test_provider_error_is_not_retried() {
    let (validator, completer) = validator(MockCompleter::failing());

    let outcome = validator
        .rerank("sim", &source(), &candidates(), &docs(), false)
        .await;
    assert!(!outcome.applied);
    assert_eq!(outcome.items, candidates());
    assert_eq!(completer.call_count(), 1);
}

#[tokio::test]
async fn test_rationale_only_when_requested() {
    let reply = json!({
        "query_id": "P1",
        "results": [{"id": "c1", "score": 0.9, "rationale": "pairs well"}]
    })
    .to_string();

    let (validator, _) = validator(MockCompleter::always(reply));
    let plain = validator
        .try_rerank("xsell", &source(), &candidates(), &docs(), false)
        .await
        .unwrap();
    assert!(plain.iter().all(|i| i.rationale.is_none()));

    let explained = validator
        .try_rerank("xsell", &source(), &candidates(), &docs(), true)
        .await
        .unwrap();
    assert_eq!(explained[0].rationale.as_deref(), Some("pairs well"));
}

#[tokio::test]
async fn test_empty_candidates_skip_provider() {
    let (validator, completer) = validator(MockCompleter::always("{}"));
    let outcome = validator.rerank("sim", &source(), &[], &docs(), false).await;
    assert!(outcome.items.is_empty());
    assert_eq!(completer.call_count(), 0);
}
