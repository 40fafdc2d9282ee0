use serde_json::json;

use super::*;
use crate::catalog::{Clause, Product};

fn tee() -> Product {
    Product::new("t1", "Cotton Tee")
        .with_brand("Acme")
        .with_category("tops")
        .with_category_path("apparel/tops")
        .with_description("Soft tee")
        .with_tags(["cotton", "basic"])
        .with_stock(3)
}

#[test]
fn test_truncate_chars_is_char_safe() {
    assert_eq!(truncate_chars("héllo", 2), "hé");
    assert_eq!(truncate_chars("abc", 10), "abc");
    assert_eq!(truncate_chars("", 3), "");
}

#[test]
fn test_similar_text_layout() {
    let product = tee();
    assert_eq!(
        similar_text(&product.view()),
        "Cotton Tee | Acme | Soft tee | cotton basic"
    );
}

#[test]
fn test_similar_text_truncates_description() {
    let product = Product::new("x", "X").with_description("d".repeat(500));
    let text = similar_text(&product.view());
    assert_eq!(text, format!("X | {}", "d".repeat(220)));
}

#[test]
fn test_complementary_text_has_labels_and_instruction() {
    let text = complementary_text(&tee().view());
    assert!(text.starts_with("Product name: Cotton Tee | Brand: Acme | Category: tops"));
    assert!(text.contains("Category Path: apparel/tops"));
    assert!(text.contains("Tags: cotton basic"));
    assert!(text.contains("purchased together with this item"));
    assert!(text.ends_with("Soft tee"));
}

#[test]
fn test_generic_text_appends_category() {
    let text = generic_text(&tee().view());
    assert_eq!(
        text,
        "Cotton Tee | Acme | Soft tee | cotton basic | Category: tops | Category Path: apparel/tops"
    );
}

#[test]
fn test_fallback_queries() {
    let product = Product::new("x", "Lens");
    assert_eq!(similar_fallback(&product.view()), "products similar to Lens");
    assert_eq!(
        complementary_fallback(&product.view()),
        "products commonly used, worn, or bought together with Lens"
    );
}

#[test]
fn test_gender_normalization() {
    assert_eq!(normalize_gender(" Men "), Some(Gender::Male));
    assert_eq!(normalize_gender("w"), None);
    assert_eq!(normalize_gender("women"), Some(Gender::Female));
    assert_eq!(normalize_gender("any"), Some(Gender::Unisex));
}

#[test]
fn test_source_gender_resolution() {
    assert_eq!(source_gender(&tee().with_gender("m")), Some(Gender::Male));
    assert_eq!(source_gender(&tee().with_gender("unisex")), None);
    assert_eq!(source_gender(&tee().with_gender(json!(["male", "female"]))), None);
    assert_eq!(source_gender(&tee().with_gender(json!(["female"]))), Some(Gender::Female));
    assert_eq!(source_gender(&tee()), None);
}

#[test]
fn test_similar_filters() {
    let product = tee().with_gender("male");
    let filters = KindRegistry::with_defaults()
        .get(KIND_SIMILAR)
        .unwrap()
        .default_filters(&product);

    let clauses = filters.clauses();
    assert_eq!(clauses[0], Clause::gt("stock", 0.0));
    assert!(clauses.contains(&Clause::equals("category_id", "tops")));
    assert!(clauses.contains(&Clause::equals("name", "Cotton Tee").negate()));
    assert!(clauses.contains(&Clause::equals("parent_product_id", "t1").negate()));
    assert!(clauses.contains(&Clause::equals("metadata.gender", "female").negate()));
}

#[test]
fn test_similar_filters_anchor_on_parent() {
    let product = tee().with_parent("root");
    let filters = KindRegistry::with_defaults()
        .get(KIND_SIMILAR)
        .unwrap()
        .default_filters(&product);
    assert!(
        filters
            .clauses()
            .contains(&Clause::equals("parent_product_id", "root").negate())
    );
}

#[test]
fn test_complementary_filters() {
    let product = tee().with_gender("female");
    let filters = KindRegistry::with_defaults()
        .get(KIND_COMPLEMENTARY)
        .unwrap()
        .default_filters(&product);

    let clauses = filters.clauses();
    assert!(clauses.contains(&Clause::equals("category_id", "tops").negate()));
    assert!(clauses.contains(&Clause::text("tags", "cotton basic")));
    assert!(clauses.contains(&Clause::equals("metadata.gender", "male").negate()));
}

#[test]
fn test_xsell_filters_are_stock_only() {
    let filters = KindRegistry::with_defaults()
        .get(KIND_XSELL)
        .unwrap()
        .default_filters(&tee().with_gender("male"));
    assert_eq!(filters.clauses(), &[Clause::gt("stock", 0.0)]);
}

#[test]
fn test_default_registry_contents() {
    let registry = KindRegistry::with_defaults();
    assert_eq!(
        registry.names(),
        vec!["comp", "comp_rich", "sim", "sim_rich", "upsell", "xsell"]
    );
    assert_eq!(registry.min_score("sim"), 0.5);
    assert_eq!(registry.min_score("comp_rich"), 0.5);
    assert_eq!(registry.min_score("xsell"), 0.0);
    assert_eq!(registry.min_score("nope"), 0.0);
    assert_eq!(registry.get("sim").unwrap().vector_field, "sim");
}

#[test]
fn test_text_for_unknown_kind_uses_generic_builder() {
    let registry = KindRegistry::with_defaults();
    let product = tee();
    assert_eq!(registry.text_for("brand", &product), generic_text(&product.view()));
    assert_eq!(registry.text_for("sim", &product), similar_text(&product.view()));
}

#[test]
fn test_register_adds_kind_without_touching_others() {
    let mut registry = KindRegistry::with_defaults();
    registry.register(
        KindSpec::new("bundle")
            .with_vector_field("bundle_vec")
            .with_min_score(0.3),
    );
    assert!(registry.contains("bundle"));
    assert_eq!(registry.min_score("bundle"), 0.3);
    assert_eq!(registry.get("bundle").unwrap().vector_field, "bundle_vec");
    assert_eq!(registry.min_score("sim"), 0.5);
}

#[test]
fn test_task_prompt_mentions_rationale_only_when_requested() {
    let registry = KindRegistry::with_defaults();
    let spec = registry.get(KIND_COMPLEMENTARY).unwrap();
    let plain = spec.task_prompt(false);
    let explained = spec.task_prompt(true);
    assert!(!plain.contains("rationale"));
    assert!(explained.contains(r#""rationale":"brief reason""#));
    assert!(plain.contains(r#"{"query_id":"<from QUERY.product_id>","results":[{"id":"#));
    assert!(spec.system_prompt.contains("COMPLEMENTARITY"));
}
