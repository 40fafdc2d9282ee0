//! Default retrieval filters derived from the source product.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::catalog::{Clause, FilterSet, Product};

/// Normalized audience of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Gender {
    Male,
    Female,
    Unisex,
}

/// Maps common spellings to a [`Gender`]. Unknown values yield `None`.
pub fn normalize_gender(raw: &str) -> Option<Gender> {
    match raw.trim().to_lowercase().as_str() {
        "m" | "male" | "man" | "men" => Some(Gender::Male),
        "f" | "female" | "woman" | "women" => Some(Gender::Female),
        "u" | "unisex" | "all" | "any" => Some(Gender::Unisex),
        _ => None,
    }
}

/// The single gender to filter against, if the source is unambiguous.
///
/// Unisex sources, sources tagged both male and female, and sources without a recognizable
/// gender produce no restriction.
pub fn source_gender(product: &Product) -> Option<Gender> {
    let genders: BTreeSet<Gender> = match product.gender_value()? {
        Value::String(s) => normalize_gender(s).into_iter().collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .filter_map(normalize_gender)
            .collect(),
        _ => BTreeSet::new(),
    };

    if genders.contains(&Gender::Unisex) {
        return None;
    }
    match (
        genders.contains(&Gender::Male),
        genders.contains(&Gender::Female),
    ) {
        (true, false) => Some(Gender::Male),
        (false, true) => Some(Gender::Female),
        _ => None,
    }
}

fn in_stock() -> Clause {
    Clause::gt("stock", 0.0)
}

fn gender_clause(product: &Product) -> Option<Clause> {
    let opposite = match source_gender(product)? {
        Gender::Male => "female",
        Gender::Female => "male",
        Gender::Unisex => return None,
    };
    Some(Clause::equals("metadata.gender", opposite).negate())
}

fn not_same_name(product: &Product) -> Option<Clause> {
    (!product.name.is_empty()).then(|| Clause::equals("name", product.name.clone()).negate())
}

/// In stock, same category, different name, not a variant of the same parent.
pub fn similar_filters(product: &Product) -> FilterSet {
    let mut filters = FilterSet::new().with(in_stock());
    if let Some(category) = product.category_id.as_deref().filter(|c| !c.is_empty()) {
        filters.push(Clause::equals("category_id", category));
    }
    filters.extend(not_same_name(product));

    let anchor = product
        .parent_product_id
        .as_deref()
        .filter(|p| !p.is_empty())
        .unwrap_or(&product.product_id);
    if !anchor.is_empty() {
        filters.push(Clause::equals("parent_product_id", anchor).negate());
    }

    filters.extend(gender_clause(product));
    filters
}

/// In stock, different category, sharing a tag, different name.
pub fn complementary_filters(product: &Product) -> FilterSet {
    let mut filters = FilterSet::new().with(in_stock());
    if let Some(category) = product.category_id.as_deref().filter(|c| !c.is_empty()) {
        filters.push(Clause::equals("category_id", category).negate());
    }
    if !product.tags.is_empty() {
        filters.push(Clause::text("tags", product.tags.join(" ")));
    }
    filters.extend(not_same_name(product));
    filters.extend(gender_clause(product));
    filters
}

/// Stock only.
pub fn stock_filters(_product: &Product) -> FilterSet {
    FilterSet::new().with(in_stock())
}
