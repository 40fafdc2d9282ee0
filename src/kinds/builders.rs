//! Per-kind embedding text and text-fallback query builders.

use crate::catalog::ProductView;

const FIELD_SEPARATOR: &str = " | ";

const COMP_INSTRUCTION: &str = "Find products commonly used, worn, or purchased together with this item (either as base or accessory).";

/// Returns at most `max_chars` characters of `s`.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn join_present(parts: impl IntoIterator<Item = Option<String>>) -> String {
    parts
        .into_iter()
        .flatten()
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>()
        .join(FIELD_SEPARATOR)
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.trim().is_empty())
}

fn joined_tags(view: &ProductView<'_>) -> Option<String> {
    (!view.tags.is_empty()).then(|| view.tags.join(" "))
}

/// Substitutability text: name, brand, short description, tags.
pub fn similar_text(view: &ProductView<'_>) -> String {
    join_present([
        Some(view.name.to_string()),
        view.brand.map(str::to_string),
        view.description.map(|d| truncate_chars(d, 220).to_string()),
        joined_tags(view),
    ])
}

/// Co-usage text: labelled attributes plus a role-agnostic instruction.
pub fn complementary_text(view: &ProductView<'_>) -> String {
    join_present([
        Some(format!("Product name: {}", view.name)),
        non_empty(view.brand).map(|b| format!("Brand: {b}")),
        non_empty(view.category_id).map(|c| format!("Category: {c}")),
        non_empty(view.category_path).map(|c| format!("Category Path: {c}")),
        joined_tags(view).map(|t| format!("Tags: {t}")),
        Some(COMP_INSTRUCTION.to_string()),
        view.description.map(|d| truncate_chars(d, 200).to_string()),
    ])
}

/// Text for kinds without a dedicated builder.
pub fn generic_text(view: &ProductView<'_>) -> String {
    join_present([
        Some(view.name.to_string()),
        view.brand.map(str::to_string),
        view.description.map(|d| truncate_chars(d, 200).to_string()),
        joined_tags(view),
        non_empty(view.category_id).map(|c| format!("Category: {c}")),
        non_empty(view.category_path).map(|c| format!("Category Path: {c}")),
    ])
}

fn base_info(view: &ProductView<'_>) -> String {
    let tags = view.tags.join(" ");
    format!(
        "{} {} {} {} {}",
        view.name,
        view.brand.unwrap_or_default(),
        view.category_id.unwrap_or_default(),
        view.category_path.unwrap_or_default(),
        tags
    )
    .trim()
    .to_string()
}

pub fn similar_fallback(view: &ProductView<'_>) -> String {
    format!("products similar to {}", base_info(view))
}

pub fn complementary_fallback(view: &ProductView<'_>) -> String {
    format!(
        "products commonly used, worn, or bought together with {}",
        base_info(view)
    )
}
