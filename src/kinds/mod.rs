//! Recommendation kinds: text builders, default filters, fallback queries and ranking prompts.

pub mod builders;
pub mod filters;
pub mod prompts;
pub mod registry;

#[cfg(test)]
mod tests;

pub use builders::{
    complementary_fallback, complementary_text, generic_text, similar_fallback, similar_text,
    truncate_chars,
};
pub use filters::{Gender, normalize_gender, source_gender};
pub use registry::{
    FilterStrategy, KIND_COMPLEMENTARY, KIND_COMPLEMENTARY_RICH, KIND_SIMILAR, KIND_SIMILAR_RICH,
    KIND_UPSELL, KIND_XSELL, KindRegistry, KindSpec, TaskBuilder, TextBuilder,
};
