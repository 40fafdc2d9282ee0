use std::collections::HashMap;
use std::fmt;

use crate::catalog::{FilterSet, Product, ProductView};

use super::builders::{
    complementary_fallback, complementary_text, generic_text, similar_fallback, similar_text,
};
use super::filters::{complementary_filters, similar_filters, stock_filters};
use super::prompts::{
    COMPLEMENTARY_SYSTEM_PROMPT, SIMILAR_SYSTEM_PROMPT, UPSELL_SYSTEM_PROMPT, XSELL_SYSTEM_PROMPT,
    complementary_task, similar_task, upsell_task, xsell_task,
};

pub const KIND_SIMILAR: &str = "sim";
pub const KIND_SIMILAR_RICH: &str = "sim_rich";
pub const KIND_COMPLEMENTARY: &str = "comp";
pub const KIND_COMPLEMENTARY_RICH: &str = "comp_rich";
pub const KIND_XSELL: &str = "xsell";
pub const KIND_UPSELL: &str = "upsell";

/// Builds text from a product projection.
pub type TextBuilder = fn(&ProductView<'_>) -> String;
/// Derives the default retrieval filters from the source product.
pub type FilterStrategy = fn(&Product) -> FilterSet;
/// Builds the ranking task rubric; the flag requests rationales.
pub type TaskBuilder = fn(bool) -> String;

/// Everything the pipeline needs to know about one recommendation kind.
#[derive(Clone)]
pub struct KindSpec {
    pub name: String,
    pub text_builder: TextBuilder,
    pub filter_strategy: FilterStrategy,
    pub fallback_text: TextBuilder,
    /// Named vector field searched for this kind.
    pub vector_field: String,
    /// Blended scores below this are dropped after rerank.
    pub min_score: f32,
    pub system_prompt: String,
    pub task: TaskBuilder,
}

impl KindSpec {
    /// A kind with generic text, stock-only filters and the similarity rubric.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            vector_field: name.clone(),
            name,
            text_builder: generic_text,
            filter_strategy: stock_filters,
            fallback_text: similar_fallback,
            min_score: 0.0,
            system_prompt: SIMILAR_SYSTEM_PROMPT.to_string(),
            task: similar_task,
        }
    }

    pub fn with_text_builder(mut self, builder: TextBuilder) -> Self {
        self.text_builder = builder;
        self
    }

    pub fn with_filter_strategy(mut self, strategy: FilterStrategy) -> Self {
        self.filter_strategy = strategy;
        self
    }

    pub fn with_fallback_text(mut self, builder: TextBuilder) -> Self {
        self.fallback_text = builder;
        self
    }

    pub fn with_vector_field(mut self, field: impl Into<String>) -> Self {
        self.vector_field = field.into();
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_prompt(mut self, system_prompt: impl Into<String>, task: TaskBuilder) -> Self {
        self.system_prompt = system_prompt.into();
        self.task = task;
        self
    }

    pub fn embedding_text(&self, product: &Product) -> String {
        (self.text_builder)(&product.view())
    }

    pub fn default_filters(&self, product: &Product) -> FilterSet {
        (self.filter_strategy)(product)
    }

    pub fn fallback_query(&self, product: &Product) -> String {
        (self.fallback_text)(&product.view())
    }

    pub fn task_prompt(&self, include_rationale: bool) -> String {
        (self.task)(include_rationale)
    }
}

impl fmt::Debug for KindSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindSpec")
            .field("name", &self.name)
            .field("vector_field", &self.vector_field)
            .field("min_score", &self.min_score)
            .finish_non_exhaustive()
    }
}

/// Open registry of recommendation kinds.
#[derive(Debug, Clone, Default)]
pub struct KindRegistry {
    kinds: HashMap<String, KindSpec>,
}

impl KindRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `sim`, `sim_rich`, `comp`, `comp_rich`, `xsell` and `upsell`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for name in [KIND_SIMILAR, KIND_SIMILAR_RICH] {
            registry.register(
                KindSpec::new(name)
                    .with_text_builder(similar_text)
                    .with_filter_strategy(similar_filters)
                    .with_min_score(0.5),
            );
        }
        for name in [KIND_COMPLEMENTARY, KIND_COMPLEMENTARY_RICH] {
            registry.register(
                KindSpec::new(name)
                    .with_text_builder(complementary_text)
                    .with_filter_strategy(complementary_filters)
                    .with_fallback_text(complementary_fallback)
                    .with_min_score(0.5)
                    .with_prompt(COMPLEMENTARY_SYSTEM_PROMPT, complementary_task),
            );
        }
        registry.register(
            KindSpec::new(KIND_XSELL)
                .with_fallback_text(complementary_fallback)
                .with_prompt(XSELL_SYSTEM_PROMPT, xsell_task),
        );
        registry.register(
            KindSpec::new(KIND_UPSELL).with_prompt(UPSELL_SYSTEM_PROMPT, upsell_task),
        );
        registry
    }

    /// Adds or replaces a kind.
    pub fn register(&mut self, spec: KindSpec) {
        self.kinds.insert(spec.name.clone(), spec);
    }

    pub fn get(&self, kind: &str) -> Option<&KindSpec> {
        self.kinds.get(kind)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    /// Registered kind names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.kinds.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Embedding text for `kind`; unknown kinds use the generic builder.
    pub fn text_for(&self, kind: &str, product: &Product) -> String {
        match self.get(kind) {
            Some(spec) => spec.embedding_text(product),
            None => generic_text(&product.view()),
        }
    }

    /// Minimum blended score for `kind`; unknown kinds keep everything.
    pub fn min_score(&self, kind: &str) -> f32 {
        self.get(kind).map_or(0.0, |spec| spec.min_score)
    }
}
