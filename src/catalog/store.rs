//! Document store capability consumed by the recommendation core.

use std::collections::{HashMap, HashSet};
use std::future::Future;

use super::error::CatalogResult;
use super::filter::FilterSet;
use super::model::{EmbeddingSlot, EventType, Product};
use super::text::FuzzyOptions;

/// Fields searched by the text fallback.
pub const TEXT_SEARCH_FIELDS: &[&str] = &["name", "description", "brand", "tags"];

/// Ranked vector similarity query against one named vector field.
#[derive(Debug, Clone, Copy)]
pub struct VectorQuery<'a> {
    /// Named vector (one per kind).
    pub vector_field: &'a str,
    pub vector: &'a [f32],
    pub limit: usize,
    /// Candidate pool examined by the index before truncating to `limit`.
    pub num_candidates: usize,
    pub filter: Option<&'a FilterSet>,
}

/// Ranked keyword query.
#[derive(Debug, Clone, Copy)]
pub struct TextQuery<'a> {
    pub query: &'a str,
    pub fields: &'a [&'a str],
    pub fuzzy: Option<FuzzyOptions>,
    pub filter: Option<&'a FilterSet>,
    pub limit: usize,
}

/// A search hit. Vector scores are in `[0, 1]`; text scores are raw relevance.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredProduct {
    pub product_id: String,
    pub score: f32,
}

/// Co-purchase mining parameters.
#[derive(Debug, Clone, Copy)]
pub struct CoPurchaseQuery<'a> {
    pub product_id: &'a str,
    /// Restricts mining to this user's orders.
    pub user_id: Option<&'a str>,
    pub limit: usize,
}

/// How many orders contained both the target and `product_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoPurchaseCount {
    pub product_id: String,
    pub count: u64,
}

/// Best-seller ranking parameters. Empty lists mean no restriction.
#[derive(Debug, Clone, Copy)]
pub struct SalesQuery<'a> {
    pub limit: usize,
    pub brands: &'a [String],
    pub category_ids: &'a [String],
}

/// Units sold and number of purchase records for a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesCount {
    pub product_id: String,
    pub units: u64,
    pub orders: u64,
}

/// One page of a full product scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductIdPage {
    pub product_ids: Vec<String>,
    /// Cursor for the following page; `None` once the scan is exhausted.
    pub next: Option<u64>,
}

/// Minimal async interface to the document store.
pub trait CatalogStore: Send + Sync {
    /// Point lookup by product id.
    fn find_product(
        &self,
        product_id: &str,
    ) -> impl Future<Output = CatalogResult<Option<Product>>> + Send;

    /// Bulk lookup. Missing ids are skipped; order is not guaranteed.
    fn find_products(
        &self,
        product_ids: &[String],
    ) -> impl Future<Output = CatalogResult<Vec<Product>>> + Send;

    /// Stored vectors of `kind` for the given ids (ids without a vector are absent).
    fn find_embeddings(
        &self,
        product_ids: &[String],
        kind: &str,
    ) -> impl Future<Output = CatalogResult<HashMap<String, Vec<f32>>>> + Send;

    /// Writes the embedding slot of `kind` on a product.
    fn store_embedding(
        &self,
        product_id: &str,
        kind: &str,
        slot: EmbeddingSlot,
    ) -> impl Future<Output = CatalogResult<()>> + Send;

    /// Ranked vector search, best first.
    fn vector_search(
        &self,
        query: VectorQuery<'_>,
    ) -> impl Future<Output = CatalogResult<Vec<ScoredProduct>>> + Send;

    /// Ranked keyword search, best first.
    fn text_search(
        &self,
        query: TextQuery<'_>,
    ) -> impl Future<Output = CatalogResult<Vec<ScoredProduct>>> + Send;

    /// Products bought in the same orders as the target, most frequent first.
    fn co_purchases(
        &self,
        query: CoPurchaseQuery<'_>,
    ) -> impl Future<Output = CatalogResult<Vec<CoPurchaseCount>>> + Send;

    /// Distinct product ids the user has interacted with through `event_type`.
    fn user_product_ids(
        &self,
        user_id: &str,
        event_type: EventType,
    ) -> impl Future<Output = CatalogResult<HashSet<String>>> + Send;

    /// Product ids of the whole catalog, `page_size` at a time, starting at `cursor`.
    fn scan_product_ids(
        &self,
        cursor: Option<u64>,
        page_size: usize,
    ) -> impl Future<Output = CatalogResult<ProductIdPage>> + Send;

    /// Distinct products the user viewed, most recent first.
    fn last_seen_products(
        &self,
        user_id: &str,
        limit: usize,
    ) -> impl Future<Output = CatalogResult<Vec<String>>> + Send;

    /// Best sellers by units, then purchase records.
    fn sales_ranking(
        &self,
        query: SalesQuery<'_>,
    ) -> impl Future<Output = CatalogResult<Vec<SalesCount>>> + Send;

    /// Performs a basic connectivity check.
    fn health_check(&self) -> impl Future<Output = CatalogResult<()>> + Send;
}
