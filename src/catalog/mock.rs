use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::RwLock;

use super::aggregate::{co_purchase_counts, last_seen_product_ids, sales_counts};
use super::error::{CatalogError, CatalogResult};
use super::filter::{Clause, FilterSet};
use super::model::{EmbeddingSlot, EventType, Interaction, Product};
use super::store::{
    CatalogStore, CoPurchaseCount, CoPurchaseQuery, ProductIdPage, SalesCount, SalesQuery,
    ScoredProduct, TextQuery, VectorQuery,
};
use super::text::text_relevance;

/// In-memory catalog with call counters and failure switches.
#[derive(Default)]
pub struct MockCatalog {
    products: RwLock<Vec<Product>>,
    events: RwLock<Vec<Interaction>>,
    calls: MockCatalogCalls,
    fail_vector_search: AtomicBool,
    fail_text_search: AtomicBool,
    fail_lookups: AtomicBool,
    fail_writes: AtomicBool,
    reverse_vector_hits: AtomicBool,
}

#[derive(Default)]
struct MockCatalogCalls {
    find_product: AtomicUsize,
    find_products: AtomicUsize,
    find_embeddings: AtomicUsize,
    store_embedding: AtomicUsize,
    vector_search: AtomicUsize,
    text_search: AtomicUsize,
    co_purchases: AtomicUsize,
    scan_product_ids: AtomicUsize,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let catalog = Self::new();
        for product in products {
            catalog.insert_product(product);
        }
        catalog
    }

    /// Inserts or replaces a product.
    pub fn insert_product(&self, product: Product) {
        let mut products = self.products.write();
        match products
            .iter_mut()
            .find(|p| p.product_id == product.product_id)
        {
            Some(existing) => *existing = product,
            None => products.push(product),
        }
    }

    pub fn insert_event(&self, event: Interaction) {
        self.events.write().push(event);
    }

    pub fn product(&self, product_id: &str) -> Option<Product> {
        self.products
            .read()
            .iter()
            .find(|p| p.product_id == product_id)
            .cloned()
    }

    pub fn set_fail_vector_search(&self, fail: bool) {
        self.fail_vector_search.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_text_search(&self, fail: bool) {
        self.fail_text_search.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns vector hits in ascending score order, like a backend with no ranking guarantee.
    pub fn set_reverse_vector_hits(&self, reverse: bool) {
        self.reverse_vector_hits.store(reverse, Ordering::SeqCst);
    }

    pub fn find_product_calls(&self) -> usize {
        self.calls.find_product.load(Ordering::SeqCst)
    }

    pub fn find_products_calls(&self) -> usize {
        self.calls.find_products.load(Ordering::SeqCst)
    }

    pub fn find_embeddings_calls(&self) -> usize {
        self.calls.find_embeddings.load(Ordering::SeqCst)
    }

    pub fn store_embedding_calls(&self) -> usize {
        self.calls.store_embedding.load(Ordering::SeqCst)
    }

    pub fn vector_search_calls(&self) -> usize {
        self.calls.vector_search.load(Ordering::SeqCst)
    }

    pub fn text_search_calls(&self) -> usize {
        self.calls.text_search.load(Ordering::SeqCst)
    }

    pub fn co_purchases_calls(&self) -> usize {
        self.calls.co_purchases.load(Ordering::SeqCst)
    }

    pub fn scan_product_ids_calls(&self) -> usize {
        self.calls.scan_product_ids.load(Ordering::SeqCst)
    }

    fn read_products(&self) -> Vec<Product> {
        self.products.read().clone()
    }

    fn read_events(&self) -> Vec<Interaction> {
        self.events.read().clone()
    }

    fn check_lookup(&self, operation: &'static str) -> CatalogResult<()> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(unavailable(operation));
        }
        Ok(())
    }
}

fn unavailable(operation: &'static str) -> CatalogError {
    CatalogError::QueryFailed {
        collection: "mock".to_string(),
        operation,
        message: "store unavailable".to_string(),
    }
}

fn passes(filter: Option<&FilterSet>, product: &Product) -> bool {
    filter.is_none_or(|f| f.matches(&product.to_document()))
}

impl CatalogStore for MockCatalog {
    async fn find_product(&self, product_id: &str) -> CatalogResult<Option<Product>> {
        self.calls.find_product.fetch_add(1, Ordering::SeqCst);
        self.check_lookup("find_product")?;
        Ok(self
            .read_products()
            .into_iter()
            .find(|p| p.product_id == product_id))
    }

    async fn find_products(&self, product_ids: &[String]) -> CatalogResult<Vec<Product>> {
        self.calls.find_products.fetch_add(1, Ordering::SeqCst);
        self.check_lookup("find_products")?;
        let wanted: HashSet<&str> = product_ids.iter().map(String::as_str).collect();
        Ok(self
            .read_products()
            .into_iter()
            .filter(|p| wanted.contains(p.product_id.as_str()))
            .collect())
    }

    async fn find_embeddings(
        &self,
        product_ids: &[String],
        kind: &str,
    ) -> CatalogResult<HashMap<String, Vec<f32>>> {
        self.calls.find_embeddings.fetch_add(1, Ordering::SeqCst);
        self.check_lookup("find_embeddings")?;
        let wanted: HashSet<&str> = product_ids.iter().map(String::as_str).collect();
        Ok(self
            .read_products()
            .into_iter()
            .filter(|p| wanted.contains(p.product_id.as_str()))
            .filter_map(|p| {
                let vector = p.vector(kind)?.to_vec();
                Some((p.product_id, vector))
            })
            .collect())
    }

    async fn store_embedding(
        &self,
        product_id: &str,
        kind: &str,
        slot: EmbeddingSlot,
    ) -> CatalogResult<()> {
        self.calls.store_embedding.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CatalogError::UpdateFailed {
                collection: "mock".to_string(),
                message: "write rejected".to_string(),
            });
        }

        let mut products = self.products.write();
        let product = products
            .iter_mut()
            .find(|p| p.product_id == product_id)
            .ok_or_else(|| CatalogError::ProductNotFound {
                product_id: product_id.to_string(),
            })?;
        product.vectors.insert(kind.to_string(), slot);
        Ok(())
    }

    async fn vector_search(&self, query: VectorQuery<'_>) -> CatalogResult<Vec<ScoredProduct>> {
        self.calls.vector_search.fetch_add(1, Ordering::SeqCst);
        if self.fail_vector_search.load(Ordering::SeqCst) {
            return Err(unavailable("vector_search"));
        }

        let mut hits: Vec<ScoredProduct> = self
            .read_products()
            .iter()
            .filter(|p| passes(query.filter, p))
            .filter_map(|p| {
                let stored = p.vector(query.vector_field)?;
                let cosine = cosine_similarity(query.vector, stored);
                Some(ScoredProduct {
                    product_id: p.product_id.clone(),
                    score: ((1.0 + cosine) / 2.0).clamp(0.0, 1.0),
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(query.limit);
        if self.reverse_vector_hits.load(Ordering::SeqCst) {
            hits.reverse();
        }
        Ok(hits)
    }

    async fn text_search(&self, query: TextQuery<'_>) -> CatalogResult<Vec<ScoredProduct>> {
        self.calls.text_search.fetch_add(1, Ordering::SeqCst);
        if self.fail_text_search.load(Ordering::SeqCst) {
            return Err(unavailable("text_search"));
        }

        let mut hits: Vec<ScoredProduct> = self
            .read_products()
            .iter()
            .filter(|p| passes(query.filter, p))
            .filter_map(|p| {
                let score =
                    text_relevance(query.query, &p.to_document(), query.fields, query.fuzzy);
                (score > 0.0).then(|| ScoredProduct {
                    product_id: p.product_id.clone(),
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(query.limit);
        Ok(hits)
    }

    async fn co_purchases(
        &self,
        query: CoPurchaseQuery<'_>,
    ) -> CatalogResult<Vec<CoPurchaseCount>> {
        self.calls.co_purchases.fetch_add(1, Ordering::SeqCst);
        self.check_lookup("co_purchases")?;
        let events = self.read_events();
        let scoped = events
            .iter()
            .filter(|e| query.user_id.is_none_or(|u| e.user_id.as_deref() == Some(u)));
        Ok(co_purchase_counts(scoped, query.product_id, query.limit))
    }

    async fn user_product_ids(
        &self,
        user_id: &str,
        event_type: EventType,
    ) -> CatalogResult<HashSet<String>> {
        self.check_lookup("user_product_ids")?;
        Ok(self
            .read_events()
            .into_iter()
            .filter(|e| e.event_type == event_type && e.user_id.as_deref() == Some(user_id))
            .map(|e| e.product_id)
            .collect())
    }

    async fn scan_product_ids(
        &self,
        cursor: Option<u64>,
        page_size: usize,
    ) -> CatalogResult<ProductIdPage> {
        self.calls.scan_product_ids.fetch_add(1, Ordering::SeqCst);
        self.check_lookup("scan_product_ids")?;
        let products = self.read_products();
        let start = cursor.map_or(0, |c| c as usize).min(products.len());
        let end = start.saturating_add(page_size.max(1)).min(products.len());
        Ok(ProductIdPage {
            product_ids: products[start..end]
                .iter()
                .map(|p| p.product_id.clone())
                .collect(),
            next: (end < products.len()).then_some(end as u64),
        })
    }

    async fn last_seen_products(&self, user_id: &str, limit: usize) -> CatalogResult<Vec<String>> {
        self.check_lookup("last_seen_products")?;
        Ok(last_seen_product_ids(&self.read_events(), user_id, limit))
    }

    async fn sales_ranking(&self, query: SalesQuery<'_>) -> CatalogResult<Vec<SalesCount>> {
        self.check_lookup("sales_ranking")?;
        let events = self.read_events();
        let products = self.read_products();

        let mut allowed = FilterSet::new();
        if !query.brands.is_empty() {
            allowed.push(Clause::one_of("brand", query.brands.iter().cloned()));
        }
        if !query.category_ids.is_empty() {
            allowed.push(Clause::one_of(
                "category_id",
                query.category_ids.iter().cloned(),
            ));
        }
        let known: HashSet<String> = products
            .iter()
            .filter(|p| allowed.matches(&p.to_document()))
            .map(|p| p.product_id.clone())
            .collect();

        Ok(sales_counts(&events)
            .into_iter()
            .filter(|s| known.contains(&s.product_id))
            .take(query.limit)
            .collect())
    }

    async fn health_check(&self) -> CatalogResult<()> {
        self.check_lookup("health_check")
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
