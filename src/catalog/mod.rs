//! Product catalog: document model, portable filters, and the store capability with its
//! Qdrant adapter.

pub mod aggregate;
pub mod error;
pub mod filter;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod model;
pub mod qdrant;
pub mod store;
pub mod text;


pub use error::{CatalogError, CatalogResult};
pub use filter::{Clause, FilterSet};
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockCatalog, cosine_similarity};
pub use model::{EmbeddingSlot, EventType, Interaction, Product, ProductView};
pub use qdrant::{QdrantCatalog, to_qdrant_filter};
pub use store::{
    CatalogStore, CoPurchaseCount, CoPurchaseQuery, ProductIdPage, SalesCount, SalesQuery,
    ScoredProduct, TEXT_SEARCH_FIELDS, TextQuery, VectorQuery,
};
pub use text::{FuzzyOptions, text_relevance, tokenize, tokens_match};
