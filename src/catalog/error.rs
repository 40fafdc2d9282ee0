use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned by document store operations.
pub enum CatalogError {
    /// Could not connect to the store endpoint.
    #[error("failed to connect to catalog store at '{url}': {message}")]
    ConnectionFailed {
        /// Endpoint URL.
        url: String,
        /// Error message.
        message: String,
    },

    /// Collection creation failed.
    #[error("failed to create collection '{collection}': {message}")]
    CreateCollectionFailed {
        /// Collection name.
        collection: String,
        /// Error message.
        message: String,
    },

    /// A read or search query failed.
    #[error("{operation} failed on '{collection}': {message}")]
    QueryFailed {
        /// Collection name.
        collection: String,
        /// Operation name (e.g. `vector_search`).
        operation: &'static str,
        /// Error message.
        message: String,
    },

    /// A write failed.
    #[error("failed to update '{collection}': {message}")]
    UpdateFailed {
        /// Collection name.
        collection: String,
        /// Error message.
        message: String,
    },

    /// A stored document could not be decoded.
    #[error("failed to decode document: {reason}")]
    Decode {
        /// Error message.
        reason: String,
    },

    /// A filter clause has no equivalent in the store's query language.
    #[error("unsupported filter: {reason}")]
    UnsupportedFilter {
        /// Offending clause and why.
        reason: String,
    },

    /// The referenced product does not exist.
    #[error("product not found: {product_id}")]
    ProductNotFound {
        /// Product id.
        product_id: String,
    },
}

/// Convenience result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;
