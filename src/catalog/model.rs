use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A catalog product as stored in the document store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    /// Per-kind embedding slots.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vectors: BTreeMap<String, EmbeddingSlot>,
}

/// One persisted embedding of a product, keyed by kind on [`Product::vectors`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSlot {
    pub model: String,
    pub vector: Vec<f32>,
    /// Unix seconds.
    pub updated_at: i64,
}

impl EmbeddingSlot {
    pub fn new(model: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            model: model.into(),
            vector,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }
}

impl Product {
    pub fn new(product_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn with_category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = Some(category_id.into());
        self
    }

    pub fn with_category_path(mut self, path: impl Into<String>) -> Self {
        self.category_path = Some(path.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.current_price = Some(price);
        self
    }

    pub fn with_stock(mut self, stock: i64) -> Self {
        self.stock = Some(stock);
        self
    }

    pub fn with_parent(mut self, parent_product_id: impl Into<String>) -> Self {
        self.parent_product_id = Some(parent_product_id.into());
        self
    }

    pub fn with_gender(mut self, gender: impl Into<Value>) -> Self {
        self.gender = Some(gender.into());
        self
    }

    pub fn with_vector(mut self, kind: &str, model: &str, vector: Vec<f32>) -> Self {
        self.vectors
            .insert(kind.to_string(), EmbeddingSlot::new(model, vector));
        self
    }

    /// Read-only projection used by text builders and rerank payloads.
    pub fn view(&self) -> ProductView<'_> {
        ProductView {
            product_id: &self.product_id,
            name: &self.name,
            brand: self.brand.as_deref(),
            description: self.description.as_deref(),
            tags: &self.tags,
            category_id: self.category_id.as_deref(),
            category_path: self.category_path.as_deref(),
            price: self.current_price,
        }
    }

    /// Stored vector for `kind`, if any.
    pub fn vector(&self, kind: &str) -> Option<&[f32]> {
        self.vectors
            .get(kind)
            .map(|slot| slot.vector.as_slice())
            .filter(|v| !v.is_empty())
    }

    /// Raw gender attribute (top-level or `metadata.gender`).
    pub fn gender_value(&self) -> Option<&Value> {
        self.gender
            .as_ref()
            .filter(|v| !v.is_null())
            .or_else(|| self.metadata.get("gender").filter(|v| !v.is_null()))
    }

    /// JSON document used for filter evaluation; embedding slots are omitted.
    pub fn to_document(&self) -> Value {
        let mut doc = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(ref mut map) = doc {
            map.remove("vectors");
        }
        doc
    }
}

/// Borrowed projection carrying exactly the fields text building and rerank need.
#[derive(Debug, Clone, Copy)]
pub struct ProductView<'a> {
    pub product_id: &'a str,
    pub name: &'a str,
    pub brand: Option<&'a str>,
    pub description: Option<&'a str>,
    pub tags: &'a [String],
    pub category_id: Option<&'a str>,
    pub category_path: Option<&'a str>,
    pub price: Option<f64>,
}

/// Interaction event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    View,
    AddToCart,
    Purchase,
    #[serde(other)]
    Other,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::View => "view",
            EventType::AddToCart => "add_to_cart",
            EventType::Purchase => "purchase",
            EventType::Other => "other",
        }
    }
}

/// A user interaction record (view, cart add, purchase).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub product_id: String,
    pub event_type: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u64>,
    /// Unix seconds.
    #[serde(default)]
    pub timestamp: i64,
    /// Free-form ingestion fields; `metadata.order_id` is honoured for basket grouping.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Interaction {
    pub fn purchase(product_id: impl Into<String>, order_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            event_type: EventType::Purchase,
            user_id: None,
            session_id: None,
            order_id: Some(order_id.into()),
            quantity: None,
            timestamp: 0,
            metadata: Map::new(),
        }
    }

    pub fn cart_add(product_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            event_type: EventType::AddToCart,
            user_id: Some(user_id.into()),
            session_id: None,
            order_id: None,
            quantity: None,
            timestamp: 0,
            metadata: Map::new(),
        }
    }

    pub fn view(product_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            event_type: EventType::View,
            ..Self::cart_add(product_id, user_id)
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_quantity(mut self, quantity: u64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Grouping key for basket mining: the order id (top-level, then `metadata.order_id`),
    /// else the session id. Empty strings are skipped.
    pub fn order_key(&self) -> Option<&str> {
        let non_empty = |k: &&str| !k.is_empty();
        self.order_id
            .as_deref()
            .filter(non_empty)
            .or_else(|| {
                self.metadata
                    .get("order_id")
                    .and_then(Value::as_str)
                    .filter(non_empty)
            })
            .or_else(|| self.session_id.as_deref().filter(non_empty))
    }
}
