//! Qdrant-backed [`CatalogStore`].
//!
//! Products are points (id = BLAKE3 of `product_id`) whose payload is the product document.
//! Each kind's embedding lives twice: as a named vector (searchable) and as the payload slot
//! `vectors.<kind>` (model + timestamp bookkeeping). Events are payload-only points in a
//! separate collection owned by the ingestion path.

use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind as QdrantKind;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, Distance, FieldType,
    Filter, GetPointsBuilder, PointId, PointVectors, PointsIdsList, Range, RetrievedPoint,
    ScrollPointsBuilder, SearchParamsBuilder, SearchPointsBuilder, SetPayloadPointsBuilder,
    UpdatePointVectorsBuilder, Value as QdrantValue, VectorParamsBuilder, VectorsConfigBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};

use super::aggregate::{
    baskets_containing, co_purchase_counts, last_seen_product_ids, sales_counts,
};
use super::error::{CatalogError, CatalogResult};
use super::filter::{Clause, FilterSet};
use super::model::{EmbeddingSlot, EventType, Interaction, Product};
use super::store::{
    CatalogStore, CoPurchaseCount, CoPurchaseQuery, ProductIdPage, SalesCount, SalesQuery,
    ScoredProduct, TEXT_SEARCH_FIELDS, TextQuery, VectorQuery,
};
use super::text::{text_relevance, tokenize};
use crate::hashing::product_point_id;

const SCROLL_PAGE_SIZE: u32 = 1_000;
const MAX_SCROLL_POINTS: usize = 200_000;
/// Candidates pulled per requested text hit before local relevance scoring.
const TEXT_CANDIDATE_FACTOR: usize = 10;

#[derive(Clone)]
/// Catalog store on top of a Qdrant cluster.
pub struct QdrantCatalog {
    client: Qdrant,
    url: String,
    products: String,
    events: String,
}

impl std::fmt::Debug for QdrantCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantCatalog")
            .field("url", &self.url)
            .field("products", &self.products)
            .field("events", &self.events)
            .finish()
    }
}

impl QdrantCatalog {
    /// Creates a client for `url` using the given collections.
    pub fn new(url: &str, products: &str, events: &str) -> CatalogResult<Self> {
        let client =
            Qdrant::from_url(url)
                .build()
                .map_err(|e| CatalogError::ConnectionFailed {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;

        Ok(Self {
            client,
            url: url.to_string(),
            products: products.to_string(),
            events: events.to_string(),
        })
    }

    /// Returns the underlying Qdrant client.
    pub fn client(&self) -> &Qdrant {
        &self.client
    }

    /// Ensures the products collection exists with one cosine named vector per kind.
    pub async fn ensure_products_collection(
        &self,
        kinds: &[&str],
        vector_size: u64,
    ) -> CatalogResult<()> {
        let exists = self
            .client
            .collection_exists(&self.products)
            .await
            .map_err(|e| self.create_err(e))?;
        if exists {
            return Ok(());
        }

        let mut vectors_config = VectorsConfigBuilder::default();
        for kind in kinds {
            vectors_config.add_named_vector_params(
                *kind,
                VectorParamsBuilder::new(vector_size, Distance::Cosine),
            );
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.products)
                    .vectors_config(vectors_config)
                    .on_disk_payload(true),
            )
            .await
            .map_err(|e| self.create_err(e))?;

        for field in ["product_id", "category_id", "brand", "parent_product_id"] {
            self.client
                .create_field_index(CreateFieldIndexCollectionBuilder::new(
                    &self.products,
                    field,
                    FieldType::Keyword,
                ))
                .await
                .map_err(|e| self.create_err(e))?;
        }
        for field in TEXT_SEARCH_FIELDS {
            self.client
                .create_field_index(CreateFieldIndexCollectionBuilder::new(
                    &self.products,
                    *field,
                    FieldType::Text,
                ))
                .await
                .map_err(|e| self.create_err(e))?;
        }

        debug!(collection = %self.products, kinds = kinds.len(), "created products collection");
        Ok(())
    }

    fn create_err(&self, e: impl std::fmt::Display) -> CatalogError {
        CatalogError::CreateCollectionFailed {
            collection: self.products.clone(),
            message: e.to_string(),
        }
    }

    fn query_err<'a>(
        collection: &'a str,
        operation: &'static str,
    ) -> impl FnOnce(qdrant_client::QdrantError) -> CatalogError + 'a {
        move |e| CatalogError::QueryFailed {
            collection: collection.to_string(),
            operation,
            message: e.to_string(),
        }
    }

    async fn get_points(&self, product_ids: &[String]) -> CatalogResult<Vec<RetrievedPoint>> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<PointId> = product_ids
            .iter()
            .map(|id| PointId::from(product_point_id(id)))
            .collect();

        let response = self
            .client
            .get_points(GetPointsBuilder::new(&self.products, ids).with_payload(true))
            .await
            .map_err(Self::query_err(&self.products, "get_points"))?;

        Ok(response.result)
    }

    async fn scroll_all(
        &self,
        collection: &str,
        filter: Filter,
        operation: &'static str,
    ) -> CatalogResult<Vec<RetrievedPoint>> {
        let mut points = Vec::new();
        let mut offset: Option<PointId> = None;

        loop {
            let mut builder = ScrollPointsBuilder::new(collection)
                .filter(filter.clone())
                .limit(SCROLL_PAGE_SIZE)
                .with_payload(true);
            if let Some(next) = offset.take() {
                builder = builder.offset(next);
            }

            let response = self
                .client
                .scroll(builder)
                .await
                .map_err(Self::query_err(collection, operation))?;
            points.extend(response.result);

            match response.next_page_offset {
                Some(next) if points.len() < MAX_SCROLL_POINTS => offset = Some(next),
                _ => break,
            }
        }

        Ok(points)
    }

    async fn scroll_events(
        &self,
        filter: Filter,
        operation: &'static str,
    ) -> CatalogResult<Vec<Interaction>> {
        let points = self.scroll_all(&self.events, filter, operation).await?;
        Ok(points
            .into_iter()
            .filter_map(|p| decode::<Interaction>(p.payload).ok())
            .collect())
    }
}

impl CatalogStore for QdrantCatalog {
    #[instrument(skip(self))]
    async fn find_product(&self, product_id: &str) -> CatalogResult<Option<Product>> {
        let points = self.get_points(&[product_id.to_string()]).await?;
        points
            .into_iter()
            .next()
            .map(|p| decode::<Product>(p.payload))
            .transpose()
    }

    async fn find_products(&self, product_ids: &[String]) -> CatalogResult<Vec<Product>> {
        let points = self.get_points(product_ids).await?;
        Ok(points
            .into_iter()
            .filter_map(|p| decode::<Product>(p.payload).ok())
            .collect())
    }

    async fn find_embeddings(
        &self,
        product_ids: &[String],
        kind: &str,
    ) -> CatalogResult<HashMap<String, Vec<f32>>> {
        let products = self.find_products(product_ids).await?;
        Ok(products
            .into_iter()
            .filter_map(|mut p| {
                let slot = p.vectors.remove(kind)?;
                (!slot.vector.is_empty()).then_some((p.product_id, slot.vector))
            })
            .collect())
    }

    async fn store_embedding(
        &self,
        product_id: &str,
        kind: &str,
        slot: EmbeddingSlot,
    ) -> CatalogResult<()> {
        let update_err = |e: qdrant_client::QdrantError| CatalogError::UpdateFailed {
            collection: self.products.clone(),
            message: e.to_string(),
        };

        let point_id = product_point_id(product_id);
        let mut existing = self
            .find_product(product_id)
            .await?
            .ok_or_else(|| CatalogError::ProductNotFound {
                product_id: product_id.to_string(),
            })?
            .vectors;

        let named: HashMap<String, Vec<f32>> =
            HashMap::from([(kind.to_string(), slot.vector.clone())]);
        self.client
            .update_vectors(
                UpdatePointVectorsBuilder::new(
                    &self.products,
                    vec![PointVectors {
                        id: Some(point_id.into()),
                        vectors: Some(named.into()),
                    }],
                )
                .wait(true),
            )
            .await
            .map_err(update_err)?;

        existing.insert(kind.to_string(), slot);
        let vectors = serde_json::to_value(&existing).map_err(|e| CatalogError::Decode {
            reason: e.to_string(),
        })?;
        let payload = Payload::try_from(serde_json::json!({ "vectors": vectors })).map_err(|e| {
            CatalogError::Decode {
                reason: e.to_string(),
            }
        })?;

        self.client
            .set_payload(
                SetPayloadPointsBuilder::new(&self.products, payload)
                    .points_selector(PointsIdsList {
                        ids: vec![point_id.into()],
                    })
                    .wait(true),
            )
            .await
            .map_err(update_err)?;

        Ok(())
    }

    #[instrument(skip(self, query), fields(field = query.vector_field, limit = query.limit))]
    async fn vector_search(&self, query: VectorQuery<'_>) -> CatalogResult<Vec<ScoredProduct>> {
        let mut builder =
            SearchPointsBuilder::new(&self.products, query.vector.to_vec(), query.limit as u64)
                .vector_name(query.vector_field)
                .params(SearchParamsBuilder::default().hnsw_ef(query.num_candidates as u64))
                .with_payload(true);
        if let Some(filter) = query.filter.map(to_qdrant_filter).transpose()?.flatten() {
            builder = builder.filter(filter);
        }

        let response = self
            .client
            .search_points(builder)
            .await
            .map_err(Self::query_err(&self.products, "vector_search"))?;

        Ok(response
            .result
            .into_iter()
            .filter_map(|point| {
                let product_id = point.payload.get("product_id")?.as_str()?.to_string();
                Some(ScoredProduct {
                    product_id,
                    score: ((1.0 + point.score) / 2.0).clamp(0.0, 1.0),
                })
            })
            .collect())
    }

    #[instrument(skip(self, query), fields(limit = query.limit))]
    async fn text_search(&self, query: TextQuery<'_>) -> CatalogResult<Vec<ScoredProduct>> {
        let should: Vec<Condition> = query
            .fields
            .iter()
            .filter_map(|field| any_token_condition(field, query.query))
            .collect();
        if should.is_empty() {
            return Ok(Vec::new());
        }
        let must: Vec<Condition> = match query.filter {
            Some(filter) => filter
                .clauses()
                .iter()
                .map(to_condition)
                .collect::<CatalogResult<_>>()?,
            None => Vec::new(),
        };
        let filter = Filter {
            must,
            should,
            ..Default::default()
        };

        let builder = ScrollPointsBuilder::new(&self.products)
            .filter(filter)
            .limit((query.limit * TEXT_CANDIDATE_FACTOR).clamp(1, SCROLL_PAGE_SIZE as usize) as u32)
            .with_payload(true)
            .with_vectors(false);

        let response = self
            .client
            .scroll(builder)
            .await
            .map_err(Self::query_err(&self.products, "text_search"))?;

        let mut hits: Vec<ScoredProduct> = response
            .result
            .into_iter()
            .filter_map(|p| {
                let doc = payload_to_json(p.payload);
                let product_id = doc.get("product_id")?.as_str()?.to_string();
                let score = text_relevance(query.query, &doc, query.fields, query.fuzzy);
                (score > 0.0).then_some(ScoredProduct { product_id, score })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(query.limit);
        Ok(hits)
    }

    async fn co_purchases(
        &self,
        query: CoPurchaseQuery<'_>,
    ) -> CatalogResult<Vec<CoPurchaseCount>> {
        let mut target_filter = purchase_filter(query.user_id);
        target_filter
            .must
            .push(Condition::matches("product_id", query.product_id.to_string()));
        let target_events = self.scroll_events(target_filter, "co_purchases").await?;

        let keys: Vec<String> = baskets_containing(&target_events, query.product_id)
            .into_iter()
            .collect();
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut basket_filter = purchase_filter(query.user_id);
        basket_filter.should = vec![
            Condition::matches("order_id", keys.clone()),
            Condition::matches("metadata.order_id", keys.clone()),
            Condition::matches("session_id", keys),
        ];
        let basket_events = self.scroll_events(basket_filter, "co_purchases").await?;

        Ok(co_purchase_counts(
            &basket_events,
            query.product_id,
            query.limit,
        ))
    }

    async fn user_product_ids(
        &self,
        user_id: &str,
        event_type: EventType,
    ) -> CatalogResult<HashSet<String>> {
        let filter = Filter::must([
            Condition::matches("user_id", user_id.to_string()),
            Condition::matches("event_type", event_type.as_str().to_string()),
        ]);
        let events = self.scroll_events(filter, "user_product_ids").await?;
        Ok(events.into_iter().map(|e| e.product_id).collect())
    }

    #[instrument(skip(self))]
    async fn scan_product_ids(
        &self,
        cursor: Option<u64>,
        page_size: usize,
    ) -> CatalogResult<ProductIdPage> {
        let mut builder = ScrollPointsBuilder::new(&self.products)
            .limit(page_size.clamp(1, u32::MAX as usize) as u32)
            .with_payload(true);
        if let Some(cursor) = cursor {
            builder = builder.offset(PointId::from(cursor));
        }

        let response = self
            .client
            .scroll(builder)
            .await
            .map_err(Self::query_err(&self.products, "scan_product_ids"))?;

        let product_ids = response
            .result
            .into_iter()
            .filter_map(|p| {
                payload_to_json(p.payload)
                    .get("product_id")
                    .and_then(Value::as_str)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
            })
            .collect();
        let next = response
            .next_page_offset
            .and_then(|id| match id.point_id_options {
                Some(PointIdOptions::Num(n)) => Some(n),
                _ => None,
            });
        debug!(next = ?next, "product scan page");

        Ok(ProductIdPage { product_ids, next })
    }

    async fn last_seen_products(&self, user_id: &str, limit: usize) -> CatalogResult<Vec<String>> {
        let filter = Filter::must([
            Condition::matches("user_id", user_id.to_string()),
            Condition::matches("event_type", EventType::View.as_str().to_string()),
        ]);
        let events = self.scroll_events(filter, "last_seen_products").await?;
        Ok(last_seen_product_ids(&events, user_id, limit))
    }

    async fn sales_ranking(&self, query: SalesQuery<'_>) -> CatalogResult<Vec<SalesCount>> {
        let events = self
            .scroll_events(purchase_filter(None), "sales_ranking")
            .await?;
        let ranked = sales_counts(&events);

        if query.brands.is_empty() && query.category_ids.is_empty() {
            return Ok(ranked.into_iter().take(query.limit).collect());
        }

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

        let mut out = Vec::with_capacity(query.limit);
        for chunk in ranked.chunks(SCROLL_PAGE_SIZE as usize) {
            let ids: Vec<String> = chunk.iter().map(|s| s.product_id.clone()).collect();
            let matching: HashSet<String> = self
                .find_products(&ids)
                .await?
                .into_iter()
                .filter(|p| allowed.matches(&p.to_document()))
                .map(|p| p.product_id)
                .collect();
            out.extend(
                chunk
                    .iter()
                    .filter(|s| matching.contains(&s.product_id))
                    .cloned(),
            );
            if out.len() >= query.limit {
                break;
            }
        }
        out.truncate(query.limit);
        Ok(out)
    }

    async fn health_check(&self) -> CatalogResult<()> {
        self.client
            .health_check()
            .await
            .map_err(|e| CatalogError::ConnectionFailed {
                url: self.url.clone(),
                message: e.to_string(),
            })?;
        Ok(())
    }
}

fn purchase_filter(user_id: Option<&str>) -> Filter {
    let mut must = vec![Condition::matches(
        "event_type",
        EventType::Purchase.as_str().to_string(),
    )];
    if let Some(user_id) = user_id {
        must.push(Condition::matches("user_id", user_id.to_string()));
    }
    Filter {
        must,
        ..Default::default()
    }
}

/// Translates a portable filter; `None` for an empty set.
///
/// A clause with no Qdrant equivalent is an error rather than being dropped, since dropping a
/// positive constraint would widen the result set.
pub fn to_qdrant_filter(filter: &FilterSet) -> CatalogResult<Option<Filter>> {
    let conditions = filter
        .clauses()
        .iter()
        .map(to_condition)
        .collect::<CatalogResult<Vec<Condition>>>()?;
    if conditions.is_empty() {
        Ok(None)
    } else {
        Ok(Some(Filter::must(conditions)))
    }
}

fn unsupported(clause: &Clause, reason: &str) -> CatalogError {
    CatalogError::UnsupportedFilter {
        reason: format!("{reason}: {clause:?}"),
    }
}

fn equals_condition(path: &str, value: &Value) -> Option<Condition> {
    match value {
        Value::String(s) => Some(Condition::matches(path, s.clone())),
        Value::Bool(b) => Some(Condition::matches(path, *b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Condition::matches(path, i)),
            None => n.as_f64().map(|f| {
                Condition::range(
                    path,
                    Range {
                        gt: None,
                        gte: Some(f),
                        lt: None,
                        lte: Some(f),
                    },
                )
            }),
        },
        _ => None,
    }
}

/// One full-text condition per query token, any of which may match.
///
/// Qdrant's full-text match requires every word of its query, so a multi-word query is split.
fn any_token_condition(path: &str, query: &str) -> Option<Condition> {
    let tokens = tokenize(query);
    if tokens.is_empty() {
        return None;
    }
    Some(Condition::from(Filter::should(
        tokens
            .into_iter()
            .map(|token| Condition::matches_text(path, token)),
    )))
}

fn to_condition(clause: &Clause) -> CatalogResult<Condition> {
    match clause {
        Clause::Equals { path, value } => equals_condition(path, value)
            .ok_or_else(|| unsupported(clause, "equality needs a scalar value")),
        Clause::Range {
            path,
            gt,
            gte,
            lt,
            lte,
        } => Ok(Condition::range(
            path.as_str(),
            Range {
                gt: *gt,
                gte: *gte,
                lt: *lt,
                lte: *lte,
            },
        )),
        Clause::In { path, values } => {
            if values.is_empty() {
                return Err(unsupported(clause, "empty value list"));
            }
            let strings: Vec<String> = values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            if strings.len() == values.len() {
                return Ok(Condition::matches(path.as_str(), strings));
            }
            let ints: Vec<i64> = values.iter().filter_map(Value::as_i64).collect();
            if ints.len() == values.len() {
                return Ok(Condition::matches(path.as_str(), ints));
            }
            let any = values
                .iter()
                .map(|v| equals_condition(path, v))
                .collect::<Option<Vec<Condition>>>()
                .ok_or_else(|| unsupported(clause, "value list needs scalar values"))?;
            Ok(Condition::from(Filter::should(any)))
        }
        Clause::Exists { path } => Ok(Condition::from(Filter::must_not([Condition::is_empty(
            path.as_str(),
        )]))),
        Clause::Not { clause } => {
            to_condition(clause).map(|inner| Condition::from(Filter::must_not([inner])))
        }
        Clause::Text { path, query } => any_token_condition(path, query)
            .ok_or_else(|| unsupported(clause, "text query has no tokens")),
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    payload: HashMap<String, QdrantValue>,
) -> CatalogResult<T> {
    serde_json::from_value(payload_to_json(payload)).map_err(|e| CatalogError::Decode {
        reason: e.to_string(),
    })
}

/// Converts a Qdrant payload into a JSON object.
pub fn payload_to_json(payload: HashMap<String, QdrantValue>) -> Value {
    Value::Object(
        payload
            .into_iter()
            .map(|(k, v)| (k, value_to_json(v)))
            .collect::<Map<String, Value>>(),
    )
}

fn value_to_json(value: QdrantValue) -> Value {
    match value.kind {
        None | Some(QdrantKind::NullValue(_)) => Value::Null,
        Some(QdrantKind::BoolValue(b)) => Value::Bool(b),
        Some(QdrantKind::IntegerValue(i)) => Value::from(i),
        Some(QdrantKind::DoubleValue(d)) => {
            serde_json::Number::from_f64(d).map_or(Value::Null, Value::Number)
        }
        Some(QdrantKind::StringValue(s)) => Value::String(s),
        Some(QdrantKind::ListValue(list)) => {
            Value::Array(list.values.into_iter().map(value_to_json).collect())
        }
        Some(QdrantKind::StructValue(st)) => Value::Object(
            st.fields
                .into_iter()
                .map(|(k, v)| (k, value_to_json(v)))
                .collect(),
        ),
    }
}
