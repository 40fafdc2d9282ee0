//! In-process aggregation over interaction records, shared by store adapters.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

use super::model::{EventType, Interaction};
use super::store::{CoPurchaseCount, SalesCount};

/// Order keys (order id, else session id) of purchases containing `product_id`.
pub fn baskets_containing<'a>(
    events: impl IntoIterator<Item = &'a Interaction>,
    product_id: &str,
) -> HashSet<String> {
    events
        .into_iter()
        .filter(|e| e.event_type == EventType::Purchase && e.product_id == product_id)
        .filter_map(|e| e.order_key().map(str::to_string))
        .collect()
}

/// Counts how many baskets containing `product_id` also contain each other product.
///
/// Purchases are grouped by order key into product sets; every set that contains the target
/// contributes one count to each other member. Ties keep first-seen order.
pub fn co_purchase_counts<'a>(
    events: impl IntoIterator<Item = &'a Interaction>,
    product_id: &str,
    limit: usize,
) -> Vec<CoPurchaseCount> {
    let mut baskets: Vec<(String, BTreeSet<&str>)> = Vec::new();
    let mut basket_index: HashMap<String, usize> = HashMap::new();

    for event in events {
        if event.event_type != EventType::Purchase {
            continue;
        }
        let Some(key) = event.order_key() else {
            continue;
        };
        let idx = *basket_index.entry(key.to_string()).or_insert_with(|| {
            baskets.push((key.to_string(), BTreeSet::new()));
            baskets.len() - 1
        });
        baskets[idx].1.insert(event.product_id.as_str());
    }

    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, u64> = HashMap::new();
    for (_, members) in &baskets {
        if !members.contains(product_id) {
            continue;
        }
        for member in members.iter().filter(|m| **m != product_id) {
            let count = counts.entry((*member).to_string()).or_insert_with(|| {
                order.push((*member).to_string());
                0
            });
            *count += 1;
        }
    }

    let mut ranked: Vec<CoPurchaseCount> = order
        .into_iter()
        .map(|id| {
            let count = counts.get(&id).copied().unwrap_or(0);
            CoPurchaseCount {
                product_id: id,
                count,
            }
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(limit);
    ranked
}

/// Sums purchased units (quantity, default 1) and purchase records per product.
pub fn sales_counts<'a>(events: impl IntoIterator<Item = &'a Interaction>) -> Vec<SalesCount> {
    let mut order: Vec<String> = Vec::new();
    let mut totals: HashMap<String, (u64, u64)> = HashMap::new();

    for event in events {
        if event.event_type != EventType::Purchase {
            continue;
        }
        let entry = totals.entry(event.product_id.clone()).or_insert_with(|| {
            order.push(event.product_id.clone());
            (0, 0)
        });
        entry.0 += event.quantity.unwrap_or(1);
        entry.1 += 1;
    }

    let mut ranked: Vec<SalesCount> = order
        .into_iter()
        .map(|id| {
            let (units, orders) = totals.get(&id).copied().unwrap_or((0, 0));
            SalesCount {
                product_id: id,
                units,
                orders,
            }
        })
        .collect();
    ranked.sort_by(|a, b| match b.units.cmp(&a.units) {
        Ordering::Equal => b.orders.cmp(&a.orders),
        other => other,
    });
    ranked
}

/// Distinct products the user viewed, most recent view first, at most `limit`.
///
/// Each product is ranked by its latest view; equal timestamps keep first-seen order.
pub fn last_seen_product_ids<'a>(
    events: impl IntoIterator<Item = &'a Interaction>,
    user_id: &str,
    limit: usize,
) -> Vec<String> {
    let mut order: Vec<&str> = Vec::new();
    let mut latest: HashMap<&str, i64> = HashMap::new();

    for event in events {
        if event.event_type != EventType::View
            || event.user_id.as_deref() != Some(user_id)
            || event.product_id.is_empty()
        {
            continue;
        }
        latest
            .entry(event.product_id.as_str())
            .and_modify(|ts| *ts = (*ts).max(event.timestamp))
            .or_insert_with(|| {
                order.push(event.product_id.as_str());
                event.timestamp
            });
    }

    order.sort_by_key(|id| std::cmp::Reverse(latest.get(id).copied().unwrap_or(i64::MIN)));
    order.into_iter().take(limit).map(str::to_string).collect()
}
