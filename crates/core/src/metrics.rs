//! Admin dashboard metrics.
//!
//! The dashboard prefers a server-computed snapshot. When the API has no such
//! endpoint, the client lists every cart and reduces them with [`aggregate`].

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::types::price::{lenient_count, lenient_decimal};
use crate::types::wire::{lenient_id, lenient_text};
use crate::types::{ProductId, UserId};

/// Maximum number of products in the ranking.
pub const RANKING_LIMIT: usize = 10;

/// How often a product was requested across all carts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedProduct {
    #[serde(rename = "produtoId")]
    pub product_id: ProductId,
    #[serde(rename = "nome", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub count: u64,
}

/// What the dashboard cards display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Users owning at least one non-empty cart.
    pub active_users: u64,
    /// Sum of unit price times quantity over all non-empty carts.
    pub total_value: Decimal,
    /// Top products by requested quantity, descending.
    pub ranking: Vec<RankedProduct>,
}

impl MetricsSnapshot {
    /// Overlay a direct metrics response.
    ///
    /// Each of `activeUsers`, `totalValue` and `ranking` replaces the current
    /// value only when present and of the right type; anything else keeps the
    /// previous value.
    pub fn apply_direct(&mut self, body: &Map<String, Value>) {
        if let Some(active) = body
            .get("activeUsers")
            .filter(|v| v.is_number())
            .and_then(lenient_count)
        {
            self.active_users = active;
        }
        if let Some(total) = body
            .get("totalValue")
            .filter(|v| v.is_number())
            .and_then(lenient_decimal)
        {
            self.total_value = total;
        }
        if let Some(ranking) = body
            .get("ranking")
            .filter(|v| v.is_array())
            .and_then(|v| Vec::<RankedProduct>::deserialize(v).ok())
        {
            self.ranking = ranking;
        }
    }
}

/// A cart as returned by the admin cart listing.
///
/// Ids and names are kept raw since older records store numeric ids or
/// populated references; read them through the accessors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CartRecord {
    #[serde(rename = "_id", default)]
    pub id: Option<Value>,
    #[serde(rename = "usuarioId", default)]
    pub user_id: Option<Value>,
    #[serde(rename = "itens", default, deserialize_with = "items_or_empty")]
    pub items: Vec<CartRecordItem>,
    #[serde(rename = "atualizadoEm", default)]
    pub updated_at: Option<Value>,
}

impl CartRecord {
    #[must_use]
    pub fn user(&self) -> Option<UserId> {
        self.user_id.as_ref().and_then(lenient_id).map(UserId::new)
    }
}

/// One item of a listed cart.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CartRecordItem {
    #[serde(rename = "produtoId", default)]
    pub product_id: Option<Value>,
    #[serde(rename = "nome", default)]
    pub name: Option<Value>,
    #[serde(rename = "precoUnitario", default)]
    pub unit_price: Option<Value>,
    #[serde(rename = "quantidade", default)]
    pub quantity: Option<Value>,
}

impl CartRecordItem {
    #[must_use]
    pub fn product(&self) -> Option<ProductId> {
        self.product_id.as_ref().and_then(lenient_id).map(ProductId::new)
    }

    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        self.name.as_ref().and_then(lenient_text)
    }
}

/// A non-array `itens` means an empty cart. Every element of an array is
/// kept, so a cart never looks empty because one item was unreadable.
fn items_or_empty<'de, D>(deserializer: D) -> Result<Vec<CartRecordItem>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let Some(Value::Array(raw)) = value else {
        return Ok(Vec::new());
    };
    Ok(raw
        .into_iter()
        .map(|item| serde_json::from_value(item).unwrap_or_default())
        .collect())
}

/// Reduce every cart into a dashboard snapshot.
///
/// Only carts with at least one item count. Within them:
/// - each distinct `usuarioId` is one active user (carts without one add none);
/// - every item adds price times quantity to the total, missing values as 0;
/// - items with a `produtoId` add their quantity (0 counts as 1) to that
///   product's ranking entry, which keeps the first non-empty name seen.
///
/// The ranking is sorted by count descending with ties kept in first-seen
/// order, then cut to [`RANKING_LIMIT`].
#[must_use]
pub fn aggregate(carts: &[CartRecord]) -> MetricsSnapshot {
    let mut users: HashSet<UserId> = HashSet::new();
    let mut total_value = Decimal::ZERO;
    let mut ranking: Vec<RankedProduct> = Vec::new();
    let mut positions: HashMap<ProductId, usize> = HashMap::new();

    for cart in carts.iter().filter(|c| !c.items.is_empty()) {
        if let Some(user) = cart.user() {
            users.insert(user);
        }

        for item in &cart.items {
            let price = item
                .unit_price
                .as_ref()
                .and_then(lenient_decimal)
                .unwrap_or(Decimal::ZERO);
            let quantity = item.quantity.as_ref().and_then(lenient_count).unwrap_or(0);
            total_value += price * Decimal::from(quantity);

            let Some(product_id) = item.product() else {
                continue;
            };
            let name = item.display_name();
            let requested = if quantity == 0 { 1 } else { quantity };

            match positions.get(&product_id).and_then(|&i| ranking.get_mut(i)) {
                Some(entry) => {
                    entry.count += requested;
                    if entry.name.is_none() {
                        entry.name = name;
                    }
                }
                None => {
                    positions.insert(product_id.clone(), ranking.len());
                    ranking.push(RankedProduct {
                        product_id,
                        name,
                        count: requested,
                    });
                }
            }
        }
    }

    // Stable sort keeps first-seen order among equal counts.
    ranking.sort_by(|a, b| b.count.cmp(&a.count));
    ranking.truncate(RANKING_LIMIT);

    MetricsSnapshot {
        active_users: u64::try_from(users.len()).unwrap_or(u64::MAX),
        total_value,
        ranking,
    }
}
