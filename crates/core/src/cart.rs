//! Local mirror of the signed-in user's cart.
//!
//! `GET /carrinho` answers in one of two shapes: an object carrying the cart
//! id and its `itens`, or a bare array of items. Items are denormalized
//! snapshots of products and are normalized leniently, since older records on
//! the server miss fields or store numbers as strings.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::types::price::{lenient_count, lenient_decimal};
use crate::types::wire::{lenient_id, lenient_text};
use crate::types::{CartId, CartItemId, ProductId};

/// Name shown for items whose snapshot lost its product name.
pub const UNNAMED_PRODUCT: &str = "Unnamed product";

/// Cart item exactly as the API sends it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireCartItem {
    #[serde(rename = "_id", default)]
    pub id: Option<Value>,
    #[serde(rename = "produtoId", default)]
    pub product_id: Option<Value>,
    #[serde(rename = "nome", default)]
    pub name: Option<Value>,
    #[serde(rename = "precoUnitario", default)]
    pub unit_price: Option<Value>,
    #[serde(rename = "descricao", default)]
    pub description: Option<Value>,
    #[serde(rename = "urlfoto", default)]
    pub photo_url: Option<Value>,
    #[serde(rename = "quantidade", default)]
    pub quantity: Option<Value>,
}

/// Either response shape of `GET /carrinho`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CartResponse {
    /// `{ "_id": ..., "itens": [...] }`
    Cart {
        #[serde(rename = "_id", default)]
        id: Option<Value>,
        #[serde(rename = "itens")]
        items: Vec<WireCartItem>,
    },
    /// `[...]` with no cart id.
    Items(Vec<WireCartItem>),
}

/// Product data copied into a cart item when it was added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSnapshot {
    pub id: Option<ProductId>,
    pub name: String,
    pub price: Decimal,
    pub description: String,
    pub photo_url: String,
}

/// One line of the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartItem {
    pub id: CartItemId,
    pub product: ProductSnapshot,
    /// Always at least 1.
    pub quantity: u32,
}

impl CartItem {
    /// Normalize a wire item.
    ///
    /// The item id falls back to the product id; an item with neither cannot
    /// be addressed by later requests and yields `None`. Missing names read as
    /// [`UNNAMED_PRODUCT`], unparseable prices as zero, and absent, zero or
    /// non-numeric quantities as 1.
    #[must_use]
    pub fn from_wire(wire: WireCartItem) -> Option<Self> {
        let product_id = wire.product_id.as_ref().and_then(lenient_id);
        let id = wire.id.as_ref().and_then(lenient_id).or_else(|| product_id.clone())?;

        let quantity = wire
            .quantity
            .as_ref()
            .and_then(lenient_count)
            .and_then(|q| u32::try_from(q).ok())
            .filter(|q| *q > 0)
            .unwrap_or(1);

        Some(Self {
            id: CartItemId::new(id),
            product: ProductSnapshot {
                id: product_id.map(ProductId::new),
                name: wire
                    .name
                    .as_ref()
                    .and_then(lenient_text)
                    .unwrap_or_else(|| UNNAMED_PRODUCT.to_owned()),
                price: wire
                    .unit_price
                    .as_ref()
                    .and_then(lenient_decimal)
                    .unwrap_or(Decimal::ZERO),
                description: wire.description.as_ref().and_then(lenient_text).unwrap_or_default(),
                photo_url: wire.photo_url.as_ref().and_then(lenient_text).unwrap_or_default(),
            },
            quantity,
        })
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.product.price * Decimal::from(self.quantity)
    }
}

/// The signed-in user's cart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    /// Unknown when the API answered with a bare item array.
    pub id: Option<CartId>,
    pub items: Vec<CartItem>,
}

impl Cart {
    /// Build the local mirror from either response shape.
    #[must_use]
    pub fn from_response(response: CartResponse) -> Self {
        let (id, items) = match response {
            CartResponse::Cart { id, items } => (id.as_ref().and_then(lenient_id).map(CartId::new), items),
            CartResponse::Items(items) => (None, items),
        };

        Self {
            id,
            items: items.into_iter().filter_map(CartItem::from_wire).collect(),
        }
    }

    /// Sum of price times quantity over every item. Never stored.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Items whose product name contains `query`, ignoring case and
    /// surrounding whitespace. A blank query matches everything.
    #[must_use]
    pub fn filtered(&self, query: &str) -> Vec<&CartItem> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.items.iter().collect();
        }
        self.items
            .iter()
            .filter(|item| item.product.name.to_lowercase().contains(&needle))
            .collect()
    }

    #[must_use]
    pub fn item(&self, id: &CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    /// Overwrite an item's quantity, returning the previous one.
    pub fn set_quantity(&mut self, id: &CartItemId, quantity: u32) -> Option<u32> {
        let item = self.items.iter_mut().find(|item| &item.id == id)?;
        Some(std::mem::replace(&mut item.quantity, quantity))
    }

    /// Drop an item from the mirror.
    pub fn remove(&mut self, id: &CartItemId) -> Option<CartItem> {
        let index = self.items.iter().position(|item| &item.id == id)?;
        Some(self.items.remove(index))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Cart {
        Cart::from_response(serde_json::from_value(value).unwrap())
    }

    #[test]
    fn test_total_of_two_items() {
        let cart = parse(json!({
            "_id": "c1",
            "itens": [
                { "_id": "i1", "produtoId": "p1", "nome": "One Piece", "precoUnitario": 10, "quantidade": 2 },
                { "_id": "i2", "produtoId": "p2", "nome": "Naruto", "precoUnitario": 5, "quantidade": 1 }
            ]
        }));

        assert_eq!(cart.id, Some(CartId::new("c1")));
        assert_eq!(cart.total(), Decimal::new(25, 0));
        assert_eq!(format!("{:.2}", cart.total()), "25.00");
    }

    #[test]
    fn test_bare_array_has_no_cart_id() {
        let cart = parse(json!([
            { "produtoId": "p1", "nome": "Monster", "precoUnitario": "12.50", "quantidade": "3" }
        ]));

        assert_eq!(cart.id, None);
        let item = &cart.items[0];
        assert_eq!(item.id.as_str(), "p1");
        assert_eq!(item.quantity, 3);
        assert_eq!(item.line_total(), Decimal::new(3750, 2));
    }

    #[test]
    fn test_normalization_defaults() {
        let cart = parse(json!({
            "_id": "c1",
            "itens": [
                { "_id": "i1", "nome": "", "precoUnitario": "abc", "quantidade": 0 },
                { "nome": "no ids at all", "quantidade": 4 }
            ]
        }));

        assert_eq!(cart.items.len(), 1);
        let item = &cart.items[0];
        assert_eq!(item.product.name, UNNAMED_PRODUCT);
        assert_eq!(item.product.price, Decimal::ZERO);
        assert_eq!(item.quantity, 1);
        assert_eq!(item.product.id, None);
    }

    #[test]
    fn test_numeric_ids_do_not_break_decoding() {
        let cart = parse(json!({
            "_id": 7,
            "itens": [
                { "_id": 11, "produtoId": 42, "nome": 5, "precoUnitario": 10, "quantidade": 2 },
                { "produtoId": { "_id": "p9" }, "nome": "Monster", "quantidade": 1 }
            ]
        }));

        assert_eq!(cart.id.as_ref().map(CartId::as_str), Some("7"));
        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.items[0].id.as_str(), "11");
        assert_eq!(cart.items[0].product.id.as_ref().map(ProductId::as_str), Some("42"));
        assert_eq!(cart.items[0].product.name, UNNAMED_PRODUCT);
        assert_eq!(cart.items[1].id.as_str(), "p9");
        assert_eq!(cart.total(), Decimal::from(20));
    }

    #[test]
    fn test_filtered_is_case_insensitive_and_trims() {
        let cart = parse(json!([
            { "_id": "i1", "nome": "Dragon Ball", "quantidade": 1 },
            { "_id": "i2", "nome": "Death Note", "quantidade": 1 },
            { "_id": "i3", "nome": "Bleach", "quantidade": 1 }
        ]));

        let hits: Vec<_> = cart.filtered("  DEATH ").iter().map(|i| i.id.as_str()).collect();
        assert_eq!(hits, ["i2"]);
        assert_eq!(cart.filtered("").len(), 3);
        assert!(cart.filtered("berserk").is_empty());
    }

    #[test]
    fn test_set_quantity_and_remove() {
        let mut cart = parse(json!([{ "_id": "i1", "nome": "Akira", "quantidade": 2 }]));
        let id = CartItemId::new("i1");

        assert_eq!(cart.set_quantity(&id, 5), Some(2));
        assert_eq!(cart.item(&id).unwrap().quantity, 5);
        assert_eq!(cart.set_quantity(&CartItemId::new("nope"), 1), None);

        assert!(cart.remove(&id).is_some());
        assert!(cart.is_empty());
        assert_eq!(cart.total(), Decimal::ZERO);
    }
}
