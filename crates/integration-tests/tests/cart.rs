//! Cart reconciliation against a fake shop API.

#![allow(clippy::unwrap_used)]

use std::str::FromStr;
use std::time::Duration;

use axum::http::Method;
use mangaverse_core::{CartItemId, ProductId};
use mangaverse_integration_tests::{Canned, FakeApi, user_token};
use mangaverse_storefront::ApiError;
use mangaverse_storefront::services::cart::{CartError, QuantityUpdate};
use rust_decimal::Decimal;
use serde_json::json;

fn cart_body() -> serde_json::Value {
    json!({
        "_id": "c1",
        "itens": [
            { "_id": "i1", "produtoId": "p1", "nome": "Berserk vol. 1", "precoUnitario": 10, "quantidade": 1 },
            { "_id": "i2", "produtoId": "p2", "nome": "Vagabond vol. 3", "precoUnitario": "7.50", "quantidade": 2 }
        ]
    })
}

fn item(id: &str) -> CartItemId {
    CartItemId::new(id)
}

async fn loaded(api: &FakeApi) -> mangaverse_storefront::services::cart::CartReconciler {
    api.on(Method::GET, "/carrinho", Canned::ok(cart_body()));
    let (state, _) = api.state(Some(&user_token()));
    let cart = state.cart();
    cart.load().await.unwrap();
    cart
}

// ============================================================================
// Loading
// ============================================================================

#[tokio::test]
async fn test_load_object_shape_keeps_cart_id_and_total() {
    let api = FakeApi::start().await;
    let cart = loaded(&api).await;

    assert_eq!(cart.cart_id().await.map(|id| id.to_string()).as_deref(), Some("c1"));
    assert_eq!(cart.total().await, Decimal::from_str("25.00").unwrap());

    let sent = api.requests_to(&Method::GET, "/carrinho");
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent.first().and_then(|r| r.authorization.clone()),
        Some(format!("Bearer {}", user_token()))
    );
}

#[tokio::test]
async fn test_load_bare_array_has_no_cart_id() {
    let api = FakeApi::start().await;
    api.on(
        Method::GET,
        "/carrinho",
        Canned::ok(json!([
            { "_id": "i1", "nome": "Berserk vol. 1", "precoUnitario": 10, "quantidade": 1 },
            { "produtoId": "p2", "nome": "Vagabond vol. 3", "precoUnitario": 7.5, "quantidade": 2 },
            { "nome": "No id at all", "precoUnitario": 99, "quantidade": 1 }
        ])),
    );
    let (state, _) = api.state(Some(&user_token()));
    let cart = state.cart();

    let loaded = cart.load().await.unwrap();

    assert_eq!(loaded.id, None);
    assert_eq!(loaded.items.len(), 2);
    assert_eq!(cart.total().await, Decimal::from(25));
}

#[tokio::test]
async fn test_filter_ignores_case() {
    let api = FakeApi::start().await;
    let cart = loaded(&api).await;

    let hits = cart.filtered("BERSERK").await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits.first().map(|i| i.id.to_string()).as_deref(), Some("i1"));
}

// ============================================================================
// Quantity changes
// ============================================================================

#[tokio::test]
async fn test_quantity_change_sends_put_and_keeps_value() {
    let api = FakeApi::start().await;
    let cart = loaded(&api).await;
    api.on(Method::PUT, "/carrinho/i1", Canned::ok(json!({})));

    let result = cart.set_quantity(&item("i1"), 3).await.unwrap();

    assert_eq!(result, QuantityUpdate::Applied(3));
    assert_eq!(cart.snapshot().await.item(&item("i1")).map(|i| i.quantity), Some(3));
    let sent = api.requests_to(&Method::PUT, "/carrinho/i1");
    assert_eq!(sent.first().map(|r| r.json.clone()), Some(json!({ "quantidade": 3 })));
}

#[tokio::test]
async fn test_non_positive_quantity_sends_nothing() {
    let api = FakeApi::start().await;
    let cart = loaded(&api).await;

    assert_eq!(cart.set_quantity(&item("i1"), 0).await.unwrap(), QuantityUpdate::Ignored);
    assert_eq!(cart.set_quantity(&item("i1"), -4).await.unwrap(), QuantityUpdate::Ignored);
    // At 1, decrementing would reach 0.
    assert_eq!(cart.decrement(&item("i1")).await.unwrap(), QuantityUpdate::Ignored);

    assert_eq!(api.count(&Method::PUT, "/carrinho/i1"), 0);
    assert_eq!(cart.snapshot().await.item(&item("i1")).map(|i| i.quantity), Some(1));
}

#[tokio::test]
async fn test_rejected_quantity_rolls_back_with_server_message() {
    let api = FakeApi::start().await;
    let cart = loaded(&api).await;
    api.on(
        Method::PUT,
        "/carrinho/i2",
        Canned::json(400, json!({ "mensagem": "Estoque insuficiente" })),
    );

    let err = cart.increment(&item("i2")).await.unwrap_err();

    match &err {
        CartError::Rejected { restored_to, .. } => assert_eq!(*restored_to, Some(2)),
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(err.user_message(), "Estoque insuficiente");
    assert_eq!(cart.snapshot().await.item(&item("i2")).map(|i| i.quantity), Some(2));
    assert_eq!(cart.total().await, Decimal::from(25));
}

#[tokio::test]
async fn test_rejection_without_message_uses_fallback() {
    let api = FakeApi::start().await;
    let cart = loaded(&api).await;
    api.on(Method::PUT, "/carrinho/i1", Canned::json(500, json!({})));

    let err = cart.set_quantity(&item("i1"), 5).await.unwrap_err();

    assert_eq!(err.user_message(), "Failed to update quantity");
}

#[tokio::test]
async fn test_slow_older_failure_does_not_undo_newer_success() {
    let api = FakeApi::start().await;
    let cart = loaded(&api).await;
    api.once(
        Method::PUT,
        "/carrinho/i1",
        Canned::json(500, json!({ "mensagem": "late failure" })).after(Duration::from_millis(300)),
    );
    api.once(Method::PUT, "/carrinho/i1", Canned::ok(json!({})));

    let older = {
        let cart = cart.clone();
        tokio::spawn(async move { cart.set_quantity(&CartItemId::new("i1"), 2).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let newer = cart.set_quantity(&item("i1"), 3).await.unwrap();
    let older = older.await.unwrap().unwrap();

    assert_eq!(newer, QuantityUpdate::Applied(3));
    assert_eq!(older, QuantityUpdate::Superseded);
    assert_eq!(cart.snapshot().await.item(&item("i1")).map(|i| i.quantity), Some(3));
    assert_eq!(api.count(&Method::PUT, "/carrinho/i1"), 2);
}

#[tokio::test]
async fn test_shutdown_cancels_in_flight_update() {
    let api = FakeApi::start().await;
    let cart = loaded(&api).await;
    api.on(
        Method::PUT,
        "/carrinho/i1",
        Canned::ok(json!({})).after(Duration::from_secs(5)),
    );

    let pending = {
        let cart = cart.clone();
        tokio::spawn(async move { cart.set_quantity(&CartItemId::new("i1"), 4).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    cart.shutdown();

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        CartError::Rejected {
            restored_to: Some(1),
            source: ApiError::Cancelled,
            ..
        }
    ));
    assert!(cart.is_shut_down());
}

#[tokio::test]
async fn test_unknown_item_is_rejected_locally() {
    let api = FakeApi::start().await;
    let cart = loaded(&api).await;

    let err = cart.set_quantity(&item("missing"), 2).await.unwrap_err();

    assert!(matches!(err, CartError::ItemNotFound(_)));
    assert_eq!(api.count(&Method::PUT, "/carrinho/missing"), 0);
}

// ============================================================================
// Removing and adding
// ============================================================================

#[tokio::test]
async fn test_remove_calls_cart_scoped_endpoint() {
    let api = FakeApi::start().await;
    let cart = loaded(&api).await;
    api.on(Method::DELETE, "/carrinho/c1/item/i2", Canned::ok(json!({})));

    cart.remove_item(&item("i2")).await.unwrap();

    assert_eq!(api.count(&Method::DELETE, "/carrinho/c1/item/i2"), 1);
    assert!(cart.snapshot().await.item(&item("i2")).is_none());
    assert_eq!(cart.total().await, Decimal::from(10));
}

#[tokio::test]
async fn test_failed_remove_keeps_item() {
    let api = FakeApi::start().await;
    let cart = loaded(&api).await;
    api.on(Method::DELETE, "/carrinho/c1/item/i2", Canned::json(500, json!({})));

    let err = cart.remove_item(&item("i2")).await.unwrap_err();

    assert_eq!(err.user_message(), "Failed to remove item");
    assert!(cart.snapshot().await.item(&item("i2")).is_some());
}

#[tokio::test]
async fn test_remove_without_cart_id_sends_nothing() {
    let api = FakeApi::start().await;
    api.on(
        Method::GET,
        "/carrinho",
        Canned::ok(json!([{ "_id": "i1", "nome": "Berserk vol. 1", "precoUnitario": 10, "quantidade": 1 }])),
    );
    let (state, _) = api.state(Some(&user_token()));
    let cart = state.cart();
    cart.load().await.unwrap();

    let err = cart.remove_item(&item("i1")).await.unwrap_err();

    assert!(matches!(err, CartError::CartNotFound));
    assert_eq!(err.user_message(), "Cart not found");
    assert!(api.requests().iter().all(|r| r.method != Method::DELETE));
}

#[tokio::test]
async fn test_add_product_posts_one_unit() {
    let api = FakeApi::start().await;
    api.on(Method::POST, "/carrinho", Canned::json(201, json!({ "_id": "c1" })));
    let (state, _) = api.state(Some(&user_token()));

    state.cart().add_product(&ProductId::new("p9")).await.unwrap();

    let sent = api.requests_to(&Method::POST, "/carrinho");
    assert_eq!(
        sent.first().map(|r| r.json.clone()),
        Some(json!({ "produtoId": "p9", "quantidade": 1 }))
    );
}
