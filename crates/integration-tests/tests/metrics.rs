//! Admin dashboard metrics: direct endpoints, listing fallback, polling.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use axum::http::Method;
use mangaverse_integration_tests::{Canned, FakeApi, admin_token};
use mangaverse_storefront::services::metrics::{MetricsError, MetricsSource, UNAVAILABLE_MESSAGE};
use mangaverse_storefront::token::TokenStore;
use mangaverse_storefront::{ApiError, AppState};
use rust_decimal::Decimal;
use serde_json::json;

fn listing() -> serde_json::Value {
    json!([
        {
            "_id": "c1",
            "usuarioId": "u1",
            "itens": [
                { "produtoId": "p1", "nome": "Berserk vol. 1", "precoUnitario": 10, "quantidade": 2 },
                { "produtoId": "p2", "nome": "Vagabond vol. 3", "precoUnitario": "5.50", "quantidade": 1 }
            ]
        },
        {
            "_id": "c2",
            "usuarioId": "u2",
            "itens": [{ "produtoId": "p2", "precoUnitario": 5.5, "quantidade": 3 }]
        },
        { "_id": "c3", "usuarioId": "u3", "itens": [] }
    ])
}

fn admin_state(api: &FakeApi) -> AppState {
    api.state(Some(&admin_token())).0
}

#[tokio::test]
async fn test_direct_endpoint_wins() {
    let api = FakeApi::start().await;
    api.on(
        Method::GET,
        "/carrinhos/metrics",
        Canned::ok(json!({
            "activeUsers": 4,
            "totalValue": 120.5,
            "ranking": [{ "produtoId": "p1", "nome": "Berserk vol. 1", "count": 7 }]
        })),
    );
    let state = admin_state(&api);

    let snapshot = state.metrics().refresh().await.unwrap();

    assert_eq!(snapshot.active_users, 4);
    assert_eq!(snapshot.total_value, Decimal::new(1205, 1));
    assert_eq!(snapshot.ranking.first().map(|r| r.count), Some(7));

    let published = state.metrics().state();
    assert_eq!(published.source, Some(MetricsSource::Direct));
    assert_eq!(published.source_path.as_deref(), Some("/carrinhos/metrics"));
    assert!(published.error.is_none());
    assert!(!published.loading);

    // The first direct path was tried, the listing never was.
    assert_eq!(api.count(&Method::GET, "/admin/carrinhos/metrics"), 1);
    assert_eq!(api.count(&Method::GET, "/admin/carrinhos"), 0);
}

#[tokio::test]
async fn test_direct_body_that_is_not_an_object_falls_through() {
    let api = FakeApi::start().await;
    api.on(Method::GET, "/admin/carrinhos/metrics", Canned::ok(json!([1, 2, 3])));
    api.on(Method::GET, "/admin/carrinhos", Canned::ok(listing()));
    let state = admin_state(&api);

    state.metrics().refresh().await.unwrap();

    assert_eq!(state.metrics().state().source, Some(MetricsSource::Aggregated));
}

#[tokio::test]
async fn test_listing_is_aggregated_when_no_direct_endpoint_answers() {
    let api = FakeApi::start().await;
    api.on(Method::GET, "/admin/carrinhos", Canned::json(500, json!({})));
    api.on(Method::GET, "/carrinhos", Canned::ok(listing()));
    let state = admin_state(&api);

    let snapshot = state.metrics().refresh().await.unwrap();

    assert_eq!(snapshot.active_users, 2);
    // 10*2 + 5.5*1 + 5.5*3
    assert_eq!(snapshot.total_value, Decimal::new(420, 1));
    let ranking: Vec<(String, u64)> = snapshot
        .ranking
        .iter()
        .map(|r| (r.product_id.to_string(), r.count))
        .collect();
    assert_eq!(ranking, vec![("p2".to_string(), 4), ("p1".to_string(), 2)]);
    assert_eq!(
        snapshot.ranking.first().and_then(|r| r.name.as_deref()),
        Some("Vagabond vol. 3")
    );

    let published = state.metrics().state();
    assert_eq!(published.source, Some(MetricsSource::Aggregated));
    assert_eq!(published.source_path.as_deref(), Some("/carrinhos"));
}

#[tokio::test]
async fn test_total_failure_keeps_stale_numbers() {
    let api = FakeApi::start().await;
    api.once(Method::GET, "/admin/carrinhos", Canned::ok(listing()));
    let state = admin_state(&api);
    let first = state.metrics().refresh().await.unwrap();

    let err = state.metrics().refresh().await.unwrap_err();

    assert!(matches!(err, MetricsError::Unavailable));
    let published = state.metrics().state();
    assert_eq!(published.snapshot, first);
    assert_eq!(published.error.as_deref(), Some(UNAVAILABLE_MESSAGE));
    assert!(!published.loading);
}

#[tokio::test]
async fn test_rejected_session_stops_the_fallback() {
    let api = FakeApi::start().await;
    api.on(Method::GET, "/admin/carrinhos/metrics", Canned::json(401, json!({})));
    let (state, tokens) = api.state(Some(&admin_token()));

    let err = state.metrics().refresh().await.unwrap_err();

    assert!(matches!(err, MetricsError::Api(ApiError::Unauthorized { .. })));
    assert_eq!(api.requests().len(), 1);
    assert!(tokens.load().is_none());
}

#[tokio::test]
async fn test_overlapping_refresh_is_refused() {
    let api = FakeApi::start().await;
    api.on(
        Method::GET,
        "/admin/carrinhos/metrics",
        Canned::ok(json!({ "activeUsers": 1 })).after(Duration::from_millis(300)),
    );
    let state = admin_state(&api);

    let running = {
        let metrics = state.metrics().clone();
        tokio::spawn(async move { metrics.refresh().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(state.metrics().state().loading);
    let second = state.metrics().refresh().await;
    assert!(matches!(second, Err(MetricsError::AlreadyRefreshing)));
    assert!(running.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_poller_refreshes_on_start_and_on_focus() {
    let api = FakeApi::start().await;
    api.on(Method::GET, "/admin/carrinhos/metrics", Canned::ok(json!({ "activeUsers": 2 })));
    let state = admin_state(&api);
    let mut updates = state.metrics().subscribe();
    let cancel = state.shutdown_token();

    let (poller, focus) = state.metrics().spawn_poller(Duration::from_secs(3600), cancel.clone());

    tokio::time::timeout(Duration::from_secs(5), updates.wait_for(|s| s.refreshed_at.is_some()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(api.count(&Method::GET, "/admin/carrinhos/metrics"), 1);

    // A trigger landing before the poller drains its queue is dropped, so
    // keep nudging.
    tokio::time::timeout(Duration::from_secs(5), async {
        while api.count(&Method::GET, "/admin/carrinhos/metrics") < 2 {
            focus.notify();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), poller).await.unwrap().unwrap();
}
