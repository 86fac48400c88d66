//! Login, token handling and route guards.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::http::Method;
use mangaverse_integration_tests::{Canned, FakeApi, admin_token, token, user_token};
use mangaverse_storefront::error::SESSION_REJECTED_MESSAGE;
use mangaverse_storefront::services::auth::AuthError;
use mangaverse_storefront::services::cart::CartError;
use mangaverse_storefront::token::{MemoryTokenStore, TokenStore};
use mangaverse_storefront::{ApiError, AppState, GuardRejection, Route, StorefrontConfig};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

fn password() -> SecretString {
    SecretString::from("hunter2")
}

// ============================================================================
// Login and registration
// ============================================================================

#[tokio::test]
async fn test_login_stores_token_and_decodes_role() {
    let api = FakeApi::start().await;
    api.on(Method::POST, "/login", Canned::ok(json!({ "token": admin_token() })));
    let (state, tokens) = api.state(None);

    let session = state.auth().login("admin@mangaverse.test", &password()).await.unwrap();

    assert!(session.is_admin());
    assert_eq!(session.name(), Some("Admin"));
    assert_eq!(
        tokens.load().map(|t| t.expose_secret().to_string()),
        Some(admin_token())
    );

    let sent = api.requests_to(&Method::POST, "/login");
    assert_eq!(
        sent.first().map(|r| r.json.clone()),
        Some(json!({ "email": "admin@mangaverse.test", "senha": "hunter2" }))
    );
}

#[tokio::test]
async fn test_login_never_sends_bearer_header() {
    let api = FakeApi::start().await;
    api.on(Method::POST, "/login", Canned::ok(json!({ "token": user_token() })));
    let (state, _) = api.state(Some(&admin_token()));

    state.auth().login("reader@mangaverse.test", &password()).await.unwrap();

    let sent = api.requests_to(&Method::POST, "/login");
    assert_eq!(sent.first().map(|r| r.authorization.is_none()), Some(true));
}

#[tokio::test]
async fn test_rejected_login_keeps_existing_token() {
    let api = FakeApi::start().await;
    api.on(
        Method::POST,
        "/login",
        Canned::json(401, json!({ "mensagem": "Credenciais inválidas" })),
    );
    let (state, tokens) = api.state(Some(&user_token()));

    let err = state.auth().login("reader@mangaverse.test", &password()).await.unwrap_err();

    assert!(matches!(err, AuthError::Api(ApiError::Server { .. })));
    assert_eq!(err.user_message(), "Credenciais inválidas");
    assert!(tokens.load().is_some());
}

#[tokio::test]
async fn test_login_without_token_in_response() {
    let api = FakeApi::start().await;
    api.on(Method::POST, "/login", Canned::ok(json!({ "ok": true })));
    let (state, tokens) = api.state(None);

    let err = state.auth().login("reader@mangaverse.test", &password()).await.unwrap_err();

    assert!(matches!(err, AuthError::MissingToken));
    assert!(tokens.load().is_none());
}

#[tokio::test]
async fn test_invalid_email_sends_nothing() {
    let api = FakeApi::start().await;
    let (state, _) = api.state(None);

    let err = state.auth().login("not-an-email", &password()).await.unwrap_err();

    assert!(matches!(err, AuthError::InvalidEmail(_)));
    assert!(api.requests().is_empty());
}

#[tokio::test]
async fn test_register_sends_portuguese_fields() {
    let api = FakeApi::start().await;
    api.on(Method::POST, "/register", Canned::json(201, json!({})));
    let (state, tokens) = api.state(None);

    state
        .auth()
        .register("Renata", "renata@mangaverse.test", &password())
        .await
        .unwrap();

    let sent = api.requests_to(&Method::POST, "/register");
    assert_eq!(
        sent.first().map(|r| r.json.clone()),
        Some(json!({ "nome": "Renata", "email": "renata@mangaverse.test", "senha": "hunter2" }))
    );
    // Registering does not log in.
    assert!(tokens.load().is_none());
}

#[tokio::test]
async fn test_logout_clears_token() {
    let api = FakeApi::start().await;
    let (state, tokens) = api.state(Some(&user_token()));

    state.auth().logout().unwrap();

    assert!(tokens.load().is_none());
    assert!(state.guard().current().is_none());
}

// ============================================================================
// Rejected sessions
// ============================================================================

#[tokio::test]
async fn test_unauthorized_response_clears_token_and_redirects_to_login() {
    let api = FakeApi::start().await;
    api.on(Method::GET, "/carrinho", Canned::json(401, json!({ "mensagem": "jwt expired" })));
    let (state, tokens) = api.state(Some(&user_token()));

    let err = state.cart().load().await.unwrap_err();

    assert!(matches!(err, CartError::LoadFailed(ApiError::Unauthorized { .. })));
    assert_eq!(err.user_message(), SESSION_REJECTED_MESSAGE);
    assert!(tokens.load().is_none());

    let nav = err.api_error().and_then(ApiError::navigation).unwrap();
    assert_eq!(nav.route, Route::Login);
    assert_eq!(nav.message.as_deref(), Some(SESSION_REJECTED_MESSAGE));
}

#[tokio::test]
async fn test_forbidden_response_also_clears_token() {
    let api = FakeApi::start().await;
    api.on(Method::GET, "/produtos", Canned::json(403, json!({})));
    let (state, tokens) = api.state(Some(&user_token()));

    assert!(state.catalog().list().await.is_err());
    assert!(tokens.load().is_none());
}

#[tokio::test]
async fn test_unreachable_api_points_to_error_page() {
    // Nothing listens on port 9.
    let config = StorefrontConfig::for_api(&url::Url::parse("http://127.0.0.1:9").unwrap()).unwrap();
    let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::with_token(user_token()));
    let state = AppState::with_tokens(config, Arc::clone(&tokens)).unwrap();

    let err = state.cart().load().await.unwrap_err();

    assert!(matches!(err, CartError::LoadFailed(ApiError::Network(_))));
    let nav = err.api_error().and_then(ApiError::navigation).unwrap();
    assert_eq!(nav.route, Route::Error);
    // A network failure is not a rejected session.
    assert!(tokens.load().is_some());
}

// ============================================================================
// Guards
// ============================================================================

#[tokio::test]
async fn test_guard_sends_anonymous_user_to_login_with_redirect() {
    let api = FakeApi::start().await;
    let (state, _) = api.state(None);

    let rejection = state.guard().require_user(Route::Cart).unwrap_err();

    let GuardRejection::RedirectToLogin(nav) = &rejection else {
        panic!("expected login redirect, got {rejection:?}");
    };
    assert_eq!(nav.route, Route::Login);
    assert_eq!(nav.message.as_deref(), Some("Log in to access your cart."));
    assert_eq!(nav.redirect.as_deref(), Some("/carrinho"));
}

#[tokio::test]
async fn test_guard_forbids_customer_from_admin() {
    let api = FakeApi::start().await;
    let (state, _) = api.state(Some(&user_token()));

    let rejection = state.guard().require_admin(Route::Admin).unwrap_err();

    assert!(matches!(rejection, GuardRejection::Forbidden(_)));
    assert_eq!(rejection.navigation().route, Route::Home);
    assert_eq!(
        rejection.navigation().message.as_deref(),
        Some("Access restricted to administrators.")
    );
}

#[tokio::test]
async fn test_guard_treats_expired_token_as_logged_out() {
    let api = FakeApi::start().await;
    let expired = token(&json!({ "id": "u1", "role": "admin", "exp": 1_000_000_000 }));
    let (state, _) = api.state(Some(&expired));

    let rejection = state.guard().require_admin(Route::Admin).unwrap_err();

    assert!(matches!(rejection, GuardRejection::RedirectToLogin(_)));
}

#[tokio::test]
async fn test_guard_admits_admin() {
    let api = FakeApi::start().await;
    let (state, _) = api.state(Some(&admin_token()));

    let session = state.guard().require_admin(Route::Admin).unwrap();

    assert!(session.is_admin());
}
