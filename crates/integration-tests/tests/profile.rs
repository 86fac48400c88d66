//! Profile loading and avatar upload across the known endpoints.

#![allow(clippy::unwrap_used)]

use axum::http::Method;
use mangaverse_integration_tests::{Canned, FakeApi, user_token};
use mangaverse_storefront::ApiError;
use mangaverse_storefront::services::profile::{AvatarFile, ProfileError};
use serde_json::json;

fn avatar() -> AvatarFile {
    AvatarFile {
        file_name: "me.png".to_string(),
        mime: "image/png".to_string(),
        bytes: b"\x89PNG fake image".to_vec(),
    }
}

#[tokio::test]
async fn test_profile_comes_from_first_endpoint_that_answers() {
    let api = FakeApi::start().await;
    api.on(Method::GET, "/me", Canned::json(500, json!({})));
    api.on(Method::GET, "/usuario/me", Canned::ok(json!("not an object")));
    api.on(
        Method::GET,
        "/usuarios/me",
        Canned::ok(json!({ "_id": "u1", "nome": "Renata", "email": "renata@mangaverse.test", "avatarUrl": "/uploads/u1.png" })),
    );
    let (state, _) = api.state(Some(&user_token()));

    let profile = state.profile().load().await.unwrap();

    assert_eq!(profile.display_name(), "Renata");
    let base = api.url().to_string();
    assert_eq!(
        state.profile().avatar_url(&profile),
        Some(format!("{}/uploads/u1.png", base.trim_end_matches('/')))
    );
    assert_eq!(api.count(&Method::GET, "/user/me"), 0);
}

#[tokio::test]
async fn test_profile_unavailable_everywhere() {
    let api = FakeApi::start().await;
    let (state, _) = api.state(Some(&user_token()));

    let err = state.profile().load().await.unwrap_err();

    assert!(matches!(err, ProfileError::Unavailable));
    assert_eq!(err.user_message(), "Could not load profile data.");
    assert_eq!(api.requests().len(), 5);
}

#[tokio::test]
async fn test_rejected_session_stops_profile_fallback() {
    let api = FakeApi::start().await;
    api.on(Method::GET, "/me", Canned::json(401, json!({})));
    let (state, _) = api.state(Some(&user_token()));

    let err = state.profile().load().await.unwrap_err();

    assert!(matches!(err, ProfileError::Api(ApiError::Unauthorized { .. })));
    assert_eq!(api.requests().len(), 1);
}

#[tokio::test]
async fn test_avatar_upload_falls_back_and_reloads_profile() {
    let api = FakeApi::start().await;
    api.on(Method::POST, "/usuarios/avatar", Canned::ok(json!({ "avatarUrl": "https://cdn.mangaverse.test/u1.png" })));
    api.on(Method::GET, "/me", Canned::ok(json!({ "nome": "Renata" })));
    let (state, _) = api.state(Some(&user_token()));

    let uploaded = state.profile().upload_avatar(&avatar()).await.unwrap();

    assert_eq!(uploaded.path, "/usuarios/avatar");
    assert_eq!(uploaded.avatar_url.as_deref(), Some("https://cdn.mangaverse.test/u1.png"));
    assert_eq!(uploaded.profile.map(|p| p.display_name().to_string()).as_deref(), Some("Renata"));

    assert_eq!(api.count(&Method::POST, "/perfil/avatar"), 1);
    let sent = api.requests_to(&Method::POST, "/usuarios/avatar");
    let sent = sent.first().unwrap();
    assert!(
        sent.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("multipart/form-data"))
    );
    assert!(sent.text.contains("name=\"avatar\""));
    assert!(sent.text.contains("filename=\"me.png\""));
    assert_eq!(api.count(&Method::POST, "/user/avatar"), 0);
}

#[tokio::test]
async fn test_avatar_url_falls_back_to_reloaded_profile() {
    let api = FakeApi::start().await;
    api.on(Method::POST, "/perfil/avatar", Canned::ok(json!({ "ok": true })));
    api.on(Method::GET, "/me", Canned::ok(json!({ "nome": "Renata", "avatarUrl": "uploads/u1.png" })));
    let (state, _) = api.state(Some(&user_token()));

    let uploaded = state.profile().upload_avatar(&avatar()).await.unwrap();

    let base = api.url().to_string();
    assert_eq!(
        uploaded.avatar_url,
        Some(format!("{}/uploads/u1.png", base.trim_end_matches('/')))
    );
}

#[tokio::test]
async fn test_avatar_refused_everywhere() {
    let api = FakeApi::start().await;
    let (state, _) = api.state(Some(&user_token()));

    let err = state.profile().upload_avatar(&avatar()).await.unwrap_err();

    assert!(matches!(err, ProfileError::UploadFailed));
    assert_eq!(err.user_message(), "Could not upload the avatar.");
    assert_eq!(api.requests().len(), 4);
}
