//! Integration tests for the MangaVerse storefront client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p mangaverse-integration-tests
//! ```
//!
//! Every test starts its own [`FakeApi`] on a random local port, so no shop
//! API needs to be running. The fake answers each request from a script of
//! canned responses and records what it received.
//!
//! # Test Categories
//!
//! - `cart` - Optimistic quantity changes, rollback and races
//! - `session` - Login, token clearing and route guards
//! - `metrics` - Dashboard refresh and endpoint fallback
//! - `catalog` - Product listing cache and admin writes
//! - `checkout` - Payment intent creation and card confirmation
//! - `profile` - Profile endpoint fallback and avatar upload

#![allow(clippy::missing_panics_doc, clippy::expect_used)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use mangaverse_storefront::token::{MemoryTokenStore, TokenStore};
use mangaverse_storefront::{AppState, StorefrontConfig};
use serde_json::Value;
use tokio::task::JoinHandle;
use url::Url;

/// Publishable key accepted by the config validation.
pub const TEST_PUBLISHABLE_KEY: &str = "pk_test_51MangaVerseIntegrationKey";

/// One scripted answer.
#[derive(Debug, Clone)]
pub struct Canned {
    pub status: StatusCode,
    pub body: Value,
    pub delay: Duration,
}

impl Canned {
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status: StatusCode::from_u16(status).expect("valid status code"),
            body,
            delay: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn ok(body: Value) -> Self {
        Self::json(200, body)
    }

    #[must_use]
    pub const fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A request as the fake received it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    /// JSON body, or `Null` when the body was empty or not JSON.
    pub json: Value,
    /// Raw body as lossy UTF-8, for form and multipart bodies.
    pub text: String,
}

type RouteKey = (Method, String);

#[derive(Debug, Default)]
struct Script {
    /// Answers used once each, in order, before the sticky one.
    queued: HashMap<RouteKey, VecDeque<Canned>>,
    /// Answer repeated for every request to the route.
    sticky: HashMap<RouteKey, Canned>,
    requests: Vec<Recorded>,
}

impl Script {
    fn answer(&mut self, key: &RouteKey) -> Canned {
        if let Some(next) = self.queued.get_mut(key).and_then(VecDeque::pop_front) {
            return next;
        }
        self.sticky
            .get(key)
            .cloned()
            .unwrap_or_else(|| Canned::json(404, serde_json::json!({ "mensagem": "Not found" })))
    }
}

type Shared = Arc<Mutex<Script>>;

fn lock(script: &Shared) -> std::sync::MutexGuard<'_, Script> {
    script.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scriptable stand-in for the shop API and the payment service.
///
/// Unscripted routes answer 404 with a `mensagem` body.
pub struct FakeApi {
    addr: SocketAddr,
    script: Shared,
    server: JoinHandle<()>,
}

impl FakeApi {
    /// Bind to a random local port and start serving.
    pub async fn start() -> Self {
        let script = Shared::default();
        let app = Router::new().fallback(answer).with_state(Arc::clone(&script));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake API");
        let addr = listener.local_addr().expect("fake API address");
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake API server");
        });

        Self {
            addr,
            script,
            server,
        }
    }

    /// Base URL of the fake, e.g. `http://127.0.0.1:40123/`.
    #[must_use]
    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}/", self.addr)).expect("fake API URL")
    }

    /// Answer every `method path` request with `canned`.
    pub fn on(&self, method: Method, path: &str, canned: Canned) {
        lock(&self.script)
            .sticky
            .insert((method, path.to_string()), canned);
    }

    /// Answer the next `method path` request with `canned`, ahead of the
    /// sticky answer.
    pub fn once(&self, method: Method, path: &str, canned: Canned) {
        lock(&self.script)
            .queued
            .entry((method, path.to_string()))
            .or_default()
            .push_back(canned);
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<Recorded> {
        lock(&self.script).requests.clone()
    }

    /// Requests received for `method path`.
    #[must_use]
    pub fn requests_to(&self, method: &Method, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == *method && r.path == path)
            .collect()
    }

    #[must_use]
    pub fn count(&self, method: &Method, path: &str) -> usize {
        self.requests_to(method, path).len()
    }

    /// Configuration pointing both the shop API and the payment service at
    /// this fake.
    #[must_use]
    pub fn config(&self) -> StorefrontConfig {
        let api = self.url().to_string();
        StorefrontConfig::from_lookup(|key| match key {
            "MANGAVERSE_API_URL" | "STRIPE_API_BASE" => Some(api.clone()),
            "STRIPE_PUBLISHABLE_KEY" => Some(TEST_PUBLISHABLE_KEY.to_string()),
            _ => None,
        })
        .expect("fake API config")
    }

    /// Application state backed by an in-memory token store holding `token`.
    #[must_use]
    pub fn state(&self, token: Option<&str>) -> (AppState, Arc<MemoryTokenStore>) {
        let tokens = Arc::new(token.map_or_else(MemoryTokenStore::new, MemoryTokenStore::with_token));
        let store: Arc<dyn TokenStore> = tokens.clone();
        let state = AppState::with_tokens(self.config(), store).expect("app state");
        (state, tokens)
    }
}

impl Drop for FakeApi {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn answer(
    State(script): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header = |name| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let key = (method.clone(), uri.path().to_string());

    let canned = {
        let mut script = lock(&script);
        script.requests.push(Recorded {
            method,
            path: uri.path().to_string(),
            authorization: header(AUTHORIZATION),
            content_type: header(CONTENT_TYPE),
            json: serde_json::from_slice(&body).unwrap_or(Value::Null),
            text: String::from_utf8_lossy(&body).into_owned(),
        });
        script.answer(&key)
    };

    if !canned.delay.is_zero() {
        tokio::time::sleep(canned.delay).await;
    }
    (canned.status, axum::Json(canned.body)).into_response()
}

/// Unsigned token whose payload is `claims`. The client never checks the
/// signature.
#[must_use]
pub fn token(claims: &Value) -> String {
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).expect("claims JSON"));
    format!("eyJhbGciOiJIUzI1NiJ9.{payload}.c2lnbmF0dXJl")
}

/// Token for a customer.
#[must_use]
pub fn user_token() -> String {
    token(&serde_json::json!({ "id": "u1", "role": "user", "nome": "Renata" }))
}

/// Token for an administrator.
#[must_use]
pub fn admin_token() -> String {
    token(&serde_json::json!({ "id": "a1", "role": "admin", "nome": "Admin" }))
}
