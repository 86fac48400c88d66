//! Application state shared by every front-end command.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::api::ApiClient;
use crate::config::StorefrontConfig;
use crate::error::ApiError;
use crate::guard::SessionGuard;
use crate::payments::StripeGateway;
use crate::services::auth::AuthService;
use crate::services::cart::CartReconciler;
use crate::services::catalog::Catalog;
use crate::services::checkout::CheckoutBridge;
use crate::services::metrics::MetricsAggregator;
use crate::services::profile::ProfileService;
use crate::token::{FileTokenStore, TokenStore};

/// Application state.
///
/// This struct is cheaply cloneable via `Arc`; every clone shares the HTTP
/// connection pool, token store, catalog cache and lifecycle.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    api: ApiClient,
    guard: SessionGuard,
    auth: AuthService,
    catalog: Catalog,
    metrics: MetricsAggregator,
    profile: ProfileService,
    checkout: CheckoutBridge<StripeGateway>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.inner.config)
            .field("api", &self.inner.api)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// State backed by the token file named in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, ApiError> {
        let tokens: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(&config.token_path));
        Self::with_tokens(config, tokens)
    }

    /// State backed by an arbitrary token store.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_tokens(config: StorefrontConfig, tokens: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config, Arc::clone(&tokens))?;
        let gateway = StripeGateway::from_config(&config.payments, config.request_timeout)
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                guard: SessionGuard::new(tokens),
                auth: AuthService::new(api.clone()),
                catalog: Catalog::new(api.clone(), config.catalog_cache_ttl),
                metrics: MetricsAggregator::new(api.clone()),
                profile: ProfileService::new(api.clone()),
                checkout: CheckoutBridge::new(api.clone(), gateway),
                shutdown: CancellationToken::new(),
                api,
                config,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    #[must_use]
    pub fn guard(&self) -> &SessionGuard {
        &self.inner.guard
    }

    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.inner.auth
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    #[must_use]
    pub fn metrics(&self) -> &MetricsAggregator {
        &self.inner.metrics
    }

    #[must_use]
    pub fn profile(&self) -> &ProfileService {
        &self.inner.profile
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutBridge<StripeGateway> {
        &self.inner.checkout
    }

    /// A fresh cart mirror that stops when the state shuts down.
    #[must_use]
    pub fn cart(&self) -> CartReconciler {
        CartReconciler::with_cancellation(self.inner.api.clone(), self.inner.shutdown.child_token())
    }

    /// Token cancelled by [`AppState::shutdown`].
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    /// Cancel every in-flight request and background task.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }
}
