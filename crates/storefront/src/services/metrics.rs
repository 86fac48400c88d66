//! Admin dashboard metrics.
//!
//! A refresh asks the server for precomputed metrics first. When no metrics
//! endpoint answers, it lists every cart and reduces them locally with
//! [`mangaverse_core::metrics::aggregate`]. When neither works the dashboard
//! keeps its previous numbers and shows an error.
//!
//! State is published on a `tokio::sync::watch` channel so a front end can
//! redraw whenever it changes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use mangaverse_core::metrics::aggregate;
use mangaverse_core::{CartRecord, MetricsSnapshot};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::api::ApiClient;
use crate::error::ApiError;

/// Endpoints serving precomputed metrics, in order of preference.
pub const DIRECT_PATHS: [&str; 3] = ["/admin/carrinhos/metrics", "/carrinhos/metrics", "/carrinho/metrics"];

/// Endpoints listing every cart, in order of preference.
pub const LISTING_PATHS: [&str; 3] = ["/admin/carrinhos", "/carrinhos", "/carrinho/todos"];

/// Shown when neither family of endpoints answered.
pub const UNAVAILABLE_MESSAGE: &str = "Could not load cart metrics (check the API).";

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("a refresh is already in progress")]
    AlreadyRefreshing,

    #[error("no metrics endpoint answered")]
    Unavailable,

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl MetricsError {
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::AlreadyRefreshing | Self::Unavailable => UNAVAILABLE_MESSAGE.to_string(),
            Self::Api(e) => e.user_message(UNAVAILABLE_MESSAGE),
        }
    }
}

/// Where the current numbers came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsSource {
    /// A metrics endpoint computed them.
    Direct,
    /// They were reduced from the cart listing.
    Aggregated,
}

/// Everything the dashboard shows.
#[derive(Debug, Clone, Default)]
pub struct MetricsState {
    /// Last good numbers. Stale when `error` is set.
    pub snapshot: MetricsSnapshot,
    pub loading: bool,
    pub error: Option<String>,
    pub source: Option<MetricsSource>,
    /// Endpoint that served the last good numbers.
    pub source_path: Option<String>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// Wakes the poller early, the way regaining window focus does.
#[derive(Debug, Clone)]
pub struct FocusTrigger(mpsc::Sender<()>);

impl FocusTrigger {
    /// Request a refresh. Does nothing if one is already queued.
    pub fn notify(&self) {
        if self.0.try_send(()).is_err() {
            debug!("Focus refresh already queued");
        }
    }
}

/// Loads and publishes dashboard metrics.
#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    inner: Arc<AggregatorInner>,
}

#[derive(Debug)]
struct AggregatorInner {
    api: ApiClient,
    state: watch::Sender<MetricsState>,
    refreshing: AtomicBool,
}

/// Clears the in-progress markers however a refresh ends.
struct RefreshGuard<'a>(&'a AggregatorInner);

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.state.send_modify(|s| s.loading = false);
        self.0.refreshing.store(false, Ordering::Release);
    }
}

impl MetricsAggregator {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        let (state, _) = watch::channel(MetricsState::default());
        Self {
            inner: Arc::new(AggregatorInner {
                api,
                state,
                refreshing: AtomicBool::new(false),
            }),
        }
    }

    /// Receiver that sees every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<MetricsState> {
        self.inner.state.subscribe()
    }

    /// Copy of the current state.
    #[must_use]
    pub fn state(&self) -> MetricsState {
        self.inner.state.borrow().clone()
    }

    /// Fetch fresh metrics and publish them.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::AlreadyRefreshing` when another refresh is
    /// running, `MetricsError::Unavailable` when no endpoint answered, and
    /// `MetricsError::Api` when the session was rejected. On error the
    /// published snapshot keeps its previous values.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<MetricsSnapshot, MetricsError> {
        if self.inner.refreshing.swap(true, Ordering::AcqRel) {
            return Err(MetricsError::AlreadyRefreshing);
        }
        let _guard = RefreshGuard(&self.inner);

        self.inner.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });

        let result = self.fetch().await;

        self.inner.state.send_modify(|s| match &result {
            Ok((source, path, snapshot)) => {
                s.snapshot = snapshot.clone();
                s.source = Some(*source);
                s.source_path = Some(path.clone());
                s.refreshed_at = Some(Utc::now());
            }
            Err(e) => s.error = Some(e.user_message()),
        });

        match result {
            Ok((source, path, snapshot)) => {
                debug!(?source, path = %path, active_users = snapshot.active_users, "Metrics refreshed");
                Ok(snapshot)
            }
            Err(e) => {
                warn!(error = %e, "Metrics refresh failed, keeping stale values");
                Err(e)
            }
        }
    }

    async fn fetch(&self) -> Result<(MetricsSource, String, MetricsSnapshot), MetricsError> {
        let api = &self.inner.api;

        if let Some((path, body)) = api.first_success(&DIRECT_PATHS, as_object).await? {
            let mut snapshot = self.inner.state.borrow().snapshot.clone();
            snapshot.apply_direct(&body);
            return Ok((MetricsSource::Direct, path, snapshot));
        }

        if let Some((path, carts)) = api.first_success(&LISTING_PATHS, as_cart_list).await? {
            return Ok((MetricsSource::Aggregated, path, aggregate(&carts)));
        }

        Err(MetricsError::Unavailable)
    }

    /// Refresh every `interval` and whenever the returned trigger fires,
    /// until `cancel` is cancelled.
    ///
    /// Triggers that arrive while a refresh is running are dropped.
    #[must_use]
    pub fn spawn_poller(&self, interval: Duration, cancel: CancellationToken) -> (JoinHandle<()>, FocusTrigger) {
        let (tx, mut rx) = mpsc::channel(1);
        let aggregator = self.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut focus_open = true;

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                    trigger = rx.recv(), if focus_open => {
                        if trigger.is_none() {
                            focus_open = false;
                            continue;
                        }
                    }
                }

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    result = aggregator.refresh() => match result {
                        Ok(_) => {}
                        Err(MetricsError::AlreadyRefreshing) => debug!("Skipping poll, refresh in progress"),
                        Err(e) => debug!(error = %e, "Poll failed"),
                    },
                }

                while rx.try_recv().is_ok() {}
            }
            debug!("Metrics poller stopped");
        });

        (handle, FocusTrigger(tx))
    }
}

fn as_object(body: Value) -> Option<Map<String, Value>> {
    match body {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn as_cart_list(body: Value) -> Option<Vec<CartRecord>> {
    match body {
        Value::Array(carts) => Some(
            carts
                .into_iter()
                .filter_map(|cart| serde_json::from_value(cart).ok())
                .collect(),
        ),
        _ => None,
    }
}
