//! Cart reconciliation.
//!
//! [`CartReconciler`] keeps a local mirror of the server cart. Quantity
//! changes are applied to the mirror immediately and confirmed afterwards; a
//! rejected change is rolled back.
//!
//! Each request gets a version from a counter. Only the latest request for an
//! item may decide what that item displays. Older requests that complete late
//! only move the item's last acknowledged quantity, which is what a failed
//! latest request falls back to.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use mangaverse_core::{Cart, CartId, CartItem, CartItemId, CartResponse, ProductId};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, instrument, warn};

use crate::api::ApiClient;
use crate::error::{ApiError, add_breadcrumb};

const CART_PATH: &str = "/carrinho";

/// Shown when a quantity change is rejected without a server message.
pub const UPDATE_FAILED_MESSAGE: &str = "Failed to update quantity";
/// Shown when removing needs a cart id the API never sent.
pub const CART_NOT_FOUND_MESSAGE: &str = "Cart not found";
const LOAD_FAILED_MESSAGE: &str = "Failed to load cart";
const REMOVE_FAILED_MESSAGE: &str = "Failed to remove item";
const ADD_FAILED_MESSAGE: &str = "Failed to add product to cart";

/// Cart errors.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("item {0} is not in the cart")]
    ItemNotFound(CartItemId),

    #[error("cart id unknown")]
    CartNotFound,

    #[error("quantity {0} is too large")]
    QuantityTooLarge(i64),

    /// The server refused a quantity change; the mirror was rolled back.
    #[error("quantity update for {item_id} rejected: {source}")]
    Rejected {
        item_id: CartItemId,
        /// Quantity the item shows after the rollback.
        restored_to: Option<u32>,
        #[source]
        source: ApiError,
    },

    #[error("failed to load cart: {0}")]
    LoadFailed(#[source] ApiError),

    #[error("failed to remove item: {0}")]
    RemoveFailed(#[source] ApiError),

    #[error("failed to add product: {0}")]
    AddFailed(#[source] ApiError),
}

impl CartError {
    /// Text to show on the cart page.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::ItemNotFound(_) => "Item not found in cart".to_string(),
            Self::CartNotFound => CART_NOT_FOUND_MESSAGE.to_string(),
            Self::QuantityTooLarge(_) => UPDATE_FAILED_MESSAGE.to_string(),
            Self::Rejected { source, .. } => source.user_message(UPDATE_FAILED_MESSAGE),
            Self::LoadFailed(e) => e.user_message(LOAD_FAILED_MESSAGE),
            Self::RemoveFailed(e) => e.user_message(REMOVE_FAILED_MESSAGE),
            Self::AddFailed(e) => e.user_message(ADD_FAILED_MESSAGE),
        }
    }

    /// The underlying API failure, if there was one.
    #[must_use]
    pub const fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Rejected { source: e, .. }
            | Self::LoadFailed(e)
            | Self::RemoveFailed(e)
            | Self::AddFailed(e) => Some(e),
            Self::ItemNotFound(_) | Self::CartNotFound | Self::QuantityTooLarge(_) => None,
        }
    }
}

/// What became of a quantity change that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityUpdate {
    /// Zero or negative quantity: nothing changed, nothing was sent.
    Ignored,
    /// The server confirmed the quantity and the item shows it.
    Applied(u32),
    /// A newer change for the same item took over while this one was in
    /// flight.
    Superseded,
}

#[derive(Serialize)]
struct QuantityRequest {
    quantidade: u32,
}

#[derive(Serialize)]
struct AddRequest<'a> {
    #[serde(rename = "produtoId")]
    produto_id: &'a str,
    quantidade: u32,
}

// =============================================================================
// Ledger
// =============================================================================

/// Request bookkeeping for one item.
#[derive(Debug, Clone, Copy)]
struct ItemVersion {
    /// Version of the most recent request.
    latest: u64,
    /// Whether the most recent request has completed.
    latest_settled: bool,
    /// Last quantity the server confirmed.
    acknowledged: u32,
    /// Version that confirmed `acknowledged`; 0 for the loaded value.
    acknowledged_version: u64,
}

/// How a completed request changed the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settlement {
    Applied(u32),
    Superseded,
    RolledBack(u32),
    /// The item left the mirror while the request was in flight.
    Gone,
}

#[derive(Debug, Default)]
struct Ledger {
    cart: Cart,
    versions: HashMap<CartItemId, ItemVersion>,
    next_version: u64,
    /// Versions at or below this were issued before the last reload.
    floor: u64,
}

impl Ledger {
    fn replace(&mut self, cart: Cart) {
        self.cart = cart;
        self.versions.clear();
        self.floor = self.next_version;
    }

    /// Apply `quantity` optimistically and issue a version for it.
    fn begin(&mut self, id: &CartItemId, quantity: u32) -> Option<u64> {
        let current = self.cart.item(id)?.quantity;

        self.next_version += 1;
        let version = self.next_version;

        let entry = self.versions.entry(id.clone()).or_insert(ItemVersion {
            latest: 0,
            latest_settled: true,
            acknowledged: current,
            acknowledged_version: 0,
        });
        entry.latest = version;
        entry.latest_settled = false;

        self.cart.set_quantity(id, quantity);
        Some(version)
    }

    /// Record the outcome of request `version`, which asked for `quantity`.
    fn settle(&mut self, id: &CartItemId, version: u64, quantity: u32, succeeded: bool) -> Settlement {
        if version <= self.floor {
            return Settlement::Superseded;
        }
        let Some(entry) = self.versions.get_mut(id) else {
            return Settlement::Gone;
        };
        if self.cart.item(id).is_none() {
            return Settlement::Gone;
        }

        let is_latest = version == entry.latest;

        if succeeded && version > entry.acknowledged_version {
            entry.acknowledged = quantity;
            entry.acknowledged_version = version;
        }

        if is_latest {
            entry.latest_settled = true;
            if succeeded {
                return Settlement::Applied(quantity);
            }
            let restored = entry.acknowledged;
            self.cart.set_quantity(id, restored);
            return Settlement::RolledBack(restored);
        }

        // A late success behind an already-settled latest request is the
        // freshest thing the server said.
        if succeeded && entry.latest_settled && entry.acknowledged_version == version {
            let acknowledged = entry.acknowledged;
            self.cart.set_quantity(id, acknowledged);
        }
        Settlement::Superseded
    }

    fn remove(&mut self, id: &CartItemId) {
        self.cart.remove(id);
        self.versions.remove(id);
    }
}

// =============================================================================
// CartReconciler
// =============================================================================

/// Local mirror of the signed-in user's cart.
///
/// Clones share the mirror and the lifecycle.
#[derive(Debug, Clone)]
pub struct CartReconciler {
    api: ApiClient,
    ledger: Arc<Mutex<Ledger>>,
    cancel: CancellationToken,
}

impl CartReconciler {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self::with_cancellation(api, CancellationToken::new())
    }

    /// A reconciler that stops when `cancel` is cancelled.
    #[must_use]
    pub fn with_cancellation(api: ApiClient, cancel: CancellationToken) -> Self {
        Self {
            api,
            ledger: Arc::new(Mutex::new(Ledger::default())),
            cancel,
        }
    }

    /// Abort every in-flight request.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Guard that shuts the reconciler down when dropped.
    #[must_use]
    pub fn lifecycle_guard(&self) -> DropGuard {
        self.cancel.clone().drop_guard()
    }

    async fn guarded<T>(&self, request: impl Future<Output = Result<T, ApiError>>) -> Result<T, ApiError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(ApiError::Cancelled),
            result = request => result,
        }
    }

    /// Replace the mirror with the server's cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LoadFailed` if the cart cannot be fetched; the
    /// mirror is left as it was.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Cart, CartError> {
        let response: CartResponse = self
            .guarded(self.api.get(CART_PATH))
            .await
            .map_err(CartError::LoadFailed)?;
        let cart = Cart::from_response(response);
        debug!(items = cart.items.len(), cart_id = ?cart.id, "Cart loaded");

        self.ledger.lock().await.replace(cart.clone());
        Ok(cart)
    }

    /// Change an item's quantity.
    ///
    /// Quantities of zero or less are ignored. Otherwise the mirror changes
    /// at once and `PUT /carrinho/{item_id}` confirms it.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` for an unknown item and
    /// `CartError::Rejected` when the server refuses the latest change for
    /// the item, after rolling the mirror back.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn set_quantity(&self, item_id: &CartItemId, quantity: i64) -> Result<QuantityUpdate, CartError> {
        if quantity <= 0 {
            debug!(quantity, "Ignoring non-positive quantity");
            return Ok(QuantityUpdate::Ignored);
        }
        let quantity = u32::try_from(quantity).map_err(|_| CartError::QuantityTooLarge(quantity))?;

        let version = self
            .ledger
            .lock()
            .await
            .begin(item_id, quantity)
            .ok_or_else(|| CartError::ItemNotFound(item_id.clone()))?;

        let path = format!("{CART_PATH}/{}", urlencoding::encode(item_id.as_str()));
        let result = self
            .guarded(self.api.put_unit(&path, &QuantityRequest { quantidade: quantity }))
            .await;

        let settlement = self
            .ledger
            .lock()
            .await
            .settle(item_id, version, quantity, result.is_ok());

        match (settlement, result) {
            (Settlement::Applied(q), _) => {
                add_breadcrumb("cart", "Changed quantity", Some(&[("item_id", item_id.as_str())]));
                Ok(QuantityUpdate::Applied(q))
            }
            (Settlement::RolledBack(restored), Err(source)) => {
                warn!(version, restored, error = %source, "Quantity update rejected, rolled back");
                Err(CartError::Rejected {
                    item_id: item_id.clone(),
                    restored_to: Some(restored),
                    source,
                })
            }
            (Settlement::Gone, Err(source)) => Err(CartError::Rejected {
                item_id: item_id.clone(),
                restored_to: None,
                source,
            }),
            (Settlement::Superseded | Settlement::Gone, result) => {
                debug!(version, succeeded = result.is_ok(), "Quantity update superseded");
                Ok(QuantityUpdate::Superseded)
            }
            // `settle` only rolls back failures.
            (Settlement::RolledBack(_), Ok(())) => Ok(QuantityUpdate::Superseded),
        }
    }

    /// Add one to an item's quantity.
    ///
    /// # Errors
    ///
    /// See [`CartReconciler::set_quantity`].
    pub async fn increment(&self, item_id: &CartItemId) -> Result<QuantityUpdate, CartError> {
        let current = self.quantity_of(item_id).await?;
        self.set_quantity(item_id, i64::from(current) + 1).await
    }

    /// Take one from an item's quantity. At 1 this does nothing.
    ///
    /// # Errors
    ///
    /// See [`CartReconciler::set_quantity`].
    pub async fn decrement(&self, item_id: &CartItemId) -> Result<QuantityUpdate, CartError> {
        let current = self.quantity_of(item_id).await?;
        self.set_quantity(item_id, i64::from(current) - 1).await
    }

    async fn quantity_of(&self, item_id: &CartItemId) -> Result<u32, CartError> {
        self.ledger
            .lock()
            .await
            .cart
            .item(item_id)
            .map(|item| item.quantity)
            .ok_or_else(|| CartError::ItemNotFound(item_id.clone()))
    }

    /// Remove an item. The mirror changes only once the server confirms.
    ///
    /// # Errors
    ///
    /// Returns `CartError::CartNotFound` without a request when the cart id
    /// is unknown, and `CartError::RemoveFailed` when the server refuses.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn remove_item(&self, item_id: &CartItemId) -> Result<(), CartError> {
        let cart_id: CartId = {
            let ledger = self.ledger.lock().await;
            let cart_id = ledger.cart.id.clone().ok_or(CartError::CartNotFound)?;
            if ledger.cart.item(item_id).is_none() {
                return Err(CartError::ItemNotFound(item_id.clone()));
            }
            cart_id
        };

        let path = format!(
            "{CART_PATH}/{}/item/{}",
            urlencoding::encode(cart_id.as_str()),
            urlencoding::encode(item_id.as_str())
        );
        self.guarded(self.api.delete(&path))
            .await
            .map_err(CartError::RemoveFailed)?;

        self.ledger.lock().await.remove(item_id);
        add_breadcrumb("cart", "Removed item", Some(&[("item_id", item_id.as_str())]));
        info!("Item removed from cart");
        Ok(())
    }

    /// Put one unit of a product in the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::AddFailed` when the server refuses.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_product(&self, product_id: &ProductId) -> Result<(), CartError> {
        self.guarded(self.api.post_unit(
            CART_PATH,
            &AddRequest {
                produto_id: product_id.as_str(),
                quantidade: 1,
            },
        ))
        .await
        .map_err(CartError::AddFailed)?;

        add_breadcrumb("cart", "Added product", Some(&[("product_id", product_id.as_str())]));
        info!("Product added to cart");
        Ok(())
    }

    /// Copy of the mirror.
    pub async fn snapshot(&self) -> Cart {
        self.ledger.lock().await.cart.clone()
    }

    /// Sum of price times quantity over the mirror.
    pub async fn total(&self) -> Decimal {
        self.ledger.lock().await.cart.total()
    }

    /// Items whose name contains `query`, ignoring case.
    pub async fn filtered(&self, query: &str) -> Vec<CartItem> {
        self.ledger
            .lock()
            .await
            .cart
            .filtered(query)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn cart_id(&self) -> Option<CartId> {
        self.ledger.lock().await.cart.id.clone()
    }
}
