//! Product catalog.
//!
//! The product list is cached with `moka` for the configured TTL. Admin
//! mutations invalidate it so the next `list()` sees the change.

use std::sync::Arc;
use std::time::Duration;

use mangaverse_core::{Product, ProductDraft, ProductDraftError, ProductId};
use moka::future::Cache;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::api::ApiClient;
use crate::error::{ApiError, add_breadcrumb};

const PRODUCTS_PATH: &str = "/produtos";
const PRODUCTS_KEY: &str = "produtos";

/// Message shown when the product list cannot be loaded.
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load products";

/// Catalog errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The draft was rejected before any request.
    #[error("invalid product: {0}")]
    Invalid(#[from] ProductDraftError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl CatalogError {
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Invalid(e) => e.to_string(),
            Self::Api(e) => e.user_message(fallback),
        }
    }
}

/// Product catalog with a cached listing.
#[derive(Clone)]
pub struct Catalog {
    api: ApiClient,
    cache: Cache<&'static str, Arc<[Product]>>,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("api", &self.api)
            .field("cached_entries", &self.cache.entry_count())
            .finish()
    }
}

impl Catalog {
    /// Create a catalog whose listing is cached for `ttl`.
    #[must_use]
    pub fn new(api: ApiClient, ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(1).time_to_live(ttl).build();
        Self { api, cache }
    }

    /// Every product, from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Api` if the listing cannot be fetched.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Arc<[Product]>, CatalogError> {
        if let Some(products) = self.cache.get(PRODUCTS_KEY).await {
            debug!(count = products.len(), "Cache hit for product list");
            return Ok(products);
        }

        let products: Vec<Product> = self.api.get(PRODUCTS_PATH).await?;
        let products: Arc<[Product]> = products.into();
        debug!(count = products.len(), "Fetched product list");
        self.cache.insert(PRODUCTS_KEY, Arc::clone(&products)).await;
        Ok(products)
    }

    /// Find one product in the listing.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Api` if the listing cannot be fetched.
    pub async fn get(&self, id: &ProductId) -> Result<Option<Product>, CatalogError> {
        Ok(self.list().await?.iter().find(|p| &p.id == id).cloned())
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Invalid` without a request when the draft is
    /// incomplete, `CatalogError::Api` when the API refuses it.
    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create(&self, draft: &ProductDraft) -> Result<(), CatalogError> {
        draft.validate()?;
        self.api.post_unit(PRODUCTS_PATH, draft).await?;
        self.invalidate().await;
        add_breadcrumb("catalog", "Created product", Some(&[("name", draft.name.as_str())]));
        info!("Product created");
        Ok(())
    }

    /// Replace a product's fields.
    ///
    /// # Errors
    ///
    /// See [`Catalog::create`].
    #[instrument(skip(self, draft), fields(product_id = %id))]
    pub async fn update(&self, id: &ProductId, draft: &ProductDraft) -> Result<(), CatalogError> {
        draft.validate()?;
        self.api
            .put_unit(&format!("{PRODUCTS_PATH}/{}", urlencoding::encode(id.as_str())), draft)
            .await?;
        self.invalidate().await;
        add_breadcrumb("catalog", "Updated product", Some(&[("product_id", id.as_str())]));
        info!("Product updated");
        Ok(())
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Api` when the API refuses the deletion.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete(&self, id: &ProductId) -> Result<(), CatalogError> {
        self.api
            .delete(&format!("{PRODUCTS_PATH}/{}", urlencoding::encode(id.as_str())))
            .await?;
        self.invalidate().await;
        add_breadcrumb("catalog", "Deleted product", Some(&[("product_id", id.as_str())]));
        info!("Product deleted");
        Ok(())
    }

    /// Drop the cached listing.
    pub async fn invalidate(&self) {
        self.cache.invalidate(PRODUCTS_KEY).await;
    }
}
