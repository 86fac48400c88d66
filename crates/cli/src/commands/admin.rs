//! Administration commands.
//!
//! # Usage
//!
//! ```bash
//! mv-cli admin products create -n "Vinland Saga 1" -p 44.90 -d "Hardcover" -u https://img/vs1.jpg
//! mv-cli admin products update 65f1c0ffee -p 39.90
//! mv-cli admin products delete 65f1c0ffee
//! mv-cli admin metrics --watch
//! ```

use std::io::BufRead;

use mangaverse_core::{ProductDraft, ProductId};
use mangaverse_storefront::services::catalog::CatalogError;
use mangaverse_storefront::{AppState, Route};
use rust_decimal::Decimal;

use super::CliError;
use crate::output;

const DEFAULT_ADMIN_NAME: &str = "Administrator";

/// Fields to change on an existing product.
#[derive(Debug, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub description: Option<String>,
    pub photo_url: Option<String>,
}

impl ProductChanges {
    fn apply(self, draft: &mut ProductDraft) {
        if let Some(name) = self.name {
            draft.name = name;
        }
        if let Some(price) = self.price {
            draft.price = price;
        }
        if let Some(description) = self.description {
            draft.description = description;
        }
        if let Some(photo_url) = self.photo_url {
            draft.photo_url = photo_url;
        }
    }
}

pub async fn create_product(state: &AppState, draft: &ProductDraft) -> Result<(), CliError> {
    state.guard().require_admin(Route::Admin)?;
    state
        .catalog()
        .create(draft)
        .await
        .map_err(|e| with_fallback(e, "Failed to create product"))?;
    output::line("Product created.");
    output::products(&state.catalog().list().await?);
    Ok(())
}

pub async fn update_product(state: &AppState, id: &str, changes: ProductChanges) -> Result<(), CliError> {
    state.guard().require_admin(Route::Admin)?;
    let id = ProductId::new(id);

    let product = state
        .catalog()
        .get(&id)
        .await?
        .ok_or_else(|| CliError::Input(format!("No product with id {id}")))?;
    let mut draft = ProductDraft::from_product(&product);
    changes.apply(&mut draft);

    state
        .catalog()
        .update(&id, &draft)
        .await
        .map_err(|e| with_fallback(e, "Failed to update product"))?;
    output::line("Product updated.");
    output::products(&state.catalog().list().await?);
    Ok(())
}

pub async fn delete_product(state: &AppState, id: &str) -> Result<(), CliError> {
    state.guard().require_admin(Route::Admin)?;
    state
        .catalog()
        .delete(&ProductId::new(id))
        .await
        .map_err(|e| with_fallback(e, "Failed to delete product"))?;
    output::line("Product deleted.");
    Ok(())
}

/// Keep the server's message, else say which action failed.
fn with_fallback(error: CatalogError, fallback: &str) -> CliError {
    match &error {
        CatalogError::Api(api) if api.server_message().is_none() && api.navigation().is_none() => {
            CliError::Input(error.user_message(fallback))
        }
        _ => CliError::Catalog(error),
    }
}

pub async fn metrics(state: &AppState, watch: bool) -> Result<(), CliError> {
    let session = state.guard().require_admin(Route::Admin)?;
    output::line(&format!("Welcome, {}", session.display_name(DEFAULT_ADMIN_NAME)));

    if !watch {
        state.metrics().refresh().await?;
        output::metrics_state(&state.metrics().state());
        return Ok(());
    }

    let shutdown = state.shutdown_token();
    let mut updates = state.metrics().subscribe();
    let (poller, focus) = state
        .metrics()
        .spawn_poller(state.config().metrics_interval, shutdown.child_token());

    // A line on stdin stands in for the window regaining focus. A plain
    // thread so a pending read never holds up runtime shutdown.
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if line.is_err() {
                break;
            }
            focus.notify();
        }
    });

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = updates.borrow_and_update().clone();
                if !current.loading {
                    output::metrics_state(&current);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    state.shutdown();
    if let Err(e) = poller.await {
        tracing::warn!(error = %e, "Metrics poller ended abnormally");
    }
    Ok(())
}
