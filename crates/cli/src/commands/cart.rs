//! Cart commands. Every command loads the cart first, like the cart page.

use mangaverse_core::{CartItemId, ProductId};
use mangaverse_storefront::services::cart::{CartReconciler, QuantityUpdate};
use mangaverse_storefront::{AppState, Route};

use super::CliError;
use crate::output;

async fn open(state: &AppState) -> Result<CartReconciler, CliError> {
    state.guard().require_user(Route::Cart)?;
    let cart = state.cart();
    cart.load().await?;
    Ok(cart)
}

async fn print(cart: &CartReconciler, filter: Option<&str>) {
    let snapshot = cart.snapshot().await;
    let items = cart.filtered(filter.unwrap_or_default()).await;
    output::cart(&snapshot, &items);
}

fn report(update: QuantityUpdate) {
    match update {
        QuantityUpdate::Ignored => output::line("Quantity must be at least 1; nothing changed."),
        QuantityUpdate::Applied(quantity) => output::line(&format!("Quantity set to {quantity}.")),
        QuantityUpdate::Superseded => output::line("A newer change took over."),
    }
}

pub async fn show(state: &AppState, filter: Option<&str>) -> Result<(), CliError> {
    let cart = open(state).await?;
    print(&cart, filter).await;
    Ok(())
}

pub async fn set_quantity(state: &AppState, item_id: &str, quantity: i64) -> Result<(), CliError> {
    let cart = open(state).await?;
    let _lifecycle = cart.lifecycle_guard();

    let update = cart.set_quantity(&CartItemId::new(item_id), quantity).await?;
    report(update);
    print(&cart, None).await;
    Ok(())
}

/// `delta` is +1 or -1.
pub async fn step(state: &AppState, item_id: &str, delta: i8) -> Result<(), CliError> {
    let cart = open(state).await?;
    let _lifecycle = cart.lifecycle_guard();

    let item_id = CartItemId::new(item_id);
    let update = if delta > 0 {
        cart.increment(&item_id).await?
    } else {
        cart.decrement(&item_id).await?
    };
    report(update);
    print(&cart, None).await;
    Ok(())
}

pub async fn remove(state: &AppState, item_id: &str) -> Result<(), CliError> {
    let cart = open(state).await?;
    let _lifecycle = cart.lifecycle_guard();

    cart.remove_item(&CartItemId::new(item_id)).await?;
    output::line("Item removed.");
    print(&cart, None).await;
    Ok(())
}

pub async fn add_product(state: &AppState, product_id: &str) -> Result<(), CliError> {
    state.guard().require_user(Route::Cart)?;
    let cart = state.cart();
    cart.add_product(&ProductId::new(product_id)).await?;
    output::line("Added to cart.");
    Ok(())
}
