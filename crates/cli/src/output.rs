//! Terminal rendering.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use mangaverse_core::{Cart, CartItem, MetricsSnapshot, Price, Product};
use mangaverse_storefront::services::metrics::MetricsState;
use mangaverse_storefront::services::profile::Profile;

pub fn line(message: &str) {
    println!("{message}");
}

pub fn error(message: &str) {
    eprintln!("{message}");
}

pub fn products(products: &[Product]) {
    if products.is_empty() {
        println!("No products.");
        return;
    }
    for product in products {
        println!(
            "{:<26} {:>12}  {}",
            product.id,
            Price::store(product.price).display(),
            product.name
        );
        if !product.description.is_empty() {
            println!("{:<26} {:>12}  {}", "", "", product.description);
        }
    }
}

fn cart_item(item: &CartItem) {
    println!(
        "{:<26} {:>4} x {:>12} = {:>12}  {}",
        item.id,
        item.quantity,
        Price::store(item.product.price).display(),
        Price::store(item.line_total()).display(),
        item.product.name
    );
}

pub fn cart(cart: &Cart, items: &[CartItem]) {
    if cart.is_empty() {
        println!("Your cart is empty.");
        return;
    }
    if let Some(id) = &cart.id {
        println!("Cart {id}");
    }
    for item in items {
        cart_item(item);
    }
    println!("Total: {}", Price::store(cart.total()).display());
}

pub fn metrics(snapshot: &MetricsSnapshot) {
    println!("Active users:     {}", snapshot.active_users);
    println!("Total cart value: {}", Price::store(snapshot.total_value).display());
    if snapshot.ranking.is_empty() {
        println!("No products requested yet.");
        return;
    }
    println!("Most requested:");
    for (position, entry) in snapshot.ranking.iter().enumerate() {
        println!(
            "{:>3}. {:<30} {:>5}",
            position + 1,
            entry.name.as_deref().unwrap_or(entry.product_id.as_str()),
            entry.count
        );
    }
}

pub fn metrics_state(state: &MetricsState) {
    if state.loading {
        println!("Loading metrics...");
        return;
    }
    if let Some(error) = &state.error {
        eprintln!("{error}");
    }
    metrics(&state.snapshot);
    if let Some(at) = state.refreshed_at {
        println!("Updated {}", at.format("%H:%M:%S"));
    }
}

pub fn profile(profile: &Profile, avatar_url: Option<&str>) {
    println!("{}", profile.display_name());
    if let Some(email) = &profile.email {
        println!("{email}");
    }
    println!("Avatar: {}", avatar_url.unwrap_or("none"));
}
