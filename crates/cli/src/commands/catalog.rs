//! Catalog browsing.

use mangaverse_storefront::AppState;

use super::CliError;
use crate::output;

pub async fn list(state: &AppState) -> Result<(), CliError> {
    let products = state.catalog().list().await?;
    output::products(&products);
    Ok(())
}
