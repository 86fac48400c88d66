//! Card checkout.

use mangaverse_storefront::payments::CardDetails;
use mangaverse_storefront::services::checkout::PaymentOutcome;
use mangaverse_storefront::{AppState, Route};
use secrecy::SecretString;

use super::CliError;
use crate::output;

pub async fn pay(
    state: &AppState,
    card_number: String,
    exp_month: u8,
    exp_year: u16,
    cvc: String,
) -> Result<(), CliError> {
    state.guard().require_user(Route::Checkout)?;

    let cart = state.cart();
    let snapshot = cart.load().await?;
    output::line(&format!(
        "Paying {}",
        mangaverse_core::Price::store(snapshot.total()).display()
    ));

    let card = CardDetails {
        number: SecretString::from(card_number),
        exp_month,
        exp_year,
        cvc: SecretString::from(cvc),
    };
    let outcome = state.checkout().pay(snapshot.id.as_ref(), &card).await?;
    match outcome {
        PaymentOutcome::Failed(message) => Err(CliError::Input(message)),
        outcome => {
            output::line(&outcome.message());
            Ok(())
        }
    }
}
