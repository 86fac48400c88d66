//! Hosted payment service.
//!
//! Card data never reaches the shop API. The checkout asks the API for a
//! payment intent's client secret, then hands the card to a
//! [`PaymentGateway`] which tokenizes it and confirms the intent.

mod stripe;

pub use stripe::StripeGateway;

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

/// Card entered at checkout.
///
/// Number and CVC are secrets, so `Debug` never shows them.
#[derive(Debug, Clone)]
pub struct CardDetails {
    pub number: SecretString,
    /// 1-12
    pub exp_month: u8,
    /// Four digits.
    pub exp_year: u16,
    pub cvc: SecretString,
}

/// A payment intent after confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedIntent {
    pub id: String,
    /// `succeeded`, `processing`, `requires_action`, ...
    pub status: String,
}

impl ConfirmedIntent {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == "succeeded"
    }
}

/// Payment gateway errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment service unreachable: {0}")]
    Http(#[from] reqwest::Error),

    /// The processor refused the card.
    #[error("card declined: {0}")]
    Declined(String),

    #[error("client secret is not a payment intent secret")]
    InvalidClientSecret,

    #[error("payment service responded with {status}: {message}")]
    Api {
        status: reqwest::StatusCode,
        message: String,
    },
}

/// Tokenizes cards and confirms payment intents.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Turn card details into a payment method id.
    async fn tokenize_card(&self, card: &CardDetails) -> Result<String, GatewayError>;

    /// Confirm the intent behind `client_secret` with `payment_method`.
    async fn confirm_card_payment(
        &self,
        client_secret: &str,
        payment_method: &str,
    ) -> Result<ConfirmedIntent, GatewayError>;
}
