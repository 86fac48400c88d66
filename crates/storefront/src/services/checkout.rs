//! Checkout bridge between the shop API and the payment service.

use mangaverse_core::CartId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::api::ApiClient;
use crate::error::{ApiError, add_breadcrumb};
use crate::payments::{CardDetails, GatewayError, PaymentGateway};

const CREATE_PAYMENT_PATH: &str = "/criar-pagamento-cartao";

/// Shown when the payment went through.
pub const PAYMENT_APPROVED_MESSAGE: &str = "Payment approved!";
/// Shown when the API would not open a payment intent.
pub const CREATE_PAYMENT_FAILED_MESSAGE: &str = "Failed to create payment";
const CART_NOT_FOUND_MESSAGE: &str = "Cart not found";
const NOT_CONFIGURED_MESSAGE: &str = "Card payments are not available.";

/// Checkout errors.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart id unknown")]
    CartNotFound,

    #[error("no payment service configured")]
    NotConfigured,

    #[error("failed to create payment: {0}")]
    CreatePayment(#[source] ApiError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl CheckoutError {
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::CartNotFound => CART_NOT_FOUND_MESSAGE.to_string(),
            Self::NotConfigured => NOT_CONFIGURED_MESSAGE.to_string(),
            Self::CreatePayment(e) => e.user_message(CREATE_PAYMENT_FAILED_MESSAGE),
            Self::Gateway(GatewayError::Declined(message)) => message.clone(),
            Self::Gateway(e) => e.to_string(),
        }
    }
}

/// How a payment attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Succeeded,
    /// The processor refused the payment, with its message.
    Failed(String),
    /// Any other intent status, e.g. `requires_action` or `processing`.
    Pending(String),
}

impl PaymentOutcome {
    /// Text to show once the attempt is over.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Succeeded => PAYMENT_APPROVED_MESSAGE.to_string(),
            Self::Failed(message) => message.clone(),
            Self::Pending(status) => format!("Payment status: {status}"),
        }
    }
}

#[derive(Serialize)]
struct CreatePaymentRequest<'a> {
    #[serde(rename = "carrinhoId")]
    carrinho_id: &'a str,
}

#[derive(Deserialize)]
struct CreatePaymentResponse {
    #[serde(rename = "clientSecret", default)]
    client_secret: Option<String>,
}

/// Pays for a cart through a [`PaymentGateway`].
#[derive(Debug, Clone)]
pub struct CheckoutBridge<G> {
    api: ApiClient,
    gateway: Option<G>,
}

impl<G: PaymentGateway> CheckoutBridge<G> {
    /// A bridge that pays through `gateway`, or refuses every payment when it
    /// is `None`.
    #[must_use]
    pub const fn new(api: ApiClient, gateway: Option<G>) -> Self {
        Self { api, gateway }
    }

    /// Pay for `cart_id` with `card`.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::CartNotFound` without a request when there is
    /// no cart id, `CheckoutError::CreatePayment` when the API will not open
    /// a payment, and `CheckoutError::Gateway` when the payment service
    /// fails for a reason other than a declined card.
    #[instrument(skip(self, card))]
    pub async fn pay(&self, cart_id: Option<&CartId>, card: &CardDetails) -> Result<PaymentOutcome, CheckoutError> {
        let cart_id = cart_id.ok_or(CheckoutError::CartNotFound)?;
        let gateway = self.gateway.as_ref().ok_or(CheckoutError::NotConfigured)?;

        let response: CreatePaymentResponse = self
            .api
            .post(
                CREATE_PAYMENT_PATH,
                &CreatePaymentRequest {
                    carrinho_id: cart_id.as_str(),
                },
            )
            .await
            .map_err(CheckoutError::CreatePayment)?;
        let client_secret = response
            .client_secret
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                CheckoutError::CreatePayment(ApiError::InvalidRequest("response has no clientSecret".to_string()))
            })?;
        add_breadcrumb("checkout", "Payment intent created", Some(&[("cart_id", cart_id.as_str())]));

        let confirmed = match gateway.tokenize_card(card).await {
            Ok(payment_method) => gateway.confirm_card_payment(&client_secret, &payment_method).await,
            Err(e) => Err(e),
        };

        let outcome = match confirmed {
            Ok(intent) if intent.succeeded() => PaymentOutcome::Succeeded,
            Ok(intent) => PaymentOutcome::Pending(intent.status),
            Err(GatewayError::Declined(message)) => PaymentOutcome::Failed(message),
            Err(e) => return Err(e.into()),
        };

        match &outcome {
            PaymentOutcome::Succeeded => info!("Payment approved"),
            PaymentOutcome::Failed(message) => warn!(message = %message, "Payment declined"),
            PaymentOutcome::Pending(status) => info!(status = %status, "Payment pending"),
        }
        Ok(outcome)
    }
}
