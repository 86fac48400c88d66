//! Stripe-compatible gateway authenticated with a publishable key.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{CardDetails, ConfirmedIntent, GatewayError, PaymentGateway};
use crate::config::PaymentsConfig;

#[derive(Deserialize)]
struct PaymentMethod {
    id: String,
}

#[derive(Deserialize)]
struct PaymentIntent {
    id: String,
    status: String,
    #[serde(default)]
    last_payment_error: Option<StripeError>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: StripeError,
}

#[derive(Deserialize)]
struct StripeError {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Client for the Stripe REST API, limited to what the browser SDK may do
/// with a publishable key.
#[derive(Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    api_base: String,
    publishable_key: SecretString,
}

impl std::fmt::Debug for StripeGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeGateway")
            .field("api_base", &self.api_base)
            .field("publishable_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl StripeGateway {
    /// # Errors
    ///
    /// Returns [`GatewayError::Http`] if the HTTP client cannot be built.
    pub fn new(
        api_base: &Url,
        publishable_key: SecretString,
        request_timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            api_base: api_base.as_str().trim_end_matches('/').to_string(),
            publishable_key,
        })
    }

    /// Gateway for the configured account, if a publishable key is set.
    ///
    /// # Errors
    ///
    /// Same as [`StripeGateway::new`].
    pub fn from_config(
        config: &PaymentsConfig,
        request_timeout: Duration,
    ) -> Result<Option<Self>, GatewayError> {
        config
            .publishable_key
            .clone()
            .map(|key| Self::new(&config.api_base, key, request_timeout))
            .transpose()
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<T, GatewayError> {
        let response = self
            .client
            .post(format!("{}{path}", self.api_base))
            .bearer_auth(self.publishable_key.expose_secret())
            .form(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| GatewayError::Api {
                status,
                message: format!("unreadable response: {e}"),
            });
        }

        let error = serde_json::from_str::<ErrorEnvelope>(&body).ok().map(|e| e.error);
        let message = error
            .as_ref()
            .and_then(|e| e.message.clone())
            .unwrap_or_else(|| status.to_string());
        debug!(%status, message = %message, "Payment service rejected request");

        if error.as_ref().and_then(|e| e.kind.as_deref()) == Some("card_error") {
            return Err(GatewayError::Declined(message));
        }
        Err(GatewayError::Api { status, message })
    }
}

/// `pi_123_secret_abc` -> `pi_123`
fn intent_id(client_secret: &str) -> Option<&str> {
    client_secret
        .split_once("_secret_")
        .map(|(id, _)| id)
        .filter(|id| id.starts_with("pi_"))
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip_all)]
    async fn tokenize_card(&self, card: &CardDetails) -> Result<String, GatewayError> {
        let exp_month = card.exp_month.to_string();
        let exp_year = card.exp_year.to_string();
        let method: PaymentMethod = self
            .post_form(
                "/v1/payment_methods",
                &[
                    ("type", "card"),
                    ("card[number]", card.number.expose_secret()),
                    ("card[exp_month]", exp_month.as_str()),
                    ("card[exp_year]", exp_year.as_str()),
                    ("card[cvc]", card.cvc.expose_secret()),
                ],
            )
            .await?;
        Ok(method.id)
    }

    #[instrument(skip_all)]
    async fn confirm_card_payment(
        &self,
        client_secret: &str,
        payment_method: &str,
    ) -> Result<ConfirmedIntent, GatewayError> {
        let intent_id = intent_id(client_secret).ok_or(GatewayError::InvalidClientSecret)?;
        let intent: PaymentIntent = self
            .post_form(
                &format!("/v1/payment_intents/{intent_id}/confirm"),
                &[
                    ("client_secret", client_secret),
                    ("payment_method", payment_method),
                ],
            )
            .await?;

        if let Some(message) = intent.last_payment_error.and_then(|e| e.message) {
            return Err(GatewayError::Declined(message));
        }
        Ok(ConfirmedIntent {
            id: intent.id,
            status: intent.status,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_id_from_client_secret() {
        assert_eq!(intent_id("pi_3Mtw_secret_YrKJUKribcBjcG8H"), Some("pi_3Mtw"));
        assert_eq!(intent_id("seti_123_secret_abc"), None);
        assert_eq!(intent_id("pi_123"), None);
    }

    #[test]
    fn test_debug_redacts_key() {
        let gateway = StripeGateway::new(
            &Url::parse("https://api.stripe.com").unwrap(),
            SecretString::from("pk_test_51abcdefghijklmnopqrstuvwxyz"),
            Duration::from_secs(5),
        )
        .unwrap();
        let debug = format!("{gateway:?}");
        assert!(!debug.contains("pk_test"));
    }
}
