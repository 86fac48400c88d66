//! Catalog products.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ProductId;
use crate::types::price::deserialize_lenient_price;

/// A product as listed by `GET /produtos`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: ProductId,
    #[serde(rename = "nome", default)]
    pub name: String,
    #[serde(
        rename = "preco",
        default,
        deserialize_with = "deserialize_lenient_price"
    )]
    pub price: Decimal,
    #[serde(rename = "descricao", default)]
    pub description: String,
    #[serde(rename = "urlfoto", default)]
    pub photo_url: String,
}

/// Reasons an admin product form is rejected before it is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductDraftError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("price must not be negative")]
    NegativePrice,
}

/// Body of `POST /produtos` and `PUT /produtos/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "preco", with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(rename = "descricao")]
    pub description: String,
    #[serde(rename = "urlfoto")]
    pub photo_url: String,
}

impl ProductDraft {
    /// Check the draft the way the admin form does: every field filled in.
    ///
    /// # Errors
    ///
    /// Returns the first blank field, or [`ProductDraftError::NegativePrice`].
    pub fn validate(&self) -> Result<(), ProductDraftError> {
        for (label, value) in [
            ("name", &self.name),
            ("description", &self.description),
            ("photo URL", &self.photo_url),
        ] {
            if value.trim().is_empty() {
                return Err(ProductDraftError::MissingField(label));
            }
        }
        if self.price.is_sign_negative() && !self.price.is_zero() {
            return Err(ProductDraftError::NegativePrice);
        }
        Ok(())
    }

    /// Pre-fill a draft from an existing product for editing.
    #[must_use]
    pub fn from_product(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            price: product.price,
            description: product.description.clone(),
            photo_url: product.photo_url.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft() -> ProductDraft {
        ProductDraft {
            name: "Berserk Vol. 1".to_string(),
            price: Decimal::new(4990, 2),
            description: "Deluxe edition".to_string(),
            photo_url: "https://img.example.com/berserk.jpg".to_string(),
        }
    }

    #[test]
    fn test_product_reads_wire_names_and_string_price() {
        let product: Product = serde_json::from_value(json!({
            "_id": "p1",
            "nome": "Vagabond",
            "preco": "39.90",
            "descricao": "Vol. 3",
            "urlfoto": "/img/vagabond.png"
        }))
        .unwrap();

        assert_eq!(product.id.as_str(), "p1");
        assert_eq!(product.name, "Vagabond");
        assert_eq!(product.price, Decimal::new(3990, 2));
        assert_eq!(product.photo_url, "/img/vagabond.png");
    }

    #[test]
    fn test_product_missing_optional_fields() {
        let product: Product = serde_json::from_value(json!({ "_id": "p2" })).unwrap();
        assert_eq!(product.price, Decimal::ZERO);
        assert!(product.name.is_empty());
    }

    #[test]
    fn test_draft_serializes_price_as_number() {
        let body = serde_json::to_value(draft()).unwrap();
        assert_eq!(body["nome"], "Berserk Vol. 1");
        assert_eq!(body["preco"], json!(49.9));
        assert_eq!(body["urlfoto"], "https://img.example.com/berserk.jpg");
    }

    #[test]
    fn test_draft_validation() {
        assert!(draft().validate().is_ok());

        let mut blank = draft();
        blank.description = "  ".to_string();
        assert_eq!(
            blank.validate(),
            Err(ProductDraftError::MissingField("description"))
        );

        let mut negative = draft();
        negative.price = Decimal::new(-1, 0);
        assert_eq!(negative.validate(), Err(ProductDraftError::NegativePrice));
    }
}
