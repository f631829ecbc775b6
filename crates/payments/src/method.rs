//! Payment methods and method-specific request validation.

use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};

/// How the customer chose to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Pix,
    Boleto,
}

impl PaymentMethod {
    pub fn is_card(&self) -> bool {
        matches!(self, PaymentMethod::CreditCard | PaymentMethod::DebitCard)
    }

    /// Returns the wire name of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::Pix => "pix",
            PaymentMethod::Boleto => "boleto",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Card data submitted with a card payment. Never persisted in full; only
/// the holder name, last four digits and brand survive validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardInput {
    #[serde(default)]
    pub card_number: String,
    #[serde(default)]
    pub card_holder_name: String,
    #[serde(default)]
    pub card_cvv: String,
    #[serde(default = "default_installments")]
    pub installments: u32,
}

fn default_installments() -> u32 {
    1
}

impl CardInput {
    /// Validates the card data and returns `(last4, brand, installments)`.
    pub fn validate(&self) -> Result<(String, &'static str, u32)> {
        if self.card_holder_name.trim().is_empty() {
            return Err(PaymentError::MissingCardField {
                field: "card_holder_name",
            });
        }

        let digits: String = self
            .card_number
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if digits.is_empty() {
            return Err(PaymentError::MissingCardField {
                field: "card_number",
            });
        }
        if digits.len() < 13 || digits.len() > 19 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(PaymentError::InvalidCardNumber);
        }

        if self.card_cvv.len() < 3
            || self.card_cvv.len() > 4
            || !self.card_cvv.chars().all(|c| c.is_ascii_digit())
        {
            return Err(PaymentError::InvalidCvv);
        }

        if self.installments == 0 || self.installments > 12 {
            return Err(PaymentError::InvalidInstallments {
                installments: self.installments,
            });
        }

        let last4 = digits[digits.len() - 4..].to_string();
        Ok((last4, card_brand(&digits), self.installments))
    }
}

/// Derives the card brand from the first digit of the card number.
pub fn card_brand(card_number: &str) -> &'static str {
    match card_number.chars().next() {
        Some('4') => "Visa",
        Some('5') => "Mastercard",
        Some('3') => "Amex",
        Some('6') => "Discover",
        _ => "Unknown",
    }
}
