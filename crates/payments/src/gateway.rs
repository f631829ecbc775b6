//! Payment gateway abstraction and its simulator.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use common::Money;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde_json::json;

use crate::error::Result;

/// Outcome of a card authorization attempt.
#[derive(Debug, Clone)]
pub enum GatewayDecision {
    Approved {
        transaction_id: String,
        response: serde_json::Value,
    },
    Declined {
        reason: String,
        response: serde_json::Value,
    },
}

/// Payload for a PIX charge issued by the gateway.
#[derive(Debug, Clone)]
pub struct PixCharge {
    pub key: String,
    pub code: String,
    pub response: serde_json::Value,
}

/// Payload for a boleto issued by the gateway.
#[derive(Debug, Clone)]
pub struct BoletoSlip {
    pub barcode: String,
    pub url: String,
    pub due_date: chrono::DateTime<Utc>,
    pub response: serde_json::Value,
}

/// The upstream payment processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Attempts to authorize a card charge.
    async fn authorize_card(&self, amount: Money, installments: u32) -> Result<GatewayDecision>;

    /// Creates a PIX charge the customer can pay. A missing key falls back
    /// to the merchant's default key.
    async fn create_pix_charge(&self, amount: Money, key: Option<&str>) -> Result<PixCharge>;

    /// Issues a boleto for the charge.
    async fn issue_boleto(&self, payment_id: common::PaymentId, amount: Money)
        -> Result<BoletoSlip>;

    /// Refunds a previously captured transaction. Returns the gateway
    /// refund ID.
    async fn refund(&self, transaction_id: &str, amount: Money) -> Result<String>;
}

/// Simulated gateway used outside production.
///
/// Card charges are approved with a fixed probability; PIX and boleto
/// charges always succeed since they are paid out of band.
pub struct SimulatedGateway {
    approval_rate: f64,
}

impl SimulatedGateway {
    pub fn new(approval_rate: f64) -> Self {
        Self { approval_rate }
    }

    /// Gateway that always approves. Intended for tests.
    pub fn always_approve() -> Self {
        Self { approval_rate: 1.0 }
    }

    /// Gateway that always declines. Intended for tests.
    pub fn always_decline() -> Self {
        Self { approval_rate: 0.0 }
    }

    fn transaction_id() -> String {
        random_token(16).to_uppercase()
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self { approval_rate: 0.9 }
    }
}

fn random_token(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn random_digits(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn authorize_card(&self, amount: Money, installments: u32) -> Result<GatewayDecision> {
        let approved = rand::rng().random::<f64>() < self.approval_rate;
        if approved {
            let transaction_id = Self::transaction_id();
            let response = json!({
                "status": "approved",
                "transaction_id": transaction_id,
                "amount": amount.as_decimal(),
                "installments": installments,
            });
            Ok(GatewayDecision::Approved {
                transaction_id,
                response,
            })
        } else {
            let reason = "Transaction not authorized by card issuer".to_string();
            let response = json!({
                "status": "declined",
                "reason": reason,
                "amount": amount.as_decimal(),
            });
            Ok(GatewayDecision::Declined { reason, response })
        }
    }

    async fn create_pix_charge(&self, amount: Money, key: Option<&str>) -> Result<PixCharge> {
        let key = key.unwrap_or("pagamentos@cherry.com.br").to_string();
        let code = random_token(32);
        Ok(PixCharge {
            response: json!({
                "status": "pending",
                "pix_key": key,
                "pix_code": code,
                "amount": amount.as_decimal(),
            }),
            key,
            code,
        })
    }

    async fn issue_boleto(
        &self,
        payment_id: common::PaymentId,
        amount: Money,
    ) -> Result<BoletoSlip> {
        let barcode = random_digits(47);
        let url = format!("https://boleto.cherry.com.br/{payment_id}");
        let due_date = Utc::now() + Duration::days(3);
        Ok(BoletoSlip {
            response: json!({
                "status": "pending",
                "barcode": barcode,
                "url": url,
                "due_date": due_date,
                "amount": amount.as_decimal(),
            }),
            barcode,
            url,
            due_date,
        })
    }

    async fn refund(&self, transaction_id: &str, amount: Money) -> Result<String> {
        let _ = (transaction_id, amount);
        Ok(random_token(16).to_uppercase())
    }
}
