//! Payment and refund state machines.

use serde::{Deserialize, Serialize};

/// The status of a payment in its lifecycle.
///
/// Status transitions:
/// ```text
/// Pending ──► Processing ──► Approved ──► Refunded
///    │            │
///    └────────────┴──► Declined
///
/// any non-terminal ──► Cancelled
/// ```
///
/// `Declined`, `Refunded` and `Cancelled` are terminal. Only an approved
/// payment can be refunded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Payment created, not yet sent to the gateway.
    #[default]
    Pending,

    /// Payment handed to the gateway, awaiting a decision.
    Processing,

    /// Gateway authorized the charge.
    Approved,

    /// Gateway rejected the charge (terminal state).
    Declined,

    /// Charge was returned to the customer (terminal state).
    Refunded,

    /// Payment abandoned before a gateway decision (terminal state).
    Cancelled,
}

impl PaymentStatus {
    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Declined | PaymentStatus::Refunded | PaymentStatus::Cancelled
        )
    }

    /// Returns true if a payment in this status can be refunded.
    pub fn is_refundable(&self) -> bool {
        matches!(self, PaymentStatus::Approved)
    }

    /// Returns true if the transition to `target` is allowed.
    pub fn can_transition_to(&self, target: PaymentStatus) -> bool {
        use PaymentStatus::*;
        match (self, target) {
            (Pending, Processing) | (Pending, Approved) | (Pending, Declined) => true,
            (Processing, Approved) | (Processing, Declined) => true,
            (Approved, Refunded) => true,
            (from, Cancelled) if !from.is_terminal() => true,
            _ => false,
        }
    }

    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Declined => "declined",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "processing" => Ok(PaymentStatus::Processing),
            "approved" => Ok(PaymentStatus::Approved),
            "declined" => Ok(PaymentStatus::Declined),
            "refunded" => Ok(PaymentStatus::Refunded),
            "cancelled" => Ok(PaymentStatus::Cancelled),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

/// The status of a single refund request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}
