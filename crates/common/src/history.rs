//! Append-only status-history entries shared by the order and payment
//! aggregates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::UserId;

/// A single recorded status transition.
///
/// History entries are created once and never mutated; aggregates only
/// append to their history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange<S> {
    /// Unique entry identifier.
    pub id: Uuid,

    /// Status before the transition.
    pub from_status: S,

    /// Status after the transition.
    pub to_status: S,

    /// Free-text comment describing the transition.
    pub comment: String,

    /// User that triggered the transition, when known. `None` for
    /// transitions applied by service-to-service callbacks.
    pub changed_by: Option<UserId>,

    /// When the transition happened.
    pub changed_at: DateTime<Utc>,
}

impl<S> StatusChange<S> {
    /// Records a new status transition.
    pub fn new(
        from_status: S,
        to_status: S,
        comment: impl Into<String>,
        changed_by: Option<UserId>,
        changed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_status,
            to_status,
            comment: comment.into(),
            changed_by,
            changed_at,
        }
    }
}
