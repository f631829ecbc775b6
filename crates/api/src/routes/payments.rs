//! Payment endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Money, OrderId, PaymentId};
use payments::{NewPayment, Payment, PaymentMethod, PaymentStatus, RefundStatus};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::identity::{AdminCaller, Caller};
use crate::routes::orders::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: PaymentStatus,
    #[serde(default)]
    pub comment: String,
    /// Recorded on the payment when the new status is `declined`.
    #[serde(default)]
    pub decline_reason: Option<String>,
}

#[derive(Deserialize)]
pub struct RefundRequest {
    #[serde(default)]
    pub amount: Option<Money>,
    #[serde(default)]
    pub reason: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct PaymentResponse {
    pub id: PaymentId,
    pub payment_number: String,
    pub order_id: OrderId,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub amount: Money,
    pub card: Option<payments::CardDetails>,
    pub pix: Option<payments::PixDetails>,
    pub boleto: Option<payments::BoletoDetails>,
    pub gateway_transaction_id: Option<String>,
    pub decline_reason: Option<String>,
    pub refunds: Vec<RefundResponse>,
    pub refunded_amount: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct RefundResponse {
    pub amount: Money,
    pub reason: String,
    pub status: RefundStatus,
    pub created_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        let refunds = payment
            .refunds()
            .iter()
            .map(|refund| RefundResponse {
                amount: refund.amount,
                reason: refund.reason.clone(),
                status: refund.status,
                created_at: refund.created_at,
            })
            .collect();

        Self {
            id: payment.id(),
            payment_number: payment.payment_number(),
            order_id: payment.order_id(),
            method: payment.method(),
            status: payment.status(),
            amount: payment.amount(),
            card: payment.card().cloned(),
            pix: payment.pix().cloned(),
            boleto: payment.boleto().cloned(),
            gateway_transaction_id: payment.gateway_transaction_id().map(String::from),
            decline_reason: payment.decline_reason().map(String::from),
            refunds,
            refunded_amount: payment.refunded_amount(),
            created_at: payment.created_at(),
        }
    }
}

// -- Handlers --

/// POST /payments — create a payment for an order and process it.
#[tracing::instrument(skip(state, caller, req))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<NewPayment>,
) -> Result<(StatusCode, Json<PaymentResponse>), ApiError> {
    let payment = state
        .payments
        .create_payment(&caller.user, &caller.identity, req)
        .await?;
    Ok((StatusCode::CREATED, Json(payment.into())))
}

/// GET /payments — list the caller's payments (all payments for admins).
#[tracing::instrument(skip(state, caller))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<Vec<PaymentResponse>>, ApiError> {
    let payments = state.payments.list_payments(&caller.user).await?;
    Ok(Json(
        payments.into_iter().map(PaymentResponse::from).collect(),
    ))
}

/// GET /payments/:id — load a payment by ID.
#[tracing::instrument(skip(state, caller))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<PaymentId>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let payment = state.payments.get_payment(&caller.user, id).await?;
    Ok(Json(payment.into()))
}

/// POST /payments/:id/update-status — transition a payment (admin only).
///
/// Used by the back office to settle PIX and boleto payments once the money
/// arrives.
#[tracing::instrument(skip(state, caller, req))]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    caller: AdminCaller,
    Path(id): Path<PaymentId>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let payment = state
        .payments
        .update_status(
            id,
            req.status,
            req.comment,
            req.decline_reason,
            Some(caller.0.user.id),
            &caller.0.identity,
        )
        .await?;
    Ok(Json(payment.into()))
}

/// POST /payments/:id/request-refund — refund part or all of a payment.
#[tracing::instrument(skip(state, caller, req))]
pub async fn request_refund(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<PaymentId>,
    Json(req): Json<RefundRequest>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let payment = state
        .payments
        .request_refund(&caller.user, &caller.identity, id, req.amount, req.reason)
        .await?;
    Ok(Json(payment.into()))
}

/// GET /payments/statistics — aggregate figures (admin only).
#[tracing::instrument(skip(state, _caller))]
pub async fn statistics(
    State(state): State<Arc<AppState>>,
    _caller: AdminCaller,
) -> Result<Json<payments::PaymentStatistics>, ApiError> {
    let stats = state.payments.statistics().await?;
    Ok(Json(stats))
}
