//! Per-method payment processing strategies.

use async_trait::async_trait;

use crate::aggregate::{BoletoDetails, CardDetails, Payment, PixDetails};
use crate::error::Result;
use crate::gateway::{GatewayDecision, PaymentGateway};
use crate::method::PaymentMethod;
use crate::service::NewPayment;
use crate::state::PaymentStatus;

/// Runs the method-specific part of payment creation against the gateway.
///
/// Card methods get an immediate authorization decision; PIX and boleto
/// only produce the payload the customer needs to pay and leave the
/// payment pending.
#[async_trait]
pub trait PaymentMethodProcessor: Send + Sync {
    async fn process(
        &self,
        payment: &mut Payment,
        request: &NewPayment,
        gateway: &dyn PaymentGateway,
    ) -> Result<()>;
}

/// Selects the processor for a payment method.
pub fn processor_for(method: PaymentMethod) -> &'static dyn PaymentMethodProcessor {
    match method {
        PaymentMethod::CreditCard | PaymentMethod::DebitCard => &CardProcessor,
        PaymentMethod::Pix => &PixProcessor,
        PaymentMethod::Boleto => &BoletoProcessor,
    }
}

pub struct CardProcessor;

#[async_trait]
impl PaymentMethodProcessor for CardProcessor {
    async fn process(
        &self,
        payment: &mut Payment,
        request: &NewPayment,
        gateway: &dyn PaymentGateway,
    ) -> Result<()> {
        let (last4, brand, installments) = request.card.validate()?;
        payment.set_card_details(CardDetails {
            holder_name: request.card.card_holder_name.clone(),
            last4,
            brand: brand.to_string(),
            installments,
        });
        payment.transition(PaymentStatus::Processing, "sent to gateway", None)?;

        match gateway.authorize_card(payment.amount(), installments).await? {
            GatewayDecision::Approved {
                transaction_id,
                response,
            } => payment.approve(transaction_id, response),
            GatewayDecision::Declined { reason, response } => payment.decline(reason, response),
        }
    }
}

pub struct PixProcessor;

#[async_trait]
impl PaymentMethodProcessor for PixProcessor {
    async fn process(
        &self,
        payment: &mut Payment,
        request: &NewPayment,
        gateway: &dyn PaymentGateway,
    ) -> Result<()> {
        let charge = gateway
            .create_pix_charge(payment.amount(), request.pix_key.as_deref())
            .await?;
        payment.set_pix_details(PixDetails {
            key: charge.key,
            code: charge.code,
        });
        Ok(())
    }
}

pub struct BoletoProcessor;

#[async_trait]
impl PaymentMethodProcessor for BoletoProcessor {
    async fn process(
        &self,
        payment: &mut Payment,
        _request: &NewPayment,
        gateway: &dyn PaymentGateway,
    ) -> Result<()> {
        let slip = gateway.issue_boleto(payment.id(), payment.amount()).await?;
        payment.set_boleto_details(BoletoDetails {
            barcode: slip.barcode,
            url: slip.url,
            due_date: slip.due_date,
        });
        Ok(())
    }
}
