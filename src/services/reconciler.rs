use chrono::Utc;
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::repositories::{CheckoutStore, PaymentConfirmation, ReconcileOutcome};
use crate::webhooks::{verify_signature, StripeEvent, PAYMENT_SUCCEEDED};

/// Body acknowledging a delivered event
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
}

impl WebhookAck {
    pub fn received() -> Self {
        Self { received: true }
    }
}

/// What a verified delivery led to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Any event type other than a succeeded payment
    Ignored { event_type: String },
    /// Succeeded payment without a usable `metadata.orderId`
    Uncorrelated,
    Reconciled(ReconcileOutcome),
}

/// Verifies processor notifications and applies confirmed payments
#[derive(Clone)]
pub struct WebhookReconciler {
    store: Arc<dyn CheckoutStore>,
    secret: String,
    tolerance_secs: u64,
}

impl WebhookReconciler {
    pub fn new(store: Arc<dyn CheckoutStore>, secret: impl Into<String>, tolerance_secs: u64) -> Self {
        Self {
            store,
            secret: secret.into(),
            tolerance_secs,
        }
    }

    /// A signature failure or unreadable body is a 400 with no state change
    #[instrument(skip_all, fields(bytes = payload.len()))]
    pub async fn handle(
        &self,
        signature: Option<&str>,
        payload: &[u8],
    ) -> Result<WebhookOutcome, ServiceError> {
        let Some(signature) = signature else {
            counter!("webhooks.rejected", 1, "reason" => "missing_signature");
            warn!("webhook without signature header");
            return Err(ServiceError::InvalidInput("Webhook inválido".to_string()));
        };

        if let Err(e) = verify_signature(
            payload,
            signature,
            &self.secret,
            self.tolerance_secs,
            Utc::now().timestamp(),
        ) {
            counter!("webhooks.rejected", 1, "reason" => "signature");
            warn!(error = %e, "webhook signature verification failed");
            return Err(ServiceError::InvalidInput("Webhook inválido".to_string()));
        }

        let event: StripeEvent = serde_json::from_slice(payload).map_err(|e| {
            warn!(error = %e, "signed webhook body is not an event");
            ServiceError::InvalidInput("Webhook inválido".to_string())
        })?;

        if event.event_type != PAYMENT_SUCCEEDED {
            info!(event_id = %event.id, event_type = %event.event_type, "webhook ignored");
            counter!("webhooks.ignored", 1);
            return Ok(WebhookOutcome::Ignored {
                event_type: event.event_type,
            });
        }

        let Some(confirmation) = confirmation_from(&event) else {
            warn!(event_id = %event.id, "payment event without a valid orderId");
            counter!("webhooks.uncorrelated", 1);
            return Ok(WebhookOutcome::Uncorrelated);
        };

        let outcome = self.store.record_payment(&confirmation).await?;
        match &outcome {
            ReconcileOutcome::Applied {
                order_id,
                shortfalls,
            } => {
                counter!("webhooks.payments_applied", 1);
                for shortfall in shortfalls {
                    counter!("inventory.stock_shortfalls", 1);
                    warn!(
                        order_id = %order_id,
                        book_id = %shortfall.book_id,
                        requested = shortfall.requested,
                        available = shortfall.available,
                        "paid order exceeds stock"
                    );
                }
                info!(order_id = %order_id, payment_id = %confirmation.payment_id, "order paid");
            }
            ReconcileOutcome::DuplicateEvent => {
                counter!("webhooks.duplicates", 1);
                info!(event_id = %confirmation.event_id, "event already processed");
            }
            ReconcileOutcome::UnknownOrder => {
                counter!("webhooks.uncorrelated", 1);
                warn!(order_id = %confirmation.order_id, "payment for unknown order");
            }
            ReconcileOutcome::AlreadySettled { status } => {
                info!(order_id = %confirmation.order_id, status = %status, "order already settled");
            }
        }

        Ok(WebhookOutcome::Reconciled(outcome))
    }
}

fn confirmation_from(event: &StripeEvent) -> Option<PaymentConfirmation> {
    let intent = event.payment_intent()?;
    let order_id = intent
        .metadata
        .get("orderId")
        .and_then(|raw| Uuid::parse_str(raw).ok())?;
    Some(PaymentConfirmation {
        event_id: event.id.clone(),
        event_type: event.event_type.clone(),
        order_id,
        payment_id: intent.id,
    })
}
