use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    config::EngineConfig,
    db_types::{CheckoutId, CheckoutSession, InvoiceDetails, NewCheckoutSession, SessionStatus},
    events::{EventProducers, SessionPaidEvent},
    settlement_api::{Clock, ConfirmationResult, PaymentConfirmation, PaymentReference, RetryPolicy},
    traits::{
        CheckoutError,
        CheckoutManagement,
        ExpiryResult,
        GatewayError,
        InvoiceLineItem,
        InvoiceRequest,
        OrderManagement,
        PaymentGateway,
        SessionCommand,
    },
};

/// `CheckoutApi` drives checkout sessions from creation to payment.
///
/// A session groups one or more orders of the same customer behind a single gateway invoice. The API guarantees that:
/// * a payment confirmation is applied at most once, no matter how often it is delivered;
/// * the invoice of a session, and the paid status, are written to every order of the session or to none;
/// * the number of invoice attempts is persisted before the gateway is called.
pub struct CheckoutApi<B, G> {
    db: B,
    gateway: G,
    config: EngineConfig,
    producers: EventProducers,
    clock: Clock,
}

impl<B, G> Debug for CheckoutApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi")
    }
}

impl<B, G> CheckoutApi<B, G> {
    pub fn new(db: B, gateway: G, config: EngineConfig, producers: EventProducers) -> Self {
        Self { db, gateway, config, producers, clock: Clock::default() }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

impl<B, G> CheckoutApi<B, G>
where
    B: CheckoutManagement + OrderManagement,
    G: PaymentGateway,
{
    /// Creates a `Pending` checkout session for the given orders.
    ///
    /// If the session has no expiry of its own and a session TTL is configured, the TTL is applied.
    pub async fn create_checkout_session(&self, session: NewCheckoutSession) -> Result<CheckoutSession, CheckoutError> {
        let now = self.now();
        let session = match (session.expires_at, self.config.session_ttl) {
            (None, Some(ttl)) => session.with_expiry(now + ttl),
            _ => session,
        };
        self.db.insert_checkout_session(session, now).await
    }

    /// Fetches the session for `checkout_id`.
    ///
    /// If the session is `Pending` but overdue, it is returned as `Expired`, and (unless disabled in the
    /// configuration) that transition is persisted.
    pub async fn fetch_session(&self, checkout_id: &CheckoutId) -> Result<CheckoutSession, CheckoutError> {
        let session = self
            .db
            .fetch_session_by_checkout_id(checkout_id)
            .await?
            .ok_or_else(|| CheckoutError::SessionNotFound(checkout_id.clone()))?;
        self.apply_lazy_expiry(session).await
    }

    pub async fn fetch_session_by_invoice_id(&self, invoice_id: &str) -> Result<CheckoutSession, CheckoutError> {
        let session = self
            .db
            .fetch_session_by_invoice_id(invoice_id)
            .await?
            .ok_or_else(|| CheckoutError::InvoiceNotFound(invoice_id.to_string()))?;
        self.apply_lazy_expiry(session).await
    }

    /// The customer's sessions, most recent first. Statuses are reported as of now, but not persisted.
    pub async fn sessions_for_customer(&self, customer_id: &str) -> Result<Vec<CheckoutSession>, CheckoutError> {
        let now = self.now();
        let mut sessions = self.db.fetch_sessions_for_customer(customer_id).await?;
        sessions.iter_mut().for_each(|s| s.status = s.effective_status(now));
        Ok(sessions)
    }

    async fn apply_lazy_expiry(&self, mut session: CheckoutSession) -> Result<CheckoutSession, CheckoutError> {
        let now = self.now();
        if session.status != SessionStatus::Pending || !session.is_overdue(now) {
            return Ok(session);
        }
        if self.config.expire_on_read {
            debug!("🛒️ Checkout session {} is overdue. Marking it as expired.", session.checkout_id);
            let update = self.db.apply_session_command(&session.checkout_id, SessionCommand::Expire, now).await?;
            return Ok(update.session);
        }
        session.status = SessionStatus::Expired;
        Ok(session)
    }

    /// Makes a single attempt to create (or, if one exists, replace) the gateway invoice for the session.
    ///
    /// The attempt is counted before the gateway is called. On success, the invoice is written to the session and
    /// every order in it.
    pub async fn create_or_refresh_invoice(&self, checkout_id: &CheckoutId) -> Result<CheckoutSession, CheckoutError> {
        self.attempt_invoice(checkout_id, self.config.max_invoice_attempts).await
    }

    /// Creates the gateway invoice, retrying transient gateway failures with exponential backoff.
    ///
    /// Retrying stops once the session's persisted attempt counter reaches `policy.max_attempts`, so concurrent or
    /// repeated calls share one budget. Permanent and unknown-outcome failures are returned immediately.
    pub async fn create_invoice_with_retry(
        &self,
        checkout_id: &CheckoutId,
        policy: RetryPolicy,
    ) -> Result<CheckoutSession, CheckoutError> {
        let mut retry = 0;
        loop {
            match self.attempt_invoice(checkout_id, policy.max_attempts).await {
                Err(CheckoutError::GatewayTransient(reason)) => {
                    let delay = policy.backoff(retry);
                    warn!(
                        "🛒️ Invoice attempt for {checkout_id} failed ({reason}). Retrying in {}ms",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                },
                result => return result,
            }
        }
    }

    async fn attempt_invoice(
        &self,
        checkout_id: &CheckoutId,
        max_attempts: i64,
    ) -> Result<CheckoutSession, CheckoutError> {
        let session = self.fetch_session(checkout_id).await?;
        let now = self.now();
        if !session.is_usable(now) {
            return Err(CheckoutError::SessionClosed {
                checkout_id: checkout_id.clone(),
                status: session.effective_status(now),
            });
        }
        let session = self.db.record_invoice_attempt(checkout_id, max_attempts, now).await?;
        let request = self.invoice_request(&session, now).await?;
        debug!(
            "🛒️ Requesting invoice #{} for {checkout_id} from {} ({} {})",
            session.invoice_creation_attempts,
            self.gateway.name(),
            request.amount,
            request.currency
        );
        let invoice = self.gateway.create_invoice(&request).await.map_err(|e| {
            warn!("🛒️ Invoice attempt #{} for {checkout_id} failed. {e}", session.invoice_creation_attempts);
            match e {
                GatewayError::Unavailable(s) => CheckoutError::GatewayTransient(s),
                GatewayError::Rejected(s) => CheckoutError::GatewayPermanent(s),
                GatewayError::Timeout(s) => CheckoutError::GatewayOutcomeUnknown(s),
            }
        })?;
        let details = InvoiceDetails {
            invoice_id: invoice.external_invoice_id,
            invoice_url: invoice.hosted_url,
            expiry_date: invoice.expiry_timestamp,
            created_at: now,
        };
        let session = self.write_invoice(checkout_id, details).await?;
        info!("🛒️ Invoice {} created for checkout session {checkout_id}", session.invoice_id().unwrap_or_default());
        Ok(session)
    }

    async fn invoice_request(
        &self,
        session: &CheckoutSession,
        now: DateTime<Utc>,
    ) -> Result<InvoiceRequest, CheckoutError> {
        let orders = self.db.fetch_orders_for_checkout(&session.checkout_id).await?;
        let line_items = orders
            .into_iter()
            .map(|o| InvoiceLineItem {
                description: format!("Order {}", o.order_id),
                order_id: o.order_id,
                amount: o.total_amount,
            })
            .collect();
        let invoice_expiry = now + self.config.invoice_ttl;
        let expiry = session.expires_at.map(|e| e.min(invoice_expiry)).unwrap_or(invoice_expiry);
        Ok(InvoiceRequest {
            customer_ref: session.customer_id.clone(),
            amount: session.total_amount,
            currency: self.config.currency.clone(),
            line_items,
            expiry,
            idempotency_key: Some(session.invoice_idempotency_key()),
        })
    }

    /// Records an invoice that the gateway re-issued on its own (e.g. a renewed payment link).
    pub async fn refresh_invoice(
        &self,
        checkout_id: &CheckoutId,
        invoice: InvoiceDetails,
    ) -> Result<CheckoutSession, CheckoutError> {
        self.write_invoice(checkout_id, invoice).await
    }

    async fn write_invoice(
        &self,
        checkout_id: &CheckoutId,
        invoice: InvoiceDetails,
    ) -> Result<CheckoutSession, CheckoutError> {
        let update =
            self.db.apply_session_command(checkout_id, SessionCommand::RefreshInvoice(invoice), self.now()).await?;
        if update.applied {
            Ok(update.session)
        } else {
            Err(CheckoutError::SessionClosed { checkout_id: checkout_id.clone(), status: update.session.status })
        }
    }

    /// Applies a payment confirmation. Safe to call any number of times for the same payment.
    ///
    /// * The first call moves the session to `Paid`, marks all its orders as paid, and notifies `on_session_paid`
    ///   subscribers.
    /// * Later calls, including ones racing the first, return `already_applied: true` and write nothing.
    /// * A session already stored as `Expired` or `Cancelled` cannot be paid ([`CheckoutError::SessionClosed`]). A
    ///   `Pending` session is honoured even if its expiry has passed, since the customer did pay.
    /// * A reported amount different from the session total is a partial or split payment. Nothing is written and
    ///   [`CheckoutError::UnresolvedSettlement`] is returned for manual reconciliation.
    pub async fn confirm_payment(
        &self,
        confirmation: PaymentConfirmation,
    ) -> Result<ConfirmationResult, CheckoutError> {
        trace!("🛒️ Payment confirmation received for {}", confirmation.reference);
        let session = match &confirmation.reference {
            PaymentReference::CheckoutId(id) => self
                .db
                .fetch_session_by_checkout_id(id)
                .await?
                .ok_or_else(|| CheckoutError::SessionNotFound(id.clone()))?,
            PaymentReference::InvoiceId(id) => self
                .db
                .fetch_session_by_invoice_id(id)
                .await?
                .ok_or_else(|| CheckoutError::InvoiceNotFound(id.clone()))?,
        };
        let checkout_id = session.checkout_id.clone();
        match session.status {
            SessionStatus::Paid => {
                debug!("🛒️ Checkout session {checkout_id} is already paid. Ignoring the duplicate confirmation.");
                return Ok(ConfirmationResult { already_applied: true, session });
            },
            SessionStatus::Expired | SessionStatus::Cancelled => {
                warn!("🛒️ Payment received for checkout session {checkout_id}, which is {}", session.status);
                return Err(CheckoutError::SessionClosed { checkout_id, status: session.status });
            },
            SessionStatus::Pending => {},
        }
        if let Some(paid) = confirmation.amount_paid {
            if paid != session.total_amount {
                warn!(
                    "🛒️ Payment of {paid} for checkout session {checkout_id} does not match the total of {}",
                    session.total_amount
                );
                return Err(CheckoutError::UnresolvedSettlement {
                    checkout_id,
                    reason: format!("{paid} was paid against a total of {}", session.total_amount),
                });
            }
        }
        let command = SessionCommand::MarkPaid { paid_at: confirmation.paid_at };
        let update = self.db.apply_session_command(&checkout_id, command, self.now()).await?;
        if !update.applied {
            return match update.session.status {
                SessionStatus::Paid => Ok(ConfirmationResult { already_applied: true, session: update.session }),
                status => Err(CheckoutError::SessionClosed { checkout_id, status }),
            };
        }
        info!("🛒️ Checkout session {checkout_id} is paid. {} orders settled.", update.session.order_ids.len());
        self.call_session_paid_hook(&update.session).await;
        Ok(ConfirmationResult { already_applied: false, session: update.session })
    }

    async fn call_session_paid_hook(&self, session: &CheckoutSession) {
        if self.producers.session_paid_producer.is_empty() {
            return;
        }
        match self.db.fetch_orders_for_checkout(&session.checkout_id).await {
            Ok(orders) => {
                debug!("🛒️ Notifying session paid hook subscribers");
                self.producers.publish_session_paid(SessionPaidEvent::new(session.clone(), orders)).await;
            },
            Err(e) => error!("🛒️ Could not load the orders of {} for the session paid hook. {e}", session.checkout_id),
        }
    }

    /// Cancels a `Pending` session. Cancelling a session that is already cancelled has no effect.
    pub async fn cancel_session(&self, checkout_id: &CheckoutId) -> Result<CheckoutSession, CheckoutError> {
        let update = self.db.apply_session_command(checkout_id, SessionCommand::Cancel, self.now()).await?;
        match update.session.status {
            SessionStatus::Cancelled => {
                if update.applied {
                    info!("🛒️ Checkout session {checkout_id} cancelled");
                }
                Ok(update.session)
            },
            status => Err(CheckoutError::SessionClosed { checkout_id: checkout_id.clone(), status }),
        }
    }

    /// Persists the `Expired` status of every overdue `Pending` session.
    pub async fn expire_stale_sessions(&self) -> Result<ExpiryResult, CheckoutError> {
        let result = self.db.expire_overdue_sessions(self.now()).await?;
        if result.count() > 0 {
            info!("🛒️ {} checkout sessions expired", result.count());
        }
        Ok(result)
    }
}
