use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Amount, OrderId};

/// A line on a gateway invoice. One is generated per order in the checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    pub order_id: OrderId,
    pub description: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRequest {
    /// An opaque customer reference passed through to the provider.
    pub customer_ref: String,
    pub amount: Amount,
    pub currency: String,
    pub line_items: Vec<InvoiceLineItem>,
    pub expiry: DateTime<Utc>,
    /// Adapters forward this to the provider when present. They never make one up.
    pub idempotency_key: Option<String>,
}

/// The provider's answer to a successful invoice creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayInvoice {
    pub external_invoice_id: String,
    pub hosted_url: String,
    pub expiry_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The provider could not be reached, or refused service temporarily. Safe to retry.
    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),
    /// The provider rejected the request, e.g. because of an invalid amount. Retrying will not help.
    #[error("Payment gateway rejected the request: {0}")]
    Rejected(String),
    /// No answer arrived in time. The invoice may or may not exist on the provider's side.
    #[error("Payment gateway timed out: {0}")]
    Timeout(String),
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_))
    }
}

/// A uniform, stateless interface over heterogeneous payment providers (invoice-based and checkout-link-based).
///
/// Implementations translate the request into the provider's wire format and the provider's response back into a
/// [`GatewayInvoice`]. They hold no business logic.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    /// A short, human-readable name for the provider, used in logs.
    fn name(&self) -> &str;

    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<GatewayInvoice, GatewayError>;
}
