use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{CheckoutId, DirectCheckout, InvoiceDetails, NewOrder, Order, OrderId},
    settlement_api::Clock,
    traits::{OrderAttachmentError, OrderManagement, OrderQueryFilter, PaymentCommand},
};

/// `AttachmentApi` owns the payment fields of orders: the mirror of orders received from the order lifecycle
/// service, and which checkout link or session invoice an order is paid through.
pub struct AttachmentApi<B> {
    db: B,
    clock: Clock,
}

impl<B> Debug for AttachmentApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AttachmentApi")
    }
}

impl<B> AttachmentApi<B> {
    pub fn new(db: B) -> Self {
        Self { db, clock: Clock::default() }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

impl<B> AttachmentApi<B>
where B: OrderManagement
{
    /// Mirrors an order from the order lifecycle service. Registering the same order again returns the stored
    /// order and `false`.
    pub async fn register_order(&self, order: NewOrder) -> Result<(Order, bool), OrderAttachmentError> {
        if order.total_amount.is_negative() {
            return Err(OrderAttachmentError::InvariantViolation(format!(
                "Order {} has a negative total of {}",
                order.order_id, order.total_amount
            )));
        }
        self.db.insert_order(order, self.clock.now()).await
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderAttachmentError> {
        self.db.fetch_order(order_id).await
    }

    /// Attaches a single-order checkout link. The attachment time is recorded as now, whatever `checkout.created_at`
    /// says.
    ///
    /// Fails with [`OrderAttachmentError::AttachmentConflict`] if the order is linked to a checkout session.
    pub async fn attach_direct_checkout(
        &self,
        order_id: &OrderId,
        checkout: DirectCheckout,
    ) -> Result<Order, OrderAttachmentError> {
        let command = PaymentCommand::AttachDirectCheckout { order_id: order_id.clone(), checkout };
        let mut orders = self.db.apply_payment_command(command, self.clock.now()).await?;
        let order = orders.pop().ok_or_else(|| OrderAttachmentError::OrderNotFound(order_id.clone()))?;
        debug!("🔗️ Direct checkout attached to order {order_id}");
        Ok(order)
    }

    /// Stores the invoice on the `Pending` checkout session and on every live order linked to it, in one transaction.
    ///
    /// Fails with [`OrderAttachmentError::SessionNotFound`] if there is no such session, and with an
    /// [`OrderAttachmentError::InvariantViolation`] if the session is no longer pending.
    pub async fn propagate_session_invoice(
        &self,
        checkout_id: &CheckoutId,
        invoice: InvoiceDetails,
    ) -> Result<Vec<Order>, OrderAttachmentError> {
        let command = PaymentCommand::PropagateSessionInvoice { checkout_id: checkout_id.clone(), invoice };
        let orders = self.db.apply_payment_command(command, self.clock.now()).await?;
        debug!("🔗️ Session invoice written to {} orders of {checkout_id}", orders.len());
        Ok(orders)
    }

    pub async fn orders_for_checkout(&self, checkout_id: &CheckoutId) -> Result<Vec<Order>, OrderAttachmentError> {
        self.db.fetch_orders_for_checkout(checkout_id).await
    }

    pub async fn soft_delete_order(&self, order_id: &OrderId) -> Result<Order, OrderAttachmentError> {
        let order = self.db.soft_delete_order(order_id, self.clock.now()).await?;
        info!("🔗️ Order {order_id} deleted");
        Ok(order)
    }

    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderAttachmentError> {
        self.db.search_orders(query).await
    }
}
