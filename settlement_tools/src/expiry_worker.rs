use std::time::Duration;

use log::*;
use settlement_engine::{db_types::CheckoutSession, CheckoutApi, PaymentGateway, SqliteDatabase};
use tokio::task::JoinHandle;

/// Starts the session expiry worker. The returned handle only completes if the task is aborted.
pub fn start_expiry_worker<G>(api: CheckoutApi<SqliteDatabase, G>, period: Duration) -> JoinHandle<()>
where G: PaymentGateway + Send + Sync + 'static {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        info!("🕰️ Checkout session expiry worker started. Sweeping every {}s", period.as_secs());
        loop {
            timer.tick().await;
            debug!("🕰️ Running checkout session expiry job");
            match api.expire_stale_sessions().await {
                Ok(result) => {
                    if result.count() > 0 {
                        info!("🕰️ {} checkout sessions expired: {}", result.count(), session_list(&result.expired));
                    }
                },
                Err(e) => {
                    error!("🕰️ Error running checkout session expiry job: {e}");
                },
            }
        }
    })
}

fn session_list(sessions: &[CheckoutSession]) -> String {
    sessions
        .iter()
        .map(|s| format!("[{}] checkout_id: {} cust_id: {}", s.id, s.checkout_id, s.customer_id))
        .collect::<Vec<String>>()
        .join(", ")
}
