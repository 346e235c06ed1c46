use std::time::Duration;

use anyhow::{anyhow, Result};
use log::*;
use settlement_engine::{
    db_types::DateRange,
    events::EventProducers,
    traits::{BatchQueryFilter, GatewayInvoice, InvoiceRequest},
    AdjustmentApi,
    BatchApi,
    CheckoutApi,
    EngineConfig,
    GatewayError,
    PaymentGateway,
    SqliteDatabase,
    VoucherCostApi,
};

use crate::{
    command_def::Command,
    expiry_worker::start_expiry_worker,
    formatting::{format_adjustments, format_batches, format_config, format_redemption_costs, format_sessions},
};

/// The tools never issue invoices, so every request is refused.
#[derive(Clone, Copy, Debug, Default)]
struct NoGateway;

impl PaymentGateway for NoGateway {
    fn name(&self) -> &str {
        "none"
    }

    async fn create_invoice(&self, _request: &InvoiceRequest) -> Result<GatewayInvoice, GatewayError> {
        Err(GatewayError::Rejected("The settlement tools cannot create invoices".into()))
    }
}

pub async fn handle_command(command: Command) -> Result<()> {
    let config = EngineConfig::from_env_or_default();
    if let Command::Config = command {
        print!("{}", format_config(&config)?);
        return Ok(());
    }
    let db = SqliteDatabase::new_with_url(&config.database_url, config.max_connections)
        .await
        .map_err(|e| anyhow!("Could not connect to {}. {e}", config.database_url))?;
    let result = run(command, db.clone(), config).await;
    db.close().await;
    result
}

async fn run(command: Command, db: SqliteDatabase, config: EngineConfig) -> Result<()> {
    match command {
        Command::Migrate => {
            db.migrate().await?;
            println!("Database at {} is up to date", db.url());
        },
        Command::ExpireSessions { watch } => expire_sessions(db, config, watch).await?,
        Command::Sessions { customer_id } => {
            let api = CheckoutApi::new(db, NoGateway, config, EventProducers::default());
            let sessions = api.sessions_for_customer(&customer_id).await?;
            println!("Checkout sessions for {customer_id}\n{}", format_sessions(&sessions));
        },
        Command::PendingAdjustments { organization_id } => {
            let api = AdjustmentApi::new(db, EventProducers::default());
            let adjustments = api.list_pending_adjustments(&organization_id).await?;
            println!("Pending adjustments for {organization_id}\n{}", format_adjustments(&adjustments));
        },
        Command::Batches { organization_id, active_only } => {
            let api = BatchApi::new(db);
            let mut query = BatchQueryFilter::for_organization(organization_id.as_str());
            if active_only {
                query = query.active_only();
            }
            let batches = api.search_batches(query).await?;
            println!("Order batches for {organization_id}\n{}", format_batches(&batches));
        },
        Command::RedemptionCosts { seller_organization_id, from, to } => {
            let range = DateRange::new(from, to);
            if !range.is_valid() {
                return Err(anyhow!("The range {range} is empty"));
            }
            let api = VoucherCostApi::new(db);
            let summary = api.redemption_costs_for_seller(&seller_organization_id, range).await?;
            print!("{}", format_redemption_costs(&seller_organization_id, &summary)?);
        },
        // Handled before connecting
        Command::Config => {},
    }
    Ok(())
}

async fn expire_sessions(db: SqliteDatabase, config: EngineConfig, watch: Option<u64>) -> Result<()> {
    let api = CheckoutApi::new(db, NoGateway, config, EventProducers::default());
    match watch {
        None => {
            let result = api.expire_stale_sessions().await?;
            println!("{} checkout sessions expired", result.count());
            result.checkout_ids().iter().for_each(|id| println!("  {id}"));
        },
        Some(seconds) => {
            let worker = start_expiry_worker(api, Duration::from_secs(seconds.max(1)));
            tokio::signal::ctrl_c().await?;
            info!("🕰️ Stopping the checkout session expiry worker");
            worker.abort();
        },
    }
    Ok(())
}
