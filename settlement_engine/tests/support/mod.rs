#![allow(dead_code)]
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Duration, TimeZone, Utc};
use log::*;
use settlement_engine::{
    db_types::{Amount, NewOrder, Order, OrderId},
    traits::{GatewayError, GatewayInvoice, InvoiceRequest, PaymentGateway},
    Clock,
    OrderManagement,
    SqliteDatabase,
};
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub fn random_db_url() -> String {
    format!("sqlite://{}/spe_test_{}.db", std::env::temp_dir().display(), rand::random::<u64>())
}

/// A fresh, migrated database in the temp directory.
pub async fn prepare_test_env() -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let url = random_db_url();
    Sqlite::create_database(&url).await.expect("Error creating database");
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
    db.migrate().await.expect("Error running DB migrations");
    debug!("🚀️ Test database ready at {url}");
    db
}

pub async fn tear_down(db: SqliteDatabase) {
    let url = db.url().to_string();
    db.close().await;
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("🚀️ Could not drop {url}: {e}");
    }
}

pub fn ts(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
}

/// A clock the test can move forward.
#[derive(Clone)]
pub struct TestClock(Arc<Mutex<DateTime<Utc>>>);

impl TestClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self(Arc::new(Mutex::new(start)))
    }

    pub fn clock(&self) -> Clock {
        let now = self.0.clone();
        Clock::new(move || *now.lock().unwrap())
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }

    pub fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

pub async fn add_order(
    db: &SqliteDatabase,
    id: &str,
    customer: &str,
    org: &str,
    amount: i64,
    at: DateTime<Utc>,
) -> Order {
    let order = NewOrder::new(OrderId::from(id), customer, org, Amount::from(amount), at);
    let (order, inserted) = db.insert_order(order, at).await.expect("Error inserting order");
    assert!(inserted);
    order
}

/// A payment gateway that replays a script of responses, then succeeds. Every request is recorded.
#[derive(Clone, Default)]
pub struct ScriptedGateway {
    script: Arc<Mutex<VecDeque<GatewayError>>>,
    requests: Arc<Mutex<Vec<InvoiceRequest>>>,
}

impl ScriptedGateway {
    pub fn failing_with(errors: Vec<GatewayError>) -> Self {
        Self { script: Arc::new(Mutex::new(errors.into())), ..Default::default() }
    }

    pub fn requests(&self) -> Vec<InvoiceRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn push_failure(&self, error: GatewayError) {
        self.script.lock().unwrap().push_back(error);
    }
}

impl PaymentGateway for ScriptedGateway {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<GatewayInvoice, GatewayError> {
        let n = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };
        if let Some(e) = self.script.lock().unwrap().pop_front() {
            return Err(e);
        }
        Ok(GatewayInvoice {
            external_invoice_id: format!("inv-{n}"),
            hosted_url: format!("https://pay.example.com/inv-{n}"),
            expiry_timestamp: request.expiry,
        })
    }
}
