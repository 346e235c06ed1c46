//! Settlement Engine
//!
//! The settlement engine turns a cart of orders into a confirmed, paid checkout, and reconciles refunds and
//! cancellations against payouts that were already issued to seller organizations. It is provider-agnostic: payment
//! providers plug in through the [`PaymentGateway`] trait.
//!
//! The library is divided into these sections:
//! 1. The data types ([`mod@db_types`]) shared by every part of the engine.
//! 2. The backend contracts ([`mod@traits`]), and their SQLite implementation ([`SqliteDatabase`]). You should rarely
//!    need the backend directly. Use the public API instead.
//! 3. The public API ([`CheckoutApi`], [`AttachmentApi`], [`BatchApi`], [`AdjustmentApi`] and [`VoucherCostApi`]).
//!
//! The engine also emits events ([`mod@events`]) when a checkout session is paid and when a payout adjustment is
//! recorded, so that other services can react to them.
pub mod config;
pub mod db_types;
pub mod events;
mod settlement_api;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

pub use config::EngineConfig;
pub use settlement_api::{
    AdjustmentApi,
    AdjustmentRecorded,
    AttachmentApi,
    BatchApi,
    CheckoutApi,
    Clock,
    ConfirmationResult,
    PaymentConfirmation,
    PaymentReference,
    RedemptionCostSummary,
    RetryPolicy,
    VoucherCostApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    AdjustmentError,
    AdjustmentManagement,
    BatchError,
    BatchManagement,
    CheckoutError,
    CheckoutManagement,
    GatewayError,
    GatewayInvoice,
    OrderAttachmentError,
    OrderManagement,
    PaymentGateway,
    VoucherCostError,
    VoucherCostManagement,
};
