use std::fmt::Write;

use anyhow::Result;
use prettytable::{
    format::{LinePosition, LineSeparator, TableFormat},
    row,
    Table,
};
use settlement_engine::{
    db_types::{Amount, CheckoutSession, OrderBatch, PayoutAdjustment},
    EngineConfig,
    RedemptionCostSummary,
};

fn markdown_format() -> TableFormat {
    prettytable::format::FormatBuilder::new()
        .column_separator('|')
        .borders('|')
        .separator(LinePosition::Title, LineSeparator::new('-', '|', '|', '|'))
        .padding(1, 1)
        .build()
}

fn markdown_style(table: &mut Table) {
    table.set_format(markdown_format());
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn format_sessions(sessions: &[CheckoutSession]) -> String {
    if sessions.is_empty() {
        return "No checkout sessions".to_string();
    }
    let mut table = Table::new();
    table.set_titles(row![
        "Checkout id",
        "Status",
        "Orders",
        "Total",
        "Invoice",
        "Attempts",
        "Expires At",
        "Paid At",
        "Created At"
    ]);
    sessions.iter().for_each(|s| {
        let orders = s.order_ids.iter().map(|o| o.to_string()).collect::<Vec<_>>().join(", ");
        table.add_row(row![
            s.checkout_id,
            s.status.to_string(),
            orders,
            s.total_amount.to_string(),
            s.invoice_id().unwrap_or_default(),
            s.invoice_creation_attempts,
            optional(s.expires_at),
            optional(s.paid_at),
            s.created_at.to_string()
        ]);
    });
    markdown_style(&mut table);
    format!("{table}\n")
}

pub fn format_adjustments(adjustments: &[PayoutAdjustment]) -> String {
    if adjustments.is_empty() {
        return "No pending adjustments".to_string();
    }
    let mut table = Table::new();
    table.set_titles(row!["ID", "Order id", "Type", "Amount", "Original invoice", "Reason", "Created At"]);
    adjustments.iter().for_each(|a| {
        table.add_row(row![
            a.id,
            a.order_id,
            a.adjustment_type.to_string(),
            a.amount.to_string(),
            a.original_invoice_id,
            a.reason,
            a.created_at.to_string()
        ]);
    });
    markdown_style(&mut table);
    let total = adjustments.iter().map(|a| a.amount).sum::<Amount>();
    format!("{table}\nTotal deduction: {total}\n")
}

pub fn format_batches(batches: &[OrderBatch]) -> String {
    if batches.is_empty() {
        return "No batches".to_string();
    }
    let mut table = Table::new();
    table.set_titles(row!["ID", "Name", "Description", "Start", "End", "Active", "Created By", "Updated At"]);
    batches.iter().for_each(|b| {
        table.add_row(row![
            b.id,
            b.name,
            b.description.as_deref().unwrap_or_default(),
            b.start_date.to_string(),
            b.end_date.to_string(),
            if b.is_active { "yes" } else { "no" },
            b.created_by_id,
            b.updated_at.to_string()
        ]);
    });
    markdown_style(&mut table);
    format!("{table}\n")
}

pub fn format_redemption_costs(seller: &str, summary: &RedemptionCostSummary) -> Result<String> {
    let mut f = String::new();
    writeln!(f, "===============================================================================")?;
    writeln!(
        f,
        "Redemption costs for {seller}\n{count:>4} records. Total covered: {total}",
        count = summary.costs.len(),
        total = summary.total_covered
    )?;
    writeln!(f, "===============================================================================")?;
    if summary.costs.is_empty() {
        return Ok(f);
    }
    let mut table = Table::new();
    table.set_titles(row!["ID", "Voucher", "Code", "Order id", "Order total", "Covered", "Created At"]);
    summary.costs.iter().for_each(|c| {
        table.add_row(row![
            c.id,
            c.voucher_id,
            c.voucher_snapshot.code,
            c.order_id,
            c.order_snapshot.total_amount.to_string(),
            c.amount_covered.to_string(),
            c.created_at.to_string()
        ]);
    });
    markdown_style(&mut table);
    writeln!(f, "{table}")?;
    Ok(f)
}

pub fn format_config(config: &EngineConfig) -> Result<String> {
    let mut f = String::new();
    writeln!(f, "Database URL:         {}", config.database_url)?;
    writeln!(f, "Max connections:      {}", config.max_connections)?;
    writeln!(f, "Currency:             {}", config.currency)?;
    writeln!(f, "Invoice TTL:          {} minutes", config.invoice_ttl.num_minutes())?;
    let session_ttl = config.session_ttl.map(|d| format!("{} minutes", d.num_minutes()));
    writeln!(f, "Session TTL:          {}", session_ttl.as_deref().unwrap_or("none"))?;
    writeln!(f, "Max invoice attempts: {}", config.max_invoice_attempts)?;
    writeln!(f, "Retry backoff:        {}ms", config.retry_backoff.as_millis())?;
    writeln!(f, "Expire on read:       {}", config.expire_on_read)?;
    Ok(f)
}
