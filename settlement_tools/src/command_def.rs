use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about = "Operator tools for the settlement engine")]
pub struct Arguments {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Creates the database if necessary and runs any outstanding migrations
    Migrate,
    /// Marks every overdue pending checkout session as expired
    #[command(name = "expire-sessions")]
    ExpireSessions {
        /// Keep running, sweeping every SECONDS seconds, until interrupted
        #[arg(short = 'w', long = "watch", value_name = "SECONDS")]
        watch: Option<u64>,
    },
    /// Shows the checkout sessions of a customer, most recent first
    Sessions {
        #[arg(required = true, index = 1)]
        customer_id: String,
    },
    /// Lists the payout adjustments of an organization that have not been applied yet
    #[command(name = "pending-adjustments")]
    PendingAdjustments {
        #[arg(required = true, index = 1)]
        organization_id: String,
    },
    /// Lists the order batches of an organization
    Batches {
        #[arg(required = true, index = 1)]
        organization_id: String,
        /// Only show active batches
        #[arg(short = 'a', long = "active-only")]
        active_only: bool,
    },
    /// Summarises the voucher redemption costs covered for a seller, e.g. `spe redemption-costs org-1 --from
    /// 2024-03-01T00:00:00Z --to 2024-04-01T00:00:00Z`
    #[command(name = "redemption-costs")]
    RedemptionCosts {
        #[arg(required = true, index = 1)]
        seller_organization_id: String,
        /// Start of the range (inclusive), in RFC 3339 format
        #[arg(short = 'f', long = "from")]
        from: DateTime<Utc>,
        /// End of the range (exclusive), in RFC 3339 format
        #[arg(short = 't', long = "to")]
        to: DateTime<Utc>,
    },
    /// Prints the engine configuration read from the environment
    Config,
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn parse_redemption_cost_range() {
        let args = Arguments::try_parse_from([
            "spe",
            "redemption-costs",
            "org-1",
            "--from",
            "2024-03-01T00:00:00Z",
            "--to",
            "2024-04-01T00:00:00Z",
        ])
        .unwrap();
        match args.command {
            Command::RedemptionCosts { seller_organization_id, from, to } => {
                assert_eq!(seller_organization_id, "org-1");
                assert_eq!(from, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
                assert_eq!(to, Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap());
            },
            c => panic!("Unexpected command {c:?}"),
        }
        let bad = Arguments::try_parse_from(["spe", "redemption-costs", "org-1", "--from", "yesterday", "--to", "now"]);
        assert!(bad.is_err());
    }

    #[test]
    fn parse_flags() {
        let args = Arguments::try_parse_from(["spe", "batches", "org-1", "--active-only"]).unwrap();
        assert!(matches!(args.command, Command::Batches { active_only: true, .. }));
        let args = Arguments::try_parse_from(["spe", "expire-sessions", "-w", "30"]).unwrap();
        assert!(matches!(args.command, Command::ExpireSessions { watch: Some(30) }));
        let args = Arguments::try_parse_from(["spe", "expire-sessions"]).unwrap();
        assert!(matches!(args.command, Command::ExpireSessions { watch: None }));
    }
}
