//! Value types shared by the settlement engine and its tooling.
mod amount;
mod helpers;

pub use amount::{Amount, AmountConversionError, DEFAULT_CURRENCY_CODE};
pub use helpers::parse_boolean_flag;
