//! Price conversion into gateway minor units and per-attempt receipts.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

/// ISO-4217 currency together with its minor-unit exponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Currency {
    code: &'static str,
    exponent: u32,
}

const ZERO_DECIMAL: &[&str] = &["JPY", "KRW", "VND", "CLP", "ISK", "UGX", "XAF", "XOF"];
const THREE_DECIMAL: &[&str] = &["KWD", "BHD", "OMR", "JOD", "TND", "IQD", "LYD"];
const TWO_DECIMAL: &[&str] = &[
    "INR", "USD", "EUR", "GBP", "AUD", "CAD", "SGD", "AED", "CHF", "HKD", "MYR", "NZD", "SAR",
    "SEK", "ZAR", "NPR", "LKR", "BDT",
];

impl Currency {
    pub const INR: Currency = Currency {
        code: "INR",
        exponent: 2,
    };

    /// Looks up a supported currency code (uppercase).
    pub fn from_code(code: &str) -> Option<Currency> {
        let table: [(&[&'static str], u32); 3] =
            [(TWO_DECIMAL, 2), (ZERO_DECIMAL, 0), (THREE_DECIMAL, 3)];
        table.iter().find_map(|(codes, exponent)| {
            codes
                .iter()
                .find(|c| **c == code)
                .map(|c| Currency {
                    code: *c,
                    exponent: *exponent,
                })
        })
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn exponent(&self) -> u32 {
        self.exponent
    }

    /// Converts a decimal price into an integer count of minor units,
    /// rounding half away from zero. Negative or overflowing prices yield
    /// `None`.
    pub fn to_minor_units(&self, price: Decimal) -> Option<i64> {
        if price.is_sign_negative() && !price.is_zero() {
            return None;
        }
        let scale = Decimal::from(10_i64.pow(self.exponent));
        price
            .checked_mul(scale)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
    }
}

/// Receipt unique per checkout attempt, within the gateway's 40 character
/// limit: `{course8}-{user8}-{unix_millis}`.
pub fn receipt_for(course_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> String {
    let course = course_id.simple().to_string();
    let user = user_id.simple().to_string();
    format!(
        "{}-{}-{}",
        &course[..8],
        &user[..8],
        now.timestamp_millis()
    )
}
