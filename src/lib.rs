// Library module for testable functions

pub mod config;
pub mod pipeline;

use rust_decimal::Decimal;

/// Calculate revenue per lead
/// Formula: revenue / leads, None when there are no leads
pub fn revenue_per_lead(revenue: Decimal, leads: i64) -> Option<Decimal> {
    if leads <= 0 {
        return None;
    }
    revenue
        .checked_div(Decimal::from(leads))
        .map(|d| d.round_dp(6).normalize())
}
