//! Scalar quantities derived from model inputs.

use crate::error::{EpidemicError, Result};

/// Fixed per-contact transmission probability.
pub const TRANSMISSION_PER_CONTACT: f64 = 0.05;

pub const MIN_CONTACTS_PER_DAY: u32 = 1;
pub const MAX_CONTACTS_PER_DAY: u32 = 20;

/// R0 = contact_rate / recovery_rate.
pub fn basic_reproduction_number(contact_rate: f64, recovery_rate: f64) -> Result<f64> {
    if recovery_rate == 0.0 {
        return Err(EpidemicError::division_by_zero(
            "basic reproduction number (recovery_rate is zero)",
        ));
    }
    Ok(contact_rate / recovery_rate)
}

/// Converts a whole number of daily contacts into a contact rate (beta).
pub fn effective_contact_rate(contacts_per_day: u32) -> Result<f64> {
    if !(MIN_CONTACTS_PER_DAY..=MAX_CONTACTS_PER_DAY).contains(&contacts_per_day) {
        return Err(EpidemicError::invalid(
            "contacts_per_day",
            format!(
                "must lie in [{MIN_CONTACTS_PER_DAY}, {MAX_CONTACTS_PER_DAY}], got {contacts_per_day}"
            ),
        ));
    }
    Ok(TRANSMISSION_PER_CONTACT * f64::from(contacts_per_day))
}

/// Rate from a mean duration in days, e.g. 10 days to recover gives 0.1.
pub fn rate_from_days(field: &str, days: u32) -> Result<f64> {
    if days == 0 {
        return Err(EpidemicError::division_by_zero(format!(
            "{field} (mean duration of zero days)"
        )));
    }
    Ok(1.0 / f64::from(days))
}

/// Y-axis upper bound in thousands for a population, with a small margin.
pub fn display_scale(population: f64) -> f64 {
    population / 1000.0 + 0.2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EpidemicError;

    #[test]
    fn r0_is_ratio_of_rates() {
        let r0 = basic_reproduction_number(0.2, 0.1).expect("r0");
        assert!((r0 - 2.0).abs() < 1e-12);
    }

    #[test]
    fn r0_with_zero_recovery_fails_loudly() {
        let err = basic_reproduction_number(0.2, 0.0).expect_err("zero divisor");
        assert!(matches!(err, EpidemicError::DivisionByZero { .. }));
    }

    #[test]
    fn contact_rate_is_five_percent_per_contact() {
        assert!((effective_contact_rate(4).expect("rate") - 0.2).abs() < 1e-12);
        assert!((effective_contact_rate(20).expect("rate") - 1.0).abs() < 1e-12);
        let err = effective_contact_rate(0).expect_err("below range");
        assert_eq!(err.field(), Some("contacts_per_day"));
        assert!(effective_contact_rate(21).is_err());
    }

    #[test]
    fn rate_from_days_inverts_duration() {
        assert!((rate_from_days("recovery_rate", 10).expect("rate") - 0.1).abs() < 1e-12);
        let err = rate_from_days("recovery_rate", 0).expect_err("zero days");
        assert!(err.to_string().contains("recovery_rate"));
    }

    #[test]
    fn display_scale_adds_margin_in_thousands() {
        assert!((display_scale(1_000_000.0) - 1000.2).abs() < 1e-9);
        assert!((display_scale(1000.0) - 1.2).abs() < 1e-12);
    }
}
