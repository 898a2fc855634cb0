// Derived-field calculator: the single source of truth for every financial
// field. Pure, no I/O; outputs are computed on every read and never
// persisted.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Base inputs for the calculator, extracted from a trip record. Monetary
/// values are fixed-point with 2 decimal places.
#[derive(Debug, Clone, PartialEq)]
pub struct FinancialInputs {
    pub fixed_freight: Decimal,
    pub per_km_rate: Decimal,
    pub toll_expenses: Decimal,
    pub parking_charges: Decimal,
    pub loading_charges: Decimal,
    pub unloading_charges: Decimal,
    pub other_charges: Decimal,
    pub km_travelled: u32,
    pub advance_paid: Decimal,
    pub balance_paid: Decimal,
    pub revenue_override: Option<Decimal>,
}

/// Computed financial fields. `margin_percentage` is the margin/revenue
/// ratio (0 when revenue is 0), rounded to 4 places; everything else rounds
/// to 2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedFields {
    pub variable_freight: Decimal,
    pub total_freight: Decimal,
    pub balance_to_be_paid: Decimal,
    pub variance: Decimal,
    pub revenue: Decimal,
    pub margin: Decimal,
    pub margin_percentage: Decimal,
}

pub fn compute_financials(inputs: &FinancialInputs) -> DerivedFields {
    let variable_freight = (inputs.per_km_rate * Decimal::from(inputs.km_travelled)).round_dp(2);
    let total_freight = (inputs.fixed_freight
        + variable_freight
        + inputs.toll_expenses
        + inputs.parking_charges
        + inputs.loading_charges
        + inputs.unloading_charges
        + inputs.other_charges)
        .round_dp(2);
    let balance_to_be_paid = (total_freight - inputs.advance_paid).round_dp(2);
    let variance = (inputs.balance_paid - balance_to_be_paid).round_dp(2);
    let revenue = inputs.revenue_override.unwrap_or(total_freight).round_dp(2);
    let margin = (revenue - total_freight).round_dp(2);
    let margin_percentage = if revenue > Decimal::ZERO {
        (margin / revenue).round_dp(4)
    } else {
        Decimal::ZERO
    };

    DerivedFields {
        variable_freight,
        total_freight,
        balance_to_be_paid,
        variance,
        revenue,
        margin,
        margin_percentage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base_inputs() -> FinancialInputs {
        FinancialInputs {
            fixed_freight: dec!(1000.00),
            per_km_rate: dec!(10.00),
            toll_expenses: dec!(50.00),
            parking_charges: Decimal::ZERO,
            loading_charges: Decimal::ZERO,
            unloading_charges: Decimal::ZERO,
            other_charges: Decimal::ZERO,
            km_travelled: 50,
            advance_paid: Decimal::ZERO,
            balance_paid: Decimal::ZERO,
            revenue_override: None,
        }
    }

    #[test]
    fn test_freight_example() {
        let derived = compute_financials(&base_inputs());
        assert_eq!(derived.variable_freight, dec!(500.00));
        assert_eq!(derived.total_freight, dec!(1550.00));
    }

    #[test]
    fn test_balance_and_variance_example() {
        let mut inputs = base_inputs();
        inputs.advance_paid = dec!(500.00);
        inputs.balance_paid = dec!(1000.00);
        let derived = compute_financials(&inputs);
        assert_eq!(derived.balance_to_be_paid, dec!(1050.00));
        assert_eq!(derived.variance, dec!(-50.00));
    }

    #[test]
    fn test_revenue_defaults_to_total_freight() {
        let derived = compute_financials(&base_inputs());
        assert_eq!(derived.revenue, dec!(1550.00));
        assert_eq!(derived.margin, dec!(0.00));
        assert_eq!(derived.margin_percentage, dec!(0.0000));
    }

    #[test]
    fn test_revenue_override_drives_margin() {
        let mut inputs = base_inputs();
        inputs.revenue_override = Some(dec!(2000.00));
        let derived = compute_financials(&inputs);
        assert_eq!(derived.revenue, dec!(2000.00));
        assert_eq!(derived.margin, dec!(450.00));
        assert_eq!(derived.margin_percentage, dec!(0.2250));
    }

    #[test]
    fn test_zero_revenue_yields_zero_margin_percentage() {
        let mut inputs = base_inputs();
        inputs.fixed_freight = Decimal::ZERO;
        inputs.per_km_rate = Decimal::ZERO;
        inputs.toll_expenses = Decimal::ZERO;
        let derived = compute_financials(&inputs);
        assert_eq!(derived.revenue, Decimal::ZERO);
        assert_eq!(derived.margin_percentage, Decimal::ZERO);
    }

    #[test]
    fn test_deterministic() {
        let inputs = base_inputs();
        assert_eq!(compute_financials(&inputs), compute_financials(&inputs));
    }
}
