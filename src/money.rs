use rust_decimal::Decimal;

/// Renders minor currency units as a major-unit string, e.g. `130000` -> `"1300.00"`.
///
/// Display only. Amounts are stored and computed in minor units.
pub fn to_major_units(amount: i64) -> String {
    Decimal::new(amount, 2).to_string()
}
