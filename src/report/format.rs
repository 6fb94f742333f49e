//! Cell formatting policy for report output

use rusqlite::types::Value;

/// Headers whose values are amounts of money
pub const MONETARY_HEADERS: &[&str] = &[
    "Adjustments",
    "Balance",
    "Base Salary",
    "Net Pay",
    "Profit",
    "Purchase Cost",
    "Revenue",
    "Sale Price",
    "Stock Value",
    "Total",
    "Unit Cost",
    "Unit Price",
];

/// Header that gets a percent suffix
pub const PERCENT_HEADER: &str = "Margin %";

pub fn is_monetary(header: &str) -> bool {
    MONETARY_HEADERS.contains(&header)
}

/// Render one report cell
///
/// Integers print without decimals, reals with two. Monetary columns get the
/// currency prefix (after any minus sign), `Margin %` gets a `%` suffix and
/// NULL prints as an empty cell.
pub fn format_cell(header: &str, value: &Value, currency: &str) -> String {
    let number = match value {
        Value::Null => return String::new(),
        Value::Text(s) => return s.clone(),
        Value::Blob(b) => return format!("<{} bytes>", b.len()),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => format!("{:.2}", f),
    };

    if is_monetary(header) {
        match number.strip_prefix('-') {
            Some(magnitude) => format!("-{}{}", currency, magnitude),
            None => format!("{}{}", currency, number),
        }
    } else if header == PERCENT_HEADER {
        format!("{}%", number)
    } else {
        number
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers_and_reals() {
        assert_eq!(format_cell("Quantity", &Value::Integer(12), "$"), "12");
        assert_eq!(format_cell("Quantity", &Value::Real(2.0), "$"), "2.00");
        assert_eq!(format_cell("Psa", &Value::Real(12.3456), "$"), "12.35");
    }

    #[test]
    fn test_monetary_prefix() {
        assert_eq!(format_cell("Unit Price", &Value::Real(9.5), "$"), "$9.50");
        assert_eq!(format_cell("Profit", &Value::Real(-3.25), "£"), "-£3.25");
        assert_eq!(format_cell("Revenue", &Value::Integer(0), "$"), "$0");
    }

    #[test]
    fn test_margin_suffix_and_null() {
        assert_eq!(format_cell("Margin %", &Value::Real(66.666), "$"), "66.67%");
        assert_eq!(format_cell("Margin %", &Value::Null, "$"), "");
        assert_eq!(format_cell("Supplier", &Value::Text("Acme".into()), "$"), "Acme");
    }
}
