//! Converts raw rows from the sales sheet into [Transaction]s.
//!
//! Rows arrive as positional JSON arrays. Only four columns matter to the
//! dashboard; everything else in the row is ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::Date;

use crate::period::{DateParser, MonthKey};

/// The label used when a row has no consultant or provider.
pub const ALL_LABEL: &str = "All";

const PROVIDER_COLUMN: usize = 5;
const DATE_COLUMN: usize = 6;
const AMOUNT_COLUMN: usize = 7;
const CONSULTANT_COLUMN: usize = 8;

/// A raw row as delivered by the sales sheet.
pub type RawRow = Vec<Value>;

/// A single dated sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredTransaction")]
pub struct Transaction {
    date: Date,
    #[serde(skip_serializing)]
    month: MonthKey,
    /// The sale amount.
    pub sales: f64,
    /// The consultant who made the sale, or [ALL_LABEL] if unknown.
    pub consultant: String,
    /// The education provider for the sale, or [ALL_LABEL] if unknown.
    pub provider: String,
}

impl Transaction {
    /// Create a transaction, deriving its month from `date`.
    pub fn new(date: Date, sales: f64, consultant: &str, provider: &str) -> Self {
        Self {
            date,
            month: MonthKey::from(date),
            sales,
            consultant: consultant.to_owned(),
            provider: provider.to_owned(),
        }
    }

    /// The date of the sale.
    pub fn date(&self) -> Date {
        self.date
    }

    /// The month of the sale.
    pub fn month(&self) -> MonthKey {
        self.month
    }
}

/// The stored form of a [Transaction]. The month is always derived again
/// from the date.
#[derive(Deserialize)]
struct StoredTransaction {
    date: Date,
    sales: f64,
    consultant: String,
    provider: String,
}

impl From<StoredTransaction> for Transaction {
    fn from(stored: StoredTransaction) -> Self {
        let StoredTransaction {
            date,
            sales,
            consultant,
            provider,
        } = stored;

        Transaction::new(date, sales, &consultant, &provider)
    }
}

/// Normalizes a batch of raw rows.
///
/// Rows with a missing or unparseable date are dropped. Unparseable amounts
/// become zero so that the row still counts towards its consultant and
/// provider.
pub fn normalize_rows(rows: &[RawRow]) -> Vec<Transaction> {
    let mut date_parser = DateParser::new();

    let transactions: Vec<Transaction> = rows
        .iter()
        .enumerate()
        .filter_map(|(row_number, row)| {
            let date_text = cell_text(row, DATE_COLUMN).unwrap_or_default();

            let Some(date) = date_parser.parse(&date_text) else {
                tracing::debug!("Dropping row {row_number}: could not parse date {date_text:?}");
                return None;
            };

            let amount = cell_text(row, AMOUNT_COLUMN).unwrap_or_default();

            Some(Transaction::new(
                date,
                parse_amount(&amount),
                &label_or_all(row, CONSULTANT_COLUMN),
                &label_or_all(row, PROVIDER_COLUMN),
            ))
        })
        .collect();

    let dropped = rows.len() - transactions.len();
    if dropped > 0 {
        tracing::info!(
            "Dropped {dropped} of {} rows with missing or invalid dates",
            rows.len()
        );
    }

    transactions
}

/// Parses a currency formatted amount such as "$1,234.50".
///
/// Dollar signs and thousands separators are removed and the longest numeric
/// prefix is parsed, so "12.5 AUD" is 12.5. Returns 0 if there is no number.
pub fn parse_amount(text: &str) -> f64 {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    let cleaned = cleaned.trim_start();

    let prefix_len = numeric_prefix_len(cleaned);

    cleaned[..prefix_len]
        .parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite())
        .unwrap_or(0.0)
}

fn numeric_prefix_len(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }

    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }

    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }

    if end - digits_start == 0 || &text[digits_start..end] == "." {
        return 0;
    }

    // Exponent, only if it is followed by at least one digit.
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exponent_end = end + 1;
        if matches!(bytes.get(exponent_end), Some(b'+' | b'-')) {
            exponent_end += 1;
        }
        let exponent_digits_start = exponent_end;
        while exponent_end < bytes.len() && bytes[exponent_end].is_ascii_digit() {
            exponent_end += 1;
        }
        if exponent_end > exponent_digits_start {
            end = exponent_end;
        }
    }

    end
}

/// The text of a cell, or `None` if the cell is missing or null.
fn cell_text(row: &[Value], column: usize) -> Option<String> {
    match row.get(column)? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn label_or_all(row: &[Value], column: usize) -> String {
    match cell_text(row, column) {
        Some(text) if !text.is_empty() => text,
        _ => ALL_LABEL.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::date;

    use super::*;

    fn row(provider: Value, date: Value, amount: Value, consultant: Value) -> RawRow {
        vec![
            json!(1),
            json!("student"),
            json!(""),
            json!(""),
            json!(""),
            provider,
            date,
            amount,
            consultant,
        ]
    }

    #[test]
    fn normalizes_well_formed_rows() {
        let rows = vec![row(
            json!("HE - Private"),
            json!("2024-07-15"),
            json!("$1,234.50"),
            json!("Asha"),
        )];

        let transactions = normalize_rows(&rows);

        assert_eq!(
            transactions,
            vec![Transaction::new(
                date!(2024 - 07 - 15),
                1234.5,
                "Asha",
                "HE - Private"
            )]
        );
    }

    #[test]
    fn drops_rows_without_a_valid_date() {
        let rows = vec![
            row(json!("VET"), json!("not a date"), json!("100"), json!("Asha")),
            row(json!("VET"), Value::Null, json!("100"), json!("Asha")),
            vec![json!("short row")],
            row(json!("VET"), json!("5-Aug-24"), json!("100"), json!("Asha")),
        ];

        let transactions = normalize_rows(&rows);

        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].date(), date!(2024 - 08 - 05));
    }

    #[test]
    fn invalid_amounts_become_zero() {
        let rows = vec![
            row(json!("VET"), json!("2024-07-01"), json!("n/a"), json!("Asha")),
            row(json!("VET"), json!("2024-07-01"), Value::Null, json!("Asha")),
        ];

        let transactions = normalize_rows(&rows);

        assert_eq!(transactions.len(), 2);
        assert!(transactions.iter().all(|t| t.sales == 0.0));
    }

    #[test]
    fn numeric_amounts_are_accepted() {
        let rows = vec![row(
            json!("VET"),
            json!("2024-07-01"),
            json!(250.75),
            json!("Asha"),
        )];

        assert_eq!(normalize_rows(&rows)[0].sales, 250.75);
    }

    #[test]
    fn missing_labels_default_to_all() {
        let rows = vec![row(json!(""), json!("2024-07-01"), json!("10"), Value::Null)];

        let transactions = normalize_rows(&rows);

        assert_eq!(transactions[0].consultant, ALL_LABEL);
        assert_eq!(transactions[0].provider, ALL_LABEL);
    }

    #[test]
    fn parse_amount_handles_currency_text() {
        let cases = [
            ("$1,234.50", 1234.5),
            ("  -$20 ", -20.0),
            ("12.5 AUD", 12.5),
            (".5", 0.5),
            ("1e3", 1000.0),
            ("7e", 7.0),
            ("", 0.0),
            ("$", 0.0),
            ("abc", 0.0),
            (".", 0.0),
        ];

        for (text, want) in cases {
            assert_eq!(parse_amount(text), want, "parsing {text:?}");
        }
    }

    #[test]
    fn month_is_always_derived_from_date() {
        let rows = vec![
            row(json!("VET"), json!("2024-07-31"), json!("1"), json!("A")),
            row(json!("VET"), json!("1-Jan-25"), json!("1"), json!("A")),
            row(json!("VET"), json!("June 30, 2025"), json!("1"), json!("A")),
        ];

        for transaction in normalize_rows(&rows) {
            assert_eq!(transaction.month(), MonthKey::from(transaction.date()));
        }
    }

    #[test]
    fn stored_month_is_derived_from_date() {
        let transaction = Transaction::new(date!(2024 - 07 - 15), 10.0, "Asha", "VET");
        let mut stored = serde_json::to_value(&transaction).unwrap();
        assert!(stored.get("month").is_none());
        stored["month"] = serde_json::to_value(MonthKey::new(1999, 1)).unwrap();

        let restored: Transaction = serde_json::from_value(stored).unwrap();

        assert_eq!(restored, transaction);
        assert_eq!(Some(restored.month()), MonthKey::new(2024, 7));
    }
}
