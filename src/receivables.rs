//! Accounts receivable aging data.
//!
//! The dashboard does not compute anything from receivables. They are fetched
//! alongside the sales rows and passed straight through to the page.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::normalize::parse_amount;

/// Outstanding amounts grouped by how long they have been owed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgingBuckets {
    /// Not yet due.
    #[serde(deserialize_with = "deserialize_amount")]
    pub not_due: f64,
    /// Overdue by up to 30 days.
    #[serde(deserialize_with = "deserialize_amount")]
    pub upto_30: f64,
    /// Overdue by 31 to 60 days.
    #[serde(deserialize_with = "deserialize_amount")]
    pub more_30: f64,
    /// Overdue by 61 to 90 days.
    #[serde(deserialize_with = "deserialize_amount")]
    pub more_60: f64,
    /// Overdue by more than 90 days.
    #[serde(deserialize_with = "deserialize_amount")]
    pub more_90: f64,
    /// The total receivable as reported by the source.
    #[serde(deserialize_with = "deserialize_amount")]
    pub total: f64,
}

impl AgingBuckets {
    /// The buckets in display order paired with their labels, ending with the total.
    pub fn labelled(&self) -> [(&'static str, f64); 6] {
        [
            ("Not Due", self.not_due),
            ("Up to 30 Days", self.upto_30),
            ("31–60 Days", self.more_30),
            ("61–90 Days", self.more_60),
            ("90+ Days", self.more_90),
            ("Total Receivable", self.total),
        ]
    }

    /// The share of the total that `amount` represents, as a percentage.
    ///
    /// Returns 0 when the total is zero.
    pub fn percent_of_total(&self, amount: f64) -> f64 {
        if self.total == 0.0 {
            0.0
        } else {
            amount / self.total * 100.0
        }
    }
}

/// Receivables for the two lines of business.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Receivables {
    /// Student admission fees, if the source reported them.
    #[serde(alias = "admission_receivable")]
    pub admission: Option<AgingBuckets>,
    /// Migration service fees, if the source reported them.
    #[serde(alias = "migration_receivable")]
    pub migration: Option<AgingBuckets>,
}

/// Accepts amounts sent either as JSON numbers or as currency strings.
fn deserialize_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let amount = match Value::deserialize(deserializer)? {
        Value::Number(number) => number.as_f64().unwrap_or(0.0),
        Value::String(text) => parse_amount(&text),
        _ => 0.0,
    };

    Ok(amount)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{AgingBuckets, Receivables};

    #[test]
    fn deserializes_source_payload() {
        let payload = json!({
            "admission_receivable": {
                "not_due": 100,
                "upto_30": "$1,000.50",
                "more_90": null,
                "total": 1100.5
            },
            "migration_receivable": null
        });

        let receivables: Receivables = serde_json::from_value(payload).unwrap();

        assert_eq!(
            receivables.admission,
            Some(AgingBuckets {
                not_due: 100.0,
                upto_30: 1000.5,
                more_30: 0.0,
                more_60: 0.0,
                more_90: 0.0,
                total: 1100.5,
            })
        );
        assert_eq!(receivables.migration, None);
    }

    #[test]
    fn percent_of_total_guards_zero_total() {
        let buckets = AgingBuckets {
            not_due: 25.0,
            total: 100.0,
            ..Default::default()
        };

        assert_eq!(buckets.percent_of_total(buckets.not_due), 25.0);
        assert_eq!(AgingBuckets::default().percent_of_total(10.0), 0.0);
    }
}
