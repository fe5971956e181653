//! The filters that select which sales the dashboard summarises.

use std::fmt;

use serde::Deserialize;

use crate::{
    normalize::{ALL_LABEL, Transaction},
    period::{FiscalYear, MonthKey},
};

/// How sales are bucketed over time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// One bucket per calendar month.
    #[default]
    Monthly,
    /// One bucket per fiscal quarter.
    Quarterly,
}

impl Aggregation {
    /// The short label for comparing consecutive buckets.
    pub fn comparison_label(&self) -> &'static str {
        match self {
            Aggregation::Monthly => "MoM",
            Aggregation::Quarterly => "QoQ",
        }
    }

    /// The value used in form fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Monthly => "monthly",
            Aggregation::Quarterly => "quarterly",
        }
    }
}

/// Either every value of a field, or exactly one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    /// Matches every value.
    #[default]
    All,
    /// Matches only this value.
    Only(String),
}

impl Selection {
    /// Whether `value` passes this selection.
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(wanted) => wanted == value,
        }
    }
}

impl From<&str> for Selection {
    /// "All" selects everything, any other text selects only itself.
    fn from(value: &str) -> Self {
        if value == ALL_LABEL {
            Selection::All
        } else {
            Selection::Only(value.to_owned())
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::All => f.write_str(ALL_LABEL),
            Selection::Only(value) => f.write_str(value),
        }
    }
}

/// Everything the aggregation engine needs to know about the user's choices.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    /// How the period breakdown is bucketed.
    pub aggregation: Aggregation,
    /// The fiscal year shown when no custom range is used.
    pub fiscal_year: FiscalYear,
    /// When true, the selected period is `range_from..=range_to` instead of
    /// `fiscal_year`. The fiscal year still drives the YTD and projection figures.
    pub use_custom_range: bool,
    /// One end of the custom range.
    pub range_from: Option<MonthKey>,
    /// The other end of the custom range.
    pub range_to: Option<MonthKey>,
    /// The consultant whose sales are shown.
    pub consultant: Selection,
    /// The provider whose sales are shown.
    pub provider: Selection,
    /// Every month present in the data set, in order.
    pub known_months: Vec<MonthKey>,
}

impl FilterSpec {
    /// Whether a transaction passes the consultant and provider filters.
    pub fn passes(&self, transaction: &Transaction) -> bool {
        self.consultant.matches(&transaction.consultant)
            && self.provider.matches(&transaction.provider)
    }

    /// The months covered by the custom range, in `known_months` order.
    ///
    /// The bounds may be given in either order. The range is empty if either
    /// bound is not a known month.
    pub fn custom_range_months(&self) -> &[MonthKey] {
        let position = |month: Option<MonthKey>| {
            month.and_then(|month| self.known_months.iter().position(|known| *known == month))
        };

        match (position(self.range_from), position(self.range_to)) {
            (Some(from), Some(to)) => &self.known_months[from.min(to)..=from.max(to)],
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    fn month(text: &str) -> MonthKey {
        text.parse().unwrap()
    }

    fn filters_with_range(from: &str, to: &str) -> FilterSpec {
        FilterSpec {
            aggregation: Aggregation::Monthly,
            fiscal_year: FiscalYear::new(2024),
            use_custom_range: true,
            range_from: Some(month(from)),
            range_to: Some(month(to)),
            consultant: Selection::All,
            provider: Selection::All,
            known_months: ["2024-05", "2024-07", "2024-08", "2024-10"]
                .into_iter()
                .map(month)
                .collect(),
        }
    }

    #[test]
    fn selection_from_all_label_selects_everything() {
        assert_eq!(Selection::from("All"), Selection::All);
        assert_eq!(Selection::from("Asha"), Selection::Only("Asha".to_owned()));
    }

    #[test]
    fn selection_matches() {
        assert!(Selection::All.matches("anything"));
        assert!(Selection::from("Asha").matches("Asha"));
        assert!(!Selection::from("Asha").matches("Bikash"));
    }

    #[test]
    fn custom_range_is_order_independent() {
        let forwards = filters_with_range("2024-07", "2024-10");
        let backwards = filters_with_range("2024-10", "2024-07");

        let want = vec![month("2024-07"), month("2024-08"), month("2024-10")];
        assert_eq!(forwards.custom_range_months(), want.as_slice());
        assert_eq!(backwards.custom_range_months(), want.as_slice());
    }

    #[test]
    fn custom_range_with_unknown_bound_is_empty() {
        let filters = filters_with_range("2024-06", "2024-10");

        assert!(filters.custom_range_months().is_empty());
    }

    #[test]
    fn passes_checks_consultant_and_provider() {
        let mut filters = filters_with_range("2024-07", "2024-10");
        filters.consultant = Selection::from("Asha");
        filters.provider = Selection::from("VET");

        let sale = |consultant: &str, provider: &str| {
            Transaction::new(date!(2024 - 07 - 01), 1.0, consultant, provider)
        };

        assert!(filters.passes(&sale("Asha", "VET")));
        assert!(!filters.passes(&sale("Asha", "HE")));
        assert!(!filters.passes(&sale("Bikash", "VET")));
    }
}
