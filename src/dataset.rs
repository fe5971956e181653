//! The loaded sales data and the filter choices it offers.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    dashboard::{Aggregation, FilterSpec, Selection},
    normalize::{ALL_LABEL, Transaction},
    period::{FiscalYear, MonthKey},
    receivables::Receivables,
};

/// Everything fetched from the remote source in one go.
///
/// Snapshots are what gets written to and read back from the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The normalized sales rows.
    pub transactions: Vec<Transaction>,
    /// The receivables aging summary.
    pub receivables: Receivables,
    /// When the data was fetched from the remote source.
    #[serde(with = "time::serde::rfc3339")]
    pub fetched_at: OffsetDateTime,
}

/// Where the current data set was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    /// Read back from the SQLite cache.
    Cache,
    /// Fetched from the remote source.
    Network,
}

impl DataOrigin {
    /// A short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            DataOrigin::Cache => "cache",
            DataOrigin::Network => "network",
        }
    }
}

/// The values each dashboard filter can take.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterDomains {
    /// Every month with at least one transaction, oldest first.
    pub months: Vec<MonthKey>,
    /// Every fiscal year with at least one transaction, oldest first.
    pub fiscal_years: Vec<FiscalYear>,
    /// Sorted consultant names, including "All".
    pub consultants: Vec<String>,
    /// Sorted provider names, including "All".
    pub providers: Vec<String>,
}

impl FilterDomains {
    /// Collects the filter values present in `transactions`.
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let mut months = BTreeSet::new();
        let mut fiscal_years = BTreeSet::new();
        let mut consultants = BTreeSet::from([ALL_LABEL.to_owned()]);
        let mut providers = BTreeSet::from([ALL_LABEL.to_owned()]);

        for transaction in transactions {
            months.insert(transaction.month());
            fiscal_years.insert(FiscalYear::containing(transaction.date()));
            consultants.insert(transaction.consultant.clone());
            providers.insert(transaction.provider.clone());
        }

        Self {
            months: months.into_iter().collect(),
            fiscal_years: fiscal_years.into_iter().collect(),
            consultants: consultants.into_iter().collect(),
            providers: providers.into_iter().collect(),
        }
    }
}

/// An immutable, fully normalized data set.
///
/// A new data set is built for every successful load and swapped in whole, so
/// readers never see a partially updated collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    snapshot: Snapshot,
    domains: FilterDomains,
    origin: DataOrigin,
}

impl Dataset {
    /// Create a data set from a snapshot, working out its filter domains.
    pub fn new(snapshot: Snapshot, origin: DataOrigin) -> Self {
        let domains = FilterDomains::from_transactions(&snapshot.transactions);

        Self {
            snapshot,
            domains,
            origin,
        }
    }

    /// The normalized transactions, in source order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.snapshot.transactions
    }

    /// The receivables summary fetched with the transactions.
    pub fn receivables(&self) -> &Receivables {
        &self.snapshot.receivables
    }

    /// The values each filter can take.
    pub fn domains(&self) -> &FilterDomains {
        &self.domains
    }

    /// Where this data set was loaded from.
    pub fn origin(&self) -> DataOrigin {
        self.origin
    }

    /// When the data was fetched from the remote source.
    pub fn fetched_at(&self) -> OffsetDateTime {
        self.snapshot.fetched_at
    }

    /// The filters shown when the dashboard is first opened.
    ///
    /// Monthly buckets for the fiscal year of the latest month, with the custom
    /// range spanning every known month but switched off.
    pub fn default_filters(&self) -> FilterSpec {
        let first_month = self.domains.months.first().copied();
        let latest_month = self.domains.months.last().copied();

        let fiscal_year = latest_month
            .map(|month| month.fiscal_year())
            .unwrap_or_else(|| FiscalYear::containing(self.snapshot.fetched_at.date()));

        FilterSpec {
            aggregation: Aggregation::Monthly,
            fiscal_year,
            use_custom_range: false,
            range_from: first_month,
            range_to: latest_month,
            consultant: Selection::All,
            provider: Selection::All,
            known_months: self.domains.months.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::{date, datetime};

    use super::*;

    fn create_test_dataset(transactions: Vec<Transaction>) -> Dataset {
        Dataset::new(
            Snapshot {
                transactions,
                receivables: Receivables::default(),
                fetched_at: datetime!(2025-01-15 09:30 UTC),
            },
            DataOrigin::Network,
        )
    }

    #[test]
    fn domains_are_sorted_and_include_all() {
        let dataset = create_test_dataset(vec![
            Transaction::new(date!(2024 - 08 - 01), 1.0, "Zed", "VET"),
            Transaction::new(date!(2023 - 03 - 01), 1.0, "Amy", "HE"),
            Transaction::new(date!(2024 - 08 - 20), 1.0, "Amy", "All"),
        ]);

        let domains = dataset.domains();

        assert_eq!(
            domains.months,
            vec![
                MonthKey::new(2023, 3).unwrap(),
                MonthKey::new(2024, 8).unwrap()
            ]
        );
        assert_eq!(
            domains.fiscal_years,
            vec![FiscalYear::new(2022), FiscalYear::new(2024)]
        );
        assert_eq!(domains.consultants, vec!["All", "Amy", "Zed"]);
        assert_eq!(domains.providers, vec!["All", "HE", "VET"]);
    }

    #[test]
    fn default_filters_use_latest_fiscal_year() {
        let dataset = create_test_dataset(vec![
            Transaction::new(date!(2023 - 03 - 01), 1.0, "Amy", "HE"),
            Transaction::new(date!(2024 - 08 - 01), 1.0, "Zed", "VET"),
        ]);

        let filters = dataset.default_filters();

        assert_eq!(filters.aggregation, Aggregation::Monthly);
        assert_eq!(filters.fiscal_year, FiscalYear::new(2024));
        assert!(!filters.use_custom_range);
        assert_eq!(filters.range_from, MonthKey::new(2023, 3));
        assert_eq!(filters.range_to, MonthKey::new(2024, 8));
        assert_eq!(filters.consultant, Selection::All);
        assert_eq!(filters.provider, Selection::All);
        assert_eq!(filters.known_months.len(), 2);
    }

    #[test]
    fn default_filters_without_data_fall_back_to_fetch_date() {
        let dataset = create_test_dataset(Vec::new());

        let filters = dataset.default_filters();

        assert_eq!(filters.fiscal_year, FiscalYear::new(2024));
        assert_eq!(filters.range_from, None);
        assert!(filters.known_months.is_empty());
    }
}
