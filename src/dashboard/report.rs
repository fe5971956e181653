//! The figures, tables and chart series derived from the sales data.
//!
//! A [DashboardReport] is rebuilt from scratch for every filter change and is
//! never modified after it is built.

/// All derived dashboard data for one set of filters.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardReport {
    /// The headline figures shown as cards.
    pub kpis: Kpis,
    /// The data behind the charts.
    pub charts: ChartSeries,
    /// The rows of the breakdown tables.
    pub tables: Tables,
}

/// The headline figures.
#[derive(Debug, Clone, PartialEq)]
pub struct Kpis {
    /// Sales in the selected period.
    pub selected_period_total: f64,
    /// Sales across all time for the selected consultant and provider.
    pub all_time_total: f64,
    /// Sales in the fiscal year before the selected one.
    pub previous_fiscal_year_total: f64,
    /// Year-to-date sales against the prior fiscal year.
    pub year_to_date: YearToDate,
    /// The fiscal year total if the remaining months match the average so far.
    pub projection: f64,
    /// The last month or quarter against the one before.
    pub period_over_period: PeriodComparison,
}

/// Year-to-date sales compared with the same months of the previous fiscal year.
#[derive(Debug, Clone, PartialEq)]
pub struct YearToDate {
    /// Sales so far in the selected fiscal year.
    pub current: f64,
    /// Sales over the same months of the prior fiscal year.
    pub prior: f64,
    /// `None` when there is nothing to compare against.
    pub delta_percent: Option<f64>,
    /// How many fiscal months, counted from July, the comparison covers.
    pub months: usize,
}

/// The latest bucket compared with the one before it.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodComparison {
    /// Sales in the latest bucket.
    pub current: f64,
    /// Sales in the bucket before it.
    pub previous: f64,
    /// `None` when there is nothing to compare against.
    pub delta_percent: Option<f64>,
    /// "MoM" or "QoQ".
    pub label: &'static str,
}

/// Parallel lists of labels and values for a single-series chart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// Actual and projected sales for each month of the fiscal year.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectionSeries {
    pub labels: Vec<String>,
    pub actual: Vec<f64>,
    pub projected: Vec<f64>,
}

/// The data behind each dashboard chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub periods: Series,
    pub providers: Series,
    pub consultants: Series,
    pub projection: ProjectionSeries,
    pub fiscal_years: Series,
}

/// A month or quarter in the period breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodRow {
    pub label: String,
    pub sales: f64,
    pub count: usize,
    /// Sales per transaction, 0 if there were no transactions.
    pub average: f64,
}

/// A provider or consultant and their share of sales.
#[derive(Debug, Clone, PartialEq)]
pub struct ShareRow {
    pub label: String,
    pub sales: f64,
    pub count: usize,
    pub share_percent: f64,
}

/// A consultant selling less than half of the consultant average.
#[derive(Debug, Clone, PartialEq)]
pub struct Underperformer {
    pub name: String,
    pub sales: f64,
    pub percent_of_mean: f64,
}

/// The broad kind of provider, taken from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderCategory {
    /// Higher education.
    He,
    /// Vocational education and training.
    Vet,
    /// Professional year.
    Py,
    /// Anything else.
    Other,
}

impl ProviderCategory {
    /// Classifies a provider by the first of "HE", "VET" or "PY" found in
    /// its name, ignoring case.
    pub fn classify(provider: &str) -> Self {
        let provider = provider.to_uppercase();

        if provider.contains("HE") {
            ProviderCategory::He
        } else if provider.contains("VET") {
            ProviderCategory::Vet
        } else if provider.contains("PY") {
            ProviderCategory::Py
        } else {
            ProviderCategory::Other
        }
    }
}

/// A transaction count and sales sum.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CategoryTotals {
    pub count: usize,
    pub sales: f64,
}

impl CategoryTotals {
    pub(super) fn add(&mut self, sales: f64) {
        self.count += 1;
        self.sales += sales;
    }

    fn merge(&mut self, other: &CategoryTotals) {
        self.count += other.count;
        self.sales += other.sales;
    }
}

/// A consultant's sales split by provider category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsultantDetail {
    pub consultant: String,
    pub total: CategoryTotals,
    pub he: CategoryTotals,
    pub vet: CategoryTotals,
    pub py: CategoryTotals,
    /// Providers that match none of the other categories.
    pub other: CategoryTotals,
}

impl ConsultantDetail {
    pub(super) fn new(consultant: &str) -> Self {
        Self {
            consultant: consultant.to_owned(),
            ..Default::default()
        }
    }

    pub(super) fn add(&mut self, provider: &str, sales: f64) {
        self.total.add(sales);

        match ProviderCategory::classify(provider) {
            ProviderCategory::He => self.he.add(sales),
            ProviderCategory::Vet => self.vet.add(sales),
            ProviderCategory::Py => self.py.add(sales),
            ProviderCategory::Other => self.other.add(sales),
        }
    }
}

/// A fiscal year and its total sales.
#[derive(Debug, Clone, PartialEq)]
pub struct FiscalYearRow {
    pub label: String,
    pub sales: f64,
}

/// The data behind each dashboard table.
#[derive(Debug, Clone, PartialEq)]
pub struct Tables {
    pub periods: Vec<PeriodRow>,
    pub providers: Vec<ShareRow>,
    pub consultants: Vec<ShareRow>,
    pub underperformers: Vec<Underperformer>,
    pub consultant_details: Vec<ConsultantDetail>,
    pub fiscal_years: Vec<FiscalYearRow>,
}

impl Tables {
    /// The sum of every consultant's category detail.
    pub fn consultant_detail_totals(&self) -> ConsultantDetail {
        let mut totals = ConsultantDetail::new("Total");

        for detail in &self.consultant_details {
            totals.total.merge(&detail.total);
            totals.he.merge(&detail.he);
            totals.vet.merge(&detail.vet);
            totals.py.merge(&detail.py);
            totals.other.merge(&detail.other);
        }

        totals
    }
}

#[cfg(test)]
mod tests {
    use super::{ConsultantDetail, ProviderCategory};

    #[test]
    fn classifies_providers_in_priority_order() {
        let cases = [
            ("HE - Private", ProviderCategory::He),
            ("he - public", ProviderCategory::He),
            ("VET", ProviderCategory::Vet),
            ("Some vet college", ProviderCategory::Vet),
            ("PY", ProviderCategory::Py),
            ("Python Academy", ProviderCategory::Py),
            // "THE" contains "HE", so it wins over VET.
            ("THE VET SCHOOL", ProviderCategory::He),
            // So does "OTHER".
            ("Other", ProviderCategory::He),
            ("All", ProviderCategory::Other),
            ("Misc", ProviderCategory::Other),
        ];

        for (provider, want) in cases {
            assert_eq!(ProviderCategory::classify(provider), want, "{provider}");
        }
    }

    #[test]
    fn consultant_detail_accumulates_by_category() {
        let mut detail = ConsultantDetail::new("Asha");

        detail.add("HE - Private", 100.0);
        detail.add("VET", 50.0);
        detail.add("VET", 25.0);
        detail.add("Misc", 5.0);

        assert_eq!(detail.total.count, 4);
        assert_eq!(detail.total.sales, 180.0);
        assert_eq!(detail.he.count, 1);
        assert_eq!(detail.vet.count, 2);
        assert_eq!(detail.vet.sales, 75.0);
        assert_eq!(detail.py.count, 0);
        assert_eq!(detail.other.sales, 5.0);
    }
}
