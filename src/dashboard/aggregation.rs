//! Sales aggregation for the dashboard.
//!
//! [aggregate] turns the normalized transactions and the user's filters into
//! a [DashboardReport]. It is a pure function: it keeps no state between
//! calls and the same inputs always give the same report.

use std::collections::{BTreeMap, HashSet};

use crate::{
    dashboard::{
        filters::{Aggregation, FilterSpec},
        report::{
            ChartSeries, ConsultantDetail, DashboardReport, FiscalYearRow, Kpis, PeriodComparison,
            PeriodRow, ProjectionSeries, Series, ShareRow, Tables, Underperformer, YearToDate,
        },
    },
    normalize::Transaction,
    period::{FiscalQuarter, FiscalYear, MonthKey},
};

const MONTHS_PER_YEAR: usize = 12;

/// Consultants selling less than this fraction of the mean are flagged.
const UNDERPERFORMER_THRESHOLD: f64 = 0.5;

/// The running sales total and transaction count for one group.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(super) struct GroupTotal {
    pub sales: f64,
    pub count: usize,
}

/// Groups transactions by `key` and totals each group.
///
/// Within a group, sales are summed in the order the transactions are given.
pub(super) fn group_totals<'a, K, I, F>(transactions: I, key: F) -> BTreeMap<K, GroupTotal>
where
    K: Ord,
    I: IntoIterator<Item = &'a Transaction>,
    F: Fn(&Transaction) -> K,
{
    let mut groups: BTreeMap<K, GroupTotal> = BTreeMap::new();

    for transaction in transactions {
        let group = groups.entry(key(transaction)).or_default();
        group.sales += transaction.sales;
        group.count += 1;
    }

    groups
}

fn sum_sales<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> f64 {
    transactions
        .into_iter()
        .map(|transaction| transaction.sales)
        .sum()
}

/// `(current - previous) / previous` as a percentage, or `None` if
/// `previous` is not positive.
fn percent_change(current: f64, previous: f64) -> Option<f64> {
    (previous > 0.0).then(|| (current - previous) / previous * 100.0)
}

/// Builds the full dashboard report for `filters`.
///
/// # Arguments
/// * `transactions` - Every transaction in the data set
/// * `filters` - The user's filter choices
///
/// # Returns
/// The KPIs, chart series and tables for the selected period.
pub fn aggregate(transactions: &[Transaction], filters: &FilterSpec) -> DashboardReport {
    let (active_months, active_rows) = resolve_scope(transactions, filters);

    let fiscal_year = filters.fiscal_year;
    let current_months = fiscal_month_totals(transactions, filters, fiscal_year);
    let prior_months = fiscal_month_totals(transactions, filters, fiscal_year.previous());

    let year_to_date = year_to_date(&current_months, &prior_months);
    let run_rate = run_rate_average(&current_months[..year_to_date.months]);
    let projection =
        year_to_date.current + (MONTHS_PER_YEAR - year_to_date.months) as f64 * run_rate;

    let periods = period_breakdown(&active_rows, &active_months, filters.aggregation);
    let period_over_period = compare_last_periods(&periods, filters.aggregation);

    let provider_groups = group_totals(active_rows.iter().copied(), |t| t.provider.clone());
    let providers = share_breakdown(provider_groups);
    let consultant_groups = group_totals(active_rows.iter().copied(), |t| t.consultant.clone());
    let consultants = sort_by_sales_descending(share_breakdown(consultant_groups));
    let underperformers = find_underperformers(&consultants);
    let consultant_details = consultant_category_details(&active_rows);

    let projection_series =
        projection_series(fiscal_year, &current_months, year_to_date.months, run_rate);
    let fiscal_years = fiscal_year_totals(transactions);

    let kpis = Kpis {
        selected_period_total: sum_sales(active_rows.iter().copied()),
        all_time_total: sum_sales(transactions.iter().filter(|t| filters.passes(t))),
        previous_fiscal_year_total: sum_sales(fiscal_year_rows(
            transactions,
            filters,
            fiscal_year.previous(),
        )),
        year_to_date,
        projection,
        period_over_period,
    };

    let charts = ChartSeries {
        periods: Series {
            labels: periods.iter().map(|row| row.label.clone()).collect(),
            values: periods.iter().map(|row| row.sales).collect(),
        },
        providers: share_series(&providers),
        consultants: share_series(&consultants),
        projection: projection_series,
        fiscal_years: Series {
            labels: fiscal_years.iter().map(|row| row.label.clone()).collect(),
            values: fiscal_years.iter().map(|row| row.sales).collect(),
        },
    };

    DashboardReport {
        kpis,
        charts,
        tables: Tables {
            periods,
            providers,
            consultants,
            underperformers,
            consultant_details,
            fiscal_years,
        },
    }
}

/// Works out which months and transactions fall in the selected period.
///
/// With a custom range, transactions are matched by month against the range
/// of known months. Otherwise they are matched by date against the fiscal year.
fn resolve_scope<'a>(
    transactions: &'a [Transaction],
    filters: &'a FilterSpec,
) -> (Vec<MonthKey>, Vec<&'a Transaction>) {
    if filters.use_custom_range {
        let months = filters.custom_range_months().to_vec();
        let month_set: HashSet<MonthKey> = months.iter().copied().collect();

        let rows = transactions
            .iter()
            .filter(|t| filters.passes(t) && month_set.contains(&t.month()))
            .collect();

        (months, rows)
    } else {
        let rows = fiscal_year_rows(transactions, filters, filters.fiscal_year).collect();

        (filters.fiscal_year.months(), rows)
    }
}

/// Transactions passing the consultant and provider filters dated within `fiscal_year`.
fn fiscal_year_rows<'a>(
    transactions: &'a [Transaction],
    filters: &'a FilterSpec,
    fiscal_year: FiscalYear,
) -> impl Iterator<Item = &'a Transaction> {
    let date_range = fiscal_year.date_range();

    transactions.iter().filter(move |t| {
        filters.passes(t)
            && date_range
                .as_ref()
                .is_some_and(|range| range.contains(&t.date()))
    })
}

/// Total sales for each month of `fiscal_year`, July first.
fn fiscal_month_totals(
    transactions: &[Transaction],
    filters: &FilterSpec,
    fiscal_year: FiscalYear,
) -> Vec<f64> {
    let by_month = group_totals(fiscal_year_rows(transactions, filters, fiscal_year), |t| {
        t.month()
    });

    fiscal_year
        .months()
        .iter()
        .map(|month| by_month.get(month).map_or(0.0, |group| group.sales))
        .collect()
}

/// Compares the current fiscal year, up to its last month with sales, with
/// the same number of months from the start of the prior fiscal year.
fn year_to_date(current_months: &[f64], prior_months: &[f64]) -> YearToDate {
    let months = current_months
        .iter()
        .rposition(|sales| *sales > 0.0)
        .map_or(0, |index| index + 1);

    let current: f64 = current_months[..months].iter().sum();
    let prior: f64 = prior_months[..months].iter().sum();

    YearToDate {
        current,
        prior,
        delta_percent: percent_change(current, prior),
        months,
    }
}

/// The average monthly sales used for the run-rate projection.
///
/// Months with sales are averaged if there are any. Otherwise every month is
/// averaged, which gives 0 for an empty slice.
fn run_rate_average(months: &[f64]) -> f64 {
    let with_sales: Vec<f64> = months
        .iter()
        .copied()
        .filter(|sales| *sales > 0.0)
        .collect();

    let (sum, count) = if with_sales.is_empty() {
        (months.iter().sum::<f64>(), months.len())
    } else {
        (with_sales.iter().sum::<f64>(), with_sales.len())
    };

    sum / count.max(1) as f64
}

/// Buckets the active transactions by month or fiscal quarter.
///
/// Every active month (or each quarter they fall in) gets a row, even if it
/// has no sales.
fn period_breakdown(
    active_rows: &[&Transaction],
    active_months: &[MonthKey],
    aggregation: Aggregation,
) -> Vec<PeriodRow> {
    match aggregation {
        Aggregation::Monthly => {
            let groups = group_totals(active_rows.iter().copied(), |t| t.month());

            active_months
                .iter()
                .map(|month| period_row(month.pretty(), groups.get(month)))
                .collect()
        }
        Aggregation::Quarterly => {
            let groups = group_totals(active_rows.iter().copied(), |t| {
                FiscalQuarter::from(t.month())
            });

            let mut quarters: Vec<FiscalQuarter> = Vec::new();
            for quarter in active_months.iter().copied().map(FiscalQuarter::from) {
                if !quarters.contains(&quarter) {
                    quarters.push(quarter);
                }
            }

            quarters
                .iter()
                .map(|quarter| period_row(quarter.to_string(), groups.get(quarter)))
                .collect()
        }
    }
}

fn period_row(label: String, group: Option<&GroupTotal>) -> PeriodRow {
    let GroupTotal { sales, count } = group.copied().unwrap_or_default();

    PeriodRow {
        label,
        sales,
        count,
        average: if count > 0 { sales / count as f64 } else { 0.0 },
    }
}

/// Compares the last two period buckets. Missing buckets count as zero sales.
fn compare_last_periods(periods: &[PeriodRow], aggregation: Aggregation) -> PeriodComparison {
    let sales_from_end = |offset: usize| {
        periods
            .len()
            .checked_sub(offset)
            .and_then(|index| periods.get(index))
            .map_or(0.0, |row| row.sales)
    };

    let current = sales_from_end(1);
    let previous = sales_from_end(2);

    PeriodComparison {
        current,
        previous,
        delta_percent: percent_change(current, previous),
        label: aggregation.comparison_label(),
    }
}

/// Converts grouped totals into rows with each group's share of the total.
///
/// Rows keep the key order of `groups`. The share is taken against 1 when the
/// total is 0.
fn share_breakdown(groups: BTreeMap<String, GroupTotal>) -> Vec<ShareRow> {
    let denominator = share_denominator(groups.values().map(|group| group.sales).sum());

    groups
        .into_iter()
        .map(|(label, group)| ShareRow {
            label,
            sales: group.sales,
            count: group.count,
            share_percent: group.sales / denominator * 100.0,
        })
        .collect()
}

fn share_denominator(total: f64) -> f64 {
    if total == 0.0 { 1.0 } else { total }
}

/// Sorts rows by sales, highest first, breaking ties alphabetically.
fn sort_by_sales_descending(mut rows: Vec<ShareRow>) -> Vec<ShareRow> {
    rows.sort_by(|a, b| {
        b.sales
            .total_cmp(&a.sales)
            .then_with(|| a.label.cmp(&b.label))
    });
    rows
}

fn share_series(rows: &[ShareRow]) -> Series {
    Series {
        labels: rows.iter().map(|row| row.label.clone()).collect(),
        values: rows.iter().map(|row| row.sales).collect(),
    }
}

/// Finds consultants whose sales are strictly below half of the mean
/// consultant sales.
///
/// The mean is taken over the same total as the consultant shares, so a zero
/// total counts as 1 and every consultant without sales is flagged.
fn find_underperformers(consultants: &[ShareRow]) -> Vec<Underperformer> {
    if consultants.is_empty() {
        return Vec::new();
    }

    let mean = share_denominator(consultants.iter().map(|row| row.sales).sum())
        / consultants.len() as f64;
    let mean_denominator = if mean == 0.0 { 1.0 } else { mean };

    consultants
        .iter()
        .filter(|row| row.sales < UNDERPERFORMER_THRESHOLD * mean)
        .map(|row| Underperformer {
            name: row.label.clone(),
            sales: row.sales,
            percent_of_mean: row.sales / mean_denominator * 100.0,
        })
        .collect()
}

/// Splits each consultant's active sales by provider category.
///
/// Consultants are listed alphabetically.
fn consultant_category_details(active_rows: &[&Transaction]) -> Vec<ConsultantDetail> {
    let mut details: BTreeMap<&str, ConsultantDetail> = BTreeMap::new();

    for transaction in active_rows {
        details
            .entry(transaction.consultant.as_str())
            .or_insert_with(|| ConsultantDetail::new(&transaction.consultant))
            .add(&transaction.provider, transaction.sales);
    }

    details.into_values().collect()
}

/// Actual sales for every month of the fiscal year alongside the run-rate
/// figure for the months that have not been reached yet.
///
/// A month at or after position `elapsed_months` gets the run-rate average,
/// earlier months get 0 so the two series never overlap.
fn projection_series(
    fiscal_year: FiscalYear,
    current_months: &[f64],
    elapsed_months: usize,
    run_rate: f64,
) -> ProjectionSeries {
    ProjectionSeries {
        labels: fiscal_year.months().iter().map(MonthKey::pretty).collect(),
        actual: current_months.to_vec(),
        projected: (0..current_months.len())
            .map(|index| if index < elapsed_months { 0.0 } else { run_rate })
            .collect(),
    }
}

/// Total sales per fiscal year over every transaction, ignoring all filters.
fn fiscal_year_totals(transactions: &[Transaction]) -> Vec<FiscalYearRow> {
    group_totals(transactions, |t| FiscalYear::containing(t.date()))
        .into_iter()
        .map(|(fiscal_year, group)| FiscalYearRow {
            label: fiscal_year.to_string(),
            sales: group.sales,
        })
        .collect()
}
