//! Card components for the headline sales figures.
//!
//! Provides one card per KPI:
//! - Sales in the selected period, across all time and in the previous fiscal year
//! - Year-to-date sales against the same months of the previous fiscal year
//! - The run-rate projection for the fiscal year
//! - The latest month or quarter against the one before it

use maud::{Markup, html};

use crate::{
    dashboard::{
        filters::FilterSpec,
        report::{Kpis, PeriodComparison, YearToDate},
    },
    html::{currency_rounded_with_tooltip, format_currency, format_percent},
};

/// The direction of a change between two figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trend {
    Up,
    Down,
    Flat,
    /// There is nothing to compare against.
    Unknown,
}

impl Trend {
    fn from_delta(delta_percent: Option<f64>) -> Self {
        match delta_percent {
            None => Trend::Unknown,
            Some(delta) if delta > 0.0 => Trend::Up,
            Some(delta) if delta < 0.0 => Trend::Down,
            Some(_) => Trend::Flat,
        }
    }

    fn style(&self) -> &'static str {
        match self {
            Trend::Up => "text-green-600 dark:text-green-400",
            Trend::Down => "text-red-600 dark:text-red-400",
            Trend::Flat | Trend::Unknown => "text-gray-600 dark:text-gray-400",
        }
    }

    fn arrow(&self) -> &'static str {
        match self {
            Trend::Up => "↑",
            Trend::Down => "↓",
            Trend::Flat => "→",
            Trend::Unknown => "",
        }
    }
}

/// Renders the grid of KPI cards.
///
/// # Arguments
/// * `kpis` - The headline figures for the current filters
/// * `filters` - The filters the figures were computed with, used for labels
///
/// # Returns
/// Maud markup containing the KPI card section.
pub(super) fn kpi_cards_view(kpis: &Kpis, filters: &FilterSpec) -> Markup {
    let fiscal_year = filters.fiscal_year.to_string();
    let previous_fiscal_year = filters.fiscal_year.previous().to_string();
    let period_label = if filters.use_custom_range {
        "Custom range"
    } else {
        fiscal_year.as_str()
    };

    html! {
        section id="kpis" class="w-full mx-auto mb-8" {
            div class="grid grid-cols-1 sm:grid-cols-2 lg:grid-cols-3 gap-4" {
                (total_card("Selected Period", period_label, kpis.selected_period_total))
                (total_card("All Time", "Selected consultant and provider", kpis.all_time_total))
                (total_card("Previous Fiscal Year", &previous_fiscal_year, kpis.previous_fiscal_year_total))
                (year_to_date_card(&kpis.year_to_date, &fiscal_year))
                (total_card("Projected Total", &format!("{fiscal_year} at the current run rate"), kpis.projection))
                (period_comparison_card(&kpis.period_over_period))
            }
        }
    }
}

fn card(title: &str, body: Markup) -> Markup {
    html! {
        div
            class="bg-white dark:bg-gray-800 border border-gray-200
                   dark:border-gray-700 rounded-lg p-4 shadow-md
                   flex flex-col justify-between"
            data-kpi=(title)
        {
            h4 class="text-lg font-semibold mb-2 truncate" title=(title) {
                (title)
            }

            (body)
        }
    }
}

fn total_card(title: &str, subtitle: &str, amount: f64) -> Markup {
    card(
        title,
        html! {
            div class="text-3xl font-bold mb-1" {
                (currency_rounded_with_tooltip(amount))
            }
            div class="text-sm text-gray-600 dark:text-gray-400" {
                (subtitle)
            }
        },
    )
}

fn year_to_date_card(year_to_date: &YearToDate, fiscal_year: &str) -> Markup {
    let trend = Trend::from_delta(year_to_date.delta_percent);

    card(
        "Year to Date",
        html! {
            div class="text-3xl font-bold mb-1" {
                (currency_rounded_with_tooltip(year_to_date.current))
            }
            div class="text-sm text-gray-600 dark:text-gray-400" {
                (fiscal_year) ", " (year_to_date.months) " months"
            }
            div class="text-sm" {
                "Same months last year: " (format_currency(year_to_date.prior))
            }
            (trend_line(trend, year_to_date.delta_percent))
        },
    )
}

fn period_comparison_card(comparison: &PeriodComparison) -> Markup {
    let trend = Trend::from_delta(comparison.delta_percent);

    card(
        comparison.label,
        html! {
            div class="text-3xl font-bold mb-1" {
                (currency_rounded_with_tooltip(comparison.current))
            }
            div class="text-sm" {
                "Previous: " (format_currency(comparison.previous))
            }
            (trend_line(trend, comparison.delta_percent))
        },
    )
}

fn trend_line(trend: Trend, delta_percent: Option<f64>) -> Markup {
    html! {
        div class={"text-sm font-medium " (trend.style())} data-trend=(format!("{trend:?}")) {
            (trend.arrow()) " " (format_percent(delta_percent))
        }
    }
}

#[cfg(test)]
mod tests {
    use scraper::{Html, Selector};

    use crate::{
        dashboard::{
            filters::{Aggregation, FilterSpec, Selection},
            report::{Kpis, PeriodComparison, YearToDate},
        },
        period::FiscalYear,
    };

    use super::{Trend, kpi_cards_view};

    fn create_test_kpis(delta_percent: Option<f64>) -> Kpis {
        Kpis {
            selected_period_total: 300.0,
            all_time_total: 1000.0,
            previous_fiscal_year_total: 600.0,
            year_to_date: YearToDate {
                current: 300.0,
                prior: 0.0,
                delta_percent: None,
                months: 2,
            },
            projection: 1800.0,
            period_over_period: PeriodComparison {
                current: 200.0,
                previous: 100.0,
                delta_percent,
                label: "MoM",
            },
        }
    }

    fn create_test_filters() -> FilterSpec {
        FilterSpec {
            aggregation: Aggregation::Monthly,
            fiscal_year: FiscalYear::new(2024),
            use_custom_range: false,
            range_from: None,
            range_to: None,
            consultant: Selection::All,
            provider: Selection::All,
            known_months: Vec::new(),
        }
    }

    #[test]
    fn trend_from_delta() {
        assert_eq!(Trend::from_delta(None), Trend::Unknown);
        assert_eq!(Trend::from_delta(Some(12.0)), Trend::Up);
        assert_eq!(Trend::from_delta(Some(-0.5)), Trend::Down);
        assert_eq!(Trend::from_delta(Some(0.0)), Trend::Flat);
    }

    #[test]
    fn renders_six_cards() {
        let html = Html::parse_fragment(
            &kpi_cards_view(&create_test_kpis(Some(100.0)), &create_test_filters()).into_string(),
        );

        let card_selector = Selector::parse("[data-kpi]").unwrap();
        let titles: Vec<&str> = html
            .select(&card_selector)
            .filter_map(|card| card.value().attr("data-kpi"))
            .collect();

        assert_eq!(
            titles,
            vec![
                "Selected Period",
                "All Time",
                "Previous Fiscal Year",
                "Year to Date",
                "Projected Total",
                "MoM"
            ]
        );
    }

    #[test]
    fn missing_delta_is_shown_as_not_applicable() {
        let html = Html::parse_fragment(
            &kpi_cards_view(&create_test_kpis(None), &create_test_filters()).into_string(),
        );

        let trend_selector = Selector::parse("[data-trend]").unwrap();
        let trends: Vec<String> = html
            .select(&trend_selector)
            .map(|element| element.text().collect::<String>())
            .collect();

        assert_eq!(trends.len(), 2);
        assert!(trends.iter().all(|text| text.contains("n/a")), "{trends:?}");
    }

    #[test]
    fn positive_delta_is_shown_as_increase() {
        let html = Html::parse_fragment(
            &kpi_cards_view(&create_test_kpis(Some(100.0)), &create_test_filters()).into_string(),
        );

        let trend_selector = Selector::parse("[data-trend='Up']").unwrap();
        let text: String = html
            .select(&trend_selector)
            .next()
            .unwrap()
            .text()
            .collect();

        assert_eq!(text.trim(), "↑ 100.0%");
    }
}
