//! Chart generation and rendering for the dashboard.
//!
//! This module creates interactive ECharts visualizations for the sales data:
//! - **Period Chart**: Sales per month or fiscal quarter in the selected period
//! - **Provider Chart**: Sales per provider in the selected period
//! - **Consultant Chart**: Sales per consultant in the selected period
//! - **Projection Chart**: Actual sales per month of the fiscal year with the
//!   run-rate projection stacked on the months still to come
//! - **Fiscal Year Chart**: Total sales per fiscal year across all data
//!
//! Each chart is generated as JSON configuration for the ECharts library and
//! rendered with corresponding HTML containers and JavaScript initialization code.

use charming::{
    Chart,
    component::{Axis, Grid, Legend, Title},
    element::{
        AxisLabel, AxisPointer, AxisPointerType, AxisType, Emphasis, EmphasisFocus, JsFunction,
        Tooltip, Trigger,
    },
    series::bar,
};
use maud::{Markup, PreEscaped, html};

use crate::{
    dashboard::{
        filters::{Aggregation, FilterSpec},
        report::{ChartSeries, ProjectionSeries, Series},
    },
    html::HeadElement,
};

/// A dashboard chart with its HTML container ID and ECharts configuration.
pub(super) struct DashboardChart {
    /// The HTML element ID to use for the chart (kebab-case)
    pub id: &'static str,
    /// The ECharts configuration as a JSON string
    pub options: String,
}

/// Builds every dashboard chart from the report's chart series.
pub(super) fn build_dashboard_charts(
    series: &ChartSeries,
    filters: &FilterSpec,
) -> [DashboardChart; 5] {
    [
        DashboardChart {
            id: "period-chart",
            options: period_chart(&series.periods, filters.aggregation).to_string(),
        },
        DashboardChart {
            id: "projection-chart",
            options: projection_chart(&series.projection, &filters.fiscal_year.to_string())
                .to_string(),
        },
        DashboardChart {
            id: "provider-chart",
            options: ranking_chart("Sales by Provider", "Provider", &series.providers).to_string(),
        },
        DashboardChart {
            id: "consultant-chart",
            options: ranking_chart("Sales by Consultant", "Consultant", &series.consultants)
                .to_string(),
        },
        DashboardChart {
            id: "fiscal-year-chart",
            options: fiscal_year_chart(&series.fiscal_years).to_string(),
        },
    ]
}

/// The scripts the chart containers need in the page head.
pub(super) fn chart_head_elements() -> [HeadElement; 1] {
    [HeadElement::ScriptLink(
        "/static/echarts.6.0.0.min.js".to_owned(),
    )]
}

/// Renders the HTML containers for dashboard charts.
///
/// # Arguments
/// * `charts` - The charts to render containers for
///
/// # Returns
/// Maud markup containing a grid of chart container divs.
pub(super) fn charts_view(charts: &[DashboardChart]) -> Markup {
    html!(
        section
            id="charts"
            class="w-full mx-auto mb-4"
        {
            div class="grid grid-cols-1 xl:grid-cols-2 gap-4"
            {
                @for chart in charts {
                    div
                        id=(chart.id)
                        class="min-h-[380px] rounded dark:bg-gray-100"
                    {}
                }
            }
        }
    )
}

/// Generates JavaScript initialization code for dashboard charts.
///
/// Creates a script that initializes ECharts instances with dark mode support
/// and responsive resizing. The script must come after the chart containers,
/// which also lets it run again when HTMX swaps in new dashboard content.
///
/// # Arguments
/// * `charts` - The charts to generate initialization scripts for
///
/// # Returns
/// A script element containing the initialization JavaScript.
pub(super) fn charts_script(charts: &[DashboardChart]) -> Markup {
    let script_content = charts
        .iter()
        .map(|chart| {
            format!(
                r#"(function() {{
                    const chartDom = document.getElementById("{}");
                    const chart = echarts.init(chartDom);
                    const option = {};
                    chart.setOption(option);

                    window.addEventListener('resize', chart.resize);

                    const darkModeMediaQuery = window.matchMedia('(prefers-color-scheme: dark)');
                    const updateTheme = () => {{
                        const isDarkMode = darkModeMediaQuery.matches;
                        chart.setTheme(isDarkMode ? 'dark' : 'default');
                    }}
                    darkModeMediaQuery.addEventListener('change', updateTheme);
                    updateTheme();
                }})();"#,
                chart.id, chart.options
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    html!(script { (PreEscaped(script_content)) })
}

fn period_chart(series: &Series, aggregation: Aggregation) -> Chart {
    let title = match aggregation {
        Aggregation::Monthly => "Sales by Month",
        Aggregation::Quarterly => "Sales by Quarter",
    };

    Chart::new()
        .title(Title::new().text(title).subtext("Selected period"))
        .tooltip(currency_tooltip())
        .grid(default_grid())
        .x_axis(
            Axis::new()
                .type_(AxisType::Category)
                .data(series.labels.clone()),
        )
        .y_axis(currency_axis())
        .series(bar::Bar::new().name("Sales").data(series.values.clone()))
}

fn projection_chart(series: &ProjectionSeries, fiscal_year: &str) -> Chart {
    Chart::new()
        .title(
            Title::new()
                .text("Run-Rate Projection")
                .subtext(fiscal_year)
                .left(20)
                .top("1%"),
        )
        .tooltip(currency_tooltip())
        .legend(Legend::new().left(250).top("1%"))
        .grid(default_grid().top(90))
        .x_axis(
            Axis::new()
                .type_(AxisType::Category)
                .data(series.labels.clone()),
        )
        .y_axis(currency_axis())
        .series(
            bar::Bar::new()
                .name("Actual")
                .stack("Sales")
                .emphasis(Emphasis::new().focus(EmphasisFocus::Series))
                .data(series.actual.clone()),
        )
        .series(
            bar::Bar::new()
                .name("Projected")
                .stack("Sales")
                .emphasis(Emphasis::new().focus(EmphasisFocus::Series))
                .data(series.projected.clone()),
        )
}

/// A horizontal bar chart listing each label's sales.
///
/// Labels are drawn top to bottom in the order given.
fn ranking_chart(title: &str, series_name: &str, series: &Series) -> Chart {
    // ECharts draws the first category at the bottom of a vertical axis.
    let labels: Vec<String> = series.labels.iter().rev().cloned().collect();
    let values: Vec<f64> = series.values.iter().rev().copied().collect();

    Chart::new()
        .title(Title::new().text(title).subtext("Selected period"))
        .tooltip(currency_tooltip())
        .grid(default_grid())
        .x_axis(currency_axis())
        .y_axis(Axis::new().type_(AxisType::Category).data(labels))
        .series(bar::Bar::new().name(series_name).data(values))
}

fn fiscal_year_chart(series: &Series) -> Chart {
    Chart::new()
        .title(
            Title::new()
                .text("Sales by Fiscal Year")
                .subtext("All consultants and providers"),
        )
        .tooltip(currency_tooltip())
        .grid(default_grid())
        .x_axis(
            Axis::new()
                .type_(AxisType::Category)
                .data(series.labels.clone()),
        )
        .y_axis(currency_axis())
        .series(bar::Bar::new().name("Sales").data(series.values.clone()))
}

fn default_grid() -> Grid {
    Grid::new()
        .left("3%")
        .right("4%")
        .bottom("3%")
        .contain_label(true)
}

fn currency_axis() -> Axis {
    Axis::new()
        .type_(AxisType::Value)
        .axis_label(AxisLabel::new().formatter(currency_formatter()))
}

#[inline]
fn currency_formatter() -> JsFunction {
    JsFunction::new_with_args(
        "number",
        "const currencyFormatter = new Intl.NumberFormat('en-US', {
              style: 'currency',
              currency: 'USD'
            });
            return (number) ? currencyFormatter.format(number) : \"-\";",
    )
}

/// Creates a tooltip configuration for currency values
fn currency_tooltip() -> Tooltip {
    Tooltip::new()
        .trigger(Trigger::Axis)
        .value_formatter(currency_formatter())
        .axis_pointer(AxisPointer::new().type_(AxisPointerType::Shadow))
}

#[cfg(test)]
mod tests {
    use crate::dashboard::{
        filters::Aggregation,
        report::{ProjectionSeries, Series},
    };

    use super::{DashboardChart, charts_script, period_chart, projection_chart, ranking_chart};

    fn create_test_series() -> Series {
        Series {
            labels: vec!["Asha".to_owned(), "Bikash".to_owned()],
            values: vec![300.0, 100.0],
        }
    }

    #[test]
    fn period_chart_title_follows_aggregation() {
        let monthly = period_chart(&create_test_series(), Aggregation::Monthly).to_string();
        let quarterly = period_chart(&create_test_series(), Aggregation::Quarterly).to_string();

        assert!(monthly.contains("Sales by Month"));
        assert!(quarterly.contains("Sales by Quarter"));
    }

    #[test]
    fn ranking_chart_lists_highest_first_from_the_top() {
        let series = create_test_series();
        let options = ranking_chart("Sales by Consultant", "Consultant", &series).to_string();

        let bikash = options.find("Bikash").unwrap();
        let asha = options.find("Asha").unwrap();
        assert!(bikash < asha, "categories should be reversed: {options}");
    }

    #[test]
    fn projection_chart_has_actual_and_projected_series() {
        let series = ProjectionSeries {
            labels: vec!["Jul 2024".to_owned(), "Aug 2024".to_owned()],
            actual: vec![100.0, 0.0],
            projected: vec![0.0, 100.0],
        };

        let options = projection_chart(&series, "FY 2024-25").to_string();

        assert!(options.contains("Actual"));
        assert!(options.contains("Projected"));
        assert!(options.contains("FY 2024-25"));
    }

    #[test]
    fn charts_script_initializes_each_chart() {
        let charts = [
            DashboardChart {
                id: "period-chart",
                options: "{}".to_owned(),
            },
            DashboardChart {
                id: "provider-chart",
                options: "{}".to_owned(),
            },
        ];

        let script = charts_script(&charts).into_string();

        assert!(script.starts_with("<script>"));
        assert!(script.contains(r#"document.getElementById("period-chart")"#));
        assert!(script.contains(r#"document.getElementById("provider-chart")"#));
    }
}
