//! Dashboard HTTP handlers and view rendering.
//!
//! This module contains:
//! - Route handlers for displaying the dashboard and applying filter changes
//! - HTML view functions for rendering the dashboard UI
//! - State and form types used by the handlers

use axum::{
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
};
use axum_extra::extract::Form;
use maud::{Markup, PreEscaped, html};
use serde::Deserialize;
use time::{UtcOffset, macros::format_description};

use crate::{
    AppState, Error,
    dashboard::{
        aggregation::aggregate,
        cards::kpi_cards_view,
        charts::{build_dashboard_charts, chart_head_elements, charts_script, charts_view},
        filters::{Aggregation, FilterSpec, Selection},
        receivables::receivables_view,
        report::DashboardReport,
        tables::tables_view,
    },
    dataset::Dataset,
    endpoints,
    html::{
        FORM_CHECKBOX_STYLE, FORM_LABEL_STYLE, FORM_SELECT_STYLE, PAGE_CONTAINER_STYLE, base,
        loading_spinner,
    },
    loader::{DatasetHandle, LoadState, current_state},
    period::{FiscalYear, MonthKey},
};

/// The state needed for displaying the dashboard page.
#[derive(Debug, Clone)]
pub struct DashboardState {
    /// The currently loaded sales data.
    pub dataset: DatasetHandle,
}

impl FromRef<AppState> for DashboardState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            dataset: state.dataset.clone(),
        }
    }
}

/// The dashboard filters as sent by the filter form or the page URL.
///
/// Every field is optional. Missing, empty or malformed values fall back to
/// the data set's default filters. A consultant or provider the data does not
/// mention is kept and simply matches nothing.
#[derive(Debug, Default, Deserialize)]
pub struct FilterForm {
    /// "monthly" or "quarterly".
    pub aggregation: Option<String>,
    /// A fiscal year label, e.g. "FY 2024-25".
    pub fiscal_year: Option<String>,
    /// Present when the custom month range checkbox is ticked.
    pub use_range: Option<String>,
    /// The first month of the custom range, e.g. "2024-07".
    pub from: Option<String>,
    /// The last month of the custom range.
    pub to: Option<String>,
    pub consultant: Option<String>,
    pub provider: Option<String>,
}

impl FilterForm {
    /// Resolve the form on top of `dataset`'s default filters.
    pub fn into_filter_spec(self, dataset: &Dataset) -> FilterSpec {
        let mut filters = dataset.default_filters();

        if let Some(aggregation) = non_empty(self.aggregation).and_then(parse_aggregation) {
            filters.aggregation = aggregation;
        }

        if let Some(fiscal_year) = non_empty(self.fiscal_year).and_then(|text| {
            text.parse::<FiscalYear>()
                .inspect_err(|error| tracing::debug!("ignoring fiscal year filter: {error}"))
                .ok()
        }) {
            filters.fiscal_year = fiscal_year;
        }

        filters.use_custom_range = non_empty(self.use_range).is_some();

        if let Some(from) = non_empty(self.from).and_then(parse_month) {
            filters.range_from = Some(from);
        }

        if let Some(to) = non_empty(self.to).and_then(parse_month) {
            filters.range_to = Some(to);
        }

        if let Some(consultant) = non_empty(self.consultant) {
            filters.consultant = Selection::from(consultant.as_str());
        }

        if let Some(provider) = non_empty(self.provider) {
            filters.provider = Selection::from(provider.as_str());
        }

        filters
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

fn parse_aggregation(text: String) -> Option<Aggregation> {
    match text.as_str() {
        "monthly" => Some(Aggregation::Monthly),
        "quarterly" => Some(Aggregation::Quarterly),
        other => {
            tracing::debug!("ignoring unknown aggregation \"{other}\"");
            None
        }
    }
}

fn parse_month(text: String) -> Option<MonthKey> {
    text.parse()
        .inspect_err(|error| tracing::debug!("ignoring month filter: {error}"))
        .ok()
}

/// Display the dashboard for the filters in the query string.
///
/// While the first load is in progress a loading page is shown instead.
///
/// # Errors
/// Returns [Error::DataUnavailable] if the first load failed.
pub async fn get_dashboard_page(
    State(state): State<DashboardState>,
    Query(form): Query<FilterForm>,
) -> Result<Response, Error> {
    let dataset = match current_state(&state.dataset)? {
        LoadState::Ready(dataset) => dataset,
        LoadState::Loading => return Ok(dashboard_loading_view().into_response()),
        LoadState::Failed(reason) => return Err(Error::DataUnavailable(reason)),
    };

    let filters = form.into_filter_spec(&dataset);
    let report = aggregate(dataset.transactions(), &filters);

    Ok(dashboard_view(&dataset, &filters, &report).into_response())
}

/// Apply the filters from the filter form and return the updated dashboard content.
///
/// # Errors
/// Returns [Error::DataUnavailable] if there is no data set to filter.
pub async fn update_dashboard_filters(
    State(state): State<DashboardState>,
    Form(form): Form<FilterForm>,
) -> Result<Response, Error> {
    let dataset = match current_state(&state.dataset)? {
        LoadState::Ready(dataset) => dataset,
        LoadState::Loading => {
            return Err(Error::DataUnavailable(
                "the first load is still in progress".to_owned(),
            ));
        }
        LoadState::Failed(reason) => return Err(Error::DataUnavailable(reason)),
    };

    let filters = form.into_filter_spec(&dataset);
    let report = aggregate(dataset.transactions(), &filters);

    let content = dashboard_content(&dataset, &filters, &report);

    Ok(content.into_response())
}

/// Renders the page shown while the first load is in progress.
///
/// The page reloads itself until the data is ready.
fn dashboard_loading_view() -> Markup {
    let content = html!(
        div class=(PAGE_CONTAINER_STYLE)
        {
            h2 class="text-xl font-bold" id="loading-message"
            {
                (loading_spinner())
                "Loading sales data..."
            }

            p { "The dashboard will appear once the data has been fetched." }
        }

        script { (PreEscaped("setTimeout(() => window.location.reload(), 3000);")) }
    );

    base("Dashboard", &[], &content)
}

/// Renders the full dashboard page.
fn dashboard_view(dataset: &Dataset, filters: &FilterSpec, report: &DashboardReport) -> Markup {
    let content = html!(
        div
            id="dashboard-content"
            class="flex flex-col items-center px-2 lg:px-6 lg:py-8 mx-auto
                max-w-screen-xl text-gray-900 dark:text-white"
        {
            (dashboard_content(dataset, filters, report))
        }
    );

    base("Dashboard", &chart_head_elements(), &content)
}

/// Renders everything inside `#dashboard-content`, which is replaced
/// whenever a filter changes.
fn dashboard_content(dataset: &Dataset, filters: &FilterSpec, report: &DashboardReport) -> Markup {
    let charts = build_dashboard_charts(&report.charts, filters);
    let period_heading = match filters.aggregation {
        Aggregation::Monthly => "Monthly Breakdown",
        Aggregation::Quarterly => "Quarterly Breakdown",
    };

    html!(
        (status_line(dataset))
        (filter_form(dataset, filters))
        (kpi_cards_view(&report.kpis, filters))
        (charts_view(&charts))
        (charts_script(&charts))
        (tables_view(&report.tables, period_heading))
        (receivables_view(dataset.receivables()))
    )
}

fn status_line(dataset: &Dataset) -> Markup {
    let fetched_at = dataset
        .fetched_at()
        .to_offset(UtcOffset::UTC)
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute] UTC"
        ))
        .inspect_err(|error| tracing::error!("could not format fetch time: {error}"))
        .unwrap_or_default();

    html!(
        div class="w-full mb-4 flex flex-wrap justify-between items-baseline gap-2"
        {
            h2 class="text-2xl font-bold" { "Sales Dashboard" }

            p id="data-status" class="text-sm text-gray-600 dark:text-gray-400"
            {
                (dataset.transactions().len()) " transactions, loaded from "
                (dataset.origin().label()) ", fetched " (fetched_at)
            }
        }
    )
}

fn select_field(
    label: &str,
    name: &str,
    options: impl IntoIterator<Item = (String, String)>,
    selected: &str,
) -> Markup {
    html!(
        div
        {
            label for=(name) class=(FORM_LABEL_STYLE) { (label) }

            select id=(name) name=(name) class=(FORM_SELECT_STYLE)
            {
                @for (value, text) in options {
                    option value=(value) selected[value == selected] { (text) }
                }
            }
        }
    )
}

fn filter_form(dataset: &Dataset, filters: &FilterSpec) -> Markup {
    let domains = dataset.domains();

    let mut fiscal_years = domains.fiscal_years.clone();
    if !fiscal_years.contains(&filters.fiscal_year) {
        fiscal_years.push(filters.fiscal_year);
        fiscal_years.sort();
    }

    let aggregations = [Aggregation::Monthly, Aggregation::Quarterly].map(|aggregation| {
        let text = match aggregation {
            Aggregation::Monthly => "Monthly",
            Aggregation::Quarterly => "Quarterly",
        };
        (aggregation.as_str().to_owned(), text.to_owned())
    });
    let month_options = || {
        domains
            .months
            .iter()
            .map(|month| (month.to_string(), month.pretty()))
    };
    // Keep a selected name the data no longer has so the form still shows it.
    let name_options = |names: &[String], selection: &Selection| {
        let mut names = names.to_vec();
        let selected = selection.to_string();
        if !names.contains(&selected) {
            names.push(selected);
        }
        names
            .into_iter()
            .map(|name| (name.clone(), name))
            .collect::<Vec<_>>()
    };
    let month_value = |month: Option<MonthKey>| {
        month
            .map(|month| month.to_string())
            .unwrap_or_default()
    };

    html!(
        form
            id="filters"
            hx-post=(endpoints::DASHBOARD_FILTERS)
            hx-target="#dashboard-content"
            hx-swap="innerHTML"
            hx-trigger="change"
            class="w-full mb-8 bg-gray-50 dark:bg-gray-800 p-4 rounded-lg"
        {
            div class="grid grid-cols-2 md:grid-cols-4 gap-4"
            {
                (select_field("Aggregation", "aggregation", aggregations, filters.aggregation.as_str()))
                (select_field(
                    "Fiscal Year",
                    "fiscal_year",
                    fiscal_years.iter().map(|year| (year.to_string(), year.to_string())),
                    &filters.fiscal_year.to_string(),
                ))
                (select_field(
                    "Consultant",
                    "consultant",
                    name_options(&domains.consultants, &filters.consultant),
                    &filters.consultant.to_string(),
                ))
                (select_field(
                    "Provider",
                    "provider",
                    name_options(&domains.providers, &filters.provider),
                    &filters.provider.to_string(),
                ))

                div class="flex items-end pb-2"
                {
                    label class="flex items-center space-x-2 text-sm font-medium"
                    {
                        input
                            type="checkbox"
                            id="use_range"
                            name="use_range"
                            value="on"
                            checked[filters.use_custom_range]
                            class=(FORM_CHECKBOX_STYLE);

                        span { "Use custom month range" }
                    }
                }

                (select_field("From", "from", month_options(), &month_value(filters.range_from)))
                (select_field("To", "to", month_options(), &month_value(filters.range_to)))
            }
        }
    )
}
