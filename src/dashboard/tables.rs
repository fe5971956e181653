//! Table views for dashboard data display.
//!
//! Provides HTML tables for the period, provider and consultant breakdowns,
//! the underperforming consultants, the per-consultant category detail and
//! the fiscal year comparison.

use maud::{Markup, html};

use crate::{
    dashboard::report::{
        CategoryTotals, ConsultantDetail, FiscalYearRow, PeriodRow, ShareRow, Tables,
        Underperformer,
    },
    html::{TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, format_currency},
};

const TABLE_HEADER_CELL_STYLE: &str = "px-3 py-3 text-center";
const TABLE_HEADER_FIRST_CELL_STYLE: &str =
    "px-3 py-3 sticky left-0 bg-gray-100 dark:bg-gray-700 z-10 font-semibold text-left";
const TABLE_STICKY_CELL_STYLE: &str = "px-3 py-4 font-medium text-gray-900 dark:text-white \
    sticky left-0 bg-white dark:bg-gray-800 z-10 text-left";
const TABLE_DATA_CELL_STYLE: &str = "text-center whitespace-nowrap";
const TABLE_TOTAL_ROW_STYLE: &str = "bg-gray-50 dark:bg-gray-700 font-bold";

/// Renders every dashboard table.
pub(super) fn tables_view(tables: &Tables, period_heading: &str) -> Markup {
    html! {
        section id="tables" class="w-full mx-auto mb-8" {
            div class="grid grid-cols-1 xl:grid-cols-2 gap-4" {
                (period_table(&tables.periods, period_heading))
                (share_table("provider-table", "Providers", "Provider", &tables.providers))
                (share_table("consultant-table", "Consultants", "Consultant", &tables.consultants))
                (underperformers_table(&tables.underperformers))
                (fiscal_year_table(&tables.fiscal_years))
            }

            div class="mt-4" {
                (consultant_detail_table(&tables.consultant_details, &tables.consultant_detail_totals()))
            }
        }
    }
}

fn table_container(id: &str, title: &str, table: Markup) -> Markup {
    html! {
        div id=(id) {
            h3 class="text-xl font-semibold mb-4" { (title) }

            div class="overflow-x-auto rounded-lg shadow" {
                table class="w-full text-sm text-left text-gray-500 dark:text-gray-400" {
                    (table)
                }
            }
        }
    }
}

fn header_row(first: &str, headings: &[&str]) -> Markup {
    html! {
        thead class=(TABLE_HEADER_STYLE) {
            tr {
                th scope="col" class=(TABLE_HEADER_FIRST_CELL_STYLE) { (first) }
                @for heading in headings {
                    th scope="col" class=(TABLE_HEADER_CELL_STYLE) { (heading) }
                }
            }
        }
    }
}

fn empty_row(columns: usize, message: &str) -> Markup {
    html! {
        tr class=(TABLE_ROW_STYLE) {
            td colspan=(columns) class={(TABLE_CELL_STYLE) " text-center"} { (message) }
        }
    }
}

fn data_cell(text: &str) -> Markup {
    html! {
        td class={(TABLE_CELL_STYLE) " " (TABLE_DATA_CELL_STYLE)} { (text) }
    }
}

/// Renders the sales, transaction count and average sale per month or quarter.
fn period_table(rows: &[PeriodRow], heading: &str) -> Markup {
    table_container(
        "period-table",
        heading,
        html! {
            (header_row("Period", &["Sales", "CoE", "Average"]))
            tbody {
                @for row in rows {
                    tr class=(TABLE_ROW_STYLE) {
                        th scope="row" class=(TABLE_STICKY_CELL_STYLE) { (row.label) }
                        (data_cell(&format_currency(row.sales)))
                        (data_cell(&row.count.to_string()))
                        (data_cell(&format_currency(row.average)))
                    }
                }
                @if rows.is_empty() {
                    (empty_row(4, "No periods selected"))
                }
            }
        },
    )
}

/// Renders a breakdown with each row's share of the total.
fn share_table(id: &str, title: &str, label_heading: &str, rows: &[ShareRow]) -> Markup {
    table_container(
        id,
        title,
        html! {
            (header_row(label_heading, &["Sales", "CoE", "Share"]))
            tbody {
                @for row in rows {
                    tr class=(TABLE_ROW_STYLE) {
                        th scope="row" class=(TABLE_STICKY_CELL_STYLE) { (row.label) }
                        (data_cell(&format_currency(row.sales)))
                        (data_cell(&row.count.to_string()))
                        (data_cell(&format!("{:.1}%", row.share_percent)))
                    }
                }
                @if rows.is_empty() {
                    (empty_row(4, "No sales in the selected period"))
                }
            }
        },
    )
}

fn underperformers_table(rows: &[Underperformer]) -> Markup {
    table_container(
        "underperformer-table",
        "Below Half of Average",
        html! {
            (header_row("Consultant", &["Sales", "% of Average"]))
            tbody {
                @for row in rows {
                    tr class=(TABLE_ROW_STYLE) {
                        th scope="row" class=(TABLE_STICKY_CELL_STYLE) { (row.name) }
                        (data_cell(&format_currency(row.sales)))
                        td class={(TABLE_CELL_STYLE) " " (TABLE_DATA_CELL_STYLE) " text-red-600 dark:text-red-400"} {
                            (format!("{:.1}%", row.percent_of_mean))
                        }
                    }
                }
                @if rows.is_empty() {
                    (empty_row(3, "Every consultant is at or above half of the average"))
                }
            }
        },
    )
}

fn fiscal_year_table(rows: &[FiscalYearRow]) -> Markup {
    table_container(
        "fiscal-year-table",
        "Fiscal Year Comparison",
        html! {
            (header_row("Fiscal Year", &["Sales"]))
            tbody {
                @for row in rows {
                    tr class=(TABLE_ROW_STYLE) {
                        th scope="row" class=(TABLE_STICKY_CELL_STYLE) { (row.label) }
                        (data_cell(&format_currency(row.sales)))
                    }
                }
                @if rows.is_empty() {
                    (empty_row(2, "No sales recorded"))
                }
            }
        },
    )
}

fn category_cells(totals: &CategoryTotals) -> Markup {
    html! {
        (data_cell(&totals.count.to_string()))
        (data_cell(&format_currency(totals.sales)))
    }
}

/// Renders each consultant's transaction counts and sales split by provider category.
fn consultant_detail_table(details: &[ConsultantDetail], totals: &ConsultantDetail) -> Markup {
    let headings = [
        "Total CoE", "Total Sales", "HE CoE", "HE Sales", "VET CoE", "VET Sales", "PY CoE",
        "PY Sales", "Other CoE", "Other Sales",
    ];

    table_container(
        "consultant-detail-table",
        "Consultant Detail by Category",
        html! {
            (header_row("Consultant", &headings))
            tbody {
                @for detail in details {
                    tr class=(TABLE_ROW_STYLE) {
                        th scope="row" class=(TABLE_STICKY_CELL_STYLE) { (detail.consultant) }
                        (category_cells(&detail.total))
                        (category_cells(&detail.he))
                        (category_cells(&detail.vet))
                        (category_cells(&detail.py))
                        (category_cells(&detail.other))
                    }
                }
                @if details.is_empty() {
                    (empty_row(11, "No sales in the selected period"))
                }
            }
            @if !details.is_empty() {
                tfoot {
                    tr class=(TABLE_TOTAL_ROW_STYLE) data-total-row {
                        th scope="row" class=(TABLE_STICKY_CELL_STYLE) { (totals.consultant) }
                        (category_cells(&totals.total))
                        (category_cells(&totals.he))
                        (category_cells(&totals.vet))
                        (category_cells(&totals.py))
                        (category_cells(&totals.other))
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use scraper::{ElementRef, Html, Selector};

    use crate::dashboard::report::{
        CategoryTotals, ConsultantDetail, FiscalYearRow, PeriodRow, ShareRow, Tables,
    };

    use super::tables_view;

    fn create_test_tables() -> Tables {
        let mut asha = ConsultantDetail::new("Asha");
        asha.add("HE - Private", 100.0);
        asha.add("VET", 50.0);
        let mut bikash = ConsultantDetail::new("Bikash");
        bikash.add("PY", 25.0);

        Tables {
            periods: vec![PeriodRow {
                label: "Jul 2024".to_owned(),
                sales: 175.0,
                count: 3,
                average: 175.0 / 3.0,
            }],
            providers: vec![ShareRow {
                label: "HE - Private".to_owned(),
                sales: 100.0,
                count: 1,
                share_percent: 57.142857,
            }],
            consultants: Vec::new(),
            underperformers: Vec::new(),
            consultant_details: vec![asha, bikash],
            fiscal_years: vec![FiscalYearRow {
                label: "FY 2024-25".to_owned(),
                sales: 175.0,
            }],
        }
    }

    fn cell_texts(row: ElementRef) -> Vec<String> {
        let cell_selector = Selector::parse("th, td").unwrap();
        row.select(&cell_selector)
            .map(|cell| cell.text().collect::<String>().trim().to_owned())
            .collect()
    }

    fn render_test_tables() -> Html {
        Html::parse_fragment(&tables_view(&create_test_tables(), "Monthly").into_string())
    }

    #[test]
    fn renders_every_table() {
        let html = render_test_tables();

        for id in [
            "#period-table",
            "#provider-table",
            "#consultant-table",
            "#underperformer-table",
            "#fiscal-year-table",
            "#consultant-detail-table",
        ] {
            let selector = Selector::parse(id).unwrap();
            assert!(html.select(&selector).next().is_some(), "missing {id}");
        }
    }

    #[test]
    fn share_is_shown_with_one_decimal() {
        let html = render_test_tables();
        let row_selector = Selector::parse("#provider-table tbody tr").unwrap();

        let row = html.select(&row_selector).next().unwrap();

        assert_eq!(cell_texts(row)[3], "57.1%");
    }

    #[test]
    fn empty_breakdown_shows_message() {
        let html = render_test_tables();
        let row_selector = Selector::parse("#consultant-table tbody tr").unwrap();

        let rows: Vec<_> = html.select(&row_selector).collect();

        assert_eq!(rows.len(), 1);
        assert_eq!(cell_texts(rows[0]), vec!["No sales in the selected period"]);
    }

    #[test]
    fn consultant_detail_has_totals_row() {
        let tables = create_test_tables();
        let html = Html::parse_fragment(&tables_view(&tables, "Monthly").into_string());
        let total_selector = Selector::parse("#consultant-detail-table [data-total-row]").unwrap();

        let totals = cell_texts(html.select(&total_selector).next().unwrap());

        assert_eq!(totals[0], "Total");
        assert_eq!(totals[1], "3");
        assert_eq!(
            tables.consultant_detail_totals().py,
            CategoryTotals {
                count: 1,
                sales: 25.0
            }
        );
    }
}
