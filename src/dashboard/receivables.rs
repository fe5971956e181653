//! Aging tables for the accounts receivable of each line of business.

use maud::{Markup, html};

use crate::{
    html::{TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, format_currency},
    receivables::{AgingBuckets, Receivables},
};

/// Renders the admission and migration receivables side by side.
pub(super) fn receivables_view(receivables: &Receivables) -> Markup {
    html! {
        section id="receivables" class="w-full mx-auto mb-8" {
            h3 class="text-xl font-semibold mb-4" { "Accounts Receivable" }

            div class="grid grid-cols-1 xl:grid-cols-2 gap-4" {
                (aging_table("admission-receivables", "Admission", receivables.admission.as_ref()))
                (aging_table("migration-receivables", "Migration", receivables.migration.as_ref()))
            }
        }
    }
}

fn aging_table(id: &str, title: &str, buckets: Option<&AgingBuckets>) -> Markup {
    html! {
        div id=(id) {
            h4 class="text-lg font-semibold mb-2" { (title) }

            @match buckets {
                Some(buckets) => {
                    div class="overflow-x-auto rounded-lg shadow" {
                        table class="w-full text-sm text-left text-gray-500 dark:text-gray-400" {
                            thead class=(TABLE_HEADER_STYLE) {
                                tr {
                                    th scope="col" class="px-6 py-3" { "Age" }
                                    th scope="col" class="px-6 py-3 text-right" { "Amount" }
                                    th scope="col" class="px-6 py-3 text-right" { "Share" }
                                }
                            }
                            tbody {
                                @for (label, amount) in buckets.labelled() {
                                    tr class=(TABLE_ROW_STYLE) {
                                        th scope="row" class={(TABLE_CELL_STYLE) " font-medium text-gray-900 dark:text-white"} {
                                            (label)
                                        }
                                        td class={(TABLE_CELL_STYLE) " text-right"} {
                                            (format_currency(amount))
                                        }
                                        td class={(TABLE_CELL_STYLE) " text-right"} {
                                            (format!("{:.1}%", buckets.percent_of_total(amount)))
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
                None => {
                    p class="text-sm text-gray-600 dark:text-gray-400" {
                        "No data"
                    }
                }
            }
        }
    }
}
