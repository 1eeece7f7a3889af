use dioxus::prelude::*;

use crate::core::format;
use crate::report::classify::{
    describe_skewness, ClassificationSummary, ColumnDomain, CorrectionSummary,
};
use crate::report::history::{CorrectionEntry, DistributionSnapshot, LatestCorrections};

#[component]
pub fn ClassificationCards(summary: ClassificationSummary) -> Element {
    let total = summary.total_selected_all;
    let categorical_total = summary.categorical_total();
    let continuous_total = summary.continuous_total();

    rsx! {
        section { class: "report-card report-classification",
            div { class: "report-card__header",
                h2 { "Detection overview" }
                span { class: "report-card__meta", "{total} selected columns analysed" }
            }

            if total == 0 {
                p { class: "report-card__placeholder", "Select target columns and run detection to populate this report." }
            } else {
                div { class: "report-classification__grid",
                    div { class: "report-classification__domain",
                        h3 { "Categorical bias · {categorical_total}" }
                        ul { class: "report-buckets",
                            for (bucket, columns) in summary.severity.iter() {
                                li {
                                    key: "{bucket}",
                                    class: bucket_class(bucket.label()),
                                    span { class: "report-bucket__label", "{bucket}" }
                                    strong { class: "report-bucket__count", "{columns.len()}" }
                                    if !columns.is_empty() {
                                        span { class: "report-bucket__columns", {columns.join(", ")} }
                                    }
                                }
                            }
                        }
                    }
                    div { class: "report-classification__domain",
                        h3 { "Continuous skewness · {continuous_total}" }
                        ul { class: "report-buckets",
                            for (bucket, columns) in summary.skewness.iter() {
                                li {
                                    key: "{bucket}",
                                    class: bucket_class(bucket.label()),
                                    span { class: "report-bucket__label", "{bucket}" }
                                    strong { class: "report-bucket__count", "{columns.len()}" }
                                    if !columns.is_empty() {
                                        span { class: "report-bucket__columns", {columns.join(", ")} }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

#[component]
pub fn CorrectionOverview(corrections: CorrectionSummary, latest: LatestCorrections) -> Element {
    let needing_fix = corrections.categorical_needing_fix.len() + corrections.continuous_needing_fix.len();
    let pending_text = corrections.pending.join(", ");
    let batch_meta = latest
        .batch_ts
        .and_then(|ts| time::OffsetDateTime::from_unix_timestamp_nanos((ts * 1_000_000.0) as i128).ok())
        .map(|at| {
            format!(
                "Latest run {:04}-{:02}-{:02} {:02}:{:02} UTC",
                at.year(),
                u8::from(at.month()),
                at.day(),
                at.hour(),
                at.minute()
            )
        });

    rsx! {
        section { class: "report-card report-corrections page-break-before",
            div { class: "report-card__header",
                h2 { "Corrections" }
                if let Some(meta) = batch_meta {
                    span { class: "report-card__meta", "{meta}" }
                }
            }

            ul { class: "report-corrections__summary",
                li { strong { "{needing_fix}" } " columns needed fixing" }
                li { strong { "{corrections.corrected.len()}" } " corrected in the latest run" }
                li { strong { "{corrections.pending.len()}" } " still pending" }
            }

            if !corrections.pending.is_empty() {
                p { class: "report-card__meta report-card__meta--warning",
                    "Pending: {pending_text}"
                }
            }

            if corrections.corrected.is_empty() {
                p { class: "report-card__placeholder", "No corrections have been applied yet." }
            } else {
                table { class: "report-table",
                    thead {
                        tr {
                            th { "Column" }
                            th { "Type" }
                            th { "Method" }
                            th { "Before" }
                            th { "After" }
                            th { "Status" }
                        }
                    }
                    tbody {
                        for column in corrections.corrected.iter() {
                            {
                                let (kind, entry) = match column.domain {
                                    ColumnDomain::Categorical => ("Categorical", latest.categorical.get(&column.column)),
                                    ColumnDomain::Continuous => ("Continuous", latest.continuous.get(&column.column)),
                                };
                                let (before, after) = entry
                                    .map(|entry| describe_change(column.domain, entry))
                                    .unwrap_or_default();
                                let status = match column.resolved {
                                    Some(true) => "Resolved",
                                    Some(false) => "Still biased",
                                    None => "Unknown",
                                };
                                rsx! {
                                    tr { key: "{kind}-{column.column}",
                                        td { "{column.column}" }
                                        td { "{kind}" }
                                        td { "{column.method}" }
                                        td { "{before}" }
                                        td { "{after}" }
                                        td { "{status}" }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn bucket_class(label: &str) -> String {
    format!("report-bucket report-bucket--{}", label.to_ascii_lowercase().replace(' ', "-"))
}

fn describe_change(domain: ColumnDomain, entry: &CorrectionEntry) -> (String, String) {
    match domain {
        ColumnDomain::Categorical => (
            describe_distribution(&entry.before),
            describe_distribution(&entry.after),
        ),
        ColumnDomain::Continuous => (
            format!(
                "{} ({})",
                format::format_skewness(entry.original_skewness),
                describe_skewness(entry.original_skewness)
            ),
            format!(
                "{} ({})",
                format::format_skewness(entry.new_skewness),
                describe_skewness(entry.new_skewness)
            ),
        ),
    }
}

fn describe_distribution(snapshot: &DistributionSnapshot) -> String {
    let ratios = snapshot.ratios();
    if ratios.is_empty() {
        return "—".to_string();
    }
    let mut parts: Vec<String> = ratios
        .iter()
        .map(|(label, ratio)| format!("{label}: {}", format::format_percent(*ratio)))
        .collect();
    if let Some(severity) = snapshot.severity() {
        parts.push(format!("({severity})"));
    }
    parts.join(", ")
}
