use std::collections::BTreeMap;

use dioxus::prelude::*;

use crate::core::format;
use crate::report::plotly;
use crate::report::visuals::{ChartSpec, VisualizationArtifact, VisualizationSet};

/// A Plotly figure rendered into its own container.
#[component]
pub fn PlotlyChart(id: String, spec: ChartSpec) -> Element {
    let dom_id = id.clone();
    let purge_id = id.clone();

    use_effect(use_reactive!(|(id, spec)| {
        if let Err(err) = plotly::render(&id, &spec) {
            tracing::warn!(chart = %id, error = %err, "chart render failed");
        }
    }));

    use_drop(move || plotly::purge(&purge_id));

    rsx! {
        div { id: "{dom_id}", class: "report-chart" }
    }
}

#[component]
pub fn VisualizationSection(set: VisualizationSet, loading: bool) -> Element {
    rsx! {
        section { class: "report-card report-visuals page-break-before",
            div { class: "report-card__header",
                h2 { "Before and after" }
                if loading {
                    span { class: "report-card__meta", "Loading charts…" }
                }
            }

            if set.is_empty() && !loading {
                p { class: "report-card__placeholder", "Charts appear once a corrected dataset is available." }
            }

            if !set.categorical.is_empty() {
                h3 { "Categorical columns" }
                ArtifactList { domain: "categorical", artifacts: set.categorical.clone() }
            }

            if let Some(error) = set.continuous_error.clone() {
                p { class: "report-banner report-banner--error", "⚠️ Continuous charts unavailable: {error}" }
            } else if !set.continuous.is_empty() {
                h3 { "Continuous columns" }
                ArtifactList { domain: "continuous", artifacts: set.continuous.clone() }
            }
        }
    }
}

#[component]
fn ArtifactList(domain: &'static str, artifacts: BTreeMap<String, VisualizationArtifact>) -> Element {
    rsx! {
        div { class: "report-visuals__list",
            for (index, (column, artifact)) in artifacts.into_iter().enumerate() {
                div { key: "{domain}-{column}", class: "report-visual",
                    h4 { class: "report-visual__title", "{column}" }
                    match artifact {
                        VisualizationArtifact::Failed { error } => rsx! {
                            p { class: "report-card__meta report-card__meta--error", "⚠️ {error}" }
                        },
                        VisualizationArtifact::Ready(pair) => {
                            let skew_note = pair.before_skewness.zip(pair.after_skewness).map(|(before, after)| {
                                format!(
                                    "Skewness {} → {}",
                                    format::format_skewness(Some(before)),
                                    format::format_skewness(Some(after))
                                )
                            });
                            rsx! {
                                if let Some(note) = skew_note {
                                    p { class: "report-card__meta", "{note}" }
                                }
                                div { class: "report-visual__pair",
                                    figure {
                                        figcaption { "Before" }
                                        PlotlyChart { id: format!("chart-{domain}-{index}-before"), spec: pair.before_chart.clone() }
                                    }
                                    figure {
                                        figcaption { "After" }
                                        PlotlyChart { id: format!("chart-{domain}-{index}-after"), spec: pair.after_chart.clone() }
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

#[cfg(test)]
mod tests {
    use super::*;
    use dioxus::dioxus_core::VirtualDom;

    #[test]
    fn chart_mounts_and_unmounts_with_its_id() {
        let mut dom = VirtualDom::new_with_props(
            PlotlyChart,
            PlotlyChartProps {
                id: "chart-categorical-0-before".to_string(),
                spec: ChartSpec::new("{\"data\":[]}"),
            },
        );
        dom.rebuild_in_place();
        drop(dom);
    }
}
