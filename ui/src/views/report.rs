use std::rc::Rc;

use dioxus::prelude::*;

use crate::core::config::ReportConfig;
use crate::core::platform;
use crate::core::storage::StateStore;
use crate::report::api::HttpAnalysisApi;
use crate::report::charts::VisualizationSection;
use crate::report::panel::ReportExportPanel;
use crate::report::summary::{ClassificationCards, CorrectionOverview};
use crate::report::visuals::{run_cycle, FetchCycles, VisualizationSet};
use crate::report::{ReportInputs, ReportModel, WATCHED_KEYS};

/// Element the PDF export captures.
pub const REPORT_ROOT_ID: &str = "bias-report";

#[component]
pub fn Report() -> Element {
    let store = use_context::<StateStore>();
    let config = use_hook({
        let store = store.clone();
        move || ReportConfig::load(&store)
    });

    // Bumped on every relevant store change, here or in another tab.
    let revision = use_signal(|| 0u64);
    use_hook({
        let store = store.clone();
        move || {
            Rc::new(store.subscribe(&WATCHED_KEYS, move |key| {
                tracing::debug!(%key, "report inputs changed");
                let mut revision = revision;
                *revision.write() += 1;
            }))
        }
    });

    let model = use_memo({
        let store = store.clone();
        move || {
            revision();
            ReportModel::build(ReportInputs::hydrate(&store))
        }
    });
    let request = use_memo(move || model.read().fetch_request());

    let cycles = use_hook(FetchCycles::new);
    let visuals = use_signal(VisualizationSet::default);
    let loading = use_signal(|| false);

    use_effect({
        let base_url = config.api_base_url.clone();
        move || {
            let request = request();
            let ticket = cycles.begin();
            let mut visuals = visuals;
            let mut loading = loading;

            if !request.has_work() {
                visuals.set(VisualizationSet::default());
                loading.set(false);
                return;
            }

            loading.set(true);
            let api = HttpAnalysisApi::new(base_url.clone());
            platform::spawn_future(async move {
                if let Some(set) = run_cycle(&api, &request, &ticket).await {
                    visuals.set(set);
                    loading.set(false);
                }
            });
        }
    });

    let start_over = {
        let store = store.clone();
        move |_| {
            tracing::info!("clearing report state");
            store.clear();
        }
    };

    let snapshot = model.read().clone();
    let has_corrected = snapshot.inputs.corrected_path.is_some();

    rsx! {
        section { class: "page page-report",
            h1 { "Bias report" }
            p {
                "Detection results for the selected columns, the latest correction run and how each column changed."
            }

            div { id: REPORT_ROOT_ID, class: "report__content",
                ClassificationCards { summary: snapshot.classification.clone() }
                CorrectionOverview {
                    corrections: snapshot.corrections.clone(),
                    latest: snapshot.latest.clone(),
                }
                VisualizationSection { set: visuals(), loading: loading() }
            }

            ReportExportPanel {
                config: config.clone(),
                root_id: REPORT_ROOT_ID.to_string(),
                has_corrected,
                last_report: snapshot.inputs.last_report_path.clone(),
            }

            div { class: "report__footer",
                button {
                    r#type: "button",
                    class: "button button--ghost",
                    onclick: start_over,
                    "Start over"
                }
            }
        }
    }
}
