use dioxus::prelude::*;

use crate::core::config::ReportConfig;
use crate::core::error::ExportError;
use crate::core::platform;
use crate::core::storage::StateStore;
use crate::report::api::HttpAnalysisApi;
use crate::report::download::{download_corrected, download_previous_report};
use crate::report::export::{report_filename, ExportLock, ExportOptions};

#[derive(Clone, Debug, PartialEq)]
enum ExportStatus {
    Idle,
    Working(&'static str),
    Done(String),
    Error(String),
}

/// Actions: export the report to PDF, download the corrected dataset or the
/// previously generated report.
#[component]
pub fn ReportExportPanel(
    config: ReportConfig,
    root_id: String,
    has_corrected: bool,
    last_report: Option<String>,
) -> Element {
    let store = use_context::<StateStore>();
    let lock = use_hook(ExportLock::new);
    let status = use_signal(|| ExportStatus::Idle);
    let busy = use_signal(|| false);

    let feedback = match &status() {
        ExportStatus::Idle => None,
        ExportStatus::Working(label) => Some(("report-card__meta".to_string(), format!("{label}…"))),
        ExportStatus::Done(message) => Some((
            "report-card__meta report-card__meta--success".to_string(),
            format!("✅ {message}"),
        )),
        ExportStatus::Error(err) => Some((
            "report-card__meta report-card__meta--error".to_string(),
            format!("⚠️ {err}"),
        )),
    };

    let pdf_handler = {
        let lock = lock.clone();
        let options = config.export.clone();
        let prefix = config.report_filename_prefix.clone();
        let root_id = root_id.clone();
        let mut status_signal = status;
        let mut busy_signal = busy;
        move |_| {
            if busy_signal() {
                return;
            }
            let guard = match lock.try_acquire() {
                Ok(guard) => guard,
                Err(err) => {
                    status_signal.set(ExportStatus::Error(err.user_message()));
                    return;
                }
            };
            busy_signal.set(true);
            status_signal.set(ExportStatus::Working("Preparing PDF"));

            let options = options.clone();
            let root_id = root_id.clone();
            let filename = report_filename(&prefix, &platform::timestamp_slug());
            platform::spawn_future(async move {
                let _guard = guard;
                match perform_pdf_export(&root_id, &options, &filename).await {
                    Ok(message) => status_signal.set(ExportStatus::Done(message)),
                    Err(err) => status_signal.set(ExportStatus::Error(err.user_message())),
                }
                busy_signal.set(false);
            });
        }
    };

    let download_handler = {
        let store = store.clone();
        let base_url = config.api_base_url.clone();
        let mut status_signal = status;
        let mut busy_signal = busy;
        move |_| {
            if busy_signal() {
                return;
            }
            busy_signal.set(true);
            status_signal.set(ExportStatus::Working("Downloading corrected dataset"));

            let store = store.clone();
            let api = HttpAnalysisApi::new(base_url.clone());
            platform::spawn_future(async move {
                match download_corrected(&api, &store).await {
                    Ok(Some(path)) => status_signal.set(ExportStatus::Done(format!("Saved to {path}"))),
                    Ok(None) => status_signal.set(ExportStatus::Done("Download started".to_string())),
                    Err(err) => {
                        tracing::warn!(error = %err, "corrected dataset download failed");
                        status_signal.set(ExportStatus::Error(err.user_message()));
                    }
                }
                busy_signal.set(false);
            });
        }
    };

    let report_handler = {
        let store = store.clone();
        let base_url = config.api_base_url.clone();
        let mut status_signal = status;
        let mut busy_signal = busy;
        move |_| {
            if busy_signal() {
                return;
            }
            busy_signal.set(true);
            status_signal.set(ExportStatus::Working("Downloading previous report"));

            let store = store.clone();
            let api = HttpAnalysisApi::new(base_url.clone());
            platform::spawn_future(async move {
                match download_previous_report(&api, &store).await {
                    Ok(Some(path)) => status_signal.set(ExportStatus::Done(format!("Saved to {path}"))),
                    Ok(None) => status_signal.set(ExportStatus::Done("Download started".to_string())),
                    Err(err) => {
                        tracing::warn!(error = %err, "previous report download failed");
                        status_signal.set(ExportStatus::Error(err.user_message()));
                    }
                }
                busy_signal.set(false);
            });
        }
    };

    rsx! {
        section { class: "report-card report-export",
            div { class: "report-card__header",
                h2 { "Export" }
            }

            p { "Save this report as a PDF, or download the corrected dataset for further work." }

            div { class: "report-export__actions",
                button {
                    r#type: "button",
                    class: "button button--primary",
                    disabled: busy(),
                    onclick: pdf_handler,
                    "Download PDF report"
                }
                button {
                    r#type: "button",
                    class: "button",
                    disabled: busy() || !has_corrected,
                    title: if !has_corrected { "Apply a correction first" } else { "" },
                    onclick: download_handler,
                    "Download corrected dataset"
                }
                if let Some(previous) = last_report {
                    button {
                        r#type: "button",
                        class: "button button--ghost",
                        disabled: busy(),
                        title: "{previous}",
                        onclick: report_handler,
                        "Download previous report"
                    }
                }
            }

            if let Some((class_name, message)) = feedback {
                p { class: "{class_name}", "{message}" }
            }
        }
    }
}

async fn perform_pdf_export(
    root_id: &str,
    options: &ExportOptions,
    filename: &str,
) -> Result<String, ExportError> {
    #[cfg(target_arch = "wasm32")]
    {
        use crate::report::export::{export_document, web::WebSurface};

        let surface = WebSurface::find(root_id)?;
        let report = export_document(&surface, options, filename).await?;
        if report.charts_skipped > 0 {
            Ok(format!(
                "Saved {filename} ({} chart(s) could not be captured)",
                report.charts_skipped
            ))
        } else {
            Ok(format!("Saved {filename}"))
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = (root_id, options, filename);
        Err(ExportError::Unavailable(
            "PDF export is only available in the browser.".to_string(),
        ))
    }
}
