//! Downloading files the analysis service keeps: the corrected dataset from
//! the latest correction run and the most recently generated report.

use crate::core::error::DownloadError;
use crate::core::platform;
use crate::core::storage::{StateStore, StoreKey};

use super::api::AnalysisApi;

/// File name part of a stored server path, accepting either separator.
pub fn corrected_filename(path: &str) -> Option<&str> {
    path.trim()
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
}

/// File name recorded under `key`, if any.
fn stored_filename(store: &StateStore, key: StoreKey) -> Option<String> {
    let path: Option<String> = store.get(key, None);
    path.as_deref().and_then(corrected_filename).map(str::to_string)
}

/// Fetch the corrected dataset and hand it to the user.
///
/// Returns the saved path on native targets, `None` in the browser.
pub async fn download_corrected<A>(api: &A, store: &StateStore) -> Result<Option<String>, DownloadError>
where
    A: AnalysisApi + ?Sized,
{
    let filename =
        stored_filename(store, StoreKey::CorrectedFilePath).ok_or(DownloadError::MissingCorrectedFile)?;

    tracing::info!(%filename, "downloading corrected dataset");
    let bytes = api.corrected_dataset(&filename).await?;
    deliver(&filename, bytes).await
}

/// Fetch the report `lastReportPath` points at and hand it to the user.
pub async fn download_previous_report<A>(
    api: &A,
    store: &StateStore,
) -> Result<Option<String>, DownloadError>
where
    A: AnalysisApi + ?Sized,
{
    let filename = stored_filename(store, StoreKey::LastReportPath).ok_or(DownloadError::MissingReport)?;

    tracing::info!(%filename, "downloading previous report");
    let bytes = api.report_document(&filename).await?;
    deliver(&filename, bytes).await
}

async fn deliver(filename: &str, bytes: Vec<u8>) -> Result<Option<String>, DownloadError> {
    platform::download_bytes(filename, mime_for(filename), bytes)
        .await
        .map_err(DownloadError::Delivery)
}

fn mime_for(filename: &str) -> &'static str {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".csv") {
        "text/csv"
    } else if lower.ends_with(".xlsx") {
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    } else if lower.ends_with(".pdf") {
        "application/pdf"
    } else if lower.ends_with(".json") {
        "application/json"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_is_last_path_segment() {
        assert_eq!(
            corrected_filename("uploads/corrected/adult_corrected.csv"),
            Some("adult_corrected.csv")
        );
        assert_eq!(corrected_filename(r"C:\data\out.csv"), Some("out.csv"));
        assert_eq!(corrected_filename("plain.csv"), Some("plain.csv"));
        assert_eq!(corrected_filename("   "), None);
        assert_eq!(corrected_filename("uploads/"), None);
    }

    #[test]
    fn mime_follows_extension() {
        assert_eq!(mime_for("a.CSV"), "text/csv");
        assert_eq!(mime_for("report_2024_01_01_120000.pdf"), "application/pdf");
        assert_eq!(mime_for("a.bin"), "application/octet-stream");
    }
}
