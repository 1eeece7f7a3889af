//! Error types surfaced by the report pipeline.
//!
//! Malformed cached state never shows up here: the store adapter absorbs it.
//! What remains are remote failures, export failures and missing prerequisites,
//! each rendered at the narrowest place in the page that applies.

use thiserror::Error;

/// Failures talking to the remote analysis service.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    /// Request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// Non-success status; `message` is the service's `error`/`message` field when present.
    #[error("service responded {status}: {message}")]
    Status { status: u16, message: String },

    /// Success status carrying an `{ "error": ... }` payload.
    #[error("{0}")]
    Remote(String),

    /// Response body didn't match the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Short text shown inline next to the affected column or section.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "Couldn't reach the analysis service.".to_string(),
            Self::Status { message, .. } | Self::Remote(message) => message.clone(),
            Self::Decode(_) => "The analysis service returned an unexpected response.".to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Failures while assembling the exported document.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExportError {
    /// Another export still owns the page.
    #[error("an export is already in progress")]
    InProgress,

    /// One chart couldn't be rasterized; logged and skipped.
    #[error("chart {index} could not be rasterized: {reason}")]
    ChartRaster { index: usize, reason: String },

    /// The document rasterizer itself failed.
    #[error("document rendering failed: {0}")]
    Document(String),

    /// No browser document to export from.
    #[error("export unavailable: {0}")]
    Unavailable(String),
}

impl ExportError {
    pub fn user_message(&self) -> String {
        match self {
            Self::InProgress => "An export is already running.".to_string(),
            Self::ChartRaster { .. } => "A chart could not be captured.".to_string(),
            Self::Document(reason) => format!("Couldn't build the PDF: {reason}"),
            Self::Unavailable(reason) => reason.clone(),
        }
    }
}

/// Failures downloading the corrected dataset or a previous report.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DownloadError {
    /// No corrected dataset recorded yet; rejected before any request.
    #[error("no corrected dataset is available")]
    MissingCorrectedFile,

    /// No report has been generated yet; rejected before any request.
    #[error("no previous report is available")]
    MissingReport,

    #[error(transparent)]
    Api(#[from] ApiError),

    /// Bytes arrived but couldn't be handed to the user.
    #[error("could not save download: {0}")]
    Delivery(String),
}

impl DownloadError {
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingCorrectedFile => {
                "No corrected dataset yet. Apply a correction first.".to_string()
            }
            Self::MissingReport => "No previous report to download.".to_string(),
            Self::Api(err) => err.user_message(),
            Self::Delivery(reason) => format!("Download failed: {reason}"),
        }
    }
}

/// Write failures from the store adapter. Reads never error.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("could not write `{key}`: {reason}")]
    Write { key: &'static str, reason: String },
}
