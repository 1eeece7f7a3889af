//! Client for the remote analysis service (detection/correction/visualization).

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::core::error::ApiError;

use super::visuals::{ChartPair, VisualizationArtifact};

const BIAS_VISUALIZE_PATH: &str = "/api/bias/visualize";
const SKEWNESS_VISUALIZE_PATH: &str = "/api/skewness/visualize";
const CORRECTED_DOWNLOAD_SEGMENTS: [&str; 3] = ["api", "corrected", "download"];
const REPORT_DOWNLOAD_SEGMENTS: [&str; 3] = ["api", "reports", "download"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BiasChartRequest {
    pub before_path: String,
    pub after_path: String,
    pub target_column: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkewnessChartRequest {
    pub before_path: String,
    pub after_path: String,
    pub columns: Vec<String>,
}

/// The endpoints the report consumes. `?Send` because browser futures aren't.
#[async_trait(?Send)]
pub trait AnalysisApi {
    /// Before/after class distribution charts for one categorical column.
    async fn bias_charts(&self, request: &BiasChartRequest) -> Result<ChartPair, ApiError>;

    /// Before/after histograms for every listed continuous column, in one call.
    async fn skewness_charts(
        &self,
        request: &SkewnessChartRequest,
    ) -> Result<BTreeMap<String, VisualizationArtifact>, ApiError>;

    /// Raw bytes of a corrected dataset by file name.
    async fn corrected_dataset(&self, filename: &str) -> Result<Vec<u8>, ApiError>;

    /// A previously generated PDF report by file name.
    async fn report_document(&self, filename: &str) -> Result<Vec<u8>, ApiError>;
}

#[derive(Debug, Clone)]
pub struct HttpAnalysisApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAnalysisApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn download_url(&self, segments: [&str; 3], filename: &str) -> Result<reqwest::Url, ApiError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|err| ApiError::Network(format!("invalid service URL: {err}")))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Network("service URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments)
            .push(filename);
        Ok(url)
    }

    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, ApiError> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(%url, "posting to analysis service");

        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        let payload = serde_json::from_str::<Value>(&text).unwrap_or(Value::Null);

        if !status.is_success() {
            let message = error_message(&payload)
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_else(|| "request failed".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        if let Some(message) = error_message(&payload) {
            return Err(ApiError::Remote(message));
        }

        Ok(payload)
    }

    async fn get_bytes(&self, url: reqwest::Url) -> Result<Vec<u8>, ApiError> {
        tracing::debug!(%url, "downloading from analysis service");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let payload = serde_json::from_str::<Value>(&text).unwrap_or(Value::Null);
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&payload).unwrap_or_else(|| "download failed".to_string()),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait(?Send)]
impl AnalysisApi for HttpAnalysisApi {
    async fn bias_charts(&self, request: &BiasChartRequest) -> Result<ChartPair, ApiError> {
        let payload = self.post_json(BIAS_VISUALIZE_PATH, request).await?;
        serde_json::from_value(payload).map_err(|err| ApiError::Decode(err.to_string()))
    }

    async fn skewness_charts(
        &self,
        request: &SkewnessChartRequest,
    ) -> Result<BTreeMap<String, VisualizationArtifact>, ApiError> {
        let payload = self.post_json(SKEWNESS_VISUALIZE_PATH, request).await?;
        parse_skewness_charts(&payload)
    }

    async fn corrected_dataset(&self, filename: &str) -> Result<Vec<u8>, ApiError> {
        let url = self.download_url(CORRECTED_DOWNLOAD_SEGMENTS, filename)?;
        self.get_bytes(url).await
    }

    async fn report_document(&self, filename: &str) -> Result<Vec<u8>, ApiError> {
        let url = self.download_url(REPORT_DOWNLOAD_SEGMENTS, filename)?;
        self.get_bytes(url).await
    }
}

/// `{ "charts": { column: {before_chart, after_chart} | {error} } }`.
pub fn parse_skewness_charts(payload: &Value) -> Result<BTreeMap<String, VisualizationArtifact>, ApiError> {
    let charts = payload
        .get("charts")
        .and_then(Value::as_object)
        .ok_or_else(|| ApiError::Decode("missing `charts` object".to_string()))?;

    Ok(charts
        .iter()
        .map(|(column, raw)| (column.clone(), VisualizationArtifact::from_value(raw)))
        .collect())
}

/// The service reports failures as `{error}` (handlers) or `{message}` (aborts).
fn error_message(payload: &Value) -> Option<String> {
    ["error", "message"]
        .into_iter()
        .filter_map(|field| payload.get(field))
        .find_map(|value| match value {
            Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_field_precedes_message_field() {
        let payload = json!({ "error": "bad column", "message": "ignored" });
        assert_eq!(error_message(&payload).as_deref(), Some("bad column"));
        assert_eq!(
            error_message(&json!({ "message": "'columns' must be a non-empty list" })).as_deref(),
            Some("'columns' must be a non-empty list")
        );
        assert_eq!(error_message(&json!({ "charts": {} })), None);
    }

    #[test]
    fn skewness_batch_keeps_per_column_errors() {
        let payload = json!({
            "charts": {
                "age": { "before_chart": "{}", "after_chart": "{}", "before_skewness": 1.3, "after_skewness": 0.1 },
                "income": { "error": "Insufficient data" },
            }
        });
        let charts = parse_skewness_charts(&payload).unwrap();
        assert!(charts["age"].is_ready());
        assert_eq!(charts["income"].error(), Some("Insufficient data"));
    }

    #[test]
    fn missing_charts_object_is_a_decode_error() {
        assert!(matches!(
            parse_skewness_charts(&json!({ "status": "ok" })),
            Err(ApiError::Decode(_))
        ));
    }

    #[test]
    fn download_url_escapes_the_filename() {
        let api = HttpAnalysisApi::new("http://localhost:5000/");
        let url = api
            .download_url(CORRECTED_DOWNLOAD_SEGMENTS, "corrected data.csv")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:5000/api/corrected/download/corrected%20data.csv"
        );

        let url = api
            .download_url(REPORT_DOWNLOAD_SEGMENTS, "report_2024_01_01_120000.pdf")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:5000/api/reports/download/report_2024_01_01_120000.pdf"
        );
    }
}
