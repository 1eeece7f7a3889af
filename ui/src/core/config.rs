//! Runtime configuration for the report page.

use serde::{Deserialize, Serialize};

use crate::core::storage::{StateStore, StoreKey};
use crate::report::export::ExportOptions;

/// Analysis service used when neither the build nor the store says otherwise.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub api_base_url: String,
    pub report_filename_prefix: String,
    pub export: ExportOptions,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            api_base_url: option_env!("BIASX_API_URL")
                .unwrap_or(DEFAULT_API_BASE_URL)
                .to_string(),
            report_filename_prefix: "bias_report".to_string(),
            export: ExportOptions::default(),
        }
    }
}

impl ReportConfig {
    /// Build-time defaults, with the API base overridable through the store.
    pub fn load(store: &StateStore) -> Self {
        let mut config = Self::default();
        let override_url = store.get(StoreKey::ApiBaseUrl, String::new());
        let trimmed = override_url.trim().trim_end_matches('/');
        if !trimmed.is_empty() {
            config.api_base_url = trimmed.to_string();
        }
        config
    }
}
