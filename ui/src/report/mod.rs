//! The bias report: reconciling correction runs, classifying the selected
//! columns, fetching before/after charts and exporting the result.

pub mod api;
pub mod charts;
pub mod classify;
pub mod download;
pub mod export;
pub mod history;
pub mod panel;
pub mod plotly;
pub mod summary;
pub mod visuals;

use std::collections::BTreeSet;

use crate::core::storage::{StateStore, StoreKey};

pub use classify::{
    classify, summarize_corrections, ClassificationSummary, CorrectionSummary, DetectionResults,
    SelectionState, SeverityBucket, SkewBucket,
};
pub use history::{reconcile, CorrectionEntry, CorrectionHistories, LatestCorrections};
pub use visuals::{FetchRequest, VisualizationArtifact, VisualizationSet};

/// Store keys whose change invalidates the report.
pub const WATCHED_KEYS: [StoreKey; 11] = [
    StoreKey::LastReportPath,
    StoreKey::CorrectionSummary,
    StoreKey::CorrectedFilePath,
    StoreKey::SelectedColumns,
    StoreKey::CategoricalColumns,
    StoreKey::ContinuousColumns,
    StoreKey::BiasResults,
    StoreKey::SkewnessResults,
    StoreKey::SelectedFilePath,
    StoreKey::PreprocessedFilePath,
    StoreKey::UploadedFilePath,
];

/// Everything the report reads from the store, already normalized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportInputs {
    pub selection: SelectionState,
    pub detection: DetectionResults,
    pub histories: CorrectionHistories,
    /// Dataset the corrections started from.
    pub source_path: Option<String>,
    pub corrected_path: Option<String>,
    pub last_report_path: Option<String>,
}

impl ReportInputs {
    pub fn hydrate(store: &StateStore) -> Self {
        let set_of = |key| store.get::<Vec<String>>(key, Vec::new()).into_iter().collect::<BTreeSet<_>>();

        Self {
            selection: SelectionState {
                selected_columns: store.get(StoreKey::SelectedColumns, Vec::new()),
                categorical_columns: set_of(StoreKey::CategoricalColumns),
                continuous_columns: set_of(StoreKey::ContinuousColumns),
            },
            detection: DetectionResults::from_values(
                &store.get_value(StoreKey::BiasResults),
                &store.get_value(StoreKey::SkewnessResults),
            ),
            histories: store.get(StoreKey::CorrectionSummary, CorrectionHistories::default()),
            source_path: store.first_path(&StoreKey::SOURCE_PATH_CANDIDATES),
            corrected_path: store.first_path(&[StoreKey::CorrectedFilePath]),
            last_report_path: store.first_path(&[StoreKey::LastReportPath]),
        }
    }
}

/// Everything the page shows, derived from one [`ReportInputs`] snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportModel {
    pub inputs: ReportInputs,
    pub latest: LatestCorrections,
    pub classification: ClassificationSummary,
    pub corrections: CorrectionSummary,
}

impl ReportModel {
    pub fn build(inputs: ReportInputs) -> Self {
        let latest = reconcile(&inputs.histories);
        let classification = classify(&inputs.selection, &inputs.detection);
        let corrections = summarize_corrections(&inputs.selection, &inputs.detection, &latest);
        Self {
            inputs,
            latest,
            classification,
            corrections,
        }
    }

    /// Charts to fetch for the columns in the latest correction batch.
    pub fn fetch_request(&self) -> FetchRequest {
        FetchRequest {
            before_path: self.inputs.source_path.clone(),
            after_path: self.inputs.corrected_path.clone(),
            categorical: self.latest.categorical_columns(),
            continuous: self.latest.continuous_columns(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hydrate_tolerates_an_empty_store() {
        let inputs = ReportInputs::hydrate(&StateStore::in_memory());
        assert_eq!(inputs, ReportInputs::default());
        let model = ReportModel::build(inputs);
        assert_eq!(model.classification.total_selected_all, 0);
        assert!(!model.fetch_request().has_work());
    }

    #[test]
    fn source_path_follows_candidate_precedence() {
        let store = StateStore::in_memory();
        store.set(StoreKey::UploadedFilePath, "uploads/raw.csv").unwrap();
        store
            .set(StoreKey::PreprocessedFilePath, "uploads/clean.csv")
            .unwrap();
        let inputs = ReportInputs::hydrate(&store);
        assert_eq!(inputs.source_path.as_deref(), Some("uploads/clean.csv"));
    }

    #[test]
    fn fetch_request_targets_latest_batch_columns() {
        let store = StateStore::in_memory();
        store.set(StoreKey::SelectedFilePath, "uploads/adult.csv").unwrap();
        store
            .set(StoreKey::CorrectedFilePath, "corrected/adult_corrected.csv")
            .unwrap();
        store
            .set(
                StoreKey::CorrectionSummary,
                &json!({
                    "categorical": {
                        "gender": [{ "method": "smote", "ts": 100 }, { "method": "oversample", "ts": 200 }],
                        "race": { "method": "undersample", "ts": 100 },
                    },
                    "continuous": { "income": { "method": "log", "ts": 200 } },
                }),
            )
            .unwrap();

        let model = ReportModel::build(ReportInputs::hydrate(&store));
        let request = model.fetch_request();
        assert_eq!(request.categorical, vec!["gender".to_string()]);
        assert_eq!(request.continuous, vec!["income".to_string()]);
        assert_eq!(request.before_path.as_deref(), Some("uploads/adult.csv"));
        assert!(request.has_work());
    }
}
