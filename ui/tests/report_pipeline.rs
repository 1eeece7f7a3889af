use serde_json::json;

use ui::core::storage::{StateStore, StoreKey};
use ui::report::classify::{SeverityBucket, SkewBucket};
use ui::report::{ReportInputs, ReportModel};

fn seeded_store() -> StateStore {
    let store = StateStore::in_memory();
    store
        .set(StoreKey::SelectedColumns, &json!(["age", "gender", "income"]))
        .unwrap();
    store.set(StoreKey::CategoricalColumns, &json!(["gender"])).unwrap();
    store
        .set(StoreKey::ContinuousColumns, &json!(["age", "income"]))
        .unwrap();
    store
        .set(StoreKey::BiasResults, &json!({ "gender": { "severity": "Severe" } }))
        .unwrap();
    store
        .set(StoreKey::SkewnessResults, &json!({ "age": 0.03, "income": 1.2 }))
        .unwrap();
    store
}

#[test]
fn selected_columns_are_bucketed_by_domain() {
    let model = ReportModel::build(ReportInputs::hydrate(&seeded_store()));
    let summary = &model.classification;

    assert_eq!(summary.severity.count(SeverityBucket::Severe), 1);
    assert_eq!(summary.severity.columns(SeverityBucket::Severe), ["gender"]);
    assert_eq!(summary.severity.count(SeverityBucket::Low), 0);
    assert_eq!(summary.skewness.count(SkewBucket::Normal), 1);
    assert_eq!(summary.skewness.columns(SkewBucket::Normal), ["age"]);
    assert_eq!(summary.skewness.count(SkewBucket::Right), 1);
    assert_eq!(summary.skewness.columns(SkewBucket::Right), ["income"]);
    assert_eq!(summary.skewness.count(SkewBucket::Left), 0);
    assert_eq!(summary.total_selected_all, 3);
}

#[test]
fn correction_summary_tracks_latest_batch() {
    let store = seeded_store();
    store
        .set(
            StoreKey::CorrectionSummary,
            &json!({
                "categorical": {
                    "gender": [
                        { "method": "oversample", "ts": 1_000,
                          "before": { "Male": 900, "Female": 100, "severity": "Severe" },
                          "after": { "Male": 900, "Female": 900 } },
                    ],
                },
                "continuous": {
                    "income": { "method": "log", "original_skewness": 1.2, "new_skewness": 0.2, "ts": 1_000 },
                },
            }),
        )
        .unwrap();
    store
        .set(StoreKey::CorrectedFilePath, "corrected/adult_corrected.csv")
        .unwrap();
    store.set(StoreKey::SelectedFilePath, "uploads/adult.csv").unwrap();

    let model = ReportModel::build(ReportInputs::hydrate(&store));

    assert_eq!(model.corrections.categorical_needing_fix, ["gender"]);
    assert_eq!(model.corrections.continuous_needing_fix, ["income"]);
    assert!(model.corrections.pending.is_empty());
    assert_eq!(model.corrections.corrected.len(), 2);
    assert!(model
        .corrections
        .corrected
        .iter()
        .all(|column| column.resolved == Some(true)));

    let request = model.fetch_request();
    assert_eq!(request.categorical, ["gender"]);
    assert_eq!(request.continuous, ["income"]);
    assert!(request.has_work());
}

#[test]
fn malformed_store_values_degrade_to_an_empty_report() {
    let store = StateStore::in_memory();
    store.set(StoreKey::SelectedColumns, &json!({ "not": "a list" })).unwrap();
    store.set(StoreKey::CategoricalColumns, &json!(42)).unwrap();
    store.set(StoreKey::BiasResults, "definitely not json").unwrap();
    store.set(StoreKey::CorrectionSummary, &json!([1, 2, 3])).unwrap();

    let model = ReportModel::build(ReportInputs::hydrate(&store));

    assert_eq!(model.classification.total_selected_all, 0);
    assert_eq!(model.classification.categorical_total(), 0);
    assert!(model.latest.is_empty());
    assert!(model.corrections.corrected.is_empty());
}

#[test]
fn clearing_the_store_notifies_and_resets() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let store = seeded_store();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let _subscription = store.subscribe(&[StoreKey::SelectedColumns], {
        let seen = Rc::clone(&seen);
        move |key| seen.borrow_mut().push(key)
    });

    store.clear();

    assert_eq!(*seen.borrow(), vec![StoreKey::SelectedColumns]);
    let model = ReportModel::build(ReportInputs::hydrate(&store));
    assert_eq!(model.classification.total_selected_all, 0);
}
