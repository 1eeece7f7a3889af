//! Correction histories and their reconciliation into a single "latest" view.
//!
//! The correction service appends one entry per column each time a batch runs.
//! Older writers stored a bare object instead of a list, so every history is
//! normalized to a sequence as soon as it is read; nothing downstream branches
//! on shape.
//!
//! "Latest" means the most recent *batch*: the maximum `ts` across every entry
//! in both domains. A column that wasn't part of that batch drops out of the
//! view even if it was corrected earlier. Only when no entry carries a `ts` at
//! all does each column fall back to its own last entry.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Keys in a snapshot that describe it rather than count a category.
const SNAPSHOT_META_KEYS: [&str; 5] = ["severity", "note", "total", "counts", "distribution"];

/// Category counts for one column at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DistributionSnapshot(Map<String, Value>);

impl DistributionSnapshot {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self(map.clone()),
            _ => Self::default(),
        }
    }

    /// Label → count. A nested `counts` object takes precedence over top-level keys.
    pub fn counts(&self) -> BTreeMap<String, f64> {
        let numeric = |(label, value): (&String, &Value)| {
            value
                .as_f64()
                .filter(|count| count.is_finite() && *count >= 0.0)
                .map(|count| (label.clone(), count))
        };

        match self.0.get("counts") {
            Some(Value::Object(nested)) => nested.iter().filter_map(numeric).collect(),
            _ => self
                .0
                .iter()
                .filter(|(label, _)| !SNAPSHOT_META_KEYS.contains(&label.as_str()))
                .filter_map(numeric)
                .collect(),
        }
    }

    /// Explicit `total` when recorded, otherwise the sum of counts.
    pub fn total(&self) -> f64 {
        self.0
            .get("total")
            .and_then(Value::as_f64)
            .filter(|total| total.is_finite())
            .unwrap_or_else(|| self.counts().values().sum())
    }

    pub fn ratios(&self) -> BTreeMap<String, f64> {
        let counts = self.counts();
        let total: f64 = counts.values().sum();
        counts
            .into_iter()
            .map(|(label, count)| {
                let ratio = if total > 0.0 { count / total } else { 0.0 };
                (label, ratio)
            })
            .collect()
    }

    /// Minority / majority share; `0` for a single class, `None` when empty.
    pub fn imbalance_ratio(&self) -> Option<f64> {
        let counts = self.counts();
        if counts.is_empty() {
            return None;
        }
        if counts.len() == 1 {
            return Some(0.0);
        }
        let majority = counts.values().copied().fold(f64::MIN, f64::max);
        let minority = counts.values().copied().fold(f64::MAX, f64::min);
        Some(if majority > 0.0 { minority / majority } else { 0.0 })
    }

    pub fn severity(&self) -> Option<&str> {
        self.0.get("severity").and_then(Value::as_str)
    }

    pub fn note(&self) -> Option<&str> {
        self.0.get("note").and_then(Value::as_str)
    }
}

impl<'de> Deserialize<'de> for DistributionSnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

/// One correction applied to one column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrectionEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub method: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub before: DistributionSnapshot,
    #[serde(default)]
    pub after: DistributionSnapshot,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub original_skewness: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub new_skewness: Option<f64>,
    /// Epoch millis of the batch that produced this entry. Kept as written:
    /// fractional values are not rounded, so `12.4` and `12` are distinct batches.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub ts: Option<f64>,
}

impl CorrectionEntry {
    fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        _ => String::new(),
    })
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(Value::deserialize(deserializer)?
        .as_f64()
        .filter(|value| value.is_finite()))
}

/// Column → chronological correction entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CorrectionHistory(BTreeMap<String, Vec<CorrectionEntry>>);

impl CorrectionHistory {
    /// Normalize whatever the correction service stored. Bare entries become
    /// one-element sequences; entries that aren't objects are dropped.
    pub fn from_value(value: &Value) -> Self {
        let Value::Object(columns) = value else {
            return Self::default();
        };

        let normalized = columns
            .iter()
            .map(|(column, raw)| {
                let entries = match raw {
                    Value::Array(items) => items.iter().filter_map(CorrectionEntry::from_value).collect(),
                    other => CorrectionEntry::from_value(other).into_iter().collect(),
                };
                (column.clone(), entries)
            })
            .collect();

        Self(normalized)
    }

    pub fn from_entries(
        columns: impl IntoIterator<Item = (impl Into<String>, Vec<CorrectionEntry>)>,
    ) -> Self {
        Self(
            columns
                .into_iter()
                .map(|(column, entries)| (column.into(), entries))
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn entries(&self, column: &str) -> &[CorrectionEntry] {
        self.0.get(column).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<CorrectionEntry>)> {
        self.0.iter()
    }

    fn timestamps(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.values().flatten().filter_map(|entry| entry.ts)
    }
}

impl<'de> Deserialize<'de> for CorrectionHistory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

/// The stored correction summary: one history per column domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionHistories {
    pub categorical: CorrectionHistory,
    pub continuous: CorrectionHistory,
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatestCorrections {
    pub categorical: BTreeMap<String, CorrectionEntry>,
    pub continuous: BTreeMap<String, CorrectionEntry>,
    /// The batch timestamp everything was matched against, when one exists.
    pub batch_ts: Option<f64>,
}

impl LatestCorrections {
    pub fn is_empty(&self) -> bool {
        self.categorical.is_empty() && self.continuous.is_empty()
    }

    pub fn categorical_columns(&self) -> Vec<String> {
        self.categorical.keys().cloned().collect()
    }

    pub fn continuous_columns(&self) -> Vec<String> {
        self.continuous.keys().cloned().collect()
    }
}

/// Collapse both domains' histories to the latest batch.
pub fn reconcile(histories: &CorrectionHistories) -> LatestCorrections {
    let batch_ts = histories
        .categorical
        .timestamps()
        .chain(histories.continuous.timestamps())
        .reduce(f64::max);

    LatestCorrections {
        categorical: latest_per_column(&histories.categorical, batch_ts),
        continuous: latest_per_column(&histories.continuous, batch_ts),
        batch_ts,
    }
}

fn latest_per_column(
    history: &CorrectionHistory,
    batch_ts: Option<f64>,
) -> BTreeMap<String, CorrectionEntry> {
    history
        .iter()
        .filter_map(|(column, entries)| {
            let latest = match batch_ts {
                Some(ts) => entries.iter().rev().find(|entry| entry.ts == Some(ts)),
                None => entries.last(),
            };
            latest.map(|entry| (column.clone(), entry.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(method: &str, ts: Option<f64>) -> CorrectionEntry {
        CorrectionEntry {
            method: method.into(),
            ts,
            ..CorrectionEntry::default()
        }
    }

    #[test]
    fn bare_objects_normalize_to_single_entries() {
        let history = CorrectionHistory::from_value(&json!({
            "gender": { "method": "oversample", "ts": 10 },
            "region": [{ "method": "smote", "ts": 5 }, 7, { "method": "undersample", "ts": 9 }],
            "broken": "nope",
        }));

        assert_eq!(history.entries("gender").len(), 1);
        assert_eq!(history.entries("region").len(), 2);
        assert!(history.entries("broken").is_empty());
    }

    #[test]
    fn latest_batch_is_global_not_per_column() {
        let histories = CorrectionHistories {
            categorical: CorrectionHistory::from_entries([
                ("gender", vec![entry("smote", Some(100.0)), entry("oversample", Some(200.0))]),
                ("region", vec![entry("smote", Some(100.0))]),
            ]),
            continuous: CorrectionHistory::from_entries([("income", vec![entry("log", Some(200.0))])]),
        };

        let latest = reconcile(&histories);
        assert_eq!(latest.batch_ts, Some(200.0));
        assert_eq!(latest.categorical_columns(), vec!["gender".to_string()]);
        assert_eq!(latest.categorical["gender"].method, "oversample");
        assert_eq!(latest.continuous_columns(), vec!["income".to_string()]);
    }

    #[test]
    fn last_matching_entry_wins_within_a_batch() {
        let histories = CorrectionHistories {
            categorical: CorrectionHistory::from_entries([(
                "gender",
                vec![entry("smote", Some(300.0)), entry("reweight", Some(300.0))],
            )]),
            ..CorrectionHistories::default()
        };
        assert_eq!(reconcile(&histories).categorical["gender"].method, "reweight");
    }

    #[test]
    fn without_timestamps_each_column_keeps_its_last_entry() {
        let histories = CorrectionHistories {
            categorical: CorrectionHistory::from_entries([
                ("gender", vec![entry("smote", None), entry("oversample", None)]),
                ("region", vec![entry("undersample", None)]),
            ]),
            ..CorrectionHistories::default()
        };

        let latest = reconcile(&histories);
        assert_eq!(latest.batch_ts, None);
        assert_eq!(latest.categorical["gender"].method, "oversample");
        assert_eq!(latest.categorical["region"].method, "undersample");
    }

    #[test]
    fn entries_without_ts_are_skipped_once_any_ts_exists() {
        let histories = CorrectionHistories {
            categorical: CorrectionHistory::from_entries([
                ("gender", vec![entry("smote", Some(50.0))]),
                ("region", vec![entry("undersample", None)]),
            ]),
            ..CorrectionHistories::default()
        };
        let latest = reconcile(&histories);
        assert!(latest.categorical.contains_key("gender"));
        assert!(!latest.categorical.contains_key("region"));
    }

    #[test]
    fn non_numeric_ts_is_treated_as_absent() {
        let history = CorrectionHistory::from_value(&json!({
            "gender": [{ "method": "smote", "ts": "yesterday" }, { "method": "smote", "ts": 12.6 }],
        }));
        let entries = history.entries("gender");
        assert_eq!(entries[0].ts, None);
        assert_eq!(entries[1].ts, Some(12.6));
    }

    #[test]
    fn fractional_ts_is_compared_exactly() {
        let histories = CorrectionHistories {
            categorical: CorrectionHistory::from_value(&json!({
                "a": { "method": "smote", "ts": 12.4 },
                "b": { "method": "smote", "ts": 12 },
            })),
            ..CorrectionHistories::default()
        };

        let latest = reconcile(&histories);
        assert_eq!(latest.batch_ts, Some(12.4));
        assert_eq!(latest.categorical_columns(), vec!["a".to_string()]);
    }

    #[test]
    fn snapshot_excludes_metadata_from_ratios() {
        let snapshot = DistributionSnapshot::from_value(&json!({
            "F": 30, "M": 90, "severity": "Severe", "note": "n/a", "total": 120,
        }));
        let counts = snapshot.counts();
        assert_eq!(counts.len(), 2);
        assert_eq!(snapshot.total(), 120.0);
        assert_eq!(snapshot.ratios()["F"], 0.25);
        assert_eq!(snapshot.imbalance_ratio(), Some(30.0 / 90.0));
        assert_eq!(snapshot.severity(), Some("Severe"));
    }

    #[test]
    fn snapshot_reads_nested_counts_from_correction_service() {
        let snapshot = DistributionSnapshot::from_value(&json!({
            "counts": { "yes": 10, "no": 10 },
            "distribution": { "yes": 0.5, "no": 0.5 },
            "total": 20,
        }));
        assert_eq!(snapshot.counts().len(), 2);
        assert_eq!(snapshot.imbalance_ratio(), Some(1.0));
    }
}
