//! Severity / skewness bucketing over the columns the user currently has selected.
//!
//! Two independent threshold sets live here and must stay independent:
//! the display bands (`|skew| <= 0.1` is Normal) and the needing-fix rule
//! (`|skew| > 0.5`, severity Moderate or Severe).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde_json::Value;

use super::history::{CorrectionEntry, LatestCorrections};

/// Half-width of the band classified as Normal.
pub const NORMAL_SKEW_TOLERANCE: f64 = 0.1;
/// Continuous columns with `|skew|` above this need correcting.
pub const FIX_SKEW_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SeverityBucket {
    Low,
    Moderate,
    Severe,
    NotTested,
}

impl SeverityBucket {
    pub const ALL: [SeverityBucket; 4] = [
        SeverityBucket::Low,
        SeverityBucket::Moderate,
        SeverityBucket::Severe,
        SeverityBucket::NotTested,
    ];

    /// Unknown or missing labels land in `NotTested`.
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(|raw| raw.trim().to_ascii_lowercase()).as_deref() {
            Some("low") => Self::Low,
            Some("moderate") => Self::Moderate,
            Some("severe") => Self::Severe,
            _ => Self::NotTested,
        }
    }

    /// Same scale the detector uses for minority / majority ratios.
    pub fn from_imbalance_ratio(ratio: f64) -> Self {
        if !ratio.is_finite() {
            Self::NotTested
        } else if ratio >= 0.5 {
            Self::Low
        } else if ratio >= 0.2 {
            Self::Moderate
        } else {
            Self::Severe
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::Severe => "Severe",
            Self::NotTested => "Not tested",
        }
    }

    pub fn needs_fix(self) -> bool {
        matches!(self, Self::Moderate | Self::Severe)
    }
}

impl fmt::Display for SeverityBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkewBucket {
    Normal,
    Right,
    Left,
    NotTested,
}

impl SkewBucket {
    pub const ALL: [SkewBucket; 4] = [
        SkewBucket::Normal,
        SkewBucket::Right,
        SkewBucket::Left,
        SkewBucket::NotTested,
    ];

    pub fn classify(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => {
                if v.abs() <= NORMAL_SKEW_TOLERANCE {
                    Self::Normal
                } else if v > 0.0 {
                    Self::Right
                } else {
                    Self::Left
                }
            }
            _ => Self::NotTested,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Right => "Right-skewed",
            Self::Left => "Left-skewed",
            Self::NotTested => "Not tested",
        }
    }
}

impl fmt::Display for SkewBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn needs_fix_severity(label: Option<&str>) -> bool {
    SeverityBucket::from_label(label).needs_fix()
}

pub fn needs_fix_skewness(value: Option<f64>) -> bool {
    value.is_some_and(|v| v.is_finite() && v.abs() > FIX_SKEW_THRESHOLD)
}

/// Human description, e.g. "Moderately right-skewed". Display only.
pub fn describe_skewness(value: Option<f64>) -> String {
    let Some(v) = value.filter(|v| v.is_finite()) else {
        return "N/A".to_string();
    };
    let magnitude = v.abs();
    if magnitude <= FIX_SKEW_THRESHOLD {
        return "Symmetric".to_string();
    }
    let direction = if v > 0.0 { "right" } else { "left" };
    let degree = if magnitude <= 1.0 {
        "Slightly"
    } else if magnitude <= 2.0 {
        "Moderately"
    } else {
        "Highly"
    };
    format!("{degree} {direction}-skewed")
}

/// Which columns exist and which the user is focused on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionState {
    pub selected_columns: Vec<String>,
    pub categorical_columns: BTreeSet<String>,
    pub continuous_columns: BTreeSet<String>,
}

impl SelectionState {
    /// Deduplicated selection, in selection order, restricted to known columns.
    pub fn in_scope(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.selected_columns
            .iter()
            .filter(|column| {
                self.categorical_columns.contains(*column) || self.continuous_columns.contains(*column)
            })
            .filter(|column| seen.insert((*column).clone()))
            .cloned()
            .collect()
    }
}

/// What the detection service concluded per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionResults {
    pub severities: BTreeMap<String, String>,
    pub skewness: BTreeMap<String, f64>,
}

impl DetectionResults {
    /// Accepts `{col: {severity, ...}}` or `{col: "Severe"}` for bias and
    /// `{col: 1.2}` or `{col: {skewness: 1.2}}` for skewness. Anything else is skipped.
    pub fn from_values(bias: &Value, skewness: &Value) -> Self {
        let severities = bias
            .as_object()
            .into_iter()
            .flatten()
            .filter_map(|(column, raw)| {
                let label = match raw {
                    Value::String(label) => Some(label.as_str()),
                    Value::Object(fields) => fields.get("severity").and_then(Value::as_str),
                    _ => None,
                };
                label.map(|label| (column.clone(), label.to_string()))
            })
            .collect();

        let skewness = skewness
            .as_object()
            .into_iter()
            .flatten()
            .filter_map(|(column, raw)| {
                let value = match raw {
                    Value::Object(fields) => fields.get("skewness").and_then(Value::as_f64),
                    other => other.as_f64(),
                };
                value.map(|value| (column.clone(), value))
            })
            .collect();

        Self {
            severities,
            skewness,
        }
    }

    pub fn severity(&self, column: &str) -> Option<&str> {
        self.severities.get(column).map(String::as_str)
    }

    pub fn skewness(&self, column: &str) -> Option<f64> {
        self.skewness.get(column).copied()
    }
}

/// Column names grouped by bucket. Every bucket is present, possibly empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Buckets<K: Ord> {
    members: BTreeMap<K, Vec<String>>,
}

impl<K: Ord + Copy> Buckets<K> {
    fn with_keys(keys: impl IntoIterator<Item = K>) -> Self {
        Self {
            members: keys.into_iter().map(|key| (key, Vec::new())).collect(),
        }
    }

    fn push(&mut self, key: K, column: &str) {
        self.members.entry(key).or_default().push(column.to_string());
    }

    pub fn count(&self, key: K) -> usize {
        self.columns(key).len()
    }

    pub fn columns(&self, key: K) -> &[String] {
        self.members.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total(&self) -> usize {
        self.members.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &[String])> {
        self.members.iter().map(|(key, columns)| (*key, columns.as_slice()))
    }
}

impl Default for Buckets<SeverityBucket> {
    fn default() -> Self {
        Self::with_keys(SeverityBucket::ALL)
    }
}

impl Default for Buckets<SkewBucket> {
    fn default() -> Self {
        Self::with_keys(SkewBucket::ALL)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassificationSummary {
    pub severity: Buckets<SeverityBucket>,
    pub skewness: Buckets<SkewBucket>,
    pub total_selected_all: usize,
}

impl ClassificationSummary {
    pub fn categorical_total(&self) -> usize {
        self.severity.total()
    }

    pub fn continuous_total(&self) -> usize {
        self.skewness.total()
    }
}

/// Bucket every in-scope selected column. A column listed in both domains is
/// classified in both but counted once in `total_selected_all`.
pub fn classify(selection: &SelectionState, detection: &DetectionResults) -> ClassificationSummary {
    let mut summary = ClassificationSummary::default();
    let in_scope = selection.in_scope();

    for column in &in_scope {
        if selection.categorical_columns.contains(column) {
            let bucket = SeverityBucket::from_label(detection.severity(column));
            summary.severity.push(bucket, column);
        }
        if selection.continuous_columns.contains(column) {
            let bucket = SkewBucket::classify(detection.skewness(column));
            summary.skewness.push(bucket, column);
        }
    }

    summary.total_selected_all = in_scope.len();
    summary
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnDomain {
    Categorical,
    Continuous,
}

/// One column touched by the latest correction batch.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectedColumn {
    pub column: String,
    pub domain: ColumnDomain,
    pub method: String,
    /// `Some(true)` when the "after" state no longer needs fixing.
    pub resolved: Option<bool>,
}

impl CorrectedColumn {
    fn categorical(column: &str, entry: &CorrectionEntry) -> Self {
        let resolved = entry
            .after
            .imbalance_ratio()
            .map(|ratio| !SeverityBucket::from_imbalance_ratio(ratio).needs_fix());
        Self {
            column: column.to_string(),
            domain: ColumnDomain::Categorical,
            method: entry.method.clone(),
            resolved,
        }
    }

    fn continuous(column: &str, entry: &CorrectionEntry) -> Self {
        Self {
            column: column.to_string(),
            domain: ColumnDomain::Continuous,
            method: entry.method.clone(),
            resolved: entry.new_skewness.map(|skew| !needs_fix_skewness(Some(skew))),
        }
    }
}

/// Which selected columns needed fixing, which were fixed in the latest
/// batch, and which are still outstanding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrectionSummary {
    pub categorical_needing_fix: Vec<String>,
    pub continuous_needing_fix: Vec<String>,
    pub corrected: Vec<CorrectedColumn>,
    pub pending: Vec<String>,
}

pub fn summarize_corrections(
    selection: &SelectionState,
    detection: &DetectionResults,
    latest: &LatestCorrections,
) -> CorrectionSummary {
    let in_scope = selection.in_scope();

    let categorical_needing_fix: Vec<String> = in_scope
        .iter()
        .filter(|column| selection.categorical_columns.contains(*column))
        .filter(|column| needs_fix_severity(detection.severity(column)))
        .cloned()
        .collect();

    let continuous_needing_fix: Vec<String> = in_scope
        .iter()
        .filter(|column| selection.continuous_columns.contains(*column))
        .filter(|column| needs_fix_skewness(detection.skewness(column)))
        .cloned()
        .collect();

    let corrected: Vec<CorrectedColumn> = latest
        .categorical
        .iter()
        .map(|(column, entry)| CorrectedColumn::categorical(column, entry))
        .chain(
            latest
                .continuous
                .iter()
                .map(|(column, entry)| CorrectedColumn::continuous(column, entry)),
        )
        .collect();

    let pending = categorical_needing_fix
        .iter()
        .filter(|column| !latest.categorical.contains_key(*column))
        .chain(
            continuous_needing_fix
                .iter()
                .filter(|column| !latest.continuous.contains_key(*column)),
        )
        .cloned()
        .collect();

    CorrectionSummary {
        categorical_needing_fix,
        continuous_needing_fix,
        corrected,
        pending,
    }
}
