//! Before/after chart retrieval for the columns touched by the latest correction run.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::api::{AnalysisApi, BiasChartRequest, SkewnessChartRequest};

/// A serialized chart specification, kept as the JSON text the renderer consumes.
///
/// The service normally sends a JSON string; an inline object is re-serialized.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChartSpec(String);

impl ChartSpec {
    pub fn new(json: impl Into<String>) -> Self {
        Self(json.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Serialize for ChartSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ChartSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(text) => Self(text),
            Value::Null => Self::default(),
            other => Self(other.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPair {
    pub before_chart: ChartSpec,
    pub after_chart: ChartSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_skewness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_skewness: Option<f64>,
}

/// Per-column outcome: charts, or the error the service reported for that column.
#[derive(Debug, Clone, PartialEq)]
pub enum VisualizationArtifact {
    Ready(ChartPair),
    Failed { error: String },
}

impl VisualizationArtifact {
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed { error: error.into() }
    }

    /// Tolerant decode of one column's payload.
    pub fn from_value(raw: &Value) -> Self {
        if let Some(error) = raw.get("error").filter(|e| !e.is_null()) {
            let message = error
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Self::Failed { error: message };
        }
        match ChartPair::deserialize(raw) {
            Ok(pair) => Self::Ready(pair),
            Err(err) => Self::failed(format!("Malformed chart payload: {err}")),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn charts(&self) -> Option<&ChartPair> {
        match self {
            Self::Ready(pair) => Some(pair),
            Self::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { error } => Some(error),
            Self::Ready(_) => None,
        }
    }
}

/// Everything one fetch cycle depends on. Equality drives re-fetching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    pub before_path: Option<String>,
    pub after_path: Option<String>,
    pub categorical: Vec<String>,
    pub continuous: Vec<String>,
}

impl FetchRequest {
    fn paths(&self) -> Option<(&str, &str)> {
        let before = self.before_path.as_deref().map(str::trim).filter(|p| !p.is_empty())?;
        let after = self.after_path.as_deref().map(str::trim).filter(|p| !p.is_empty())?;
        Some((before, after))
    }

    pub fn has_work(&self) -> bool {
        self.paths().is_some() && !(self.categorical.is_empty() && self.continuous.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisualizationSet {
    pub categorical: BTreeMap<String, VisualizationArtifact>,
    pub continuous: BTreeMap<String, VisualizationArtifact>,
    /// Set when the continuous batch request itself failed.
    pub continuous_error: Option<String>,
}

impl VisualizationSet {
    pub fn is_empty(&self) -> bool {
        self.categorical.is_empty() && self.continuous.is_empty() && self.continuous_error.is_none()
    }
}

/// One request per categorical column (concurrently) plus one batch for all
/// continuous columns. A failing column only affects its own entry.
pub async fn fetch_visualizations<A>(api: &A, request: &FetchRequest) -> VisualizationSet
where
    A: AnalysisApi + ?Sized,
{
    let Some((before, after)) = request.paths() else {
        return VisualizationSet::default();
    };
    if !request.has_work() {
        return VisualizationSet::default();
    }

    let categorical = join_all(request.categorical.iter().map(|column| async move {
        let outcome = api
            .bias_charts(&BiasChartRequest {
                before_path: before.to_string(),
                after_path: after.to_string(),
                target_column: column.clone(),
            })
            .await;
        let artifact = match outcome {
            Ok(pair) => VisualizationArtifact::Ready(pair),
            Err(err) => {
                tracing::warn!(column = %column, error = %err, "bias visualization failed");
                VisualizationArtifact::failed(err.user_message())
            }
        };
        (column.clone(), artifact)
    }));

    let continuous = async {
        if request.continuous.is_empty() {
            return Ok(BTreeMap::new());
        }
        api.skewness_charts(&SkewnessChartRequest {
            before_path: before.to_string(),
            after_path: after.to_string(),
            columns: request.continuous.clone(),
        })
        .await
    };

    let (categorical, continuous) = futures::join!(categorical, continuous);

    let mut set = VisualizationSet {
        categorical: categorical.into_iter().collect(),
        ..VisualizationSet::default()
    };
    match continuous {
        Ok(charts) => set.continuous = charts,
        Err(err) => {
            tracing::warn!(error = %err, columns = request.continuous.len(), "skewness visualization batch failed");
            set.continuous_error = Some(err.user_message());
        }
    }
    set
}

/// Monotonic generation counter shared by every fetch cycle of one view.
#[derive(Debug, Clone, Default)]
pub struct FetchCycles {
    generation: Arc<AtomicU64>,
}

impl FetchCycles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new cycle, superseding any in flight.
    pub fn begin(&self) -> CycleTicket {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        CycleTicket {
            generation,
            cycles: self.clone(),
        }
    }

    pub fn current(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct CycleTicket {
    generation: u64,
    cycles: FetchCycles,
}

impl CycleTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.cycles.current() == self.generation
    }
}

/// Fetch under `ticket`; `None` when a newer cycle began meanwhile.
pub async fn run_cycle<A>(api: &A, request: &FetchRequest, ticket: &CycleTicket) -> Option<VisualizationSet>
where
    A: AnalysisApi + ?Sized,
{
    let set = fetch_visualizations(api, request).await;
    if ticket.is_current() {
        Some(set)
    } else {
        tracing::debug!(
            generation = ticket.generation(),
            current = ticket.cycles.current(),
            "dropping superseded visualization cycle"
        );
        None
    }
}
