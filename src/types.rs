use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical stage name type used throughout the crate.
pub type StageName = String;

/// What an output represents, for consumers that display outputs.
///
/// The kind never influences hashing or staleness; it only selects which
/// outputs show up in e.g. [`crate::annotations::OutputAnnotationStore::collect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    #[default]
    Plain,
    Metric,
    Plot,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutputKind::Plain => "plain",
            OutputKind::Metric => "metric",
            OutputKind::Plot => "plot",
        };
        f.write_str(s)
    }
}

impl FromStr for OutputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "plain" => Ok(OutputKind::Plain),
            "metric" | "metrics" => Ok(OutputKind::Metric),
            "plot" | "plots" => Ok(OutputKind::Plot),
            other => Err(format!(
                "invalid output kind: {other} (expected \"plain\", \"metric\" or \"plot\")"
            )),
        }
    }
}

/// Outcome of a stage process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Success,
    Failed(i32),
}
