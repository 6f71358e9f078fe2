// src/repro/status.rs

//! Staleness decisions: comparing what a stage looks like now against its
//! lock entry.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::dag::StageSpec;
use crate::lock::LockEntry;
use crate::types::StageName;

/// Why a stage must run again.
#[derive(Debug, Clone, PartialEq)]
pub enum StaleReason {
    /// The stage never succeeded (or its entry was removed).
    NoLockEntry,
    CmdChanged,
    ParamsChanged { key: String },
    /// A param the stage references is absent from the params file.
    ParamMissing { key: String },
    /// The declared dependency set differs from the recorded one.
    DepsChanged,
    /// The declared output set differs from the recorded one.
    OutsChanged,
    DepChanged { path: String },
    DepMissing { path: String },
    OutputMissing { path: String },
    /// An output on disk no longer matches what the stage produced.
    OutputChanged { path: String },
    AlwaysChanged,
    /// Not stale by itself, but downstream of a stale stage.
    UpstreamStale { stage: StageName },
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoLockEntry => write!(f, "no lock entry"),
            Self::CmdChanged => write!(f, "command changed"),
            Self::ParamsChanged { key } => write!(f, "param '{}' changed", key),
            Self::ParamMissing { key } => write!(f, "param '{}' missing", key),
            Self::DepsChanged => write!(f, "dependency set changed"),
            Self::OutsChanged => write!(f, "output set changed"),
            Self::DepChanged { path } => write!(f, "dependency '{}' changed", path),
            Self::DepMissing { path } => write!(f, "dependency '{}' missing", path),
            Self::OutputMissing { path } => write!(f, "output '{}' missing", path),
            Self::OutputChanged { path } => write!(f, "output '{}' changed", path),
            Self::AlwaysChanged => write!(f, "always changed"),
            Self::UpstreamStale { stage } => write!(f, "upstream stage '{}' is stale", stage),
        }
    }
}

/// The current state of one stage, as seen right before deciding whether it
/// must run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    pub cmd_hash: String,
    /// Digest of every dependency that exists.
    pub deps: BTreeMap<String, String>,
    pub missing_deps: Vec<String>,
    /// Value of every referenced param that exists.
    pub params: BTreeMap<String, toml::Value>,
    pub missing_params: Vec<String>,
    /// Digest of every declared output that exists.
    pub outs: BTreeMap<String, String>,
    pub missing_outs: Vec<String>,
}

/// Every reason `spec` is stale given `observed` and its lock `entry`.
///
/// An empty result means the stage is up to date. Frozen stages are not
/// special-cased here.
pub fn stale_reasons(
    spec: &StageSpec,
    observed: &Observation,
    entry: Option<&LockEntry>,
) -> Vec<StaleReason> {
    let mut reasons = Vec::new();

    if spec.always_changed {
        reasons.push(StaleReason::AlwaysChanged);
    }

    reasons.extend(
        observed
            .missing_params
            .iter()
            .map(|key| StaleReason::ParamMissing { key: key.clone() }),
    );
    reasons.extend(
        observed
            .missing_deps
            .iter()
            .map(|path| StaleReason::DepMissing { path: path.clone() }),
    );

    let Some(entry) = entry else {
        reasons.push(StaleReason::NoLockEntry);
        return reasons;
    };

    if entry.cmd_hash != observed.cmd_hash {
        reasons.push(StaleReason::CmdChanged);
    }

    let declared_deps: BTreeSet<&str> = spec.deps.iter().map(|d| d.path.as_str()).collect();
    let recorded_deps: BTreeSet<&str> = entry.deps.keys().map(|k| k.as_str()).collect();
    if declared_deps != recorded_deps {
        reasons.push(StaleReason::DepsChanged);
    }

    let declared_outs: BTreeSet<&str> = spec.outs.iter().map(|o| o.path.as_str()).collect();
    let recorded_outs: BTreeSet<&str> = entry.outs.keys().map(|k| k.as_str()).collect();
    if declared_outs != recorded_outs {
        reasons.push(StaleReason::OutsChanged);
    }

    for (key, value) in observed.params.iter() {
        if entry.params.get(key) != Some(value) {
            reasons.push(StaleReason::ParamsChanged { key: key.clone() });
        }
    }
    for key in entry.params.keys() {
        if !spec.params.contains(key) {
            reasons.push(StaleReason::ParamsChanged { key: key.clone() });
        }
    }

    for (path, digest) in observed.deps.iter() {
        if let Some(recorded) = entry.deps.get(path) {
            if recorded != digest {
                reasons.push(StaleReason::DepChanged { path: path.clone() });
            }
        }
    }

    for (path, digest) in observed.outs.iter() {
        if let Some(recorded) = entry.outs.get(path) {
            if recorded != digest {
                reasons.push(StaleReason::OutputChanged { path: path.clone() });
            }
        }
    }
    reasons.extend(
        observed
            .missing_outs
            .iter()
            .map(|path| StaleReason::OutputMissing { path: path.clone() }),
    );

    reasons
}

/// A planned stage that would run, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct StageStatus {
    pub stage: StageName,
    pub reasons: Vec<StaleReason>,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reasons: Vec<String> = self.reasons.iter().map(|r| r.to_string()).collect();
        write!(f, "{}: {}", self.stage, reasons.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::{OutConfig, StageConfig};

    fn spec() -> StageSpec {
        let cfg = StageConfig {
            cmd: "python train.py".into(),
            deps: vec!["data.csv".into()],
            outs: vec![OutConfig {
                path: "model.bin".into(),
                cache: true,
                kind: Default::default(),
                persist: false,
                props: toml::Table::new(),
            }],
            params: vec!["train.lr".into()],
            always_changed: false,
            frozen: false,
        };
        StageSpec::from_config("train", &cfg)
    }

    fn observed(spec: &StageSpec) -> Observation {
        Observation {
            cmd_hash: spec.cmd_hash(),
            deps: BTreeMap::from([("data.csv".to_string(), "d1".to_string())]),
            params: BTreeMap::from([("train.lr".to_string(), toml::Value::Float(0.1))]),
            ..Default::default()
        }
    }

    fn entry_for(spec: &StageSpec, obs: &Observation) -> LockEntry {
        LockEntry {
            cmd_hash: spec.cmd_hash(),
            deps: obs.deps.clone(),
            params: obs.params.clone(),
            outs: BTreeMap::from([("model.bin".to_string(), "o1".to_string())]),
        }
    }

    #[test]
    fn matching_entry_is_up_to_date() {
        let spec = spec();
        let obs = observed(&spec);
        let entry = entry_for(&spec, &obs);
        assert!(stale_reasons(&spec, &obs, Some(&entry)).is_empty());
    }

    #[test]
    fn absent_entry_is_stale() {
        let spec = spec();
        let obs = observed(&spec);
        assert_eq!(
            stale_reasons(&spec, &obs, None),
            vec![StaleReason::NoLockEntry]
        );
    }

    #[test]
    fn each_difference_is_reported() {
        let spec = spec();
        let obs = observed(&spec);
        let mut entry = entry_for(&spec, &obs);
        entry.cmd_hash = "old".into();
        entry.deps.insert("data.csv".into(), "d0".into());
        entry
            .params
            .insert("train.lr".into(), toml::Value::Float(0.2));

        let reasons = stale_reasons(&spec, &obs, Some(&entry));
        assert!(reasons.contains(&StaleReason::CmdChanged));
        assert!(reasons.contains(&StaleReason::DepChanged {
            path: "data.csv".into()
        }));
        assert!(reasons.contains(&StaleReason::ParamsChanged {
            key: "train.lr".into()
        }));
    }

    #[test]
    fn changed_output_set_and_missing_output_are_stale() {
        let spec = spec();
        let mut obs = observed(&spec);
        obs.missing_outs.push("model.bin".into());
        let mut entry = entry_for(&spec, &obs);
        entry.outs.insert("extra.bin".into(), "x".into());

        let reasons = stale_reasons(&spec, &obs, Some(&entry));
        assert!(reasons.contains(&StaleReason::OutsChanged));
        assert!(reasons.contains(&StaleReason::OutputMissing {
            path: "model.bin".into()
        }));
    }

    #[test]
    fn edited_output_is_stale() {
        let spec = spec();
        let mut obs = observed(&spec);
        let entry = entry_for(&spec, &obs);

        obs.outs.insert("model.bin".into(), "o1".into());
        assert!(stale_reasons(&spec, &obs, Some(&entry)).is_empty());

        obs.outs.insert("model.bin".into(), "edited".into());
        assert_eq!(
            stale_reasons(&spec, &obs, Some(&entry)),
            vec![StaleReason::OutputChanged {
                path: "model.bin".into()
            }]
        );
    }

    #[test]
    fn always_changed_is_stale_even_with_matching_entry() {
        let mut spec = spec();
        spec.always_changed = true;
        let obs = observed(&spec);
        let entry = entry_for(&spec, &obs);
        assert_eq!(
            stale_reasons(&spec, &obs, Some(&entry)),
            vec![StaleReason::AlwaysChanged]
        );
    }
}
