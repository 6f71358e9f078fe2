// src/repro/reproducer.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::anyhow;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::{load_params, lookup_param};
use crate::dag::{Pipeline, Resolution, Scheduler, StageSpec};
use crate::errors::{ReprodagError, Result};
use crate::exec::{ExecutorBackend, StageJob};
use crate::fs::FileSystem;
use crate::hash::{ContentHasher, HashCache};
use crate::lock::{LockEntry, LockStore};
use crate::repro::status::{stale_reasons, Observation, StageStatus, StaleReason};
use crate::types::{StageName, StageOutcome};

/// What a successful reproduce did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReproReport {
    /// Stages whose command ran, in completion order.
    pub executed: Vec<StageName>,
    /// Stages found up to date (frozen stages included).
    pub up_to_date: Vec<StageName>,
}

/// Per-invocation bookkeeping of a reproduce run.
#[derive(Debug, Default)]
struct RunContext {
    params: toml::Table,
    cache: HashCache,
    /// Entries committed during this invocation.
    fresh: HashMap<StageName, LockEntry>,
    /// Observations of stages currently executing.
    inflight: HashMap<StageName, Observation>,
}

enum Decision {
    UpToDate,
    Run(StageJob),
}

/// Brings a pipeline's outputs up to date with its inputs.
///
/// The reproducer is the only writer of the lock. Commits happen here, one
/// at a time, right after a stage exits successfully and its outputs are
/// rehashed.
pub struct Reproducer<L: LockStore, E: ExecutorBackend> {
    pipeline: Pipeline,
    fs: Arc<dyn FileSystem>,
    hasher: ContentHasher,
    lock: L,
    executor: Arc<E>,
    jobs: usize,
}

impl<L: LockStore, E: ExecutorBackend + 'static> Reproducer<L, E> {
    pub fn new(pipeline: Pipeline, fs: Arc<dyn FileSystem>, lock: L, executor: E) -> Self {
        let hasher = ContentHasher::new(fs.clone(), pipeline.root());
        let jobs = pipeline.config().jobs.max(1);
        Self {
            pipeline,
            fs,
            hasher,
            lock,
            executor: Arc::new(executor),
            jobs,
        }
    }

    /// Override `[config] jobs`.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn lock(&self) -> &L {
        &self.lock
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Execute every stale stage among `targets` and their ancestors (all
    /// stages when `targets` is empty).
    ///
    /// Halts at the first stage error: pending stages are skipped, stages
    /// already running finish and are committed, and the error is returned.
    pub async fn reproduce<S: AsRef<str>>(&mut self, targets: &[S]) -> Result<ReproReport> {
        let plan = self.plan(targets)?;
        info!(stages = plan.len(), jobs = self.jobs, "reproducing pipeline");

        let mut ctx = RunContext {
            params: load_params(self.fs.as_ref(), &self.pipeline.params_path())?,
            ..Default::default()
        };
        let mut scheduler = Scheduler::new(self.pipeline.graph());
        scheduler.start_run(&plan);

        let mut report = ReproReport::default();
        let mut running: JoinSet<(StageName, Result<StageOutcome>)> = JoinSet::new();
        let mut failure: Option<ReprodagError> = None;

        loop {
            // Dispatch until the job limit is reached or nothing is ready.
            while failure.is_none() && running.len() < self.jobs {
                let Some(name) = scheduler.collect_ready(1).pop() else {
                    break;
                };

                match self.decide(&name, &mut ctx) {
                    Ok(Decision::UpToDate) => {
                        scheduler.complete(&name, Resolution::UpToDate);
                        report.up_to_date.push(name);
                    }
                    Ok(Decision::Run(job)) => {
                        let fut = self.executor.run_stage(job);
                        running.spawn(async move { (name, fut.await) });
                    }
                    Err(err) => {
                        scheduler.complete(&name, Resolution::Failed);
                        scheduler.halt();
                        failure = Some(err);
                    }
                }
            }

            let Some(joined) = running.join_next().await else {
                break;
            };
            let (name, outcome) =
                joined.map_err(|e| ReprodagError::Other(anyhow!("stage task panicked: {e}")))?;

            match self.commit(&name, outcome, &mut ctx) {
                Ok(()) => {
                    scheduler.complete(&name, Resolution::Executed);
                    report.executed.push(name);
                }
                Err(err) => {
                    let step = scheduler.complete(&name, Resolution::Failed);
                    if !step.newly_skipped.is_empty() {
                        debug!(stage = %name, skipped = ?step.newly_skipped, "skipping dependents of failed stage");
                    }
                    if failure.is_none() {
                        scheduler.halt();
                        failure = Some(err);
                    }
                }
            }
        }

        if let Some(err) = failure {
            let skipped = scheduler.stages_in(crate::dag::StageRunState::Skipped);
            if !skipped.is_empty() {
                warn!(skipped = ?skipped, "stages not run because of an earlier failure");
            }
            return Err(err);
        }

        if targets.is_empty() {
            let active: Vec<StageName> = self.pipeline.graph().topo_order().to_vec();
            let pruned = self.lock.prune(&active)?;
            if !pruned.is_empty() {
                info!(pruned = ?pruned, "removed lock entries of undeclared stages");
            }
        }

        info!(
            executed = report.executed.len(),
            up_to_date = report.up_to_date.len(),
            "pipeline reproduced"
        );
        Ok(report)
    }

    /// Every planned stage that would run, with its reasons. Nothing is
    /// executed or written.
    ///
    /// Stages that are stale themselves come with their own reasons; stages
    /// only downstream of those get [`StaleReason::UpstreamStale`].
    pub fn status<S: AsRef<str>>(&self, targets: &[S]) -> Result<Vec<StageStatus>> {
        let plan = self.plan(targets)?;
        let mut ctx = RunContext {
            params: load_params(self.fs.as_ref(), &self.pipeline.params_path())?,
            ..Default::default()
        };

        let mut direct: HashMap<StageName, Vec<StaleReason>> = HashMap::new();
        for name in plan.iter() {
            let spec = self.spec(name)?;
            if spec.frozen {
                continue;
            }
            let observed = self.observe(spec, &mut ctx)?;
            let entry = self.lock.get(name)?;
            let reasons = stale_reasons(spec, &observed, entry.as_ref());
            if !reasons.is_empty() {
                direct.insert(name.clone(), reasons);
            }
        }

        let planned: HashSet<&str> = plan.iter().map(|s| s.as_str()).collect();
        let stale_names: Vec<&str> = plan
            .iter()
            .map(|s| s.as_str())
            .filter(|name| direct.contains_key(*name))
            .collect();
        let closure = self.pipeline.graph().stale_closure(&stale_names);

        let mut statuses = Vec::new();
        let mut stale: HashSet<StageName> = HashSet::new();
        for name in closure {
            if !planned.contains(name.as_str()) {
                continue;
            }
            let reasons = match direct.remove(&name) {
                Some(reasons) => reasons,
                None => {
                    if self.spec(&name)?.frozen {
                        continue;
                    }
                    let upstream = self
                        .pipeline
                        .graph()
                        .dependencies_of(&name)
                        .iter()
                        .find(|dep| stale.contains(*dep))
                        .cloned();
                    match upstream {
                        Some(stage) => vec![StaleReason::UpstreamStale { stage }],
                        None => continue,
                    }
                }
            };
            stale.insert(name.clone());
            statuses.push(StageStatus {
                stage: name,
                reasons,
            });
        }

        Ok(statuses)
    }

    fn plan<S: AsRef<str>>(&self, targets: &[S]) -> Result<Vec<StageName>> {
        let graph = self.pipeline.graph();
        if targets.is_empty() {
            Ok(graph.topo_order().to_vec())
        } else {
            graph.with_ancestors(targets)
        }
    }

    fn spec(&self, name: &str) -> Result<&StageSpec> {
        self.pipeline
            .stage(name)
            .ok_or_else(|| ReprodagError::StageNotFound(name.to_string()))
    }

    /// Decide whether `name` is up to date; if not, clear its outputs and
    /// build the job to run.
    fn decide(&self, name: &str, ctx: &mut RunContext) -> Result<Decision> {
        let spec = self.spec(name)?;
        if spec.frozen {
            info!(stage = %name, "stage is frozen; not checking");
            return Ok(Decision::UpToDate);
        }

        let observed = self.observe(spec, ctx)?;
        if let Some(key) = observed.missing_params.first() {
            return Err(ReprodagError::MissingParam {
                stage: name.to_string(),
                key: key.clone(),
            });
        }
        if let Some(path) = observed.missing_deps.first() {
            return Err(ReprodagError::MissingDependency {
                stage: name.to_string(),
                path: path.clone(),
            });
        }

        let entry = self.lock.get(name)?;
        let reasons = stale_reasons(spec, &observed, entry.as_ref());
        if reasons.is_empty() {
            info!(stage = %name, "stage is up to date");
            return Ok(Decision::UpToDate);
        }

        let reasons: Vec<String> = reasons.iter().map(|r| r.to_string()).collect();
        info!(stage = %name, reasons = ?reasons, "stage is stale; running");

        for out in spec.outs.iter() {
            let path = self.hasher.resolve(&out.path);
            ctx.cache.invalidate(&path);
            if out.persist {
                continue;
            }
            debug!(stage = %name, out = %out.path, "removing output before run");
            self.fs.remove_path(&path)?;
        }

        ctx.inflight.insert(name.to_string(), observed);
        Ok(Decision::Run(StageJob {
            stage: name.to_string(),
            cmd: spec.cmd.clone(),
            workdir: self.pipeline.root().to_path_buf(),
        }))
    }

    /// Rehash the outputs of a finished stage and commit its lock entry.
    fn commit(
        &mut self,
        name: &str,
        outcome: Result<StageOutcome>,
        ctx: &mut RunContext,
    ) -> Result<()> {
        let observed = ctx.inflight.remove(name).unwrap_or_default();
        let spec = self.spec(name)?;

        match outcome? {
            StageOutcome::Success => {}
            StageOutcome::Failed(exit_code) => {
                return Err(ReprodagError::StageFailed {
                    stage: name.to_string(),
                    cmd: spec.cmd.clone(),
                    exit_code,
                });
            }
        }

        let mut entry = LockEntry {
            cmd_hash: observed.cmd_hash,
            deps: observed.deps,
            params: observed.params,
            ..Default::default()
        };
        for out in spec.outs.iter() {
            ctx.cache.invalidate(&self.hasher.resolve(&out.path));
            let digest = match self.hasher.hash_cached(&out.path, &mut ctx.cache) {
                Ok(digest) => digest,
                Err(ReprodagError::MissingPath(_)) => {
                    return Err(ReprodagError::MissingOutput {
                        stage: name.to_string(),
                        path: out.path.clone(),
                    });
                }
                Err(e) => return Err(e),
            };
            entry.outs.insert(out.path.clone(), digest);
        }

        self.lock.put(name, entry.clone())?;
        ctx.fresh.insert(name.to_string(), entry);
        info!(stage = %name, "committed lock entry");
        Ok(())
    }

    /// Current command hash, params, dependency and output digests of `spec`.
    fn observe(&self, spec: &StageSpec, ctx: &mut RunContext) -> Result<Observation> {
        let mut observed = Observation {
            cmd_hash: spec.cmd_hash(),
            ..Default::default()
        };

        for key in spec.params.iter() {
            match lookup_param(&ctx.params, key) {
                Some(value) => {
                    observed.params.insert(key.clone(), value.clone());
                }
                None => observed.missing_params.push(key.clone()),
            }
        }

        for dep in spec.deps.iter() {
            if let Some(digest) = self.trusted_digest(&dep.path, &ctx.fresh)? {
                debug!(stage = %spec.name, dep = %dep.path, "using recorded digest of upstream output");
                observed.deps.insert(dep.path.clone(), digest);
                continue;
            }
            match self.hasher.hash_cached(&dep.path, &mut ctx.cache) {
                Ok(digest) => {
                    observed.deps.insert(dep.path.clone(), digest);
                }
                Err(ReprodagError::MissingPath(_)) => observed.missing_deps.push(dep.path.clone()),
                Err(e) => return Err(e),
            }
        }

        for out in spec.outs.iter() {
            match self.hasher.hash_cached(&out.path, &mut ctx.cache) {
                Ok(digest) => {
                    observed.outs.insert(out.path.clone(), digest);
                }
                Err(ReprodagError::MissingPath(_)) => observed.missing_outs.push(out.path.clone()),
                Err(e) => return Err(e),
            }
        }

        Ok(observed)
    }

    /// Digest of `dep` recorded by its producer, when `dep` is exactly one of
    /// an upstream stage's outputs.
    ///
    /// Relies on the producer being checked first, so a hand-edited output
    /// has already made it rerun. Frozen producers are never checked and
    /// are not trusted.
    fn trusted_digest(
        &self,
        dep: &str,
        fresh: &HashMap<StageName, LockEntry>,
    ) -> Result<Option<String>> {
        let Some((producer, out)) = self.pipeline.graph().producer_of(dep) else {
            return Ok(None);
        };
        if out != dep || self.spec(producer)?.frozen {
            return Ok(None);
        }
        let entry = match fresh.get(producer) {
            Some(entry) => Some(entry.clone()),
            None => self.lock.get(producer)?,
        };
        Ok(entry.and_then(|e| e.outs.get(out).cloned()))
    }
}
