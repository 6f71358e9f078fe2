// tests/scheduler.rs

use std::collections::HashSet;

use proptest::prelude::*;
use reprodag::dag::{DependencyGraph, Resolution, Scheduler, StageRunState, StageSpec};
use reprodag_test_utils::StageConfigBuilder;

fn stage(name: &str, deps: &[&str], outs: &[&str]) -> StageSpec {
    let mut builder = StageConfigBuilder::new(&format!("make {name}"));
    for dep in deps {
        builder = builder.dep(dep);
    }
    for out in outs {
        builder = builder.out(out);
    }
    StageSpec::from_config(name, &builder.build())
}

/// a -> b -> d, a -> c, plus an unrelated `x`.
fn graph() -> DependencyGraph {
    DependencyGraph::build(&[
        stage("a", &[], &["a.out"]),
        stage("b", &["a.out"], &["b.out"]),
        stage("c", &["a.out"], &["c.out"]),
        stage("d", &["b.out"], &["d.out"]),
        stage("x", &[], &["x.out"]),
    ])
    .unwrap()
}

#[test]
fn ready_stages_wait_for_upstream_and_respect_limit() {
    let graph = graph();
    let mut scheduler = Scheduler::new(&graph);
    scheduler.start_run(graph.topo_order());

    assert_eq!(scheduler.collect_ready(1), vec!["a"]);
    assert_eq!(scheduler.collect_ready(5), vec!["x"]);
    assert!(scheduler.collect_ready(5).is_empty());

    scheduler.complete("a", Resolution::UpToDate);
    assert_eq!(scheduler.collect_ready(5), vec!["b", "c"]);
    assert_eq!(scheduler.run_state_of("d"), Some(StageRunState::Pending));
    assert_eq!(scheduler.deps_satisfied("d"), Some(false));
    assert_eq!(scheduler.deps_satisfied("missing"), None);
}

#[test]
fn stages_outside_the_plan_are_not_dispatched() {
    let graph = graph();
    let mut scheduler = Scheduler::new(&graph);
    scheduler.start_run(&["b", "d"]);

    // `a` is not planned, so it does not hold `b` back.
    assert_eq!(scheduler.collect_ready(5), vec!["b"]);
    assert_eq!(scheduler.run_state_of("a"), Some(StageRunState::NotInRun));
    scheduler.complete("b", Resolution::Executed);
    assert_eq!(scheduler.collect_ready(5), vec!["d"]);
    let step = scheduler.complete("d", Resolution::Executed);
    assert!(step.run_finished);
}

#[test]
fn failure_skips_only_descendants() {
    let graph = graph();
    let mut scheduler = Scheduler::new(&graph);
    scheduler.start_run(graph.topo_order());

    scheduler.collect_ready(5);
    scheduler.complete("a", Resolution::Executed);
    let ready = scheduler.collect_ready(5);
    assert_eq!(ready, vec!["b", "c"]);

    let step = scheduler.complete("b", Resolution::Failed);
    assert_eq!(step.newly_skipped, vec!["d"]);
    assert!(!step.run_finished);

    scheduler.complete("c", Resolution::Executed);
    let step = scheduler.complete("x", Resolution::UpToDate);
    assert!(step.run_finished);
    assert_eq!(scheduler.stages_in(StageRunState::Skipped), vec!["d"]);
    assert_eq!(scheduler.stages_in(StageRunState::Failed), vec!["b"]);
}

#[test]
fn halt_skips_pending_and_lets_running_stages_finish() {
    let graph = graph();
    let mut scheduler = Scheduler::new(&graph);
    scheduler.start_run(graph.topo_order());

    assert_eq!(scheduler.collect_ready(1), vec!["a"]);
    let step = scheduler.halt();
    assert_eq!(step.newly_skipped, vec!["b", "c", "d", "x"]);
    assert!(!step.run_finished);
    assert!(scheduler.collect_ready(5).is_empty());

    let step = scheduler.complete("a", Resolution::Executed);
    assert!(step.run_finished);
    assert_eq!(scheduler.run_state_of("a"), Some(StageRunState::Executed));
}

// Strategy for a random acyclic pipeline: stage N may only read outputs of
// stages 0..N-1.
fn pipeline_strategy(max_stages: usize) -> impl Strategy<Value = Vec<StageSpec>> {
    (1..=max_stages).prop_flat_map(|num_stages| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_stages),
            num_stages,
        )
        .prop_map(move |raw_deps| {
            raw_deps
                .into_iter()
                .enumerate()
                .map(|(i, picks)| {
                    let deps: HashSet<String> = picks
                        .into_iter()
                        .filter(|_| i > 0)
                        .map(|p| format!("out_{}", p % i))
                        .collect();
                    let deps: Vec<&str> = deps.iter().map(|s| s.as_str()).collect();
                    stage(&format!("stage_{i}"), &deps, &[&format!("out_{i}")])
                })
                .collect()
        })
    })
}

proptest! {
    #[test]
    fn every_run_terminates_with_all_stages_resolved(
        stages in pipeline_strategy(10),
        failing in proptest::collection::vec(0..10usize, 0..4),
        limit in 1..4usize,
    ) {
        let graph = DependencyGraph::build(&stages).unwrap();
        let failing: HashSet<String> = failing
            .into_iter()
            .map(|i| format!("stage_{}", i % stages.len()))
            .collect();

        let mut scheduler = Scheduler::new(&graph);
        scheduler.start_run(graph.topo_order());

        let mut done: HashSet<String> = HashSet::new();
        let mut running: Vec<String> = Vec::new();
        let mut steps = 0;

        loop {
            steps += 1;
            prop_assert!(steps < 1000, "scheduler did not terminate");

            let room = limit.saturating_sub(running.len());
            if room > 0 {
                for name in scheduler.collect_ready(room) {
                    // Dispatched stages only ever follow successful upstreams.
                    for dep in graph.dependencies_of(&name) {
                        prop_assert!(done.contains(dep));
                    }
                    running.push(name);
                }
            }

            if running.is_empty() {
                break;
            }
            let name = running.remove(0);
            let resolution = if failing.contains(&name) {
                Resolution::Failed
            } else {
                done.insert(name.clone());
                Resolution::Executed
            };
            scheduler.complete(&name, resolution);
        }

        prop_assert!(scheduler.is_finished());
        for name in graph.topo_order() {
            prop_assert!(!matches!(
                scheduler.run_state_of(name),
                Some(StageRunState::Pending) | Some(StageRunState::Running)
            ));
        }
    }
}
