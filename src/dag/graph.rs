// src/dag/graph.rs

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::{debug, warn};

use crate::dag::stage::StageSpec;
use crate::errors::{ReprodagError, Result};
use crate::types::StageName;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone, Default)]
struct StageNode {
    /// Stages producing something this stage consumes.
    deps: Vec<StageName>,
    /// Stages consuming something this stage produces.
    dependents: Vec<StageName>,
}

/// Directed acyclic graph over stages.
///
/// Edges are derived from paths: stage `A` depends on stage `B` when one of
/// `A`'s dependencies is, lies inside, or contains one of `B`'s outputs.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: HashMap<StageName, StageNode>,
    /// Declared output path → producing stage.
    producers: BTreeMap<String, StageName>,
    /// Deterministic topological order (ties broken by name).
    order: Vec<StageName>,
}

/// `child` is strictly below `parent` (component-wise).
fn is_within(child: &str, parent: &str) -> bool {
    child != parent && Path::new(child).starts_with(Path::new(parent))
}

fn overlaps(a: &str, b: &str) -> bool {
    a == b || is_within(a, b) || is_within(b, a)
}

impl DependencyGraph {
    /// Build the graph, rejecting cycles and ambiguous producers.
    pub fn build(stages: &[StageSpec]) -> Result<Self> {
        let mut nodes: HashMap<StageName, StageNode> = HashMap::new();
        for stage in stages {
            if nodes.insert(stage.name.clone(), StageNode::default()).is_some() {
                return Err(ReprodagError::ConfigError(format!(
                    "stage '{}' is declared more than once",
                    stage.name
                )));
            }
        }

        let producers = collect_producers(stages)?;

        // Data edges: producer -> consumer.
        for consumer in stages {
            for dep in consumer.deps.iter() {
                for (out, producer) in producers.iter() {
                    if !overlaps(&dep.path, out) {
                        continue;
                    }
                    if producer == &consumer.name {
                        return Err(ReprodagError::CyclicGraph(format!(
                            "stage '{}' depends on its own output '{}'",
                            consumer.name, out
                        )));
                    }
                    add_edge(&mut nodes, producer, &consumer.name);
                }
            }
        }

        ensure_acyclic(&nodes)?;
        let order = kahn_order(&nodes);

        debug!(stages = order.len(), ?order, "built dependency graph");

        Ok(Self {
            nodes,
            producers,
            order,
        })
    }

    /// Return all stage names, in topological order.
    pub fn stages(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn topo_order(&self) -> &[StageName] {
        &self.order
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Immediate upstream stages of `name`.
    pub fn dependencies_of(&self, name: &str) -> &[StageName] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate downstream stages of `name`.
    pub fn dependents_of(&self, name: &str) -> &[StageName] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Stages with no incoming edges.
    pub fn roots(&self) -> Vec<StageName> {
        self.order
            .iter()
            .filter(|name| self.dependencies_of(name).is_empty())
            .cloned()
            .collect()
    }

    /// The stage producing `path`, together with the declared output that
    /// covers it (the path itself or an enclosing output directory).
    pub fn producer_of(&self, path: &str) -> Option<(&str, &str)> {
        self.producers
            .iter()
            .find(|(out, _)| out.as_str() == path || is_within(path, out))
            .map(|(out, stage)| (stage.as_str(), out.as_str()))
    }

    /// `targets` plus every stage they transitively depend on, in
    /// topological order.
    pub fn with_ancestors<S: AsRef<str>>(&self, targets: &[S]) -> Result<Vec<StageName>> {
        let mut keep: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = Vec::new();

        for target in targets {
            let target = target.as_ref();
            let Some((name, _)) = self.nodes.get_key_value(target) else {
                return Err(ReprodagError::StageNotFound(target.to_string()));
            };
            stack.push(name.as_str());
        }

        while let Some(name) = stack.pop() {
            if !keep.insert(name) {
                continue;
            }
            stack.extend(self.dependencies_of(name).iter().map(|s| s.as_str()));
        }

        Ok(self.ordered(&keep))
    }

    /// Every stage transitively downstream of any stage in `changed`
    /// (the changed stages included), in topological order.
    ///
    /// Unknown names are ignored.
    pub fn stale_closure<S: AsRef<str>>(&self, changed: &[S]) -> Vec<StageName> {
        let mut stale: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = Vec::new();

        for name in changed {
            match self.nodes.get_key_value(name.as_ref()) {
                Some((name, _)) => stack.push(name.as_str()),
                None => warn!(stage = %name.as_ref(), "stale_closure: unknown stage; ignoring"),
            }
        }

        while let Some(name) = stack.pop() {
            if !stale.insert(name) {
                continue;
            }
            stack.extend(self.dependents_of(name).iter().map(|s| s.as_str()));
        }

        self.ordered(&stale)
    }

    fn ordered(&self, set: &HashSet<&str>) -> Vec<StageName> {
        self.order
            .iter()
            .filter(|name| set.contains(name.as_str()))
            .cloned()
            .collect()
    }
}

/// Map every declared output to its stage, rejecting duplicates and nested
/// outputs.
fn collect_producers(stages: &[StageSpec]) -> Result<BTreeMap<String, StageName>> {
    let mut producers: BTreeMap<String, StageName> = BTreeMap::new();

    for stage in stages {
        for out in stage.outs.iter() {
            if let Some((existing, owner)) = producers
                .iter()
                .find(|(existing, _)| overlaps(existing, &out.path))
            {
                if owner == &stage.name {
                    return Err(ReprodagError::ConfigError(format!(
                        "stage '{}' declares overlapping outputs '{}' and '{}'",
                        stage.name, existing, out.path
                    )));
                }
                return Err(ReprodagError::AmbiguousOutput {
                    path: out.path.clone(),
                    first: owner.clone(),
                    second: stage.name.clone(),
                });
            }
            producers.insert(out.path.clone(), stage.name.clone());
        }
    }

    Ok(producers)
}

fn add_edge(nodes: &mut HashMap<StageName, StageNode>, from: &str, to: &str) {
    if let Some(node) = nodes.get_mut(to) {
        if !node.deps.iter().any(|d| d == from) {
            node.deps.push(from.to_string());
            node.deps.sort();
        }
    }
    if let Some(node) = nodes.get_mut(from) {
        if !node.dependents.iter().any(|d| d == to) {
            node.dependents.push(to.to_string());
            node.dependents.sort();
        }
    }
}

fn ensure_acyclic(nodes: &HashMap<StageName, StageNode>) -> Result<()> {
    // Edge direction: producer -> consumer.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    let mut names: Vec<&str> = nodes.keys().map(|s| s.as_str()).collect();
    names.sort();
    for &name in names.iter() {
        graph.add_node(name);
    }
    for &name in names.iter() {
        for dependent in nodes[name].dependents.iter() {
            graph.add_edge(name, dependent.as_str(), ());
        }
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(ReprodagError::CyclicGraph(format!(
            "cycle detected in stage graph involving stage '{}'",
            cycle.node_id()
        ))),
    }
}

/// Kahn's algorithm with ties broken alphabetically. Only called on an
/// acyclic graph.
fn kahn_order(nodes: &HashMap<StageName, StageNode>) -> Vec<StageName> {
    let mut in_degree: HashMap<&str, usize> = nodes
        .iter()
        .map(|(name, node)| (name.as_str(), node.deps.len()))
        .collect();

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(name, _)| *name)
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(name) = ready.pop_first() {
        order.push(name.to_string());
        for dependent in nodes[name].dependents.iter() {
            if let Some(deg) = in_degree.get_mut(dependent.as_str()) {
                *deg -= 1;
                if *deg == 0 {
                    ready.insert(dependent.as_str());
                }
            }
        }
    }

    order
}
