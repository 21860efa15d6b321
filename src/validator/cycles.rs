//! Group reference cycle detection
//!
//! Only group → group edges matter here; proxies and sentinels are leaves.
//! Traversal follows declaration order so the same input always reports the
//! same cycles in the same order.

use std::collections::{HashMap, HashSet};

/// Group → group edges, keyed by group name, in declaration order
#[derive(Debug, Clone, Default)]
pub struct GroupGraph {
    order: Vec<String>,
    edges: HashMap<String, Vec<String>>,
}

impl GroupGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a group and its edges to other groups
    ///
    /// Self-edges are left out; a group naming itself is reported separately.
    pub fn add_group(&mut self, name: &str, targets: impl IntoIterator<Item = String>) {
        if !self.edges.contains_key(name) {
            self.order.push(name.to_string());
        }
        let edges = self.edges.entry(name.to_string()).or_default();
        for target in targets {
            if target != name && !edges.contains(&target) {
                edges.push(target);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn targets(&self, name: &str) -> &[String] {
        self.edges.get(name).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Finds every distinct cycle, each as a closed path such as `[A, B, C, A]`
///
/// A cycle is reported once, from the first group on it that the traversal
/// reaches; rotations of an already reported cycle are skipped.
pub fn find_cycles(graph: &GroupGraph) -> Vec<Vec<String>> {
    let mut search = CycleSearch {
        graph,
        stack: Vec::new(),
        done: HashSet::new(),
        seen: HashSet::new(),
        cycles: Vec::new(),
    };
    for name in &graph.order {
        if !search.done.contains(name.as_str()) {
            search.visit(name);
        }
    }
    search.cycles
}

struct CycleSearch<'a> {
    graph: &'a GroupGraph,
    /// Groups on the current DFS path
    stack: Vec<&'a str>,
    /// Groups whose every outgoing path has been explored
    done: HashSet<&'a str>,
    seen: HashSet<Vec<String>>,
    cycles: Vec<Vec<String>>,
}

impl<'a> CycleSearch<'a> {
    fn visit(&mut self, name: &'a str) {
        let graph = self.graph;
        self.stack.push(name);
        for target in graph.targets(name) {
            let target = target.as_str();
            if let Some(start) = self.stack.iter().position(|n| *n == target) {
                let mut path: Vec<String> = self.stack[start..].iter().map(|n| n.to_string()).collect();
                path.push(target.to_string());
                if self.seen.insert(rotation_key(&path)) {
                    self.cycles.push(path);
                }
                continue;
            }
            if !self.done.contains(target) {
                self.visit(target);
            }
        }
        self.stack.pop();
        self.done.insert(name);
    }
}

/// Open cycle rotated to start at its smallest name
fn rotation_key(path: &[String]) -> Vec<String> {
    let open = &path[..path.len().saturating_sub(1)];
    let start = open
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    open[start..].iter().chain(&open[..start]).cloned().collect()
}
