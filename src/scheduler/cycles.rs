//! Cycle detection
//!
//! Enumerates every simple cycle of the graph. Each cycle is reported once,
//! rotated so it starts at its smallest key and ordered along the edges
//! (dependent first, then what it depends on).

use std::collections::{BTreeSet, HashSet};

use super::graph::DependencyGraph;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("dependency graph has {} cycle(s): {}", .cycles.len(), describe(.cycles))]
pub struct CycleError {
    pub cycles: Vec<Vec<String>>,
}

fn describe(cycles: &[Vec<String>]) -> String {
    cycles
        .iter()
        .map(|cycle| {
            let mut path = cycle.clone();
            if let Some(first) = cycle.first() {
                path.push(first.clone());
            }
            path.join(" -> ")
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Every simple cycle, self-loops included
pub fn detect_cycles(graph: &DependencyGraph) -> Vec<Vec<String>> {
    let mut cycles = Vec::new();
    for start in graph.keys() {
        let mut path = vec![start];
        let mut on_path = HashSet::from([start]);
        walk(graph, start, start, &mut path, &mut on_path, &mut cycles);
    }
    cycles
}

/// Run the detector and turn any finding into an error
pub fn ensure_acyclic(graph: &DependencyGraph) -> Result<(), CycleError> {
    let cycles = detect_cycles(graph);
    if cycles.is_empty() {
        Ok(())
    } else {
        Err(CycleError { cycles })
    }
}

/// DFS restricted to keys >= `start`, so a cycle is only found from its minimum
fn walk<'g>(
    graph: &'g DependencyGraph,
    start: &'g str,
    current: &'g str,
    path: &mut Vec<&'g str>,
    on_path: &mut HashSet<&'g str>,
    cycles: &mut Vec<Vec<String>>,
) {
    let Some(vertex) = graph.get(current) else {
        return;
    };
    // Parallel edges between the same pair would otherwise repeat cycles
    let next: BTreeSet<&str> = vertex.dependencies().iter().map(|e| e.to.as_str()).collect();

    for neighbour in next {
        if neighbour == start {
            cycles.push(path.iter().map(|k| k.to_string()).collect());
        } else if neighbour > start && !on_path.contains(neighbour) {
            path.push(neighbour);
            on_path.insert(neighbour);
            walk(graph, start, neighbour, path, on_path, cycles);
            on_path.remove(neighbour);
            path.pop();
        }
    }
}
