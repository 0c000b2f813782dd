use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Summary of dependency graph structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyGraphSummary {
    pub nodes: usize,
    pub edges: usize,
}

/// Report for type dependency ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyReport {
    pub summary: DependencyGraphSummary,
    pub topo_order: Option<Vec<String>>,
    pub cycle: Option<Vec<String>>,
}

impl DependencyReport {
    pub fn has_cycle(&self) -> bool {
        self.cycle.is_some()
    }
}

/// Build a deterministic dependency report from `type -> depends_on` lists.
pub fn build_dependency_report(dependencies: &BTreeMap<String, Vec<String>>) -> DependencyReport {
    let graph = build_adjacency(dependencies);
    let nodes = graph.len();
    let edges = graph.values().map(|targets| targets.len()).sum();
    let summary = DependencyGraphSummary { nodes, edges };

    match toposort(&graph) {
        Ok(order) => DependencyReport {
            summary,
            topo_order: Some(order),
            cycle: None,
        },
        Err(cycle) => DependencyReport {
            summary,
            topo_order: None,
            cycle: Some(cycle),
        },
    }
}

// Edges point from a dependency to the types that depend on it.
fn build_adjacency(
    dependencies: &BTreeMap<String, Vec<String>>,
) -> BTreeMap<String, BTreeSet<String>> {
    let mut graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for (type_name, depends_on) in dependencies {
        graph.entry(type_name.clone()).or_default();
        for dependency in depends_on {
            graph
                .entry(dependency.clone())
                .or_default()
                .insert(type_name.clone());
        }
    }

    graph
}

fn toposort(graph: &BTreeMap<String, BTreeSet<String>>) -> Result<Vec<String>, Vec<String>> {
    let mut indegree: BTreeMap<String, usize> = BTreeMap::new();

    for node in graph.keys() {
        indegree.entry(node.clone()).or_insert(0);
    }

    for targets in graph.values() {
        for target in targets {
            *indegree.entry(target.clone()).or_insert(0) += 1;
        }
    }

    let mut ready: BTreeSet<String> = indegree
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(node, _)| node.clone())
        .collect();

    let mut order = Vec::with_capacity(graph.len());

    while let Some(node) = ready.pop_first() {
        order.push(node.clone());

        if let Some(targets) = graph.get(&node) {
            for target in targets {
                if let Some(count) = indegree.get_mut(target) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert(target.clone());
                    }
                }
            }
        }
    }

    if order.len() == graph.len() {
        Ok(order)
    } else {
        let cycle_nodes: Vec<String> = indegree
            .into_iter()
            .filter_map(|(node, count)| if count > 0 { Some(node) } else { None })
            .collect();
        Err(cycle_nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(name, depends_on)| {
                (
                    name.to_string(),
                    depends_on.iter().map(|dep| dep.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn toposort_orders_dependencies() {
        let report = build_dependency_report(&deps(&[
            ("City", &["Country"]),
            ("Country", &[]),
            ("Street", &["City"]),
        ]));
        let order = report.topo_order.expect("expected toposort");
        let position = |name: &str| order.iter().position(|item| item == name).unwrap();
        assert!(position("Country") < position("City"));
        assert!(position("City") < position("Street"));
        assert_eq!(report.summary.edges, 2);
    }

    #[test]
    fn toposort_reports_cycle() {
        let report = build_dependency_report(&deps(&[("A", &["B"]), ("B", &["A"]), ("C", &[])]));
        assert!(report.has_cycle());
        let cycle = report.cycle.expect("cycle");
        assert!(cycle.contains(&"A".to_string()));
        assert!(cycle.contains(&"B".to_string()));
        assert!(!cycle.contains(&"C".to_string()));
    }
}
