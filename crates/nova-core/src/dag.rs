//! Generic DAG helpers shared by the bundle extractor's acyclicity check and
//! any component that needs a dependency-respecting execution order.

use std::collections::{HashMap, HashSet};

use crate::error::NovaError;

/// Verify that the graph described by `edges` (each `(from, to)` meaning
/// `from` depends on / points to `to`) contains no cycle, using a
/// three-color depth-first search: a node is `visiting` while it is on the
/// current DFS stack and `visited` once every node reachable from it has
/// been fully explored. Encountering a `visiting` node again means the
/// current path has looped back on itself.
pub fn assert_acyclic(nodes: &[String], edges: &[(String, String)]) -> Result<(), NovaError> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for node in nodes {
        adjacency.entry(node.as_str()).or_default();
    }
    for (from, to) in edges {
        adjacency.entry(from.as_str()).or_default().push(to.as_str());
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut visiting: HashSet<&str> = HashSet::new();

    for node in nodes {
        if !visited.contains(node.as_str()) {
            visit(node.as_str(), &adjacency, &mut visited, &mut visiting)?;
        }
    }
    Ok(())
}

fn visit<'a>(
    node: &'a str,
    adjacency: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    visiting: &mut HashSet<&'a str>,
) -> Result<(), NovaError> {
    if visited.contains(node) {
        return Ok(());
    }
    if visiting.contains(node) {
        return Err(NovaError::CycleDetected(format!(
            "cycle detected at node '{node}'"
        )));
    }

    visiting.insert(node);
    if let Some(neighbors) = adjacency.get(node) {
        for next in neighbors {
            visit(next, adjacency, visited, visiting)?;
        }
    }
    visiting.remove(node);
    visited.insert(node);

    Ok(())
}

/// Group nodes into layers such that every node's dependencies (edges
/// pointing away from it) appear in a strictly earlier layer, using Kahn's
/// algorithm. Nodes within a layer have no ordering relationship and may be
/// processed concurrently. Returns `Err(CycleDetected)` if the graph is not
/// a DAG; this can only happen if `assert_acyclic` was skipped, since a
/// genuine cycle can never be fully layered.
pub fn topological_layers(
    nodes: &[String],
    edges: &[(String, String)],
) -> Result<Vec<Vec<String>>, NovaError> {
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = HashMap::new();

    for node in nodes {
        in_degree.entry(node.as_str()).or_insert(0);
        dependents.entry(node.as_str()).or_default();
    }
    for (from, to) in edges {
        dependents.entry(to.as_str()).or_default().push(from.as_str());
        *in_degree.entry(from.as_str()).or_insert(0) += 1;
    }

    let mut layers = Vec::new();
    let mut remaining = in_degree.clone();
    let mut placed = 0usize;

    loop {
        let mut layer: Vec<&str> = remaining
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&n, _)| n)
            .collect();
        if layer.is_empty() {
            break;
        }
        layer.sort_unstable();

        for node in &layer {
            remaining.remove(node);
            if let Some(deps) = dependents.get(node) {
                for dependent in deps {
                    if let Some(deg) = remaining.get_mut(dependent) {
                        *deg -= 1;
                    }
                }
            }
        }

        placed += layer.len();
        layers.push(layer.into_iter().map(str::to_string).collect());
    }

    if placed < nodes.len() {
        return Err(NovaError::CycleDetected(
            "graph contains a cycle; cannot produce a topological order".to_string(),
        ));
    }

    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn acyclic_graph_passes() {
        let nodes = s(&["a", "b", "c"]);
        let edges = vec![("a".to_string(), "b".to_string()), ("b".to_string(), "c".to_string())];
        assert!(assert_acyclic(&nodes, &edges).is_ok());
    }

    #[test]
    fn self_loop_is_detected() {
        let nodes = s(&["a"]);
        let edges = vec![("a".to_string(), "a".to_string())];
        assert!(assert_acyclic(&nodes, &edges).is_err());
    }

    #[test]
    fn three_node_cycle_is_detected() {
        let nodes = s(&["a", "b", "c"]);
        let edges = vec![
            ("a".to_string(), "b".to_string()),
            ("b".to_string(), "c".to_string()),
            ("c".to_string(), "a".to_string()),
        ];
        assert!(assert_acyclic(&nodes, &edges).is_err());
    }

    #[test]
    fn diamond_layers_correctly() {
        let nodes = s(&["a", "b", "c", "d"]);
        let edges = vec![
            ("b".to_string(), "a".to_string()),
            ("c".to_string(), "a".to_string()),
            ("d".to_string(), "b".to_string()),
            ("d".to_string(), "c".to_string()),
        ];
        let layers = topological_layers(&nodes, &edges).unwrap();
        assert_eq!(layers[0], vec!["a".to_string()]);
        assert_eq!(layers[1], vec!["b".to_string(), "c".to_string()]);
        assert_eq!(layers[2], vec!["d".to_string()]);
    }

    #[test]
    fn disconnected_nodes_form_single_layer() {
        let nodes = s(&["a", "b", "c"]);
        let layers = topological_layers(&nodes, &[]).unwrap();
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].len(), 3);
    }

    #[test]
    fn cyclic_graph_fails_layering() {
        let nodes = s(&["a", "b"]);
        let edges = vec![("a".to_string(), "b".to_string()), ("b".to_string(), "a".to_string())];
        assert!(topological_layers(&nodes, &edges).is_err());
    }
}
