//! Reachability over the loaded graph: traces, depths and the upstream/downstream split

use super::graph::LineageGraph;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeDirection {
    Upstream,
    Downstream,
}

impl EdgeDirection {
    pub fn opposite(&self) -> EdgeDirection {
        match self {
            EdgeDirection::Upstream => EdgeDirection::Downstream,
            EdgeDirection::Downstream => EdgeDirection::Upstream,
        }
    }
}

impl fmt::Display for EdgeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeDirection::Upstream => write!(f, "upstream"),
            EdgeDirection::Downstream => write!(f, "downstream"),
        }
    }
}

/// Neighbours one hop away from `id` in `direction`
fn neighbours(graph: &LineageGraph, id: &str, direction: EdgeDirection) -> Vec<String> {
    match direction {
        EdgeDirection::Upstream => graph.incoming(id).map(|e| e.source.clone()).collect(),
        EdgeDirection::Downstream => graph.outgoing(id).map(|e| e.target.clone()).collect(),
    }
}

/// Nodes that feed `id` from the side facing away from `direction`
///
/// For a downstream walk these are the sources of `id`'s incoming edges.
pub fn feeders(graph: &LineageGraph, id: &str, direction: EdgeDirection) -> Vec<String> {
    neighbours(graph, id, direction.opposite())
}

/// Every node reachable from `start` in `direction`, breadth-first, excluding `start`
pub fn reachable(graph: &LineageGraph, start: &str, direction: EdgeDirection) -> Vec<String> {
    let mut visited: HashSet<String> = HashSet::from([start.to_string()]);
    let mut order = Vec::new();
    let mut queue = VecDeque::from([start.to_string()]);

    while let Some(current) = queue.pop_front() {
        for next in neighbours(graph, &current, direction) {
            if visited.insert(next.clone()) {
                order.push(next.clone());
                queue.push_back(next);
            }
        }
    }
    order
}

/// The selected node followed by everything upstream and downstream of it
pub fn traced_nodes(graph: &LineageGraph, selected: &str) -> Vec<String> {
    if !graph.contains_node(selected) {
        return Vec::new();
    }
    let mut seen = HashSet::new();
    std::iter::once(selected.to_string())
        .chain(reachable(graph, selected, EdgeDirection::Upstream))
        .chain(reachable(graph, selected, EdgeDirection::Downstream))
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// The column followed by every column linked to it through column sub-edges
pub fn traced_columns(graph: &LineageGraph, column: &str) -> Vec<String> {
    let pairs: Vec<(String, String)> = graph
        .edges
        .iter()
        .flat_map(|e| e.details.column_pairs())
        .collect();

    let walk = |direction: EdgeDirection| -> Vec<String> {
        let mut visited: HashSet<String> = HashSet::from([column.to_string()]);
        let mut order = Vec::new();
        let mut queue = VecDeque::from([column.to_string()]);
        while let Some(current) = queue.pop_front() {
            for (from, to) in &pairs {
                let next = match direction {
                    EdgeDirection::Upstream if *to == current => from,
                    EdgeDirection::Downstream if *from == current => to,
                    _ => continue,
                };
                if visited.insert(next.clone()) {
                    order.push(next.clone());
                    queue.push_back(next.clone());
                }
            }
        }
        order
    };

    let mut seen = HashSet::new();
    std::iter::once(column.to_string())
        .chain(walk(EdgeDirection::Upstream))
        .chain(walk(EdgeDirection::Downstream))
        .filter(|c| seen.insert(c.clone()))
        .collect()
}

/// Signed layer of each node: 0 for the root, negative upstream, positive downstream
///
/// Nodes not connected to the root are absent.
pub fn depths_from(graph: &LineageGraph, root: &str) -> HashMap<String, i32> {
    let mut depths: HashMap<String, i32> = HashMap::new();
    if !graph.contains_node(root) {
        return depths;
    }
    depths.insert(root.to_string(), 0);

    for (direction, sign) in [(EdgeDirection::Upstream, -1), (EdgeDirection::Downstream, 1)] {
        let mut queue = VecDeque::from([(root.to_string(), 0i32)]);
        let mut visited: HashSet<String> = HashSet::from([root.to_string()]);
        while let Some((current, depth)) = queue.pop_front() {
            for next in neighbours(graph, &current, direction) {
                if visited.insert(next.clone()) {
                    depths.entry(next.clone()).or_insert(sign * (depth + 1));
                    queue.push_back((next, depth + 1));
                }
            }
        }
    }
    depths
}

/// Nodes and edges on each side of the focal entity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpstreamDownstreamData {
    pub upstream_edges: Vec<String>,
    pub downstream_edges: Vec<String>,
    pub upstream_nodes: Vec<String>,
    pub downstream_nodes: Vec<String>,
}

pub fn upstream_downstream_data(graph: &LineageGraph, root: &str) -> UpstreamDownstreamData {
    if !graph.contains_node(root) {
        return UpstreamDownstreamData::default();
    }
    let upstream_nodes = reachable(graph, root, EdgeDirection::Upstream);
    let downstream_nodes = reachable(graph, root, EdgeDirection::Downstream);

    let upstream: HashSet<&str> = upstream_nodes.iter().map(String::as_str).collect();
    let downstream: HashSet<&str> = downstream_nodes.iter().map(String::as_str).collect();

    let upstream_edges = graph
        .edges
        .iter()
        .filter(|e| {
            upstream.contains(e.source.as_str())
                && (e.target == root || upstream.contains(e.target.as_str()))
        })
        .map(|e| e.id.clone())
        .collect();
    let downstream_edges = graph
        .edges
        .iter()
        .filter(|e| {
            downstream.contains(e.target.as_str())
                && (e.source == root || downstream.contains(e.source.as_str()))
        })
        .map(|e| e.id.clone())
        .collect();

    UpstreamDownstreamData {
        upstream_edges,
        downstream_edges,
        upstream_nodes,
        downstream_nodes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::entity::EntityType;
    use crate::model::graph::tests::response;
    use crate::model::graph::{Connection, Edge};
    use crate::model::entity::LineageEntity;

    #[test]
    fn test_traced_nodes_follow_direction() {
        // x -> a -> b, and c -> b: c is neither upstream nor downstream of a
        let graph = LineageGraph::from_response(&response(
            "a",
            &["x", "b", "c"],
            &[("x", "a"), ("a", "b"), ("c", "b")],
        ));

        assert_eq!(traced_nodes(&graph, "a"), vec!["a", "x", "b"]);
        assert_eq!(traced_nodes(&graph, "c"), vec!["c", "b"]);
        assert!(traced_nodes(&graph, "missing").is_empty());
    }

    #[test]
    fn test_traced_nodes_terminate_on_cycles() {
        let graph = LineageGraph::from_response(&response("a", &["b"], &[("a", "b"), ("b", "a")]));
        assert_eq!(traced_nodes(&graph, "a"), vec!["a", "b"]);
    }

    #[test]
    fn test_traced_columns_cross_edges() {
        let a = LineageEntity::new("a", EntityType::Table, "s.a").with_columns(&["id"]);
        let b = LineageEntity::new("b", EntityType::Table, "s.b").with_columns(&["id", "x"]);
        let c = LineageEntity::new("c", EntityType::Table, "s.c").with_columns(&["id"]);
        let mut resp = crate::model::entity::EntityLineageResponse::new(a);
        resp.nodes = vec![b, c];
        let mut graph = LineageGraph::from_response(&resp);

        graph.connect(&Connection::columns("a", "s.a.id", "b", "s.b.id"));
        graph.connect(&Connection::columns("b", "s.b.id", "c", "s.c.id"));
        graph.connect(&Connection::columns("a", "s.a.id", "b", "s.b.x"));

        assert_eq!(traced_columns(&graph, "s.b.id"), vec!["s.b.id", "s.a.id", "s.c.id"]);
        assert_eq!(traced_columns(&graph, "s.b.x"), vec!["s.b.x", "s.a.id"]);
    }

    #[test]
    fn test_depths_are_signed_by_direction() {
        let graph = LineageGraph::from_response(&response(
            "a",
            &["u1", "u2", "d1", "lonely"],
            &[("u2", "u1"), ("u1", "a"), ("a", "d1")],
        ));
        let depths = depths_from(&graph, "a");

        assert_eq!(depths["a"], 0);
        assert_eq!(depths["u1"], -1);
        assert_eq!(depths["u2"], -2);
        assert_eq!(depths["d1"], 1);
        assert!(!depths.contains_key("lonely"));
    }

    #[test]
    fn test_upstream_downstream_partition() {
        let graph = LineageGraph::from_response(&response(
            "a",
            &["u", "d", "side"],
            &[("u", "a"), ("a", "d"), ("side", "d")],
        ));
        let data = upstream_downstream_data(&graph, "a");

        assert_eq!(data.upstream_nodes, vec!["u"]);
        assert_eq!(data.downstream_nodes, vec!["d"]);
        assert_eq!(data.upstream_edges, vec![Edge::edge_id("u", "a")]);
        assert_eq!(data.downstream_edges, vec![Edge::edge_id("a", "d")]);
    }
}
