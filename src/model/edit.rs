//! Edit-mode bookkeeping: the edge baseline and the changes made since

use super::entity::EdgeDetails;
use super::graph::{Edge, LineageGraph};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// An edge change waiting to be written to the backend
#[derive(Debug, Clone, PartialEq)]
pub enum PendingChange {
    /// Create the edge, or replace its details
    AddEdge(EdgeDetails),
    RemoveEdge(EdgeDetails),
}

impl PendingChange {
    pub fn details(&self) -> &EdgeDetails {
        match self {
            PendingChange::AddEdge(details) | PendingChange::RemoveEdge(details) => details,
        }
    }
}

impl fmt::Display for PendingChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (sign, details) = match self {
            PendingChange::AddEdge(d) => ("+", d),
            PendingChange::RemoveEdge(d) => ("-", d),
        };
        write!(
            f,
            "{} {} -> {}",
            sign, details.from_entity.fqn, details.to_entity.fqn
        )
    }
}

/// Edge set captured when edit mode was entered
#[derive(Debug, Clone, Default)]
pub struct EditSession {
    baseline: BTreeMap<(String, String), EdgeDetails>,
}

impl EditSession {
    pub fn begin(graph: &LineageGraph) -> Self {
        let baseline = graph
            .edges
            .iter()
            .map(|e| ((e.source.clone(), e.target.clone()), e.details.clone()))
            .collect();
        EditSession { baseline }
    }

    /// Treat edges loaded by an expand as already saved
    pub fn absorb<'a>(&mut self, edges: impl IntoIterator<Item = &'a Edge>) {
        for edge in edges {
            self.baseline
                .entry((edge.source.clone(), edge.target.clone()))
                .or_insert_with(|| edge.details.clone());
        }
    }

    /// Stop tracking edges hidden by a collapse, so they are not deleted on save
    pub fn forget<'a>(&mut self, edges: impl IntoIterator<Item = &'a Edge>) {
        for edge in edges {
            self.baseline
                .remove(&(edge.source.clone(), edge.target.clone()));
        }
    }

    /// Diff of the current edges against the baseline
    ///
    /// Edges touching placeholder nodes are left out until the placeholder
    /// is bound to an entity.
    pub fn pending_changes(&self, graph: &LineageGraph) -> Vec<PendingChange> {
        let placeholders: HashSet<&str> = graph
            .nodes
            .iter()
            .filter(|n| n.is_new)
            .map(|n| n.id.as_str())
            .collect();

        let mut changes = Vec::new();
        let mut current = HashSet::new();

        for edge in &graph.edges {
            if placeholders.contains(edge.source.as_str()) || placeholders.contains(edge.target.as_str()) {
                continue;
            }
            let key = (edge.source.clone(), edge.target.clone());
            match self.baseline.get(&key) {
                Some(before) if *before == edge.details => {}
                _ => changes.push(PendingChange::AddEdge(edge.details.clone())),
            }
            current.insert(key);
        }

        for (key, details) in &self.baseline {
            if !current.contains(key) {
                changes.push(PendingChange::RemoveEdge(details.clone()));
            }
        }

        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::entity::{EntityType, LineageEntity};
    use crate::model::graph::tests::response;
    use crate::model::graph::{Connection, Node, NodeChange, Position};

    #[test]
    fn test_no_changes_without_edits() {
        let graph = LineageGraph::from_response(&response("a", &["b"], &[("a", "b")]));
        let session = EditSession::begin(&graph);
        assert!(session.pending_changes(&graph).is_empty());
    }

    #[test]
    fn test_added_removed_and_modified_edges() {
        let mut graph = LineageGraph::from_response(&response(
            "a",
            &["b", "c"],
            &[("a", "b"), ("b", "c")],
        ));
        let session = EditSession::begin(&graph);

        graph.connect(&Connection::nodes("a", "c"));
        graph.edges.retain(|e| !(e.source == "b" && e.target == "c"));
        graph.edges[0].details.description = Some("loaded nightly".to_string());

        let changes = session.pending_changes(&graph);
        let rendered: Vec<String> = changes.iter().map(|c| c.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "+ svc.db.schema.a -> svc.db.schema.b",
                "+ svc.db.schema.a -> svc.db.schema.c",
                "- svc.db.schema.b -> svc.db.schema.c",
            ]
        );
    }

    #[test]
    fn test_collapsed_and_expanded_edges_are_not_pending() {
        let mut graph = LineageGraph::from_response(&response("a", &["b"], &[("a", "b")]));
        let mut session = EditSession::begin(&graph);

        let hidden = graph.edges.clone();
        graph.edges.clear();
        session.forget(&hidden);
        assert!(session.pending_changes(&graph).is_empty());

        graph.edges = hidden;
        session.absorb(&graph.edges);
        assert!(session.pending_changes(&graph).is_empty());
    }

    #[test]
    fn test_placeholder_edges_are_not_pending() {
        let mut graph = LineageGraph::from_response(&response("a", &[], &[]));
        let session = EditSession::begin(&graph);

        let mut placeholder = Node::new(
            LineageEntity::new("tmp-1", EntityType::Table, ""),
            Position::default(),
        );
        placeholder.is_new = true;
        graph.apply_node_changes(&[NodeChange::Add(placeholder)]);
        graph.connect(&Connection::nodes("a", "tmp-1"));

        assert!(session.pending_changes(&graph).is_empty());
    }
}
