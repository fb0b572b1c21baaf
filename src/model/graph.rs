//! Graph model store: the nodes and edges of the loaded lineage
//!
//! All structural mutation of the lineage goes through `LineageGraph`, which
//! keeps node ids unique and never lets an edge point at a missing node.

use super::entity::{EdgeDetails, EdgeEndpoint, EntityLineageResponse, LineageEntity};
use super::trace::{self, EdgeDirection};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

/// Horizontal distance between lineage layers, in graph units
pub const LAYER_SPACING: f64 = 300.0;
/// Vertical distance between nodes of the same layer, in graph units
pub const NODE_SPACING: f64 = 120.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Render type of a node, derived from its connectivity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeKind {
    /// No incoming edges
    Input,
    /// No outgoing edges
    Output,
    #[default]
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub position: Position,
    pub entity: LineageEntity,
    pub kind: NodeKind,
    /// The focal entity the lineage was fetched for
    pub is_root: bool,
    /// Dropped from the palette and not yet bound to a catalog entity
    pub is_new: bool,
}

impl Node {
    pub fn new(entity: LineageEntity, position: Position) -> Self {
        Node {
            id: entity.id().to_string(),
            position,
            entity,
            kind: NodeKind::Default,
            is_root: false,
            is_new: false,
        }
    }

    pub fn label(&self) -> String {
        if self.is_new {
            format!("New {}", self.entity.entity_type().label())
        } else {
            self.entity.reference.label()
        }
    }
}

/// Edge-type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Lineage,
    /// The relationship is produced by a pipeline
    Pipeline,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    pub details: EdgeDetails,
}

impl Edge {
    /// `edge-{source}-{target}`
    ///
    /// `-` and `%` inside an id are escaped so that ids containing dashes,
    /// such as uuids, cannot produce the same edge id for different pairs.
    pub fn edge_id(source: &str, target: &str) -> String {
        let escape = |id: &str| id.replace('%', "%25").replace('-', "%2D");
        format!("edge-{}-{}", escape(source), escape(target))
    }

    pub fn from_details(details: EdgeDetails) -> Self {
        let source = details.from_entity.id.clone();
        let target = details.to_entity.id.clone();
        let kind = if details.pipeline.is_some() {
            EdgeKind::Pipeline
        } else {
            EdgeKind::Lineage
        };
        Edge {
            id: Self::edge_id(&source, &target),
            source,
            target,
            kind,
            details,
        }
    }

    pub fn refresh_kind(&mut self) {
        self.kind = if self.details.pipeline.is_some() {
            EdgeKind::Pipeline
        } else {
            EdgeKind::Lineage
        };
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

/// Node change descriptor, applied in order by `apply_node_changes`
#[derive(Debug, Clone, PartialEq)]
pub enum NodeChange {
    Add(Node),
    Remove { id: String },
    Position { id: String, position: Position },
    Select { id: String, selected: bool },
    /// Replace the node with the same id
    Reset(Node),
}

/// Edge change descriptor, applied in order by `apply_edge_changes`
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeChange {
    Add(Edge),
    Remove { id: String },
    Select { id: String, selected: bool },
    Reset(Edge),
}

/// A user-drawn connection; handles name columns for column-level links
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub source: String,
    pub target: String,
    pub source_handle: Option<String>,
    pub target_handle: Option<String>,
}

impl Connection {
    pub fn nodes(source: &str, target: &str) -> Self {
        Connection {
            source: source.to_string(),
            target: target.to_string(),
            source_handle: None,
            target_handle: None,
        }
    }

    pub fn columns(source: &str, source_column: &str, target: &str, target_column: &str) -> Self {
        Connection {
            source: source.to_string(),
            target: target.to_string(),
            source_handle: Some(source_column.to_string()),
            target_handle: Some(target_column.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    EdgeAdded(String),
    ColumnAdded(String),
    Duplicate,
    Rejected(&'static str),
}

/// What a merge appended
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub nodes: Vec<String>,
    pub edges: Vec<String>,
}

/// Nodes and edges of the loaded lineage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineageGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl LineageGraph {
    /// Build a laid-out graph from a validated response
    ///
    /// The root entity becomes the root node. Edges whose endpoints are not in
    /// the response are dropped.
    pub fn from_response(response: &EntityLineageResponse) -> Self {
        let mut graph = LineageGraph::default();

        for entity in response.unique_entities() {
            let mut node = Node::new(entity.clone(), Position::default());
            node.is_root = entity.id() == response.entity.id();
            graph.nodes.push(node);
        }

        for details in response.all_edges() {
            let (from, to) = details.key();
            if from == to {
                debug!(node = from, "skipping self-referencing edge");
                continue;
            }
            if !graph.contains_node(from) || !graph.contains_node(to) {
                warn!(from, to, "dropping edge with an endpoint outside the response");
                continue;
            }
            graph.edges.push(Edge::from_details(details.clone()));
        }

        graph.layout(response.entity.id());
        graph.refresh_node_kinds();
        graph
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lookups
    // ─────────────────────────────────────────────────────────────────────────

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    pub fn root(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.is_root)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn edge_mut(&mut self, id: &str) -> Option<&mut Edge> {
        self.edges.iter_mut().find(|e| e.id == id)
    }

    pub fn has_edge(&self, source: &str, target: &str) -> bool {
        self.edges
            .iter()
            .any(|e| e.source == source && e.target == target)
    }

    pub fn incoming<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == id)
    }

    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == id)
    }

    /// Node owning a column FQN
    pub fn column_owner(&self, column_fqn: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.entity.has_column(column_fqn))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Change descriptors
    // ─────────────────────────────────────────────────────────────────────────

    /// Apply node changes in order; returns true if nodes or edges were added or removed
    pub fn apply_node_changes(&mut self, changes: &[NodeChange]) -> bool {
        let mut structural = false;

        for change in changes {
            match change {
                NodeChange::Add(node) => {
                    if self.contains_node(&node.id) {
                        warn!(node = %node.id, "ignoring add of an existing node id");
                        continue;
                    }
                    self.nodes.push(node.clone());
                    structural = true;
                }
                NodeChange::Remove { id } => {
                    if self.remove_node(id).is_some() {
                        structural = true;
                    }
                }
                NodeChange::Position { id, position } => {
                    if let Some(node) = self.node_mut(id) {
                        node.position = *position;
                    }
                }
                NodeChange::Select { .. } => {}
                NodeChange::Reset(node) => {
                    if let Some(existing) = self.node_mut(&node.id) {
                        *existing = node.clone();
                    }
                }
            }
        }

        if structural {
            self.refresh_node_kinds();
        }
        structural
    }

    /// Apply edge changes in order; returns true if edges were added or removed
    pub fn apply_edge_changes(&mut self, changes: &[EdgeChange]) -> bool {
        let mut structural = false;

        for change in changes {
            match change {
                EdgeChange::Add(edge) => {
                    if self.edge(&edge.id).is_some() || self.has_edge(&edge.source, &edge.target) {
                        debug!(edge = %edge.id, "ignoring duplicate edge");
                        continue;
                    }
                    if edge.source == edge.target
                        || !self.contains_node(&edge.source)
                        || !self.contains_node(&edge.target)
                    {
                        warn!(edge = %edge.id, "ignoring edge with a missing endpoint");
                        continue;
                    }
                    self.edges.push(edge.clone());
                    structural = true;
                }
                EdgeChange::Remove { id } => {
                    let before = self.edges.len();
                    self.edges.retain(|e| &e.id != id);
                    structural |= self.edges.len() != before;
                }
                EdgeChange::Select { .. } => {}
                EdgeChange::Reset(edge) => {
                    if let Some(existing) = self.edge_mut(&edge.id) {
                        if existing.source == edge.source && existing.target == edge.target {
                            *existing = edge.clone();
                        }
                    }
                }
            }
        }

        if structural {
            self.refresh_node_kinds();
        }
        structural
    }

    /// Remove a node and every edge referencing it
    pub fn remove_node(&mut self, id: &str) -> Option<Node> {
        let index = self.nodes.iter().position(|n| n.id == id)?;
        let node = self.nodes.remove(index);
        self.edges.retain(|e| !e.touches(id));
        self.refresh_node_kinds();
        Some(node)
    }

    /// Add an edge for a connection unless the same directed link already exists
    pub fn connect(&mut self, connection: &Connection) -> ConnectOutcome {
        if connection.source == connection.target {
            return ConnectOutcome::Rejected("cannot connect a node to itself");
        }
        let (Some(source), Some(target)) = (
            self.node(&connection.source),
            self.node(&connection.target),
        ) else {
            return ConnectOutcome::Rejected("both ends must be on the graph");
        };

        let column_pair = match (&connection.source_handle, &connection.target_handle) {
            (Some(from), Some(to)) => {
                if !source.entity.has_column(from) || !target.entity.has_column(to) {
                    return ConnectOutcome::Rejected("column does not belong to the node");
                }
                Some((from.clone(), to.clone()))
            }
            _ => None,
        };

        let edge_id = Edge::edge_id(&connection.source, &connection.target);
        let details = EdgeDetails::between(&source.entity, &target.entity);

        match (self.edge_mut(&edge_id), column_pair) {
            (Some(edge), Some((from, to))) => {
                if edge.details.add_column_pair(&from, &to) {
                    ConnectOutcome::ColumnAdded(edge_id)
                } else {
                    ConnectOutcome::Duplicate
                }
            }
            (Some(_), None) => ConnectOutcome::Duplicate,
            (None, pair) => {
                let mut edge = Edge::from_details(details);
                if let Some((from, to)) = pair {
                    edge.details.add_column_pair(&from, &to);
                }
                self.edges.push(edge);
                self.refresh_node_kinds();
                ConnectOutcome::EdgeAdded(edge_id)
            }
        }
    }

    /// Append the nodes and edges of an incremental fetch around `anchor`
    ///
    /// Existing nodes and edges are never modified.
    pub fn merge(
        &mut self,
        response: &EntityLineageResponse,
        anchor: &str,
        direction: EdgeDirection,
    ) -> MergeSummary {
        let mut summary = MergeSummary::default();
        let anchor_position = self.node(anchor).map(|n| n.position).unwrap_or_default();
        let column_x = match direction {
            EdgeDirection::Upstream => anchor_position.x - LAYER_SPACING,
            EdgeDirection::Downstream => anchor_position.x + LAYER_SPACING,
        };

        for entity in response.unique_entities() {
            if self.contains_node(entity.id()) {
                continue;
            }
            let occupied: Vec<f64> = self
                .nodes
                .iter()
                .filter(|n| (n.position.x - column_x).abs() < f64::EPSILON)
                .map(|n| n.position.y)
                .collect();
            let y = if occupied.is_empty() {
                anchor_position.y
            } else {
                occupied.iter().cloned().fold(f64::NEG_INFINITY, f64::max) + NODE_SPACING
            };
            self.nodes
                .push(Node::new(entity.clone(), Position { x: column_x, y }));
            summary.nodes.push(entity.id().to_string());
        }

        for details in response.all_edges() {
            let (from, to) = details.key();
            if from == to || self.has_edge(from, to) {
                continue;
            }
            if !self.contains_node(from) || !self.contains_node(to) {
                warn!(from, to, "dropping merged edge with a missing endpoint");
                continue;
            }
            let edge = Edge::from_details(details.clone());
            summary.edges.push(edge.id.clone());
            self.edges.push(edge);
        }

        self.refresh_node_kinds();
        summary
    }

    /// Remove what hangs off `node_id` in `direction`
    ///
    /// A node is removed once every edge feeding it from that side comes from
    /// `node_id` or from another removed node. `protected` is never removed.
    pub fn collapse(
        &mut self,
        node_id: &str,
        direction: EdgeDirection,
        protected: Option<&str>,
    ) -> Vec<String> {
        let candidates = trace::reachable(self, node_id, direction);
        let mut removed: Vec<String> = Vec::new();
        let mut removed_set: HashSet<String> = HashSet::new();

        loop {
            let mut changed = false;
            for candidate in &candidates {
                if removed_set.contains(candidate) || Some(candidate.as_str()) == protected {
                    continue;
                }
                let fed_only_by_collapsed = trace::feeders(self, candidate, direction)
                    .iter()
                    .all(|f| f == node_id || removed_set.contains(f));
                if fed_only_by_collapsed {
                    removed_set.insert(candidate.clone());
                    removed.push(candidate.clone());
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        self.nodes.retain(|n| !removed_set.contains(&n.id));
        self.edges
            .retain(|e| !removed_set.contains(&e.source) && !removed_set.contains(&e.target));
        self.refresh_node_kinds();
        removed
    }

    /// Bind a node to another entity, rewriting the edges that reference it
    pub fn rebind_node(&mut self, old_id: &str, entity: LineageEntity) -> Result<(), &'static str> {
        let new_id = entity.id().to_string();
        if new_id != old_id && self.contains_node(&new_id) {
            return Err("entity is already on the graph");
        }
        let node = self.node_mut(old_id).ok_or("node is not on the graph")?;
        node.id = new_id.clone();
        node.entity = entity.clone();
        node.is_new = false;

        let endpoint = EdgeEndpoint::from_entity(&entity);
        for edge in self.edges.iter_mut().filter(|e| e.touches(old_id)) {
            if edge.source == old_id {
                edge.source = new_id.clone();
                edge.details.from_entity = endpoint.clone();
            }
            if edge.target == old_id {
                edge.target = new_id.clone();
                edge.details.to_entity = endpoint.clone();
            }
            edge.id = Edge::edge_id(&edge.source, &edge.target);
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Derived layout
    // ─────────────────────────────────────────────────────────────────────────

    /// Recompute each node's render type from its edges
    pub fn refresh_node_kinds(&mut self) {
        let targets: HashSet<&str> = self.edges.iter().map(|e| e.target.as_str()).collect();
        let sources: HashSet<&str> = self.edges.iter().map(|e| e.source.as_str()).collect();
        let kinds: HashMap<String, NodeKind> = self
            .nodes
            .iter()
            .map(|n| {
                let has_in = targets.contains(n.id.as_str());
                let has_out = sources.contains(n.id.as_str());
                let kind = match (has_in, has_out) {
                    (false, true) => NodeKind::Input,
                    (true, false) => NodeKind::Output,
                    _ => NodeKind::Default,
                };
                (n.id.clone(), kind)
            })
            .collect();
        for node in &mut self.nodes {
            if let Some(kind) = kinds.get(&node.id) {
                node.kind = *kind;
            }
        }
    }

    /// Place nodes in columns by signed distance from the root
    pub fn layout(&mut self, root: &str) {
        let depths = trace::depths_from(self, root);
        let mut columns: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
        for (index, node) in self.nodes.iter().enumerate() {
            let depth = depths.get(&node.id).copied().unwrap_or(0);
            columns.entry(depth).or_default().push(index);
        }

        for (depth, indices) in columns {
            let count = indices.len() as f64;
            for (slot, index) in indices.into_iter().enumerate() {
                self.nodes[index].position = Position {
                    x: depth as f64 * LAYER_SPACING,
                    y: (slot as f64 - (count - 1.0) / 2.0) * NODE_SPACING,
                };
            }
        }
    }
}
