//! Lineage context: the single store behind a lineage view
//!
//! Every interaction is a `LineageCommand` applied with `update`, and every
//! backend completion is fed back through `handle_response`. Neither performs
//! I/O; both return the fetch requests the caller should run next.

use super::edit::{EditSession, PendingChange};
use super::entity::{EntityLineageResponse, EntityType, LineageEntity, PipelineStatus};
use super::graph::{
    ConnectOutcome, Connection, EdgeChange, LineageGraph, Node, NodeChange,
};
use super::trace::{self, EdgeDirection, UpstreamDownstreamData};
use super::view::{Bounds, LineageConfig, LineageLayerView, LoadingState, Viewport, MAX_ZOOM, MIN_ZOOM};
use crate::error::LineageError;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

pub type RequestId = u64;

// ═══════════════════════════════════════════════════════════════════════════════
// Commands
// ═══════════════════════════════════════════════════════════════════════════════

/// A selected edge, optionally narrowed to one column sub-edge `(from, to)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeSelection {
    pub edge_id: String,
    pub column: Option<(String, String)>,
}

impl EdgeSelection {
    pub fn edge(edge_id: &str) -> Self {
        EdgeSelection {
            edge_id: edge_id.to_string(),
            column: None,
        }
    }
}

/// State transitions of the lineage view
#[derive(Debug, Clone, PartialEq)]
pub enum LineageCommand {
    // ─────────────────────────────────────────────────────────────────────────
    // Fetching
    // ─────────────────────────────────────────────────────────────────────────
    FetchLineageData {
        fqn: String,
        entity_type: EntityType,
        config: LineageConfig,
    },
    /// Fetch the current entity again with the stored config and filter
    Reload,
    LoadChildNodes {
        node_id: String,
        direction: EdgeDirection,
    },
    FetchPipelineStatus(String),

    // ─────────────────────────────────────────────────────────────────────────
    // Graph changes
    // ─────────────────────────────────────────────────────────────────────────
    NodesChange(Vec<NodeChange>),
    EdgesChange(Vec<EdgeChange>),
    RemoveNode(String),
    Connect(Connection),
    CollapseNode {
        node_id: String,
        direction: EdgeDirection,
    },
    NodeDrop {
        entity_type: EntityType,
        x: f64,
        y: f64,
        bounds: Bounds,
    },
    ResolveNewNode {
        node_id: String,
        fqn: String,
    },
    /// Bind a pipeline to an edge; an empty FQN clears it
    UpdateEdgePipeline {
        edge_id: String,
        fqn: String,
    },
    ColumnEdgeRemove,

    // ─────────────────────────────────────────────────────────────────────────
    // Selection
    // ─────────────────────────────────────────────────────────────────────────
    NodeClick(String),
    EdgeClick(EdgeSelection),
    ColumnClick(String),
    PaneClick,
    DrawerClose,
    AddPipelineClick,

    // ─────────────────────────────────────────────────────────────────────────
    // View settings
    // ─────────────────────────────────────────────────────────────────────────
    ToggleColumnView,
    UpdateEntityType(EntityType),
    QueryFilterUpdate(String),
    InitViewport(Viewport),
    UpdateLayerView(LineageLayerView),
    ZoomUpdate(f64),
    LineageConfigUpdate(LineageConfig),
    LineageEditClick,
    DiscardEdits,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Requests and responses
// ═══════════════════════════════════════════════════════════════════════════════

/// What a resolved entity gets bound to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolveTarget {
    NewNode(String),
    EdgePipeline(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchKind {
    Lineage {
        fqn: String,
        entity_type: EntityType,
        config: LineageConfig,
        query_filter: Option<String>,
    },
    ChildNodes {
        node_id: String,
        fqn: String,
        entity_type: EntityType,
        direction: EdgeDirection,
        config: LineageConfig,
    },
    PipelineStatus {
        fqn: String,
    },
    Resolve {
        target: ResolveTarget,
        fqn: String,
        entity_type: EntityType,
    },
    Persist(Vec<PendingChange>),
}

impl FetchKind {
    pub fn label(&self) -> &'static str {
        match self {
            FetchKind::Lineage { .. } => "lineage",
            FetchKind::ChildNodes { .. } => "child nodes",
            FetchKind::PipelineStatus { .. } => "pipeline status",
            FetchKind::Resolve { .. } => "resolve",
            FetchKind::Persist(_) => "persist",
        }
    }
}

/// A backend call the caller should run off the UI thread
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub id: RequestId,
    pub kind: FetchKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchPayload {
    Lineage(EntityLineageResponse),
    PipelineStatus(Option<PipelineStatus>),
    /// Number of edge changes written
    Persisted(usize),
}

/// The completed request together with its outcome
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub request: FetchRequest,
    pub result: Result<FetchPayload, LineageError>,
}

impl FetchResponse {
    pub fn new(request: FetchRequest, result: Result<FetchPayload, LineageError>) -> Self {
        FetchResponse { request, result }
    }
}

#[derive(Debug, Clone)]
struct ChildLoad {
    node_id: String,
    direction: EdgeDirection,
    generation: u64,
}

/// An entity lookup and the state it was issued against
#[derive(Debug, Clone, Copy)]
struct PendingResolve {
    id: RequestId,
    generation: u64,
    edit_mode: bool,
}

/// Request ids still expected back, per kind
#[derive(Debug, Default)]
struct RequestTracker {
    next_id: RequestId,
    lineage: Option<RequestId>,
    /// Bumped every time a lineage response replaces the graph
    generation: u64,
    children: HashMap<RequestId, ChildLoad>,
    pipelines: HashMap<String, RequestId>,
    resolves: HashMap<ResolveTarget, PendingResolve>,
    persist: Option<RequestId>,
}

impl RequestTracker {
    fn issue(&mut self) -> RequestId {
        self.next_id += 1;
        self.next_id
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Context
// ═══════════════════════════════════════════════════════════════════════════════

/// State of one lineage view
///
/// Fields are public for reading; all mutation goes through `update` and
/// `handle_response` so the derived sets stay consistent with the graph.
#[derive(Debug)]
pub struct LineageContext {
    pub graph: LineageGraph,
    pub entity_fqn: String,
    pub entity_type: EntityType,
    pub root_id: Option<String>,
    pub lineage_config: LineageConfig,
    pub query_filter: String,

    /// Set once the first lineage response has been applied
    pub init: bool,
    /// Last lineage response applied, before normalization
    pub entity_lineage: Option<EntityLineageResponse>,
    pub loading: bool,
    pub status: LoadingState,
    pub last_error: Option<LineageError>,
    /// Informational message for the status bar
    pub notice: Option<String>,
    pub persisting: bool,

    pub expanded_nodes: BTreeSet<String>,
    pub traced_nodes: Vec<String>,
    pub traced_columns: Vec<String>,
    pub selected_node: Option<String>,
    pub selected_edge: Option<EdgeSelection>,
    pub selected_column: Option<String>,
    pub upstream_downstream: UpstreamDownstreamData,

    pub expand_all_columns: bool,
    pub is_drawer_open: bool,
    pub is_edit_mode: bool,
    pub can_edit_lineage: bool,
    pub active_layer: LineageLayerView,
    pub zoom_value: f64,
    pub viewport: Viewport,

    pub pipeline_status: HashMap<String, PipelineStatus>,
    /// Edge whose pipeline is being edited
    pub pipeline_edit_target: Option<String>,

    edit_session: Option<EditSession>,
    tracker: RequestTracker,
}

impl LineageContext {
    pub fn new(can_edit_lineage: bool) -> Self {
        LineageContext {
            graph: LineageGraph::default(),
            entity_fqn: String::new(),
            entity_type: EntityType::default(),
            root_id: None,
            lineage_config: LineageConfig::default(),
            query_filter: String::new(),
            init: false,
            entity_lineage: None,
            loading: false,
            status: LoadingState::Initial,
            last_error: None,
            notice: None,
            persisting: false,
            expanded_nodes: BTreeSet::new(),
            traced_nodes: Vec::new(),
            traced_columns: Vec::new(),
            selected_node: None,
            selected_edge: None,
            selected_column: None,
            upstream_downstream: UpstreamDownstreamData::default(),
            expand_all_columns: false,
            is_drawer_open: false,
            is_edit_mode: false,
            can_edit_lineage,
            active_layer: LineageLayerView::None,
            zoom_value: Viewport::default().zoom,
            viewport: Viewport::default(),
            pipeline_status: HashMap::new(),
            pipeline_edit_target: None,
            edit_session: None,
            tracker: RequestTracker::default(),
        }
    }

    /// Number of times the graph has been replaced by a lineage fetch
    pub fn generation(&self) -> u64 {
        self.tracker.generation
    }

    /// Changes made since entering edit mode
    pub fn pending_changes(&self) -> Vec<PendingChange> {
        self.edit_session
            .as_ref()
            .map(|s| s.pending_changes(&self.graph))
            .unwrap_or_default()
    }

    pub fn selected_node(&self) -> Option<&Node> {
        self.selected_node.as_deref().and_then(|id| self.graph.node(id))
    }

    pub fn is_traced(&self, node_id: &str) -> bool {
        self.traced_nodes.iter().any(|id| id == node_id)
    }

    pub fn dismiss_messages(&mut self) {
        self.last_error = None;
        self.notice = None;
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Commands
    // ═══════════════════════════════════════════════════════════════════════════

    /// Apply a command and return the fetches it requires
    pub fn update(&mut self, command: LineageCommand) -> Vec<FetchRequest> {
        match command {
            LineageCommand::FetchLineageData {
                fqn,
                entity_type,
                config,
            } => {
                self.entity_fqn = fqn;
                self.entity_type = entity_type;
                self.lineage_config = config;
                self.issue_lineage().into_iter().collect()
            }
            LineageCommand::Reload => self.issue_lineage().into_iter().collect(),
            LineageCommand::LoadChildNodes { node_id, direction } => {
                self.issue_child_load(&node_id, direction).into_iter().collect()
            }
            LineageCommand::FetchPipelineStatus(fqn) => vec![self.issue_pipeline_status(&fqn)],

            LineageCommand::NodesChange(changes) => {
                self.apply_node_changes(changes);
                Vec::new()
            }
            LineageCommand::EdgesChange(changes) => {
                self.apply_edge_changes(changes);
                Vec::new()
            }
            LineageCommand::RemoveNode(id) => {
                self.remove_node(&id);
                Vec::new()
            }
            LineageCommand::Connect(connection) => {
                self.connect(&connection);
                Vec::new()
            }
            LineageCommand::CollapseNode { node_id, direction } => {
                self.collapse(&node_id, direction);
                Vec::new()
            }
            LineageCommand::NodeDrop {
                entity_type,
                x,
                y,
                bounds,
            } => {
                self.drop_node(entity_type, x, y, bounds);
                Vec::new()
            }
            LineageCommand::ResolveNewNode { node_id, fqn } => {
                self.issue_resolve_node(&node_id, &fqn).into_iter().collect()
            }
            LineageCommand::UpdateEdgePipeline { edge_id, fqn } => {
                self.issue_edge_pipeline(&edge_id, &fqn).into_iter().collect()
            }
            LineageCommand::ColumnEdgeRemove => {
                self.remove_selected_edge();
                Vec::new()
            }

            LineageCommand::NodeClick(id) => {
                if self.graph.contains_node(&id) {
                    self.selected_node = Some(id);
                    self.selected_edge = None;
                    self.selected_column = None;
                    self.is_drawer_open = true;
                    self.refresh_derived();
                }
                Vec::new()
            }
            LineageCommand::EdgeClick(selection) => {
                if self.graph.edge(&selection.edge_id).is_some() {
                    self.selected_edge = Some(selection);
                    self.selected_node = None;
                    self.selected_column = None;
                    self.is_drawer_open = true;
                    self.refresh_derived();
                }
                Vec::new()
            }
            LineageCommand::ColumnClick(column) => {
                self.click_column(column);
                Vec::new()
            }
            LineageCommand::PaneClick => {
                self.clear_selection();
                self.is_drawer_open = false;
                self.pipeline_edit_target = None;
                Vec::new()
            }
            LineageCommand::DrawerClose => {
                self.is_drawer_open = false;
                Vec::new()
            }
            LineageCommand::AddPipelineClick => {
                if self.require_edit_mode("add a pipeline") {
                    match &self.selected_edge {
                        Some(selection) => {
                            self.pipeline_edit_target = Some(selection.edge_id.clone())
                        }
                        None => self.notice = Some("Select an edge first".to_string()),
                    }
                }
                Vec::new()
            }

            LineageCommand::ToggleColumnView => {
                self.expand_all_columns = !self.expand_all_columns;
                Vec::new()
            }
            LineageCommand::UpdateEntityType(entity_type) => {
                self.entity_type = entity_type;
                Vec::new()
            }
            LineageCommand::QueryFilterUpdate(query) => {
                let query = query.trim().to_string();
                if query == self.query_filter {
                    return Vec::new();
                }
                self.query_filter = query;
                self.issue_lineage().into_iter().collect()
            }
            LineageCommand::InitViewport(viewport) => {
                self.viewport = viewport;
                self.zoom_value = viewport.zoom;
                Vec::new()
            }
            LineageCommand::UpdateLayerView(layer) => self.set_layer(layer),
            LineageCommand::ZoomUpdate(value) => {
                let zoom = value.clamp(MIN_ZOOM, MAX_ZOOM);
                self.zoom_value = zoom;
                self.viewport.zoom = zoom;
                Vec::new()
            }
            LineageCommand::LineageConfigUpdate(config) => {
                self.lineage_config = config;
                Vec::new()
            }
            LineageCommand::LineageEditClick => {
                if self.is_edit_mode {
                    self.exit_edit_mode()
                } else {
                    self.is_edit_mode = true;
                    self.edit_session = Some(EditSession::begin(&self.graph));
                    info!(entity = %self.entity_fqn, "entered lineage edit mode");
                    Vec::new()
                }
            }
            LineageCommand::DiscardEdits => {
                if !self.is_edit_mode {
                    return Vec::new();
                }
                self.leave_edit_mode();
                self.notice = Some("Edits discarded".to_string());
                self.issue_lineage().into_iter().collect()
            }
        }
    }

    fn require_edit_mode(&mut self, what: &str) -> bool {
        if !self.is_edit_mode {
            debug!(what, "ignored outside edit mode");
            self.notice = Some(format!("Enter edit mode to {}", what));
        }
        self.is_edit_mode
    }

    fn apply_node_changes(&mut self, changes: Vec<NodeChange>) {
        let mut accepted = Vec::new();

        for change in changes {
            match change {
                NodeChange::Select { id, selected } => {
                    if selected && self.graph.contains_node(&id) {
                        self.selected_node = Some(id);
                        self.selected_edge = None;
                        self.selected_column = None;
                    } else if !selected && self.selected_node.as_deref() == Some(id.as_str()) {
                        self.selected_node = None;
                    }
                }
                NodeChange::Add(_) | NodeChange::Position { .. } if !self.is_edit_mode => {
                    debug!("ignoring node add/move outside edit mode");
                }
                NodeChange::Remove { ref id } if self.root_id.as_deref() == Some(id.as_str()) => {
                    self.notice = Some("The root entity cannot be removed".to_string());
                }
                other => accepted.push(other),
            }
        }

        self.graph.apply_node_changes(&accepted);
        self.refresh_derived();
    }

    fn apply_edge_changes(&mut self, changes: Vec<EdgeChange>) {
        let mut accepted = Vec::new();

        for change in changes {
            match change {
                EdgeChange::Select { id, selected } => {
                    if selected && self.graph.edge(&id).is_some() {
                        self.selected_edge = Some(EdgeSelection::edge(&id));
                        self.selected_node = None;
                        self.selected_column = None;
                    } else if !selected
                        && self.selected_edge.as_ref().map(|s| s.edge_id.as_str()) == Some(id.as_str())
                    {
                        self.selected_edge = None;
                    }
                }
                EdgeChange::Add(_) | EdgeChange::Remove { .. } if !self.is_edit_mode => {
                    debug!("ignoring edge add/remove outside edit mode");
                }
                other => accepted.push(other),
            }
        }

        self.graph.apply_edge_changes(&accepted);
        self.refresh_derived();
    }

    fn remove_node(&mut self, id: &str) {
        if self.root_id.as_deref() == Some(id) {
            self.notice = Some("The root entity cannot be removed".to_string());
            return;
        }
        if self.graph.remove_node(id).is_some() {
            info!(node = id, "removed node");
            self.refresh_derived();
        }
    }

    fn connect(&mut self, connection: &Connection) {
        if !self.require_edit_mode("connect nodes") {
            return;
        }
        match self.graph.connect(connection) {
            ConnectOutcome::EdgeAdded(id) | ConnectOutcome::ColumnAdded(id) => {
                debug!(edge = %id, "connected");
                self.refresh_derived();
            }
            ConnectOutcome::Duplicate => {
                debug!(source = %connection.source, target = %connection.target, "connection already exists");
            }
            ConnectOutcome::Rejected(reason) => {
                self.notice = Some(format!("Cannot connect: {}", reason));
            }
        }
    }

    fn collapse(&mut self, node_id: &str, direction: EdgeDirection) {
        if !self.graph.contains_node(node_id) {
            return;
        }
        let before = self.graph.edges.clone();
        let removed = self
            .graph
            .collapse(node_id, direction, self.root_id.as_deref());
        if let Some(session) = self.edit_session.as_mut() {
            let graph = &self.graph;
            session.forget(before.iter().filter(|e| !graph.has_edge(&e.source, &e.target)));
        }
        info!(node = node_id, %direction, removed = removed.len(), "collapsed node");
        self.expanded_nodes.remove(node_id);
        self.refresh_derived();
    }

    fn drop_node(&mut self, entity_type: EntityType, x: f64, y: f64, bounds: Bounds) {
        if !self.require_edit_mode("add nodes") {
            return;
        }
        let id = uuid::Uuid::new_v4().to_string();
        let position = self.viewport.project(x, y, bounds);
        let mut node = Node::new(LineageEntity::new(&id, entity_type, ""), position);
        node.is_new = true;

        self.graph.apply_node_changes(&[NodeChange::Add(node)]);
        self.selected_node = Some(id);
        self.selected_edge = None;
        self.selected_column = None;
        self.refresh_derived();
    }

    /// Remove the selected column sub-edge, or the whole edge when no column is selected
    fn remove_selected_edge(&mut self) {
        if !self.require_edit_mode("remove edges") {
            return;
        }
        let Some(selection) = self.selected_edge.take() else {
            return;
        };
        match &selection.column {
            Some((from, to)) => {
                if let Some(edge) = self.graph.edge_mut(&selection.edge_id) {
                    edge.details.remove_column_pair(from, to);
                }
            }
            None => {
                self.graph.apply_edge_changes(&[EdgeChange::Remove {
                    id: selection.edge_id.clone(),
                }]);
            }
        }
        self.refresh_derived();
    }

    fn click_column(&mut self, column: String) {
        if self.selected_column.as_deref() == Some(column.as_str()) {
            self.selected_column = None;
        } else if self.graph.column_owner(&column).is_some() {
            self.selected_column = Some(column);
            self.selected_node = None;
            self.selected_edge = None;
        } else {
            debug!(column = %column, "clicked column is not on the graph");
            return;
        }
        self.refresh_derived();
    }

    fn clear_selection(&mut self) {
        self.selected_node = None;
        self.selected_edge = None;
        self.selected_column = None;
        self.traced_nodes.clear();
        self.traced_columns.clear();
    }

    fn set_layer(&mut self, layer: LineageLayerView) -> Vec<FetchRequest> {
        if layer == self.active_layer {
            return Vec::new();
        }
        match self.active_layer {
            LineageLayerView::Column => {
                self.selected_column = None;
                self.traced_columns.clear();
                if let Some(selection) = self.selected_edge.as_mut() {
                    selection.column = None;
                }
            }
            LineageLayerView::Pipeline => self.pipeline_edit_target = None,
            _ => {}
        }
        debug!(from = self.active_layer.name(), to = layer.name(), "layer changed");
        self.active_layer = layer;

        if layer == LineageLayerView::Pipeline {
            self.pipeline_status_requests()
        } else {
            Vec::new()
        }
    }

    fn leave_edit_mode(&mut self) -> Option<EditSession> {
        self.is_edit_mode = false;
        self.pipeline_edit_target = None;
        self.tracker.resolves.clear();

        let placeholders: Vec<String> = self
            .graph
            .nodes
            .iter()
            .filter(|n| n.is_new)
            .map(|n| n.id.clone())
            .collect();
        for id in &placeholders {
            self.graph.remove_node(id);
        }
        if !placeholders.is_empty() {
            debug!(count = placeholders.len(), "dropped unbound placeholder nodes");
            self.refresh_derived();
        }

        self.edit_session.take()
    }

    fn exit_edit_mode(&mut self) -> Vec<FetchRequest> {
        let changes = self
            .leave_edit_mode()
            .map(|s| s.pending_changes(&self.graph))
            .unwrap_or_default();

        if changes.is_empty() {
            info!("left edit mode without changes");
            return Vec::new();
        }

        if self.can_edit_lineage {
            info!(changes = changes.len(), "persisting lineage edits");
            let id = self.tracker.issue();
            self.tracker.persist = Some(id);
            self.persisting = true;
            vec![FetchRequest {
                id,
                kind: FetchKind::Persist(changes),
            }]
        } else {
            warn!(changes = changes.len(), "discarding lineage edits without edit permission");
            let reload = self.issue_lineage();
            self.last_error = Some(LineageError::PermissionDenied(format!(
                "{} change(s) discarded",
                changes.len()
            )));
            reload.into_iter().collect()
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Issuing requests
    // ═══════════════════════════════════════════════════════════════════════════

    fn issue_lineage(&mut self) -> Option<FetchRequest> {
        if self.entity_fqn.is_empty() {
            debug!("no entity to fetch lineage for");
            return None;
        }
        let id = self.tracker.issue();
        self.tracker.lineage = Some(id);
        self.loading = true;
        self.status = LoadingState::Waiting;
        self.last_error = None;

        info!(
            request = id,
            fqn = %self.entity_fqn,
            upstream = self.lineage_config.upstream_depth,
            downstream = self.lineage_config.downstream_depth,
            "fetching lineage"
        );

        Some(FetchRequest {
            id,
            kind: FetchKind::Lineage {
                fqn: self.entity_fqn.clone(),
                entity_type: self.entity_type,
                config: self.lineage_config,
                query_filter: Some(self.query_filter.clone()).filter(|q| !q.is_empty()),
            },
        })
    }

    fn issue_child_load(&mut self, node_id: &str, direction: EdgeDirection) -> Option<FetchRequest> {
        let node = self.graph.node(node_id)?;
        if node.is_new {
            return None;
        }
        let in_flight = self
            .tracker
            .children
            .values()
            .any(|c| c.node_id == node_id && c.direction == direction);
        if in_flight {
            debug!(node = node_id, %direction, "child load already in flight");
            return None;
        }

        let kind = FetchKind::ChildNodes {
            node_id: node_id.to_string(),
            fqn: node.entity.fqn().to_string(),
            entity_type: node.entity.entity_type(),
            direction,
            config: self.lineage_config.single_hop(direction),
        };
        let id = self.tracker.issue();
        self.tracker.children.insert(
            id,
            ChildLoad {
                node_id: node_id.to_string(),
                direction,
                generation: self.tracker.generation,
            },
        );
        debug!(request = id, node = node_id, %direction, "loading child nodes");
        Some(FetchRequest { id, kind })
    }

    fn issue_pipeline_status(&mut self, fqn: &str) -> FetchRequest {
        let id = self.tracker.issue();
        self.tracker.pipelines.insert(fqn.to_string(), id);
        debug!(request = id, pipeline = fqn, "fetching pipeline status");
        FetchRequest {
            id,
            kind: FetchKind::PipelineStatus {
                fqn: fqn.to_string(),
            },
        }
    }

    /// Status requests for edge pipelines neither known nor in flight
    fn pipeline_status_requests(&mut self) -> Vec<FetchRequest> {
        let mut seen = HashSet::new();
        let missing: Vec<String> = self
            .graph
            .edges
            .iter()
            .filter_map(|e| e.details.pipeline.as_ref())
            .map(|p| p.fully_qualified_name.clone())
            .filter(|fqn| {
                !self.pipeline_status.contains_key(fqn)
                    && !self.tracker.pipelines.contains_key(fqn)
            })
            .filter(|fqn| seen.insert(fqn.clone()))
            .collect();

        missing
            .iter()
            .map(|fqn| self.issue_pipeline_status(fqn))
            .collect()
    }

    fn issue_resolve(&mut self, target: ResolveTarget, fqn: &str, entity_type: EntityType) -> FetchRequest {
        let id = self.tracker.issue();
        let pending = PendingResolve {
            id,
            generation: self.tracker.generation,
            edit_mode: self.is_edit_mode,
        };
        self.tracker.resolves.insert(target.clone(), pending);
        FetchRequest {
            id,
            kind: FetchKind::Resolve {
                target,
                fqn: fqn.trim().to_string(),
                entity_type,
            },
        }
    }

    fn issue_resolve_node(&mut self, node_id: &str, fqn: &str) -> Option<FetchRequest> {
        let node = self.graph.node(node_id)?;
        if !node.is_new || fqn.trim().is_empty() {
            return None;
        }
        let entity_type = node.entity.entity_type();
        Some(self.issue_resolve(ResolveTarget::NewNode(node_id.to_string()), fqn, entity_type))
    }

    fn issue_edge_pipeline(&mut self, edge_id: &str, fqn: &str) -> Option<FetchRequest> {
        if !self.require_edit_mode("edit pipelines") {
            return None;
        }
        let edge = self.graph.edge_mut(edge_id)?;
        if fqn.trim().is_empty() {
            edge.details.pipeline = None;
            edge.refresh_kind();
            self.pipeline_edit_target = None;
            return None;
        }
        Some(self.issue_resolve(
            ResolveTarget::EdgePipeline(edge_id.to_string()),
            fqn,
            EntityType::Pipeline,
        ))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Responses
    // ═══════════════════════════════════════════════════════════════════════════

    /// Apply a completed request; stale responses are dropped
    pub fn handle_response(&mut self, response: FetchResponse) -> Vec<FetchRequest> {
        let FetchResponse { request, result } = response;
        let id = request.id;

        match request.kind {
            FetchKind::Lineage { .. } => {
                if self.tracker.lineage != Some(id) {
                    debug!(request = id, "dropping superseded lineage response");
                    return Vec::new();
                }
                self.tracker.lineage = None;
                match result.and_then(expect_lineage) {
                    Ok(lineage) => self.apply_lineage(lineage),
                    Err(err) => {
                        warn!(request = id, error = %err, "lineage fetch failed");
                        self.loading = false;
                        self.status = LoadingState::Failed;
                        self.last_error = Some(err);
                        Vec::new()
                    }
                }
            }
            FetchKind::ChildNodes { .. } => {
                let Some(load) = self.tracker.children.remove(&id) else {
                    debug!(request = id, "dropping unknown child response");
                    return Vec::new();
                };
                if load.generation != self.tracker.generation {
                    debug!(request = id, node = %load.node_id, "dropping child response for a replaced graph");
                    return Vec::new();
                }
                match result.and_then(expect_lineage) {
                    Ok(lineage) => self.apply_children(&load, lineage),
                    Err(err) => {
                        warn!(node = %load.node_id, error = %err, "child load failed");
                        self.last_error = Some(err);
                        Vec::new()
                    }
                }
            }
            FetchKind::PipelineStatus { fqn } => {
                if self.tracker.pipelines.get(&fqn) != Some(&id) {
                    debug!(request = id, pipeline = %fqn, "dropping superseded pipeline status");
                    return Vec::new();
                }
                self.tracker.pipelines.remove(&fqn);
                match result {
                    Ok(FetchPayload::PipelineStatus(Some(status))) => {
                        self.pipeline_status.insert(fqn, status);
                    }
                    Ok(FetchPayload::PipelineStatus(None)) | Err(LineageError::NotFound(_)) => {
                        debug!(pipeline = %fqn, "no pipeline status available");
                    }
                    Ok(_) => {
                        self.last_error = Some(unexpected_payload("pipeline status"));
                    }
                    Err(err) => {
                        warn!(pipeline = %fqn, error = %err, "pipeline status fetch failed");
                        self.last_error = Some(err);
                    }
                }
                Vec::new()
            }
            FetchKind::Resolve { target, fqn, .. } => {
                let pending = match self.tracker.resolves.get(&target) {
                    Some(pending) if pending.id == id => *pending,
                    _ => {
                        debug!(request = id, "dropping superseded resolve");
                        return Vec::new();
                    }
                };
                self.tracker.resolves.remove(&target);
                if pending.generation != self.tracker.generation
                    || pending.edit_mode != self.is_edit_mode
                {
                    debug!(request = id, fqn = %fqn, "dropping resolve issued against another graph or edit session");
                    return Vec::new();
                }
                match result.and_then(expect_lineage) {
                    Ok(lineage) => self.apply_resolved(target, lineage.entity),
                    Err(err) => {
                        warn!(fqn = %fqn, error = %err, "entity lookup failed");
                        self.last_error = Some(err);
                        Vec::new()
                    }
                }
            }
            FetchKind::Persist(_) => {
                if self.tracker.persist != Some(id) {
                    debug!(request = id, "dropping superseded persist result");
                    return Vec::new();
                }
                self.tracker.persist = None;
                self.persisting = false;
                match result {
                    Ok(FetchPayload::Persisted(count)) => {
                        info!(count, "lineage edits saved");
                        self.notice = Some(format!("Saved {} lineage change(s)", count));
                        Vec::new()
                    }
                    Ok(_) => {
                        self.last_error = Some(unexpected_payload("persist"));
                        self.issue_lineage().into_iter().collect()
                    }
                    Err(err) => {
                        warn!(error = %err, "saving lineage edits failed, reloading");
                        let reload = self.issue_lineage();
                        self.last_error = Some(err);
                        reload.into_iter().collect()
                    }
                }
            }
        }
    }

    fn apply_lineage(&mut self, lineage: EntityLineageResponse) -> Vec<FetchRequest> {
        self.graph = LineageGraph::from_response(&lineage);
        self.root_id = Some(lineage.entity.id().to_string());
        self.tracker.generation += 1;
        self.tracker.children.clear();
        self.tracker.resolves.clear();

        self.expanded_nodes.clear();
        self.clear_selection();
        self.is_drawer_open = false;
        self.pipeline_edit_target = None;
        self.loading = false;
        self.status = LoadingState::Success;
        self.init = true;
        self.entity_lineage = Some(lineage);

        if self.is_edit_mode {
            self.edit_session = Some(EditSession::begin(&self.graph));
        }
        self.refresh_derived();

        info!(
            nodes = self.graph.nodes.len(),
            edges = self.graph.edges.len(),
            generation = self.tracker.generation,
            "lineage loaded"
        );

        if self.active_layer == LineageLayerView::Pipeline {
            self.pipeline_status_requests()
        } else {
            Vec::new()
        }
    }

    fn apply_children(&mut self, load: &ChildLoad, lineage: EntityLineageResponse) -> Vec<FetchRequest> {
        let summary = self.graph.merge(&lineage, &load.node_id, load.direction);
        if let Some(session) = self.edit_session.as_mut() {
            session.absorb(self.graph.edges.iter().filter(|e| summary.edges.contains(&e.id)));
        }
        self.expanded_nodes.insert(load.node_id.clone());
        self.refresh_derived();

        info!(
            node = %load.node_id,
            direction = %load.direction,
            nodes = summary.nodes.len(),
            edges = summary.edges.len(),
            "merged child nodes"
        );

        if self.active_layer == LineageLayerView::Pipeline {
            self.pipeline_status_requests()
        } else {
            Vec::new()
        }
    }

    fn apply_resolved(&mut self, target: ResolveTarget, entity: LineageEntity) -> Vec<FetchRequest> {
        match target {
            ResolveTarget::NewNode(node_id) => {
                let still_placeholder = self.graph.node(&node_id).is_some_and(|n| n.is_new);
                if !still_placeholder {
                    return Vec::new();
                }
                let new_id = entity.id().to_string();
                match self.graph.rebind_node(&node_id, entity) {
                    Ok(()) => {
                        if self.selected_node.as_deref() == Some(node_id.as_str()) {
                            self.selected_node = Some(new_id);
                        }
                        self.refresh_derived();
                    }
                    Err(reason) => self.notice = Some(format!("Cannot add entity: {}", reason)),
                }
                Vec::new()
            }
            ResolveTarget::EdgePipeline(edge_id) => {
                let Some(edge) = self.graph.edge_mut(&edge_id) else {
                    return Vec::new();
                };
                edge.details.pipeline = Some(entity.reference);
                edge.refresh_kind();
                self.pipeline_edit_target = None;
                if self.active_layer == LineageLayerView::Pipeline {
                    self.pipeline_status_requests()
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// Recompute the state derived from the graph and the current selection
    fn refresh_derived(&mut self) {
        if let Some(id) = &self.selected_node {
            if !self.graph.contains_node(id) {
                self.selected_node = None;
            }
        }
        if let Some(selection) = &self.selected_edge {
            let valid = match self.graph.edge(&selection.edge_id) {
                Some(edge) => match &selection.column {
                    Some((from, to)) => edge.details.has_column_pair(from, to),
                    None => true,
                },
                None => false,
            };
            if !valid {
                self.selected_edge = None;
            }
        }
        if let Some(column) = &self.selected_column {
            if self.graph.column_owner(column).is_none() {
                self.selected_column = None;
            }
        }

        self.traced_nodes = match (&self.selected_node, &self.selected_edge) {
            (Some(id), _) => trace::traced_nodes(&self.graph, id),
            (None, Some(selection)) => self
                .graph
                .edge(&selection.edge_id)
                .map(|e| vec![e.source.clone(), e.target.clone()])
                .unwrap_or_default(),
            (None, None) => Vec::new(),
        };
        self.traced_columns = match (&self.selected_column, &self.selected_edge) {
            (Some(column), _) => trace::traced_columns(&self.graph, column),
            (None, Some(EdgeSelection { column: Some((from, to)), .. })) => {
                vec![from.clone(), to.clone()]
            }
            _ => Vec::new(),
        };
        if self.selected_column.is_some() {
            self.traced_nodes.clear();
        }

        let graph = &self.graph;
        self.expanded_nodes.retain(|id| graph.contains_node(id));
        if let Some(edge_id) = &self.pipeline_edit_target {
            if self.graph.edge(edge_id).is_none() {
                self.pipeline_edit_target = None;
            }
        }

        self.upstream_downstream = match &self.root_id {
            Some(root) => trace::upstream_downstream_data(&self.graph, root),
            None => UpstreamDownstreamData::default(),
        };
    }
}

fn expect_lineage(payload: FetchPayload) -> Result<EntityLineageResponse, LineageError> {
    match payload {
        FetchPayload::Lineage(lineage) => {
            lineage.validate()?;
            Ok(lineage)
        }
        _ => Err(unexpected_payload("lineage")),
    }
}

fn unexpected_payload(what: &str) -> LineageError {
    LineageError::Malformed(format!("unexpected payload for {} request", what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::entity::{EntityReference, StatusType};
    use crate::model::graph::tests::{edge_details, entity, response};
    use crate::model::graph::{Edge, Position};

    fn fetch(ctx: &mut LineageContext, fqn: &str) -> FetchRequest {
        let mut requests = ctx.update(LineageCommand::FetchLineageData {
            fqn: fqn.to_string(),
            entity_type: EntityType::Table,
            config: LineageConfig::default(),
        });
        assert_eq!(requests.len(), 1);
        requests.remove(0)
    }

    fn reply(ctx: &mut LineageContext, request: FetchRequest, lineage: EntityLineageResponse) -> Vec<FetchRequest> {
        ctx.handle_response(FetchResponse::new(request, Ok(FetchPayload::Lineage(lineage))))
    }

    fn loaded(lineage: EntityLineageResponse) -> LineageContext {
        let mut ctx = LineageContext::new(true);
        let request = fetch(&mut ctx, lineage.entity.fqn());
        reply(&mut ctx, request, lineage);
        ctx
    }

    fn node_ids(ctx: &LineageContext) -> Vec<&str> {
        ctx.graph.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    fn with_pipeline(mut lineage: EntityLineageResponse, fqn: &str) -> EntityLineageResponse {
        for edge in &mut lineage.edges {
            edge.pipeline = Some(EntityReference::new(&format!("p-{}", fqn), EntityType::Pipeline, fqn));
        }
        lineage
    }

    fn status(execution_status: StatusType, timestamp: i64) -> PipelineStatus {
        PipelineStatus {
            execution_status,
            timestamp,
            task_status: Vec::new(),
        }
    }

    #[test]
    fn test_fetch_sets_waiting_then_success() {
        let mut ctx = LineageContext::new(false);
        let request = fetch(&mut ctx, "svc.db.schema.a");
        assert!(ctx.loading);
        assert!(!ctx.init);
        assert_eq!(ctx.status, LoadingState::Waiting);

        let lineage = response("a", &["b"], &[("a", "b")]);
        reply(&mut ctx, request, lineage.clone());
        assert!(!ctx.loading);
        assert!(ctx.init);
        assert_eq!(ctx.entity_lineage.as_ref(), Some(&lineage));
        assert_eq!(ctx.status, LoadingState::Success);
        assert_eq!(ctx.root_id.as_deref(), Some("a"));
        assert_eq!(ctx.upstream_downstream.downstream_nodes, vec!["b"]);
    }

    #[test]
    fn test_last_request_wins_in_either_completion_order() {
        for reverse in [false, true] {
            let mut ctx = LineageContext::new(false);
            let first = fetch(&mut ctx, "svc.db.schema.a");
            let second = fetch(&mut ctx, "svc.db.schema.x");

            let a = response("a", &["b"], &[("a", "b")]);
            let x = response("x", &["y"], &[("y", "x")]);
            if reverse {
                reply(&mut ctx, second, x);
                reply(&mut ctx, first, a);
            } else {
                reply(&mut ctx, first, a);
                assert_eq!(ctx.status, LoadingState::Waiting);
                reply(&mut ctx, second, x);
            }

            assert_eq!(node_ids(&ctx), vec!["x", "y"]);
            assert_eq!(ctx.status, LoadingState::Success);
        }
    }

    #[test]
    fn test_failed_fetch_keeps_graph() {
        let mut ctx = loaded(response("a", &["b"], &[("a", "b")]));
        let request = ctx.update(LineageCommand::Reload).remove(0);

        ctx.handle_response(FetchResponse::new(
            request,
            Err(LineageError::Network("connection refused".to_string())),
        ));
        assert_eq!(ctx.status, LoadingState::Failed);
        assert!(!ctx.loading);
        assert!(matches!(ctx.last_error, Some(LineageError::Network(_))));
        assert_eq!(node_ids(&ctx), vec!["a", "b"]);
    }

    #[test]
    fn test_malformed_response_is_rejected() {
        let mut ctx = loaded(response("a", &[], &[]));
        let request = ctx.update(LineageCommand::Reload).remove(0);

        let mut bad = response("z", &[], &[]);
        bad.nodes.push(LineageEntity::new("", EntityType::Table, "orphan"));
        reply(&mut ctx, request, bad);

        assert_eq!(ctx.status, LoadingState::Failed);
        assert!(matches!(ctx.last_error, Some(LineageError::Malformed(_))));
        assert_eq!(node_ids(&ctx), vec!["a"]);
    }

    #[test]
    fn test_node_click_traces_and_opens_drawer() {
        let mut ctx = loaded(response("a", &["u", "d", "side"], &[("u", "a"), ("a", "d"), ("side", "d")]));

        ctx.update(LineageCommand::NodeClick("a".to_string()));
        assert_eq!(ctx.selected_node.as_deref(), Some("a"));
        assert_eq!(ctx.traced_nodes, vec!["a", "u", "d"]);
        assert!(ctx.is_drawer_open);

        ctx.update(LineageCommand::PaneClick);
        assert!(ctx.selected_node.is_none());
        assert!(ctx.traced_nodes.is_empty());
        assert!(!ctx.is_drawer_open);
    }

    #[test]
    fn test_edge_click_traces_endpoints_and_columns() {
        let mut ctx = loaded(response("a", &["b"], &[("a", "b")]));
        ctx.update(LineageCommand::EdgeClick(EdgeSelection {
            edge_id: Edge::edge_id("a", "b"),
            column: None,
        }));
        assert_eq!(ctx.traced_nodes, vec!["a", "b"]);
        assert!(ctx.traced_columns.is_empty());

        // A column selection that the edge does not carry is invalid
        ctx.update(LineageCommand::EdgeClick(EdgeSelection {
            edge_id: Edge::edge_id("a", "b"),
            column: Some(("x".to_string(), "y".to_string())),
        }));
        assert!(ctx.selected_edge.is_none());
    }

    #[test]
    fn test_column_click_toggles_trace() {
        let mut lineage = response("a", &["b"], &[("a", "b")]);
        lineage.entity = entity("a").with_columns(&["id"]);
        lineage.nodes = vec![entity("b").with_columns(&["id"])];
        lineage.edges[0].add_column_pair("svc.db.schema.a.id", "svc.db.schema.b.id");
        let mut ctx = loaded(lineage);

        ctx.update(LineageCommand::NodeClick("a".to_string()));
        ctx.update(LineageCommand::ColumnClick("svc.db.schema.b.id".to_string()));
        assert_eq!(ctx.traced_columns, vec!["svc.db.schema.b.id", "svc.db.schema.a.id"]);
        assert!(ctx.traced_nodes.is_empty());

        ctx.update(LineageCommand::ColumnClick("svc.db.schema.b.id".to_string()));
        assert!(ctx.selected_column.is_none());
        assert!(ctx.traced_columns.is_empty());
    }

    #[test]
    fn test_leaving_column_layer_clears_column_trace() {
        let mut lineage = response("a", &["b"], &[("a", "b")]);
        lineage.entity = entity("a").with_columns(&["id"]);
        lineage.nodes = vec![entity("b").with_columns(&["id"])];
        lineage.edges[0].add_column_pair("svc.db.schema.a.id", "svc.db.schema.b.id");
        let mut ctx = loaded(lineage);

        ctx.update(LineageCommand::UpdateLayerView(LineageLayerView::Column));
        ctx.update(LineageCommand::ColumnClick("svc.db.schema.a.id".to_string()));
        assert_eq!(ctx.traced_columns.len(), 2);

        ctx.update(LineageCommand::UpdateLayerView(LineageLayerView::Pipeline));
        assert_eq!(ctx.active_layer, LineageLayerView::Pipeline);
        assert!(ctx.traced_columns.is_empty());
        assert!(ctx.selected_column.is_none());
    }

    #[test]
    fn test_pipeline_layer_requests_missing_statuses() {
        let lineage = with_pipeline(response("a", &["b", "c"], &[("a", "b"), ("b", "c")]), "airflow.etl");
        let mut ctx = loaded(lineage);

        let requests = ctx.update(LineageCommand::UpdateLayerView(LineageLayerView::Pipeline));
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].kind,
            FetchKind::PipelineStatus {
                fqn: "airflow.etl".to_string()
            }
        );

        // Already in flight
        ctx.update(LineageCommand::UpdateLayerView(LineageLayerView::None));
        assert!(ctx
            .update(LineageCommand::UpdateLayerView(LineageLayerView::Pipeline))
            .is_empty());
    }

    #[test]
    fn test_pipeline_status_latest_request_per_fqn() {
        let mut ctx = loaded(response("a", &[], &[]));
        let old = ctx.update(LineageCommand::FetchPipelineStatus("etl".to_string())).remove(0);
        let new = ctx.update(LineageCommand::FetchPipelineStatus("etl".to_string())).remove(0);

        ctx.handle_response(FetchResponse::new(
            new,
            Ok(FetchPayload::PipelineStatus(Some(status(StatusType::Successful, 2)))),
        ));
        ctx.handle_response(FetchResponse::new(
            old,
            Ok(FetchPayload::PipelineStatus(Some(status(StatusType::Failed, 1)))),
        ));

        assert_eq!(ctx.pipeline_status["etl"].execution_status, StatusType::Successful);
        assert_eq!(ctx.status, LoadingState::Success);
    }

    #[test]
    fn test_collapse_scenario() {
        let mut ctx = loaded(response("a", &["b", "c"], &[("a", "b")]));

        ctx.update(LineageCommand::CollapseNode {
            node_id: "a".to_string(),
            direction: EdgeDirection::Downstream,
        });
        assert_eq!(node_ids(&ctx), vec!["a", "c"]);
        assert!(ctx.graph.edges.is_empty());
        assert!(!ctx.expanded_nodes.contains("a"));
    }

    #[test]
    fn test_child_load_scenario() {
        let mut ctx = loaded(response("a", &["b", "c"], &[("a", "b")]));

        let mut requests = ctx.update(LineageCommand::LoadChildNodes {
            node_id: "b".to_string(),
            direction: EdgeDirection::Upstream,
        });
        assert_eq!(requests.len(), 1);
        let request = requests.remove(0);
        match &request.kind {
            FetchKind::ChildNodes { config, fqn, .. } => {
                assert_eq!((config.upstream_depth, config.downstream_depth), (1, 0));
                assert_eq!(fqn, "svc.db.schema.b");
            }
            other => panic!("unexpected request {:?}", other),
        }

        // Same node and direction while in flight
        assert!(ctx
            .update(LineageCommand::LoadChildNodes {
                node_id: "b".to_string(),
                direction: EdgeDirection::Upstream,
            })
            .is_empty());

        reply(&mut ctx, request, response("b", &["d"], &[("d", "b")]));
        assert_eq!(node_ids(&ctx), vec!["a", "b", "c", "d"]);
        assert!(ctx.graph.has_edge("a", "b"));
        assert!(ctx.graph.has_edge("d", "b"));
        assert!(ctx.expanded_nodes.contains("b"));
    }

    #[test]
    fn test_child_response_after_reload_is_dropped() {
        let mut ctx = loaded(response("a", &["b"], &[("a", "b")]));
        let child = ctx
            .update(LineageCommand::LoadChildNodes {
                node_id: "b".to_string(),
                direction: EdgeDirection::Downstream,
            })
            .remove(0);

        let reload = ctx.update(LineageCommand::Reload).remove(0);
        reply(&mut ctx, reload, response("a", &["b"], &[("a", "b")]));
        reply(&mut ctx, child, response("b", &["late"], &[("b", "late")]));

        assert_eq!(node_ids(&ctx), vec!["a", "b"]);
    }

    #[test]
    fn test_remove_node_leaves_no_dangling_edges() {
        let mut ctx = loaded(response("a", &["b", "c"], &[("a", "b"), ("b", "c")]));
        ctx.update(LineageCommand::NodeClick("b".to_string()));

        ctx.update(LineageCommand::RemoveNode("b".to_string()));
        assert!(ctx.graph.edges.iter().all(|e| ctx.graph.contains_node(&e.source)
            && ctx.graph.contains_node(&e.target)));
        assert!(ctx.selected_node.is_none());

        ctx.update(LineageCommand::RemoveNode("a".to_string()));
        assert!(ctx.graph.contains_node("a"));
        assert!(ctx.notice.is_some());
    }

    #[test]
    fn test_connect_requires_edit_mode_and_ignores_duplicates() {
        let mut ctx = loaded(response("a", &["b"], &[]));
        ctx.update(LineageCommand::Connect(Connection::nodes("a", "b")));
        assert!(ctx.graph.edges.is_empty());

        ctx.update(LineageCommand::LineageEditClick);
        ctx.update(LineageCommand::Connect(Connection::nodes("a", "b")));
        ctx.update(LineageCommand::Connect(Connection::nodes("a", "b")));
        assert_eq!(ctx.graph.edges.len(), 1);
    }

    #[test]
    fn test_node_changes_gated_by_edit_mode() {
        let mut ctx = loaded(response("a", &[], &[]));
        let moved = NodeChange::Position {
            id: "a".to_string(),
            position: Position { x: 40.0, y: 40.0 },
        };

        ctx.update(LineageCommand::NodesChange(vec![
            moved.clone(),
            NodeChange::Select {
                id: "a".to_string(),
                selected: true,
            },
        ]));
        assert_eq!(ctx.graph.node("a").unwrap().position, Position::default());
        assert_eq!(ctx.selected_node.as_deref(), Some("a"));

        ctx.update(LineageCommand::LineageEditClick);
        ctx.update(LineageCommand::NodesChange(vec![moved]));
        assert_eq!(ctx.graph.node("a").unwrap().position, Position { x: 40.0, y: 40.0 });
    }

    #[test]
    fn test_edit_session_persists_changes() {
        let mut ctx = loaded(response("a", &["b", "c"], &[("a", "b")]));
        ctx.update(LineageCommand::LineageEditClick);
        ctx.update(LineageCommand::Connect(Connection::nodes("b", "c")));
        assert_eq!(ctx.pending_changes().len(), 1);

        let mut requests = ctx.update(LineageCommand::LineageEditClick);
        assert!(!ctx.is_edit_mode);
        assert!(ctx.persisting);
        let request = requests.remove(0);
        match &request.kind {
            FetchKind::Persist(changes) => {
                assert_eq!(changes, &vec![PendingChange::AddEdge(edge_details("b", "c"))]);
            }
            other => panic!("unexpected request {:?}", other),
        }

        let follow_up = ctx.handle_response(FetchResponse::new(request, Ok(FetchPayload::Persisted(1))));
        assert!(follow_up.is_empty());
        assert!(!ctx.persisting);
        assert!(ctx.graph.has_edge("b", "c"));
    }

    #[test]
    fn test_collapse_in_edit_mode_is_not_saved_as_removal() {
        let mut ctx = loaded(response("a", &["b", "c"], &[("a", "b")]));
        ctx.update(LineageCommand::LineageEditClick);
        ctx.update(LineageCommand::Connect(Connection::nodes("b", "c")));
        ctx.update(LineageCommand::CollapseNode {
            node_id: "a".to_string(),
            direction: EdgeDirection::Downstream,
        });
        assert!(!ctx.graph.contains_node("b"));

        let requests = ctx.update(LineageCommand::LineageEditClick);
        assert!(requests.is_empty(), "unexpected requests {:?}", requests);
        assert!(!ctx.persisting);
    }

    #[test]
    fn test_expand_in_edit_mode_is_not_saved_as_addition() {
        let mut ctx = loaded(response("a", &["b", "c"], &[("a", "b")]));
        ctx.update(LineageCommand::LineageEditClick);
        let request = ctx
            .update(LineageCommand::LoadChildNodes {
                node_id: "b".to_string(),
                direction: EdgeDirection::Downstream,
            })
            .remove(0);
        reply(&mut ctx, request, response("b", &["d"], &[("b", "d")]));
        assert!(ctx.graph.has_edge("b", "d"));
        assert!(ctx.pending_changes().is_empty());

        ctx.update(LineageCommand::Connect(Connection::nodes("d", "c")));
        assert_eq!(
            ctx.pending_changes(),
            vec![PendingChange::AddEdge(edge_details("d", "c"))]
        );
    }

    #[test]
    fn test_pipeline_lookup_is_dropped_after_edits_are_discarded() {
        let lineage = response("a", &["b"], &[("a", "b")]);
        let edge_id = Edge::edge_id("a", "b");
        let found = EntityLineageResponse::new(LineageEntity::new(
            "pipe-1",
            EntityType::Pipeline,
            "airflow.etl",
        ));

        let mut ctx = loaded(lineage.clone());
        ctx.update(LineageCommand::LineageEditClick);
        let lookup = ctx
            .update(LineageCommand::UpdateEdgePipeline {
                edge_id: edge_id.clone(),
                fqn: "airflow.etl".to_string(),
            })
            .remove(0);
        let reload = ctx.update(LineageCommand::DiscardEdits).remove(0);
        reply(&mut ctx, reload, lineage.clone());
        reply(&mut ctx, lookup, found.clone());
        assert!(!ctx.is_edit_mode);
        assert!(ctx.graph.edge(&edge_id).unwrap().details.pipeline.is_none());

        // Still editing, but the graph was reloaded underneath the lookup
        let mut ctx = loaded(lineage.clone());
        ctx.update(LineageCommand::LineageEditClick);
        let lookup = ctx
            .update(LineageCommand::UpdateEdgePipeline {
                edge_id: edge_id.clone(),
                fqn: "airflow.etl".to_string(),
            })
            .remove(0);
        let reload = ctx.update(LineageCommand::Reload).remove(0);
        reply(&mut ctx, reload, lineage);
        reply(&mut ctx, lookup, found);
        assert!(ctx.is_edit_mode);
        assert!(ctx.graph.edge(&edge_id).unwrap().details.pipeline.is_none());
        assert!(ctx.pending_changes().is_empty());
    }

    #[test]
    fn test_failed_persist_reloads() {
        let mut ctx = loaded(response("a", &["b"], &[]));
        ctx.update(LineageCommand::LineageEditClick);
        ctx.update(LineageCommand::Connect(Connection::nodes("a", "b")));
        let persist = ctx.update(LineageCommand::LineageEditClick).remove(0);

        let follow_up = ctx.handle_response(FetchResponse::new(
            persist,
            Err(LineageError::Network("timeout".to_string())),
        ));
        assert_eq!(follow_up.len(), 1);
        assert!(matches!(follow_up[0].kind, FetchKind::Lineage { .. }));
        assert!(matches!(ctx.last_error, Some(LineageError::Network(_))));
    }

    #[test]
    fn test_edits_without_permission_are_discarded() {
        let mut ctx = LineageContext::new(false);
        let request = fetch(&mut ctx, "svc.db.schema.a");
        reply(&mut ctx, request, response("a", &["b"], &[]));

        ctx.update(LineageCommand::LineageEditClick);
        ctx.update(LineageCommand::Connect(Connection::nodes("a", "b")));
        let requests = ctx.update(LineageCommand::LineageEditClick);

        assert_eq!(requests.len(), 1);
        assert!(matches!(requests[0].kind, FetchKind::Lineage { .. }));
        assert!(matches!(ctx.last_error, Some(LineageError::PermissionDenied(_))));
    }

    #[test]
    fn test_drop_and_resolve_placeholder() {
        let mut ctx = loaded(response("a", &[], &[]));
        let bounds = Bounds {
            left: 0.0,
            top: 0.0,
            width: 100.0,
            height: 100.0,
        };
        let drop = LineageCommand::NodeDrop {
            entity_type: EntityType::Table,
            x: 30.0,
            y: 20.0,
            bounds,
        };

        ctx.update(drop.clone());
        assert_eq!(ctx.graph.nodes.len(), 1);

        ctx.update(LineageCommand::LineageEditClick);
        ctx.update(drop);
        let placeholder = ctx.selected_node.clone().unwrap();
        let node = ctx.graph.node(&placeholder).unwrap();
        assert!(node.is_new);
        assert_eq!(node.position, Position { x: 30.0, y: 20.0 });

        ctx.update(LineageCommand::Connect(Connection::nodes("a", &placeholder)));
        assert!(ctx.pending_changes().is_empty());

        let resolve = ctx
            .update(LineageCommand::ResolveNewNode {
                node_id: placeholder.clone(),
                fqn: "svc.db.schema.orders".to_string(),
            })
            .remove(0);
        reply(&mut ctx, resolve, response("orders", &[], &[]));

        assert!(ctx.graph.has_edge("a", "orders"));
        assert_eq!(ctx.selected_node.as_deref(), Some("orders"));
        assert_eq!(
            ctx.pending_changes(),
            vec![PendingChange::AddEdge(edge_details("a", "orders"))]
        );
    }

    #[test]
    fn test_unbound_placeholders_dropped_on_exit() {
        let mut ctx = loaded(response("a", &[], &[]));
        ctx.update(LineageCommand::LineageEditClick);
        ctx.update(LineageCommand::NodeDrop {
            entity_type: EntityType::Topic,
            x: 0.0,
            y: 0.0,
            bounds: Bounds::default(),
        });
        assert_eq!(ctx.graph.nodes.len(), 2);

        let requests = ctx.update(LineageCommand::LineageEditClick);
        assert!(requests.is_empty());
        assert_eq!(node_ids(&ctx), vec!["a"]);
    }

    #[test]
    fn test_edge_pipeline_binding() {
        let mut ctx = loaded(response("a", &["b"], &[("a", "b")]));
        let edge_id = Edge::edge_id("a", "b");
        ctx.update(LineageCommand::LineageEditClick);
        ctx.update(LineageCommand::EdgeClick(EdgeSelection::edge(&edge_id)));
        ctx.update(LineageCommand::AddPipelineClick);
        assert_eq!(ctx.pipeline_edit_target.as_deref(), Some(edge_id.as_str()));

        let request = ctx
            .update(LineageCommand::UpdateEdgePipeline {
                edge_id: edge_id.clone(),
                fqn: "airflow.load_orders".to_string(),
            })
            .remove(0);
        let mut found = EntityLineageResponse::new(LineageEntity::new(
            "pipe-1",
            EntityType::Pipeline,
            "airflow.load_orders",
        ));
        found.entity.reference.display_name = Some("Load orders".to_string());
        reply(&mut ctx, request, found);

        let edge = ctx.graph.edge(&edge_id).unwrap();
        assert_eq!(edge.kind, crate::model::graph::EdgeKind::Pipeline);
        assert!(ctx.pipeline_edit_target.is_none());

        ctx.update(LineageCommand::UpdateEdgePipeline {
            edge_id: edge_id.clone(),
            fqn: String::new(),
        });
        assert!(ctx.graph.edge(&edge_id).unwrap().details.pipeline.is_none());
    }

    #[test]
    fn test_column_edge_remove() {
        let mut lineage = response("a", &["b"], &[("a", "b")]);
        lineage.entity = entity("a").with_columns(&["id"]);
        lineage.nodes = vec![entity("b").with_columns(&["id"])];
        lineage.edges[0].add_column_pair("svc.db.schema.a.id", "svc.db.schema.b.id");
        let mut ctx = loaded(lineage);

        ctx.update(LineageCommand::LineageEditClick);
        ctx.update(LineageCommand::EdgeClick(EdgeSelection {
            edge_id: Edge::edge_id("a", "b"),
            column: Some(("svc.db.schema.a.id".to_string(), "svc.db.schema.b.id".to_string())),
        }));
        assert_eq!(ctx.traced_columns.len(), 2);

        ctx.update(LineageCommand::ColumnEdgeRemove);
        assert!(ctx.graph.edges[0].details.columns.is_empty());
        assert!(ctx.selected_edge.is_none());
        assert!(ctx.traced_columns.is_empty());
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut ctx = LineageContext::new(false);
        ctx.update(LineageCommand::ZoomUpdate(10.0));
        assert_eq!(ctx.zoom_value, MAX_ZOOM);
        assert_eq!(ctx.viewport.zoom, MAX_ZOOM);
    }

    #[test]
    fn test_config_update_applies_to_later_fetches() {
        let mut ctx = loaded(response("a", &[], &[]));
        let config = LineageConfig {
            upstream_depth: 1,
            downstream_depth: 5,
            nodes_per_layer: 10,
        };
        assert!(ctx.update(LineageCommand::LineageConfigUpdate(config)).is_empty());

        let request = ctx.update(LineageCommand::Reload).remove(0);
        match request.kind {
            FetchKind::Lineage { config: sent, .. } => assert_eq!(sent, config),
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_query_filter_triggers_reload() {
        let mut ctx = loaded(response("a", &[], &[]));
        let requests = ctx.update(LineageCommand::QueryFilterUpdate(" owner:data ".to_string()));
        match &requests[0].kind {
            FetchKind::Lineage { query_filter, .. } => {
                assert_eq!(query_filter.as_deref(), Some("owner:data"))
            }
            other => panic!("unexpected request {:?}", other),
        }
        assert!(ctx
            .update(LineageCommand::QueryFilterUpdate("owner:data".to_string()))
            .is_empty());
    }
}
