//! Root application component
//!
//! The App struct implements the Component trait, acting as the root component
//! that delegates event handling and rendering to child components.
//! Lineage state lives in `LineageContext`; the App turns keys and clicks into
//! context commands and hands the resulting fetches to the background runner.

use crate::action::{Action, MoveDirection};
use crate::component::Component;
use crate::components::graph_view::{neighbour, CELL_HEIGHT, CELL_WIDTH};
use crate::components::{
    draw_lineage_screen, ConfigDialog, DrawerComponent, GraphView, HelpDialog, Hit, InputDialog,
    InputPrompt, NodePalette, QuitDialog, ScreenRenderContext,
};
use crate::config::Config;
use crate::model::graph::{Connection, NodeChange, Position};
use crate::model::modal::{Modal, ModalStack};
use crate::model::view::ZOOM_STEP;
use crate::model::{
    EdgeSelection, EntityType, LineageCommand, LineageContext, LineageLayerView, Viewport,
};
use crate::services::{self, Fetcher, LineageApi};
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::{layout::Rect, style::Color, Frame};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// One end of a connection being drawn in edit mode
#[derive(Debug, Clone, PartialEq, Eq)]
struct ConnectEnd {
    node_id: String,
    column: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// App Struct
// ═══════════════════════════════════════════════════════════════════════════════

/// Main application state - coordinates between components
pub struct App {
    /// The lineage view store
    pub context: LineageContext,

    /// Background fetch runner
    fetcher: Fetcher,

    /// Modal overlay stack
    pub modals: ModalStack,

    /// Loaded config, updated when depth settings change
    pub config: Config,

    /// Write depth changes back to the config file
    pub save_settings: bool,

    /// Flag to indicate the app should quit
    pub should_quit: bool,

    /// Status message to display
    pub status_message: Option<String>,

    /// Node that edge and column cycling starts from
    anchor: Option<String>,

    /// First end of a pending connection
    connect_source: Option<ConnectEnd>,

    /// Node being dragged with the mouse
    dragging: Option<String>,

    /// Graph generation the viewport was last fitted to
    fitted_generation: u64,

    // ─────────────────────────────────────────────────────────────────────────
    // Child Components
    // ─────────────────────────────────────────────────────────────────────────
    pub graph_view: GraphView,
    pub drawer: DrawerComponent,
    pub quit_dialog: QuitDialog,
    pub help_dialog: HelpDialog,
    pub config_dialog: ConfigDialog,
    pub node_palette: NodePalette,
    pub input_dialog: InputDialog,
}

// ═══════════════════════════════════════════════════════════════════════════════
// App Implementation
// ═══════════════════════════════════════════════════════════════════════════════

impl App {
    /// Create a new App instance
    pub fn new(api: Arc<dyn LineageApi>, config: Config) -> App {
        App {
            context: LineageContext::new(config.can_edit_lineage),
            fetcher: Fetcher::new(api),
            modals: ModalStack::new(),
            config,
            save_settings: true,
            should_quit: false,
            status_message: None,
            anchor: None,
            connect_source: None,
            dragging: None,
            fitted_generation: 0,
            graph_view: GraphView::new(),
            drawer: DrawerComponent::new(),
            quit_dialog: QuitDialog::default(),
            help_dialog: HelpDialog::default(),
            config_dialog: ConfigDialog,
            node_palette: NodePalette::new(),
            input_dialog: InputDialog,
        }
    }

    /// Start loading the lineage of an entity
    pub fn open(&mut self, fqn: &str, entity_type: EntityType) {
        info!(fqn, %entity_type, "opening lineage");
        self.dispatch(LineageCommand::FetchLineageData {
            fqn: fqn.to_string(),
            entity_type,
            config: self.config.lineage,
        });
    }

    /// Apply a command to the context and start the fetches it asks for
    fn dispatch(&mut self, command: LineageCommand) {
        let requests = self.context.update(command);
        self.fetcher.spawn_all(requests);
    }

    /// Feed finished fetches back into the context
    fn poll_fetches(&mut self) {
        for response in self.fetcher.poll() {
            let follow_up = self.context.handle_response(response);
            self.fetcher.spawn_all(follow_up);
        }

        let generation = self.context.generation();
        let canvas = self.graph_view.canvas;
        if generation != self.fitted_generation && canvas.width > 0 && canvas.height > 0 {
            self.fitted_generation = generation;
            self.anchor = None;
            self.connect_source = None;
            let viewport = self.graph_view.fit(&self.context.graph);
            self.dispatch(LineageCommand::InitViewport(viewport));
        }
    }

    fn has_message(&self) -> bool {
        self.context.last_error.is_some()
            || self.context.notice.is_some()
            || self.status_message.is_some()
            || self.connect_source.is_some()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Selection
    // ─────────────────────────────────────────────────────────────────────────

    /// Track the node the selection belongs to
    fn remember_anchor(&mut self) {
        let ctx = &self.context;
        let anchor = ctx.selected_node.clone().or_else(|| {
            ctx.selected_column
                .as_deref()
                .and_then(|c| ctx.graph.column_owner(c))
                .map(|n| n.id.clone())
        });
        if anchor.is_some() {
            self.anchor = anchor;
        }
        if self
            .anchor
            .as_deref()
            .is_some_and(|id| !self.context.graph.contains_node(id))
        {
            self.anchor = None;
        }
    }

    fn select_node(&mut self, id: String) {
        self.anchor = Some(id.clone());
        self.dispatch(LineageCommand::NodesChange(vec![NodeChange::Select {
            id: id.clone(),
            selected: true,
        }]));
        self.reveal(&id);
    }

    /// Pan so that a node off the canvas comes into view
    fn reveal(&mut self, id: &str) {
        let Some(position) = self.context.graph.node(id).map(|n| n.position) else {
            return;
        };
        let bounds = self.graph_view.bounds();
        if bounds.width <= 0.0 || bounds.height <= 0.0 {
            return;
        }
        let viewport = self.context.viewport;
        let x = position.x * viewport.zoom + viewport.x;
        let y = position.y * viewport.zoom + viewport.y;
        let margin_x = 4.0 * CELL_WIDTH;
        let margin_y = CELL_HEIGHT;
        if x >= margin_x && x <= bounds.width - margin_x && y >= margin_y && y <= bounds.height - margin_y {
            return;
        }
        self.dispatch(LineageCommand::InitViewport(Viewport {
            x: bounds.width / 2.0 - position.x * viewport.zoom,
            y: bounds.height / 2.0 - position.y * viewport.zoom,
            zoom: viewport.zoom,
        }));
    }

    fn select_neighbour(&mut self, direction: MoveDirection) {
        let from = self
            .context
            .selected_node
            .clone()
            .or_else(|| self.anchor.clone());
        let next = match from {
            Some(from) => neighbour(&self.context.graph, &from, direction),
            None => self.context.root_id.clone(),
        };
        if let Some(id) = next {
            self.select_node(id);
        }
    }

    fn next_edge(&mut self) {
        let Some(anchor) = self.anchor.clone() else {
            self.status_message = Some("Select a node first".to_string());
            return;
        };
        let edges: Vec<String> = self
            .context
            .graph
            .edges
            .iter()
            .filter(|e| e.touches(&anchor))
            .map(|e| e.id.clone())
            .collect();
        if edges.is_empty() {
            self.status_message = Some("No edges on this node".to_string());
            return;
        }
        let current = self
            .context
            .selected_edge
            .as_ref()
            .and_then(|s| edges.iter().position(|id| *id == s.edge_id));
        let next = current.map_or(0, |i| (i + 1) % edges.len());
        self.dispatch(LineageCommand::EdgeClick(EdgeSelection::edge(&edges[next])));
    }

    fn next_column(&mut self) {
        if self.context.active_layer != LineageLayerView::Column {
            self.dispatch(LineageCommand::UpdateLayerView(LineageLayerView::Column));
        }

        // Column sub-edges of the selected edge
        if let Some(selection) = self.context.selected_edge.clone() {
            let pairs = self
                .context
                .graph
                .edge(&selection.edge_id)
                .map(|e| e.details.column_pairs())
                .unwrap_or_default();
            if pairs.is_empty() {
                self.status_message = Some("This edge has no column lineage".to_string());
                return;
            }
            let current = selection
                .column
                .as_ref()
                .and_then(|c| pairs.iter().position(|p| p == c));
            let next = current.map_or(0, |i| (i + 1) % pairs.len());
            self.dispatch(LineageCommand::EdgeClick(EdgeSelection {
                edge_id: selection.edge_id,
                column: Some(pairs[next].clone()),
            }));
            return;
        }

        // Columns of the anchor node
        let Some(anchor) = self.anchor.clone() else {
            self.status_message = Some("Select a node first".to_string());
            return;
        };
        let columns: Vec<String> = self
            .context
            .graph
            .node(&anchor)
            .map(|n| {
                n.entity
                    .columns
                    .iter()
                    .map(|c| c.fully_qualified_name.clone())
                    .collect()
            })
            .unwrap_or_default();
        if columns.is_empty() {
            self.status_message = Some("This entity has no columns".to_string());
            return;
        }
        let current = self
            .context
            .selected_column
            .as_ref()
            .and_then(|c| columns.iter().position(|col| col == c));
        let next = current.map_or(0, |i| (i + 1) % columns.len());
        self.dispatch(LineageCommand::ColumnClick(columns[next].clone()));
    }

    fn open_drawer(&mut self) {
        let command = if let Some(id) = self.context.selected_node.clone() {
            LineageCommand::NodeClick(id)
        } else if let Some(selection) = self.context.selected_edge.clone() {
            LineageCommand::EdgeClick(selection)
        } else if let Some(root) = self.context.root_id.clone() {
            LineageCommand::NodeClick(root)
        } else {
            return;
        };
        self.dispatch(command);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Viewport
    // ─────────────────────────────────────────────────────────────────────────

    /// Zoom around the centre of the canvas
    fn zoom_by(&mut self, delta: f64) {
        let before = self.context.viewport;
        self.dispatch(LineageCommand::ZoomUpdate(self.context.zoom_value + delta));
        let zoom = self.context.zoom_value;

        let bounds = self.graph_view.bounds();
        let (cx, cy) = (bounds.width / 2.0, bounds.height / 2.0);
        let old_zoom = if before.zoom > 0.0 { before.zoom } else { 1.0 };
        let gx = (cx - before.x) / old_zoom;
        let gy = (cy - before.y) / old_zoom;
        self.dispatch(LineageCommand::InitViewport(Viewport {
            x: cx - gx * zoom,
            y: cy - gy * zoom,
            zoom,
        }));
    }

    fn pan(&mut self, dx: i16, dy: i16) {
        let viewport = self.context.viewport;
        self.dispatch(LineageCommand::InitViewport(Viewport {
            x: viewport.x + dx as f64 * CELL_WIDTH,
            y: viewport.y + dy as f64 * CELL_HEIGHT,
            zoom: viewport.zoom,
        }));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Editing
    // ─────────────────────────────────────────────────────────────────────────

    fn require_edit_mode(&mut self, what: &str) -> bool {
        if !self.context.is_edit_mode {
            self.status_message = Some(format!("Press E to enter edit mode to {}", what));
        }
        self.context.is_edit_mode
    }

    fn move_node(&mut self, dx: i16, dy: i16) {
        if !self.require_edit_mode("move nodes") {
            return;
        }
        let Some(node) = self.context.selected_node() else {
            return;
        };
        let zoom = self.context.viewport.zoom.max(f64::EPSILON);
        let change = NodeChange::Position {
            id: node.id.clone(),
            position: Position {
                x: node.position.x + dx as f64 * CELL_WIDTH / zoom,
                y: node.position.y + dy as f64 * CELL_HEIGHT / zoom,
            },
        };
        self.dispatch(LineageCommand::NodesChange(vec![change]));
    }

    fn selected_end(&self) -> Option<ConnectEnd> {
        let ctx = &self.context;
        if let Some(column) = &ctx.selected_column {
            let owner = ctx.graph.column_owner(column)?;
            return Some(ConnectEnd {
                node_id: owner.id.clone(),
                column: Some(column.clone()),
            });
        }
        ctx.selected_node.as_ref().map(|id| ConnectEnd {
            node_id: id.clone(),
            column: None,
        })
    }

    /// First press marks the source, the second connects it to the selection
    fn mark_connection(&mut self) {
        if !self.require_edit_mode("connect entities") {
            return;
        }
        let Some(end) = self.selected_end() else {
            self.status_message = Some("Select a node or column to connect".to_string());
            return;
        };

        match self.connect_source.take() {
            None => {
                self.status_message = None;
                self.connect_source = Some(end);
            }
            Some(source) if source == end => {
                self.status_message = Some("Connection cancelled".to_string());
            }
            Some(source) => {
                let connection = match (&source.column, &end.column) {
                    (Some(from), Some(to)) => {
                        Connection::columns(&source.node_id, from, &end.node_id, to)
                    }
                    _ => Connection::nodes(&source.node_id, &end.node_id),
                };
                self.dispatch(LineageCommand::Connect(connection));
            }
        }
    }

    fn remove_selected(&mut self) {
        if self.context.selected_edge.is_some() {
            self.dispatch(LineageCommand::ColumnEdgeRemove);
        } else if let Some(id) = self.context.selected_node.clone() {
            if self.require_edit_mode("remove nodes") {
                self.dispatch(LineageCommand::RemoveNode(id));
            }
        } else {
            self.status_message = Some("Nothing selected to remove".to_string());
        }
    }

    fn export_csv(&mut self) {
        if self.context.graph.edges.is_empty() {
            self.status_message = Some("No edges to export".to_string());
            return;
        }
        let name: String = self
            .context
            .entity_fqn
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let path = PathBuf::from(format!("{}.lineage.csv", name));
        match services::export_edges(&self.context.graph, &path) {
            Ok(rows) => {
                self.status_message = Some(format!("Exported {} rows to {}", rows, path.display()))
            }
            Err(err) => {
                warn!(error = %err, "export failed");
                self.status_message = Some(format!("Export failed: {}", err));
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Modals
    // ─────────────────────────────────────────────────────────────────────────

    fn open_pipeline_input(&mut self) {
        self.dispatch(LineageCommand::AddPipelineClick);
        let Some(edge_id) = self.context.pipeline_edit_target.clone() else {
            return;
        };
        let input = self
            .context
            .graph
            .edge(&edge_id)
            .and_then(|e| e.details.pipeline.as_ref())
            .map(|p| p.fully_qualified_name.clone())
            .unwrap_or_default();
        self.modals.push(Modal::PipelineInput { edge_id, input });
    }

    fn open_entity_search(&mut self) {
        match self.context.selected_node() {
            Some(node) if node.is_new => {
                let node_id = node.id.clone();
                self.modals.push(Modal::EntitySearch {
                    node_id,
                    input: String::new(),
                });
            }
            _ => {
                self.status_message =
                    Some("Select a new node to bind it to an entity".to_string())
            }
        }
    }

    fn confirm_modal(&mut self) {
        let Some(modal) = self.modals.pop() else {
            return;
        };
        match modal {
            Modal::QuitConfirm => self.should_quit = true,
            Modal::Help => {}
            Modal::LineageConfig { draft, .. } => {
                if draft == self.context.lineage_config {
                    return;
                }
                self.dispatch(LineageCommand::LineageConfigUpdate(draft));
                self.dispatch(LineageCommand::Reload);
                self.config.lineage = draft;
                if self.save_settings {
                    if let Err(err) = self.config.save() {
                        warn!(error = %err, "could not save lineage settings");
                    }
                }
            }
            Modal::NodePalette { selected_index } => {
                let entity_type = NodePalette::entity_type_at(selected_index);
                let (x, y) = self.graph_view.centre();
                self.dispatch(LineageCommand::NodeDrop {
                    entity_type,
                    x,
                    y,
                    bounds: self.graph_view.bounds(),
                });
                if let Some(node) = self.context.selected_node().filter(|n| n.is_new) {
                    let node_id = node.id.clone();
                    self.anchor = Some(node_id.clone());
                    self.modals.push(Modal::EntitySearch {
                        node_id,
                        input: String::new(),
                    });
                }
            }
            Modal::EntitySearch { node_id, input } => {
                let fqn = input.trim();
                if fqn.is_empty() {
                    self.status_message = Some("An entity FQN is required".to_string());
                    return;
                }
                self.dispatch(LineageCommand::ResolveNewNode {
                    node_id,
                    fqn: fqn.to_string(),
                });
            }
            Modal::PipelineInput { edge_id, input } => {
                self.dispatch(LineageCommand::UpdateEdgePipeline {
                    edge_id,
                    fqn: input.trim().to_string(),
                });
            }
            Modal::QueryFilter { input } => {
                self.dispatch(LineageCommand::QueryFilterUpdate(input));
            }
        }
    }

    fn modal_step(&mut self, forward: bool) {
        match self.modals.top_mut() {
            Some(Modal::LineageConfig { field, .. }) => {
                *field = if forward { field.next() } else { field.prev() };
            }
            Some(Modal::NodePalette { selected_index }) => {
                let len = NodePalette::len();
                *selected_index = if forward {
                    (*selected_index + 1) % len
                } else {
                    (*selected_index + len - 1) % len
                };
            }
            _ => {}
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Component Implementation
// ═══════════════════════════════════════════════════════════════════════════════

impl Component for App {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Ok(Some(Action::ForceQuit));
        }

        if let Some(modal) = self.modals.top().cloned() {
            return self.handle_modal_key_event(&modal, key);
        }

        if key.code == KeyCode::Esc && self.has_message() {
            return Ok(Some(Action::DismissMessage));
        }

        self.graph_view.handle_key_event(key)
    }

    fn handle_mouse_event(&mut self, mouse: MouseEvent) -> Result<Option<Action>> {
        if !self.modals.is_empty() {
            return Ok(None);
        }
        let (column, row) = (mouse.column, mouse.row);

        let action = match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if !self.graph_view.contains_cell(column, row) {
                    return Ok(None);
                }
                let command = match self.graph_view.hit(column, row) {
                    Some(Hit::Node(id)) => {
                        if self.context.is_edit_mode {
                            self.dragging = Some(id.clone());
                        }
                        LineageCommand::NodeClick(id)
                    }
                    Some(Hit::Column(fqn)) => LineageCommand::ColumnClick(fqn),
                    None => LineageCommand::PaneClick,
                };
                Some(Action::Lineage(command))
            }
            MouseEventKind::Drag(MouseButton::Left) => self.dragging.clone().map(|id| {
                let (x, y) = self.graph_view.cell_point(column, row);
                let position = self
                    .context
                    .viewport
                    .project(x, y, self.graph_view.bounds());
                Action::Lineage(LineageCommand::NodesChange(vec![NodeChange::Position {
                    id,
                    position,
                }]))
            }),
            MouseEventKind::Up(MouseButton::Left) => {
                self.dragging = None;
                None
            }
            MouseEventKind::ScrollUp if self.graph_view.contains_cell(column, row) => {
                Some(Action::ZoomIn)
            }
            MouseEventKind::ScrollDown if self.graph_view.contains_cell(column, row) => {
                Some(Action::ZoomOut)
            }
            _ => None,
        };
        Ok(action)
    }

    fn update(&mut self, action: Action) -> Result<Option<Action>> {
        self.remember_anchor();

        match action {
            // ─────────────────────────────────────────────────────────────────
            // App Lifecycle
            // ─────────────────────────────────────────────────────────────────
            Action::Tick => self.poll_fetches(),
            Action::ForceQuit => self.should_quit = true,
            Action::Resize(_, _) => {}

            Action::Lineage(command) => self.dispatch(command),

            // ─────────────────────────────────────────────────────────────────
            // Navigation
            // ─────────────────────────────────────────────────────────────────
            Action::SelectNeighbour(direction) => self.select_neighbour(direction),
            Action::SelectRoot => {
                if let Some(root) = self.context.root_id.clone() {
                    self.select_node(root);
                }
            }
            Action::NextEdge => self.next_edge(),
            Action::NextColumn => self.next_column(),
            Action::OpenDrawer => self.open_drawer(),
            Action::Expand(direction) => match self.context.selected_node.clone() {
                Some(node_id) => self.dispatch(LineageCommand::LoadChildNodes { node_id, direction }),
                None => self.status_message = Some("Select a node to expand".to_string()),
            },
            Action::Collapse(direction) => match self.context.selected_node.clone() {
                Some(node_id) => self.dispatch(LineageCommand::CollapseNode { node_id, direction }),
                None => self.status_message = Some("Select a node to collapse".to_string()),
            },

            // ─────────────────────────────────────────────────────────────────
            // Viewport
            // ─────────────────────────────────────────────────────────────────
            Action::ZoomIn => self.zoom_by(ZOOM_STEP),
            Action::ZoomOut => self.zoom_by(-ZOOM_STEP),
            Action::Pan(dx, dy) => self.pan(dx, dy),
            Action::FitView => {
                let viewport = self.graph_view.fit(&self.context.graph);
                self.dispatch(LineageCommand::InitViewport(viewport));
            }

            // ─────────────────────────────────────────────────────────────────
            // Scrolling (delegate to DrawerComponent)
            // ─────────────────────────────────────────────────────────────────
            Action::ScrollUp | Action::ScrollDown | Action::PageUp | Action::PageDown => {
                self.drawer.update(action)?;
            }

            // ─────────────────────────────────────────────────────────────────
            // Editing
            // ─────────────────────────────────────────────────────────────────
            Action::ToggleEditMode => {
                let leaving = self.context.is_edit_mode;
                self.dispatch(LineageCommand::LineageEditClick);
                if leaving {
                    self.connect_source = None;
                    self.dragging = None;
                } else if !self.context.can_edit_lineage {
                    self.status_message =
                        Some("Read-only: edits will be discarded on save".to_string());
                }
            }
            Action::MoveNode(dx, dy) => self.move_node(dx, dy),
            Action::MarkConnection => self.mark_connection(),
            Action::RemoveSelected => self.remove_selected(),

            // ─────────────────────────────────────────────────────────────────
            // Modals
            // ─────────────────────────────────────────────────────────────────
            Action::OpenQuitDialog => {
                self.quit_dialog.set_pending(&self.context.pending_changes());
                self.modals.push(Modal::QuitConfirm);
            }
            Action::OpenHelp => {
                self.help_dialog.scroll_offset = 0;
                self.help_dialog.can_edit_lineage = self.context.can_edit_lineage;
                self.modals.push(Modal::Help);
            }
            Action::OpenConfigDialog => {
                self.modals.push(Modal::LineageConfig {
                    draft: self.context.lineage_config,
                    field: Default::default(),
                });
            }
            Action::OpenNodePalette => {
                if self.require_edit_mode("add entities") {
                    self.modals.push(Modal::NodePalette { selected_index: 0 });
                }
            }
            Action::OpenEntitySearch => self.open_entity_search(),
            Action::OpenPipelineInput => self.open_pipeline_input(),
            Action::OpenQueryFilter => {
                self.modals.push(Modal::QueryFilter {
                    input: self.context.query_filter.clone(),
                });
            }
            Action::CloseModal => {
                self.modals.pop();
            }
            Action::ConfirmModal => self.confirm_modal(),
            Action::ModalUp => self.modal_step(false),
            Action::ModalDown => self.modal_step(true),
            Action::ModalAdjust(delta) => {
                if let Some(Modal::LineageConfig { draft, field }) = self.modals.top_mut() {
                    field.adjust(draft, delta);
                }
            }
            Action::ModalInput(c) => {
                if let Some(buffer) = self.modals.top_mut().and_then(Modal::input_mut) {
                    buffer.push(c);
                }
            }
            Action::ModalBackspace => {
                if let Some(buffer) = self.modals.top_mut().and_then(Modal::input_mut) {
                    buffer.pop();
                }
            }

            // ─────────────────────────────────────────────────────────────────
            // Other
            // ─────────────────────────────────────────────────────────────────
            Action::CycleLayer => {
                let next = self.context.active_layer.next();
                self.dispatch(LineageCommand::UpdateLayerView(next));
            }
            Action::ExportCsv => self.export_csv(),
            Action::DismissMessage => {
                self.context.dismiss_messages();
                self.status_message = None;
                self.connect_source = None;
            }
        }

        Ok(None)
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()> {
        let source = self.fetcher.describe();
        let marked = self.connect_source.as_ref().map(|c| c.node_id.clone());
        let connect_label = self.connect_source.as_ref().map(|end| {
            let node = self
                .context
                .graph
                .node(&end.node_id)
                .map(|n| n.label())
                .unwrap_or_else(|| end.node_id.clone());
            match &end.column {
                Some(column) => format!("{}.{}", node, column.rsplit('.').next().unwrap_or(column.as_str())),
                None => node,
            }
        });

        let ctx = ScreenRenderContext {
            lineage: &self.context,
            source: &source,
            status_message: self.status_message.as_deref(),
            connect_source: connect_label.as_deref(),
            in_flight: self.fetcher.in_flight(),
        };

        draw_lineage_screen(
            frame,
            area,
            &mut self.graph_view,
            &mut self.drawer,
            &ctx,
            marked.as_deref(),
        )?;

        // Draw modal overlay if active
        if let Some(modal) = self.modals.top().cloned() {
            self.draw_modal(frame, area, &modal)?;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Helper Methods
// ═══════════════════════════════════════════════════════════════════════════════

impl App {
    fn handle_modal_key_event(&mut self, modal: &Modal, key: KeyEvent) -> Result<Option<Action>> {
        match modal {
            Modal::QuitConfirm => self.quit_dialog.handle_key_event(key),
            Modal::Help => self.help_dialog.handle_key_event(key),
            Modal::LineageConfig { .. } => self.config_dialog.handle_key_event(key),
            Modal::NodePalette { .. } => self.node_palette.handle_key_event(key),
            Modal::EntitySearch { .. } | Modal::PipelineInput { .. } | Modal::QueryFilter { .. } => {
                self.input_dialog.handle_key_event(key)
            }
        }
    }

    fn draw_modal(&mut self, frame: &mut Frame, area: Rect, modal: &Modal) -> Result<()> {
        match modal {
            Modal::QuitConfirm => self.quit_dialog.draw(frame, area)?,
            Modal::Help => self.help_dialog.draw(frame, area)?,
            Modal::LineageConfig { draft, field } => {
                self.config_dialog.draw_with_draft(frame, area, draft, *field)?;
            }
            Modal::NodePalette { selected_index } => {
                self.node_palette.draw_with_selection(frame, area, *selected_index)?;
            }
            Modal::EntitySearch { node_id, input } => {
                let entity_type = self
                    .context
                    .graph
                    .node(node_id)
                    .map(|n| n.entity.entity_type().label())
                    .unwrap_or("entity");
                let prompt = format!("Fully qualified name of the {}:", entity_type);
                self.input_dialog.draw_with_input(
                    frame,
                    area,
                    &InputPrompt {
                        title: "Bind Entity",
                        prompt: &prompt,
                        hint: "e.g. warehouse.analytics.public.orders",
                        confirm_label: "Bind",
                        color: Color::Magenta,
                    },
                    input,
                )?;
            }
            Modal::PipelineInput { input, .. } => {
                self.input_dialog.draw_with_input(
                    frame,
                    area,
                    &InputPrompt {
                        title: "Edge Pipeline",
                        prompt: "Fully qualified name of the pipeline:",
                        hint: "Leave empty to remove the pipeline",
                        confirm_label: "Save",
                        color: Color::Blue,
                    },
                    input,
                )?;
            }
            Modal::QueryFilter { input } => {
                self.input_dialog.draw_with_input(
                    frame,
                    area,
                    &InputPrompt {
                        title: "Filter Lineage",
                        prompt: "Only fetch entities matching:",
                        hint: "Leave empty to clear the filter",
                        confirm_label: "Apply",
                        color: Color::Yellow,
                    },
                    input,
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::entity::{EdgeDetails, LineageEntity};
    use crate::services::catalog::CatalogSnapshot;
    use crate::services::CatalogApi;
    use std::time::Duration;
    use tempfile::TempDir;

    fn table(id: &str) -> LineageEntity {
        LineageEntity::new(id, EntityType::Table, &format!("wh.{}", id))
    }

    /// src -> orders -> report, orders -> audit
    fn app() -> (App, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let entities: Vec<LineageEntity> = ["src", "orders", "report", "audit"]
            .iter()
            .map(|id| table(id))
            .collect();
        let edge = |from: &str, to: &str| EdgeDetails::between(&table(from), &table(to));
        let snapshot = CatalogSnapshot {
            entities,
            edges: vec![
                edge("src", "orders"),
                edge("orders", "report"),
                edge("orders", "audit"),
            ],
            ..Default::default()
        };
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, serde_json::to_string(&snapshot).unwrap()).unwrap();

        let api = Arc::new(CatalogApi::open(&path).unwrap());
        let mut app = App::new(api, Config::default());
        app.save_settings = false;
        app.graph_view.canvas = Rect::new(0, 1, 120, 40);
        app.open("wh.orders", EntityType::Table);
        settle(&mut app);
        (app, dir)
    }

    /// Tick until every fetch has come back
    fn settle(app: &mut App) {
        for _ in 0..400 {
            app.update(Action::Tick).unwrap();
            if app.fetcher.in_flight() == 0 {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("fetches did not finish");
    }

    fn press(app: &mut App, code: KeyCode) {
        let mut action = app.handle_key_event(KeyEvent::from(code)).unwrap();
        while let Some(a) = action {
            action = app.update(a).unwrap();
        }
    }

    #[test]
    fn test_open_loads_and_fits_the_graph() {
        let (app, _dir) = app();
        assert_eq!(app.context.graph.nodes.len(), 4);
        assert_eq!(app.context.root_id.as_deref(), Some("orders"));
        assert_eq!(app.fitted_generation, app.context.generation());
    }

    #[test]
    fn test_keyboard_navigation_selects_neighbours() {
        let (mut app, _dir) = app();
        press(&mut app, KeyCode::Char('g'));
        assert_eq!(app.context.selected_node.as_deref(), Some("orders"));

        press(&mut app, KeyCode::Char('h'));
        assert_eq!(app.context.selected_node.as_deref(), Some("src"));

        press(&mut app, KeyCode::Char('l'));
        assert_eq!(app.context.selected_node.as_deref(), Some("orders"));
    }

    #[test]
    fn test_tab_cycles_edges_of_the_selected_node() {
        let (mut app, _dir) = app();
        press(&mut app, KeyCode::Char('g'));

        let mut seen = Vec::new();
        for _ in 0..3 {
            press(&mut app, KeyCode::Tab);
            let selection = app.context.selected_edge.clone().unwrap();
            seen.push(selection.edge_id);
        }
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 3);

        press(&mut app, KeyCode::Tab);
        assert!(app.context.selected_edge.is_some());
        assert!(app.context.is_drawer_open);
    }

    #[test]
    fn test_remove_node_requires_edit_mode() {
        let (mut app, _dir) = app();
        app.update(Action::Lineage(LineageCommand::NodeClick("audit".to_string())))
            .unwrap();
        press(&mut app, KeyCode::Char('x'));
        assert!(app.context.graph.contains_node("audit"));
        assert!(app.status_message.is_some());

        press(&mut app, KeyCode::Char('E'));
        app.update(Action::Lineage(LineageCommand::NodeClick("audit".to_string())))
            .unwrap();
        press(&mut app, KeyCode::Char('x'));
        assert!(!app.context.graph.contains_node("audit"));
        assert_eq!(app.context.pending_changes().len(), 1);
    }

    #[test]
    fn test_mark_connection_connects_two_nodes() {
        let (mut app, _dir) = app();
        press(&mut app, KeyCode::Char('E'));

        app.update(Action::Lineage(LineageCommand::NodeClick("src".to_string())))
            .unwrap();
        press(&mut app, KeyCode::Char('m'));
        assert!(app.connect_source.is_some());

        app.update(Action::Lineage(LineageCommand::NodeClick("report".to_string())))
            .unwrap();
        press(&mut app, KeyCode::Char('m'));
        assert!(app.connect_source.is_none());
        assert!(app.context.graph.has_edge("src", "report"));
    }

    #[test]
    fn test_query_filter_is_typed_and_applied() {
        let (mut app, _dir) = app();
        press(&mut app, KeyCode::Char('/'));
        for c in "report".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press(&mut app, KeyCode::Enter);
        assert!(app.modals.is_empty());
        assert_eq!(app.context.query_filter, "report");

        settle(&mut app);
        assert!(!app.context.graph.contains_node("src"));
        assert!(app.context.graph.contains_node("report"));
    }

    #[test]
    fn test_config_dialog_changes_depth_and_reloads() {
        let (mut app, _dir) = app();
        press(&mut app, KeyCode::Char('o'));
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Left);
        press(&mut app, KeyCode::Left);
        press(&mut app, KeyCode::Left);
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.context.lineage_config.downstream_depth, 0);
        assert_eq!(app.config.lineage.downstream_depth, 0);
        settle(&mut app);
        assert!(!app.context.graph.contains_node("report"));
        assert!(app.context.graph.contains_node("src"));
    }

    #[test]
    fn test_quit_dialog_counts_pending_changes() {
        let (mut app, _dir) = app();
        press(&mut app, KeyCode::Char('E'));
        app.update(Action::Lineage(LineageCommand::NodeClick("report".to_string())))
            .unwrap();
        press(&mut app, KeyCode::Char('x'));

        press(&mut app, KeyCode::Char('q'));
        assert_eq!(app.modals.top(), Some(&Modal::QuitConfirm));
        assert_eq!(app.quit_dialog.pending.len(), 1);
        assert!(app.quit_dialog.pending[0].starts_with('-'));

        press(&mut app, KeyCode::Char('y'));
        assert!(app.should_quit);
    }

    #[test]
    fn test_escape_dismisses_messages_before_clearing_selection() {
        let (mut app, _dir) = app();
        press(&mut app, KeyCode::Char('g'));
        press(&mut app, KeyCode::Char('m'));
        assert!(app.status_message.is_some());

        press(&mut app, KeyCode::Esc);
        assert!(app.status_message.is_none());
        assert_eq!(app.context.selected_node.as_deref(), Some("orders"));

        press(&mut app, KeyCode::Esc);
        assert!(app.context.selected_node.is_none());
    }
}
