//! Lineage canvas
//!
//! Node positions are projected through the context viewport into terminal
//! cells. Edges go on a braille canvas underneath the node labels.

use crate::action::{Action, MoveDirection};
use crate::component::Component;
use crate::model::context::LineageContext;
use crate::model::entity::StatusType;
use crate::model::graph::{Edge, EdgeKind, LineageGraph, Node};
use crate::model::view::{Bounds, LineageLayerView, LoadingState, Viewport};
use crate::model::{EdgeDirection, LineageCommand};
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Line as CanvasLine},
        Block, Borders, Paragraph,
    },
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Screen units per terminal column
pub const CELL_WIDTH: f64 = 10.0;
/// Screen units per terminal row
pub const CELL_HEIGHT: f64 = 20.0;

const MAX_LABEL_WIDTH: usize = 24;
const FIT_PADDING: f64 = 150.0;

// ═══════════════════════════════════════════════════════════════════════════════
// Placement
// ═══════════════════════════════════════════════════════════════════════════════

/// A node as drawn, in cells relative to the canvas origin
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedNode {
    pub id: String,
    /// Leftmost cell of the label
    pub col: i32,
    pub row: i32,
    pub width: i32,
    /// Column FQNs listed under the label, one per row
    pub columns: Vec<String>,
}

impl PlacedNode {
    fn contains(&self, col: i32, row: i32) -> bool {
        row == self.row && col >= self.col && col < self.col + self.width
    }

    fn column_at(&self, col: i32, row: i32) -> Option<&str> {
        let index = row - self.row - 1;
        if index < 0 || col < self.col || col >= self.col + self.width.max(MAX_LABEL_WIDTH as i32) {
            return None;
        }
        self.columns.get(index as usize).map(String::as_str)
    }

    fn column_row(&self, column: &str) -> Option<i32> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.row + 1 + i as i32)
    }
}

/// What a click on the canvas landed on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hit {
    Node(String),
    Column(String),
}

/// Screen rectangle of a canvas area, in screen units
pub fn bounds_of(area: Rect) -> Bounds {
    Bounds {
        left: area.x as f64 * CELL_WIDTH,
        top: area.y as f64 * CELL_HEIGHT,
        width: area.width as f64 * CELL_WIDTH,
        height: area.height as f64 * CELL_HEIGHT,
    }
}

/// Cut `text` to `max` display cells, marking the cut with an ellipsis
pub fn truncate(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > max {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

fn node_label(node: &Node) -> String {
    format!(
        " {} {} ",
        node.entity.entity_type().icon(),
        truncate(&node.label(), MAX_LABEL_WIDTH)
    )
}

/// Lay out every node of the context in canvas cells
pub fn place(ctx: &LineageContext) -> Vec<PlacedNode> {
    let viewport = ctx.viewport;
    let show_columns = ctx.active_layer == LineageLayerView::Column;

    ctx.graph
        .nodes
        .iter()
        .map(|node| {
            let width = node_label(node).width() as i32;
            let x = (node.position.x * viewport.zoom + viewport.x) / CELL_WIDTH;
            let y = (node.position.y * viewport.zoom + viewport.y) / CELL_HEIGHT;
            let columns = if show_columns {
                node.entity
                    .columns
                    .iter()
                    .map(|c| c.fully_qualified_name.clone())
                    .collect()
            } else {
                Vec::new()
            };
            PlacedNode {
                id: node.id.clone(),
                col: x.round() as i32 - width / 2,
                row: y.round() as i32,
                width,
                columns,
            }
        })
        .collect()
}

/// Nearest node from `from` in a screen direction
pub fn neighbour(graph: &LineageGraph, from: &str, direction: MoveDirection) -> Option<String> {
    let origin = graph.node(from)?.position;
    graph
        .nodes
        .iter()
        .filter(|n| n.id != from)
        .filter_map(|n| {
            let dx = n.position.x - origin.x;
            let dy = n.position.y - origin.y;
            let (ahead, across) = match direction {
                MoveDirection::Up => (-dy, dx),
                MoveDirection::Down => (dy, dx),
                MoveDirection::Left => (-dx, dy),
                MoveDirection::Right => (dx, dy),
            };
            (ahead > f64::EPSILON).then(|| (ahead + 2.0 * across.abs(), n.id.as_str()))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, id)| id.to_string())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Graph View
// ═══════════════════════════════════════════════════════════════════════════════

/// The lineage canvas
#[derive(Default)]
pub struct GraphView {
    /// Canvas area of the last draw
    pub canvas: Rect,
    placed: Vec<PlacedNode>,
}

impl GraphView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bounds(&self) -> Bounds {
        bounds_of(self.canvas)
    }

    /// Viewport showing the whole graph in the last drawn canvas
    pub fn fit(&self, graph: &LineageGraph) -> Viewport {
        Viewport::fit(&graph.nodes, self.bounds(), FIT_PADDING)
    }

    /// Centre of the canvas in screen units
    pub fn centre(&self) -> (f64, f64) {
        let bounds = self.bounds();
        (
            bounds.left + bounds.width / 2.0,
            bounds.top + bounds.height / 2.0,
        )
    }

    /// Screen point of a terminal cell
    pub fn cell_point(&self, column: u16, row: u16) -> (f64, f64) {
        (column as f64 * CELL_WIDTH, row as f64 * CELL_HEIGHT)
    }

    pub fn contains_cell(&self, column: u16, row: u16) -> bool {
        column >= self.canvas.x
            && column < self.canvas.x + self.canvas.width
            && row >= self.canvas.y
            && row < self.canvas.y + self.canvas.height
    }

    /// Re-place nodes without drawing
    pub fn refresh(&mut self, ctx: &LineageContext) {
        self.placed = place(ctx);
    }

    pub fn hit(&self, column: u16, row: u16) -> Option<Hit> {
        if !self.contains_cell(column, row) {
            return None;
        }
        let col = (column - self.canvas.x) as i32;
        let row = (row - self.canvas.y) as i32;

        for placed in &self.placed {
            if placed.contains(col, row) {
                return Some(Hit::Node(placed.id.clone()));
            }
            if let Some(column) = placed.column_at(col, row) {
                return Some(Hit::Column(column.to_string()));
            }
        }
        None
    }

    pub fn draw_graph(
        &mut self,
        frame: &mut Frame,
        area: Rect,
        ctx: &LineageContext,
        marked: Option<&str>,
    ) -> Result<()> {
        let title = format!(
            " {} · {} ",
            ctx.graph
                .root()
                .map(|n| n.label())
                .unwrap_or_else(|| ctx.entity_fqn.clone()),
            ctx.active_layer.name()
        );
        let border_color = if ctx.is_edit_mode {
            Color::Magenta
        } else {
            Color::DarkGray
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(border_color));
        let canvas_area = block.inner(area);
        frame.render_widget(block, area);

        self.canvas = canvas_area;
        self.refresh(ctx);

        if ctx.graph.nodes.is_empty() || canvas_area.width < 2 || canvas_area.height < 2 {
            let message = match ctx.status {
                _ if ctx.loading => "Loading lineage…",
                LoadingState::Failed => "Lineage could not be loaded",
                _ if !ctx.init => "No entity selected",
                _ => "No lineage found",
            };
            let paragraph = Paragraph::new(Line::from(Span::styled(
                message,
                Style::default().fg(Color::DarkGray),
            )))
            .alignment(Alignment::Center);
            frame.render_widget(paragraph, canvas_area);
            return Ok(());
        }

        let x_max = (canvas_area.width - 1) as f64 * CELL_WIDTH;
        let y_max = (canvas_area.height - 1) as f64 * CELL_HEIGHT;
        let (segments, labels) = self.scene(ctx, marked, y_max);

        let canvas = Canvas::default()
            .marker(Marker::Braille)
            .x_bounds([0.0, x_max])
            .y_bounds([0.0, y_max])
            .paint(move |painter| {
                for segment in &segments {
                    painter.draw(segment);
                }
                painter.layer();
                for (x, y, line) in &labels {
                    painter.print(*x, *y, line.clone());
                }
            });
        frame.render_widget(canvas, canvas_area);
        Ok(())
    }

    /// Edge segments and labels in canvas coordinates
    fn scene(
        &self,
        ctx: &LineageContext,
        marked: Option<&str>,
        y_max: f64,
    ) -> (Vec<CanvasLine>, Vec<(f64, f64, Line<'static>)>) {
        let to_x = |col: i32| col as f64 * CELL_WIDTH;
        let to_y = |row: i32| y_max - row as f64 * CELL_HEIGHT;
        let placed = |id: &str| self.placed.iter().find(|p| p.id == id);

        let mut segments = Vec::new();
        let mut labels: Vec<(f64, f64, Line<'static>)> = Vec::new();
        let column_layer = ctx.active_layer == LineageLayerView::Column;

        for edge in &ctx.graph.edges {
            let (Some(source), Some(target)) = (placed(&edge.source), placed(&edge.target)) else {
                continue;
            };
            let color = edge_color(ctx, edge);
            let (x1, y1) = (to_x(source.col + source.width), to_y(source.row));
            let (x2, y2) = (to_x(target.col - 1), to_y(target.row));
            segments.push(CanvasLine::new(x1, y1, x2, y2, color));
            labels.push((x2, y2, Line::from(Span::styled("▸", Style::default().fg(color)))));

            if ctx.active_layer == LineageLayerView::Pipeline {
                if let Some(pipeline) = &edge.details.pipeline {
                    let icon = ctx
                        .pipeline_status
                        .get(&pipeline.fully_qualified_name)
                        .map(|s| s.execution_status.icon())
                        .unwrap_or("?");
                    labels.push((
                        (x1 + x2) / 2.0,
                        (y1 + y2) / 2.0,
                        Line::from(Span::styled(
                            format!("⇉ {} {}", truncate(&pipeline.label(), 16), icon),
                            Style::default().fg(color),
                        )),
                    ));
                }
            }

            if column_layer {
                for (from, to) in edge.details.column_pairs() {
                    let traced = ctx.traced_columns.contains(&from) && ctx.traced_columns.contains(&to);
                    if !(ctx.expand_all_columns || traced) {
                        continue;
                    }
                    if let (Some(r1), Some(r2)) = (source.column_row(&from), target.column_row(&to)) {
                        let color = if traced { Color::Yellow } else { Color::DarkGray };
                        segments.push(CanvasLine::new(
                            to_x(source.col + source.width.max(MAX_LABEL_WIDTH as i32)),
                            to_y(r1),
                            to_x(target.col - 1),
                            to_y(r2),
                            color,
                        ));
                    }
                }
            }
        }

        let tracing = !ctx.traced_nodes.is_empty();
        for (node, placed) in ctx.graph.nodes.iter().zip(&self.placed) {
            let style = node_style(ctx, node, marked, tracing);
            labels.push((
                to_x(placed.col),
                to_y(placed.row),
                Line::from(Span::styled(node_label(node), style)),
            ));

            let column_width = placed.width.max(MAX_LABEL_WIDTH as i32) as usize;
            for (i, column) in node.entity.columns.iter().enumerate().take(placed.columns.len()) {
                let fqn = &column.fully_qualified_name;
                let style = if ctx.selected_column.as_deref() == Some(fqn.as_str()) {
                    Style::default().fg(Color::Black).bg(Color::Yellow)
                } else if ctx.traced_columns.contains(fqn) {
                    Style::default().fg(Color::Yellow)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                labels.push((
                    to_x(placed.col),
                    to_y(placed.row + 1 + i as i32),
                    Line::from(Span::styled(
                        format!("  {}", truncate(&column.name, column_width - 2)),
                        style,
                    )),
                ));
            }
        }

        (segments, labels)
    }
}

fn edge_color(ctx: &LineageContext, edge: &Edge) -> Color {
    let selected = ctx
        .selected_edge
        .as_ref()
        .is_some_and(|s| s.edge_id == edge.id);
    if selected {
        return Color::Yellow;
    }
    if ctx.active_layer == LineageLayerView::Pipeline {
        if edge.kind != EdgeKind::Pipeline {
            return Color::DarkGray;
        }
        let status = edge
            .details
            .pipeline
            .as_ref()
            .and_then(|p| ctx.pipeline_status.get(&p.fully_qualified_name));
        return match status.map(|s| s.execution_status) {
            Some(StatusType::Successful) => Color::Green,
            Some(StatusType::Failed) => Color::Red,
            Some(StatusType::Pending) => Color::Yellow,
            Some(StatusType::Skipped) | None => Color::Blue,
        };
    }
    if ctx.is_traced(&edge.source) && ctx.is_traced(&edge.target) {
        Color::Cyan
    } else if ctx.active_layer == LineageLayerView::Column {
        Color::DarkGray
    } else {
        Color::Gray
    }
}

fn node_style(ctx: &LineageContext, node: &Node, marked: Option<&str>, tracing: bool) -> Style {
    if marked == Some(node.id.as_str()) {
        return Style::default()
            .fg(Color::Black)
            .bg(Color::Green)
            .add_modifier(Modifier::BOLD);
    }
    if ctx.selected_node.as_deref() == Some(node.id.as_str()) {
        return Style::default()
            .fg(Color::Black)
            .bg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
    }
    if node.is_new {
        return Style::default()
            .fg(Color::Magenta)
            .add_modifier(Modifier::ITALIC);
    }
    if node.entity.reference.is_deleted() {
        return Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::CROSSED_OUT);
    }

    let base = if tracing && !ctx.is_traced(&node.id) {
        Style::default().fg(Color::DarkGray)
    } else if tracing {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::White)
    };
    if node.is_root {
        base.add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
    } else {
        base
    }
}

impl Component for GraphView {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        let action = match key.code {
            // Drawer scrolling
            KeyCode::Char('e') if ctrl => Some(Action::ScrollDown),
            KeyCode::Char('y') if ctrl => Some(Action::ScrollUp),
            KeyCode::Char('d') if ctrl => Some(Action::PageDown),
            KeyCode::Char('u') if ctrl => Some(Action::PageUp),
            KeyCode::PageDown => Some(Action::PageDown),
            KeyCode::PageUp => Some(Action::PageUp),

            // Moving nodes (edit mode)
            KeyCode::Left if shift => Some(Action::MoveNode(-2, 0)),
            KeyCode::Right if shift => Some(Action::MoveNode(2, 0)),
            KeyCode::Up if shift => Some(Action::MoveNode(0, -1)),
            KeyCode::Down if shift => Some(Action::MoveNode(0, 1)),

            // Navigation
            KeyCode::Char('h') | KeyCode::Left => Some(Action::SelectNeighbour(MoveDirection::Left)),
            KeyCode::Char('l') | KeyCode::Right => Some(Action::SelectNeighbour(MoveDirection::Right)),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::SelectNeighbour(MoveDirection::Up)),
            KeyCode::Char('j') | KeyCode::Down => Some(Action::SelectNeighbour(MoveDirection::Down)),
            KeyCode::Char('g') => Some(Action::SelectRoot),
            KeyCode::Tab => Some(Action::NextEdge),
            KeyCode::Char('c') => Some(Action::NextColumn),
            KeyCode::Enter => Some(Action::OpenDrawer),
            KeyCode::Esc => Some(Action::Lineage(LineageCommand::PaneClick)),

            // Expansion
            KeyCode::Char('[') => Some(Action::Expand(EdgeDirection::Upstream)),
            KeyCode::Char(']') => Some(Action::Expand(EdgeDirection::Downstream)),
            KeyCode::Char('{') => Some(Action::Collapse(EdgeDirection::Upstream)),
            KeyCode::Char('}') => Some(Action::Collapse(EdgeDirection::Downstream)),

            // Viewport
            KeyCode::Char('+') | KeyCode::Char('=') => Some(Action::ZoomIn),
            KeyCode::Char('-') => Some(Action::ZoomOut),
            KeyCode::Char('0') => Some(Action::FitView),
            KeyCode::Char('H') => Some(Action::Pan(4, 0)),
            KeyCode::Char('L') => Some(Action::Pan(-4, 0)),
            KeyCode::Char('K') => Some(Action::Pan(0, 2)),
            KeyCode::Char('J') => Some(Action::Pan(0, -2)),

            // View settings
            KeyCode::Char('v') => Some(Action::CycleLayer),
            KeyCode::Char('C') => Some(Action::Lineage(LineageCommand::ToggleColumnView)),
            KeyCode::Char('/') => Some(Action::OpenQueryFilter),
            KeyCode::Char('o') => Some(Action::OpenConfigDialog),
            KeyCode::Char('R') => Some(Action::Lineage(LineageCommand::Reload)),

            // Editing
            KeyCode::Char('E') => Some(Action::ToggleEditMode),
            KeyCode::Char('X') => Some(Action::Lineage(LineageCommand::DiscardEdits)),
            KeyCode::Char('a') => Some(Action::OpenNodePalette),
            KeyCode::Char('b') => Some(Action::OpenEntitySearch),
            KeyCode::Char('m') => Some(Action::MarkConnection),
            KeyCode::Char('p') => Some(Action::OpenPipelineInput),
            KeyCode::Char('x') | KeyCode::Delete => Some(Action::RemoveSelected),

            // Other
            KeyCode::Char('w') => Some(Action::ExportCsv),
            KeyCode::Char('?') => Some(Action::OpenHelp),
            KeyCode::Char('q') => Some(Action::OpenQuitDialog),
            _ => None,
        };
        Ok(action)
    }

    fn draw(&mut self, _frame: &mut Frame, _area: Rect) -> Result<()> {
        // Drawing needs the lineage context, see draw_graph
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::graph::tests::response;

    fn context() -> LineageContext {
        let mut ctx = LineageContext::new(false);
        ctx.graph = LineageGraph::from_response(&response(
            "A",
            &["B", "C", "Z"],
            &[("A", "B"), ("A", "C"), ("Z", "A")],
        ));
        ctx.viewport = Viewport {
            x: 400.0,
            y: 200.0,
            zoom: 1.0,
        };
        ctx
    }

    #[test]
    fn test_neighbour_follows_layers() {
        let ctx = context();
        assert_eq!(neighbour(&ctx.graph, "A", MoveDirection::Right).as_deref(), Some("B"));
        assert_eq!(neighbour(&ctx.graph, "B", MoveDirection::Down).as_deref(), Some("C"));
        assert_eq!(neighbour(&ctx.graph, "A", MoveDirection::Left).as_deref(), Some("Z"));
        assert_eq!(neighbour(&ctx.graph, "Z", MoveDirection::Left), None);
        assert_eq!(neighbour(&ctx.graph, "missing", MoveDirection::Up), None);
    }

    #[test]
    fn test_hit_finds_node_under_cell() {
        let ctx = context();
        let mut view = GraphView::new();
        view.canvas = Rect::new(1, 1, 100, 30);
        view.refresh(&ctx);

        // A sits at screen (400, 200): column 40, row 10 of the canvas
        assert_eq!(view.hit(41, 11), Some(Hit::Node("A".to_string())));
        assert_eq!(view.hit(1, 1), None);
        assert_eq!(view.hit(200, 11), None);
    }

    #[test]
    fn test_columns_are_listed_in_column_layer() {
        let mut ctx = context();
        if let Some(node) = ctx.graph.node_mut("A") {
            node.entity = node.entity.clone().with_columns(&["id", "name"]);
        }
        ctx.active_layer = LineageLayerView::Column;

        let mut view = GraphView::new();
        view.canvas = Rect::new(0, 0, 100, 30);
        view.refresh(&ctx);

        let a = view.placed.iter().find(|p| p.id == "A").unwrap();
        assert_eq!(a.columns.len(), 2);
        assert_eq!(
            view.hit(a.col as u16, (a.row + 2) as u16),
            Some(Hit::Column("svc.db.schema.A.name".to_string()))
        );
    }

    #[test]
    fn test_truncate_respects_display_width() {
        assert_eq!(truncate("orders", 10), "orders");
        assert_eq!(truncate("customer_orders", 8), "custome…");
        assert_eq!(truncate("顧客テーブル", 5), "顧客…");
    }

    #[test]
    fn test_bounds_scale_cells() {
        let bounds = bounds_of(Rect::new(2, 3, 10, 5));
        assert_eq!(bounds.left, 20.0);
        assert_eq!(bounds.top, 60.0);
        assert_eq!(bounds.width, 100.0);
        assert_eq!(bounds.height, 100.0);
    }

    #[test]
    fn test_edit_keys_map_to_actions() {
        let mut view = GraphView::new();
        let key = |code| KeyEvent::new(code, KeyModifiers::NONE);
        assert_eq!(
            view.handle_key_event(key(KeyCode::Char('['))).unwrap(),
            Some(Action::Expand(EdgeDirection::Upstream))
        );
        assert_eq!(
            view.handle_key_event(KeyEvent::new(KeyCode::Left, KeyModifiers::SHIFT)).unwrap(),
            Some(Action::MoveNode(-2, 0))
        );
        assert_eq!(
            view.handle_key_event(key(KeyCode::Esc)).unwrap(),
            Some(Action::Lineage(LineageCommand::PaneClick))
        );
    }
}
