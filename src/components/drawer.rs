//! Drawer panel component
//!
//! Shows the selected node, edge or column next to the canvas, with the
//! pipeline status, the root's upstream/downstream summary and any edits
//! waiting to be saved.

use crate::action::Action;
use crate::component::Component;
use crate::model::context::{EdgeSelection, LineageContext};
use crate::model::entity::StatusType;
use crate::model::graph::{Edge, Node};
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
    Frame,
};

/// What the drawer currently describes
#[derive(Debug, Clone, PartialEq, Eq)]
enum Subject {
    Node(String),
    Edge(EdgeSelection),
    Column(String),
    Empty,
}

pub struct DrawerComponent {
    scroll: usize,
    subject: Subject,
    content: Vec<Line<'static>>,
}

impl Default for DrawerComponent {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawerComponent {
    pub fn new() -> Self {
        Self {
            scroll: 0,
            subject: Subject::Empty,
            content: Vec::new(),
        }
    }

    /// Rebuild the content from the context, keeping the scroll offset while
    /// the selection is unchanged
    pub fn set_content(&mut self, ctx: &LineageContext) {
        let subject = if let Some(id) = &ctx.selected_node {
            Subject::Node(id.clone())
        } else if let Some(selection) = &ctx.selected_edge {
            Subject::Edge(selection.clone())
        } else if let Some(column) = &ctx.selected_column {
            Subject::Column(column.clone())
        } else {
            Subject::Empty
        };
        if subject != self.subject {
            self.scroll = 0;
            self.subject = subject;
        }
        self.content = build_content(ctx);
    }

    fn title(&self) -> &'static str {
        match self.subject {
            Subject::Node(_) => " Entity ",
            Subject::Edge(_) => " Edge ",
            Subject::Column(_) => " Column ",
            Subject::Empty => " Lineage ",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Content
// ═══════════════════════════════════════════════════════════════════════════════

fn heading(text: &str) -> Line<'static> {
    Line::from(Span::styled(
        text.to_string(),
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    ))
}

fn field(name: &str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{}: ", name), Style::default().fg(Color::DarkGray)),
        Span::styled(value, Style::default().fg(Color::White)),
    ])
}

fn status_color(status: StatusType) -> Color {
    match status {
        StatusType::Successful => Color::Green,
        StatusType::Failed => Color::Red,
        StatusType::Pending => Color::Yellow,
        StatusType::Skipped => Color::DarkGray,
    }
}

/// Drawer lines for the current selection
pub fn build_content(ctx: &LineageContext) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    if let Some(node) = ctx.selected_node() {
        render_node(&mut lines, ctx, node);
    } else if let Some(selection) = &ctx.selected_edge {
        if let Some(edge) = ctx.graph.edge(&selection.edge_id) {
            render_edge(&mut lines, ctx, edge, selection);
        }
    } else if let Some(column) = &ctx.selected_column {
        render_column(&mut lines, ctx, column);
    } else {
        lines.push(Line::from(Span::styled(
            "Nothing selected",
            Style::default().fg(Color::DarkGray),
        )));
    }

    lines.push(Line::from(""));
    render_summary(&mut lines, ctx);

    if ctx.is_edit_mode {
        lines.push(Line::from(""));
        render_pending(&mut lines, ctx);
    }
    lines
}

fn render_node(lines: &mut Vec<Line<'static>>, ctx: &LineageContext, node: &Node) {
    let entity = &node.entity;
    lines.push(Line::from(vec![
        Span::styled(
            format!("{} ", entity.entity_type().icon()),
            Style::default().fg(Color::Yellow),
        ),
        Span::styled(
            node.label(),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
    ]));

    if node.is_new {
        lines.push(Line::from(Span::styled(
            "Not bound to an entity yet, press 'b' to search",
            Style::default().fg(Color::Magenta),
        )));
        return;
    }

    lines.push(field("fqn", entity.fqn().to_string()));
    lines.push(field("type", entity.entity_type().label().to_string()));
    if node.is_root {
        lines.push(Line::from(Span::styled(
            "focal entity",
            Style::default().fg(Color::Cyan),
        )));
    }
    if entity.reference.is_deleted() {
        lines.push(Line::from(Span::styled(
            "deleted",
            Style::default().fg(Color::Red),
        )));
    }
    if let Some(description) = entity.reference.description.as_ref().filter(|d| !d.is_empty()) {
        lines.push(Line::from(""));
        lines.push(Line::from(description.clone()));
    }

    lines.push(Line::from(""));
    lines.push(field(
        "inputs",
        ctx.graph.incoming(&node.id).count().to_string(),
    ));
    lines.push(field(
        "outputs",
        ctx.graph.outgoing(&node.id).count().to_string(),
    ));
    if ctx.expanded_nodes.contains(&node.id) {
        lines.push(Line::from(Span::styled(
            "expanded",
            Style::default().fg(Color::DarkGray),
        )));
    }

    if !entity.columns.is_empty() {
        lines.push(Line::from(""));
        lines.push(heading(&format!("Columns ({})", entity.columns.len())));
        for column in &entity.columns {
            let traced = ctx.traced_columns.contains(&column.fully_qualified_name);
            let marker = if traced { "▸ " } else { "  " };
            let mut spans = vec![
                Span::styled(marker, Style::default().fg(Color::Yellow)),
                Span::raw(column.name.clone()),
            ];
            if let Some(data_type) = &column.data_type {
                spans.push(Span::styled(
                    format!(" {}", data_type),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            lines.push(Line::from(spans));
        }
    }
}

fn render_edge(
    lines: &mut Vec<Line<'static>>,
    ctx: &LineageContext,
    edge: &Edge,
    selection: &EdgeSelection,
) {
    let details = &edge.details;
    lines.push(Line::from(vec![
        Span::styled(
            details.from_entity.fqn.clone(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::styled(" → ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            details.to_entity.fqn.clone(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
    ]));
    if let Some(source) = &details.source {
        lines.push(field("source", source.clone()));
    }

    lines.push(Line::from(""));
    match &details.pipeline {
        Some(pipeline) => {
            lines.push(heading("Pipeline"));
            lines.push(field("name", pipeline.label()));
            lines.push(field("fqn", pipeline.fully_qualified_name.clone()));
            match ctx.pipeline_status.get(&pipeline.fully_qualified_name) {
                Some(status) => {
                    lines.push(Line::from(vec![
                        Span::styled("last run: ", Style::default().fg(Color::DarkGray)),
                        Span::styled(
                            format!(
                                "{} {:?}",
                                status.execution_status.icon(),
                                status.execution_status
                            ),
                            Style::default().fg(status_color(status.execution_status)),
                        ),
                        Span::styled(
                            format!("  {}", status.formatted_time()),
                            Style::default().fg(Color::DarkGray),
                        ),
                    ]));
                    for task in &status.task_status {
                        lines.push(Line::from(vec![
                            Span::styled(
                                format!("  {} ", task.execution_status.icon()),
                                Style::default().fg(status_color(task.execution_status)),
                            ),
                            Span::raw(task.name.clone()),
                        ]));
                    }
                }
                None => lines.push(Line::from(Span::styled(
                    "no run status loaded",
                    Style::default().fg(Color::DarkGray),
                ))),
            }
        }
        None => lines.push(Line::from(Span::styled(
            "No pipeline",
            Style::default().fg(Color::DarkGray),
        ))),
    }
    if ctx.pipeline_edit_target.as_deref() == Some(edge.id.as_str()) {
        lines.push(Line::from(Span::styled(
            "editing pipeline…",
            Style::default().fg(Color::Magenta),
        )));
    }

    let pairs = details.column_pairs();
    if !pairs.is_empty() {
        lines.push(Line::from(""));
        lines.push(heading(&format!("Column lineage ({})", pairs.len())));
        for pair in pairs {
            let selected = selection.column.as_ref() == Some(&pair);
            let style = if selected {
                Style::default().fg(Color::Black).bg(Color::Yellow)
            } else {
                Style::default()
            };
            lines.push(Line::from(Span::styled(
                format!("  {} → {}", pair.0, pair.1),
                style,
            )));
        }
    }

    if let Some(description) = details.description.as_ref().filter(|d| !d.is_empty()) {
        lines.push(Line::from(""));
        lines.push(Line::from(description.clone()));
    }
    if let Some(sql) = details.sql_query.as_ref().filter(|q| !q.is_empty()) {
        lines.push(Line::from(""));
        lines.push(heading("SQL"));
        for line in sql.lines() {
            lines.push(Line::from(Span::styled(
                line.to_string(),
                Style::default().fg(Color::Cyan),
            )));
        }
    }
}

fn render_column(lines: &mut Vec<Line<'static>>, ctx: &LineageContext, column: &str) {
    lines.push(Line::from(Span::styled(
        column.to_string(),
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    )));
    if let Some(owner) = ctx.graph.column_owner(column) {
        lines.push(field("entity", owner.entity.fqn().to_string()));
    }

    let related: Vec<&String> = ctx.traced_columns.iter().filter(|c| *c != column).collect();
    lines.push(Line::from(""));
    lines.push(heading(&format!("Traced columns ({})", related.len())));
    for traced in related {
        lines.push(Line::from(format!("  {}", traced)));
    }
}

fn render_summary(lines: &mut Vec<Line<'static>>, ctx: &LineageContext) {
    let data = &ctx.upstream_downstream;
    lines.push(heading("Focal entity"));
    lines.push(field(
        "upstream",
        format!(
            "{} entities, {} edges",
            data.upstream_nodes.len(),
            data.upstream_edges.len()
        ),
    ));
    lines.push(field(
        "downstream",
        format!(
            "{} entities, {} edges",
            data.downstream_nodes.len(),
            data.downstream_edges.len()
        ),
    ));
}

fn render_pending(lines: &mut Vec<Line<'static>>, ctx: &LineageContext) {
    let pending = ctx.pending_changes();
    lines.push(heading(&format!("Unsaved changes ({})", pending.len())));
    for change in pending {
        lines.push(Line::from(Span::styled(
            format!("  {}", change),
            Style::default().fg(Color::Magenta),
        )));
    }
}

impl Component for DrawerComponent {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        let action = match key.code {
            KeyCode::Char('e') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::ScrollDown)
            }
            KeyCode::Char('y') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::ScrollUp)
            }
            KeyCode::PageDown => Some(Action::PageDown),
            KeyCode::PageUp => Some(Action::PageUp),
            _ => None,
        };
        Ok(action)
    }

    fn update(&mut self, action: Action) -> Result<Option<Action>> {
        let max_scroll = self.content.len().saturating_sub(1);

        match action {
            Action::ScrollDown => {
                if self.scroll < max_scroll {
                    self.scroll += 1;
                }
            }
            Action::ScrollUp => {
                self.scroll = self.scroll.saturating_sub(1);
            }
            Action::PageDown => {
                self.scroll = (self.scroll + 10).min(max_scroll);
            }
            Action::PageUp => {
                self.scroll = self.scroll.saturating_sub(10);
            }
            _ => {}
        }
        Ok(None)
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()> {
        let visible_height = area.height.saturating_sub(2) as usize;

        let paragraph = Paragraph::new(self.content.clone())
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(self.title())
                    .border_style(Style::default().fg(Color::DarkGray)),
            )
            .wrap(Wrap { trim: false })
            .scroll((self.scroll as u16, 0));

        frame.render_widget(paragraph, area);

        let total = self.content.len();
        if total > visible_height {
            let mut scrollbar_state =
                ScrollbarState::new(total.saturating_sub(visible_height)).position(self.scroll);

            frame.render_stateful_widget(
                Scrollbar::new(ScrollbarOrientation::VerticalRight)
                    .begin_symbol(Some("↑"))
                    .end_symbol(Some("↓")),
                area.inner(ratatui::layout::Margin {
                    vertical: 1,
                    horizontal: 0,
                }),
                &mut scrollbar_state,
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::entity::{EntityReference, EntityType, PipelineStatus};
    use crate::model::graph::tests::response;
    use crate::model::graph::LineageGraph;
    use crate::model::LineageCommand;

    fn text(lines: &[Line<'static>]) -> String {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn context() -> LineageContext {
        let mut ctx = LineageContext::new(true);
        ctx.graph = LineageGraph::from_response(&response("A", &["B"], &[("A", "B")]));
        ctx
    }

    #[test]
    fn test_empty_selection() {
        let ctx = context();
        let content = text(&build_content(&ctx));
        assert!(content.contains("Nothing selected"));
        assert!(content.contains("Focal entity"));
        assert!(!content.contains("Unsaved changes"));
    }

    #[test]
    fn test_node_shows_fqn_and_degree() {
        let mut ctx = context();
        ctx.update(LineageCommand::NodeClick("B".to_string()));
        let content = text(&build_content(&ctx));
        assert!(content.contains("fqn: svc.db.schema.B"));
        assert!(content.contains("inputs: 1"));
        assert!(content.contains("outputs: 0"));
    }

    #[test]
    fn test_edge_shows_pipeline_status() {
        let mut ctx = context();
        let edge_id = Edge::edge_id("A", "B");
        if let Some(edge) = ctx.graph.edge_mut(&edge_id) {
            edge.details.pipeline = Some(EntityReference::new("p", EntityType::Pipeline, "airflow.load"));
        }
        ctx.pipeline_status.insert(
            "airflow.load".to_string(),
            PipelineStatus {
                execution_status: StatusType::Failed,
                timestamp: 0,
                task_status: Vec::new(),
            },
        );
        ctx.update(LineageCommand::EdgeClick(EdgeSelection::edge(&edge_id)));

        let content = text(&build_content(&ctx));
        assert!(content.contains("svc.db.schema.A → svc.db.schema.B"));
        assert!(content.contains("fqn: airflow.load"));
        assert!(content.contains("Failed"));
    }

    #[test]
    fn test_scroll_resets_when_selection_changes() {
        let mut ctx = context();
        let mut drawer = DrawerComponent::new();
        ctx.update(LineageCommand::NodeClick("A".to_string()));
        drawer.set_content(&ctx);
        drawer.update(Action::ScrollDown).unwrap();
        assert_eq!(drawer.scroll, 1);

        drawer.set_content(&ctx);
        assert_eq!(drawer.scroll, 1);

        ctx.update(LineageCommand::NodeClick("B".to_string()));
        drawer.set_content(&ctx);
        assert_eq!(drawer.scroll, 0);
    }
}
