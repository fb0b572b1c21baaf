//! Lineage screen composition
//!
//! Lays out the header, canvas, drawer, status line and help bar around a
//! single `LineageContext`.

use crate::components::{calculate_main_layout, DrawerComponent, GraphView};
use crate::component::Component;
use crate::model::context::LineageContext;
use crate::model::view::LineageLayerView;
use anyhow::Result;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Tabs},
    Frame,
};

/// Context needed for rendering the lineage screen
pub struct ScreenRenderContext<'a> {
    pub lineage: &'a LineageContext,
    /// Backend description, e.g. the server URL
    pub source: &'a str,
    pub status_message: Option<&'a str>,
    /// Label of the pending connection source
    pub connect_source: Option<&'a str>,
    pub in_flight: usize,
}

/// Draw the lineage screen
pub fn draw_lineage_screen(
    frame: &mut Frame,
    area: Rect,
    graph_view: &mut GraphView,
    drawer: &mut DrawerComponent,
    ctx: &ScreenRenderContext,
    marked_node: Option<&str>,
) -> Result<()> {
    let layout = calculate_main_layout(area, ctx.lineage.is_drawer_open);

    render_header(frame, layout.header, ctx);
    graph_view.draw_graph(frame, layout.graph, ctx.lineage, marked_node)?;

    if let Some(drawer_area) = layout.drawer {
        drawer.set_content(ctx.lineage);
        drawer.draw(frame, drawer_area)?;
    }

    render_status_bar(frame, layout.status, ctx);
    render_help_bar(frame, layout.help, ctx.lineage);

    Ok(())
}

fn render_header(frame: &mut Frame, area: Rect, ctx: &ScreenRenderContext) {
    let lineage = ctx.lineage;
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(52), Constraint::Min(0)])
        .split(area);

    let all_layers = LineageLayerView::all();
    let titles: Vec<&str> = all_layers.iter().map(|l| l.name()).collect();
    let selected = all_layers
        .iter()
        .position(|l| *l == lineage.active_layer)
        .unwrap_or(0);
    let tabs = Tabs::new(titles)
        .select(selected)
        .style(Style::default().fg(Color::DarkGray))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(tabs, chunks[0]);

    let mut spans = vec![];
    if lineage.is_edit_mode {
        spans.push(Span::styled(
            " EDIT ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::raw(" "));
    }
    if !lineage.query_filter.is_empty() {
        spans.push(Span::styled(
            format!("[{}] ", lineage.query_filter),
            Style::default().fg(Color::Yellow),
        ));
    }
    let config = lineage.lineage_config;
    spans.push(Span::styled(
        format!(
            "↑{} ↓{} ×{} ",
            config.upstream_depth, config.downstream_depth, config.nodes_per_layer
        ),
        Style::default().fg(Color::DarkGray),
    ));
    spans.push(Span::styled(
        format!("{:.0}% ", lineage.zoom_value * 100.0),
        Style::default().fg(Color::DarkGray),
    ));
    spans.push(Span::styled(
        format!(" {} ", ctx.source),
        Style::default().fg(Color::Black).bg(Color::Cyan),
    ));

    let info = Paragraph::new(Line::from(spans)).alignment(ratatui::layout::Alignment::Right);
    frame.render_widget(info, chunks[1]);
}

fn render_status_bar(frame: &mut Frame, area: Rect, ctx: &ScreenRenderContext) {
    let lineage = ctx.lineage;
    let mut spans = vec![];

    if lineage.loading {
        spans.push(Span::styled(
            " Loading… ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        ));
        spans.push(Span::raw(" "));
    } else if lineage.persisting {
        spans.push(Span::styled(
            " Saving… ",
            Style::default().fg(Color::Black).bg(Color::Magenta),
        ));
        spans.push(Span::raw(" "));
    } else if ctx.in_flight > 0 {
        spans.push(Span::styled(
            format!(" {} pending ", ctx.in_flight),
            Style::default().fg(Color::DarkGray),
        ));
    }

    spans.push(Span::styled(
        format!(
            "{} nodes, {} edges",
            lineage.graph.nodes.len(),
            lineage.graph.edges.len()
        ),
        Style::default().fg(Color::DarkGray),
    ));

    if lineage.is_edit_mode {
        let pending = lineage.pending_changes().len();
        if pending > 0 {
            spans.push(Span::styled(
                format!("  {} unsaved", pending),
                Style::default().fg(Color::Magenta),
            ));
        }
    }

    if let Some(source) = ctx.connect_source {
        spans.push(Span::styled(
            format!("  connecting from {} ", source),
            Style::default().fg(Color::Green),
        ));
    }

    if let Some(notice) = &lineage.notice {
        spans.push(Span::styled(
            format!("  {} ", notice),
            Style::default().fg(Color::Yellow),
        ));
    }

    if let Some(status) = ctx.status_message {
        spans.push(Span::styled(
            format!("  {} ", status),
            Style::default().fg(Color::Yellow),
        ));
    }

    // Error message replaces everything else
    if let Some(error) = &lineage.last_error {
        spans.clear();
        spans.push(Span::styled(
            format!(" {} ", error.kind()),
            Style::default()
                .fg(Color::White)
                .bg(Color::Red)
                .add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(
            format!(" {}  (Esc to dismiss)", error),
            Style::default().fg(Color::Red),
        ));
    }

    let paragraph = Paragraph::new(Line::from(spans));
    frame.render_widget(paragraph, area);
}

fn render_help_bar(frame: &mut Frame, area: Rect, lineage: &LineageContext) {
    let help_spans = if lineage.is_edit_mode {
        vec![
            Span::styled(
                " E ",
                Style::default()
                    .fg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("Save "),
            Span::styled(
                " X ",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
            Span::raw("Discard "),
            Span::styled(
                " a ",
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("Add "),
            Span::styled(
                " m ",
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("Connect "),
            Span::styled(
                " x ",
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("Remove "),
            Span::styled(
                " p ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("Pipeline "),
            Span::styled(
                " S-←→ ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("Move"),
        ]
    } else {
        vec![
            Span::styled(
                " q ",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("Quit "),
            Span::styled(
                " hjkl ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("Move "),
            Span::styled(
                " Enter ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("Details "),
            Span::styled(
                " [] ",
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("Expand "),
            Span::styled(
                " v ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("Layer "),
            Span::styled(
                " / ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("Filter "),
            Span::styled(
                " E ",
                Style::default()
                    .fg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("Edit "),
            Span::styled(
                " ? ",
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("Help"),
        ]
    };

    let paragraph = Paragraph::new(Line::from(help_spans))
        .alignment(ratatui::layout::Alignment::Left);
    frame.render_widget(paragraph, area);
}
