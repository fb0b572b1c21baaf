//! Help dialog component
//!
//! Displays all keyboard shortcuts of the lineage view.

use crate::action::Action;
use crate::component::Component;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
    Frame,
};

/// Help dialog showing all keyboard shortcuts
#[derive(Default)]
pub struct HelpDialog {
    pub scroll_offset: usize,
    /// Whether saved edits reach the backend
    pub can_edit_lineage: bool,
}

impl Component for HelpDialog {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        let action = match key.code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?') => Some(Action::CloseModal),
            KeyCode::Char('j') | KeyCode::Down => {
                self.scroll_offset = self.scroll_offset.saturating_add(1);
                None
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.scroll_offset = self.scroll_offset.saturating_sub(1);
                None
            }
            KeyCode::PageDown => {
                self.scroll_offset = self.scroll_offset.saturating_add(10);
                None
            }
            KeyCode::PageUp => {
                self.scroll_offset = self.scroll_offset.saturating_sub(10);
                None
            }
            _ => None,
        };
        Ok(action)
    }

    fn update(&mut self, _action: Action) -> Result<Option<Action>> {
        Ok(None)
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()> {
        // Clear the area
        frame.render_widget(Clear, area);

        let margin = 4;
        let dialog_area = Rect::new(
            margin,
            margin,
            area.width.saturating_sub(margin * 2),
            area.height.saturating_sub(margin * 2),
        );

        let content = build_help_content(self.can_edit_lineage);
        let total = content.len();
        let visible_height = dialog_area.height.saturating_sub(2) as usize;

        // Clamp scroll offset
        let max_scroll = total.saturating_sub(visible_height);
        if self.scroll_offset > max_scroll {
            self.scroll_offset = max_scroll;
        }

        let paragraph = Paragraph::new(content.clone())
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Keyboard Shortcuts ")
                    .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
                    .border_style(Style::default().fg(Color::Cyan)),
            )
            .scroll((self.scroll_offset as u16, 0));

        frame.render_widget(paragraph, dialog_area);

        // Render scrollbar if content exceeds visible area
        if total > visible_height {
            let mut scrollbar_state =
                ScrollbarState::new(total.saturating_sub(visible_height)).position(self.scroll_offset);

            frame.render_stateful_widget(
                Scrollbar::new(ScrollbarOrientation::VerticalRight)
                    .begin_symbol(Some("↑"))
                    .end_symbol(Some("↓")),
                dialog_area.inner(ratatui::layout::Margin {
                    vertical: 1,
                    horizontal: 0,
                }),
                &mut scrollbar_state,
            );
        }

        Ok(())
    }
}

/// Build the help content with all keyboard shortcuts
fn build_help_content(can_edit_lineage: bool) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    // Helper to add a section header
    let add_section = |lines: &mut Vec<Line<'static>>, title: &str| {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("  {} ", title),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(
            format!("  {}", "─".repeat(title.len() + 2)),
            Style::default().fg(Color::DarkGray),
        )));
    };

    // Helper to add a shortcut line
    let add_shortcut = |lines: &mut Vec<Line<'static>>, key: &str, description: &str| {
        lines.push(Line::from(vec![
            Span::styled(
                format!("  {:14}", key),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::styled(description.to_string(), Style::default().fg(Color::White)),
        ]));
    };

    add_section(&mut lines, "Navigation");
    add_shortcut(&mut lines, "h j k l", "Select the nearest entity left/down/up/right");
    add_shortcut(&mut lines, "g", "Select the focal entity");
    add_shortcut(&mut lines, "Enter", "Show the selection in the drawer");
    add_shortcut(&mut lines, "Tab", "Cycle edges of the selected entity");
    add_shortcut(&mut lines, "c", "Cycle columns (column layer)");
    add_shortcut(&mut lines, "Esc", "Clear selection and close the drawer");

    add_section(&mut lines, "Lineage");
    add_shortcut(&mut lines, "[ / ]", "Load one more hop upstream / downstream");
    add_shortcut(&mut lines, "{ / }", "Collapse upstream / downstream");
    add_shortcut(&mut lines, "R", "Reload lineage");
    add_shortcut(&mut lines, "/", "Filter entities by search query");
    add_shortcut(&mut lines, "o", "Depth and page size settings");
    add_shortcut(&mut lines, "w", "Export edges to CSV");

    add_section(&mut lines, "View");
    add_shortcut(&mut lines, "v", "Next layer (entities/columns/quality/pipelines)");
    add_shortcut(&mut lines, "C", "Toggle column-level edges");
    add_shortcut(&mut lines, "+ / -", "Zoom in / out");
    add_shortcut(&mut lines, "0", "Fit the graph to the screen");
    add_shortcut(&mut lines, "H J K L", "Pan the canvas");
    add_shortcut(&mut lines, "Ctrl+e/y", "Scroll the drawer");

    add_section(&mut lines, "Editing");
    add_shortcut(&mut lines, "E", "Enter edit mode / save and leave");
    add_shortcut(&mut lines, "X", "Discard edits and leave edit mode");
    add_shortcut(&mut lines, "a", "Add an entity from the palette");
    add_shortcut(&mut lines, "b", "Bind the new entity to an FQN");
    add_shortcut(&mut lines, "m", "Mark connection source, then target");
    add_shortcut(&mut lines, "p", "Set the pipeline of the selected edge");
    add_shortcut(&mut lines, "x / Del", "Remove the selected entity or edge");
    add_shortcut(&mut lines, "Shift+←→↑↓", "Move the selected entity");
    if !can_edit_lineage {
        lines.push(Line::from(Span::styled(
            "  Read-only: edits are discarded when leaving edit mode",
            Style::default().fg(Color::Red),
        )));
    }

    add_section(&mut lines, "General");
    add_shortcut(&mut lines, "?", "Show this help");
    add_shortcut(&mut lines, "q", "Quit");
    add_shortcut(&mut lines, "Ctrl+c", "Quit immediately");

    // Footer
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "  Press q, Esc, or ? to close",
        Style::default().fg(Color::DarkGray),
    )));

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(lines: &[Line<'static>]) -> String {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_read_only_warning() {
        assert!(text(&build_help_content(false)).contains("Read-only"));
        assert!(!text(&build_help_content(true)).contains("Read-only"));
    }

    #[test]
    fn test_close_keys() {
        let mut dialog = HelpDialog::default();
        let action = dialog
            .handle_key_event(KeyEvent::from(KeyCode::Char('?')))
            .unwrap();
        assert_eq!(action, Some(Action::CloseModal));
    }
}
