//! Entity type palette
//!
//! Picks the type of a placeholder node dropped onto the canvas in edit mode.

use crate::action::Action;
use crate::component::Component;
use crate::components::centered_popup;
use crate::model::EntityType;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};

/// Entity type picker
#[derive(Default)]
pub struct NodePalette {
    list_state: ListState,
}

impl NodePalette {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entity type at a palette index, clamped to the last entry
    pub fn entity_type_at(index: usize) -> EntityType {
        let all = EntityType::all();
        all[index.min(all.len() - 1)]
    }

    pub fn len() -> usize {
        EntityType::all().len()
    }

    pub fn draw_with_selection(
        &mut self,
        frame: &mut Frame,
        area: Rect,
        selected_index: usize,
    ) -> Result<()> {
        let popup_area = centered_popup(area, 40, Self::len() as u16 + 6);
        frame.render_widget(Clear, popup_area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(3)])
            .split(popup_area);

        let items: Vec<ListItem> = EntityType::all()
            .iter()
            .map(|entity_type| {
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{} ", entity_type.icon()),
                        Style::default().fg(Color::Yellow),
                    ),
                    Span::styled(entity_type.label(), Style::default().fg(Color::White)),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Magenta))
                    .title(" Add Entity ")
                    .title_style(
                        Style::default()
                            .fg(Color::Magenta)
                            .add_modifier(Modifier::BOLD),
                    ),
            )
            .highlight_style(
                Style::default()
                    .bg(Color::Blue)
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("▶ ");

        self.list_state
            .select(Some(selected_index.min(Self::len() - 1)));
        frame.render_stateful_widget(list, chunks[0], &mut self.list_state);

        let help = Paragraph::new(Line::from(vec![
            Span::styled(" Enter ", Style::default().fg(Color::Yellow)),
            Span::raw("Place  "),
            Span::styled(" j/k ", Style::default().fg(Color::Cyan)),
            Span::raw("Navigate  "),
            Span::styled(" Esc ", Style::default().fg(Color::Yellow)),
            Span::raw("Cancel"),
        ]))
        .alignment(ratatui::layout::Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(help, chunks[1]);

        Ok(())
    }
}

impl Component for NodePalette {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        let action = match key.code {
            KeyCode::Esc | KeyCode::Char('a') => Some(Action::CloseModal),
            KeyCode::Enter => Some(Action::ConfirmModal),
            KeyCode::Up | KeyCode::Char('k') => Some(Action::ModalUp),
            KeyCode::Down | KeyCode::Char('j') => Some(Action::ModalDown),
            _ => None,
        };
        Ok(action)
    }

    fn draw(&mut self, _frame: &mut Frame, _area: Rect) -> Result<()> {
        // Selection lives in the modal stack, see draw_with_selection
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_at_clamps() {
        assert_eq!(NodePalette::entity_type_at(0), EntityType::all()[0]);
        assert_eq!(
            NodePalette::entity_type_at(999),
            EntityType::all()[NodePalette::len() - 1]
        );
    }
}
