//! Confirmation shown before leaving the lineage view

use crate::action::Action;
use crate::component::Component;
use crate::components::centered_popup;
use crate::model::PendingChange;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

const LISTED_CHANGES: usize = 4;

#[derive(Default)]
pub struct QuitDialog {
    /// Unsaved edge changes, one summary line each
    pub pending: Vec<String>,
}

impl QuitDialog {
    pub fn set_pending(&mut self, changes: &[PendingChange]) {
        self.pending = changes.iter().map(|c| c.to_string()).collect();
    }

    fn change_lines(&self) -> Vec<Line<'static>> {
        let mut lines: Vec<Line> = self
            .pending
            .iter()
            .take(LISTED_CHANGES)
            .map(|change| {
                let color = if change.starts_with('+') {
                    Color::Green
                } else {
                    Color::Red
                };
                Line::from(Span::styled(change.clone(), Style::default().fg(color)))
            })
            .collect();
        if self.pending.len() > LISTED_CHANGES {
            lines.push(Line::from(Span::styled(
                format!("… and {} more", self.pending.len() - LISTED_CHANGES),
                Style::default().fg(Color::DarkGray),
            )));
        }
        lines
    }
}

impl Component for QuitDialog {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        Ok(match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Char('q') => Some(Action::ForceQuit),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Some(Action::CloseModal),
            _ => None,
        })
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()> {
        let changes = self.change_lines();
        let width = self
            .pending
            .iter()
            .take(LISTED_CHANGES)
            .map(|c| unicode_width::UnicodeWidthStr::width(c.as_str()) as u16 + 4)
            .max()
            .unwrap_or(0)
            .clamp(44, 90);
        let height = 6 + changes.len() as u16 + u16::from(!changes.is_empty());
        let popup_area = centered_popup(area, width, height);
        frame.render_widget(Clear, popup_area);

        let mut content = vec![Line::from(Span::styled(
            "Leave the lineage view?",
            Style::default().add_modifier(Modifier::BOLD),
        ))];
        if !changes.is_empty() {
            content.push(Line::from(Span::styled(
                format!("{} unsaved change(s) will be lost:", self.pending.len()),
                Style::default().fg(Color::Yellow),
            )));
            content.extend(changes);
        }
        content.push(Line::from(""));
        content.push(Line::from(vec![
            Span::styled(" y ", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
            Span::raw("Leave  "),
            Span::styled(" n ", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
            Span::raw("Stay"),
        ]));

        let border = if self.pending.is_empty() { Color::Cyan } else { Color::Red };
        let dialog = Paragraph::new(content).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border))
                .title(" Quit "),
        );
        frame.render_widget(dialog, popup_area);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::entity::{EdgeDetails, EntityType, LineageEntity};

    #[test]
    fn test_long_change_lists_are_truncated() {
        let a = LineageEntity::new("a", EntityType::Table, "db.a");
        let changes: Vec<PendingChange> = (0..6)
            .map(|i| {
                let b = LineageEntity::new(&format!("b{i}"), EntityType::Table, &format!("db.b{i}"));
                PendingChange::AddEdge(EdgeDetails::between(&a, &b))
            })
            .collect();

        let mut dialog = QuitDialog::default();
        dialog.set_pending(&changes);

        let lines = dialog.change_lines();
        assert_eq!(lines.len(), LISTED_CHANGES + 1);
        assert_eq!(dialog.pending[0], "+ db.a -> db.b0");
    }
}
