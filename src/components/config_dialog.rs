//! Lineage depth settings dialog
//!
//! Edits a draft of the fetch configuration. The draft lives in the modal
//! stack; this component only maps keys and renders it.

use crate::action::Action;
use crate::component::Component;
use crate::components::centered_popup;
use crate::model::modal::ConfigField;
use crate::model::LineageConfig;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

#[derive(Default)]
pub struct ConfigDialog;

impl ConfigDialog {
    pub fn draw_with_draft(
        &self,
        frame: &mut Frame,
        area: Rect,
        draft: &LineageConfig,
        focus: ConfigField,
    ) -> Result<()> {
        let popup_area = centered_popup(area, 50, 11);
        frame.render_widget(Clear, popup_area);

        let mut content = vec![Line::from("")];
        for field in [
            ConfigField::Upstream,
            ConfigField::Downstream,
            ConfigField::NodesPerLayer,
        ] {
            let focused = field == focus;
            let prefix = if focused { "▶ " } else { "  " };
            let style = if focused {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            content.push(Line::from(vec![
                Span::styled(format!("{}{:<18}", prefix, field.label()), style),
                Span::styled(
                    format!("◀ {:>3} ▶", field.value(draft)),
                    if focused {
                        Style::default().fg(Color::Cyan)
                    } else {
                        Style::default().fg(Color::DarkGray)
                    },
                ),
            ]));
        }

        content.push(Line::from(""));
        content.push(Line::from(Span::styled(
            "Applying reloads the lineage",
            Style::default().fg(Color::DarkGray),
        )));
        content.push(Line::from(""));
        content.push(Line::from(vec![
            Span::styled(
                " ←→ ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("Adjust  "),
            Span::styled(
                " Enter ",
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("Apply  "),
            Span::styled(
                " Esc ",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
            Span::raw("Cancel"),
        ]));

        let paragraph = Paragraph::new(content).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" Lineage Depth ")
                .title_style(
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ),
        );
        frame.render_widget(paragraph, popup_area);
        Ok(())
    }
}

impl Component for ConfigDialog {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        let action = match key.code {
            KeyCode::Esc | KeyCode::Char('o') => Some(Action::CloseModal),
            KeyCode::Enter => Some(Action::ConfirmModal),
            KeyCode::Up | KeyCode::Char('k') => Some(Action::ModalUp),
            KeyCode::Down | KeyCode::Char('j') | KeyCode::Tab => Some(Action::ModalDown),
            KeyCode::Left | KeyCode::Char('h') | KeyCode::Char('-') => Some(Action::ModalAdjust(-1)),
            KeyCode::Right | KeyCode::Char('l') | KeyCode::Char('+') => Some(Action::ModalAdjust(1)),
            _ => None,
        };
        Ok(action)
    }

    fn draw(&mut self, _frame: &mut Frame, _area: Rect) -> Result<()> {
        // Needs the draft from the modal stack, see draw_with_draft
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrows_adjust_values() {
        let mut dialog = ConfigDialog;
        assert_eq!(
            dialog.handle_key_event(KeyEvent::from(KeyCode::Left)).unwrap(),
            Some(Action::ModalAdjust(-1))
        );
        assert_eq!(
            dialog.handle_key_event(KeyEvent::from(KeyCode::Char('+'))).unwrap(),
            Some(Action::ModalAdjust(1))
        );
        assert_eq!(
            dialog.handle_key_event(KeyEvent::from(KeyCode::Tab)).unwrap(),
            Some(Action::ModalDown)
        );
    }
}
