//! Single-line text input dialog
//!
//! Used for entity FQNs, pipeline FQNs and the query filter. The buffer is
//! owned by the modal stack.

use crate::action::Action;
use crate::component::Component;
use crate::components::centered_popup;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

/// What an input prompt looks like
pub struct InputPrompt<'a> {
    pub title: &'a str,
    pub prompt: &'a str,
    pub hint: &'a str,
    pub confirm_label: &'a str,
    pub color: Color,
}

#[derive(Default)]
pub struct InputDialog;

impl InputDialog {
    pub fn draw_with_input(
        &self,
        frame: &mut Frame,
        area: Rect,
        prompt: &InputPrompt,
        input: &str,
    ) -> Result<()> {
        let popup_area = centered_popup(area, 70, 10);
        frame.render_widget(Clear, popup_area);

        let content = vec![
            Line::from(""),
            Line::from(Span::styled(
                prompt.prompt.to_string(),
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                prompt.hint.to_string(),
                Style::default().fg(Color::DarkGray),
            )),
            Line::from(Span::styled(
                format!("> {}_", input),
                Style::default().fg(Color::Cyan),
            )),
            Line::from(""),
            Line::from(vec![
                Span::styled(
                    " Enter ",
                    Style::default()
                        .fg(Color::Green)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(format!("{}  ", prompt.confirm_label)),
                Span::styled(
                    " Esc ",
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw("Cancel"),
            ]),
        ];

        let paragraph = Paragraph::new(content)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(prompt.color))
                    .title(format!(" {} ", prompt.title))
                    .title_style(
                        Style::default()
                            .fg(prompt.color)
                            .add_modifier(Modifier::BOLD),
                    ),
            )
            .alignment(ratatui::layout::Alignment::Center);

        frame.render_widget(paragraph, popup_area);
        Ok(())
    }
}

impl Component for InputDialog {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        let action = match key.code {
            KeyCode::Esc => Some(Action::CloseModal),
            KeyCode::Enter => Some(Action::ConfirmModal),
            KeyCode::Backspace => Some(Action::ModalBackspace),
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::ModalInput(c))
            }
            _ => None,
        };
        Ok(action)
    }

    fn draw(&mut self, _frame: &mut Frame, _area: Rect) -> Result<()> {
        // The buffer lives in the modal stack, see draw_with_input
        Ok(())
    }
}
