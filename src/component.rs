//! Component trait shared by the canvas, the drawer and the dialogs

use crate::action::Action;
use anyhow::Result;
use crossterm::event::{KeyEvent, MouseEvent};
use ratatui::{layout::Rect, Frame};

/// A piece of the lineage screen
///
/// Input handlers only translate events into `Action`s. State changes
/// happen in `update`, which may hand back a follow-up action; the main
/// loop keeps feeding follow-ups until none is left. Components whose
/// state lives in the modal stack render through their own `draw_with_*`
/// helpers and leave `draw` empty.
pub trait Component {
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        let _ = key;
        Ok(None)
    }

    fn handle_mouse_event(&mut self, mouse: MouseEvent) -> Result<Option<Action>> {
        let _ = mouse;
        Ok(None)
    }

    fn update(&mut self, action: Action) -> Result<Option<Action>> {
        let _ = action;
        Ok(None)
    }

    /// Render into `area`; must not change state other than widget scroll state
    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()>;
}
