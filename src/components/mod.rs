//! UI Components
//!
//! Each component encapsulates its own state, event handling, and rendering logic.
//! Components communicate through Actions rather than direct state mutation.

pub mod config_dialog;
pub mod drawer;
pub mod graph_view;
pub mod help_dialog;
pub mod input_dialog;
pub mod layout;
pub mod node_palette;
pub mod quit_dialog;
pub mod screen;

pub use config_dialog::ConfigDialog;
pub use drawer::DrawerComponent;
pub use graph_view::{GraphView, Hit};
pub use help_dialog::HelpDialog;
pub use input_dialog::{InputDialog, InputPrompt};
pub use layout::{calculate_main_layout, centered_popup};
pub use node_palette::NodePalette;
pub use quit_dialog::QuitDialog;
pub use screen::{draw_lineage_screen, ScreenRenderContext};
