//! Action enum - All possible application actions
//!
//! Actions are discrete operations that the application can perform.
//! Components emit Actions in response to events, and the App processes
//! them to update state. Anything that changes the lineage itself is
//! wrapped in `Action::Lineage` and forwarded to the context unchanged.

use crate::model::{EdgeDirection, LineageCommand};
use std::fmt;

/// Direction of a keyboard move on the graph canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
    /// Towards upstream layers
    Left,
    /// Towards downstream layers
    Right,
}

/// All possible actions in the application
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // ─────────────────────────────────────────────────────────────────────────
    // App Lifecycle
    // ─────────────────────────────────────────────────────────────────────────
    /// Regular tick; drains finished fetches
    Tick,
    /// Terminal was resized
    Resize(u16, u16),
    /// Force quit without confirmation
    ForceQuit,

    // ─────────────────────────────────────────────────────────────────────────
    // Lineage
    // ─────────────────────────────────────────────────────────────────────────
    Lineage(LineageCommand),

    // ─────────────────────────────────────────────────────────────────────────
    // Navigation
    // ─────────────────────────────────────────────────────────────────────────
    /// Select the nearest node in a direction
    SelectNeighbour(MoveDirection),
    /// Select the root entity
    SelectRoot,
    /// Cycle through the edges touching the selected node
    NextEdge,
    /// Cycle through the columns of the selected node
    NextColumn,
    /// Show the selection in the drawer
    OpenDrawer,
    /// Load one more hop from the selected node
    Expand(EdgeDirection),
    /// Hide what only the selected node feeds in a direction
    Collapse(EdgeDirection),

    // ─────────────────────────────────────────────────────────────────────────
    // Viewport
    // ─────────────────────────────────────────────────────────────────────────
    ZoomIn,
    ZoomOut,
    /// Pan by a number of cells
    Pan(i16, i16),
    FitView,

    // ─────────────────────────────────────────────────────────────────────────
    // Drawer
    // ─────────────────────────────────────────────────────────────────────────
    ScrollUp,
    ScrollDown,
    PageUp,
    PageDown,

    // ─────────────────────────────────────────────────────────────────────────
    // Editing
    // ─────────────────────────────────────────────────────────────────────────
    ToggleEditMode,
    /// Nudge the selected node by a number of cells
    MoveNode(i16, i16),
    /// Mark the selection as connection source, or connect to it
    MarkConnection,
    /// Remove the selected node, edge or column sub-edge
    RemoveSelected,

    // ─────────────────────────────────────────────────────────────────────────
    // Modals
    // ─────────────────────────────────────────────────────────────────────────
    /// Open quit confirmation dialog
    OpenQuitDialog,
    /// Open help dialog
    OpenHelp,
    /// Open depth settings
    OpenConfigDialog,
    /// Open the entity type palette (edit mode)
    OpenNodePalette,
    /// Open the FQN input for the selected placeholder
    OpenEntitySearch,
    /// Open the pipeline input for the selected edge
    OpenPipelineInput,
    /// Open the query filter input
    OpenQueryFilter,
    /// Close current modal
    CloseModal,
    /// Confirm modal action
    ConfirmModal,
    /// Navigate up in modal
    ModalUp,
    /// Navigate down in modal
    ModalDown,
    /// Adjust the focused value in modal
    ModalAdjust(i32),
    /// Text typed into an input modal
    ModalInput(char),
    ModalBackspace,

    // ─────────────────────────────────────────────────────────────────────────
    // Other
    // ─────────────────────────────────────────────────────────────────────────
    /// Switch to the next overlay layer
    CycleLayer,
    /// Write the loaded edges to CSV
    ExportCsv,
    /// Clear the error and notice shown in the status bar
    DismissMessage,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Tick => write!(f, "Tick"),
            Action::Resize(w, h) => write!(f, "Resize({}, {})", w, h),
            Action::ForceQuit => write!(f, "ForceQuit"),
            Action::Lineage(command) => write!(f, "Lineage({:?})", command),
            Action::SelectNeighbour(direction) => write!(f, "SelectNeighbour({:?})", direction),
            Action::SelectRoot => write!(f, "SelectRoot"),
            Action::NextEdge => write!(f, "NextEdge"),
            Action::NextColumn => write!(f, "NextColumn"),
            Action::OpenDrawer => write!(f, "OpenDrawer"),
            Action::Expand(direction) => write!(f, "Expand({})", direction),
            Action::Collapse(direction) => write!(f, "Collapse({})", direction),
            Action::ZoomIn => write!(f, "ZoomIn"),
            Action::ZoomOut => write!(f, "ZoomOut"),
            Action::Pan(dx, dy) => write!(f, "Pan({}, {})", dx, dy),
            Action::FitView => write!(f, "FitView"),
            Action::ScrollUp => write!(f, "ScrollUp"),
            Action::ScrollDown => write!(f, "ScrollDown"),
            Action::PageUp => write!(f, "PageUp"),
            Action::PageDown => write!(f, "PageDown"),
            Action::ToggleEditMode => write!(f, "ToggleEditMode"),
            Action::MoveNode(dx, dy) => write!(f, "MoveNode({}, {})", dx, dy),
            Action::MarkConnection => write!(f, "MarkConnection"),
            Action::RemoveSelected => write!(f, "RemoveSelected"),
            Action::OpenQuitDialog => write!(f, "OpenQuitDialog"),
            Action::OpenHelp => write!(f, "OpenHelp"),
            Action::OpenConfigDialog => write!(f, "OpenConfigDialog"),
            Action::OpenNodePalette => write!(f, "OpenNodePalette"),
            Action::OpenEntitySearch => write!(f, "OpenEntitySearch"),
            Action::OpenPipelineInput => write!(f, "OpenPipelineInput"),
            Action::OpenQueryFilter => write!(f, "OpenQueryFilter"),
            Action::CloseModal => write!(f, "CloseModal"),
            Action::ConfirmModal => write!(f, "ConfirmModal"),
            Action::ModalUp => write!(f, "ModalUp"),
            Action::ModalDown => write!(f, "ModalDown"),
            Action::ModalAdjust(delta) => write!(f, "ModalAdjust({})", delta),
            Action::ModalInput(c) => write!(f, "ModalInput({})", c),
            Action::ModalBackspace => write!(f, "ModalBackspace"),
            Action::CycleLayer => write!(f, "CycleLayer"),
            Action::ExportCsv => write!(f, "ExportCsv"),
            Action::DismissMessage => write!(f, "DismissMessage"),
        }
    }
}
