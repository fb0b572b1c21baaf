//! Modal stack for managing overlays
//!
//! Dialogs are an enum-based stack; only the top modal receives input.

use super::view::LineageConfig;

const MAX_DEPTH: i64 = 10;
const MAX_NODES_PER_LAYER: i64 = 500;

/// Which lineage-config field has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigField {
    #[default]
    Upstream,
    Downstream,
    NodesPerLayer,
}

impl ConfigField {
    pub fn next(&self) -> ConfigField {
        match self {
            ConfigField::Upstream => ConfigField::Downstream,
            ConfigField::Downstream => ConfigField::NodesPerLayer,
            ConfigField::NodesPerLayer => ConfigField::Upstream,
        }
    }

    pub fn prev(&self) -> ConfigField {
        match self {
            ConfigField::Upstream => ConfigField::NodesPerLayer,
            ConfigField::Downstream => ConfigField::Upstream,
            ConfigField::NodesPerLayer => ConfigField::Downstream,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConfigField::Upstream => "Upstream depth",
            ConfigField::Downstream => "Downstream depth",
            ConfigField::NodesPerLayer => "Nodes per layer",
        }
    }

    pub fn value(&self, config: &LineageConfig) -> u32 {
        match self {
            ConfigField::Upstream => config.upstream_depth,
            ConfigField::Downstream => config.downstream_depth,
            ConfigField::NodesPerLayer => config.nodes_per_layer,
        }
    }

    /// Step the focused value by `delta`, staying inside its range
    pub fn adjust(&self, config: &mut LineageConfig, delta: i32) {
        let (value, step, min, max) = match self {
            ConfigField::Upstream => (&mut config.upstream_depth, 1, 0, MAX_DEPTH),
            ConfigField::Downstream => (&mut config.downstream_depth, 1, 0, MAX_DEPTH),
            ConfigField::NodesPerLayer => (&mut config.nodes_per_layer, 5, 1, MAX_NODES_PER_LAYER),
        };
        let next = *value as i64 + delta as i64 * step;
        *value = next.clamp(min, max) as u32;
    }
}

/// Represents a modal overlay that can be displayed on top of the main UI
#[derive(Debug, Clone, PartialEq)]
pub enum Modal {
    QuitConfirm,
    /// Help dialog showing all keyboard shortcuts
    Help,
    /// Depth and page-size settings, applied on confirm
    LineageConfig {
        draft: LineageConfig,
        field: ConfigField,
    },
    /// Entity type picker for a new node (edit mode)
    NodePalette { selected_index: usize },
    /// FQN input binding a placeholder node to an entity
    EntitySearch { node_id: String, input: String },
    /// FQN input binding a pipeline to an edge
    PipelineInput { edge_id: String, input: String },
    /// Search query restricting which nodes a lineage fetch returns
    QueryFilter { input: String },
}

impl Modal {
    /// Text buffer of input modals
    pub fn input_mut(&mut self) -> Option<&mut String> {
        match self {
            Modal::EntitySearch { input, .. }
            | Modal::PipelineInput { input, .. }
            | Modal::QueryFilter { input } => Some(input),
            _ => None,
        }
    }
}

/// A stack of modal overlays
///
/// Modals are rendered from bottom to top, with only the top modal
/// receiving input events.
#[derive(Debug, Default)]
pub struct ModalStack {
    stack: Vec<Modal>,
}

impl ModalStack {
    pub fn new() -> Self {
        Self { stack: Vec::new() }
    }

    pub fn push(&mut self, modal: Modal) {
        self.stack.push(modal);
    }

    pub fn pop(&mut self) -> Option<Modal> {
        self.stack.pop()
    }

    pub fn top(&self) -> Option<&Modal> {
        self.stack.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut Modal> {
        self.stack.last_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modal_stack_push_pop() {
        let mut stack = ModalStack::new();
        assert!(stack.top().is_none());

        stack.push(Modal::QuitConfirm);
        stack.push(Modal::Help);

        assert_eq!(stack.pop(), Some(Modal::Help));
        assert_eq!(stack.pop(), Some(Modal::QuitConfirm));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_input_modal_buffer_is_editable() {
        let mut stack = ModalStack::new();
        stack.push(Modal::QueryFilter {
            input: String::new(),
        });

        if let Some(buffer) = stack.top_mut().and_then(Modal::input_mut) {
            buffer.push_str("tier:gold");
        }

        assert_eq!(
            stack.top(),
            Some(&Modal::QueryFilter {
                input: "tier:gold".to_string()
            })
        );
        assert!(Modal::QuitConfirm.input_mut().is_none());
    }

    #[test]
    fn test_config_field_cycles() {
        assert_eq!(ConfigField::NodesPerLayer.next(), ConfigField::Upstream);
        assert_eq!(ConfigField::Upstream.prev(), ConfigField::NodesPerLayer);
    }

    #[test]
    fn test_config_adjust_is_clamped() {
        let mut config = LineageConfig::default();
        ConfigField::Upstream.adjust(&mut config, 20);
        assert_eq!(config.upstream_depth, 10);
        ConfigField::Downstream.adjust(&mut config, -5);
        assert_eq!(config.downstream_depth, 0);

        ConfigField::NodesPerLayer.adjust(&mut config, 1);
        assert_eq!(config.nodes_per_layer, 55);
        ConfigField::NodesPerLayer.adjust(&mut config, -100);
        assert_eq!(ConfigField::NodesPerLayer.value(&config), 1);
    }
}
