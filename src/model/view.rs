//! View settings: overlay layer, fetch configuration, viewport and loading state

use super::graph::{Node, Position};
use super::trace::EdgeDirection;
use serde::{Deserialize, Serialize};

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 2.5;
pub const ZOOM_STEP: f64 = 0.1;

/// Overlay drawn on top of the lineage graph; exactly one is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineageLayerView {
    #[default]
    None,
    Column,
    DataQuality,
    Pipeline,
}

impl LineageLayerView {
    pub fn all() -> [LineageLayerView; 4] {
        [
            LineageLayerView::None,
            LineageLayerView::Column,
            LineageLayerView::DataQuality,
            LineageLayerView::Pipeline,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            LineageLayerView::None => "Entities",
            LineageLayerView::Column => "Columns",
            LineageLayerView::DataQuality => "Data Quality",
            LineageLayerView::Pipeline => "Pipelines",
        }
    }

    /// The layer after this one, wrapping around
    pub fn next(&self) -> LineageLayerView {
        let all = Self::all();
        let index = all.iter().position(|l| l == self).unwrap_or(0);
        all[(index + 1) % all.len()]
    }
}

/// How much of the graph a lineage fetch covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageConfig {
    pub upstream_depth: u32,
    pub downstream_depth: u32,
    pub nodes_per_layer: u32,
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self {
            upstream_depth: 3,
            downstream_depth: 3,
            nodes_per_layer: 50,
        }
    }
}

impl LineageConfig {
    /// One hop in `direction`, none in the other
    pub fn single_hop(&self, direction: EdgeDirection) -> LineageConfig {
        let (upstream_depth, downstream_depth) = match direction {
            EdgeDirection::Upstream => (1, 0),
            EdgeDirection::Downstream => (0, 1),
        };
        LineageConfig {
            upstream_depth,
            downstream_depth,
            nodes_per_layer: self.nodes_per_layer,
        }
    }

    /// The entity alone, used to resolve an FQN to a reference
    pub fn entity_only() -> LineageConfig {
        LineageConfig {
            upstream_depth: 0,
            downstream_depth: 0,
            nodes_per_layer: 1,
        }
    }
}

/// Loading status of the last lineage fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadingState {
    #[default]
    Initial,
    Waiting,
    Success,
    Failed,
}

/// Screen rectangle the graph is drawn into
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Pan and zoom of the graph canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

impl Viewport {
    /// Convert a screen point inside `bounds` to graph coordinates
    pub fn project(&self, screen_x: f64, screen_y: f64, bounds: Bounds) -> Position {
        let zoom = if self.zoom > 0.0 { self.zoom } else { 1.0 };
        Position {
            x: (screen_x - bounds.left - self.x) / zoom,
            y: (screen_y - bounds.top - self.y) / zoom,
        }
    }

    /// Viewport that shows every node inside `bounds`, clamped to the zoom range
    pub fn fit(nodes: &[Node], bounds: Bounds, padding: f64) -> Viewport {
        if nodes.is_empty() || bounds.width <= 0.0 || bounds.height <= 0.0 {
            return Viewport::default();
        }

        let min_x = nodes.iter().map(|n| n.position.x).fold(f64::INFINITY, f64::min);
        let max_x = nodes.iter().map(|n| n.position.x).fold(f64::NEG_INFINITY, f64::max);
        let min_y = nodes.iter().map(|n| n.position.y).fold(f64::INFINITY, f64::min);
        let max_y = nodes.iter().map(|n| n.position.y).fold(f64::NEG_INFINITY, f64::max);

        let graph_width = (max_x - min_x) + padding * 2.0;
        let graph_height = (max_y - min_y) + padding * 2.0;
        let zoom = (bounds.width / graph_width)
            .min(bounds.height / graph_height)
            .clamp(MIN_ZOOM, MAX_ZOOM);

        let center_x = (min_x + max_x) / 2.0;
        let center_y = (min_y + max_y) / 2.0;

        Viewport {
            x: bounds.width / 2.0 - center_x * zoom,
            y: bounds.height / 2.0 - center_y * zoom,
            zoom,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::entity::{EntityType, LineageEntity};
    use crate::model::graph::NodeKind;

    fn node_at(id: &str, x: f64, y: f64) -> Node {
        Node {
            id: id.to_string(),
            position: Position { x, y },
            entity: LineageEntity::new(id, EntityType::Table, id),
            kind: NodeKind::Default,
            is_root: false,
            is_new: false,
        }
    }

    #[test]
    fn test_layer_cycle_wraps() {
        assert_eq!(LineageLayerView::None.next(), LineageLayerView::Column);
        assert_eq!(LineageLayerView::Pipeline.next(), LineageLayerView::None);
    }

    #[test]
    fn test_layer_serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&LineageLayerView::DataQuality).unwrap();
        assert_eq!(json, "\"DATA_QUALITY\"");
    }

    #[test]
    fn test_single_hop_keeps_nodes_per_layer() {
        let config = LineageConfig {
            upstream_depth: 5,
            downstream_depth: 2,
            nodes_per_layer: 20,
        };
        let hop = config.single_hop(EdgeDirection::Upstream);
        assert_eq!((hop.upstream_depth, hop.downstream_depth, hop.nodes_per_layer), (1, 0, 20));
    }

    #[test]
    fn test_project_accounts_for_pan_and_zoom() {
        let viewport = Viewport {
            x: 10.0,
            y: 20.0,
            zoom: 2.0,
        };
        let bounds = Bounds {
            left: 100.0,
            top: 50.0,
            width: 800.0,
            height: 600.0,
        };
        let position = viewport.project(150.0, 110.0, bounds);
        assert_eq!(position, Position { x: 20.0, y: 20.0 });
    }

    #[test]
    fn test_fit_centers_nodes() {
        let nodes = vec![node_at("a", 0.0, 0.0), node_at("b", 100.0, 100.0)];
        let bounds = Bounds {
            left: 0.0,
            top: 0.0,
            width: 200.0,
            height: 200.0,
        };
        let viewport = Viewport::fit(&nodes, bounds, 0.0);
        assert!((viewport.zoom - 2.0).abs() < 1e-9);
        assert!((viewport.x - 0.0).abs() < 1e-9);
        assert!((viewport.y - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_empty_graph_is_default() {
        assert_eq!(Viewport::fit(&[], Bounds::default(), 10.0), Viewport::default());
    }
}
