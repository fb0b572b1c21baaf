//! Model layer - centralized state management
//!
//! This module contains all state-related types:
//! - `LineageContext` - the lineage view store and its command API
//! - `LineageGraph` - nodes, edges and structural operations
//! - `ModalStack` - Modal overlay management

pub mod context;
pub mod edit;
pub mod entity;
pub mod graph;
pub mod modal;
pub mod trace;
pub mod view;

// Re-export commonly used types
pub use context::{
    EdgeSelection, FetchKind, FetchPayload, FetchRequest, FetchResponse, LineageCommand,
    LineageContext, ResolveTarget,
};
pub use edit::PendingChange;
pub use entity::{EntityLineageResponse, EntityType, LineageEntity, PipelineStatus};
pub use graph::{Connection, Edge, LineageGraph, Node};
pub use trace::EdgeDirection;
pub use view::{Bounds, LineageConfig, LineageLayerView, LoadingState, Viewport};
