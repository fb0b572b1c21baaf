//! Backend lineage API seam
//!
//! The context never calls a backend itself; the fetcher runs requests
//! against whichever `LineageApi` the app was started with.

use crate::error::Result;
use crate::model::entity::{EdgeDetails, EntityLineageResponse, EntityType, PipelineStatus};
use crate::model::view::LineageConfig;

/// Parameters of a lineage lookup
#[derive(Debug, Clone, PartialEq)]
pub struct LineageQuery {
    pub fqn: String,
    pub entity_type: EntityType,
    pub config: LineageConfig,
    pub query_filter: Option<String>,
}

impl LineageQuery {
    pub fn new(fqn: &str, entity_type: EntityType, config: LineageConfig) -> Self {
        LineageQuery {
            fqn: fqn.to_string(),
            entity_type,
            config,
            query_filter: None,
        }
    }
}

/// Operations a lineage backend provides
pub trait LineageApi: Send + Sync {
    /// Short description for the status bar, e.g. the server URL
    fn describe(&self) -> String;

    fn get_lineage(&self, query: &LineageQuery) -> Result<EntityLineageResponse>;

    /// Latest run of a pipeline, if it ever ran
    fn get_pipeline_status(&self, fqn: &str) -> Result<Option<PipelineStatus>>;

    /// Create or replace an edge
    fn add_lineage(&self, edge: &EdgeDetails) -> Result<()>;

    fn delete_lineage(&self, edge: &EdgeDetails) -> Result<()>;
}
