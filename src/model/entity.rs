//! Catalog payload types exchanged with the lineage backend

use crate::error::{LineageError, Result};
use chrono::{Local, TimeZone};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Matches one FQN segment: either a quoted name (which may contain dots) or a bare name
static FQN_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]*)"|([^.]+)"#).unwrap());

/// Split a fully-qualified name into its segments, honoring quoted segments
pub fn split_fqn(fqn: &str) -> Vec<String> {
    FQN_SEGMENT
        .captures_iter(fqn)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Entities
// ═══════════════════════════════════════════════════════════════════════════════

/// Kind of catalog entity that can take part in lineage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum EntityType {
    #[default]
    Table,
    Topic,
    Dashboard,
    DashboardDataModel,
    Container,
    Pipeline,
    Mlmodel,
    SearchIndex,
    StoredProcedure,
    Chart,
    ApiEndpoint,
}

impl EntityType {
    pub fn all() -> [EntityType; 11] {
        [
            EntityType::Table,
            EntityType::Topic,
            EntityType::Dashboard,
            EntityType::DashboardDataModel,
            EntityType::Container,
            EntityType::Pipeline,
            EntityType::Mlmodel,
            EntityType::SearchIndex,
            EntityType::StoredProcedure,
            EntityType::Chart,
            EntityType::ApiEndpoint,
        ]
    }

    /// Wire name used in query strings and URL paths
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Table => "table",
            EntityType::Topic => "topic",
            EntityType::Dashboard => "dashboard",
            EntityType::DashboardDataModel => "dashboardDataModel",
            EntityType::Container => "container",
            EntityType::Pipeline => "pipeline",
            EntityType::Mlmodel => "mlmodel",
            EntityType::SearchIndex => "searchIndex",
            EntityType::StoredProcedure => "storedProcedure",
            EntityType::Chart => "chart",
            EntityType::ApiEndpoint => "apiEndpoint",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntityType::Table => "Table",
            EntityType::Topic => "Topic",
            EntityType::Dashboard => "Dashboard",
            EntityType::DashboardDataModel => "Data Model",
            EntityType::Container => "Container",
            EntityType::Pipeline => "Pipeline",
            EntityType::Mlmodel => "ML Model",
            EntityType::SearchIndex => "Search Index",
            EntityType::StoredProcedure => "Stored Procedure",
            EntityType::Chart => "Chart",
            EntityType::ApiEndpoint => "API Endpoint",
        }
    }

    /// Get an icon/prefix for the entity type
    pub fn icon(&self) -> &'static str {
        match self {
            EntityType::Table => "▦",
            EntityType::Topic => "≋",
            EntityType::Dashboard => "◧",
            EntityType::DashboardDataModel => "◇",
            EntityType::Container => "▣",
            EntityType::Pipeline => "⇉",
            EntityType::Mlmodel => "◎",
            EntityType::SearchIndex => "⌕",
            EntityType::StoredProcedure => "ƒ",
            EntityType::Chart => "◔",
            EntityType::ApiEndpoint => "⇄",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        EntityType::all()
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown entity type '{}'", s))
    }
}

/// Reference to a catalog entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityReference {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub fully_qualified_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
}

impl EntityReference {
    pub fn new(id: &str, entity_type: EntityType, fqn: &str) -> Self {
        EntityReference {
            id: id.to_string(),
            entity_type,
            fully_qualified_name: fqn.to_string(),
            name: None,
            display_name: None,
            description: None,
            deleted: None,
        }
    }

    /// Display name, then name, then the last FQN segment
    pub fn label(&self) -> String {
        self.display_name
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| self.name.clone().filter(|s| !s.is_empty()))
            .or_else(|| split_fqn(&self.fully_qualified_name).pop())
            .unwrap_or_else(|| self.id.clone())
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.unwrap_or(false)
    }
}

/// A column of a tabular entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    pub fully_qualified_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

/// An entity as it appears in a lineage payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageEntity {
    #[serde(flatten)]
    pub reference: EntityReference,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<Column>,
}

impl LineageEntity {
    pub fn new(id: &str, entity_type: EntityType, fqn: &str) -> Self {
        LineageEntity {
            reference: EntityReference::new(id, entity_type, fqn),
            columns: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn with_columns(mut self, names: &[&str]) -> Self {
        let fqn = self.reference.fully_qualified_name.clone();
        self.columns = names
            .iter()
            .map(|name| Column {
                name: name.to_string(),
                fully_qualified_name: format!("{}.{}", fqn, name),
                data_type: None,
            })
            .collect();
        self
    }

    pub fn id(&self) -> &str {
        &self.reference.id
    }

    pub fn fqn(&self) -> &str {
        &self.reference.fully_qualified_name
    }

    pub fn entity_type(&self) -> EntityType {
        self.reference.entity_type
    }

    pub fn has_column(&self, column_fqn: &str) -> bool {
        self.columns
            .iter()
            .any(|c| c.fully_qualified_name == column_fqn)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Edges
// ═══════════════════════════════════════════════════════════════════════════════

/// One end of a lineage edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeEndpoint {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(default)]
    pub fqn: String,
}

impl EdgeEndpoint {
    pub fn from_entity(entity: &LineageEntity) -> Self {
        EdgeEndpoint {
            id: entity.id().to_string(),
            entity_type: entity.entity_type(),
            fqn: entity.fqn().to_string(),
        }
    }
}

/// Column-level sub-edge: `from_columns` feed `to_column`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnLineage {
    #[serde(default)]
    pub from_columns: Vec<String>,
    pub to_column: String,
}

/// A directed lineage relationship between two entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDetails {
    pub from_entity: EdgeEndpoint,
    pub to_entity: EdgeEndpoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<EntityReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnLineage>,
}

impl EdgeDetails {
    pub fn between(from: &LineageEntity, to: &LineageEntity) -> Self {
        EdgeDetails {
            from_entity: EdgeEndpoint::from_entity(from),
            to_entity: EdgeEndpoint::from_entity(to),
            pipeline: None,
            source: None,
            sql_query: None,
            description: None,
            columns: Vec::new(),
        }
    }

    pub fn key(&self) -> (&str, &str) {
        (&self.from_entity.id, &self.to_entity.id)
    }

    /// Every (from, to) column pair carried by this edge
    pub fn column_pairs(&self) -> Vec<(String, String)> {
        self.columns
            .iter()
            .flat_map(|c| {
                c.from_columns
                    .iter()
                    .map(move |from| (from.clone(), c.to_column.clone()))
            })
            .collect()
    }

    pub fn has_column_pair(&self, from: &str, to: &str) -> bool {
        self.columns
            .iter()
            .any(|c| c.to_column == to && c.from_columns.iter().any(|f| f == from))
    }

    /// Add a column pair; returns false when it was already present
    pub fn add_column_pair(&mut self, from: &str, to: &str) -> bool {
        if self.has_column_pair(from, to) {
            return false;
        }
        match self.columns.iter_mut().find(|c| c.to_column == to) {
            Some(existing) => existing.from_columns.push(from.to_string()),
            None => self.columns.push(ColumnLineage {
                from_columns: vec![from.to_string()],
                to_column: to.to_string(),
            }),
        }
        true
    }

    /// Remove a column pair; returns false when it was not present
    pub fn remove_column_pair(&mut self, from: &str, to: &str) -> bool {
        if !self.has_column_pair(from, to) {
            return false;
        }
        for lineage in &mut self.columns {
            if lineage.to_column == to {
                lineage.from_columns.retain(|f| f != from);
            }
        }
        self.columns.retain(|c| !c.from_columns.is_empty());
        true
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Responses
// ═══════════════════════════════════════════════════════════════════════════════

/// Lineage of one root entity as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityLineageResponse {
    pub entity: LineageEntity,
    #[serde(default)]
    pub nodes: Vec<LineageEntity>,
    #[serde(default)]
    pub edges: Vec<EdgeDetails>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upstream_edges: Vec<EdgeDetails>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub downstream_edges: Vec<EdgeDetails>,
}

impl EntityLineageResponse {
    pub fn new(entity: LineageEntity) -> Self {
        EntityLineageResponse {
            entity,
            nodes: Vec::new(),
            edges: Vec::new(),
            upstream_edges: Vec::new(),
            downstream_edges: Vec::new(),
        }
    }

    /// Reject payloads whose nodes or edges are missing identifying fields
    pub fn validate(&self) -> Result<()> {
        let check_entity = |entity: &LineageEntity| -> Result<()> {
            if entity.id().trim().is_empty() {
                return Err(LineageError::Malformed(format!(
                    "entity '{}' has no id",
                    entity.fqn()
                )));
            }
            if entity.fqn().trim().is_empty() {
                return Err(LineageError::Malformed(format!(
                    "entity '{}' has no fully qualified name",
                    entity.id()
                )));
            }
            Ok(())
        };

        check_entity(&self.entity)?;
        for node in &self.nodes {
            check_entity(node)?;
        }

        for edge in self.all_edges() {
            if edge.from_entity.id.trim().is_empty() || edge.to_entity.id.trim().is_empty() {
                return Err(LineageError::Malformed(format!(
                    "edge '{}' -> '{}' is missing an endpoint id",
                    edge.from_entity.fqn, edge.to_entity.fqn
                )));
            }
        }

        Ok(())
    }

    /// Root entity followed by the other nodes, first occurrence of each id wins
    pub fn unique_entities(&self) -> Vec<&LineageEntity> {
        let mut seen = HashSet::new();
        std::iter::once(&self.entity)
            .chain(self.nodes.iter())
            .filter(|e| seen.insert(e.id().to_string()))
            .collect()
    }

    /// `edges`, `upstreamEdges` and `downstreamEdges` merged, one per direction pair
    pub fn all_edges(&self) -> Vec<&EdgeDetails> {
        let mut seen = HashSet::new();
        self.edges
            .iter()
            .chain(self.upstream_edges.iter())
            .chain(self.downstream_edges.iter())
            .filter(|e| seen.insert((e.from_entity.id.clone(), e.to_entity.id.clone())))
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Pipeline Status
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome of a pipeline run or task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusType {
    Successful,
    Failed,
    Pending,
    Skipped,
}

impl StatusType {
    pub fn icon(&self) -> &'static str {
        match self {
            StatusType::Successful => "✓",
            StatusType::Failed => "✗",
            StatusType::Pending => "⏳",
            StatusType::Skipped => "↷",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    pub name: String,
    pub execution_status: StatusType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
}

/// Last known run of a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatus {
    pub execution_status: StatusType,
    /// Epoch milliseconds
    pub timestamp: i64,
    #[serde(default)]
    pub task_status: Vec<TaskStatus>,
}

impl PipelineStatus {
    pub fn formatted_time(&self) -> String {
        Local
            .timestamp_millis_opt(self.timestamp)
            .single()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_fqn_with_quoted_segment() {
        assert_eq!(
            split_fqn(r#"mysql.shop."sales.v2".orders"#),
            vec!["mysql", "shop", "sales.v2", "orders"]
        );
        assert_eq!(split_fqn("a.b.c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_entity_label_fallbacks() {
        let mut reference = EntityReference::new("1", EntityType::Table, "svc.db.schema.orders");
        assert_eq!(reference.label(), "orders");

        reference.name = Some("orders_tbl".to_string());
        assert_eq!(reference.label(), "orders_tbl");

        reference.display_name = Some("Orders".to_string());
        assert_eq!(reference.label(), "Orders");
    }

    #[test]
    fn test_entity_type_round_trips_wire_names() {
        assert_eq!("dashboardDataModel".parse::<EntityType>(), Ok(EntityType::DashboardDataModel));
        assert_eq!("TABLE".parse::<EntityType>(), Ok(EntityType::Table));
        assert!("warehouse".parse::<EntityType>().is_err());
    }

    #[test]
    fn test_parse_lineage_response_payload() {
        let payload = r#"{
            "entity": {"id": "a", "type": "table", "fullyQualifiedName": "svc.db.s.a",
                       "columns": [{"name": "id", "fullyQualifiedName": "svc.db.s.a.id"}]},
            "nodes": [{"id": "b", "type": "dashboard", "fullyQualifiedName": "looker.b"}],
            "edges": [{
                "fromEntity": {"id": "a", "type": "table", "fqn": "svc.db.s.a"},
                "toEntity": {"id": "b", "type": "dashboard", "fqn": "looker.b"},
                "columns": [{"fromColumns": ["svc.db.s.a.id"], "toColumn": "looker.b.id"}]
            }]
        }"#;

        let response: EntityLineageResponse = serde_json::from_str(payload).unwrap();
        assert!(response.validate().is_ok());
        assert_eq!(response.entity.columns.len(), 1);
        assert_eq!(response.nodes[0].entity_type(), EntityType::Dashboard);
        assert_eq!(
            response.edges[0].column_pairs(),
            vec![("svc.db.s.a.id".to_string(), "looker.b.id".to_string())]
        );
    }

    #[test]
    fn test_missing_required_field_is_rejected_by_parser() {
        let payload = r#"{"entity": {"id": "a", "type": "table"}}"#;
        assert!(serde_json::from_str::<EntityLineageResponse>(payload).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_ids() {
        let mut response = EntityLineageResponse::new(LineageEntity::new("a", EntityType::Table, "a"));
        response.nodes.push(LineageEntity::new("", EntityType::Table, "b"));
        assert!(matches!(response.validate(), Err(LineageError::Malformed(_))));
    }

    #[test]
    fn test_all_edges_merges_legacy_lists() {
        let a = LineageEntity::new("a", EntityType::Table, "a");
        let b = LineageEntity::new("b", EntityType::Table, "b");
        let c = LineageEntity::new("c", EntityType::Table, "c");
        let mut response = EntityLineageResponse::new(a.clone());
        response.edges.push(EdgeDetails::between(&a, &b));
        response.upstream_edges.push(EdgeDetails::between(&c, &a));
        response.downstream_edges.push(EdgeDetails::between(&a, &b));

        let keys: Vec<_> = response.all_edges().iter().map(|e| e.key()).collect();
        assert_eq!(keys, vec![("a", "b"), ("c", "a")]);
    }

    #[test]
    fn test_column_pair_add_and_remove() {
        let a = LineageEntity::new("a", EntityType::Table, "a");
        let b = LineageEntity::new("b", EntityType::Table, "b");
        let mut edge = EdgeDetails::between(&a, &b);

        assert!(edge.add_column_pair("a.x", "b.x"));
        assert!(edge.add_column_pair("a.y", "b.x"));
        assert!(!edge.add_column_pair("a.x", "b.x"));
        assert_eq!(edge.columns.len(), 1);

        assert!(edge.remove_column_pair("a.x", "b.x"));
        assert!(edge.remove_column_pair("a.y", "b.x"));
        assert!(edge.columns.is_empty());
        assert!(!edge.remove_column_pair("a.y", "b.x"));
    }
}
