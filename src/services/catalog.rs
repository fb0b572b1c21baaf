//! Offline catalog backend
//!
//! Serves lineage from a JSON or YAML snapshot file. Edits made through the
//! API are applied in memory and written back to the same file.

use super::api::{LineageApi, LineageQuery};
use crate::error::{LineageError, Result};
use crate::model::entity::{EdgeDetails, EntityLineageResponse, LineageEntity, PipelineStatus};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SnapshotFormat {
    Json,
    Yaml,
}

impl SnapshotFormat {
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => SnapshotFormat::Yaml,
            _ => SnapshotFormat::Json,
        }
    }
}

/// Contents of a catalog snapshot file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub entities: Vec<LineageEntity>,
    #[serde(default)]
    pub edges: Vec<EdgeDetails>,
    /// Pipeline FQN to its recorded runs
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub pipeline_status: HashMap<String, Vec<PipelineStatus>>,
}

impl CatalogSnapshot {
    fn entity(&self, id: &str) -> Option<&LineageEntity> {
        self.entities.iter().find(|e| e.id() == id)
    }

    /// Breadth-first walk from `root` in one direction
    ///
    /// Stops after `depth` hops. At most `per_layer` new nodes are taken
    /// from each layer, and nodes rejected by `filter` are neither returned
    /// nor walked through.
    fn walk(
        &self,
        root: &str,
        upstream: bool,
        depth: u32,
        per_layer: usize,
        filter: &dyn Fn(&LineageEntity) -> bool,
    ) -> Vec<String> {
        let mut visited: HashSet<String> = HashSet::from([root.to_string()]);
        let mut found = Vec::new();
        let mut frontier = vec![root.to_string()];

        for _ in 0..depth {
            let mut layer = Vec::new();
            for current in &frontier {
                let neighbours = self.edges.iter().filter_map(|e| {
                    let (from, to) = e.key();
                    match upstream {
                        true if to == current.as_str() => Some(from),
                        false if from == current.as_str() => Some(to),
                        _ => None,
                    }
                });
                for next in neighbours {
                    if layer.len() >= per_layer {
                        break;
                    }
                    let Some(entity) = self.entity(next) else {
                        continue;
                    };
                    if !filter(entity) || !visited.insert(next.to_string()) {
                        continue;
                    }
                    layer.push(next.to_string());
                }
            }
            if layer.is_empty() {
                break;
            }
            found.extend(layer.iter().cloned());
            frontier = layer;
        }
        found
    }
}

fn matches_filter(entity: &LineageEntity, filter: &str) -> bool {
    let needle = filter.to_lowercase();
    entity.fqn().to_lowercase().contains(&needle)
        || entity.reference.label().to_lowercase().contains(&needle)
}

/// Lineage API backed by a snapshot file
pub struct CatalogApi {
    path: PathBuf,
    format: SnapshotFormat,
    snapshot: RwLock<CatalogSnapshot>,
}

impl CatalogApi {
    pub fn open(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let format = SnapshotFormat::from_path(path);
        let snapshot: CatalogSnapshot = match format {
            SnapshotFormat::Json => serde_json::from_str(&contents)?,
            SnapshotFormat::Yaml => serde_yaml::from_str(&contents)?,
        };

        info!(
            path = %path.display(),
            entities = snapshot.entities.len(),
            edges = snapshot.edges.len(),
            "opened catalog snapshot"
        );

        Ok(Self {
            path: path.to_path_buf(),
            format,
            snapshot: RwLock::new(snapshot),
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, CatalogSnapshot>> {
        self.snapshot
            .read()
            .map_err(|_| LineageError::Io("catalog lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, CatalogSnapshot>> {
        self.snapshot
            .write()
            .map_err(|_| LineageError::Io("catalog lock poisoned".to_string()))
    }

    fn save(&self, snapshot: &CatalogSnapshot) -> Result<()> {
        let contents = match self.format {
            SnapshotFormat::Json => serde_json::to_string_pretty(snapshot)?,
            SnapshotFormat::Yaml => serde_yaml::to_string(snapshot)?,
        };
        fs::write(&self.path, contents)?;
        debug!(path = %self.path.display(), "catalog snapshot written");
        Ok(())
    }
}

impl LineageApi for CatalogApi {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn get_lineage(&self, query: &LineageQuery) -> Result<EntityLineageResponse> {
        let snapshot = self.read()?;
        let root = snapshot
            .entities
            .iter()
            .find(|e| e.fqn() == query.fqn && e.entity_type() == query.entity_type)
            .ok_or_else(|| LineageError::NotFound(format!("{} {}", query.entity_type, query.fqn)))?;

        let filter_text = query.query_filter.clone().unwrap_or_default();
        let filter = |entity: &LineageEntity| filter_text.is_empty() || matches_filter(entity, &filter_text);
        let per_layer = query.config.nodes_per_layer.max(1) as usize;

        let mut ids = snapshot.walk(root.id(), true, query.config.upstream_depth, per_layer, &filter);
        for id in snapshot.walk(root.id(), false, query.config.downstream_depth, per_layer, &filter) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }

        let mut included: HashSet<&str> = ids.iter().map(String::as_str).collect();
        included.insert(root.id());

        let mut response = EntityLineageResponse::new(root.clone());
        response.nodes = ids
            .iter()
            .filter_map(|id| snapshot.entity(id))
            .cloned()
            .collect();
        response.edges = snapshot
            .edges
            .iter()
            .filter(|e| {
                let (from, to) = e.key();
                included.contains(from) && included.contains(to)
            })
            .cloned()
            .collect();

        Ok(response)
    }

    fn get_pipeline_status(&self, fqn: &str) -> Result<Option<PipelineStatus>> {
        let snapshot = self.read()?;
        Ok(snapshot
            .pipeline_status
            .get(fqn)
            .and_then(|runs| runs.iter().max_by_key(|s| s.timestamp))
            .cloned())
    }

    fn add_lineage(&self, edge: &EdgeDetails) -> Result<()> {
        let mut snapshot = self.write()?;
        for endpoint in [&edge.from_entity, &edge.to_entity] {
            if snapshot.entity(&endpoint.id).is_none() {
                return Err(LineageError::NotFound(format!("entity {}", endpoint.id)));
            }
        }

        match snapshot.edges.iter_mut().find(|e| e.key() == edge.key()) {
            Some(existing) => *existing = edge.clone(),
            None => snapshot.edges.push(edge.clone()),
        }
        self.save(&snapshot)
    }

    fn delete_lineage(&self, edge: &EdgeDetails) -> Result<()> {
        let mut snapshot = self.write()?;
        let before = snapshot.edges.len();
        snapshot.edges.retain(|e| e.key() != edge.key());
        if snapshot.edges.len() == before {
            return Err(LineageError::NotFound(format!(
                "edge {} -> {}",
                edge.from_entity.fqn, edge.to_entity.fqn
            )));
        }
        self.save(&snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::entity::{EntityType, StatusType};
    use crate::model::view::LineageConfig;

    fn table(id: &str) -> LineageEntity {
        LineageEntity::new(id, EntityType::Table, &format!("wh.{}", id))
    }

    /// up2 -> up1 -> root -> down1 -> down2, plus other -> down1
    fn snapshot() -> CatalogSnapshot {
        let ids = ["up2", "up1", "root", "down1", "down2", "other"];
        let entities: Vec<LineageEntity> = ids.iter().map(|id| table(id)).collect();
        let edge = |from: &str, to: &str| EdgeDetails::between(&table(from), &table(to));
        CatalogSnapshot {
            entities,
            edges: vec![
                edge("up2", "up1"),
                edge("up1", "root"),
                edge("root", "down1"),
                edge("down1", "down2"),
                edge("other", "down1"),
            ],
            pipeline_status: HashMap::new(),
        }
    }

    fn write_catalog(dir: &Path, name: &str, snapshot: &CatalogSnapshot) -> PathBuf {
        let path = dir.join(name);
        let contents = if name.ends_with(".yaml") {
            serde_yaml::to_string(snapshot).unwrap()
        } else {
            serde_json::to_string(snapshot).unwrap()
        };
        fs::write(&path, contents).unwrap();
        path
    }

    fn query(upstream: u32, downstream: u32) -> LineageQuery {
        LineageQuery::new(
            "wh.root",
            EntityType::Table,
            LineageConfig {
                upstream_depth: upstream,
                downstream_depth: downstream,
                nodes_per_layer: 50,
            },
        )
    }

    fn node_ids(response: &EntityLineageResponse) -> Vec<&str> {
        response.nodes.iter().map(|n| n.id()).collect()
    }

    #[test]
    fn test_lineage_respects_depths() {
        let dir = tempfile::tempdir().unwrap();
        let api = CatalogApi::open(&write_catalog(dir.path(), "catalog.json", &snapshot())).unwrap();

        let response = api.get_lineage(&query(1, 1)).unwrap();
        assert_eq!(response.entity.id(), "root");
        assert_eq!(node_ids(&response), vec!["up1", "down1"]);
        assert_eq!(response.edges.len(), 2);

        let response = api.get_lineage(&query(3, 0)).unwrap();
        assert_eq!(node_ids(&response), vec!["up1", "up2"]);

        let response = api.get_lineage(&query(0, 0)).unwrap();
        assert!(response.nodes.is_empty());
        assert!(response.edges.is_empty());
    }

    #[test]
    fn test_lineage_honors_query_filter() {
        let dir = tempfile::tempdir().unwrap();
        let api = CatalogApi::open(&write_catalog(dir.path(), "catalog.yaml", &snapshot())).unwrap();

        let mut q = query(3, 3);
        q.query_filter = Some("UP".to_string());
        let response = api.get_lineage(&q).unwrap();
        assert_eq!(node_ids(&response), vec!["up1", "up2"]);
    }

    #[test]
    fn test_lineage_limits_nodes_per_layer() {
        let mut snap = snapshot();
        snap.entities.push(table("down1b"));
        snap.edges.push(EdgeDetails::between(&table("root"), &table("down1b")));
        let dir = tempfile::tempdir().unwrap();
        let api = CatalogApi::open(&write_catalog(dir.path(), "catalog.json", &snap)).unwrap();

        let mut q = query(0, 1);
        q.config.nodes_per_layer = 1;
        assert_eq!(api.get_lineage(&q).unwrap().nodes.len(), 1);
    }

    #[test]
    fn test_unknown_entity_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let api = CatalogApi::open(&write_catalog(dir.path(), "catalog.json", &snapshot())).unwrap();

        let mut q = query(1, 1);
        q.fqn = "wh.nope".to_string();
        assert!(matches!(api.get_lineage(&q), Err(LineageError::NotFound(_))));

        // Right FQN, wrong type
        let mut q = query(1, 1);
        q.entity_type = EntityType::Topic;
        assert!(matches!(api.get_lineage(&q), Err(LineageError::NotFound(_))));
    }

    #[test]
    fn test_unparseable_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(CatalogApi::open(&path), Err(LineageError::Parse(_))));
        assert!(matches!(
            CatalogApi::open(&dir.path().join("missing.json")),
            Err(LineageError::Io(_))
        ));
    }

    #[test]
    fn test_edits_are_written_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_catalog(dir.path(), "catalog.yaml", &snapshot());
        let api = CatalogApi::open(&path).unwrap();

        let new_edge = EdgeDetails::between(&table("other"), &table("root"));
        api.add_lineage(&new_edge).unwrap();
        api.delete_lineage(&EdgeDetails::between(&table("up1"), &table("root"))).unwrap();

        let reopened = CatalogApi::open(&path).unwrap();
        let response = reopened.get_lineage(&query(1, 0)).unwrap();
        assert_eq!(node_ids(&response), vec!["other"]);

        let ghost = EdgeDetails::between(&table("ghost"), &table("root"));
        assert!(matches!(api.add_lineage(&ghost), Err(LineageError::NotFound(_))));
        assert!(matches!(
            api.delete_lineage(&EdgeDetails::between(&table("up2"), &table("root"))),
            Err(LineageError::NotFound(_))
        ));
    }

    #[test]
    fn test_pipeline_status_returns_latest_run() {
        let mut snap = snapshot();
        let run = |execution_status, timestamp| PipelineStatus {
            execution_status,
            timestamp,
            task_status: Vec::new(),
        };
        snap.pipeline_status.insert(
            "airflow.etl".to_string(),
            vec![run(StatusType::Failed, 100), run(StatusType::Successful, 200)],
        );
        let dir = tempfile::tempdir().unwrap();
        let api = CatalogApi::open(&write_catalog(dir.path(), "catalog.json", &snap)).unwrap();

        let status = api.get_pipeline_status("airflow.etl").unwrap().unwrap();
        assert_eq!(status.execution_status, StatusType::Successful);
        assert!(api.get_pipeline_status("airflow.none").unwrap().is_none());
    }
}
