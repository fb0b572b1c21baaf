//! CSV export of the loaded lineage edges

use crate::error::{LineageError, Result};
use crate::model::graph::LineageGraph;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// One exported row; column sub-edges get a row each
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EdgeRow<'a> {
    from_entity_fqn: &'a str,
    from_entity_type: &'a str,
    to_entity_fqn: &'a str,
    to_entity_type: &'a str,
    from_column: String,
    to_column: String,
    pipeline: &'a str,
}

/// Write every edge of `graph` to `path`, returning the number of rows
pub fn export_edges(graph: &LineageGraph, path: &Path) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    let mut rows = 0;

    for edge in &graph.edges {
        let details = &edge.details;
        let pipeline = details
            .pipeline
            .as_ref()
            .map(|p| p.fully_qualified_name.as_str())
            .unwrap_or("");

        let mut pairs = details.column_pairs();
        if pairs.is_empty() {
            pairs.push((String::new(), String::new()));
        }

        for (from_column, to_column) in pairs {
            writer
                .serialize(EdgeRow {
                    from_entity_fqn: &details.from_entity.fqn,
                    from_entity_type: details.from_entity.entity_type.as_str(),
                    to_entity_fqn: &details.to_entity.fqn,
                    to_entity_type: details.to_entity.entity_type.as_str(),
                    from_column,
                    to_column,
                    pipeline,
                })
                .map_err(csv_error)?;
            rows += 1;
        }
    }

    writer.flush()?;
    info!(path = %path.display(), rows, "exported lineage edges");
    Ok(rows)
}

fn csv_error(err: csv::Error) -> LineageError {
    LineageError::Io(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::entity::{EntityLineageResponse, EntityReference, EntityType, LineageEntity};

    #[test]
    fn test_export_flattens_column_edges() {
        let a = LineageEntity::new("a", EntityType::Table, "wh.a").with_columns(&["id", "name"]);
        let b = LineageEntity::new("b", EntityType::Dashboard, "bi.b").with_columns(&["id", "name"]);
        let c = LineageEntity::new("c", EntityType::Table, "wh.c");
        let mut response = EntityLineageResponse::new(a.clone());
        response.nodes = vec![b.clone(), c.clone()];

        let mut ab = crate::model::entity::EdgeDetails::between(&a, &b);
        ab.add_column_pair("wh.a.id", "bi.b.id");
        ab.add_column_pair("wh.a.name", "bi.b.name");
        let mut ac = crate::model::entity::EdgeDetails::between(&a, &c);
        ac.pipeline = Some(EntityReference::new("p", EntityType::Pipeline, "airflow.copy"));
        response.edges = vec![ab, ac];
        let graph = LineageGraph::from_response(&response);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lineage.csv");
        assert_eq!(export_edges(&graph, &path).unwrap(), 3);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(|s| s.to_string()).collect();
        assert_eq!(headers[0], "fromEntityFqn");
        let rows: Vec<Vec<String>> = reader
            .records()
            .map(|r| r.unwrap().iter().map(|s| s.to_string()).collect())
            .collect();
        assert_eq!(rows[0][4], "wh.a.id");
        assert_eq!(rows[1][5], "bi.b.name");
        assert_eq!(rows[2][6], "airflow.copy");
        assert_eq!(rows[2][4], "");
    }
}
