//! REST client for an OpenMetadata-style lineage server

use super::api::{LineageApi, LineageQuery};
use crate::error::{LineageError, Result};
use crate::model::entity::{ColumnLineage, EdgeDetails, EntityLineageResponse, PipelineStatus};
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT_SECS: u64 = 30;
/// How far back pipeline runs are looked up
const STATUS_WINDOW_DAYS: i64 = 30;

/// Lineage API served over HTTP with optional bearer token auth
pub struct HttpLineageApi {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpLineageApi {
    pub fn new(base_url: &str, token: Option<String>) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.header("Accept", "application/json");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and turn transport failures and error statuses into `LineageError`
    fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response> {
        let response = self
            .authorized(builder)
            .send()
            .map_err(|e| LineageError::Network(format!("{}: {}", what, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().unwrap_or_default();
        warn!(%status, what, "lineage server returned an error");
        Err(classify_status(status, what, &body))
    }

    fn decode<T: serde::de::DeserializeOwned>(response: Response, what: &str) -> Result<T> {
        response
            .json()
            .map_err(|e| LineageError::Malformed(format!("{}: {}", what, e)))
    }
}

impl LineageApi for HttpLineageApi {
    fn describe(&self) -> String {
        self.base_url.clone()
    }

    fn get_lineage(&self, query: &LineageQuery) -> Result<EntityLineageResponse> {
        let mut params = vec![
            ("fqn", query.fqn.clone()),
            ("type", query.entity_type.as_str().to_string()),
            ("upstreamDepth", query.config.upstream_depth.to_string()),
            ("downstreamDepth", query.config.downstream_depth.to_string()),
            ("size", query.config.nodes_per_layer.to_string()),
            ("includeDeleted", "false".to_string()),
        ];
        if let Some(filter) = &query.query_filter {
            params.push(("query_filter", filter.clone()));
        }

        let what = format!("lineage of {}", query.fqn);
        debug!(fqn = %query.fqn, "GET lineage");
        let request = self.http.get(self.url("/lineage/getLineage")).query(&params);
        let response = self.send(request, &what)?;
        Self::decode(response, &what)
    }

    fn get_pipeline_status(&self, fqn: &str) -> Result<Option<PipelineStatus>> {
        let end = Utc::now();
        let start = end - ChronoDuration::days(STATUS_WINDOW_DAYS);
        let path = status_path(fqn);
        let what = format!("status of {}", fqn);

        let request = self.http.get(self.url(&path)).query(&[
            ("startTs", start.timestamp_millis().to_string()),
            ("endTs", end.timestamp_millis().to_string()),
        ]);
        let page: StatusPage = Self::decode(self.send(request, &what)?, &what)?;
        Ok(latest_status(page.data))
    }

    fn add_lineage(&self, edge: &EdgeDetails) -> Result<()> {
        let what = format!(
            "add lineage {} -> {}",
            edge.from_entity.fqn, edge.to_entity.fqn
        );
        let request = self.http.put(self.url("/lineage")).json(&AddLineageRequest::from(edge));
        self.send(request, &what).map(|_| ())
    }

    fn delete_lineage(&self, edge: &EdgeDetails) -> Result<()> {
        let path = delete_path(edge);
        let what = format!(
            "delete lineage {} -> {}",
            edge.from_entity.fqn, edge.to_entity.fqn
        );
        self.send(self.http.delete(self.url(&path)), &what).map(|_| ())
    }
}

fn classify_status(status: StatusCode, what: &str, body: &str) -> LineageError {
    let snippet: String = body.chars().take(200).collect();
    match status {
        StatusCode::NOT_FOUND => LineageError::NotFound(what.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            LineageError::PermissionDenied(format!("{}: {}", what, snippet))
        }
        _ => LineageError::Network(format!("{} returned {}: {}", what, status, snippet)),
    }
}

fn latest_status(mut statuses: Vec<PipelineStatus>) -> Option<PipelineStatus> {
    statuses.sort_by_key(|s| s.timestamp);
    statuses.pop()
}

fn status_path(fqn: &str) -> String {
    format!("/pipelines/name/{}/status", urlencoding::encode(fqn))
}

fn delete_path(edge: &EdgeDetails) -> String {
    format!(
        "/lineage/{}/{}/{}/{}",
        edge.from_entity.entity_type.as_str(),
        urlencoding::encode(&edge.from_entity.id),
        edge.to_entity.entity_type.as_str(),
        urlencoding::encode(&edge.to_entity.id),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// Wire types
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct StatusPage {
    #[serde(default)]
    data: Vec<PipelineStatus>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct EntityRef {
    id: String,
    #[serde(rename = "type")]
    entity_type: String,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct LineageDetails {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    columns_lineage: Vec<ColumnLineage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pipeline: Option<EntityRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sql_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct EntitiesEdge {
    from_entity: EntityRef,
    to_entity: EntityRef,
    lineage_details: LineageDetails,
}

#[derive(Debug, Serialize, PartialEq)]
struct AddLineageRequest {
    edge: EntitiesEdge,
}

impl From<&EdgeDetails> for AddLineageRequest {
    fn from(edge: &EdgeDetails) -> Self {
        AddLineageRequest {
            edge: EntitiesEdge {
                from_entity: EntityRef {
                    id: edge.from_entity.id.clone(),
                    entity_type: edge.from_entity.entity_type.as_str().to_string(),
                },
                to_entity: EntityRef {
                    id: edge.to_entity.id.clone(),
                    entity_type: edge.to_entity.entity_type.as_str().to_string(),
                },
                lineage_details: LineageDetails {
                    columns_lineage: edge.columns.clone(),
                    pipeline: edge.pipeline.as_ref().map(|p| EntityRef {
                        id: p.id.clone(),
                        entity_type: p.entity_type.as_str().to_string(),
                    }),
                    sql_query: edge.sql_query.clone(),
                    description: edge.description.clone(),
                    source: edge.source.clone(),
                },
            },
        }
    }
}
