//! Background fetch runner
//!
//! Runs each `FetchRequest` against the lineage API on its own thread and
//! hands the results back through a channel drained on every tick.

use super::api::{LineageApi, LineageQuery};
use crate::error::Result;
use crate::model::context::{FetchKind, FetchPayload, FetchRequest, FetchResponse};
use crate::model::edit::PendingChange;
use crate::model::view::LineageConfig;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

pub struct Fetcher {
    api: Arc<dyn LineageApi>,
    sender: Sender<FetchResponse>,
    receiver: Receiver<FetchResponse>,
    in_flight: usize,
}

impl Fetcher {
    pub fn new(api: Arc<dyn LineageApi>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            api,
            sender,
            receiver,
            in_flight: 0,
        }
    }

    pub fn describe(&self) -> String {
        self.api.describe()
    }

    /// Number of requests whose results have not been polled yet
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn spawn(&mut self, request: FetchRequest) {
        let api = Arc::clone(&self.api);
        let tx = self.sender.clone();
        self.in_flight += 1;
        debug!(request = request.id, kind = request.kind.label(), "spawning fetch");

        thread::spawn(move || {
            let result = Self::execute(api.as_ref(), &request.kind);
            let _ = tx.send(FetchResponse::new(request, result));
        });
    }

    pub fn spawn_all(&mut self, requests: Vec<FetchRequest>) {
        for request in requests {
            self.spawn(request);
        }
    }

    /// Collect every finished response without blocking
    pub fn poll(&mut self) -> Vec<FetchResponse> {
        let mut responses = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(response) => {
                    self.in_flight = self.in_flight.saturating_sub(1);
                    responses.push(response);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        responses
    }

    fn execute(api: &dyn LineageApi, kind: &FetchKind) -> Result<FetchPayload> {
        match kind {
            FetchKind::Lineage {
                fqn,
                entity_type,
                config,
                query_filter,
            } => {
                let mut query = LineageQuery::new(fqn, *entity_type, *config);
                query.query_filter = query_filter.clone();
                api.get_lineage(&query).map(FetchPayload::Lineage)
            }
            FetchKind::ChildNodes {
                fqn,
                entity_type,
                config,
                ..
            } => api
                .get_lineage(&LineageQuery::new(fqn, *entity_type, *config))
                .map(FetchPayload::Lineage),
            FetchKind::PipelineStatus { fqn } => {
                api.get_pipeline_status(fqn).map(FetchPayload::PipelineStatus)
            }
            FetchKind::Resolve {
                fqn, entity_type, ..
            } => api
                .get_lineage(&LineageQuery::new(fqn, *entity_type, LineageConfig::entity_only()))
                .map(FetchPayload::Lineage),
            FetchKind::Persist(changes) => Self::persist(api, changes),
        }
    }

    /// Write changes in order, stopping at the first failure
    fn persist(api: &dyn LineageApi, changes: &[PendingChange]) -> Result<FetchPayload> {
        for (applied, change) in changes.iter().enumerate() {
            let outcome = match change {
                PendingChange::AddEdge(edge) => api.add_lineage(edge),
                PendingChange::RemoveEdge(edge) => api.delete_lineage(edge),
            };
            if let Err(err) = outcome {
                warn!(applied, total = changes.len(), change = %change, "persist stopped");
                return Err(err);
            }
        }
        Ok(FetchPayload::Persisted(changes.len()))
    }
}
