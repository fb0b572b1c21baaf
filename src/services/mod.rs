//! External service interactions
//!
//! This module contains the lineage backends and the plumbing around them:
//! - `LineageApi` seam and its REST and catalog-file implementations
//! - Background fetch execution
//! - CSV export

pub mod api;
pub mod catalog;
pub mod export;
pub mod fetcher;
pub mod http;

pub use api::{LineageApi, LineageQuery};
pub use catalog::CatalogApi;
pub use export::export_edges;
pub use fetcher::Fetcher;
pub use http::HttpLineageApi;
