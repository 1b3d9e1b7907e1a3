//! wbi-core - Core library for wbi
//!
//! Fetches the Brandenburg forest fire danger index (Waldbrandgefahrenindex),
//! keeps it in a durable cache with a time-based expiry and serves per-district
//! risk levels with their display color and description.
//!
//! ```no_run
//! use wbi_core::{IndexConfig, IndexService};
//!
//! # async fn run() -> Result<(), wbi_core::CoreError> {
//! let index = IndexService::from_config(IndexConfig::default()).await?;
//! if let Some(risk) = index.lookup("Märkisch-Oderland") {
//!     println!("{}: {} ({})", risk.level, risk.description, risk.color);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod event;
pub mod fetcher;
pub mod models;
pub mod parser;
pub mod service;

pub use cache::{CachedDocument, DocumentCache};
pub use catalog::{RiskClass, RiskDescriptor};
pub use config::IndexConfig;
pub use error::{CoreError, ErrorSeverity, FetchOutcome, RefreshIssue, RefreshReport};
pub use event::{EventBus, IndexEvent};
pub use fetcher::{DocumentFetcher, FetchFailure, HttpFetcher};
pub use models::DistrictRiskMap;
pub use parser::{parse_document, ParsedIndex};
pub use service::{IndexService, IndexSnapshot, IndexStatus};
