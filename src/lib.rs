//! Nearby-business scraper: list places around a point, enrich them with detail lookups,
//! validate them into canonical records and append them to a sink in batches.

pub mod apis;
pub mod config;
pub mod constants;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod pipeline;
pub mod record;
pub mod storage;
pub mod transform;
pub mod types;

pub use config::{AppConfig, RawConfig, SearchParams};
pub use error::{ApiError, Result, ScraperError, ValidationError};
pub use gateway::PlacesGateway;
pub use pipeline::{Pipeline, ProcessingSummary};
pub use record::BusinessRecord;
pub use storage::RecordSink;
pub use transform::{RecordTransformer, SourceSchema};
