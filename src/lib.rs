//! # Keen Query
//!
//! Client library for the Keen analytics query API: count, sum, average,
//! percentile, funnel, multi-analysis, extraction and friends.
//!
//! ## Features
//!
//! - **Typed parameters**: builder for query arguments with per-kind validation
//! - **One round trip per query**: blocking client, no retries or caching
//! - **Typed results**: group-by and interval buckets decoded into a result tree
//! - **Pluggable transport**: `reqwest` by default, any [`client::Transport`] otherwise
//!
//! ## Modules
//!
//! - [`query`]: Query kinds, parameters, timeframes and result decoding
//! - [`client`]: Query executor and HTTP transport
//! - [`config`]: TOML configuration with environment overrides
//! - [`logging`]: Request tracing toggle and subscriber setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use keen_query::{KeenProject, KeenQueryClient, QueryKind, QueryParams, Timeframe};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = KeenQueryClient::new(KeenProject::new("<project id>", "<read key>"))?;
//!
//!     // Simple aggregate
//!     let week = Timeframe::relative("this_7_days");
//!     let revenue = client.sum("purchases", "price", &week)?;
//!     println!("Revenue this week: {}", revenue);
//!
//!     // Daily counts per category
//!     let params = QueryParams::builder()
//!         .event_collection("purchases")
//!         .group_by("category")
//!         .interval("daily")
//!         .build();
//!     let result = client.execute(QueryKind::CountResource, &params, Some(&week))?;
//!
//!     for day in result.as_list().unwrap_or_default() {
//!         if let Some(bucket) = day.as_interval() {
//!             println!("{}: {:?}", bucket.timeframe, bucket.value.to_value());
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod logging;
pub mod query;

// Re-export top-level types for convenience
pub use client::{
    HttpRequest, HttpResponse, KeenProject, KeenQueryClient, KeenQueryClientBuilder,
    ReqwestTransport, Transport, TransportError,
};

pub use query::{
    Analysis, Filter, FilterOperator, FunnelStep, GroupBy, Interval, KeenResult, QueryError,
    QueryKind, QueryParams, QueryParamsBuilder, QueryResult, Timeframe,
};

pub use config::{ClientConfig, Config, ConfigError, LoggingConfig, ProjectConfig};
