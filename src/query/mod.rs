//! Query model
//!
//! Everything needed to describe a query and interpret its answer:
//!
//! - **Kind**: the analysis to run and its wire name
//! - **Params**: query arguments, their builder and per-kind validation
//! - **Timeframe**: relative or absolute time ranges
//! - **Result**: typed decoding of the raw JSON result
//!
//! # Example
//!
//! ```rust
//! use keen_query::query::{QueryKind, QueryParams, QueryResult};
//! use serde_json::json;
//!
//! let params = QueryParams::builder()
//!     .event_collection("purchases")
//!     .group_by("category")
//!     .build();
//! assert!(params.is_valid(QueryKind::CountResource));
//!
//! let raw = json!([{"category": "shoes", "result": 3}]);
//! let result = QueryResult::decode(&raw, params.has_group_by(), params.has_interval());
//! assert!(result.as_list().unwrap()[0].is_group_by());
//! ```

mod error;
mod kind;
mod params;
mod result;
mod timeframe;

pub use error::{KeenResult, QueryError};
pub use kind::QueryKind;
pub use params::{Analysis, Filter, FilterOperator, FunnelStep, QueryParams, QueryParamsBuilder};
pub use result::{GroupBy, Interval, QueryResult};
pub use timeframe::{Timeframe, TIMEFRAME_KEY};
