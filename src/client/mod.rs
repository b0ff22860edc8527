//! Query API client
//!
//! - **KeenQueryClient**: validates, sends and unwraps queries
//! - **Transport**: pluggable request sender, `reqwest` by default
//! - **KeenProject**: project id and read key
//!
//! # Example
//!
//! ```rust,no_run
//! use keen_query::client::{KeenProject, KeenQueryClient};
//! use keen_query::query::Timeframe;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = KeenQueryClient::new(KeenProject::new("<project id>", "<read key>"))?;
//!
//!     let purchases = client.count("purchases", &Timeframe::relative("this_14_days"))?;
//!     println!("{} purchases", purchases);
//!     Ok(())
//! }
//! ```

mod executor;
mod project;
mod transport;

pub use executor::{
    unwrap_envelope, KeenQueryClient, KeenQueryClientBuilder, API_VERSION, DEFAULT_BASE_URL,
};
pub use project::KeenProject;
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};
