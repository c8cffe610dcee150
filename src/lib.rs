//! # Receipt Finder
//!
//! Locates utility-bill receipts on a document service that only answers "yes" or
//! "no" for a `(customer, receipt number, date)` triple.
//!
//! ## Core Concepts
//!
//! - **Generic references**: known `(date, receipt number)` pairs from a reference
//!   meter. Receipt numbers come from one counter that grows at a near-constant
//!   daily rate, so they anchor a linear trend.
//! - **Priority references**: receipts confirmed during the current search. The
//!   generic trend is shifted to pass through the nearest one.
//! - **Forecast**: two-point interpolation between the references around a date,
//!   or extrapolation from the first or last pair outside them.
//! - **Probing**: offsets `0, +1, -1, +2, -2, ...` around the forecast are checked
//!   in concurrent batches, retrying auth/throttling failures with backoff.
//! - **Search**: one receipt per month across the requested range, each hit
//!   sharpening the forecasts for the months after it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use receipt_finder::*;
//! use std::sync::Arc;
//!
//! let endpoint = Arc::new(HttpReceiptEndpoint::new()?);
//! let search = ReceiptSearch::new(ReceiptFinderConfig::default(), endpoint)?;
//!
//! let request = SearchRequest {
//!     numero_cliente: Some("1234567".to_string()),
//!     numero_medidor: Some(MeterField::Text("205876".to_string())),
//!     start_date: Some("2024-01-01".to_string()),
//!     end_date: Some("2024-12-31".to_string()),
//!     day_range: Some(vec![11, 12, 13]),
//! };
//!
//! for receipt in search.handle(&request).await? {
//!     println!("{} -> {} ({})", receipt.date, receipt.receipt_number, receipt.url);
//! }
//! ```

pub mod endpoint;
pub mod error;
pub mod forecast;
pub mod prober;
pub mod references;
pub mod retry;
pub mod schema;
pub mod search;
pub mod utils;

#[cfg(feature = "server")]
pub mod server;

pub use endpoint::{
    build_document_url, EndpointError, ReceiptEndpoint, ReceiptQuery, DEFAULT_DOCUMENT_URL,
};
#[cfg(feature = "http")]
pub use endpoint::HttpReceiptEndpoint;
pub use error::{ReceiptSearchError, Result};
pub use forecast::{interpolate, two_point_forecast, ExtrapolationJitter, Forecaster};
pub use prober::{candidate_offsets, CandidateProber, ProbeResult};
pub use references::ReferenceStore;
pub use retry::{retry_with_backoff, RetryPolicy};
pub use schema::*;
pub use search::ReceiptSearch;
pub use tokio_util::sync::CancellationToken;
pub use utils::*;
