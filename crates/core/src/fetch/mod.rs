//! Fetch client abstraction.
//!
//! A `FetchClient` resolves one candidate key against the upstream source.
//! Two implementations exist: the JSON score API (fast mode) and the public
//! result page (fallback mode).

mod api;
pub mod decode;
mod page;
mod types;

pub use api::ApiFetchClient;
pub use decode::DecodeError;
pub use page::PageFetchClient;
pub use types::*;
