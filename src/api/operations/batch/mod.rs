//! Batch operations module for the Dataverse Web API
//!
//! Provides $batch request framing and the raw response wrapper

pub mod builder;
pub mod response;
pub mod sub_request;

pub use builder::{BatchRequest, BatchRequestBuilder};
pub use response::{BatchError, BatchResponse};
pub use sub_request::BatchSubRequest;
