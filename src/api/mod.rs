//! Dataverse Web API Module
//!
//! Single-request execution, $batch composition and the header/transport
//! plumbing both share.

pub mod client;
pub mod constants;
pub mod models;
pub mod operations;
pub mod request_headers;
pub mod transport;

pub use client::DataverseClient;
pub use models::{HttpResult, Method, RequestOptions};
pub use operations::{BatchError, BatchRequest, BatchRequestBuilder, BatchResponse, BatchSubRequest, Operation};
pub use request_headers::{HeaderOptions, PreferDirective};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};
