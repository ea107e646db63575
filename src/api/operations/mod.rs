//! Dataverse Operations Module
//!
//! Typed CRUD operations and the $batch composer that frames them (or any
//! hand-built sub-requests) into a single multipart request.

pub mod batch;
pub mod operation;

pub use batch::{BatchError, BatchRequest, BatchRequestBuilder, BatchResponse, BatchSubRequest};
pub use operation::Operation;
