//! OAuth client-credentials authentication for Dataverse
//!
//! [`TokenProvider`] exchanges app credentials for an [`AuthToken`], optionally
//! through a shared [`TokenCache`]. [`claims`] reads the environment URL back
//! out of an issued token.

pub mod cache;
pub mod claims;
pub mod error;
pub mod provider;
pub mod token;

pub use cache::{CacheKey, Clock, ManualClock, SystemClock, TokenCache};
pub use claims::resource_from_access_token;
pub use error::AuthError;
pub use provider::{ClientCredentials, TokenEndpoint, TokenProvider, DEFAULT_AUTHORITY_HOST};
pub use token::AuthToken;
