//! Authenticated REST client for the notes API
//!
//! Every request carries the stored access token as a bearer credential.
//! When the server answers 401, the refresh coordinator exchanges the refresh
//! token once, however many calls failed at the same time, and replays each
//! of them in arrival order with the new token. A failed exchange clears the
//! stored session and fails every waiting call with the same error.
//!
//! Request flow:
//! 1. `ApiClient::send()` tags the call with a `req_<uuid>` id
//! 2. `Authenticator` derives the headers from the request and the stored pair
//! 3. `Upstream` sends it; `classify` sorts the response
//! 4. On 401, `RefreshCoordinator` queues the call behind a single refresh
//! 5. The refresh task replays the queue and answers each caller

pub mod authenticator;
pub mod classify;
pub mod client;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod request;
pub mod resources;
pub mod upstream;

pub use authenticator::{Authenticator, BearerAuthenticator, HeaderInjection};
pub use classify::{Classification, classify_status};
pub use client::{ApiClient, ClientConfig};
pub use coordinator::{Admission, RefreshCoordinator, RefreshState};
pub use error::{ClientError, Result};
pub use request::{ApiRequest, ApiResponse, Attempt};
pub use resources::{JobPost, Note, job_posts_path};
pub use upstream::{BoxFuture, HttpUpstream, Upstream};
