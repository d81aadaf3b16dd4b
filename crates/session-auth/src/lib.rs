//! Session credentials for the notes API
//!
//! Owns the single access/refresh token pair of a session and the raw calls
//! to the backend's token endpoints. The API client builds on this crate;
//! nothing here knows about request replay or refresh coordination.
//!
//! Session flow:
//! 1. `token::login()` or `token::register()` returns a token pair
//! 2. Pair stored via `credentials::CredentialStore::write()`
//! 3. On an expired access token, the client calls `token::refresh_token()`
//! 4. New pair written back, or `CredentialStore::clear()` on rejection

pub mod constants;
pub mod credentials;
pub mod error;
pub mod token;

pub use constants::*;
pub use credentials::{CredentialBackend, CredentialPair, CredentialStore, FileBackend, MemoryBackend};
pub use error::{Error, Result};
pub use token::{
    AuthResponse, RefreshResponse, RegisterData, Role, TokenPair, UserData, login, refresh_token,
    register,
};
