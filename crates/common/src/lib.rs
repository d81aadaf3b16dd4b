//! Types shared by the notes client crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
