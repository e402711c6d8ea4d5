//! sentinel-common: Shared error taxonomy and the sandboxed HTTP client used
//! across all Sentinel crates.

pub mod error;
pub mod sandbox;

pub use error::{ErrorKind, Result, SentinelError};
pub use sandbox::SandboxClient;
