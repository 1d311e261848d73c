//! Remote configuration from a config server.
//!
//! # Data Flow
//! ```text
//! ConfigServerSource::read
//!     -> PropertyFetcher::fetch (token, GET, envelope)
//!     -> flatten (dot-joined keys)
//!     -> configuration loader merge step
//! ```

pub mod envelope;
pub mod fetcher;
pub mod flatten;
pub mod source;

pub use envelope::{ConfigServerEnvelope, PropertySourceEntry};
pub use fetcher::{
    FetchTarget, PropertyFetcher, PropertySourceConfiguration, DEFAULT_CONFIG_SERVER_HTTPS_URL,
    DEFAULT_CONFIG_SERVER_HTTP_URL,
};
pub use flatten::{flatten, flatten_with};
pub use source::{ConfigServerSource, PropertySource};
