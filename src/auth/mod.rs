//! Token providers used to authenticate outbound calls.

pub mod providers;

pub use providers::{
    AnonymousTokenProvider, ServiceAccountTokenProvider, StaticTokenProvider, TokenProvider,
    SERVICE_ACCOUNT_TOKEN_PATH,
};
