//! # Token Providers
//!
//! Bearer tokens for calls to the config server and the route control plane.
//! An empty token is a valid answer and means "call unauthenticated".

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::error::{BootstrapError, BootstrapResult};

/// Default location of the projected Kubernetes service-account token
pub const SERVICE_ACCOUNT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Source of bearer tokens for outbound calls
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Obtain a token; must return promptly with `Cancelled` once `cancel` fires
    async fn get_token(&self, cancel: &CancellationToken) -> BootstrapResult<String>;
}

/// Provider that never authenticates
#[derive(Debug, Clone, Default)]
pub struct AnonymousTokenProvider;

#[async_trait]
impl TokenProvider for AnonymousTokenProvider {
    async fn get_token(&self, cancel: &CancellationToken) -> BootstrapResult<String> {
        if cancel.is_cancelled() {
            return Err(BootstrapError::cancelled("token acquisition"));
        }
        Ok(String::new())
    }
}

/// Provider returning a fixed token
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_token(&self, cancel: &CancellationToken) -> BootstrapResult<String> {
        if cancel.is_cancelled() {
            return Err(BootstrapError::cancelled("token acquisition"));
        }
        Ok(self.token.clone())
    }
}

/// Provider reading a service-account token file on every call
///
/// The kubelet rotates projected tokens in place, so the file is re-read each
/// time instead of being cached.
#[derive(Debug, Clone)]
pub struct ServiceAccountTokenProvider {
    path: PathBuf,
}

impl ServiceAccountTokenProvider {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for ServiceAccountTokenProvider {
    fn default() -> Self {
        Self::new(SERVICE_ACCOUNT_TOKEN_PATH)
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountTokenProvider {
    async fn get_token(&self, cancel: &CancellationToken) -> BootstrapResult<String> {
        let read = tokio::fs::read_to_string(&self.path);

        let content = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(BootstrapError::cancelled("token acquisition"));
            }
            result = read => result.map_err(|e| {
                BootstrapError::auth(format!(
                    "Failed to read service account token {}: {}",
                    self.path.display(),
                    e
                ))
            })?,
        };

        debug!(path = %self.path.display(), "Loaded service account token");
        Ok(content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_anonymous_provider_returns_empty_token() {
        let token = AnonymousTokenProvider.get_token(&CancellationToken::new()).await.unwrap();
        assert!(token.is_empty());
    }

    #[tokio::test]
    async fn test_static_provider_honours_cancellation() {
        let provider = StaticTokenProvider::new("abc");
        let cancel = CancellationToken::new();
        assert_eq!(provider.get_token(&cancel).await.unwrap(), "abc");

        cancel.cancel();
        let err = provider.get_token(&cancel).await.unwrap_err();
        assert!(matches!(err, BootstrapError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn test_service_account_token_is_trimmed() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "  eyJhbGciOi.payload.sig  ").unwrap();

        let provider = ServiceAccountTokenProvider::new(file.path());
        let token = provider.get_token(&CancellationToken::new()).await.unwrap();

        assert_eq!(token, "eyJhbGciOi.payload.sig");
    }

    #[tokio::test]
    async fn test_missing_token_file_is_auth_error() {
        let provider = ServiceAccountTokenProvider::new("/definitely/not/here/token");
        let err = provider.get_token(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, BootstrapError::Auth { .. }));
    }
}
