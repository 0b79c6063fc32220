//! Contract of the remote object store the media queue talks to.

use std::future::Future;

use thiserror::Error;
use tokio::sync::mpsc;

/// Failure of a single remote media operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Network or service failure; retrying later may succeed.
    #[error("Remote storage unavailable: {0}")]
    Transient(String),
    /// The request itself is unusable, e.g. an empty object key.
    #[error("Invalid remote request: {0}")]
    Invalid(String),
}

impl RemoteError {
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Sink for resume tokens reported while an upload is in flight.
#[derive(Debug, Clone)]
pub struct UploadProgress {
    tokens: Option<mpsc::UnboundedSender<String>>,
}

impl UploadProgress {
    /// A progress sink paired with the receiver that observes its tokens.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tokens: Some(tx) }, rx)
    }

    /// A sink nobody listens to.
    #[must_use]
    pub const fn ignored() -> Self {
        Self { tokens: None }
    }

    /// Report the session handle a later retry should resume from.
    pub fn report_token(&self, token: impl Into<String>) {
        let token = token.into();
        if token.trim().is_empty() {
            return;
        }
        if let Some(tokens) = &self.tokens {
            // A closed receiver only means nobody persists tokens any more
            tokens.send(token).ok();
        }
    }
}

/// Object storage operations used by the retry driver.
///
/// Both operations are idempotent: deleting a missing object and re-putting a
/// completed upload succeed.
pub trait RemoteMediaClient: Send + Sync + 'static {
    /// Store `bytes` at `path`, resuming the session named by `resume_token`
    /// when one is given.
    fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        resume_token: Option<String>,
        progress: UploadProgress,
    ) -> impl Future<Output = RemoteResult<()>> + Send;

    /// Remove the object at `path`.
    fn delete(&self, path: &str) -> impl Future<Output = RemoteResult<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn progress_forwards_non_empty_tokens() {
        let (progress, mut rx) = UploadProgress::channel();
        progress.report_token("session-1");
        progress.report_token("  ");
        progress.report_token("session-2");
        drop(progress);

        let mut seen = Vec::new();
        while let Some(token) = rx.recv().await {
            seen.push(token);
        }
        assert_eq!(seen, vec!["session-1", "session-2"]);
    }

    #[test]
    fn ignored_progress_does_not_panic() {
        UploadProgress::ignored().report_token("session-1");
    }

    #[test]
    fn only_transient_errors_are_transient() {
        assert!(RemoteError::Transient("timeout".into()).is_transient());
        assert!(!RemoteError::Invalid("empty key".into()).is_transient());
    }
}
