//! In-process object store used by tests and offline runs.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use tokio::sync::watch;

use super::remote::{RemoteError, RemoteMediaClient, RemoteResult, UploadProgress};

/// One request observed by [`InMemoryMediaClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Put {
        path: String,
        resume_token: Option<String>,
    },
    Delete {
        path: String,
    },
}

impl RemoteCall {
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Put { path, .. } | Self::Delete { path } => path,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    objects: HashMap<String, Vec<u8>>,
    calls: Vec<RemoteCall>,
    offline: bool,
    fail_next: usize,
    failing_paths: HashSet<String>,
    /// Tokens reported by the next puts, one per call, before they run.
    scripted_tokens: VecDeque<String>,
}

/// Remote media client backed by a map.
///
/// Failures are scriptable: the whole store can go offline, the next N
/// calls can fail, or single paths can fail until cleared. A pause gate
/// holds every call until [`InMemoryMediaClient::resume`] is called, which
/// lets tests observe state before any network request completes.
#[derive(Debug, Clone)]
pub struct InMemoryMediaClient {
    state: Arc<StdMutex<State>>,
    gate: Arc<watch::Sender<bool>>,
}

impl Default for InMemoryMediaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMediaClient {
    #[must_use]
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            state: Arc::new(StdMutex::new(State::default())),
            gate: Arc::new(gate),
        }
    }

    /// A client that fails every call with a transient error.
    #[must_use]
    pub fn offline() -> Self {
        let client = Self::new();
        client.set_offline(true);
        client
    }

    /// A client whose calls wait until [`Self::resume`].
    #[must_use]
    pub fn paused() -> Self {
        let client = Self::new();
        client.gate.send_replace(false);
        client
    }

    pub fn resume(&self) {
        self.gate.send_replace(true);
    }

    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    pub fn fail_next(&self, count: usize) {
        self.lock().fail_next = count;
    }

    pub fn fail_path(&self, path: impl Into<String>) {
        self.lock().failing_paths.insert(path.into());
    }

    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.offline = false;
        state.fail_next = 0;
        state.failing_paths.clear();
    }

    /// Report `token` as the resume token of the next put.
    pub fn script_token(&self, token: impl Into<String>) {
        self.lock().scripted_tokens.push_back(token.into());
    }

    /// Store an object directly, bypassing the call log.
    pub fn insert_object(&self, path: impl Into<String>, bytes: Vec<u8>) {
        self.lock().objects.insert(path.into(), bytes);
    }

    #[must_use]
    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().objects.get(path).cloned()
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.lock().objects.contains_key(path)
    }

    #[must_use]
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not hide the state from the others
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    async fn wait_for_gate(&self) {
        let mut open = self.gate.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        open.wait_for(|open| *open).await.ok();
    }

    fn check_failure(state: &mut State, path: &str) -> RemoteResult<()> {
        if state.offline {
            return Err(RemoteError::Transient("remote store is offline".into()));
        }
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(RemoteError::Transient("scripted failure".into()));
        }
        if state.failing_paths.contains(path) {
            return Err(RemoteError::Transient(format!("scripted failure for {path}")));
        }
        Ok(())
    }
}

impl RemoteMediaClient for InMemoryMediaClient {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        resume_token: Option<String>,
        progress: UploadProgress,
    ) -> RemoteResult<()> {
        self.wait_for_gate().await;

        let mut state = self.lock();
        state.calls.push(RemoteCall::Put {
            path: path.to_string(),
            resume_token,
        });
        if path.trim().is_empty() {
            return Err(RemoteError::Invalid("object key cannot be empty".into()));
        }
        if let Some(token) = state.scripted_tokens.pop_front() {
            progress.report_token(token);
        }
        Self::check_failure(&mut state, path)?;
        state.objects.insert(path.to_string(), bytes);
        Ok(())
    }

    async fn delete(&self, path: &str) -> RemoteResult<()> {
        self.wait_for_gate().await;

        let mut state = self.lock();
        state.calls.push(RemoteCall::Delete {
            path: path.to_string(),
        });
        if path.trim().is_empty() {
            return Err(RemoteError::Invalid("object key cannot be empty".into()));
        }
        Self::check_failure(&mut state, path)?;
        state.objects.remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test(flavor = "multi_thread")]
    async fn put_and_delete_are_idempotent() {
        let client = InMemoryMediaClient::new();

        client
            .put("images/u1/a.jpg", vec![1], None, UploadProgress::ignored())
            .await
            .unwrap();
        client
            .put("images/u1/a.jpg", vec![1], None, UploadProgress::ignored())
            .await
            .unwrap();
        assert_eq!(client.object("images/u1/a.jpg"), Some(vec![1]));

        client.delete("images/u1/a.jpg").await.unwrap();
        client.delete("images/u1/a.jpg").await.unwrap();
        assert!(!client.contains("images/u1/a.jpg"));
        assert_eq!(client.calls().len(), 4);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn scripted_token_is_reported_before_failure() {
        let client = InMemoryMediaClient::new();
        client.script_token("session-1");
        client.fail_next(1);

        let (progress, mut tokens) = UploadProgress::channel();
        let result = client.put("images/u1/a.jpg", vec![1], None, progress).await;

        assert!(matches!(result, Err(RemoteError::Transient(_))));
        assert_eq!(tokens.recv().await.as_deref(), Some("session-1"));
        assert!(!client.contains("images/u1/a.jpg"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failing_path_only_affects_that_path() {
        let client = InMemoryMediaClient::new();
        client.fail_path("images/u1/bad.jpg");

        assert!(client.delete("images/u1/bad.jpg").await.is_err());
        assert!(client.delete("images/u1/good.jpg").await.is_ok());

        client.clear_failures();
        assert!(client.delete("images/u1/bad.jpg").await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn paused_client_holds_calls_until_resumed() {
        let client = InMemoryMediaClient::paused();

        let worker = client.clone();
        let call = tokio::spawn(async move { worker.delete("images/u1/a.jpg").await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(client.calls().is_empty());

        client.resume();
        call.await.unwrap().unwrap();
        assert_eq!(
            client.calls(),
            vec![RemoteCall::Delete {
                path: "images/u1/a.jpg".into()
            }]
        );
    }
}
