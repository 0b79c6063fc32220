//! Remote media client selected from the environment.

use diary_core::storage::{
    ObjectStoreConfig, RemoteError, RemoteMediaClient, RemoteResult, S3MediaClient,
    UploadProgress,
};

const NOT_CONFIGURED: &str =
    "object storage is not configured (set the DIARY_STORAGE_* variables)";

/// Object storage when configured; otherwise every operation stays pending.
#[derive(Debug, Clone)]
pub enum MediaClient {
    ObjectStore(S3MediaClient),
    Unconfigured,
}

impl MediaClient {
    pub fn from_config(config: Option<ObjectStoreConfig>) -> Self {
        config.map_or(Self::Unconfigured, |config| {
            Self::ObjectStore(S3MediaClient::new(config))
        })
    }

    pub const fn is_configured(&self) -> bool {
        matches!(self, Self::ObjectStore(_))
    }
}

impl RemoteMediaClient for MediaClient {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        resume_token: Option<String>,
        progress: UploadProgress,
    ) -> RemoteResult<()> {
        match self {
            Self::ObjectStore(client) => client.put(path, bytes, resume_token, progress).await,
            Self::Unconfigured => Err(RemoteError::Transient(NOT_CONFIGURED.to_string())),
        }
    }

    async fn delete(&self, path: &str) -> RemoteResult<()> {
        match self {
            Self::ObjectStore(client) => client.delete(path).await,
            Self::Unconfigured => Err(RemoteError::Transient(NOT_CONFIGURED.to_string())),
        }
    }
}
