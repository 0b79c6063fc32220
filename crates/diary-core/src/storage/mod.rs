//! Remote media storage clients and local image sources.

mod memory;
mod remote;
mod s3;
mod source;

pub use memory::{InMemoryMediaClient, RemoteCall};
pub use remote::{RemoteError, RemoteMediaClient, RemoteResult, UploadProgress};
pub use s3::{ObjectStoreConfig, S3MediaClient};
pub use source::read_local_source;
