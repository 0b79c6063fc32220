//! S3-compatible object storage client with resumable multipart uploads.
//!
//! The resume token handed to the media queue is the multipart upload id.
//! A retry lists the parts the service already holds and only sends the rest.

use std::env;

use aws_credential_types::Credentials;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use aws_types::region::Region;

use super::remote::{RemoteError, RemoteMediaClient, RemoteResult, UploadProgress};
use crate::util::{compact_text, is_http_url};
use crate::{Error, Result};

const ENV_ENDPOINT: &str = "DIARY_STORAGE_ENDPOINT";
const ENV_BUCKET: &str = "DIARY_STORAGE_BUCKET";
const ENV_ACCESS_KEY_ID: &str = "DIARY_STORAGE_ACCESS_KEY_ID";
const ENV_SECRET_ACCESS_KEY: &str = "DIARY_STORAGE_SECRET_ACCESS_KEY";
const ENV_REGION: &str = "DIARY_STORAGE_REGION";

/// Smallest part size S3 accepts for every part but the last.
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Object storage configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectStoreConfig {
    /// S3-compatible endpoint, e.g. `https://<account>.r2.cloudflarestorage.com`.
    pub endpoint_url: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Signing region; `auto` for R2.
    pub region: String,
}

impl ObjectStoreConfig {
    /// Load storage configuration from environment variables.
    ///
    /// Returns `Ok(None)` when no storage variables are set.
    /// Returns an error when only a partial configuration is provided.
    pub fn from_env() -> Result<Option<Self>> {
        parse_config(|key| env::var(key).ok())
    }
}

/// Resumable media client for S3-compatible services.
#[derive(Clone, Debug)]
pub struct S3MediaClient {
    config: ObjectStoreConfig,
    client: Client,
    part_size: usize,
}

impl S3MediaClient {
    #[must_use]
    pub fn new(config: ObjectStoreConfig) -> Self {
        let client = build_s3_client(&config);
        Self {
            config,
            client,
            part_size: MIN_PART_SIZE,
        }
    }

    /// Use larger parts; values below the S3 minimum are raised to it.
    #[must_use]
    pub fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size.max(MIN_PART_SIZE);
        self
    }

    async fn start_session(&self, key: &str) -> RemoteResult<String> {
        let mut request = self
            .client
            .create_multipart_upload()
            .bucket(&self.config.bucket)
            .key(key);
        if let Some(content_type) = content_type_for(key) {
            request = request.content_type(content_type);
        }

        let response = request
            .send()
            .await
            .map_err(|error| transient("create_multipart_upload", key, error))?;
        response
            .upload_id()
            .map(ToOwned::to_owned)
            .ok_or_else(|| RemoteError::Transient(format!("no upload id returned for {key}")))
    }

    /// Parts already stored for a session, or `None` when the session is gone.
    async fn uploaded_parts(&self, key: &str, upload_id: &str) -> RemoteResult<Option<Vec<StoredPart>>> {
        let mut parts = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let result = self
                .client
                .list_parts()
                .bucket(&self.config.bucket)
                .key(key)
                .upload_id(upload_id)
                .set_part_number_marker(marker.clone())
                .send()
                .await;

            let response = match result {
                Ok(response) => response,
                Err(error) if error.code() == Some("NoSuchUpload") => return Ok(None),
                Err(error) => return Err(transient("list_parts", key, error)),
            };

            parts.extend(response.parts().iter().filter_map(|part| {
                Some(StoredPart {
                    number: part.part_number()?,
                    size: part.size()?,
                    e_tag: part.e_tag()?.to_string(),
                })
            }));

            marker = response.next_part_number_marker().map(ToOwned::to_owned);
            if !response.is_truncated().unwrap_or(false) || marker.is_none() {
                break;
            }
        }

        Ok(Some(parts))
    }

    async fn object_exists(&self, key: &str) -> RemoteResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(error)
                if error
                    .as_service_error()
                    .is_some_and(HeadObjectError::is_not_found) =>
            {
                Ok(false)
            }
            Err(error) => Err(transient("head_object", key, error)),
        }
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        bytes: &[u8],
        stored: &[StoredPart],
    ) -> RemoteResult<Vec<CompletedPart>> {
        let mut completed = Vec::new();

        for (number, range) in part_ranges(bytes.len(), self.part_size) {
            let chunk = &bytes[range];
            let reusable = stored.iter().find(|part| {
                part.number == number && usize::try_from(part.size).ok() == Some(chunk.len())
            });

            let e_tag = if let Some(part) = reusable {
                tracing::debug!(key, part = number, "Reusing uploaded part");
                part.e_tag.clone()
            } else {
                let response = self
                    .client
                    .upload_part()
                    .bucket(&self.config.bucket)
                    .key(key)
                    .upload_id(upload_id)
                    .part_number(number)
                    .body(ByteStream::from(chunk.to_vec()))
                    .send()
                    .await
                    .map_err(|error| transient("upload_part", key, error))?;
                response
                    .e_tag()
                    .map(ToOwned::to_owned)
                    .ok_or_else(|| RemoteError::Transient(format!("no ETag for part {number} of {key}")))?
            };

            completed.push(
                CompletedPart::builder()
                    .part_number(number)
                    .e_tag(e_tag)
                    .build(),
            );
        }

        Ok(completed)
    }
}

impl RemoteMediaClient for S3MediaClient {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        resume_token: Option<String>,
        progress: UploadProgress,
    ) -> RemoteResult<()> {
        let key = normalize_object_key(path)?;

        let resumed = match resume_token {
            Some(upload_id) => match self.uploaded_parts(&key, &upload_id).await? {
                Some(parts) => Some((upload_id, parts)),
                None => {
                    // The session is gone: either it completed or it expired
                    if self.object_exists(&key).await? {
                        tracing::debug!(key = %key, "Upload already completed");
                        return Ok(());
                    }
                    None
                }
            },
            None => None,
        };

        let (upload_id, stored) = match resumed {
            Some(session) => session,
            None => {
                let upload_id = self.start_session(&key).await?;
                progress.report_token(upload_id.clone());
                (upload_id, Vec::new())
            }
        };

        let parts = self.upload_parts(&key, &upload_id, &bytes, &stored).await?;

        self.client
            .complete_multipart_upload()
            .bucket(&self.config.bucket)
            .key(&key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|error| transient("complete_multipart_upload", &key, error))?;

        Ok(())
    }

    async fn delete(&self, path: &str) -> RemoteResult<()> {
        let key = normalize_object_key(path)?;

        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|error| transient("delete_object", &key, error))?;

        Ok(())
    }
}

#[derive(Debug, Clone)]
struct StoredPart {
    number: i32,
    size: i64,
    e_tag: String,
}

/// 1-based part numbers and byte ranges covering `len` bytes.
///
/// Always yields at least one (possibly empty) part.
fn part_ranges(len: usize, part_size: usize) -> Vec<(i32, std::ops::Range<usize>)> {
    if len == 0 {
        return vec![(1, 0..0)];
    }

    (0..len)
        .step_by(part_size)
        .zip(1..)
        .map(|(start, number)| (number, start..(start + part_size).min(len)))
        .collect()
}

fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<ObjectStoreConfig>> {
    let read = |key| lookup(key).map(|value: String| value.trim().to_string());

    let endpoint_url = read(ENV_ENDPOINT);
    let bucket = read(ENV_BUCKET);
    let access_key_id = read(ENV_ACCESS_KEY_ID);
    let secret_access_key = read(ENV_SECRET_ACCESS_KEY);
    let region = read(ENV_REGION);

    let any_present = endpoint_url.is_some()
        || bucket.is_some()
        || access_key_id.is_some()
        || secret_access_key.is_some();

    if !any_present {
        return Ok(None);
    }

    let mut missing = Vec::new();
    let mut require = |value: Option<String>, name: &'static str| {
        match value.filter(|value| !value.is_empty()) {
            Some(value) => value,
            None => {
                missing.push(name);
                String::new()
            }
        }
    };

    let endpoint_url = require(endpoint_url, ENV_ENDPOINT);
    let bucket = require(bucket, ENV_BUCKET);
    let access_key_id = require(access_key_id, ENV_ACCESS_KEY_ID);
    let secret_access_key = require(secret_access_key, ENV_SECRET_ACCESS_KEY);

    if !missing.is_empty() {
        return Err(Error::InvalidInput(format!(
            "Object storage configuration is incomplete. Missing: {}",
            missing.join(", ")
        )));
    }

    if !is_http_url(&endpoint_url) {
        return Err(Error::InvalidInput(format!(
            "{ENV_ENDPOINT} must start with http:// or https://"
        )));
    }

    Ok(Some(ObjectStoreConfig {
        endpoint_url: endpoint_url.trim_end_matches('/').to_string(),
        bucket,
        access_key_id,
        secret_access_key,
        region: region
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "auto".to_string()),
    }))
}

fn build_s3_client(config: &ObjectStoreConfig) -> Client {
    let credentials = Credentials::new(
        config.access_key_id.clone(),
        config.secret_access_key.clone(),
        None,
        None,
        "diary-core-object-store",
    );

    let sdk_config = aws_sdk_s3::config::Builder::new()
        .region(Region::new(config.region.clone()))
        .credentials_provider(credentials)
        .endpoint_url(config.endpoint_url.clone())
        .force_path_style(true)
        .build();

    Client::from_conf(sdk_config)
}

fn transient(operation: &str, key: &str, error: impl std::fmt::Display) -> RemoteError {
    RemoteError::Transient(format!(
        "S3 {operation} failed for {key}: {}",
        compact_text(&error.to_string())
    ))
}

fn normalize_object_key(object_key: &str) -> RemoteResult<String> {
    let object_key = object_key.trim().trim_matches('/').to_string();
    if object_key.is_empty() {
        return Err(RemoteError::Invalid(
            "object key cannot be empty".to_string(),
        ));
    }
    Ok(object_key)
}

fn content_type_for(key: &str) -> Option<&'static str> {
    let (_, ext) = key.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        _ => None,
    }
}
