//! Object storage for uploaded resumes (S3 / MinIO).

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::resume::file::ValidatedResume;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload rejected: {0}")]
    Rejected(String),

    #[error("storage unreachable: {0}")]
    Unreachable(String),
}

/// Where an upload landed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredObject {
    pub url: String,
    pub public_id: String,
    pub format: String,
    pub original_filename: String,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores the file under `folder` and returns its public location.
    async fn upload(&self, file: &ValidatedResume, folder: &str) -> Result<StoredObject, UploadError>;
}

pub struct S3Storage {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: String,
}

impl S3Storage {
    pub fn new(client: aws_sdk_s3::Client, bucket: String, public_base_url: String) -> Self {
        Self {
            client,
            bucket,
            public_base_url,
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn upload(&self, file: &ValidatedResume, folder: &str) -> Result<StoredObject, UploadError> {
        let public_id = format!("{}/{}", folder.trim_end_matches('/'), Uuid::new_v4());
        let key = format!("{public_id}.{}", file.extension);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(file.data.clone()))
            .content_type(&file.mime)
            .send()
            .await
            .map_err(|e| match e.raw_response() {
                Some(raw) => UploadError::Rejected(format!("status {}", raw.status().as_u16())),
                None => UploadError::Unreachable(e.to_string()),
            })?;

        info!("Uploaded resume to s3://{}/{}", self.bucket, key);

        Ok(StoredObject {
            url: public_url(&self.public_base_url, &key),
            public_id,
            format: file.extension.clone(),
            original_filename: original_stem(&file.filename),
        })
    }
}

pub fn public_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.trim_start_matches('/'))
}

fn original_stem(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => filename.to_string(),
    }
}
