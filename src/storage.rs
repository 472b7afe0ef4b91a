use async_trait::async_trait;
use log::{error, info, warn};
use std::sync::Arc;
use thiserror::Error;

/// Shared placeholder host used when a submitter supplies no image. Those
/// URLs point at an asset we do not own and must never be deleted.
pub const PLACEHOLDER_IMAGE_URL: &str = "https://placehold.co/600x400?text=No+Image";

pub fn is_placeholder_url(url: &str) -> bool {
    url.contains("placehold.co")
}

#[derive(Debug, Error)]
pub enum AssetStoreError {
    #[error("not_found")]
    NotFound,
    #[error("other: {0}")]
    Other(String),
}

/// Opaque blob storage keyed by path. `upload` returns the public URL the
/// submission row will reference.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<String, AssetStoreError>;
    async fn delete(&self, path: &str) -> Result<(), AssetStoreError>;
    fn public_url(&self, path: &str) -> String;

    /// Inverse of `public_url`: recover the storage path from a URL this
    /// store minted earlier. None for foreign URLs (placeholders included).
    fn path_from_url(&self, url: &str) -> Option<String> {
        let marker = format!("/{}/", ASSET_PREFIX);
        url.find(&marker)
            .map(|idx| format!("{}/{}", ASSET_PREFIX, &url[idx + marker.len()..]))
    }
}

pub const ASSET_PREFIX: &str = "product-images";

// ---------------- S3 Implementation (MinIO compatible) ----------------
pub struct S3AssetStore {
    bucket: String,
    client: aws_sdk_s3::Client,
    public_base: String,
}

impl S3AssetStore {
    pub async fn new() -> anyhow::Result<Self> {
        use aws_credential_types::provider::SharedCredentialsProvider;
        use aws_credential_types::Credentials;

        let bucket = std::env::var("S3_BUCKET").unwrap_or_else(|_| "votely-assets".into());
        let endpoint = std::env::var("S3_ENDPOINT")
            .map_err(|_| anyhow::anyhow!("S3_ENDPOINT must be set (MinIO / S3 endpoint)"))?;
        let region = std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into());
        let access = std::env::var("S3_ACCESS_KEY").unwrap_or_default();
        let secret = std::env::var("S3_SECRET_KEY").unwrap_or_default();
        // Base for public URLs; defaults to path-style addressing through the
        // endpoint itself.
        let public_base = std::env::var("ASSET_PUBLIC_BASE")
            .unwrap_or_else(|_| format!("{}/{}", endpoint.trim_end_matches('/'), bucket));

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(region));
        loader = loader.endpoint_url(endpoint);
        if !access.is_empty() && !secret.is_empty() {
            let creds = Credentials::new(access, secret, None, None, "static");
            loader = loader.credentials_provider(SharedCredentialsProvider::new(creds));
        }
        let conf = loader.load().await;
        // Path-style addressing: required for MinIO/local endpoints without
        // wildcard DNS.
        let s3_conf = aws_sdk_s3::config::Builder::from(&conf)
            .force_path_style(true)
            .build();
        let client = aws_sdk_s3::Client::from_conf(s3_conf);
        info!("Initialized S3/MinIO asset store (path-style addressing)");

        // Ensure bucket exists (create if missing)
        if let Err(e) = client.head_bucket().bucket(&bucket).send().await {
            warn!("head_bucket failed for '{bucket}' (will attempt create): {e:?}");
            let mut attempt = 0u32;
            let max_attempts = 8;
            loop {
                attempt += 1;
                match client.create_bucket().bucket(&bucket).send().await {
                    Ok(_) => {
                        info!("created bucket '{bucket}' (attempt {attempt})");
                        break;
                    }
                    Err(e2) => {
                        if attempt >= max_attempts {
                            error!("create_bucket failed for '{bucket}' after {attempt} attempts: {e2:?}");
                            return Err(anyhow::anyhow!("failed to ensure bucket '{bucket}': {e2}"));
                        }
                        let backoff_ms = 200 * attempt.pow(2);
                        warn!("create_bucket attempt {attempt} failed for '{bucket}': {e2:?} (retrying in {backoff_ms}ms)");
                        tokio::time::sleep(std::time::Duration::from_millis(backoff_ms as u64))
                            .await;
                    }
                }
            }
        }

        Ok(Self {
            bucket,
            client,
            public_base,
        })
    }
}

#[async_trait]
impl AssetStore for S3AssetStore {
    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<String, AssetStoreError> {
        use aws_sdk_s3::primitives::ByteStream;
        let put = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type(
                infer::get(bytes)
                    .map(|t| t.mime_type().to_string())
                    .unwrap_or_else(|| "application/octet-stream".into()),
            );
        if let Err(e) = put.send().await {
            error!(
                "put_object failed path={path} bucket={} err={:?}",
                self.bucket, e
            );
            let hint = if e.to_string().contains("NoSuchBucket") {
                " (bucket missing or not yet propagated)"
            } else if e.to_string().contains("AccessDenied") {
                " (check S3_ACCESS_KEY/S3_SECRET_KEY permissions)"
            } else {
                ""
            };
            return Err(AssetStoreError::Other(format!("{e}{hint}")));
        }
        Ok(self.public_url(path))
    }

    async fn delete(&self, path: &str) -> Result<(), AssetStoreError> {
        // S3 delete is idempotent; a missing key is not an error
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| AssetStoreError::Other(e.to_string()))?;
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base.trim_end_matches('/'), path)
    }
}

// Factory used in main; panic early if misconfigured
pub async fn build_asset_store() -> Arc<dyn AssetStore> {
    match S3AssetStore::new().await {
        Ok(store) => Arc::new(store),
        Err(e) => panic!("Failed to initialize S3 asset store: {e}"),
    }
}
