use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::AppError;

/// Key prefix under which uploaded recipe images are stored.
pub const IMAGE_KEY_PREFIX: &str = "images/";

/// Public URL path under which uploaded images are served.
pub const IMAGE_URL_PREFIX: &str = "/api/v1/images/";

/// Trait for blob storage operations (S3-compatible).
///
/// Abstracted as a trait so tests can use a mock without a real S3 instance.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Upload content to the given key.
    async fn put_object(&self, key: &str, content: Vec<u8>) -> Result<(), AppError>;

    /// Retrieve content by key. Returns `None` if the object doesn't exist.
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, AppError>;

    /// Delete the object at `key`. Deleting a missing object is not an error.
    async fn delete_object(&self, key: &str) -> Result<(), AppError>;
}

/// Map a recipe's `image_url` back to the blob key it was stored under.
///
/// Understands the URLs produced by the upload endpoint
/// (`/api/v1/images/<name>`, relative or absolute) and object-style download
/// URLs carrying a percent-encoded path after `/o/`. Anything else yields
/// `None`: the image is not ours to delete.
pub fn blob_key_from_image_url(image_url: &str) -> Option<String> {
    let base = url::Url::parse("http://localhost/").ok()?;
    let parsed = base.join(image_url.trim()).ok()?;
    let path = parsed.path();

    let key = if let Some(name) = path.strip_prefix(IMAGE_URL_PREFIX) {
        format!("{IMAGE_KEY_PREFIX}{}", urlencoding::decode(name).ok()?)
    } else {
        let start = path.find("/o/")? + 3;
        urlencoding::decode(&path[start..]).ok()?.into_owned()
    };

    if key.is_empty() || key.ends_with('/') {
        None
    } else {
        Some(key)
    }
}

/// Blob store kept in a map. Used by tests and the `memory` backend.
#[derive(Default)]
pub struct InMemoryStorageClient {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryStorageClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects
            .lock()
            .map(|objects| objects.contains_key(key))
            .unwrap_or(false)
    }
}

fn poisoned<T>(_: T) -> AppError {
    AppError::Storage("In-memory storage lock poisoned".into())
}

#[async_trait]
impl StorageClient for InMemoryStorageClient {
    async fn put_object(&self, key: &str, content: Vec<u8>) -> Result<(), AppError> {
        self.objects
            .lock()
            .map_err(poisoned)?
            .insert(key.to_string(), content);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, AppError> {
        Ok(self.objects.lock().map_err(poisoned)?.get(key).cloned())
    }

    async fn delete_object(&self, key: &str) -> Result<(), AppError> {
        self.objects.lock().map_err(poisoned)?.remove(key);
        Ok(())
    }
}

/// S3 implementation of StorageClient.
///
/// Only available when the `server` feature is enabled.
#[cfg(feature = "server")]
pub struct S3StorageClient {
    client: aws_sdk_s3::Client,
    bucket: String,
}

#[cfg(feature = "server")]
impl S3StorageClient {
    /// Create a new S3 storage client for `bucket`.
    ///
    /// Credentials and region come from the usual AWS environment; an
    /// explicit `endpoint` selects MinIO / LocalStack (path-style addressing).
    pub async fn connect(bucket: String, endpoint: Option<&str>) -> Self {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(endpoint) = endpoint {
            config_loader = config_loader.endpoint_url(endpoint);
        }

        let sdk_config = config_loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(endpoint.is_some())
            .build();

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket,
        }
    }

    /// Create with explicit values (useful for testing / DI).
    pub fn new(client: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[cfg(feature = "server")]
#[async_trait]
impl StorageClient for S3StorageClient {
    async fn put_object(&self, key: &str, content: Vec<u8>) -> Result<(), AppError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(content.into())
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to put object '{}': {}", key, e)))?;

        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, AppError> {
        match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| AppError::Storage(format!("Failed to read body: {}", e)))?;
                Ok(Some(bytes.into_bytes().to_vec()))
            }
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    Ok(None)
                } else {
                    Err(AppError::Storage(format!(
                        "Failed to get object '{}': {}",
                        key, service_err
                    )))
                }
            }
        }
    }

    async fn delete_object(&self, key: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to delete object '{}': {}", key, e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_from_upload_url() {
        assert_eq!(
            blob_key_from_image_url("/api/v1/images/1700000000_pie.png").as_deref(),
            Some("images/1700000000_pie.png")
        );
        assert_eq!(
            blob_key_from_image_url("https://recipes.example.com/api/v1/images/42_soup.jpg?v=2")
                .as_deref(),
            Some("images/42_soup.jpg")
        );
    }

    #[test]
    fn test_key_from_object_download_url() {
        let url = "https://storage.example.com/v0/b/bucket/o/recipes%2Fabc%2Fpie.png?alt=media&token=t";
        assert_eq!(
            blob_key_from_image_url(url).as_deref(),
            Some("recipes/abc/pie.png")
        );
    }

    #[test]
    fn test_foreign_urls_are_ignored() {
        assert_eq!(blob_key_from_image_url("https://cdn.example.com/pie.png"), None);
        assert_eq!(blob_key_from_image_url("/api/v1/images/"), None);
    }

    #[tokio::test]
    async fn test_in_memory_storage() {
        let storage = InMemoryStorageClient::new();
        storage.put_object("images/a.png", vec![1, 2, 3]).await.unwrap();
        assert!(storage.contains("images/a.png"));
        assert_eq!(storage.get_object("images/a.png").await.unwrap(), Some(vec![1, 2, 3]));

        storage.delete_object("images/a.png").await.unwrap();
        assert_eq!(storage.get_object("images/a.png").await.unwrap(), None);
        storage.delete_object("images/a.png").await.unwrap();
    }
}
