//! Object-storage collaborator consumed as opaque managed-API calls.
//!
//! The provisioning workflow does not depend on this module; it exists for
//! the artifact paths around it (bucket lifecycle, transfer, time-limited
//! access links) and for the transform handler, which consumes only the
//! narrow [`ObjectStore`] text seam.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, Delete, ObjectIdentifier,
    ServerSideEncryption,
};
use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Region whose buckets take no location constraint.
const DEFAULT_REGION: &str = "us-east-1";

/// Errors raised by object-storage operations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum StorageError {
    /// Raised when the requested object does not exist.
    #[error("object {bucket}/{key} not found")]
    ObjectNotFound {
        /// Bucket that was queried.
        bucket: String,
        /// Object key that was absent.
        key: String,
    },
    /// Raised when a local file to upload does not exist.
    #[error("local file {path} not found")]
    MissingLocalFile {
        /// Path that was absent.
        path: Utf8PathBuf,
    },
    /// Raised when an object's bytes are not valid UTF-8 text.
    #[error("object {bucket}/{key} is not valid UTF-8 text")]
    NotText {
        /// Bucket holding the object.
        bucket: String,
        /// Key of the non-text object.
        key: String,
    },
    /// Wrapper for any other storage API failure.
    #[error("storage request failed: {message}")]
    Request {
        /// Message returned by the storage SDK.
        message: String,
    },
}

impl StorageError {
    fn request(message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
        }
    }
}

/// Future returned by object-store operations.
pub type StorageFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, StorageError>> + Send + 'a>>;

/// Narrow text get/put seam consumed by the transform handler.
pub trait ObjectStore {
    /// Fetches an object and decodes it as UTF-8 text.
    fn fetch_text<'a>(&'a self, bucket: &'a str, key: &'a str) -> StorageFuture<'a, String>;

    /// Stores text as an object.
    fn store_text<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        body: String,
    ) -> StorageFuture<'a, ()>;
}

/// Outcome of a bucket creation attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BucketCreation {
    /// The bucket was created by this call.
    Created,
    /// The bucket already exists and is owned by this account; non-fatal.
    AlreadyOwned,
}

/// Managed-API client scoped to one bucket.
#[derive(Clone, Debug)]
pub struct BucketClient {
    client: aws_sdk_s3::Client,
    bucket: String,
    region: String,
}

fn error_code_matches<E, R>(err: &aws_sdk_s3::error::SdkError<E, R>, code: &str) -> bool
where
    E: ProvideErrorMetadata,
{
    err.as_service_error()
        .and_then(ProvideErrorMetadata::code)
        .is_some_and(|actual| actual == code)
}

fn sdk_message<E, R>(err: &aws_sdk_s3::error::SdkError<E, R>) -> String
where
    E: ProvideErrorMetadata + std::fmt::Debug,
{
    err.as_service_error()
        .and_then(ProvideErrorMetadata::message)
        .map_or_else(|| format!("{err:?}"), str::to_owned)
}

impl BucketClient {
    /// Creates a client for one bucket from a loaded SDK configuration.
    #[must_use]
    pub fn new(
        sdk_config: &aws_config::SdkConfig,
        bucket: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(sdk_config),
            bucket: bucket.into(),
            region: region.into(),
        }
    }

    /// Returns the bucket this client operates on.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Creates the bucket, treating "already owned by you" as non-fatal.
    ///
    /// The region location constraint is applied except in the provider's
    /// default region, which rejects an explicit constraint.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Request`] on any other API failure.
    pub async fn create_bucket(&self) -> Result<BucketCreation, StorageError> {
        let mut request = self.client.create_bucket().bucket(&self.bucket);
        if self.region != DEFAULT_REGION {
            let constraint = BucketLocationConstraint::from(self.region.as_str());
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(constraint)
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => Ok(BucketCreation::Created),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|service| service.is_bucket_already_owned_by_you()) =>
            {
                Ok(BucketCreation::AlreadyOwned)
            }
            Err(err) => Err(StorageError::request(sdk_message(&err))),
        }
    }

    /// Uploads a local file, optionally with AES-256 server-side
    /// encryption.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::MissingLocalFile`] when the file does not
    /// exist and [`StorageError::Request`] on API failures.
    pub async fn upload_file(
        &self,
        local_path: &Utf8Path,
        key: &str,
        encrypt: bool,
    ) -> Result<(), StorageError> {
        let body = ByteStream::from_path(local_path.as_std_path())
            .await
            .map_err(|_| StorageError::MissingLocalFile {
                path: local_path.to_owned(),
            })?;

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body);
        if encrypt {
            request = request.server_side_encryption(ServerSideEncryption::Aes256);
        }

        request
            .send()
            .await
            .map_err(|err| StorageError::request(sdk_message(&err)))?;
        Ok(())
    }

    /// Downloads an object to a local file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ObjectNotFound`] when the key is absent and
    /// [`StorageError::Request`] on other failures.
    pub async fn download_file(
        &self,
        key: &str,
        local_path: &Utf8Path,
    ) -> Result<(), StorageError> {
        let bytes = self.fetch_bytes(&self.bucket, key).await?;
        std::fs::write(local_path.as_std_path(), bytes)
            .map_err(|err| StorageError::request(err.to_string()))
    }

    /// Lists every object key in the bucket.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Request`] on API failures.
    pub async fn list_keys(&self) -> Result<Vec<String>, StorageError> {
        let listed = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|err| StorageError::request(sdk_message(&err)))?;

        Ok(listed
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_owned))
            .collect())
    }

    /// Generates a time-limited GET link for an object.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Request`] when the expiry is not
    /// presignable or the signing fails.
    pub async fn presigned_get_url(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        let config = PresigningConfig::expires_in(expires_in)
            .map_err(|err| StorageError::request(err.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|err| StorageError::request(sdk_message(&err)))?;

        Ok(presigned.uri().to_string())
    }

    /// Deletes every object then the bucket itself. An absent bucket is
    /// success, so a second purge run is clean.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Request`] on API failures other than
    /// absence.
    pub async fn purge(&self) -> Result<(), StorageError> {
        let listed = match self.client.list_objects_v2().bucket(&self.bucket).send().await {
            Ok(listed) => listed,
            Err(err) if error_code_matches(&err, "NoSuchBucket") => return Ok(()),
            Err(err) => return Err(StorageError::request(sdk_message(&err))),
        };

        let identifiers = listed
            .contents()
            .iter()
            .filter_map(|object| object.key())
            .map(|key| {
                ObjectIdentifier::builder()
                    .key(key)
                    .build()
                    .map_err(|err| StorageError::request(err.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if !identifiers.is_empty() {
            let delete = Delete::builder()
                .set_objects(Some(identifiers))
                .build()
                .map_err(|err| StorageError::request(err.to_string()))?;
            self.client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|err| StorageError::request(sdk_message(&err)))?;
        }

        match self.client.delete_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(()),
            Err(err) if error_code_matches(&err, "NoSuchBucket") => Ok(()),
            Err(err) => Err(StorageError::request(sdk_message(&err))),
        }
    }

    async fn fetch_bytes(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let object = match self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
        {
            Ok(object) => object,
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(aws_sdk_s3::operation::get_object::GetObjectError::is_no_such_key) =>
            {
                return Err(StorageError::ObjectNotFound {
                    bucket: bucket.to_owned(),
                    key: key.to_owned(),
                });
            }
            Err(err) => return Err(StorageError::request(sdk_message(&err))),
        };

        let bytes = object
            .body
            .collect()
            .await
            .map_err(|err| StorageError::request(err.to_string()))?;
        Ok(bytes.into_bytes().to_vec())
    }
}

impl ObjectStore for BucketClient {
    fn fetch_text<'a>(&'a self, bucket: &'a str, key: &'a str) -> StorageFuture<'a, String> {
        Box::pin(async move {
            let bytes = self.fetch_bytes(bucket, key).await?;
            String::from_utf8(bytes).map_err(|_| StorageError::NotText {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
            })
        })
    }

    fn store_text<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        body: String,
    ) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            self.client
                .put_object()
                .bucket(bucket)
                .key(key)
                .body(ByteStream::from(body.into_bytes()))
                .send()
                .await
                .map_err(|err| StorageError::request(sdk_message(&err)))?;
            Ok(())
        })
    }
}
