//! Classification of AWS SDK errors onto the provider error taxonomy.
//!
//! Uses the error metadata `.code()` instead of string matching on Debug
//! format.

use aws_sdk_ec2::error::{ProvideErrorMetadata, SdkError};

use crate::provider::ProviderError;

/// Known AWS error codes for "not found" conditions.
const NOT_FOUND_CODES: &[&str] = &[
    "InvalidGroup.NotFound",
    "InvalidKeyPair.NotFound",
    "InvalidInstanceID.NotFound",
    "InvalidPermission.NotFound",
];

/// Known AWS error codes for "already exists" conditions.
const ALREADY_EXISTS_CODES: &[&str] = &[
    "InvalidGroup.Duplicate",
    "InvalidKeyPair.Duplicate",
    "InvalidPermission.Duplicate",
];

/// Classifies an SDK error against a named resource.
pub(super) fn classify<E, R>(err: &SdkError<E, R>, resource: &str, name: &str) -> ProviderError
where
    E: ProvideErrorMetadata + std::fmt::Debug,
{
    let code = err.as_service_error().and_then(ProvideErrorMetadata::code);
    match code {
        Some(code) if ALREADY_EXISTS_CODES.contains(&code) => {
            ProviderError::already_exists(resource, name)
        }
        Some(code) if NOT_FOUND_CODES.contains(&code) => ProviderError::not_found(resource, name),
        _ => {
            let message = err
                .as_service_error()
                .and_then(ProvideErrorMetadata::message)
                .map_or_else(|| format!("{err:?}"), str::to_owned);
            ProviderError::request(message)
        }
    }
}
