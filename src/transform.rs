//! Uppercase file-transform handler.
//!
//! Mirrors an event-triggered serverless handler: download the triggered
//! object, uppercase its text, upload the result to the output bucket. The
//! handler reports a structured status instead of raising, so a hosting
//! runtime can relay the outcome verbatim.

use crate::storage::{ObjectStore, StorageError};

/// Marker inserted into the derived output key.
const OUTPUT_MARKER: &str = "_uppercased";

/// Event describing the object to transform.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransformRequest {
    /// Bucket holding the triggering object.
    pub bucket: String,
    /// Key of the triggering object.
    pub key: String,
    /// Bucket the transformed object is written to.
    pub output_bucket: String,
}

/// Structured handler outcome: a status code and message, never a panic.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransformResponse {
    /// HTTP-style status code: 200 success, 404 missing source, 500 other.
    pub status_code: u16,
    /// Human-readable outcome description.
    pub message: String,
    /// Key the transformed object was written under, on success.
    pub output_key: Option<String>,
}

impl TransformResponse {
    /// Returns true when the transform completed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

/// Derives the output key from the source key, inserting the marker before
/// the extension when one exists after the final path segment.
#[must_use]
pub fn output_key_for(source_key: &str) -> String {
    let split_at = source_key.rfind('/').map_or(0, |slash| slash + 1);
    let (prefix, file_name) = source_key.split_at(split_at);
    match file_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => {
            format!("{prefix}{stem}{OUTPUT_MARKER}.{extension}")
        }
        _ => format!("{prefix}{file_name}{OUTPUT_MARKER}"),
    }
}

/// Downloads the triggering object, uppercases its text, and uploads the
/// result, reporting a structured success or failure.
pub async fn handle_transform<S: ObjectStore>(
    store: &S,
    request: &TransformRequest,
) -> TransformResponse {
    let content = match store.fetch_text(&request.bucket, &request.key).await {
        Ok(content) => content,
        Err(err @ StorageError::ObjectNotFound { .. }) => {
            return TransformResponse {
                status_code: 404,
                message: err.to_string(),
                output_key: None,
            };
        }
        Err(err) => {
            return TransformResponse {
                status_code: 500,
                message: err.to_string(),
                output_key: None,
            };
        }
    };

    let output_key = output_key_for(&request.key);
    let uppercased = content.to_uppercase();

    if let Err(err) = store
        .store_text(&request.output_bucket, &output_key, uppercased)
        .await
    {
        return TransformResponse {
            status_code: 500,
            message: err.to_string(),
            output_key: None,
        };
    }

    TransformResponse {
        status_code: 200,
        message: format!(
            "transformed {}/{} into {}/{}",
            request.bucket, request.key, request.output_bucket, output_key
        ),
        output_key: Some(output_key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("file.txt", "file_uppercased.txt")]
    #[case("uploads/test.txt", "uploads/test_uppercased.txt")]
    #[case("archive.tar.gz", "archive.tar_uppercased.gz")]
    #[case("no-extension", "no-extension_uppercased")]
    #[case("v1.2/readme", "v1.2/readme_uppercased")]
    #[case(".hidden", ".hidden_uppercased")]
    fn output_key_preserves_path_and_extension(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(output_key_for(source), expected);
    }
}
