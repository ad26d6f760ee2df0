//! Configuration loading via `ortho-config`.

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::keystore::KeyStore;
use crate::provision::{ProvisionRequest, RequestError};
use crate::teardown::TeardownRequest;

/// Provisioner configuration derived from environment variables,
/// configuration files, and defaults.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "PALISADE")]
pub struct ProvisionerConfig {
    /// Provider region to operate in.
    #[ortho_config(default = "us-west-2".to_owned())]
    pub region: String,
    /// Machine size class for new instances. Defaults to the smallest
    /// burstable class to minimise cost.
    #[ortho_config(default = "t2.micro".to_owned())]
    pub size_class: String,
    /// Boot image identifier. This value is required; image identifiers are
    /// region-specific and have no safe default.
    pub image_id: String,
    /// Firewall rule set name, unique per account/region.
    #[ortho_config(default = "web-server-sg".to_owned())]
    pub firewall_name: String,
    /// Description recorded on the firewall rule set at creation.
    #[ortho_config(default = "Web server with SSH, HTTP, HTTPS".to_owned())]
    pub firewall_description: String,
    /// SSH credential name.
    #[ortho_config(default = "web-server-key".to_owned())]
    pub credential_name: String,
    /// `Name` tag applied to launched instances.
    #[ortho_config(default = "web-server".to_owned())]
    pub instance_name: String,
    /// Directory key material is stored under.
    #[ortho_config(default = "keys".to_owned())]
    pub key_dir: String,
    /// Public address discovery endpoint.
    #[ortho_config(default = "https://api.ipify.org?format=json".to_owned())]
    pub ip_service_url: String,
}

/// Metadata for a configuration field, used to generate actionable error
/// messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(
        description: &'static str,
        env_var: &'static str,
        toml_key: &'static str,
    ) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl ProvisionerConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to palisade.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags
    /// in that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge
    /// sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments.
    /// Values still merge defaults, configuration files, and environment
    /// variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("palisade")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Builds a [`ProvisionRequest`] from the configured values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn as_request(&self) -> Result<ProvisionRequest, ConfigError> {
        self.validate()?;
        ProvisionRequest::builder()
            .firewall_name(&self.firewall_name)
            .firewall_description(&self.firewall_description)
            .credential_name(&self.credential_name)
            .size_class(&self.size_class)
            .image_id(&self.image_id)
            .instance_name(&self.instance_name)
            .build()
            .map_err(ConfigError::from)
    }

    /// Builds a [`TeardownRequest`] naming the configured resources.
    #[must_use]
    pub fn as_teardown_request(&self) -> TeardownRequest {
        TeardownRequest {
            firewall_name: self.firewall_name.clone(),
            credential_name: self.credential_name.clone(),
        }
    }

    /// Builds the key store rooted at the configured directory.
    #[must_use]
    pub fn key_store(&self) -> KeyStore {
        KeyStore::new(Utf8PathBuf::from(&self.key_dir))
    }

    /// Performs semantic validation on required fields. Error messages
    /// include guidance on how to provide missing values via environment
    /// variables or configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.region,
            &FieldMetadata::new("provider region", "PALISADE_REGION", "region"),
        )?;
        Self::require_field(
            &self.image_id,
            &FieldMetadata::new("boot image identifier", "PALISADE_IMAGE_ID", "image_id"),
        )?;
        Self::require_field(
            &self.size_class,
            &FieldMetadata::new("machine size class", "PALISADE_SIZE_CLASS", "size_class"),
        )?;
        Self::require_field(
            &self.firewall_name,
            &FieldMetadata::new(
                "firewall rule set name",
                "PALISADE_FIREWALL_NAME",
                "firewall_name",
            ),
        )?;
        Self::require_field(
            &self.credential_name,
            &FieldMetadata::new(
                "SSH credential name",
                "PALISADE_CREDENTIAL_NAME",
                "credential_name",
            ),
        )?;
        Self::require_field(
            &self.key_dir,
            &FieldMetadata::new("key directory", "PALISADE_KEY_DIR", "key_dir"),
        )?;
        Self::require_field(
            &self.ip_service_url,
            &FieldMetadata::new(
                "address discovery URL",
                "PALISADE_IP_SERVICE_URL",
                "ip_service_url",
            ),
        )?;
        Ok(())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

impl From<RequestError> for ConfigError {
    fn from(value: RequestError) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::EnvGuard;

    fn populated() -> ProvisionerConfig {
        ProvisionerConfig {
            region: String::from("us-west-2"),
            size_class: String::from("t2.micro"),
            image_id: String::from("ami-0abcdef1234567890"),
            firewall_name: String::from("web-server-sg"),
            firewall_description: String::from("Web server with SSH, HTTP, HTTPS"),
            credential_name: String::from("web-server-key"),
            instance_name: String::from("web-server"),
            key_dir: String::from("keys"),
            ip_service_url: String::from("https://api.ipify.org?format=json"),
        }
    }

    #[test]
    fn validate_requires_image_id() {
        let config = ProvisionerConfig {
            image_id: String::new(),
            ..populated()
        };
        let error = config.validate().expect_err("image id should be required");
        assert!(
            matches!(error, ConfigError::MissingField(ref message)
                if message.contains("PALISADE_IMAGE_ID")),
            "unexpected error: {error}"
        );
    }

    #[test]
    fn as_request_carries_configured_values() {
        let request = populated().as_request().expect("request should build");
        assert_eq!(request.firewall_name, "web-server-sg");
        assert_eq!(request.size_class, "t2.micro");
        assert_eq!(request.image_id, "ami-0abcdef1234567890");
    }

    #[tokio::test]
    async fn load_without_cli_args_reads_environment() {
        let _guard = EnvGuard::set_vars(&[
            ("PALISADE_IMAGE_ID", "ami-0fedcba9876543210"),
            ("PALISADE_REGION", "eu-west-1"),
        ])
        .await;

        let config = ProvisionerConfig::load_without_cli_args().expect("config should load");
        assert_eq!(config.image_id, "ami-0fedcba9876543210");
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.firewall_name, "web-server-sg");
    }

    #[test]
    fn key_store_uses_configured_directory() {
        let store = populated().key_store();
        assert_eq!(
            store.key_path("web-server-key").as_str(),
            "keys/web-server-key.pem"
        );
    }
}
