//! Configuration loading via `ortho-config`.

use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Default location of the JSON mapping table.
pub const DEFAULT_MAPPING_FILE: &str = "ec2-volumes-mappings.json";

/// Gateway settings derived from configuration files and environment
/// variables.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "EC2_VOLUMES",
    discovery(
        app_name = "ec2-volumes",
        env_var = "EC2_VOLUMES_CONFIG_PATH",
        config_file_name = "ec2-volumes.toml",
        dotfile_name = ".ec2-volumes.toml",
        project_file_name = "ec2-volumes.toml"
    )
)]
pub struct GatewayConfig {
    /// Keystone token sent as `X-Auth-Token` to both services.
    pub auth_token: String,
    /// Base URL of the block-storage API, including the project path
    /// (for example `https://cloud.example/volume/v3/<project>`).
    pub volume_endpoint: String,
    /// Base URL of the compute API (for example
    /// `https://cloud.example/compute/v2.1`).
    pub compute_endpoint: String,
    /// Path of the JSON file holding the EC2 ID mapping table.
    #[ortho_config(default = DEFAULT_MAPPING_FILE.to_owned())]
    pub mapping_file: String,
    /// Per-request timeout for backend HTTP calls, in seconds.
    #[ortho_config(default = 30)]
    pub http_timeout_secs: u64,
    /// Availability zone used when a create request names none.
    pub default_availability_zone: Option<String>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn hint(&self) -> String {
        format!(
            "set {} or add {} to ec2-volumes.toml",
            self.env_var, self.toml_key
        )
    }
}

const AUTH_TOKEN: FieldMetadata =
    FieldMetadata::new("API auth token", "EC2_VOLUMES_AUTH_TOKEN", "auth_token");
const VOLUME_ENDPOINT: FieldMetadata = FieldMetadata::new(
    "block-storage endpoint",
    "EC2_VOLUMES_VOLUME_ENDPOINT",
    "volume_endpoint",
);
const COMPUTE_ENDPOINT: FieldMetadata = FieldMetadata::new(
    "compute endpoint",
    "EC2_VOLUMES_COMPUTE_ENDPOINT",
    "compute_endpoint",
);
const MAPPING_FILE: FieldMetadata = FieldMetadata::new(
    "mapping file path",
    "EC2_VOLUMES_MAPPING_FILE",
    "mapping_file",
);
const HTTP_TIMEOUT: FieldMetadata = FieldMetadata::new(
    "HTTP timeout",
    "EC2_VOLUMES_HTTP_TIMEOUT_SECS",
    "http_timeout_secs",
);

impl GatewayConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: {}",
                metadata.description,
                metadata.hint()
            )));
        }
        Ok(())
    }

    fn require_url(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        Self::require_field(value, metadata)?;
        let trimmed = value.trim();
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(ConfigError::InvalidField(format!(
                "{} must be an http(s) URL, got '{trimmed}': {}",
                metadata.description,
                metadata.hint()
            )));
        }
        Ok(())
    }

    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, and environment variables in that
    /// order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("ec2-volumes")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and TOML key that supply the offending value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::InvalidField`] when a value is unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(&self.auth_token, &AUTH_TOKEN)?;
        Self::require_url(&self.volume_endpoint, &VOLUME_ENDPOINT)?;
        Self::require_url(&self.compute_endpoint, &COMPUTE_ENDPOINT)?;
        Self::require_field(&self.mapping_file, &MAPPING_FILE)?;
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::InvalidField(format!(
                "{} must be at least one second: {}",
                HTTP_TIMEOUT.description,
                HTTP_TIMEOUT.hint()
            )));
        }
        Ok(())
    }

    /// Timeout applied to every backend HTTP request.
    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Mapping file location as a UTF-8 path.
    #[must_use]
    pub fn mapping_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(self.mapping_file.trim())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configuration value cannot be used.
    #[error("invalid configuration value: {0}")]
    InvalidField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
