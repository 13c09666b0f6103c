/// Configuration management for image-converter
///
/// Loads configuration from environment variables with sensible defaults.
/// The destination bucket is optional at load time: an invocation without it
/// fails with `ConvertError::ConfigMissing` instead of refusing to boot.
use base64::Engine;
use std::time::Duration;

pub const DEFAULT_GCS_ENDPOINT: &str = "https://storage.googleapis.com";
pub const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";

#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppConfig,
    pub conversion: ConversionConfig,
    pub gcs: GcsConfig,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub json_logs: bool,
}

/// Settings the conversion pipeline is constructed with
#[derive(Clone, Debug)]
pub struct ConversionConfig {
    /// Bucket converted images are written to
    pub destination_bucket: Option<String>,
    /// Upper bound on a single invocation
    pub deadline: Duration,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            destination_bucket: None,
            deadline: Duration::from_secs(60),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GcsConfig {
    pub endpoint: String,
    pub credentials: GcsCredentials,
}

/// How requests to the object store are authenticated
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GcsCredentials {
    /// Service account JSON; requests use V4 signed URLs
    ServiceAccount(String),
    /// Ambient credentials from the metadata server
    MetadataServer { host: String },
    /// No authentication (local emulators)
    Anonymous,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            app: AppConfig {
                host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .unwrap_or(8080),
                json_logs: std::env::var("LOG_FORMAT")
                    .map(|v| v.eq_ignore_ascii_case("json"))
                    .unwrap_or(false),
            },
            conversion: ConversionConfig {
                destination_bucket: std::env::var("DESTINATION_BUCKET")
                    .ok()
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty()),
                deadline: Duration::from_secs(
                    std::env::var("FUNCTION_TIMEOUT_SEC")
                        .ok()
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(60),
                ),
            },
            gcs: GcsConfig {
                endpoint: std::env::var("GCS_ENDPOINT")
                    .unwrap_or_else(|_| DEFAULT_GCS_ENDPOINT.to_string()),
                credentials: load_credentials()?,
            },
        })
    }
}

/// Resolve credentials: service account (inline, then file), anonymous if
/// requested, otherwise the metadata server.
fn load_credentials() -> Result<GcsCredentials, Box<dyn std::error::Error>> {
    if let Ok(json) = std::env::var("GCS_SERVICE_ACCOUNT_JSON") {
        return Ok(GcsCredentials::ServiceAccount(decode_service_account(
            &json,
        )?));
    }

    if let Ok(path) = std::env::var("GCS_SERVICE_ACCOUNT_JSON_PATH") {
        let json = std::fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read service account JSON at {path}: {e}"))?;
        return Ok(GcsCredentials::ServiceAccount(json));
    }

    let anonymous = std::env::var("GCS_ANONYMOUS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);
    if anonymous {
        return Ok(GcsCredentials::Anonymous);
    }

    Ok(GcsCredentials::MetadataServer {
        host: std::env::var("GCE_METADATA_HOST")
            .unwrap_or_else(|_| DEFAULT_METADATA_HOST.to_string()),
    })
}

/// Accept the service account JSON raw or base64 encoded
fn decode_service_account(raw: &str) -> Result<String, Box<dyn std::error::Error>> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        return Ok(trimmed.to_string());
    }

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(trimmed)
        .map_err(|e| format!("Failed to decode base64 service account JSON: {e}"))?;
    Ok(String::from_utf8(decoded)
        .map_err(|e| format!("Invalid UTF-8 in service account JSON: {e}"))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "DESTINATION_BUCKET",
        "PORT",
        "FUNCTION_TIMEOUT_SEC",
        "GCS_ENDPOINT",
        "GCS_SERVICE_ACCOUNT_JSON",
        "GCS_SERVICE_ACCOUNT_JSON_PATH",
        "GCS_ANONYMOUS",
        "GCE_METADATA_HOST",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = Config::from_env().unwrap();
        assert_eq!(config.app.port, 8080);
        assert_eq!(config.conversion.destination_bucket, None);
        assert_eq!(config.conversion.deadline, Duration::from_secs(60));
        assert_eq!(config.gcs.endpoint, DEFAULT_GCS_ENDPOINT);
        assert_eq!(
            config.gcs.credentials,
            GcsCredentials::MetadataServer {
                host: DEFAULT_METADATA_HOST.to_string()
            }
        );
    }

    #[test]
    #[serial]
    fn test_blank_destination_bucket_is_absent() {
        clear_env();
        std::env::set_var("DESTINATION_BUCKET", "   ");
        let config = Config::from_env().unwrap();
        assert_eq!(config.conversion.destination_bucket, None);

        std::env::set_var("DESTINATION_BUCKET", "dst-bucket");
        std::env::set_var("FUNCTION_TIMEOUT_SEC", "5");
        let config = Config::from_env().unwrap();
        assert_eq!(
            config.conversion.destination_bucket.as_deref(),
            Some("dst-bucket")
        );
        assert_eq!(config.conversion.deadline, Duration::from_secs(5));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_service_account_base64() {
        clear_env();
        let json = r#"{"client_email":"a@b","private_key":"k"}"#;
        let encoded = base64::engine::general_purpose::STANDARD.encode(json);
        std::env::set_var("GCS_SERVICE_ACCOUNT_JSON", encoded);
        let config = Config::from_env().unwrap();
        assert_eq!(
            config.gcs.credentials,
            GcsCredentials::ServiceAccount(json.to_string())
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn test_anonymous_credentials() {
        clear_env();
        std::env::set_var("GCS_ANONYMOUS", "true");
        std::env::set_var("GCS_ENDPOINT", "http://localhost:4443");
        let config = Config::from_env().unwrap();
        assert_eq!(config.gcs.credentials, GcsCredentials::Anonymous);
        assert_eq!(config.gcs.endpoint, "http://localhost:4443");
        clear_env();
    }
}
