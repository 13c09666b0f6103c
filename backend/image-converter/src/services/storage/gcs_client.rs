//! GCS client for the conversion pipeline
//!
//! Reads and writes whole objects through the Cloud Storage XML API
//! (`{endpoint}/{bucket}/{object}`). Requests are authenticated in one of
//! three ways:
//! - V4 signed URLs from a service account key
//! - bearer tokens from the metadata server (ambient credentials)
//! - none, for local emulators

use super::{ObjectStore, StorageError};
use crate::config::{GcsConfig, GcsCredentials};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

/// Characters that must be percent-encoded in the path component
const PATH_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Lifetime of signed URLs; each URL is used once, immediately
const SIGNED_URL_TTL: Duration = Duration::from_secs(300);

/// Refresh metadata tokens this long before they expire
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// GCS client shared by every invocation in the process
pub struct GcsClient {
    scheme: String,
    host: String,
    auth: GcsAuth,
    http_client: Client,
}

enum GcsAuth {
    Signed(UrlSigner),
    Metadata(MetadataTokenSource),
    Anonymous,
}

impl GcsClient {
    /// Create a new GCS client from configuration
    pub fn from_config(cfg: &GcsConfig) -> Result<Self, StorageError> {
        let endpoint = Url::parse(&cfg.endpoint)
            .map_err(|e| StorageError::Connect(format!("Invalid GCS endpoint {}: {e}", cfg.endpoint)))?;
        let host = match (endpoint.host_str(), endpoint.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(StorageError::Connect(format!(
                    "GCS endpoint has no host: {}",
                    cfg.endpoint
                )))
            }
        };

        let http_client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| StorageError::Connect(format!("Failed to create HTTP client: {e}")))?;

        let auth = match &cfg.credentials {
            GcsCredentials::ServiceAccount(json) => GcsAuth::Signed(UrlSigner::from_json(json)?),
            GcsCredentials::MetadataServer { host } => {
                GcsAuth::Metadata(MetadataTokenSource::new(host))
            }
            GcsCredentials::Anonymous => GcsAuth::Anonymous,
        };

        info!(
            endpoint = %cfg.endpoint,
            auth = auth.name(),
            "GCS client initialized"
        );

        Ok(Self {
            scheme: endpoint.scheme().to_string(),
            host,
            auth,
            http_client,
        })
    }

    /// Path of an object relative to the endpoint root
    ///
    /// The key is appended verbatim after the bucket separator. A key may
    /// itself start with `/`, which yields an empty path segment.
    fn canonical_uri(bucket: &str, key: &str) -> String {
        let encoded_object = utf8_percent_encode(key, PATH_SET);
        format!("/{bucket}/{encoded_object}")
    }

    /// Build an authenticated request for `bucket/key`
    async fn request(
        &self,
        method: Method,
        bucket: &str,
        key: &str,
    ) -> Result<RequestBuilder, StorageError> {
        let canonical_uri = Self::canonical_uri(bucket, key);

        let request = match &self.auth {
            GcsAuth::Signed(signer) => {
                let url = signer.sign_url(
                    method.as_str(),
                    &self.scheme,
                    &self.host,
                    &canonical_uri,
                    SIGNED_URL_TTL,
                )?;
                self.http_client.request(method, url)
            }
            GcsAuth::Metadata(tokens) => {
                let token = tokens.token(&self.http_client).await?;
                let url = format!("{}://{}{}", self.scheme, self.host, canonical_uri);
                self.http_client.request(method, url).bearer_auth(token)
            }
            GcsAuth::Anonymous => {
                let url = format!("{}://{}{}", self.scheme, self.host, canonical_uri);
                self.http_client.request(method, url)
            }
        };

        Ok(request)
    }
}

impl GcsAuth {
    fn name(&self) -> &'static str {
        match self {
            GcsAuth::Signed(_) => "service_account",
            GcsAuth::Metadata(_) => "metadata_server",
            GcsAuth::Anonymous => "anonymous",
        }
    }
}

#[async_trait]
impl ObjectStore for GcsClient {
    async fn read_object(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError> {
        let request = self.request(Method::GET, bucket, key).await?;

        debug!(bucket = %bucket, key = %key, "Downloading from GCS");

        let response = request.send().await.map_err(|e| {
            if e.is_connect() {
                StorageError::Connect(format!("GCS download failed: {e}"))
            } else {
                StorageError::Read(format!("GCS download failed: {e}"))
            }
        })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Read(format!(
                "GCS download failed with status {}: {}",
                status, body
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::Read(format!("Failed to read GCS response: {e}")))?;

        debug!(bucket = %bucket, key = %key, size = bytes.len(), "Downloaded from GCS");
        Ok(bytes)
    }

    async fn write_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let request = self.request(Method::PUT, bucket, key).await?;
        let size = data.len();

        debug!(bucket = %bucket, key = %key, size, "Uploading to GCS");

        let response = request
            .header("Content-Type", content_type)
            .body(data)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    StorageError::Connect(format!("GCS upload failed: {e}"))
                } else {
                    StorageError::Write(format!("GCS upload failed: {e}"))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Write(format!(
                "GCS upload failed with status {}: {}",
                status, body
            )));
        }

        info!(bucket = %bucket, key = %key, size, "Uploaded to GCS");
        Ok(())
    }
}

/// Signs V4 URLs with a service account key
struct UrlSigner {
    client_email: String,
    private_key: RsaPrivateKey,
}

impl UrlSigner {
    fn from_json(raw_json: &str) -> Result<Self, StorageError> {
        #[derive(serde::Deserialize)]
        struct Sa {
            client_email: String,
            private_key: String,
        }
        let sa: Sa = serde_json::from_str(raw_json)
            .map_err(|e| StorageError::Connect(format!("Invalid service account JSON: {e}")))?;

        let private_key = RsaPrivateKey::from_pkcs8_pem(&sa.private_key).map_err(|e| {
            StorageError::Connect(format!("Failed to parse service account private key: {e}"))
        })?;

        Ok(Self {
            client_email: sa.client_email,
            private_key,
        })
    }

    fn sign_url(
        &self,
        method: &str,
        scheme: &str,
        host: &str,
        canonical_uri: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        let now = Utc::now();
        let datestamp = now.format("%Y%m%d").to_string();
        let timestamp = now.format("%Y%m%dT%H%M%SZ").to_string();

        let credential_scope = format!("{datestamp}/auto/storage/goog4_request");
        let credential = format!("{}/{}", self.client_email, credential_scope);

        // Only host is signed so the upload content type stays free
        let canonical_headers = format!("host:{}\n", host);
        let signed_headers = "host";

        let mut query_items = vec![
            ("X-Goog-Algorithm", "GOOG4-RSA-SHA256".to_string()),
            (
                "X-Goog-Credential",
                urlencoding::encode(&credential).into_owned(),
            ),
            ("X-Goog-Date", timestamp.clone()),
            ("X-Goog-Expires", expires_in.as_secs().to_string()),
            ("X-Goog-SignedHeaders", signed_headers.to_string()),
        ];

        query_items.sort_by(|a, b| a.0.cmp(b.0));
        let canonical_query = query_items
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let canonical_request = format!(
            "{method}\n{canonical_uri}\n{canonical_query}\n{canonical_headers}\n{signed_headers}\nUNSIGNED-PAYLOAD"
        );
        let canonical_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));

        let string_to_sign =
            format!("GOOG4-RSA-SHA256\n{timestamp}\n{credential_scope}\n{canonical_hash}");

        let signing_key = SigningKey::<Sha256>::new(self.private_key.clone());
        let signature = signing_key
            .try_sign(string_to_sign.as_bytes())
            .map_err(|e| StorageError::Connect(format!("Failed to sign GCS URL: {e}")))?
            .to_bytes();

        Ok(format!(
            "{scheme}://{host}{canonical_uri}?{canonical_query}&X-Goog-Signature={}",
            hex::encode(signature)
        ))
    }
}

/// Access tokens from the GCE/Cloud Run metadata server, cached until
/// shortly before expiry
struct MetadataTokenSource {
    token_url: String,
    cached: RwLock<Option<CachedToken>>,
}

struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

impl MetadataTokenSource {
    fn new(host: &str) -> Self {
        Self {
            token_url: format!(
                "http://{host}/computeMetadata/v1/instance/service-accounts/default/token"
            ),
            cached: RwLock::new(None),
        }
    }

    async fn token(&self, http_client: &Client) -> Result<String, StorageError> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.access_token.clone());
            }
        }

        let mut slot = self.cached.write().await;
        if let Some(cached) = slot.as_ref() {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.access_token.clone());
            }
        }

        let response = http_client
            .get(&self.token_url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| StorageError::Connect(format!("Metadata server unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(StorageError::Connect(format!(
                "Metadata server returned status {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Connect(format!("Invalid metadata token response: {e}")))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        debug!(expires_in = token.expires_in, "Fetched metadata access token");

        *slot = Some(CachedToken {
            access_token: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });

        Ok(token.access_token)
    }
}
