//! Object storage for uploaded files.
//!
//! The [`ObjectStorage`] trait treats storage as a key/value blob store with
//! a URI-addressable namespace. Uploaded documents land under
//! `{prefix}/{uuid}-{filename}` so names never collide.
//!
//! [`S3Storage`] talks to the S3 REST API directly with AWS Signature V4
//! authentication, using only pure-Rust dependencies (`hmac`, `sha2`) for
//! signing. Custom endpoints are supported for S3-compatible services
//! (MinIO, LocalStack).
//!
//! # Environment Variables
//!
//! Credentials are read from environment variables:
//! - `AWS_ACCESS_KEY_ID` — required
//! - `AWS_SECRET_ACCESS_KEY` — required
//! - `AWS_SESSION_TOKEN` — optional (for temporary credentials / IAM roles)

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Key/value blob store with a URI-addressable namespace.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` under `key`; returns the storage URI.
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String>;

    /// Fetch the bytes stored under `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Delete the object under `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Produce a time-limited download URL for `key`.
    async fn presign_get(&self, key: &str, expires_secs: u64) -> Result<String>;
}

/// Build the object key for an upload: `{prefix}/{uuid}-{filename}`.
pub fn upload_key(prefix: &str, file_name: &str) -> String {
    format!(
        "{}/{}-{}",
        prefix.trim_end_matches('/'),
        Uuid::new_v4(),
        file_name
    )
}

/// Create the storage backend from configuration.
///
/// A configured bucket yields [`S3Storage`]; otherwise uploads fail with
/// `UploadFailed` until storage is configured.
pub fn create_storage(config: &StorageConfig) -> Result<Box<dyn ObjectStorage>> {
    match config.bucket {
        Some(_) => Ok(Box::new(S3Storage::new(config)?)),
        None => Ok(Box::new(DisabledStorage)),
    }
}

// ============ Disabled Storage ============

/// Storage backend used when no bucket is configured. Every operation fails.
pub struct DisabledStorage;

#[async_trait]
impl ObjectStorage for DisabledStorage {
    async fn put(&self, _key: &str, _bytes: &[u8], _content_type: &str) -> Result<String> {
        Err(Error::UploadFailed(
            "object storage is not configured (set storage.bucket)".to_string(),
        ))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        Err(Error::NotFound(format!("object {}", key)))
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    async fn presign_get(&self, _key: &str, _expires_secs: u64) -> Result<String> {
        Err(Error::UploadFailed(
            "object storage is not configured (set storage.bucket)".to_string(),
        ))
    }
}

// ============ In-memory Storage ============

/// In-memory storage backend for tests.
#[derive(Default)]
pub struct MemoryStorage {
    objects: std::sync::RwLock<std::collections::HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn put(&self, key: &str, bytes: &[u8], _content_type: &str) -> Result<String> {
        self.objects
            .write()
            .unwrap()
            .insert(key.to_string(), bytes.to_vec());
        Ok(format!("mem://{}", key))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.objects
            .read()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("object {}", key)))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.write().unwrap().remove(key);
        Ok(())
    }

    async fn presign_get(&self, key: &str, _expires_secs: u64) -> Result<String> {
        Ok(format!("mem://{}", key))
    }
}

// ============ S3 Storage ============

/// AWS credentials loaded from environment variables.
struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl AwsCredentials {
    fn from_env() -> Result<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID").map_err(|_| {
            Error::UploadFailed("AWS_ACCESS_KEY_ID environment variable not set".to_string())
        })?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").map_err(|_| {
            Error::UploadFailed("AWS_SECRET_ACCESS_KEY environment variable not set".to_string())
        })?;
        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

/// S3 blob store with SigV4 header signing for PUT/GET/DELETE and query
/// signing for presigned download URLs.
pub struct S3Storage {
    bucket: String,
    region: String,
    endpoint_url: Option<String>,
    creds: AwsCredentials,
    client: reqwest::Client,
}

impl S3Storage {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let bucket = config
            .bucket
            .clone()
            .ok_or_else(|| Error::UploadFailed("storage.bucket is required".to_string()))?;

        Ok(Self {
            bucket,
            region: config.region.clone(),
            endpoint_url: config.endpoint_url.clone(),
            creds: AwsCredentials::from_env()?,
            client: reqwest::Client::new(),
        })
    }

    /// Compute the S3 hostname for the configured bucket and region.
    ///
    /// A custom `endpoint_url` (MinIO, LocalStack) takes precedence over the
    /// standard `<bucket>.s3.<region>.amazonaws.com` form.
    fn host(&self) -> String {
        if let Some(ref endpoint) = self.endpoint_url {
            endpoint
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .trim_end_matches('/')
                .to_string()
        } else {
            format!("{}.s3.{}.amazonaws.com", self.bucket, self.region)
        }
    }

    fn scheme(&self) -> &'static str {
        match self.endpoint_url {
            Some(ref e) if e.starts_with("http://") => "http",
            _ => "https",
        }
    }

    fn canonical_uri(&self, key: &str) -> String {
        let encoded_key = key.split('/').map(uri_encode).collect::<Vec<_>>().join("/");
        if self.endpoint_url.is_some() {
            // Path-style addressing for custom endpoints.
            format!("/{}/{}", uri_encode(&self.bucket), encoded_key)
        } else {
            format!("/{}", encoded_key)
        }
    }

    /// Send one SigV4 header-signed request and return the response.
    async fn signed_request(
        &self,
        method: reqwest::Method,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<reqwest::Response> {
        let host = self.host();
        let canonical_uri = self.canonical_uri(key);
        let url = format!("{}://{}{}", self.scheme(), host, canonical_uri);

        let now = Utc::now();
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let payload_hash = hex_sha256(&body);

        let mut headers = vec![
            ("host".to_string(), host.clone()),
            ("x-amz-content-sha256".to_string(), payload_hash.clone()),
            ("x-amz-date".to_string(), amz_date.clone()),
        ];
        if let Some(ref token) = self.creds.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        let signed_headers: String = headers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v))
            .collect();

        let canonical_request = format!(
            "{}\n{}\n\n{}\n{}\n{}",
            method.as_str(),
            canonical_uri,
            canonical_headers,
            signed_headers,
            payload_hash
        );

        let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, self.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            credential_scope,
            hex_sha256(canonical_request.as_bytes())
        );

        let signing_key = derive_signing_key(
            &self.creds.secret_access_key,
            &date_stamp,
            &self.region,
            "s3",
        );
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            self.creds.access_key_id, credential_scope, signed_headers, signature
        );

        let mut req = self
            .client
            .request(method, &url)
            .header("Authorization", &authorization)
            .header("x-amz-content-sha256", &payload_hash)
            .header("x-amz-date", &amz_date);

        if let Some(ref token) = self.creds.session_token {
            req = req.header("x-amz-security-token", token);
        }
        if let Some(ct) = content_type {
            req = req.header("Content-Type", ct);
        }
        if !body.is_empty() {
            req = req.body(body);
        }

        req.send()
            .await
            .map_err(|e| Error::UploadFailed(format!("S3 request failed: {}", e)))
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String> {
        let resp = self
            .signed_request(reqwest::Method::PUT, key, bytes.to_vec(), Some(content_type))
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::UploadFailed(format!(
                "S3 PutObject failed (HTTP {}): {}",
                status,
                body.chars().take(500).collect::<String>()
            )));
        }

        Ok(format!("s3://{}/{}", self.bucket, key))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let resp = self
            .signed_request(reqwest::Method::GET, key, Vec::new(), None)
            .await?;

        if resp.status().as_u16() == 404 {
            return Err(Error::NotFound(format!("object {}", key)));
        }
        if !resp.status().is_success() {
            return Err(Error::UploadFailed(format!(
                "S3 GetObject failed (HTTP {}) for key '{}'",
                resp.status(),
                key
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::UploadFailed(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let resp = self
            .signed_request(reqwest::Method::DELETE, key, Vec::new(), None)
            .await?;

        // S3 returns 204 for deletes, including of missing keys.
        if !resp.status().is_success() {
            return Err(Error::UploadFailed(format!(
                "S3 DeleteObject failed (HTTP {}) for key '{}'",
                resp.status(),
                key
            )));
        }

        Ok(())
    }

    async fn presign_get(&self, key: &str, expires_secs: u64) -> Result<String> {
        let host = self.host();
        let canonical_uri = self.canonical_uri(key);

        let now = Utc::now();
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, self.region);

        let mut query_params = vec![
            (
                "X-Amz-Algorithm".to_string(),
                "AWS4-HMAC-SHA256".to_string(),
            ),
            (
                "X-Amz-Credential".to_string(),
                format!("{}/{}", self.creds.access_key_id, credential_scope),
            ),
            ("X-Amz-Date".to_string(), amz_date.clone()),
            ("X-Amz-Expires".to_string(), expires_secs.to_string()),
            ("X-Amz-SignedHeaders".to_string(), "host".to_string()),
        ];
        if let Some(ref token) = self.creds.session_token {
            query_params.push(("X-Amz-Security-Token".to_string(), token.clone()));
        }
        query_params.sort_by(|a, b| a.0.cmp(&b.0));

        let canonical_querystring: String = query_params
            .iter()
            .map(|(k, v)| format!("{}={}", uri_encode(k), uri_encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let canonical_request = format!(
            "GET\n{}\n{}\nhost:{}\n\nhost\nUNSIGNED-PAYLOAD",
            canonical_uri, canonical_querystring, host
        );

        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            credential_scope,
            hex_sha256(canonical_request.as_bytes())
        );

        let signing_key = derive_signing_key(
            &self.creds.secret_access_key,
            &date_stamp,
            &self.region,
            "s3",
        );
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

        Ok(format!(
            "{}://{}{}?{}&X-Amz-Signature={}",
            self.scheme(),
            host,
            canonical_uri,
            canonical_querystring,
            signature
        ))
    }
}

// ============ AWS SigV4 Helpers ============

/// Compute the hex-encoded SHA-256 hash of data.
fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute HMAC-SHA256 of data with the given key.
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Compute hex-encoded HMAC-SHA256.
fn hex_hmac_sha256(key: &[u8], data: &[u8]) -> String {
    hex::encode(hmac_sha256(key, data))
}

/// Derive the AWS SigV4 signing key for a given date, region, and service.
///
/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// URI-encode a string per RFC 3986 (used in SigV4 canonical requests).
///
/// Encodes all characters except unreserved characters:
/// `A-Z a-z 0-9 - _ . ~`
fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}
