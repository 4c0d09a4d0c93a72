//! Azure Blob Storage client.
//!
//! Talks to the Azure Blob REST API directly via `reqwest`.  Only the
//! calls the connector needs are implemented: container existence
//! (HEAD with `restype=container`), blob existence (HEAD), and the
//! metadata replacement mutation (PUT with `comp=metadata`, metadata
//! carried as `x-ms-meta-*` headers).
//!
//! Credentials come from the connection configuration, in order of
//! preference:
//!   - `account_key` (Shared Key auth)
//!   - `connection_string` (parsed for `AccountKey=`)
//!   - `sas_token` (appended as query parameter)
//!   - `tenant_id` + `client_id` + `client_secret` (Azure AD
//!     client-credentials OAuth, token cached until expiry)

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::StatusCode;
use sha2::Sha256;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use tracing::debug;

use super::service::BlobServiceClient;
use crate::config::AzureConnectionConfig;
use crate::errors::{generate_request_id, ConnectorError};

/// Azure REST API version used for all requests.
const AZURE_API_VERSION: &str = "2023-11-03";

/// OAuth scope for Azure Storage data-plane access.
const STORAGE_SCOPE: &str = "https://storage.azure.com/.default";

/// Cached access token with expiry.
#[derive(Debug)]
struct CachedToken {
    access_token: String,
    expiry: std::time::Instant,
}

/// Azure authentication method.
#[derive(Debug)]
enum AzureAuth {
    /// Shared Key authentication using the storage account key.
    SharedKey { key_bytes: Vec<u8> },
    /// SAS token authentication (appended as query parameter).
    SasToken { token: String },
    /// Azure AD client-credentials flow (Bearer token).
    ClientCredentials {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
}

/// Blob service client bound to one storage account.
#[derive(Debug)]
pub struct AzureBlobClient {
    /// HTTP client for Azure Blob REST API calls.
    client: reqwest::Client,
    /// Azure storage account name.
    account: String,
    /// Base URL for the Blob service endpoint.
    base_url: String,
    /// Authentication method.
    auth: AzureAuth,
    /// Cached OAuth access token (client-credentials auth only).
    token_cache: Mutex<Option<CachedToken>>,
}

impl AzureBlobClient {
    /// Create a client from a connection configuration section.
    pub fn new(config: &AzureConnectionConfig) -> Result<Self, ConnectorError> {
        if config.account.is_empty() {
            return Err(ConnectorError::InvalidConfiguration {
                message: "Azure connection is missing the storage account name".to_string(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| ConnectorError::Connection {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let base_url = if config.endpoint.is_empty() {
            format!("https://{}.blob.core.windows.net", config.account)
        } else {
            config.endpoint.trim_end_matches('/').to_string()
        };

        let auth = Self::resolve_auth(config)?;

        Ok(Self {
            client,
            account: config.account.clone(),
            base_url,
            auth,
            token_cache: Mutex::new(None),
        })
    }

    /// Resolve the authentication method from the connection config.
    fn resolve_auth(config: &AzureConnectionConfig) -> Result<AzureAuth, ConnectorError> {
        if !config.account_key.is_empty() {
            let key_bytes = BASE64_STANDARD.decode(&config.account_key).map_err(|e| {
                ConnectorError::InvalidConfiguration {
                    message: format!("Invalid account_key (not valid base64): {}", e),
                }
            })?;
            return Ok(AzureAuth::SharedKey { key_bytes });
        }

        if !config.connection_string.is_empty() {
            for part in config.connection_string.split(';') {
                if let Some(key_val) = part.strip_prefix("AccountKey=") {
                    let key_bytes = BASE64_STANDARD.decode(key_val).map_err(|e| {
                        ConnectorError::InvalidConfiguration {
                            message: format!("Invalid AccountKey in connection string: {}", e),
                        }
                    })?;
                    return Ok(AzureAuth::SharedKey { key_bytes });
                }
            }
            return Err(ConnectorError::InvalidConfiguration {
                message: "connection_string has no AccountKey= segment".to_string(),
            });
        }

        if !config.sas_token.is_empty() {
            let token = config
                .sas_token
                .strip_prefix('?')
                .unwrap_or(&config.sas_token)
                .to_string();
            return Ok(AzureAuth::SasToken { token });
        }

        if !config.tenant_id.is_empty()
            && !config.client_id.is_empty()
            && !config.client_secret.is_empty()
        {
            return Ok(AzureAuth::ClientCredentials {
                tenant_id: config.tenant_id.clone(),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
            });
        }

        Err(ConnectorError::InvalidConfiguration {
            message: "No Azure credentials configured. Set account_key, \
                      connection_string, sas_token, or tenant_id/client_id/client_secret."
                .to_string(),
        })
    }

    /// Build the full URL for a resource path (`container` or
    /// `container/blob`), including any operation query parameters.
    fn resource_url(&self, resource: &str, query_params: &[(String, String)]) -> String {
        let encoded = percent_encoding::utf8_percent_encode(resource, &AZURE_BLOB_ENCODE_SET);
        let mut url = format!("{}/{}", self.base_url, encoded);
        let mut sep = '?';
        for (k, v) in query_params {
            url.push(sep);
            url.push_str(&format!("{}={}", k, v));
            sep = '&';
        }
        self.maybe_append_sas(&url)
    }

    /// Append the SAS token to a URL if using SAS auth.
    fn maybe_append_sas(&self, url: &str) -> String {
        match &self.auth {
            AzureAuth::SasToken { token } => {
                if url.contains('?') {
                    format!("{}&{}", url, token)
                } else {
                    format!("{}?{}", url, token)
                }
            }
            _ => url.to_string(),
        }
    }

    /// Get the current UTC date in RFC 1123 format for Azure headers.
    fn rfc1123_date() -> String {
        httpdate::fmt_http_date(std::time::SystemTime::now())
    }

    /// Sign a request using Azure Shared Key authentication and return
    /// the Authorization header value.
    ///
    /// String-to-sign layout (Content-Encoding through Range left
    /// empty except Content-Length and Content-Type):
    /// ```text
    /// VERB\n \n \n Content-Length\n \n Content-Type\n \n \n \n \n \n \n
    /// CanonicalizedHeaders\n CanonicalizedResource
    /// ```
    fn sign_request(
        &self,
        method: &str,
        resource: &str,
        content_length: Option<usize>,
        content_type: &str,
        date: &str,
        extra_headers: &[(String, String)],
        query_params: &[(String, String)],
    ) -> Result<String, ConnectorError> {
        let key_bytes = match &self.auth {
            AzureAuth::SharedKey { key_bytes } => key_bytes,
            _ => {
                return Err(ConnectorError::Authentication {
                    message: "Shared Key signing requested without an account key".to_string(),
                });
            }
        };

        // Content-Length: empty for 0 or if not provided (HEAD/GET).
        let content_length_str = match content_length {
            Some(0) | None => String::new(),
            Some(len) => len.to_string(),
        };

        // Canonicalized headers: all x-ms-* headers, lowercased, sorted.
        let mut ms_headers: Vec<(String, String)> = vec![
            ("x-ms-date".to_string(), date.to_string()),
            ("x-ms-version".to_string(), AZURE_API_VERSION.to_string()),
        ];
        for (k, v) in extra_headers {
            let lk = k.to_lowercase();
            if lk.starts_with("x-ms-") && lk != "x-ms-date" && lk != "x-ms-version" {
                ms_headers.push((lk, v.clone()));
            }
        }
        ms_headers.sort_by(|a, b| a.0.cmp(&b.0));

        let canonicalized_headers: String = ms_headers
            .iter()
            .map(|(k, v)| format!("{}:{}", k, v))
            .collect::<Vec<_>>()
            .join("\n");

        // Canonicalized resource uses the un-encoded resource path plus
        // query parameters sorted by key.
        let mut canonicalized_resource = format!("/{}/{}", self.account, resource);
        if !query_params.is_empty() {
            let mut sorted_params = query_params.to_vec();
            sorted_params.sort_by(|a, b| a.0.cmp(&b.0));
            for (k, v) in &sorted_params {
                canonicalized_resource.push_str(&format!("\n{}:{}", k.to_lowercase(), v));
            }
        }

        let string_to_sign = format!(
            "{}\n\n\n{}\n\n{}\n\n\n\n\n\n\n{}\n{}",
            method, content_length_str, content_type, canonicalized_headers, canonicalized_resource
        );

        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(key_bytes).map_err(|e| {
            ConnectorError::Authentication {
                message: format!("HMAC key error: {}", e),
            }
        })?;
        mac.update(string_to_sign.as_bytes());
        let signature = BASE64_STANDARD.encode(mac.finalize().into_bytes());

        Ok(format!("SharedKey {}:{}", self.account, signature))
    }

    /// Get an Azure AD access token for the storage scope, refreshing
    /// through the client-credentials flow when the cached one expired.
    ///
    /// Every failure here is an authentication failure by definition.
    async fn get_access_token(&self) -> Result<String, ConnectorError> {
        let (tenant_id, client_id, client_secret) = match &self.auth {
            AzureAuth::ClientCredentials {
                tenant_id,
                client_id,
                client_secret,
            } => (tenant_id, client_id, client_secret),
            _ => {
                return Err(ConnectorError::Authentication {
                    message: "OAuth token requested without client credentials".to_string(),
                });
            }
        };

        {
            let cache = self.token_cache.lock().expect("token cache mutex poisoned");
            if let Some(ref cached) = *cache {
                if cached.expiry > std::time::Instant::now() {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let token_url = format!(
            "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
            tenant_id
        );
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("scope", STORAGE_SCOPE),
        ];

        let resp = self
            .client
            .post(&token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| ConnectorError::Authentication {
                message: format!("Token request failed: {}", e),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ConnectorError::Authentication {
                message: format!("Token endpoint returned HTTP {}: {}", status, body),
            });
        }

        let doc: serde_json::Value =
            resp.json()
                .await
                .map_err(|e| ConnectorError::Authentication {
                    message: format!("Invalid token response: {}", e),
                })?;

        let token = doc
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ConnectorError::Authentication {
                message: "Token response has no access_token".to_string(),
            })?
            .to_string();
        let expires_in = doc.get("expires_in").and_then(|v| v.as_u64()).unwrap_or(0);

        // Cache with a 60s safety margin.
        let expiry = std::time::Instant::now()
            + std::time::Duration::from_secs(expires_in.saturating_sub(60));
        {
            let mut cache = self.token_cache.lock().expect("token cache mutex poisoned");
            *cache = Some(CachedToken {
                access_token: token.clone(),
                expiry,
            });
        }

        Ok(token)
    }

    /// Attach the Authorization header appropriate to the configured
    /// auth method.  SAS auth carries its credential in the URL.
    async fn authorize(
        &self,
        req: reqwest::RequestBuilder,
        method: &str,
        resource: &str,
        content_length: Option<usize>,
        content_type: &str,
        date: &str,
        extra_headers: &[(String, String)],
        query_params: &[(String, String)],
    ) -> Result<reqwest::RequestBuilder, ConnectorError> {
        match &self.auth {
            AzureAuth::SharedKey { .. } => {
                let header = self.sign_request(
                    method,
                    resource,
                    content_length,
                    content_type,
                    date,
                    extra_headers,
                    query_params,
                )?;
                Ok(req.header("Authorization", header))
            }
            AzureAuth::SasToken { .. } => Ok(req),
            AzureAuth::ClientCredentials { .. } => {
                let token = self.get_access_token().await?;
                Ok(req.header("Authorization", format!("Bearer {}", token)))
            }
        }
    }

    /// HEAD a resource, mapping 2xx to `true`, 404 to `false`, and any
    /// other status to a storage error.
    async fn azure_head(
        &self,
        resource: &str,
        query_params: &[(String, String)],
        context: &str,
    ) -> Result<bool, ConnectorError> {
        let url = self.resource_url(resource, query_params);
        let date = Self::rfc1123_date();
        let request_id = generate_request_id();

        let extra_headers = vec![("x-ms-client-request-id".to_string(), request_id.clone())];

        let req = self
            .client
            .head(&url)
            .header("x-ms-date", &date)
            .header("x-ms-version", AZURE_API_VERSION)
            .header("x-ms-client-request-id", &request_id);

        let req = self
            .authorize(req, "HEAD", resource, None, "", &date, &extra_headers, query_params)
            .await?;

        let resp = req.send().await.map_err(|e| ConnectorError::Connection {
            message: format!("Azure {} request failed: {}", context, e),
        })?;

        let status = resp.status();
        if status.is_success() {
            Ok(true)
        } else if status == StatusCode::NOT_FOUND {
            Ok(false)
        } else {
            Err(ConnectorError::BlobStorage {
                status: status.as_u16(),
                message: format!("{} check failed", context),
            })
        }
    }

    /// PUT the metadata replacement for a blob.
    async fn azure_set_metadata(
        &self,
        resource: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<(), ConnectorError> {
        let query_params = vec![("comp".to_string(), "metadata".to_string())];
        let url = self.resource_url(resource, &query_params);
        let date = Self::rfc1123_date();
        let request_id = generate_request_id();

        // Metadata keys sorted so the canonicalized headers are stable.
        let mut meta_headers: Vec<(String, String)> = metadata
            .iter()
            .map(|(k, v)| (format!("x-ms-meta-{}", k), v.clone()))
            .collect();
        meta_headers.sort_by(|a, b| a.0.cmp(&b.0));

        let mut extra_headers = meta_headers.clone();
        extra_headers.push(("x-ms-client-request-id".to_string(), request_id.clone()));

        let mut req = self
            .client
            .put(&url)
            .header("x-ms-date", &date)
            .header("x-ms-version", AZURE_API_VERSION)
            .header("x-ms-client-request-id", &request_id)
            .header("Content-Length", "0");
        for (k, v) in &meta_headers {
            req = req.header(k.as_str(), v.as_str());
        }

        let req = self
            .authorize(req, "PUT", resource, Some(0), "", &date, &extra_headers, &query_params)
            .await?;

        let resp = req.send().await.map_err(|e| ConnectorError::Connection {
            message: format!("Azure set_metadata request failed: {}", e),
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ConnectorError::BlobStorage {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(())
    }
}

/// Percent-encoding set for Azure resource paths: encode everything
/// except unreserved characters and '/'.
const AZURE_BLOB_ENCODE_SET: percent_encoding::AsciiSet = percent_encoding::NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

impl BlobServiceClient for AzureBlobClient {
    fn container_exists(
        &self,
        container: &str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, ConnectorError>> + Send + '_>> {
        let container = container.to_string();
        Box::pin(async move {
            debug!("Azure container_exists: container={}", container);
            let query = vec![("restype".to_string(), "container".to_string())];
            self.azure_head(&container, &query, "container existence").await
        })
    }

    fn blob_exists(
        &self,
        container: &str,
        blob: &str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, ConnectorError>> + Send + '_>> {
        let resource = format!("{}/{}", container, blob);
        Box::pin(async move {
            debug!("Azure blob_exists: resource={}", resource);
            self.azure_head(&resource, &[], "blob existence").await
        })
    }

    fn set_blob_metadata(
        &self,
        container: &str,
        blob: &str,
        metadata: &HashMap<String, String>,
    ) -> Pin<Box<dyn Future<Output = Result<(), ConnectorError>> + Send + '_>> {
        let resource = format!("{}/{}", container, blob);
        let metadata = metadata.clone();
        Box::pin(async move {
            debug!(
                "Azure set_blob_metadata: resource={} entries={}",
                resource,
                metadata.len()
            );
            self.azure_set_metadata(&resource, &metadata).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared_key_config() -> AzureConnectionConfig {
        AzureConnectionConfig {
            account: "acct".to_string(),
            account_key: BASE64_STANDARD.encode(b"supersecretkey"),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_requires_account() {
        let config = AzureConnectionConfig::default();
        let err = AzureBlobClient::new(&config).unwrap_err();
        assert_eq!(err.code(), "INVALID_CONFIGURATION");
    }

    #[test]
    fn test_new_requires_credentials() {
        let config = AzureConnectionConfig {
            account: "acct".to_string(),
            ..Default::default()
        };
        let err = AzureBlobClient::new(&config).unwrap_err();
        assert_eq!(err.code(), "INVALID_CONFIGURATION");
    }

    #[test]
    fn test_invalid_account_key_is_configuration_error() {
        let config = AzureConnectionConfig {
            account: "acct".to_string(),
            account_key: "not base64!!".to_string(),
            ..Default::default()
        };
        let err = AzureBlobClient::new(&config).unwrap_err();
        assert_eq!(err.code(), "INVALID_CONFIGURATION");
    }

    #[test]
    fn test_connection_string_key_extraction() {
        let config = AzureConnectionConfig {
            account: "acct".to_string(),
            connection_string: format!(
                "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey={};EndpointSuffix=core.windows.net",
                BASE64_STANDARD.encode(b"k")
            ),
            ..Default::default()
        };
        let client = AzureBlobClient::new(&config).unwrap();
        assert!(matches!(client.auth, AzureAuth::SharedKey { .. }));
    }

    #[test]
    fn test_sas_token_leading_question_mark_stripped() {
        let config = AzureConnectionConfig {
            account: "acct".to_string(),
            sas_token: "?sv=2023&sig=abc".to_string(),
            ..Default::default()
        };
        let client = AzureBlobClient::new(&config).unwrap();
        match &client.auth {
            AzureAuth::SasToken { token } => assert_eq!(token, "sv=2023&sig=abc"),
            _ => panic!("expected SAS auth"),
        }
        let url = client.resource_url("c1/b1", &[]);
        assert!(url.ends_with("?sv=2023&sig=abc"));
    }

    #[test]
    fn test_endpoint_override() {
        let config = AzureConnectionConfig {
            endpoint: "http://127.0.0.1:10000/acct/".to_string(),
            ..shared_key_config()
        };
        let client = AzureBlobClient::new(&config).unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:10000/acct");
    }

    #[test]
    fn test_resource_url_encoding_and_query() {
        let client = AzureBlobClient::new(&shared_key_config()).unwrap();
        let url = client.resource_url(
            "c1/some blob.txt",
            &[("comp".to_string(), "metadata".to_string())],
        );
        assert_eq!(
            url,
            "https://acct.blob.core.windows.net/c1/some%20blob.txt?comp=metadata"
        );
    }

    #[test]
    fn test_sign_request_shape() {
        let client = AzureBlobClient::new(&shared_key_config()).unwrap();
        let header = client
            .sign_request(
                "PUT",
                "c1/b1",
                Some(0),
                "",
                "Sun, 23 Aug 2026 00:00:00 GMT",
                &[("x-ms-meta-k1".to_string(), "v1".to_string())],
                &[("comp".to_string(), "metadata".to_string())],
            )
            .unwrap();
        assert!(header.starts_with("SharedKey acct:"));
        // Signature is base64 of a 32-byte HMAC.
        let sig = header.rsplit(':').next().unwrap();
        assert_eq!(BASE64_STANDARD.decode(sig).unwrap().len(), 32);
    }

    #[test]
    fn test_sign_request_rejected_for_sas_auth() {
        let config = AzureConnectionConfig {
            account: "acct".to_string(),
            sas_token: "sig=abc".to_string(),
            ..Default::default()
        };
        let client = AzureBlobClient::new(&config).unwrap();
        let err = client
            .sign_request("HEAD", "c1", None, "", "date", &[], &[])
            .unwrap_err();
        assert_eq!(err.code(), "AUTHENTICATION_ERROR");
    }
}
