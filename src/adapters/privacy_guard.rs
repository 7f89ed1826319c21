use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::RwLock;
use reqwest::{multipart, Client, RequestBuilder, Response};
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::config::PrivacyConfig;
use crate::domain::DomainError;
use crate::ports::{HttpClient, MultipartForm};

/// PrivacyGuard is an internal firewall that controls all HTTP requests.
/// In local-only mode (default), all network requests are blocked.
/// When network access is enabled, only whitelisted domains are allowed.
pub struct PrivacyGuard {
    client: Client,
    local_only: AtomicBool,
    allowed_domains: RwLock<Vec<String>>,
}

impl PrivacyGuard {
    /// Create a guard from the privacy section of the configuration.
    pub fn new(config: &PrivacyConfig) -> Result<Self, DomainError> {
        Self::try_with_config(config.local_only, config.allowed_domains.clone())
    }

    fn try_with_config(local_only: bool, allowed_domains: Vec<String>) -> Result<Self, DomainError> {
        let client = Client::builder()
            .use_rustls_tls()
            .user_agent(format!("MediniVoice/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DomainError::HttpRequest(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            local_only = local_only,
            allowed_domains = ?allowed_domains,
            "PrivacyGuard initialized"
        );

        Ok(Self {
            client,
            local_only: AtomicBool::new(local_only),
            allowed_domains: RwLock::new(allowed_domains),
        })
    }

    /// Apply an updated privacy configuration at runtime.
    pub fn apply(&self, config: &PrivacyConfig) {
        self.set_local_only(config.local_only);
        self.set_allowed_domains(config.allowed_domains.clone());
    }

    /// Set local-only mode.
    pub fn set_local_only(&self, local_only: bool) {
        let previous = self.local_only.swap(local_only, Ordering::SeqCst);
        if previous != local_only {
            info!(local_only = local_only, "PrivacyGuard mode changed");
        }
    }

    /// Update allowed domains.
    pub fn set_allowed_domains(&self, domains: Vec<String>) {
        let mut guard = self.allowed_domains.write();
        *guard = domains;
        info!(allowed_domains = ?*guard, "PrivacyGuard allowed domains updated");
    }

    /// Check if a URL is allowed based on current settings.
    fn is_url_allowed(&self, url: &str) -> Result<(), DomainError> {
        if self.local_only.load(Ordering::SeqCst) {
            warn!(url = url, "Network request blocked: local-only mode enabled");
            return Err(DomainError::NetworkBlocked {
                reason: "Local-only mode is enabled. All network requests are blocked.".to_string(),
            });
        }

        let parsed = Url::parse(url).map_err(|e| DomainError::HttpRequest(e.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| DomainError::HttpRequest("Invalid URL: no host".to_string()))?;

        let allowed = self.allowed_domains.read();
        if !allowed.iter().any(|d| host == d || host.ends_with(&format!(".{}", d))) {
            warn!(url = url, host = host, "Network request blocked: domain not in whitelist");
            return Err(DomainError::NetworkBlocked {
                reason: format!("Domain '{}' is not in the allowed list", host),
            });
        }

        debug!(url = url, "Network request allowed");
        Ok(())
    }

    async fn send(&self, url: &str, request: RequestBuilder) -> Result<Response, DomainError> {
        let response = request
            .send()
            .await
            .map_err(|e| DomainError::HttpRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::HttpRequest(format!(
                "HTTP {} for {}",
                status, url
            )));
        }
        Ok(response)
    }

    fn with_headers(mut request: RequestBuilder, headers: &[(String, String)]) -> RequestBuilder {
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request
    }
}

#[async_trait]
impl HttpClient for PrivacyGuard {
    async fn post_bytes(
        &self,
        url: &str,
        body: Vec<u8>,
        content_type: &str,
        headers: &[(String, String)],
    ) -> Result<Vec<u8>, DomainError> {
        self.is_url_allowed(url)?;

        let request = Self::with_headers(
            self.client
                .post(url)
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(body),
            headers,
        );
        let response = self.send(url, request).await?;

        let mut bytes = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DomainError::HttpRequest(e.to_string()))?;
            bytes.extend_from_slice(&chunk);
        }

        debug!(url = url, size = bytes.len(), "Binary response received");
        Ok(bytes)
    }

    async fn post_multipart(
        &self,
        url: &str,
        form: MultipartForm,
        headers: &[(String, String)],
    ) -> Result<String, DomainError> {
        self.is_url_allowed(url)?;

        let mut body = multipart::Form::new();
        for (name, value) in form.fields {
            body = body.text(name, value);
        }
        if let Some(file) = form.file {
            let part = multipart::Part::bytes(file.bytes)
                .file_name(file.file_name)
                .mime_str(&file.mime)
                .map_err(|e| DomainError::HttpRequest(e.to_string()))?;
            body = body.part(file.field, part);
        }

        let request = Self::with_headers(self.client.post(url).multipart(body), headers);
        self.send(url, request)
            .await?
            .text()
            .await
            .map_err(|e| DomainError::HttpRequest(e.to_string()))
    }

    fn is_network_blocked(&self) -> bool {
        self.local_only.load(Ordering::SeqCst)
    }
}
