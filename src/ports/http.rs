use async_trait::async_trait;

use crate::domain::DomainError;

/// A file attached to a multipart upload.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// A `multipart/form-data` request body.
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    pub fields: Vec<(String, String)>,
    pub file: Option<FilePart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn file(mut self, part: FilePart) -> Self {
        self.file = Some(part);
        self
    }

    /// Value of a text field, if present.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// HTTP client port for all network requests.
/// All network traffic must go through this interface.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// POST a raw body and return the raw response body.
    async fn post_bytes(
        &self,
        url: &str,
        body: Vec<u8>,
        content_type: &str,
        headers: &[(String, String)],
    ) -> Result<Vec<u8>, DomainError>;

    /// POST a multipart form and return the response text.
    async fn post_multipart(
        &self,
        url: &str,
        form: MultipartForm,
        headers: &[(String, String)],
    ) -> Result<String, DomainError>;

    /// Check if network requests are currently blocked.
    fn is_network_blocked(&self) -> bool;
}
