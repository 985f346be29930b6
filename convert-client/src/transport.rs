use std::future::Future;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};

use crate::item::SourceFile;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
}

/// The two conversion endpoints as seen from the client.
pub trait ConversionTransport {
    /// Converts one file, returning the converted bytes.
    fn convert_single(
        &self,
        file: SourceFile,
    ) -> impl Future<Output = Result<Bytes, TransportError>> + Send;

    /// Converts all `files` server-side and returns the ZIP archive.
    fn convert_archive(
        &self,
        files: Vec<SourceFile>,
    ) -> impl Future<Output = Result<Bytes, TransportError>> + Send;
}

/// Talks to a conversion server over HTTP multipart.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn file_part(file: SourceFile) -> Result<Part, TransportError> {
        let part = Part::bytes(file.bytes.to_vec()).file_name(file.name);
        Ok(part.mime_str(&file.mime_type)?)
    }

    async fn post(&self, path: &str, form: Form) -> Result<Bytes, TransportError> {
        let response = self.client.post(self.url(path)).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok(response.bytes().await?)
    }
}

/// Pulls `error` out of a JSON error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

impl ConversionTransport for HttpTransport {
    async fn convert_single(&self, file: SourceFile) -> Result<Bytes, TransportError> {
        let form = Form::new().part("image", Self::file_part(file)?);
        self.post("/convert-single", form).await
    }

    async fn convert_archive(&self, files: Vec<SourceFile>) -> Result<Bytes, TransportError> {
        let mut form = Form::new();
        for file in files {
            form = form.part("images", Self::file_part(file)?);
        }
        self.post("/convert-and-zip", form).await
    }
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod transport_test;
