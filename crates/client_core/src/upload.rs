//! Document upload. A single request/response with no retry and no
//! cancellation; it never touches the conversation state.

use std::path::Path;

use reqwest::multipart::{Form, Part};
use shared::protocol::UploadResponse;
use tracing::info;

use crate::{
    error::{TransportError, UploadError},
    transport::{read_json, HttpBackend},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Text,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "docx" => Some(DocumentKind::Docx),
            "txt" => Some(DocumentKind::Text),
            _ => None,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "application/pdf",
            DocumentKind::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            DocumentKind::Text => "text/plain",
        }
    }
}

impl HttpBackend {
    pub async fn upload(&self, path: &Path) -> Result<UploadResponse, UploadError> {
        let kind = DocumentKind::from_path(path).ok_or_else(|| UploadError::UnsupportedFileType {
            path: path.to_path_buf(),
        })?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| UploadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let endpoint = self.endpoint("upload");
        let size_bytes = bytes.len();
        let part = Part::bytes(bytes)
            .file_name(filename)
            .mime_str(kind.mime_type())
            .map_err(|source| TransportError::Http {
                endpoint: endpoint.clone(),
                source,
            })?;
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(&endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|source| TransportError::Http {
                endpoint: endpoint.clone(),
                source,
            })?;
        let uploaded: UploadResponse = read_json(&endpoint, response).await?;
        info!(file = %uploaded.file, size_bytes, "upload: document accepted");
        Ok(uploaded)
    }
}

#[cfg(test)]
#[path = "tests/upload_tests.rs"]
mod tests;
