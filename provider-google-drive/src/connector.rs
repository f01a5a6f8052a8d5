//! Google Drive API connector implementation
//!
//! Wraps the three Drive v3 operations the conversion pipeline needs:
//! create-with-upload, export-as-PDF, and delete.

use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, instrument, warn};

use bridge_http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};

use crate::error::{DriveError, Result};
use crate::mime::SourceFormat;
use crate::types::{error_message, CreatedFile, FileMetadata};

/// Google Drive API base URL
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Google Drive upload endpoint base URL
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Export MIME type for the conversion target
pub const PDF_EXPORT_MIME: &str = "application/pdf";

/// Multipart/related boundary for simple uploads
const MULTIPART_BOUNDARY: &str = "drive2pdf_multipart_boundary";

/// Timeout for requests carrying or returning document bodies
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(600);

/// Default chunk size for resumable uploads (multiple of 256 KiB)
const DEFAULT_CHUNK_BYTES: u64 = 8 * 1024 * 1024;

/// Google Drive API connector
///
/// # Features
///
/// - Create-with-upload: multipart/related for small files, resumable
///   chunked sessions for large ones, both with an import MIME type so
///   Drive converts on ingest
/// - PDF export streamed to disk through a `.part` file
/// - Idempotent delete for cloud-copy cleanup
/// - OAuth 2.0 bearer authentication via the caller-supplied token
///
/// # Example
///
/// ```ignore
/// use provider_google_drive::{DriveConnector, SourceFormat};
///
/// let connector = DriveConnector::new(http_client);
/// let format = SourceFormat::from_extension("docx").unwrap();
/// let file_id = connector
///     .create_with_upload(&token, path, "report.docx", format, size, false)
///     .await?;
/// connector.export_to_file(&token, &file_id, &pdf_path).await?;
/// connector.delete_file(&token, &file_id).await?;
/// ```
pub struct DriveConnector {
    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,

    /// Chunk size for resumable uploads
    upload_chunk_bytes: u64,
}

impl DriveConnector {
    /// Create a new Drive connector with the default 8 MiB upload chunk.
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            upload_chunk_bytes: DEFAULT_CHUNK_BYTES,
        }
    }

    /// Create a connector with a custom resumable upload chunk size.
    ///
    /// The chunk size must be a multiple of 256 KiB per the Drive API
    /// contract; the caller's configuration validates this.
    pub fn with_chunk_size(http_client: Arc<dyn HttpClient>, upload_chunk_bytes: u64) -> Self {
        Self {
            http_client,
            upload_chunk_bytes,
        }
    }

    /// Upload a source file so Drive converts it on ingest, returning the
    /// new file's ID.
    ///
    /// `resumable` selects the chunked upload path; the caller decides
    /// based on its configured size threshold.
    #[instrument(skip(self, access_token, path), fields(file_name = %file_name, size = file_size))]
    pub async fn create_with_upload(
        &self,
        access_token: &str,
        path: &Path,
        file_name: &str,
        format: &SourceFormat,
        file_size: u64,
        resumable: bool,
    ) -> Result<String> {
        let metadata = FileMetadata {
            name: file_name.to_string(),
            mime_type: format.import_mime().to_string(),
        };

        let file_id = if resumable {
            self.upload_resumable(access_token, path, &metadata, format, file_size)
                .await?
        } else {
            self.upload_multipart(access_token, path, &metadata, format)
                .await?
        };

        info!(
            file_id = %file_id,
            resumable = resumable,
            "Uploaded {} for conversion",
            file_name
        );

        Ok(file_id)
    }

    /// Simple multipart/related upload for files at or below the
    /// resumable threshold.
    async fn upload_multipart(
        &self,
        access_token: &str,
        path: &Path,
        metadata: &FileMetadata,
        format: &SourceFormat,
    ) -> Result<String> {
        let content = tokio::fs::read(path).await?;

        let metadata_json = serde_json::to_vec(metadata)
            .map_err(|e| DriveError::ParseError(format!("Failed to encode metadata: {}", e)))?;

        let body = build_multipart_body(&metadata_json, format.source_mime, &content);

        let url = format!("{}/files?uploadType=multipart&fields=id", DRIVE_UPLOAD_BASE);

        let request = HttpRequest::new(HttpMethod::Post, url)
            .bearer_token(access_token)
            .header(
                "Content-Type",
                format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
            )
            .body(Bytes::from(body))
            .timeout(TRANSFER_TIMEOUT);

        // A transport-level retry of a create POST could duplicate the
        // file; the per-file retry loop owns retries and cleans up.
        let response = self
            .http_client
            .execute_with_retry(request, RetryPolicy::none())
            .await?;

        let response = check_success(response)?;

        let created: CreatedFile = response
            .json()
            .map_err(|e| DriveError::ParseError(format!("Failed to parse create response: {}", e)))?;

        Ok(created.id)
    }

    /// Resumable chunked upload for large files.
    ///
    /// Initiates an upload session, then sends the body in fixed-size
    /// chunks with `Content-Range` headers. Drive answers 308 until the
    /// final chunk completes the file resource.
    async fn upload_resumable(
        &self,
        access_token: &str,
        path: &Path,
        metadata: &FileMetadata,
        format: &SourceFormat,
        file_size: u64,
    ) -> Result<String> {
        let session_uri = self
            .open_upload_session(access_token, metadata, format, file_size)
            .await?;

        debug!(size = file_size, "Resumable upload session opened");

        let mut file = tokio::fs::File::open(path).await?;
        let mut offset: u64 = 0;

        while offset < file_size {
            let chunk_len = std::cmp::min(self.upload_chunk_bytes, file_size - offset) as usize;
            let mut buf = vec![0u8; chunk_len];
            file.read_exact(&mut buf).await?;

            let range_end = offset + chunk_len as u64 - 1;

            let request = HttpRequest::new(HttpMethod::Put, session_uri.clone())
                .bearer_token(access_token)
                .header(
                    "Content-Range",
                    format!("bytes {}-{}/{}", offset, range_end, file_size),
                )
                .body(Bytes::from(buf))
                .timeout(TRANSFER_TIMEOUT);

            // Chunk PUTs carry an explicit range, so transport retries
            // cannot duplicate data.
            let response = self
                .http_client
                .execute_with_retry(request, RetryPolicy::default())
                .await?;

            match response.status {
                // 308 Resume Incomplete: Drive wants the next chunk
                308 => {
                    debug!(
                        offset = range_end + 1,
                        total = file_size,
                        "Upload chunk accepted"
                    );
                    offset = range_end + 1;
                }
                status if (200..300).contains(&status) => {
                    let created: CreatedFile = response.json().map_err(|e| {
                        DriveError::ParseError(format!("Failed to parse upload response: {}", e))
                    })?;
                    return Ok(created.id);
                }
                status => {
                    return Err(DriveError::ApiError {
                        status_code: status,
                        message: error_message(&response.body),
                    });
                }
            }
        }

        Err(DriveError::UploadIncomplete {
            offset,
            total: file_size,
        })
    }

    /// Open a resumable upload session, returning the session URI.
    async fn open_upload_session(
        &self,
        access_token: &str,
        metadata: &FileMetadata,
        format: &SourceFormat,
        file_size: u64,
    ) -> Result<String> {
        let url = format!("{}/files?uploadType=resumable&fields=id", DRIVE_UPLOAD_BASE);

        let request = HttpRequest::new(HttpMethod::Post, url)
            .bearer_token(access_token)
            .header("X-Upload-Content-Type", format.source_mime)
            .header("X-Upload-Content-Length", file_size.to_string())
            .json(metadata)
            .map_err(|e| DriveError::ParseError(e.to_string()))?
            .timeout(Duration::from_secs(30));

        let response = self
            .http_client
            .execute_with_retry(request, RetryPolicy::default())
            .await?;

        let response = check_success(response)?;

        response
            .header("Location")
            .map(|uri| uri.to_string())
            .ok_or_else(|| {
                DriveError::UploadSessionFailed(
                    "Session response carried no Location header".to_string(),
                )
            })
    }

    /// Export the converted document as PDF, streaming it to `dest`.
    ///
    /// The body is written to a `.part` sibling and renamed on success,
    /// so an interrupted export never leaves a plausible-looking PDF
    /// behind. Returns the number of bytes written.
    #[instrument(skip(self, access_token), fields(file_id = %file_id, dest = %dest.display()))]
    pub async fn export_to_file(
        &self,
        access_token: &str,
        file_id: &str,
        dest: &Path,
    ) -> Result<u64> {
        let url = format!(
            "{}/files/{}/export?mimeType={}",
            DRIVE_API_BASE,
            urlencoding::encode(file_id),
            urlencoding::encode(PDF_EXPORT_MIME)
        );

        let request = HttpRequest::new(HttpMethod::Get, url)
            .bearer_token(access_token)
            .timeout(TRANSFER_TIMEOUT);

        let mut reader = self.http_client.download_stream(request).await?;

        let part_path = dest.with_extension("pdf.part");
        let mut file = tokio::fs::File::create(&part_path).await?;

        let bytes_written = match tokio::io::copy(&mut reader, &mut file).await {
            Ok(n) => n,
            Err(e) => {
                // Drop the partial file before surfacing the error
                drop(file);
                let _ = tokio::fs::remove_file(&part_path).await;
                return Err(DriveError::Io(e));
            }
        };

        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&part_path, dest).await?;

        info!(bytes = bytes_written, "Exported PDF");

        Ok(bytes_written)
    }

    /// Delete the temporary cloud copy.
    ///
    /// A missing file (already deleted) is treated as success so cleanup
    /// between retries stays idempotent.
    #[instrument(skip(self, access_token), fields(file_id = %file_id))]
    pub async fn delete_file(&self, access_token: &str, file_id: &str) -> Result<()> {
        let url = format!("{}/files/{}", DRIVE_API_BASE, urlencoding::encode(file_id));

        let request = HttpRequest::new(HttpMethod::Delete, url)
            .bearer_token(access_token)
            .timeout(Duration::from_secs(30));

        let response = self
            .http_client
            .execute_with_retry(request, RetryPolicy::default())
            .await?;

        match response.status {
            status if (200..300).contains(&status) => {
                debug!("Cloud copy deleted");
                Ok(())
            }
            404 => {
                debug!("Cloud copy already gone");
                Ok(())
            }
            status => {
                warn!(status = status, "Failed to delete cloud copy");
                Err(DriveError::ApiError {
                    status_code: status,
                    message: error_message(&response.body),
                })
            }
        }
    }
}

/// Map a non-2xx response to an API error with the parsed service message.
fn check_success(response: HttpResponse) -> Result<HttpResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(DriveError::ApiError {
            status_code: response.status,
            message: error_message(&response.body),
        })
    }
}

/// Assemble a multipart/related body: JSON metadata part followed by the
/// media part.
fn build_multipart_body(metadata_json: &[u8], source_mime: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(content.len() + metadata_json.len() + 256);

    body.extend_from_slice(format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata_json);
    body.extend_from_slice(format!("\r\n--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", source_mime).as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--", MULTIPART_BOUNDARY).as_bytes());

    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_http::Result as HttpResult;
    use mockall::mock;
    use std::collections::HashMap;
    use std::path::PathBuf;

    mock! {
        Http {}

        #[async_trait::async_trait]
        impl HttpClient for Http {
            async fn execute(&self, request: HttpRequest) -> HttpResult<HttpResponse>;
            async fn execute_with_retry(
                &self,
                request: HttpRequest,
                policy: RetryPolicy,
            ) -> HttpResult<HttpResponse>;
            async fn download_stream(
                &self,
                request: HttpRequest,
            ) -> HttpResult<Box<dyn tokio::io::AsyncRead + Send + Unpin>>;
        }
    }

    fn docx_format() -> &'static SourceFormat {
        SourceFormat::from_extension("docx").unwrap()
    }

    fn temp_dir() -> PathBuf {
        let base = std::env::temp_dir().join(format!("drive-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&base).unwrap();
        base
    }

    fn json_response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    #[test]
    fn test_build_multipart_body_layout() {
        let body = build_multipart_body(
            br#"{"name":"a.docx"}"#,
            "application/msword",
            b"FILEBYTES",
        );
        let text = String::from_utf8_lossy(&body);

        assert!(text.starts_with(&format!("--{}", MULTIPART_BOUNDARY)));
        assert!(text.contains(r#"{"name":"a.docx"}"#));
        assert!(text.contains("Content-Type: application/msword"));
        assert!(text.contains("FILEBYTES"));
        assert!(text.ends_with(&format!("--{}--", MULTIPART_BOUNDARY)));
    }

    #[tokio::test]
    async fn test_multipart_upload_success() {
        let base = temp_dir();
        let src = base.join("report.docx");
        std::fs::write(&src, b"small document").unwrap();

        let mut mock_http = MockHttp::new();
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .returning(|request, policy| {
                assert!(request.url.contains("uploadType=multipart"));
                assert!(request.url.contains("fields=id"));
                assert!(request.headers.contains_key("Authorization"));
                assert_eq!(policy.max_attempts, 1);

                let body = request.body.unwrap();
                let text = String::from_utf8_lossy(&body).into_owned();
                assert!(text.contains("small document"));
                assert!(text.contains("application/vnd.google-apps.document"));

                Ok(json_response(200, r#"{"id": "file123"}"#))
            });

        let connector = DriveConnector::new(Arc::new(mock_http));
        let file_id = connector
            .create_with_upload("tok", &src, "report.docx", docx_format(), 14, false)
            .await
            .unwrap();

        assert_eq!(file_id, "file123");

        let _ = std::fs::remove_dir_all(&base);
    }

    #[tokio::test]
    async fn test_multipart_upload_bad_request_is_permanent() {
        let base = temp_dir();
        let src = base.join("broken.docx");
        std::fs::write(&src, b"not really a document").unwrap();

        let mut mock_http = MockHttp::new();
        mock_http.expect_execute_with_retry().times(1).returning(|_, _| {
            Ok(json_response(
                400,
                r#"{"error": {"code": 400, "message": "Invalid media"}}"#,
            ))
        });

        let connector = DriveConnector::new(Arc::new(mock_http));
        let result = connector
            .create_with_upload("tok", &src, "broken.docx", docx_format(), 21, false)
            .await;

        match result {
            Err(e) => {
                assert!(e.is_permanent());
                assert!(e.to_string().contains("Invalid media"));
            }
            Ok(_) => panic!("expected upload to fail"),
        }

        let _ = std::fs::remove_dir_all(&base);
    }

    #[tokio::test]
    async fn test_resumable_upload_chunks_to_completion() {
        let base = temp_dir();
        let src = base.join("big.docx");
        let content = vec![0xABu8; 300_000];
        std::fs::write(&src, &content).unwrap();

        let chunk = 256 * 1024;

        let mut mock_http = MockHttp::new();
        let mut seq = mockall::Sequence::new();

        // Session initiation returns the upload URI
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|request, _| {
                assert!(request.url.contains("uploadType=resumable"));
                assert_eq!(
                    request.headers.get("X-Upload-Content-Length"),
                    Some(&"300000".to_string())
                );

                let mut headers = HashMap::new();
                headers.insert(
                    "Location".to_string(),
                    "https://upload.example/session".to_string(),
                );
                Ok(HttpResponse {
                    status: 200,
                    headers,
                    body: Bytes::new(),
                })
            });

        // First chunk: full 256 KiB, answered with 308
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |request, _| {
                assert_eq!(request.url, "https://upload.example/session");
                assert_eq!(
                    request.headers.get("Content-Range"),
                    Some(&format!("bytes 0-{}/300000", chunk - 1))
                );
                assert_eq!(request.body.as_ref().unwrap().len(), chunk);

                Ok(json_response(308, ""))
            });

        // Final chunk completes the file
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |request, _| {
                assert_eq!(
                    request.headers.get("Content-Range"),
                    Some(&format!("bytes {}-299999/300000", chunk))
                );
                assert_eq!(request.body.as_ref().unwrap().len(), 300_000 - chunk);

                Ok(json_response(200, r#"{"id": "big123"}"#))
            });

        let connector = DriveConnector::with_chunk_size(Arc::new(mock_http), chunk as u64);
        let file_id = connector
            .create_with_upload("tok", &src, "big.docx", docx_format(), 300_000, true)
            .await
            .unwrap();

        assert_eq!(file_id, "big123");

        let _ = std::fs::remove_dir_all(&base);
    }

    #[tokio::test]
    async fn test_resumable_upload_requires_location_header() {
        let base = temp_dir();
        let src = base.join("big.docx");
        std::fs::write(&src, vec![0u8; 1024]).unwrap();

        let mut mock_http = MockHttp::new();
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .returning(|_, _| Ok(json_response(200, "")));

        let connector = DriveConnector::new(Arc::new(mock_http));
        let result = connector
            .create_with_upload("tok", &src, "big.docx", docx_format(), 1024, true)
            .await;

        assert!(matches!(result, Err(DriveError::UploadSessionFailed(_))));

        let _ = std::fs::remove_dir_all(&base);
    }

    #[tokio::test]
    async fn test_export_streams_to_file() {
        let base = temp_dir();
        let dest = base.join("report.pdf");

        let mut mock_http = MockHttp::new();
        mock_http
            .expect_download_stream()
            .times(1)
            .returning(|request| {
                assert!(request.url.contains("/export"));
                assert!(request.url.contains("application%2Fpdf"));
                assert!(request.headers.contains_key("Authorization"));

                let reader = std::io::Cursor::new(b"%PDF-1.7 fake pdf bytes".to_vec());
                Ok(Box::new(reader) as Box<dyn tokio::io::AsyncRead + Send + Unpin>)
            });

        let connector = DriveConnector::new(Arc::new(mock_http));
        let bytes = connector
            .export_to_file("tok", "file123", &dest)
            .await
            .unwrap();

        assert_eq!(bytes, 23);
        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF-1.7 fake pdf bytes");
        // The staging file must be gone after the rename
        assert!(!base.join("report.pdf.part").exists());

        let _ = std::fs::remove_dir_all(&base);
    }

    #[tokio::test]
    async fn test_delete_file_success() {
        let mut mock_http = MockHttp::new();
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .returning(|request, _| {
                assert_eq!(request.method, HttpMethod::Delete);
                assert!(request.url.ends_with("/files/file123"));
                Ok(json_response(204, ""))
            });

        let connector = DriveConnector::new(Arc::new(mock_http));
        connector.delete_file("tok", "file123").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_file_tolerates_missing() {
        let mut mock_http = MockHttp::new();
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .returning(|_, _| {
                Ok(json_response(
                    404,
                    r#"{"error": {"code": 404, "message": "File not found"}}"#,
                ))
            });

        let connector = DriveConnector::new(Arc::new(mock_http));
        connector.delete_file("tok", "gone").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_file_surfaces_other_errors() {
        let mut mock_http = MockHttp::new();
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .returning(|_, _| {
                Ok(json_response(
                    403,
                    r#"{"error": {"code": 403, "message": "Insufficient permissions"}}"#,
                ))
            });

        let connector = DriveConnector::new(Arc::new(mock_http));
        let result = connector.delete_file("tok", "file123").await;

        match result {
            Err(DriveError::ApiError {
                status_code,
                message,
            }) => {
                assert_eq!(status_code, 403);
                assert_eq!(message, "Insufficient permissions");
            }
            other => panic!("expected ApiError, got {:?}", other),
        }
    }
}
