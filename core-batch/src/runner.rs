//! Bounded-concurrency batch runner.
//!
//! Dispatches every discovered file through a semaphore-bounded worker
//! pool. Each worker runs the upload → export → delete sequence with a
//! fixed attempt budget and jittered exponential backoff; one bad file
//! never aborts the batch.

use crate::discovery::{discover_files, format_size, DiscoveredFile};
use crate::error::{BatchError, Result};
use core_auth::CredentialProvider;
use core_runtime::ConvertConfig;
use provider_google_drive::DriveConnector;
use rand::Rng;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Outcome of a single file's conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Success,
    Skipped,
    Failed,
}

impl FileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileOutcome::Success => "success",
            FileOutcome::Skipped => "skipped",
            FileOutcome::Failed => "failed",
        }
    }
}

impl fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregated result of a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub success: usize,
    pub skipped: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl BatchSummary {
    fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Success => self.success += 1,
            FileOutcome::Skipped => self.skipped += 1,
            FileOutcome::Failed => self.failed += 1,
        }
    }

    /// Whether every file either converted or was legitimately skipped.
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files in {:.2}s | success={} skipped={} failed={}",
            self.total,
            self.elapsed.as_secs_f64(),
            self.success,
            self.skipped,
            self.failed
        )
    }
}

/// Shared state every conversion worker needs.
struct ConvertContext {
    connector: DriveConnector,
    credentials: Arc<CredentialProvider>,
    config: ConvertConfig,
}

/// Batch conversion runner.
///
/// # Example
///
/// ```ignore
/// use core_batch::BatchRunner;
///
/// let runner = BatchRunner::new(connector, credentials, config);
/// let summary = runner.run().await?;
/// println!("{}", summary);
/// ```
pub struct BatchRunner {
    ctx: Arc<ConvertContext>,
}

impl BatchRunner {
    pub fn new(
        connector: DriveConnector,
        credentials: Arc<CredentialProvider>,
        config: ConvertConfig,
    ) -> Self {
        Self {
            ctx: Arc::new(ConvertContext {
                connector,
                credentials,
                config,
            }),
        }
    }

    /// Convert every eligible file in the input directory.
    ///
    /// Per-file failures are counted, not propagated; the only fatal error
    /// is being unable to list the input directory at all.
    pub async fn run(&self) -> Result<BatchSummary> {
        let started = Instant::now();

        let files = discover_files(&self.ctx.config.input_dir).await?;

        let mut summary = BatchSummary {
            total: files.len(),
            ..Default::default()
        };

        if files.is_empty() {
            warn!(
                input_dir = %self.ctx.config.input_dir.display(),
                "Input directory is empty or has no supported files"
            );
            summary.elapsed = started.elapsed();
            return Ok(summary);
        }

        info!(
            total = files.len(),
            workers = self.ctx.config.max_concurrent,
            "Starting batch"
        );

        let semaphore = Arc::new(Semaphore::new(self.ctx.config.max_concurrent));
        let total = files.len();
        let mut join_set = JoinSet::new();

        for (index, file) in files.into_iter().enumerate() {
            let ctx = Arc::clone(&self.ctx);
            let semaphore = Arc::clone(&semaphore);

            join_set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        error!("Worker pool semaphore closed unexpectedly");
                        return FileOutcome::Failed;
                    }
                };

                ctx.convert_file(index + 1, total, file).await
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(outcome) => summary.record(outcome),
                Err(e) => {
                    error!(error = %e, "Conversion worker panicked");
                    summary.failed += 1;
                }
            }
        }

        summary.elapsed = started.elapsed();

        info!(
            elapsed_s = format!("{:.2}", summary.elapsed.as_secs_f64()),
            success = summary.success,
            skipped = summary.skipped,
            failed = summary.failed,
            "Batch complete"
        );

        Ok(summary)
    }
}

impl ConvertContext {
    /// Run the full convert sequence for one file, consuming the attempt
    /// budget on transient errors.
    #[instrument(skip(self, file), fields(file = %file.file_name))]
    async fn convert_file(&self, index: usize, total: usize, file: DiscoveredFile) -> FileOutcome {
        if file.is_up_to_date(&self.config.output_dir) {
            info!("[{}/{}] Skipping (up-to-date): {}", index, total, file.file_name);
            return FileOutcome::Skipped;
        }

        let out_path = file.output_path(&self.config.output_dir);
        let resumable = file.size > self.config.resumable_threshold_bytes;

        info!(
            "[{}/{}] Converting {} ({}){} -> {}",
            index,
            total,
            file.file_name,
            format_size(file.size),
            if resumable { " [resumable]" } else { "" },
            out_path.display()
        );

        let mut attempt: u32 = 1;

        loop {
            let attempt_started = Instant::now();

            match self.try_convert(&file, &out_path, resumable).await {
                Ok(bytes) => {
                    info!(
                        "Saved PDF: {} ({}, {:.2}s)",
                        out_path.display(),
                        format_size(bytes),
                        attempt_started.elapsed().as_secs_f64()
                    );
                    return FileOutcome::Success;
                }
                Err(e) if e.is_permanent() => {
                    error!(
                        attempt = attempt,
                        error = %e,
                        "Permanent error on {}, not retrying",
                        file.file_name
                    );
                    return FileOutcome::Failed;
                }
                Err(e) if attempt >= self.config.max_attempts => {
                    error!(
                        error = %e,
                        "Failed {} after {} attempts",
                        file.file_name,
                        attempt
                    );
                    return FileOutcome::Failed;
                }
                Err(e) => {
                    let delay = backoff_delay(self.config.retry_base_delay, attempt);
                    warn!(
                        attempt = attempt,
                        max_attempts = self.config.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed on {}, retrying",
                        file.file_name
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// One attempt of the upload → export → delete sequence.
    ///
    /// The cloud copy is deleted even when the export fails, so a retried
    /// attempt never leaks temporary documents.
    async fn try_convert(
        &self,
        file: &DiscoveredFile,
        out_path: &Path,
        resumable: bool,
    ) -> std::result::Result<u64, BatchError> {
        let token = self.credentials.get_valid_token().await?;

        let file_id = self
            .connector
            .create_with_upload(
                &token,
                &file.path,
                &file.file_name,
                file.format,
                file.size,
                resumable,
            )
            .await?;

        let exported = self
            .connector
            .export_to_file(&token, &file_id, out_path)
            .await;

        // Best-effort cleanup of the cloud copy, on success and failure
        if let Err(e) = self.connector.delete_file(&token, &file_id).await {
            warn!(error = %e, "Failed to delete cloud copy {}", file_id);
        }

        Ok(exported?)
    }
}

/// Exponential backoff with uniform jitter: base * 2^(attempt-1) + 0-200ms.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponential = base * 2u32.pow(attempt.saturating_sub(1).min(16));
    let jitter = rand::thread_rng().gen_range(0..=200u64);
    exponential + Duration::from_millis(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_http::{HttpClient, HttpRequest, HttpResponse, Result as HttpResult, RetryPolicy};
    use bytes::Bytes;
    use core_auth::{ClientCredentials, OAuthTokens, TokenStore};
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

    struct Fixture {
        base: PathBuf,
        config: ConvertConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let base = std::env::temp_dir().join(format!("runner-test-{}", uuid::Uuid::new_v4()));
            let input = base.join("input");
            let output = base.join("output");
            std::fs::create_dir_all(&input).unwrap();
            std::fs::create_dir_all(&output).unwrap();

            let config = ConvertConfig::builder()
                .input_dir(&input)
                .output_dir(&output)
                .token_path(base.join("token.json"))
                .max_concurrent(1)
                .max_attempts(2)
                .retry_base_delay(Duration::from_millis(1))
                .build()
                .unwrap();

            Self { base, config }
        }

        fn add_source(&self, name: &str, content: &[u8]) {
            std::fs::write(self.config.input_dir.join(name), content).unwrap();
        }

        async fn runner(&self, mock_http: MockHttp) -> BatchRunner {
            let http: Arc<dyn HttpClient> = Arc::new(mock_http);

            // Seed a fresh token so authorization never touches the mock
            let store = TokenStore::new(&self.config.token_path);
            store
                .store_tokens(&OAuthTokens::new(
                    "test_access".to_string(),
                    Some("test_refresh".to_string()),
                    3600,
                ))
                .await
                .unwrap();

            let credentials = CredentialProvider::interactive(
                ClientCredentials::validate("id".to_string(), "secret".to_string()).unwrap(),
                store,
                Arc::clone(&http),
            );
            credentials.authorize().await.unwrap();

            BatchRunner::new(
                DriveConnector::new(http),
                Arc::new(credentials),
                self.config.clone(),
            )
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.base);
        }
    }

    fn json_response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn pdf_stream() -> Box<dyn tokio::io::AsyncRead + Send + Unpin> {
        Box::new(std::io::Cursor::new(b"%PDF-1.7 converted".to_vec()))
    }

    #[tokio::test]
    async fn test_run_converts_single_file() {
        let fixture = Fixture::new();
        fixture.add_source("report.docx", b"document bytes");

        let mut mock_http = MockHttp::new();
        let mut seq = mockall::Sequence::new();

        mock_http
            .expect_execute_with_retry()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|request, _| {
                assert!(request.url.contains("uploadType=multipart"));
                Ok(json_response(200, r#"{"id": "cloud1"}"#))
            });
        mock_http
            .expect_download_stream()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|request| {
                assert!(request.url.contains("/files/cloud1/export"));
                Ok(pdf_stream())
            });
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|request, _| {
                assert!(request.url.ends_with("/files/cloud1"));
                Ok(json_response(204, ""))
            });

        let runner = fixture.runner(mock_http).await;
        let summary = runner.run().await.unwrap();

        assert_eq!(summary.total, 1);
        assert_eq!(summary.success, 1);
        assert_eq!(summary.failed, 0);
        assert!(summary.all_succeeded());

        let pdf = fixture.config.output_dir.join("report.pdf");
        assert_eq!(std::fs::read(pdf).unwrap(), b"%PDF-1.7 converted");
    }

    #[tokio::test]
    async fn test_run_skips_up_to_date_output() {
        let fixture = Fixture::new();
        fixture.add_source("report.docx", b"document bytes");

        // Write the PDF after the source so the skip rule applies
        std::thread::sleep(Duration::from_millis(20));
        std::fs::write(fixture.config.output_dir.join("report.pdf"), b"old pdf").unwrap();

        // No expectations: any HTTP call fails the test
        let runner = fixture.runner(MockHttp::new()).await;
        let summary = runner.run().await.unwrap();

        assert_eq!(summary.total, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.success, 0);
    }

    #[tokio::test]
    async fn test_run_empty_input() {
        let fixture = Fixture::new();

        let runner = fixture.runner(MockHttp::new()).await;
        let summary = runner.run().await.unwrap();

        assert_eq!(summary.total, 0);
        assert!(summary.all_succeeded());
    }

    #[tokio::test]
    async fn test_permanent_error_fails_without_retry() {
        let fixture = Fixture::new();
        fixture.add_source("broken.docx", b"not a document");

        let mut mock_http = MockHttp::new();
        // Exactly one upload attempt: 400 must not consume the budget
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .returning(|_, _| {
                Ok(json_response(
                    400,
                    r#"{"error": {"code": 400, "message": "Invalid media"}}"#,
                ))
            });

        let runner = fixture.runner(mock_http).await;
        let summary = runner.run().await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.success, 0);
    }

    #[tokio::test]
    async fn test_transient_error_retries_then_succeeds() {
        let fixture = Fixture::new();
        fixture.add_source("report.docx", b"document bytes");

        let mut mock_http = MockHttp::new();
        let mut seq = mockall::Sequence::new();

        // First upload attempt: server error (transient)
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(json_response(503, "backend unavailable")));

        // Second attempt: upload, export, delete succeed
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(json_response(200, r#"{"id": "cloud2"}"#)));
        mock_http
            .expect_download_stream()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(pdf_stream()));
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(json_response(204, "")));

        let runner = fixture.runner(mock_http).await;
        let summary = runner.run().await.unwrap();

        assert_eq!(summary.success, 1);
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    async fn test_transient_errors_exhaust_attempt_budget() {
        let fixture = Fixture::new();
        fixture.add_source("report.docx", b"document bytes");

        let mut mock_http = MockHttp::new();
        // max_attempts is 2: both upload attempts fail with 503
        mock_http
            .expect_execute_with_retry()
            .times(2)
            .returning(|_, _| Ok(json_response(503, "backend unavailable")));

        let runner = fixture.runner(mock_http).await;
        let summary = runner.run().await.unwrap();

        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn test_export_failure_still_deletes_cloud_copy() {
        let fixture = Fixture::new();
        fixture.add_source("report.docx", b"document bytes");

        let mut mock_http = MockHttp::new();
        let mut seq = mockall::Sequence::new();

        for _ in 0..2 {
            // Upload succeeds
            mock_http
                .expect_execute_with_retry()
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _| Ok(json_response(200, r#"{"id": "cloud3"}"#)));
            // Export fails at the transport level
            mock_http
                .expect_download_stream()
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| {
                    Err(bridge_http::HttpError::ConnectionFailed(
                        "reset by peer".to_string(),
                    ))
                });
            // Cleanup still runs
            mock_http
                .expect_execute_with_retry()
                .times(1)
                .in_sequence(&mut seq)
                .returning(|request, _| {
                    assert!(request.url.ends_with("/files/cloud3"));
                    Ok(json_response(204, ""))
                });
        }

        let runner = fixture.runner(mock_http).await;
        let summary = runner.run().await.unwrap();

        // Both attempts failed, so the file fails, but cleanup ran each time
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn test_backoff_delay_grows_exponentially() {
        let base = Duration::from_secs(1);

        let first = backoff_delay(base, 1);
        let second = backoff_delay(base, 2);
        let third = backoff_delay(base, 3);

        assert!(first >= Duration::from_secs(1) && first <= Duration::from_millis(1200));
        assert!(second >= Duration::from_secs(2) && second <= Duration::from_millis(2200));
        assert!(third >= Duration::from_secs(4) && third <= Duration::from_millis(4200));
    }

    #[test]
    fn test_summary_display() {
        let summary = BatchSummary {
            total: 5,
            success: 3,
            skipped: 1,
            failed: 1,
            elapsed: Duration::from_millis(2500),
        };

        let text = summary.to_string();
        assert!(text.contains("success=3"));
        assert!(text.contains("skipped=1"));
        assert!(text.contains("failed=1"));
        assert!(!summary.all_succeeded());
    }
}
