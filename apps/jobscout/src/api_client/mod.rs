/// One-shot backend client — blocking search, job detail fetch, resume matching.
///
/// The streaming search lives in `crate::stream`; everything here is a single
/// request/response with no retry.
use std::time::Duration;

use reqwest::{multipart, Client, Response};
use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{JobListing, JobSearchResponse, ResumeMatchResult, SearchRequest};

const SEARCH_PATH: &str = "/api/jobs/search";
const JOB_PATH: &str = "/api/jobs";
const MATCH_PATH: &str = "/api/analysis/match";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct BackendError {
    detail: serde_json::Value,
}

/// Extracts a readable message from an error body.
/// The backend answers `{"detail": "..."}`; validation failures carry a list instead.
pub(crate) fn backend_error_message(body: &str) -> String {
    match serde_json::from_str::<BackendError>(body) {
        Ok(BackendError {
            detail: serde_json::Value::String(message),
        }) => message,
        Ok(BackendError { detail }) => detail.to_string(),
        Err(_) if body.trim().is_empty() => "no response body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

/// Match result as it comes off the wire; the percentage may be fractional or out of range.
#[derive(Debug, Deserialize)]
struct RawMatchResult {
    match_percentage: f64,
    #[serde(default)]
    matching_skills: Vec<String>,
    #[serde(default)]
    missing_skills: Vec<String>,
    #[serde(default)]
    recommendations: Vec<String>,
}

impl From<RawMatchResult> for ResumeMatchResult {
    fn from(raw: RawMatchResult) -> Self {
        let clamped = if raw.match_percentage.is_finite() {
            raw.match_percentage.round().clamp(0.0, 100.0)
        } else {
            0.0
        };
        if clamped != raw.match_percentage.round() {
            warn!(
                reported = raw.match_percentage,
                clamped, "match percentage outside 0-100"
            );
        }
        ResumeMatchResult {
            match_percentage: clamped as u32,
            matching_skills: raw.matching_skills,
            missing_skills: raw.missing_skills,
            recommendations: raw.recommendations,
        }
    }
}

/// Client for the non-streaming backend endpoints.
#[derive(Clone)]
pub struct JobBoardClient {
    client: Client,
    base_url: String,
}

impl JobBoardClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Runs a search and waits for every source before returning.
    pub async fn search(&self, request: &SearchRequest) -> Result<JobSearchResponse, ApiError> {
        request
            .validate()
            .map_err(|e| ApiError::InvalidInput(e.to_string()))?;

        let response = self
            .client
            .post(self.url(SEARCH_PATH))
            .json(request)
            .send()
            .await?;
        let result: JobSearchResponse = read_json(response).await?;
        debug!(total = result.total, "blocking search returned");
        Ok(result)
    }

    /// Fetches one listing with its description filled in where the backend can.
    pub async fn get_job(&self, job_id: &str) -> Result<JobListing, ApiError> {
        if job_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("job id cannot be empty".to_string()));
        }

        let response = self
            .client
            .get(self.url(&format!("{JOB_PATH}/{}", job_id.trim())))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(format!("job {job_id}")));
        }
        read_json(response).await
    }

    /// Uploads a resume and scores it against `job_id`.
    pub async fn match_resume(
        &self,
        job_id: &str,
        file_name: &str,
        document: Vec<u8>,
    ) -> Result<ResumeMatchResult, ApiError> {
        if job_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("job id cannot be empty".to_string()));
        }
        if document.is_empty() {
            return Err(ApiError::InvalidInput("resume document is empty".to_string()));
        }

        let size = document.len();
        let part = multipart::Part::bytes(document)
            .file_name(file_name.to_string())
            .mime_str(mime_for(file_name))?;
        let form = multipart::Form::new()
            .text("job_id", job_id.trim().to_string())
            .part("resume", part);

        debug!(job_id, file_name, size, "uploading resume for matching");
        let response = self
            .client
            .post(self.url(MATCH_PATH))
            .multipart(form)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(format!("job {job_id}")));
        }
        let raw: RawMatchResult = read_json(response).await?;
        Ok(raw.into())
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ApiError::Api {
            status: status.as_u16(),
            message: backend_error_message(&body),
        });
    }
    serde_json::from_str(&body).map_err(ApiError::Parse)
}

fn mime_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "doc" => "application/msword",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::aggregator::listing;
    use axum::{
        extract::{Multipart, Path},
        http::StatusCode,
        response::IntoResponse,
        routing::{get, post},
        Json, Router,
    };

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(base: String) -> JobBoardClient {
        JobBoardClient::new(base, Duration::from_secs(5))
    }

    async fn get_job_handler(Path(id): Path<String>) -> axum::response::Response {
        if id == "known" {
            let mut job = listing("linkedin", "known");
            job.description = Some("Build streaming systems in Rust.".to_string());
            Json(job).into_response()
        } else {
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"detail": "Job not found"})),
            )
                .into_response()
        }
    }

    async fn match_handler(mut multipart: Multipart) -> axum::response::Response {
        let mut job_id = None;
        let mut file_name = None;
        let mut size = 0;
        while let Some(field) = multipart.next_field().await.unwrap() {
            match field.name() {
                Some("job_id") => job_id = Some(field.text().await.unwrap()),
                Some("resume") => {
                    file_name = field.file_name().map(str::to_string);
                    size = field.bytes().await.unwrap().len();
                }
                _ => {}
            }
        }
        match job_id.as_deref() {
            Some("known") => Json(serde_json::json!({
                "match_percentage": if size > 0 { 130.4 } else { 0.0 },
                "matching_skills": ["rust", file_name.unwrap_or_default()],
                "missing_skills": ["kafka"],
                "recommendations": ["mention tokio"]
            }))
            .into_response(),
            _ => (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"detail": "Job not found"})),
            )
                .into_response(),
        }
    }

    #[test]
    fn test_backend_error_message_string_detail() {
        assert_eq!(
            backend_error_message(r#"{"detail": "Job not found"}"#),
            "Job not found"
        );
    }

    #[test]
    fn test_backend_error_message_structured_detail() {
        let message = backend_error_message(r#"{"detail": [{"loc": ["body", "query"]}]}"#);
        assert!(message.contains("query"));
    }

    #[test]
    fn test_backend_error_message_plain_body() {
        assert_eq!(backend_error_message("Bad Gateway\n"), "Bad Gateway");
        assert_eq!(backend_error_message(""), "no response body");
    }

    #[test]
    fn test_mime_for_known_extensions() {
        assert_eq!(mime_for("cv.PDF"), "application/pdf");
        assert_eq!(mime_for("resume.txt"), "text/plain");
        assert_eq!(mime_for("resume"), "application/octet-stream");
    }

    #[test]
    fn test_match_percentage_is_clamped() {
        let raw: RawMatchResult =
            serde_json::from_str(r#"{"match_percentage": -3}"#).unwrap();
        assert_eq!(ResumeMatchResult::from(raw).match_percentage, 0);
        let raw: RawMatchResult =
            serde_json::from_str(r#"{"match_percentage": 71.6}"#).unwrap();
        assert_eq!(ResumeMatchResult::from(raw).match_percentage, 72);
    }

    #[tokio::test]
    async fn test_get_job_returns_listing() {
        let base = serve(Router::new().route("/api/jobs/:id", get(get_job_handler))).await;
        let job = client(base).get_job("known").await.unwrap();
        assert_eq!(job.id, "known");
        assert!(job.has_description());
    }

    #[tokio::test]
    async fn test_get_job_maps_404() {
        let base = serve(Router::new().route("/api/jobs/:id", get(get_job_handler))).await;
        let err = client(base).get_job("missing").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_get_job_rejects_blank_id() {
        let err = client("http://127.0.0.1:9".to_string())
            .get_job("  ")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_search_returns_all_jobs() {
        async fn search_handler(Json(body): Json<serde_json::Value>) -> impl IntoResponse {
            assert_eq!(body["platforms"], serde_json::json!(["linkedin"]));
            Json(serde_json::json!({
                "jobs": [listing("linkedin", "1"), listing("linkedin", "2")],
                "total": 2
            }))
        }
        let base = serve(Router::new().route(SEARCH_PATH, post(search_handler))).await;
        let request =
            SearchRequest::new("rust").with_sources([crate::models::Source::LinkedIn]);
        let response = client(base).search(&request).await.unwrap();
        assert_eq!(response.total, 2);
        assert_eq!(response.jobs[1].id, "2");
    }

    #[tokio::test]
    async fn test_search_surfaces_api_error() {
        async fn failing() -> impl IntoResponse {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"detail": "browser crashed"})),
            )
        }
        let base = serve(Router::new().route(SEARCH_PATH, post(failing))).await;
        let err = client(base)
            .search(&SearchRequest::new("rust"))
            .await
            .unwrap_err();
        match err {
            ApiError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "browser crashed");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_match_resume_uploads_multipart() {
        let base = serve(Router::new().route(MATCH_PATH, post(match_handler))).await;
        let result = client(base)
            .match_resume("known", "cv.pdf", b"%PDF-1.4 resume".to_vec())
            .await
            .unwrap();
        assert_eq!(result.match_percentage, 100);
        assert_eq!(result.matching_skills, vec!["rust", "cv.pdf"]);
        assert_eq!(result.missing_skills, vec!["kafka"]);
    }

    #[tokio::test]
    async fn test_match_resume_unknown_job() {
        let base = serve(Router::new().route(MATCH_PATH, post(match_handler))).await;
        let err = client(base)
            .match_resume("nope", "cv.pdf", b"resume".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_match_resume_rejects_empty_document() {
        let err = client("http://127.0.0.1:9".to_string())
            .match_resume("known", "cv.pdf", Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }
}
