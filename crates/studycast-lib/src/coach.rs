//! Client for the career-coaching generation backend.
//!
//! Each call uploads the résumé and/or job description and gets back one
//! generated artifact. Bodies are validated with
//! [`studycast_core::artifacts::parse`] before they leave this module.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use tracing::{debug, info, warn};

use studycast_core::artifacts::{
    self, AnalysisResult, ArtifactError, ArtifactPayload, ChatReply, InterviewSimulation,
    JobTranslation, MarketTrends, RedFlagsAnalysis, SalaryNegotiation, SeniorFeedback,
};
use studycast_core::config::BackendConfig;

#[derive(Debug, thiserror::Error)]
pub enum CoachError {
    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: &'static str,
        source: reqwest::Error,
    },
    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error("failed to read {path}: {source}")]
    Attachment {
        path: String,
        source: std::io::Error,
    },
}

/// A document uploaded to the backend.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a file, guessing its MIME type from the extension.
    pub fn from_path(path: &Path) -> Result<Self, CoachError> {
        let bytes = std::fs::read(path).map_err(|source| CoachError::Attachment {
            path: path.display().to_string(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".into());
        Ok(Self::new(file_name, mime_for(path), bytes))
    }

    fn part(&self) -> Part {
        let part = Part::bytes(self.bytes.clone()).file_name(self.file_name.clone());
        match part.mime_str(&self.mime_type) {
            Ok(part) => part,
            Err(_) => Part::bytes(self.bytes.clone()).file_name(self.file_name.clone()),
        }
    }
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "txt" | "md" => "text/plain",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

#[derive(Clone)]
pub struct CoachClient {
    http: reqwest::Client,
    base_url: String,
}

impl CoachClient {
    pub fn new(config: &BackendConfig) -> Self {
        let http = match reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
        {
            Ok(http) => http,
            Err(e) => {
                warn!("coach: client setup failed, requests will have no timeout: {e}");
                reqwest::Client::new()
            }
        };
        Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
        }
    }

    /// Fit analysis plus the multi-week study path.
    pub async fn analysis(
        &self,
        resume: &Attachment,
        job: &Attachment,
    ) -> Result<AnalysisResult, CoachError> {
        let form = Form::new()
            .part("resume", resume.part())
            .part("job", job.part());
        self.post_form("/api/analysis", form).await
    }

    /// `profile` is forwarded as-is under `userProfile`.
    pub async fn market_trends(
        &self,
        profile: &serde_json::Value,
    ) -> Result<MarketTrends, CoachError> {
        const ENDPOINT: &str = "/api/market-trends";
        let body = serde_json::json!({ "userProfile": profile });
        let req = self.http.post(self.url(ENDPOINT)).json(&body);
        self.send(ENDPOINT, req).await
    }

    pub async fn salary_negotiation(
        &self,
        resume: &Attachment,
        job: &Attachment,
    ) -> Result<SalaryNegotiation, CoachError> {
        let form = Form::new()
            .part("resume", resume.part())
            .part("job", job.part());
        self.post_form("/api/salary-negotiation", form).await
    }

    pub async fn interview_simulation(
        &self,
        resume: &Attachment,
        job: &Attachment,
    ) -> Result<InterviewSimulation, CoachError> {
        let form = Form::new()
            .part("resume", resume.part())
            .part("job", job.part());
        self.post_form("/api/interview-simulator", form).await
    }

    pub async fn senior_feedback(&self, resume: &Attachment) -> Result<SeniorFeedback, CoachError> {
        let form = Form::new().part("resume", resume.part());
        self.post_form("/api/senior-feedback", form).await
    }

    pub async fn job_translation(&self, job: &Attachment) -> Result<JobTranslation, CoachError> {
        let form = Form::new().part("job", job.part());
        self.post_form("/api/job-translation", form).await
    }

    /// Warning signs in a job description.
    pub async fn red_flags(&self, job: &Attachment) -> Result<RedFlagsAnalysis, CoachError> {
        let form = Form::new().part("job", job.part());
        self.post_form("/api/red-flags", form).await
    }

    /// Ask the tutor a question about an analysis and its study path.
    pub async fn chat(
        &self,
        context: &AnalysisResult,
        message: &str,
    ) -> Result<ChatReply, CoachError> {
        const ENDPOINT: &str = "/api/chat";
        let body = serde_json::json!({ "context": context, "message": message });
        let req = self.http.post(self.url(ENDPOINT)).json(&body);
        self.send(ENDPOINT, req).await
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.base_url)
    }

    async fn post_form<T: ArtifactPayload>(
        &self,
        endpoint: &'static str,
        form: Form,
    ) -> Result<T, CoachError> {
        let req = self.http.post(self.url(endpoint)).multipart(form);
        self.send(endpoint, req).await
    }

    async fn send<T: ArtifactPayload>(
        &self,
        endpoint: &'static str,
        req: reqwest::RequestBuilder,
    ) -> Result<T, CoachError> {
        let t0 = std::time::Instant::now();
        info!("coach: POST {endpoint}");

        let resp = req
            .send()
            .await
            .map_err(|source| CoachError::Http { endpoint, source })?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|source| CoachError::Http { endpoint, source })?;

        if !status.is_success() {
            return Err(CoachError::Status {
                endpoint,
                status,
                body,
            });
        }

        debug!("coach: {endpoint} answered {} bytes in {:?}", body.len(), t0.elapsed());
        Ok(artifacts::parse::<T>(&body)?)
    }
}
