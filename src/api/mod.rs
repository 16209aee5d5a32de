//! Typed client for the disaster-analysis backend
//!
//! One method per endpoint. Every call is a single stateless request: no
//! caching, no retries, no idempotency keys. A duplicate submit produces a
//! duplicate remote record.

pub mod error;
pub mod types;
pub mod validate;

#[cfg(test)]
pub(crate) mod testing;

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use url::Url;

pub use error::{ApiError, ValidationError};
pub use types::*;
pub use validate::ImageUpload;

/// Default size of the recent feedback list
pub const DEFAULT_RECENT_FEEDBACK_LIMIT: usize = 50;

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

#[derive(Serialize)]
struct TextRequest<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct FeedbackRequest<'a> {
    text: &'a str,
    is_disaster: bool,
    user_id: &'a str,
}

#[derive(Serialize)]
struct RetrainRequest {
    force: bool,
}

impl ApiClient {
    /// Build a client for `base_url` (e.g. `http://localhost:8000/api`).
    ///
    /// `timeout` of `None` leaves reqwest's default in place.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut base = Url::parse(base_url.trim())
            .with_context(|| format!("Invalid API URL: {}", base_url))?;

        if !matches!(base.scheme(), "http" | "https") {
            anyhow::bail!("API URL must be http or https: {}", base_url);
        }

        // Url::join treats the last segment as a file unless the path ends in '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("disasterscope/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::Network {
                message: format!("bad endpoint {}: {}", path, e),
                timed_out: false,
            })
    }

    /// Resolve a served image path (as found in `image_url`) against the
    /// backend origin. Absolute URLs are returned unchanged.
    pub fn asset_url(&self, image_url: &str) -> String {
        let image_url = image_url.trim();
        if image_url.starts_with("http://") || image_url.starts_with("https://") {
            return image_url.to_string();
        }

        let rooted = format!("/{}", image_url.trim_start_matches('/'));
        match self.base.join(&rooted) {
            Ok(url) => url.to_string(),
            Err(_) => rooted,
        }
    }

    pub async fn check_health(&self) -> Result<HealthStatus, ApiError> {
        let url = self.endpoint("health")?;
        self.send("check health", self.http.get(url)).await
    }

    /// Submit a report for analysis. Rejected locally if shorter than
    /// ten characters after trimming.
    pub async fn analyze_text(&self, text: &str) -> Result<AnalysisResult, ApiError> {
        validate::validate_text(text)?;
        let url = self.endpoint("text/analyze")?;
        self.send("analyze text", self.http.post(url).json(&TextRequest { text }))
            .await
    }

    pub async fn analyze_image(&self, upload: ImageUpload) -> Result<AnalysisResult, ApiError> {
        let url = self.endpoint("image/analyze")?;
        let (file_name, mime, bytes) = upload.into_parts();

        tracing::debug!("Uploading {} ({} bytes, {})", file_name, bytes.len(), mime);

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(&mime)
            .map_err(|_| ValidationError::UnsupportedImageType { mime: mime.clone() })?;
        let form = Form::new().part("file", part);

        self.send("analyze image", self.http.post(url).multipart(form))
            .await
    }

    pub async fn get_text_history(&self, limit: usize) -> Result<HistoryPage, ApiError> {
        self.history("text/history", limit).await
    }

    pub async fn get_image_history(&self, limit: usize) -> Result<HistoryPage, ApiError> {
        self.history("image/history", limit).await
    }

    async fn history(&self, path: &str, limit: usize) -> Result<HistoryPage, ApiError> {
        let url = self.endpoint(path)?;
        let mut page: HistoryPage = self
            .send("load history", self.http.get(url).query(&[("limit", limit)]))
            .await?;

        if page.analyses.len() > limit {
            tracing::warn!(
                "{} returned {} rows for limit {}, truncating",
                path,
                page.analyses.len(),
                limit
            );
            page.analyses.truncate(limit);
        }
        Ok(page)
    }

    /// Send a correction to the learning loop. `is_disaster` is the true
    /// label, not what the model predicted.
    pub async fn submit_feedback(
        &self,
        text: &str,
        is_disaster: bool,
        user_id: &str,
    ) -> Result<FeedbackReceipt, ApiError> {
        let text = validate::validate_non_empty(text)?;
        let url = self.endpoint("learning/feedback")?;
        let body = FeedbackRequest {
            text,
            is_disaster,
            user_id,
        };
        self.send("submit feedback", self.http.post(url).json(&body))
            .await
    }

    pub async fn get_learning_stats(&self) -> Result<LearningStats, ApiError> {
        let url = self.endpoint("learning/stats")?;
        self.send("load learning stats", self.http.get(url)).await
    }

    pub async fn get_recent_feedback(&self, limit: usize) -> Result<Vec<FeedbackEntry>, ApiError> {
        let url = self.endpoint("learning/feedback/recent")?;
        let body: RecentFeedbackBody = self
            .send("load recent feedback", self.http.get(url).query(&[("limit", limit)]))
            .await?;
        Ok(body.into_entries())
    }

    pub async fn trigger_retraining(&self, force: bool) -> Result<RetrainStatus, ApiError> {
        let url = self.endpoint("learning/retrain")?;
        self.send("start retraining", self.http.post(url).json(&RetrainRequest { force }))
            .await
    }

    /// Detect a disaster and geocode the places mentioned in `text`
    pub async fn detect_with_location(&self, text: &str) -> Result<LocationResult, ApiError> {
        let text = validate::validate_non_empty(text)?;
        let url = self.endpoint("location/detect-with-location")?;
        let form = Form::new().text("text", text.to_string());
        self.send("locate disaster", self.http.post(url).multipart(form))
            .await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        action: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        tracing::debug!("{}: sending", action);
        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                let err = ApiError::from(e);
                tracing::warn!("{} failed: {}", action, err);
                return Err(err);
            }
        };

        let status = response.status();
        tracing::debug!("{}: {} {}", action, status.as_u16(), response.url());

        let body = response.text().await.map_err(ApiError::from)?;

        if !status.is_success() {
            let err = ApiError::from_status(status.as_u16(), &body);
            tracing::warn!("{} failed: {}", action, err);
            return Err(err);
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::warn!("{}: could not decode response: {}", action, e);
            ApiError::Decode {
                message: e.to_string(),
            }
        })
    }
}
