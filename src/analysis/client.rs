//! Upload of finished recordings to the remote speech analysis service.
//!
//! The service takes a multipart form with one `file` field and answers with
//! a JSON score card: either a narrative with tips, or structured sections.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::recording::AudioArtifact;

/// One titled group of findings in a structured score card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisSection {
    pub title: String,
    #[serde(default)]
    pub score: Option<u8>,
    #[serde(default)]
    pub items: Vec<String>,
}

/// Display-ready outcome of an analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisResult {
    /// Overall score, 0-100
    pub score: u8,
    pub narrative: String,
    pub tips: Vec<String>,
    /// When present, replaces the narrative and tips
    pub sections: Vec<AnalysisSection>,
    /// Name under which the service stored the upload
    pub filename: Option<String>,
}

impl AnalysisResult {
    pub fn has_sections(&self) -> bool {
        !self.sections.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    score: Option<serde_json::Number>,
    #[serde(alias = "analysis")]
    narrative: Option<String>,
    tips: Option<Vec<String>>,
    #[serde(default)]
    sections: Vec<RawSection>,
    filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSection {
    title: String,
    score: Option<serde_json::Number>,
    #[serde(default)]
    items: Vec<String>,
}

/// Range-checks a 0-100 score and rounds it to a whole point.
fn whole_score(score: &serde_json::Number, what: &str) -> Result<u8> {
    let value = score
        .as_f64()
        .ok_or_else(|| PipelineError::MalformedResponse(format!("{what} is not a number")))?;
    if !(0.0..=100.0).contains(&value) {
        return Err(PipelineError::MalformedResponse(format!(
            "{what} {value} is outside 0-100"
        )));
    }
    Ok(value.round() as u8)
}

/// Validates a success body from the service.
///
/// A score card needs a score and either a narrative with tips or at least
/// one section; anything else is a malformed response.
pub fn parse_analysis(body: &str) -> Result<AnalysisResult> {
    let raw: RawAnalysis = serde_json::from_str(body)
        .map_err(|e| PipelineError::MalformedResponse(format!("invalid JSON: {e}")))?;

    let score = raw
        .score
        .as_ref()
        .ok_or_else(|| PipelineError::MalformedResponse("missing score".to_string()))
        .and_then(|n| whole_score(n, "score"))?;
    let sections = raw
        .sections
        .into_iter()
        .map(|section| -> Result<AnalysisSection> {
            let score = section
                .score
                .as_ref()
                .map(|n| whole_score(n, &format!("section '{}' score", section.title)))
                .transpose()?;
            Ok(AnalysisSection {
                title: section.title,
                score,
                items: section.items,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let narrative = raw.narrative.unwrap_or_default();
    let flat = !narrative.trim().is_empty() && raw.tips.is_some();
    if !flat && sections.is_empty() {
        return Err(PipelineError::MalformedResponse(
            "response carries neither analysis with tips nor sections".to_string(),
        ));
    }

    Ok(AnalysisResult {
        score,
        narrative,
        tips: raw.tips.unwrap_or_default(),
        sections,
        filename: raw.filename,
    })
}

/// Clears the in-flight flag when a submission finishes or is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// HTTP client for the analysis service. Clones share the in-flight guard.
#[derive(Clone)]
pub struct AnalysisClient {
    http: reqwest::Client,
    endpoint: String,
    in_flight: Arc<AtomicBool>,
}

impl AnalysisClient {
    /// # Errors
    /// - `Unreachable` if the HTTP client cannot be constructed
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Unreachable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            in_flight: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether a submission is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Uploads `artifact` and returns the parsed score card.
    ///
    /// The artifact is only read, so it can still be played back or
    /// resubmitted afterwards.
    ///
    /// # Errors
    /// - `SubmissionInFlight` if another submission has not finished
    /// - `Unreachable` on connection failures and timeouts
    /// - `Rejected` for non-2xx answers, with the body as detail
    /// - `MalformedResponse` if the body is not a valid score card
    pub async fn submit(&self, artifact: &AudioArtifact) -> Result<AnalysisResult> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("Rejected submission: another one is in flight");
            return Err(PipelineError::SubmissionInFlight);
        }
        let _guard = InFlight(&self.in_flight);

        let file_name = artifact.upload_name();
        let file_part = reqwest::multipart::Part::bytes(artifact.payload().to_vec())
            .file_name(file_name.clone())
            .mime_str(artifact.format().mime())
            .map_err(|e| PipelineError::Unreachable(format!("failed to build upload: {e}")))?;
        let form = reqwest::multipart::Form::new().part("file", file_part);

        tracing::debug!(
            "Analysis API Call:\n  URL: {}\n  Method: POST\n  File: {} ({} bytes, {})",
            self.endpoint,
            file_name,
            artifact.len(),
            artifact.format().mime()
        );

        let response = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_connect() {
                    "failed to connect to the analysis server".to_string()
                } else if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    format!("network error: {e}")
                };
                tracing::error!("Analysis upload failed: {}", e);
                PipelineError::Unreachable(message)
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::Unreachable(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            tracing::warn!("Analysis service answered {}: {}", status, body);
            return Err(PipelineError::Rejected {
                status: status.as_u16(),
                detail: body,
            });
        }

        let result = parse_analysis(&body)?;
        tracing::info!(
            "Analysis completed: score {} ({} tips, {} sections)",
            result.score,
            result.tips.len(),
            result.sections.len()
        );
        Ok(result)
    }
}
