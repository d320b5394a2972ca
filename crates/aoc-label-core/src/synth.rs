use crate::compress::compress_label;
use crate::fallback::fallback_label;
use crate::label_contracts::LabelConfig;
use crate::normalize::normalize_label;
use crate::prompt::{build_label_prompt, LabelPrompt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CandidateFailureKind {
    Timeout,
    Unavailable,
    ProviderError,
    InvalidOutput,
}

impl CandidateFailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Unavailable => "unavailable",
            Self::ProviderError => "provider_error",
            Self::InvalidOutput => "invalid_output",
        }
    }
}

impl std::fmt::Display for CandidateFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("candidate source {kind}: {message}")]
pub struct CandidateError {
    pub kind: CandidateFailureKind,
    pub message: String,
}

impl CandidateError {
    pub fn new(kind: CandidateFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// External text generator asked for a raw label guess.
pub trait CandidateSource {
    fn complete(
        &self,
        prompt: &LabelPrompt,
    ) -> impl Future<Output = Result<String, CandidateError>> + Send;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LabelOrigin {
    Candidate,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SynthesizedLabel {
    pub text: String,
    pub origin: LabelOrigin,
    pub candidate_failure: Option<CandidateFailureKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynthesisSettings {
    pub max_label_chars: usize,
    pub request_char_budget: usize,
    pub candidate_timeout: Duration,
}

impl From<&LabelConfig> for SynthesisSettings {
    fn from(config: &LabelConfig) -> Self {
        Self {
            max_label_chars: config.max_label_chars,
            request_char_budget: config.request_char_budget,
            candidate_timeout: config.candidate_timeout(),
        }
    }
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self::from(&LabelConfig::default())
    }
}

pub struct LabelSynthesizer<C> {
    source: C,
    settings: SynthesisSettings,
}

impl<C: CandidateSource> LabelSynthesizer<C> {
    pub fn new(source: C, settings: SynthesisSettings) -> Self {
        Self { source, settings }
    }

    pub fn settings(&self) -> &SynthesisSettings {
        &self.settings
    }

    /// Single attempt against the candidate source, falling back to the
    /// frequency labeler on any failure or unusable output.
    pub async fn synthesize<S: AsRef<str>>(
        &self,
        requests: &[S],
        context_name: Option<&str>,
    ) -> SynthesizedLabel {
        let max_chars = self.settings.max_label_chars;
        let prompt = build_label_prompt(
            requests,
            context_name,
            max_chars,
            self.settings.request_char_budget,
        );

        let failure = match self.request_candidate(&prompt).await {
            Ok(raw) => {
                let text = compress_label(&normalize_label(&raw), max_chars);
                if !text.is_empty() {
                    return SynthesizedLabel {
                        text,
                        origin: LabelOrigin::Candidate,
                        candidate_failure: None,
                    };
                }
                warn!(
                    event = "label_candidate_failed",
                    kind = %CandidateFailureKind::InvalidOutput,
                    error = "empty after normalization"
                );
                CandidateFailureKind::InvalidOutput
            }
            Err(err) => {
                warn!(event = "label_candidate_failed", kind = %err.kind, error = %err.message);
                err.kind
            }
        };

        let text = fallback_label(requests, max_chars);
        debug!(event = "label_fallback_used", label = %text, reason = %failure);
        SynthesizedLabel {
            text,
            origin: LabelOrigin::Fallback,
            candidate_failure: Some(failure),
        }
    }

    async fn request_candidate(&self, prompt: &LabelPrompt) -> Result<String, CandidateError> {
        let timeout = self.settings.candidate_timeout;
        match tokio::time::timeout(timeout, self.source.complete(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(CandidateError::new(
                CandidateFailureKind::Timeout,
                format!("no candidate within {}ms", timeout.as_millis()),
            )),
        }
    }
}
