use aoc_label_core::{
    CandidateFailureKind, CandidateSource, ConfigError, LabelConfig, LabelOrigin, LabelRecord,
    LabelSynthesizer, SynthesisSettings,
};
use aoc_label_store::{InsertOutcome, LabelSink, StoreError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

pub mod candidate;
pub mod config;
pub mod transcript;

pub use candidate::{CommandCandidateSource, ConfiguredCandidateSource, UnavailableCandidateSource};
pub use config::{ConfigFileError, LabelerFileConfig};
pub use transcript::{InMemoryTurns, JsonlTranscript, TranscriptError, TurnSource};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to persist label: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRequest {
    pub session_key: String,
    /// Project or workspace name shown to the candidate source.
    pub context_name: Option<String>,
}

impl LabelRequest {
    pub fn new(session_key: impl Into<String>) -> Self {
        Self {
            session_key: session_key.into(),
            context_name: None,
        }
    }

    pub fn with_context_name(mut self, name: impl Into<String>) -> Self {
        self.context_name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyLabeled { existing: LabelRecord },
    BelowThreshold { user_turns: usize, required: usize },
    NoTranscript { detail: String },
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyLabeled { .. } => "already_labeled",
            Self::BelowThreshold { .. } => "below_threshold",
            Self::NoTranscript { .. } => "no_transcript",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LabelOutcome {
    Labeled {
        session_key: String,
        label: LabelRecord,
        origin: LabelOrigin,
        #[serde(skip_serializing_if = "Option::is_none")]
        candidate_failure: Option<CandidateFailureKind>,
    },
    Skipped {
        session_key: String,
        reason: SkipReason,
    },
}

impl LabelOutcome {
    /// Text of the label now in effect for the session, if any.
    pub fn label_text(&self) -> Option<&str> {
        match self {
            Self::Labeled { label, .. } => Some(&label.text),
            Self::Skipped {
                reason: SkipReason::AlreadyLabeled { existing },
                ..
            } => Some(&existing.text),
            Self::Skipped { .. } => None,
        }
    }

    pub fn is_labeled(&self) -> bool {
        matches!(self, Self::Labeled { .. })
    }
}

/// Decides whether a session is eligible, derives its label and records it.
pub struct LabelPipeline<C, S> {
    config: LabelConfig,
    synthesizer: LabelSynthesizer<C>,
    sink: S,
}

impl<C: CandidateSource, S: LabelSink> LabelPipeline<C, S> {
    pub fn new(config: LabelConfig, candidate: C, sink: S) -> Result<Self, PipelineError> {
        config.validate()?;
        let synthesizer = LabelSynthesizer::new(candidate, SynthesisSettings::from(&config));
        Ok(Self {
            config,
            synthesizer,
            sink,
        })
    }

    pub fn config(&self) -> &LabelConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub async fn run<T: TurnSource>(
        &self,
        request: &LabelRequest,
        turns: &T,
        now: DateTime<Utc>,
    ) -> Result<LabelOutcome, PipelineError> {
        let key = request.session_key.as_str();
        let relabel = self.config.relabel;

        if !relabel {
            if let Some(existing) = self.sink.get_label(key).await {
                return Ok(self.skipped(key, SkipReason::AlreadyLabeled { existing }));
            }
        }

        let user_turns = match turns.user_turn_count().await {
            Ok(count) => count,
            Err(err) => {
                return Ok(self.skipped(
                    key,
                    SkipReason::NoTranscript {
                        detail: err.to_string(),
                    },
                ));
            }
        };
        // A session with no user turns has nothing to label even at threshold 0.
        let required = self.config.trigger_after_requests.max(1);
        if user_turns < required {
            return Ok(self.skipped(
                key,
                SkipReason::BelowThreshold {
                    user_turns,
                    required,
                },
            ));
        }

        let requests = match turns.user_turns(self.config.max_messages_for_label).await {
            Ok(requests) => requests,
            Err(err) => {
                return Ok(self.skipped(
                    key,
                    SkipReason::NoTranscript {
                        detail: err.to_string(),
                    },
                ));
            }
        };

        let synthesized = self
            .synthesizer
            .synthesize(&requests, request.context_name.as_deref())
            .await;
        let record = LabelRecord::generated(synthesized.text, required, now);

        match self.sink.insert_label(key, record.clone(), relabel).await? {
            InsertOutcome::Written => {
                info!(
                    event = "label_written",
                    session_key = key,
                    label = %record.text,
                    origin = ?synthesized.origin,
                    user_turns
                );
                Ok(LabelOutcome::Labeled {
                    session_key: key.to_string(),
                    label: record,
                    origin: synthesized.origin,
                    candidate_failure: synthesized.candidate_failure,
                })
            }
            // Another writer labeled the session while this run was synthesizing.
            InsertOutcome::Existing(existing) => {
                Ok(self.skipped(key, SkipReason::AlreadyLabeled { existing }))
            }
        }
    }

    fn skipped(&self, key: &str, reason: SkipReason) -> LabelOutcome {
        info!(event = "label_skipped", session_key = key, reason = reason.as_str());
        LabelOutcome::Skipped {
            session_key: key.to_string(),
            reason,
        }
    }
}
