use aoc_label_core::{CandidateError, CandidateFailureKind, CandidateSource, LabelPrompt};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const MAX_ERROR_CHARS: usize = 320;

/// Runs an external command that reads the rendered prompt on stdin and
/// prints a label on stdout.
#[derive(Debug, Clone)]
pub struct CommandCandidateSource {
    program: String,
    args: Vec<String>,
}

impl CommandCandidateSource {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Runs `cmdline` through `bash -lc`.
    pub fn shell(cmdline: impl Into<String>) -> Self {
        Self::new("bash").with_args(["-lc".to_string(), cmdline.into()])
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

impl CandidateSource for CommandCandidateSource {
    async fn complete(&self, prompt: &LabelPrompt) -> Result<String, CandidateError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|err| {
            CandidateError::new(
                CandidateFailureKind::Unavailable,
                format!("failed to spawn {}: {err}", self.program),
            )
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(err) = stdin.write_all(prompt.render().as_bytes()).await {
                // A command that ignores stdin may exit before reading it.
                if err.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(CandidateError::new(
                        CandidateFailureKind::ProviderError,
                        format!("failed to write prompt: {err}"),
                    ));
                }
            }
        }

        let output = child.wait_with_output().await.map_err(|err| {
            CandidateError::new(
                CandidateFailureKind::ProviderError,
                format!("failed to wait for {}: {err}", self.program),
            )
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("command exited with status {}", output.status)
            } else {
                stderr.chars().take(MAX_ERROR_CHARS).collect()
            };
            return Err(CandidateError::new(
                CandidateFailureKind::ProviderError,
                message,
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() {
            return Err(CandidateError::new(
                CandidateFailureKind::InvalidOutput,
                "command printed nothing",
            ));
        }
        Ok(stdout)
    }
}

/// Used when no generator is configured; every request goes to the
/// fallback labeler.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableCandidateSource;

impl CandidateSource for UnavailableCandidateSource {
    async fn complete(&self, _prompt: &LabelPrompt) -> Result<String, CandidateError> {
        Err(CandidateError::new(
            CandidateFailureKind::Unavailable,
            "no candidate command configured",
        ))
    }
}

#[derive(Debug, Clone)]
pub enum ConfiguredCandidateSource {
    Command(CommandCandidateSource),
    Unavailable(UnavailableCandidateSource),
}

impl ConfiguredCandidateSource {
    pub fn from_cmdline(cmdline: Option<&str>) -> Self {
        match cmdline.map(str::trim).filter(|value| !value.is_empty()) {
            Some(cmdline) => Self::Command(CommandCandidateSource::shell(cmdline)),
            None => Self::Unavailable(UnavailableCandidateSource),
        }
    }
}

impl CandidateSource for ConfiguredCandidateSource {
    async fn complete(&self, prompt: &LabelPrompt) -> Result<String, CandidateError> {
        match self {
            Self::Command(source) => source.complete(prompt).await,
            Self::Unavailable(source) => source.complete(prompt).await,
        }
    }
}
