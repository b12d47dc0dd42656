use std::fmt;

use photosheet_remote::RemoteApiError;

/// Pipeline stage identifiers. [`Stage::as_str`] is the stable name surfaced
/// in logs and failure messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Decode,
    BackgroundRemoval,
    ImageHosting,
    Enhancement,
    EnhancementDecode,
    Standardize,
    Compose,
    Export,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Decode => "decode",
            Self::BackgroundRemoval => "background_removal",
            Self::ImageHosting => "image_hosting",
            Self::Enhancement => "enhancement",
            Self::EnhancementDecode => "enhancement_decode",
            Self::Standardize => "standardize",
            Self::Compose => "compose",
            Self::Export => "export",
        }
    }

    /// Stages backed by a remote service call.
    pub fn is_remote(self) -> bool {
        matches!(
            self,
            Self::BackgroundRemoval | Self::ImageHosting | Self::Enhancement
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure of one pipeline stage. Terminal for the request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{stage} failed: {message}")]
pub struct StageFailure {
    pub stage: Stage,
    /// For remote stages this is the upstream response body, verbatim.
    pub message: String,
    pub upstream_status: Option<u16>,
}

impl StageFailure {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            upstream_status: None,
        }
    }

    /// Map a remote client error onto `stage`, keeping the upstream body
    /// and status code.
    pub fn from_remote(stage: Stage, err: RemoteApiError) -> Self {
        let upstream_status = err.status();
        let message = match err {
            RemoteApiError::ApiError { body, .. } => body,
            other => other.to_string(),
        };
        Self {
            stage,
            message,
            upstream_status,
        }
    }
}

/// Output of every stage: the next working value, or where and why the
/// pipeline stopped.
pub type ProcessingResult<T> = Result<T, StageFailure>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_are_snake_case() {
        assert_eq!(Stage::BackgroundRemoval.to_string(), "background_removal");
        assert_eq!(Stage::EnhancementDecode.as_str(), "enhancement_decode");
        assert_eq!(Stage::ImageHosting.as_str(), "image_hosting");
    }

    #[test]
    fn remote_api_error_keeps_body_and_status() {
        let failure = StageFailure::from_remote(
            Stage::BackgroundRemoval,
            RemoteApiError::ApiError {
                status: 402,
                body: r#"{"errors":[{"title":"Insufficient credits"}]}"#.into(),
            },
        );
        assert_eq!(failure.stage, Stage::BackgroundRemoval);
        assert_eq!(failure.upstream_status, Some(402));
        assert_eq!(failure.message, r#"{"errors":[{"title":"Insufficient credits"}]}"#);
    }

    #[test]
    fn decode_error_has_no_status() {
        let failure = StageFailure::from_remote(
            Stage::EnhancementDecode,
            RemoteApiError::Decode("bad shape".into()),
        );
        assert_eq!(failure.upstream_status, None);
        assert!(failure.message.contains("bad shape"));
    }
}
