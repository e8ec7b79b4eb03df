//! Client-facing error taxonomy and upstream failure classification

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::IdError;
use crate::output::ErrorResponse;

/// 404 message when the last strategy was reachable but had nothing
pub const NO_TRANSCRIPT: &str = "No transcript available for this video.";

/// 404 message when the last strategy failed outright
pub const TRANSCRIPTS_UNAVAILABLE: &str = "Transcripts are not available for this video.";

const PRIVATE_MARKERS: [&str; 4] = ["private video", "video is private", "login_required", "sign in to confirm"];
const LIVE_MARKERS: [&str; 4] = ["live stream", "livestream", "live_stream_offline", "premieres in"];
const REGION_MARKERS: [&str; 4] = ["your country", "in your region", "geo restricted", "geo-restricted"];

/// Reason an upstream video cannot be accessed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restriction {
    Private,
    Live,
    RegionLocked,
}

impl Restriction {
    pub fn status(self) -> StatusCode {
        match self {
            Restriction::Private | Restriction::Live => StatusCode::FORBIDDEN,
            Restriction::RegionLocked => StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS,
        }
    }

    fn message(self) -> &'static str {
        match self {
            Restriction::Private => "This video is private or requires sign-in.",
            Restriction::Live => "Transcripts are not available for live streams.",
            Restriction::RegionLocked => "This video is not available in this region.",
        }
    }

    /// Best-effort match against upstream error text.
    pub fn from_message(text: &str) -> Option<Self> {
        let text = text.to_lowercase();
        let matches = |markers: &[&str]| markers.iter().any(|m| text.contains(m));
        if matches(&REGION_MARKERS) {
            Some(Restriction::RegionLocked)
        } else if matches(&LIVE_MARKERS) {
            Some(Restriction::Live)
        } else if matches(&PRIVATE_MARKERS) {
            Some(Restriction::Private)
        } else {
            None
        }
    }
}

/// Upstream reported the video as not playable for us
#[derive(Debug, Error)]
#[error("video {video_id} is not accessible ({restriction:?}): {reason}")]
pub struct AccessDenied {
    pub video_id: String,
    pub restriction: Restriction,
    pub reason: String,
}

/// Classify a fetch failure as an access restriction, if it looks like one.
pub fn classify_restriction(err: &eyre::Report) -> Option<Restriction> {
    if let Some(denied) = err.chain().find_map(|e| e.downcast_ref::<AccessDenied>()) {
        return Some(denied.restriction);
    }
    err.chain().find_map(|e| Restriction::from_message(&e.to_string()))
}

/// Errors surfaced to HTTP clients
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Video ID or URL is required. Pass it as the `id` query parameter.")]
    MissingInput,

    #[error("Invalid YouTube Video ID or URL format")]
    InvalidFormat,

    #[error("{}", .restriction.message())]
    AccessDenied { video_id: String, restriction: Restriction },

    #[error("{message}")]
    TranscriptUnavailable { video_id: String, message: &'static str },

    #[error("Failed to fetch transcript.")]
    UpstreamFailure { video_id: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingInput | ApiError::InvalidFormat => StatusCode::BAD_REQUEST,
            ApiError::AccessDenied { restriction, .. } => restriction.status(),
            ApiError::TranscriptUnavailable { .. } => StatusCode::NOT_FOUND,
            ApiError::UpstreamFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn video_id(&self) -> Option<&str> {
        match self {
            ApiError::MissingInput | ApiError::InvalidFormat => None,
            ApiError::AccessDenied { video_id, .. }
            | ApiError::TranscriptUnavailable { video_id, .. }
            | ApiError::UpstreamFailure { video_id } => Some(video_id),
        }
    }
}

impl From<IdError> for ApiError {
    fn from(err: IdError) -> Self {
        match err {
            IdError::Missing => ApiError::MissingInput,
            IdError::InvalidFormat => ApiError::InvalidFormat,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
            video_id: self.video_id().map(str::to_string),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::WrapErr;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::MissingInput.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::InvalidFormat.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::TranscriptUnavailable {
                video_id: "abc".into(),
                message: NO_TRANSCRIPT
            }
            .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::UpstreamFailure { video_id: "abc".into() }.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::AccessDenied {
                video_id: "abc".into(),
                restriction: Restriction::RegionLocked
            }
            .status(),
            StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS
        );
    }

    #[test]
    fn test_id_error_conversion() {
        assert!(matches!(ApiError::from(IdError::Missing), ApiError::MissingInput));
        assert!(matches!(ApiError::from(IdError::InvalidFormat), ApiError::InvalidFormat));
    }

    #[test]
    fn test_restriction_from_message() {
        assert_eq!(
            Restriction::from_message("The uploader has not made this video available in your country"),
            Some(Restriction::RegionLocked)
        );
        assert_eq!(Restriction::from_message("This is a Private video"), Some(Restriction::Private));
        assert_eq!(Restriction::from_message("Premieres in 3 hours"), Some(Restriction::Live));
        assert_eq!(Restriction::from_message("connection reset by peer"), None);
    }

    #[test]
    fn test_classify_typed_error_through_context() {
        let err: eyre::Result<()> = Err(AccessDenied {
            video_id: "abc".into(),
            restriction: Restriction::Live,
            reason: "offline".into(),
        }
        .into());
        let err = err.wrap_err("player request failed").unwrap_err();
        assert_eq!(classify_restriction(&err), Some(Restriction::Live));
    }

    #[test]
    fn test_classify_unrelated_error() {
        let err = eyre::eyre!("dns error");
        assert_eq!(classify_restriction(&err), None);
    }
}
