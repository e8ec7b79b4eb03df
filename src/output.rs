use serde::Serialize;

use crate::entities::decode_entities;
use crate::{Segment, Transcript, UNTITLED_VIDEO};

/// Successful response body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptResponse {
    pub video_title: String,
    pub transcript: Vec<Segment>,
}

/// Error response body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
}

impl TranscriptResponse {
    /// Build the response body, decoding the title exactly once.
    ///
    /// `fallback_title` is used when the transcript's own source had none.
    pub fn new(transcript: Transcript, fallback_title: Option<&str>) -> Self {
        let title = [transcript.title.as_deref(), fallback_title]
            .into_iter()
            .flatten()
            .find(|t| !t.trim().is_empty())
            .unwrap_or(UNTITLED_VIDEO);

        Self {
            video_title: decode_entities(title),
            transcript: transcript.segments,
        }
    }
}
