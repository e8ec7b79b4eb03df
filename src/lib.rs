pub mod config;
pub mod entities;
pub mod error;
pub mod fetch;
pub mod normalize;
pub mod output;
pub mod server;
pub mod subtitles;
pub mod vtt;
pub mod youtube;

use serde::Serialize;
use thiserror::Error;

/// Title used when no fetcher could supply one
pub const UNTITLED_VIDEO: &str = "Untitled Video";

/// A single normalized transcript segment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub text: String,
    pub offset: f64,
    pub duration: f64,
}

/// Where a transcript came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TranscriptSource {
    InnerTube,
    Subtitles,
}

/// Transcript produced by one fetch strategy
#[derive(Debug, Clone)]
pub struct Transcript {
    pub video_id: String,
    pub title: Option<String>,
    pub source: TranscriptSource,
    pub segments: Vec<Segment>,
}

impl Transcript {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl std::fmt::Display for TranscriptSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptSource::InnerTube => write!(f, "innertube"),
            TranscriptSource::Subtitles => write!(f, "subtitles"),
        }
    }
}

/// Why a video ID could not be derived from the input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("no video ID or URL supplied")]
    Missing,
    #[error("unrecognized video ID or URL")]
    InvalidFormat,
}

/// Extract video ID from a bare ID or one of the supported YouTube URL shapes
pub fn extract_video_id(input: &str) -> Result<String, IdError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(IdError::Missing);
    }

    // Bare 11-character video ID
    if input.chars().count() == 11 && !input.contains('/') && !input.contains('?') {
        return Ok(input.to_string());
    }

    let url = url::Url::parse(input).map_err(|_| IdError::InvalidFormat)?;
    let path = url.path();

    let id = match url.host_str() {
        Some("youtu.be") => path.strip_prefix('/').map(str::to_string),
        Some("youtube.com" | "www.youtube.com") => {
            if path == "/watch" {
                url.query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned())
            } else if let Some(rest) = path.strip_prefix("/embed/") {
                Some(rest.to_string())
            } else {
                path.strip_prefix("/shorts/").map(str::to_string)
            }
        }
        _ => None,
    };

    id.filter(|id| !id.is_empty()).ok_or(IdError::InvalidFormat)
}
