//! Transcript segment normalization
//!
//! The transcript payload carries segments in one of several unrelated
//! shapes. Each shape is decoded into its own variant of [`RawSegment`],
//! picked by which discriminating key the segment object carries, and then
//! mapped to a uniform [`Segment`].

use log::debug;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::Segment;
use crate::entities::decode_entities;

const RENDERER_KEYS: [&str; 2] = ["transcript_segment_renderer", "transcriptSegmentRenderer"];
const CUE_GROUP_KEYS: [&str; 3] = ["cue_group", "transcript_cue_group_renderer", "transcriptCueGroupRenderer"];
const CUE_RENDERER_KEYS: [&str; 3] = ["transcript_cue_renderer", "transcriptCueRenderer", "cue_renderer"];

/// Milliseconds, encoded upstream as either a JSON number or a numeric string
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Millis(pub f64);

impl Millis {
    fn seconds(self) -> f64 {
        self.0 / 1000.0
    }
}

impl<'de> Deserialize<'de> for Millis {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(f64),
            Text(String),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Millis(n),
            Repr::Text(s) => Millis(s.trim().parse().ok().filter(|v: &f64| v.is_finite()).unwrap_or(0.0)),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Run {
    #[serde(default)]
    pub text: Option<String>,
}

/// Text carried either directly or as an ordered list of runs
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RichText {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, rename = "simpleText")]
    pub simple_text: Option<String>,
    #[serde(default)]
    pub runs: Option<Vec<Run>>,
}

/// A `text` field that is sometimes a plain string and sometimes an object
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TextField {
    Plain(String),
    Rich(RichText),
}

// Upstream payloads come in snake_case or camelCase, occasionally both at once,
// so each spelling gets its own field and the snake_case one wins.

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SegmentRenderer {
    #[serde(default)]
    pub snippet: Option<RichText>,
    #[serde(default)]
    pub text: Option<TextField>,
    #[serde(default)]
    pub runs: Option<Vec<Run>>,
    #[serde(default)]
    pub start_ms: Option<Millis>,
    #[serde(default, rename = "startMs")]
    pub start_ms_camel: Option<Millis>,
    #[serde(default)]
    pub end_ms: Option<Millis>,
    #[serde(default, rename = "endMs")]
    pub end_ms_camel: Option<Millis>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CueRenderer {
    #[serde(default)]
    pub text: Option<RichText>,
    #[serde(default)]
    pub cue: Option<RichText>,
    #[serde(default)]
    pub start_offset_ms: Option<Millis>,
    #[serde(default, rename = "startOffsetMs")]
    pub start_offset_ms_camel: Option<Millis>,
    #[serde(default)]
    pub duration_ms: Option<Millis>,
    #[serde(default, rename = "durationMs")]
    pub duration_ms_camel: Option<Millis>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CueGroup {
    #[serde(default)]
    cues: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenericSegment {
    #[serde(default)]
    pub text: Option<TextField>,
    #[serde(default)]
    pub runs: Option<Vec<Run>>,
    #[serde(default)]
    pub snippet: Option<RichText>,
    #[serde(default)]
    pub start_ms: Option<Millis>,
    #[serde(default, rename = "startMs")]
    pub start_ms_camel: Option<Millis>,
    #[serde(default)]
    pub end_ms: Option<Millis>,
    #[serde(default, rename = "endMs")]
    pub end_ms_camel: Option<Millis>,
    #[serde(default)]
    pub duration_ms: Option<Millis>,
    #[serde(default, rename = "durationMs")]
    pub duration_ms_camel: Option<Millis>,
}

/// One raw transcript segment, classified by shape
#[derive(Debug, Clone)]
pub enum RawSegment {
    Renderer(SegmentRenderer),
    /// First cue of a cue group
    CueGroup(CueRenderer),
    Generic(GenericSegment),
}

impl RawSegment {
    /// Classify a raw segment object, trying renderer, cue group, then generic.
    pub fn classify(value: &Value) -> Result<Self, serde_json::Error> {
        if let Some(renderer) = find_key(value, &RENDERER_KEYS) {
            return SegmentRenderer::deserialize(renderer).map(RawSegment::Renderer);
        }

        if let Some(group) = find_key(value, &CUE_GROUP_KEYS) {
            let group = CueGroup::deserialize(group)?;
            if let Some(first) = group.cues.first() {
                let renderer = find_key(first, &CUE_RENDERER_KEYS).unwrap_or(first);
                return CueRenderer::deserialize(renderer).map(RawSegment::CueGroup);
            }
        }

        GenericSegment::deserialize(value).map(RawSegment::Generic)
    }

    /// Map to a uniform segment; `None` when the text comes out empty.
    pub fn normalize(&self) -> Option<Segment> {
        let (raw_text, offset, duration) = match self {
            RawSegment::Renderer(r) => {
                let text = r
                    .snippet
                    .as_ref()
                    .and_then(RichText::resolve)
                    .or_else(|| r.text.as_ref().and_then(TextField::resolve))
                    .or_else(|| join_runs(r.runs.as_deref()));
                let start = r.start_ms.or(r.start_ms_camel).unwrap_or_default();
                let end = r.end_ms.or(r.end_ms_camel).unwrap_or_default();
                (text, start.seconds(), end.seconds() - start.seconds())
            }
            RawSegment::CueGroup(c) => {
                let text = c
                    .text
                    .as_ref()
                    .and_then(RichText::resolve)
                    .or_else(|| c.cue.as_ref().and_then(RichText::resolve));
                let start = c.start_offset_ms.or(c.start_offset_ms_camel).unwrap_or_default();
                let duration = c.duration_ms.or(c.duration_ms_camel).unwrap_or_default();
                (text, start.seconds(), duration.seconds())
            }
            RawSegment::Generic(g) => {
                let text = g
                    .text
                    .as_ref()
                    .and_then(TextField::resolve)
                    .or_else(|| join_runs(g.runs.as_deref()))
                    .or_else(|| g.snippet.as_ref().and_then(RichText::resolve));
                let start_ms = g.start_ms.or(g.start_ms_camel);
                let end_ms = g.end_ms.or(g.end_ms_camel);
                let offset = start_ms.map(Millis::seconds).unwrap_or(0.0);
                let duration = match (g.duration_ms.or(g.duration_ms_camel), start_ms, end_ms) {
                    (Some(d), _, _) => d.seconds(),
                    (None, Some(start), Some(end)) => end.seconds() - start.seconds(),
                    _ => 0.0,
                };
                (text, offset, duration)
            }
        };

        let text = decode_entities(raw_text.as_deref());
        if text.is_empty() {
            return None;
        }

        Some(Segment {
            text,
            offset: offset.max(0.0),
            duration: duration.max(0.0),
        })
    }
}

impl RichText {
    fn resolve(&self) -> Option<String> {
        non_empty(self.text.clone())
            .or_else(|| non_empty(self.simple_text.clone()))
            .or_else(|| join_runs(self.runs.as_deref()))
    }
}

impl TextField {
    fn resolve(&self) -> Option<String> {
        match self {
            TextField::Plain(s) => non_empty(Some(s.clone())),
            TextField::Rich(rich) => rich.resolve(),
        }
    }
}

/// Normalize a sequence of raw segment objects, keeping source order.
///
/// Segments that fail to decode or end up with empty text are skipped.
pub fn normalize_segments(values: &[Value]) -> Vec<Segment> {
    values
        .iter()
        .filter_map(|value| match RawSegment::classify(value) {
            Ok(raw) => raw.normalize(),
            Err(e) => {
                debug!("Skipping undecodable transcript segment: {e}");
                None
            }
        })
        .collect()
}

fn find_key<'v>(value: &'v Value, keys: &[&str]) -> Option<&'v Value> {
    keys.iter().find_map(|key| value.get(key)).filter(|v| v.is_object())
}

fn join_runs(runs: Option<&[Run]>) -> Option<String> {
    let joined: String = runs?.iter().filter_map(|run| run.text.as_deref()).collect();
    non_empty(Some(joined))
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.is_empty())
}
