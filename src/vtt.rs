//! Minimal WebVTT cue parser

use std::sync::LazyLock;

use regex::Regex;

static TIMING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*((?:\d+:)?\d{1,2}:\d{2}[.,]\d{1,3})\s+-->\s+((?:\d+:)?\d{1,2}:\d{2}[.,]\d{1,3})")
        .expect("valid timing regex")
});

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

/// A single timed cue
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

/// Parse a WebVTT document into its cues, in file order.
///
/// Inline markup (`<c>`, `<00:00:01.000>` word timings) is stripped from cue
/// text. Blocks without a valid timing line are skipped.
pub fn parse_vtt(content: &str) -> Vec<Cue> {
    let content = content.trim_start_matches('\u{feff}').replace("\r\n", "\n");
    let mut cues = Vec::new();

    for block in content.split("\n\n") {
        let mut lines = block.lines().map(str::trim_end).skip_while(|l| l.trim().is_empty());

        let Some(first) = lines.next() else {
            continue;
        };
        if first.starts_with("WEBVTT") || first.starts_with("NOTE") || first == "STYLE" || first == "REGION" {
            continue;
        }

        // An optional cue identifier precedes the timing line
        let timing = if TIMING.is_match(first) {
            first
        } else {
            match lines.next() {
                Some(line) if TIMING.is_match(line) => line,
                _ => continue,
            }
        };

        let Some(caps) = TIMING.captures(timing) else {
            continue;
        };
        let (Some(start), Some(end)) = (parse_timestamp(&caps[1]), parse_timestamp(&caps[2])) else {
            continue;
        };

        let text = lines
            .map(|line| TAG.replace_all(line, "").trim().to_string())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        cues.push(Cue { text, start, end });
    }

    cues
}

/// Parse `hh:mm:ss.mmm` or `mm:ss.mmm` into seconds
fn parse_timestamp(ts: &str) -> Option<f64> {
    let ts = ts.replace(',', ".");
    let mut parts = ts.rsplit(':');
    let seconds: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let hours: f64 = match parts.next() {
        Some(h) => h.parse().ok()?,
        None => 0.0,
    };
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}
