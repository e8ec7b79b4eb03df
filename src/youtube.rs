use async_trait::async_trait;
use eyre::{Result, WrapErr, bail};
use log::{debug, warn};
use regex::Regex;
use serde_json::{Value, json};

use crate::error::{AccessDenied, Restriction};
use crate::fetch::TranscriptFetcher;
use crate::normalize::normalize_segments;
use crate::{Segment, Transcript, TranscriptSource};

pub const DEFAULT_BASE_URL: &str = "https://www.youtube.com";

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Watch page, `player`, `next` and `get_transcript`
pub const REQUESTS_PER_FETCH: u32 = 4;

const CLIENT_NAME: &str = "WEB";
const CLIENT_VERSION: &str = "2.20241126.01.00";

/// Where `get_transcript` keeps its segment list, raw and pre-parsed
const SEGMENT_POINTERS: [&str; 2] = [
    "/actions/0/updateEngagementPanelAction/content/transcriptRenderer/content/transcriptSearchPanelRenderer/body/transcriptSegmentListRenderer/initialSegments",
    "/transcript/content/body/initial_segments",
];

/// Primary strategy: anonymous InnerTube `player` + `next` + `get_transcript`
#[derive(Debug, Clone)]
pub struct InnerTubeFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl InnerTubeFetcher {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Scrape the InnerTube API key from the watch page; requests work without it.
    async fn api_key(&self, video_id: &str) -> Option<String> {
        let watch_url = format!("{}/watch?v={video_id}", self.base_url);
        debug!("Fetching watch page: {watch_url}");

        let page = async {
            self.client
                .get(&watch_url)
                .header("User-Agent", USER_AGENT)
                .header("Accept-Language", "en-US,en;q=0.9")
                .send()
                .await?
                .error_for_status()?
                .text()
                .await
        }
        .await;

        match page.map_err(eyre::Report::from).and_then(|html| extract_api_key(&html)) {
            Ok(key) => Some(key),
            Err(e) => {
                debug!("Continuing without InnerTube API key: {e}");
                None
            }
        }
    }

    async fn post(&self, endpoint: &str, api_key: Option<&str>, mut body: Value) -> Result<Value> {
        let mut url = format!("{}/youtubei/v1/{endpoint}?prettyPrint=false", self.base_url);
        if let Some(key) = api_key {
            url.push_str("&key=");
            url.push_str(key);
        }
        body["context"] = client_context();

        debug!("POST {endpoint}");
        let resp = self
            .client
            .post(&url)
            .header("User-Agent", USER_AGENT)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("InnerTube {endpoint} returned {status}: {}", text.chars().take(200).collect::<String>());
        }

        Ok(resp.json().await?)
    }

    /// `next` then `get_transcript`; `None` when the video has no transcript panel or segment list.
    async fn segments(&self, video_id: &str, key: Option<&str>) -> Result<Option<Vec<Segment>>> {
        let next = self
            .post("next", key, json!({ "videoId": video_id }))
            .await
            .wrap_err("next request failed")?;

        let Some(params) = transcript_params(&next) else {
            debug!("No transcript panel for video {video_id}");
            return Ok(None);
        };

        let data = self
            .post("get_transcript", key, json!({ "params": params }))
            .await
            .wrap_err("get_transcript request failed")?;

        match initial_segments(&data) {
            Some(raw) => Ok(Some(normalize_segments(raw))),
            None => {
                debug!("Transcript response for {video_id} has no segment list");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl TranscriptFetcher for InnerTubeFetcher {
    fn name(&self) -> &'static str {
        "innertube"
    }

    async fn fetch(&self, video_id: &str) -> Result<Transcript> {
        let api_key = self.api_key(video_id).await;
        let key = api_key.as_deref();

        let player = self
            .post("player", key, json!({ "videoId": video_id }))
            .await
            .wrap_err("player request failed")?;
        check_playability(video_id, &player)?;

        let title = player
            .pointer("/videoDetails/title")
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut transcript = Transcript {
            video_id: video_id.to_string(),
            title,
            source: TranscriptSource::InnerTube,
            segments: Vec::new(),
        };

        // Past this point the title is known and must survive a failed lookup.
        match self.segments(video_id, key).await {
            Ok(Some(segments)) => transcript.segments = segments,
            Ok(None) => {}
            Err(e) => warn!("Transcript lookup failed for {video_id}, keeping metadata: {e:#}"),
        }

        Ok(transcript)
    }
}

fn client_context() -> Value {
    json!({
        "client": {
            "hl": "en",
            "gl": "US",
            "clientName": CLIENT_NAME,
            "clientVersion": CLIENT_VERSION
        }
    })
}

fn extract_api_key(html: &str) -> Result<String> {
    let re = Regex::new(r#""INNERTUBE_API_KEY"\s*:\s*"([^"]+)""#)?;
    if let Some(caps) = re.captures(html) {
        return Ok(caps[1].to_string());
    }

    // Fallback: try the newer pattern
    let re2 = Regex::new(r#"innertubeApiKey\s*[=:]\s*"([^"]+)""#)?;
    if let Some(caps) = re2.captures(html) {
        return Ok(caps[1].to_string());
    }

    bail!("could not extract InnerTube API key from watch page");
}

/// Reject videos the player reports as unplayable, classifying the reason when possible.
fn check_playability(video_id: &str, player: &Value) -> Result<()> {
    let status = player
        .pointer("/playabilityStatus/status")
        .and_then(Value::as_str)
        .unwrap_or("OK");
    let reason = player
        .pointer("/playabilityStatus/reason")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let is_live = player
        .pointer("/videoDetails/isLive")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let restriction = match status {
        "OK" if is_live => Some(Restriction::Live),
        "OK" => return Ok(()),
        "LOGIN_REQUIRED" => Some(Restriction::Private),
        "LIVE_STREAM_OFFLINE" => Some(Restriction::Live),
        _ => Restriction::from_message(&reason),
    };

    match restriction {
        Some(restriction) => Err(AccessDenied {
            video_id: video_id.to_string(),
            restriction,
            reason,
        }
        .into()),
        None => bail!("video {video_id} is not playable ({status}): {reason}"),
    }
}

/// `getTranscriptEndpoint.params` from the `next` response, wherever the panel sits
fn transcript_params(next: &Value) -> Option<String> {
    find_field(next, "getTranscriptEndpoint")?
        .get("params")?
        .as_str()
        .map(str::to_string)
}

fn initial_segments(data: &Value) -> Option<&[Value]> {
    SEGMENT_POINTERS
        .iter()
        .find_map(|pointer| data.pointer(pointer))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
}

fn find_field<'v>(value: &'v Value, key: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) => map
            .get(key)
            .or_else(|| map.values().find_map(|v| find_field(v, key))),
        Value::Array(items) => items.iter().find_map(|v| find_field(v, key)),
        _ => None,
    }
}
