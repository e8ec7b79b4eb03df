use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use eyre::{Result, WrapErr, bail};
use log::{debug, warn};
use uuid::Uuid;

use crate::fetch::TranscriptFetcher;
use crate::vtt::{Cue, parse_vtt};
use crate::{Segment, Transcript, TranscriptSource};

/// Browser identifiers handed to yt-dlp, one picked at random per call
const USER_AGENTS: [&str; 6] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.6 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
];

const SUBTITLE_EXTENSION: &str = ".vtt";

/// The subtitle tool ran but left no subtitle file behind
#[derive(Debug, thiserror::Error)]
#[error("yt-dlp produced no subtitle file for {0}")]
pub struct NoSubtitleFile(pub String);

/// Fallback strategy: download the subtitle track with yt-dlp and parse it
#[derive(Debug, Clone)]
pub struct SubtitleFetcher {
    program: String,
    leading_args: Vec<String>,
    scratch_dir: PathBuf,
    language: String,
}

impl SubtitleFetcher {
    pub fn new(program: impl Into<String>, scratch_dir: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            scratch_dir: scratch_dir.into(),
            language: language.into(),
        }
    }

    /// Arguments placed before the yt-dlp flags, e.g. a script path when
    /// `program` is an interpreter.
    pub fn with_leading_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    async fn download(&self, video_id: &str, stem: &Path) -> Result<()> {
        let url = format!("https://www.youtube.com/watch?v={video_id}");
        let user_agent = random_user_agent();
        debug!("Downloading subtitles via {}: {url} -> {}", self.program, stem.display());

        let output = tokio::process::Command::new(&self.program)
            .args(&self.leading_args)
            .args([
                "--write-auto-sub",
                "--write-sub",
                "--sub-lang",
                self.language.as_str(),
                "--sub-format",
                "vtt",
                "--skip-download",
                "-o",
            ])
            .arg(stem)
            .args(["--user-agent", user_agent, url.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        match output {
            Ok(o) if o.status.success() => Ok(()),
            Ok(o) => {
                let stderr = String::from_utf8_lossy(&o.stderr);
                bail!("yt-dlp exited with status {}: {}", o.status, stderr.trim())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                bail!("{} not found; install yt-dlp to enable the subtitle fallback", self.program)
            }
            Err(e) => Err(e).wrap_err_with(|| format!("failed to run {}", self.program)),
        }
    }

    async fn read_cues(&self, video_id: &str, stem: &Path) -> Result<Vec<Cue>> {
        let files = find_subtitle_files(&self.scratch_dir, stem).await?;
        let Some(path) = files.first() else {
            return Err(NoSubtitleFile(video_id.to_string()).into());
        };

        let content = tokio::fs::read_to_string(path).await;

        for file in &files {
            if let Err(e) = tokio::fs::remove_file(file).await {
                warn!("Failed to remove temporary subtitle file {}: {e}", file.display());
            }
        }

        let content = content.wrap_err_with(|| format!("failed to read {}", path.display()))?;
        Ok(parse_vtt(&content))
    }
}

#[async_trait]
impl TranscriptFetcher for SubtitleFetcher {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn fetch(&self, video_id: &str) -> Result<Transcript> {
        tokio::fs::create_dir_all(&self.scratch_dir)
            .await
            .wrap_err_with(|| format!("failed to create scratch dir {}", self.scratch_dir.display()))?;

        let stem = self.scratch_dir.join(output_stem(video_id));
        self.download(video_id, &stem).await?;

        let segments = self
            .read_cues(video_id, &stem)
            .await?
            .into_iter()
            .filter_map(cue_to_segment)
            .collect();

        Ok(Transcript {
            video_id: video_id.to_string(),
            title: None,
            source: TranscriptSource::Subtitles,
            segments,
        })
    }
}

/// `<video_id>-<random token>`, unique per call
fn output_stem(video_id: &str) -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!("{video_id}-{}", &token[..12])
}

fn random_user_agent() -> &'static str {
    let index = (Uuid::new_v4().as_u128() % USER_AGENTS.len() as u128) as usize;
    USER_AGENTS[index]
}

/// Subtitle files yt-dlp wrote for `stem`, e.g. `<stem>.en.vtt`
async fn find_subtitle_files(dir: &Path, stem: &Path) -> Result<Vec<PathBuf>> {
    let prefix = stem
        .file_name()
        .map(|n| format!("{}.", n.to_string_lossy()))
        .unwrap_or_default();

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .wrap_err_with(|| format!("failed to read scratch dir {}", dir.display()))?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) && name.ends_with(SUBTITLE_EXTENSION) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn cue_to_segment(cue: Cue) -> Option<Segment> {
    if cue.text.is_empty() {
        return None;
    }
    Some(Segment {
        offset: cue.start.max(0.0),
        duration: (cue.end - cue.start).max(0.0),
        text: cue.text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    const FAKE_YT_DLP: &str = r#"
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
echo "$out" >> "$STEM_LOG"
printf 'WEBVTT\n\n00:00:01.000 --> 00:00:02.500\nhello there\n\n00:00:02.500 --> 00:00:03.000\n<c> </c>\n\n00:00:03.000 --> 00:00:04.250\ngeneral kenobi\n' > "$out.en.vtt"
"#;

    /// Writes a fake yt-dlp script that logs each output stem it was given
    fn fake_fetcher(dir: &Path, scratch: &Path) -> SubtitleFetcher {
        let log = dir.join("stems.log");
        let script = dir.join("fake-yt-dlp.sh");
        std::fs::write(&script, format!("STEM_LOG='{}'\n{FAKE_YT_DLP}", log.display())).unwrap();
        SubtitleFetcher::new("sh", scratch, "en").with_leading_args([script.to_string_lossy().to_string()])
    }

    fn vtt_files(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "vtt"))
            .collect()
    }

    #[test]
    fn test_output_stem_is_unique() {
        let a = output_stem("dQw4w9WgXcQ");
        let b = output_stem("dQw4w9WgXcQ");
        assert_ne!(a, b);
        assert!(a.starts_with("dQw4w9WgXcQ-"));
        assert_eq!(a.len(), "dQw4w9WgXcQ-".len() + 12);
    }

    #[test]
    fn test_user_agent_pool() {
        assert!(USER_AGENTS.len() >= 5);
        assert!(USER_AGENTS.contains(&random_user_agent()));
    }

    #[test]
    fn test_cue_to_segment() {
        let seg = cue_to_segment(Cue {
            text: "it&#39;s".to_string(),
            start: 1.0,
            end: 3.5,
        })
        .unwrap();
        assert_eq!(seg.text, "it&#39;s");
        assert!((seg.offset - 1.0).abs() < f64::EPSILON);
        assert!((seg.duration - 2.5).abs() < f64::EPSILON);

        assert!(
            cue_to_segment(Cue {
                text: String::new(),
                start: 0.0,
                end: 1.0
            })
            .is_none()
        );

        let blank = cue_to_segment(Cue {
            text: " ".to_string(),
            start: 0.0,
            end: 1.0,
        })
        .unwrap();
        assert_eq!(blank.text, " ");
    }

    #[tokio::test]
    async fn test_fetch_parses_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("scratch");
        let fetcher = fake_fetcher(dir.path(), &scratch);

        let transcript = fetcher.fetch("dQw4w9WgXcQ").await.unwrap();
        assert_eq!(transcript.source, TranscriptSource::Subtitles);
        assert!(transcript.title.is_none());
        assert_eq!(transcript.segments.len(), 2);
        assert_eq!(transcript.segments[0].text, "hello there");
        assert!((transcript.segments[0].offset - 1.0).abs() < 1e-9);
        assert!((transcript.segments[0].duration - 1.5).abs() < 1e-9);
        assert_eq!(transcript.segments[1].text, "general kenobi");
        assert!(vtt_files(&scratch).is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_fetches_use_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("scratch");
        let fetcher = Arc::new(fake_fetcher(dir.path(), &scratch));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let fetcher = fetcher.clone();
                tokio::spawn(async move { fetcher.fetch("dQw4w9WgXcQ").await })
            })
            .collect();

        for handle in handles {
            let transcript = handle.await.unwrap().unwrap();
            assert_eq!(transcript.segments.len(), 2);
        }

        let log = std::fs::read_to_string(dir.path().join("stems.log")).unwrap();
        let stems: HashSet<&str> = log.lines().collect();
        assert_eq!(log.lines().count(), 8);
        assert_eq!(stems.len(), 8);
        assert!(vtt_files(&scratch).is_empty());
    }

    #[tokio::test]
    async fn test_missing_subtitle_file() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("scratch");
        let script = dir.path().join("noop.sh");
        std::fs::write(&script, "exit 0\n").unwrap();
        let fetcher = SubtitleFetcher::new("sh", &scratch, "en").with_leading_args([script.to_string_lossy().to_string()]);

        let err = fetcher.fetch("dQw4w9WgXcQ").await.unwrap_err();
        assert!(err.downcast_ref::<NoSubtitleFile>().is_some());
        assert!(scratch.is_dir());
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fail.sh");
        std::fs::write(&script, "echo 'ERROR: Private video' >&2\nexit 1\n").unwrap();
        let fetcher = SubtitleFetcher::new("sh", dir.path().join("scratch"), "en")
            .with_leading_args([script.to_string_lossy().to_string()]);

        let err = fetcher.fetch("dQw4w9WgXcQ").await.unwrap_err();
        assert!(err.to_string().contains("Private video"));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = SubtitleFetcher::new("definitely-not-yt-dlp-xyz", dir.path(), "en");
        let err = fetcher.fetch("dQw4w9WgXcQ").await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
