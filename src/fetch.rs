use async_trait::async_trait;
use eyre::Result;

use crate::Transcript;

/// One transcript strategy in the fallback chain.
///
/// `Ok` with no segments means the source was reachable but had nothing;
/// `Err` means the attempt itself failed. Either one moves on to the next
/// strategy.
#[async_trait]
pub trait TranscriptFetcher: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self, video_id: &str) -> Result<Transcript>;
}
