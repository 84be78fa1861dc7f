//! Deterministic in-process provider for tests and dry runs.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{ExtractionClient, Result};
use crate::error::ExtractionError;
use crate::models::receipt::ExtractedRecord;

type Scripted = Result<ExtractedRecord>;

/// Replays queued results.
///
/// Lookup order per call: the first `when_contains` rule whose marker occurs
/// in the document bytes, then the queue front, then the fallback.
pub struct ScriptedClient {
    rules: Vec<(Vec<u8>, Scripted)>,
    queue: Mutex<VecDeque<Scripted>>,
    fallback: Scripted,
    calls: AtomicUsize,
}

impl ScriptedClient {
    /// Client whose unscripted calls yield an empty record.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            queue: Mutex::new(VecDeque::new()),
            fallback: Ok(ExtractedRecord::empty()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue results returned in order.
    pub fn with_results<I>(self, results: I) -> Self
    where
        I: IntoIterator<Item = Scripted>,
    {
        if let Ok(mut queue) = self.queue.lock() {
            queue.extend(results);
        }
        self
    }

    /// Result for any call once the queue is drained.
    pub fn repeat(mut self, result: Scripted) -> Self {
        self.fallback = result;
        self
    }

    /// Always answer `result` for documents containing `marker`.
    pub fn when_contains(mut self, marker: impl AsRef<[u8]>, result: Scripted) -> Self {
        self.rules.push((marker.as_ref().to_vec(), result));
        self
    }

    /// Number of `extract` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedClient {
    fn default() -> Self {
        Self::new()
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

#[async_trait]
impl ExtractionClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn extract(&self, bytes: &[u8], _mime_type: &str) -> Result<ExtractedRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some((_, result)) = self.rules.iter().find(|(marker, _)| contains(bytes, marker)) {
            return result.clone();
        }

        let next = self
            .queue
            .lock()
            .map_err(|_| ExtractionError::Transport("scripted queue poisoned".to_string()))?
            .pop_front();

        next.unwrap_or_else(|| self.fallback.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_then_fallback() {
        let client = ScriptedClient::new()
            .with_results([Err(ExtractionError::RateLimited { retry_after: None })])
            .repeat(Err(ExtractionError::Transport("down".into())));

        assert!(client.extract(b"", "application/pdf").await.unwrap_err().is_rate_limited());
        assert!(matches!(
            client.extract(b"", "application/pdf").await,
            Err(ExtractionError::Transport(_))
        ));
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn test_marker_rule_wins() {
        let mut record = ExtractedRecord::empty();
        record.place = Some("Cafe".into());

        let client = ScriptedClient::new()
            .when_contains("BAD", Err(ExtractionError::Auth("401".into())))
            .repeat(Ok(record));

        assert!(client.extract(b"xxBADxx", "application/pdf").await.is_err());
        let ok = client.extract(b"fine", "application/pdf").await.unwrap();
        assert_eq!(ok.place.as_deref(), Some("Cafe"));
    }
}
