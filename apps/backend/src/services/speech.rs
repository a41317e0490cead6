//! Speech evaluation and synthesized prompt audio.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use reader_core::{evaluate_transcript, CoreError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{ApiError, Result};

/// Outcome of evaluating one spoken answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechVerdict {
    pub transcript: String,
    pub score: u8,
    pub is_correct: bool,
}

/// Turns a recorded answer into a verdict against the expected text.
#[async_trait]
pub trait SpeechEvaluator: Send + Sync {
    async fn evaluate(&self, audio: &[u8], expected: &str) -> Result<SpeechVerdict>;
}

/// Speech-to-text engine.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Result<String>;
}

/// For transports that recognise speech themselves and send UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextTranscriber;

#[async_trait]
impl Transcriber for PlainTextTranscriber {
    async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        String::from_utf8(audio.to_vec())
            .map_err(|_| ApiError::BadRequest("transcript is not valid UTF-8".to_string()))
    }
}

/// Transcribes, then scores the transcript with the fuzzy matcher.
pub struct TranscriptEvaluator<T> {
    transcriber: T,
    threshold: u8,
}

impl<T: Transcriber> TranscriptEvaluator<T> {
    pub fn new(transcriber: T, threshold: u8) -> Self {
        Self {
            transcriber,
            threshold,
        }
    }
}

#[async_trait]
impl<T: Transcriber> SpeechEvaluator for TranscriptEvaluator<T> {
    async fn evaluate(&self, audio: &[u8], expected: &str) -> Result<SpeechVerdict> {
        let transcript = self.transcriber.transcribe(audio).await?;
        let result = evaluate_transcript(&transcript, expected, self.threshold);
        tracing::debug!(
            "Scored '{}' against '{}': {} (threshold {})",
            transcript,
            expected,
            result.score,
            result.threshold
        );
        Ok(SpeechVerdict {
            transcript,
            score: result.score,
            is_correct: result.is_correct,
        })
    }
}

/// Text-to-speech engine.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    async fn synthesize(&self, text: &str) -> std::result::Result<Vec<u8>, CoreError>;
}

/// Backend used when no speech synthesis is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAudioBackend;

#[async_trait]
impl AudioBackend for NoAudioBackend {
    async fn synthesize(&self, _text: &str) -> std::result::Result<Vec<u8>, CoreError> {
        Err(CoreError::TtsUnavailable("no speech backend configured".to_string()))
    }
}

/// On-disk cache of synthesized audio keyed by normalized text.
pub struct AudioCache {
    dir: PathBuf,
    backend: Arc<dyn AudioBackend>,
}

impl AudioCache {
    pub fn new(dir: impl Into<PathBuf>, backend: Arc<dyn AudioBackend>) -> Self {
        Self {
            dir: dir.into(),
            backend,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache file name for `text`.
    pub fn cache_key(text: &str) -> String {
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        format!("{:x}.ogg", hasher.finalize())
    }

    /// Path of the audio for `text`, synthesizing it on a cache miss.
    pub async fn ensure_audio(&self, text: &str) -> Result<PathBuf> {
        if text.trim().is_empty() {
            return Err(ApiError::BadRequest("cannot synthesize empty text".to_string()));
        }

        let path = self.dir.join(Self::cache_key(text));
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(path);
        }

        let audio = self.backend.synthesize(text).await?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ApiError::Internal(format!("create audio cache: {e}")))?;

        // Write through a temporary file so readers never see partial audio.
        let tmp = self.dir.join(format!(".{}.tmp", Uuid::new_v4()));
        if let Err(e) = tokio::fs::write(&tmp, &audio).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(ApiError::Internal(format!("write audio: {e}")));
        }
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| ApiError::Internal(format!("store audio: {e}")))?;

        tracing::info!("Cached audio for '{}' at {}", text, path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AudioBackend for CountingBackend {
        async fn synthesize(&self, text: &str) -> std::result::Result<Vec<u8>, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(text.as_bytes().to_vec())
        }
    }

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("tts-{}", Uuid::new_v4()))
    }

    #[test]
    fn test_cache_key_ignores_case_and_spacing() {
        assert_eq!(
            AudioCache::cache_key("Good  morning"),
            AudioCache::cache_key(" good morning ")
        );
        assert_ne!(AudioCache::cache_key("cat"), AudioCache::cache_key("dog"));
        assert!(AudioCache::cache_key("cat").ends_with(".ogg"));
    }

    #[tokio::test]
    async fn test_audio_is_synthesized_once() {
        let backend = Arc::new(CountingBackend {
            calls: AtomicUsize::new(0),
        });
        let dir = temp_dir();
        let cache = AudioCache::new(&dir, backend.clone());

        let first = cache.ensure_audio("cat").await.unwrap();
        let second = cache.ensure_audio("CAT").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(tokio::fs::read(&first).await.unwrap(), b"cat".to_vec());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_text_is_rejected() {
        let cache = AudioCache::new(temp_dir(), Arc::new(NoAudioBackend));
        assert!(matches!(
            cache.ensure_audio("  ").await,
            Err(ApiError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_unavailable_backend_surfaces_tts_error() {
        let cache = AudioCache::new(temp_dir(), Arc::new(NoAudioBackend));
        assert!(matches!(
            cache.ensure_audio("cat").await,
            Err(ApiError::Core(CoreError::TtsUnavailable(_)))
        ));
    }

    #[tokio::test]
    async fn test_transcript_evaluator_scores_text() {
        let evaluator = TranscriptEvaluator::new(PlainTextTranscriber, 80);
        let verdict = evaluator.evaluate(b"Good morning!", "good morning").await.unwrap();
        assert_eq!(verdict.transcript, "Good morning!");
        assert_eq!(verdict.score, 100);
        assert!(verdict.is_correct);

        let verdict = evaluator.evaluate(b"banana", "good morning").await.unwrap();
        assert!(!verdict.is_correct);
    }
}
