//! Audio attachments: speech-to-text through a transcription backend.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

/// One timed piece of a transcript.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TranscriptSegment {
    /// Start offset in seconds.
    pub start: f64,
    /// End offset in seconds.
    pub end: f64,
    pub text: String,
}

/// Transcription result. Segments carry timestamps; callers that only need
/// the words use [`Transcript::flatten`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Transcript {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    /// Plain transcript text. Falls back to joining segments when the
    /// backend returned no top-level text.
    pub fn flatten(&self) -> String {
        if !self.text.trim().is_empty() {
            return self.text.trim().to_string();
        }
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<String>()
            .trim()
            .to_string()
    }
}

/// Audio transcription collaborator.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8], file_name: &str) -> anyhow::Result<Transcript>;
}

/// OpenAI-compatible `/audio/transcriptions` client.
pub struct WhisperTranscriber {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    language: String,
}

impl WhisperTranscriber {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            language: "en".to_string(),
        }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &[u8], file_name: &str) -> anyhow::Result<Transcript> {
        let part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name(file_name.to_string())
            .mime_str(audio_mime_type(file_name))?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("language", self.language.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment");

        let url = format!("{}/audio/transcriptions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Transcription API error ({}): {}", status, body));
        }

        let transcript: Transcript = response.json().await?;
        tracing::debug!(
            "Transcribed {} into {} segments",
            file_name,
            transcript.segments.len()
        );
        Ok(transcript)
    }
}

fn audio_mime_type(file_name: &str) -> &'static str {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".wav") {
        "audio/wav"
    } else if lower.ends_with(".m4a") {
        "audio/mp4"
    } else {
        "audio/mpeg"
    }
}
