//! Speech-to-text for spoken answers.
//!
//! Audio answers are transcribed before scoring; the rest of the answer
//! pipeline never sees audio bytes. Transcription is delegated to an
//! external HTTP endpoint (Whisper-compatible: multipart `file` upload,
//! JSON `{"text": ...}` reply) so the service itself stays model-free.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::TranscriptionConfig;
use crate::error::{Error, Result};

/// Trait for speech-to-text backends.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe raw audio bytes into text.
    async fn transcribe(&self, audio: &[u8], media_type: &str) -> Result<String>;
}

/// A transcriber that rejects every request. Used when no endpoint is
/// configured.
pub struct DisabledTranscriber;

#[async_trait]
impl Transcriber for DisabledTranscriber {
    async fn transcribe(&self, _audio: &[u8], _media_type: &str) -> Result<String> {
        Err(Error::TranscriptionFailed(
            "no transcription endpoint configured".to_string(),
        ))
    }
}

/// Transcription via a Whisper-compatible HTTP endpoint.
///
/// Posts the audio as a multipart `file` part (plus `model` when
/// configured) and reads `{"text": "..."}` from the response.
pub struct HttpTranscriber {
    endpoint_url: String,
    model: Option<String>,
    client: reqwest::Client,
}

impl HttpTranscriber {
    pub fn new(config: &TranscriptionConfig) -> Result<Self> {
        let endpoint_url = config.endpoint_url.clone().ok_or_else(|| {
            Error::TranscriptionFailed("transcription.endpoint_url not set".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::TranscriptionFailed(e.to_string()))?;

        Ok(Self {
            endpoint_url,
            model: config.model.clone(),
            client,
        })
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, audio: &[u8], media_type: &str) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name("answer")
            .mime_str(media_type)
            .map_err(|e| Error::TranscriptionFailed(e.to_string()))?;

        let mut form = reqwest::multipart::Form::new().part("file", part);
        if let Some(model) = &self.model {
            form = form.text("model", model.clone());
        }

        let response = self
            .client
            .post(&self.endpoint_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::TranscriptionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::TranscriptionFailed(format!(
                "transcription endpoint returned {}: {}",
                status, body
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::TranscriptionFailed(e.to_string()))?;

        parse_transcription_response(&json)
    }
}

fn parse_transcription_response(json: &serde_json::Value) -> Result<String> {
    json.get("text")
        .and_then(|t| t.as_str())
        .map(|t| t.trim().to_string())
        .ok_or_else(|| {
            Error::TranscriptionFailed("invalid transcription response: missing text".to_string())
        })
}

/// Create a [`Transcriber`] based on configuration.
pub fn create_transcriber(config: &TranscriptionConfig) -> Result<Box<dyn Transcriber>> {
    if config.endpoint_url.is_some() {
        Ok(Box::new(HttpTranscriber::new(config)?))
    } else {
        Ok(Box::new(DisabledTranscriber))
    }
}
