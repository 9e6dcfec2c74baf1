//! HTTP client for a Kokoro synthesis service
//!
//! POST `{base}/api/tts` with `{"text", "voice"}` returns
//! `{"audio": <base64 wav>, "voice"}`; GET `{base}/api/voices` returns the
//! voice catalog. Failures carry `{"error": ...}`.

use super::{Speech, SpeechClient, SpeechError, SpeechRequest, VoiceCatalog, VoiceInfo};
use crate::session::AudioClip;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct KokoroHttpClient {
    client: Client,
    base_url: String,
}

impl KokoroHttpClient {
    pub fn new(base_url: &str) -> Result<Self, SpeechError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SpeechError::network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn classify_send_error(e: &reqwest::Error) -> SpeechError {
        if e.is_timeout() {
            SpeechError::network(format!("Request timeout: {e}"))
        } else if e.is_connect() {
            SpeechError::network(format!("Connection failed: {e}"))
        } else {
            SpeechError::network(format!("Request failed: {e}"))
        }
    }

    fn classify_status(status: StatusCode, body: &str) -> SpeechError {
        let message = serde_json::from_str::<ErrorBody>(body)
            .map_or_else(|_| body.to_string(), |e| e.error);
        if status.is_client_error() {
            SpeechError::invalid_request(message)
        } else {
            SpeechError::server_error(format!("HTTP {status}: {message}"))
        }
    }

    async fn read_body(response: reqwest::Response) -> Result<String, SpeechError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SpeechError::network(format!("Failed to read response: {e}")))?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(Self::classify_status(status, &body))
        }
    }
}

/// Decode the base64 WAV payload of a synthesis response
pub(crate) fn decode_audio(encoded: &str) -> Result<AudioClip, SpeechError> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| SpeechError::invalid_response(format!("Audio is not valid base64: {e}")))?;
    if bytes.is_empty() {
        return Err(SpeechError::invalid_response("Service returned empty audio"));
    }
    Ok(AudioClip::new(bytes))
}

#[async_trait]
impl SpeechClient for KokoroHttpClient {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Speech, SpeechError> {
        let response = self
            .client
            .post(format!("{}/api/tts", self.base_url))
            .json(&TtsRequestBody {
                text: request.text(),
                voice: request.voice(),
            })
            .send()
            .await
            .map_err(|e| Self::classify_send_error(&e))?;

        let body = Self::read_body(response).await?;
        let parsed: TtsResponseBody = serde_json::from_str(&body)
            .map_err(|e| SpeechError::invalid_response(format!("Failed to parse response: {e}")))?;

        Ok(Speech {
            audio: decode_audio(&parsed.audio)?,
            voice: parsed.voice.unwrap_or_else(|| request.voice().to_string()),
        })
    }

    async fn voices(&self) -> Result<VoiceCatalog, SpeechError> {
        let response = self
            .client
            .get(format!("{}/api/voices", self.base_url))
            .send()
            .await
            .map_err(|e| Self::classify_send_error(&e))?;

        let body = Self::read_body(response).await?;
        let parsed: VoicesResponseBody = serde_json::from_str(&body)
            .map_err(|e| SpeechError::invalid_response(format!("Failed to parse voices: {e}")))?;

        if parsed.default.trim().is_empty() && parsed.voices.is_empty() {
            return Err(SpeechError::invalid_response("Service offers no voices"));
        }
        let default = if parsed.default.trim().is_empty() {
            parsed.voices[0].name.clone()
        } else {
            parsed.default
        };
        Ok(VoiceCatalog {
            voices: parsed.voices,
            default,
        })
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct TtsRequestBody<'a> {
    text: &'a str,
    voice: &'a str,
}

#[derive(Debug, Deserialize)]
struct TtsResponseBody {
    audio: String,
    #[serde(default)]
    voice: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VoicesResponseBody {
    voices: Vec<VoiceInfo>,
    #[serde(default)]
    default: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}
