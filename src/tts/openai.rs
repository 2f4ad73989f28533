use reqwest::Client;
use serde::Serialize;

use super::{audio_bytes, credential, SpeechRequest};
use crate::config::TtsConfig;
use crate::error::TtsError;

const PROVIDER: &str = "openai";
const MODEL: &str = "tts-1";
const DEFAULT_VOICE: &str = "alloy";

#[derive(Debug, Serialize)]
struct SpeechBody<'a> {
    model: &'static str,
    input: &'a str,
    voice: &'a str,
    response_format: &'static str,
}

pub(super) async fn synthesize(
    client: &Client,
    config: &TtsConfig,
    request: &SpeechRequest<'_>,
) -> Result<Vec<u8>, TtsError> {
    let api_key = credential(config.openai_api_key.as_deref(), PROVIDER, "OPENAI_API_KEY")?;

    let body = SpeechBody {
        model: MODEL,
        input: request.text,
        voice: request.voice_name.unwrap_or(DEFAULT_VOICE),
        response_format: "mp3",
    };

    let response = client
        .post(format!(
            "{}/audio/speech",
            config.openai_base_url.trim_end_matches('/')
        ))
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await
        .map_err(|source| TtsError::Http {
            provider: PROVIDER,
            source,
        })?;

    audio_bytes(PROVIDER, response).await
}
