use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::Serialize;

use super::{audio_bytes, credential, SpeechRequest};
use crate::config::TtsConfig;
use crate::error::TtsError;

const PROVIDER: &str = "elevenlabs";
const MODEL: &str = "eleven_multilingual_v2";
// "Rachel", one of the stock voices available on every account.
const DEFAULT_VOICE: &str = "21m00Tcm4TlvDq8ikWAM";

#[derive(Debug, Serialize)]
struct SpeechBody<'a> {
    text: &'a str,
    model_id: &'static str,
}

pub(super) async fn synthesize(
    client: &Client,
    config: &TtsConfig,
    request: &SpeechRequest<'_>,
) -> Result<Vec<u8>, TtsError> {
    let api_key = credential(
        config.elevenlabs_api_key.as_deref(),
        PROVIDER,
        "ELEVENLABS_API_KEY",
    )?;
    let voice = request.voice_name.unwrap_or(DEFAULT_VOICE);

    let response = client
        .post(format!(
            "{}/text-to-speech/{}",
            config.elevenlabs_base_url.trim_end_matches('/'),
            voice
        ))
        .header("xi-api-key", api_key)
        .header(ACCEPT, "audio/mpeg")
        .json(&SpeechBody {
            text: request.text,
            model_id: MODEL,
        })
        .send()
        .await
        .map_err(|source| TtsError::Http {
            provider: PROVIDER,
            source,
        })?;

    audio_bytes(PROVIDER, response).await
}
