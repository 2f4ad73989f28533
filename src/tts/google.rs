use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{check_status, credential, SpeechRequest};
use crate::config::TtsConfig;
use crate::error::TtsError;

const PROVIDER: &str = "google";
const DEFAULT_VOICE: &str = "en-US-Neural2-C";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig,
}

#[derive(Debug, Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

pub(super) async fn synthesize(
    client: &Client,
    config: &TtsConfig,
    request: &SpeechRequest<'_>,
) -> Result<Vec<u8>, TtsError> {
    let api_key = credential(config.google_api_key.as_deref(), PROVIDER, "GOOGLE_API_KEY")?;

    let body = SynthesizeRequest {
        input: SynthesisInput { text: request.text },
        voice: VoiceSelection {
            language_code: request.language_code,
            name: request.voice_name.unwrap_or(DEFAULT_VOICE),
        },
        audio_config: AudioConfig {
            audio_encoding: "MP3",
        },
    };

    let response = client
        .post(format!(
            "{}/text:synthesize",
            config.google_base_url.trim_end_matches('/')
        ))
        .header("x-goog-api-key", api_key)
        .json(&body)
        .send()
        .await
        .map_err(|source| TtsError::Http {
            provider: PROVIDER,
            source,
        })?;

    let response = check_status(PROVIDER, response).await?;
    let payload: SynthesizeResponse = response.json().await.map_err(|source| TtsError::Http {
        provider: PROVIDER,
        source,
    })?;

    STANDARD
        .decode(payload.audio_content)
        .map_err(|source| TtsError::Decode {
            provider: PROVIDER,
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tts::tests::{config, request};
    use crate::tts::TtsProvider;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn decodes_audio_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/text:synthesize"))
            .and(header("x-goog-api-key", "google-key"))
            .and(body_json(json!({
                "input": {"text": "hello"},
                "voice": {"languageCode": "en-US", "name": "en-US-Neural2-C"},
                "audioConfig": {"audioEncoding": "MP3"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "audioContent": STANDARD.encode(b"ID3fake")
            })))
            .expect(1)
            .mount(&server)
            .await;

        let audio = TtsProvider::Google
            .synthesize(&Client::new(), &config(&server.uri()), &request("hello"))
            .await
            .unwrap();
        assert_eq!(audio, b"ID3fake");
    }

    #[tokio::test]
    async fn api_error_keeps_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
            .mount(&server)
            .await;

        let err = TtsProvider::Google
            .synthesize(&Client::new(), &config(&server.uri()), &request("hello"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "google text-to-speech error: 403 - API key not valid"
        );
    }
}
