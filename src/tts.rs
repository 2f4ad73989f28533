use crate::config::TtsConfig;
use crate::error::TtsError;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::info;

mod elevenlabs;
mod google;
mod openai;

pub const DEFAULT_LANGUAGE_CODE: &str = "en-US";

/// Third-party speech service used for `/tts`. All of them return MP3.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsProvider {
    #[default]
    Google,
    OpenAi,
    ElevenLabs,
}

#[derive(Debug, Clone, Copy)]
pub struct SpeechRequest<'a> {
    pub text: &'a str,
    pub language_code: &'a str,
    pub voice_name: Option<&'a str>,
}

impl TtsProvider {
    pub fn name(self) -> &'static str {
        match self {
            TtsProvider::Google => "google",
            TtsProvider::OpenAi => "openai",
            TtsProvider::ElevenLabs => "elevenlabs",
        }
    }

    pub async fn synthesize(
        self,
        client: &Client,
        config: &TtsConfig,
        request: &SpeechRequest<'_>,
    ) -> Result<Vec<u8>, TtsError> {
        info!(
            provider = self.name(),
            chars = request.text.chars().count(),
            "synthesizing speech"
        );
        match self {
            TtsProvider::Google => google::synthesize(client, config, request).await,
            TtsProvider::OpenAi => openai::synthesize(client, config, request).await,
            TtsProvider::ElevenLabs => elevenlabs::synthesize(client, config, request).await,
        }
    }
}

fn credential<'a>(
    key: Option<&'a str>,
    provider: &'static str,
    var: &'static str,
) -> Result<&'a str, TtsError> {
    key.filter(|key| !key.trim().is_empty())
        .ok_or(TtsError::MissingCredential { provider, var })
}

/// Fails on a non-success status, keeping the provider's error body.
async fn check_status(provider: &'static str, response: Response) -> Result<Response, TtsError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    Err(TtsError::Api {
        provider,
        status,
        message,
    })
}

async fn audio_bytes(provider: &'static str, response: Response) -> Result<Vec<u8>, TtsError> {
    let response = check_status(provider, response).await?;
    let bytes = response
        .bytes()
        .await
        .map_err(|source| TtsError::Http { provider, source })?;
    Ok(bytes.to_vec())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::TtsConfig;

    pub(crate) fn config(base_url: &str) -> TtsConfig {
        TtsConfig {
            google_api_key: Some("google-key".to_string()),
            openai_api_key: Some("openai-key".to_string()),
            elevenlabs_api_key: Some("eleven-key".to_string()),
            google_base_url: base_url.to_string(),
            openai_base_url: base_url.to_string(),
            elevenlabs_base_url: base_url.to_string(),
        }
    }

    pub(crate) fn request(text: &str) -> SpeechRequest<'_> {
        SpeechRequest {
            text,
            language_code: DEFAULT_LANGUAGE_CODE,
            voice_name: None,
        }
    }

    #[test]
    fn provider_names_round_trip_through_serde() {
        for provider in [TtsProvider::Google, TtsProvider::OpenAi, TtsProvider::ElevenLabs] {
            let encoded = serde_json::to_value(provider).unwrap();
            assert_eq!(encoded, serde_json::json!(provider.name()));
        }
        assert_eq!(TtsProvider::default(), TtsProvider::Google);
    }

    #[tokio::test]
    async fn missing_credential_names_the_variable() {
        let mut cfg = config("http://127.0.0.1:1");
        cfg.elevenlabs_api_key = None;

        let err = TtsProvider::ElevenLabs
            .synthesize(&Client::new(), &cfg, &request("hi"))
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "elevenlabs text-to-speech requires ELEVENLABS_API_KEY to be set"
        );
    }
}
