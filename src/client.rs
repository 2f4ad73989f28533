use crate::config::ChatArgs;
use crate::protocol::{ChatRequest, ChatResponse, TtsRequest, TtsResponse};
use crate::tts::TtsProvider;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

type ClientResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// Conversation with a running server; remembers the session it was given.
pub struct ChatClient {
    base_url: String,
    session_id: Option<String>,
    http: HttpClient,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            session_id: None,
            http: HttpClient::new(),
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub async fn send_message(&mut self, message: String) -> ClientResult<String> {
        let request = ChatRequest {
            message,
            session_id: self.session_id.clone(),
        };
        let body: ChatResponse = self.post("chat", &request).await?;
        debug!(session_id = %body.session_id, "chat reply received");
        self.session_id = Some(body.session_id);
        Ok(body.response)
    }

    pub async fn synthesize(&self, text: String, provider: TtsProvider) -> ClientResult<Vec<u8>> {
        let request = TtsRequest {
            text,
            language_code: None,
            voice_name: None,
            provider: Some(provider),
        };
        let body: TtsResponse = self.post("tts", &request).await?;
        Ok(STANDARD.decode(body.audio)?)
    }

    async fn post<Req, Resp>(&self, route: &str, request: &Req) -> ClientResult<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let response = self
            .http
            .post(format!("{}/{}", self.base_url, route))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("/{} failed: {} - {}", route, status, body).into());
        }

        Ok(response.json().await?)
    }
}

/// Reads one message per line from stdin until EOF.
pub async fn run(args: ChatArgs) -> ClientResult<()> {
    let provider: TtsProvider = serde_json::from_value(serde_json::Value::String(args.provider))
        .map_err(|_| "provider must be one of google, openai, elevenlabs")?;
    if let Some(dir) = &args.audio_dir {
        tokio::fs::create_dir_all(dir).await?;
    }

    let mut client = ChatClient::new(&args.url);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut turn = 0usize;

    stdout.write_all(b"> ").await?;
    stdout.flush().await?;
    while let Some(line) = lines.next_line().await? {
        let message = line.trim().to_string();
        if message.is_empty() {
            stdout.write_all(b"> ").await?;
            stdout.flush().await?;
            continue;
        }

        turn += 1;
        let reply = client.send_message(message).await?;
        stdout.write_all(format!("{}\n", reply).as_bytes()).await?;

        if let Some(dir) = &args.audio_dir {
            let path = audio_path(dir, turn);
            match client.synthesize(reply, provider).await {
                Ok(audio) => {
                    tokio::fs::write(&path, audio).await?;
                    stdout
                        .write_all(format!("(audio saved to {})\n", path.display()).as_bytes())
                        .await?;
                }
                Err(e) => {
                    stdout
                        .write_all(format!("(speech unavailable: {})\n", e).as_bytes())
                        .await?;
                }
            }
        }

        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
    }

    if let Some(session_id) = client.session_id() {
        debug!(session_id, turns = turn, "chat ended");
    }
    Ok(())
}

fn audio_path(dir: &std::path::Path, turn: usize) -> PathBuf {
    dir.join(format!("reply-{}.mp3", turn))
}

fn normalize_base_url(value: &str) -> String {
    value.trim_end_matches('/').to_string()
}
