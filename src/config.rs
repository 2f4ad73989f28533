use crate::tools::EnabledTools;
use clap::{Args, Parser, Subcommand};
use std::time::Duration;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const SEARCH_URL: &str = "https://api.duckduckgo.com/";
pub const GOOGLE_TTS_BASE_URL: &str = "https://texttospeech.googleapis.com/v1";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io/v1";
pub const RFAM_DATABASE_URL: &str = "mysql://rfamro@mysql-rfam-public.ebi.ac.uk:4497/Rfam";

#[derive(Debug, Parser)]
#[command(name = "voicebot", version, about = "Voice assistant web backend")]
pub struct Cli {
    /// Log filter directives, e.g. "info" or "voicebot=debug,info".
    #[arg(long, global = true, env = "VOICEBOT_LOG", default_value = "info")]
    pub log_filter: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, env = "VOICEBOT_LOG_JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server.
    Serve(ServeArgs),
    /// Chat with a running server from the terminal.
    Chat(ChatArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long, env = "VOICEBOT_LISTEN", default_value = "127.0.0.1:8000")]
    pub listen: String,

    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: Option<String>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "ELEVENLABS_API_KEY", hide_env_values = true)]
    pub elevenlabs_api_key: Option<String>,

    #[arg(long, env = "VOICEBOT_MODEL", default_value = "gemini-2.0-flash")]
    pub model: String,

    #[arg(long, env = "VOICEBOT_DATABASE_URL", default_value = RFAM_DATABASE_URL)]
    pub database_url: String,

    /// Do not offer the SQL lookup tool to the model.
    #[arg(long)]
    pub no_database_tool: bool,

    /// Do not offer the web search tool to the model.
    #[arg(long)]
    pub no_search_tool: bool,

    /// Upper bound on one chat invocation, in seconds.
    #[arg(long, env = "VOICEBOT_AGENT_TIMEOUT_SECS", default_value_t = 60)]
    pub agent_timeout_secs: u64,
}

#[derive(Debug, Args)]
pub struct ChatArgs {
    #[arg(long, env = "VOICEBOT_URL", default_value = "http://127.0.0.1:8000")]
    pub url: String,

    /// Also synthesize each reply and write it as an mp3 into this directory.
    #[arg(long)]
    pub audio_dir: Option<std::path::PathBuf>,

    /// Speech provider used with --audio-dir.
    #[arg(long, default_value = "google")]
    pub provider: String,
}

/// Settings shared by every request the server handles.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub agent: AgentConfig,
    pub tts: TtsConfig,
    pub agent_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub search_url: String,
    pub database_url: String,
    pub tools: EnabledTools,
}

#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub google_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub elevenlabs_api_key: Option<String>,
    pub google_base_url: String,
    pub openai_base_url: String,
    pub elevenlabs_base_url: String,
}

impl From<ServeArgs> for Config {
    fn from(args: ServeArgs) -> Self {
        let google_api_key = args.google_api_key.filter(|key| !key.trim().is_empty());
        Self {
            listen: args.listen,
            agent: AgentConfig {
                api_key: google_api_key.clone(),
                model: args.model,
                base_url: GEMINI_BASE_URL.to_string(),
                search_url: SEARCH_URL.to_string(),
                database_url: args.database_url,
                tools: EnabledTools {
                    search: !args.no_search_tool,
                    database: !args.no_database_tool,
                },
            },
            tts: TtsConfig {
                google_api_key,
                openai_api_key: args.openai_api_key.filter(|key| !key.trim().is_empty()),
                elevenlabs_api_key: args.elevenlabs_api_key.filter(|key| !key.trim().is_empty()),
                google_base_url: GOOGLE_TTS_BASE_URL.to_string(),
                openai_base_url: OPENAI_BASE_URL.to_string(),
                elevenlabs_base_url: ELEVENLABS_BASE_URL.to_string(),
            },
            agent_timeout: Duration::from_secs(args.agent_timeout_secs),
        }
    }
}
