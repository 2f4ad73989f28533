mod agent;
mod ai_sdk;
mod client;
mod config;
mod error;
mod event;
mod extract;
mod protocol;
mod server;
mod session;
mod tools;
mod tts;

use clap::Parser;
use config::{Cli, Command};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_filter, cli.log_json);

    match cli.command {
        Command::Serve(args) => server::run(args.into()).await,
        Command::Chat(args) => client::run(args).await,
    }
}

fn init_tracing(filter: &str, json: bool) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
