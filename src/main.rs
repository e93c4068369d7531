use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use websim::prompt::{PERSONA_VERSION, PromptBuilder};
use websim::server::{self, AppState};
use websim::{PageStore, Pipeline, backends};

mod args;
use args::Args;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load .env before anything reads the environment
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to load .env file: {}", e);
        }
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = args.into_config()?;

    // Missing credentials stop startup here, not on the first request
    config.resolve_credentials()?;

    ::log::info!("Starting WebSim with the {} backend", config.backend.name());

    let backend = backends::from_config(&config.backend)?;
    let prompts = match &config.persona {
        Some(persona) => PromptBuilder::new(persona.clone()),
        None => {
            ::log::info!("Using built-in persona {}", PERSONA_VERSION);
            PromptBuilder::default()
        }
    };
    let pipeline = Arc::new(Pipeline::new(prompts, backend, Arc::new(PageStore::new())));

    let state = AppState::new(pipeline, &config.server)?;
    server::serve(&config.server, state).await?;

    Ok(())
}
