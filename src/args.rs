use clap::{Parser, ValueEnum};
use websim::config::{BackendConfig, GoogleConfig, LmStudioConfig, OpenRouterConfig, SimConfig};

#[derive(Parser, Debug)]
#[command(name = "websim")]
#[command(about = "Serves an imagined web: every URL is generated on demand")]
#[command(version)]
pub struct Args {
    /// Generation backend to use
    #[arg(value_enum)]
    pub backend: BackendArg,

    /// JSON configuration file (backend endpoints, models, persona, server)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Absolute base URL clients reach this server at, used for rewritten links
    #[arg(long)]
    pub public_url: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Google,
    Lmstudio,
    Openrouter,
}

impl Args {
    /// Merge the command line over the configuration file (if any)
    pub fn into_config(self) -> Result<SimConfig, websim::config::ConfigError> {
        let mut config = match &self.config {
            Some(path) => SimConfig::from_file(path)?,
            None => SimConfig::default(),
        };

        // The positional backend wins; file settings are kept when the kinds agree
        config.backend = select_backend(self.backend, config.backend);

        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(public_url) = self.public_url {
            config.server.public_url = Some(public_url);
        }

        Ok(config)
    }
}

fn select_backend(arg: BackendArg, from_file: BackendConfig) -> BackendConfig {
    match (arg, from_file) {
        (BackendArg::Google, cfg @ BackendConfig::Google(_)) => cfg,
        (BackendArg::Lmstudio, cfg @ BackendConfig::LmStudio(_)) => cfg,
        (BackendArg::Openrouter, cfg @ BackendConfig::OpenRouter(_)) => cfg,
        (BackendArg::Google, _) => BackendConfig::Google(GoogleConfig::default()),
        (BackendArg::Lmstudio, _) => BackendConfig::LmStudio(LmStudioConfig::default()),
        (BackendArg::Openrouter, _) => BackendConfig::OpenRouter(OpenRouterConfig::default()),
    }
}
