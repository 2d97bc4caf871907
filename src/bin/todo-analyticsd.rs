use clap::Parser;
use tracing_subscriber::EnvFilter;

use todo_analytics::config::Config;
use todo_analytics::daemon;
use todo_analytics::error::Result;

#[derive(Parser, Debug)]
#[command(name = "todo-analyticsd")]
#[command(about = "Todo API with AI-assisted analytics")]
struct Cli {
    /// JSON config file; flags below override its values.
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    db: Option<String>,

    /// Allowed browser origin; repeat or comma-separate for several.
    #[arg(long = "cors-origin", env = "TODO_ANALYTICS_CORS_ORIGINS", value_delimiter = ',')]
    cors_origins: Vec<String>,

    #[arg(long, env = "MISTRAL_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "MISTRAL_MODEL")]
    model: Option<String>,

    #[arg(long, env = "MISTRAL_BASE_URL")]
    ai_base_url: Option<String>,

    #[arg(long)]
    ai_timeout_seconds: Option<u64>,
}

impl Cli {
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(db) = self.db {
            config.database.sqlite_path = db;
        }
        if !self.cors_origins.is_empty() {
            config.server.cors_origins = self.cors_origins;
        }
        if let Some(api_key) = self.api_key {
            config.ai.api_key = Some(api_key);
        }
        if let Some(model) = self.model {
            config.ai.model = model;
        }
        if let Some(base_url) = self.ai_base_url {
            config.ai.base_url = base_url;
        }
        if let Some(timeout) = self.ai_timeout_seconds {
            config.ai.timeout_seconds = timeout;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,todo_analytics=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Cli::parse().into_config()?;
    daemon::run(config).await
}
