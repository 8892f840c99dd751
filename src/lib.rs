pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use application::{agent, app, stdio, tooling};
pub use cli::Cli;
pub use config::Settings;
pub use domain::types;
pub use infrastructure::{model, telemetry};

use application::app::McpAgentApp;
use application::stdio::ChatOptions;
use application::tooling::HttpConnector;
use infrastructure::model::ServingEndpointClient;
use infrastructure::telemetry::{MlflowTraceSink, NoopTraceSink, TraceSink};
use std::error::Error;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    init_tracing(cli.quiet);
    info!("Starting databricks-mcp-agent");

    let mut settings = Settings::from_env()?;
    if let Some(system) = cli.system.clone() {
        settings.agent.system_prompt = system;
    }
    info!(
        model = %settings.model.name,
        servers = settings.servers.len(),
        tracing = settings.tracing.enabled,
        "Loaded configuration"
    );

    let model = Arc::new(ServingEndpointClient::from_settings(&settings)?);
    let connector = Arc::new(HttpConnector::new(settings.credentials.clone()));
    let sink = trace_sink(&settings);
    let mut app = McpAgentApp::new(settings, model, connector, sink);

    if let Err(err) = app.initialize().await {
        eprintln!("{}", err.user_message());
        return Err(err.into());
    }

    let options = ChatOptions {
        streaming: !cli.no_stream,
    };
    let outcome = match cli.prompt.as_deref() {
        Some(prompt) => {
            let mut stdout = tokio::io::stdout();
            stdio::answer_once(&mut app, prompt.trim(), &mut stdout, options).await
        }
        None => stdio::run(&mut app, options).await,
    };

    app.cleanup().await;
    info!("Client execution finished");
    outcome.map_err(Into::into)
}

fn trace_sink(settings: &Settings) -> Arc<dyn TraceSink> {
    if !settings.tracing.enabled {
        return Arc::new(NoopTraceSink);
    }
    match MlflowTraceSink::from_settings(settings) {
        Ok(sink) => {
            info!(url = %sink.url(), "Tracing enabled");
            Arc::new(sink)
        }
        Err(err) => {
            warn!(%err, "Tracing disabled");
            Arc::new(NoopTraceSink)
        }
    }
}

fn init_tracing(quiet: bool) {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = if quiet {
            EnvFilter::new("off")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        };
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(true)
            .with_writer(std::io::stderr)
            .init();
    });
}
