use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use innkeeper::config::Config;
use innkeeper::core::context::ContextBuilder;
use innkeeper::core::llm::providers::GeminiProvider;
use innkeeper::core::orchestrator::{Orchestrator, OrchestratorConfig};
use innkeeper::interfaces::web;
use innkeeper::jobs::email::HttpMailer;
use innkeeper::jobs::journal::StepJournal;
use innkeeper::jobs::{JobRunner, RetryPolicy};
use innkeeper::logging::SseMakeWriter;
use innkeeper::store::{HotelStore, InMemoryStore};
use innkeeper::tools::hotel::hotel_executor;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("innkeeper failed to start: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = Config::from_env()?.apply_flags(&args);

    let (log_tx, _) = tokio::sync::broadcast::channel::<String>(500);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(SseMakeWriter {
            sender: log_tx.clone(),
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    info!("Starting innkeeper concierge service...");

    let today = Utc::now().date_naive();
    let store: Arc<dyn HotelStore> = Arc::new(InMemoryStore::seeded(today));

    std::fs::create_dir_all(&config.data_dir)?;
    let journal = Arc::new(StepJournal::open(config.data_dir.join("journal.db"))?);
    let mailer = Arc::new(HttpMailer::new(
        config.mail_endpoint.clone(),
        config.mail_api_key.clone(),
        config.mail_from.clone(),
    ));
    let jobs = Arc::new(JobRunner::new(
        journal,
        Arc::clone(&store),
        mailer,
        RetryPolicy::default(),
    ));

    let mut tools = hotel_executor(Arc::clone(&store), Arc::clone(&jobs));
    tools.verify()?;
    info!(
        "Tool catalog verified ({} tools)",
        tools.registry().declarations().len()
    );

    let provider = Arc::new(GeminiProvider::new(
        config.gemini_api_key.clone(),
        config.model_id.clone(),
    ));
    let orchestrator = Arc::new(Orchestrator::new(
        provider,
        Arc::new(tools),
        ContextBuilder::new(Arc::clone(&store)),
        OrchestratorConfig {
            max_tool_rounds: config.max_tool_rounds,
            text_chunk_delay: config.text_chunk_delay,
            words_per_chunk: 1,
        },
    ));

    web::serve(web::ApiServerConfig {
        orchestrator,
        jobs,
        log_tx,
        api_host: config.api_host,
        api_port: config.api_port,
        api_token: config.api_token,
    })
    .await
}
