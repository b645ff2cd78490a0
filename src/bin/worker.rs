use std::sync::Arc;

use anyhow::Result;
use stashit::{
    config::Config,
    jobs::{
        AiSynopsisJobHandler, GenerateTagsJobHandler, JobRegistry, ScrapeItemJobHandler,
        WorkerConfig, WorkerSupervisor,
    },
    llm::OpenAiGenerator,
    scraper::HttpScraper,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(config.database_url())
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let generator = Arc::new(OpenAiGenerator::new(
        config.openai_api_key(),
        config.synopsis_model(),
    ));

    let mut registry = JobRegistry::new();
    registry.register(ScrapeItemJobHandler::new(Arc::new(HttpScraper::from_config(
        &config,
    ))));
    registry.register(AiSynopsisJobHandler::new(generator.clone()));
    registry.register(GenerateTagsJobHandler::new(generator));

    let supervisor = WorkerSupervisor::new(pool, registry, WorkerConfig::from_config(&config));
    supervisor.run().await
}
