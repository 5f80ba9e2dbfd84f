//! Process wiring: build every collaborator once from the configuration.

use parley_agent::{Assistant, AssistantSettings, SessionManager};
use parley_config::AppConfig;
use parley_core::provider::CompletionClient;
use parley_core::search::{VectorStore, WebSearch};
use parley_core::store::TurnStore;
use parley_store::{
    InMemoryTurnStore, SqliteDatabase, SqlitePool, SqliteTurnStore, SqliteVectorStore, open_pool,
};
use parley_tools::{AnalyticsQaTool, DuckDuckGoSearch, ToolDeps, default_registry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

type BoxError = Box<dyn std::error::Error>;

pub fn load_config() -> Result<AppConfig, BoxError> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// The SQLite location for the configured backend. The memory backend keeps
/// everything in a private in-memory database.
fn database_url(config: &AppConfig) -> String {
    match config.store.backend.as_str() {
        "memory" => ":memory:".to_string(),
        _ => config.store.sqlite_path().to_string_lossy().into_owned(),
    }
}

/// Open the turn store and the pool documents live in.
pub async fn open_stores(
    config: &AppConfig,
) -> Result<(Arc<dyn TurnStore>, SqlitePool), BoxError> {
    let pool = open_pool(&database_url(config)).await?;
    let turns: Arc<dyn TurnStore> = match config.store.backend.as_str() {
        "memory" => Arc::new(InMemoryTurnStore::new()),
        _ => Arc::new(SqliteTurnStore::from_pool(pool.clone()).await?),
    };
    debug!(backend = turns.name(), "Turn store ready");
    Ok((turns, pool))
}

pub async fn open_documents(
    config: &AppConfig,
    pool: SqlitePool,
    client: Arc<dyn CompletionClient>,
) -> Result<Arc<dyn VectorStore>, BoxError> {
    let store = SqliteVectorStore::new(
        pool,
        client,
        config.retrieval.embedding_model.clone(),
        config.retrieval.collection.clone(),
    )
    .await?;
    Ok(Arc::new(store))
}

pub fn build_client(config: &AppConfig) -> Result<Arc<dyn CompletionClient>, BoxError> {
    let client = parley_providers::build_from_config(config).map_err(|e| {
        format!(
            "{e}\n  Config file: {}",
            AppConfig::config_dir().join("config.toml").display()
        )
    })?;
    Ok(client)
}

/// Build the assistant with every collaborator the configuration enables.
pub async fn build_assistant(config: &AppConfig) -> Result<Assistant, BoxError> {
    let client = build_client(config)?;
    let (turns, pool) = open_stores(config).await?;
    let documents = open_documents(config, pool, client.clone()).await?;

    let web_search: Option<Arc<dyn WebSearch>> = config.web_search.enabled.then(|| {
        Arc::new(DuckDuckGoSearch::new(
            config.web_search.endpoint.clone(),
            Duration::from_secs(config.web_search.timeout_secs),
        )) as Arc<dyn WebSearch>
    });

    let analytics = match &config.analytics.database {
        Some(path) => {
            let database = SqliteDatabase::open(path)
                .await?
                .with_tables(config.analytics.tables.clone())
                .with_sample_rows(config.analytics.sample_rows);
            Some(AnalyticsQaTool::new(
                client.clone(),
                Arc::new(database),
                config.model.clone(),
                config.analytics.limit,
            ))
        }
        None => None,
    };

    let tools = default_registry(ToolDeps {
        web_search,
        documents: Some(documents.clone()),
        top_k: config.retrieval.top_k,
        analytics: analytics.clone(),
    });
    info!(tools = ?tools.names(), model = %config.model, "Assistant ready");

    let mut assistant = Assistant::new(
        client,
        Arc::new(tools),
        SessionManager::new(turns),
        AssistantSettings::from_config(config),
    )
    .with_documents(documents);
    if let Some(analytics) = analytics {
        assistant = assistant.with_analytics(analytics);
    }
    Ok(assistant)
}
