//! Wiring from resolved configuration to the core services.

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::{info, warn};

use fitplan_core::PlanOrchestrator;
use fitplan_core::llm::GeminiClient;
use fitplan_core::media::{ImageGenerator, ImageSearch};
use fitplan_core::store::{MemoryPlanStore, PgPlanStore, PlanStore};
use fitplan_db::pool;

use crate::config::{FitplanConfig, StoreBackend};

pub fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!("fitplan/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")
}

fn gemini(config: &FitplanConfig, http: &Client) -> Option<GeminiClient> {
    config
        .api_key
        .as_ref()
        .map(|key| GeminiClient::new(http.clone(), key.clone()))
}

/// `None` when no API key is configured.
pub fn orchestrator(config: &FitplanConfig, http: &Client) -> Option<Arc<PlanOrchestrator>> {
    let Some(client) = gemini(config, http) else {
        warn!("no Gemini API key configured; plan generation is disabled");
        return None;
    };
    Some(Arc::new(
        PlanOrchestrator::new(Arc::new(client), config.plan_model.clone())
            .with_deadline(config.generation_timeout),
    ))
}

pub fn image_generator(config: &FitplanConfig, http: &Client) -> ImageGenerator {
    ImageGenerator::new(gemini(config, http))
        .with_models(config.image_model.clone(), config.imagen_model.clone())
}

pub fn image_search(http: &Client) -> ImageSearch {
    ImageSearch::new(http.clone())
}

/// Open the configured plan store. The PostgreSQL store must already be
/// migrated (`fitplan db-init`).
pub fn plan_store(config: &FitplanConfig) -> Result<Arc<dyn PlanStore>> {
    match config.store {
        StoreBackend::Memory => {
            info!("using in-memory plan store; saved plans will not persist");
            Ok(Arc::new(MemoryPlanStore::new()))
        }
        StoreBackend::Postgres => {
            let db_pool = pool::create_lazy_pool(&config.db_config)?;
            Ok(Arc::new(PgPlanStore::new(db_pool)))
        }
    }
}
