//! Planner - request in, persisted result out

use std::sync::Arc;

use eyre::{Context, Result};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::WorkflowController;
use crate::config::Config;
use crate::decision::{Decider, LlmDecider};
use crate::domain::{TripRequest, TripResult, TripState};
use crate::error::PlanningError;
use crate::events::{EventBus, EventEmitter};
use crate::llm::{LlmClient, create_client};
use crate::prompts::PromptLoader;
use crate::sources::Sources;
use crate::store::{NarrativeCache, ResultStore, SqliteStore};

/// External collaborators the workflow talks to
#[derive(Clone)]
pub struct Services {
    pub sources: Sources,
    pub decider: Arc<dyn Decider>,
    pub llm: Arc<dyn LlmClient>,
    pub cache: Arc<dyn NarrativeCache>,
    pub results: Arc<dyn ResultStore>,
    pub prompts: Arc<PromptLoader>,
}

impl Services {
    /// Wire up the real collaborators from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        debug!("Services::from_config: called");
        let llm = create_client(&config.llm).context("Failed to create LLM client")?;
        let decider: Arc<dyn Decider> = Arc::new(LlmDecider::new(
            llm.clone(),
            config.workflow.model_timeout(),
            config.llm.max_tokens,
        ));
        let sources = Sources::from_config(&config.sources)?;
        let store = Arc::new(
            SqliteStore::open(&config.storage.db_path)
                .context(format!("Failed to open store at {}", config.storage.db_path.display()))?,
        );
        let prompts = Arc::new(PromptLoader::new(config.prompts.expanded_dir()));
        Ok(Self {
            sources,
            decider,
            llm,
            cache: store.clone(),
            results: store,
            prompts,
        })
    }
}

pub struct Planner {
    controller: WorkflowController,
    results: Arc<dyn ResultStore>,
    max_iterations: u32,
    events: Option<Arc<EventBus>>,
}

impl Planner {
    pub fn new(services: Services, config: &Config) -> Self {
        let controller = WorkflowController::new(
            &services.sources,
            services.decider,
            services.llm,
            services.cache,
            services.prompts,
            &config.workflow,
            &config.llm,
        );
        Self {
            controller,
            results: services.results,
            max_iterations: config.workflow.max_iterations,
            events: None,
        }
    }

    /// Publish progress for every plan on `bus`
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    /// Plan a trip
    ///
    /// Fails only with a [`PlanningError`]; everything recoverable ends up
    /// in the result's warnings instead.
    pub async fn plan(&self, request: TripRequest) -> Result<TripResult, PlanningError> {
        let trip_id = Uuid::now_v7();
        debug!(%trip_id, destination = %request.destination, "Planner::plan: called");
        let events = match &self.events {
            Some(bus) => bus.emitter_for(trip_id.to_string()),
            None => EventEmitter::detached(trip_id.to_string()),
        };

        let outcome = self.plan_with(trip_id, request, &events).await;
        match &outcome {
            Ok(result) => events.plan_completed(
                result.budget.total_cost,
                result.budget.within_budget,
                result.budget.best_effort,
            ),
            Err(e) => events.plan_failed(e.category(), &e.to_string()),
        }
        outcome
    }

    async fn plan_with(
        &self,
        trip_id: Uuid,
        request: TripRequest,
        events: &EventEmitter,
    ) -> Result<TripResult, PlanningError> {
        request.validate()?;
        events.plan_started(&request.destination, request.duration_days());
        info!(%trip_id, destination = %request.destination, days = request.duration_days(), "planning trip");

        let state = TripState::new(request, self.max_iterations);
        let state = self.controller.run(state, events).await?;
        let mut result = TripResult::from_state(trip_id, &state)?;

        if let Err(e) = self.results.save(trip_id, &result).await {
            warn!(%trip_id, error = %e, "Planner::plan: failed to persist result");
            let warning = format!("result not saved: {}", e);
            events.warning(&warning);
            result.warnings.push(warning);
        }
        info!(%trip_id, total = %result.budget.total_cost, "trip planned");
        Ok(result)
    }
}
