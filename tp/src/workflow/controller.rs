//! WorkflowController - the planning graph
//!
//! ```text
//! Fetching ─▶ Coordinating ─┬─▶ StoryGenerating ─▶ Composing ─▶ Done
//!    ▲                      │
//!    └──── AdjustingRetry ◀─┘   (only while adjustment_iteration < max_iterations)
//! ```
//!
//! Fan-out branches each return their own output; the controller merges them
//! into the trip state only after the join, so no branch ever writes state
//! another branch reads.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::phase::{Phase, PhaseMachine};
use crate::agents::{
    BudgetCoordinator, Curator, FetchAgent, FetchOutcome, ItineraryGenerator, PhraseAgent, PhraseOutcome, StoryAgent,
};
use crate::config::{LlmConfig, WorkflowConfig};
use crate::decision::Decider;
use crate::domain::{CandidatePools, Category, Money, TripState};
use crate::error::PlanningError;
use crate::events::EventEmitter;
use crate::llm::LlmClient;
use crate::prompts::PromptLoader;
use crate::sources::Sources;
use crate::store::NarrativeCache;

/// Output of one fetch fan-out
struct FetchCycle {
    pools: CandidatePools,
    phrases: Option<PhraseOutcome>,
    warnings: Vec<String>,
}

pub struct WorkflowController {
    transport: FetchAgent,
    accommodation: FetchAgent,
    activities: FetchAgent,
    dining: FetchAgent,
    phrases: PhraseAgent,
    coordinator: BudgetCoordinator,
    stories: StoryAgent,
    itinerary: ItineraryGenerator,
}

impl WorkflowController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sources: &Sources,
        decider: Arc<dyn Decider>,
        llm: Arc<dyn LlmClient>,
        cache: Arc<dyn NarrativeCache>,
        prompts: Arc<PromptLoader>,
        workflow: &WorkflowConfig,
        llm_config: &LlmConfig,
    ) -> Self {
        debug!(?workflow, "WorkflowController::new: called");
        let coordinator_temp = llm_config.coordinator_temperature;
        let creative_temp = llm_config.creative_temperature;
        let curator = Curator::new(decider.clone(), prompts.clone(), coordinator_temp);
        let fetcher = |category: Category| {
            let agent = FetchAgent::new(
                category,
                sources.get(category).clone(),
                workflow.candidate_limit,
                workflow.fetch_timeout(),
            );
            if workflow.curation {
                agent.with_curator(curator.clone())
            } else {
                agent
            }
        };

        Self {
            transport: fetcher(Category::Transport),
            accommodation: fetcher(Category::Accommodation),
            activities: fetcher(Category::Activity),
            dining: fetcher(Category::Dining),
            phrases: PhraseAgent::new(decider.clone(), prompts.clone(), creative_temp),
            coordinator: BudgetCoordinator::new(
                decider.clone(),
                prompts.clone(),
                coordinator_temp,
                workflow.min_shrink,
                workflow.max_shrink,
            ),
            stories: StoryAgent::new(llm, prompts.clone(), cache, workflow.story_timeout(), creative_temp),
            itinerary: ItineraryGenerator::new(decider, prompts, creative_temp),
        }
    }

    /// Run the workflow to completion
    ///
    /// Returns the finished state with `final_itinerary` set, or the single
    /// fatal error that stopped the run.
    pub async fn run(&self, mut state: TripState, events: &EventEmitter) -> Result<TripState, PlanningError> {
        debug!(destination = %state.request().destination, "WorkflowController::run: called");
        let mut machine = PhaseMachine::new();
        events.phase_entered(Phase::Fetching, 0);

        match self.drive(&mut state, &mut machine, events).await {
            Ok(()) => Ok(state),
            Err(e) => {
                warn!(phase = %machine.current(), error = %e, "workflow failed");
                if machine.advance(Phase::Failed).is_ok() {
                    events.phase_entered(Phase::Failed, state.adjustment_iteration());
                }
                Err(e)
            }
        }
    }

    fn enter(
        &self,
        machine: &mut PhaseMachine,
        next: Phase,
        state: &TripState,
        events: &EventEmitter,
    ) -> Result<(), PlanningError> {
        machine.advance(next)?;
        info!(phase = %next, iteration = state.adjustment_iteration(), "entering phase");
        events.phase_entered(next, state.adjustment_iteration());
        Ok(())
    }

    async fn drive(
        &self,
        state: &mut TripState,
        machine: &mut PhaseMachine,
        events: &EventEmitter,
    ) -> Result<(), PlanningError> {
        let mut previous_total: Option<Money> = None;

        loop {
            let first_cycle = state.fetch_cycles == 0;
            let cycle = self.fetch_cycle(state, first_cycle).await;
            state.replace_pools(cycle.pools);
            for category in Category::ALL {
                events.category_fetched(category, state.pools().get(category).len(), state.fetch_cycles);
            }
            if let Some(outcome) = cycle.phrases {
                state.phrases = Some(outcome.phrasebook);
                if let Some(warning) = outcome.warning {
                    events.warning(&warning);
                    state.warn(warning);
                }
            }
            for warning in cycle.warnings {
                events.warning(&warning);
                state.warn(warning);
            }
            if state.pools().is_empty() {
                return Err(PlanningError::NoData {
                    destination: state.request().destination.clone(),
                });
            }

            self.enter(machine, Phase::Coordinating, state, events)?;
            let decision = self.coordinator.coordinate(state, previous_total).await?;
            let fits = state.apply_selection(decision.selection);
            events.selection_made(state.adjustment_iteration(), state.ledger().total_cost, fits);

            match decision.ceilings {
                Some(ceilings) => {
                    state.requires_adjustment = true;
                    previous_total = Some(state.ledger().total_cost);
                    self.enter(machine, Phase::AdjustingRetry, state, events)?;
                    state.begin_adjustment()?;
                    state.ceilings = ceilings;
                    self.enter(machine, Phase::Fetching, state, events)?;
                }
                None => {
                    state.requires_adjustment = !fits;
                    if decision.best_effort {
                        state.accept_best_effort();
                        let warning = format!(
                            "budget exceeded by {} {} after {} adjustment(s); returning the lowest-cost selection",
                            state.budget_status.overage,
                            state.request().currency,
                            state.adjustment_iteration()
                        );
                        events.warning(&warning);
                        state.warn(warning);
                    }
                    break;
                }
            }
        }

        self.enter(machine, Phase::StoryGenerating, state, events)?;
        let activities = state.selection().activities.clone();
        let destination = state.request().destination.clone();
        let outcome = self.stories.narrate_all(&activities, &destination).await;
        events.stories_ready(outcome.stories.len());
        state.stories = outcome.stories;
        for warning in outcome.warnings {
            state.warn(warning);
        }

        self.enter(machine, Phase::Composing, state, events)?;
        let itinerary = self.itinerary.compose(state).await?;
        state.set_final_itinerary(itinerary)?;
        self.enter(machine, Phase::Done, state, events)?;
        Ok(())
    }

    /// Fan out the four fetch agents (and the phrase agent on the first cycle)
    async fn fetch_cycle(&self, state: &TripState, with_phrases: bool) -> FetchCycle {
        let request = state.request();
        let ceilings = &state.ceilings;
        debug!(cycle = state.fetch_cycles + 1, with_phrases, ?ceilings, "fetch_cycle: called");

        let (transport, accommodation, activities, dining, phrases) = tokio::join!(
            self.transport.run(request, ceilings.get(Category::Transport)),
            self.accommodation.run(request, ceilings.get(Category::Accommodation)),
            self.activities.run(request, ceilings.get(Category::Activity)),
            self.dining.run(request, ceilings.get(Category::Dining)),
            async {
                if with_phrases {
                    Some(self.phrases.run(request).await)
                } else {
                    None
                }
            },
        );

        let outcomes: [&FetchOutcome; 4] = [&transport, &accommodation, &activities, &dining];
        let warnings = outcomes.iter().filter_map(|o| o.warning.clone()).collect();
        FetchCycle {
            pools: CandidatePools {
                transport: transport.candidates,
                accommodation: accommodation.candidates,
                activities: activities.candidates,
                dining: dining.candidates,
            },
            phrases,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::DecisionError;
    use crate::decision::mock::ScriptedDecider;
    use crate::domain::request::fixtures::paris_request;
    use crate::domain::{Candidate, ItemKind};
    use crate::events::{EventBus, PlanEvent};
    use crate::llm::mock::MockLlmClient;
    use crate::sources::mock::StaticSource;
    use crate::store::MemoryNarrativeCache;
    use serde_json::json;
    use std::time::Duration;

    fn cand(id: &str, category: Category, price: f64) -> Candidate {
        Candidate::new(id, category, id, Money::from_major(price)).with_rating(4.0)
    }

    fn paris_sources() -> Sources {
        Sources {
            transport: Arc::new(StaticSource::new(vec![cand("f1", Category::Transport, 800.0)])),
            accommodation: Arc::new(StaticSource::new(vec![cand("h1", Category::Accommodation, 800.0)])),
            activities: Arc::new(StaticSource::new(
                (0..10).map(|i| cand(&format!("a{}", i), Category::Activity, 20.0)).collect(),
            )),
            dining: Arc::new(StaticSource::new(
                (0..10).map(|i| cand(&format!("d{}", i), Category::Dining, 30.0)).collect(),
            )),
        }
    }

    fn scripted() -> ScriptedDecider {
        ScriptedDecider::new()
            .reply(
                "selection",
                Ok(json!({
                    "transport_id": "f1",
                    "accommodation_id": "h1",
                    "activity_ids": ["a0", "a1", "a2", "a3", "a4", "a5", "a6", "a7", "a8", "a9"],
                    "dining_ids": ["d0", "d1", "d2", "d3", "d4", "d5", "d6", "d7", "d8", "d9"]
                })),
            )
            .reply("itinerary", Ok(json!({"days": [], "tips": []})))
            .reply(
                "phrasebook",
                Ok(json!({"language": "French", "phrases": [{"english": "Hello", "translation": "Bonjour"}]})),
            )
    }

    fn controller(sources: Sources, decider: ScriptedDecider, workflow: WorkflowConfig) -> WorkflowController {
        WorkflowController::new(
            &sources,
            Arc::new(decider),
            Arc::new(MockLlmClient::always("A short story.")),
            Arc::new(MemoryNarrativeCache::new()),
            Arc::new(PromptLoader::embedded_only()),
            &workflow,
            &LlmConfig::default(),
        )
    }

    fn quick() -> WorkflowConfig {
        WorkflowConfig {
            fetch_timeout_ms: 100,
            curation: false,
            ..WorkflowConfig::default()
        }
    }

    #[tokio::test]
    async fn test_within_budget_run() {
        let c = controller(paris_sources(), scripted(), quick());
        let state = c
            .run(TripState::new(paris_request(3000.0, 5), 2), &EventEmitter::detached("t"))
            .await
            .unwrap();
        assert!(state.budget_status.within_budget);
        assert_eq!(state.adjustment_iteration(), 0);
        assert_eq!(state.fetch_cycles, 1);
        let itinerary = state.final_itinerary().unwrap();
        assert_eq!(itinerary.days.len(), 5);
        assert!(itinerary.days.iter().all(|d| !d.is_empty()));
        assert_eq!(state.stories.len(), 10);
        assert_eq!(state.phrases.as_ref().unwrap().language, "French");
    }

    #[tokio::test]
    async fn test_over_budget_hits_cap_and_accepts_best_effort() {
        let bus = EventBus::new(256);
        let mut rx = bus.subscribe();
        let c = controller(paris_sources(), scripted(), quick());
        let state = c
            .run(TripState::new(paris_request(100.0, 5), 2), &bus.emitter_for("t"))
            .await
            .unwrap();
        assert_eq!(state.adjustment_iteration(), 2);
        assert_eq!(state.fetch_cycles, 3);
        assert!(state.budget_status.best_effort);
        assert!(!state.budget_status.within_budget);
        assert!(state.final_itinerary().is_some());

        let mut retries = 0;
        while let Ok(event) = rx.try_recv() {
            if let PlanEvent::PhaseEntered {
                phase: Phase::AdjustingRetry,
                ..
            } = event
            {
                retries += 1;
            }
        }
        assert_eq!(retries, 2);
    }

    #[tokio::test]
    async fn test_all_sources_empty_is_no_data() {
        let empty = Sources::uniform(Arc::new(StaticSource::new(Vec::new())));
        let c = controller(empty, scripted(), quick());
        let err = c
            .run(TripState::new(paris_request(3000.0, 5), 2), &EventEmitter::detached("t"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlanningError::NoData { .. }));
    }

    #[tokio::test]
    async fn test_slow_activities_recovered() {
        let mut sources = paris_sources();
        sources.activities = Arc::new(StaticSource::slow(
            vec![cand("a0", Category::Activity, 20.0)],
            Duration::from_secs(5),
        ));
        let c = controller(sources, scripted(), quick());
        let state = c
            .run(TripState::new(paris_request(3000.0, 5), 2), &EventEmitter::detached("t"))
            .await
            .unwrap();
        assert!(state.selection().activities.is_empty());
        assert!(state.selection().transport.is_some());
        assert_eq!(state.selection().dining.len(), 10);
        assert!(state.warnings.iter().any(|w| w.contains("timed out")));
        let itinerary = state.final_itinerary().unwrap();
        assert_eq!(itinerary.activity_count(), 0);
        assert!(itinerary.days.iter().all(|d| d.count_kind(ItemKind::Meal) == 2));
    }

    #[tokio::test]
    async fn test_coordinator_outage_fails_run() {
        let decider = ScriptedDecider::new()
            .reply("selection", Err(DecisionError::ModelUnavailable("503".into())))
            .reply("phrasebook", Err(DecisionError::ModelUnavailable("503".into())));
        let c = controller(paris_sources(), decider, quick());
        let err = c
            .run(TripState::new(paris_request(3000.0, 5), 2), &EventEmitter::detached("t"))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "service_unavailable");
    }
}
