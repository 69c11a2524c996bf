//! BudgetCoordinator - choose a budget-feasible combination
//!
//! The model proposes ids; everything after that is deterministic. Ids are
//! resolved against the current pools, counts are capped by trip length and
//! pace, and the cost ledger is computed here rather than trusted from the
//! model. When the selection does not fit, the coordinator either asks for
//! another fetch cycle with tighter price ceilings or, at the iteration cap,
//! settles for the cheapest combination it can build.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::decision::{DecisionPrompt, DecisionSchema, Decider, FieldKind, decide_with_retry};
use crate::domain::{
    Candidate, CandidatePools, Category, CostLedger, Money, PriceCeilings, Selection, TripRequest, TripState,
    price_order,
};
use crate::error::PlanningError;
use crate::prompts::{CandidateLine, PromptLoader, TripContext, lines};

/// What the coordinator decided for this cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorDecision {
    pub selection: Selection,
    pub fits: bool,

    /// Ceilings for another fetch cycle; set only when an adjustment is requested
    pub ceilings: Option<PriceCeilings>,

    /// Accepted over budget because no adjustments remain
    pub best_effort: bool,

    /// Ids the model named that were not in the pools
    pub unknown_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ModelSelection {
    #[serde(default)]
    transport_id: Option<String>,
    #[serde(default)]
    accommodation_id: Option<String>,
    #[serde(default)]
    activity_ids: Vec<String>,
    #[serde(default)]
    dining_ids: Vec<String>,
}

#[derive(Serialize)]
struct CoordinateContext {
    trip: TripContext,
    activity_cap: usize,
    dining_cap: usize,
    iteration: u32,
    max_iterations: u32,
    adjusting: bool,
    previous_total: Option<String>,
    transport: Vec<CandidateLine>,
    accommodation: Vec<CandidateLine>,
    activities: Vec<CandidateLine>,
    dining: Vec<CandidateLine>,
}

fn selection_schema() -> DecisionSchema {
    DecisionSchema::new(
        "selection",
        json!({
            "transport_id": "flight_1",
            "accommodation_id": "hotel_1",
            "activity_ids": ["activity_1", "activity_2"],
            "dining_ids": ["dining_1", "dining_2"],
            "reasoning": "why this combination"
        }),
    )
    .require("activity_ids", FieldKind::Array)
    .require("dining_ids", FieldKind::Array)
}

/// Cheapest selection the pools allow: cheapest transport and lodging, and
/// the cheapest activity and dining options (one per day, within the caps)
pub fn floor_selection(pools: &CandidatePools, request: &TripRequest) -> Selection {
    let days = request.duration_days() as usize;
    let cheapest = |category: Category, n: usize| {
        let mut list = pools.get(category).to_vec();
        list.sort_by(price_order);
        list.truncate(n);
        list
    };
    Selection {
        transport: cheapest(Category::Transport, 1).into_iter().next(),
        accommodation: cheapest(Category::Accommodation, 1).into_iter().next(),
        activities: cheapest(Category::Activity, days.min(request.activity_cap())),
        dining: cheapest(Category::Dining, days.min(request.dining_cap())),
    }
}

/// Lower each category's ceiling below what was chosen this cycle
///
/// The new ceiling is the most expensive chosen item scaled by
/// `budget / total`, clamped to `[min_shrink, max_shrink]`. Existing
/// ceilings only ever go down.
pub fn tighten_ceilings(
    selection: &Selection,
    total_budget: Money,
    current: &PriceCeilings,
    min_shrink: f64,
    max_shrink: f64,
) -> PriceCeilings {
    let total = selection.total();
    let shrink = if total > Money::ZERO {
        (total_budget.as_major() / total.as_major()).clamp(min_shrink, max_shrink)
    } else {
        max_shrink
    };
    debug!(%total, shrink, "tighten_ceilings: called");

    let mut ceilings = current.clone();
    for category in Category::ALL {
        let Some(max_price) = selection.items().filter(|c| c.category == category).map(|c| c.price).max() else {
            continue;
        };
        let proposed = max_price.scale(shrink);
        let ceiling = current.get(category).map_or(proposed, |existing| existing.min(proposed));
        ceilings.set(category, ceiling);
    }
    ceilings
}

pub struct BudgetCoordinator {
    decider: Arc<dyn Decider>,
    prompts: Arc<PromptLoader>,
    temperature: f32,
    min_shrink: f64,
    max_shrink: f64,
}

impl BudgetCoordinator {
    pub fn new(
        decider: Arc<dyn Decider>,
        prompts: Arc<PromptLoader>,
        temperature: f32,
        min_shrink: f64,
        max_shrink: f64,
    ) -> Self {
        Self {
            decider,
            prompts,
            temperature,
            min_shrink,
            max_shrink,
        }
    }

    fn prompt(&self, state: &TripState, previous_total: Option<Money>) -> Result<DecisionPrompt, PlanningError> {
        let request = state.request();
        let pools = state.pools();
        let ctx = CoordinateContext {
            trip: TripContext::from(request),
            activity_cap: request.activity_cap(),
            dining_cap: request.dining_cap(),
            iteration: state.adjustment_iteration(),
            max_iterations: state.max_iterations(),
            adjusting: previous_total.is_some(),
            previous_total: previous_total.map(|m| m.to_string()),
            transport: lines(&pools.transport),
            accommodation: lines(&pools.accommodation),
            activities: lines(&pools.activities),
            dining: lines(&pools.dining),
        };
        let rendered = self
            .prompts
            .render_pair("coordinate", &ctx)
            .map_err(|e| PlanningError::Internal(e.to_string()))?;
        Ok(DecisionPrompt::new(rendered.system, rendered.user, self.temperature))
    }

    /// Map model ids onto pool candidates
    ///
    /// Unknown and repeated ids are dropped. A missing transport or
    /// accommodation pick falls back to the top-ranked pool entry.
    fn resolve(&self, picks: ModelSelection, pools: &CandidatePools, request: &TripRequest) -> (Selection, Vec<String>) {
        let mut unknown = Vec::new();
        let mut single = |category: Category, id: Option<String>| -> Option<Candidate> {
            let pool = pools.get(category);
            match id.filter(|id| !id.trim().is_empty()) {
                Some(id) => match pools.find(category, &id) {
                    Some(found) => Some(found.clone()),
                    None => {
                        unknown.push(id);
                        pool.first().cloned()
                    }
                },
                None => pool.first().cloned(),
            }
        };
        let transport = single(Category::Transport, picks.transport_id);
        let accommodation = single(Category::Accommodation, picks.accommodation_id);

        let mut many = |category: Category, ids: Vec<String>, cap: usize| -> Vec<Candidate> {
            let mut seen = HashSet::new();
            let mut chosen = Vec::new();
            for id in ids {
                if chosen.len() >= cap {
                    break;
                }
                match pools.find(category, &id) {
                    Some(found) if seen.insert(id.clone()) => chosen.push(found.clone()),
                    Some(_) => {}
                    None => unknown.push(id),
                }
            }
            chosen
        };
        let activities = many(Category::Activity, picks.activity_ids, request.activity_cap());
        let dining = many(Category::Dining, picks.dining_ids, request.dining_cap());

        (
            Selection {
                transport,
                accommodation,
                activities,
                dining,
            },
            unknown,
        )
    }

    /// Select over the current pools
    ///
    /// `previous_total` is the over-budget total of the last cycle, if any.
    pub async fn coordinate(
        &self,
        state: &TripState,
        previous_total: Option<Money>,
    ) -> Result<CoordinatorDecision, PlanningError> {
        let request = state.request();
        debug!(
            iteration = state.adjustment_iteration(),
            candidates = state.pools().total_len(),
            "BudgetCoordinator::coordinate: called"
        );

        let prompt = self.prompt(state, previous_total)?;
        let picks: ModelSelection = decide_with_retry(self.decider.as_ref(), &prompt, &selection_schema())
            .await
            .map_err(|e| PlanningError::service_unavailable("coordinating", e))?;
        let (selection, unknown_ids) = self.resolve(picks, state.pools(), request);
        if !unknown_ids.is_empty() {
            warn!(?unknown_ids, "BudgetCoordinator::coordinate: model named unknown ids");
        }

        let ledger = CostLedger::compute(&selection, request.total_budget);
        if ledger.fits() {
            info!(total = %ledger.total_cost, "selection fits budget");
            return Ok(CoordinatorDecision {
                selection,
                fits: true,
                ceilings: None,
                best_effort: false,
                unknown_ids,
            });
        }

        if state.can_adjust() {
            let ceilings = tighten_ceilings(
                &selection,
                request.total_budget,
                &state.ceilings,
                self.min_shrink,
                self.max_shrink,
            );
            info!(total = %ledger.total_cost, budget = %request.total_budget, "selection over budget, requesting adjustment");
            return Ok(CoordinatorDecision {
                selection,
                fits: false,
                ceilings: Some(ceilings),
                best_effort: false,
                unknown_ids,
            });
        }

        let floor = floor_selection(state.pools(), request);
        let selection = if floor.total() < selection.total() { floor } else { selection };
        let fits = CostLedger::compute(&selection, request.total_budget).fits();
        info!(total = %selection.total(), fits, "adjustments exhausted, accepting cheapest selection");
        Ok(CoordinatorDecision {
            selection,
            fits,
            ceilings: None,
            best_effort: !fits,
            unknown_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::DecisionError;
    use crate::decision::mock::ScriptedDecider;
    use crate::domain::request::fixtures::paris_request;
    use proptest::prelude::*;

    fn cand(id: &str, category: Category, price: f64) -> Candidate {
        Candidate::new(id, category, id, Money::from_major(price)).with_rating(4.0)
    }

    fn paris_pools() -> CandidatePools {
        CandidatePools {
            transport: vec![cand("f1", Category::Transport, 800.0), cand("f2", Category::Transport, 600.0)],
            accommodation: vec![cand("h1", Category::Accommodation, 800.0)],
            activities: (0..10).map(|i| cand(&format!("a{}", i), Category::Activity, 20.0)).collect(),
            dining: (0..10).map(|i| cand(&format!("d{}", i), Category::Dining, 30.0)).collect(),
        }
    }

    fn state(budget: f64, max_iterations: u32) -> TripState {
        let mut state = TripState::new(paris_request(budget, 5), max_iterations);
        state.replace_pools(paris_pools());
        state
    }

    fn coordinator(decider: ScriptedDecider) -> BudgetCoordinator {
        BudgetCoordinator::new(Arc::new(decider), Arc::new(PromptLoader::embedded_only()), 0.3, 0.5, 0.9)
    }

    fn pick_all() -> serde_json::Value {
        json!({
            "transport_id": "f1",
            "accommodation_id": "h1",
            "activity_ids": ["a0", "a1", "a2", "a3", "a4", "a5", "a6", "a7", "a8", "a9"],
            "dining_ids": ["d0", "d1", "d2", "d3", "d4", "d5", "d6", "d7", "d8", "d9"]
        })
    }

    #[tokio::test]
    async fn test_fitting_selection() {
        let c = coordinator(ScriptedDecider::new().reply("selection", Ok(pick_all())));
        let decision = c.coordinate(&state(3000.0, 2), None).await.unwrap();
        assert!(decision.fits);
        assert_eq!(decision.selection.total(), Money::from_major(2100.0));
        assert_eq!(decision.selection.activities.len(), 10);
        assert!(decision.ceilings.is_none());
    }

    #[tokio::test]
    async fn test_unknown_duplicate_and_excess_ids() {
        let mut req_state = TripState::new(
            {
                let mut r = paris_request(3000.0, 5);
                r.pace = crate::domain::Pace::Chill;
                r
            },
            2,
        );
        req_state.replace_pools(paris_pools());
        let c = coordinator(ScriptedDecider::new().reply(
            "selection",
            Ok(json!({
                "transport_id": "nope",
                "activity_ids": ["a0", "a0", "ghost", "a1", "a2", "a3", "a4", "a5", "a6"],
                "dining_ids": []
            })),
        ));
        let decision = c.coordinate(&req_state, None).await.unwrap();
        assert_eq!(decision.selection.transport.as_ref().unwrap().id, "f1");
        assert_eq!(decision.selection.accommodation.as_ref().unwrap().id, "h1");
        assert_eq!(decision.selection.activities.len(), 5);
        assert!(decision.unknown_ids.contains(&"ghost".to_string()));
        assert!(decision.unknown_ids.contains(&"nope".to_string()));
    }

    #[tokio::test]
    async fn test_over_budget_requests_adjustment() {
        let c = coordinator(ScriptedDecider::new().reply("selection", Ok(pick_all())));
        let decision = c.coordinate(&state(1500.0, 2), None).await.unwrap();
        assert!(!decision.fits);
        let ceilings = decision.ceilings.unwrap();
        // 1500 / 2100 = 0.714..
        assert_eq!(ceilings.get(Category::Transport), Some(Money::from_major(800.0).scale(1500.0 / 2100.0)));
        assert!(ceilings.get(Category::Dining).unwrap() < Money::from_major(30.0));
    }

    #[tokio::test]
    async fn test_cap_accepts_floor_as_best_effort() {
        let c = coordinator(ScriptedDecider::new().reply("selection", Ok(pick_all())));
        let decision = c.coordinate(&state(100.0, 0), None).await.unwrap();
        assert!(!decision.fits);
        assert!(decision.best_effort);
        assert!(decision.ceilings.is_none());
        // f2 + h1 + 5 activities + 5 meals
        assert_eq!(decision.selection.total(), Money::from_major(600.0 + 800.0 + 100.0 + 150.0));
    }

    #[tokio::test]
    async fn test_model_failure_is_fatal_after_retry() {
        let decider = ScriptedDecider::new().reply("selection", Err(DecisionError::ModelUnavailable("503".into())));
        let c = coordinator(decider);
        let err = c.coordinate(&state(3000.0, 2), None).await.unwrap_err();
        assert_eq!(err.category(), "service_unavailable");
    }

    #[tokio::test]
    async fn test_prompt_mentions_previous_total() {
        let decider = Arc::new(ScriptedDecider::new().reply("selection", Ok(pick_all())));
        let c = BudgetCoordinator::new(decider.clone(), Arc::new(PromptLoader::embedded_only()), 0.3, 0.5, 0.9);
        c.coordinate(&state(3000.0, 2), Some(Money::from_major(4200.0))).await.unwrap();
        let prompt = &decider.prompts()[0];
        assert!(prompt.contains("4200.00"));
        assert!(prompt.contains("id=f2"));
    }

    #[test]
    fn test_tighten_never_raises_existing_ceiling() {
        let selection = Selection {
            transport: Some(cand("f1", Category::Transport, 800.0)),
            ..Selection::default()
        };
        let mut current = PriceCeilings::default();
        current.set(Category::Transport, Money::from_major(100.0));
        let next = tighten_ceilings(&selection, Money::from_major(50.0), &current, 0.5, 0.9);
        assert_eq!(next.get(Category::Transport), Some(Money::from_major(100.0)));
        assert_eq!(next.get(Category::Activity), None);
    }

    proptest! {
        #[test]
        fn prop_shrink_stays_in_bounds(price in 1i64..1_000_000, budget in 1i64..1_000_000) {
            let selection = Selection {
                accommodation: Some(Candidate::new("h", Category::Accommodation, "h", Money::from_cents(price))),
                ..Selection::default()
            };
            let ceilings = tighten_ceilings(&selection, Money::from_cents(budget), &PriceCeilings::default(), 0.5, 0.9);
            let ceiling = ceilings.get(Category::Accommodation).unwrap();
            prop_assert!(ceiling >= Money::from_cents(price).scale(0.5));
            prop_assert!(ceiling <= Money::from_cents(price).scale(0.9));
        }
    }
}
