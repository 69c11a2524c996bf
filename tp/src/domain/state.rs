//! TripState - the record threaded through every workflow stage
//!
//! Field ownership is enforced through the API: the request is read-only
//! after construction, pools can only be replaced wholesale, and the
//! selection can only change together with its cost ledger.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Candidate, CandidatePools, Category, Itinerary, Money, TripRequest};
use crate::error::PlanningError;

/// Default cap on budget adjustment cycles
pub const DEFAULT_MAX_ITERATIONS: u32 = 2;

/// The chosen subset of candidates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub transport: Option<Candidate>,
    pub accommodation: Option<Candidate>,
    pub activities: Vec<Candidate>,
    pub dining: Vec<Candidate>,
}

impl Selection {
    pub fn items(&self) -> impl Iterator<Item = &Candidate> {
        self.transport
            .iter()
            .chain(self.accommodation.iter())
            .chain(self.activities.iter())
            .chain(self.dining.iter())
    }

    pub fn total(&self) -> Money {
        self.items().map(|c| c.price).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items().next().is_none()
    }

    /// Chosen ids per category, in order (used to compare runs)
    pub fn ids(&self) -> Vec<String> {
        self.items().map(|c| c.id.clone()).collect()
    }
}

/// Cost ledger derived from a selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostLedger {
    pub total_cost: Money,
    pub remaining_budget: Money,
    pub cost_breakdown: BTreeMap<Category, Money>,
}

impl CostLedger {
    pub fn compute(selection: &Selection, total_budget: Money) -> Self {
        let mut cost_breakdown: BTreeMap<Category, Money> = Category::ALL.iter().map(|c| (*c, Money::ZERO)).collect();
        for item in selection.items() {
            *cost_breakdown.entry(item.category).or_default() += item.price;
        }
        let total_cost = selection.total();
        Self {
            total_cost,
            remaining_budget: total_budget - total_cost,
            cost_breakdown,
        }
    }

    /// Whether the total fits the budget (equality fits)
    pub fn fits(&self) -> bool {
        !self.remaining_budget.is_negative()
    }
}

/// Whether the accepted selection stays within budget
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetStatus {
    pub within_budget: bool,
    pub overage: Money,
    /// Accepted at the iteration cap despite not fitting
    pub best_effort: bool,
}

/// Per-category price ceilings handed to the fetch agents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceCeilings(BTreeMap<Category, Money>);

impl PriceCeilings {
    pub fn get(&self, category: Category) -> Option<Money> {
        self.0.get(&category).copied()
    }

    pub fn set(&mut self, category: Category, ceiling: Money) {
        self.0.insert(category, ceiling);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One destination-language phrase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phrase {
    pub english: String,
    pub translation: String,
    #[serde(default)]
    pub phonetic: String,
}

/// Phrases for the destination language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phrasebook {
    pub language: String,
    pub phrases: Vec<Phrase>,
}

/// Mutable record for one planning run
#[derive(Debug, Clone, Serialize)]
pub struct TripState {
    request: TripRequest,
    pools: CandidatePools,
    selection: Selection,
    ledger: CostLedger,
    adjustment_iteration: u32,
    max_iterations: u32,
    final_itinerary: Option<Itinerary>,

    /// Destination phrases (written by the phrase agent)
    pub phrases: Option<Phrasebook>,

    /// Narratives keyed by activity id (written by the story stage)
    pub stories: BTreeMap<String, String>,

    /// Ceilings for the next fetch cycle (written by the coordinator)
    pub ceilings: PriceCeilings,

    /// Set by the coordinator when the selection does not fit
    pub requires_adjustment: bool,

    pub budget_status: BudgetStatus,

    /// Number of completed fetch cycles
    pub fetch_cycles: u32,

    /// Recovered node-level failures, surfaced with the result
    pub warnings: Vec<String>,
}

impl TripState {
    pub fn new(request: TripRequest, max_iterations: u32) -> Self {
        debug!(destination = %request.destination, max_iterations, "TripState::new: called");
        let ledger = CostLedger::compute(&Selection::default(), request.total_budget);
        Self {
            request,
            pools: CandidatePools::default(),
            selection: Selection::default(),
            ledger,
            adjustment_iteration: 0,
            max_iterations,
            final_itinerary: None,
            phrases: None,
            stories: BTreeMap::new(),
            ceilings: PriceCeilings::default(),
            requires_adjustment: false,
            budget_status: BudgetStatus::default(),
            fetch_cycles: 0,
            warnings: Vec::new(),
        }
    }

    pub fn request(&self) -> &TripRequest {
        &self.request
    }

    pub fn pools(&self) -> &CandidatePools {
        &self.pools
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn ledger(&self) -> &CostLedger {
        &self.ledger
    }

    pub fn adjustment_iteration(&self) -> u32 {
        self.adjustment_iteration
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn final_itinerary(&self) -> Option<&Itinerary> {
        self.final_itinerary.as_ref()
    }

    /// Replace all candidate pools with the output of a fetch cycle
    ///
    /// The previous selection referenced the old pools, so it is cleared too.
    pub fn replace_pools(&mut self, pools: CandidatePools) {
        debug!(total = pools.total_len(), cycle = self.fetch_cycles + 1, "replace_pools: called");
        self.pools = pools;
        self.fetch_cycles += 1;
        self.apply_selection(Selection::default());
    }

    /// Install a selection and recompute the ledger in the same step
    ///
    /// Returns whether the selection fits the budget.
    pub fn apply_selection(&mut self, selection: Selection) -> bool {
        let ledger = CostLedger::compute(&selection, self.request.total_budget);
        let fits = ledger.fits();
        debug!(total = %ledger.total_cost, remaining = %ledger.remaining_budget, fits, "apply_selection: called");
        self.selection = selection;
        self.ledger = ledger;
        self.budget_status = BudgetStatus {
            within_budget: fits,
            overage: self.ledger.total_cost.saturating_sub(self.request.total_budget),
            best_effort: false,
        };
        fits
    }

    /// Whether another adjustment cycle is allowed
    pub fn can_adjust(&self) -> bool {
        self.adjustment_iteration < self.max_iterations
    }

    /// Advance the adjustment counter, refusing to pass the cap
    pub fn begin_adjustment(&mut self) -> Result<u32, PlanningError> {
        if !self.can_adjust() {
            return Err(PlanningError::Internal(format!(
                "adjustment {} would exceed cap {}",
                self.adjustment_iteration + 1,
                self.max_iterations
            )));
        }
        self.adjustment_iteration += 1;
        debug!(iteration = self.adjustment_iteration, "begin_adjustment: advanced");
        Ok(self.adjustment_iteration)
    }

    /// Mark the current selection as accepted despite not fitting
    pub fn accept_best_effort(&mut self) {
        debug!(overage = %self.budget_status.overage, "accept_best_effort: called");
        self.budget_status.best_effort = !self.budget_status.within_budget;
    }

    /// Store the finished itinerary; it can only be set once
    pub fn set_final_itinerary(&mut self, itinerary: Itinerary) -> Result<(), PlanningError> {
        if self.final_itinerary.is_some() {
            return Err(PlanningError::Internal("final itinerary already set".to_string()));
        }
        if self.requires_adjustment && self.can_adjust() {
            return Err(PlanningError::Internal(
                "itinerary composed while a budget adjustment is still pending".to_string(),
            ));
        }
        self.final_itinerary = Some(itinerary);
        Ok(())
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::request::fixtures::paris_request;

    fn candidate(id: &str, category: Category, price: f64) -> Candidate {
        Candidate::new(id, category, id, Money::from_major(price))
    }

    fn sample_selection() -> Selection {
        Selection {
            transport: Some(candidate("f1", Category::Transport, 800.0)),
            accommodation: Some(candidate("h1", Category::Accommodation, 800.0)),
            activities: vec![candidate("a1", Category::Activity, 20.0), candidate("a2", Category::Activity, 25.5)],
            dining: vec![candidate("d1", Category::Dining, 30.0)],
        }
    }

    #[test]
    fn test_ledger_breakdown_and_total() {
        let ledger = CostLedger::compute(&sample_selection(), Money::from_major(3000.0));
        assert_eq!(ledger.total_cost, Money::from_major(1675.5));
        assert_eq!(ledger.remaining_budget, Money::from_major(1324.5));
        assert_eq!(ledger.cost_breakdown[&Category::Activity], Money::from_major(45.5));
        assert_eq!(ledger.cost_breakdown.len(), 4);
        assert!(ledger.fits());
    }

    #[test]
    fn test_equality_fits() {
        let ledger = CostLedger::compute(&sample_selection(), Money::from_major(1675.5));
        assert_eq!(ledger.remaining_budget, Money::ZERO);
        assert!(ledger.fits());

        let ledger = CostLedger::compute(&sample_selection(), Money::from_cents(167549));
        assert!(!ledger.fits());
    }

    #[test]
    fn test_apply_selection_updates_status() {
        let mut state = TripState::new(paris_request(1000.0, 5), 2);
        let fits = state.apply_selection(sample_selection());
        assert!(!fits);
        assert!(!state.budget_status.within_budget);
        assert_eq!(state.budget_status.overage, Money::from_major(675.5));
        assert_eq!(state.ledger().total_cost, state.selection().total());
    }

    #[test]
    fn test_replace_pools_clears_selection() {
        let mut state = TripState::new(paris_request(3000.0, 5), 2);
        state.apply_selection(sample_selection());
        let mut pools = CandidatePools::default();
        pools.dining.push(candidate("d9", Category::Dining, 12.0));
        state.replace_pools(pools);
        assert!(state.selection().is_empty());
        assert_eq!(state.ledger().total_cost, Money::ZERO);
        assert_eq!(state.pools().dining.len(), 1);
        assert_eq!(state.fetch_cycles, 1);
    }

    #[test]
    fn test_adjustment_counter_is_capped() {
        let mut state = TripState::new(paris_request(3000.0, 5), 2);
        assert_eq!(state.begin_adjustment().unwrap(), 1);
        assert_eq!(state.begin_adjustment().unwrap(), 2);
        assert!(state.begin_adjustment().is_err());
        assert_eq!(state.adjustment_iteration(), 2);
    }

    #[test]
    fn test_final_itinerary_is_terminal() {
        let mut state = TripState::new(paris_request(3000.0, 5), 0);
        let itinerary = Itinerary {
            days: vec![],
            tips: vec![],
        };
        state.set_final_itinerary(itinerary.clone()).unwrap();
        assert!(state.set_final_itinerary(itinerary).is_err());
    }

    #[test]
    fn test_final_itinerary_refused_while_adjustment_pending() {
        let mut state = TripState::new(paris_request(3000.0, 5), 2);
        state.requires_adjustment = true;
        let itinerary = Itinerary {
            days: vec![],
            tips: vec![],
        };
        assert!(state.set_final_itinerary(itinerary).is_err());
    }

    #[test]
    fn test_best_effort_only_when_over_budget() {
        let mut state = TripState::new(paris_request(3000.0, 5), 2);
        state.apply_selection(sample_selection());
        state.accept_best_effort();
        assert!(!state.budget_status.best_effort);

        let mut state = TripState::new(paris_request(100.0, 5), 2);
        state.apply_selection(sample_selection());
        state.accept_best_effort();
        assert!(state.budget_status.best_effort);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn priced(category: Category) -> impl Strategy<Value = Candidate> {
            (0i64..500_000).prop_map(move |cents| Candidate::new("c", category, "c", Money::from_cents(cents)))
        }

        proptest! {
            #[test]
            fn ledger_total_equals_sum_of_chosen_prices(
                transport in proptest::option::of(priced(Category::Transport)),
                accommodation in proptest::option::of(priced(Category::Accommodation)),
                activities in proptest::collection::vec(priced(Category::Activity), 0..20),
                dining in proptest::collection::vec(priced(Category::Dining), 0..20),
                budget in 1i64..10_000_000,
            ) {
                let expected: i64 = transport.iter().chain(accommodation.iter()).chain(activities.iter()).chain(dining.iter())
                    .map(|c| c.price.cents()).sum();
                let selection = Selection { transport, accommodation, activities, dining };
                let ledger = CostLedger::compute(&selection, Money::from_cents(budget));
                prop_assert_eq!(ledger.total_cost.cents(), expected);
                prop_assert_eq!(ledger.remaining_budget.cents(), budget - expected);
                let by_category: Money = ledger.cost_breakdown.values().sum();
                prop_assert_eq!(by_category, ledger.total_cost);
            }

            #[test]
            fn adjustment_never_passes_cap(max_iterations in 0u32..8, attempts in 0usize..20) {
                let mut state = TripState::new(paris_request(100.0, 3), max_iterations);
                for _ in 0..attempts {
                    let _ = state.begin_adjustment();
                    prop_assert!(state.adjustment_iteration() <= max_iterations);
                }
                prop_assert_eq!(state.adjustment_iteration(), max_iterations.min(attempts as u32));
            }
        }
    }
}
