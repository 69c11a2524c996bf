//! TripResult - the payload returned to the caller and persisted

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::{Candidate, Category, DayPlan, Money, Phrase, TripState};
use crate::error::PlanningError;

/// Etiquette advice that applies almost anywhere
const ETIQUETTE_TIPS: &[&str] = &[
    "Learn a few basic phrases in the local language",
    "Respect local customs and dress codes at religious sites",
    "Ask before photographing people",
];

const GENERAL_ADVICE: &[&str] = &[
    "Keep digital and paper copies of your travel documents",
    "Carry a small amount of local currency for markets and tips",
    "Check opening days for museums and attractions before you go",
];

/// Language, phrases and advice for the destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Essentials {
    pub language: String,
    pub phrases: Vec<Phrase>,
    pub etiquette_tips: Vec<String>,
    pub general_advice: Vec<String>,
    pub visa_note: String,
}

/// Practical notes on getting there and getting around
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Logistics {
    pub accommodation_area: String,
    pub arrival: String,
    pub departure: String,
    pub local_transport: Vec<String>,
}

/// Budget summary of the accepted selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetSummary {
    pub total_budget: Money,
    pub total_cost: Money,
    pub remaining_budget: Money,
    pub cost_breakdown: BTreeMap<Category, Money>,
    pub within_budget: bool,
    pub overage: Money,
    pub best_effort: bool,
    pub daily_average: Money,
}

/// A completed trip plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripResult {
    pub trip_id: Uuid,
    pub destination: String,
    pub currency: String,
    pub days: Vec<DayPlan>,
    pub transport: Option<Candidate>,
    pub accommodation: Option<Candidate>,
    pub activities: Vec<Candidate>,
    pub dining: Vec<Candidate>,
    pub budget: BudgetSummary,
    pub essentials: Essentials,
    pub logistics: Logistics,
    pub adjustment_iterations: u32,

    #[serde(default)]
    pub warnings: Vec<String>,
}

impl TripResult {
    /// Assemble the result from a finished state
    pub fn from_state(trip_id: Uuid, state: &TripState) -> Result<Self, PlanningError> {
        debug!(%trip_id, "TripResult::from_state: called");
        let itinerary = state
            .final_itinerary()
            .ok_or_else(|| PlanningError::Internal("result requested before the itinerary was composed".to_string()))?;
        let request = state.request();
        let ledger = state.ledger();
        let selection = state.selection();
        let days = request.duration_days().max(1);

        let budget = BudgetSummary {
            total_budget: request.total_budget,
            total_cost: ledger.total_cost,
            remaining_budget: ledger.remaining_budget,
            cost_breakdown: ledger.cost_breakdown.clone(),
            within_budget: state.budget_status.within_budget,
            overage: state.budget_status.overage,
            best_effort: state.budget_status.best_effort,
            daily_average: Money::from_cents(ledger.total_cost.cents() / i64::from(days)),
        };

        let (language, phrases) = match &state.phrases {
            Some(book) => (book.language.clone(), book.phrases.clone()),
            None => ("Unknown".to_string(), Vec::new()),
        };
        let mut general_advice: Vec<String> = GENERAL_ADVICE.iter().map(|s| s.to_string()).collect();
        general_advice.extend(itinerary.tips.iter().cloned());

        let essentials = Essentials {
            language,
            phrases,
            etiquette_tips: ETIQUETTE_TIPS.iter().map(|s| s.to_string()).collect(),
            general_advice,
            visa_note: format!(
                "Check entry and visa requirements for {} well before departure",
                request.country()
            ),
        };

        let accommodation_area = selection
            .accommodation
            .as_ref()
            .and_then(|a| a.location.clone())
            .unwrap_or_else(|| request.destination.clone());
        let transport_name = selection.transport.as_ref().map(|t| t.name.as_str());
        let arrival = match (transport_name, request.origin.as_deref()) {
            (Some(name), Some(origin)) => format!("Arrive on {} from {} via {}", request.start_date, origin, name),
            (Some(name), None) => format!("Arrive on {} via {}", request.start_date, name),
            (None, _) => format!("Arrive on {}; transport not booked", request.start_date),
        };
        let departure = match transport_name {
            Some(name) => format!("Depart on {} via {}", request.end_date, name),
            None => format!("Depart on {}; transport not booked", request.end_date),
        };
        let logistics = Logistics {
            accommodation_area,
            arrival,
            departure,
            local_transport: vec![
                "Use public transport day passes where available".to_string(),
                "Group nearby activities to reduce transit time".to_string(),
            ],
        };

        Ok(Self {
            trip_id,
            destination: request.destination.clone(),
            currency: request.currency.clone(),
            days: itinerary.days.clone(),
            transport: selection.transport.clone(),
            accommodation: selection.accommodation.clone(),
            activities: selection.activities.clone(),
            dining: selection.dining.clone(),
            budget,
            essentials,
            logistics,
            adjustment_iterations: state.adjustment_iteration(),
            warnings: state.warnings.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::request::fixtures::paris_request;
    use crate::domain::{Itinerary, Selection};

    #[test]
    fn test_from_state_requires_itinerary() {
        let state = TripState::new(paris_request(3000.0, 5), 2);
        assert!(TripResult::from_state(Uuid::now_v7(), &state).is_err());
    }

    #[test]
    fn test_from_state_builds_summary() {
        let mut state = TripState::new(paris_request(3000.0, 5), 2);
        let hotel = Candidate::new("h1", Category::Accommodation, "Hotel Lumiere", Money::from_major(800.0))
            .with_location("Le Marais");
        state.apply_selection(Selection {
            transport: Some(Candidate::new("f1", Category::Transport, "Air Test", Money::from_major(800.0))),
            accommodation: Some(hotel),
            activities: vec![],
            dining: vec![],
        });
        state
            .set_final_itinerary(Itinerary {
                days: vec![],
                tips: vec!["Carry water".to_string()],
            })
            .unwrap();

        let result = TripResult::from_state(Uuid::now_v7(), &state).unwrap();
        assert_eq!(result.budget.total_cost, Money::from_major(1600.0));
        assert_eq!(result.budget.daily_average, Money::from_major(320.0));
        assert!(result.budget.within_budget);
        assert_eq!(result.logistics.accommodation_area, "Le Marais");
        assert!(result.logistics.arrival.contains("New York, USA"));
        assert!(result.essentials.general_advice.contains(&"Carry water".to_string()));
        assert!(result.essentials.visa_note.contains("France"));
        assert_eq!(result.essentials.language, "Unknown");
    }
}
