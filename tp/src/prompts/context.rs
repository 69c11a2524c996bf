//! Template contexts shared by the agents

use serde::Serialize;

use crate::domain::{Candidate, TripRequest};

/// Trip facts every prompt can reference as `{{trip.*}}`
#[derive(Debug, Clone, Serialize)]
pub struct TripContext {
    pub destination: String,
    pub origin: String,
    pub start_date: String,
    pub end_date: String,
    pub days: u32,
    pub nights: u32,
    pub party_size: u32,
    pub total_budget: String,
    pub currency: String,
    pub comfort_level: String,
    pub pace: String,
    pub activities_per_day: usize,
    pub preferences: String,
    pub must_see: Option<String>,
}

impl From<&TripRequest> for TripContext {
    fn from(request: &TripRequest) -> Self {
        let preferences = if request.preferred_activities.is_empty() {
            "none specified".to_string()
        } else {
            request.preferred_activities.join(", ")
        };
        Self {
            destination: request.destination.clone(),
            origin: request.origin.clone().unwrap_or_else(|| "N/A".to_string()),
            start_date: request.start_date.to_string(),
            end_date: request.end_date.to_string(),
            days: request.duration_days(),
            nights: request.nights(),
            party_size: request.party.size(),
            total_budget: request.total_budget.to_string(),
            currency: request.currency.clone(),
            comfort_level: request.comfort_level.as_str().to_string(),
            pace: request.pace.as_str().to_string(),
            activities_per_day: request.pace.activities_per_day(),
            preferences,
            must_see: request.must_see.clone().filter(|s| !s.trim().is_empty()),
        }
    }
}

/// One candidate rendered as a list line
#[derive(Debug, Clone, Serialize)]
pub struct CandidateLine {
    pub id: String,
    pub name: String,
    pub price: String,
    pub rating: String,
    pub tags: String,
    pub location: Option<String>,
}

impl From<&Candidate> for CandidateLine {
    fn from(candidate: &Candidate) -> Self {
        Self {
            id: candidate.id.clone(),
            name: candidate.name.clone(),
            price: candidate.price.to_string(),
            rating: format!("{:.1}", candidate.rating),
            tags: candidate.tags.join(", "),
            location: candidate.location.clone(),
        }
    }
}

pub fn lines(candidates: &[Candidate]) -> Vec<CandidateLine> {
    candidates.iter().map(CandidateLine::from).collect()
}
