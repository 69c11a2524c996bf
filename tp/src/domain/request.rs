//! TripRequest - the validated input to one planning run

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Money;
use crate::error::PlanningError;

/// Longest trip the planner accepts
pub const MAX_TRIP_DAYS: u32 = 30;

/// Comfort level - steers price tiers during selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComfortLevel {
    Backpacker,
    #[default]
    Standard,
    Premium,
}

impl ComfortLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComfortLevel::Backpacker => "backpacker",
            ComfortLevel::Standard => "standard",
            ComfortLevel::Premium => "premium",
        }
    }
}

/// Travel pace - how many activities the itinerary may place per day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pace {
    Chill,
    #[default]
    Balanced,
    Packed,
}

impl Pace {
    pub fn activities_per_day(&self) -> usize {
        match self {
            Pace::Chill => 1,
            Pace::Balanced => 2,
            Pace::Packed => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Pace::Chill => "chill",
            Pace::Balanced => "balanced",
            Pace::Packed => "packed",
        }
    }
}

/// Meals planned per day (lunch and dinner)
pub const MEALS_PER_DAY: usize = 2;

/// Party composition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Party {
    pub adults: u32,
    pub children: u32,
}

impl Default for Party {
    fn default() -> Self {
        Self { adults: 1, children: 0 }
    }
}

impl Party {
    pub fn size(&self) -> u32 {
        self.adults + self.children
    }
}

fn default_currency() -> String {
    "EUR".to_string()
}

/// A trip planning request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TripRequest {
    pub destination: String,

    #[serde(default)]
    pub origin: Option<String>,

    pub start_date: NaiveDate,

    pub end_date: NaiveDate,

    #[serde(default)]
    pub party: Party,

    pub total_budget: Money,

    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default)]
    pub comfort_level: ComfortLevel,

    #[serde(default)]
    pub preferred_activities: Vec<String>,

    #[serde(default)]
    pub pace: Pace,

    #[serde(default)]
    pub must_see: Option<String>,
}

impl TripRequest {
    /// Check the request before any agent runs
    pub fn validate(&self) -> Result<(), PlanningError> {
        debug!(destination = %self.destination, "validate: called");
        if self.destination.trim().is_empty() {
            return Err(PlanningError::InvalidRequest("destination is required".to_string()));
        }
        if self.end_date < self.start_date {
            return Err(PlanningError::InvalidRequest(format!(
                "end date {} is before start date {}",
                self.end_date, self.start_date
            )));
        }
        if self.duration_days() > MAX_TRIP_DAYS {
            return Err(PlanningError::InvalidRequest(format!(
                "trip of {} days exceeds the {} day limit",
                self.duration_days(),
                MAX_TRIP_DAYS
            )));
        }
        if self.total_budget <= Money::ZERO {
            return Err(PlanningError::InvalidRequest("total budget must be positive".to_string()));
        }
        if self.party.size() == 0 {
            return Err(PlanningError::InvalidRequest("party must include at least one traveler".to_string()));
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(PlanningError::InvalidRequest(format!(
                "currency '{}' is not a 3-letter ISO code",
                self.currency
            )));
        }
        Ok(())
    }

    /// Trip length in days, counting both the start and end date
    pub fn duration_days(&self) -> u32 {
        let days = (self.end_date - self.start_date).num_days() + 1;
        days.max(0) as u32
    }

    /// Nights of accommodation (at least one)
    pub fn nights(&self) -> u32 {
        self.duration_days().saturating_sub(1).max(1)
    }

    /// Calendar date of a 1-based day number
    pub fn date_for_day(&self, day_number: u32) -> NaiveDate {
        self.start_date + Duration::days(i64::from(day_number.saturating_sub(1)))
    }

    /// Maximum activities the itinerary may hold
    pub fn activity_cap(&self) -> usize {
        self.duration_days() as usize * self.pace.activities_per_day()
    }

    /// Maximum dining selections the itinerary may hold
    pub fn dining_cap(&self) -> usize {
        self.duration_days() as usize * MEALS_PER_DAY
    }

    /// Country part of the destination ("Paris, France" -> "France")
    pub fn country(&self) -> &str {
        self.destination
            .rsplit(',')
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(self.destination.trim())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::paris_request;
    use super::*;

    #[test]
    fn test_duration_and_nights() {
        let req = paris_request(3000.0, 5);
        assert_eq!(req.duration_days(), 5);
        assert_eq!(req.nights(), 4);
        assert_eq!(req.date_for_day(1), req.start_date);
        assert_eq!(req.date_for_day(5), req.end_date);
    }

    #[test]
    fn test_single_day_trip_has_one_night() {
        let req = paris_request(500.0, 1);
        assert_eq!(req.duration_days(), 1);
        assert_eq!(req.nights(), 1);
    }

    #[test]
    fn test_caps_follow_pace() {
        let mut req = paris_request(3000.0, 5);
        req.pace = Pace::Chill;
        assert_eq!(req.activity_cap(), 5);
        req.pace = Pace::Packed;
        assert_eq!(req.activity_cap(), 15);
        assert_eq!(req.dining_cap(), 10);
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        let mut req = paris_request(3000.0, 5);
        assert!(req.validate().is_ok());

        req.end_date = req.start_date - Duration::days(1);
        assert!(matches!(req.validate(), Err(PlanningError::InvalidRequest(_))));

        let mut req = paris_request(0.0, 5);
        assert!(req.validate().is_err());
        req.total_budget = Money::from_major(10.0);
        req.currency = "euro".to_string();
        assert!(req.validate().is_err());

        let mut req = paris_request(3000.0, 5);
        req.destination = "  ".to_string();
        assert!(req.validate().is_err());

        let mut req = paris_request(3000.0, 5);
        req.party = Party { adults: 0, children: 0 };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_country() {
        let req = paris_request(3000.0, 5);
        assert_eq!(req.country(), "France");
        let mut req = paris_request(3000.0, 5);
        req.destination = "Tokyo".to_string();
        assert_eq!(req.country(), "Tokyo");
    }

    #[test]
    fn test_deserialize_yaml_with_defaults() {
        let yaml = r#"
destination: Lisbon, Portugal
start-date: 2025-09-01
end-date: 2025-09-03
total-budget: 1200
preferred-activities: [food, history]
pace: packed
"#;
        let req: TripRequest = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(req.currency, "EUR");
        assert_eq!(req.party.size(), 1);
        assert_eq!(req.pace, Pace::Packed);
        assert_eq!(req.comfort_level, ComfortLevel::Standard);
        assert_eq!(req.total_budget, Money::from_major(1200.0));
        assert!(req.validate().is_ok());
    }
}
