//! Domain types for TripPlanner
//!
//! Core domain types: TripRequest, Candidate, TripState, Itinerary, TripResult
//!
//! Every amount is a [`Money`] in minor units of the trip currency, so cost
//! sums are exact.

mod candidate;
mod itinerary;
mod money;
pub(crate) mod request;
mod result;
mod state;

pub use candidate::{Candidate, CandidatePools, Category, price_order, rank_order, sort_ranked};
pub use itinerary::{DayPlan, ItemKind, Itinerary, ScheduledItem, Slot};
pub use money::Money;
pub use request::{ComfortLevel, MAX_TRIP_DAYS, MEALS_PER_DAY, Pace, Party, TripRequest};
pub use result::{BudgetSummary, Essentials, Logistics, TripResult};
pub use state::{
    BudgetStatus, CostLedger, DEFAULT_MAX_ITERATIONS, Phrase, Phrasebook, PriceCeilings, Selection, TripState,
};
