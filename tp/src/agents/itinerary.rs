//! ItineraryGenerator - compose the day-by-day schedule
//!
//! The model drafts which activity goes on which day and slot. The draft is
//! then checked and completed here: unknown or repeated ids are dropped,
//! the pace cap is enforced per day, unplaced activities and meals are
//! filled in, transport and lodging land on the boundary days, and empty
//! days get a free-time block.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::decision::{DecisionPrompt, DecisionSchema, Decider, FieldKind, decide_with_retry};
use crate::domain::{
    Candidate, DayPlan, ItemKind, Itinerary, Money, ScheduledItem, Selection, Slot, TripRequest, TripState,
};
use crate::error::PlanningError;
use crate::prompts::{CandidateLine, PromptLoader, TripContext, lines};

/// Rotating per-day travel tips
const TRAVEL_TIPS: &[&str] = &[
    "Start early to beat the crowds at popular sights",
    "Carry a refillable water bottle",
    "Book timed-entry tickets in advance where you can",
    "Keep some cash for small purchases",
    "Wear comfortable walking shoes",
    "Try a local specialty at lunch",
    "Leave room in the day for unplanned discoveries",
];

const MAX_TIPS: usize = 5;
const LUNCH_TIME: &str = "12:30";
const DINNER_TIME: &str = "19:00";
const OUTBOUND_TIME: &str = "07:00";
const RETURN_TIME: &str = "21:00";
const CHECK_IN_TIME: &str = "15:00";
const CHECK_OUT_TIME: &str = "11:00";
const FREE_TIME: &str = "14:00";

/// Minutes between consecutive activities in one slot
const ACTIVITY_SPACING_MINUTES: i64 = 90;

#[derive(Debug, Deserialize)]
struct DraftDay {
    day: u32,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    morning: Vec<String>,
    #[serde(default)]
    afternoon: Vec<String>,
    #[serde(default)]
    evening: Vec<String>,
    #[serde(default)]
    lunch: Option<String>,
    #[serde(default)]
    dinner: Option<String>,
}

impl DraftDay {
    fn slot(&self, slot: Slot) -> &[String] {
        match slot {
            Slot::Morning => &self.morning,
            Slot::Afternoon => &self.afternoon,
            Slot::Evening => &self.evening,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Draft {
    days: Vec<DraftDay>,
    #[serde(default)]
    tips: Vec<String>,
}

#[derive(Serialize)]
struct ItineraryContext {
    trip: TripContext,
    remaining_budget: String,
    transport: Option<String>,
    accommodation: Option<String>,
    activities: Vec<CandidateLine>,
    dining: Vec<CandidateLine>,
}

fn itinerary_schema() -> DecisionSchema {
    DecisionSchema::new(
        "itinerary",
        json!({
            "days": [{
                "day": 1,
                "title": "Arrival and first impressions",
                "morning": [],
                "afternoon": ["activity_1"],
                "evening": [],
                "lunch": "dining_1",
                "dinner": "dining_2"
            }],
            "tips": ["a practical tip"]
        }),
    )
    .require("days", FieldKind::Array)
}

fn slot_time(slot: Slot, index: usize) -> String {
    let Ok(base) = NaiveTime::parse_from_str(slot.activity_time(), "%H:%M") else {
        return slot.activity_time().to_string();
    };
    let offset = Duration::minutes(ACTIVITY_SPACING_MINUTES * index as i64);
    (base + offset).format("%H:%M").to_string()
}

fn city(destination: &str) -> &str {
    destination.split(',').next().map(str::trim).unwrap_or(destination)
}

fn item(time: &str, kind: ItemKind, name: String, candidate: Option<&Candidate>, cost: Money) -> ScheduledItem {
    ScheduledItem {
        time: time.to_string(),
        kind,
        candidate_id: candidate.map(|c| c.id.clone()),
        name,
        description: candidate.and_then(|c| c.description.clone()),
        estimated_cost: cost,
        story: None,
    }
}

/// Builds the final schedule from a draft
struct Assembler<'a> {
    request: &'a TripRequest,
    selection: &'a Selection,
    stories: &'a BTreeMap<String, String>,
    per_day: usize,
    placed: HashSet<String>,
    eaten: HashSet<String>,
    days: Vec<DayPlan>,
}

impl<'a> Assembler<'a> {
    fn new(request: &'a TripRequest, selection: &'a Selection, stories: &'a BTreeMap<String, String>) -> Self {
        let destination = city(&request.destination);
        let total = request.duration_days().max(1);
        let days = (1..=total)
            .map(|n| {
                let title = match n {
                    1 => format!("Arrival in {}", destination),
                    n if n == total => format!("Last day in {}", destination),
                    n => format!("Day {} in {}", n, destination),
                };
                let mut day = DayPlan::new(n, request.date_for_day(n), title);
                day.travel_tip = TRAVEL_TIPS[(n as usize - 1) % TRAVEL_TIPS.len()].to_string();
                day
            })
            .collect();
        Self {
            request,
            selection,
            stories,
            per_day: request.pace.activities_per_day(),
            placed: HashSet::new(),
            eaten: HashSet::new(),
            days,
        }
    }

    fn activity(&self, id: &str) -> Option<&'a Candidate> {
        let selection: &'a Selection = self.selection;
        selection.activities.iter().find(|c| c.id == id)
    }

    fn restaurant(&self, id: &str) -> Option<&'a Candidate> {
        let selection: &'a Selection = self.selection;
        selection.dining.iter().find(|c| c.id == id)
    }

    fn place_activity(&mut self, day_index: usize, slot: Slot, activity: &Candidate) {
        let day = &mut self.days[day_index];
        if day.count_kind(ItemKind::Activity) >= self.per_day || self.placed.contains(&activity.id) {
            return;
        }
        let index = day.slot(slot).iter().filter(|i| i.kind == ItemKind::Activity).count();
        let mut block = item(
            &slot_time(slot, index),
            ItemKind::Activity,
            activity.name.clone(),
            Some(activity),
            activity.price,
        );
        block.story = self.stories.get(&activity.id).cloned();
        day.slot_mut(slot).push(block);
        self.placed.insert(activity.id.clone());
    }

    fn place_meal(&mut self, day_index: usize, lunch: bool, restaurant: &Candidate) {
        if self.eaten.contains(&restaurant.id) {
            return;
        }
        let (slot, time, label) = if lunch {
            (Slot::Afternoon, LUNCH_TIME, "Lunch")
        } else {
            (Slot::Evening, DINNER_TIME, "Dinner")
        };
        let name = format!("{} at {}", label, restaurant.name);
        self.days[day_index]
            .slot_mut(slot)
            .push(item(time, ItemKind::Meal, name, Some(restaurant), restaurant.price));
        self.eaten.insert(restaurant.id.clone());
    }

    fn has_meal(&self, day_index: usize, lunch: bool) -> bool {
        let time = if lunch { LUNCH_TIME } else { DINNER_TIME };
        self.days[day_index]
            .items()
            .any(|i| i.kind == ItemKind::Meal && i.time == time)
    }

    fn apply_draft(&mut self, draft: &Draft) {
        let mut seen_days = HashSet::new();
        for draft_day in &draft.days {
            if draft_day.day == 0 || draft_day.day as usize > self.days.len() || !seen_days.insert(draft_day.day) {
                debug!(day = draft_day.day, "apply_draft: skipping day outside trip or repeated");
                continue;
            }
            let index = draft_day.day as usize - 1;
            if let Some(title) = draft_day.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                self.days[index].title = title.to_string();
            }
            for slot in Slot::ALL {
                for id in draft_day.slot(slot) {
                    if let Some(activity) = self.activity(id) {
                        self.place_activity(index, slot, activity);
                    }
                }
            }
            for (lunch, id) in [(true, &draft_day.lunch), (false, &draft_day.dinner)] {
                if let Some(restaurant) = id.as_deref().and_then(|id| self.restaurant(id)) {
                    self.place_meal(index, lunch, restaurant);
                }
            }
        }
    }

    /// Place every selected activity the draft left out
    fn fill_activities(&mut self) {
        let selection = self.selection;
        let pending: Vec<&Candidate> = selection
            .activities
            .iter()
            .filter(|a| !self.placed.contains(&a.id))
            .collect();
        for activity in pending {
            let target = (0..self.days.len())
                .filter(|&i| self.days[i].count_kind(ItemKind::Activity) < self.per_day)
                .min_by_key(|&i| (self.days[i].count_kind(ItemKind::Activity), i));
            let Some(index) = target else {
                debug!(id = %activity.id, "fill_activities: no capacity left");
                break;
            };
            let slot = Slot::ALL
                .into_iter()
                .min_by_key(|s| self.days[index].slot(*s).iter().filter(|i| i.kind == ItemKind::Activity).count())
                .unwrap_or(Slot::Morning);
            self.place_activity(index, slot, activity);
        }
    }

    fn fill_meals(&mut self) {
        let selection = self.selection;
        let spare: Vec<&Candidate> = selection.dining.iter().filter(|d| !self.eaten.contains(&d.id)).collect();
        let mut wanted = Vec::new();
        for index in 0..self.days.len() {
            for lunch in [true, false] {
                if !self.has_meal(index, lunch) {
                    wanted.push((index, lunch));
                }
            }
        }
        for ((index, lunch), restaurant) in wanted.into_iter().zip(spare) {
            self.place_meal(index, lunch, restaurant);
        }
    }

    fn add_boundaries(&mut self) {
        let last = self.days.len() - 1;
        if let Some(transport) = &self.selection.transport {
            let origin = self.request.origin.as_deref().unwrap_or("home");
            self.days[0].morning.push(item(
                OUTBOUND_TIME,
                ItemKind::Transport,
                format!("Travel from {} via {}", origin, transport.name),
                Some(transport),
                transport.price,
            ));
            if last > 0 {
                self.days[last].evening.push(item(
                    RETURN_TIME,
                    ItemKind::Transport,
                    format!("Return to {} via {}", origin, transport.name),
                    Some(transport),
                    Money::ZERO,
                ));
            }
        }
        if let Some(lodging) = &self.selection.accommodation {
            self.days[0].afternoon.push(item(
                CHECK_IN_TIME,
                ItemKind::Lodging,
                format!("Check in at {}", lodging.name),
                Some(lodging),
                lodging.price,
            ));
            if last > 0 {
                self.days[last].morning.push(item(
                    CHECK_OUT_TIME,
                    ItemKind::Lodging,
                    format!("Check out of {}", lodging.name),
                    Some(lodging),
                    Money::ZERO,
                ));
            }
        }
    }

    fn finish(mut self, tips: Vec<String>) -> Itinerary {
        let destination = city(&self.request.destination).to_string();
        for day in &mut self.days {
            if day.is_empty() {
                day.afternoon.push(item(
                    FREE_TIME,
                    ItemKind::FreeTime,
                    format!("Free exploration of {}", destination),
                    None,
                    Money::ZERO,
                ));
            }
            day.sort_slots();
        }
        Itinerary { days: self.days, tips }
    }
}

/// Turn a draft into a complete itinerary
fn assemble(request: &TripRequest, selection: &Selection, stories: &BTreeMap<String, String>, draft: &Draft) -> Itinerary {
    let mut assembler = Assembler::new(request, selection, stories);
    assembler.apply_draft(draft);
    assembler.fill_activities();
    assembler.fill_meals();
    assembler.add_boundaries();
    let tips = draft
        .tips
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .take(MAX_TIPS)
        .map(str::to_string)
        .collect();
    assembler.finish(tips)
}

pub struct ItineraryGenerator {
    decider: Arc<dyn Decider>,
    prompts: Arc<PromptLoader>,
    temperature: f32,
}

impl ItineraryGenerator {
    pub fn new(decider: Arc<dyn Decider>, prompts: Arc<PromptLoader>, temperature: f32) -> Self {
        Self {
            decider,
            prompts,
            temperature,
        }
    }

    pub async fn compose(&self, state: &TripState) -> Result<Itinerary, PlanningError> {
        let request = state.request();
        let selection = state.selection();
        debug!(
            activities = selection.activities.len(),
            dining = selection.dining.len(),
            "ItineraryGenerator::compose: called"
        );

        let ctx = ItineraryContext {
            trip: TripContext::from(request),
            remaining_budget: state.ledger().remaining_budget.to_string(),
            transport: selection.transport.as_ref().map(|t| t.name.clone()),
            accommodation: selection.accommodation.as_ref().map(|a| a.name.clone()),
            activities: lines(&selection.activities),
            dining: lines(&selection.dining),
        };
        let rendered = self
            .prompts
            .render_pair("itinerary", &ctx)
            .map_err(|e| PlanningError::Internal(e.to_string()))?;
        let prompt = DecisionPrompt::new(rendered.system, rendered.user, self.temperature);
        let draft: Draft = decide_with_retry(self.decider.as_ref(), &prompt, &itinerary_schema())
            .await
            .map_err(|e| PlanningError::service_unavailable("composing", e))?;

        let itinerary = assemble(request, selection, &state.stories, &draft);
        info!(
            days = itinerary.days.len(),
            activities = itinerary.activity_count(),
            "itinerary composed"
        );
        Ok(itinerary)
    }
}
