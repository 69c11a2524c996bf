//! Itinerary - the day-by-day schedule produced by the itinerary generator

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Money;

/// Time-of-day slot within a day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Morning,
    Afternoon,
    Evening,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::Morning, Slot::Afternoon, Slot::Evening];

    /// Default start time for an activity placed in this slot
    pub fn activity_time(&self) -> &'static str {
        match self {
            Slot::Morning => "09:00",
            Slot::Afternoon => "14:00",
            Slot::Evening => "20:30",
        }
    }
}

/// What a scheduled block represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemKind {
    Activity,
    Meal,
    Transport,
    Lodging,
    FreeTime,
}

/// One block in a day's schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledItem {
    pub time: String,
    pub kind: ItemKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_id: Option<String>,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub estimated_cost: Money,

    /// Narrative attached to activity blocks when one was produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story: Option<String>,
}

/// One day of the trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    pub day_number: u32,
    pub date: NaiveDate,
    pub title: String,
    pub morning: Vec<ScheduledItem>,
    pub afternoon: Vec<ScheduledItem>,
    pub evening: Vec<ScheduledItem>,
    pub travel_tip: String,
}

impl DayPlan {
    pub fn new(day_number: u32, date: NaiveDate, title: impl Into<String>) -> Self {
        Self {
            day_number,
            date,
            title: title.into(),
            morning: Vec::new(),
            afternoon: Vec::new(),
            evening: Vec::new(),
            travel_tip: String::new(),
        }
    }

    pub fn slot(&self, slot: Slot) -> &[ScheduledItem] {
        match slot {
            Slot::Morning => &self.morning,
            Slot::Afternoon => &self.afternoon,
            Slot::Evening => &self.evening,
        }
    }

    pub fn slot_mut(&mut self, slot: Slot) -> &mut Vec<ScheduledItem> {
        match slot {
            Slot::Morning => &mut self.morning,
            Slot::Afternoon => &mut self.afternoon,
            Slot::Evening => &mut self.evening,
        }
    }

    pub fn items(&self) -> impl Iterator<Item = &ScheduledItem> {
        self.morning.iter().chain(self.afternoon.iter()).chain(self.evening.iter())
    }

    pub fn count_kind(&self, kind: ItemKind) -> usize {
        self.items().filter(|i| i.kind == kind).count()
    }

    /// A day with nothing to do: no activity, meal or free-time block
    pub fn is_empty(&self) -> bool {
        !self
            .items()
            .any(|i| matches!(i.kind, ItemKind::Activity | ItemKind::Meal | ItemKind::FreeTime))
    }

    /// Sort each slot by start time
    pub fn sort_slots(&mut self) {
        for slot in Slot::ALL {
            self.slot_mut(slot).sort_by(|a, b| a.time.cmp(&b.time));
        }
    }
}

/// The finished schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    pub days: Vec<DayPlan>,

    #[serde(default)]
    pub tips: Vec<String>,
}

impl Itinerary {
    pub fn activity_count(&self) -> usize {
        self.days.iter().map(|d| d.count_kind(ItemKind::Activity)).sum()
    }

    pub fn day(&self, day_number: u32) -> Option<&DayPlan> {
        self.days.iter().find(|d| d.day_number == day_number)
    }
}
