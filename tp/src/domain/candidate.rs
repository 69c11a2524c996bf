//! Candidate - a normalized option before selection
//!
//! Every source result (flight, hotel, attraction, restaurant) is mapped onto
//! this shape before it enters the trip state, so the coordinator never needs
//! to know which provider produced it.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Money;

/// Candidate category - one per fetch agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Transport,
    Accommodation,
    Activity,
    Dining,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Transport,
        Category::Accommodation,
        Category::Activity,
        Category::Dining,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Transport => "transport",
            Category::Accommodation => "accommodation",
            Category::Activity => "activity",
            Category::Dining => "dining",
        }
    }

    /// Whether source prices in this category are quoted per traveler
    pub fn is_per_person(&self) -> bool {
        !matches!(self, Category::Accommodation)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A normalized option with price and rating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub category: Category,
    pub name: String,

    /// Amount charged against the budget (already scaled for party size / nights)
    pub price: Money,

    /// Rating on a 0-5 scale, 0 when unknown
    #[serde(default)]
    pub rating: f64,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Which source produced this candidate
    #[serde(default)]
    pub provider: String,

    /// Category-specific attributes (airline, cuisine, nightly rate, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl Candidate {
    pub fn new(id: impl Into<String>, category: Category, name: impl Into<String>, price: Money) -> Self {
        Self {
            id: id.into(),
            category,
            name: name.into(),
            price,
            rating: 0.0,
            tags: Vec::new(),
            location: None,
            description: None,
            provider: String::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = rating;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }

    /// Number of preference tags this candidate matches (case-insensitive)
    pub fn preference_matches(&self, preferences: &[String]) -> usize {
        preferences
            .iter()
            .filter(|pref| {
                let pref = pref.to_lowercase();
                self.tags.iter().any(|t| t.to_lowercase() == pref)
                    || self.name.to_lowercase().contains(&pref)
                    || self
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&pref))
            })
            .count()
    }
}

/// Deterministic ordering used when candidates are otherwise equal:
/// more preference matches, then higher rating, then lower price, then id.
pub fn rank_order(a: &Candidate, b: &Candidate, preferences: &[String]) -> Ordering {
    b.preference_matches(preferences)
        .cmp(&a.preference_matches(preferences))
        .then_with(|| b.rating.partial_cmp(&a.rating).unwrap_or(Ordering::Equal))
        .then_with(|| a.price.cmp(&b.price))
        .then_with(|| a.id.cmp(&b.id))
}

/// Cheapest first, ties broken by higher rating then id
pub fn price_order(a: &Candidate, b: &Candidate) -> Ordering {
    a.price
        .cmp(&b.price)
        .then_with(|| b.rating.partial_cmp(&a.rating).unwrap_or(Ordering::Equal))
        .then_with(|| a.id.cmp(&b.id))
}

/// Sort candidates with the ranking order for their category
///
/// Transport is ranked by price first; every other category by preference
/// fit and rating.
pub fn sort_ranked(candidates: &mut [Candidate], category: Category, preferences: &[String]) {
    debug!(%category, count = candidates.len(), "sort_ranked: called");
    match category {
        Category::Transport => candidates.sort_by(price_order),
        _ => candidates.sort_by(|a, b| rank_order(a, b, preferences)),
    }
}

/// Candidate pools for one fetch cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidatePools {
    pub transport: Vec<Candidate>,
    pub accommodation: Vec<Candidate>,
    pub activities: Vec<Candidate>,
    pub dining: Vec<Candidate>,
}

impl CandidatePools {
    pub fn get(&self, category: Category) -> &[Candidate] {
        match category {
            Category::Transport => &self.transport,
            Category::Accommodation => &self.accommodation,
            Category::Activity => &self.activities,
            Category::Dining => &self.dining,
        }
    }

    pub fn is_empty(&self) -> bool {
        Category::ALL.iter().all(|c| self.get(*c).is_empty())
    }

    pub fn find(&self, category: Category, id: &str) -> Option<&Candidate> {
        self.get(category).iter().find(|c| c.id == id)
    }

    pub fn total_len(&self) -> usize {
        Category::ALL.iter().map(|c| self.get(*c).len()).sum()
    }
}
